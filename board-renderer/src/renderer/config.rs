use glam::Vec3;

/// A directional light shining from `direction` towards the origin
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    /// Unit vector pointing from the scene towards the light
    pub direction: Vec3,
    pub intensity: f32,
}

impl DirectionalLight {
    pub fn from_position(position: Vec3, intensity: f32) -> Self {
        DirectionalLight {
            direction: position.normalize_or_zero(),
            intensity,
        }
    }
}

/// Lighting for lit materials. Unlit materials ignore it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightConfig {
    /// Ambient light coefficient (0.0 = fully dark shadows, 1.0 = no shadows)
    pub ambient: f32,
    /// Main light above and in front of the board
    pub key: DirectionalLight,
    /// Weaker light from the opposite side
    pub fill: DirectionalLight,
}

impl Default for LightConfig {
    fn default() -> Self {
        LightConfig {
            ambient: 0.6,
            key: DirectionalLight::from_position(Vec3::new(5.0, 15.0, 8.0), 0.8),
            fill: DirectionalLight::from_position(Vec3::new(-5.0, 10.0, -5.0), 0.3),
        }
    }
}

impl LightConfig {
    /// Brightness factor for a surface with the given (camera-facing) normal.
    pub fn intensity(&self, normal: Vec3) -> f32 {
        let key = normal.dot(self.key.direction).max(0.0) * self.key.intensity;
        let fill = normal.dot(self.fill.direction).max(0.0) * self.fill.intensity;
        (self.ambient + key + fill).min(1.0)
    }
}
