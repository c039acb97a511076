//! Camera and projection system for the board view

use glam::{Mat4, Vec3};

/// Distance from the board centre to the orbiting camera.
pub const ORBIT_DISTANCE: f32 = 15.0;

/// Half extent of the board plane in world units.
pub const BOARD_HALF_EXTENT: f32 = 4.0;

/// Camera configuration for perspective projection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerspectiveCamera {
    /// Camera position in world space
    pub position: Vec3,
    /// Camera target (what it's looking at)
    pub target: Vec3,
    /// Up vector
    pub up: Vec3,
    /// Vertical field of view in degrees
    pub fov_y: f32,
    /// Near clipping plane
    pub near: f32,
    /// Far clipping plane
    pub far: f32,
}

impl Default for PerspectiveCamera {
    fn default() -> Self {
        PerspectiveCamera {
            position: Vec3::new(0.0, 12.0, 8.0),
            target: Vec3::ZERO,
            up: Vec3::new(0.0, 0.0, -1.0),
            fov_y: 45.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl PerspectiveCamera {
    /// Camera on the orbit around the board centre.
    ///
    /// `angle_deg` is the elevation away from straight overhead. The camera
    /// sits on the tracked player's side: negative z for white, positive for
    /// black. `lateral` shifts it sideways along x.
    pub fn orbit(angle_deg: f32, lateral: f32, flipped: bool) -> Self {
        let angle = angle_deg.to_radians();
        let z_direction = if flipped { 1.0 } else { -1.0 };
        PerspectiveCamera {
            position: Vec3::new(
                lateral,
                angle.cos() * ORBIT_DISTANCE,
                angle.sin() * ORBIT_DISTANCE * z_direction,
            ),
            up: Vec3::new(0.0, 0.0, -z_direction),
            ..PerspectiveCamera::default()
        }
    }

    /// Get the view matrix (world to camera space)
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    /// Get the perspective projection matrix
    pub fn projection_matrix(&self, output_width: u32, output_height: u32) -> Mat4 {
        let aspect = output_width as f32 / output_height.max(1) as f32;
        Mat4::perspective_rh(self.fov_y.to_radians(), aspect, self.near, self.far)
    }

    /// Get the combined view-projection matrix
    pub fn view_projection_matrix(&self, output_width: u32, output_height: u32) -> Mat4 {
        self.projection_matrix(output_width, output_height) * self.view_matrix()
    }

    /// Project a 3D point to 2D screen space
    pub fn project_point(
        &self,
        point: Vec3,
        output_width: u32,
        output_height: u32,
    ) -> Option<(f32, f32, f32)> {
        let clip = self.view_projection_matrix(output_width, output_height) * point.extend(1.0);

        // Behind the camera
        if clip.w <= 0.0 {
            return None;
        }

        let ndc = clip.truncate() / clip.w;
        let screen_x = (ndc.x + 1.0) * 0.5 * output_width as f32;
        let screen_y = (1.0 - ndc.y) * 0.5 * output_height as f32; // Flip Y axis
        Some((screen_x, screen_y, ndc.z))
    }

    /// Distance along the view direction (for depth testing)
    pub fn calculate_depth(&self, point: Vec3) -> f32 {
        let view_point = self.view_matrix().transform_point3(point);
        -view_point.z // Negative Z is forward in right-handed coordinates
    }

    /// World-space ray through a screen pixel.
    pub fn screen_ray(
        &self,
        screen_x: f32,
        screen_y: f32,
        output_width: u32,
        output_height: u32,
    ) -> Option<(Vec3, Vec3)> {
        let inverse = self
            .view_projection_matrix(output_width, output_height)
            .inverse();
        let ndc_x = screen_x / output_width.max(1) as f32 * 2.0 - 1.0;
        let ndc_y = 1.0 - screen_y / output_height.max(1) as f32 * 2.0;

        // Every ray starts at the eye; only the near-plane point is needed for direction.
        let near = inverse.project_point3(Vec3::new(ndc_x, ndc_y, 0.0));
        let direction = (near - self.position).normalize_or_zero();
        if direction == Vec3::ZERO || !direction.is_finite() {
            return None;
        }
        Some((self.position, direction))
    }

    /// Where a screen pixel hits the board plane, as world `(x, z)`.
    ///
    /// Returns `None` when the ray misses the 8x8 board.
    pub fn pick_board_point(
        &self,
        screen_x: f32,
        screen_y: f32,
        output_width: u32,
        output_height: u32,
    ) -> Option<(f32, f32)> {
        let (origin, direction) = self.screen_ray(screen_x, screen_y, output_width, output_height)?;
        let hit = intersect_ray_plane(origin, direction, Vec3::ZERO, Vec3::Y)?;
        if hit.x.abs() > BOARD_HALF_EXTENT || hit.z.abs() > BOARD_HALF_EXTENT {
            return None;
        }
        Some((hit.x, hit.z))
    }
}

fn intersect_ray_plane(origin: Vec3, dir: Vec3, plane_origin: Vec3, plane_normal: Vec3) -> Option<Vec3> {
    let denom = plane_normal.dot(dir);
    if denom.abs() < 1e-4 {
        return None;
    }
    let t = (plane_origin - origin).dot(plane_normal) / denom;
    if t < 0.0 {
        return None;
    }
    Some(origin + dir * t)
}
