//! Geometry generation for board squares, pieces and overlays
//!
//! All builders return faces in local space. Meshes in the scene carry their
//! own transform, applied at render time.

use glam::{Vec2, Vec3};

/// A vertex with position, normal, and UV coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: (f32, f32),
}

/// A planar convex polygon (triangle or quad)
#[derive(Debug, Clone, PartialEq)]
pub struct Face {
    pub vertices: Vec<Vertex>,
}

impl Face {
    fn from_points(points: &[Vec3], uvs: &[(f32, f32)]) -> Self {
        let normal = newell_normal(points);
        Face {
            vertices: points
                .iter()
                .zip(uvs.iter().chain(std::iter::repeat(&(0.0, 0.0))))
                .map(|(&position, &uv)| Vertex {
                    position,
                    normal,
                    uv,
                })
                .collect(),
        }
    }

    fn untextured(points: &[Vec3]) -> Self {
        Face::from_points(points, &[])
    }

    pub fn normal(&self) -> Vec3 {
        self.vertices.first().map_or(Vec3::Y, |v| v.normal)
    }

    pub fn centroid(&self) -> Vec3 {
        let sum: Vec3 = self.vertices.iter().map(|v| v.position).sum();
        sum / self.vertices.len().max(1) as f32
    }
}

/// Polygon normal that tolerates repeated vertices (lathe poles).
fn newell_normal(points: &[Vec3]) -> Vec3 {
    let mut normal = Vec3::ZERO;
    for (i, current) in points.iter().enumerate() {
        let next = points[(i + 1) % points.len()];
        normal.x += (current.y - next.y) * (current.z + next.z);
        normal.y += (current.z - next.z) * (current.x + next.x);
        normal.z += (current.x - next.x) * (current.y + next.y);
    }
    normal.normalize_or_zero()
}

/// Horizontal quad facing +Y, centred on the origin.
///
/// UV `(0, 0)` sits at the `-x, -z` corner.
pub fn quad_xz(width: f32, depth: f32) -> Vec<Face> {
    let hw = width / 2.0;
    let hd = depth / 2.0;
    vec![Face::from_points(
        &[
            Vec3::new(-hw, 0.0, -hd),
            Vec3::new(-hw, 0.0, hd),
            Vec3::new(hw, 0.0, hd),
            Vec3::new(hw, 0.0, -hd),
        ],
        &[(0.0, 0.0), (0.0, 1.0), (1.0, 1.0), (1.0, 0.0)],
    )]
}

/// Axis-aligned box centred on the origin.
pub fn box_faces(size_x: f32, size_y: f32, size_z: f32) -> Vec<Face> {
    let x = size_x / 2.0;
    let y = size_y / 2.0;
    let z = size_z / 2.0;
    let corners = |a: [f32; 3], b: [f32; 3], c: [f32; 3], d: [f32; 3]| {
        Face::untextured(&[
            Vec3::new(a[0] * x, a[1] * y, a[2] * z),
            Vec3::new(b[0] * x, b[1] * y, b[2] * z),
            Vec3::new(c[0] * x, c[1] * y, c[2] * z),
            Vec3::new(d[0] * x, d[1] * y, d[2] * z),
        ])
    };
    vec![
        // front
        corners([-1., -1., 1.], [1., -1., 1.], [1., 1., 1.], [-1., 1., 1.]),
        // back
        corners([1., -1., -1.], [-1., -1., -1.], [-1., 1., -1.], [1., 1., -1.]),
        // right
        corners([1., -1., 1.], [1., -1., -1.], [1., 1., -1.], [1., 1., 1.]),
        // left
        corners([-1., -1., -1.], [-1., -1., 1.], [-1., 1., 1.], [-1., 1., -1.]),
        // top
        corners([-1., 1., 1.], [1., 1., 1.], [1., 1., -1.], [-1., 1., -1.]),
        // bottom
        corners([-1., -1., -1.], [1., -1., -1.], [1., -1., 1.], [-1., -1., 1.]),
    ]
}

/// Surface of revolution around +Y. Each profile point is `(radius, height)`.
pub fn lathe(profile: &[(f32, f32)], segments: u32) -> Vec<Face> {
    let segments = segments.max(3);
    let mut faces = Vec::with_capacity(profile.len() * segments as usize);
    let ring = |(radius, height): (f32, f32), i: u32| {
        let phi = i as f32 / segments as f32 * std::f32::consts::TAU;
        Vec3::new(radius * phi.sin(), height, radius * phi.cos())
    };
    for pair in profile.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if a.0 <= 0.0 && b.0 <= 0.0 {
            continue;
        }
        for i in 0..segments {
            let points = [ring(a, i), ring(a, i + 1), ring(b, i + 1), ring(b, i)];
            if a.0 <= 0.0 {
                faces.push(Face::untextured(&[points[0], points[2], points[3]]));
            } else if b.0 <= 0.0 {
                faces.push(Face::untextured(&[points[0], points[1], points[2]]));
            } else {
                faces.push(Face::untextured(&points));
            }
        }
    }
    faces
}

/// Closed cylinder standing on y = 0.
pub fn cylinder(radius: f32, height: f32, segments: u32) -> Vec<Face> {
    lathe(
        &[(0.0, 0.0), (radius, 0.0), (radius, height), (0.0, height)],
        segments,
    )
}

/// Cone with its base on y = 0 and tip at y = height.
pub fn cone(radius: f32, height: f32, segments: u32) -> Vec<Face> {
    lathe(&[(0.0, 0.0), (radius, 0.0), (0.0, height)], segments)
}

/// Torus lying flat in the XZ plane.
pub fn torus(radius: f32, tube: f32, radial_segments: u32, tubular_segments: u32) -> Vec<Face> {
    let radial = radial_segments.max(3);
    let tubular = tubular_segments.max(3);
    let point = |i: u32, j: u32| {
        let u = i as f32 / tubular as f32 * std::f32::consts::TAU;
        let v = j as f32 / radial as f32 * std::f32::consts::TAU;
        let r = radius + tube * v.cos();
        Vec3::new(r * u.cos(), tube * v.sin(), r * u.sin())
    };
    let mut faces = Vec::with_capacity((radial * tubular) as usize);
    for i in 0..tubular {
        for j in 0..radial {
            faces.push(Face::untextured(&[
                point(i, j),
                point(i + 1, j),
                point(i + 1, j + 1),
                point(i, j + 1),
            ]));
        }
    }
    faces
}

/// One step of a 2D outline.
#[derive(Debug, Clone, Copy)]
pub enum PathStep {
    Line(f32, f32),
    /// Quadratic curve: control point, then end point.
    Quad(f32, f32, f32, f32),
}

/// Flatten an outline into points, sampling each curve `steps` times.
pub fn flatten_path(start: (f32, f32), steps: &[PathStep], curve_steps: u32) -> Vec<Vec2> {
    let mut points = vec![Vec2::new(start.0, start.1)];
    for step in steps {
        let from = *points.last().unwrap_or(&Vec2::ZERO);
        match *step {
            PathStep::Line(x, y) => points.push(Vec2::new(x, y)),
            PathStep::Quad(cx, cy, x, y) => {
                let control = Vec2::new(cx, cy);
                let to = Vec2::new(x, y);
                for s in 1..=curve_steps.max(1) {
                    let t = s as f32 / curve_steps.max(1) as f32;
                    let mt = 1.0 - t;
                    points.push(from * mt * mt + control * 2.0 * mt * t + to * t * t);
                }
            }
        }
    }
    // Closing segment duplicates the start point
    if points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    points
}

fn signed_area(points: &[Vec2]) -> f32 {
    let mut area = 0.0;
    for (i, a) in points.iter().enumerate() {
        let b = points[(i + 1) % points.len()];
        area += a.x * b.y - b.x * a.y;
    }
    area / 2.0
}

fn point_in_triangle(p: Vec2, a: Vec2, b: Vec2, c: Vec2) -> bool {
    let d1 = (p - b).perp_dot(a - b);
    let d2 = (p - c).perp_dot(b - c);
    let d3 = (p - a).perp_dot(c - a);
    let has_neg = d1 < 0.0 || d2 < 0.0 || d3 < 0.0;
    let has_pos = d1 > 0.0 || d2 > 0.0 || d3 > 0.0;
    !(has_neg && has_pos)
}

/// Ear-clipping triangulation of a simple polygon. Returns index triples.
pub fn triangulate(points: &[Vec2]) -> Vec<[usize; 3]> {
    let mut indices: Vec<usize> = (0..points.len()).collect();
    if signed_area(points) < 0.0 {
        indices.reverse();
    }
    let mut triangles = Vec::new();
    let mut guard = 0;
    while indices.len() > 3 && guard < points.len() * points.len() {
        guard += 1;
        let n = indices.len();
        let mut clipped = false;
        for i in 0..n {
            let (ia, ib, ic) = (indices[(i + n - 1) % n], indices[i], indices[(i + 1) % n]);
            let (a, b, c) = (points[ia], points[ib], points[ic]);
            // Reflex or degenerate corner
            if (b - a).perp_dot(c - b) <= 0.0 {
                continue;
            }
            let blocked = indices
                .iter()
                .filter(|&&j| j != ia && j != ib && j != ic)
                .any(|&j| point_in_triangle(points[j], a, b, c));
            if blocked {
                continue;
            }
            triangles.push([ia, ib, ic]);
            indices.remove(i);
            clipped = true;
            break;
        }
        if !clipped {
            break;
        }
    }
    if indices.len() == 3 {
        triangles.push([indices[0], indices[1], indices[2]]);
    }
    triangles
}

/// Extrude a 2D outline (in the XY plane) along +Z by `depth`.
pub fn extrude(outline: &[Vec2], depth: f32) -> Vec<Face> {
    if outline.len() < 3 {
        return Vec::new();
    }
    let mut faces = Vec::new();
    for [a, b, c] in triangulate(outline) {
        let (pa, pb, pc) = (outline[a], outline[b], outline[c]);
        faces.push(Face::untextured(&[
            pa.extend(depth),
            pb.extend(depth),
            pc.extend(depth),
        ]));
        faces.push(Face::untextured(&[pc.extend(0.0), pb.extend(0.0), pa.extend(0.0)]));
    }
    for (i, a) in outline.iter().enumerate() {
        let b = outline[(i + 1) % outline.len()];
        faces.push(Face::untextured(&[
            a.extend(0.0),
            b.extend(0.0),
            b.extend(depth),
            a.extend(depth),
        ]));
    }
    faces
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quad_faces_up() {
        let faces = quad_xz(1.0, 1.0);
        assert_eq!(faces.len(), 1);
        assert!(faces[0].normal().dot(Vec3::Y).abs() > 0.999);
    }

    #[test]
    fn test_box_has_six_faces() {
        let faces = box_faces(0.08, 0.25, 0.08);
        assert_eq!(faces.len(), 6);
        let top = &faces[4];
        assert!((top.centroid().y - 0.125).abs() < 1e-6);
    }

    #[test]
    fn test_lathe_face_count() {
        // Two edges with radius, the pole edges collapse to triangles
        let faces = lathe(&[(0.0, 0.0), (0.4, 0.0), (0.4, 1.0), (0.0, 1.0)], 8);
        assert_eq!(faces.len(), 3 * 8);
        let triangles = faces.iter().filter(|f| f.vertices.len() == 3).count();
        assert_eq!(triangles, 16);
    }

    #[test]
    fn test_triangulate_square_and_concave() {
        let square = [
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.0),
        ];
        assert_eq!(triangulate(&square).len(), 2);

        // An L shape: 6 vertices, 4 triangles
        let l_shape = [
            Vec2::new(0.0, 0.0),
            Vec2::new(2.0, 0.0),
            Vec2::new(2.0, 1.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(1.0, 2.0),
            Vec2::new(0.0, 2.0),
        ];
        assert_eq!(triangulate(&l_shape).len(), 4);
    }

    #[test]
    fn test_flatten_path_samples_curves() {
        let points = flatten_path(
            (0.0, 0.0),
            &[PathStep::Line(1.0, 0.0), PathStep::Quad(1.0, 1.0, 0.0, 1.0)],
            4,
        );
        assert_eq!(points.len(), 1 + 1 + 4);
        assert_eq!(*points.last().unwrap(), Vec2::new(0.0, 1.0));
    }

    #[test]
    fn test_extrude_closes_shape() {
        let triangle = [Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0)];
        let faces = extrude(&triangle, 0.2);
        // two caps + three sides
        assert_eq!(faces.len(), 5);
    }

    #[test]
    fn test_torus_is_flat() {
        let faces = torus(0.35, 0.06, 8, 16);
        assert_eq!(faces.len(), 8 * 16);
        for face in &faces {
            for v in &face.vertices {
                assert!(v.position.y.abs() <= 0.06 + 1e-6);
            }
        }
    }
}
