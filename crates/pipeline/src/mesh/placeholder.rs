//! Generated stand-in artifact for the mock provider.

use super::glb::{self, GlbError};
use super::Mesh;

/// (normal, u axis, v axis) per face, with `u × v = normal` so the corner
/// order below winds counter-clockwise seen from outside.
const FACES: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
    ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
    ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
    ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
    ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
    ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
    ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
];

const CORNERS: [(f32, f32); 4] = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];

/// An axis-aligned cube of side 1 centred on the origin, with per-face
/// normals and UVs.
pub fn unit_cube() -> Mesh {
    let mut mesh = Mesh::default();
    let mut uvs = Vec::with_capacity(24);

    for (normal, u, v) in FACES {
        let base = mesh.positions.len() as u32;
        for (su, sv) in CORNERS {
            mesh.positions.push(std::array::from_fn(|axis| {
                0.5 * (normal[axis] + u[axis] * su + v[axis] * sv)
            }));
            mesh.normals.push(normal);
            uvs.push([(su + 1.0) / 2.0, (sv + 1.0) / 2.0]);
        }
        mesh.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    mesh.uvs = Some(uvs);
    mesh
}

/// The placeholder model as GLB bytes.
pub fn placeholder_glb() -> Result<Vec<u8>, GlbError> {
    glb::encode(&unit_cube(), None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cube_shape() {
        let cube = unit_cube();
        assert_eq!(cube.vertex_count(), 24);
        assert_eq!(cube.triangle_count(), 12);
        for p in &cube.positions {
            assert!(p.iter().all(|c| (c.abs() - 0.5).abs() < 1e-6));
        }
    }

    #[test]
    fn faces_wind_outward() {
        let cube = unit_cube();
        for tri in cube.indices.chunks_exact(3) {
            let [a, b, c] = [0, 1, 2].map(|i| cube.positions[tri[i] as usize]);
            let e1 = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
            let e2 = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
            let n = [
                e1[1] * e2[2] - e1[2] * e2[1],
                e1[2] * e2[0] - e1[0] * e2[2],
                e1[0] * e2[1] - e1[1] * e2[0],
            ];
            let expected = cube.normals[tri[0] as usize];
            let dot = n[0] * expected[0] + n[1] * expected[1] + n[2] * expected[2];
            assert!(dot > 0.0);
        }
    }

    #[test]
    fn placeholder_is_valid_glb() {
        let bytes = placeholder_glb().unwrap();
        let (doc, _) = glb::parse(&bytes).unwrap();
        assert_eq!(doc["accessors"][0]["count"], 24);
    }
}
