//! Minimal mesh model plus OBJ reading and binary glTF writing.
//!
//! Only what result delivery needs: a single indexed triangle primitive with
//! optional UVs and at most one embedded base-color texture.

pub mod glb;
pub mod obj;
pub mod placeholder;

/// An indexed triangle mesh. All attribute arrays have one entry per vertex.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    /// Texture coordinates in OBJ convention (origin bottom-left).
    pub uvs: Option<Vec<[f32; 2]>>,
    pub indices: Vec<u32>,
}

impl Mesh {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// An encoded image embedded as the base-color texture.
#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

impl Texture {
    /// Guess the MIME type from a file extension. Only formats glTF allows
    /// are accepted.
    pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some("image/png"),
            "jpg" | "jpeg" => Some("image/jpeg"),
            _ => None,
        }
    }
}
