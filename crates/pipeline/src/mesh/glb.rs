//! Binary glTF 2.0 (GLB) writer and header reader.
//!
//! Layout: 12-byte header (`glTF`, version 2, total length), a JSON chunk
//! padded with spaces, then a BIN chunk padded with zeros. Every chunk is
//! 4-byte aligned.

use serde_json::{json, Map, Value};

use super::{Mesh, Texture};

const GLB_MAGIC: u32 = 0x4654_6C67;
const GLB_VERSION: u32 = 2;
const CHUNK_JSON: u32 = 0x4E4F_534A;
const CHUNK_BIN: u32 = 0x004E_4942;
const HEADER_LEN: usize = 12;
const CHUNK_HEADER_LEN: usize = 8;

const COMPONENT_FLOAT: u32 = 5126;
const COMPONENT_UNSIGNED_INT: u32 = 5125;
const TARGET_ARRAY_BUFFER: u32 = 34962;
const TARGET_ELEMENT_ARRAY_BUFFER: u32 = 34963;
const MODE_TRIANGLES: u32 = 4;

#[derive(Debug, thiserror::Error)]
pub enum GlbError {
    #[error("mesh has no triangles")]
    EmptyMesh,

    #[error("attribute {0} does not have one entry per vertex")]
    AttributeMismatch(&'static str),

    #[error("index {index} out of range for {vertices} vertices")]
    IndexOutOfRange { index: u32, vertices: usize },

    #[error("not a valid GLB file: {0}")]
    Malformed(String),
}

/// Encode a mesh (and optional base-color texture) as a GLB file.
pub fn encode(mesh: &Mesh, texture: Option<&Texture>) -> Result<Vec<u8>, GlbError> {
    validate(mesh)?;

    let mut bin = BinBuilder::default();
    let mut accessors = Vec::new();
    let mut attributes = Map::new();

    let (min, max) = bounds(&mesh.positions);
    let view = bin.push(&flatten3(&mesh.positions), Some(TARGET_ARRAY_BUFFER));
    attributes.insert("POSITION".into(), json!(accessors.len()));
    accessors.push(json!({
        "bufferView": view,
        "componentType": COMPONENT_FLOAT,
        "count": mesh.vertex_count(),
        "type": "VEC3",
        "min": min,
        "max": max,
    }));

    let view = bin.push(&flatten3(&mesh.normals), Some(TARGET_ARRAY_BUFFER));
    attributes.insert("NORMAL".into(), json!(accessors.len()));
    accessors.push(json!({
        "bufferView": view,
        "componentType": COMPONENT_FLOAT,
        "count": mesh.vertex_count(),
        "type": "VEC3",
    }));

    if let Some(uvs) = &mesh.uvs {
        // glTF puts the UV origin top-left; OBJ bottom-left.
        let flipped: Vec<f32> = uvs.iter().flat_map(|[u, v]| [*u, 1.0 - *v]).collect();
        let view = bin.push(&f32_bytes(&flipped), Some(TARGET_ARRAY_BUFFER));
        attributes.insert("TEXCOORD_0".into(), json!(accessors.len()));
        accessors.push(json!({
            "bufferView": view,
            "componentType": COMPONENT_FLOAT,
            "count": mesh.vertex_count(),
            "type": "VEC2",
        }));
    }

    let index_bytes: Vec<u8> = mesh.indices.iter().flat_map(|i| i.to_le_bytes()).collect();
    let view = bin.push(&index_bytes, Some(TARGET_ELEMENT_ARRAY_BUFFER));
    let indices_accessor = accessors.len();
    accessors.push(json!({
        "bufferView": view,
        "componentType": COMPONENT_UNSIGNED_INT,
        "count": mesh.indices.len(),
        "type": "SCALAR",
    }));

    let mut root = json!({
        "asset": { "version": "2.0", "generator": "modelforge" },
        "scene": 0,
        "scenes": [{ "nodes": [0] }],
        "nodes": [{ "mesh": 0 }],
        "meshes": [{
            "primitives": [{
                "attributes": attributes,
                "indices": indices_accessor,
                "material": 0,
                "mode": MODE_TRIANGLES,
            }],
        }],
        "accessors": accessors,
    });

    let material = match texture {
        Some(texture) => {
            let view = bin.push(&texture.bytes, None);
            root["images"] = json!([{ "bufferView": view, "mimeType": texture.mime_type }]);
            root["samplers"] = json!([{
                "magFilter": 9729,
                "minFilter": 9987,
                "wrapS": 10497,
                "wrapT": 10497,
            }]);
            root["textures"] = json!([{ "sampler": 0, "source": 0 }]);
            json!({
                "pbrMetallicRoughness": {
                    "baseColorTexture": { "index": 0 },
                    "metallicFactor": 0.0,
                    "roughnessFactor": 1.0,
                },
            })
        }
        None => json!({
            "pbrMetallicRoughness": {
                "baseColorFactor": [0.8, 0.8, 0.8, 1.0],
                "metallicFactor": 0.0,
                "roughnessFactor": 1.0,
            },
        }),
    };
    root["materials"] = json!([material]);
    root["bufferViews"] = Value::Array(bin.views);
    root["buffers"] = json!([{ "byteLength": bin.data.len() }]);

    let mut json_bytes = serde_json::to_vec(&root)
        .map_err(|e| GlbError::Malformed(format!("JSON encoding failed: {e}")))?;
    pad(&mut json_bytes, b' ');
    let mut bin_bytes = bin.data;
    pad(&mut bin_bytes, 0);

    let total = HEADER_LEN + CHUNK_HEADER_LEN * 2 + json_bytes.len() + bin_bytes.len();
    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&GLB_MAGIC.to_le_bytes());
    out.extend_from_slice(&GLB_VERSION.to_le_bytes());
    out.extend_from_slice(&(total as u32).to_le_bytes());
    out.extend_from_slice(&(json_bytes.len() as u32).to_le_bytes());
    out.extend_from_slice(&CHUNK_JSON.to_le_bytes());
    out.extend_from_slice(&json_bytes);
    out.extend_from_slice(&(bin_bytes.len() as u32).to_le_bytes());
    out.extend_from_slice(&CHUNK_BIN.to_le_bytes());
    out.extend_from_slice(&bin_bytes);
    Ok(out)
}

/// Split a GLB file into its JSON document and BIN chunk (empty when absent).
pub fn parse(bytes: &[u8]) -> Result<(Value, &[u8]), GlbError> {
    let word = |offset: usize| -> Result<u32, GlbError> {
        bytes
            .get(offset..offset + 4)
            .and_then(|b| b.try_into().ok())
            .map(u32::from_le_bytes)
            .ok_or_else(|| GlbError::Malformed(format!("truncated at byte {offset}")))
    };

    if word(0)? != GLB_MAGIC {
        return Err(GlbError::Malformed("bad magic".into()));
    }
    let version = word(4)?;
    if version != GLB_VERSION {
        return Err(GlbError::Malformed(format!("unsupported version {version}")));
    }
    let total = word(8)? as usize;
    if total > bytes.len() {
        return Err(GlbError::Malformed(format!(
            "declared length {total} exceeds file size {}",
            bytes.len()
        )));
    }

    let json_len = word(HEADER_LEN)? as usize;
    if word(HEADER_LEN + 4)? != CHUNK_JSON {
        return Err(GlbError::Malformed("first chunk is not JSON".into()));
    }
    let json_start = HEADER_LEN + CHUNK_HEADER_LEN;
    let json_end = json_start + json_len;
    let json_bytes = bytes
        .get(json_start..json_end)
        .ok_or_else(|| GlbError::Malformed("JSON chunk overruns file".into()))?;
    let document: Value = serde_json::from_slice(json_bytes)
        .map_err(|e| GlbError::Malformed(format!("invalid JSON chunk: {e}")))?;

    if json_end + CHUNK_HEADER_LEN > total {
        return Ok((document, &[]));
    }
    let bin_len = word(json_end)? as usize;
    if word(json_end + 4)? != CHUNK_BIN {
        return Ok((document, &[]));
    }
    let bin_start = json_end + CHUNK_HEADER_LEN;
    let bin = bytes
        .get(bin_start..bin_start + bin_len)
        .ok_or_else(|| GlbError::Malformed("BIN chunk overruns file".into()))?;
    Ok((document, bin))
}

fn validate(mesh: &Mesh) -> Result<(), GlbError> {
    if mesh.indices.is_empty() || mesh.indices.len() % 3 != 0 {
        return Err(GlbError::EmptyMesh);
    }
    let vertices = mesh.vertex_count();
    if mesh.normals.len() != vertices {
        return Err(GlbError::AttributeMismatch("NORMAL"));
    }
    if mesh.uvs.as_ref().is_some_and(|uvs| uvs.len() != vertices) {
        return Err(GlbError::AttributeMismatch("TEXCOORD_0"));
    }
    if let Some(&index) = mesh.indices.iter().find(|&&i| i as usize >= vertices) {
        return Err(GlbError::IndexOutOfRange { index, vertices });
    }
    Ok(())
}

#[derive(Default)]
struct BinBuilder {
    data: Vec<u8>,
    views: Vec<Value>,
}

impl BinBuilder {
    /// Append 4-byte-aligned bytes as a new buffer view; returns its index.
    fn push(&mut self, bytes: &[u8], target: Option<u32>) -> usize {
        pad(&mut self.data, 0);
        let mut view = json!({
            "buffer": 0,
            "byteOffset": self.data.len(),
            "byteLength": bytes.len(),
        });
        if let Some(target) = target {
            view["target"] = json!(target);
        }
        self.data.extend_from_slice(bytes);
        self.views.push(view);
        self.views.len() - 1
    }
}

fn pad(bytes: &mut Vec<u8>, fill: u8) {
    while bytes.len() % 4 != 0 {
        bytes.push(fill);
    }
}

fn f32_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn flatten3(values: &[[f32; 3]]) -> Vec<u8> {
    values.iter().flatten().flat_map(|v| v.to_le_bytes()).collect()
}

fn bounds(positions: &[[f32; 3]]) -> ([f32; 3], [f32; 3]) {
    let mut min = [f32::MAX; 3];
    let mut max = [f32::MIN; 3];
    for p in positions {
        for axis in 0..3 {
            min[axis] = min[axis].min(p[axis]);
            max[axis] = max[axis].max(p[axis]);
        }
    }
    (min, max)
}
