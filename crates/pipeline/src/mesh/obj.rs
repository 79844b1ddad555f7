//! Wavefront OBJ / MTL reader.

use std::collections::HashMap;

use super::Mesh;

#[derive(Debug, thiserror::Error)]
pub enum ObjError {
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("OBJ file contains no faces")]
    Empty,
}

/// A parsed OBJ file.
#[derive(Debug, Clone)]
pub struct ObjDocument {
    pub mesh: Mesh,
    /// Material libraries referenced by `mtllib`, in order.
    pub material_libs: Vec<String>,
    /// Materials selected by `usemtl`, in order of first use.
    pub materials_used: Vec<String>,
}

type VertexKey = (usize, Option<usize>, Option<usize>);

/// Parse OBJ text into an indexed triangle mesh.
///
/// Polygons are fan-triangulated. Negative (relative) indices are resolved.
/// When any face lacks normals, smooth normals are computed for the whole
/// mesh.
pub fn parse_obj(source: &str) -> Result<ObjDocument, ObjError> {
    let mut positions: Vec<[f32; 3]> = Vec::new();
    let mut texcoords: Vec<[f32; 2]> = Vec::new();
    let mut normals: Vec<[f32; 3]> = Vec::new();
    let mut faces: Vec<Vec<VertexKey>> = Vec::new();
    let mut material_libs = Vec::new();
    let mut materials_used: Vec<String> = Vec::new();

    for (idx, raw) in source.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.split('#').next().unwrap_or("").trim();
        let mut tokens = line.split_whitespace();
        let Some(keyword) = tokens.next() else {
            continue;
        };

        match keyword {
            "v" => positions.push(parse_floats::<3>(tokens, line_no, 3)?),
            "vt" => {
                let [u, v] = parse_floats::<2>(tokens, line_no, 1)?;
                texcoords.push([u, v]);
            }
            "vn" => normals.push(parse_floats::<3>(tokens, line_no, 3)?),
            "f" => {
                let face = tokens
                    .map(|t| parse_face_vertex(t, &positions, &texcoords, &normals, line_no))
                    .collect::<Result<Vec<_>, _>>()?;
                if face.len() < 3 {
                    return Err(ObjError::Parse {
                        line: line_no,
                        message: format!("face has {} vertices, need at least 3", face.len()),
                    });
                }
                faces.push(face);
            }
            "mtllib" => material_libs.extend(tokens.map(str::to_string)),
            "usemtl" => {
                if let Some(name) = tokens.next() {
                    if !materials_used.iter().any(|m| m == name) {
                        materials_used.push(name.to_string());
                    }
                }
            }
            _ => {}
        }
    }

    if faces.is_empty() {
        return Err(ObjError::Empty);
    }

    Ok(ObjDocument {
        mesh: build_mesh(&positions, &texcoords, &normals, &faces),
        material_libs,
        materials_used,
    })
}

/// Find the diffuse texture (`map_Kd`) of `material`, or of the first
/// material that has one when `material` is `None` or has none.
pub fn diffuse_texture(mtl_source: &str, material: Option<&str>) -> Option<String> {
    let mut current: Option<&str> = None;
    let mut maps: Vec<(Option<&str>, String)> = Vec::new();

    for raw in mtl_source.lines() {
        let line = raw.split('#').next().unwrap_or("").trim();
        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some("newmtl") => current = tokens.next(),
            Some(kw) if kw.eq_ignore_ascii_case("map_Kd") => {
                // Options such as `-s 1 1 1` may precede the file name.
                if let Some(file) = tokens.last() {
                    maps.push((current, file.replace('\\', "/")));
                }
            }
            _ => {}
        }
    }

    material
        .and_then(|name| maps.iter().find(|(m, _)| *m == Some(name)))
        .or_else(|| maps.first())
        .map(|(_, file)| file.clone())
}

fn parse_floats<'a, const N: usize>(
    tokens: impl Iterator<Item = &'a str>,
    line: usize,
    required: usize,
) -> Result<[f32; N], ObjError> {
    let mut out = [0.0f32; N];
    let mut count = 0;
    for (slot, token) in out.iter_mut().zip(tokens) {
        *slot = token.parse().map_err(|_| ObjError::Parse {
            line,
            message: format!("invalid number '{token}'"),
        })?;
        count += 1;
    }
    if count < required {
        return Err(ObjError::Parse {
            line,
            message: format!("expected {required} components, got {count}"),
        });
    }
    Ok(out)
}

fn parse_face_vertex(
    token: &str,
    positions: &[[f32; 3]],
    texcoords: &[[f32; 2]],
    normals: &[[f32; 3]],
    line: usize,
) -> Result<VertexKey, ObjError> {
    let mut parts = token.split('/');
    let v = parts.next().unwrap_or("");
    let vt = parts.next().filter(|s| !s.is_empty());
    let vn = parts.next().filter(|s| !s.is_empty());

    let position = resolve_index(v, positions.len(), line)?;
    let texcoord = vt.map(|s| resolve_index(s, texcoords.len(), line)).transpose()?;
    let normal = vn.map(|s| resolve_index(s, normals.len(), line)).transpose()?;
    Ok((position, texcoord, normal))
}

/// Resolve a 1-based or negative OBJ index against `len` elements.
fn resolve_index(token: &str, len: usize, line: usize) -> Result<usize, ObjError> {
    let raw: i64 = token.parse().map_err(|_| ObjError::Parse {
        line,
        message: format!("invalid index '{token}'"),
    })?;
    let resolved = match raw {
        0 => None,
        n if n > 0 => Some(n as usize - 1),
        n => (len as i64 + n).try_into().ok(),
    };
    resolved.filter(|&i| i < len).ok_or_else(|| ObjError::Parse {
        line,
        message: format!("index {raw} out of range ({len} defined)"),
    })
}

fn build_mesh(
    positions: &[[f32; 3]],
    texcoords: &[[f32; 2]],
    normals: &[[f32; 3]],
    faces: &[Vec<VertexKey>],
) -> Mesh {
    let has_uvs = faces.iter().flatten().any(|(_, vt, _)| vt.is_some());
    let needs_normals = faces.iter().flatten().any(|(_, _, vn)| vn.is_none());

    let mut lookup: HashMap<VertexKey, u32> = HashMap::new();
    let mut mesh = Mesh {
        uvs: has_uvs.then(Vec::new),
        ..Default::default()
    };

    for face in faces {
        let corners: Vec<u32> = face
            .iter()
            .map(|key| {
                *lookup.entry(*key).or_insert_with(|| {
                    let (v, vt, vn) = *key;
                    mesh.positions.push(positions[v]);
                    mesh.normals
                        .push(vn.map(|i| normals[i]).unwrap_or([0.0, 0.0, 0.0]));
                    if let Some(uvs) = mesh.uvs.as_mut() {
                        uvs.push(vt.map(|i| texcoords[i]).unwrap_or([0.0, 0.0]));
                    }
                    (mesh.positions.len() - 1) as u32
                })
            })
            .collect();

        for i in 1..corners.len() - 1 {
            mesh.indices
                .extend_from_slice(&[corners[0], corners[i], corners[i + 1]]);
        }
    }

    if needs_normals {
        mesh.normals = smooth_normals(&mesh.positions, &mesh.indices);
    }
    mesh
}

/// Area-weighted vertex normals. Degenerate vertices point up.
pub fn smooth_normals(positions: &[[f32; 3]], indices: &[u32]) -> Vec<[f32; 3]> {
    let mut acc = vec![[0.0f32; 3]; positions.len()];
    for tri in indices.chunks_exact(3) {
        let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        let n = cross(sub(positions[b], positions[a]), sub(positions[c], positions[a]));
        for i in [a, b, c] {
            acc[i] = [acc[i][0] + n[0], acc[i][1] + n[1], acc[i][2] + n[2]];
        }
    }
    acc.into_iter()
        .map(|n| {
            let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
            if len > f32::EPSILON {
                [n[0] / len, n[1] / len, n[2] / len]
            } else {
                [0.0, 1.0, 0.0]
            }
        })
        .collect()
}

fn sub(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn cross(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}
