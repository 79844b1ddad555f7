//! Result-archive handling: unpack, locate geometry, convert to GLB.
//!
//! Runs on the blocking pool; everything here is synchronous I/O.

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use super::MaterializeError;
use crate::mesh::{glb, obj, Texture};

/// Directories packers add that never hold real content.
const IGNORED_DIRS: &[&str] = &["__MACOSX"];

#[derive(Debug, PartialEq, Eq)]
enum Geometry {
    Glb(PathBuf),
    Obj(PathBuf),
}

/// Unpack `bytes` into `work_dir` and produce delivery GLB bytes.
pub(super) fn extract_and_convert(bytes: &[u8], work_dir: &Path) -> Result<Vec<u8>, MaterializeError> {
    if work_dir.exists() {
        fs::remove_dir_all(work_dir)?;
    }
    fs::create_dir_all(work_dir)?;

    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| MaterializeError::Decompress(e.to_string()))?;
    archive
        .extract(work_dir)
        .map_err(|e| MaterializeError::Decompress(e.to_string()))?;

    match locate_geometry(work_dir)?.ok_or(MaterializeError::GeometryNotFound)? {
        Geometry::Glb(path) => {
            let bytes = fs::read(&path)?;
            glb::parse(&bytes).map_err(|e| {
                MaterializeError::Conversion(format!("{}: {e}", display_name(&path)))
            })?;
            Ok(bytes)
        }
        Geometry::Obj(path) => convert_obj(&path, work_dir),
    }
}

/// Prefer the shallowest `.glb`; fall back to the shallowest `.obj`.
fn locate_geometry(root: &Path) -> std::io::Result<Option<Geometry>> {
    let mut files = Vec::new();
    collect_files(root, 0, &mut files)?;
    files.sort();

    let with_ext = |wanted: &str| {
        files
            .iter()
            .find(|(_, path)| {
                path.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case(wanted))
            })
            .map(|(_, path)| path.clone())
    };

    Ok(with_ext("glb")
        .map(Geometry::Glb)
        .or_else(|| with_ext("obj").map(Geometry::Obj)))
}

fn collect_files(dir: &Path, depth: usize, out: &mut Vec<(usize, PathBuf)>) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            let ignored = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| IGNORED_DIRS.contains(&n));
            if !ignored {
                collect_files(&path, depth + 1, out)?;
            }
        } else if file_type.is_file() {
            out.push((depth, path));
        }
    }
    Ok(())
}

fn convert_obj(path: &Path, root: &Path) -> Result<Vec<u8>, MaterializeError> {
    let source = String::from_utf8_lossy(&fs::read(path)?).into_owned();
    let document = obj::parse_obj(&source)
        .map_err(|e| MaterializeError::Conversion(format!("{}: {e}", display_name(path))))?;

    let texture = if document.mesh.uvs.is_some() {
        load_texture(path, root, &document)
    } else {
        None
    };

    glb::encode(&document.mesh, texture.as_ref())
        .map_err(|e| MaterializeError::Conversion(e.to_string()))
}

/// Best effort: a missing or unreadable texture leaves the model untextured.
fn load_texture(obj_path: &Path, root: &Path, document: &obj::ObjDocument) -> Option<Texture> {
    let obj_dir = obj_path.parent()?;
    let material = document.materials_used.first().map(String::as_str);

    document.material_libs.iter().find_map(|lib| {
        let mtl_path = contained(root, &obj_dir.join(lib))?;
        let mtl = String::from_utf8_lossy(&fs::read(&mtl_path).ok()?).into_owned();
        let file = obj::diffuse_texture(&mtl, material)?;
        let texture_path = contained(root, &mtl_path.parent()?.join(file))?;
        let mime_type = texture_path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(Texture::mime_for_extension)?;
        match fs::read(&texture_path) {
            Ok(bytes) => Some(Texture { mime_type, bytes }),
            Err(e) => {
                tracing::warn!(path = %texture_path.display(), error = %e, "Texture referenced by material could not be read");
                None
            }
        }
    })
}

/// Canonical `path` if it exists and stays inside `root`.
fn contained(root: &Path, path: &Path) -> Option<PathBuf> {
    let root = root.canonicalize().ok()?;
    let path = path.canonicalize().ok()?;
    path.starts_with(&root).then_some(path)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
