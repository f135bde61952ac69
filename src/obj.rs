use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use glam::Vec3;

use crate::mesh::Mesh;

/// Reads and parses an OBJ file from disk.
pub fn load_obj<P: AsRef<Path>>(path: P) -> Result<Mesh> {
    let path = path.as_ref();
    let data = fs::read_to_string(path)
        .with_context(|| format!("unable to read {}", path.display()))?;
    load_obj_from_str(&data).with_context(|| format!("invalid OBJ file {}", path.display()))
}

/// Parses OBJ text into an indexed mesh.
///
/// Only `v`, `vn` and `f` records are read. Polygons are fan-triangulated.
/// Vertices that reference no normal get smooth normals averaged from the
/// faces around them.
pub fn load_obj_from_str(data: &str) -> Result<Mesh> {
    let mut positions = Vec::new();
    let mut normals = Vec::new();
    let mut triangles: Vec<[Corner; 3]> = Vec::new();

    for (line_no, line) in data.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let mut parts = trimmed.split_whitespace();
        let Some(tag) = parts.next() else {
            continue;
        };
        match tag {
            "v" => positions.push(
                parse_vec3(parts)
                    .with_context(|| format!("invalid vertex on line {}", line_no + 1))?,
            ),
            "vn" => normals.push(
                parse_vec3(parts)
                    .with_context(|| format!("invalid normal on line {}", line_no + 1))?,
            ),
            "f" => {
                let polygon = parse_face(parts)
                    .with_context(|| format!("invalid face on line {}", line_no + 1))?;
                for i in 1..polygon.len() - 1 {
                    triangles.push([polygon[0], polygon[i], polygon[i + 1]]);
                }
            }
            _ => {}
        }
    }

    if positions.is_empty() {
        return Err(anyhow!("OBJ file does not define any vertices"));
    }

    let (mut mesh, missing) = build_mesh(&positions, &normals, &triangles)?;
    if missing.iter().any(|&m| m) {
        smooth_missing_normals(&mut mesh, &missing);
    }
    Ok(mesh)
}

#[derive(Debug, Clone, Copy)]
struct Corner {
    position: i32,
    normal: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Key {
    position: usize,
    normal: Option<usize>,
}

fn parse_vec3<'a>(mut parts: impl Iterator<Item = &'a str>) -> Result<Vec3> {
    let mut next = || -> Result<f32> {
        let text = parts
            .next()
            .ok_or_else(|| anyhow!("missing vector component"))?;
        Ok(text.parse::<f32>()?)
    };
    Ok(Vec3::new(next()?, next()?, next()?))
}

/// Parses `v`, `v/vt`, `v//vn` and `v/vt/vn` corners. Texture indices are
/// skipped.
fn parse_face<'a>(parts: impl Iterator<Item = &'a str>) -> Result<Vec<Corner>> {
    let mut corners = Vec::new();
    for part in parts {
        let mut segments = part.split('/');
        let position = segments
            .next()
            .ok_or_else(|| anyhow!("missing vertex index"))?
            .parse::<i32>()?;
        let normal = match segments.nth(1) {
            Some(text) if !text.is_empty() => text.parse::<i32>()?,
            _ => 0,
        };
        corners.push(Corner { position, normal });
    }
    if corners.len() < 3 {
        return Err(anyhow!("faces must reference at least 3 vertices"));
    }
    Ok(corners)
}

/// Deduplicates corners into shared vertices. The returned mask marks the
/// vertices that reference no normal.
fn build_mesh(
    positions: &[Vec3],
    normals: &[Vec3],
    triangles: &[[Corner; 3]],
) -> Result<(Mesh, Vec<bool>)> {
    let mut lookup: HashMap<Key, u32> = HashMap::new();
    let mut mesh = Mesh::default();
    let mut missing = Vec::new();

    for corner in triangles.iter().flatten() {
        let position = resolve_index(corner.position, positions.len())
            .ok_or_else(|| anyhow!("vertex index {} out of range", corner.position))?;
        let normal = resolve_index(corner.normal, normals.len());
        let key = Key { position, normal };
        let next_index = mesh.positions.len() as u32;
        let index = *lookup.entry(key).or_insert_with(|| {
            mesh.positions.push(positions[position]);
            mesh.normals.push(normal.map_or(Vec3::ZERO, |n| normals[n]));
            missing.push(normal.is_none());
            next_index
        });
        mesh.indices.push(index);
    }

    Ok((mesh, missing))
}

/// Converts a 1-based (or negative, end-relative) OBJ index to 0-based.
fn resolve_index(index: i32, len: usize) -> Option<usize> {
    if index > 0 {
        let zero_based = index as usize - 1;
        (zero_based < len).then_some(zero_based)
    } else if index < 0 {
        let back = index.unsigned_abs() as usize;
        (back <= len).then(|| len - back)
    } else {
        None
    }
}

/// Fills the masked normals with the area-weighted average of adjacent face
/// normals.
fn smooth_missing_normals(mesh: &mut Mesh, missing: &[bool]) {
    let mut accum = vec![Vec3::ZERO; mesh.positions.len()];

    for triangle in mesh.indices.chunks_exact(3) {
        let [i0, i1, i2] = [triangle[0], triangle[1], triangle[2]].map(|i| i as usize);
        let p0 = mesh.positions[i0];
        let face = (mesh.positions[i1] - p0).cross(mesh.positions[i2] - p0);
        for i in [i0, i1, i2] {
            accum[i] += face;
        }
    }

    for ((normal, sum), &missing) in mesh.normals.iter_mut().zip(accum).zip(missing) {
        if missing {
            *normal = sum.normalize_or_zero();
        }
    }
}
