use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use glam::Vec4;
use log::debug;

use crate::mesh::Mesh;
use crate::obj::load_obj;
use crate::scene::{Scene, SceneObject};
use crate::stage::{shade_vertices, Uniforms, VertexOutput};

/// One mesh drawn with one uniform set.
#[derive(Debug, Clone)]
pub struct DrawCall {
    pub name: String,
    pub mesh: Arc<Mesh>,
    pub color: Vec4,
    pub uniforms: Uniforms,
}

/// Shaded vertices plus the triangle list that assembles them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ShadedMesh {
    pub vertices: Vec<VertexOutput>,
    pub indices: Vec<u32>,
}

impl DrawCall {
    pub fn new(name: impl Into<String>, mesh: Arc<Mesh>, color: Vec4, uniforms: Uniforms) -> Self {
        Self {
            name: name.into(),
            mesh,
            color,
            uniforms,
        }
    }

    /// Runs the vertex stage over every vertex of the mesh.
    pub fn execute(&self) -> ShadedMesh {
        let inputs = self.mesh.vertex_stream(self.color);
        let vertices = shade_vertices(&inputs, &self.uniforms);
        debug!(
            "{}: shaded {} vertices ({})",
            self.name,
            vertices.len(),
            self.uniforms.mode
        );
        ShadedMesh {
            vertices,
            indices: self.mesh.indices.clone(),
        }
    }
}

impl ShadedMesh {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Mean shaded color, or transparent black for an empty mesh.
    pub fn average_color(&self) -> Vec4 {
        if self.vertices.is_empty() {
            return Vec4::ZERO;
        }
        let sum: Vec4 = self.vertices.iter().map(|v| v.shaded_color).sum();
        sum / self.vertices.len() as f32
    }

    /// Clip-space corners of each triangle, in index order.
    pub fn triangles(&self) -> impl Iterator<Item = [&VertexOutput; 3]> + '_ {
        let vertices = self.vertices.as_slice();
        self.indices.chunks_exact(3).filter_map(move |tri| {
            Some([
                vertices.get(tri[0] as usize)?,
                vertices.get(tri[1] as usize)?,
                vertices.get(tri[2] as usize)?,
            ])
        })
    }
}

/// Builds one draw call per scene object.
///
/// OBJ paths resolve against `base_dir`; each distinct mesh is loaded once.
pub fn build_draw_calls(scene: &Scene, base_dir: &Path) -> Result<Vec<DrawCall>> {
    let camera = scene.effective_camera();
    let mut meshes: HashMap<String, Arc<Mesh>> = HashMap::new();
    let mut calls = Vec::with_capacity(scene.objects.len());

    for object in &scene.objects {
        let mesh = match meshes.get(&object.mesh) {
            Some(mesh) => Arc::clone(mesh),
            None => {
                let mesh = Arc::new(resolve_mesh(object, base_dir)?);
                meshes.insert(object.mesh.clone(), Arc::clone(&mesh));
                mesh
            }
        };
        let uniforms = scene.uniforms_with_camera(object, &camera);
        calls.push(DrawCall::new(object.name.clone(), mesh, object.color, uniforms));
    }

    Ok(calls)
}

fn resolve_mesh(object: &SceneObject, base_dir: &Path) -> Result<Mesh> {
    if object.uses_builtin_cube() {
        return Ok(Mesh::unit_cube());
    }
    let path = base_dir.join(&object.mesh);
    load_obj(&path).with_context(|| format!("failed to load mesh for {}", object.name))
}
