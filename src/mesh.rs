use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::stage::VertexInput;

/// Indexed triangle mesh with one normal per vertex.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Mesh {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub indices: Vec<u32>,
}

impl Mesh {
    /// Axis-aligned cube of edge length 1 centred on the origin.
    ///
    /// Each face has its own four vertices so normals stay flat per face.
    pub fn unit_cube() -> Self {
        let positions = CUBE_POSITIONS.iter().map(|p| Vec3::from_array(*p)).collect();
        let normals = CUBE_FACE_NORMALS
            .iter()
            .flat_map(|n| std::iter::repeat(Vec3::from_array(*n)).take(4))
            .collect();
        let indices = (0..6u32)
            .flat_map(|face| {
                let base = face * 4;
                [base, base + 1, base + 2, base, base + 2, base + 3]
            })
            .collect();
        Self {
            positions,
            normals,
            indices,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Attribute stream for the mesh with every vertex painted `color`.
    pub fn vertex_stream(&self, color: Vec4) -> Vec<VertexInput> {
        self.positions
            .iter()
            .zip(self.normals.iter())
            .map(|(position, normal)| VertexInput::from_point(*position, color, *normal))
            .collect()
    }
}

const CUBE_POSITIONS: [[f32; 3]; 24] = [
    // front
    [0.5, 0.5, 0.5],
    [-0.5, 0.5, 0.5],
    [-0.5, -0.5, 0.5],
    [0.5, -0.5, 0.5],
    // right
    [0.5, 0.5, 0.5],
    [0.5, -0.5, 0.5],
    [0.5, -0.5, -0.5],
    [0.5, 0.5, -0.5],
    // up
    [0.5, 0.5, 0.5],
    [0.5, 0.5, -0.5],
    [-0.5, 0.5, -0.5],
    [-0.5, 0.5, 0.5],
    // left
    [-0.5, 0.5, 0.5],
    [-0.5, 0.5, -0.5],
    [-0.5, -0.5, -0.5],
    [-0.5, -0.5, 0.5],
    // down
    [-0.5, -0.5, -0.5],
    [0.5, -0.5, -0.5],
    [0.5, -0.5, 0.5],
    [-0.5, -0.5, 0.5],
    // back
    [0.5, -0.5, -0.5],
    [-0.5, -0.5, -0.5],
    [-0.5, 0.5, -0.5],
    [0.5, 0.5, -0.5],
];

const CUBE_FACE_NORMALS: [[f32; 3]; 6] = [
    [0.0, 0.0, 1.0],
    [1.0, 0.0, 0.0],
    [0.0, 1.0, 0.0],
    [-1.0, 0.0, 0.0],
    [0.0, -1.0, 0.0],
    [0.0, 0.0, -1.0],
];
