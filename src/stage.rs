//! Per-vertex transform and lighting.
//!
//! The stage is a pure function of one vertex's attributes and the uniform
//! set of the current draw call. It always produces a clip-space position and
//! colors the vertex under exactly one [`LightingMode`].

use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use glam::{Mat4, Vec3, Vec4};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::camera::Camera;

/// Attributes supplied for a single vertex.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VertexInput {
    /// Homogeneous object-space position, `w` normally 1.
    pub position: Vec4,
    /// RGBA color. Channels are not clamped.
    pub color: Vec4,
    /// Homogeneous object-space normal, `w` normally 0.
    pub normal: Vec4,
}

impl VertexInput {
    pub fn new(position: Vec4, color: Vec4, normal: Vec4) -> Self {
        Self {
            position,
            color,
            normal,
        }
    }

    /// Builds a vertex from a 3D point and direction, lifting them to `w = 1`
    /// and `w = 0` respectively.
    pub fn from_point(position: Vec3, color: Vec4, normal: Vec3) -> Self {
        Self {
            position: position.extend(1.0),
            color,
            normal: normal.extend(0.0),
        }
    }
}

/// Result of shading one vertex, handed on to primitive assembly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VertexOutput {
    pub clip_position: Vec4,
    pub shaded_color: Vec4,
}

/// Lighting model applied to every vertex of a draw call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LightingMode {
    /// Lambertian diffuse from a light infinitely far away.
    #[default]
    Directional,
    /// Lambertian diffuse from a point light plus an ambient term.
    Point,
    /// Input color passes through untouched.
    Unlit,
}

impl LightingMode {
    /// Converts the legacy pair of selector booleans into a mode.
    ///
    /// Directional lighting takes priority when both flags are set.
    pub fn from_flags(is_directional: bool, is_point: bool) -> Self {
        if is_directional {
            Self::Directional
        } else if is_point {
            Self::Point
        } else {
            Self::Unlit
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Directional => "directional",
            Self::Point => "point",
            Self::Unlit => "unlit",
        }
    }
}

impl fmt::Display for LightingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LightingMode {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "directional" => Ok(Self::Directional),
            "point" => Ok(Self::Point),
            "unlit" | "none" => Ok(Self::Unlit),
            other => Err(anyhow!(
                "unknown lighting mode: {other}. Expected directional, point or unlit"
            )),
        }
    }
}

/// Values shared read-only by every vertex of one draw call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Uniforms {
    pub model: Mat4,
    pub normal_matrix: Mat4,
    pub view: Mat4,
    pub proj: Mat4,
    pub light_color: Vec3,
    /// Unit direction towards the light, used by [`LightingMode::Directional`].
    pub light_direction: Vec3,
    /// World-space light position, used by [`LightingMode::Point`].
    pub light_position: Vec3,
    /// Ambient intensity, used by [`LightingMode::Point`].
    pub ambient_light: Vec3,
    pub mode: LightingMode,
}

impl Default for Uniforms {
    fn default() -> Self {
        Self::new(LightingMode::default())
    }
}

impl Uniforms {
    /// Identity transforms with a white light shining along (0.5, 3, 4).
    pub fn new(mode: LightingMode) -> Self {
        Self {
            model: Mat4::IDENTITY,
            normal_matrix: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            proj: Mat4::IDENTITY,
            light_color: Vec3::ONE,
            light_direction: default_light_direction(),
            light_position: Vec3::new(0.0, 10.0, 0.0),
            ambient_light: Vec3::splat(0.2),
            mode,
        }
    }

    /// Sets the model matrix and derives the matching normal matrix
    /// (inverse transpose of the model matrix).
    pub fn with_model(mut self, model: Mat4) -> Self {
        self.model = model;
        self.normal_matrix = normal_matrix(model);
        self
    }

    pub fn with_camera(mut self, camera: &Camera) -> Self {
        self.view = camera.view_matrix();
        self.proj = camera.projection_matrix();
        self
    }

    pub fn with_mode(mut self, mode: LightingMode) -> Self {
        self.mode = mode;
        self
    }
}

fn default_light_direction() -> Vec3 {
    Vec3::new(0.5, 3.0, 4.0).normalize()
}

/// Matrix that carries object-space normals into world space for `model`.
pub fn normal_matrix(model: Mat4) -> Mat4 {
    model.inverse().transpose()
}

/// Transforms one vertex and assigns its color.
pub fn shade_vertex(input: &VertexInput, uniforms: &Uniforms) -> VertexOutput {
    let clip_position = uniforms.proj * uniforms.view * uniforms.model * input.position;

    let color = input.color;
    let albedo = color.truncate();
    let unit_normal = (uniforms.normal_matrix * input.normal)
        .truncate()
        .normalize();

    let shaded_color = match uniforms.mode {
        LightingMode::Directional => {
            let n_dot_l = unit_normal.dot(uniforms.light_direction).max(0.0);
            let diffuse = uniforms.light_color * albedo * n_dot_l;
            diffuse.extend(color.w)
        }
        LightingMode::Point => {
            let world_position = uniforms.model * input.position;
            let light_dir = (uniforms.light_position - world_position.truncate()).normalize();
            let n_dot_l = light_dir.dot(unit_normal).max(0.0);
            let diffuse = uniforms.light_color * albedo * n_dot_l;
            let ambient = uniforms.ambient_light * albedo;
            (diffuse + ambient).extend(color.w)
        }
        LightingMode::Unlit => color,
    };

    VertexOutput {
        clip_position,
        shaded_color,
    }
}

/// Shades a whole vertex stream in parallel. Output order matches input order.
pub fn shade_vertices(inputs: &[VertexInput], uniforms: &Uniforms) -> Vec<VertexOutput> {
    inputs
        .par_iter()
        .map(|input| shade_vertex(input, uniforms))
        .collect()
}
