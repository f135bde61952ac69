//! Per-vertex transform and lighting for a software rasterization pipeline.
//!
//! The core is [`stage::shade_vertex`]: a pure function taking one vertex's
//! attributes and the draw call's [`Uniforms`] to a clip-space position and a
//! color lit by a directional light, a point light, or not at all. The other
//! modules feed it: raw vertex buffers, meshes, cameras and scene files.
//! Rasterization itself is left to the caller.

pub mod buffer;
pub mod camera;
pub mod draw;
pub mod mesh;
pub mod obj;
pub mod scene;
pub mod stage;

pub use buffer::{decode_vertices, encode_vertices, BufferError, RawVertex};
pub use camera::{Camera, CameraMode};
pub use draw::{build_draw_calls, DrawCall, ShadedMesh};
pub use mesh::Mesh;
pub use obj::{load_obj, load_obj_from_str};
pub use scene::{LightSettings, Scene, SceneObject};
pub use stage::{
    shade_vertex, shade_vertices, LightingMode, Uniforms, VertexInput, VertexOutput,
};
