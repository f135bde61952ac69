//! Raw vertex buffers.
//!
//! A buffer is a tightly packed array of [`RawVertex`] records:
//! `position.xyzw`, `color.rgba`, `normal.xyzw`, all native-endian `f32`.

use bytemuck::{Pod, Zeroable};
use glam::Vec4;
use thiserror::Error;

use crate::stage::VertexInput;

/// Size in bytes of one packed vertex.
pub const VERTEX_STRIDE: usize = std::mem::size_of::<RawVertex>();
/// Number of `f32` values in one packed vertex.
pub const FLOATS_PER_VERTEX: usize = VERTEX_STRIDE / std::mem::size_of::<f32>();

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct RawVertex {
    pub position: [f32; 4],
    pub color: [f32; 4],
    pub normal: [f32; 4],
}

impl From<RawVertex> for VertexInput {
    fn from(raw: RawVertex) -> Self {
        VertexInput::new(
            Vec4::from_array(raw.position),
            Vec4::from_array(raw.color),
            Vec4::from_array(raw.normal),
        )
    }
}

impl From<VertexInput> for RawVertex {
    fn from(vertex: VertexInput) -> Self {
        Self {
            position: vertex.position.to_array(),
            color: vertex.color.to_array(),
            normal: vertex.normal.to_array(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BufferError {
    #[error("buffer length {len} is not a multiple of the {stride}-byte vertex stride")]
    Stride { len: usize, stride: usize },
    #[error("buffer of {len} floats does not hold whole 12-float vertices")]
    FloatCount { len: usize },
    #[error("buffer is not aligned for f32 access")]
    Misaligned,
}

/// Decodes a byte buffer into vertex attributes.
pub fn decode_vertices(bytes: &[u8]) -> Result<Vec<VertexInput>, BufferError> {
    if bytes.is_empty() {
        return Ok(Vec::new());
    }
    if bytes.len() % VERTEX_STRIDE != 0 {
        return Err(BufferError::Stride {
            len: bytes.len(),
            stride: VERTEX_STRIDE,
        });
    }
    let raw: &[RawVertex] = bytemuck::try_cast_slice(bytes).map_err(|err| match err {
        bytemuck::PodCastError::TargetAlignmentGreaterAndInputNotAligned => {
            BufferError::Misaligned
        }
        _ => BufferError::Stride {
            len: bytes.len(),
            stride: VERTEX_STRIDE,
        },
    })?;
    Ok(raw.iter().copied().map(VertexInput::from).collect())
}

/// Decodes an already typed `f32` buffer into vertex attributes.
pub fn decode_vertices_f32(floats: &[f32]) -> Result<Vec<VertexInput>, BufferError> {
    if floats.len() % FLOATS_PER_VERTEX != 0 {
        return Err(BufferError::FloatCount { len: floats.len() });
    }
    Ok(floats
        .chunks_exact(FLOATS_PER_VERTEX)
        .map(|chunk| {
            VertexInput::new(
                Vec4::from_slice(&chunk[0..4]),
                Vec4::from_slice(&chunk[4..8]),
                Vec4::from_slice(&chunk[8..12]),
            )
        })
        .collect())
}

/// Packs vertex attributes into a byte buffer readable by [`decode_vertices`].
pub fn encode_vertices(vertices: &[VertexInput]) -> Vec<u8> {
    let raw: Vec<RawVertex> = vertices.iter().copied().map(RawVertex::from).collect();
    bytemuck::cast_slice(&raw).to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<VertexInput> {
        vec![
            VertexInput::new(
                Vec4::new(0.0, 0.0, 0.0, 1.0),
                Vec4::new(1.0, 0.0, 0.0, 1.0),
                Vec4::new(0.0, 0.0, 1.0, 0.0),
            ),
            VertexInput::new(
                Vec4::new(1.0, 2.0, 3.0, 1.0),
                Vec4::new(0.5, 0.5, 0.5, 0.25),
                Vec4::new(0.0, 1.0, 0.0, 0.0),
            ),
        ]
    }

    #[test]
    fn stride_is_twelve_floats() {
        assert_eq!(VERTEX_STRIDE, 48);
        assert_eq!(FLOATS_PER_VERTEX, 12);
    }

    #[test]
    fn encoded_buffer_decodes_to_same_vertices() {
        let vertices = sample();
        let bytes = encode_vertices(&vertices);
        assert_eq!(bytes.len(), 2 * VERTEX_STRIDE);
        // Copy into f32 storage so the slice is aligned regardless of allocator.
        let floats: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        assert_eq!(decode_vertices(bytemuck::cast_slice(&floats)).unwrap(), vertices);
        assert_eq!(decode_vertices_f32(&floats).unwrap(), vertices);
    }

    #[test]
    fn truncated_buffer_is_rejected() {
        let floats = [0.0f32; 13];
        let err = decode_vertices(bytemuck::cast_slice(&floats)).unwrap_err();
        assert_eq!(err, BufferError::Stride { len: 52, stride: 48 });
        assert_eq!(
            decode_vertices_f32(&floats).unwrap_err(),
            BufferError::FloatCount { len: 13 }
        );
    }

    #[test]
    fn misaligned_buffer_is_rejected() {
        let floats = [0.0f32; 13];
        let bytes: &[u8] = bytemuck::cast_slice(&floats);
        let err = decode_vertices(&bytes[1..49]).unwrap_err();
        assert_eq!(err, BufferError::Misaligned);
    }

    #[test]
    fn empty_buffer_is_an_empty_stream() {
        assert!(decode_vertices(&[]).unwrap().is_empty());
    }
}
