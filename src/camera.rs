use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// Look-at camera with a perspective projection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y_degrees: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            eye: Vec3::new(0.0, 50.0, 100.0),
            target: Vec3::ZERO,
            up: Vec3::new(0.0, 1.0, -10.0),
            fov_y_degrees: 30.0,
            aspect: 4.0 / 3.0,
            near: 1.0,
            far: 1500.0,
        }
    }
}

impl Camera {
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }

    /// OpenGL-style projection: depth maps to `[-w, w]` in clip space.
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh_gl(
            self.fov_y_degrees.to_radians(),
            self.aspect,
            self.near,
            self.far,
        )
    }

    pub fn view_proj(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }
}

/// Viewpoint relative to a moving subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraMode {
    /// Fixed camera, ignores the subject.
    #[default]
    Static,
    /// Overhead camera sliding along X with the subject.
    Follow,
    /// Behind and above the subject, looking along its heading.
    ThirdPerson,
    /// At the subject's driving position.
    FirstPerson,
}

impl CameraMode {
    pub const ALL: [CameraMode; 4] = [
        CameraMode::Static,
        CameraMode::Follow,
        CameraMode::ThirdPerson,
        CameraMode::FirstPerson,
    ];

    /// The mode after this one, wrapping back to `Static`.
    pub fn next(self) -> Self {
        match self {
            Self::Static => Self::Follow,
            Self::Follow => Self::ThirdPerson,
            Self::ThirdPerson => Self::FirstPerson,
            Self::FirstPerson => Self::Static,
        }
    }

    /// Places `base` for a subject at `subject` heading `yaw_degrees` about +Y.
    ///
    /// Projection parameters are always taken from `base`.
    pub fn camera_for(self, subject: Vec3, yaw_degrees: f32, base: &Camera) -> Camera {
        let heading = (yaw_degrees + 90.0).to_radians();
        let (sin, cos) = heading.sin_cos();
        let mut camera = *base;
        match self {
            Self::Static => {}
            Self::Follow => {
                camera.eye = Vec3::new(subject.x, base.eye.y, base.eye.z);
                camera.target = Vec3::new(subject.x, 0.0, subject.z);
            }
            Self::ThirdPerson => {
                camera.eye = Vec3::new(subject.x + 15.0 * sin, 5.0, subject.z + 15.0 * cos);
                camera.target = Vec3::new(subject.x, 2.0, subject.z);
                camera.up = Vec3::new(sin, 1.0, cos);
            }
            Self::FirstPerson => {
                camera.eye = Vec3::new(subject.x - sin, 1.0, subject.z - cos);
                camera.target = Vec3::new(subject.x - 15.0 * sin, 1.0, subject.z - 15.0 * cos);
                camera.up = Vec3::new(sin, 1.0, cos);
            }
        }
        camera
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Follow => "follow",
            Self::ThirdPerson => "third_person",
            Self::FirstPerson => "first_person",
        }
    }
}

impl fmt::Display for CameraMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CameraMode {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        let normalized = value.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str() == normalized)
            .ok_or_else(|| anyhow!("unknown camera mode: {value}"))
    }
}
