//! DMP quaternion to gravity / yaw-pitch-roll
//!
//! Same conventions as the InvenSense motion apps: gravity is expressed in the
//! sensor frame, yaw is about Z, and pitch is unwrapped when the sensor is
//! upside down so it covers the full -PI..PI range.

use libm::{atan2f, sqrtf};

use super::functions::PI;
use super::vector3::Vector3;

/// 1.0 in the DMP's q30 fixed point
const Q30: f32 = (1u32 << 30) as f32;

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Quaternion {
    pub w: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Quaternion {
    pub const IDENTITY: Self = Self {
        w: 1.0,
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(w: f32, x: f32, y: f32, z: f32) -> Self {
        Self { w, x, y, z }
    }

    /// From the DMP's q30 words, in w, x, y, z order
    pub fn from_q30(quat: [i32; 4]) -> Self {
        Self::new(
            quat[0] as f32 / Q30,
            quat[1] as f32 / Q30,
            quat[2] as f32 / Q30,
            quat[3] as f32 / Q30,
        )
    }

    pub fn magnitude(&self) -> f32 {
        sqrtf(self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z)
    }

    /// Unit quaternion; a zero quaternion maps to identity
    pub fn normalized(&self) -> Self {
        let m = self.magnitude();
        if m == 0.0 {
            return Self::IDENTITY;
        }
        Self::new(self.w / m, self.x / m, self.y / m, self.z / m)
    }

    /// Direction of gravity in the sensor frame
    pub fn gravity(&self) -> Vector3<f32> {
        let q = self;
        Vector3::new(
            2.0 * (q.x * q.z - q.w * q.y),
            2.0 * (q.w * q.x + q.y * q.z),
            q.w * q.w - q.x * q.x - q.y * q.y + q.z * q.z,
        )
    }

    /// `[yaw, pitch, roll]` in radians
    pub fn yaw_pitch_roll(&self, gravity: &Vector3<f32>) -> [f32; 3] {
        let q = self;
        let g = gravity;
        let yaw = atan2f(
            2.0 * q.x * q.y - 2.0 * q.w * q.z,
            2.0 * q.w * q.w + 2.0 * q.x * q.x - 1.0,
        );
        let mut pitch = atan2f(g.x, sqrtf(g.y * g.y + g.z * g.z));
        let roll = atan2f(g.y, g.z);
        if g.z < 0.0 {
            pitch = if pitch > 0.0 {
                PI as f32 - pitch
            } else {
                -(PI as f32) - pitch
            };
        }
        [yaw, pitch, roll]
    }

    pub fn to_array(&self) -> [f32; 4] {
        [self.w, self.x, self.y, self.z]
    }
}
