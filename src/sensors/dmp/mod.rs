//! Motion-processing firmware boundary
//!
//! [`MotionProcessor`] is what the data-ready pipeline drives: a bring-up
//! sequence followed by one `read_fifo` per interrupt. [`Mpu9250Dmp`] is the
//! register-level implementation for the MPU-9250's on-chip DMP.
//!
//! The processor never owns the bus. Every call borrows the caller's
//! [`RegisterBus`] so the same bus can be handed to the processor and the
//! driver in turn.

pub mod driver;

pub use driver::Mpu9250Dmp;

use crate::hal::RegisterBus;
use crate::sensors::error::DmpError;

// sensor masks, shared by `set_sensors`, `configure_fifo` and `FifoPacket::sensors`
pub const INV_X_GYRO: u8 = 0x40;
pub const INV_Y_GYRO: u8 = 0x20;
pub const INV_Z_GYRO: u8 = 0x10;
pub const INV_XYZ_GYRO: u8 = INV_X_GYRO | INV_Y_GYRO | INV_Z_GYRO;
pub const INV_XYZ_ACCEL: u8 = 0x08;
pub const INV_XYZ_COMPASS: u8 = 0x01;
/// Only ever reported in [`FifoPacket::sensors`]
pub const INV_WXYZ_QUAT: u16 = 0x100;

pub const DMP_FEATURE_TAP: u16 = 0x001;
pub const DMP_FEATURE_ANDROID_ORIENT: u16 = 0x002;
pub const DMP_FEATURE_LP_QUAT: u16 = 0x004;
pub const DMP_FEATURE_PEDOMETER: u16 = 0x008;
pub const DMP_FEATURE_6X_LP_QUAT: u16 = 0x010;
pub const DMP_FEATURE_GYRO_CAL: u16 = 0x020;
pub const DMP_FEATURE_SEND_RAW_ACCEL: u16 = 0x040;
pub const DMP_FEATURE_SEND_RAW_GYRO: u16 = 0x080;
pub const DMP_FEATURE_SEND_CAL_GYRO: u16 = 0x100;
pub const DMP_FEATURE_SEND_ANY_GYRO: u16 = DMP_FEATURE_SEND_RAW_GYRO | DMP_FEATURE_SEND_CAL_GYRO;

/// One record drained from the FIFO
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FifoPacket {
    pub gyro: [i16; 3],
    pub accel: [i16; 3],
    /// q30 fixed point, w, x, y, z
    pub quat: [i32; 4],
    /// Milliseconds of DMP output time
    pub timestamp: u32,
    /// Which fields were filled, `INV_*` bits
    pub sensors: u16,
    /// At least one more full packet is queued
    pub more: bool,
}

/// Black-box motion processor, driven in a fixed order during bring-up
///
/// `init` → `set_sensors` → `configure_fifo` → `set_sample_rate` →
/// `load_firmware` → `set_orientation` → `enable_feature` → `set_fifo_rate` →
/// `set_dmp_state(true)`
pub trait MotionProcessor<B: RegisterBus> {
    fn init(&mut self, bus: &mut B) -> Result<(), DmpError>;

    fn set_sensors(&mut self, bus: &mut B, sensors: u8) -> Result<(), DmpError>;

    fn configure_fifo(&mut self, bus: &mut B, sensors: u8) -> Result<(), DmpError>;

    fn set_sample_rate(&mut self, bus: &mut B, hz: u16) -> Result<(), DmpError>;

    /// Push the firmware image into DMP memory. May fail transiently; the
    /// caller decides how often to retry.
    fn load_firmware(&mut self, bus: &mut B) -> Result<(), DmpError>;

    /// `scalar` from [`orientation_matrix_to_scalar`]
    fn set_orientation(&mut self, bus: &mut B, scalar: u16) -> Result<(), DmpError>;

    fn enable_feature(&mut self, bus: &mut B, features: u16) -> Result<(), DmpError>;

    fn set_fifo_rate(&mut self, bus: &mut B, hz: u16) -> Result<(), DmpError>;

    fn set_dmp_state(&mut self, bus: &mut B, enable: bool) -> Result<(), DmpError>;

    /// Drain exactly one packet
    fn read_fifo(&mut self, bus: &mut B) -> Result<FifoPacket, DmpError>;
}

/// Encode one row of the mounting matrix: 0/1/2 for +X/+Y/+Z, 4/5/6 for the
/// negative axes, 7 when the row is all zero.
pub fn row_to_scale(row: &[i8]) -> u16 {
    match row {
        [x, ..] if *x > 0 => 0,
        [x, ..] if *x < 0 => 4,
        [_, y, ..] if *y > 0 => 1,
        [_, y, ..] if *y < 0 => 5,
        [_, _, z, ..] if *z > 0 => 2,
        [_, _, z, ..] if *z < 0 => 6,
        _ => 7,
    }
}

/// Chip-to-body matrix (row major) to the 9-bit scalar the DMP takes
pub fn orientation_matrix_to_scalar(matrix: &[i8; 9]) -> u16 {
    row_to_scale(&matrix[0..3]) | row_to_scale(&matrix[3..6]) << 3 | row_to_scale(&matrix[6..9]) << 6
}
