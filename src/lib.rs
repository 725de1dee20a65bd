#![cfg_attr(not(test), no_std)]

//! rover_imu - interrupt-driven MPU-9250 / DMP sensor pipeline
//!
//! The crate is split the same way the hardware is:
//! - [`hal`]: the boundary to the bus controller, the data-ready pin and the
//!   clock, plus the I2C transaction sequencer built on top of them
//! - [`sensors`]: the motion-processor interface, the register-level DMP
//!   driver, the sensor session and the data-ready pipeline
//! - [`math`]: quaternion and vector helpers

#[macro_use]
pub mod logging;

pub mod config;
pub mod hal;
pub mod math;
pub mod sensors;

#[cfg(feature = "rp2040")]
pub mod board;

pub use config::{BusTiming, SensorConfig};
pub use sensors::error::{DmpError, I2cError, InitError, SensorError};
pub use sensors::mpu9250::{InterruptOutcome, Mpu9250, PipelineState};
pub use sensors::session::{Sample, SensorClass, SensorSession};
