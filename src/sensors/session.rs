//! Sensor session: the latch between the data-ready interrupt and the main loop
//!
//! The interrupt handler is the only writer, the main loop the only reader.
//! Both go through one `critical_section::Mutex`, so every access is atomic
//! with respect to the other side: a reader sees either the previous sample or
//! the new one, never a mix.
//!
//! # Latch semantics
//!
//! - Publishing stores the sample and raises the data-ready flag, in that order
//! - The flag stays up until the consumer clears it ([`SensorSession::take_sample`]
//!   or [`SensorSession::clear_data_ready`]); polling never clears it
//! - A sample published while the flag is still up replaces the unread one and
//!   is counted in [`SessionStats::overwritten`]
//!
//! # Usage
//!
//! ```ignore
//! static SESSION: SensorSession = SensorSession::new();
//!
//! loop {
//!     if let Some(sample) = SESSION.take_sample() {
//!         steer(sample.ypr);
//!     }
//! }
//! ```

use core::cell::RefCell;

use critical_section::Mutex;

use crate::math::{Quaternion, Vector3};

/// Kind of data handed to a data hook
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum SensorClass {
    /// `[yaw, pitch, roll, qw, qx, qy, qz, gx, gy, gz, dt]`
    Orientation = 0,
}

/// One decoded FIFO record
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Sample {
    /// Yaw, pitch, roll in radians
    pub ypr: [f32; 3],
    pub quaternion: Quaternion,
    /// Gravity direction in the sensor frame
    pub gravity: Vector3<f32>,
    /// Seconds since the previous sample, 0 for the first one
    pub dt: f32,
    pub accel: [i16; 3],
    pub gyro: [i16; 3],
    /// DMP output time, milliseconds
    pub timestamp: u32,
}

impl Sample {
    pub const EMPTY: Self = Self {
        ypr: [0.0; 3],
        quaternion: Quaternion::IDENTITY,
        gravity: Vector3::ZERO,
        dt: 0.0,
        accel: [0; 3],
        gyro: [0; 3],
        timestamp: 0,
    };

    /// Flattened layout passed to data hooks, see [`SensorClass::Orientation`]
    pub fn to_array(&self) -> [f32; 11] {
        let q = &self.quaternion;
        let g = &self.gravity;
        [
            self.ypr[0], self.ypr[1], self.ypr[2], q.w, q.x, q.y, q.z, g.x, g.y, g.z, self.dt,
        ]
    }
}

impl Default for Sample {
    fn default() -> Self {
        Self::EMPTY
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SessionStats {
    pub published: u32,
    /// Samples replaced before the consumer read them
    pub overwritten: u32,
    /// Interrupts that left more packets queued than were drained
    pub backlog_dropped: u32,
}

struct Latch {
    sample: Sample,
    ready: bool,
    stats: SessionStats,
}

pub struct SensorSession {
    latch: Mutex<RefCell<Latch>>,
}

impl Default for SensorSession {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorSession {
    pub const fn new() -> Self {
        Self {
            latch: Mutex::new(RefCell::new(Latch {
                sample: Sample::EMPTY,
                ready: false,
                stats: SessionStats {
                    published: 0,
                    overwritten: 0,
                    backlog_dropped: 0,
                },
            })),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut Latch) -> R) -> R {
        critical_section::with(|cs| f(&mut self.latch.borrow_ref_mut(cs)))
    }

    /// Non-destructive; calling it any number of times changes nothing
    pub fn is_data_ready(&self) -> bool {
        self.with(|latch| latch.ready)
    }

    /// Latched sample if the flag is up, flag left as is
    pub fn sample(&self) -> Option<Sample> {
        self.with(|latch| latch.ready.then_some(latch.sample))
    }

    /// Latched sample if the flag is up, clearing the flag in the same
    /// critical section
    pub fn take_sample(&self) -> Option<Sample> {
        self.with(|latch| {
            if latch.ready {
                latch.ready = false;
                Some(latch.sample)
            } else {
                None
            }
        })
    }

    pub fn clear_data_ready(&self) {
        self.with(|latch| latch.ready = false);
    }

    /// Most recent sample regardless of the flag
    pub fn last_sample(&self) -> Sample {
        self.with(|latch| latch.sample)
    }

    pub fn stats(&self) -> SessionStats {
        self.with(|latch| latch.stats)
    }

    pub(crate) fn publish(&self, sample: Sample) {
        self.with(|latch| {
            if latch.ready {
                latch.stats.overwritten = latch.stats.overwritten.wrapping_add(1);
            }
            latch.sample = sample;
            latch.stats.published = latch.stats.published.wrapping_add(1);
            latch.ready = true;
        });
    }

    pub(crate) fn record_backlog(&self) {
        self.with(|latch| {
            latch.stats.backlog_dropped = latch.stats.backlog_dropped.wrapping_add(1)
        });
    }
}
