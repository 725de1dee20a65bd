//! Sensor and bus configuration
//!
//! Defaults match the rover's bring-up: MPU-9250 on address 0x68, DMP running
//! at 50 Hz, firmware load retried 7 times.

use fugit::{MicrosDurationU32, MillisDurationU32};

use crate::sensors::dmp::{
    DMP_FEATURE_6X_LP_QUAT, DMP_FEATURE_ANDROID_ORIENT, DMP_FEATURE_GYRO_CAL,
    DMP_FEATURE_SEND_CAL_GYRO, DMP_FEATURE_SEND_RAW_ACCEL, DMP_FEATURE_TAP, INV_XYZ_ACCEL,
    INV_XYZ_COMPASS, INV_XYZ_GYRO,
};
use crate::sensors::registers::{MPU9250_ADDRESS, MPU9250_WHO_AM_I_VALUE};

/// Timing of the I2C transaction sequencer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusTiming {
    /// Delay between issuing a controller command and the first busy poll.
    /// The controller needs a few cycles before its busy flag is observable.
    pub phase_delay: MicrosDurationU32,
    /// Upper bound on a single busy wait
    pub busy_timeout: MicrosDurationU32,
}

impl Default for BusTiming {
    fn default() -> Self {
        Self {
            phase_delay: MicrosDurationU32::micros(4),
            busy_timeout: MicrosDurationU32::millis(100),
        }
    }
}

/// MPU-9250 + DMP configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorConfig {
    /// 7-bit slave address (AD0 low)
    pub address: u8,
    /// Value WHO_AM_I must report
    pub expected_id: u8,
    /// `INV_XYZ_*` sensors to power up
    pub sensors: u8,
    /// `INV_XYZ_*` sensors pushed into the hardware FIFO
    pub fifo_sensors: u8,
    pub sample_rate_hz: u16,
    pub fifo_rate_hz: u16,
    /// Chip-to-body mounting matrix, row major
    pub orientation: [i8; 9],
    /// `DMP_FEATURE_*` bits
    pub dmp_features: u16,
    /// How many times the DMP image is pushed before bring-up gives up
    pub firmware_load_attempts: u8,
    /// Quiet time after a soft reset before the bus is used again
    pub reset_settle: MillisDurationU32,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            address: MPU9250_ADDRESS,
            expected_id: MPU9250_WHO_AM_I_VALUE,
            sensors: INV_XYZ_GYRO | INV_XYZ_ACCEL | INV_XYZ_COMPASS,
            fifo_sensors: INV_XYZ_ACCEL,
            sample_rate_hz: 50,
            fifo_rate_hz: 50,
            orientation: [-1, 0, 0, 0, -1, 0, 0, 0, 1],
            dmp_features: DMP_FEATURE_6X_LP_QUAT
                | DMP_FEATURE_TAP
                | DMP_FEATURE_ANDROID_ORIENT
                | DMP_FEATURE_SEND_RAW_ACCEL
                | DMP_FEATURE_SEND_CAL_GYRO
                | DMP_FEATURE_GYRO_CAL,
            firmware_load_attempts: 7,
            reset_settle: MillisDurationU32::millis(50),
        }
    }
}

impl SensorConfig {
    pub fn with_address(mut self, address: u8) -> Self {
        self.address = address;
        self
    }

    pub fn with_expected_id(mut self, id: u8) -> Self {
        self.expected_id = id;
        self
    }

    pub fn with_rates(mut self, sample_rate_hz: u16, fifo_rate_hz: u16) -> Self {
        self.sample_rate_hz = sample_rate_hz;
        self.fifo_rate_hz = fifo_rate_hz;
        self
    }

    pub fn with_orientation(mut self, orientation: [i8; 9]) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn with_dmp_features(mut self, features: u16) -> Self {
        self.dmp_features = features;
        self
    }

    pub fn with_firmware_load_attempts(mut self, attempts: u8) -> Self {
        self.firmware_load_attempts = attempts;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_rover_bring_up() {
        let config = SensorConfig::default();
        assert_eq!(config.address, 0x68);
        assert_eq!(config.expected_id, 0x71);
        assert_eq!(config.sample_rate_hz, 50);
        assert_eq!(config.fifo_rate_hz, 50);
        assert_eq!(config.firmware_load_attempts, 7);
        assert_eq!(config.reset_settle.to_millis(), 50);
    }

    #[test]
    fn bus_timing_defaults() {
        let timing = BusTiming::default();
        assert_eq!(timing.phase_delay.to_micros(), 4);
        assert_eq!(timing.busy_timeout.to_micros(), 100_000);
    }

    #[test]
    fn builders_override_fields() {
        let config = SensorConfig::default()
            .with_address(0x69)
            .with_rates(100, 25)
            .with_firmware_load_attempts(3);
        assert_eq!(config.address, 0x69);
        assert_eq!(config.sample_rate_hz, 100);
        assert_eq!(config.fifo_rate_hz, 25);
        assert_eq!(config.firmware_load_attempts, 3);
    }
}
