//! Register-level DMP driver for the MPU-9250
//!
//! DMP memory is 16 banks of 256 bytes, reached through BANK_SEL /
//! MEM_START_ADDR and streamed through MEM_R_W. Firmware configuration lives at
//! fixed memory keys inside the loaded image.

use heapless::Vec;

use super::*;
use crate::hal::RegisterBus;
use crate::math::Vector3;
use crate::sensors::error::DmpError;
use crate::sensors::registers::*;

// memory keys of the motion driver image
const FCFG_1: u16 = 1062;
const FCFG_2: u16 = 1066;
const FCFG_3: u16 = 1088;
const FCFG_7: u16 = 1073;
const CFG_LP_QUAT: u16 = 2712;
const CFG_8: u16 = 2718;
const CFG_15: u16 = 2727;
const CFG_20: u16 = 2224;
const CFG_MOTION_BIAS: u16 = 1208;
const CFG_ANDROID_ORIENT_INT: u16 = 1853;
const D_0_22: u16 = 534;

const DMP_SAMPLE_RATE: u16 = 200;

const GYRO_AXES: [u8; 3] = [0x4C, 0xCD, 0x6C];
const ACCEL_AXES: [u8; 3] = [0x0C, 0xC9, 0x2C];
const GYRO_SIGN: [u8; 3] = [0x36, 0x56, 0x76];
const ACCEL_SIGN: [u8; 3] = [0x26, 0x46, 0x66];

// |q|^2 in q28 must stay within this window of 1.0
const QUAT_ERROR_THRESH: i64 = 1 << 24;
const QUAT_MAG_SQ_NORMALIZED: i64 = 1 << 28;

/// Largest FIFO packet the feature set can produce
pub const MAX_PACKET_LENGTH: usize = 32;

pub struct Mpu9250Dmp<'fw> {
    firmware: &'fw [u8],
    address: u8,
    compass: bool,
    sensors: u8,
    fifo_sensors: u8,
    sample_rate: u16,
    /// Rate requested before the DMP took over the sample divider
    user_rate: u16,
    fifo_rate: u16,
    features: u16,
    packet_length: usize,
    loaded: bool,
    enabled: bool,
    timestamp: u32,
}

impl<'fw> Mpu9250Dmp<'fw> {
    pub fn new(firmware: &'fw [u8]) -> Self {
        Self::with_address(firmware, MPU9250_ADDRESS)
    }

    pub fn with_address(firmware: &'fw [u8], address: u8) -> Self {
        Self {
            firmware,
            address,
            compass: false,
            sensors: 0,
            fifo_sensors: 0,
            sample_rate: 0,
            user_rate: 0,
            fifo_rate: 0,
            features: 0,
            packet_length: 0,
            loaded: false,
            enabled: false,
            timestamp: 0,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn packet_length(&self) -> usize {
        self.packet_length
    }

    pub fn features(&self) -> u16 {
        self.features
    }

    /// Effective sensor sample rate after divider rounding. The DMP runs the
    /// sensors at 200 Hz while it is enabled.
    pub fn sample_rate(&self) -> u16 {
        self.sample_rate
    }

    pub fn fifo_rate(&self) -> u16 {
        self.fifo_rate
    }

    fn write_sample_rate<B: RegisterBus>(&mut self, bus: &mut B, hz: u16) -> Result<(), DmpError> {
        let div = (1000 / hz - 1) as u8;
        bus.write_byte(self.address, SMPLRT_DIV, div)?;
        self.sample_rate = 1000 / (div as u16 + 1);
        Ok(())
    }

    fn set_memory_address<B: RegisterBus>(&self, bus: &mut B, address: u16) -> Result<(), DmpError> {
        let [bank, offset] = address.to_be_bytes();
        bus.write_bytes(self.address, BANK_SEL, &[bank, offset])?;
        Ok(())
    }

    fn check_memory_range(address: u16, len: usize) -> Result<(), DmpError> {
        let offset = (address as usize) % DMP_BANK_SIZE;
        if len == 0 || offset + len > DMP_BANK_SIZE || address as usize + len > DMP_MEMORY_SIZE {
            return Err(DmpError::Unsupported);
        }
        Ok(())
    }

    /// Write `data` at `address`; must not cross a bank boundary
    fn write_memory<B: RegisterBus>(&self, bus: &mut B, address: u16, data: &[u8]) -> Result<(), DmpError> {
        Self::check_memory_range(address, data.len())?;
        self.set_memory_address(bus, address)?;
        bus.write_bytes(self.address, MEM_R_W, data)?;
        Ok(())
    }

    fn read_memory<B: RegisterBus>(&self, bus: &mut B, address: u16, data: &mut [u8]) -> Result<(), DmpError> {
        Self::check_memory_range(address, data.len())?;
        self.set_memory_address(bus, address)?;
        bus.read_bytes(self.address, MEM_R_W, data)?;
        Ok(())
    }

    fn reset_fifo<B: RegisterBus>(&self, bus: &mut B) -> Result<(), DmpError> {
        let a = self.address;
        bus.write_byte(a, INT_ENABLE, 0)?;
        bus.write_byte(a, FIFO_EN, 0)?;
        bus.write_byte(a, USER_CTRL, 0)?;
        if self.enabled {
            bus.write_byte(a, USER_CTRL, USER_CTRL_FIFO_RST | USER_CTRL_DMP_RST)?;
            bus.write_byte(a, USER_CTRL, USER_CTRL_DMP_EN | USER_CTRL_FIFO_EN)?;
            bus.write_byte(a, INT_ENABLE, INT_ENABLE_DMP)?;
        } else {
            bus.write_byte(a, USER_CTRL, USER_CTRL_FIFO_RST)?;
            if self.fifo_sensors != 0 {
                bus.write_byte(a, USER_CTRL, USER_CTRL_FIFO_EN)?;
            }
            bus.write_byte(a, FIFO_EN, self.fifo_sensors)?;
        }
        Ok(())
    }

    fn fifo_count<B: RegisterBus>(&self, bus: &mut B) -> Result<u16, DmpError> {
        let mut count = [0u8; 2];
        bus.read_bytes(self.address, FIFO_COUNTH, &mut count)?;
        Ok(u16::from_be_bytes(count))
    }

    fn update_packet_length(&mut self) {
        let f = self.features;
        let mut len = 0;
        if f & DMP_FEATURE_SEND_RAW_ACCEL != 0 {
            len += 6;
        }
        if f & DMP_FEATURE_SEND_ANY_GYRO != 0 {
            len += 6;
        }
        if f & (DMP_FEATURE_LP_QUAT | DMP_FEATURE_6X_LP_QUAT) != 0 {
            len += 16;
        }
        if f & (DMP_FEATURE_ANDROID_ORIENT | DMP_FEATURE_TAP) != 0 {
            len += 4;
        }
        self.packet_length = len;
    }

    fn axes(raw: &[u8]) -> Result<[i16; 3], DmpError> {
        let bytes: &[u8; 6] = raw
            .get(..6)
            .and_then(|b| b.try_into().ok())
            .ok_or(DmpError::CorruptPacket)?;
        Ok(Vector3::from_be_bytes(bytes).to_array())
    }

    fn parse_packet(&self, raw: &[u8]) -> Result<FifoPacket, DmpError> {
        let mut packet = FifoPacket::default();
        let mut i = 0;

        if self.features & (DMP_FEATURE_LP_QUAT | DMP_FEATURE_6X_LP_QUAT) != 0 {
            for q in packet.quat.iter_mut() {
                *q = i32::from_be_bytes([raw[i], raw[i + 1], raw[i + 2], raw[i + 3]]);
                i += 4;
            }
            // sanity check in q28 to catch a FIFO that slipped out of alignment
            let mag_sq: i64 = packet
                .quat
                .iter()
                .map(|q| {
                    let q14 = (*q >> 16) as i64;
                    q14 * q14
                })
                .sum();
            if mag_sq < QUAT_MAG_SQ_NORMALIZED - QUAT_ERROR_THRESH
                || mag_sq > QUAT_MAG_SQ_NORMALIZED + QUAT_ERROR_THRESH
            {
                return Err(DmpError::CorruptPacket);
            }
            packet.sensors |= INV_WXYZ_QUAT;
        }

        if self.features & DMP_FEATURE_SEND_RAW_ACCEL != 0 {
            packet.accel = Self::axes(&raw[i..])?;
            i += 6;
            packet.sensors |= INV_XYZ_ACCEL as u16;
        }

        if self.features & DMP_FEATURE_SEND_ANY_GYRO != 0 {
            packet.gyro = Self::axes(&raw[i..])?;
            packet.sensors |= INV_XYZ_GYRO as u16;
        }

        // trailing 4 bytes are tap / orientation gestures, not reported
        Ok(packet)
    }
}

impl<'fw, B: RegisterBus> MotionProcessor<B> for Mpu9250Dmp<'fw> {
    fn init(&mut self, bus: &mut B) -> Result<(), DmpError> {
        let a = self.address;
        bus.write_byte(a, PWR_MGMT_1, PWR_MGMT_1_RESET)?;
        bus.delay_ms(100);
        bus.write_byte(a, PWR_MGMT_1, PWR_MGMT_1_CLK_PLL)?;

        bus.write_byte(a, GYRO_CONFIG, GYRO_FSR_2000DPS)?;
        bus.write_byte(a, ACCEL_CONFIG, ACCEL_FSR_2G)?;
        bus.write_byte(a, CONFIG, DLPF_42HZ)?;
        bus.write_byte(a, ACCEL_CONFIG_2, DLPF_42HZ)?;
        bus.write_byte(a, INT_ENABLE, 0)?;
        // falling edge on data ready, bypass so the compass is reachable
        bus.write_byte(
            a,
            INT_PIN_CFG,
            INT_PIN_CFG_ACTL | INT_PIN_CFG_ANYRD_2CLEAR | INT_PIN_CFG_BYPASS_EN,
        )?;

        self.compass = match bus.read_byte(AK8963_ADDRESS, AK8963_WIA) {
            Ok(AK8963_WIA_VALUE) => true,
            Ok(id) => {
                log_warn!("unexpected AK8963 id {:#x}", id);
                false
            }
            Err(e) => {
                log_warn!("AK8963 not answering: {:?}", e);
                false
            }
        };

        self.loaded = false;
        self.enabled = false;
        self.sensors = INV_XYZ_GYRO | INV_XYZ_ACCEL;
        self.fifo_sensors = 0;
        self.features = 0;
        self.packet_length = 0;
        log_debug!("mpu init done, compass {}", self.compass);
        Ok(())
    }

    fn set_sensors(&mut self, bus: &mut B, sensors: u8) -> Result<(), DmpError> {
        if sensors & INV_XYZ_COMPASS != 0 && !self.compass {
            return Err(DmpError::Unsupported);
        }
        let mut standby = 0;
        if sensors & INV_XYZ_ACCEL == 0 {
            standby |= PWR_MGMT_2_DISABLE_ACCEL;
        }
        // PWR_MGMT_2 gyro standby bits are the gyro mask shifted down
        standby |= (!sensors & INV_XYZ_GYRO) >> 4;
        bus.write_byte(self.address, PWR_MGMT_2, standby)?;

        if self.compass {
            let mode = if sensors & INV_XYZ_COMPASS != 0 {
                AK8963_CONTINUOUS_100HZ
            } else {
                AK8963_POWER_DOWN
            };
            bus.write_byte(AK8963_ADDRESS, AK8963_CNTL1, mode)?;
        }
        self.sensors = sensors;
        Ok(())
    }

    fn configure_fifo(&mut self, bus: &mut B, sensors: u8) -> Result<(), DmpError> {
        let fifo = sensors & !INV_XYZ_COMPASS;
        if fifo & !self.sensors != 0 {
            return Err(DmpError::Unsupported);
        }
        self.fifo_sensors = fifo;
        // FIFO_EN bit positions match the sensor mask
        self.reset_fifo(bus)
    }

    fn set_sample_rate(&mut self, bus: &mut B, hz: u16) -> Result<(), DmpError> {
        if !(4..=1000).contains(&hz) {
            return Err(DmpError::InvalidRate(hz));
        }
        if self.enabled {
            return Err(DmpError::Unsupported);
        }
        self.write_sample_rate(bus, hz)?;
        self.user_rate = self.sample_rate;
        Ok(())
    }

    fn load_firmware(&mut self, bus: &mut B) -> Result<(), DmpError> {
        if self.firmware.is_empty() || self.firmware.len() > DMP_MEMORY_SIZE {
            return Err(DmpError::NoFirmware);
        }
        self.loaded = false;

        let mut readback = [0u8; DMP_CHUNK_SIZE];
        for (n, chunk) in self.firmware.chunks(DMP_CHUNK_SIZE).enumerate() {
            let address = (n * DMP_CHUNK_SIZE) as u16;
            self.write_memory(bus, address, chunk)?;
            let readback = &mut readback[..chunk.len()];
            self.read_memory(bus, address, readback)?;
            if readback != chunk {
                let [bank, offset] = address.to_be_bytes();
                return Err(DmpError::VerifyFailed { bank, offset });
            }
        }

        bus.write_bytes(self.address, PRGM_START_H, &DMP_START_ADDRESS.to_be_bytes())?;
        self.loaded = true;
        log_info!("DMP image loaded, {} bytes", self.firmware.len());
        Ok(())
    }

    fn set_orientation(&mut self, bus: &mut B, scalar: u16) -> Result<(), DmpError> {
        if !self.loaded {
            return Err(DmpError::NotLoaded);
        }
        let mut gyro_axes = [0u8; 3];
        let mut accel_axes = [0u8; 3];
        let mut gyro_sign = GYRO_SIGN;
        let mut accel_sign = ACCEL_SIGN;
        for row in 0..3 {
            let code = (scalar >> (3 * row)) & 0x7;
            if code & 0x3 == 0x3 {
                return Err(DmpError::Unsupported);
            }
            gyro_axes[row] = GYRO_AXES[(code & 0x3) as usize];
            accel_axes[row] = ACCEL_AXES[(code & 0x3) as usize];
            if code & 0x4 != 0 {
                gyro_sign[row] |= 1;
                accel_sign[row] |= 1;
            }
        }

        self.write_memory(bus, FCFG_1, &gyro_axes)?;
        self.write_memory(bus, FCFG_2, &accel_axes)?;
        self.write_memory(bus, FCFG_3, &gyro_sign)?;
        self.write_memory(bus, FCFG_7, &accel_sign)?;
        Ok(())
    }

    fn enable_feature(&mut self, bus: &mut B, features: u16) -> Result<(), DmpError> {
        if !self.loaded {
            return Err(DmpError::NotLoaded);
        }
        if features & DMP_FEATURE_LP_QUAT != 0 && features & DMP_FEATURE_6X_LP_QUAT != 0 {
            return Err(DmpError::Unsupported);
        }
        if features & DMP_FEATURE_PEDOMETER != 0 {
            log_warn!("pedometer is not supported, ignoring");
        }
        let on = |f: u16| features & f != 0;

        let mut send = [0xA3u8; 10];
        if on(DMP_FEATURE_SEND_RAW_ACCEL) {
            send[1..4].copy_from_slice(&[0xC0, 0xC8, 0xC2]);
        }
        if on(DMP_FEATURE_SEND_ANY_GYRO) {
            send[4..7].copy_from_slice(&[0xC4, 0xCC, 0xC6]);
        }
        self.write_memory(bus, CFG_15, &send)?;

        let bias: [u8; 9] = if on(DMP_FEATURE_GYRO_CAL) {
            [0xB8, 0xAA, 0xB3, 0x8D, 0xB4, 0x98, 0x0D, 0x35, 0x5D]
        } else {
            [0xB8, 0xAA, 0xAA, 0xAA, 0xB0, 0x88, 0xC3, 0xC5, 0xC7]
        };
        self.write_memory(bus, CFG_MOTION_BIAS, &bias)?;

        let lp_quat: [u8; 4] = if on(DMP_FEATURE_LP_QUAT) {
            [0xC0, 0xC2, 0xC4, 0xC6]
        } else {
            [0x8B; 4]
        };
        self.write_memory(bus, CFG_LP_QUAT, &lp_quat)?;

        let quat6: [u8; 4] = if on(DMP_FEATURE_6X_LP_QUAT) {
            [0x20, 0x28, 0x30, 0x38]
        } else {
            [0xA3; 4]
        };
        self.write_memory(bus, CFG_8, &quat6)?;

        let tap: u8 = if on(DMP_FEATURE_TAP) { 0xF8 } else { 0xD8 };
        self.write_memory(bus, CFG_20, &[tap])?;

        let orient: u8 = if on(DMP_FEATURE_ANDROID_ORIENT) { 0xD9 } else { 0xD8 };
        self.write_memory(bus, CFG_ANDROID_ORIENT_INT, &[orient])?;

        self.features = features & !DMP_FEATURE_PEDOMETER;
        self.update_packet_length();
        log_debug!(
            "DMP features {:#x}, packet {} bytes",
            self.features,
            self.packet_length
        );
        self.reset_fifo(bus)
    }

    fn set_fifo_rate(&mut self, bus: &mut B, hz: u16) -> Result<(), DmpError> {
        if hz == 0 || hz > DMP_SAMPLE_RATE {
            return Err(DmpError::InvalidRate(hz));
        }
        if !self.loaded {
            return Err(DmpError::NotLoaded);
        }
        let div = DMP_SAMPLE_RATE / hz - 1;
        self.write_memory(bus, D_0_22, &div.to_be_bytes())?;
        self.fifo_rate = DMP_SAMPLE_RATE / (div + 1);
        self.reset_fifo(bus)
    }

    fn set_dmp_state(&mut self, bus: &mut B, enable: bool) -> Result<(), DmpError> {
        if enable && !self.loaded {
            return Err(DmpError::NotLoaded);
        }
        if enable {
            // D_0_22 divides down from the DMP's own 200 Hz input
            self.write_sample_rate(bus, DMP_SAMPLE_RATE)?;
        } else if self.enabled && self.user_rate != 0 {
            self.write_sample_rate(bus, self.user_rate)?;
        }
        self.enabled = enable;
        self.timestamp = 0;
        self.reset_fifo(bus)?;
        if !enable {
            bus.write_byte(self.address, INT_ENABLE, INT_ENABLE_RAW_RDY)?;
        }
        Ok(())
    }

    fn read_fifo(&mut self, bus: &mut B) -> Result<FifoPacket, DmpError> {
        if !self.enabled {
            return Err(DmpError::NotLoaded);
        }
        let len = self.packet_length;
        if len == 0 {
            return Err(DmpError::Unsupported);
        }

        let count = self.fifo_count(bus)?;
        if (count as usize) < len {
            return Err(DmpError::NoData);
        }
        if count > FIFO_SIZE / 2 {
            let status = bus.read_byte(self.address, INT_STATUS)?;
            if status & INT_STATUS_FIFO_OFLOW != 0 {
                log_warn!("FIFO overflow at {} bytes, resetting", count);
                self.reset_fifo(bus)?;
                return Err(DmpError::FifoOverflow);
            }
        }

        let mut raw: Vec<u8, MAX_PACKET_LENGTH> = Vec::new();
        raw.resize_default(len).map_err(|_| DmpError::Unsupported)?;
        bus.read_bytes(self.address, FIFO_R_W, &mut raw)?;

        let mut packet = match self.parse_packet(&raw) {
            Ok(packet) => packet,
            Err(e) => {
                self.reset_fifo(bus)?;
                return Err(e);
            }
        };

        self.timestamp = self
            .timestamp
            .wrapping_add(1000 / self.fifo_rate.max(1) as u32);
        packet.timestamp = self.timestamp;
        packet.more = count as usize / len > 1;
        Ok(packet)
    }
}
