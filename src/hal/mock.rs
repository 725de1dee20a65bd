//! Simulated hardware for unit tests
//!
//! - [`SimBus`]: a bus controller with an MPU-9250 (register file, DMP memory,
//!   FIFO) and an AK8963 compass attached
//! - [`MockDelay`]: records every delay into the same event log as the bus
//! - [`MockEdge`], [`MockClock`]: data-ready pin and time source
//! - [`MockDmp`]: scripted motion processor
//!
//! All mocks hand out shared handles so a test can keep poking the hardware
//! after the driver has taken ownership.

use core::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::vec::Vec;

use embedded_hal::blocking::delay::{DelayMs, DelayUs};

use super::{
    BusController, BusFault, Clock, Direction, EdgeInterrupt, I2cSequencer, MasterCommand,
    RegisterBus,
};
use crate::config::BusTiming;
use crate::sensors::dmp::{FifoPacket, MotionProcessor};
use crate::sensors::error::DmpError;
use crate::sensors::registers::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
    Address(u8, Direction),
    Put(u8),
    Command(MasterCommand),
    Get(u8),
    DelayUs(u32),
    DelayMs(u32),
}

pub type EventLog = Rc<RefCell<Vec<BusEvent>>>;

/// Register-file device on the simulated bus
pub trait SimDevice {
    fn write(&mut self, register: u8, value: u8);
    fn read(&mut self, register: u8) -> u8;
    /// Whether the register pointer advances after each byte
    fn advances(&self, _register: u8) -> bool {
        true
    }
}

pub struct SimMpu {
    regs: [u8; 128],
    pub memory: Vec<u8>,
    pub fifo: VecDeque<u8>,
    /// Number of DMP memory bytes that will be stored corrupted
    pub corrupt_writes: u32,
    pub resets: u32,
}

impl SimMpu {
    pub fn new() -> Self {
        let mut mpu = Self {
            regs: [0; 128],
            memory: vec![0; DMP_MEMORY_SIZE],
            fifo: VecDeque::new(),
            corrupt_writes: 0,
            resets: 0,
        };
        mpu.power_on();
        mpu
    }

    fn power_on(&mut self) {
        self.regs = [0; 128];
        self.regs[PWR_MGMT_1 as usize] = 0x01;
        self.regs[WHO_AM_I as usize] = MPU9250_WHO_AM_I_VALUE;
    }

    pub fn reg(&self, register: u8) -> u8 {
        self.regs[(register & 0x7F) as usize]
    }

    pub fn set_regs(&mut self, start: u8, values: &[u8]) {
        for (i, v) in values.iter().enumerate() {
            self.regs[(start as usize + i) & 0x7F] = *v;
        }
    }

    pub fn set_who_am_i(&mut self, id: u8) {
        self.regs[WHO_AM_I as usize] = id;
    }

    pub fn push_fifo(&mut self, bytes: &[u8]) {
        self.fifo.extend(bytes.iter().copied());
        if self.fifo.len() > FIFO_SIZE as usize {
            self.regs[INT_STATUS as usize] |= INT_STATUS_FIFO_OFLOW;
        }
    }

    pub fn memory_at(&self, address: u16, len: usize) -> &[u8] {
        &self.memory[address as usize..address as usize + len]
    }

    fn memory_cursor(&mut self) -> usize {
        let address = self.reg(BANK_SEL) as usize * DMP_BANK_SIZE + self.reg(MEM_START_ADDR) as usize;
        self.regs[MEM_START_ADDR as usize] = self.reg(MEM_START_ADDR).wrapping_add(1);
        address % DMP_MEMORY_SIZE
    }
}

impl SimDevice for SimMpu {
    fn write(&mut self, register: u8, value: u8) {
        match register {
            PWR_MGMT_1 if value & PWR_MGMT_1_RESET != 0 => {
                self.power_on();
                self.fifo.clear();
                self.resets += 1;
            }
            MEM_R_W => {
                let address = self.memory_cursor();
                self.memory[address] = if self.corrupt_writes > 0 {
                    self.corrupt_writes -= 1;
                    !value
                } else {
                    value
                };
            }
            FIFO_R_W => self.fifo.push_back(value),
            USER_CTRL => {
                if value & USER_CTRL_FIFO_RST != 0 {
                    self.fifo.clear();
                }
                self.regs[USER_CTRL as usize] = value & !(USER_CTRL_FIFO_RST | USER_CTRL_DMP_RST);
            }
            _ => self.regs[(register & 0x7F) as usize] = value,
        }
    }

    fn read(&mut self, register: u8) -> u8 {
        match register {
            MEM_R_W => {
                let address = self.memory_cursor();
                self.memory[address]
            }
            FIFO_COUNTH => (self.fifo.len() >> 8) as u8,
            r if r == FIFO_COUNTH + 1 => (self.fifo.len() & 0xFF) as u8,
            FIFO_R_W => self.fifo.pop_front().unwrap_or(0),
            INT_STATUS => {
                let status = self.reg(INT_STATUS);
                self.regs[INT_STATUS as usize] = 0;
                status
            }
            _ => self.reg(register),
        }
    }

    fn advances(&self, register: u8) -> bool {
        !matches!(register, MEM_R_W | FIFO_R_W)
    }
}

pub struct SimCompass {
    regs: [u8; 32],
}

impl SimCompass {
    pub fn new() -> Self {
        let mut regs = [0; 32];
        regs[AK8963_WIA as usize] = AK8963_WIA_VALUE;
        Self { regs }
    }

    pub fn reg(&self, register: u8) -> u8 {
        self.regs[(register & 0x1F) as usize]
    }
}

impl SimDevice for SimCompass {
    fn write(&mut self, register: u8, value: u8) {
        self.regs[(register & 0x1F) as usize] = value;
    }

    fn read(&mut self, register: u8) -> u8 {
        self.reg(register)
    }
}

/// Bus controller with the simulated devices attached
pub struct SimBus {
    log: EventLog,
    mpu: Rc<RefCell<SimMpu>>,
    compass: Rc<RefCell<SimCompass>>,
    compass_attached: Rc<Cell<bool>>,
    busy_polls: Rc<Cell<u32>>,
    busy_left: Cell<u32>,
    stuck: bool,
    address: u8,
    direction: Direction,
    data_out: u8,
    data_in: u8,
    pointer: u8,
    pointer_pending: bool,
    fault: Option<BusFault>,
}

impl SimBus {
    fn device(&self) -> Option<Rc<RefCell<dyn SimDevice>>> {
        if self.address == MPU9250_ADDRESS {
            Some(self.mpu.clone())
        } else if self.address == AK8963_ADDRESS && self.compass_attached.get() {
            Some(self.compass.clone())
        } else {
            None
        }
    }

    fn address_phase(&mut self) -> Option<Rc<RefCell<dyn SimDevice>>> {
        let device = self.device();
        if device.is_none() {
            self.fault = Some(BusFault::AddressNack);
        }
        if self.direction == Direction::Write {
            self.pointer_pending = true;
        }
        device
    }

    fn send(&mut self, device: &Rc<RefCell<dyn SimDevice>>) {
        if self.pointer_pending {
            self.pointer = self.data_out;
            self.pointer_pending = false;
            return;
        }
        let mut device = device.borrow_mut();
        device.write(self.pointer, self.data_out);
        if device.advances(self.pointer) {
            self.pointer = self.pointer.wrapping_add(1);
        }
    }

    fn receive(&mut self, device: &Rc<RefCell<dyn SimDevice>>) {
        let mut device = device.borrow_mut();
        self.data_in = device.read(self.pointer);
        if device.advances(self.pointer) {
            self.pointer = self.pointer.wrapping_add(1);
        }
    }
}

impl BusController for SimBus {
    fn set_slave_address(&mut self, address: u8, direction: Direction) {
        self.log
            .borrow_mut()
            .push(BusEvent::Address(address, direction));
        self.address = address;
        self.direction = direction;
    }

    fn put_data(&mut self, byte: u8) {
        self.log.borrow_mut().push(BusEvent::Put(byte));
        self.data_out = byte;
    }

    fn get_data(&mut self) -> u32 {
        self.log.borrow_mut().push(BusEvent::Get(self.data_in));
        // upper bits of the data register are not defined
        0xA500 | self.data_in as u32
    }

    fn command(&mut self, command: MasterCommand) {
        use MasterCommand::*;
        self.log.borrow_mut().push(BusEvent::Command(command));
        self.busy_left.set(self.busy_polls.get());

        let device = match command {
            SingleSend | BurstSendStart | SingleReceive | BurstReceiveStart => {
                self.address_phase()
            }
            BurstSendErrorStop | BurstReceiveErrorStop => return,
            _ => self.device(),
        };
        let Some(device) = device else {
            return;
        };
        match command {
            SingleSend | BurstSendStart | BurstSendCont | BurstSendFinish => self.send(&device),
            _ => self.receive(&device),
        }
    }

    fn is_busy(&self) -> bool {
        if self.stuck {
            return true;
        }
        let left = self.busy_left.get();
        if left > 0 {
            self.busy_left.set(left - 1);
            true
        } else {
            false
        }
    }

    fn take_fault(&mut self) -> Option<BusFault> {
        self.fault.take()
    }
}

pub struct MockDelay {
    log: EventLog,
}

impl DelayUs<u32> for MockDelay {
    fn delay_us(&mut self, us: u32) {
        self.log.borrow_mut().push(BusEvent::DelayUs(us));
    }
}

impl DelayMs<u32> for MockDelay {
    fn delay_ms(&mut self, ms: u32) {
        self.log.borrow_mut().push(BusEvent::DelayMs(ms));
    }
}

/// Handles into a simulated bus, kept by the test
pub struct SimHandles {
    pub log: EventLog,
    pub mpu: Rc<RefCell<SimMpu>>,
    pub compass: Rc<RefCell<SimCompass>>,
    compass_attached: Rc<Cell<bool>>,
    busy_polls: Rc<Cell<u32>>,
}

impl SimHandles {
    /// Address, data and command events only
    pub fn bus_traffic(&self) -> Vec<BusEvent> {
        self.log
            .borrow()
            .iter()
            .filter(|e| {
                matches!(
                    e,
                    BusEvent::Address(..) | BusEvent::Put(_) | BusEvent::Command(_)
                )
            })
            .cloned()
            .collect()
    }

    pub fn commands(&self) -> Vec<MasterCommand> {
        self.log
            .borrow()
            .iter()
            .filter_map(|e| match e {
                BusEvent::Command(c) => Some(*c),
                _ => None,
            })
            .collect()
    }

    pub fn clear_log(&self) {
        self.log.borrow_mut().clear();
    }

    pub fn set_busy_polls(&self, polls: u32) {
        self.busy_polls.set(polls);
    }

    pub fn detach_compass(&self) {
        self.compass_attached.set(false);
    }
}

pub type SimSequencer = I2cSequencer<SimBus, MockDelay>;

fn build(stuck: bool, timing: BusTiming) -> (SimSequencer, SimHandles) {
    let log: EventLog = Rc::new(RefCell::new(Vec::new()));
    let handles = SimHandles {
        log: log.clone(),
        mpu: Rc::new(RefCell::new(SimMpu::new())),
        compass: Rc::new(RefCell::new(SimCompass::new())),
        compass_attached: Rc::new(Cell::new(true)),
        busy_polls: Rc::new(Cell::new(0)),
    };
    let bus = SimBus {
        log: log.clone(),
        mpu: handles.mpu.clone(),
        compass: handles.compass.clone(),
        compass_attached: handles.compass_attached.clone(),
        busy_polls: handles.busy_polls.clone(),
        busy_left: Cell::new(0),
        stuck,
        address: 0,
        direction: Direction::Write,
        data_out: 0,
        data_in: 0,
        pointer: 0,
        pointer_pending: false,
        fault: None,
    };
    let seq = I2cSequencer::new(bus, MockDelay { log }, timing);
    (seq, handles)
}

pub fn sim_sequencer() -> (SimSequencer, SimHandles) {
    build(false, BusTiming::default())
}

/// Sequencer whose controller never leaves the busy state
pub fn stuck_sequencer() -> SimSequencer {
    let timing = BusTiming {
        busy_timeout: fugit::MicrosDurationU32::micros(50),
        ..BusTiming::default()
    };
    build(true, timing).0
}

#[derive(Debug, Default)]
pub struct EdgeState {
    pub enabled: bool,
    pub pending: bool,
    pub clears: u32,
}

/// Data-ready pin; a masked pin does not latch edges
#[derive(Clone, Default)]
pub struct MockEdge(pub Rc<RefCell<EdgeState>>);

impl MockEdge {
    /// Simulate a falling edge; returns whether the interrupt would be taken
    pub fn fire(&self) -> bool {
        let mut state = self.0.borrow_mut();
        if state.enabled {
            state.pending = true;
        }
        state.pending
    }

    pub fn enabled(&self) -> bool {
        self.0.borrow().enabled
    }

    pub fn clears(&self) -> u32 {
        self.0.borrow().clears
    }
}

impl EdgeInterrupt for MockEdge {
    fn enable(&mut self) {
        let mut state = self.0.borrow_mut();
        state.pending = false;
        state.enabled = true;
    }

    fn disable(&mut self) {
        self.0.borrow_mut().enabled = false;
    }

    fn is_enabled(&self) -> bool {
        self.0.borrow().enabled
    }

    fn clear_and_test(&mut self) -> bool {
        let mut state = self.0.borrow_mut();
        state.clears += 1;
        core::mem::take(&mut state.pending)
    }
}

#[derive(Clone, Default)]
pub struct MockClock(pub Rc<Cell<u64>>);

impl MockClock {
    pub fn advance_us(&self, us: u64) {
        self.0.set(self.0.get() + us);
    }
}

impl Clock for MockClock {
    fn now_us(&self) -> u64 {
        self.0.get()
    }
}

#[derive(Debug, Default)]
pub struct DmpScript {
    pub calls: Vec<&'static str>,
    /// Load attempts that fail before one succeeds
    pub load_failures: u32,
    pub load_attempts: u32,
    pub packets: VecDeque<Result<FifoPacket, DmpError>>,
    pub reads: u32,
    pub fail_step: Option<&'static str>,
    pub orientation: Option<u16>,
    pub features: Option<u16>,
}

/// Motion processor that replays a script. `read_fifo` also peeks at the FIFO
/// count over the bus, the way the real driver starts every drain.
#[derive(Clone, Default)]
pub struct MockDmp(pub Rc<RefCell<DmpScript>>);

impl MockDmp {
    pub fn failing_loads(failures: u32) -> Self {
        let dmp = Self::default();
        dmp.0.borrow_mut().load_failures = failures;
        dmp
    }

    pub fn queue(&self, packet: Result<FifoPacket, DmpError>) {
        self.0.borrow_mut().packets.push_back(packet);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.0.borrow().calls.clone()
    }

    pub fn reads(&self) -> u32 {
        self.0.borrow().reads
    }

    pub fn load_attempts(&self) -> u32 {
        self.0.borrow().load_attempts
    }

    fn step(&self, name: &'static str) -> Result<(), DmpError> {
        let mut script = self.0.borrow_mut();
        script.calls.push(name);
        if script.fail_step == Some(name) {
            Err(DmpError::Unsupported)
        } else {
            Ok(())
        }
    }
}

impl<B: RegisterBus> MotionProcessor<B> for MockDmp {
    fn init(&mut self, _bus: &mut B) -> Result<(), DmpError> {
        self.step("init")
    }

    fn set_sensors(&mut self, _bus: &mut B, _sensors: u8) -> Result<(), DmpError> {
        self.step("set_sensors")
    }

    fn configure_fifo(&mut self, _bus: &mut B, _sensors: u8) -> Result<(), DmpError> {
        self.step("configure_fifo")
    }

    fn set_sample_rate(&mut self, _bus: &mut B, _hz: u16) -> Result<(), DmpError> {
        self.step("set_sample_rate")
    }

    fn load_firmware(&mut self, _bus: &mut B) -> Result<(), DmpError> {
        self.step("load_firmware")?;
        let mut script = self.0.borrow_mut();
        script.load_attempts += 1;
        if script.load_attempts <= script.load_failures {
            Err(DmpError::VerifyFailed { bank: 0, offset: 0 })
        } else {
            Ok(())
        }
    }

    fn set_orientation(&mut self, _bus: &mut B, scalar: u16) -> Result<(), DmpError> {
        self.step("set_orientation")?;
        self.0.borrow_mut().orientation = Some(scalar);
        Ok(())
    }

    fn enable_feature(&mut self, _bus: &mut B, features: u16) -> Result<(), DmpError> {
        self.step("enable_feature")?;
        self.0.borrow_mut().features = Some(features);
        Ok(())
    }

    fn set_fifo_rate(&mut self, _bus: &mut B, _hz: u16) -> Result<(), DmpError> {
        self.step("set_fifo_rate")
    }

    fn set_dmp_state(&mut self, _bus: &mut B, _enable: bool) -> Result<(), DmpError> {
        self.step("set_dmp_state")
    }

    fn read_fifo(&mut self, bus: &mut B) -> Result<FifoPacket, DmpError> {
        let mut count = [0u8; 2];
        bus.read_bytes(MPU9250_ADDRESS, FIFO_COUNTH, &mut count)?;
        let mut script = self.0.borrow_mut();
        script.reads += 1;
        script.packets.pop_front().unwrap_or(Err(DmpError::NoData))
    }
}
