#![no_std]
#![no_main]

use core::cell::RefCell;

use critical_section::Mutex;
use defmt::*;
use defmt_rtt as _;
use fugit::RateExtU32;
use hal::gpio::bank0::{Gpio24, Gpio25};
use hal::gpio::{Function, Pin};
use hal::i2c::I2C;
use hal::pac;
use hal::pac::interrupt;
use hal::Clock as _;
use panic_probe as _;
use rp2040_hal as hal;

use rover_imu::board::{BoardClock, DataReadyPin};
use rover_imu::hal::HalBus;
use rover_imu::math::functions::to_degrees;
use rover_imu::sensors::dmp::Mpu9250Dmp;
use rover_imu::{InitError, Mpu9250, SensorClass, SensorConfig, SensorSession};

#[link_section = ".boot2"]
#[used]
pub static BOOT2: [u8; 256] = rp2040_boot2::BOOT_LOADER_GENERIC_03H;

const EXT_CLK_HZ: u32 = 12_000_000;

static FIRMWARE: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/dmp_firmware.bin"));

type I2cBus = I2C<
    pac::I2C0,
    (
        Pin<Gpio24, Function<hal::gpio::I2C>>,
        Pin<Gpio25, Function<hal::gpio::I2C>>,
    ),
>;
type BoardImu = Mpu9250<
    'static,
    HalBus<I2cBus, cortex_m::delay::Delay>,
    Mpu9250Dmp<'static>,
    DataReadyPin,
    BoardClock,
>;

static SESSION: SensorSession = SensorSession::new();
static IMU: Mutex<RefCell<Option<BoardImu>>> = Mutex::new(RefCell::new(None));

fn trace_hook(class: SensorClass, data: &[f32]) {
    trace!("{} sample, dT {}", class, data[10]);
}

fn bring_up(imu: &mut BoardImu) -> Result<(), InitError> {
    imu.reset()?;
    imu.init_hardware()?;
    imu.init_firmware()
}

#[rp2040_hal::entry]
fn main() -> ! {
    let mut pac = pac::Peripherals::take().unwrap();
    let core = pac::CorePeripherals::take().unwrap();
    let mut watchdog = hal::Watchdog::new(pac.WATCHDOG);
    let sio = hal::Sio::new(pac.SIO);
    let pins = hal::gpio::Pins::new(
        pac.IO_BANK0,
        pac.PADS_BANK0,
        sio.gpio_bank0,
        &mut pac.RESETS,
    );
    let clocks = hal::clocks::init_clocks_and_plls(
        EXT_CLK_HZ,
        pac.XOSC,
        pac.CLOCKS,
        pac.PLL_SYS,
        pac.PLL_USB,
        &mut pac.RESETS,
        &mut watchdog,
    )
    .ok()
    .unwrap();
    let timer = hal::Timer::new(pac.TIMER, &mut pac.RESETS);
    let delay = cortex_m::delay::Delay::new(core.SYST, clocks.system_clock.freq().to_Hz());

    let i2c = I2C::i2c0(
        pac.I2C0,
        pins.gpio24.into_mode(),
        pins.gpio25.into_mode(),
        400.kHz(),
        &mut pac.RESETS,
        clocks.system_clock.freq(),
    );
    let int_pin = DataReadyPin::new(pins.gpio26.into_pull_up_input());

    let mut imu = Mpu9250::new(
        HalBus::new(i2c, delay),
        Mpu9250Dmp::new(FIRMWARE),
        int_pin,
        BoardClock::new(timer),
        &SESSION,
        SensorConfig::default(),
    );

    if let Err(e) = bring_up(&mut imu) {
        error!("IMU bring-up failed");
        e.info();
        loop {
            cortex_m::asm::wfi();
        }
    }

    if let Some(hook) = cortex_m::singleton!(: fn(SensorClass, &[f32]) = trace_hook) {
        imu.add_data_hook(hook);
    }
    imu.listen(true);
    critical_section::with(|cs| IMU.borrow_ref_mut(cs).replace(imu));
    unsafe { pac::NVIC::unmask(pac::Interrupt::IO_IRQ_BANK0) };
    info!("listening for data ready");

    loop {
        if let Some(sample) = SESSION.take_sample() {
            let [yaw, pitch, roll] = to_degrees(sample.ypr);
            info!(
                "RPY: {} {} {}  {}ms",
                roll,
                pitch,
                yaw,
                sample.dt * 1000.0
            );
            let g = sample.gravity;
            debug!("gravity vector pointing: {} {} {}", g.x, g.y, g.z);
        }
        cortex_m::asm::wfi();
    }
}

#[interrupt]
fn IO_IRQ_BANK0() {
    critical_section::with(|cs| {
        if let Some(imu) = IMU.borrow_ref_mut(cs).as_mut() {
            if let Err(e) = imu.on_interrupt() {
                e.info();
            }
        }
    });
}
