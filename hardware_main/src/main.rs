#![no_std]
#![no_main]

mod fmt;
mod pressure_sensor;

// Use declarations
// Core libraries
use core::fmt::Write;

// External libraries
use arrayvec::ArrayString;
#[cfg(feature = "defmt")]
use {defmt_rtt as _, panic_probe as _};
use embassy_executor::Spawner;
use embassy_stm32::{bind_interrupts, peripherals};
use embassy_stm32::i2c::{ErrorInterruptHandler, EventInterruptHandler, I2c};
use embassy_stm32::time::Hertz;
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use embassy_sync::channel::{Channel, Sender};
use embassy_time::{Duration, Ticker};
#[cfg(not(feature = "defmt"))]
use panic_halt as _;

// Internal modules, both this crate and the measurement logic crate.
use measurement_logic::display::Severity;
use measurement_logic::monitor::BpMonitor;
use measurement_logic::pressure::SensorCalibration;
use fmt::{info, warn};
use pressure_sensor::{PressureSensor, SENSOR_ADDRESS};

// One raw transducer code per acquisition tick, sensor task to pipeline.
static CHANNEL: Channel<ThreadModeRawMutex, u32, 8> = Channel::new();

// Acquisition cadence; the analysis constants assume 25 samples/sec.
const SAMPLE_PERIOD: Duration = Duration::from_millis(40);

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let p = embassy_stm32::init(Default::default());

    // I2C and pressure transducer initialization. The transducer sits on
    // I2C3 (PA8 = SCL, PC9 = SDA).
    bind_interrupts!(struct Irqs {
        I2C3_EV => EventInterruptHandler<peripherals::I2C3>;
        I2C3_ER => ErrorInterruptHandler<peripherals::I2C3>;
    });

    let i2c = I2c::new(
        p.I2C3,
        p.PA8,
        p.PC9,
        Irqs,
        p.DMA1_CH4,
        p.DMA1_CH2,
        Hertz(400_000),
        Default::default(),
    );
    let sensor = PressureSensor::new(i2c, SENSOR_ADDRESS);

    // Spawn the acquisition task
    spawner.spawn(acquire(sensor, CHANNEL.sender())).unwrap();

    let mut monitor = BpMonitor::new(SensorCalibration::default());

    warn!("Starting measurement run");

    loop {
        let raw = CHANNEL.receive().await;

        for event in monitor.process_sample(raw) {
            match event.severity {
                Severity::Warning => warn!("L{=u8} {=str}", event.line, event.text.as_str()),
                _ => info!("L{=u8} {=str}", event.line, event.text.as_str()),
            }
        }

        if monitor.phase().is_terminal() {
            break;
        }
    }

    if let Some(report) = monitor.report() {
        // Diagnostic mirror of the result screen for the log capture.
        let mut line: ArrayString<64> = ArrayString::new();
        write!(
            &mut line,
            "Max pulse: {:.2}mmHg at {:.2}mmHg",
            report.peak_amplitude, report.peak_pressure
        )
        .expect("can't write");
        info!("{=str}", line.as_str());
    }
    info!("Test finished");
}

#[embassy_executor::task]
async fn acquire(
    mut sensor: PressureSensor<I2c<'static, embassy_stm32::mode::Async>>,
    msg: Sender<'static, ThreadModeRawMutex, u32, 8>,
) {
    let mut ticker = Ticker::every(SAMPLE_PERIOD);
    loop {
        if let Some(raw) = sensor.read_raw().await {
            msg.send(raw).await;
        }
        ticker.next().await;
    }
}
