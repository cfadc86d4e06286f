use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::adc::{Adc, AdcChannel};
use embassy_stm32::dac::Dac;
use embassy_stm32::gpio::{Input, Level, Output, Pull, Speed};
use embassy_sync::channel::Channel;
use probe_core::TickRate;

use crate::hw::{BoardHardware, BoardInputs, BoardOutputs, FeedbackAdc};
use crate::probe::{ControlQueue, FIRMWARE_TICK_HZ, ProbeController, SharedConfig, shared_config};

mod console_task;
mod probe_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

pub(super) static SHARED_CONFIG: SharedConfig = shared_config();
pub(super) static CONTROL_QUEUE: ControlQueue = Channel::new();

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals {
        PA0,
        PA1,
        PA2,
        PA4,
        PA5,
        PA7,
        PB3,
        PB4,
        PB5,
        PB6,
        PB0,
        PB1,
        ADC1,
        DAC1,
        USART5,
        ..
    } = hal::init(config);

    let rate = TickRate::new(FIRMWARE_TICK_HZ).expect("firmware tick rate");

    let (trig_level, intensity_level) = Dac::new_blocking(DAC1, PA4, PA5).split();
    let outputs = BoardOutputs {
        trig_level,
        intensity_level,
        trig_enable: Output::new(PB3, Level::Low, Speed::VeryHigh),
        intensity_enable: Output::new(PB4, Level::Low, Speed::VeryHigh),
        ready_led: Output::new(PB5, Level::Low, Speed::Low),
        fault_led: Output::new(PB6, Level::Low, Speed::Low),
    };
    let inputs = BoardInputs {
        global_enable: Input::new(PA2, Pull::Down),
        arm_enable: Input::new(PA0, Pull::Down),
        ext_trigger_in: Input::new(PA1, Pull::Down),
        feedback: FeedbackAdc::new(Adc::new(ADC1), PA7.degrade_adc()),
    };

    let controller = ProbeController::new(
        rate,
        BoardHardware::new(inputs, outputs),
        &SHARED_CONFIG,
        CONTROL_QUEUE.receiver(),
    );
    defmt::info!("probe: ready at {} Hz", FIRMWARE_TICK_HZ);

    spawner
        .spawn(probe_task::run(controller))
        .expect("failed to spawn probe task");

    spawner
        .spawn(console_task::run(
            &SHARED_CONFIG,
            &CONTROL_QUEUE,
            rate,
            USART5,
            PB0,
            PB1,
        ))
        .expect("failed to spawn console task");

    core::future::pending::<()>().await;
}
