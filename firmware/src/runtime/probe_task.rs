use embassy_time::{Duration, Ticker};

use crate::hw::BoardHardware;
use crate::probe::{ProbeController, TICK_PERIOD_US};

#[embassy_executor::task]
pub async fn run(mut controller: ProbeController<'static, BoardHardware<'static>>) -> ! {
    let mut ticker = Ticker::every(Duration::from_micros(TICK_PERIOD_US));
    loop {
        controller.step();
        ticker.next().await;
    }
}
