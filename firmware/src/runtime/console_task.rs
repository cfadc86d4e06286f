use core::fmt::Write as _;

use embassy_stm32 as hal;
use embassy_stm32::Peri;
use embassy_stm32::usart::{BufferedUart, Config as UartConfig, DataBits, Parity, StopBits};
use embassy_time::{Duration, Timer};
use embedded_io_async::{Read, Write};
use heapless::String;
use probe_core::TickRate;
use static_cell::StaticCell;

use crate::console::{ConsoleLink, FirmwareConsole, LineBuffer, MAX_LINE_LEN};
use crate::probe::{ControlQueue, SharedConfig};

const CONSOLE_BAUD: u32 = 115_200;
const CONSOLE_BUFFER_SIZE: usize = 256;
/// Room for the longest reply (`help` with every command).
const REPLY_CAPACITY: usize = 2048;

static UART_TX_BUFFER: StaticCell<[u8; CONSOLE_BUFFER_SIZE]> = StaticCell::new();
static UART_RX_BUFFER: StaticCell<[u8; CONSOLE_BUFFER_SIZE]> = StaticCell::new();
static REPLY: StaticCell<String<REPLY_CAPACITY>> = StaticCell::new();

embassy_stm32::bind_interrupts!(struct UartIrqs {
    USART3_4_5_6_LPUART1 => embassy_stm32::usart::BufferedInterruptHandler<hal::peripherals::USART5>;
});

#[embassy_executor::task]
pub async fn run(
    shared: &'static SharedConfig,
    requests: &'static ControlQueue,
    rate: TickRate,
    usart: Peri<'static, hal::peripherals::USART5>,
    tx_pin: Peri<'static, hal::peripherals::PB0>,
    rx_pin: Peri<'static, hal::peripherals::PB1>,
) -> ! {
    let mut config = UartConfig::default();
    config.baudrate = CONSOLE_BAUD;
    config.data_bits = DataBits::DataBits8;
    config.stop_bits = StopBits::STOP1;
    config.parity = Parity::ParityNone;

    let uart = BufferedUart::new(
        usart,
        rx_pin,
        tx_pin,
        UART_TX_BUFFER.init([0; CONSOLE_BUFFER_SIZE]),
        UART_RX_BUFFER.init([0; CONSOLE_BUFFER_SIZE]),
        UartIrqs,
        config,
    )
    .expect("failed to initialize console UART");
    let (mut uart_tx, mut uart_rx) = uart.split();

    let mut console = FirmwareConsole::new(ConsoleLink::new(shared, requests.sender(), rate));
    let mut line = LineBuffer::new();
    let reply = REPLY.init(String::new());
    let mut ingress = [0u8; MAX_LINE_LEN];

    loop {
        let count = match uart_rx.read(&mut ingress).await {
            Ok(count) => count,
            Err(_) => {
                defmt::warn!("console: UART read error");
                Timer::after(Duration::from_millis(5)).await;
                continue;
            }
        };

        for &byte in &ingress[..count] {
            reply.clear();
            match line.push(byte) {
                Ok(false) => continue,
                Ok(true) => {
                    let result = match line.line() {
                        Ok(text) => console.handle_line(text, reply),
                        Err(err) => write!(reply, "ERR syntax {err}\r\n"),
                    };
                    if result.is_err() {
                        defmt::warn!("console: reply truncated");
                    }
                    line.clear();
                }
                Err(err) => {
                    defmt::warn!("console: {}", defmt::Display2Format(&err));
                    let _ = write!(reply, "ERR syntax {err}\r\n");
                }
            }

            if uart_tx.write_all(reply.as_bytes()).await.is_err()
                || uart_tx.flush().await.is_err()
            {
                defmt::warn!("console: UART write error");
            }
        }
    }
}
