//! Conversions between physical quantities and tick-domain integers.
//!
//! Every duration that reaches the engine is expressed as a whole number of
//! ticks of the control loop. Conversions widen to 128 bits before scaling and
//! round up, so a converted duration is never shorter than the configured one
//! and exceeds it by less than one tick period. Results that do not fit the
//! 32-bit counter width are reported as [`ConversionError::Overflow`] instead
//! of wrapping.

use core::fmt;

/// Tick frequency of the reference FPGA clock domain (8 ns period).
pub const DEFAULT_TICK_HZ: u32 = 125_000_000;

/// Millivolt magnitude that maps to the largest DAC code.
pub const OUTPUT_FULL_SCALE_MV: i16 = 5_000;

/// Largest signed DAC code.
pub const OUTPUT_FULL_SCALE_CODE: i16 = i16::MAX;

/// Time units accepted at the configuration boundary.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TimeUnit {
    Seconds,
    Micros,
    Nanos,
}

impl TimeUnit {
    /// Number of units contained in one second.
    #[must_use]
    pub const fn per_second(self) -> u64 {
        match self {
            TimeUnit::Seconds => 1,
            TimeUnit::Micros => 1_000_000,
            TimeUnit::Nanos => 1_000_000_000,
        }
    }

    /// Short suffix used when rendering values (`s`, `us`, `ns`).
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            TimeUnit::Seconds => "s",
            TimeUnit::Micros => "us",
            TimeUnit::Nanos => "ns",
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Failure reported by the tick conversions.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConversionError {
    /// A zero tick frequency cannot time anything.
    ZeroTickRate,
    /// The converted cycle count does not fit in 32 bits.
    Overflow {
        value: u64,
        unit: TimeUnit,
        tick_hz: u32,
    },
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionError::ZeroTickRate => f.write_str("tick rate must be non-zero"),
            ConversionError::Overflow {
                value,
                unit,
                tick_hz,
            } => write!(
                f,
                "{value}{unit} at {tick_hz} Hz exceeds the 32-bit cycle counter"
            ),
        }
    }
}

/// Converts `value` expressed in `unit` into a cycle count at `tick_hz`.
///
/// The product is computed in 128 bits and rounded up to the next whole
/// tick. A zero value always converts to zero cycles.
///
/// # Errors
///
/// Returns [`ConversionError::ZeroTickRate`] when `tick_hz` is zero and
/// [`ConversionError::Overflow`] when the result does not fit in a `u32`.
pub fn to_cycles(value: u64, unit: TimeUnit, tick_hz: u32) -> Result<u32, ConversionError> {
    if tick_hz == 0 {
        return Err(ConversionError::ZeroTickRate);
    }

    let scaled = u128::from(value) * u128::from(tick_hz);
    let cycles = scaled.div_ceil(u128::from(unit.per_second()));
    u32::try_from(cycles).map_err(|_| ConversionError::Overflow {
        value,
        unit,
        tick_hz,
    })
}

/// Converts a cycle count back into `unit`, truncating toward zero.
///
/// Returns `0` when `tick_hz` is zero.
#[must_use]
pub fn from_cycles(cycles: u32, unit: TimeUnit, tick_hz: u32) -> u64 {
    if tick_hz == 0 {
        return 0;
    }

    let scaled = u128::from(cycles) * u128::from(unit.per_second());
    let value = scaled / u128::from(tick_hz);
    // cycles < 2^32 and per_second <= 10^9, so the quotient fits in 64 bits
    u64::try_from(value).unwrap_or(u64::MAX)
}

/// Converts a cycle count into nanoseconds.
#[must_use]
pub fn cycles_to_nanos(cycles: u32, tick_hz: u32) -> u64 {
    from_cycles(cycles, TimeUnit::Nanos, tick_hz)
}

/// Maps a millivolt level onto the signed 16-bit DAC code.
///
/// `±OUTPUT_FULL_SCALE_MV` maps to `±OUTPUT_FULL_SCALE_CODE`, rounding to
/// the nearest code. Inputs beyond full scale saturate.
#[must_use]
pub fn mv_to_code(mv: i16) -> i16 {
    let numerator = i32::from(mv) * i32::from(OUTPUT_FULL_SCALE_CODE);
    let code = round_div(numerator, i32::from(OUTPUT_FULL_SCALE_MV));
    saturate_i16(code)
}

/// Maps a DAC code back onto millivolts, rounding to the nearest millivolt.
#[must_use]
pub fn code_to_mv(code: i16) -> i16 {
    let numerator = i32::from(code) * i32::from(OUTPUT_FULL_SCALE_MV);
    let mv = round_div(numerator, i32::from(OUTPUT_FULL_SCALE_CODE));
    saturate_i16(mv)
}

fn round_div(numerator: i32, denominator: i32) -> i32 {
    let half = denominator / 2;
    if numerator >= 0 {
        (numerator + half) / denominator
    } else {
        (numerator - half) / denominator
    }
}

fn saturate_i16(value: i32) -> i16 {
    i16::try_from(value).unwrap_or(if value < 0 { i16::MIN } else { i16::MAX })
}

/// Validated, non-zero tick frequency of the control loop.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct TickRate {
    hz: u32,
}

impl TickRate {
    /// Tick rate of the reference clock domain.
    pub const DEFAULT: Self = Self {
        hz: DEFAULT_TICK_HZ,
    };

    /// Creates a tick rate.
    ///
    /// # Errors
    ///
    /// Returns [`ConversionError::ZeroTickRate`] for a zero frequency.
    pub const fn new(hz: u32) -> Result<Self, ConversionError> {
        if hz == 0 {
            Err(ConversionError::ZeroTickRate)
        } else {
            Ok(Self { hz })
        }
    }

    /// Returns the frequency in hertz.
    #[must_use]
    pub const fn hz(self) -> u32 {
        self.hz
    }

    /// Converts `value` in `unit` into cycles at this rate.
    ///
    /// # Errors
    ///
    /// Returns [`ConversionError::Overflow`] when the result exceeds 32 bits.
    pub fn cycles(self, value: u64, unit: TimeUnit) -> Result<u32, ConversionError> {
        to_cycles(value, unit, self.hz)
    }
}

impl Default for TickRate {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Two-stage counter measuring whole seconds of dwell.
///
/// A tick prescaler rolls over once per second, so multi-second dwells never
/// need a cycle count wider than the tick frequency itself.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct SecondsCounter {
    ticks: u32,
    seconds: u32,
}

impl SecondsCounter {
    /// Creates a counter at zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ticks: 0,
            seconds: 0,
        }
    }

    /// Advances the counter by one tick.
    pub fn advance(&mut self, rate: TickRate) {
        self.ticks += 1;
        if self.ticks >= rate.hz() {
            self.ticks = 0;
            self.seconds = self.seconds.saturating_add(1);
        }
    }

    /// Whole seconds elapsed since the last reset.
    #[must_use]
    pub const fn seconds(&self) -> u32 {
        self.seconds
    }

    /// Ticks elapsed inside the current second.
    #[must_use]
    pub const fn sub_second_ticks(&self) -> u32 {
        self.ticks
    }

    /// Returns the counter to zero.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}
