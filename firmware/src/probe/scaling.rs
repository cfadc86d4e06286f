//! Conversions between engine codes and the board's 12-bit converters.
//!
//! Both converters are unipolar; the analog front end maps mid-scale to 0 V
//! and the rails to ±5000 mV.

use probe_core::units::OUTPUT_FULL_SCALE_MV;

/// Largest 12-bit converter value.
pub const CONVERTER_MAX: u16 = 0x0FFF;

/// DAC level producing `code` on the output stage; code 0 is mid-scale.
#[must_use]
pub fn dac_level(code: i16) -> u16 {
    // shift the signed code into 0..=0xFFFF, then keep the top 12 bits
    let offset = i32::from(code) + 0x8000;
    u16::try_from(offset >> 4).unwrap_or(CONVERTER_MAX)
}

/// Feedback voltage for a raw ADC reading.
#[must_use]
pub fn adc_to_mv(raw: u16) -> i16 {
    let raw = i32::from(raw.min(CONVERTER_MAX));
    let full_scale = i32::from(OUTPUT_FULL_SCALE_MV);
    let span = i32::from(CONVERTER_MAX);
    let mv = (raw * 2 * full_scale + span / 2) / span - full_scale;
    i16::try_from(mv).unwrap_or(if mv < 0 { i16::MIN } else { i16::MAX })
}

#[cfg(test)]
mod tests {
    use super::*;
    use probe_core::mv_to_code;

    #[test]
    fn dac_spans_the_converter() {
        assert_eq!(dac_level(i16::MIN), 0);
        assert_eq!(dac_level(0), 0x0800);
        assert_eq!(dac_level(i16::MAX), CONVERTER_MAX);
        assert!(dac_level(mv_to_code(2_500)) > dac_level(mv_to_code(-2_500)));
    }

    #[test]
    fn adc_endpoints_map_to_rails() {
        assert_eq!(adc_to_mv(0), -5_000);
        assert_eq!(adc_to_mv(CONVERTER_MAX), 5_000);
        assert_eq!(adc_to_mv(u16::MAX), 5_000);
        assert!(adc_to_mv(0x0800).abs() <= 2);
    }
}
