//! Board peripherals behind [`ProbeHardware`].
//!
//! `global_enable`, `arm_enable` and `ext_trigger_in` arrive on pulled-down
//! GPIO inputs (an unconnected enable reads low and holds the probe off), the
//! probe feedback is sampled by ADC1 and the two output stages are set by the
//! DAC with a separate enable line each. Amplitudes are written before the
//! enables so an asserted enable never sees a stale level.

#![cfg(target_os = "none")]

use embassy_stm32::adc::{Adc, AnyAdcChannel, SampleTime};
use embassy_stm32::dac::{DacCh1, DacCh2, Value};
use embassy_stm32::gpio::{Input, Output};
use embassy_stm32::mode::Blocking;
use embassy_stm32::peripherals::{ADC1, DAC1};
use probe_core::{ProbeInputs, ProbeOutputs};

use crate::probe::ProbeHardware;
use crate::probe::scaling::{adc_to_mv, dac_level};

/// ADC1 wrapper returning the probe feedback in millivolts.
pub struct FeedbackAdc<'d> {
    adc: Adc<'d, ADC1>,
    channel: AnyAdcChannel<ADC1>,
}

impl<'d> FeedbackAdc<'d> {
    pub fn new(mut adc: Adc<'d, ADC1>, channel: AnyAdcChannel<ADC1>) -> Self {
        adc.set_sample_time(SampleTime::CYCLES12_5);
        Self { adc, channel }
    }

    pub fn read_mv(&mut self) -> i16 {
        adc_to_mv(self.adc.blocking_read(&mut self.channel))
    }
}

/// Input pins sampled every tick.
pub struct BoardInputs<'d> {
    pub global_enable: Input<'d>,
    pub arm_enable: Input<'d>,
    pub ext_trigger_in: Input<'d>,
    pub feedback: FeedbackAdc<'d>,
}

/// Output stages and status indicators.
pub struct BoardOutputs<'d> {
    pub trig_level: DacCh1<'d, DAC1, Blocking>,
    pub intensity_level: DacCh2<'d, DAC1, Blocking>,
    pub trig_enable: Output<'d>,
    pub intensity_enable: Output<'d>,
    pub ready_led: Output<'d>,
    pub fault_led: Output<'d>,
}

pub struct BoardHardware<'d> {
    inputs: BoardInputs<'d>,
    outputs: BoardOutputs<'d>,
}

impl<'d> BoardHardware<'d> {
    pub fn new(inputs: BoardInputs<'d>, outputs: BoardOutputs<'d>) -> Self {
        Self { inputs, outputs }
    }
}

impl ProbeHardware for BoardHardware<'_> {
    fn sample(&mut self) -> ProbeInputs {
        ProbeInputs {
            global_enable: self.inputs.global_enable.is_high(),
            arm_enable: self.inputs.arm_enable.is_high(),
            ext_trigger_in: self.inputs.ext_trigger_in.is_high(),
            feedback_mv: self.inputs.feedback.read_mv(),
        }
    }

    fn drive(&mut self, outputs: &ProbeOutputs) {
        let out = &mut self.outputs;
        out.trig_level
            .set(Value::Bit12Right(dac_level(outputs.trig_out_code)));
        out.intensity_level
            .set(Value::Bit12Right(dac_level(outputs.intensity_out_code)));

        out.trig_enable.set_level(outputs.trig_out_active.into());
        out.intensity_enable
            .set_level(outputs.intensity_out_active.into());
        out.ready_led.set_level(outputs.ready.into());
        out.fault_led.set_level(outputs.fault.into());
    }
}
