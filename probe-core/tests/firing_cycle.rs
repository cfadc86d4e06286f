use probe_core::config::ConfigField;
use probe_core::engine::{ProbeOutputs, ProbeState};
use probe_core::telemetry::ProbeEvent;
use probe_core::units::{TimeUnit, mv_to_code, to_cycles};
use probe_core::{ProbeBench, TickRate};

type Bench = ProbeBench<128>;

fn bench_at(rate_hz: u32) -> Bench {
    let mut bench = Bench::new(TickRate::new(rate_hz).expect("non-zero rate"));
    bench
        .write(ConfigField::MonitorEnable, 0)
        .expect("monitor off");
    bench
}

fn arm_and_fire(bench: &mut Bench) -> ProbeOutputs {
    bench.set_arm(true);
    let armed = bench.tick();
    assert_eq!(armed.current_state, ProbeState::Armed);
    bench.pulse_trigger()
}

fn assert_safe_outside_firing(outputs: &ProbeOutputs) {
    if outputs.current_state != ProbeState::Firing {
        assert!(!outputs.trig_out_active && outputs.trig_out_code == 0);
        assert!(!outputs.intensity_out_active && outputs.intensity_out_code == 0);
    }
}

#[test]
fn trigger_line_is_active_for_exactly_the_converted_width() {
    let rate = 125_000_000;
    for (duration_ns, voltage_mv) in [(20_u16, 5_000_i16), (100, -2_500), (1_000, 1), (50_000, -5_000)] {
        let mut bench = bench_at(rate);
        bench
            .write(ConfigField::TrigOutDuration, i64::from(duration_ns))
            .expect("duration");
        bench
            .write(ConfigField::IntensityDuration, 20)
            .expect("duration");
        bench
            .write(ConfigField::TrigOutVoltage, i64::from(voltage_mv))
            .expect("voltage");

        let expected_cycles =
            to_cycles(u64::from(duration_ns), TimeUnit::Nanos, rate).expect("fits");
        let expected_code = mv_to_code(voltage_mv);

        let mut outputs = arm_and_fire(&mut bench);
        let mut active_ticks = 0_u32;
        let mut left_firing = false;
        for _ in 0..=expected_cycles + 4 {
            assert_safe_outside_firing(&outputs);
            if outputs.trig_out_active {
                assert!(!left_firing, "pulse reappeared after FIRING");
                assert_eq!(outputs.trig_out_code, expected_code);
                active_ticks += 1;
            }
            if outputs.current_state != ProbeState::Firing {
                left_firing = true;
            }
            outputs = bench.tick();
        }

        assert_eq!(active_ticks, expected_cycles, "{duration_ns} ns");
    }
}

#[test]
fn duration_plus_one_ticks_after_trigger_lands_in_cooldown() {
    let mut bench = bench_at(1_000_000);
    bench.write(ConfigField::TrigOutDuration, 5_000).expect("5 cycles");
    bench
        .write(ConfigField::IntensityDuration, 5_000)
        .expect("5 cycles");

    let fired = arm_and_fire(&mut bench);
    assert!(fired.trig_out_active && fired.busy && !fired.ready);

    let outputs = bench.run(5 + 1);
    assert!(!outputs.trig_out_active);
    assert!(!outputs.intensity_out_active);
    assert_eq!(outputs.current_state, ProbeState::Cooldown);
    assert!(outputs.busy);
}

#[test]
fn concurrent_channels_hold_firing_until_the_longer_one_ends() {
    let mut bench = bench_at(1_000_000);
    bench.write(ConfigField::TrigOutDuration, 2_000).expect("2 cycles");
    bench
        .write(ConfigField::IntensityDuration, 6_000)
        .expect("6 cycles");

    let mut outputs = arm_and_fire(&mut bench);
    let mut trace: heapless::Vec<(bool, bool, ProbeState), 8> = heapless::Vec::new();
    for _ in 0..7 {
        trace
            .push((
                outputs.trig_out_active,
                outputs.intensity_out_active,
                outputs.current_state,
            ))
            .expect("capacity");
        outputs = bench.tick();
    }

    let firing = trace
        .iter()
        .filter(|(_, _, state)| *state == ProbeState::Firing)
        .count();
    let trigger = trace.iter().filter(|(trig, _, _)| *trig).count();
    let intensity = trace.iter().filter(|(_, int, _)| *int).count();
    assert_eq!(firing, 6);
    assert_eq!(trigger, 2);
    assert_eq!(intensity, 6);
    assert_eq!(trace[6].2, ProbeState::Cooldown);
}

#[test]
fn cooldown_is_never_shorter_than_configured() {
    for auto_rearm in [false, true] {
        let mut bench = bench_at(1_000_000);
        bench.write(ConfigField::CooldownInterval, 25).expect("25 us");
        bench
            .write(ConfigField::AutoRearmEnable, i64::from(auto_rearm))
            .expect("flag");
        bench.write(ConfigField::TrigOutDuration, 20).expect("1 cycle");
        bench
            .write(ConfigField::IntensityDuration, 20)
            .expect("1 cycle");

        arm_and_fire(&mut bench);
        let mut cooldown_ticks = 0;
        let mut outputs = bench.tick();
        while outputs.current_state == ProbeState::Cooldown {
            assert_safe_outside_firing(&outputs);
            cooldown_ticks += 1;
            outputs = bench.tick();
        }

        assert_eq!(cooldown_ticks, 25, "auto_rearm={auto_rearm}");
        let expected = if auto_rearm {
            ProbeState::Armed
        } else {
            ProbeState::Idle
        };
        assert_eq!(outputs.current_state, expected);
    }
}

#[test]
fn auto_rearm_returns_to_armed_and_accepts_a_new_trigger() {
    let mut bench = bench_at(1_000_000);
    bench.write(ConfigField::AutoRearmEnable, 1).expect("flag");
    bench.write(ConfigField::CooldownInterval, 3).expect("3 us");

    arm_and_fire(&mut bench);
    let outputs = bench.run(1 + 3);
    assert_eq!(outputs.current_state, ProbeState::Armed);
    assert!(!outputs.ready && !outputs.busy);

    let refired = bench.pulse_trigger();
    assert_eq!(refired.current_state, ProbeState::Firing);
}

#[test]
fn firing_values_are_latched_at_trigger_time() {
    let mut bench = bench_at(1_000_000);
    bench.write(ConfigField::TrigOutVoltage, 1_000).expect("voltage");
    bench.write(ConfigField::TrigOutDuration, 4_000).expect("4 cycles");
    bench
        .write(ConfigField::IntensityDuration, 4_000)
        .expect("4 cycles");

    let fired = arm_and_fire(&mut bench);
    assert_eq!(fired.trig_out_code, mv_to_code(1_000));

    bench.write(ConfigField::TrigOutVoltage, -3_000).expect("voltage");
    bench
        .write(ConfigField::TrigOutDuration, 50_000)
        .expect("duration");

    for _ in 0..3 {
        let outputs = bench.tick();
        assert_eq!(outputs.trig_out_code, mv_to_code(1_000));
    }
    assert_eq!(bench.tick().current_state, ProbeState::Cooldown);
}

#[test]
fn disarm_returns_armed_engine_to_idle() {
    let mut bench = bench_at(1_000_000);
    bench.set_arm(true);
    assert_eq!(bench.tick().current_state, ProbeState::Armed);

    bench.set_arm(false);
    let outputs = bench.tick();
    assert_eq!(outputs.current_state, ProbeState::Idle);
    assert!(outputs.ready);

    // a trigger edge while IDLE does nothing
    assert_eq!(bench.pulse_trigger().current_state, ProbeState::Idle);
}

#[test]
fn disarming_mid_pulse_does_not_cut_the_pulse_short() {
    let mut bench = bench_at(1_000_000);
    bench.write(ConfigField::TrigOutDuration, 3_000).expect("3 cycles");
    bench
        .write(ConfigField::IntensityDuration, 3_000)
        .expect("3 cycles");

    arm_and_fire(&mut bench);
    bench.set_arm(false);
    assert!(bench.tick().trig_out_active);
    assert!(bench.tick().trig_out_active);
    assert_eq!(bench.tick().current_state, ProbeState::Cooldown);
}

#[test]
fn global_enable_gates_arming_and_abandons_a_cycle() {
    let mut bench = bench_at(1_000_000);
    bench.write(ConfigField::TrigOutDuration, 10_000).expect("10 cycles");
    bench
        .write(ConfigField::IntensityDuration, 10_000)
        .expect("10 cycles");

    bench.set_enable(false);
    bench.set_arm(true);
    let outputs = bench.run(5);
    assert_eq!(outputs.current_state, ProbeState::Idle);
    assert!(!outputs.ready);

    bench.set_enable(true);
    assert_eq!(bench.tick().current_state, ProbeState::Armed);
    let fired = bench.pulse_trigger();
    assert!(fired.trig_out_active && fired.intensity_out_active);

    bench.set_enable(false);
    let outputs = bench.tick();
    assert_eq!(outputs.current_state, ProbeState::Idle);
    assert_safe_outside_firing(&outputs);
    assert!(!outputs.busy && !outputs.fault && !outputs.ready);
    assert_eq!(bench.fault_reason(), None);
    assert!(bench.telemetry().oldest_first().any(|record| record.event
        == ProbeEvent::StateChanged {
            from: ProbeState::Firing,
            to: ProbeState::Idle,
        }));

    // arm is still held, so re-enabling arms again
    bench.set_enable(true);
    let outputs = bench.tick();
    assert_eq!(outputs.current_state, ProbeState::Armed);
}

#[test]
fn global_enable_does_not_clear_a_latched_fault() {
    let mut bench = bench_at(1_000);
    bench.write(ConfigField::TriggerWaitTimeout, 1).expect("1 s");
    bench.set_arm(true);
    bench.run(1_001);
    assert_eq!(bench.outputs().current_state, ProbeState::Fault);

    bench.set_arm(false);
    bench.set_enable(false);
    assert_eq!(bench.tick().current_state, ProbeState::Fault);
    assert_eq!(bench.acknowledge_fault().current_state, ProbeState::Idle);
    assert!(!bench.outputs().ready);
}

#[test]
fn telemetry_records_the_firing_cycle_in_order() {
    let mut bench = bench_at(1_000_000);
    bench.write(ConfigField::CooldownInterval, 1).expect("1 us");

    arm_and_fire(&mut bench);
    bench.run(3);

    let events: heapless::Vec<ProbeEvent, 16> = bench
        .telemetry()
        .oldest_first()
        .map(|record| record.event)
        .collect();
    assert_eq!(
        events.as_slice(),
        &[
            ProbeEvent::StateChanged {
                from: ProbeState::Idle,
                to: ProbeState::Armed,
            },
            ProbeEvent::PulseStarted {
                trigger_cycles: 1,
                intensity_cycles: 1,
            },
            ProbeEvent::StateChanged {
                from: ProbeState::Armed,
                to: ProbeState::Firing,
            },
            ProbeEvent::PulseCompleted,
            ProbeEvent::StateChanged {
                from: ProbeState::Firing,
                to: ProbeState::Cooldown,
            },
            ProbeEvent::StateChanged {
                from: ProbeState::Cooldown,
                to: ProbeState::Idle,
            },
            ProbeEvent::StateChanged {
                from: ProbeState::Idle,
                to: ProbeState::Armed,
            },
        ]
    );
}
