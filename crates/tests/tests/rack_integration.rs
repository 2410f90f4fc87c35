//! Racks built from presets and chains, driven block by block

use pedalboard_core::domain::{
    parameter_channel, AnalogClipperParameters, AnalogToneParameters, ChannelCount, DelayAlgorithm,
    DigitalDelayParameters, Processor, ProcessorChain, ProcessorKind, RackConfig, RackProcessor,
};
use pedalboard_tests::*;
use std::thread;

const BLOCK_FRAMES: usize = 256;

fn render(rack: &mut RackProcessor, input: &[f32]) -> Vec<f32> {
    let channels = usize::from(rack.channels().count());
    let mut output = input.to_vec();
    for block in output.chunks_mut(BLOCK_FRAMES * channels) {
        rack.process_block(block).unwrap();
    }
    output
}

#[test]
fn test_every_preset_renders_finite_audio() {
    let input = interleave(&generate_sine_wave(220.0, 0.5, 24_000), 2);

    for name in RackConfig::PRESET_NAMES {
        let config = RackConfig::preset(name).unwrap();
        config.validate().unwrap();

        let engine = config.engine;
        let mut rack = config
            .chain
            .create_processor(engine.sample_rate, engine.channels, engine.max_delay_ms);
        assert_eq!(rack.len(), config.chain.len());

        let output = render(&mut rack, &input);
        assert!(output.iter().all(|x| x.is_finite()), "preset {name} produced non-finite samples");
        assert!(output.iter().any(|&x| x != 0.0), "preset {name} is silent");
    }
}

#[test]
fn test_stereo_ping_pong_alternates_channels() {
    let mut chain = ProcessorChain::new();
    chain.add(ProcessorKind::DigitalDelay(DigitalDelayParameters {
        algorithm: DelayAlgorithm::PingPong,
        mix: 1.0,
        level_db: 0.0,
        feedback_pct: 50.0,
        left_delay_ms: 1.0,
        right_delay_ms: 2.0,
        ..Default::default()
    }));
    let mut rack = chain.create_processor(48_000, 2, 100.0);

    // impulse on the left input only
    let mut input = vec![0.0_f32; 2 * 1_024];
    input[0] = 1.0;
    let output = render(&mut rack, &input);

    let left = deinterleave(&output, 2, 0);
    let right = deinterleave(&output, 2, 1);

    // left input lands in the right line first, then bounces back at half level
    assert_eq!(right[96], 1.0);
    assert_eq!(left[96 + 48], 0.5);
    assert_eq!(right[96 + 48 + 96], 0.25);
    assert_eq!(left[..96 + 48].iter().filter(|&&x| x != 0.0).count(), 0);
}

#[test]
fn test_mono_rack_runs_delay_per_sample() {
    let mut chain = ProcessorChain::new();
    chain.add(ProcessorKind::DigitalDelay(DigitalDelayParameters {
        mix: 1.0,
        level_db: 0.0,
        left_delay_ms: 1.0,
        ..Default::default()
    }));
    let mut rack = chain.create_processor(48_000, 1, 100.0);
    assert_eq!(rack.channels(), ChannelCount::Mono);

    let mut input = vec![0.0_f32; 512];
    input[0] = 1.0;
    let output = render(&mut rack, &input);
    assert_eq!(output[48], 1.0);
}

#[test]
fn test_surround_rack_processes_channels_independently() {
    let mut chain = ProcessorChain::new();
    chain.add(ProcessorKind::AnalogTone(AnalogToneParameters::default()));
    let mut rack = chain.create_processor(48_000, 6, 100.0);
    assert_eq!(rack.channels(), ChannelCount::Surround(6));

    // only channel 3 carries signal
    let mono = generate_sine_wave(1_000.0, 0.5, 4_800);
    let mut input = vec![0.0_f32; mono.len() * 6];
    for (frame, &x) in input.chunks_exact_mut(6).zip(&mono) {
        frame[3] = x as f32;
    }
    let output = render(&mut rack, &input);

    for channel in 0..6 {
        let signal = deinterleave(&output, 6, channel);
        if channel == 3 {
            assert!(peak(&signal) > 0.01);
        } else {
            assert_eq!(peak(&signal), 0.0);
        }
    }
}

#[test]
fn test_control_thread_updates_live_rack() {
    let config = RackConfig::factory_default();
    let mut rack = config.chain.create_processor(48_000, 2, 100.0);
    let (sender, receiver) = parameter_channel(16);
    rack.attach_control(receiver);

    let input = interleave(&generate_sine_wave(440.0, 0.5, 4_800), 2);
    let before = rms(&deinterleave(&render(&mut rack, &input), 2, 0));

    let control = thread::spawn(move || {
        sender
            .update(0, ProcessorKind::AnalogTone(AnalogToneParameters { tone: 0.5, level: 0.5 }))
            .unwrap();
        sender
            .update(1, ProcessorKind::AnalogClipper(AnalogClipperParameters { drive: 0.0 }))
            .unwrap();
        sender.bypass(1, true).unwrap();
    });
    control.join().unwrap();

    rack.reset(48_000.0);
    let after = rms(&deinterleave(&render(&mut rack, &input), 2, 0));

    assert_eq!(rack.is_bypassed(1), Some(true));
    match rack.processor(0) {
        Some(Processor::AnalogTone(tone)) => assert_eq!(tone.parameters().level, 0.5),
        other => panic!("unexpected processor {other:?}"),
    }
    // halving the level pot roughly halves the output
    assert!(after < before * 0.7, "before {before}, after {after}");
}

#[test]
fn test_bad_control_messages_are_dropped() {
    let config = RackConfig::factory_default();
    let mut rack = config.chain.create_processor(48_000, 2, 100.0);
    let (sender, receiver) = parameter_channel(4);
    rack.attach_control(receiver);

    sender
        .update(0, ProcessorKind::AnalogClipper(AnalogClipperParameters { drive: 1.0 }))
        .unwrap();
    sender.bypass(9, true).unwrap();

    let mut buffer = interleave(&generate_sine_wave(440.0, 0.1, 256), 2);
    rack.process_block(&mut buffer).unwrap();

    assert_eq!(sender.pending(), 0);
    assert_eq!(rack.snapshot(), config.chain);
}

#[test]
fn test_snapshot_round_trips_through_config() {
    let config = RackConfig::preset("reliq").unwrap();
    let rack = config.chain.create_processor(48_000, 2, config.engine.max_delay_ms);
    let snapshot = rack.snapshot();
    assert_eq!(snapshot, config.chain);

    let text = toml::to_string_pretty(&RackConfig {
        engine: config.engine,
        chain: snapshot,
    })
    .unwrap();
    let parsed: RackConfig = toml::from_str(&text).unwrap();
    assert_eq!(parsed, config);
}
