//! End-to-end checks of the processors' documented behavior

use pedalboard_core::domain::dsp::analog::NEWTON_THRESHOLD;
use pedalboard_core::domain::dsp::*;
use pedalboard_tests::*;
use proptest::prelude::*;

fn reset<P: AudioSignalProcessor>(mut processor: P) -> P {
    assert!(processor.reset(SAMPLE_RATE));
    processor
}

fn run<P: AudioSignalProcessor>(processor: &mut P, input: &[f64]) -> Vec<f64> {
    input.iter().map(|&x| processor.process_audio_sample(x)).collect()
}

// ============================================================================
// All-pass stages
// ============================================================================

#[test]
fn test_apf1_unity_gain_and_quarter_turn_at_fc() {
    const FC: f64 = 1_000.0;
    for amplitude in [0.001, 0.25, 1.0] {
        let mut apf = reset(AudioFilter::with_parameters(AudioFilterParameters {
            algorithm: FilterAlgorithm::Apf1,
            fc: FC,
            ..Default::default()
        }));
        let output = run(&mut apf, &generate_sine_wave(FC, amplitude, 9_600));

        // second half: 100 whole periods of steady state
        let (gain, phase) = tone_response(&output[4_800..], FC, 4_800);
        assert!((gain / amplitude - 1.0).abs() < 1e-6, "gain {gain} at amplitude {amplitude}");
        assert!((phase + std::f64::consts::FRAC_PI_2).abs() < 1e-6, "phase {phase}");
    }
}

#[test]
fn test_apf2_unity_gain_and_half_turn_at_fc() {
    const FC: f64 = 2_000.0;
    for amplitude in [0.01, 1.0] {
        let mut apf = reset(AudioFilter::with_parameters(AudioFilterParameters {
            algorithm: FilterAlgorithm::Apf2,
            fc: FC,
            q: 0.707,
            ..Default::default()
        }));
        let output = run(&mut apf, &generate_sine_wave(FC, amplitude, 9_600));
        let (gain, phase) = tone_response(&output[4_800..], FC, 4_800);
        assert!((gain / amplitude - 1.0).abs() < 1e-6);
        assert!((phase.abs() - std::f64::consts::PI).abs() < 1e-6, "phase {phase}");
    }
}

#[test]
fn test_zva_apf1_is_flat() {
    let mut apf = reset(ZvaFilter::with_parameters(ZvaFilterParameters {
        algorithm: VaFilterAlgorithm::Apf1,
        fc: 500.0,
        ..Default::default()
    }));
    for frequency in [100.0, 500.0, 4_000.0] {
        apf.reset(SAMPLE_RATE);
        let output = run(&mut apf, &generate_sine_wave(frequency, 0.5, 9_600));
        let (gain, _) = tone_response(&output[4_800..], frequency, 4_800);
        assert!((gain - 0.5).abs() < 1e-3, "gain {gain} at {frequency} Hz");
    }
}

// ============================================================================
// Delay line
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn delay_reproduces_input_after_integer_delay(
        delay_samples in 1usize..2_000,
        input in proptest::collection::vec(-1.0f64..1.0, 1..3_000),
    ) {
        let mut delay = reset(DigitalDelay::new().with_buffer_length(100.0));
        delay.set_parameters(DigitalDelayParameters {
            mix: 1.0,
            level_db: 0.0,
            feedback_pct: 0.0,
            left_delay_ms: delay_samples as f64 * 1000.0 / SAMPLE_RATE,
            right_delay_ms: 0.0,
            ..Default::default()
        });
        let (left, _) = delay.delay_in_samples();
        prop_assume!(left.fract() == 0.0);

        let output = run(&mut delay, &input);
        let d = left as usize;
        for (i, &y) in output.iter().enumerate() {
            let expected = if i >= d { input[i - d] } else { 0.0 };
            prop_assert_eq!(y, expected);
        }
    }
}

#[test]
fn test_stereo_delay_times_are_independent() {
    let mut delay = reset(DigitalDelay::new());
    delay.set_parameters(DigitalDelayParameters {
        mix: 1.0,
        level_db: 0.0,
        left_delay_ms: 1.0,
        right_delay_ms: 2.0,
        ..Default::default()
    });

    let mut out = [0.0_f32; 2];
    let mut frames = Vec::new();
    delay.process_audio_frame(&[1.0, 1.0], &mut out).unwrap();
    frames.push(out);
    for _ in 0..200 {
        delay.process_audio_frame(&[0.0, 0.0], &mut out).unwrap();
        frames.push(out);
    }
    assert_eq!(frames[48], [1.0, 0.0]);
    assert_eq!(frames[96], [0.0, 1.0]);
}

// ============================================================================
// Envelope detector
// ============================================================================

#[test]
fn test_detector_attack_is_monotonic_and_converges() {
    const ATTACK_MS: f64 = 5.0;
    let time_constant = (ATTACK_MS * SAMPLE_RATE / 1000.0) as usize;

    for target in [0.1, 0.5, 0.9] {
        let mut detector = reset(AudioDetector::with_parameters(AudioDetectorParameters {
            attack_time_ms: ATTACK_MS,
            release_time_ms: 200.0,
            detect_mode: DetectMode::Peak,
            ..Default::default()
        }));

        let mut last = 0.0;
        let mut envelope = Vec::new();
        for _ in 0..12 * time_constant {
            let env = detector.process_audio_sample(target);
            assert!(env >= last);
            last = env;
            envelope.push(env);
        }

        let after_one = envelope[time_constant - 1];
        assert!(after_one >= target * (1.0 - (-1.0f64).exp()) - 1e-9);
        assert!((last - target).abs() < target * 1e-4);
    }
}

#[test]
fn test_detector_release_decays() {
    let mut detector = reset(AudioDetector::with_parameters(AudioDetectorParameters {
        attack_time_ms: 0.0,
        release_time_ms: 10.0,
        ..Default::default()
    }));
    assert_eq!(detector.process_audio_sample(0.8), 0.8);

    let mut last = 0.8;
    for _ in 0..4_800 {
        let env = detector.process_audio_sample(0.0);
        assert!(env <= last);
        last = env;
    }
    assert!(last < 1e-3);
}

// ============================================================================
// Diode clipper
// ============================================================================

#[test]
fn test_clipper_zero_drive_is_linear() {
    let mut quiet = reset(AnalogClipper::with_parameters(AnalogClipperParameters { drive: 0.0 }));
    let output = run(&mut quiet, &generate_sine_wave(1_000.0, 0.001, 9_600));

    let spectrum = magnitude_spectrum(&output[4_800..]);
    let fundamental = bin_for(1_000.0, 4_800);
    assert!(relative_db(&spectrum, 3 * fundamental, fundamental) < -80.0);
    assert!(relative_db(&spectrum, 2 * fundamental, fundamental) < -80.0);
}

#[test]
fn test_clipper_full_drive_bounds_output() {
    let mut clipper = reset(AnalogClipper::with_parameters(AnalogClipperParameters { drive: 1.0 }));
    let input = generate_sine_wave(1_000.0, 1.0, 9_600);
    let mut output = Vec::with_capacity(input.len());
    for &x in &input {
        let y = clipper.process_audio_sample(x);
        assert!(y.is_finite());
        assert!(clipper.last_solve().residual <= NEWTON_THRESHOLD);
        output.push(y);
    }

    // diode conduction limits the stage to roughly one diode drop above the input
    assert!(peak(&output) < 2.0);

    let spectrum = magnitude_spectrum(&output[4_800..]);
    let fundamental = bin_for(1_000.0, 4_800);
    // symmetric diodes: strong odd harmonics, no even ones
    assert!(relative_db(&spectrum, 3 * fundamental, fundamental) > -30.0);
    assert!(relative_db(&spectrum, 2 * fundamental, fundamental) < -60.0);
}

// ============================================================================
// Phaser
// ============================================================================

#[test]
fn test_phaser_without_intensity_is_plain_cascade() {
    let parameters = PhaserParameters {
        lfo_depth_pct: 0.0,
        intensity_pct: 0.0,
        apf_ranges: PhaserRangeSet::Ideal,
        mix_design: PhaserMixDesign::MinusThreeDb,
        ..Default::default()
    };
    let mut phaser = reset(Phaser::with_parameters(parameters));

    let mut stages: Vec<AudioFilter> = PhaserRangeSet::Ideal
        .ranges()
        .iter()
        .map(|&(min, max)| {
            reset(AudioFilter::with_parameters(AudioFilterParameters {
                algorithm: FilterAlgorithm::Apf1,
                fc: (min + max) / 2.0,
                ..Default::default()
            }))
        })
        .collect();
    let (dry, wet) = PhaserMixDesign::MinusThreeDb.coefficients();

    for x in generate_sine_wave(1_234.0, 0.8, 4_800) {
        let y = phaser.process_audio_sample(x);
        assert_eq!(phaser.feedback_normalizer(), 1.0);

        let cascade = stages.iter_mut().fold(x, |u, apf| apf.process_audio_sample(u));
        assert!((y - (dry * x + wet * cascade)).abs() < 1e-12);
    }
}

// ============================================================================
// Auto-Q
// ============================================================================

#[test]
fn test_auto_q_quiet_input_never_moves_cutoff() {
    let mut follower = reset(AutoQEnvelopeFollower::new());
    let base = follower.parameters().fc;

    let input: Vec<f64> = generate_sine_wave(200.0, 0.1, 24_000)
        .iter()
        .zip(generate_sine_wave(8_000.0, 0.1, 24_000))
        .map(|(a, b)| a + b)
        .collect();
    let output: Vec<f64> = input
        .iter()
        .map(|&x| {
            let y = follower.process_audio_sample(x);
            assert_eq!(follower.current_fc(), base);
            y
        })
        .collect();

    // 8 kHz sits three octaves above the 1 kHz low-pass
    let spectrum = magnitude_spectrum(&output[24_000 - 4_800..]);
    let low = bin_for(200.0, 4_800);
    let high = bin_for(8_000.0, 4_800);
    assert!(relative_db(&spectrum, high, low) < -20.0);
}

#[test]
fn test_auto_q_threshold_is_strict() {
    let follower = AutoQEnvelopeFollower::with_parameters(AutoQParameters {
        threshold_db: -12.0,
        ..Default::default()
    });
    let threshold = math::db_to_linear(-12.0);
    assert_eq!(follower.modulated_fc(threshold), follower.parameters().fc);
    assert!(follower.modulated_fc(threshold * 1.01) > follower.parameters().fc);
}

// ============================================================================
// Parameter-equality gating
// ============================================================================

#[test]
fn test_identical_parameters_never_recompute() {
    let mut zva = reset(ZvaFilter::new());
    let zva_params = ZvaFilterParameters {
        fc: 2_500.0,
        q: 3.0,
        ..Default::default()
    };
    zva.set_parameters(zva_params);

    let mut biquad = reset(AudioFilter::new());
    let biquad_params = AudioFilterParameters {
        algorithm: FilterAlgorithm::PeakingEq,
        fc: 800.0,
        q: 2.0,
        boost_cut_db: 6.0,
    };
    biquad.set_parameters(biquad_params);

    let mut detector = reset(AudioDetector::new());
    let detector_params = AudioDetectorParameters {
        attack_time_ms: 3.0,
        ..Default::default()
    };
    detector.set_parameters(detector_params);

    let mut tone = reset(AnalogTone::new());
    let tone_params = AnalogToneParameters { tone: 0.3, level: 0.9 };
    tone.set_parameters(tone_params);

    let mut clipper = reset(AnalogClipper::new());
    let clipper_params = AnalogClipperParameters { drive: 0.7 };
    clipper.set_parameters(clipper_params);

    let before = [
        zva.coefficient_updates(),
        biquad.coefficient_updates(),
        detector.coefficient_updates(),
        tone.coefficient_updates(),
        clipper.coefficient_updates(),
    ];
    for _ in 0..1_000 {
        zva.set_parameters(zva_params);
        biquad.set_parameters(biquad_params);
        detector.set_parameters(detector_params);
        tone.set_parameters(tone_params);
        clipper.set_parameters(clipper_params);
    }
    let after = [
        zva.coefficient_updates(),
        biquad.coefficient_updates(),
        detector.coefficient_updates(),
        tone.coefficient_updates(),
        clipper.coefficient_updates(),
    ];
    assert_eq!(before, after);
}

#[test]
fn test_sub_epsilon_changes_are_ignored() {
    let mut tone = AnalogTone::new();
    let count = tone.coefficient_updates();
    tone.set_parameters(AnalogToneParameters {
        tone: 0.5 + 1e-9,
        level: 0.5,
    });
    assert_eq!(tone.coefficient_updates(), count);
}
