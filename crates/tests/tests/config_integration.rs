//! Rack configuration files on disk

use pedalboard_core::domain::{
    AnalogClipperParameters, ConfigError, DelayAlgorithm, EngineConfig, ProcessorKind, RackConfig,
    SideChainParameters,
};
use tempfile::TempDir;

#[tokio::test]
async fn test_every_preset_survives_save_and_load() {
    let temp_dir = TempDir::new().unwrap();

    for name in RackConfig::PRESET_NAMES {
        let config = RackConfig::preset(name).unwrap();
        let path = temp_dir.path().join("presets").join(format!("{name}.toml"));

        config.save_to_file(&path).await.unwrap();
        let loaded = RackConfig::load_from_file(&path).await.unwrap();
        assert_eq!(loaded, config, "preset {name} changed on disk");
    }
}

#[tokio::test]
async fn test_missing_file_falls_back_to_factory_default() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("absent.toml");

    let config = RackConfig::load_or_default(&path).await.unwrap();
    assert_eq!(config, RackConfig::factory_default());
    assert!(!path.exists());
}

#[tokio::test]
async fn test_hand_written_rack_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("rack.toml");

    let text = r#"
[engine]
sample_rate = 44100
channels = 2

[[chain.processors]]
type = "DigitalDelay"

[chain.processors.params]
algorithm = "PingPong"
left_delay_ms = 300.0
right_delay_ms = 450.0
feedback_pct = 35.0

[chain.processors.params.side_chain]
mode = "Ducking"

[[chain.processors]]
type = "AnalogClipper"

[chain.processors.params]
drive = 0.8
"#;
    tokio::fs::write(&path, text).await.unwrap();

    let config = RackConfig::load_from_file(&path).await.unwrap();
    assert_eq!(config.engine.sample_rate, 44_100);
    assert_eq!(config.engine.block_size, EngineConfig::default().block_size);

    let kinds = config.chain.kinds();
    assert_eq!(kinds.len(), 2);
    match &kinds[0] {
        ProcessorKind::DigitalDelay(p) => {
            assert_eq!(p.algorithm, DelayAlgorithm::PingPong);
            assert_eq!(p.right_delay_ms, 450.0);
            assert_eq!(p.mix, 0.5);
            assert!(matches!(p.side_chain, SideChainParameters::Ducking(_)));
        }
        other => panic!("unexpected processor {other:?}"),
    }
    assert_eq!(
        kinds[1],
        ProcessorKind::AnalogClipper(AnalogClipperParameters { drive: 0.8 })
    );

    let mut rack = config
        .chain
        .create_processor(config.engine.sample_rate, config.engine.channels, config.engine.max_delay_ms);
    let mut buffer = vec![0.25_f32; 2 * 128];
    rack.process_block(&mut buffer).unwrap();
    assert!(buffer.iter().all(|x| x.is_finite()));
}

#[tokio::test]
async fn test_out_of_range_rack_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("rack.toml");

    let text = r#"
[[chain.processors]]
type = "DigitalDelay"

[chain.processors.params]
left_delay_ms = 5000.0
"#;
    tokio::fs::write(&path, text).await.unwrap();

    let result = RackConfig::load_from_file(&path).await;
    assert!(matches!(result, Err(ConfigError::Invalid(_))));
}

#[tokio::test]
async fn test_malformed_rack_is_a_parse_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("rack.toml");
    tokio::fs::write(&path, "[engine\nsample_rate = ").await.unwrap();

    let result = RackConfig::load_from_file(&path).await;
    assert!(matches!(result, Err(ConfigError::TomlParse(_))));
}

#[test]
fn test_unknown_preset() {
    assert!(matches!(
        RackConfig::preset("fuzz_factory"),
        Err(ConfigError::PresetNotFound(name)) if name == "fuzz_factory"
    ));
}
