//! Pedalboard CLI: render a test signal through a configured rack

use anyhow::Context;
use clap::{Parser, ValueEnum};
use pedalboard_core::domain::dsp::math::linear_to_db;
use pedalboard_core::domain::RackConfig;
use std::f64::consts::PI;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Signal {
    Sine,
    Impulse,
    /// Exponential sweep from 20 Hz to 20 kHz
    Sweep,
}

#[derive(Parser)]
#[command(name = "pedalboard")]
#[command(about = "Render test signals through a pedal rack", long_about = None)]
struct Cli {
    /// Rack configuration file (defaults to the user config directory)
    #[arg(short, long, conflicts_with = "preset")]
    config: Option<PathBuf>,

    /// Built-in rack: auto_q, phaser, reliq, memento, howler, factory_default
    #[arg(short, long)]
    preset: Option<String>,

    #[arg(long, value_enum, default_value_t = Signal::Sine)]
    signal: Signal,

    /// Sine frequency in Hz
    #[arg(long, default_value_t = 440.0)]
    frequency: f64,

    /// Peak amplitude (linear)
    #[arg(long, default_value_t = 0.5)]
    amplitude: f64,

    #[arg(long, default_value_t = 2.0)]
    seconds: f64,

    /// Save the effective rack as TOML
    #[arg(long)]
    write_config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Per-channel peak and sum of squares
#[derive(Debug, Clone, Default)]
struct Meter {
    peak: Vec<f64>,
    sum_squares: Vec<f64>,
    frames: usize,
}

impl Meter {
    fn new(channels: usize) -> Self {
        Self {
            peak: vec![0.0; channels],
            sum_squares: vec![0.0; channels],
            frames: 0,
        }
    }

    fn measure(&mut self, interleaved: &[f32]) {
        let channels = self.peak.len();
        for frame in interleaved.chunks_exact(channels) {
            for (c, &sample) in frame.iter().enumerate() {
                let x = f64::from(sample);
                self.peak[c] = self.peak[c].max(x.abs());
                self.sum_squares[c] += x * x;
            }
            self.frames += 1;
        }
    }

    fn report(&self, label: &str) {
        for (c, (peak, sum)) in self.peak.iter().zip(&self.sum_squares).enumerate() {
            let rms = (sum / self.frames.max(1) as f64).sqrt();
            info!(
                "{label} ch{c}: peak {:.2} dB, rms {:.2} dB",
                linear_to_db(*peak),
                linear_to_db(rms)
            );
        }
    }
}

fn render_signal(signal: Signal, frame: usize, sample_rate: f64, total_frames: usize, cli: &Cli) -> f64 {
    let t = frame as f64 / sample_rate;
    match signal {
        Signal::Sine => cli.amplitude * (2.0 * PI * cli.frequency * t).sin(),
        Signal::Impulse => {
            if frame == 0 {
                cli.amplitude
            } else {
                0.0
            }
        }
        Signal::Sweep => {
            let (f0, f1) = (20.0_f64, 20_000.0_f64);
            let duration = total_frames as f64 / sample_rate;
            let k = (f1 / f0).ln();
            let phase = 2.0 * PI * f0 * duration / k * ((t / duration * k).exp() - 1.0);
            cli.amplitude * phase.sin()
        }
    }
}

async fn load_rack(cli: &Cli) -> anyhow::Result<RackConfig> {
    if let Some(name) = &cli.preset {
        return RackConfig::preset(name).with_context(|| format!("Unknown preset '{name}'"));
    }

    let path = match &cli.config {
        Some(path) => path.clone(),
        None => RackConfig::default_config_path()?,
    };
    RackConfig::load_or_default(&path)
        .await
        .with_context(|| format!("Failed to load rack from {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();

    info!("Pedalboard starting...");

    let config = load_rack(&cli).await?;
    config.validate()?;

    if let Some(path) = &cli.write_config {
        config
            .save_to_file(path)
            .await
            .with_context(|| format!("Failed to write rack to {}", path.display()))?;
    }

    let engine = config.engine;
    let channels = usize::from(engine.channels);
    let sample_rate = f64::from(engine.sample_rate);
    let mut rack = config
        .chain
        .create_processor(engine.sample_rate, engine.channels, engine.max_delay_ms);

    let total_frames = (cli.seconds.max(0.0) * sample_rate) as usize;
    let block_frames = engine.block_size as usize;
    info!(
        "Rendering {:?} for {:.2}s through {} processor(s)",
        cli.signal,
        cli.seconds,
        rack.len()
    );

    let mut input_meter = Meter::new(channels);
    let mut output_meter = Meter::new(channels);
    let mut block = vec![0.0_f32; block_frames * channels];

    let mut frame = 0;
    while frame < total_frames {
        let frames = block_frames.min(total_frames - frame);
        let buffer = &mut block[..frames * channels];
        for (i, chunk) in buffer.chunks_exact_mut(channels).enumerate() {
            let x = render_signal(cli.signal, frame + i, sample_rate, total_frames, &cli) as f32;
            chunk.fill(x);
        }

        input_meter.measure(buffer);
        rack.process_block(buffer)?;
        output_meter.measure(buffer);
        frame += frames;
    }
    debug!(frames = frame, "Render finished");

    input_meter.report("input");
    output_meter.report("output");

    Ok(())
}
