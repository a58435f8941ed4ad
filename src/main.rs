// src/main.rs
mod acquisition;
mod config;
mod engine;
mod types;
use std::io;
use std::path::PathBuf;
use std::sync::mpsc;
use anyhow::Context;
use log::info;
use acquisition::{
    format_msps, AcquisitionSource, FrameProducer, FrameSink, SampleRateCoordinator, SimulatedAdc,
};
use config::{OutputFormat, ScopeConfig};
use engine::{JsonLinesSink, SummarySink};
fn main() -> anyhow::Result<()> {
    env_logger::init();
    let config = match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => ScopeConfig::load(&path)?,
        None => {
            let config = ScopeConfig::default();
            config.validate()?;
            config
        }
    };
    let seed = config.seed.unwrap_or_else(rand::random);
    let source = SimulatedAdc::new(
        config.backend,
        config.n_samples,
        config.vref,
        config.rate_grid.base_clock_hz,
        config.signal,
        config.calibration(),
        seed,
    );
    info!(
        "{} backend, {} samples per fetch, {} fps, seed {seed}",
        source.backend().name(),
        config.n_samples,
        config.update_fps
    );
    let calibration = &source.profile().calibration;
    info!(
        "settle {:?}, {} clock correction entries",
        calibration.settle,
        calibration.table.len()
    );
    let coordinator = SampleRateCoordinator::new(
        &config.rate_grid,
        config.fallback_rate,
        source.channel_count(),
        config.n_samples,
    )?;
    let mut producer = FrameProducer::new(
        source,
        coordinator,
        config.trigger,
        config.max_consecutive_failures,
    )?;
    producer
        .start(config.initial_sample_rate, &config.initial_channels)
        .context("failed to start acquisition")?;
    let rates = producer.coordinator().supported_rates();
    if let (Some(&min), Some(&max)) = (rates.first(), rates.last()) {
        info!("{} rates offered, {} .. {}", rates.len(), format_msps(min), format_msps(max));
    }
    let view = producer.reset()?;
    info!("view x {:?} s, y {:?} V", view.x, view.y);
    let (tx_cmd, rx_cmd) = mpsc::channel();
    engine::spawn_stdin_reader(tx_cmd);
    let mut sink: Box<dyn FrameSink> = match config.output {
        OutputFormat::Summary => Box::new(SummarySink),
        OutputFormat::Json => Box::new(JsonLinesSink::new(io::stdout())),
    };
    let stats = engine::run(
        &mut producer,
        sink.as_mut(),
        &rx_cmd,
        config.tick_period(),
        config.max_ticks,
    );
    producer.stop();
    engine::log_status(&producer);
    info!(
        "{} ticks: {} frames, {} skipped, {} dropped, {} overruns",
        stats.ticks, stats.frames, stats.skipped, stats.dropped, stats.overruns
    );
    Ok(())
}
