// src/engine.rs
use std::io::{self, BufRead, Write};
use std::sync::mpsc::{Receiver, Sender, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};
use log::{debug, error, info, warn};
use crate::acquisition::{
    format_msps, AcquisitionSource, FrameProducer, FrameSink, TickOutcome, WaveformFrame,
};
use crate::types::ControlCommand;
/// Logs one line per frame.
pub struct SummarySink;
impl FrameSink for SummarySink {
    fn present(&mut self, frames: &[WaveformFrame]) {
        for frame in frames {
            let trigger = match frame.trigger_index {
                Some(index) => format!("at sample {index}"),
                None => "none".to_owned(),
            };
            info!(
                "ch{}: {} samples over {:.1} us, trigger {} (levels {:.2}/{:.2} V)",
                frame.channel,
                frame.sample_count(),
                frame.duration_seconds() * 1e6,
                trigger,
                frame.thresholds.low,
                frame.thresholds.high
            );
        }
    }
}
/// Writes every frame as one JSON object per line.
pub struct JsonLinesSink<W: Write> {
    writer: W,
}
impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
    fn write_frame(&mut self, frame: &WaveformFrame) -> io::Result<()> {
        serde_json::to_writer(&mut self.writer, frame)?;
        self.writer.write_all(b"\n")
    }
}
impl<W: Write> FrameSink for JsonLinesSink<W> {
    fn present(&mut self, frames: &[WaveformFrame]) {
        for frame in frames {
            if let Err(err) = self.write_frame(frame) {
                warn!("failed to write frame for ch{}: {err}", frame.channel);
            }
        }
        if let Err(err) = self.writer.flush() {
            warn!("failed to flush frame output: {err}");
        }
    }
}
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickStats {
    pub ticks: u64,
    pub frames: u64,
    pub skipped: u64,
    pub dropped: u64,
    pub overruns: u64,
}
enum Flow {
    Continue,
    Quit,
}
/// Fixed-period tick loop. Commands queued on `commands` are applied at the
/// start of a tick, so they take effect on that tick's fetch at the earliest.
pub fn run<S, K>(
    producer: &mut FrameProducer<S>,
    sink: &mut K,
    commands: &Receiver<ControlCommand>,
    period: Duration,
    max_ticks: Option<u64>,
) -> TickStats
where
    S: AcquisitionSource,
    K: FrameSink + ?Sized,
{
    let mut stats = TickStats::default();
    let mut deadline = Instant::now();
    let mut commands_open = true;
    while !matches!(max_ticks, Some(max) if stats.ticks >= max) {
        while commands_open {
            match commands.try_recv() {
                Ok(command) => {
                    if let Flow::Quit = apply_command(producer, command) {
                        info!("quit requested after {} ticks", stats.ticks);
                        return stats;
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    debug!("control channel closed");
                    commands_open = false;
                }
            }
        }
        let started = Instant::now();
        match producer.tick() {
            TickOutcome::Emitted { frames, .. } => {
                stats.frames += frames.len() as u64;
                sink.present(&frames);
            }
            TickOutcome::Skipped(_) => stats.skipped += 1,
            TickOutcome::Dropped(_) => stats.dropped += 1,
        }
        stats.ticks += 1;
        let elapsed = started.elapsed();
        if elapsed > period {
            stats.overruns += 1;
            warn!("tick took {elapsed:?}, longer than the {period:?} period");
        }
        deadline += period;
        let now = Instant::now();
        if deadline > now {
            thread::sleep(deadline - now);
        } else {
            // behind schedule: start the next period now instead of bursting
            deadline = now;
        }
    }
    stats
}
fn apply_command<S: AcquisitionSource>(
    producer: &mut FrameProducer<S>,
    command: ControlCommand,
) -> Flow {
    let result = match command {
        ControlCommand::SetSampleRate(rate) => producer.set_sample_rate(rate).map(|_| ()),
        ControlCommand::ToggleChannel(index) => producer.toggle_channel(index),
        ControlCommand::SetTriggerMode(mode) => {
            producer.set_trigger_mode(mode);
            Ok(())
        }
        ControlCommand::SetAutoRange(enabled) => {
            producer.set_auto_range(enabled);
            Ok(())
        }
        ControlCommand::SetLevels(thresholds) => producer.set_fixed_thresholds(thresholds),
        ControlCommand::TogglePaused => {
            producer.toggle_paused();
            Ok(())
        }
        ControlCommand::ToggleOneshot => {
            producer.toggle_oneshot();
            Ok(())
        }
        ControlCommand::Reset => producer
            .reset()
            .map(|view| info!("view reset: x {:?} s, y {:?} V", view.x, view.y)),
        ControlCommand::Status => {
            log_status(producer);
            Ok(())
        }
        ControlCommand::Quit => return Flow::Quit,
    };
    if let Err(err) = result {
        if err.is_config() {
            warn!("request rejected: {err}");
        } else {
            error!("request failed: {err}");
        }
    }
    Flow::Continue
}
pub fn log_status<S: AcquisitionSource>(producer: &FrameProducer<S>) {
    let coordinator = producer.coordinator();
    let acquisition = coordinator.config();
    let trigger = producer.trigger_config();
    info!(
        "{} backend at {} x {} samples | channels {:?} | trigger {} (auto-range {}, one-shot {}) | paused {} | faulted {}",
        producer.source().profile().name,
        format_msps(acquisition.sample_rate),
        acquisition.buffer_size,
        acquisition.active_channels,
        trigger.mode,
        trigger.auto_range,
        trigger.oneshot,
        producer.is_paused(),
        producer.is_faulted()
    );
    let max_offered = coordinator.supported_rates().contains(&coordinator.max_rate());
    info!(
        "{} rates offered, {} {} (fallback {})",
        coordinator.supported_rates().len(),
        format_msps(coordinator.max_rate()),
        if max_offered { "available" } else { "withdrawn" },
        format_msps(coordinator.fallback_rate())
    );
}
/// Parses stdin lines into commands. Holds no scope state; exits at EOF or
/// once the tick loop hangs up.
pub fn spawn_stdin_reader(tx: Sender<ControlCommand>) {
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            match line.parse::<ControlCommand>() {
                Ok(command) => {
                    let quit = command == ControlCommand::Quit;
                    if tx.send(command).is_err() || quit {
                        break;
                    }
                }
                Err(err) => warn!("{err}"),
            }
        }
    });
}
