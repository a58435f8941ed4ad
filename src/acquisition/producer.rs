use log::{debug, error, info, warn};
use crate::acquisition::coordinator::SampleRateCoordinator;
use crate::acquisition::error::ScopeError;
use crate::acquisition::frame::{ViewRange, WaveformFrame};
use crate::acquisition::source::{AcquisitionSource, RawCapture};
use crate::acquisition::trigger::{Thresholds, TriggerConfig, TriggerEngine, TriggerMode};
/// Renderer side of the pipeline. Receives the frames of one tick.
pub trait FrameSink {
    fn present(&mut self, frames: &[WaveformFrame]);
}
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    Paused,
    NoActiveChannels,
    Faulted,
}
#[derive(Debug, PartialEq)]
pub enum TickOutcome {
    /// Nothing fetched; the renderer keeps showing the previous frame.
    Skipped(SkipReason),
    /// One frame per active channel, in channel order.
    Emitted {
        frames: Vec<WaveformFrame>,
        oneshot_paused: bool,
    },
    /// Fetch or processing failed for this tick only.
    Dropped(ScopeError),
}
/// Per-tick orchestrator plus the control surface that mutates its settings.
///
/// All methods take `&mut self`, and the tick loop owns the producer, so the
/// control calls run on the tick thread between ticks. Sharing it with another
/// thread needs external synchronization (e.g. a `Mutex` around the whole
/// producer); settings are never locked individually.
pub struct FrameProducer<S: AcquisitionSource> {
    source: S,
    coordinator: SampleRateCoordinator,
    trigger: TriggerConfig,
    paused: bool,
    consecutive_failures: u32,
    max_consecutive_failures: u32,
    faulted: bool,
}
impl<S: AcquisitionSource> FrameProducer<S> {
    pub fn new(
        source: S,
        coordinator: SampleRateCoordinator,
        trigger: TriggerConfig,
        max_consecutive_failures: u32,
    ) -> Result<Self, ScopeError> {
        trigger.validate()?;
        Ok(Self {
            source,
            coordinator,
            trigger,
            paused: false,
            consecutive_failures: 0,
            max_consecutive_failures: max_consecutive_failures.max(1),
            faulted: false,
        })
    }
    /// Applies the startup rate, then enables `channels` in order.
    pub fn start(&mut self, sample_rate: u32, channels: &[usize]) -> Result<(), ScopeError> {
        self.set_sample_rate(sample_rate)?;
        for &channel in channels {
            self.toggle_channel(channel)?;
        }
        Ok(())
    }
    pub fn stop(&mut self) {
        self.source.stop_sampling();
        info!("sampling stopped");
    }
    pub fn set_sample_rate(&mut self, rate: u32) -> Result<u32, ScopeError> {
        self.coordinator.set_sample_rate(&mut self.source, rate)
    }
    pub fn toggle_channel(&mut self, index: usize) -> Result<(), ScopeError> {
        self.coordinator.toggle_channel(&mut self.source, index)?;
        debug_assert_eq!(
            self.coordinator.active_channel_count(),
            self.source.active_channel_count()
        );
        Ok(())
    }
    pub fn set_trigger_mode(&mut self, mode: TriggerMode) {
        info!("trigger mode {mode}");
        self.trigger.mode = mode;
    }
    pub fn set_auto_range(&mut self, auto_range: bool) {
        info!("auto-range {}", if auto_range { "on" } else { "off" });
        self.trigger.auto_range = auto_range;
    }
    pub fn set_fixed_thresholds(&mut self, thresholds: Thresholds) -> Result<(), ScopeError> {
        thresholds.validate()?;
        info!("trigger levels {:.2}/{:.2} V", thresholds.low, thresholds.high);
        self.trigger.fixed_thresholds = thresholds;
        Ok(())
    }
    pub fn toggle_paused(&mut self) -> bool {
        self.paused = !self.paused;
        info!("{}", if self.paused { "paused" } else { "resumed" });
        self.paused
    }
    pub fn toggle_oneshot(&mut self) -> bool {
        self.trigger.oneshot = !self.trigger.oneshot;
        info!("one-shot {}", if self.trigger.oneshot { "armed" } else { "off" });
        self.trigger.oneshot
    }
    /// Clears a sustained-failure fault and returns the default view extents.
    pub fn reset(&mut self) -> Result<ViewRange, ScopeError> {
        if self.faulted {
            info!("clearing acquisition fault");
        }
        self.faulted = false;
        self.consecutive_failures = 0;
        ViewRange::for_acquisition(
            self.source.n_samples(),
            self.coordinator.sample_rate(),
            self.source.vref(),
        )
    }
    pub fn is_paused(&self) -> bool {
        self.paused
    }
    pub fn is_faulted(&self) -> bool {
        self.faulted
    }
    pub fn trigger_config(&self) -> TriggerConfig {
        self.trigger
    }
    pub fn coordinator(&self) -> &SampleRateCoordinator {
        &self.coordinator
    }
    pub fn source(&self) -> &S {
        &self.source
    }
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }
    pub fn tick(&mut self) -> TickOutcome {
        if self.faulted {
            return TickOutcome::Skipped(SkipReason::Faulted);
        }
        if self.paused {
            return TickOutcome::Skipped(SkipReason::Paused);
        }
        if self.coordinator.active_channel_count() == 0 {
            return TickOutcome::Skipped(SkipReason::NoActiveChannels);
        }
        // settings are read once; changes land on the next tick
        let trigger = self.trigger;
        let sample_rate = self.coordinator.sample_rate();
        let capture = match self.source.get_buffers() {
            Ok(capture) => {
                self.consecutive_failures = 0;
                debug!(
                    "fetched {} channel(s) x {} samples",
                    capture.num_channels(),
                    capture.samples_per_channel()
                );
                capture
            }
            Err(err) => return self.record_failure(err),
        };
        let frames = match self.build_frames(&capture, sample_rate, &trigger) {
            Ok(frames) => frames,
            Err(err) => {
                warn!("dropping frame: {err}");
                return TickOutcome::Dropped(err);
            }
        };
        let oneshot_paused = trigger.oneshot && frames.iter().any(|f| f.triggered);
        if oneshot_paused {
            self.paused = true;
            info!("one-shot trigger captured; paused");
        }
        TickOutcome::Emitted {
            frames,
            oneshot_paused,
        }
    }
    fn record_failure(&mut self, err: ScopeError) -> TickOutcome {
        self.consecutive_failures += 1;
        if self.consecutive_failures >= self.max_consecutive_failures {
            self.faulted = true;
            error!(
                "acquisition failed {} times in a row, halting until reset: {err}",
                self.consecutive_failures
            );
        } else {
            warn!("acquisition fetch failed, skipping frame: {err}");
        }
        TickOutcome::Dropped(err)
    }
    fn build_frames(
        &self,
        capture: &RawCapture,
        sample_rate: u32,
        trigger: &TriggerConfig,
    ) -> Result<Vec<WaveformFrame>, ScopeError> {
        if sample_rate == 0 {
            return Err(ScopeError::ZeroSampleRate);
        }
        let active = self.coordinator.active_channels();
        if capture.channels != active {
            // source broke its contract; fatal in debug builds, a skipped tick otherwise
            let message = format!(
                "capture channels {:?} do not match active channels {active:?}",
                capture.channels
            );
            debug_assert!(capture.channels == active, "{message}");
            return Err(ScopeError::Acquisition(message));
        }
        let calibration = &self.source.profile().calibration;
        let clock_hz = self.source.clock_hz(sample_rate);
        let mut frames = Vec::with_capacity(capture.num_channels());
        for (row, &channel) in capture.channels.iter().enumerate() {
            let (values, ticks) = capture.row(row);
            let mut buffer = calibration.apply(values, ticks, sample_rate, clock_hz)?;
            let outcome = TriggerEngine::apply(trigger, &buffer.samples, &mut buffer.timestamps);
            debug!(
                "channel {channel}: {} samples, trigger {:?}",
                buffer.samples.len(),
                outcome.trigger_index
            );
            frames.push(WaveformFrame::new(
                channel,
                buffer.samples,
                buffer.timestamps,
                outcome,
            ));
        }
        debug_assert!(frames.iter().all(WaveformFrame::is_consistent));
        Ok(frames)
    }
}
