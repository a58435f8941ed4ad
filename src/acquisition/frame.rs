use serde::Serialize;
use crate::acquisition::trigger::{Thresholds, TriggerOutcome};
use crate::acquisition::ScopeError;
/// One renderable trace for one channel, produced fresh every tick.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WaveformFrame {
    pub channel: usize,
    pub samples: Vec<f32>,
    pub timestamps: Vec<f64>, // seconds, zero at the trigger point when triggered
    pub triggered: bool,
    pub trigger_index: Option<usize>,
    pub thresholds: Thresholds,
}
impl WaveformFrame {
    pub fn new(channel: usize, samples: Vec<f32>, timestamps: Vec<f64>, outcome: TriggerOutcome) -> Self {
        debug_assert_eq!(samples.len(), timestamps.len());
        Self {
            channel,
            samples,
            timestamps,
            triggered: outcome.triggered(),
            trigger_index: outcome.trigger_index,
            thresholds: outcome.thresholds,
        }
    }
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }
    /// Length and trigger-index invariants a renderer can rely on.
    pub fn is_consistent(&self) -> bool {
        if self.samples.len() != self.timestamps.len() {
            return false;
        }
        match (self.triggered, self.trigger_index) {
            (false, None) => true,
            (true, Some(index)) => index < self.sample_count() && self.timestamps[index] == 0.0,
            _ => false,
        }
    }
    pub fn duration_seconds(&self) -> f64 {
        match (self.timestamps.first(), self.timestamps.last()) {
            (Some(first), Some(last)) => last - first,
            _ => 0.0,
        }
    }
}
/// Default plot extents: one buffer's worth of time by the source's reference range.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ViewRange {
    pub x: (f32, f32),
    pub y: (f32, f32),
}
impl ViewRange {
    pub fn for_acquisition(n_samples: usize, sample_rate: u32, vref: (f32, f32)) -> Result<Self, ScopeError> {
        if sample_rate == 0 {
            return Err(ScopeError::ZeroSampleRate);
        }
        Ok(Self {
            x: (0.0, n_samples as f32 / sample_rate as f32),
            y: vref,
        })
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    fn outcome(trigger_index: Option<usize>) -> TriggerOutcome {
        TriggerOutcome {
            trigger_index,
            thresholds: Thresholds::default(),
        }
    }
    #[test]
    fn consistency_checks_trigger_index() {
        let frame = WaveformFrame::new(0, vec![1.0, 2.0], vec![-0.5, 0.0], outcome(Some(1)));
        assert!(frame.is_consistent());
        assert_eq!(frame.duration_seconds(), 0.5);
        let stale = WaveformFrame::new(0, vec![1.0, 2.0], vec![0.0, 0.5], outcome(Some(1)));
        assert!(!stale.is_consistent());
        let untriggered = WaveformFrame::new(0, vec![1.0], vec![0.25], outcome(None));
        assert!(untriggered.is_consistent());
        assert!(!untriggered.triggered);
    }
    #[test]
    fn view_range_spans_one_buffer() {
        let view = ViewRange::for_acquisition(4096, 5_000_000, (0.0, 5.23)).unwrap();
        assert!((view.x.1 - 4096.0 / 5e6).abs() < 1e-9);
        assert_eq!(view.y, (0.0, 5.23));
        assert_eq!(
            ViewRange::for_acquisition(4096, 0, (0.0, 1.0)),
            Err(ScopeError::ZeroSampleRate)
        );
    }
}
