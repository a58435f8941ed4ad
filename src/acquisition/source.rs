#[cfg(test)]
use std::collections::VecDeque;
use ndarray::{Array2, ArrayView1};
use crate::acquisition::calibration::Calibration;
#[cfg(test)]
use crate::acquisition::calibration::{CalibrationTable, SettlePolicy};
use crate::acquisition::ScopeError;
/// One fetch from the converter: a row of `(value, raw tick)` pairs per active channel.
#[derive(Clone, Debug, PartialEq)]
pub struct RawCapture {
    pub channels: Vec<usize>,
    pub values: Array2<f32>, // active channels x samples
    pub ticks: Array2<u64>,  // active channels x samples
}
impl RawCapture {
    pub fn empty() -> Self {
        Self {
            channels: Vec::new(),
            values: Array2::zeros((0, 0)),
            ticks: Array2::zeros((0, 0)),
        }
    }
    pub fn from_rows(rows: Vec<(usize, Vec<(f32, u64)>)>) -> Result<Self, ScopeError> {
        let n_samples = rows.first().map(|(_, row)| row.len()).unwrap_or(0);
        let mut channels = Vec::with_capacity(rows.len());
        let mut values = Vec::with_capacity(rows.len() * n_samples);
        let mut ticks = Vec::with_capacity(rows.len() * n_samples);
        for (channel, row) in rows {
            if row.len() != n_samples {
                return Err(ScopeError::Acquisition(format!(
                    "channel {channel} returned {} samples, expected {n_samples}",
                    row.len()
                )));
            }
            channels.push(channel);
            for (value, tick) in row {
                values.push(value);
                ticks.push(tick);
            }
        }
        let shape = (channels.len(), n_samples);
        let values = Array2::from_shape_vec(shape, values)
            .map_err(|e| ScopeError::Acquisition(e.to_string()))?;
        let ticks = Array2::from_shape_vec(shape, ticks)
            .map_err(|e| ScopeError::Acquisition(e.to_string()))?;
        Ok(Self {
            channels,
            values,
            ticks,
        })
    }
    /// Single-channel capture whose raw ticks are the sample indices.
    #[cfg(test)]
    pub fn indexed(channel: usize, samples: &[f32]) -> Self {
        let row = samples
            .iter()
            .enumerate()
            .map(|(i, &v)| (v, i as u64))
            .collect();
        // a single row can never be ragged
        Self::from_rows(vec![(channel, row)]).unwrap_or_else(|_| Self::empty())
    }
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }
    pub fn samples_per_channel(&self) -> usize {
        self.values.ncols()
    }
    pub fn row(&self, row: usize) -> (ArrayView1<'_, f32>, ArrayView1<'_, u64>) {
        (self.values.row(row), self.ticks.row(row))
    }
}
/// Parameters a backend variant hands to the calibration core.
#[derive(Clone, Debug, PartialEq)]
pub struct BackendProfile {
    pub name: &'static str,
    pub calibration: Calibration,
}
/// Hardware driver that keeps acquiring on its own and hands out the latest
/// complete buffer on request.
///
/// `get_buffers` is called on the tick thread and must return promptly; a
/// blocking fetch stalls every tick behind it.
pub trait AcquisitionSource {
    /// Starts (or re-times) continuous acquisition; returns the rate actually applied.
    fn start_sampling(&mut self, rate: u32) -> Result<u32, ScopeError>;
    fn stop_sampling(&mut self);
    fn get_buffers(&mut self) -> Result<RawCapture, ScopeError>;
    /// Callers validate `index < channel_count()` first.
    fn toggle_channel(&mut self, index: usize);
    fn active_channel_count(&self) -> usize;
    fn channel_count(&self) -> usize;
    fn n_samples(&self) -> usize;
    fn vref(&self) -> (f32, f32);
    fn profile(&self) -> &BackendProfile;
    /// Converter clock driving acquisition at `rate`; keys the calibration table.
    fn clock_hz(&self, rate: u32) -> u32 {
        rate
    }
}
/// In-memory source that replays queued captures in order.
#[cfg(test)]
pub struct ScriptedSource {
    queue: VecDeque<Result<RawCapture, ScopeError>>,
    active: Vec<bool>,
    n_samples: usize,
    vref: (f32, f32),
    profile: BackendProfile,
    started: Vec<u32>,
    rejected: Vec<u32>,
}
#[cfg(test)]
impl ScriptedSource {
    pub fn new(channel_count: usize, n_samples: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            active: vec![false; channel_count],
            n_samples,
            vref: (0.0, 5.0),
            profile: BackendProfile {
                name: "scripted",
                calibration: Calibration::new(SettlePolicy::Samples(0), CalibrationTable::default()),
            },
            started: Vec::new(),
            rejected: Vec::new(),
        }
    }
    pub fn with_calibration(mut self, calibration: Calibration) -> Self {
        self.profile.calibration = calibration;
        self
    }
    /// Makes `start_sampling(rate)` fail, as a converter that cannot reconfigure.
    pub fn reject_rate(&mut self, rate: u32) {
        self.rejected.push(rate);
    }
    pub fn push(&mut self, capture: RawCapture) {
        self.queue.push_back(Ok(capture));
    }
    pub fn push_failure(&mut self, message: &str) {
        self.queue
            .push_back(Err(ScopeError::Acquisition(message.to_string())));
    }
    /// Every rate passed to `start_sampling`, in call order.
    pub fn started_rates(&self) -> &[u32] {
        &self.started
    }
    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}
#[cfg(test)]
impl AcquisitionSource for ScriptedSource {
    fn start_sampling(&mut self, rate: u32) -> Result<u32, ScopeError> {
        if self.rejected.contains(&rate) {
            return Err(ScopeError::Acquisition(format!("cannot reconfigure to {rate} Hz")));
        }
        self.started.push(rate);
        Ok(rate)
    }
    fn stop_sampling(&mut self) {}
    fn get_buffers(&mut self) -> Result<RawCapture, ScopeError> {
        self.queue
            .pop_front()
            .unwrap_or_else(|| Err(ScopeError::Acquisition("script exhausted".into())))
    }
    fn toggle_channel(&mut self, index: usize) {
        if let Some(active) = self.active.get_mut(index) {
            *active = !*active;
        }
    }
    fn active_channel_count(&self) -> usize {
        self.active.iter().filter(|a| **a).count()
    }
    fn channel_count(&self) -> usize {
        self.active.len()
    }
    fn n_samples(&self) -> usize {
        self.n_samples
    }
    fn vref(&self) -> (f32, f32) {
        self.vref
    }
    fn profile(&self) -> &BackendProfile {
        &self.profile
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn capture_rows_keep_channel_order() {
        let capture = RawCapture::from_rows(vec![
            (0, vec![(1.0, 0), (2.0, 1)]),
            (1, vec![(3.0, 0), (4.0, 1)]),
        ])
        .unwrap();
        assert_eq!(capture.num_channels(), 2);
        assert_eq!(capture.samples_per_channel(), 2);
        let (values, ticks) = capture.row(1);
        assert_eq!(values.to_vec(), vec![3.0, 4.0]);
        assert_eq!(ticks.to_vec(), vec![0, 1]);
    }
    #[test]
    fn ragged_capture_is_rejected() {
        let err = RawCapture::from_rows(vec![(0, vec![(1.0, 0)]), (1, vec![])]).unwrap_err();
        assert!(matches!(err, ScopeError::Acquisition(_)));
    }
    #[test]
    fn scripted_source_replays_in_order() {
        let mut source = ScriptedSource::new(1, 3);
        source.push(RawCapture::indexed(0, &[1.0, 2.0, 3.0]));
        source.push_failure("bus timeout");
        assert_eq!(source.get_buffers().unwrap().samples_per_channel(), 3);
        assert!(source.get_buffers().is_err());
        assert!(source.get_buffers().is_err());
        assert_eq!(source.pending(), 0);
    }
}
