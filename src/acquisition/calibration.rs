//! Timestamp calibration for raw acquisition buffers.
//!
//! Raw buffers carry timestamps as converter clock ticks. Converting them to
//! seconds needs the applied sample rate and a per-clock correction factor that
//! was measured on the bench; the first few samples of every fetch are dropped
//! before conversion because the front end has not settled yet.
use std::collections::BTreeMap;
use ndarray::{s, ArrayView1};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use crate::acquisition::ScopeError;
/// Bench-measured correction factors, keyed by converter clock frequency (Hz).
static EMPIRICAL_TABLE: Lazy<CalibrationTable> = Lazy::new(|| {
    CalibrationTable::from_pairs([
        (4_000_000, 1.045),
        (8_000_000, 1.045),
        (16_000_000, 1.115),
        (20_000_000, 1.045),
        (24_000_000, 1.045),
        (28_000_000, 1.115),
        (30_000_000, 1.045),
        (31_000_000, 1.000),
        (32_000_000, 1.115),
    ])
});
/// Clock frequency -> multiplicative timestamp correction.
///
/// Lookup is exact-key only. A clock frequency that was never measured gets a
/// factor of 1.0 rather than an interpolated one, since the measured factors
/// are not monotonic in frequency.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CalibrationTable {
    factors: BTreeMap<u32, f32>,
}
impl CalibrationTable {
    pub fn from_pairs(pairs: impl IntoIterator<Item = (u32, f32)>) -> Self {
        Self {
            factors: pairs.into_iter().collect(),
        }
    }
    pub fn empirical() -> Self {
        EMPIRICAL_TABLE.clone()
    }
    pub fn correction_factor(&self, clock_hz: u32) -> f32 {
        self.factors.get(&clock_hz).copied().unwrap_or(1.0)
    }
    pub fn len(&self) -> usize {
        self.factors.len()
    }
    pub fn validate(&self) -> Result<(), ScopeError> {
        match self
            .factors
            .iter()
            .find(|(_, factor)| !factor.is_finite() || **factor <= 0.0)
        {
            Some((clock, factor)) => Err(ScopeError::InvalidConfig(format!(
                "calibration factor {factor} for {clock} Hz must be positive"
            ))),
            None => Ok(()),
        }
    }
}
/// How many leading samples of each fetch are discarded.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlePolicy {
    /// A fixed number of samples regardless of rate.
    Samples(usize),
    /// A settle time in seconds, scaled by the current sample rate.
    Duration(f64),
}
impl SettlePolicy {
    pub fn settle_count(&self, sample_rate: u32) -> usize {
        match *self {
            SettlePolicy::Samples(count) => count,
            SettlePolicy::Duration(seconds) => (seconds * sample_rate as f64).max(0.0) as usize,
        }
    }
}
/// Samples and their timestamps in seconds, after settle samples were dropped.
#[derive(Clone, Debug, PartialEq)]
pub struct CalibratedBuffer {
    pub samples: Vec<f32>,
    pub timestamps: Vec<f64>,
}
/// Per-backend calibration parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct Calibration {
    pub settle: SettlePolicy,
    pub table: CalibrationTable,
}
impl Calibration {
    pub fn new(settle: SettlePolicy, table: CalibrationTable) -> Self {
        Self { settle, table }
    }
    /// Drops the settle samples and converts raw ticks to seconds:
    /// `ticks * correction_factor(clock_hz) / sample_rate`.
    pub fn apply(
        &self,
        values: ArrayView1<'_, f32>,
        ticks: ArrayView1<'_, u64>,
        sample_rate: u32,
        clock_hz: u32,
    ) -> Result<CalibratedBuffer, ScopeError> {
        if sample_rate == 0 {
            return Err(ScopeError::ZeroSampleRate);
        }
        debug_assert_eq!(values.len(), ticks.len());
        let len = values.len().min(ticks.len());
        let settle = self.settle.settle_count(sample_rate);
        if settle >= len {
            return Err(ScopeError::SettleExceedsBuffer { settle, len });
        }
        let scale = self.table.correction_factor(clock_hz) as f64 / sample_rate as f64;
        let samples = values.slice(s![settle..len]).to_vec();
        let timestamps = ticks
            .slice(s![settle..len])
            .iter()
            .map(|&t| t as f64 * scale)
            .collect();
        Ok(CalibratedBuffer {
            samples,
            timestamps,
        })
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array1;
    fn raw(n: usize) -> (Array1<f32>, Array1<u64>) {
        (
            Array1::from_iter((0..n).map(|i| i as f32 * 0.5)),
            Array1::from_iter(0..n as u64),
        )
    }
    #[test]
    fn zero_ticks_map_to_zero_seconds() {
        let values = Array1::from(vec![1.0_f32; 4]);
        let ticks = Array1::from(vec![0_u64; 4]);
        for (rate, clock) in [(1_000_000, 16_000_000), (5_000_000, 5_000_000), (31, 31)] {
            let cal = Calibration::new(SettlePolicy::Samples(0), CalibrationTable::empirical());
            let out = cal.apply(values.view(), ticks.view(), rate, clock).unwrap();
            assert!(out.timestamps.iter().all(|&t| t == 0.0));
        }
    }
    #[test]
    fn applies_correction_factor_for_known_clock() {
        let (values, ticks) = raw(8);
        let cal = Calibration::new(SettlePolicy::Samples(0), CalibrationTable::empirical());
        let out = cal
            .apply(values.view(), ticks.view(), 2_000_000, 32_000_000)
            .unwrap();
        let expected = 4.0 * 1.115 / 2_000_000.0;
        assert!((out.timestamps[4] - expected).abs() < 1e-10);
    }
    #[test]
    fn unknown_clock_uses_unit_factor() {
        let table = CalibrationTable::empirical();
        assert_eq!(table.correction_factor(12_345_678), 1.0);
        assert_eq!(table.correction_factor(16_000_000), 1.115);
        assert_eq!(table.len(), 9);
    }
    #[test]
    fn drops_settle_samples() {
        let (values, ticks) = raw(10);
        let cal = Calibration::new(SettlePolicy::Samples(3), CalibrationTable::default());
        let out = cal.apply(values.view(), ticks.view(), 1_000, 1_000).unwrap();
        assert_eq!(out.samples.len(), 7);
        assert_eq!(out.timestamps.len(), 7);
        assert_eq!(out.samples[0], 1.5);
        assert!((out.timestamps[0] - 0.003).abs() < 1e-9);
    }
    #[test]
    fn free_running_tick_base_keeps_sample_spacing() {
        let values = Array1::from(vec![1.0_f32; 8]);
        let ticks = Array1::from_iter((0..8).map(|i| 1_000_000_000_u64 + i));
        let cal = Calibration::new(SettlePolicy::Samples(0), CalibrationTable::default());
        let out = cal.apply(values.view(), ticks.view(), 5_000_000, 5_000_000).unwrap();
        assert!((out.timestamps[0] - 200.0).abs() < 1e-9);
        for pair in out.timestamps.windows(2) {
            assert!((pair[1] - pair[0] - 2e-7).abs() < 1e-12);
        }
    }
    #[test]
    fn duration_settle_scales_with_rate() {
        let settle = SettlePolicy::Duration(15e-6);
        assert_eq!(settle.settle_count(5_000_000), 75);
        assert_eq!(settle.settle_count(50_000_000), 750);
        assert_eq!(SettlePolicy::Samples(8).settle_count(50_000_000), 8);
    }
    #[test]
    fn zero_rate_is_rejected() {
        let (values, ticks) = raw(4);
        let cal = Calibration::new(SettlePolicy::Samples(0), CalibrationTable::default());
        assert_eq!(
            cal.apply(values.view(), ticks.view(), 0, 0),
            Err(ScopeError::ZeroSampleRate)
        );
    }
    #[test]
    fn settle_longer_than_buffer_is_rejected() {
        let (values, ticks) = raw(4);
        let cal = Calibration::new(SettlePolicy::Samples(4), CalibrationTable::default());
        assert_eq!(
            cal.apply(values.view(), ticks.view(), 1_000, 1_000),
            Err(ScopeError::SettleExceedsBuffer { settle: 4, len: 4 })
        );
    }
    #[test]
    fn table_rejects_non_positive_factors() {
        assert!(CalibrationTable::from_pairs([(1, 0.0)]).validate().is_err());
        assert!(CalibrationTable::empirical().validate().is_ok());
    }
}
