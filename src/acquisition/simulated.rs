//! Hardware-free converter backends.
//!
//! Each variant reproduces the quirks the real front ends expose through
//! `AcquisitionSource`: how a requested rate is snapped, which clock keys the
//! calibration table, converter resolution, channel count, and how many
//! leading samples are unreliable. The signal itself is a noisy square wave
//! whose phase drifts between fetches like a free-running acquisition would.
use log::{debug, error};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use crate::acquisition::calibration::{Calibration, CalibrationTable, SettlePolicy};
use crate::acquisition::source::{AcquisitionSource, BackendProfile, RawCapture};
use crate::acquisition::ScopeError;
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// 8-bit, two channels, rate derived from an integer divider of the base clock.
    #[default]
    Parallel,
    /// 10-bit, single channel, clocked at 16x the sample rate.
    Serial,
}
impl Backend {
    pub fn name(self) -> &'static str {
        match self {
            Backend::Parallel => "parallel",
            Backend::Serial => "serial",
        }
    }
    pub fn channel_count(self) -> usize {
        match self {
            Backend::Parallel => 2,
            Backend::Serial => 1,
        }
    }
    fn resolution_bits(self) -> u32 {
        match self {
            Backend::Parallel => 8,
            Backend::Serial => 10,
        }
    }
    pub fn default_settle(self) -> SettlePolicy {
        match self {
            Backend::Parallel => SettlePolicy::Duration(15e-6),
            Backend::Serial => SettlePolicy::Samples(8),
        }
    }
    pub fn default_calibration_table(self) -> CalibrationTable {
        match self {
            Backend::Parallel => CalibrationTable::default(),
            Backend::Serial => CalibrationTable::empirical(),
        }
    }
}
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestSignal {
    pub frequency_hz: f64,
    pub low: f32,
    pub high: f32,
    /// Peak amplitude of uniform noise added to every sample.
    pub noise: f32,
}
impl Default for TestSignal {
    fn default() -> Self {
        Self {
            frequency_hz: 10_000.0,
            low: 0.3,
            high: 3.0,
            noise: 0.05,
        }
    }
}
pub struct SimulatedAdc {
    backend: Backend,
    profile: BackendProfile,
    vref: (f32, f32),
    n_samples: usize,
    base_clock_hz: u32,
    active: Vec<bool>,
    sample_rate: u32,
    running: bool,
    signal: TestSignal,
    elapsed_seconds: f64,
    rng: StdRng,
}
impl SimulatedAdc {
    pub fn new(
        backend: Backend,
        n_samples: usize,
        vref: (f32, f32),
        base_clock_hz: u32,
        signal: TestSignal,
        calibration: Calibration,
        seed: u64,
    ) -> Self {
        Self {
            backend,
            profile: BackendProfile {
                name: backend.name(),
                calibration,
            },
            vref,
            n_samples,
            base_clock_hz,
            active: vec![false; backend.channel_count()],
            sample_rate: 0,
            running: false,
            signal,
            elapsed_seconds: 0.0,
            rng: StdRng::seed_from_u64(seed),
        }
    }
    pub fn backend(&self) -> Backend {
        self.backend
    }
    fn snap_rate(&self, rate: u32) -> u32 {
        match self.backend {
            Backend::Parallel => {
                let divisor = ((self.base_clock_hz as f64 / rate as f64).round() as u32).max(1);
                self.base_clock_hz / divisor
            }
            Backend::Serial => rate,
        }
    }
    fn quantize(&self, volts: f32) -> f32 {
        let (lo, hi) = self.vref;
        let max_code = ((1_u32 << self.backend.resolution_bits()) - 1) as f32;
        let code = ((volts - lo) / (hi - lo) * max_code).round().clamp(0.0, max_code);
        lo + (hi - lo) * code / max_code
    }
    fn sample_at(&mut self, seconds: f64, channel: usize) -> f32 {
        // channels are offset by a quarter period so they are distinguishable
        let phase = (seconds * self.signal.frequency_hz + channel as f64 * 0.25).fract();
        let level = if phase < 0.5 {
            self.signal.high
        } else {
            self.signal.low
        };
        let noise = if self.signal.noise > 0.0 {
            self.rng.gen_range(-self.signal.noise..=self.signal.noise)
        } else {
            0.0
        };
        self.quantize(level + noise)
    }
}
impl AcquisitionSource for SimulatedAdc {
    fn start_sampling(&mut self, rate: u32) -> Result<u32, ScopeError> {
        if rate == 0 {
            return Err(ScopeError::ZeroSampleRate);
        }
        self.sample_rate = self.snap_rate(rate);
        self.running = true;
        debug!(
            "{} backend sampling at {} Hz (requested {rate})",
            self.backend.name(),
            self.sample_rate
        );
        Ok(self.sample_rate)
    }
    fn stop_sampling(&mut self) {
        self.running = false;
    }
    fn get_buffers(&mut self) -> Result<RawCapture, ScopeError> {
        if !self.running {
            return Err(ScopeError::Acquisition("sampling not started".into()));
        }
        let channels: Vec<usize> = (0..self.active.len()).filter(|&c| self.active[c]).collect();
        if channels.is_empty() {
            return Ok(RawCapture::empty());
        }
        let dt = 1.0 / self.sample_rate as f64;
        let start = self.elapsed_seconds;
        let mut rows = Vec::with_capacity(channels.len());
        for &channel in &channels {
            let row = (0..self.n_samples)
                .map(|i| (self.sample_at(start + i as f64 * dt, channel), i as u64))
                .collect();
            rows.push((channel, row));
        }
        // free-running: the next fetch starts at an arbitrary phase
        let period = 1.0 / self.signal.frequency_hz.max(f64::MIN_POSITIVE);
        self.elapsed_seconds += self.n_samples as f64 * dt + self.rng.gen_range(0.0..period);
        RawCapture::from_rows(rows)
    }
    fn toggle_channel(&mut self, index: usize) {
        match self.active.get_mut(index) {
            Some(active) => *active = !*active,
            None => {
                debug_assert!(index < self.active.len(), "channel {index} out of range");
                error!(
                    "channel {index} does not exist on the {} backend",
                    self.backend.name()
                );
            }
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
    fn clock_hz(&self, rate: u32) -> u32 {
        match self.backend {
            Backend::Parallel => rate,
            Backend::Serial => rate.saturating_mul(16),
        }
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    fn adc(backend: Backend) -> SimulatedAdc {
        SimulatedAdc::new(
            backend,
            256,
            (0.0, 5.23),
            500_000_000,
            TestSignal::default(),
            Calibration::new(backend.default_settle(), backend.default_calibration_table()),
            7,
        )
    }
    #[test]
    fn parallel_snaps_to_clock_divider() {
        let mut adc = adc(Backend::Parallel);
        assert_eq!(adc.start_sampling(50_000_000), Ok(50_000_000));
        assert_eq!(adc.start_sampling(3_000_000), Ok(500_000_000 / 167));
        assert_eq!(adc.start_sampling(0), Err(ScopeError::ZeroSampleRate));
    }
    #[test]
    fn serial_passes_rate_and_scales_clock() {
        let mut adc = adc(Backend::Serial);
        assert_eq!(adc.start_sampling(2_000_000), Ok(2_000_000));
        assert_eq!(adc.clock_hz(2_000_000), 32_000_000);
        assert_eq!(adc.channel_count(), 1);
        assert_eq!(adc.profile().calibration.table.correction_factor(32_000_000), 1.115);
    }
    #[test]
    fn fetch_requires_running_sampler() {
        let mut adc = adc(Backend::Parallel);
        adc.toggle_channel(0);
        assert!(matches!(adc.get_buffers(), Err(ScopeError::Acquisition(_))));
    }
    #[test]
    fn captures_one_row_per_active_channel() {
        let mut adc = adc(Backend::Parallel);
        adc.start_sampling(5_000_000).unwrap();
        assert_eq!(adc.get_buffers().unwrap().num_channels(), 0);
        adc.toggle_channel(0);
        adc.toggle_channel(1);
        let capture = adc.get_buffers().unwrap();
        assert_eq!(capture.channels, vec![0, 1]);
        assert_eq!(capture.samples_per_channel(), 256);
        let (_, ticks) = capture.row(1);
        assert_eq!(ticks[10], 10);
    }
    #[test]
    fn samples_are_quantized_within_vref() {
        let mut adc = adc(Backend::Parallel);
        adc.start_sampling(5_000_000).unwrap();
        adc.toggle_channel(0);
        let capture = adc.get_buffers().unwrap();
        let step = 5.23 / 255.0;
        for &v in capture.values.iter() {
            assert!((0.0..=5.23).contains(&v));
            let code = v / step;
            assert!((code - code.round()).abs() < 1e-3);
        }
    }
    #[test]
    fn backend_defaults_differ() {
        assert_eq!(Backend::Parallel.default_settle().settle_count(5_000_000), 75);
        assert_eq!(Backend::Serial.default_settle().settle_count(5_000_000), 8);
        assert_eq!(Backend::Parallel.default_calibration_table().len(), 0);
    }
}
