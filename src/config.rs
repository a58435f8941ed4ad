// src/config.rs
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::time::Duration;
use anyhow::Context;
use serde::Deserialize;
use crate::acquisition::{
    Backend, Calibration, CalibrationTable, RateGrid, ScopeError, SettlePolicy, TestSignal,
    TriggerConfig,
};
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// One log line per frame.
    #[default]
    Summary,
    /// Full frames as JSON lines on stdout.
    Json,
}
/// Deployment settings. Every field has a default, so `{}` is a complete config.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScopeConfig {
    pub backend: Backend,
    pub n_samples: usize,
    pub vref: (f32, f32),
    pub update_fps: u32,
    pub initial_sample_rate: u32,
    pub initial_channels: Vec<usize>,
    pub rate_grid: RateGrid,
    pub fallback_rate: u32,
    /// Falls back to the backend's own settle policy.
    pub settle: Option<SettlePolicy>,
    /// Falls back to the backend's own correction table.
    pub calibration: Option<CalibrationTable>,
    pub trigger: TriggerConfig,
    pub max_consecutive_failures: u32,
    pub signal: TestSignal,
    pub output: OutputFormat,
    pub max_ticks: Option<u64>,
    pub seed: Option<u64>,
}
impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Parallel,
            n_samples: 4096,
            vref: (0.0, 5.23),
            update_fps: 30,
            initial_sample_rate: 5_000_000,
            initial_channels: vec![0],
            rate_grid: RateGrid::default(),
            fallback_rate: 25_000_000,
            settle: None,
            calibration: None,
            trigger: TriggerConfig::default(),
            max_consecutive_failures: 30,
            signal: TestSignal::default(),
            output: OutputFormat::Summary,
            max_ticks: None,
            seed: None,
        }
    }
}
impl ScopeConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("invalid config {}", path.display()))
    }
    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }
    pub fn validate(&self) -> Result<(), ScopeError> {
        if self.n_samples == 0 {
            return Err(invalid("n_samples must be greater than zero"));
        }
        if self.update_fps == 0 {
            return Err(invalid("update_fps must be greater than zero"));
        }
        if !(self.vref.0 < self.vref.1) {
            return Err(invalid(format!(
                "vref {:?} must be an increasing range",
                self.vref
            )));
        }
        self.trigger.validate()?;
        if let Some(table) = &self.calibration {
            table.validate()?;
        }
        if !(self.signal.frequency_hz > 0.0) {
            return Err(invalid("signal frequency must be positive"));
        }
        if !(self.signal.noise >= 0.0) {
            return Err(invalid("signal noise must be non-negative"));
        }
        let rates = self.rate_grid.rates();
        let max_rate = rates
            .iter()
            .next_back()
            .copied()
            .ok_or_else(|| invalid("rate grid offers no sample rates"))?;
        if !rates.contains(&self.fallback_rate) || self.fallback_rate >= max_rate {
            return Err(invalid(format!(
                "fallback rate {} Hz must be on the grid and below {max_rate} Hz",
                self.fallback_rate
            )));
        }
        if !rates.contains(&self.initial_sample_rate) {
            return Err(ScopeError::UnsupportedSampleRate {
                rate: self.initial_sample_rate,
            });
        }
        let count = self.backend.channel_count();
        let mut seen = BTreeSet::new();
        for &index in &self.initial_channels {
            if index >= count {
                return Err(ScopeError::InvalidChannel { index, count });
            }
            if !seen.insert(index) {
                return Err(invalid(format!("channel {index} listed twice")));
            }
        }
        // the highest rate drops the most settle samples
        let settle = self.settle_policy().settle_count(max_rate);
        if settle >= self.n_samples {
            return Err(ScopeError::SettleExceedsBuffer {
                settle,
                len: self.n_samples,
            });
        }
        Ok(())
    }
    pub fn tick_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.update_fps.max(1) as f64)
    }
    pub fn settle_policy(&self) -> SettlePolicy {
        self.settle.unwrap_or_else(|| self.backend.default_settle())
    }
    pub fn calibration(&self) -> Calibration {
        let table = self
            .calibration
            .clone()
            .unwrap_or_else(|| self.backend.default_calibration_table());
        Calibration::new(self.settle_policy(), table)
    }
}
fn invalid(message: impl Into<String>) -> ScopeError {
    ScopeError::InvalidConfig(message.into())
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::TriggerMode;
    #[test]
    fn empty_object_is_a_complete_config() {
        let config = ScopeConfig::from_json("{}").unwrap();
        assert_eq!(config, ScopeConfig::default());
        assert_eq!(config.tick_period(), Duration::from_secs_f64(1.0 / 30.0));
        assert_eq!(config.calibration().settle, SettlePolicy::Duration(15e-6));
    }
    #[test]
    fn reads_nested_sections() {
        let config = ScopeConfig::from_json(
            r#"{
                "backend": "serial",
                "initial_sample_rate": 2000000,
                "settle": { "samples": 4 },
                "trigger": { "mode": "falling_edge", "auto_range": true },
                "calibration": { "32000000": 1.2 },
                "output": "json",
                "max_ticks": 10
            }"#,
        )
        .unwrap();
        assert_eq!(config.backend, Backend::Serial);
        assert_eq!(config.trigger.mode, TriggerMode::FallingEdge);
        assert!(config.trigger.auto_range);
        assert_eq!(config.trigger.fixed_thresholds.high, 2.5);
        assert_eq!(config.output, OutputFormat::Json);
        let calibration = config.calibration();
        assert_eq!(calibration.settle, SettlePolicy::Samples(4));
        assert_eq!(calibration.table.correction_factor(32_000_000), 1.2);
        assert_eq!(calibration.table.correction_factor(16_000_000), 1.0);
    }
    #[test]
    fn backend_supplies_default_calibration() {
        let config = ScopeConfig::from_json(r#"{ "backend": "serial" }"#).unwrap();
        let calibration = config.calibration();
        assert_eq!(calibration.settle, SettlePolicy::Samples(8));
        assert_eq!(calibration.table.correction_factor(16_000_000), 1.115);
    }
    #[test]
    fn rejects_inconsistent_settings() {
        let cases = [
            r#"{ "trigger": { "mode": "level" } }"#,
            r#"{ "trigger": { "fixed_thresholds": { "low": 3.0, "high": 1.0 } } }"#,
            r#"{ "fallback_rate": 50000000 }"#,
            r#"{ "initial_sample_rate": 3000000 }"#,
            r#"{ "backend": "serial", "initial_channels": [1] }"#,
            r#"{ "initial_channels": [0, 0] }"#,
            r#"{ "update_fps": 0 }"#,
            r#"{ "n_samples": 100 }"#,
            r#"{ "calibration": { "4000000": -1.0 } }"#,
        ];
        for case in cases {
            assert!(ScopeConfig::from_json(case).is_err(), "accepted {case}");
        }
    }
    #[test]
    fn reports_missing_file_with_path() {
        let err = ScopeConfig::load(Path::new("/nonexistent/piscope.json")).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/piscope.json"));
    }
}
