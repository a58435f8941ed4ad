//! Edge trigger detection over one calibrated buffer.
//!
//! Each frame is scanned once from the start. An index below `low` (rising
//! edge) or above `high` (falling edge) arms the trigger; the first later or
//! equal index crossing the opposite threshold fires it. The trigger point is
//! the last arm index, not the crossing index, and time is re-zeroed there.
//! Nothing carries over between frames.
//!
//! In auto-range mode the thresholds are taken from each frame's own min/max
//! (20% and 80% of the span). On signals that are not cleanly two-level this
//! makes the thresholds, and therefore the trigger point, jitter from frame to
//! frame. That recomputation is kept as-is; no smoothing is applied.
use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};
use crate::acquisition::ScopeError;
const AUTO_LOW_FRACTION: f32 = 0.2;
const AUTO_HIGH_FRACTION: f32 = 0.8;
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerMode {
    None,
    #[default]
    RisingEdge,
    FallingEdge,
}
impl TriggerMode {
    pub fn as_str(self) -> &'static str {
        match self {
            TriggerMode::None => "none",
            TriggerMode::RisingEdge => "rising_edge",
            TriggerMode::FallingEdge => "falling_edge",
        }
    }
}
impl fmt::Display for TriggerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
impl FromStr for TriggerMode {
    type Err = ScopeError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(TriggerMode::None),
            "rising_edge" | "rising" => Ok(TriggerMode::RisingEdge),
            "falling_edge" | "falling" => Ok(TriggerMode::FallingEdge),
            other => Err(ScopeError::UnknownTriggerMode(other.to_string())),
        }
    }
}
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub low: f32,
    pub high: f32,
}
impl Default for Thresholds {
    fn default() -> Self {
        Self {
            low: 0.5,
            high: 2.5,
        }
    }
}
impl Thresholds {
    pub fn new(low: f32, high: f32) -> Result<Self, ScopeError> {
        let thresholds = Self { low, high };
        thresholds.validate()?;
        Ok(thresholds)
    }
    pub fn validate(&self) -> Result<(), ScopeError> {
        if self.low <= self.high {
            Ok(())
        } else {
            Err(ScopeError::InvalidThresholds {
                low: self.low,
                high: self.high,
            })
        }
    }
    /// Thresholds at 20% and 80% of this buffer's span. `None` for an empty buffer.
    pub fn auto_range(samples: &[f32]) -> Option<Self> {
        let first = *samples.first()?;
        let (min, max) = samples
            .iter()
            .fold((first, first), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        let span = max - min;
        Some(Self {
            low: min + AUTO_LOW_FRACTION * span,
            high: min + AUTO_HIGH_FRACTION * span,
        })
    }
}
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    pub mode: TriggerMode,
    pub auto_range: bool,
    pub fixed_thresholds: Thresholds,
    pub oneshot: bool,
}
impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            mode: TriggerMode::RisingEdge,
            auto_range: false,
            fixed_thresholds: Thresholds::default(),
            oneshot: false,
        }
    }
}
impl TriggerConfig {
    pub fn validate(&self) -> Result<(), ScopeError> {
        self.fixed_thresholds.validate()
    }
    pub fn thresholds_for(&self, samples: &[f32]) -> Thresholds {
        if self.auto_range {
            Thresholds::auto_range(samples).unwrap_or(self.fixed_thresholds)
        } else {
            self.fixed_thresholds
        }
    }
}
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerState {
    Unarmed,
    Armed(usize),
    Triggered(usize),
}
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TriggerOutcome {
    pub trigger_index: Option<usize>,
    pub thresholds: Thresholds,
}
impl TriggerOutcome {
    pub fn triggered(&self) -> bool {
        self.trigger_index.is_some()
    }
}
pub struct TriggerEngine;
impl TriggerEngine {
    /// Single forward pass; stops at the first trigger.
    pub fn scan(mode: TriggerMode, samples: &[f32], thresholds: Thresholds) -> TriggerState {
        let mut state = TriggerState::Unarmed;
        for (i, &v) in samples.iter().enumerate() {
            let (arms, fires) = match mode {
                TriggerMode::None => return TriggerState::Unarmed,
                TriggerMode::RisingEdge => (v <= thresholds.low, v >= thresholds.high),
                TriggerMode::FallingEdge => (v >= thresholds.high, v <= thresholds.low),
            };
            if arms {
                state = TriggerState::Armed(i);
            }
            if let TriggerState::Armed(arm) = state {
                if fires {
                    return TriggerState::Triggered(arm);
                }
            }
        }
        state
    }
    /// Runs the scan and, on a trigger, shifts `timestamps` so the trigger point reads zero.
    pub fn apply(config: &TriggerConfig, samples: &[f32], timestamps: &mut [f64]) -> TriggerOutcome {
        debug_assert_eq!(samples.len(), timestamps.len());
        let thresholds = config.thresholds_for(samples);
        let trigger_index = match Self::scan(config.mode, samples, thresholds) {
            TriggerState::Triggered(index) if index < timestamps.len() => Some(index),
            _ => None,
        };
        if let Some(index) = trigger_index {
            let origin = timestamps[index];
            for t in timestamps.iter_mut() {
                *t -= origin;
            }
        }
        TriggerOutcome {
            trigger_index,
            thresholds,
        }
    }
}
