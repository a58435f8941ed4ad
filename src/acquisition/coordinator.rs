use std::collections::BTreeSet;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use crate::acquisition::source::AcquisitionSource;
use crate::acquisition::ScopeError;
/// Offered sample rates: every multiple of `step_hz` in `[min_hz, max_hz]`
/// that divides `base_clock_hz` evenly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateGrid {
    pub min_hz: u32,
    pub max_hz: u32,
    pub step_hz: u32,
    pub base_clock_hz: u32,
}
impl Default for RateGrid {
    fn default() -> Self {
        Self {
            min_hz: 1_000_000,
            max_hz: 50_000_000,
            step_hz: 10_000,
            base_clock_hz: 500_000_000,
        }
    }
}
impl RateGrid {
    pub fn rates(&self) -> BTreeSet<u32> {
        if self.step_hz == 0 || self.min_hz == 0 || self.min_hz > self.max_hz {
            return BTreeSet::new();
        }
        (self.min_hz..=self.max_hz)
            .step_by(self.step_hz as usize)
            .filter(|rate| self.base_clock_hz % rate == 0)
            .collect()
    }
}
/// "5.00 MS/s"-style label for a rate in Hz.
pub fn format_msps(rate: u32) -> String {
    format!("{:2.2} MS/s", rate as f64 / 1e6)
}
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelState {
    pub index: usize,
    pub active: bool,
}
/// Snapshot of the acquisition settings in effect.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AcquisitionConfig {
    pub sample_rate: u32,
    pub active_channels: BTreeSet<usize>,
    pub buffer_size: usize,
}
/// Keeps the offered rate set consistent with the number of active channels.
///
/// The highest grid rate is only valid with exactly one channel active. It is
/// offered again as soon as a single channel remains, but never re-selected
/// automatically; when a second channel comes on while it is selected, the
/// rate is first dropped to the fallback.
pub struct SampleRateCoordinator {
    channels: Vec<ChannelState>,
    supported: BTreeSet<u32>,
    max_rate: u32,
    fallback_rate: u32,
    sample_rate: u32,
    buffer_size: usize,
}
impl SampleRateCoordinator {
    pub fn new(
        grid: &RateGrid,
        fallback_rate: u32,
        channel_count: usize,
        buffer_size: usize,
    ) -> Result<Self, ScopeError> {
        let supported = grid.rates();
        let max_rate = supported
            .iter()
            .next_back()
            .copied()
            .ok_or_else(|| ScopeError::InvalidConfig("rate grid offers no sample rates".into()))?;
        if fallback_rate >= max_rate || !supported.contains(&fallback_rate) {
            return Err(ScopeError::InvalidConfig(format!(
                "fallback rate {fallback_rate} Hz must be an offered rate below {max_rate} Hz"
            )));
        }
        if channel_count == 0 {
            return Err(ScopeError::InvalidConfig("source reports no channels".into()));
        }
        let channels = (0..channel_count)
            .map(|index| ChannelState {
                index,
                active: false,
            })
            .collect();
        Ok(Self {
            channels,
            supported,
            max_rate,
            fallback_rate,
            sample_rate: 0,
            buffer_size,
        })
    }
    /// Applies `rate` if it is currently offered; returns the rate the source settled on.
    pub fn set_sample_rate<S: AcquisitionSource + ?Sized>(
        &mut self,
        source: &mut S,
        rate: u32,
    ) -> Result<u32, ScopeError> {
        if !self.supported.contains(&rate) {
            return Err(ScopeError::UnsupportedSampleRate { rate });
        }
        let actual = source.start_sampling(rate)?;
        if actual == 0 {
            return Err(ScopeError::ZeroSampleRate);
        }
        if actual != rate {
            debug!("requested {} but source applied {}", format_msps(rate), format_msps(actual));
        }
        info!("sample rate set to {}", format_msps(actual));
        self.sample_rate = actual;
        Ok(actual)
    }
    pub fn toggle_channel<S: AcquisitionSource + ?Sized>(
        &mut self,
        source: &mut S,
        index: usize,
    ) -> Result<(), ScopeError> {
        let count = self.channels.len();
        if index >= count {
            return Err(ScopeError::InvalidChannel { index, count });
        }
        source.toggle_channel(index);
        self.channels[index].active = !self.channels[index].active;
        if let Err(err) = self.reconcile_max_rate(source) {
            // the forced fallback failed; undo the flip so the max rate stays single-channel
            source.toggle_channel(index);
            self.channels[index].active = !self.channels[index].active;
            warn!("channel {index} toggle reverted: {err}");
            return Err(err);
        }
        info!(
            "channel {index} {}",
            if self.channels[index].active { "enabled" } else { "disabled" }
        );
        Ok(())
    }
    fn reconcile_max_rate<S: AcquisitionSource + ?Sized>(
        &mut self,
        source: &mut S,
    ) -> Result<(), ScopeError> {
        let active = self.active_channel_count();
        let offered = self.supported.contains(&self.max_rate);
        if active == 1 && !offered {
            self.supported.insert(self.max_rate);
            info!("{} available again (single channel)", format_msps(self.max_rate));
        } else if active > 1 && offered {
            if self.sample_rate == self.max_rate {
                self.set_sample_rate(source, self.fallback_rate)?;
            }
            self.supported.remove(&self.max_rate);
            info!("{} withdrawn ({active} channels active)", format_msps(self.max_rate));
        }
        Ok(())
    }
    pub fn active_channel_count(&self) -> usize {
        self.channels.iter().filter(|c| c.active).count()
    }
    pub fn active_channels(&self) -> Vec<usize> {
        self.channels
            .iter()
            .filter(|c| c.active)
            .map(|c| c.index)
            .collect()
    }
    pub fn supported_rates(&self) -> &BTreeSet<u32> {
        &self.supported
    }
    pub fn max_rate(&self) -> u32 {
        self.max_rate
    }
    pub fn fallback_rate(&self) -> u32 {
        self.fallback_rate
    }
    /// Zero until a rate has been applied.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
    pub fn config(&self) -> AcquisitionConfig {
        AcquisitionConfig {
            sample_rate: self.sample_rate,
            active_channels: self.active_channels().into_iter().collect(),
            buffer_size: self.buffer_size,
        }
    }
}
