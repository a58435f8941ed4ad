use thiserror::Error;
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScopeError {
    #[error("sample rate {rate} Hz is not in the supported set")]
    UnsupportedSampleRate { rate: u32 },
    #[error("channel index {index} out of range (channel count {count})")]
    InvalidChannel { index: usize, count: usize },
    #[error("unknown trigger mode `{0}`")]
    UnknownTriggerMode(String),
    #[error("trigger thresholds out of order: low {low} > high {high}")]
    InvalidThresholds { low: f32, high: f32 },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("sample rate must be greater than zero")]
    ZeroSampleRate,
    #[error("settle count {settle} leaves no samples in a buffer of {len}")]
    SettleExceedsBuffer { settle: usize, len: usize },
    #[error("acquisition source failed: {0}")]
    Acquisition(String),
}
impl ScopeError {
    /// Rejections of a control-surface request; the previous configuration stays active.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            ScopeError::UnsupportedSampleRate { .. }
                | ScopeError::InvalidChannel { .. }
                | ScopeError::UnknownTriggerMode(_)
                | ScopeError::InvalidThresholds { .. }
                | ScopeError::InvalidConfig(_)
        )
    }
}
