// src/acquisition/mod.rs
// Acquisition pipeline: raw capture -> calibration -> trigger -> frame
pub mod calibration;
pub mod coordinator;
pub mod error;
pub mod frame;
pub mod producer;
pub mod simulated;
pub mod source;
pub mod trigger;
pub use calibration::{Calibration, CalibrationTable, SettlePolicy};
pub use coordinator::{format_msps, RateGrid, SampleRateCoordinator};
pub use error::ScopeError;
pub use frame::WaveformFrame;
pub use producer::{FrameProducer, FrameSink, TickOutcome};
pub use simulated::{Backend, SimulatedAdc, TestSignal};
pub use source::AcquisitionSource;
pub use trigger::{Thresholds, TriggerConfig, TriggerMode};
