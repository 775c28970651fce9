//! Gradient-free pulse and noise optimization.

pub mod params;
pub mod spsa;

pub use params::{ Knobs, ParamVector, Segment, SegmentSpec };
pub use spsa::{ objective, ControlDaemon, DaemonResult, IterationRecord };
