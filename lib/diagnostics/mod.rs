//! Pure functions over states and trajectories: entanglement measures,
//! information geometry, thermodynamic proxies, scrambling, and the
//! [`DiagnosticsEngine`] that gathers them into a [`DiagnosticsBundle`].

pub mod entanglement;
pub mod geometry;
pub mod thermo;
pub mod scrambling;
pub mod bundle;

pub use bundle::{ DiagnosticsBundle, DiagnosticsEngine, SeriesStats };
