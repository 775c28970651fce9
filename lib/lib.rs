//! Floquet-driven, dissipative qubit-lattice simulation with entanglement,
//! information-geometry, and thermodynamic diagnostics, plus a stochastic
//! pulse optimizer.
//!
//! The pipeline runs in one direction:
//! [`lattice`] → [`dynamics`] → [`dynamics::Trajectory`] → [`diagnostics`],
//! with [`control`] wrapping the whole thing as a black-box objective.

#![allow(non_snake_case)]

pub mod error;
pub mod config;
pub mod cancel;
pub mod hilbert;
pub mod lattice;
pub mod pulse;
pub mod dynamics;
pub mod diagnostics;
pub mod control;
pub mod readout;

pub use error::{ Error, Result };
