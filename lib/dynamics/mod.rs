//! Open-system dynamics of the driven lattice: the Hamiltonian, the
//! dissipative channels, the colored noise feeding both, and the time stepper
//! that produces a [`Trajectory`].

pub mod hamiltonian;
pub mod dissipation;
pub mod noise;
pub mod evolver;

pub use hamiltonian::{ HamiltonianModel, QubitTerms };
pub use dissipation::{ DissipationModel, StepChannel };
pub use evolver::{ Evolver, Frame, Trajectory };
