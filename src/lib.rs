//! Worm-algorithm path-integral Monte Carlo for continuous-space bosons.
//!
//! This crate implements the grand-canonical worm algorithm of Boninsegni,
//! Prokof'ev and Svistunov: imaginary-time worldlines of interacting bosons
//! are sampled by a library of Metropolis updates that open, close, grow,
//! shrink and swap an open worldline (the "worm") through a periodic
//! simulation cell.
//!
//! Reference: M. Boninsegni, N. Prokof'ev and B. Svistunov,
//! Phys. Rev. E 74, 036701 (2006).

pub mod action;
pub mod constants;
pub mod container;
pub mod driver;
pub mod lookup;
pub mod moves;
pub mod path;
pub mod potential;
pub mod random;
pub mod worm;

/// Number of spatial dimensions, fixed at compile time.
pub const NDIM: usize = 3;

/// An NDIM-vector of type f64.
pub type DVec = nalgebra::SVector<f64, NDIM>;

// Re-export commonly used types at crate root
pub use action::{Action, PrimitiveAction};
pub use constants::{Config, ConfigError, Constants};
pub use container::Container;
pub use driver::{MoveReport, PimcDriver};
pub use lookup::LookupTable;
pub use moves::{Ensemble, Move, System};
pub use path::{BeadLoc, Path};
pub use potential::{FreePotential, GaussianPotential, HarmonicPotential, Potential, PotentialChoice};
pub use random::Random;
pub use worm::Worm;
