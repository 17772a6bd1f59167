//! Imaginary-time action interface.
//!
//! The move library consumes actions purely through this capability set.
//! An action that is *local* (per-slice separable) additionally allows the
//! cheaper single-slice rejection protocol; a non-local action forces the
//! moves to propose whole trajectories and test once.

mod primitive;

pub use primitive::PrimitiveAction;

use crate::path::{BeadLoc, Path};

pub trait Action {
    /// Is the potential action separable per time slice?
    fn local(&self) -> bool;

    /// Set the current time-step multiplier (bisection levels shift tau).
    fn set_shift(&mut self, shift: usize);

    fn shift(&self) -> usize;

    /// Per-bead potential action without higher-order end corrections.
    fn bare_potential_action(&self, path: &Path, b: BeadLoc) -> f64;

    /// Per-bead potential action including any end corrections.
    fn potential_action_bead(&self, path: &Path, b: BeadLoc) -> f64 {
        self.bare_potential_action(path, b)
    }

    /// Integrated potential action over the chain from `start` to `end`
    /// inclusive, following next-links.
    fn potential_action(&self, path: &Path, start: BeadLoc, end: BeadLoc) -> f64 {
        let mut total = 0.0;
        let mut b = start;
        loop {
            total += self.potential_action_bead(path, b);
            if b == end {
                return total;
            }
            b = path.next(b).expect("broken chain in potential action walk");
        }
    }

    /// Boundary correction over `[a, b]`; zero for the primitive action.
    fn potential_action_correction(&self, path: &Path, a: BeadLoc, b: BeadLoc) -> f64 {
        let _ = (path, a, b);
        0.0
    }

    /// Free-particle density matrix kernel connecting `a` to `b` over `m`
    /// slices, normalized, in linear scale. Symmetric in its bead arguments.
    fn rho0(&self, path: &Path, a: BeadLoc, b: BeadLoc, m: usize) -> f64;

    /// Total kinetic (spring) action of the configuration. Used only by
    /// debug cross-checks.
    fn kinetic_action(&self, path: &Path) -> f64;

    /// Weight for moves that change the link count by `delta_links`.
    /// Identically one in the grand-canonical ensemble.
    fn ensemble_weight(&self, delta_links: i64) -> f64 {
        let _ = delta_links;
        1.0
    }
}
