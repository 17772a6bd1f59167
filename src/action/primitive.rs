//! Primitive-approximation action.
//!
//! The discretized action is the bare Trotter form: each bead contributes
//! `tau * (V_ext + sum of pair interactions at its slice)`, scaled by the
//! worm endpoint weight. The potential part is separable per slice, so the
//! primitive action is local; a non-local variant with the same physics
//! exists to drive the whole-trajectory protocol.

use std::f64::consts::PI;

use crate::constants::Constants;
use crate::path::{BeadLoc, Path};
use crate::potential::Potential;
use crate::NDIM;

use super::Action;

pub struct PrimitiveAction {
    tau: f64,
    lambda: f64,
    shift: usize,
    is_local: bool,
    potential: Box<dyn Potential>,
}

impl PrimitiveAction {
    pub fn new(constants: &Constants, potential: Box<dyn Potential>) -> Self {
        Self {
            tau: constants.tau,
            lambda: constants.lambda,
            shift: 1,
            is_local: true,
            potential,
        }
    }

    /// Same discretization, evaluated only through whole-trajectory
    /// proposals. Useful for cross-checking the two protocols.
    pub fn non_local(constants: &Constants, potential: Box<dyn Potential>) -> Self {
        let mut action = Self::new(constants, potential);
        action.is_local = false;
        action
    }

    /// Scalar potential energy felt by one bead: external field plus pair
    /// interactions with every other bead on its slice.
    fn potential_energy(&self, path: &Path, b: BeadLoc) -> f64 {
        let mut v = self.potential.external(&path[b]);
        for other in path.slice_beads(b.slice) {
            if other != b {
                let sep = path.get_separation(b, other);
                v += self.potential.pair(&sep);
            }
        }
        v
    }
}

impl Action for PrimitiveAction {
    fn local(&self) -> bool {
        self.is_local
    }

    fn set_shift(&mut self, shift: usize) {
        debug_assert!(shift >= 1);
        self.shift = shift;
    }

    fn shift(&self) -> usize {
        self.shift
    }

    fn bare_potential_action(&self, path: &Path, b: BeadLoc) -> f64 {
        path.worm.factor(b) * self.shift as f64 * self.tau * self.potential_energy(path, b)
    }

    fn rho0(&self, path: &Path, a: BeadLoc, b: BeadLoc, m: usize) -> f64 {
        let sep = path.get_separation(a, b);
        let width = 4.0 * self.lambda * m as f64 * self.tau;
        (-sep.norm_squared() / width).exp() / (PI * width).powf(0.5 * NDIM as f64)
    }

    fn kinetic_action(&self, path: &Path) -> f64 {
        let norm = 1.0 / (4.0 * self.lambda * self.tau);
        let mut total = 0.0;
        for s in 0..path.num_time_slices {
            for b in path.slice_beads(s) {
                if let Some(n) = path.next(b) {
                    total += norm * path.get_separation(n, b).norm_squared();
                }
            }
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{test_config, Constants};
    use crate::path::test_path;
    use crate::potential::{FreePotential, GaussianPotential, HarmonicPotential};
    use crate::DVec;
    use approx::assert_relative_eq;

    fn constants() -> Constants {
        Constants::new(&test_config(2, 4.0)).unwrap()
    }

    #[test]
    fn test_free_action_is_zero() {
        let constants = constants();
        let action = PrimitiveAction::new(&constants, Box::new(FreePotential));
        let path = test_path(2);
        let a = path.bead_at_slice(0, 0);
        let b = path.bead_at_slice(0, 1);
        assert_relative_eq!(action.bare_potential_action(&path, a), 0.0);
        assert_relative_eq!(action.potential_action(&path, a, a), 0.0);
        assert!(action.rho0(&path, a, b, 2) > 0.0);
    }

    #[test]
    fn test_harmonic_bead_action() {
        let constants = constants();
        let action = PrimitiveAction::new(&constants, Box::new(HarmonicPotential { omega: 1.0 }));
        let mut path = test_path(1);
        let b = path.bead_at_slice(0, 0);
        let r = DVec::repeat(0.5);
        path.update_bead(b, r);
        let expected = constants.tau * 0.5 * r.norm_squared();
        assert_relative_eq!(action.bare_potential_action(&path, b), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_shift_scales_action() {
        let constants = constants();
        let mut action = PrimitiveAction::new(&constants, Box::new(HarmonicPotential { omega: 1.0 }));
        let mut path = test_path(1);
        let b = path.bead_at_slice(0, 0);
        path.update_bead(b, DVec::repeat(0.5));
        let base = action.bare_potential_action(&path, b);
        action.set_shift(4);
        assert_relative_eq!(action.bare_potential_action(&path, b), 4.0 * base, epsilon = 1e-12);
        action.set_shift(1);
    }

    #[test]
    fn test_worm_endpoint_half_weight() {
        let constants = constants();
        let action = PrimitiveAction::new(&constants, Box::new(HarmonicPotential { omega: 1.0 }));
        let mut path = test_path(1);
        let head = path.bead_at_slice(0, 0);
        path.update_bead(head, DVec::repeat(0.5));
        let full = action.bare_potential_action(&path, head);
        let middle = path.next(head).unwrap();
        let tail = path.next(middle).unwrap();
        path.del_bead_get_next(middle);
        path.update_worm(head, tail);
        assert_relative_eq!(action.bare_potential_action(&path, head), 0.5 * full, epsilon = 1e-12);
    }

    #[test]
    fn test_pair_energy_counted_once_per_bead() {
        let constants = constants();
        let action = PrimitiveAction::new(
            &constants,
            Box::new(GaussianPotential { amplitude: 2.0, width: 1.0 }),
        );
        let mut path = test_path(2);
        let a = path.bead_at_slice(0, 0);
        let b = path.bead_at_slice(0, 1);
        path.update_bead(a, DVec::zeros());
        path.update_bead(b, DVec::zeros());
        // Both at the origin: each bead sees the full amplitude once.
        assert_relative_eq!(
            action.bare_potential_action(&path, a),
            constants.tau * 2.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_rho0_symmetric_and_normalized_shape() {
        let constants = constants();
        let action = PrimitiveAction::new(&constants, Box::new(FreePotential));
        let mut path = test_path(2);
        let a = path.bead_at_slice(0, 0);
        let b = path.bead_at_slice(1, 1);
        path.update_bead(a, DVec::repeat(0.1));
        path.update_bead(b, DVec::repeat(0.6));
        assert_relative_eq!(
            action.rho0(&path, a, b, 4),
            action.rho0(&path, b, a, 4),
            epsilon = 1e-12
        );
        // Wider kernels are flatter at the origin.
        let mut origin_path = test_path(2);
        let oa = origin_path.bead_at_slice(0, 0);
        let ob = origin_path.bead_at_slice(1, 1);
        origin_path.update_bead(oa, DVec::zeros());
        origin_path.update_bead(ob, DVec::zeros());
        assert!(action.rho0(&origin_path, oa, ob, 2) > action.rho0(&origin_path, oa, ob, 4));
    }

    #[test]
    fn test_kinetic_action_straight_worldlines_zero() {
        let constants = constants();
        let action = PrimitiveAction::new(&constants, Box::new(FreePotential));
        let path = test_path(3);
        // Initial worldlines are straight in imaginary time.
        assert_relative_eq!(action.kinetic_action(&path), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_non_local_flag() {
        let constants = constants();
        let action = PrimitiveAction::non_local(&constants, Box::new(FreePotential));
        assert!(!action.local());
        let local = PrimitiveAction::new(&constants, Box::new(FreePotential));
        assert!(local.local());
    }
}
