//! Multi-level bisection regrowth.
//!
//! The move regrows `2^levels - 1` beads by repeatedly halving the segment:
//! at each level the midpoints are Gaussian-sampled about their shifted
//! neighbors and tested against the action evaluated at that level's time
//! step. Failure at any level restores every bead touched so far.
//!
//! See C. Chakravarty et al., J. Chem. Phys. 109, 2123 (1998).

use super::{new_bisection_position, Ensemble, Move, MoveStats, System};
use crate::constants::Constants;
use crate::path::BeadLoc;
use crate::DVec;

pub struct Bisection {
    stats: MoveStats,
    num_levels: usize,
    num_active: usize,
    include: Vec<bool>,
    original_pos: Vec<DVec>,
    new_pos: Vec<DVec>,
}

impl Bisection {
    pub fn new(constants: &Constants) -> Self {
        let num_levels = constants.levels;
        let num_active = (1 << num_levels) - 1;
        Self {
            stats: MoveStats::new(constants),
            num_levels,
            num_active,
            include: vec![false; num_active],
            original_pos: vec![DVec::zeros(); num_active],
            new_pos: vec![DVec::zeros(); num_active],
        }
    }

    fn undo(&self, sys: &mut System, start: BeadLoc) {
        let mut b = start;
        for k in 0..self.num_active {
            b = sys.path.next(b).expect("bisection segment broken");
            if !self.include[k] {
                sys.path.update_bead(b, self.original_pos[k]);
            }
        }
        sys.action.set_shift(1);
    }
}

impl Move for Bisection {
    fn name(&self) -> &'static str {
        "bisection"
    }

    fn ensemble(&self) -> Ensemble {
        Ensemble::Any
    }

    fn stats(&self) -> &MoveStats {
        &self.stats
    }

    fn attempt(&mut self, sys: &mut System) -> bool {
        // The level-by-level rejection scheme needs a per-slice action.
        if !sys.action.local() {
            return false;
        }

        let slice = sys.random.rand_int(sys.path.num_time_slices - 1);
        if sys.path.num_beads_at_slice(slice) == 0 {
            return false;
        }
        let n = sys.random.rand_int(sys.path.num_beads_at_slice(slice) - 1);
        let start = sys.path.bead_at_slice(slice, n);

        // All 2^levels beads from the start onward must be live worldline
        // with no head among them.
        let mut b = start;
        for _ in 0..self.num_active + 1 {
            if sys.path.worm.head == Some(b) {
                return false;
            }
            match sys.path.next(b) {
                Some(next) => b = next,
                None => return false,
            }
        }
        let end = b;

        self.stats.attempt_at(self.num_levels);
        self.include.iter_mut().for_each(|inc| *inc = true);

        let mut old_delta_action = 0.0;
        for level in (1..=self.num_levels).rev() {
            let shift = 1usize << (level - 1);
            sys.action.set_shift(shift);

            let mut old_action = 0.0;
            let mut new_action = 0.0;

            let mut b = sys.path.next_by(start, shift).expect("bisection segment broken");
            let mut k = 1;
            while b != end {
                let idx = k * shift - 1;
                if self.include[idx] {
                    self.original_pos[idx] = sys.path[b];
                    old_action += sys.action.potential_action_bead(&sys.path, b);

                    let pos = new_bisection_position(
                        &sys.path,
                        &sys.constants,
                        &mut sys.random,
                        b,
                        shift,
                    );
                    self.new_pos[idx] = pos;
                    sys.path.update_bead(b, pos);
                    new_action += sys.action.potential_action_bead(&sys.path, b);

                    self.include[idx] = false;
                } else if level == 1 {
                    // The final level sees the full action of the segment.
                    new_action += sys.action.potential_action_bead(&sys.path, b);
                    sys.path.update_bead(b, self.original_pos[idx]);
                    old_action += sys.action.potential_action_bead(&sys.path, b);
                    sys.path.update_bead(b, self.new_pos[idx]);
                }
                k += 1;
                b = sys.path.next_by(b, shift).expect("bisection segment broken");
            }

            let delta_action = new_action - old_action;
            if sys.random.rand() < (-delta_action + old_delta_action).exp() {
                if level == 1 {
                    self.stats.accept_at(self.num_levels);
                    sys.action.set_shift(1);
                    return true;
                }
            } else {
                self.undo(sys, start);
                return false;
            }
            old_delta_action = delta_action;
        }

        // Unreachable for num_levels >= 1; kept for the degenerate case.
        sys.action.set_shift(1);
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::PrimitiveAction;
    use crate::constants::{test_config, Constants};
    use crate::moves::test_support::free_system;
    use crate::moves::System;
    use crate::potential::{FreePotential, HarmonicPotential};

    #[test]
    fn test_free_particles_always_accept() {
        let mut sys = free_system(2, 31);
        let mut bisection = Bisection::new(&sys.constants);
        let mut accepted = 0;
        for _ in 0..300 {
            if bisection.attempt(&mut sys) {
                accepted += 1;
            }
            sys.path.check_links().unwrap();
            assert_eq!(sys.action.shift(), 1);
        }
        assert_eq!(bisection.stats().attempted, accepted);
        assert!(accepted > 0);
    }

    #[test]
    fn test_non_local_action_fails_fast() {
        let config = test_config(2, 4.0);
        let constants = Constants::new(&config).unwrap();
        let action = Box::new(PrimitiveAction::non_local(&constants, Box::new(FreePotential)));
        let mut sys = System::new(constants, config.container(), action, 32);
        let mut bisection = Bisection::new(&sys.constants);
        assert!(!bisection.attempt(&mut sys));
        assert_eq!(bisection.stats().attempted, 0);
    }

    #[test]
    fn test_rejection_restores_configuration() {
        let config = test_config(2, 4.0);
        let constants = Constants::new(&config).unwrap();
        let action =
            Box::new(PrimitiveAction::new(&constants, Box::new(HarmonicPotential { omega: 8.0 })));
        let mut sys = System::new(constants, config.container(), action, 33);
        let mut bisection = Bisection::new(&sys.constants);

        let mut saw_rejection = false;
        for _ in 0..500 {
            let before = sys.path.clone();
            if !bisection.attempt(&mut sys) {
                assert_eq!(sys.path, before, "failed bisection must restore the path");
                if bisection.stats().attempted > 0 {
                    saw_rejection = true;
                }
            }
            assert_eq!(sys.action.shift(), 1);
            sys.path.check_links().unwrap();
        }
        assert!(saw_rejection);
    }
}
