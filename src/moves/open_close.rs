//! Opening and closing the worm.
//!
//! Open removes an even-length gap from a closed worldline, leaving the
//! configuration off-diagonal; close fills the worm's gap with a Levy
//! bridge and restores a diagonal configuration. The two are mutual
//! inverses and their acceptance factors are built to balance each other.

use super::{levels_for, new_staging_position, Ensemble, Move, MoveStats, System};
use crate::constants::Constants;
use crate::path::BeadLoc;

pub struct Open {
    stats: MoveStats,
}

impl Open {
    pub fn new(constants: &Constants) -> Self {
        Self { stats: MoveStats::new(constants) }
    }

    fn undo(sys: &mut System) {
        // Nothing was deleted yet; only the worm markers were set.
        sys.path.worm.reset();
    }

    fn keep(&mut self, sys: &mut System, head: BeadLoc, tail: BeadLoc, level: usize) {
        self.stats.accept_at(level);
        let mut b = sys.path.next(head).expect("gap chain broken");
        while b != tail {
            b = sys.path.del_bead_get_next(b).expect("gap chain broken");
        }
        sys.path.update_worm(head, tail);
    }
}

impl Move for Open {
    fn name(&self) -> &'static str {
        "open"
    }

    fn ensemble(&self) -> Ensemble {
        Ensemble::Diagonal
    }

    fn stats(&self) -> &MoveStats {
        &self.stats
    }

    fn attempt(&mut self, sys: &mut System) -> bool {
        if !sys.path.worm.is_config_diagonal {
            return false;
        }
        let constants = &sys.constants;
        let m = constants.num_time_slices;

        // Only even gaps, so head and tail both land on even slices.
        let gap_length = 2 * (1 + sys.random.rand_int(constants.mbar / 2 - 1));
        let num_levels = levels_for(gap_length);

        let head_slice = 2 * sys.random.rand_int(m / 2 - 1);
        if sys.path.num_beads_at_slice(head_slice) == 0 {
            return false;
        }
        let n = sys.random.rand_int(sys.path.num_beads_at_slice(head_slice) - 1);
        let head = sys.path.bead_at_slice(head_slice, n);
        let tail = sys.path.next_by(head, gap_length).expect("closed worldline broken");

        let sep = sys.path.get_separation(head, tail);
        if sys.path.worm.too_costly_sep(&sep, gap_length) {
            return false;
        }

        let mut norm = constants.worm_constant * constants.mbar as f64 * sys.path.num_beads() as f64
            / sys.action.rho0(&sys.path, head, tail, gap_length);
        norm *= constants.attempt_prob("close") / constants.attempt_prob("open");
        norm *= sys.action.ensemble_weight(-(gap_length as i64) + 1);
        let mu_shift = gap_length as f64 * constants.mu * constants.tau;

        self.stats.attempt_at(num_levels);

        // The candidate endpoints get their half weight already.
        sys.path.worm.special1 = Some(head);
        sys.path.worm.special2 = Some(tail);

        if sys.action.local() {
            let action_shift = (-norm.ln() + mu_shift) / gap_length as f64;

            let mut delta_action = 0.0;
            let mut p_norm = 1.0;
            let mut factor = 0.5;

            let mut b = head;
            loop {
                delta_action -=
                    sys.action.bare_potential_action(&sys.path, b) - factor * action_shift;
                let p = ((-delta_action).exp() / p_norm).min(1.0);
                if sys.random.rand() >= p {
                    Self::undo(sys);
                    return false;
                }
                p_norm *= p;
                factor = 1.0;
                b = sys.path.next(b).expect("gap chain broken");
                if b == tail {
                    break;
                }
            }

            delta_action -=
                sys.action.bare_potential_action(&sys.path, tail) - 0.5 * action_shift;
            delta_action -= sys.action.potential_action_correction(&sys.path, head, tail);

            if sys.random.rand() < (-delta_action).exp() / p_norm {
                self.keep(sys, head, tail, num_levels);
                true
            } else {
                Self::undo(sys);
                false
            }
        } else {
            let old_action = sys.action.potential_action(&sys.path, head, tail);
            if sys.random.rand() < norm * (old_action - mu_shift).exp() {
                self.keep(sys, head, tail, num_levels);
                true
            } else {
                Self::undo(sys);
                false
            }
        }
    }
}

pub struct Close {
    stats: MoveStats,
}

impl Close {
    pub fn new(constants: &Constants) -> Self {
        Self { stats: MoveStats::new(constants) }
    }

    fn undo(sys: &mut System, head: BeadLoc, tail: BeadLoc) {
        // Delete whatever part of the bridge was already grown.
        let mut b = sys.path.next(head);
        while let Some(x) = b {
            if x == tail {
                break;
            }
            b = sys.path.del_bead_get_next(x);
        }
        sys.path.set_next(head, None);
        sys.path.set_prev(tail, None);
        sys.path.worm.is_config_diagonal = false;
    }

    fn keep(&mut self, sys: &mut System, level: usize) {
        self.stats.accept_at(level);
        sys.path.worm.reset();
    }
}

impl Move for Close {
    fn name(&self) -> &'static str {
        "close"
    }

    fn ensemble(&self) -> Ensemble {
        Ensemble::OffDiagonal
    }

    fn stats(&self) -> &MoveStats {
        &self.stats
    }

    fn attempt(&mut self, sys: &mut System) -> bool {
        if sys.path.worm.is_config_diagonal {
            return false;
        }
        let constants = &sys.constants;
        let gap = sys.path.worm.gap;

        if gap > constants.mbar || gap == 0 || sys.path.worm.too_costly(&sys.path) {
            return false;
        }

        let num_levels = levels_for(gap);
        let head = sys.path.worm.head.expect("off-diagonal without head");
        let tail = sys.path.worm.tail.expect("off-diagonal without tail");

        let mut norm = sys.action.rho0(&sys.path, head, tail, gap)
            / (constants.worm_constant
                * constants.mbar as f64
                * (sys.path.num_beads() + gap - 1) as f64);
        norm *= constants.attempt_prob("open") / constants.attempt_prob("close");
        norm *= sys.action.ensemble_weight(gap as i64 - 1);
        let mu_shift = gap as f64 * constants.mu * constants.tau;

        self.stats.attempt_at(num_levels);

        if sys.action.local() {
            let action_shift = (norm.ln() + mu_shift) / gap as f64;

            let mut delta_action =
                sys.action.bare_potential_action(&sys.path, head) - 0.5 * action_shift;
            let mut p_norm = 1.0;
            let p = ((-delta_action).exp() / p_norm).min(1.0);
            if sys.random.rand() >= p {
                Self::undo(sys, head, tail);
                return false;
            }
            p_norm *= p;

            let mut b = head;
            for k in 0..gap - 1 {
                let pos = new_staging_position(
                    &sys.path,
                    &sys.constants,
                    &mut sys.random,
                    b,
                    tail,
                    gap,
                    k,
                );
                b = sys.path.add_next_bead(b, pos);
                delta_action += sys.action.bare_potential_action(&sys.path, b) - action_shift;
                let p = ((-delta_action).exp() / p_norm).min(1.0);
                if sys.random.rand() >= p {
                    Self::undo(sys, head, tail);
                    return false;
                }
                p_norm *= p;
            }
            sys.path.set_next(b, Some(tail));
            sys.path.set_prev(tail, Some(b));

            delta_action +=
                sys.action.bare_potential_action(&sys.path, tail) - 0.5 * action_shift;
            delta_action += sys.action.potential_action_correction(&sys.path, head, tail);

            if sys.random.rand() < (-delta_action).exp() / p_norm {
                self.keep(sys, num_levels);
                true
            } else {
                Self::undo(sys, head, tail);
                false
            }
        } else {
            let mut b = head;
            for k in 0..gap - 1 {
                let pos = new_staging_position(
                    &sys.path,
                    &sys.constants,
                    &mut sys.random,
                    b,
                    tail,
                    gap,
                    k,
                );
                b = sys.path.add_next_bead(b, pos);
            }
            sys.path.set_next(b, Some(tail));
            sys.path.set_prev(tail, Some(b));

            let new_action = sys.action.potential_action(&sys.path, head, tail);
            if sys.random.rand() < norm * (-new_action + mu_shift).exp() {
                self.keep(sys, num_levels);
                true
            } else {
                Self::undo(sys, head, tail);
                false
            }
        }
    }
}
