//! Growing and shrinking the worm at its endpoints.
//!
//! Advance-head and recede-tail extend the worm with free-particle steps;
//! recede-head and advance-tail delete the corresponding stretch. Each pair
//! is mutually inverse and shares the same length distribution, so the
//! proposal ratios reduce to the attempt-probability and chemical-potential
//! factors.

use super::{levels_for, new_free_particle_position, Ensemble, Move, MoveStats, System};
use crate::constants::Constants;
use crate::path::BeadLoc;

/// Grow the head forward in imaginary time by an even number of slices.
pub struct AdvanceHead {
    stats: MoveStats,
}

impl AdvanceHead {
    pub fn new(constants: &Constants) -> Self {
        Self { stats: MoveStats::new(constants) }
    }

    fn undo(sys: &mut System) {
        let old_head = sys.path.worm.special1.expect("advance head lost its marker");
        sys.path.worm.head = Some(old_head);
        let mut b = sys.path.next(old_head);
        while let Some(x) = b {
            b = sys.path.del_bead_get_next(x);
        }
        sys.path.set_next(old_head, None);
        sys.path.worm.special1 = None;
        sys.path.worm.is_config_diagonal = false;
    }

    fn keep(&mut self, sys: &mut System, head: BeadLoc, level: usize) {
        self.stats.accept_at(level);
        let tail = sys.path.worm.tail.expect("off-diagonal without tail");
        sys.path.update_worm(head, tail);
    }
}

impl Move for AdvanceHead {
    fn name(&self) -> &'static str {
        "advance head"
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

        let advance_length = 2 * (1 + sys.random.rand_int(constants.mbar / 2 - 1));
        let num_levels = levels_for(advance_length);

        self.stats.attempt_at(num_levels);

        let mu_shift = advance_length as f64 * constants.tau * constants.mu;
        let mut norm = constants.attempt_prob("recede head") / constants.attempt_prob("advance head");
        norm *= sys.action.ensemble_weight(advance_length as i64);

        // The old head becomes an interior special bead while the proposal
        // is grown past it.
        let old_head = sys.path.worm.head.take().expect("off-diagonal without head");
        sys.path.worm.special1 = Some(old_head);

        if sys.action.local() {
            let action_shift = (norm.ln() + mu_shift) / advance_length as f64;

            let mut delta_action =
                sys.action.bare_potential_action(&sys.path, old_head) - 0.5 * action_shift;
            let mut p_norm = 1.0;
            let p = ((-delta_action).exp() / p_norm).min(1.0);
            if sys.random.rand() >= p {
                Self::undo(sys);
                return false;
            }
            p_norm *= p;

            let mut b = old_head;
            for _ in 0..advance_length - 1 {
                let pos = new_free_particle_position(&sys.path, &sys.constants, &mut sys.random, b);
                b = sys.path.add_next_bead(b, pos);
                delta_action += sys.action.bare_potential_action(&sys.path, b) - action_shift;
                let p = ((-delta_action).exp() / p_norm).min(1.0);
                if sys.random.rand() >= p {
                    Self::undo(sys);
                    return false;
                }
                p_norm *= p;
            }
            let pos = new_free_particle_position(&sys.path, &sys.constants, &mut sys.random, b);
            let head = sys.path.add_next_bead(b, pos);
            sys.path.worm.head = Some(head);

            delta_action +=
                sys.action.potential_action_bead(&sys.path, head) - 0.5 * action_shift;
            delta_action += sys.action.potential_action_correction(&sys.path, old_head, head);

            if sys.random.rand() < (-delta_action).exp() / p_norm {
                self.keep(sys, head, num_levels);
                true
            } else {
                Self::undo(sys);
                false
            }
        } else {
            let mut b = old_head;
            for _ in 0..advance_length {
                let pos = new_free_particle_position(&sys.path, &sys.constants, &mut sys.random, b);
                b = sys.path.add_next_bead(b, pos);
            }
            let head = b;
            sys.path.worm.head = Some(head);

            let new_action = sys.action.potential_action(&sys.path, old_head, head);
            if sys.random.rand() < norm * (-new_action + mu_shift).exp() {
                self.keep(sys, head, num_levels);
                true
            } else {
                Self::undo(sys);
                false
            }
        }
    }
}

/// Shrink the worm by pulling its head backward in imaginary time.
pub struct RecedeHead {
    stats: MoveStats,
}

impl RecedeHead {
    pub fn new(constants: &Constants) -> Self {
        Self { stats: MoveStats::new(constants) }
    }

    fn undo(sys: &mut System) {
        sys.path.worm.special1 = None;
        sys.path.worm.is_config_diagonal = false;
    }

    fn keep(&mut self, sys: &mut System, head: BeadLoc, level: usize) {
        self.stats.accept_at(level);
        let mut b = sys.path.next(head);
        while let Some(x) = b {
            b = sys.path.del_bead_get_next(x);
        }
        let tail = sys.path.worm.tail.expect("off-diagonal without tail");
        sys.path.update_worm(head, tail);
    }
}

impl Move for RecedeHead {
    fn name(&self) -> &'static str {
        "recede head"
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

        let recede_length = 2 * (1 + sys.random.rand_int(constants.mbar / 2 - 1));
        let num_levels = levels_for(recede_length);

        if recede_length >= sys.path.worm.length {
            return false;
        }

        let old_head = sys.path.worm.head.expect("off-diagonal without head");
        let head = sys.path.prev_by(old_head, recede_length).expect("worm chain broken");

        let mu_shift = recede_length as f64 * constants.tau * constants.mu;
        let mut norm = constants.attempt_prob("advance head") / constants.attempt_prob("recede head");
        norm *= sys.action.ensemble_weight(-(recede_length as i64));

        self.stats.attempt_at(num_levels);
        sys.path.worm.special1 = Some(head);

        if sys.action.local() {
            let action_shift = (-norm.ln() + mu_shift) / recede_length as f64;

            let mut delta_action = 0.0;
            let mut p_norm = 1.0;
            let mut factor = 0.5;

            let mut b = old_head;
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
                b = sys.path.prev(b).expect("worm chain broken");
                if b == head {
                    break;
                }
            }

            delta_action -=
                sys.action.bare_potential_action(&sys.path, head) - 0.5 * action_shift;
            delta_action -= sys.action.potential_action_correction(&sys.path, head, old_head);

            if sys.random.rand() < (-delta_action).exp() / p_norm {
                self.keep(sys, head, num_levels);
                true
            } else {
                Self::undo(sys);
                false
            }
        } else {
            let old_action = sys.action.potential_action(&sys.path, head, old_head);
            if sys.random.rand() < norm * (old_action - mu_shift).exp() {
                self.keep(sys, head, num_levels);
                true
            } else {
                Self::undo(sys);
                false
            }
        }
    }
}

/// Shrink the worm by pushing its tail forward in imaginary time.
pub struct AdvanceTail {
    stats: MoveStats,
}

impl AdvanceTail {
    pub fn new(constants: &Constants) -> Self {
        Self { stats: MoveStats::new(constants) }
    }

    fn undo(sys: &mut System) {
        sys.path.worm.special1 = None;
        sys.path.worm.is_config_diagonal = false;
    }

    fn keep(&mut self, sys: &mut System, tail: BeadLoc, level: usize) {
        self.stats.accept_at(level);
        let mut b = sys.path.prev(tail);
        while let Some(x) = b {
            b = sys.path.del_bead_get_prev(x);
        }
        let head = sys.path.worm.head.expect("off-diagonal without head");
        sys.path.update_worm(head, tail);
    }
}

impl Move for AdvanceTail {
    fn name(&self) -> &'static str {
        "advance tail"
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

        let advance_length = 2 * (1 + sys.random.rand_int(constants.mbar / 2 - 1));
        let num_levels = levels_for(advance_length);

        if advance_length >= sys.path.worm.length {
            return false;
        }

        let old_tail = sys.path.worm.tail.expect("off-diagonal without tail");
        let tail = sys.path.next_by(old_tail, advance_length).expect("worm chain broken");

        let mu_shift = advance_length as f64 * constants.tau * constants.mu;
        let mut norm = constants.attempt_prob("recede tail") / constants.attempt_prob("advance tail");
        norm *= sys.action.ensemble_weight(-(advance_length as i64));

        self.stats.attempt_at(num_levels);
        sys.path.worm.special1 = Some(tail);

        if sys.action.local() {
            let action_shift = (-norm.ln() + mu_shift) / advance_length as f64;

            let mut delta_action = 0.0;
            let mut p_norm = 1.0;
            let mut factor = 0.5;

            let mut b = old_tail;
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
                b = sys.path.next(b).expect("worm chain broken");
                if b == tail {
                    break;
                }
            }

            delta_action -=
                sys.action.bare_potential_action(&sys.path, tail) - 0.5 * action_shift;
            delta_action -= sys.action.potential_action_correction(&sys.path, old_tail, tail);

            if sys.random.rand() < (-delta_action).exp() / p_norm {
                self.keep(sys, tail, num_levels);
                true
            } else {
                Self::undo(sys);
                false
            }
        } else {
            let old_action = sys.action.potential_action(&sys.path, old_tail, tail);
            if sys.random.rand() < norm * (old_action - mu_shift).exp() {
                self.keep(sys, tail, num_levels);
                true
            } else {
                Self::undo(sys);
                false
            }
        }
    }
}

/// Grow the worm by pulling its tail backward in imaginary time.
pub struct RecedeTail {
    stats: MoveStats,
}

impl RecedeTail {
    pub fn new(constants: &Constants) -> Self {
        Self { stats: MoveStats::new(constants) }
    }

    fn undo(sys: &mut System) {
        let old_tail = sys.path.worm.special1.expect("recede tail lost its marker");
        sys.path.worm.tail = Some(old_tail);
        let mut b = sys.path.prev(old_tail);
        while let Some(x) = b {
            b = sys.path.del_bead_get_prev(x);
        }
        sys.path.set_prev(old_tail, None);
        sys.path.worm.special1 = None;
        sys.path.worm.is_config_diagonal = false;
    }

    fn keep(&mut self, sys: &mut System, tail: BeadLoc, level: usize) {
        self.stats.accept_at(level);
        let head = sys.path.worm.head.expect("off-diagonal without head");
        sys.path.update_worm(head, tail);
    }
}

impl Move for RecedeTail {
    fn name(&self) -> &'static str {
        "recede tail"
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

        let recede_length = 2 * (1 + sys.random.rand_int(constants.mbar / 2 - 1));
        let num_levels = levels_for(recede_length);

        self.stats.attempt_at(num_levels);

        let mu_shift = recede_length as f64 * constants.tau * constants.mu;
        let mut norm = constants.attempt_prob("advance tail") / constants.attempt_prob("recede tail");
        norm *= sys.action.ensemble_weight(recede_length as i64);

        let old_tail = sys.path.worm.tail.take().expect("off-diagonal without tail");
        sys.path.worm.special1 = Some(old_tail);

        if sys.action.local() {
            let action_shift = (norm.ln() + mu_shift) / recede_length as f64;

            let mut delta_action =
                sys.action.bare_potential_action(&sys.path, old_tail) - 0.5 * action_shift;
            let mut p_norm = 1.0;
            let p = ((-delta_action).exp() / p_norm).min(1.0);
            if sys.random.rand() >= p {
                Self::undo(sys);
                return false;
            }
            p_norm *= p;

            let mut b = old_tail;
            for _ in 0..recede_length - 1 {
                let pos = new_free_particle_position(&sys.path, &sys.constants, &mut sys.random, b);
                b = sys.path.add_prev_bead(b, pos);
                delta_action += sys.action.bare_potential_action(&sys.path, b) - action_shift;
                let p = ((-delta_action).exp() / p_norm).min(1.0);
                if sys.random.rand() >= p {
                    Self::undo(sys);
                    return false;
                }
                p_norm *= p;
            }
            let pos = new_free_particle_position(&sys.path, &sys.constants, &mut sys.random, b);
            let tail = sys.path.add_prev_bead(b, pos);
            sys.path.worm.tail = Some(tail);

            delta_action +=
                sys.action.bare_potential_action(&sys.path, tail) - 0.5 * action_shift;
            delta_action += sys.action.potential_action_correction(&sys.path, tail, old_tail);

            if sys.random.rand() < (-delta_action).exp() / p_norm {
                self.keep(sys, tail, num_levels);
                true
            } else {
                Self::undo(sys);
                false
            }
        } else {
            let mut b = old_tail;
            for _ in 0..recede_length {
                let pos = new_free_particle_position(&sys.path, &sys.constants, &mut sys.random, b);
                b = sys.path.add_prev_bead(b, pos);
            }
            let tail = b;
            sys.path.worm.tail = Some(tail);

            let new_action = sys.action.potential_action(&sys.path, tail, old_tail);
            if sys.random.rand() < norm * (-new_action + mu_shift).exp() {
                self.keep(sys, tail, num_levels);
                true
            } else {
                Self::undo(sys);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moves::test_support::{free_system, open_worm};
    use crate::moves::Move;

    #[test]
    fn test_advance_head_grows_worm() {
        let mut sys = free_system(2, 61);
        open_worm(&mut sys, 4);
        let length = sys.path.worm.length;
        let gap = sys.path.worm.gap;
        let mut advance = AdvanceHead::new(&sys.constants);
        loop {
            let before_attempts = advance.stats().attempted;
            if advance.attempt(&mut sys) {
                break;
            }
            assert!(advance.stats().attempted > before_attempts);
        }
        let grown = sys.path.worm.length - length;
        assert!(grown >= 2 && grown % 2 == 0);
        let m = sys.path.num_time_slices;
        let mut expected_gap = (gap + m - grown % m) % m;
        if expected_gap == 0 {
            expected_gap = m;
        }
        assert_eq!(sys.path.worm.gap, expected_gap);
        sys.path.check_links().unwrap();
    }

    #[test]
    fn test_advance_then_recede_head_identity() {
        let mut sys = free_system(2, 62);
        open_worm(&mut sys, 4);
        let mut advance = AdvanceHead::new(&sys.constants);
        let mut recede = RecedeHead::new(&sys.constants);
        let before = sys.path.clone();

        for _ in 0..2000 {
            if sys.random.rand() < 0.5 {
                advance.attempt(&mut sys);
            } else {
                recede.attempt(&mut sys);
            }
            sys.path.check_links().unwrap();
        }
        assert!(advance.stats().accepted > 0);
        assert!(recede.stats().accepted > 0);
        // Free particles: the worm performs a random walk in length but the
        // closed worldline is never touched.
        let other_start = before.bead_at_slice(1, 1);
        assert!(sys.path.is_alive(other_start));
        assert_eq!(sys.path[other_start], before[other_start]);
    }

    #[test]
    fn test_recede_head_requires_short_enough_worm() {
        let mut sys = free_system(2, 63);
        open_worm(&mut sys, 6);
        // Worm length M - 6 = 2; every candidate recede length (>= 2) is
        // rejected as ineligible.
        assert_eq!(sys.path.worm.length, 2);
        let mut recede = RecedeHead::new(&sys.constants);
        for _ in 0..50 {
            assert!(!recede.attempt(&mut sys));
        }
        assert_eq!(recede.stats().attempted, 0);
    }

    #[test]
    fn test_tail_moves_mirror_head_moves() {
        let mut sys = free_system(2, 64);
        open_worm(&mut sys, 4);
        let mut recede = RecedeTail::new(&sys.constants);
        let mut advance = AdvanceTail::new(&sys.constants);

        for _ in 0..2000 {
            if sys.random.rand() < 0.5 {
                recede.attempt(&mut sys);
            } else {
                advance.attempt(&mut sys);
            }
            sys.path.check_links().unwrap();
        }
        assert!(recede.stats().accepted > 0);
        assert!(advance.stats().accepted > 0);
    }

    #[test]
    fn test_diagonal_sector_is_ineligible() {
        let mut sys = free_system(2, 65);
        let mut advance = AdvanceHead::new(&sys.constants);
        let mut recede = RecedeTail::new(&sys.constants);
        assert!(!advance.attempt(&mut sys));
        assert!(!recede.attempt(&mut sys));
        assert_eq!(advance.stats().attempted, 0);
        assert_eq!(recede.stats().attempted, 0);
    }
}
