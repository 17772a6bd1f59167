//! Rigid center-of-mass displacement of one worldline.

use super::{Ensemble, Move, MoveStats, System};
use crate::constants::Constants;
use crate::path::BeadLoc;
use crate::{DVec, NDIM};

/// Shift an entire worldline (closed ring or the worm) by a uniform random
/// displacement. Samples nothing kinetic: the spring action is invariant
/// under a rigid shift, so only the potential enters the test.
pub struct CenterOfMass {
    stats: MoveStats,
    original_pos: Vec<DVec>,
}

impl CenterOfMass {
    pub fn new(constants: &Constants) -> Self {
        Self {
            stats: MoveStats::new(constants),
            original_pos: Vec::with_capacity(constants.num_time_slices),
        }
    }

    /// Collect the worldline through `start`, ending at `end` inclusive.
    fn collect_worldline(sys: &System, start: BeadLoc, end: BeadLoc) -> Vec<BeadLoc> {
        let mut beads = Vec::new();
        let mut b = start;
        loop {
            beads.push(b);
            if b == end {
                return beads;
            }
            b = sys.path.next(b).expect("worldline broken during center-of-mass walk");
        }
    }
}

impl Move for CenterOfMass {
    fn name(&self) -> &'static str {
        "center of mass"
    }

    fn ensemble(&self) -> Ensemble {
        Ensemble::Any
    }

    fn stats(&self) -> &MoveStats {
        &self.stats
    }

    fn attempt(&mut self, sys: &mut System) -> bool {
        if sys.path.num_beads_at_slice(0) == 0 {
            return false;
        }

        // The start bead lives on slice 0; only its index is random.
        let n = sys.random.rand_int(sys.path.num_beads_at_slice(0) - 1);
        let mut start = sys.path.bead_at_slice(0, n);

        let end;
        if sys.path.worm.found_bead(&sys.path, start) {
            // Move the whole worm, provided it fits in one time winding.
            if sys.path.worm.length >= sys.constants.num_time_slices {
                return false;
            }
            start = sys.path.worm.tail.expect("worm without tail");
            end = sys.path.worm.head.expect("worm without head");
        } else {
            end = sys.path.prev(start).expect("closed worldline missing prev");
            // Worldlines wound more than once around the time axis are left
            // to the other moves.
            let mut length = 0;
            let mut b = start;
            loop {
                length += 1;
                b = sys.path.next(b).expect("closed worldline broken");
                if b == start {
                    break;
                }
            }
            if length > sys.constants.num_time_slices {
                return false;
            }
        }

        self.stats.attempt();

        let mut shift = DVec::zeros();
        for i in 0..NDIM {
            shift[i] = sys.constants.com_delta * (sys.random.rand() - 0.5);
        }

        let beads = Self::collect_worldline(sys, start, end);

        // Without full periodicity a shifted bead may leave the cell; the
        // proposal is then dead on arrival.
        if sys.path.container.periodic.iter().any(|&p| !p) {
            for &b in &beads {
                let mut pos = sys.path[b] + shift;
                sys.path.container.put_in_bc(&mut pos);
                if !sys.path.container.inside(&pos) {
                    return false;
                }
            }
        }

        let old_action = sys.action.potential_action(&sys.path, start, end);

        self.original_pos.clear();
        for &b in &beads {
            self.original_pos.push(sys.path[b]);
            let mut pos = sys.path[b] + shift;
            sys.path.container.put_in_bc(&mut pos);
            sys.path.update_bead(b, pos);
        }

        let new_action = sys.action.potential_action(&sys.path, start, end);

        if sys.random.rand() < (-(new_action - old_action)).exp() {
            self.stats.accept();
            true
        } else {
            for (&b, &pos) in beads.iter().zip(self.original_pos.iter()) {
                sys.path.update_bead(b, pos);
            }
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moves::test_support::{free_system, open_worm};

    #[test]
    fn test_free_particles_always_accept() {
        let mut sys = free_system(3, 7);
        let mut com = CenterOfMass::new(&sys.constants);
        for _ in 0..200 {
            assert!(com.attempt(&mut sys));
            sys.path.check_links().unwrap();
        }
        assert_eq!(com.stats().attempted, 200);
        assert_eq!(com.stats().accepted, 200);
    }

    #[test]
    fn test_rigid_shift_preserves_springs() {
        let mut sys = free_system(1, 8);
        let mut com = CenterOfMass::new(&sys.constants);
        let before = sys.action.kinetic_action(&sys.path);
        assert!(com.attempt(&mut sys));
        let after = sys.action.kinetic_action(&sys.path);
        assert!((before - after).abs() < 1e-9);
    }

    #[test]
    fn test_moves_worm_as_a_unit() {
        let mut sys = free_system(2, 9);
        open_worm(&mut sys, 2);
        let mut com = CenterOfMass::new(&sys.constants);
        // Keep attempting until the worm's worldline is the one selected;
        // every attempt must leave the configuration valid.
        for _ in 0..100 {
            com.attempt(&mut sys);
            sys.path.check_links().unwrap();
        }
    }

    #[test]
    fn test_empty_slice_is_ineligible() {
        let mut sys = free_system(0, 10);
        let mut com = CenterOfMass::new(&sys.constants);
        assert!(!com.attempt(&mut sys));
        assert_eq!(com.stats().attempted, 0);
    }
}
