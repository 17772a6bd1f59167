//! Staging regrowth of a fixed-length worldline segment.

use super::{new_staging_position, Ensemble, Move, MoveStats, System};
use crate::constants::Constants;
use crate::DVec;

/// Regrow the `mbar - 1` interior beads of a randomly placed segment with a
/// Levy bridge. The bridge samples the kinetic action exactly, so the
/// Metropolis test sees only the change in potential action.
pub struct Staging {
    stats: MoveStats,
    original_pos: Vec<DVec>,
}

impl Staging {
    pub fn new(constants: &Constants) -> Self {
        Self {
            stats: MoveStats::new(constants),
            original_pos: vec![DVec::zeros(); constants.mbar - 1],
        }
    }
}

impl Move for Staging {
    fn name(&self) -> &'static str {
        "staging"
    }

    fn ensemble(&self) -> Ensemble {
        Ensemble::Any
    }

    fn stats(&self) -> &MoveStats {
        &self.stats
    }

    fn attempt(&mut self, sys: &mut System) -> bool {
        let mbar = sys.constants.mbar;

        // A lone worm is handled by the worm moves.
        if sys.path.true_num_particles() == 0 {
            return false;
        }

        let slice = sys.random.rand_int(sys.path.num_time_slices - 1);
        if sys.path.num_beads_at_slice(slice) == 0 {
            return false;
        }
        let n = sys.random.rand_int(sys.path.num_beads_at_slice(slice) - 1);
        let start = sys.path.bead_at_slice(slice, n);

        // The whole stage must be live worldline with no head inside it.
        let mut b = start;
        for _ in 0..mbar {
            if sys.path.worm.head == Some(b) {
                return false;
            }
            match sys.path.next(b) {
                Some(next) => b = next,
                None => return false,
            }
        }
        let end = b;

        self.stats.attempt();

        let last_interior = sys.path.prev(end).expect("stage endpoint lost its prev link");
        let old_action = sys.action.potential_action(&sys.path, start, last_interior);

        let mut b = start;
        for k in 0..mbar - 1 {
            let next = sys.path.next(b).expect("stage interior broken");
            self.original_pos[k] = sys.path[next];
            let pos =
                new_staging_position(&sys.path, &sys.constants, &mut sys.random, b, end, mbar, k);
            sys.path.update_bead(next, pos);
            b = next;
        }

        let new_action = sys.action.potential_action(&sys.path, start, last_interior);

        if sys.random.rand() < (-(new_action - old_action)).exp() {
            self.stats.accept();
            true
        } else {
            let mut b = start;
            for k in 0..mbar - 1 {
                let next = sys.path.next(b).expect("stage interior broken");
                sys.path.update_bead(next, self.original_pos[k]);
                b = next;
            }
            false
        }
    }
}
