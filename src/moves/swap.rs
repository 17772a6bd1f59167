//! Swap moves: reattaching the worm through a pivot bead.
//!
//! Bosonic exchange is sampled by rerouting the worm head (or tail)
//! through another worldline. A pivot is drawn at the slice `mbar` links
//! away with probability proportional to the free-particle kernel; the
//! stretch between the stolen bead and the pivot is then regrown with a
//! Levy bridge. See Eq. (2.22-2.23) of PRE 74, 036701 (2006).

use super::{levels_for, new_staging_position, Ensemble, Move, MoveStats, System};
use crate::constants::Constants;
use crate::path::BeadLoc;
use crate::DVec;

/// Kernel-weighted cumulative distribution over the current interaction
/// list, normalized in place. Returns the total weight.
fn build_cumulant(sys: &System, x: BeadLoc, swap_length: usize, cumulant: &mut Vec<f64>) -> f64 {
    cumulant.clear();
    let mut sigma = 0.0;
    for &candidate in &sys.lookup.full_bead_list {
        sigma += sys.action.rho0(&sys.path, x, candidate, swap_length);
        cumulant.push(sigma);
    }
    if sigma > 0.0 {
        for c in cumulant.iter_mut() {
            *c /= sigma;
        }
    }
    sigma
}

/// Draw the pivot by inverting the cumulative distribution.
fn select_pivot(sys: &mut System, cumulant: &[f64]) -> BeadLoc {
    let u = sys.random.rand();
    let index = cumulant.partition_point(|&c| c < u).min(cumulant.len() - 1);
    sys.lookup.full_bead_list[index]
}

pub struct SwapHead {
    stats: MoveStats,
    original_pos: Vec<DVec>,
    cumulant: Vec<f64>,
}

impl SwapHead {
    pub fn new(constants: &Constants) -> Self {
        Self {
            stats: MoveStats::new(constants),
            original_pos: vec![DVec::zeros(); constants.mbar - 1],
            cumulant: Vec::new(),
        }
    }

    fn undo(sys: &mut System, swap: BeadLoc, next_swap: BeadLoc, pivot: BeadLoc, saved: &[DVec]) {
        let old_head = sys.path.worm.special1.expect("swap head lost its marker");
        sys.path.worm.head = Some(old_head);
        sys.path.set_next(old_head, None);
        sys.path.set_next(swap, Some(next_swap));
        sys.path.set_prev(next_swap, Some(swap));

        let mut b = next_swap;
        let mut k = 0;
        while b != pivot {
            sys.path.update_bead(b, saved[k]);
            k += 1;
            b = sys.path.next(b).expect("swap segment broken");
        }

        sys.path.worm.special1 = None;
        sys.path.worm.special2 = None;
        sys.path.worm.is_config_diagonal = false;
    }
}

impl Move for SwapHead {
    fn name(&self) -> &'static str {
        "swap head"
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
        let swap_length = sys.constants.mbar;
        let num_levels = levels_for(swap_length);
        let m = sys.path.num_time_slices;

        let head = sys.path.worm.head.expect("off-diagonal without head");
        let tail = sys.path.worm.tail.expect("off-diagonal without tail");

        // Candidate pivots live mbar slices ahead of the head.
        let pivot_slice = (head.slice + swap_length) % m;
        sys.lookup.update_full_interaction_list(&sys.path, head, pivot_slice);
        if sys.lookup.full_num_beads() == 0 {
            return false;
        }

        let sigma_head = build_cumulant(sys, head, swap_length, &mut self.cumulant);
        if sigma_head <= 0.0 {
            return false;
        }
        let pivot = select_pivot(sys, &self.cumulant);

        // Walk back from the pivot to the bead the worm would steal; running
        // into the tail makes the reroute impossible.
        let mut b = pivot;
        for _ in 0..swap_length {
            if b == tail {
                return false;
            }
            b = sys.path.prev(b).expect("pivot worldline broken");
        }
        let swap = b;

        // The reverse move must be able to find the pivot from the swap cell.
        if swap == tail || !sys.lookup.grid_neighbors(&sys.path, pivot, swap) {
            return false;
        }

        self.stats.attempt_at(num_levels);

        if !sys.lookup.grid_share(&sys.path, head, swap) {
            sys.lookup.update_full_interaction_list(&sys.path, swap, pivot_slice);
        }
        let sigma_swap = build_cumulant(sys, swap, swap_length, &mut self.cumulant);
        if sigma_swap <= 0.0 {
            return false;
        }

        // Pre-acceptance on the kernel normalizations alone.
        let p_norm = (sigma_head / sigma_swap).min(1.0);
        if sys.random.rand() >= p_norm {
            return false;
        }

        sys.path.worm.special1 = Some(swap);
        sys.path.worm.special2 = Some(pivot);

        // Save the stretch that will be regrown.
        let mut k = 0;
        let mut b = sys.path.next(swap).expect("pivot worldline broken");
        while b != pivot {
            self.original_pos[k] = sys.path[b];
            k += 1;
            b = sys.path.next(b).expect("pivot worldline broken");
        }

        let old_action = sys.action.potential_action(&sys.path, swap, pivot);

        // Relink: the head captures the swap bead's future.
        let next_swap = sys.path.next(swap).expect("pivot worldline broken");
        sys.path.set_next(head, Some(next_swap));
        sys.path.set_next(swap, None);
        sys.path.set_prev(next_swap, Some(head));

        sys.path.worm.special1 = Some(head);
        sys.path.worm.head = Some(swap);

        // Regrow the stretch between the old head and the pivot.
        let mut k = 0;
        let mut b = next_swap;
        while b != pivot {
            let neighbor = sys.path.prev(b).expect("swap segment broken");
            let pos = new_staging_position(
                &sys.path,
                &sys.constants,
                &mut sys.random,
                neighbor,
                pivot,
                swap_length,
                k,
            );
            sys.path.update_bead(b, pos);
            k += 1;
            b = sys.path.next(b).expect("swap segment broken");
        }

        let old_head = head;
        let new_action = sys.action.potential_action(&sys.path, old_head, pivot);

        if sys.random.rand() < (-(new_action - old_action)).exp() {
            self.stats.accept_at(num_levels);
            let tail = sys.path.worm.tail.expect("off-diagonal without tail");
            sys.path.update_worm(swap, tail);
            true
        } else {
            Self::undo(sys, swap, next_swap, pivot, &self.original_pos);
            false
        }
    }
}

pub struct SwapTail {
    stats: MoveStats,
    original_pos: Vec<DVec>,
    cumulant: Vec<f64>,
}

impl SwapTail {
    pub fn new(constants: &Constants) -> Self {
        Self {
            stats: MoveStats::new(constants),
            original_pos: vec![DVec::zeros(); constants.mbar - 1],
            cumulant: Vec::new(),
        }
    }

    fn undo(sys: &mut System, swap: BeadLoc, prev_swap: BeadLoc, pivot: BeadLoc, saved: &[DVec]) {
        let old_tail = sys.path.worm.special1.expect("swap tail lost its marker");
        sys.path.worm.tail = Some(old_tail);
        sys.path.set_prev(old_tail, None);
        sys.path.set_prev(swap, Some(prev_swap));
        sys.path.set_next(prev_swap, Some(swap));

        let mut b = prev_swap;
        let mut k = 0;
        while b != pivot {
            sys.path.update_bead(b, saved[k]);
            k += 1;
            b = sys.path.prev(b).expect("swap segment broken");
        }

        sys.path.worm.special1 = None;
        sys.path.worm.special2 = None;
        sys.path.worm.is_config_diagonal = false;
    }
}

impl Move for SwapTail {
    fn name(&self) -> &'static str {
        "swap tail"
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
        let swap_length = sys.constants.mbar;
        let num_levels = levels_for(swap_length);
        let m = sys.path.num_time_slices;

        let head = sys.path.worm.head.expect("off-diagonal without head");
        let tail = sys.path.worm.tail.expect("off-diagonal without tail");

        // Candidate pivots live mbar slices behind the tail.
        let pivot_slice = (tail.slice + m - swap_length % m) % m;
        sys.lookup.update_full_interaction_list(&sys.path, tail, pivot_slice);
        if sys.lookup.full_num_beads() == 0 {
            return false;
        }

        let sigma_tail = build_cumulant(sys, tail, swap_length, &mut self.cumulant);
        if sigma_tail <= 0.0 {
            return false;
        }
        let pivot = select_pivot(sys, &self.cumulant);

        // Walk forward from the pivot; running into the head aborts.
        let mut b = pivot;
        for _ in 0..swap_length {
            if b == head {
                return false;
            }
            b = sys.path.next(b).expect("pivot worldline broken");
        }
        let swap = b;

        if swap == head || !sys.lookup.grid_neighbors(&sys.path, pivot, swap) {
            return false;
        }

        self.stats.attempt_at(num_levels);

        if !sys.lookup.grid_share(&sys.path, tail, swap) {
            sys.lookup.update_full_interaction_list(&sys.path, swap, pivot_slice);
        }
        let sigma_swap = build_cumulant(sys, swap, swap_length, &mut self.cumulant);
        if sigma_swap <= 0.0 {
            return false;
        }

        let p_norm = (sigma_tail / sigma_swap).min(1.0);
        if sys.random.rand() >= p_norm {
            return false;
        }

        sys.path.worm.special1 = Some(swap);
        sys.path.worm.special2 = Some(pivot);

        let mut k = 0;
        let mut b = sys.path.prev(swap).expect("pivot worldline broken");
        while b != pivot {
            self.original_pos[k] = sys.path[b];
            k += 1;
            b = sys.path.prev(b).expect("pivot worldline broken");
        }

        let old_action = sys.action.potential_action(&sys.path, pivot, swap);

        let prev_swap = sys.path.prev(swap).expect("pivot worldline broken");
        sys.path.set_prev(tail, Some(prev_swap));
        sys.path.set_prev(swap, None);
        sys.path.set_next(prev_swap, Some(tail));

        sys.path.worm.special1 = Some(tail);
        sys.path.worm.tail = Some(swap);

        let mut k = 0;
        let mut b = prev_swap;
        while b != pivot {
            let neighbor = sys.path.next(b).expect("swap segment broken");
            let pos = new_staging_position(
                &sys.path,
                &sys.constants,
                &mut sys.random,
                neighbor,
                pivot,
                swap_length,
                k,
            );
            sys.path.update_bead(b, pos);
            k += 1;
            b = sys.path.prev(b).expect("swap segment broken");
        }

        let old_tail = tail;
        let new_action = sys.action.potential_action(&sys.path, pivot, old_tail);

        if sys.random.rand() < (-(new_action - old_action)).exp() {
            self.stats.accept_at(num_levels);
            let head = sys.path.worm.head.expect("off-diagonal without head");
            sys.path.update_worm(head, swap);
            true
        } else {
            Self::undo(sys, swap, prev_swap, pivot, &self.original_pos);
            false
        }
    }
}
