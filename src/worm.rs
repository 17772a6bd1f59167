//! Worm endpoint state.
//!
//! A diagonal configuration has every worldline closed and no worm; an
//! off-diagonal configuration has exactly one open chain whose time-forward
//! end is `head` and time-backward end is `tail`. The worm owns only its
//! markers and scalar bookkeeping; the beads themselves belong to the path.

use crate::constants::Constants;
use crate::path::{BeadLoc, Path};
use crate::DVec;

#[derive(Debug, Clone, PartialEq)]
pub struct Worm {
    /// Time-forward end of the open chain (`next(head) = NIL`).
    pub head: Option<BeadLoc>,
    /// Time-backward end of the open chain (`prev(tail) = NIL`).
    pub tail: Option<BeadLoc>,
    /// Transient marker used by moves mid-attempt.
    pub special1: Option<BeadLoc>,
    /// Second transient marker.
    pub special2: Option<BeadLoc>,
    /// Number of links (slices traversed) from tail to head; 0 when
    /// diagonal.
    pub length: usize,
    /// Missing slices between head and tail, in [1, M] off-diagonal, 0 when
    /// diagonal.
    pub gap: usize,
    /// True iff no worm is present.
    pub is_config_diagonal: bool,
    four_lambda_tau: f64,
    max_cost: f64,
}

impl Worm {
    pub fn new(constants: &Constants) -> Self {
        Self {
            head: None,
            tail: None,
            special1: None,
            special2: None,
            length: 0,
            gap: 0,
            is_config_diagonal: true,
            four_lambda_tau: 4.0 * constants.lambda * constants.tau,
            max_cost: constants.max_worm_cost,
        }
    }

    /// Return to the diagonal state, clearing all markers.
    pub fn reset(&mut self) {
        self.head = None;
        self.tail = None;
        self.special1 = None;
        self.special2 = None;
        self.length = 0;
        self.gap = 0;
        self.is_config_diagonal = true;
    }

    /// Potential-action weight of a bead: worm ends and the transient
    /// markers carry half weight, interior beads full weight.
    pub fn factor(&self, b: BeadLoc) -> f64 {
        if self.head == Some(b)
            || self.tail == Some(b)
            || self.special1 == Some(b)
            || self.special2 == Some(b)
        {
            0.5
        } else {
            1.0
        }
    }

    /// Would reconnecting over `gap` slices across `sep` carry a free-particle
    /// kinetic weight too small to ever matter?
    pub fn too_costly_sep(&self, sep: &DVec, gap: usize) -> bool {
        if gap == 0 {
            return true;
        }
        sep.norm_squared() > self.max_cost * self.four_lambda_tau * gap as f64
    }

    /// Cost predicate for the current head/tail pair.
    pub fn too_costly(&self, path: &Path) -> bool {
        match (self.head, self.tail) {
            (Some(head), Some(tail)) => {
                let sep = path.get_separation(head, tail);
                self.too_costly_sep(&sep, self.gap)
            }
            _ => true,
        }
    }

    /// Is `b` one of the beads on the open chain from tail to head?
    pub fn found_bead(&self, path: &Path, b: BeadLoc) -> bool {
        let (Some(head), Some(tail)) = (self.head, self.tail) else {
            return false;
        };
        let mut walker = tail;
        loop {
            if walker == b {
                return true;
            }
            if walker == head {
                return false;
            }
            match path.next(walker) {
                Some(n) => walker = n,
                None => return false,
            }
        }
    }

    /// Does `b` name a live bead?
    pub fn bead_on(&self, path: &Path, b: BeadLoc) -> bool {
        path.is_alive(b)
    }
}
