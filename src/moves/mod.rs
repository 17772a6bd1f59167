//! The worm-algorithm update library.
//!
//! Every move implements [`Move`]: it inspects the shared [`System`],
//! decides eligibility, proposes a trajectory change, and either commits or
//! rolls the configuration back exactly. Moves are tagged with the sector
//! they operate on; the driver only invokes a move when the configuration
//! is in that sector.

mod advance_recede;
mod bisection;
mod center_of_mass;
mod insert_remove;
mod open_close;
mod staging;
mod swap;

pub use advance_recede::{AdvanceHead, AdvanceTail, RecedeHead, RecedeTail};
pub use bisection::Bisection;
pub use center_of_mass::CenterOfMass;
pub use insert_remove::{Insert, Remove};
pub use open_close::{Close, Open};
pub use staging::Staging;
pub use swap::{SwapHead, SwapTail};

use crate::action::Action;
use crate::constants::Constants;
use crate::container::Container;
use crate::lookup::LookupTable;
use crate::path::{BeadLoc, Path};
use crate::random::Random;
use crate::{DVec, NDIM};

/// Which sector a move is allowed to act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ensemble {
    Diagonal,
    OffDiagonal,
    Any,
}

/// The shared mutable state every move operates on.
pub struct System {
    pub constants: Constants,
    pub path: Path,
    pub lookup: LookupTable,
    pub action: Box<dyn Action>,
    pub random: Random,
}

impl System {
    pub fn new(
        constants: Constants,
        container: Container,
        action: Box<dyn Action>,
        seed: u64,
    ) -> Self {
        let mut random = Random::seeded(seed);
        let lookup = LookupTable::new(&container, &constants);
        let path = Path::new(&constants, container, &mut random);
        Self { constants, path, lookup, action, random }
    }
}

/// Attempt and acceptance counters, binned by bisection level for the
/// variable-length moves.
#[derive(Debug, Clone)]
pub struct MoveStats {
    pub attempted: u64,
    pub accepted: u64,
    pub attempted_level: Vec<u64>,
    pub accepted_level: Vec<u64>,
}

impl MoveStats {
    pub fn new(constants: &Constants) -> Self {
        let bins = levels_for(constants.mbar).max(constants.levels) + 1;
        Self {
            attempted: 0,
            accepted: 0,
            attempted_level: vec![0; bins],
            accepted_level: vec![0; bins],
        }
    }

    pub fn attempt(&mut self) {
        self.attempted += 1;
    }

    pub fn attempt_at(&mut self, level: usize) {
        self.attempted += 1;
        self.attempted_level[level] += 1;
    }

    pub fn accept(&mut self) {
        self.accepted += 1;
    }

    pub fn accept_at(&mut self, level: usize) {
        self.accepted += 1;
        self.accepted_level[level] += 1;
    }

    pub fn acceptance_ratio(&self) -> f64 {
        if self.attempted == 0 {
            0.0
        } else {
            self.accepted as f64 / self.attempted as f64
        }
    }
}

pub trait Move {
    /// Display name, also the key into the attempt-probability table.
    fn name(&self) -> &'static str;

    /// Sector this move operates on.
    fn ensemble(&self) -> Ensemble;

    fn stats(&self) -> &MoveStats;

    /// Attempt the move: true on acceptance. An ineligible attempt returns
    /// false without touching state or counters.
    fn attempt(&mut self, sys: &mut System) -> bool;
}

/// ceil(log2(len)); the bisection-level bin of a segment length.
pub(crate) fn levels_for(len: usize) -> usize {
    if len <= 1 {
        0
    } else {
        (usize::BITS - (len - 1).leading_zeros()) as usize
    }
}

/// Gaussian step about a neighboring bead, exactly sampling half the
/// kinetic action: variance 2 * lambda * tau.
pub(crate) fn new_free_particle_position(
    path: &Path,
    constants: &Constants,
    random: &mut Random,
    neighbor: BeadLoc,
) -> DVec {
    let sigma = (2.0 * constants.lambda * constants.tau).sqrt();
    let mut pos = DVec::zeros();
    for i in 0..NDIM {
        pos[i] = random.rand_norm(path[neighbor][i], sigma);
    }
    path.container.put_inside(&mut pos);
    pos
}

/// Levy-bridge sample for the `k`-th interior bead of a stage of
/// `stage_length` links from `neighbor` toward `end`.
pub(crate) fn new_staging_position(
    path: &Path,
    constants: &Constants,
    random: &mut Random,
    neighbor: BeadLoc,
    end: BeadLoc,
    stage_length: usize,
    k: usize,
) -> DVec {
    let f1 = (stage_length - k - 1) as f64;
    let f2 = 1.0 / (stage_length - k) as f64;
    let sigma = (2.0 * constants.lambda * constants.tau).sqrt() * (f1 * f2).sqrt();

    let mut sep = path[end] - path[neighbor];
    path.container.put_in_bc(&mut sep);
    let mut pos = path[neighbor] + f2 * sep;
    for i in 0..NDIM {
        pos[i] = random.rand_norm(pos[i], sigma);
    }
    path.container.put_inside(&mut pos);
    pos
}

/// Gaussian about the midpoint of the two beads `lshift` links away,
/// exactly sampling the kinetic action at that bisection level.
pub(crate) fn new_bisection_position(
    path: &Path,
    constants: &Constants,
    random: &mut Random,
    b: BeadLoc,
    lshift: usize,
) -> DVec {
    let delta = (constants.lambda * constants.tau * lshift as f64).sqrt();
    let back = path.prev_by(b, lshift).expect("bisection neighbor missing");
    let forward = path.next_by(b, lshift).expect("bisection neighbor missing");
    let mut pos = path[back] + 0.5 * path.get_separation(forward, back);
    for i in 0..NDIM {
        pos[i] = random.rand_norm(pos[i], delta);
    }
    path.container.put_inside(&mut pos);
    pos
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::action::PrimitiveAction;
    use crate::constants::{test_config, Config};
    use crate::potential::FreePotential;

    /// Ideal-gas system with the small test geometry.
    pub(crate) fn free_system(n: usize, seed: u64) -> System {
        free_system_with(n, seed, |_| {})
    }

    pub(crate) fn free_system_with(
        n: usize,
        seed: u64,
        tweak: impl FnOnce(&mut Config),
    ) -> System {
        let mut config = test_config(n, 4.0);
        tweak(&mut config);
        let constants = Constants::new(&config).unwrap();
        let action = Box::new(PrimitiveAction::new(&constants, Box::new(FreePotential)));
        System::new(constants, config.container(), action, seed)
    }

    /// Manually open a worm with the given even gap starting from a bead on
    /// slice 0, mirroring what an accepted open move leaves behind.
    pub(crate) fn open_worm(sys: &mut System, gap: usize) -> (BeadLoc, BeadLoc) {
        assert!(sys.path.worm.is_config_diagonal);
        let head = sys.path.bead_at_slice(0, 0);
        let tail = sys.path.next_by(head, gap).unwrap();
        let mut b = sys.path.next(head).unwrap();
        while b != tail {
            b = sys.path.del_bead_get_next(b).unwrap();
        }
        sys.path.update_worm(head, tail);
        (head, tail)
    }
}
