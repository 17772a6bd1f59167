//! Move selection and bookkeeping.
//!
//! The driver owns the full move set and the shared system state. Each
//! step draws one move with probability proportional to its attempt
//! weight, restricted to the moves whose sector matches the current
//! configuration, and tallies the outcome. In debug builds every accepted
//! move is followed by a full link audit.

use crate::moves::{
    AdvanceHead, AdvanceTail, Bisection, CenterOfMass, Close, Ensemble, Insert, Move, Open,
    RecedeHead, RecedeTail, Remove, Staging, SwapHead, SwapTail, System,
};

/// Per-move diagnostics snapshot.
#[derive(Debug, Clone)]
pub struct MoveReport {
    pub name: &'static str,
    pub attempted: u64,
    pub accepted: u64,
    pub acceptance_ratio: f64,
    /// (attempted, accepted) per bisection-level bin.
    pub levels: Vec<(u64, u64)>,
}

pub struct PimcDriver {
    pub system: System,
    moves: Vec<Box<dyn Move>>,
    weights: Vec<f64>,
    pub tot_attempted: u64,
    pub tot_accepted: u64,
    steps: u64,
    diagonal_steps: u64,
}

impl PimcDriver {
    pub fn new(system: System) -> Self {
        let constants = &system.constants;
        let moves: Vec<Box<dyn Move>> = vec![
            Box::new(CenterOfMass::new(constants)),
            Box::new(Staging::new(constants)),
            Box::new(Bisection::new(constants)),
            Box::new(Open::new(constants)),
            Box::new(Close::new(constants)),
            Box::new(Insert::new(constants)),
            Box::new(Remove::new(constants)),
            Box::new(AdvanceHead::new(constants)),
            Box::new(RecedeHead::new(constants)),
            Box::new(AdvanceTail::new(constants)),
            Box::new(RecedeTail::new(constants)),
            Box::new(SwapHead::new(constants)),
            Box::new(SwapTail::new(constants)),
        ];
        let weights = moves.iter().map(|m| constants.attempt_prob(m.name())).collect();
        Self {
            system,
            moves,
            weights,
            tot_attempted: 0,
            tot_accepted: 0,
            steps: 0,
            diagonal_steps: 0,
        }
    }

    /// Attempt one randomly selected, sector-eligible move.
    pub fn step(&mut self) -> bool {
        let diagonal = self.system.path.worm.is_config_diagonal;
        self.steps += 1;
        if diagonal {
            self.diagonal_steps += 1;
        }

        let eligible: Vec<usize> = (0..self.moves.len())
            .filter(|&i| {
                self.weights[i] > 0.0
                    && match self.moves[i].ensemble() {
                        Ensemble::Any => true,
                        Ensemble::Diagonal => diagonal,
                        Ensemble::OffDiagonal => !diagonal,
                    }
            })
            .collect();
        let total: f64 = eligible.iter().map(|&i| self.weights[i]).sum();
        if total <= 0.0 {
            return false;
        }

        let mut u = self.system.random.rand() * total;
        let mut chosen = eligible[eligible.len() - 1];
        for &i in &eligible {
            u -= self.weights[i];
            if u < 0.0 {
                chosen = i;
                break;
            }
        }

        let before = self.moves[chosen].stats().attempted;
        let accepted = self.moves[chosen].attempt(&mut self.system);
        self.tot_attempted += self.moves[chosen].stats().attempted - before;
        if accepted {
            self.tot_accepted += 1;
            #[cfg(debug_assertions)]
            if let Err(problem) = self.system.path.check_links() {
                panic!("invariant violation after '{}': {problem}", self.moves[chosen].name());
            }
        }
        accepted
    }

    /// One sweep: `M * max(N, 1)` move attempts.
    pub fn sweep(&mut self) {
        let attempts =
            self.system.constants.num_time_slices * self.system.path.true_num_particles().max(1);
        for _ in 0..attempts {
            self.step();
        }
    }

    /// Fraction of steps that started from the diagonal sector.
    pub fn diagonal_fraction(&self) -> f64 {
        if self.steps == 0 {
            0.0
        } else {
            self.diagonal_steps as f64 / self.steps as f64
        }
    }

    pub fn acceptance_report(&self) -> Vec<MoveReport> {
        self.moves
            .iter()
            .map(|m| {
                let stats = m.stats();
                MoveReport {
                    name: m.name(),
                    attempted: stats.attempted,
                    accepted: stats.accepted,
                    acceptance_ratio: stats.acceptance_ratio(),
                    levels: stats
                        .attempted_level
                        .iter()
                        .zip(stats.accepted_level.iter())
                        .map(|(&a, &b)| (a, b))
                        .collect(),
                }
            })
            .collect()
    }
}
