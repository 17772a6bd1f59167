//! Periodic simulation cell.
//!
//! The cell is an axis-aligned prism centered on the origin; positions live
//! in `[-side/2, side/2)` along each axis. Axes may individually be
//! non-periodic, in which case wrapping leaves the coordinate alone and the
//! caller is responsible for rejecting out-of-cell proposals.

use crate::random::Random;
use crate::{DVec, NDIM};

#[derive(Debug, Clone)]
pub struct Container {
    /// Edge lengths of the cell.
    pub side: DVec,
    /// Per-axis periodicity flags.
    pub periodic: [bool; NDIM],
    /// Cell volume.
    pub volume: f64,
}

impl Container {
    pub fn new(side: DVec, periodic: [bool; NDIM]) -> Self {
        let volume = side.iter().product();
        Self { side, periodic, volume }
    }

    /// A fully periodic cube with edge length `l`.
    pub fn cube(l: f64) -> Self {
        Self::new(DVec::repeat(l), [true; NDIM])
    }

    /// Wrap a position into the canonical cell `[-side/2, side/2)`.
    pub fn put_inside(&self, p: &mut DVec) {
        for i in 0..NDIM {
            if self.periodic[i] {
                p[i] -= self.side[i] * (p[i] / self.side[i] + 0.5).floor();
            }
        }
    }

    /// Minimum-image reduction of a separation vector.
    ///
    /// Uses round-half-away-from-zero so that `put_in_bc(-v) == -put_in_bc(v)`.
    pub fn put_in_bc(&self, v: &mut DVec) {
        for i in 0..NDIM {
            if self.periodic[i] {
                v[i] -= self.side[i] * (v[i] / self.side[i]).round();
            }
        }
    }

    /// Is the position inside the canonical cell on every axis?
    pub fn inside(&self, p: &DVec) -> bool {
        (0..NDIM).all(|i| p[i] >= -0.5 * self.side[i] && p[i] < 0.5 * self.side[i])
    }

    /// Uniform random position in the cell.
    pub fn rand_position(&self, random: &mut Random) -> DVec {
        let mut p = DVec::zeros();
        for i in 0..NDIM {
            p[i] = self.side[i] * (random.rand() - 0.5);
        }
        p
    }

    /// Small uniform displacement of an existing position, wrapped back in.
    pub fn rand_update(&self, random: &mut Random, p: &DVec, delta: f64) -> DVec {
        let mut q = *p;
        for i in 0..NDIM {
            q[i] += delta * (random.rand() - 0.5);
        }
        self.put_inside(&mut q);
        q
    }
}
