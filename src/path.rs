//! Worldline storage: beads and their imaginary-time links.
//!
//! Beads are addressed by `(slice, index)` pairs. Slots within a slice are
//! recycled through a free list, so an index stays valid for as long as its
//! bead is alive and `prev`/`next` references never dangle. The worm state
//! rides along with the path because every topology change must update
//! both together.

use crate::constants::Constants;
use crate::container::Container;
use crate::random::Random;
use crate::worm::Worm;
use crate::DVec;

/// Identifier of a bead: imaginary-time slice plus per-slice slot index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BeadLoc {
    pub slice: usize,
    pub index: usize,
}

#[derive(Debug, Clone)]
pub struct Path {
    pub num_time_slices: usize,
    pub container: Container,
    pub worm: Worm,
    positions: Vec<Vec<DVec>>,
    alive: Vec<Vec<bool>>,
    next_link: Vec<Vec<Option<BeadLoc>>>,
    prev_link: Vec<Vec<Option<BeadLoc>>>,
    free_slots: Vec<Vec<usize>>,
    beads_at_slice: Vec<usize>,
    total_beads: usize,
}

impl Path {
    /// Build an initial diagonal configuration: `num_particles` worldlines,
    /// each a closed ring straight in imaginary time at a uniform random
    /// position.
    pub fn new(constants: &Constants, container: Container, random: &mut Random) -> Self {
        let m = constants.num_time_slices;
        let n = constants.initial_num_particles;
        let mut path = Self {
            num_time_slices: m,
            container,
            worm: Worm::new(constants),
            positions: vec![Vec::new(); m],
            alive: vec![Vec::new(); m],
            next_link: vec![Vec::new(); m],
            prev_link: vec![Vec::new(); m],
            free_slots: vec![Vec::new(); m],
            beads_at_slice: vec![0; m],
            total_beads: 0,
        };

        for _ in 0..n {
            let pos = path.container.rand_position(random);
            let ring: Vec<BeadLoc> = (0..m).map(|s| path.add_bead(s, pos)).collect();
            for s in 0..m {
                let next = ring[(s + 1) % m];
                let prev = ring[(s + m - 1) % m];
                path.set_next(ring[s], Some(next));
                path.set_prev(ring[s], Some(prev));
            }
        }
        path
    }

    pub fn is_alive(&self, b: BeadLoc) -> bool {
        self.alive
            .get(b.slice)
            .and_then(|slots| slots.get(b.index))
            .copied()
            .unwrap_or(false)
    }

    pub fn num_beads_at_slice(&self, s: usize) -> usize {
        self.beads_at_slice[s]
    }

    /// Total number of live beads.
    pub fn num_beads(&self) -> usize {
        self.total_beads
    }

    /// Number of closed worldlines' worth of beads: the worm does not count
    /// as a particle until it is closed.
    pub fn true_num_particles(&self) -> usize {
        (self.total_beads - self.worm.length) / self.num_time_slices
    }

    /// The `n`-th live bead at a slice (counting order is stable between
    /// mutations).
    pub fn bead_at_slice(&self, s: usize, n: usize) -> BeadLoc {
        let mut seen = 0;
        for (index, &on) in self.alive[s].iter().enumerate() {
            if on {
                if seen == n {
                    return BeadLoc { slice: s, index };
                }
                seen += 1;
            }
        }
        panic!("slice {s} has fewer than {n} live beads");
    }

    /// Iterate over the live beads of one slice.
    pub fn slice_beads(&self, s: usize) -> impl Iterator<Item = BeadLoc> + '_ {
        self.alive[s]
            .iter()
            .enumerate()
            .filter(|(_, &on)| on)
            .map(move |(index, _)| BeadLoc { slice: s, index })
    }

    pub fn next(&self, b: BeadLoc) -> Option<BeadLoc> {
        self.next_link[b.slice][b.index]
    }

    pub fn prev(&self, b: BeadLoc) -> Option<BeadLoc> {
        self.prev_link[b.slice][b.index]
    }

    /// Follow `k` next-links.
    pub fn next_by(&self, b: BeadLoc, k: usize) -> Option<BeadLoc> {
        let mut walker = b;
        for _ in 0..k {
            walker = self.next(walker)?;
        }
        Some(walker)
    }

    /// Follow `k` prev-links.
    pub fn prev_by(&self, b: BeadLoc, k: usize) -> Option<BeadLoc> {
        let mut walker = b;
        for _ in 0..k {
            walker = self.prev(walker)?;
        }
        Some(walker)
    }

    pub fn set_next(&mut self, b: BeadLoc, link: Option<BeadLoc>) {
        self.next_link[b.slice][b.index] = link;
    }

    pub fn set_prev(&mut self, b: BeadLoc, link: Option<BeadLoc>) {
        self.prev_link[b.slice][b.index] = link;
    }

    /// Minimum-image separation `pos(a) - pos(b)`.
    pub fn get_separation(&self, a: BeadLoc, b: BeadLoc) -> DVec {
        let mut sep = self[a] - self[b];
        self.container.put_in_bc(&mut sep);
        sep
    }

    pub fn update_bead(&mut self, b: BeadLoc, pos: DVec) {
        self.positions[b.slice][b.index] = pos;
    }

    /// Allocate a bead with NIL links and return its identifier.
    pub fn add_bead(&mut self, slice: usize, pos: DVec) -> BeadLoc {
        let index = match self.free_slots[slice].pop() {
            Some(index) => {
                self.positions[slice][index] = pos;
                self.alive[slice][index] = true;
                self.next_link[slice][index] = None;
                self.prev_link[slice][index] = None;
                index
            }
            None => {
                self.positions[slice].push(pos);
                self.alive[slice].push(true);
                self.next_link[slice].push(None);
                self.prev_link[slice].push(None);
                self.positions[slice].len() - 1
            }
        };
        self.beads_at_slice[slice] += 1;
        self.total_beads += 1;
        BeadLoc { slice, index }
    }

    /// Allocate a bead on the following slice and link it after `b`.
    pub fn add_next_bead(&mut self, b: BeadLoc, pos: DVec) -> BeadLoc {
        let slice = (b.slice + 1) % self.num_time_slices;
        let new = self.add_bead(slice, pos);
        self.set_next(b, Some(new));
        self.set_prev(new, Some(b));
        new
    }

    /// Allocate a bead on the preceding slice and link it before `b`.
    pub fn add_prev_bead(&mut self, b: BeadLoc, pos: DVec) -> BeadLoc {
        let slice = (b.slice + self.num_time_slices - 1) % self.num_time_slices;
        let new = self.add_bead(slice, pos);
        self.set_prev(b, Some(new));
        self.set_next(new, Some(b));
        new
    }

    fn del_bead(&mut self, b: BeadLoc) {
        debug_assert!(self.is_alive(b), "deleting a dead bead");
        if let Some(n) = self.next(b) {
            self.set_prev(n, None);
        }
        if let Some(p) = self.prev(b) {
            self.set_next(p, None);
        }
        self.next_link[b.slice][b.index] = None;
        self.prev_link[b.slice][b.index] = None;
        self.alive[b.slice][b.index] = false;
        self.free_slots[b.slice].push(b.index);
        self.beads_at_slice[b.slice] -= 1;
        self.total_beads -= 1;
    }

    /// Destroy `b` and return what used to be its next bead. The surviving
    /// neighbors' facing links become NIL.
    pub fn del_bead_get_next(&mut self, b: BeadLoc) -> Option<BeadLoc> {
        let next = self.next(b);
        self.del_bead(b);
        next
    }

    /// Destroy `b` and return what used to be its previous bead.
    pub fn del_bead_get_prev(&mut self, b: BeadLoc) -> Option<BeadLoc> {
        let prev = self.prev(b);
        self.del_bead(b);
        prev
    }

    /// Install a new worm: set head/tail, clear the transient markers, and
    /// recompute length and gap from the links.
    pub fn update_worm(&mut self, head: BeadLoc, tail: BeadLoc) {
        let m = self.num_time_slices;
        let mut gap = (m + tail.slice - head.slice) % m;
        if gap == 0 {
            gap = m;
        }
        let mut length = 0;
        let mut walker = tail;
        while walker != head {
            walker = self.next(walker).expect("worm chain broken between tail and head");
            length += 1;
        }
        self.worm.head = Some(head);
        self.worm.tail = Some(tail);
        self.worm.special1 = None;
        self.worm.special2 = None;
        self.worm.length = length;
        self.worm.gap = gap;
        self.worm.is_config_diagonal = false;
    }

    /// Full consistency audit: link reciprocity, per-slice counts, and the
    /// worm bookkeeping. Intended for debug builds and tests.
    pub fn check_links(&self) -> Result<(), String> {
        let m = self.num_time_slices;
        let mut total = 0;
        for s in 0..m {
            let mut count = 0;
            for index in 0..self.alive[s].len() {
                if !self.alive[s][index] {
                    continue;
                }
                count += 1;
                let b = BeadLoc { slice: s, index };
                if let Some(n) = self.next(b) {
                    if !self.is_alive(n) {
                        return Err(format!("next link of {b:?} points at dead bead {n:?}"));
                    }
                    if self.prev(n) != Some(b) {
                        return Err(format!("prev(next({b:?})) != {b:?}"));
                    }
                    if n.slice != (s + 1) % m {
                        return Err(format!("next link of {b:?} skips slices"));
                    }
                } else if self.worm.head != Some(b) {
                    return Err(format!("bead {b:?} has no next but is not the head"));
                }
                if let Some(p) = self.prev(b) {
                    if !self.is_alive(p) {
                        return Err(format!("prev link of {b:?} points at dead bead {p:?}"));
                    }
                    if self.next(p) != Some(b) {
                        return Err(format!("next(prev({b:?})) != {b:?}"));
                    }
                } else if self.worm.tail != Some(b) {
                    return Err(format!("bead {b:?} has no prev but is not the tail"));
                }
            }
            if count != self.beads_at_slice[s] {
                return Err(format!(
                    "slice {s} count mismatch: stored {} found {count}",
                    self.beads_at_slice[s]
                ));
            }
            total += count;
        }
        if total != self.total_beads {
            return Err(format!("total bead count mismatch: stored {} found {total}", self.total_beads));
        }

        if self.worm.is_config_diagonal {
            if self.worm.head.is_some() || self.worm.tail.is_some() {
                return Err("diagonal configuration with worm endpoints set".to_string());
            }
            if self.worm.length != 0 || self.worm.gap != 0 {
                return Err("diagonal configuration with nonzero length or gap".to_string());
            }
        } else {
            let (Some(head), Some(tail)) = (self.worm.head, self.worm.tail) else {
                return Err("off-diagonal configuration missing an endpoint".to_string());
            };
            if !self.is_alive(head) || !self.is_alive(tail) {
                return Err("worm endpoint names a dead bead".to_string());
            }
            if self.next(head).is_some() {
                return Err("worm head has a next link".to_string());
            }
            if self.prev(tail).is_some() {
                return Err("worm tail has a prev link".to_string());
            }
            let mut length = 0;
            let mut walker = tail;
            while walker != head {
                match self.next(walker) {
                    Some(n) => walker = n,
                    None => return Err("tail does not reach head via next links".to_string()),
                }
                length += 1;
            }
            if length != self.worm.length {
                return Err(format!("worm length mismatch: stored {} walked {length}", self.worm.length));
            }
            let mut gap = (m + tail.slice - head.slice) % m;
            if gap == 0 {
                gap = m;
            }
            if gap != self.worm.gap {
                return Err(format!("worm gap mismatch: stored {} computed {gap}", self.worm.gap));
            }
        }
        Ok(())
    }
}

impl std::ops::Index<BeadLoc> for Path {
    type Output = DVec;

    fn index(&self, b: BeadLoc) -> &DVec {
        &self.positions[b.slice][b.index]
    }
}

/// Equality of the live configuration: positions, links, counts and worm
/// markers. Dead slots and free-list ordering are ignored.
impl PartialEq for Path {
    fn eq(&self, other: &Self) -> bool {
        if self.num_time_slices != other.num_time_slices
            || self.beads_at_slice != other.beads_at_slice
            || self.worm != other.worm
        {
            return false;
        }
        for s in 0..self.num_time_slices {
            let slots = self.alive[s].len().max(other.alive[s].len());
            for index in 0..slots {
                let b = BeadLoc { slice: s, index };
                if self.is_alive(b) != other.is_alive(b) {
                    return false;
                }
                if self.is_alive(b)
                    && (self[b] != other[b]
                        || self.next(b) != other.next(b)
                        || self.prev(b) != other.prev(b))
                {
                    return false;
                }
            }
        }
        true
    }
}

/// Small diagonal test configuration shared by the module tests.
#[cfg(test)]
pub(crate) fn test_path(n: usize) -> Path {
    let config = crate::constants::test_config(n, 4.0);
    let constants = Constants::new(&config).unwrap();
    let mut random = Random::seeded(99);
    Path::new(&constants, config.container(), &mut random)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn make_path(n: usize) -> Path {
        test_path(n)
    }

    #[test]
    fn test_initial_configuration() {
        let path = make_path(3);
        assert_eq!(path.num_beads(), 3 * 8);
        for s in 0..8 {
            assert_eq!(path.num_beads_at_slice(s), 3);
        }
        assert_eq!(path.true_num_particles(), 3);
        assert!(path.worm.is_config_diagonal);
        path.check_links().unwrap();
    }

    #[test]
    fn test_ring_wraps_in_time() {
        let path = make_path(2);
        let b = path.bead_at_slice(0, 0);
        let around = path.next_by(b, path.num_time_slices).unwrap();
        assert_eq!(around, b);
        let back = path.prev_by(b, path.num_time_slices).unwrap();
        assert_eq!(back, b);
    }

    #[test]
    fn test_get_separation_minimum_image() {
        let mut path = make_path(2);
        let a = path.bead_at_slice(0, 0);
        let b = path.bead_at_slice(0, 1);
        path.update_bead(a, DVec::repeat(1.9));
        path.update_bead(b, DVec::repeat(-1.9));
        let sep = path.get_separation(a, b);
        for i in 0..crate::NDIM {
            assert_relative_eq!(sep[i], -0.2, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_del_bead_nils_neighbor_links() {
        let mut path = make_path(1);
        let b = path.bead_at_slice(2, 0);
        let prev = path.prev(b).unwrap();
        let next = path.next(b).unwrap();
        let got = path.del_bead_get_next(b).unwrap();
        assert_eq!(got, next);
        assert_eq!(path.next(prev), None);
        assert_eq!(path.prev(next), None);
        assert_eq!(path.num_beads_at_slice(2), 0);
        assert_eq!(path.num_beads(), 7);
    }

    #[test]
    fn test_slot_reuse_after_delete() {
        let mut path = make_path(2);
        let b = path.bead_at_slice(4, 1);
        path.del_bead_get_next(b);
        let pos = DVec::repeat(0.25);
        let again = path.add_bead(4, pos);
        assert_eq!(again.index, b.index);
        assert_eq!(path[again], pos);
        assert_eq!(path.num_beads_at_slice(4), 2);
    }

    #[test]
    fn test_add_next_and_prev_bead_link() {
        let mut path = make_path(1);
        // Open the ring at slice 0 by hand.
        let tail = path.bead_at_slice(3, 0);
        let head = path.prev(tail).unwrap();
        path.set_next(head, None);
        path.set_prev(tail, None);

        let grown = path.add_next_bead(head, DVec::repeat(0.1));
        assert_eq!(grown.slice, 3);
        assert_eq!(path.next(head), Some(grown));
        assert_eq!(path.prev(grown), Some(head));

        let grown_back = path.add_prev_bead(tail, DVec::repeat(0.2));
        assert_eq!(grown_back.slice, 2);
        assert_eq!(path.prev(tail), Some(grown_back));
        assert_eq!(path.next(grown_back), Some(tail));
    }

    #[test]
    fn test_update_worm_after_manual_open() {
        let mut path = make_path(2);
        // Remove one interior bead of the first worldline to open a gap of 2.
        let head = path.bead_at_slice(0, 0);
        let middle = path.next(head).unwrap();
        let tail = path.next(middle).unwrap();
        path.del_bead_get_next(middle);
        path.update_worm(head, tail);

        assert!(!path.worm.is_config_diagonal);
        assert_eq!(path.worm.gap, 2);
        // The rest of the ring survives: M - gap links from tail around to head.
        assert_eq!(path.worm.length, path.num_time_slices - 2);
        assert_eq!(path.true_num_particles(), 1);
        path.check_links().unwrap();
    }

    #[test]
    fn test_worm_found_bead() {
        let mut path = make_path(2);
        let head = path.bead_at_slice(0, 1);
        let middle = path.next(head).unwrap();
        let tail = path.next(middle).unwrap();
        path.del_bead_get_next(middle);
        path.update_worm(head, tail);

        assert!(path.worm.found_bead(&path, head));
        assert!(path.worm.found_bead(&path, tail));
        let other = path.bead_at_slice(0, 0);
        assert!(!path.worm.found_bead(&path, other));
    }

    #[test]
    fn test_configuration_equality_ignores_free_list() {
        let mut a = make_path(2);
        let b = a.clone();
        assert_eq!(a, b);
        let bead = a.bead_at_slice(5, 0);
        let pos = a[bead];
        let prev = a.prev(bead).unwrap();
        let next = a.next(bead).unwrap();
        a.del_bead_get_next(bead);
        assert_ne!(a, b);
        let again = a.add_bead(5, pos);
        a.set_prev(again, Some(prev));
        a.set_next(prev, Some(again));
        a.set_next(again, Some(next));
        a.set_prev(next, Some(again));
        assert_eq!(a, b);
    }
}
