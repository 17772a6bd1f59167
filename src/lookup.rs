//! Spatial neighbor grid for the swap moves.
//!
//! The cell is divided into a uniform grid; two beads interact through a
//! swap pivot only when their grid cells are adjacent. With fewer than
//! three cells along an axis the neighborhood covers the whole cell and
//! every pair counts as adjacent there.

use crate::constants::Constants;
use crate::container::Container;
use crate::path::{BeadLoc, Path};
use crate::{DVec, NDIM};

#[derive(Debug, Clone)]
pub struct LookupTable {
    num_grid: [usize; NDIM],
    cell: DVec,
    side: DVec,
    periodic: [bool; NDIM],
    /// Beads found by the last `update_full_interaction_list` call.
    pub full_bead_list: Vec<BeadLoc>,
}

impl LookupTable {
    pub fn new(container: &Container, constants: &Constants) -> Self {
        let mut num_grid = [1usize; NDIM];
        let mut cell = DVec::zeros();
        for i in 0..NDIM {
            num_grid[i] = ((container.side[i] / constants.lookup_cell).floor() as usize).max(1);
            cell[i] = container.side[i] / num_grid[i] as f64;
        }
        Self {
            num_grid,
            cell,
            side: container.side,
            periodic: container.periodic,
            full_bead_list: Vec::new(),
        }
    }

    pub fn full_num_beads(&self) -> usize {
        self.full_bead_list.len()
    }

    fn grid_coord(&self, pos: &DVec) -> [usize; NDIM] {
        let mut coord = [0usize; NDIM];
        for i in 0..NDIM {
            let shifted = pos[i] + 0.5 * self.side[i];
            let c = (shifted / self.cell[i]).floor() as isize;
            coord[i] = c.clamp(0, self.num_grid[i] as isize - 1) as usize;
        }
        coord
    }

    fn coords_adjacent(&self, a: &[usize; NDIM], b: &[usize; NDIM]) -> bool {
        for i in 0..NDIM {
            if self.num_grid[i] < 3 {
                continue;
            }
            let n = self.num_grid[i] as isize;
            let mut d = (a[i] as isize - b[i] as isize).abs();
            if self.periodic[i] {
                d = d.min(n - d);
            }
            if d > 1 {
                return false;
            }
        }
        true
    }

    /// Are `a` and `b` in the same grid cell?
    pub fn grid_share(&self, path: &Path, a: BeadLoc, b: BeadLoc) -> bool {
        self.grid_coord(&path[a]) == self.grid_coord(&path[b])
    }

    /// Are `a` and `b` in adjacent (or the same) grid cells?
    pub fn grid_neighbors(&self, path: &Path, a: BeadLoc, b: BeadLoc) -> bool {
        self.coords_adjacent(&self.grid_coord(&path[a]), &self.grid_coord(&path[b]))
    }

    /// Collect into `full_bead_list` every bead at `pivot_slice` whose grid
    /// cell neighbors the cell of `b`.
    pub fn update_full_interaction_list(&mut self, path: &Path, b: BeadLoc, pivot_slice: usize) {
        let center = self.grid_coord(&path[b]);
        self.full_bead_list.clear();
        for candidate in path.slice_beads(pivot_slice) {
            if self.coords_adjacent(&center, &self.grid_coord(&path[candidate])) {
                self.full_bead_list.push(candidate);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{test_config, Constants};
    use crate::path::test_path;

    fn make_lookup(cell: f64) -> (LookupTable, Constants) {
        let mut config = test_config(2, 4.0);
        config.lookup_cell = Some(cell);
        let constants = Constants::new(&config).unwrap();
        let lookup = LookupTable::new(&config.container(), &constants);
        (lookup, constants)
    }

    #[test]
    fn test_small_grid_everything_neighbors() {
        let (lookup, _) = make_lookup(2.0);
        let mut path = test_path(2);
        let a = path.bead_at_slice(0, 0);
        let b = path.bead_at_slice(0, 1);
        path.update_bead(a, DVec::repeat(-1.9));
        path.update_bead(b, DVec::repeat(1.9));
        assert!(lookup.grid_neighbors(&path, a, b));
    }

    #[test]
    fn test_fine_grid_separates_cells() {
        let (lookup, _) = make_lookup(0.5);
        let mut path = test_path(2);
        let a = path.bead_at_slice(0, 0);
        let b = path.bead_at_slice(0, 1);
        path.update_bead(a, DVec::repeat(-1.75));
        path.update_bead(b, DVec::repeat(-0.25));
        assert!(!lookup.grid_neighbors(&path, a, b));
        assert!(!lookup.grid_share(&path, a, b));

        // Wrapping across the periodic boundary is adjacent.
        path.update_bead(b, DVec::repeat(1.75));
        assert!(lookup.grid_neighbors(&path, a, b));
    }

    #[test]
    fn test_full_interaction_list() {
        let (mut lookup, _) = make_lookup(0.5);
        let mut path = test_path(3);
        let center = path.bead_at_slice(0, 0);
        let near = path.bead_at_slice(2, 0);
        let far = path.bead_at_slice(2, 1);
        let far2 = path.bead_at_slice(2, 2);
        let off_slice = path.bead_at_slice(3, 2);
        path.update_bead(center, DVec::zeros());
        path.update_bead(near, DVec::repeat(0.3));
        path.update_bead(far, DVec::repeat(1.6));
        path.update_bead(far2, DVec::repeat(-1.6));
        path.update_bead(off_slice, DVec::zeros());

        lookup.update_full_interaction_list(&path, center, 2);
        assert_eq!(lookup.full_num_beads(), 1);
        assert!(lookup.full_bead_list.contains(&near));
        assert!(!lookup.full_bead_list.contains(&far));
        assert!(!lookup.full_bead_list.contains(&off_slice));
    }
}
