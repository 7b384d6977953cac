// Copyright 2024 The bondorder developers
//
// Licensed under the Apache license, version 2.0 (the "license");
// you may not use this file except in compliance with the license.
// You may obtain a copy of the license at
//
//     http://www.apache.org/licenses/license-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the license is distributed on an "as is" basis,
// without warranties or conditions of any kind, either express or implied.
// See the license for the specific language governing permissions and
// limitations under the license.

use super::{Atoms, TopologyError};
use crate::Vector3;
use itertools::iproduct;
use log::debug;

/// Directed pair list within a cutoff radius.
///
/// Every bond appears in both directions, (i, j, Δr) and (j, i, −Δr), with
/// Δr = x_j − x_i including the periodic image shift. Pairs are sorted by
/// owner atom; `first` holds the CSR row offsets per atom.
#[derive(Clone, Debug)]
pub struct NeighborList {
    n_atoms: usize,
    i: Vec<usize>,
    j: Vec<usize>,
    r: Vec<f64>,
    dr: Vec<Vector3>,
    first: Vec<usize>,
}

impl NeighborList {
    /// Enumerate all pairs within `cutoff`, including self-images and
    /// multiple images in small periodic cells.
    pub fn build(atoms: &Atoms, cutoff: f64) -> Result<Self, TopologyError> {
        if atoms.is_empty() {
            return Err(TopologyError::ZeroAtoms);
        }
        if !(cutoff > 0.0) {
            return Err(TopologyError::InvalidCutoff(cutoff));
        }

        let n_atoms = atoms.len();
        let cell = atoms.cell();
        let widths = cell.perpendicular_widths();
        let reach = |axis: usize| -> i64 {
            if cell.pbc()[axis] {
                (cutoff / widths[axis]).ceil() as i64
            } else {
                0
            }
        };
        let (nx, ny, nz) = (reach(0), reach(1), reach(2));

        let cutoff_sq = cutoff * cutoff;
        let positions = atoms.positions();
        let mut i_p = Vec::new();
        let mut j_p = Vec::new();
        let mut r_p = Vec::new();
        let mut dr_p = Vec::new();
        for i in 0..n_atoms {
            for (j, (sx, sy, sz)) in
                iproduct!(0..n_atoms, iproduct!(-nx..=nx, -ny..=ny, -nz..=nz))
            {
                if i == j && (sx, sy, sz) == (0, 0, 0) {
                    continue;
                }
                let shift = cell.to_cartesian(&Vector3::new(sx as f64, sy as f64, sz as f64));
                let dr = positions[j] + shift - positions[i];
                let dist_sq = dr.norm_squared();
                if dist_sq > cutoff_sq || dist_sq == 0.0 {
                    continue;
                }
                i_p.push(i);
                j_p.push(j);
                r_p.push(dist_sq.sqrt());
                dr_p.push(dr);
            }
        }

        let mut first = vec![0; n_atoms + 1];
        for &i in &i_p {
            first[i + 1] += 1;
        }
        for a in 0..n_atoms {
            first[a + 1] += first[a];
        }

        debug!("neighbor list: {} pairs within cutoff {cutoff}", i_p.len());
        Ok(Self {
            n_atoms,
            i: i_p,
            j: j_p,
            r: r_p,
            dr: dr_p,
            first,
        })
    }

    pub fn len(&self) -> usize {
        self.i.len()
    }

    pub fn is_empty(&self) -> bool {
        self.i.is_empty()
    }

    pub fn n_atoms(&self) -> usize {
        self.n_atoms
    }

    /// Owner atom per pair
    pub fn i(&self) -> &[usize] {
        &self.i
    }

    /// Neighbor atom per pair
    pub fn j(&self) -> &[usize] {
        &self.j
    }

    /// Pair distances
    pub fn r(&self) -> &[f64] {
        &self.r
    }

    /// Pair displacement vectors, x_j − x_i
    pub fn dr(&self) -> &[Vector3] {
        &self.dr
    }

    /// CSR row offsets: pairs owned by atom `a` occupy
    /// `first()[a]..first()[a + 1]`.
    pub fn first(&self) -> &[usize] {
        &self.first
    }

    /// Pair index range owned by one atom
    pub fn neighbors(&self, atom: usize) -> std::ops::Range<usize> {
        self.first[atom]..self.first[atom + 1]
    }

    /// For each pair, the index of its mirror (j, i, −Δr).
    ///
    /// The mirror always exists because the image enumeration in [`build`]
    /// is symmetric under (i, j, shift) → (j, i, −shift).
    ///
    /// [`build`]: NeighborList::build
    pub fn reverse_indices(&self) -> Vec<usize> {
        (0..self.len())
            .map(|p| {
                let tol = 1e-9 * self.r[p].max(1.0);
                self.neighbors(self.j[p])
                    .find(|&q| self.j[q] == self.i[p] && (self.dr[q] + self.dr[p]).norm() <= tol)
                    .expect("mirror pair missing from a symmetric neighbor list")
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::Cell;
    use approx::assert_relative_eq;

    fn dimer(separation: f64) -> Atoms {
        let cell = Cell::cubic(50.0, false).unwrap();
        Atoms::new(
            vec![Vector3::zeros(), Vector3::new(separation, 0.0, 0.0)],
            vec![0, 0],
            vec![1.0, 1.0],
            cell,
        )
        .unwrap()
    }

    #[test]
    fn dimer_has_both_directions() {
        let nl = NeighborList::build(&dimer(1.0), 1.5).unwrap();
        assert_eq!(nl.len(), 2);
        assert_eq!(nl.i(), [0, 1]);
        assert_eq!(nl.j(), [1, 0]);
        assert_relative_eq!(nl.r()[0], 1.0);
        assert_eq!(nl.dr()[1], Vector3::new(-1.0, 0.0, 0.0));
        assert_eq!(nl.first(), [0, 1, 2]);
    }

    #[test]
    fn out_of_range_is_empty() {
        let nl = NeighborList::build(&dimer(3.0), 1.5).unwrap();
        assert!(nl.is_empty());
        assert_eq!(nl.first(), [0, 0, 0]);
    }

    #[test]
    fn periodic_self_images() {
        // single atom in a small periodic cube: six nearest self-images
        let cell = Cell::cubic(2.0, true).unwrap();
        let atoms = Atoms::new(vec![Vector3::zeros()], vec![0], vec![1.0], cell).unwrap();
        let nl = NeighborList::build(&atoms, 2.2).unwrap();
        assert_eq!(nl.len(), 6);
        assert!(nl.i().iter().all(|&i| i == 0));
        assert!(nl.r().iter().all(|&r| (r - 2.0).abs() < 1e-12));
    }

    #[test]
    fn reverse_indices_are_involutive() {
        let cell = Cell::cubic(4.0, true).unwrap();
        let atoms = Atoms::new(
            vec![
                Vector3::new(0.1, 0.2, 0.3),
                Vector3::new(1.4, 0.1, 0.2),
                Vector3::new(0.3, 1.5, 3.9),
            ],
            vec![0, 0, 0],
            vec![1.0, 1.0, 1.0],
            cell,
        )
        .unwrap();
        let nl = NeighborList::build(&atoms, 1.9).unwrap();
        let rev = nl.reverse_indices();
        assert!(!nl.is_empty());
        for p in 0..nl.len() {
            let q = rev[p];
            assert_eq!(rev[q], p);
            assert_eq!(nl.i()[q], nl.j()[p]);
            assert_eq!(nl.j()[q], nl.i()[p]);
            assert_relative_eq!((nl.dr()[q] + nl.dr()[p]).norm(), 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn input_errors() {
        let cell = Cell::cubic(10.0, true).unwrap();
        let empty = Atoms::new(vec![], vec![], vec![], cell.clone()).unwrap();
        assert!(matches!(
            NeighborList::build(&empty, 1.0),
            Err(TopologyError::ZeroAtoms)
        ));
        let atoms = Atoms::new(vec![Vector3::zeros()], vec![0], vec![1.0], cell).unwrap();
        assert!(matches!(
            NeighborList::build(&atoms, 0.0),
            Err(TopologyError::InvalidCutoff(_))
        ));
    }
}
