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

//! Sparse block Hessian assembly.
//!
//! Off-diagonal 3×3 blocks are obtained by probing the second-derivative
//! operator with unit displacement fields for every coupled atom pair; the
//! coordination channel couples second neighbors, so the sparsity pattern
//! comes from a doubled-cutoff neighbor list. Each block is averaged with
//! its mirror's transpose, and diagonal blocks are the negative row sums
//! (translational invariance: Σ_n H_mn = 0).

use super::second::{probe, unit_displacement_field};
use super::Manybody;
use crate::potential::BondOrderPotential;
use crate::solver::MatVec;
use crate::topology::{Atoms, NeighborList};
use crate::{Error, Matrix3};
use log::debug;
use nalgebra::{DMatrix, DVector};

/// Symmetric 3N×3N matrix stored as 3×3 blocks: off-diagonal blocks in CSR
/// order by atom adjacency plus one diagonal block per atom.
///
/// The CSR views (`row_offsets`, `columns`, `blocks`) double as the flat
/// neighbor-aligned output format; [`block`] looks up a single atom pair.
///
/// [`block`]: Hessian::block
#[derive(Clone, Debug)]
pub struct Hessian {
    n_atoms: usize,
    row_offsets: Vec<usize>,
    cols: Vec<usize>,
    blocks: Vec<Matrix3>,
    diag: Vec<Matrix3>,
}

impl Hessian {
    pub fn n_atoms(&self) -> usize {
        self.n_atoms
    }

    pub fn dim(&self) -> usize {
        3 * self.n_atoms
    }

    /// CSR row offsets per atom
    pub fn row_offsets(&self) -> &[usize] {
        &self.row_offsets
    }

    /// Column atom per off-diagonal block
    pub fn columns(&self) -> &[usize] {
        &self.cols
    }

    /// Off-diagonal blocks, aligned with [`columns`](Hessian::columns)
    pub fn blocks(&self) -> &[Matrix3] {
        &self.blocks
    }

    /// Diagonal block per atom
    pub fn diagonal(&self) -> &[Matrix3] {
        &self.diag
    }

    /// The 3×3 block coupling two atoms, if nonzero
    pub fn block(&self, row: usize, col: usize) -> Option<&Matrix3> {
        if row == col {
            return Some(&self.diag[row]);
        }
        let range = self.row_offsets[row]..self.row_offsets[row + 1];
        let row_cols = &self.cols[range.clone()];
        row_cols
            .binary_search(&col)
            .ok()
            .map(|k| &self.blocks[range.start + k])
    }

    /// Dense copy, for small systems and tests
    pub fn to_dense(&self) -> DMatrix<f64> {
        let mut out = DMatrix::zeros(self.dim(), self.dim());
        for m in 0..self.n_atoms {
            for c in 0..3 {
                for d in 0..3 {
                    out[(3 * m + c, 3 * m + d)] = self.diag[m][(c, d)];
                }
            }
            for idx in self.row_offsets[m]..self.row_offsets[m + 1] {
                let n = self.cols[idx];
                for c in 0..3 {
                    for d in 0..3 {
                        out[(3 * m + c, 3 * n + d)] = self.blocks[idx][(c, d)];
                    }
                }
            }
        }
        out
    }
}

impl MatVec for Hessian {
    fn dim(&self) -> usize {
        Hessian::dim(self)
    }

    fn matvec(&self, x: &DVector<f64>) -> DVector<f64> {
        let mut y = DVector::zeros(self.dim());
        for m in 0..self.n_atoms {
            for c in 0..3 {
                let mut acc = 0.0;
                for d in 0..3 {
                    acc += self.diag[m][(c, d)] * x[3 * m + d];
                }
                for idx in self.row_offsets[m]..self.row_offsets[m + 1] {
                    let n = self.cols[idx];
                    for d in 0..3 {
                        acc += self.blocks[idx][(c, d)] * x[3 * n + d];
                    }
                }
                y[3 * m + c] = acc;
            }
        }
        y
    }
}

impl<P: BondOrderPotential> Manybody<P> {
    /// Second derivatives of the energy with respect to atomic positions.
    pub fn hessian(&self, atoms: &Atoms) -> Result<Hessian, Error> {
        self.assemble_hessian(atoms, false)
    }

    /// Hessian with every block divided by the masses: off-diagonal blocks
    /// by the geometric mean of the two atoms, diagonal blocks by the atom.
    pub fn dynamical_matrix(&self, atoms: &Atoms) -> Result<Hessian, Error> {
        self.assemble_hessian(atoms, true)
    }

    fn assemble_hessian(&self, atoms: &Atoms, divide_by_masses: bool) -> Result<Hessian, Error> {
        let cutoff = self.effective_cutoff(atoms);
        let nl = NeighborList::build(atoms, cutoff)?;
        let fields = self.second_order_fields(atoms, &nl)?;

        // the coordination channel couples atoms two bonds apart
        let nl2 = NeighborList::build(atoms, 2.0 * cutoff)?;
        let n_atoms = atoms.len();
        let mut row_offsets = vec![0usize; n_atoms + 1];
        let mut cols = Vec::new();
        for m in 0..n_atoms {
            let mut row: Vec<usize> = nl2
                .neighbors(m)
                .map(|p| nl2.j()[p])
                .filter(|&n| n != m)
                .collect();
            row.sort_unstable();
            row.dedup();
            row_offsets[m + 1] = row_offsets[m] + row.len();
            cols.extend(row);
        }

        // TODO: restrict the probe sweep to pairs touching the two probed
        // atoms instead of contracting over the full lists per block
        let mut blocks = vec![Matrix3::zeros(); cols.len()];
        for m in 0..n_atoms {
            let fa: Vec<_> = (0..3).map(|c| unit_displacement_field(&nl, m, c)).collect();
            for idx in row_offsets[m]..row_offsets[m + 1] {
                let n = cols[idx];
                let fb: Vec<_> = (0..3).map(|c| unit_displacement_field(&nl, n, c)).collect();
                for c in 0..3 {
                    for d in 0..3 {
                        blocks[idx][(c, d)] = probe(&fields, &nl, &fa[c], &fb[d]);
                    }
                }
            }
        }

        // average each block with its mirror's transpose
        for m in 0..n_atoms {
            for idx in row_offsets[m]..row_offsets[m + 1] {
                let n = cols[idx];
                if n <= m {
                    continue;
                }
                let row_n = &cols[row_offsets[n]..row_offsets[n + 1]];
                let mirror = row_offsets[n]
                    + row_n
                        .binary_search(&m)
                        .expect("adjacency of a symmetric pair list is symmetric");
                let averaged = 0.5 * (blocks[idx] + blocks[mirror].transpose());
                blocks[idx] = averaged;
                blocks[mirror] = averaged.transpose();
            }
        }

        let mut diag = vec![Matrix3::zeros(); n_atoms];
        for m in 0..n_atoms {
            for idx in row_offsets[m]..row_offsets[m + 1] {
                diag[m] -= blocks[idx];
            }
        }

        if divide_by_masses {
            let masses = atoms.masses();
            for m in 0..n_atoms {
                for idx in row_offsets[m]..row_offsets[m + 1] {
                    blocks[idx] /= (masses[m] * masses[cols[idx]]).sqrt();
                }
                diag[m] /= masses[m];
            }
        }

        debug!(
            "hessian: {} atoms, {} off-diagonal blocks",
            n_atoms,
            cols.len()
        );
        Ok(Hessian {
            n_atoms,
            row_offsets,
            cols,
            blocks,
            diag,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::potential::HarmonicBondOrder;
    use crate::topology::Cell;
    use crate::Vector3;
    use approx::assert_relative_eq;

    fn stretched_dimer() -> Atoms {
        let cell = Cell::cubic(50.0, false).unwrap();
        Atoms::new(
            vec![Vector3::zeros(), Vector3::new(1.25, 0.0, 0.0)],
            vec![0, 0],
            vec![4.0, 4.0],
            cell,
        )
        .unwrap()
    }

    #[test]
    fn dimer_blocks_are_analytic() {
        let (k, r0, r) = (3.0, 1.0, 1.25);
        let evaluator = Manybody::new(HarmonicBondOrder::pair_only(k, r0, 2.0));
        let hessian = evaluator.hessian(&stretched_dimer()).unwrap();

        // along the bond: k; transverse: tension over length
        let transverse = k * (r - r0) / r;
        let off = hessian.block(0, 1).unwrap();
        assert_relative_eq!(off[(0, 0)], -k, epsilon = 1e-9);
        assert_relative_eq!(off[(1, 1)], -transverse, epsilon = 1e-9);
        assert_relative_eq!(off[(2, 2)], -transverse, epsilon = 1e-9);
        assert_relative_eq!(off[(0, 1)], 0.0, epsilon = 1e-9);

        let diag = hessian.block(0, 0).unwrap();
        assert_relative_eq!(diag[(0, 0)], k, epsilon = 1e-9);
        assert_relative_eq!(diag[(1, 1)], transverse, epsilon = 1e-9);
    }

    #[test]
    fn dynamical_matrix_scales_with_masses() {
        let evaluator = Manybody::new(HarmonicBondOrder::pair_only(3.0, 1.0, 2.0));
        let atoms = stretched_dimer();
        let hessian = evaluator.hessian(&atoms).unwrap();
        let dynmat = evaluator.dynamical_matrix(&atoms).unwrap();
        // both masses are 4
        assert_relative_eq!(
            dynmat.block(0, 1).unwrap()[(0, 0)],
            hessian.block(0, 1).unwrap()[(0, 0)] / 4.0,
            epsilon = 1e-12
        );
        assert_relative_eq!(
            dynmat.block(0, 0).unwrap()[(0, 0)],
            hessian.block(0, 0).unwrap()[(0, 0)] / 4.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn matvec_agrees_with_dense() {
        let evaluator = Manybody::new(HarmonicBondOrder {
            spring_constant: 2.0,
            eq_distance: 1.0,
            xi_strength: 0.2,
            xi_stiffness: 0.1,
            angle_strength: 0.15,
            angle_stiffness: 0.05,
            cutoff: 1.7,
        });
        let cell = Cell::cubic(50.0, false).unwrap();
        let atoms = Atoms::new(
            vec![
                Vector3::new(0.0, 0.0, 0.0),
                Vector3::new(1.1, 0.1, 0.0),
                Vector3::new(0.0, 1.2, 0.1),
            ],
            vec![0; 3],
            vec![1.0; 3],
            cell,
        )
        .unwrap();
        let hessian = evaluator.hessian(&atoms).unwrap();
        let x = DVector::from_fn(hessian.dim(), |i, _| 0.1 * (i as f64) - 0.3);
        let dense = hessian.to_dense();
        let direct = &dense * &x;
        let sparse = hessian.matvec(&x);
        for i in 0..hessian.dim() {
            assert_relative_eq!(sparse[i], direct[i], epsilon = 1e-12);
        }
    }
}
