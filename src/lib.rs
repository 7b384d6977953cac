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

//! # Bondorder
//!
//! A library for evaluating bond-order (manybody) interatomic potentials:
//! energies, forces, virial stresses, sparse Hessians, non-affine force
//! tensors, and elastic constants for collections of point particles in
//! periodic or finite cells.
//!
//! The potential is supplied as a [`BondOrderPotential`], a bundle of the
//! pair term φ(R, r, ξ), the angular term θ(Rij, Rik, Rjk), and their
//! analytic derivatives. The [`Manybody`] evaluator turns pair and triplet
//! topology plus these scalar functions into physical observables; it never
//! differentiates numerically.
//!
//! ```
//! use bondorder::{Atoms, Cell, HarmonicBondOrder, Manybody, Vector3};
//!
//! let cell = Cell::cubic(20.0, false).unwrap();
//! let atoms = Atoms::new(
//!     vec![Vector3::zeros(), Vector3::new(1.1, 0.0, 0.0)],
//!     vec![0, 0],
//!     vec![1.0, 1.0],
//!     cell,
//! )
//! .unwrap();
//! let evaluator = Manybody::new(HarmonicBondOrder::pair_only(2.0, 1.0, 1.5));
//! let result = evaluator.evaluate(&atoms).unwrap();
//! assert!(result.energy > 0.0);
//! ```

#[cfg(test)]
extern crate approx;

/// A point in 3D space
pub type Vector3 = nalgebra::Vector3<f64>;
/// A stack-allocated 3x3 square matrix
pub type Matrix3 = nalgebra::Matrix3<f64>;

use thiserror::Error;

pub mod manybody;
pub mod potential;
pub mod solver;
pub mod tensor;
pub mod topology;

pub use manybody::{strain_field, unit_displacement_field, Evaluation, Hessian, Manybody};
pub use potential::{BondOrderPotential, HarmonicBondOrder, PairBatch, TripletBatch};
pub use solver::{ConjugateGradient, LinearSolve, MatVec, SolveError};
pub use tensor::{Rank3, Rank4};
pub use topology::{Atoms, Cell, NeighborList, TopologyError, TripletList};

/// Errors surfaced by the evaluator.
///
/// All failures are either input-contract violations or solver
/// non-convergence; nothing is retried.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid input configuration or cell
    #[error(transparent)]
    Topology(#[from] TopologyError),
    /// The iterative linear solve failed
    #[error(transparent)]
    Solve(#[from] SolveError),
    /// A potential function returned a batch of the wrong length
    #[error("potential returned a batch of length {found}, expected {expected}")]
    PotentialBatch { expected: usize, found: usize },
}

/// Reduce a symmetric 3x3 stress tensor to its six independent Voigt
/// components, ordered xx, yy, zz, yz, xz, xy.
pub fn stress_voigt(stress: &Matrix3) -> [f64; 6] {
    [
        stress[(0, 0)],
        stress[(1, 1)],
        stress[(2, 2)],
        stress[(1, 2)],
        stress[(0, 2)],
        stress[(0, 1)],
    ]
}
