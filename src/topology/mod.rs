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

//! ## Topology
//!
//! Atomic configurations and the pair/triplet index structures derived from
//! them. Everything here is a read-only snapshot of one configuration:
//! lists are built once per evaluator call and never mutated afterwards.

use crate::Vector3;
use thiserror::Error;

mod cell;
mod neighbors;
mod triplets;

pub use cell::Cell;
pub use neighbors::NeighborList;
pub use triplets::TripletList;

#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("cell matrix is not invertible")]
    SingularCell,
    #[error("configuration contains no atoms")]
    ZeroAtoms,
    #[error("cutoff must be positive, got {0}")]
    InvalidCutoff(f64),
    #[error("positions, species and masses must have equal lengths")]
    MismatchedLengths,
}

/// A snapshot of an atomic configuration.
///
/// Species labels are opaque to the evaluator; the potential maps them to
/// its internal type codes. Masses are only consulted when assembling the
/// dynamical matrix.
#[derive(Clone, Debug)]
pub struct Atoms {
    positions: Vec<Vector3>,
    species: Vec<usize>,
    masses: Vec<f64>,
    cell: Cell,
}

impl Atoms {
    pub fn new(
        positions: Vec<Vector3>,
        species: Vec<usize>,
        masses: Vec<f64>,
        cell: Cell,
    ) -> Result<Self, TopologyError> {
        if positions.len() != species.len() || positions.len() != masses.len() {
            return Err(TopologyError::MismatchedLengths);
        }
        Ok(Self {
            positions,
            species,
            masses,
            cell,
        })
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn positions(&self) -> &[Vector3] {
        &self.positions
    }

    pub fn species(&self) -> &[usize] {
        &self.species
    }

    pub fn masses(&self) -> &[f64] {
        &self.masses
    }

    pub fn cell(&self) -> &Cell {
        &self.cell
    }

    /// A copy of this configuration with one atom moved by `delta`.
    pub fn displaced(&self, atom: usize, delta: Vector3) -> Self {
        let mut out = self.clone();
        out.positions[atom] += delta;
        out
    }

    /// A copy with positions and cell mapped through the deformation
    /// gradient `f`, i.e. x → f·x and h → f·h.
    pub fn deformed(&self, f: &crate::Matrix3) -> Result<Self, TopologyError> {
        let positions = self.positions.iter().map(|x| f * x).collect();
        let cell = Cell::new(f * self.cell.h(), *self.cell.pbc())?;
        Ok(Self {
            positions,
            species: self.species.clone(),
            masses: self.masses.clone(),
            cell,
        })
    }
}
