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

//! ## Manybody evaluator
//!
//! Turns pair/triplet topology and the scalar functions of a
//! [`BondOrderPotential`] into physical observables: energy, forces, virial
//! stress, the sparse Hessian, non-affine force tensors, and elastic
//! constants. Every observable is recomputed from scratch per call; the
//! evaluator owns nothing but the potential.
//!
//! The one ordering constraint that runs through all of it: the
//! coordination ξ of a pair is the sum of the angular term over every
//! triplet sharing that pair, and must be fully accumulated before any φ
//! function is evaluated for the pair.

use crate::potential::{BondOrderPotential, PairBatch, TripletBatch};
use crate::tensor::{outer, scatter_add};
use crate::topology::{Atoms, NeighborList, TripletList};
use crate::{Error, Matrix3, Vector3};
use itertools::iproduct;
use itertools::Itertools;

mod elastic;
mod hessian;
mod second;

pub use hessian::Hessian;
pub use second::{strain_field, unit_displacement_field};

/// Energy, forces and virial stress of one configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct Evaluation {
    pub energy: f64,
    pub forces: Vec<Vector3>,
    /// Symmetric Cauchy stress tensor (virial over cell volume)
    pub stress: Matrix3,
}

/// Evaluator for bond-order potentials.
///
/// Holds the supplied potential as its only state; all methods take the
/// atomic configuration by reference and leave it untouched.
#[derive(Clone, Debug)]
pub struct Manybody<P> {
    potential: P,
}

impl<P: BondOrderPotential> Manybody<P> {
    pub fn new(potential: P) -> Self {
        Self { potential }
    }

    pub fn potential(&self) -> &P {
        &self.potential
    }

    /// Largest cutoff over the species pairs present in `atoms`.
    pub fn effective_cutoff(&self, atoms: &Atoms) -> f64 {
        let types: Vec<usize> = atoms
            .species()
            .iter()
            .map(|&s| self.potential.atom_type(s))
            .unique()
            .collect();
        iproduct!(types.iter(), types.iter()).fold(0.0, |acc: f64, (&a, &b)| {
            acc.max(self.potential.cutoff(self.potential.pair_type(a, b)))
        })
    }

    /// Energy, forces and stress.
    pub fn evaluate(&self, atoms: &Atoms) -> Result<Evaluation, Error> {
        let nl = NeighborList::build(atoms, self.effective_cutoff(atoms))?;
        let tl = TripletList::build(&nl);
        let codes = self.species_codes(atoms, &nl, &tl);
        let r_sq = squared(nl.r());

        let tb = triplet_batch(&tl, &codes);
        let theta = checked(tl.len(), self.potential.theta(&tb))?;
        let d1theta = checked(tl.len(), self.potential.d1theta(&tb))?;
        let d2theta = checked(tl.len(), self.potential.d2theta(&tb))?;
        let d3theta = checked(tl.len(), self.potential.d3theta(&tb))?;

        // ξ must be complete before any φ evaluation below
        let xi = scatter_add(nl.len(), tl.ij.iter().copied().zip(theta));

        let pb = pair_batch(&r_sq, &nl, &xi, &codes);
        let phi = checked(nl.len(), self.potential.phi(&pb))?;
        let d1phi = checked(nl.len(), self.potential.d1phi(&pb))?;
        let d2phi = checked(nl.len(), self.potential.d2phi(&pb))?;

        // half corrects the double count of the full pair list
        let energy = 0.5 * phi.iter().sum::<f64>();

        let mut forces = vec![Vector3::zeros(); atoms.len()];
        let mut virial = Matrix3::zeros();

        for p in 0..nl.len() {
            let f = d1phi[p] * nl.dr()[p];
            forces[nl.i()[p]] += f;
            forces[nl.j()[p]] -= f;
            virial += outer(&nl.dr()[p], &f);
        }

        for t in 0..tl.len() {
            let (pij, pik) = (tl.ij[t], tl.ik[t]);
            let rij = nl.dr()[pij];
            let rik = nl.dr()[pik];
            let rjk = rik - rij;
            let pref = d2phi[pij];
            let fij = pref * d1theta[t] * rij;
            let fik = pref * d2theta[t] * rik;
            let fjk = pref * d3theta[t] * rjk;
            let (i, j, k) = (nl.i()[pij], nl.j()[pij], nl.j()[pik]);
            forces[i] += fij + fik;
            forces[j] += fjk - fij;
            forces[k] -= fik + fjk;
            virial += outer(&rij, &fij) + outer(&rik, &fik) + outer(&rjk, &fjk);
        }

        let stress = virial / atoms.cell().volume();
        Ok(Evaluation {
            energy,
            forces,
            stress,
        })
    }

    fn species_codes(&self, atoms: &Atoms, nl: &NeighborList, tl: &TripletList) -> SpeciesCodes {
        let t_n: Vec<usize> = atoms
            .species()
            .iter()
            .map(|&s| self.potential.atom_type(s))
            .collect();
        let ti_p: Vec<usize> = nl.i().iter().map(|&i| t_n[i]).collect();
        let tij_p: Vec<usize> = nl
            .i()
            .iter()
            .zip(nl.j())
            .map(|(&i, &j)| self.potential.pair_type(t_n[i], t_n[j]))
            .collect();
        let ti_t = tl.ij.iter().map(|&p| ti_p[p]).collect();
        let tij_t = tl.ij.iter().map(|&p| tij_p[p]).collect();
        let tik_t = tl.ik.iter().map(|&q| tij_p[q]).collect();
        SpeciesCodes {
            ti_p,
            tij_p,
            ti_t,
            tij_t,
            tik_t,
        }
    }
}

/// Species-type codes for every pair and triplet of one configuration.
struct SpeciesCodes {
    ti_p: Vec<usize>,
    tij_p: Vec<usize>,
    ti_t: Vec<usize>,
    tij_t: Vec<usize>,
    tik_t: Vec<usize>,
}

fn squared(r: &[f64]) -> Vec<f64> {
    r.iter().map(|r| r * r).collect()
}

fn pair_batch<'a>(
    r_sq: &'a [f64],
    nl: &'a NeighborList,
    xi: &'a [f64],
    codes: &'a SpeciesCodes,
) -> PairBatch<'a> {
    PairBatch {
        r_sq,
        r: nl.r(),
        xi,
        ti: &codes.ti_p,
        tij: &codes.tij_p,
    }
}

fn triplet_batch<'a>(tl: &'a TripletList, codes: &'a SpeciesCodes) -> TripletBatch<'a> {
    TripletBatch {
        rij_sq: &tl.rij_sq,
        rij: &tl.rij,
        rik_sq: &tl.rik_sq,
        rik: &tl.rik,
        rjk_sq: &tl.rjk_sq,
        rjk: &tl.rjk,
        ti: &codes.ti_t,
        tij: &codes.tij_t,
        tik: &codes.tik_t,
    }
}

/// Enforce the batch-length contract of the potential functions.
fn checked(expected: usize, batch: Vec<f64>) -> Result<Vec<f64>, Error> {
    if batch.len() != expected {
        return Err(Error::PotentialBatch {
            expected,
            found: batch.len(),
        });
    }
    Ok(batch)
}
