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

//! ## Bond-order potentials
//!
//! A bond-order potential is the pair of scalar functions
//!
//! $$ E = \tfrac{1}{2}\sum_{ij} \varphi(R_{ij}, r_{ij}, \xi_{ij}), \qquad
//!    \xi_{ij} = \sum_{k} \theta(R_{ij}, R_{ik}, R_{jk}) $$
//!
//! where capital letters are squared bond lengths. The evaluator needs φ, θ
//! and their analytic partial derivatives — derivatives of φ are taken with
//! respect to the *squared* distance R (index 1) and the coordination ξ
//! (index 2); derivatives of θ with respect to the squared side lengths
//! Rij, Rik, Rjk (indices 1, 2, 3). The linear lengths are passed alongside
//! for convenience only.
//!
//! All functions are pure and batch-oriented: one value per pair or triplet,
//! parameterized by integer species-type codes. The evaluator treats them as
//! black boxes and assumes the derivative functions are the literal analytic
//! derivatives of φ and θ; it never verifies this.

mod harmonic;
pub use harmonic::HarmonicBondOrder;

/// Per-pair arguments of the φ family.
///
/// `xi` is the fully accumulated coordination of each pair; the evaluator
/// guarantees the triplet reduction has completed before any φ call.
pub struct PairBatch<'a> {
    /// Squared pair distances
    pub r_sq: &'a [f64],
    /// Pair distances
    pub r: &'a [f64],
    /// Coordination scalar per pair
    pub xi: &'a [f64],
    /// Type code of the owner atom
    pub ti: &'a [usize],
    /// Type code of the pair
    pub tij: &'a [usize],
}

impl PairBatch<'_> {
    pub fn len(&self) -> usize {
        self.r.len()
    }

    pub fn is_empty(&self) -> bool {
        self.r.is_empty()
    }
}

/// Per-triplet arguments of the θ family.
pub struct TripletBatch<'a> {
    pub rij_sq: &'a [f64],
    pub rij: &'a [f64],
    pub rik_sq: &'a [f64],
    pub rik: &'a [f64],
    pub rjk_sq: &'a [f64],
    pub rjk: &'a [f64],
    /// Type code of the center atom
    pub ti: &'a [usize],
    /// Type code of the ij pair
    pub tij: &'a [usize],
    /// Type code of the ik pair
    pub tik: &'a [usize],
}

impl TripletBatch<'_> {
    pub fn len(&self) -> usize {
        self.rij.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rij.is_empty()
    }
}

/// The capability bundle consumed by the [`Manybody`] evaluator: species
/// mapping, cutoffs, and the sixteen potential functions.
///
/// [`Manybody`]: crate::Manybody
pub trait BondOrderPotential {
    /// Map a caller species label to an internal atom type code
    fn atom_type(&self, species: usize) -> usize;

    /// Map two atom type codes to a pair type code
    fn pair_type(&self, ti: usize, tj: usize) -> usize;

    /// Interaction range for one pair type
    fn cutoff(&self, pair_type: usize) -> f64;

    fn phi(&self, pairs: &PairBatch) -> Vec<f64>;
    fn d1phi(&self, pairs: &PairBatch) -> Vec<f64>;
    fn d2phi(&self, pairs: &PairBatch) -> Vec<f64>;
    fn d11phi(&self, pairs: &PairBatch) -> Vec<f64>;
    fn d12phi(&self, pairs: &PairBatch) -> Vec<f64>;
    fn d22phi(&self, pairs: &PairBatch) -> Vec<f64>;

    fn theta(&self, triplets: &TripletBatch) -> Vec<f64>;
    fn d1theta(&self, triplets: &TripletBatch) -> Vec<f64>;
    fn d2theta(&self, triplets: &TripletBatch) -> Vec<f64>;
    fn d3theta(&self, triplets: &TripletBatch) -> Vec<f64>;
    fn d11theta(&self, triplets: &TripletBatch) -> Vec<f64>;
    fn d12theta(&self, triplets: &TripletBatch) -> Vec<f64>;
    fn d13theta(&self, triplets: &TripletBatch) -> Vec<f64>;
    fn d22theta(&self, triplets: &TripletBatch) -> Vec<f64>;
    fn d23theta(&self, triplets: &TripletBatch) -> Vec<f64>;
    fn d33theta(&self, triplets: &TripletBatch) -> Vec<f64>;
}
