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

use super::NeighborList;
use itertools::Itertools;

/// Triplets of atoms: two pairs sharing a common center atom.
///
/// Enumeration is ordered — for each center, every (ij, ik) with ij ≠ ik
/// appears once, and (ik, ij) is a distinct triplet. The angular term is
/// not symmetric in its ij/ik arguments and the coordination ξ accumulates
/// per directed ij pair, so both orders are needed.
///
/// The three side lengths and their squares are derived once at build time;
/// the jk side comes from Δr_ik − Δr_ij.
#[derive(Clone, Debug)]
pub struct TripletList {
    /// Pair index of the ij side
    pub ij: Vec<usize>,
    /// Pair index of the ik side
    pub ik: Vec<usize>,
    pub rij_sq: Vec<f64>,
    pub rij: Vec<f64>,
    pub rik_sq: Vec<f64>,
    pub rik: Vec<f64>,
    pub rjk_sq: Vec<f64>,
    pub rjk: Vec<f64>,
}

impl TripletList {
    pub fn build(nl: &NeighborList) -> Self {
        let mut out = Self {
            ij: Vec::new(),
            ik: Vec::new(),
            rij_sq: Vec::new(),
            rij: Vec::new(),
            rik_sq: Vec::new(),
            rik: Vec::new(),
            rjk_sq: Vec::new(),
            rjk: Vec::new(),
        };
        for atom in 0..nl.n_atoms() {
            for (p, q) in nl
                .neighbors(atom)
                .cartesian_product(nl.neighbors(atom))
                .filter(|(p, q)| p != q)
            {
                out.ij.push(p);
                out.ik.push(q);
                let rij = nl.r()[p];
                let rik = nl.r()[q];
                let jk = nl.dr()[q] - nl.dr()[p];
                let rjk_sq = jk.norm_squared();
                out.rij.push(rij);
                out.rij_sq.push(rij * rij);
                out.rik.push(rik);
                out.rik_sq.push(rik * rik);
                out.rjk_sq.push(rjk_sq);
                out.rjk.push(rjk_sq.sqrt());
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.ij.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ij.is_empty()
    }
}
