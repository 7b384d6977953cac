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

use super::{BondOrderPotential, PairBatch, TripletBatch};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Harmonic bond-order potential
///
/// A harmonic pair term coupled to a harmonic bond-order channel,
///
/// $$ \varphi(R, r, \xi) = \tfrac{1}{2}k(r - r_0)^2 + \varepsilon\,\xi
///    + \tfrac{1}{2}\gamma\,\xi^2, \qquad
///    \theta = \lambda s + \tfrac{1}{2}\mu s^2 $$
///
/// with the angular measure $s = R_{jk} - R_{ij} - R_{ik} =
/// -2\,\Delta r_{ij}\cdot\Delta r_{ik}$, which vanishes for right angles
/// and penalizes or rewards bond alignment depending on the sign of λ.
/// All sixteen derivative functions are closed-form, which makes this a
/// convenient reference potential for consistency checks. Species-blind:
/// every atom maps to type 0.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(Deserialize, Serialize),
    serde(deny_unknown_fields)
)]
pub struct HarmonicBondOrder {
    /// Pair spring constant, k
    pub spring_constant: f64,
    /// Pair equilibrium distance, r₀
    pub eq_distance: f64,
    /// Linear coordination coupling, ε
    pub xi_strength: f64,
    /// Quadratic coordination coupling, γ
    pub xi_stiffness: f64,
    /// Linear angular coupling, λ
    pub angle_strength: f64,
    /// Quadratic angular coupling, μ
    pub angle_stiffness: f64,
    /// Interaction range
    pub cutoff: f64,
}

impl HarmonicBondOrder {
    /// Purely pairwise harmonic potential: all coordination and angular
    /// couplings zero.
    pub fn pair_only(spring_constant: f64, eq_distance: f64, cutoff: f64) -> Self {
        Self {
            spring_constant,
            eq_distance,
            xi_strength: 0.0,
            xi_stiffness: 0.0,
            angle_strength: 0.0,
            angle_stiffness: 0.0,
            cutoff,
        }
    }

    fn angular<'a>(&self, triplets: &TripletBatch<'a>) -> impl Iterator<Item = f64> + 'a {
        let (lambda, mu) = (self.angle_strength, self.angle_stiffness);
        triplets
            .rjk_sq
            .iter()
            .zip(triplets.rij_sq)
            .zip(triplets.rik_sq)
            .map(move |((&rjk_sq, &rij_sq), &rik_sq)| {
                let s = rjk_sq - rij_sq - rik_sq;
                lambda + mu * s
            })
    }
}

impl BondOrderPotential for HarmonicBondOrder {
    fn atom_type(&self, _species: usize) -> usize {
        0
    }

    fn pair_type(&self, _ti: usize, _tj: usize) -> usize {
        0
    }

    fn cutoff(&self, _pair_type: usize) -> f64 {
        self.cutoff
    }

    fn phi(&self, pairs: &PairBatch) -> Vec<f64> {
        pairs
            .r
            .iter()
            .zip(pairs.xi)
            .map(|(&r, &xi)| {
                0.5 * self.spring_constant * (r - self.eq_distance).powi(2)
                    + self.xi_strength * xi
                    + 0.5 * self.xi_stiffness * xi * xi
            })
            .collect()
    }

    fn d1phi(&self, pairs: &PairBatch) -> Vec<f64> {
        // d/dR of the harmonic term, with R = r²
        pairs
            .r
            .iter()
            .map(|&r| 0.5 * self.spring_constant * (r - self.eq_distance) / r)
            .collect()
    }

    fn d2phi(&self, pairs: &PairBatch) -> Vec<f64> {
        pairs
            .xi
            .iter()
            .map(|&xi| self.xi_strength + self.xi_stiffness * xi)
            .collect()
    }

    fn d11phi(&self, pairs: &PairBatch) -> Vec<f64> {
        pairs
            .r
            .iter()
            .map(|&r| 0.25 * self.spring_constant * self.eq_distance / (r * r * r))
            .collect()
    }

    fn d12phi(&self, pairs: &PairBatch) -> Vec<f64> {
        vec![0.0; pairs.len()]
    }

    fn d22phi(&self, pairs: &PairBatch) -> Vec<f64> {
        vec![self.xi_stiffness; pairs.len()]
    }

    fn theta(&self, triplets: &TripletBatch) -> Vec<f64> {
        let (lambda, mu) = (self.angle_strength, self.angle_stiffness);
        triplets
            .rjk_sq
            .iter()
            .zip(triplets.rij_sq)
            .zip(triplets.rik_sq)
            .map(|((&rjk_sq, &rij_sq), &rik_sq)| {
                let s = rjk_sq - rij_sq - rik_sq;
                lambda * s + 0.5 * mu * s * s
            })
            .collect()
    }

    fn d1theta(&self, triplets: &TripletBatch) -> Vec<f64> {
        self.angular(triplets).map(|v| -v).collect()
    }

    fn d2theta(&self, triplets: &TripletBatch) -> Vec<f64> {
        self.angular(triplets).map(|v| -v).collect()
    }

    fn d3theta(&self, triplets: &TripletBatch) -> Vec<f64> {
        self.angular(triplets).collect()
    }

    fn d11theta(&self, triplets: &TripletBatch) -> Vec<f64> {
        vec![self.angle_stiffness; triplets.len()]
    }

    fn d12theta(&self, triplets: &TripletBatch) -> Vec<f64> {
        vec![self.angle_stiffness; triplets.len()]
    }

    fn d13theta(&self, triplets: &TripletBatch) -> Vec<f64> {
        vec![-self.angle_stiffness; triplets.len()]
    }

    fn d22theta(&self, triplets: &TripletBatch) -> Vec<f64> {
        vec![self.angle_stiffness; triplets.len()]
    }

    fn d23theta(&self, triplets: &TripletBatch) -> Vec<f64> {
        vec![-self.angle_stiffness; triplets.len()]
    }

    fn d33theta(&self, triplets: &TripletBatch) -> Vec<f64> {
        vec![self.angle_stiffness; triplets.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn pair_derivatives_match_finite_differences() {
        let pot = HarmonicBondOrder {
            spring_constant: 3.0,
            eq_distance: 1.1,
            xi_strength: 0.4,
            xi_stiffness: 0.2,
            angle_strength: 0.0,
            angle_stiffness: 0.0,
            cutoff: 2.0,
        };
        let h = 1e-6;
        let r_sq = 1.69;
        let xi = 0.3;
        let at = |r_sq: f64, xi: f64| {
            let batch = PairBatch {
                r_sq: &[r_sq],
                r: &[r_sq.sqrt()],
                xi: &[xi],
                ti: &[0],
                tij: &[0],
            };
            pot.phi(&batch)[0]
        };
        let batch = PairBatch {
            r_sq: &[r_sq],
            r: &[r_sq.sqrt()],
            xi: &[xi],
            ti: &[0],
            tij: &[0],
        };
        let d1_fd = (at(r_sq + h, xi) - at(r_sq - h, xi)) / (2.0 * h);
        assert_relative_eq!(pot.d1phi(&batch)[0], d1_fd, epsilon = 1e-6);
        let d2_fd = (at(r_sq, xi + h) - at(r_sq, xi - h)) / (2.0 * h);
        assert_relative_eq!(pot.d2phi(&batch)[0], d2_fd, epsilon = 1e-6);
    }

    #[test]
    fn angular_derivatives_match_finite_differences() {
        let pot = HarmonicBondOrder {
            spring_constant: 1.0,
            eq_distance: 1.0,
            xi_strength: 0.0,
            xi_stiffness: 0.0,
            angle_strength: 0.7,
            angle_stiffness: 0.3,
            cutoff: 2.0,
        };
        let h = 1e-6;
        let at = |rij_sq: f64, rik_sq: f64, rjk_sq: f64| {
            let batch = TripletBatch {
                rij_sq: &[rij_sq],
                rij: &[rij_sq.sqrt()],
                rik_sq: &[rik_sq],
                rik: &[rik_sq.sqrt()],
                rjk_sq: &[rjk_sq],
                rjk: &[rjk_sq.sqrt()],
                ti: &[0],
                tij: &[0],
                tik: &[0],
            };
            pot.theta(&batch)[0]
        };
        let (a, b, c) = (1.2, 1.4, 2.1);
        let batch = TripletBatch {
            rij_sq: &[a],
            rij: &[a.sqrt()],
            rik_sq: &[b],
            rik: &[b.sqrt()],
            rjk_sq: &[c],
            rjk: &[c.sqrt()],
            ti: &[0],
            tij: &[0],
            tik: &[0],
        };
        assert_relative_eq!(
            pot.d1theta(&batch)[0],
            (at(a + h, b, c) - at(a - h, b, c)) / (2.0 * h),
            epsilon = 1e-6
        );
        assert_relative_eq!(
            pot.d2theta(&batch)[0],
            (at(a, b + h, c) - at(a, b - h, c)) / (2.0 * h),
            epsilon = 1e-6
        );
        assert_relative_eq!(
            pot.d3theta(&batch)[0],
            (at(a, b, c + h) - at(a, b, c - h)) / (2.0 * h),
            epsilon = 1e-6
        );
    }
}
