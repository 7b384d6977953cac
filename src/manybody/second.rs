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

//! Generalized second derivative of the energy.
//!
//! The probe computes ∂²E/∂a∂b for two arbitrary "velocity" fields — linear
//! maps from a perturbation parameter to the change of every pair's bond
//! vector. Unit atomic displacements and affine strains are both such
//! fields, which makes this the common core of the Hessian, the non-affine
//! forces, and any mixed derivative.
//!
//! Internally the pair term is re-expressed as F(r, ξ) over the linear bond
//! length and the angular term as G(Δr_ij, Δr_ik) over the bond vectors;
//! both families are obtained from the sixteen supplied φ/θ derivatives by
//! the chain rule through the squared lengths. Five contraction terms
//! result: the direct F'' term, the mixed F'–G' cross terms, the F'' term
//! on the aggregated ξ channel, the transverse curvature of the bond
//! length, and the G'' term.

use super::{checked, pair_batch, squared, triplet_batch, Manybody};
use crate::potential::BondOrderPotential;
use crate::tensor::{outer, scatter_add};
use crate::topology::{Atoms, NeighborList, TripletList};
use crate::{Error, Matrix3, Vector3};

/// Velocity field of a rigid unit displacement of one atom along `axis`:
/// +1 on pairs the atom owns, −1 on pairs pointing at it. The sign pairs
/// with [`strain_field`] so that probing the two yields the non-affine
/// force component, and cancels when both probe arguments use it.
pub fn unit_displacement_field(nl: &NeighborList, atom: usize, axis: usize) -> Vec<Vector3> {
    let mut out = vec![Vector3::zeros(); nl.len()];
    for p in 0..nl.len() {
        if nl.i()[p] == atom {
            out[p][axis] += 1.0;
        }
        if nl.j()[p] == atom {
            out[p][axis] -= 1.0;
        }
    }
    out
}

/// Velocity field of an affine strain: component `alpha` of every bond
/// vector grows with its component `beta`.
pub fn strain_field(nl: &NeighborList, alpha: usize, beta: usize) -> Vec<Vector3> {
    nl.dr()
        .iter()
        .map(|dr| {
            let mut v = Vector3::zeros();
            v[alpha] = dr[beta];
            v
        })
        .collect()
}

/// Per-pair and per-triplet derivative data of the F/G vocabulary,
/// evaluated once and reused across many probe contractions.
pub(crate) struct SecondOrderFields {
    pub tl: TripletList,
    /// Bond direction per pair
    pub n: Vec<Vector3>,
    /// Transverse curvature operator (I − n⊗n)/r per pair
    pub q: Vec<Matrix3>,
    pub d1f: Vec<f64>,
    pub d2f: Vec<f64>,
    pub d11f: Vec<f64>,
    pub d12f: Vec<f64>,
    pub d22f: Vec<f64>,
    pub d1g: Vec<Vector3>,
    pub d2g: Vec<Vector3>,
    pub d11g: Vec<Matrix3>,
    pub d12g: Vec<Matrix3>,
    pub d22g: Vec<Matrix3>,
}

impl<P: BondOrderPotential> Manybody<P> {
    /// Scalar second derivative of the energy along two velocity fields
    /// given per pair of `nl`.
    pub fn second_derivative(
        &self,
        atoms: &Atoms,
        nl: &NeighborList,
        drda: &[Vector3],
        drdb: &[Vector3],
    ) -> Result<f64, Error> {
        let fields = self.second_order_fields(atoms, nl)?;
        Ok(probe(&fields, nl, drda, drdb))
    }

    pub(crate) fn second_order_fields(
        &self,
        atoms: &Atoms,
        nl: &NeighborList,
    ) -> Result<SecondOrderFields, Error> {
        let tl = TripletList::build(nl);
        let codes = self.species_codes(atoms, nl, &tl);
        let r_sq = squared(nl.r());

        let tb = triplet_batch(&tl, &codes);
        let nt = tl.len();
        let theta = checked(nt, self.potential.theta(&tb))?;
        let d1t = checked(nt, self.potential.d1theta(&tb))?;
        let d2t = checked(nt, self.potential.d2theta(&tb))?;
        let d3t = checked(nt, self.potential.d3theta(&tb))?;
        let d11t = checked(nt, self.potential.d11theta(&tb))?;
        let d12t = checked(nt, self.potential.d12theta(&tb))?;
        let d13t = checked(nt, self.potential.d13theta(&tb))?;
        let d22t = checked(nt, self.potential.d22theta(&tb))?;
        let d23t = checked(nt, self.potential.d23theta(&tb))?;
        let d33t = checked(nt, self.potential.d33theta(&tb))?;

        let xi = scatter_add(nl.len(), tl.ij.iter().copied().zip(theta));

        let pb = pair_batch(&r_sq, nl, &xi, &codes);
        let np = nl.len();
        let d1phi = checked(np, self.potential.d1phi(&pb))?;
        let d2phi = checked(np, self.potential.d2phi(&pb))?;
        let d11phi = checked(np, self.potential.d11phi(&pb))?;
        let d12phi = checked(np, self.potential.d12phi(&pb))?;
        let d22phi = checked(np, self.potential.d22phi(&pb))?;

        // chain rule from φ(R, ξ) to F(r, ξ) with R = r²
        let mut d1f = Vec::with_capacity(np);
        let mut d11f = Vec::with_capacity(np);
        let mut d12f = Vec::with_capacity(np);
        let mut n = Vec::with_capacity(np);
        let mut q = Vec::with_capacity(np);
        for p in 0..np {
            let r = nl.r()[p];
            d1f.push(2.0 * r * d1phi[p]);
            d11f.push(2.0 * d1phi[p] + 4.0 * r_sq[p] * d11phi[p]);
            d12f.push(2.0 * r * d12phi[p]);
            let np_c = nl.dr()[p] / r;
            q.push((Matrix3::identity() - outer(&np_c, &np_c)) / r);
            n.push(np_c);
        }

        // chain rule from θ(Rij, Rik, Rjk) to G(Δr_ij, Δr_ik)
        let eye = Matrix3::identity();
        let mut d1g = Vec::with_capacity(nt);
        let mut d2g = Vec::with_capacity(nt);
        let mut d11g = Vec::with_capacity(nt);
        let mut d12g = Vec::with_capacity(nt);
        let mut d22g = Vec::with_capacity(nt);
        for t in 0..nt {
            let rij = nl.dr()[tl.ij[t]];
            let rik = nl.dr()[tl.ik[t]];
            let rjk = rik - rij;
            d1g.push(2.0 * (d1t[t] * rij - d3t[t] * rjk));
            d2g.push(2.0 * (d2t[t] * rik + d3t[t] * rjk));
            d11g.push(
                2.0 * (d1t[t] + d3t[t]) * eye + 4.0 * d11t[t] * outer(&rij, &rij)
                    - 4.0 * d13t[t] * (outer(&rij, &rjk) + outer(&rjk, &rij))
                    + 4.0 * d33t[t] * outer(&rjk, &rjk),
            );
            d12g.push(
                -2.0 * d3t[t] * eye + 4.0 * d12t[t] * outer(&rij, &rik)
                    + 4.0 * d13t[t] * outer(&rij, &rjk)
                    - 4.0 * d23t[t] * outer(&rjk, &rik)
                    - 4.0 * d33t[t] * outer(&rjk, &rjk),
            );
            d22g.push(
                2.0 * (d2t[t] + d3t[t]) * eye
                    + 4.0 * d22t[t] * outer(&rik, &rik)
                    + 4.0 * d23t[t] * (outer(&rik, &rjk) + outer(&rjk, &rik))
                    + 4.0 * d33t[t] * outer(&rjk, &rjk),
            );
        }

        Ok(SecondOrderFields {
            tl,
            n,
            q,
            d1f,
            d2f: d2phi,
            d11f,
            d12f,
            d22f: d22phi,
            d1g,
            d2g,
            d11g,
            d12g,
            d22g,
        })
    }
}

/// The five-term contraction. Fields must be aligned with `nl`; the result
/// carries the ½ double-count factor, i.e. it is the physical ∂²E/∂a∂b.
pub(crate) fn probe(
    fields: &SecondOrderFields,
    nl: &NeighborList,
    drda: &[Vector3],
    drdb: &[Vector3],
) -> f64 {
    assert_eq!(drda.len(), nl.len());
    assert_eq!(drdb.len(), nl.len());
    let np = nl.len();
    let tl = &fields.tl;

    // bond-length velocities
    let drda_r: Vec<f64> = (0..np).map(|p| fields.n[p].dot(&drda[p])).collect();
    let drdb_r: Vec<f64> = (0..np).map(|p| fields.n[p].dot(&drdb[p])).collect();

    // direct pair curvature
    let mut t1 = 0.0;
    for p in 0..np {
        t1 += fields.d11f[p] * drda_r[p] * drdb_r[p];
    }

    // mixed bond-length / coordination cross terms
    let mut t2 = 0.0;
    for t in 0..tl.len() {
        let (pij, pik) = (tl.ij[t], tl.ik[t]);
        t2 += fields.d12f[pij]
            * (fields.d2g[t].dot(&drda[pik]) * drdb_r[pij]
                + fields.d2g[t].dot(&drdb[pik]) * drda_r[pij]
                + fields.d1g[t].dot(&drda[pij]) * drdb_r[pij]
                + fields.d1g[t].dot(&drdb[pij]) * drda_r[pij]);
    }

    // quadratic coordination channel: ξ velocities aggregated per pair
    let dxida = scatter_add(
        np,
        (0..tl.len()).map(|t| {
            (
                tl.ij[t],
                fields.d1g[t].dot(&drda[tl.ij[t]]) + fields.d2g[t].dot(&drda[tl.ik[t]]),
            )
        }),
    );
    let dxidb = scatter_add(
        np,
        (0..tl.len()).map(|t| {
            (
                tl.ij[t],
                fields.d1g[t].dot(&drdb[tl.ij[t]]) + fields.d2g[t].dot(&drdb[tl.ik[t]]),
            )
        }),
    );
    let mut t3 = 0.0;
    for p in 0..np {
        t3 += fields.d22f[p] * dxida[p] * dxidb[p];
    }

    // transverse bond-length curvature
    let mut t4 = 0.0;
    for p in 0..np {
        t4 += fields.d1f[p] * (fields.q[p] * drda[p]).dot(&drdb[p]);
    }

    // angular curvature, aggregated per ij pair
    let t5_t = (0..tl.len()).map(|t| {
        let (pij, pik) = (tl.ij[t], tl.ik[t]);
        let value = (fields.d11g[t] * drda[pij]).dot(&drdb[pij])
            + (fields.d12g[t] * drdb[pik]).dot(&drda[pij])
            + (fields.d12g[t] * drda[pik]).dot(&drdb[pij])
            + (fields.d22g[t] * drda[pik]).dot(&drdb[pik]);
        (pij, value)
    });
    let t5_p = scatter_add(np, t5_t);
    let mut t5 = 0.0;
    for p in 0..np {
        t5 += fields.d2f[p] * t5_p[p];
    }

    0.5 * (t1 + t2 + t3 + t4 + t5)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::potential::HarmonicBondOrder;
    use crate::topology::{Atoms, Cell};
    use approx::assert_relative_eq;

    fn cluster() -> Atoms {
        let cell = Cell::cubic(50.0, false).unwrap();
        Atoms::new(
            vec![
                Vector3::new(0.0, 0.0, 0.1),
                Vector3::new(1.1, -0.1, 0.0),
                Vector3::new(0.2, 1.0, 0.0),
                Vector3::new(1.3, 1.2, 0.2),
            ],
            vec![0; 4],
            vec![1.0; 4],
            cell,
        )
        .unwrap()
    }

    fn potential() -> HarmonicBondOrder {
        HarmonicBondOrder {
            spring_constant: 4.0,
            eq_distance: 1.0,
            xi_strength: 0.3,
            xi_stiffness: 0.15,
            angle_strength: 0.2,
            angle_stiffness: 0.1,
            cutoff: 1.8,
        }
    }

    #[test]
    fn probe_is_symmetric_in_its_fields() {
        let atoms = cluster();
        let evaluator = Manybody::new(potential());
        let nl = NeighborList::build(&atoms, evaluator.effective_cutoff(&atoms)).unwrap();
        let a = unit_displacement_field(&nl, 0, 0);
        let b = strain_field(&nl, 1, 0);
        let ab = evaluator.second_derivative(&atoms, &nl, &a, &b).unwrap();
        let ba = evaluator.second_derivative(&atoms, &nl, &b, &a).unwrap();
        assert_relative_eq!(ab, ba, epsilon = 1e-12);
    }

    #[test]
    fn probe_matches_finite_difference_along_one_atom() {
        // ∂²E/∂x₀∂x₀ against a central difference of the energy
        let atoms = cluster();
        let evaluator = Manybody::new(potential());
        let nl = NeighborList::build(&atoms, evaluator.effective_cutoff(&atoms)).unwrap();
        let field = unit_displacement_field(&nl, 0, 0);
        let analytic = evaluator
            .second_derivative(&atoms, &nl, &field, &field)
            .unwrap();

        let h = 1e-4;
        let step = Vector3::new(h, 0.0, 0.0);
        let e0 = evaluator.evaluate(&atoms).unwrap().energy;
        let ep = evaluator.evaluate(&atoms.displaced(0, step)).unwrap().energy;
        let em = evaluator.evaluate(&atoms.displaced(0, -step)).unwrap().energy;
        let numeric = (ep - 2.0 * e0 + em) / (h * h);
        assert_relative_eq!(analytic, numeric, epsilon = 1e-4, max_relative = 1e-4);
    }
}
