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

//! Elastic constants and non-affine forces.
//!
//! The Born tensor is the affine second derivative of the energy with
//! respect to the Green-Lagrange strain; non-affine forces are the mixed
//! position/strain second derivatives, and their contraction with the
//! inverse Hessian gives the relaxation correction to the elastic
//! constants. The inverse is never formed: either an iterative solve per
//! strain component or a spectral sum over supplied eigenmodes.

use super::second::{probe, strain_field, unit_displacement_field, SecondOrderFields};
use super::{checked, pair_batch, squared, triplet_batch, Manybody};
use crate::potential::BondOrderPotential;
use crate::solver::{LinearSolve, MatVec, SolveError};
use crate::tensor::{outer, outer3, outer4, outer_mm, scatter_add, Rank3, Rank4};
use crate::topology::{Atoms, NeighborList, TripletList};
use crate::{Error, Matrix3, Vector3};
use nalgebra::{DMatrix, DVector};

impl<P: BondOrderPotential> Manybody<P> {
    /// Born (affine) elastic constants, 2/V times the strain second
    /// derivative of the double-counted bond sum.
    pub fn born_elastic_constants(&self, atoms: &Atoms) -> Result<Rank4, Error> {
        let nl = NeighborList::build(atoms, self.effective_cutoff(atoms))?;
        let tl = TripletList::build(&nl);
        let codes = self.species_codes(atoms, &nl, &tl);
        let r_sq = squared(nl.r());

        let tb = triplet_batch(&tl, &codes);
        let nt = tl.len();
        let theta = checked(nt, self.potential().theta(&tb))?;
        let d1t = checked(nt, self.potential().d1theta(&tb))?;
        let d2t = checked(nt, self.potential().d2theta(&tb))?;
        let d3t = checked(nt, self.potential().d3theta(&tb))?;
        let d11t = checked(nt, self.potential().d11theta(&tb))?;
        let d12t = checked(nt, self.potential().d12theta(&tb))?;
        let d13t = checked(nt, self.potential().d13theta(&tb))?;
        let d22t = checked(nt, self.potential().d22theta(&tb))?;
        let d23t = checked(nt, self.potential().d23theta(&tb))?;
        let d33t = checked(nt, self.potential().d33theta(&tb))?;

        let xi = scatter_add(nl.len(), tl.ij.iter().copied().zip(theta));

        let pb = pair_batch(&r_sq, &nl, &xi, &codes);
        let np = nl.len();
        let d2phi = checked(np, self.potential().d2phi(&pb))?;
        let d11phi = checked(np, self.potential().d11phi(&pb))?;
        let d12phi = checked(np, self.potential().d12phi(&pb))?;
        let d22phi = checked(np, self.potential().d22phi(&pb))?;

        let mut c = Rank4::zeros();

        // direct pair channel
        for p in 0..np {
            let dr = nl.dr()[p];
            c += outer4(&dr, &dr, &dr, &dr) * d11phi[p];
        }

        for t in 0..nt {
            let (pij, pik) = (tl.ij[t], tl.ik[t]);
            let rij = nl.dr()[pij];
            let rik = nl.dr()[pik];
            let rjk = rik - rij;

            // angular curvature channel
            c += (outer4(&rij, &rij, &rij, &rij) * d11t[t]
                + (outer4(&rij, &rij, &rik, &rik) + outer4(&rik, &rik, &rij, &rij)) * d12t[t]
                + (outer4(&rij, &rij, &rjk, &rjk) + outer4(&rjk, &rjk, &rij, &rij)) * d13t[t]
                + outer4(&rik, &rik, &rik, &rik) * d22t[t]
                + (outer4(&rik, &rik, &rjk, &rjk) + outer4(&rjk, &rjk, &rik, &rik)) * d23t[t]
                + outer4(&rjk, &rjk, &rjk, &rjk) * d33t[t])
                * d2phi[pij];

            // mixed bond-length / coordination channel
            c += (outer4(&rij, &rij, &rij, &rij) * (2.0 * d1t[t])
                + (outer4(&rij, &rij, &rik, &rik) + outer4(&rik, &rik, &rij, &rij)) * d2t[t]
                + (outer4(&rij, &rij, &rjk, &rjk) + outer4(&rjk, &rjk, &rij, &rij)) * d3t[t])
                * d12phi[pij];
        }

        // quadratic coordination channel through the squared ξ gradient
        let dxi: Vec<Matrix3> = scatter_add(
            np,
            (0..nt).map(|t| {
                let rij = nl.dr()[tl.ij[t]];
                let rik = nl.dr()[tl.ik[t]];
                let rjk = rik - rij;
                (
                    tl.ij[t],
                    d1t[t] * outer(&rij, &rij)
                        + d2t[t] * outer(&rik, &rik)
                        + d3t[t] * outer(&rjk, &rjk),
                )
            }),
        );
        for p in 0..np {
            c += outer_mm(&dxi[p], &dxi[p]) * d22phi[p];
        }

        Ok(c * (2.0 / atoms.cell().volume()))
    }

    /// Correction from measuring elasticity against the Cauchy stress
    /// instead of the Lagrangian one; closed form in the current stress.
    pub fn stress_contribution_to_elastic_constants(&self, atoms: &Atoms) -> Result<Rank4, Error> {
        let stress = self.evaluate(atoms)?.stress;
        let delta = Matrix3::identity();
        let mut c = Rank4::zeros();
        for a in 0..3 {
            for b in 0..3 {
                for e in 0..3 {
                    for f in 0..3 {
                        c.0[a][b][e][f] = -stress[(a, b)] * delta[(e, f)]
                            + 0.5
                                * (stress[(a, e)] * delta[(b, f)]
                                    + stress[(a, f)] * delta[(b, e)]
                                    + stress[(b, e)] * delta[(a, f)]
                                    + stress[(b, f)] * delta[(a, e)]);
                    }
                }
            }
        }
        Ok(c)
    }

    /// Effective elastic constants at the current (possibly nonzero)
    /// stress: Born constants plus the stress contribution.
    pub fn birch_coefficients(&self, atoms: &Atoms) -> Result<Rank4, Error> {
        Ok(self.born_elastic_constants(atoms)? + self.stress_contribution_to_elastic_constants(atoms)?)
    }

    /// Non-affine forces: per atom, the mixed second derivative of the
    /// energy with respect to its position (first index) and the
    /// deformation gradient (last two indices).
    pub fn non_affine_forces(&self, atoms: &Atoms) -> Result<Vec<Rank3>, Error> {
        let nl = NeighborList::build(atoms, self.effective_cutoff(atoms))?;
        let fields = self.second_order_fields(atoms, &nl)?;
        Ok(assemble_non_affine(&fields, &nl))
    }

    /// The same observable built one component at a time from the
    /// second-derivative probe. Much slower; kept as an independent path
    /// for cross-checking the closed-form assembly.
    pub fn non_affine_forces_from_second_derivative(
        &self,
        atoms: &Atoms,
    ) -> Result<Vec<Rank3>, Error> {
        let nl = NeighborList::build(atoms, self.effective_cutoff(atoms))?;
        let fields = self.second_order_fields(atoms, &nl)?;
        let strains: Vec<Vec<Vector3>> = (0..9)
            .map(|ab| strain_field(&nl, ab / 3, ab % 3))
            .collect();
        let mut naf = vec![Rank3::zeros(); atoms.len()];
        for (m, tensor) in naf.iter_mut().enumerate() {
            for c in 0..3 {
                let field = unit_displacement_field(&nl, m, c);
                for a in 0..3 {
                    for b in 0..3 {
                        tensor[(c, a, b)] = probe(&fields, &nl, &strains[3 * a + b], &field);
                    }
                }
            }
        }
        Ok(naf)
    }

    /// Softening of the elastic constants due to non-affine relaxation,
    /// −(1/V) Ξ·H⁻¹·Ξ with the inverse applied by an iterative solve per
    /// strain component.
    pub fn non_affine_contribution_to_elastic_constants(
        &self,
        atoms: &Atoms,
        solver: &dyn LinearSolve,
    ) -> Result<Rank4, Error> {
        let hessian = self.hessian(atoms)?;
        let naf = self.non_affine_forces(atoms)?;
        let raw = solve_correction(&hessian, &naf, solver)?;
        Ok(finalize_correction(raw, atoms.cell().volume()))
    }

    /// Non-affine correction with the inverse Hessian assembled from an
    /// already-known spectrum. `eigenvalues` must contain only the nonzero
    /// part of the spectrum, with `eigenvectors` columns in the same order.
    pub fn non_affine_contribution_from_modes(
        &self,
        atoms: &Atoms,
        eigenvalues: &[f64],
        eigenvectors: &DMatrix<f64>,
    ) -> Result<Rank4, Error> {
        let naf = self.non_affine_forces(atoms)?;
        let raw = modes_correction(&naf, eigenvalues, eigenvectors);
        Ok(finalize_correction(raw, atoms.cell().volume()))
    }
}

/// (m ⊙ v)_cab = m_ca v_b
fn matrix_vec(m: &Matrix3, v: &Vector3) -> Rank3 {
    let mut out = Rank3::zeros();
    for c in 0..3 {
        for a in 0..3 {
            for b in 0..3 {
                out.0[c][a][b] = m[(c, a)] * v[b];
            }
        }
    }
    out
}

/// (v ⊙ m)_cab = v_c m_ab
fn vec_matrix(v: &Vector3, m: &Matrix3) -> Rank3 {
    let mut out = Rank3::zeros();
    for c in 0..3 {
        for a in 0..3 {
            for b in 0..3 {
                out.0[c][a][b] = v[c] * m[(a, b)];
            }
        }
    }
    out
}

/// Closed-form five-term non-affine force assembly with the ± bond
/// scatter convention of the force loop.
fn assemble_non_affine(fields: &SecondOrderFields, nl: &NeighborList) -> Vec<Rank3> {
    let tl = &fields.tl;

    // derivative of ξ with respect to the deformation gradient, per pair
    let dxidf: Vec<Matrix3> = scatter_add(
        nl.len(),
        (0..tl.len()).map(|t| {
            let (pij, pik) = (tl.ij[t], tl.ik[t]);
            (
                pij,
                outer(&fields.d1g[t], &nl.dr()[pij]) + outer(&fields.d2g[t], &nl.dr()[pik]),
            )
        }),
    );

    let mut naf = vec![Rank3::zeros(); nl.n_atoms()];

    for p in 0..nl.len() {
        let dr = nl.dr()[p];
        let pair_term = outer3(&fields.n[p], &fields.n[p], &dr) * fields.d11f[p]
            + matrix_vec(&fields.q[p], &dr) * fields.d1f[p];
        naf[nl.i()[p]] += pair_term;
        naf[nl.j()[p]] += -pair_term;
    }

    for t in 0..tl.len() {
        let (pij, pik) = (tl.ij[t], tl.ik[t]);
        let (i, j, k) = (nl.i()[pij], nl.j()[pij], nl.j()[pik]);
        let rij = nl.dr()[pij];
        let rik = nl.dr()[pik];
        let nij = fields.n[pij];
        let (d1g, d2g) = (fields.d1g[t], fields.d2g[t]);

        // mixed bond-length / coordination channel
        let d12f = fields.d12f[pij];
        let shared =
            outer3(&nij, &d1g, &rij) + outer3(&nij, &d2g, &rik) + outer3(&d1g, &nij, &rij);
        let tail = outer3(&d2g, &nij, &rij);
        naf[i] += (shared + tail) * d12f;
        naf[j] += shared * (-d12f);
        naf[k] += tail * (-d12f);

        // quadratic coordination channel
        let d22f = fields.d22f[pij];
        let t31 = vec_matrix(&d1g, &dxidf[pij]) * d22f;
        let t32 = vec_matrix(&d2g, &dxidf[pij]) * d22f;
        naf[i] += t31 + t32;
        naf[j] += -t31;
        naf[k] += -t32;

        // angular curvature channel
        let d2f = fields.d2f[pij];
        let s_ij = matrix_vec(&fields.d11g[t], &rij) + matrix_vec(&fields.d12g[t], &rik);
        let s_ik =
            matrix_vec(&fields.d12g[t].transpose(), &rij) + matrix_vec(&fields.d22g[t], &rik);
        naf[i] += (s_ij + s_ik) * d2f;
        naf[j] += s_ij * (-d2f);
        naf[k] += s_ik * (-d2f);
    }

    naf.into_iter().map(|t| t * 0.5).collect()
}

fn flatten_component(naf: &[Rank3], a: usize, b: usize) -> DVector<f64> {
    DVector::from_fn(3 * naf.len(), |idx, _| naf[idx / 3][(idx % 3, a, b)])
}

/// Ξ·H⁻¹·Ξ by nine independent solves, one per strain component.
fn solve_correction(
    hessian: &dyn MatVec,
    naf: &[Rank3],
    solver: &dyn LinearSolve,
) -> Result<Rank4, SolveError> {
    let mut solutions = Vec::with_capacity(9);
    for c in 0..3 {
        for d in 0..3 {
            solutions.push(solver.solve(hessian, &flatten_component(naf, c, d))?);
        }
    }
    let mut out = Rank4::zeros();
    for a in 0..3 {
        for b in 0..3 {
            let lhs = flatten_component(naf, a, b);
            for c in 0..3 {
                for d in 0..3 {
                    out.0[a][b][c][d] = lhs.dot(&solutions[3 * c + d]);
                }
            }
        }
    }
    Ok(out)
}

/// Ξ·H⁻¹·Ξ by spectral projection onto supplied eigenmodes.
fn modes_correction(naf: &[Rank3], eigenvalues: &[f64], eigenvectors: &DMatrix<f64>) -> Rank4 {
    let mut out = Rank4::zeros();
    for (idx, &lambda) in eigenvalues.iter().enumerate() {
        let mode = eigenvectors.column(idx);
        let mut g = Matrix3::zeros();
        for (m, tensor) in naf.iter().enumerate() {
            for e in 0..3 {
                let weight = mode[3 * m + e];
                for a in 0..3 {
                    for b in 0..3 {
                        g[(a, b)] += weight * tensor[(e, a, b)];
                    }
                }
            }
        }
        g /= lambda.sqrt();
        out += outer_mm(&g, &g);
    }
    out
}

/// Symmetrize over both index-pair swaps, negate, divide by volume.
fn finalize_correction(raw: Rank4, volume: f64) -> Rank4 {
    let sym = (raw + raw.swap_first() + raw.swap_last() + raw.swap_first().swap_last()) * 0.25;
    sym * (-1.0 / volume)
}
