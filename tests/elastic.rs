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

//! Elastic-constant assembly: Born tensor symmetries, the Birch sum, and
//! the non-affine correction through both inverse-Hessian paths.

use approx::{assert_abs_diff_eq, assert_relative_eq};
use bondorder::{Atoms, Cell, ConjugateGradient, HarmonicBondOrder, Manybody, Matrix3, Vector3};
use nalgebra::{DMatrix, SymmetricEigen};

fn jittered_cube() -> Atoms {
    let cell = Cell::cubic(4.0, true).unwrap();
    let jitter = [
        Vector3::new(0.05, -0.08, 0.03),
        Vector3::new(-0.11, 0.04, 0.09),
        Vector3::new(0.07, 0.12, -0.06),
        Vector3::new(-0.03, -0.05, 0.10),
        Vector3::new(0.09, 0.02, -0.12),
        Vector3::new(-0.06, 0.11, 0.05),
        Vector3::new(0.02, -0.09, -0.04),
        Vector3::new(-0.08, 0.03, 0.07),
    ];
    let corners = [
        (0.0, 0.0, 0.0),
        (2.0, 0.0, 0.0),
        (0.0, 2.0, 0.0),
        (0.0, 0.0, 2.0),
        (2.0, 2.0, 0.0),
        (2.0, 0.0, 2.0),
        (0.0, 2.0, 2.0),
        (2.0, 2.0, 2.0),
    ];
    let positions = corners
        .iter()
        .zip(jitter)
        .map(|(&(x, y, z), d)| Vector3::new(x, y, z) + d)
        .collect();
    Atoms::new(positions, vec![0; 8], vec![1.0; 8], cell).unwrap()
}

fn crystal_potential() -> HarmonicBondOrder {
    HarmonicBondOrder {
        spring_constant: 4.0,
        eq_distance: 1.8,
        xi_strength: 0.3,
        xi_stiffness: 0.15,
        angle_strength: 0.05,
        angle_stiffness: 0.02,
        cutoff: 2.4,
    }
}

#[test]
fn born_tensor_has_minor_and_major_symmetries() {
    let evaluator = Manybody::new(crystal_potential());
    let born = evaluator.born_elastic_constants(&jittered_cube()).unwrap();
    for a in 0..3 {
        for b in 0..3 {
            for c in 0..3 {
                for d in 0..3 {
                    assert_relative_eq!(
                        born[(a, b, c, d)],
                        born[(b, a, c, d)],
                        epsilon = 1e-10
                    );
                    assert_relative_eq!(
                        born[(a, b, c, d)],
                        born[(a, b, d, c)],
                        epsilon = 1e-10
                    );
                    assert_relative_eq!(
                        born[(a, b, c, d)],
                        born[(c, d, a, b)],
                        epsilon = 1e-10
                    );
                }
            }
        }
    }
}

#[test]
fn born_matches_energy_strain_curvature() {
    // for a uniaxial deformation gradient 1 + h·S with S = eₓ⊗eₓ, the
    // energy curvature in h is V·(σₓₓ + Cₓₓₓₓ) with C in the
    // Green-Lagrange measure
    let atoms = jittered_cube();
    let evaluator = Manybody::new(crystal_potential());
    let born = evaluator.born_elastic_constants(&atoms).unwrap();
    let stress = evaluator.evaluate(&atoms).unwrap().stress;
    let volume = atoms.cell().volume();

    let mut direction = Matrix3::zeros();
    direction[(0, 0)] = 1.0;
    let energy_at = |h: f64| {
        let gradient = Matrix3::identity() + h * direction;
        evaluator
            .evaluate(&atoms.deformed(&gradient).unwrap())
            .unwrap()
            .energy
    };
    let h = 1e-4;
    let curvature = (energy_at(h) - 2.0 * energy_at(0.0) + energy_at(-h)) / (h * h);
    assert_relative_eq!(
        curvature,
        volume * (stress[(0, 0)] + born[(0, 0, 0, 0)]),
        epsilon = 1e-4,
        max_relative = 1e-4
    );
}

#[test]
fn birch_is_born_plus_stress_contribution() {
    let atoms = jittered_cube();
    let evaluator = Manybody::new(crystal_potential());
    let born = evaluator.born_elastic_constants(&atoms).unwrap();
    let stress = evaluator
        .stress_contribution_to_elastic_constants(&atoms)
        .unwrap();
    let birch = evaluator.birch_coefficients(&atoms).unwrap();
    for a in 0..3 {
        for b in 0..3 {
            for c in 0..3 {
                for d in 0..3 {
                    assert_relative_eq!(
                        birch[(a, b, c, d)],
                        born[(a, b, c, d)] + stress[(a, b, c, d)],
                        epsilon = 1e-12
                    );
                }
            }
        }
    }
}

/// Two atoms at the pair equilibrium distance: the Hessian has a single
/// nonzero mode (the bond stretch, eigenvalue 2k), the non-affine forces
/// have a single nonzero channel, and the correction is −k r₀²/V in the
/// xxxx component.
#[test]
fn dimer_non_affine_correction_is_analytic() {
    let (k, r0) = (2.0, 1.0);
    let cell = Cell::cubic(10.0, false).unwrap();
    let volume = cell.volume();
    let atoms = Atoms::new(
        vec![Vector3::zeros(), Vector3::new(r0, 0.0, 0.0)],
        vec![0, 0],
        vec![1.0, 1.0],
        cell,
    )
    .unwrap();
    let evaluator = Manybody::new(HarmonicBondOrder::pair_only(k, r0, 1.5));

    let solver = ConjugateGradient::new(1e-12);
    let correction = evaluator
        .non_affine_contribution_to_elastic_constants(&atoms, &solver)
        .unwrap();

    let expected = -k * r0 * r0 / volume;
    assert_relative_eq!(correction[(0, 0, 0, 0)], expected, epsilon = 1e-10);
    assert_abs_diff_eq!(correction[(1, 1, 1, 1)], 0.0, epsilon = 1e-12);
    assert_abs_diff_eq!(correction[(0, 0, 1, 1)], 0.0, epsilon = 1e-12);
}

#[test]
fn spectral_path_agrees_with_iterative_path() {
    let (k, r0) = (2.0, 1.0);
    let cell = Cell::cubic(10.0, false).unwrap();
    let atoms = Atoms::new(
        vec![Vector3::zeros(), Vector3::new(r0, 0.0, 0.0)],
        vec![0, 0],
        vec![1.0, 1.0],
        cell,
    )
    .unwrap();
    let evaluator = Manybody::new(HarmonicBondOrder::pair_only(k, r0, 1.5));

    let solver = ConjugateGradient::new(1e-12);
    let iterative = evaluator
        .non_affine_contribution_to_elastic_constants(&atoms, &solver)
        .unwrap();

    let dense = evaluator.hessian(&atoms).unwrap().to_dense();
    let eigen = SymmetricEigen::new(dense);
    let keep: Vec<usize> = (0..6).filter(|&i| eigen.eigenvalues[i] > 1e-8).collect();
    let eigenvalues: Vec<f64> = keep.iter().map(|&i| eigen.eigenvalues[i]).collect();
    let mut eigenvectors = DMatrix::zeros(6, keep.len());
    for (column, &i) in keep.iter().enumerate() {
        eigenvectors.set_column(column, &eigen.eigenvectors.column(i));
    }
    let spectral = evaluator
        .non_affine_contribution_from_modes(&atoms, &eigenvalues, &eigenvectors)
        .unwrap();

    for a in 0..3 {
        for b in 0..3 {
            for c in 0..3 {
                for d in 0..3 {
                    assert_relative_eq!(
                        iterative[(a, b, c, d)],
                        spectral[(a, b, c, d)],
                        epsilon = 1e-9
                    );
                }
            }
        }
    }
}
