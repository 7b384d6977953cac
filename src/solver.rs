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

//! ## Linear solves
//!
//! The non-affine correction needs the inverse Hessian applied to a
//! handful of right-hand sides. The solve is kept behind a small
//! capability interface so a direct sparse factorization can be swapped in
//! where available; the shipped implementation is plain conjugate
//! gradient, which only ever touches the operator through matrix-vector
//! products.

use log::{debug, trace};
use nalgebra::{DMatrix, DVector};
use thiserror::Error;

/// A symmetric linear operator exposed through its action on vectors.
pub trait MatVec {
    fn dim(&self) -> usize;
    fn matvec(&self, x: &DVector<f64>) -> DVector<f64>;
}

impl MatVec for DMatrix<f64> {
    fn dim(&self) -> usize {
        self.nrows()
    }

    fn matvec(&self, x: &DVector<f64>) -> DVector<f64> {
        self * x
    }
}

#[derive(Debug, Error)]
pub enum SolveError {
    /// The operator produced non-positive curvature along a search
    /// direction; the tolerance cannot be met by conjugate gradient.
    #[error("operator is not positive definite (curvature {curvature:.3e} at iteration {iteration})")]
    NotPositiveDefinite { iteration: usize, curvature: f64 },
    /// The iteration budget ran out before the residual met the tolerance.
    #[error(
        "conjugate gradient exhausted {max_iterations} iterations with residual {residual:.3e} (tolerance {tolerance:.3e})"
    )]
    IterationLimit {
        max_iterations: usize,
        residual: f64,
        tolerance: f64,
    },
}

/// Solve A·x = b for a symmetric positive(-semi)definite operator.
pub trait LinearSolve {
    fn solve(&self, operator: &dyn MatVec, rhs: &DVector<f64>) -> Result<DVector<f64>, SolveError>;
}

/// Conjugate-gradient solver with an absolute residual tolerance.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ConjugateGradient {
    /// Converged when ‖b − A·x‖ drops below this value
    pub tolerance: f64,
    /// Iteration cap; defaults to ten times the problem dimension
    pub max_iterations: Option<usize>,
}

impl ConjugateGradient {
    pub fn new(tolerance: f64) -> Self {
        Self {
            tolerance,
            max_iterations: None,
        }
    }
}

impl LinearSolve for ConjugateGradient {
    fn solve(&self, operator: &dyn MatVec, rhs: &DVector<f64>) -> Result<DVector<f64>, SolveError> {
        let dim = operator.dim();
        let max_iterations = self.max_iterations.unwrap_or(10 * dim);

        let mut x = DVector::zeros(dim);
        let mut residual = rhs.clone();
        let mut direction = residual.clone();
        let mut rs = residual.dot(&residual);
        if rs.sqrt() <= self.tolerance {
            return Ok(x);
        }

        for iteration in 0..max_iterations {
            let a_dir = operator.matvec(&direction);
            let curvature = direction.dot(&a_dir);
            if curvature <= 0.0 {
                return Err(SolveError::NotPositiveDefinite {
                    iteration,
                    curvature,
                });
            }
            let alpha = rs / curvature;
            x.axpy(alpha, &direction, 1.0);
            residual.axpy(-alpha, &a_dir, 1.0);
            let rs_next = residual.dot(&residual);
            trace!("cg iteration {iteration}: residual {:.3e}", rs_next.sqrt());
            if rs_next.sqrt() <= self.tolerance {
                debug!("cg converged after {} iterations", iteration + 1);
                return Ok(x);
            }
            direction = &residual + (rs_next / rs) * &direction;
            rs = rs_next;
        }

        Err(SolveError::IterationLimit {
            max_iterations,
            residual: rs.sqrt(),
            tolerance: self.tolerance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn spd_system() -> (DMatrix<f64>, DVector<f64>) {
        let b = DMatrix::from_fn(5, 5, |i, j| ((3 * i + 2 * j) % 7) as f64 * 0.25 - 0.5);
        let a = &b * b.transpose() + DMatrix::identity(5, 5);
        let rhs = DVector::from_fn(5, |i, _| 1.0 - 0.4 * i as f64);
        (a, rhs)
    }

    #[test]
    fn matches_direct_factorization() {
        let (a, rhs) = spd_system();
        let solver = ConjugateGradient::new(1e-12);
        let x = solver.solve(&a, &rhs).unwrap();
        let reference = a.clone().lu().solve(&rhs).unwrap();
        for i in 0..5 {
            assert_relative_eq!(x[i], reference[i], epsilon = 1e-9);
        }
    }

    #[test]
    fn zero_rhs_is_trivial() {
        let (a, _) = spd_system();
        let solver = ConjugateGradient::new(1e-12);
        let x = solver.solve(&a, &DVector::zeros(5)).unwrap();
        assert_eq!(x, DVector::zeros(5));
    }

    #[test]
    fn iteration_cap_is_fatal() {
        let (a, rhs) = spd_system();
        let solver = ConjugateGradient {
            tolerance: 1e-14,
            max_iterations: Some(1),
        };
        assert!(matches!(
            solver.solve(&a, &rhs),
            Err(SolveError::IterationLimit { .. })
        ));
    }

    #[test]
    fn indefinite_operator_is_fatal() {
        let a = -DMatrix::<f64>::identity(3, 3);
        let rhs = DVector::from_element(3, 1.0);
        let solver = ConjugateGradient::new(1e-10);
        assert!(matches!(
            solver.solve(&a, &rhs),
            Err(SolveError::NotPositiveDefinite { .. })
        ));
    }
}
