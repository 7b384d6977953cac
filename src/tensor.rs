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

//! ## Small fixed tensors
//!
//! Rank-3 and rank-4 Cartesian tensors, the named outer products used to
//! assemble them, and the accumulate-by-key reduction shared by every
//! scatter in the evaluator.

use crate::{Matrix3, Vector3};
use num::Zero;
use std::ops::{Add, AddAssign, Index, IndexMut, Mul, Neg};

/// A 3x3x3 Cartesian tensor
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rank3(pub [[[f64; 3]; 3]; 3]);

/// A 3x3x3x3 Cartesian tensor
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rank4(pub [[[[f64; 3]; 3]; 3]; 3]);

impl Rank3 {
    pub fn zeros() -> Self {
        Self([[[0.0; 3]; 3]; 3])
    }
}

impl Rank4 {
    pub fn zeros() -> Self {
        Self([[[[0.0; 3]; 3]; 3]; 3])
    }

    /// Tensor with the first two indices swapped
    pub fn swap_first(&self) -> Self {
        let mut out = Self::zeros();
        for a in 0..3 {
            for b in 0..3 {
                out.0[a][b] = self.0[b][a];
            }
        }
        out
    }

    /// Tensor with the last two indices swapped
    pub fn swap_last(&self) -> Self {
        let mut out = Self::zeros();
        for a in 0..3 {
            for b in 0..3 {
                for c in 0..3 {
                    for d in 0..3 {
                        out.0[a][b][c][d] = self.0[a][b][d][c];
                    }
                }
            }
        }
        out
    }

    /// The 6x6 Voigt representation, index order xx, yy, zz, yz, xz, xy.
    pub fn voigt(&self) -> [[f64; 6]; 6] {
        const PAIRS: [(usize, usize); 6] = [(0, 0), (1, 1), (2, 2), (1, 2), (0, 2), (0, 1)];
        let mut out = [[0.0; 6]; 6];
        for (i, &(a, b)) in PAIRS.iter().enumerate() {
            for (j, &(c, d)) in PAIRS.iter().enumerate() {
                out[i][j] = self.0[a][b][c][d];
            }
        }
        out
    }
}

impl Index<(usize, usize, usize)> for Rank3 {
    type Output = f64;

    fn index(&self, index: (usize, usize, usize)) -> &f64 {
        &self.0[index.0][index.1][index.2]
    }
}

impl IndexMut<(usize, usize, usize)> for Rank3 {
    fn index_mut(&mut self, index: (usize, usize, usize)) -> &mut f64 {
        &mut self.0[index.0][index.1][index.2]
    }
}

impl Index<(usize, usize, usize, usize)> for Rank4 {
    type Output = f64;

    fn index(&self, index: (usize, usize, usize, usize)) -> &f64 {
        &self.0[index.0][index.1][index.2][index.3]
    }
}

impl IndexMut<(usize, usize, usize, usize)> for Rank4 {
    fn index_mut(&mut self, index: (usize, usize, usize, usize)) -> &mut f64 {
        &mut self.0[index.0][index.1][index.2][index.3]
    }
}

macro_rules! elementwise {
    ($ty:ident) => {
        impl Add for $ty {
            type Output = Self;

            fn add(mut self, rhs: Self) -> Self {
                self += rhs;
                self
            }
        }

        impl Neg for $ty {
            type Output = Self;

            fn neg(self) -> Self {
                self * -1.0
            }
        }

        impl Zero for $ty {
            fn zero() -> Self {
                Self::zeros()
            }

            fn is_zero(&self) -> bool {
                *self == Self::zeros()
            }
        }
    };
}

impl AddAssign for Rank3 {
    fn add_assign(&mut self, rhs: Self) {
        for a in 0..3 {
            for b in 0..3 {
                for c in 0..3 {
                    self.0[a][b][c] += rhs.0[a][b][c];
                }
            }
        }
    }
}

impl Mul<f64> for Rank3 {
    type Output = Self;

    fn mul(mut self, rhs: f64) -> Self {
        for a in 0..3 {
            for b in 0..3 {
                for c in 0..3 {
                    self.0[a][b][c] *= rhs;
                }
            }
        }
        self
    }
}

impl AddAssign for Rank4 {
    fn add_assign(&mut self, rhs: Self) {
        for a in 0..3 {
            for b in 0..3 {
                for c in 0..3 {
                    for d in 0..3 {
                        self.0[a][b][c][d] += rhs.0[a][b][c][d];
                    }
                }
            }
        }
    }
}

impl Mul<f64> for Rank4 {
    type Output = Self;

    fn mul(mut self, rhs: f64) -> Self {
        for a in 0..3 {
            for b in 0..3 {
                for c in 0..3 {
                    for d in 0..3 {
                        self.0[a][b][c][d] *= rhs;
                    }
                }
            }
        }
        self
    }
}

elementwise!(Rank3);
elementwise!(Rank4);

/// Pairwise outer product, x ⊗ y
pub fn outer(x: &Vector3, y: &Vector3) -> Matrix3 {
    x * y.transpose()
}

/// Triple outer product, (x ⊗ y ⊗ z)_abc = x_a y_b z_c
pub fn outer3(x: &Vector3, y: &Vector3, z: &Vector3) -> Rank3 {
    let mut out = Rank3::zeros();
    for a in 0..3 {
        for b in 0..3 {
            for c in 0..3 {
                out.0[a][b][c] = x[a] * y[b] * z[c];
            }
        }
    }
    out
}

/// Quadruple outer product, (x ⊗ y ⊗ z ⊗ t)_abcd = x_a y_b z_c t_d
pub fn outer4(x: &Vector3, y: &Vector3, z: &Vector3, t: &Vector3) -> Rank4 {
    let mut out = Rank4::zeros();
    for a in 0..3 {
        for b in 0..3 {
            for c in 0..3 {
                for d in 0..3 {
                    out.0[a][b][c][d] = x[a] * y[b] * z[c] * t[d];
                }
            }
        }
    }
    out
}

/// Outer product of two matrices, (m ⊗ n)_abcd = m_ab n_cd
pub fn outer_mm(m: &Matrix3, n: &Matrix3) -> Rank4 {
    let mut out = Rank4::zeros();
    for a in 0..3 {
        for b in 0..3 {
            for c in 0..3 {
                for d in 0..3 {
                    out.0[a][b][c][d] = m[(a, b)] * n[(c, d)];
                }
            }
        }
    }
    out
}

/// Accumulate contributions into `len` pre-zeroed slots keyed by index.
///
/// The reduction is associative and commutative; any key outside `0..len`
/// is a caller bug and panics via the slice index.
pub fn scatter_add<T>(len: usize, items: impl IntoIterator<Item = (usize, T)>) -> Vec<T>
where
    T: Zero + AddAssign + Copy,
{
    let mut out = vec![T::zero(); len];
    for (key, value) in items {
        out[key] += value;
    }
    out
}
