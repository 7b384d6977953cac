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

use super::TopologyError;
use crate::{Matrix3, Vector3};

/// Simulation cell with per-axis periodicity.
///
/// Cell vectors are the columns of `h`, so cartesian = h · fractional.
/// The inverse is cached at construction.
#[derive(Clone, Debug)]
pub struct Cell {
    h: Matrix3,
    h_inv: Matrix3,
    pbc: [bool; 3],
}

impl Cell {
    pub fn new(h: Matrix3, pbc: [bool; 3]) -> Result<Self, TopologyError> {
        let h_inv = h.try_inverse().ok_or(TopologyError::SingularCell)?;
        Ok(Self { h, h_inv, pbc })
    }

    /// Cubic cell with edge length `length`, periodic on all or no axes.
    pub fn cubic(length: f64, periodic: bool) -> Result<Self, TopologyError> {
        Self::new(Matrix3::identity() * length, [periodic; 3])
    }

    pub fn h(&self) -> &Matrix3 {
        &self.h
    }

    pub fn pbc(&self) -> &[bool; 3] {
        &self.pbc
    }

    pub fn to_fractional(&self, cart: &Vector3) -> Vector3 {
        self.h_inv * cart
    }

    pub fn to_cartesian(&self, frac: &Vector3) -> Vector3 {
        self.h * frac
    }

    /// Distances between parallel cell faces, d_i = 1 / |row_i(h⁻¹)|.
    pub fn perpendicular_widths(&self) -> Vector3 {
        Vector3::new(
            1.0 / self.h_inv.row(0).norm(),
            1.0 / self.h_inv.row(1).norm(),
            1.0 / self.h_inv.row(2).norm(),
        )
    }

    pub fn volume(&self) -> f64 {
        self.h.determinant().abs()
    }
}
