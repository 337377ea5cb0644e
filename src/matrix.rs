//! Square integer matrices.
//!
//! Every matrix in a benchmark run is `N x N`. Storage is a row-major
//! `ndarray::Array2`, so `(row, col)` indexing reads like the loops that use it.

use std::fmt::{Debug, Display};
use std::ops::Index;

use ndarray::Array2;
use num::traits::{WrappingAdd, WrappingMul};
use num::PrimInt;
use rand::distr::uniform::SampleUniform;

use crate::error::{dimension_mismatch, Result};

/// Integer cell type of a [`Matrix`].
///
/// Products and sums wrap on overflow in every code path, so a sequential and
/// a concurrent product of the same operands agree bit for bit regardless of
/// the value range.
pub trait Element:
    PrimInt + WrappingAdd + WrappingMul + SampleUniform + Debug + Display + Send + Sync + 'static
{
}

impl<T> Element for T where
    T: PrimInt
        + WrappingAdd
        + WrappingMul
        + SampleUniform
        + Debug
        + Display
        + Send
        + Sync
        + 'static
{
}

/// An `N x N` matrix of integers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matrix<T: Element> {
    data: Array2<T>,
}

impl<T: Element> Matrix<T> {
    /// Creates an `n x n` matrix filled with zeros.
    pub fn zeros(n: usize) -> Self {
        Matrix {
            data: Array2::zeros((n, n)),
        }
    }

    /// Builds a matrix from nested rows, rejecting ragged or non-square input.
    pub fn from_rows(rows: Vec<Vec<T>>) -> Result<Self> {
        let n = rows.len();
        if let Some(bad) = rows.iter().find(|row| row.len() != n) {
            return Err(dimension_mismatch(
                n,
                bad.len(),
                "every row of a square matrix must have as many cells as there are rows",
            ));
        }

        let flat: Vec<T> = rows.into_iter().flatten().collect();
        let data = Array2::from_shape_vec((n, n), flat)
            .map_err(|e| dimension_mismatch(n, n, e.to_string()))?;
        Ok(Matrix { data })
    }

    /// Wraps an existing array, rejecting non-square shapes.
    pub fn from_array(data: Array2<T>) -> Result<Self> {
        let (rows, cols) = data.dim();
        if rows != cols {
            return Err(dimension_mismatch(rows, cols, "matrix is not square"));
        }
        Ok(Matrix { data })
    }

    /// Side length `N`.
    #[inline(always)]
    pub fn size(&self) -> usize {
        self.data.nrows()
    }

    #[inline(always)]
    pub fn get(&self, row: usize, col: usize) -> T {
        self.data[[row, col]]
    }

    pub fn as_array(&self) -> &Array2<T> {
        &self.data
    }

    pub(crate) fn as_array_mut(&mut self) -> &mut Array2<T> {
        &mut self.data
    }

    /// Overwrites every cell, row by row, with values produced by `next`.
    pub fn fill_with(&mut self, mut next: impl FnMut() -> T) {
        self.data.iter_mut().for_each(|cell| *cell = next());
    }

    /// Returns the first `(row, col)` where `self` and `other` differ, scanning
    /// row-major. Matrices of different sizes differ at `(0, 0)`.
    pub fn first_mismatch(&self, other: &Matrix<T>) -> Option<(usize, usize)> {
        if self.size() != other.size() {
            return Some((0, 0));
        }
        self.data
            .indexed_iter()
            .find(|&((row, col), value)| *value != other.data[[row, col]])
            .map(|(index, _)| index)
    }

    /// Fails with `DimensionMismatch` unless this matrix is `expected x expected`.
    pub fn ensure_size(&self, expected: usize, name: &str) -> Result<()> {
        if self.size() != expected {
            return Err(dimension_mismatch(
                expected,
                self.size(),
                format!("matrix {} has the wrong size", name),
            ));
        }
        Ok(())
    }
}

impl<T: Element> Index<(usize, usize)> for Matrix<T> {
    type Output = T;

    fn index(&self, (row, col): (usize, usize)) -> &T {
        &self.data[[row, col]]
    }
}
