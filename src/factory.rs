//! Random input generation.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{validation_error, Result};
use crate::matrix::{Element, Matrix};

/// Inclusive `[min, max]` range that input cells are drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueRange<T: Element> {
    min: T,
    max: T,
}

impl<T: Element> ValueRange<T> {
    pub fn new(min: T, max: T) -> Result<Self> {
        if min > max {
            return Err(validation_error(format!(
                "value range minimum {} exceeds maximum {}",
                min, max
            )));
        }
        Ok(ValueRange { min, max })
    }

    pub fn min(&self) -> T {
        self.min
    }

    pub fn max(&self) -> T {
        self.max
    }
}

/// Fills matrices with independently drawn integers.
pub struct MatrixFactory {
    rng: StdRng,
}

impl MatrixFactory {
    /// Deterministic factory; the same seed always yields the same matrices.
    pub fn seeded(seed: u64) -> Self {
        MatrixFactory {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Factory seeded from operating-system entropy.
    pub fn from_entropy() -> Self {
        MatrixFactory {
            rng: StdRng::from_os_rng(),
        }
    }

    /// Overwrites every cell of `matrix` with a value in `range`.
    pub fn fill<T: Element>(&mut self, matrix: &mut Matrix<T>, range: ValueRange<T>) {
        let rng = &mut self.rng;
        matrix.fill_with(|| rng.random_range(range.min..=range.max));
    }

    /// Allocates an `n x n` matrix and fills it.
    pub fn random<T: Element>(&mut self, n: usize, range: ValueRange<T>) -> Matrix<T> {
        let mut matrix = Matrix::zeros(n);
        self.fill(&mut matrix, range);
        matrix
    }
}
