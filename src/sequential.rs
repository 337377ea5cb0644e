use std::time::{Duration, Instant};

use crate::error::Result;
use crate::matrix::{Element, Matrix};

/// Reference product and how long it took to compute.
#[derive(Debug, Clone)]
pub struct SequentialProduct<T: Element> {
    pub product: Matrix<T>,
    pub elapsed: Duration,
}

/// Computes `A * B` with the plain row / column / contraction triple loop.
///
/// This is the ground truth every concurrent trial is compared against.
/// Both operands must be square and of the same size.
pub fn multiply_sequential<T: Element>(
    a: &Matrix<T>,
    b: &Matrix<T>,
) -> Result<SequentialProduct<T>> {
    let n = a.size();
    b.ensure_size(n, "B")?;

    let mut product = Matrix::zeros(n);
    let start = Instant::now();

    {
        let out = product.as_array_mut();
        for i in 0..n {
            for j in 0..n {
                let mut sum = T::zero();
                for k in 0..n {
                    sum = sum.wrapping_add(&a.get(i, k).wrapping_mul(&b.get(k, j)));
                }
                out[[i, j]] = sum;
            }
        }
    }

    let elapsed = start.elapsed();
    log::debug!("sequential {}x{} product computed in {:?}", n, n, elapsed);

    Ok(SequentialProduct { product, elapsed })
}
