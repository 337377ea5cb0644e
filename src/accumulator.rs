//! The shared output matrix of a concurrent trial.
//!
//! Cells live in one or more shards, each behind its own `Mutex`. With
//! [`LockGranularity::Global`] a single shard holds the whole matrix; with
//! [`LockGranularity::PerRow`] every row is its own shard. An addition holds
//! the owning shard's lock for the full read-modify-write, so concurrent
//! additions to one cell never interleave.

use std::sync::{LockResult, Mutex, MutexGuard, PoisonError};

use crate::error::{dimension_mismatch, validation_error, Result};
use crate::matrix::{Element, Matrix};

/// How the output cells are partitioned into exclusion domains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockGranularity {
    /// One lock for every cell.
    #[default]
    Global,
    /// One lock per output row.
    PerRow,
}

/// Output buffer plus the locks guarding concurrent additions into it.
pub struct SharedAccumulator<T: Element> {
    n: usize,
    rows_per_shard: usize,
    granularity: LockGranularity,
    shards: Vec<Mutex<Vec<T>>>,
}

impl<T: Element> SharedAccumulator<T> {
    /// Zero-filled `n x n` accumulator.
    pub fn new(n: usize, granularity: LockGranularity) -> Self {
        let rows_per_shard = match granularity {
            LockGranularity::Global => n.max(1),
            LockGranularity::PerRow => 1,
        };
        let shard_count = n.div_ceil(rows_per_shard);
        let shards = (0..shard_count)
            .map(|_| Mutex::new(vec![T::zero(); rows_per_shard * n]))
            .collect();

        SharedAccumulator {
            n,
            rows_per_shard,
            granularity,
            shards,
        }
    }

    pub fn size(&self) -> usize {
        self.n
    }

    pub fn granularity(&self) -> LockGranularity {
        self.granularity
    }

    /// Atomically adds `value` into cell `(row, col)`.
    pub fn add(&self, row: usize, col: usize, value: T) -> Result<()> {
        self.add_row_segment(row, col, std::slice::from_ref(&value))
    }

    /// Atomically adds `values[t]` into cell `(row, col_start + t)` for every `t`,
    /// under a single lock acquisition.
    pub fn add_row_segment(&self, row: usize, col_start: usize, values: &[T]) -> Result<()> {
        if row >= self.n || col_start + values.len() > self.n {
            return Err(validation_error(format!(
                "segment row {} cols {}..{} is outside a {}x{} accumulator",
                row,
                col_start,
                col_start + values.len(),
                self.n,
                self.n
            )));
        }

        let offset = (row % self.rows_per_shard) * self.n + col_start;
        let mut shard = self.lock_shard(row / self.rows_per_shard);
        shard[offset..offset + values.len()]
            .iter_mut()
            .zip(values)
            .for_each(|(cell, value)| *cell = cell.wrapping_add(value));
        Ok(())
    }

    /// Zeroes every cell. Taking `&mut self` guarantees no task holds a reference.
    pub fn reset(&mut self) {
        for shard in &mut self.shards {
            shard
                .get_mut()
                .unwrap_or_else(PoisonError::into_inner)
                .fill(T::zero());
        }
    }

    /// Copies the current contents into a standalone matrix.
    pub fn snapshot(&self) -> Matrix<T> {
        let mut out = Matrix::zeros(self.n);
        {
            let array = out.as_array_mut();
            for (index, shard) in self.shards.iter().enumerate() {
                let shard = Self::recover(shard.lock());
                let first_row = index * self.rows_per_shard;
                for (local, row) in shard.chunks(self.n.max(1)).enumerate() {
                    let global = first_row + local;
                    if global >= self.n {
                        break;
                    }
                    for (col, value) in row.iter().enumerate() {
                        array[[global, col]] = *value;
                    }
                }
            }
        }
        out
    }

    /// Cell-by-cell comparison against `expected`, stopping at the first difference.
    pub fn matches(&self, expected: &Matrix<T>) -> Result<bool> {
        expected.ensure_size(self.n, "reference")?;
        if self.n == 0 {
            return Ok(true);
        }

        for (index, shard) in self.shards.iter().enumerate() {
            let shard = Self::recover(shard.lock());
            let first_row = index * self.rows_per_shard;
            for (local, row) in shard.chunks(self.n).enumerate() {
                let global = first_row + local;
                if global >= self.n {
                    break;
                }
                if row
                    .iter()
                    .enumerate()
                    .any(|(col, value)| *value != expected.get(global, col))
                {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    /// Fails unless this accumulator is `expected x expected`.
    pub fn ensure_size(&self, expected: usize) -> Result<()> {
        if self.n != expected {
            return Err(dimension_mismatch(
                expected,
                self.n,
                "accumulator has the wrong size",
            ));
        }
        Ok(())
    }

    fn lock_shard(&self, index: usize) -> MutexGuard<'_, Vec<T>> {
        Self::recover(self.shards[index].lock())
    }

    // A task that panicked mid-trial leaves its shard poisoned. The data is
    // still a valid sum of completed additions; the correctness check reports
    // the missing contribution.
    fn recover(result: LockResult<MutexGuard<'_, Vec<T>>>) -> MutexGuard<'_, Vec<T>> {
        result.unwrap_or_else(|poisoned| {
            log::warn!("recovering poisoned accumulator shard");
            poisoned.into_inner()
        })
    }
}
