//! Decomposition of an `N x N x N` product into block-triples.
//!
//! A product `C = A * B` iterates a 3D space: output row `i`, output column
//! `j` and contraction index `p`. Cutting every axis into slices of side `K`
//! gives `ceil(N / K)^3` independent cuboids. The cuboid at `(bi, bj, bp)`
//! contributes `A[bi, bp] * B[bp, bj]` to output block `C[bi, bj]`, so summing
//! all of them reconstructs the full product. The last slice on every axis is
//! clipped to `N`.

use std::fmt;
use std::ops::Range;

use crate::error::{validation_error, Result};

/// One contraction-slice contribution to the output.
///
/// `block_col_a == block_row_b` for every coordinate a [`BlockPartitioner`]
/// produces; both fields are kept so a task reads like the block product it
/// computes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockCoordinate {
    pub block_row_a: usize,
    pub block_col_a: usize,
    pub block_row_b: usize,
    pub block_col_b: usize,
    pub block_size: usize,
}

/// Clipped half-open index ranges covered by a [`BlockCoordinate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockExtent {
    pub rows_a: Range<usize>,
    pub cols_a: Range<usize>,
    pub rows_b: Range<usize>,
    pub cols_b: Range<usize>,
}

impl BlockCoordinate {
    pub fn new(
        block_row_a: usize,
        block_col_a: usize,
        block_row_b: usize,
        block_col_b: usize,
        block_size: usize,
    ) -> Self {
        BlockCoordinate {
            block_row_a,
            block_col_a,
            block_row_b,
            block_col_b,
            block_size,
        }
    }

    /// Index ranges of this block in an `n x n` product, clipped to `n`.
    pub fn extent(&self, n: usize) -> BlockExtent {
        let span = |block: usize| {
            let start = (block * self.block_size).min(n);
            let end = ((block + 1) * self.block_size).min(n);
            start..end
        };

        BlockExtent {
            rows_a: span(self.block_row_a),
            cols_a: span(self.block_col_a),
            rows_b: span(self.block_row_b),
            cols_b: span(self.block_col_b),
        }
    }
}

impl fmt::Display for BlockCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}, {}; k={})",
            self.block_row_a, self.block_col_a, self.block_row_b, self.block_col_b, self.block_size
        )
    }
}

/// Enumerates the block-triples covering an `n x n` product with block side `k`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockPartitioner {
    n: usize,
    block_size: usize,
    blocks_per_dim: usize,
}

impl BlockPartitioner {
    /// Requires `1 <= block_size <= n`.
    pub fn new(n: usize, block_size: usize) -> Result<Self> {
        if n == 0 {
            return Err(validation_error("matrix size must be at least 1"));
        }
        if block_size == 0 || block_size > n {
            return Err(validation_error(format!(
                "block size {} is outside 1..={}",
                block_size, n
            )));
        }

        Ok(BlockPartitioner {
            n,
            block_size,
            blocks_per_dim: n.div_ceil(block_size),
        })
    }

    pub fn matrix_size(&self) -> usize {
        self.n
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// `ceil(n / k)`.
    pub fn blocks_per_dim(&self) -> usize {
        self.blocks_per_dim
    }

    /// Number of coordinates [`Self::iter`] yields: `blocks_per_dim^3`.
    pub fn task_count(&self) -> usize {
        self.blocks_per_dim.pow(3)
    }

    /// Lazily yields every coordinate, output row-block outermost, then output
    /// column-block, then contraction-block. Each call starts over.
    pub fn iter(&self) -> BlockCoordinates {
        BlockCoordinates {
            block_size: self.block_size,
            blocks_per_dim: self.blocks_per_dim,
            cursor: 0,
            total: self.task_count(),
        }
    }
}

impl<'a> IntoIterator for &'a BlockPartitioner {
    type Item = BlockCoordinate;
    type IntoIter = BlockCoordinates;

    fn into_iter(self) -> BlockCoordinates {
        self.iter()
    }
}

/// Iterator returned by [`BlockPartitioner::iter`].
#[derive(Debug, Clone)]
pub struct BlockCoordinates {
    block_size: usize,
    blocks_per_dim: usize,
    cursor: usize,
    total: usize,
}

impl Iterator for BlockCoordinates {
    type Item = BlockCoordinate;

    fn next(&mut self) -> Option<BlockCoordinate> {
        if self.cursor >= self.total {
            return None;
        }

        let b = self.blocks_per_dim;
        let row = self.cursor / (b * b);
        let col = (self.cursor / b) % b;
        let inner = self.cursor % b;
        self.cursor += 1;

        Some(BlockCoordinate::new(row, inner, inner, col, self.block_size))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.total - self.cursor;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for BlockCoordinates {}
