use std::fmt;

use crate::accumulator::SharedAccumulator;
use crate::error::Result;
use crate::matrix::{Element, Matrix};
use crate::partition::BlockCoordinate;

/// Lifecycle of a [`BlockTask`]. A task that could not be started stays `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Running,
    Completed,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskState::Pending => "pending",
            TaskState::Running => "running",
            TaskState::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// The unit of concurrent work: the partial product of one block-triple.
#[derive(Debug, Clone)]
pub struct BlockTask {
    coordinate: BlockCoordinate,
    state: TaskState,
}

impl BlockTask {
    pub fn new(coordinate: BlockCoordinate) -> Self {
        BlockTask {
            coordinate,
            state: TaskState::Pending,
        }
    }

    pub fn coordinate(&self) -> BlockCoordinate {
        self.coordinate
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Computes `A[rows, inner] * B[inner, cols]` for this block and adds it into
    /// `accumulator`, one locked segment per output row.
    ///
    /// The contraction offset `t` runs over the full block side, but only offsets
    /// where both the A column and the B row stay inside the clipped extent are
    /// read, so a boundary block never indexes past `N`.
    pub fn run<T: Element>(
        &mut self,
        a: &Matrix<T>,
        b: &Matrix<T>,
        accumulator: &SharedAccumulator<T>,
    ) -> Result<()> {
        self.transition(TaskState::Running);

        let extent = self.coordinate.extent(a.size());
        let mut segment = Vec::with_capacity(extent.cols_b.len());

        for i in extent.rows_a.clone() {
            segment.clear();
            for j in extent.cols_b.clone() {
                let mut sum = T::zero();
                for t in 0..self.coordinate.block_size {
                    let col_a = extent.cols_a.start + t;
                    let row_b = extent.rows_b.start + t;
                    if col_a < extent.cols_a.end && row_b < extent.rows_b.end {
                        sum = sum.wrapping_add(&a.get(i, col_a).wrapping_mul(&b.get(row_b, j)));
                    }
                }
                segment.push(sum);
            }
            accumulator.add_row_segment(i, extent.cols_b.start, &segment)?;
        }

        self.transition(TaskState::Completed);
        Ok(())
    }

    fn transition(&mut self, next: TaskState) {
        log::debug!("task {} {} -> {}", self.coordinate, self.state, next);
        self.state = next;
    }
}
