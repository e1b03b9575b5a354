//! Load Jacobians: the matrix of partial derivatives of a producer's access
//! coordinates with respect to a consumer's loop variables.
//!
//! A single call site can be hit through more than one access pattern (e.g.
//! an unrolled boundary case); [`Edge`](crate::dag::Edge) keeps a small list
//! of distinct Jacobians per edge and merges duplicates by incrementing a
//! multiplicity counter instead of storing the same matrix twice.

use crate::error::{AutoschedulerError, AutoschedulerResult};
use crate::rational::OptionalRational;

/// A `rows x cols` matrix of [`OptionalRational`] coefficients plus a
/// load-multiplicity counter.
///
/// `rows` indexes the producer's storage dimensions, `cols` the consumer's
/// loop dimensions. `count` is always `>= 1`; it is load-multiplicity
/// (accesses of this exact shape per consumer point), not a probability
/// weight, so composing two Jacobians multiplies counts rather than summing.
#[derive(Debug, Clone)]
pub struct LoadJacobian {
    rows: usize,
    cols: usize,
    coeffs: Vec<OptionalRational>,
    count: u64,
}

impl LoadJacobian {
    /// A freshly allocated Jacobian with every coefficient undefined and a
    /// multiplicity of 1.
    pub fn new(rows: usize, cols: usize) -> Self {
        LoadJacobian {
            rows,
            cols,
            coeffs: vec![OptionalRational::UNDEFINED; rows * cols],
            count: 1,
        }
    }

    /// The scalar `0x0` Jacobian: every cell trivially exists and is exact
    /// zero (a scalar producer/consumer has no coordinates to differentiate).
    pub fn scalar() -> Self {
        LoadJacobian { rows: 0, cols: 0, coeffs: Vec::new(), count: 1 }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    fn index(&self, row: usize, col: usize) -> usize {
        row * self.cols + col
    }

    pub fn get(&self, row: usize, col: usize) -> OptionalRational {
        if self.rows == 0 || self.cols == 0 {
            return OptionalRational::ZERO;
        }
        self.coeffs[self.index(row, col)]
    }

    pub fn set(&mut self, row: usize, col: usize, value: OptionalRational) {
        let idx = self.index(row, col);
        self.coeffs[idx] = value;
    }

    /// Whether every coefficient exists (no entry is the undefined rational).
    pub fn all_coeffs_exist(&self) -> bool {
        self.coeffs.iter().all(OptionalRational::exists)
    }

    /// Merge `other` into `self` iff they have equal dimensions and every
    /// coefficient is equal; on success, `count += other.count`. Commutative
    /// on matching matrices (equality and addition both are).
    pub fn merge(&mut self, other: &LoadJacobian) -> bool {
        if self.rows != other.rows || self.cols != other.cols {
            return false;
        }
        if self.coeffs != other.coeffs {
            return false;
        }
        self.count += other.count;
        true
    }

    /// `self * other`, row-by-column dotting: `result[i][j] = sum_k
    /// self[i][k] * other[k][j]`, poisoned to undefined by any undefined
    /// term in the dot chain. Requires `self.cols == other.rows`. Counts
    /// multiply (load-multiplicity composes multiplicatively, not additively
    /// — see `DESIGN.md` open question 1).
    pub fn compose(&self, other: &LoadJacobian) -> AutoschedulerResult<LoadJacobian> {
        if self.cols != other.rows {
            return Err(AutoschedulerError::internal(format!(
                "LoadJacobian::compose dimension mismatch: {}x{} * {}x{}",
                self.rows, self.cols, other.rows, other.cols
            )));
        }
        // Scalar producer or scalar consumer collapses to the (0,1) scalar case.
        if self.rows == 0 || other.cols == 0 {
            let mut result = LoadJacobian::new(self.rows, other.cols);
            result.count = self.count * other.count;
            return Ok(result);
        }
        let mut result = LoadJacobian::new(self.rows, other.cols);
        for i in 0..self.rows {
            for j in 0..other.cols {
                let mut acc = OptionalRational::ZERO;
                for k in 0..self.cols {
                    let term = self.get(i, k).mul(&other.get(k, j))?;
                    acc = acc.add(&term)?;
                }
                result.set(i, j, acc);
            }
        }
        result.count = self.count * other.count;
        Ok(result)
    }

    /// `self * factors`: scale column `j` by the integer `factors[j]`.
    /// `factors.len()` must equal `self.cols`.
    pub fn scale_columns(&self, factors: &[i64]) -> AutoschedulerResult<LoadJacobian> {
        if factors.len() != self.cols {
            return Err(AutoschedulerError::internal(format!(
                "LoadJacobian::scale_columns expected {} factors, got {}",
                self.cols,
                factors.len()
            )));
        }
        let mut result = self.clone();
        for j in 0..self.cols {
            let factor = OptionalRational::from_int(factors[j]);
            for i in 0..self.rows {
                let scaled = result.get(i, j).mul(&factor)?;
                result.set(i, j, scaled);
            }
        }
        Ok(result)
    }
}
