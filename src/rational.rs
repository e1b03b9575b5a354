//! Rational numbers with an explicit "undefined" state.
//!
//! [`OptionalRational`] is the coefficient type used throughout [`crate::jacobian`].
//! Unlike a plain `f64`, it tracks exactly when a value could not be computed
//! (e.g. a non-affine producer-coordinate expression) instead of smuggling that
//! through `NaN`.

use crate::error::{AutoschedulerError, AutoschedulerResult};
use std::cmp::Ordering;
use std::fmt;

/// A rational number `num / den`, or "undefined" when `den == 0`.
///
/// `(0, 0)` is the canonical undefined value. Construction never normalizes
/// sign or reduces by GCD eagerly except inside [`OptionalRational::add`];
/// [`OptionalRational::new`] reduces on the way in so that equality can be a
/// plain field comparison once both sides exist.
#[derive(Debug, Clone, Copy)]
pub struct OptionalRational {
    num: i64,
    den: i64,
}

impl OptionalRational {
    /// The canonical undefined value.
    pub const UNDEFINED: OptionalRational = OptionalRational { num: 0, den: 0 };

    /// Exact zero, `0 / 1`.
    pub const ZERO: OptionalRational = OptionalRational { num: 0, den: 1 };

    /// Construct a rational from a numerator/denominator pair, reducing by
    /// GCD and normalizing the denominator's sign to be positive. Passing
    /// `den == 0` yields [`Self::UNDEFINED`] regardless of `num`.
    pub fn new(num: i64, den: i64) -> Self {
        if den == 0 {
            return Self::UNDEFINED;
        }
        let (mut num, mut den) = (num, den);
        if den < 0 {
            num = -num;
            den = -den;
        }
        if num == 0 {
            return Self::ZERO;
        }
        let g = gcd(num.unsigned_abs(), den.unsigned_abs()).max(1);
        OptionalRational {
            num: num / g as i64,
            den: den / g as i64,
        }
    }

    /// Construct from a plain integer.
    pub fn from_int(n: i64) -> Self {
        OptionalRational { num: n, den: 1 }
    }

    /// Whether this value exists (i.e. `den != 0`).
    pub fn exists(&self) -> bool {
        self.den != 0
    }

    pub fn numerator(&self) -> i64 {
        self.num
    }

    pub fn denominator(&self) -> i64 {
        self.den
    }

    /// `a + b`. Undefined if either side is undefined. Overflow in the
    /// widened intermediate is an internal error, never a silent wrap.
    pub fn add(&self, other: &Self) -> AutoschedulerResult<Self> {
        if !self.exists() || !other.exists() {
            return Ok(Self::UNDEFINED);
        }
        let l = lcm(self.den.unsigned_abs(), other.den.unsigned_abs());
        let l_i128 = i128::from(l);
        let scale_a = l_i128 / i128::from(self.den);
        let scale_b = l_i128 / i128::from(other.den);
        let num = i128::from(self.num) * scale_a + i128::from(other.num) * scale_b;
        let num: i64 = num
            .try_into()
            .map_err(|_| AutoschedulerError::Overflow(format!(
                "OptionalRational::add overflowed widening to i64: {num}"
            )))?;
        let den: i64 = l_i128
            .try_into()
            .map_err(|_| AutoschedulerError::Overflow(format!(
                "OptionalRational::add denominator overflowed i64: {l_i128}"
            )))?;
        Ok(Self::new(num, den))
    }

    /// `a += b`, in place.
    pub fn add_assign(&mut self, other: &Self) -> AutoschedulerResult<()> {
        *self = self.add(other)?;
        Ok(())
    }

    /// `a * b`. Short-circuits to exact zero when either side is an exact
    /// zero, regardless of whether the other side exists — this keeps a
    /// scalar producer's Jacobian row exactly `(0, 1)` even when composed
    /// against an undefined coefficient.
    pub fn mul(&self, other: &Self) -> AutoschedulerResult<Self> {
        if self.is_exact_zero() || other.is_exact_zero() {
            return Ok(Self::ZERO);
        }
        if !self.exists() || !other.exists() {
            return Ok(Self::UNDEFINED);
        }
        let num = i128::from(self.num) * i128::from(other.num);
        let den = i128::from(self.den) * i128::from(other.den);
        let num: i64 = num
            .try_into()
            .map_err(|_| AutoschedulerError::Overflow(format!(
                "OptionalRational::mul numerator overflowed i64: {num}"
            )))?;
        let den: i64 = den
            .try_into()
            .map_err(|_| AutoschedulerError::Overflow(format!(
                "OptionalRational::mul denominator overflowed i64: {den}"
            )))?;
        Ok(Self::new(num, den))
    }

    fn is_exact_zero(&self) -> bool {
        self.exists() && self.num == 0
    }

    /// Cross-multiplicative comparison against an integer. Returns `false`
    /// in both directions (`< x` and `>= x`) when `self` is undefined.
    pub fn partial_cmp_int(&self, x: i64) -> Option<Ordering> {
        if !self.exists() {
            return None;
        }
        // self.den is always normalized positive by `new`.
        let lhs = i128::from(self.num);
        let rhs = i128::from(x) * i128::from(self.den);
        Some(lhs.cmp(&rhs))
    }

    pub fn lt_int(&self, x: i64) -> bool {
        matches!(self.partial_cmp_int(x), Some(Ordering::Less))
    }

    pub fn le_int(&self, x: i64) -> bool {
        matches!(self.partial_cmp_int(x), Some(Ordering::Less | Ordering::Equal))
    }

    pub fn gt_int(&self, x: i64) -> bool {
        matches!(self.partial_cmp_int(x), Some(Ordering::Greater))
    }

    pub fn ge_int(&self, x: i64) -> bool {
        matches!(self.partial_cmp_int(x), Some(Ordering::Greater | Ordering::Equal))
    }

    /// `self == x`. Requires existence (undefined never equals anything,
    /// including another undefined value compared this way).
    pub fn eq_int(&self, x: i64) -> bool {
        self.exists() && self.partial_cmp_int(x) == Some(Ordering::Equal)
    }
}

/// Cross-multiplicative equality; both sides must exist.
impl PartialEq for OptionalRational {
    fn eq(&self, other: &Self) -> bool {
        if !self.exists() || !other.exists() {
            return false;
        }
        i128::from(self.num) * i128::from(other.den) == i128::from(other.num) * i128::from(self.den)
    }
}

impl fmt::Display for OptionalRational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.exists() {
            write!(f, "<undefined>")
        } else if self.den == 1 {
            write!(f, "{}", self.num)
        } else {
            write!(f, "{}/{}", self.num, self.den)
        }
    }
}

fn gcd(a: u64, b: u64) -> u64 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

fn lcm(a: u64, b: u64) -> u64 {
    if a == 0 || b == 0 {
        0
    } else {
        a / gcd(a, b) * b
    }
}
