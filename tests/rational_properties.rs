//! Algebraic-law properties of `OptionalRational` (spec §8, "Rational
//! arithmetic").

use pipeline_autoscheduler::error::AutoschedulerError;
use pipeline_autoscheduler::rational::OptionalRational;
use proptest::prelude::*;

fn small_nonzero() -> impl Strategy<Value = i64> {
    prop_oneof![(-20i64..-1), (1i64..20)]
}

proptest! {
    #[test]
    fn add_matches_cross_multiplied_sum(a in -20i64..20, b in small_nonzero(), c in -20i64..20, d in small_nonzero()) {
        let lhs = OptionalRational::new(a, b).add(&OptionalRational::new(c, d)).unwrap();
        let expected = OptionalRational::new(a * d + c * b, b * d);
        prop_assert_eq!(lhs, expected);
    }

    #[test]
    fn add_is_commutative(a in -20i64..20, b in small_nonzero(), c in -20i64..20, d in small_nonzero()) {
        let lhs = OptionalRational::new(a, b);
        let rhs = OptionalRational::new(c, d);
        prop_assert_eq!(lhs.add(&rhs).unwrap(), rhs.add(&lhs).unwrap());
    }

    #[test]
    fn mul_by_zero_is_always_exact_zero(a in -20i64..20, b in small_nonzero()) {
        let product_left = OptionalRational::ZERO.mul(&OptionalRational::new(a, b)).unwrap();
        let product_right = OptionalRational::new(a, b).mul(&OptionalRational::ZERO).unwrap();
        prop_assert_eq!(product_left, OptionalRational::ZERO);
        prop_assert_eq!(product_right, OptionalRational::ZERO);
    }

    #[test]
    fn from_int_round_trips_through_eq_int(n in -1000i64..1000) {
        prop_assert!(OptionalRational::from_int(n).eq_int(n));
    }
}

#[test]
fn overflow_in_add_is_an_error_not_a_panic() {
    let huge = OptionalRational::new(i64::MAX, 1);
    let result = huge.add(&OptionalRational::new(i64::MAX, 1));
    assert!(matches!(result, Err(AutoschedulerError::Overflow(_))));
}

#[test]
fn undefined_never_equals_undefined() {
    assert_ne!(OptionalRational::UNDEFINED, OptionalRational::UNDEFINED);
}
