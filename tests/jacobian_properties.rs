//! Black-box properties of `LoadJacobian` exercised through the public API
//! only (spec §8, "LoadJacobian").

use pipeline_autoscheduler::jacobian::LoadJacobian;
use pipeline_autoscheduler::rational::OptionalRational;

fn diagonal(n: usize, value: i64) -> LoadJacobian {
    let mut j = LoadJacobian::new(n, n);
    for i in 0..n {
        for k in 0..n {
            let v = if i == k { OptionalRational::from_int(value) } else { OptionalRational::ZERO };
            j.set(i, k, v);
        }
    }
    j
}

#[test]
fn scalar_composed_with_anything_collapses_to_scalar_shape() {
    let scalar = LoadJacobian::scalar();
    let consumer = diagonal(3, 1);
    // scalar (0x0) composed with a 0-row matrix requires cols == rows; use a
    // 0-row, 3-col producer-side matrix as the "other" operand instead.
    let zero_rows = LoadJacobian::new(0, 3);
    let composed = scalar.compose(&zero_rows).unwrap();
    assert_eq!(composed.rows(), 0);
    assert_eq!(composed.cols(), 3);
    let _ = consumer;
}

#[test]
fn scale_columns_multiplies_every_row_in_that_column() {
    let identity = diagonal(2, 1);
    let scaled = identity.scale_columns(&[3, -2]).unwrap();
    assert_eq!(scaled.get(0, 0), OptionalRational::from_int(3));
    assert_eq!(scaled.get(1, 1), OptionalRational::from_int(-2));
    // off-diagonal stays exact zero, scaling zero by anything is still zero
    assert_eq!(scaled.get(0, 1), OptionalRational::ZERO);
}

#[test]
fn scale_columns_rejects_wrong_factor_count() {
    let m = LoadJacobian::new(2, 3);
    assert!(m.scale_columns(&[1, 2]).is_err());
}

#[test]
fn merging_a_matrix_into_itself_doubles_the_count() {
    let mut a = diagonal(2, 1);
    let b = diagonal(2, 1);
    assert_eq!(a.count(), 1);
    assert!(a.merge(&b));
    assert_eq!(a.count(), 2);
}

#[test]
fn composing_two_fully_defined_matrices_leaves_all_coeffs_defined() {
    let a = diagonal(2, 2);
    let b = diagonal(2, 3);
    let composed = a.compose(&b).unwrap();
    assert!(composed.all_coeffs_exist());
    assert_eq!(composed.get(0, 0), OptionalRational::from_int(6));
}
