//! Assertions over columns and frames.

use crate::column::Column;
use crate::frame::Frame;
use crate::stype::Value;

/// Assert that two columns have the same stype, length, values and NA
/// positions.
///
/// # Panics
///
/// Panics on the first difference, naming the row.
pub fn assert_columns_equal(actual: &Column, expected: &Column) {
    assert_eq!(
        actual.stype(),
        expected.stype(),
        "Column stype mismatch:\n  Expected: {expected:?}\n  Actual: {actual:?}"
    );
    assert_column_values(actual, &expected.to_values());
}

/// Assert that a column holds exactly `expected`, with `None` for NA.
///
/// # Panics
///
/// Panics on a length mismatch or the first differing row.
pub fn assert_column_values(actual: &Column, expected: &[Option<Value>]) {
    assert_eq!(
        actual.nrows(),
        expected.len(),
        "Column length mismatch:\n  Expected length: {}\n  Actual length: {}\n  Expected: {expected:?}\n  Actual: {:?}",
        expected.len(),
        actual.nrows(),
        actual.to_values()
    );
    for (i, e) in expected.iter().enumerate() {
        let a = actual.get_value(i);
        assert!(
            same_value(a.as_ref(), e.as_ref()),
            "Column mismatch at row {i}:\n  Expected: {e:?}\n  Actual: {a:?}\n  Full actual: {:?}",
            actual.to_values()
        );
    }
}

fn same_value(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(Value::Float(x)), Some(Value::Float(y))) => x == y || x.to_bits() == y.to_bits(),
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

/// Assert that two frames have the same names and equal columns.
///
/// # Panics
///
/// Panics on the first differing name or column.
pub fn assert_frames_equal(actual: &Frame, expected: &Frame) {
    assert_eq!(
        actual.names(),
        expected.names(),
        "Frame column names mismatch"
    );
    assert_eq!(actual.nrows(), expected.nrows(), "Frame row count mismatch");
    for ((name, a), e) in actual
        .names()
        .iter()
        .zip(actual.columns())
        .zip(expected.columns())
    {
        assert_eq!(
            a.stype(),
            e.stype(),
            "Frame column {name:?} has stype {}, expected {}",
            a.stype(),
            e.stype()
        );
        for i in 0..a.nrows() {
            let (x, y) = (a.get_value(i), e.get_value(i));
            assert!(
                same_value(x.as_ref(), y.as_ref()),
                "Frame column {name:?} differs at row {i}:\n  Expected: {y:?}\n  Actual: {x:?}"
            );
        }
    }
}

/// Assert that every row of `col` is NA.
///
/// # Panics
///
/// Panics at the first non-NA row.
pub fn assert_all_na(col: &Column) {
    if let Some(i) = (0..col.nrows()).find(|&i| !col.is_na(i)) {
        panic!("Expected all NA, row {i} is {:?}", col.get_value(i));
    }
}
