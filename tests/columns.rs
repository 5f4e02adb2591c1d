use ironframe::error::{ErrorKind, error_kind};
use ironframe::testing::{assert_all_na, assert_column_values, assert_columns_equal, random_int_column};
use ironframe::{Column, RowIndex, SType, ThreadPool, Value};

#[test]
fn views_are_transparent() -> anyhow::Result<()> {
    let col = random_int_column(100, 7, 3);
    let ri = RowIndex::from_indices(vec![99, 0, -1, 42, 42, 7]);
    let view = col.apply_rowindex(&ri);
    assert!(view.is_virtual());
    for (j, src) in ri.iter().enumerate() {
        let expected = src.and_then(|i| col.get_element::<i32>(i));
        assert_eq!(view.get_element::<i32>(j), expected, "row {j}");
    }

    let strs = Column::from_strs(&[Some("a"), None, Some("ccc"), Some("")]);
    let picked = strs.apply_rowindex(&RowIndex::slice(3, 4, -1)?);
    assert_eq!(
        picked.to_vec::<String>(),
        vec![Some(String::new()), Some("ccc".into()), None, Some("a".into())]
    );
    Ok(())
}

#[test]
fn views_fold_instead_of_nesting() -> anyhow::Result<()> {
    let col = Column::from_slice(&(0..50i64).collect::<Vec<_>>());
    let once = col.apply_rowindex(&RowIndex::slice(10, 30, 1)?);
    let twice = once.apply_rowindex(&RowIndex::slice(5, 5, 2)?);
    assert_eq!(twice.imp().n_children(), 1);
    assert!(!twice.imp().child(0).is_virtual());
    assert_eq!(
        twice.to_vec::<i64>(),
        vec![Some(15), Some(17), Some(19), Some(21), Some(23)]
    );
    Ok(())
}

#[test]
fn materialize_is_idempotent() -> anyhow::Result<()> {
    let col = random_int_column(64, 4, 9).apply_rowindex(&RowIndex::slice(63, 32, -2)?);
    let m1 = col.materialize();
    assert!(!m1.is_virtual());
    let m2 = m1.materialize();
    assert_columns_equal(&m2, &m1);
    assert_columns_equal(&m1, &col);

    let pool = ThreadPool::new(3);
    let mp = col.materialize_par(&pool)?;
    assert_columns_equal(&mp, &m1);
    Ok(())
}

#[test]
fn float_narrowing_out_of_range_is_na() -> anyhow::Result<()> {
    let col = Column::from_options(&[Some(1.5f64), None, Some(1e300)]);
    let narrow = col.cast(SType::Float32)?;
    assert_eq!(narrow.stype(), SType::Float32);
    assert_eq!(narrow.to_vec::<f32>(), vec![Some(1.5), None, None]);
    Ok(())
}

#[test]
fn integer_narrowing_and_string_casts() -> anyhow::Result<()> {
    let col = Column::from_slice(&[1i64, 300, -5]);
    assert_eq!(col.cast(SType::Int8)?.to_vec::<i8>(), vec![Some(1), None, Some(-5)]);

    let text = col.cast(SType::Str32)?;
    assert_eq!(
        text.to_vec::<String>(),
        vec![Some("1".into()), Some("300".into()), Some("-5".into())]
    );

    let parsed = Column::from_strs(&[Some("12"), Some("x"), None, Some(" 7 ")]).cast(SType::Int32)?;
    assert_eq!(parsed.to_vec::<i32>(), vec![Some(12), None, None, Some(7)]);

    let mut inplace = Column::from_slice(&[true, false]);
    inplace.cast_inplace(SType::Int32)?;
    assert_eq!(inplace.to_vec::<i32>(), vec![Some(1), Some(0)]);

    let err = col.cast(SType::Void).unwrap_err();
    assert_eq!(error_kind(&err), Some(ErrorKind::Type));
    Ok(())
}

#[test]
fn regex_match_is_anchored() -> anyhow::Result<()> {
    let col = Column::from_strs(&[Some("abc"), Some("xabc"), None, Some("ab")]);
    let m = col.re_match("ab.?")?;
    assert_eq!(m.stype(), SType::Bool);
    assert_eq!(m.to_vec::<bool>(), vec![Some(true), Some(false), None, Some(true)]);
    Ok(())
}

#[test]
fn regex_errors() {
    let ints = Column::from_slice(&[1i32, 2]);
    let err = ints.re_match(".*").unwrap_err();
    assert_eq!(error_kind(&err), Some(ErrorKind::Type));

    let strs = Column::from_strs(&[Some("a")]);
    let err = strs.re_match("(unclosed").unwrap_err();
    assert_eq!(error_kind(&err), Some(ErrorKind::Value));
}

#[test]
fn constants_and_values() -> anyhow::Result<()> {
    let c = Column::constant(Value::Int(5), 3);
    assert_eq!(c.to_vec::<i32>(), vec![Some(5); 3]);
    assert_all_na(&Column::new_na(SType::Float64, 4));

    let col = Column::from_values(
        SType::Float64,
        &[Some(Value::Float(0.5)), None, Some(Value::Int(2))],
    )?;
    assert_column_values(&col, &[Some(Value::Float(0.5)), None, Some(Value::Float(2.0))]);

    let err = Column::from_values(SType::Int32, &[Some(Value::from("nope"))]).unwrap_err();
    assert_eq!(error_kind(&err), Some(ErrorKind::Type));
    Ok(())
}

#[test]
fn stats_are_cached() {
    let col = Column::from_options(&[Some(4i32), None, Some(2), Some(6)]);
    let stats = col.stats();
    assert_eq!(stats.nrows, 4);
    assert_eq!(stats.na_count, 1);
    assert_eq!(stats.count(), 3);
    assert_eq!(stats.min, Some(Value::Int(2)));
    assert_eq!(stats.max, Some(Value::Int(6)));
    assert_eq!(stats.sum, Some(Value::Int(12)));
    assert_eq!(stats.mean, Some(4.0));
    assert!(std::ptr::eq(stats, col.stats()));
}
