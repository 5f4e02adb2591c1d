use ironframe::error::{ErrorKind, error_kind};
use ironframe::testing::{assert_column_values, assert_frames_equal, grouped_frame};
use ironframe::{Aggregation, Column, Frame, ReduceOp, RowIndex, ThreadPool, Value};

#[test]
fn construction_is_validated() {
    let ok = Frame::from_pairs([
        ("a", Column::from_slice(&[1i32, 2])),
        ("b", Column::from_strs(&[Some("x"), None])),
    ]);
    assert!(ok.is_ok());

    let cases = [
        Frame::new(vec!["a".into()], vec![]),
        Frame::from_pairs([("a", Column::from_slice(&[1i32])), ("a", Column::from_slice(&[2i32]))]),
        Frame::from_pairs([("", Column::from_slice(&[1i32]))]),
        Frame::from_pairs([("a", Column::from_slice(&[1i32])), ("b", Column::from_slice(&[1i32, 2]))]),
    ];
    for result in cases {
        assert_eq!(error_kind(&result.unwrap_err()), Some(ErrorKind::Value));
    }
}

#[test]
fn column_lookup() -> anyhow::Result<()> {
    let frame = grouped_frame();
    assert_eq!(frame.ncols(), 3);
    assert_eq!(frame.column(1)?.to_vec::<i32>()[0], Some(10));
    assert!(frame.column(3).is_err());
    assert!(frame.column_by_name("label")?.is_na(3));
    assert_eq!(error_kind(&frame.column_by_name("nope").unwrap_err()), Some(ErrorKind::Value));
    Ok(())
}

#[test]
fn aggregate_by_key() -> anyhow::Result<()> {
    let pool = ThreadPool::new(2);
    let frame = grouped_frame();
    let out = frame.aggregate(
        &pool,
        &["key"],
        &[
            Aggregation::new(ReduceOp::Sum, "value"),
            Aggregation::new(ReduceOp::Mean, "value").named("avg"),
            Aggregation::new(ReduceOp::Count, "label"),
            Aggregation::count(),
        ],
    )?;
    assert_eq!(out.names(), &["key", "sum_value", "avg", "count_label", "count"]);
    assert_eq!(out.nrows(), 3);
    assert_eq!(out.column(0)?.to_vec::<i32>(), vec![Some(1), Some(2), Some(3)]);
    assert_eq!(out.column(1)?.to_vec::<i64>(), vec![Some(30), Some(120), Some(60)]);
    assert_eq!(out.column(2)?.to_vec::<f64>(), vec![Some(15.0), Some(40.0), Some(60.0)]);
    assert_eq!(out.column(3)?.to_vec::<i64>(), vec![Some(2), Some(2), Some(1)]);
    assert_eq!(out.column(4)?.to_vec::<i64>(), vec![Some(2), Some(3), Some(1)]);
    Ok(())
}

#[test]
fn aggregate_unsorted_keys_with_na() -> anyhow::Result<()> {
    let pool = ThreadPool::new(3);
    let frame = Frame::from_pairs([
        ("k", Column::from_strs(&[Some("b"), None, Some("a"), Some("b"), None])),
        ("v", Column::from_options(&[Some(1.0f64), Some(2.0), Some(3.0), None, Some(5.0)])),
    ])?;
    let out = frame.aggregate(
        &pool,
        &["k"],
        &[
            Aggregation::new(ReduceOp::Max, "v"),
            Aggregation::new(ReduceOp::CountNa, "v"),
        ],
    )?;
    assert_column_values(
        out.column(0)?,
        &[None, Some(Value::from("a")), Some(Value::from("b"))],
    );
    assert_eq!(out.column(1)?.to_vec::<f64>(), vec![Some(5.0), Some(3.0), Some(1.0)]);
    assert_eq!(out.column(2)?.to_vec::<i64>(), vec![Some(0), Some(0), Some(1)]);
    Ok(())
}

#[test]
fn aggregate_without_keys_reduces_the_whole_frame() -> anyhow::Result<()> {
    let pool = ThreadPool::new(2);
    let out = grouped_frame().aggregate(
        &pool,
        &[],
        &[
            Aggregation::new(ReduceOp::Sum, "value"),
            Aggregation::new(ReduceOp::Mean, "value"),
            Aggregation::new(ReduceOp::CountNa, "label"),
            Aggregation::count(),
            Aggregation::countna(),
        ],
    )?;
    assert_eq!(out.names(), &["sum_value", "mean_value", "countna_label", "count", "countna"]);
    assert_eq!(out.nrows(), 1);
    assert_eq!(out.column(0)?.to_vec::<i64>(), vec![Some(210)]);
    assert_eq!(out.column(1)?.to_vec::<f64>(), vec![Some(35.0)]);
    assert_eq!(out.column(2)?.to_vec::<i64>(), vec![Some(1)]);
    assert_eq!(out.column(3)?.to_vec::<i64>(), vec![Some(6)]);
    assert_eq!(out.column(4)?.to_vec::<i64>(), vec![Some(0)]);
    Ok(())
}

#[test]
fn aggregate_empty_frame() -> anyhow::Result<()> {
    let pool = ThreadPool::new(1);
    let frame = Frame::from_pairs([
        ("k", Column::from_slice::<i32>(&[])),
        ("v", Column::from_slice::<f64>(&[])),
    ])?;
    let out = frame.aggregate(
        &pool,
        &["k"],
        &[Aggregation::new(ReduceOp::Sum, "v"), Aggregation::count()],
    )?;
    assert_eq!(out.nrows(), 1);
    assert_eq!(out.column(0)?.to_vec::<i32>(), vec![None]);
    assert_eq!(out.column(1)?.to_vec::<f64>(), vec![Some(0.0)]);
    assert_eq!(out.column(2)?.to_vec::<i64>(), vec![Some(0)]);
    Ok(())
}

#[test]
fn aggregate_errors() {
    let pool = ThreadPool::new(1);
    let frame = grouped_frame();
    let err = frame
        .aggregate(&pool, &["missing"], &[Aggregation::count()])
        .unwrap_err();
    assert_eq!(error_kind(&err), Some(ErrorKind::Value));

    let err = frame
        .aggregate(&pool, &["key"], &[Aggregation::new(ReduceOp::Sum, "label")])
        .unwrap_err();
    assert_eq!(error_kind(&err), Some(ErrorKind::Type));

    let sum_without_column = Aggregation {
        op: ReduceOp::Sum,
        column: None,
        name: None,
    };
    let err = frame.aggregate(&pool, &["key"], &[sum_without_column]).unwrap_err();
    assert_eq!(error_kind(&err), Some(ErrorKind::Value));
}

#[test]
fn row_selection_and_materialization() -> anyhow::Result<()> {
    let pool = ThreadPool::new(2);
    let frame = grouped_frame();
    let tail = frame.apply_rowindex(&RowIndex::slice(3, 3, 1)?)?;
    assert_eq!(tail.nrows(), 3);
    assert_eq!(tail.column(0)?.to_vec::<i32>(), vec![Some(2), Some(2), Some(3)]);

    let m = tail.materialize();
    assert!(m.columns().iter().all(|c| !c.is_virtual()));
    assert_frames_equal(&m, &tail);
    assert_frames_equal(&tail.materialize_par(&pool)?, &tail);

    assert!(frame.apply_rowindex(&RowIndex::from_indices(vec![6])).is_err());
    Ok(())
}

#[test]
fn aggregation_specs_deserialize() -> anyhow::Result<()> {
    let agg: Aggregation = serde_json::from_str(r#"{ "op": "sum", "column": "value", "name": null }"#)?;
    assert_eq!(agg, Aggregation::new(ReduceOp::Sum, "value"));
    assert_eq!("sum".parse::<ReduceOp>()?, ReduceOp::Sum);
    assert!("median".parse::<ReduceOp>().is_err());
    Ok(())
}
