use ironframe::error::{ErrorKind, error_kind};
use ironframe::reduce::{count_rows, countna_rows, reduce, reduce_par};
use ironframe::sort::{group, group_rows, sort};
use ironframe::testing::random_int_column;
use ironframe::{Column, Groupby, Grouping, ReduceOp, SType, SortFlags, ThreadPool};

#[test]
fn sums_per_group() -> anyhow::Result<()> {
    let values = Column::from_slice(&[10i32, 20, 30, 40, 0, 60]);
    let gby = Groupby::from_offsets(vec![0, 2, 5, 6])?;
    assert_eq!(gby.size(), 3);
    assert_eq!(gby.nrows(), 6);
    assert_eq!(gby.group(1), (2, 5));

    let sums = reduce(ReduceOp::Sum, &values, &gby, Grouping::GtoAll)?;
    assert_eq!(sums.stype(), SType::Int64);
    assert_eq!(sums.to_vec::<i64>(), vec![Some(30), Some(70), Some(60)]);
    Ok(())
}

#[test]
fn groups_cover_all_rows() -> anyhow::Result<()> {
    let col = random_int_column(500, 0, 21);
    let (order, gby) = group(&[col.clone()], &[SortFlags::default()])?;
    assert_eq!(order.size(), 500);
    assert_eq!(gby.nrows(), 500);

    let mut seen = vec![false; 500];
    for r in order.iter() {
        let r = r.unwrap_or_else(|| panic!("sort order has a missing row"));
        assert!(!seen[r], "row {r} appears twice");
        seen[r] = true;
    }

    let sorted = col.apply_rowindex(&order);
    let mut prev: Option<i32> = None;
    for (i0, i1) in gby.iter() {
        assert!(i1 > i0);
        let key = sorted.get_element::<i32>(i0);
        for r in i0..i1 {
            assert_eq!(sorted.get_element::<i32>(r), key);
        }
        assert!(prev < key, "groups must be strictly ascending");
        prev = key;
    }
    Ok(())
}

#[test]
fn reductions_of_empty_and_all_na_groups() -> anyhow::Result<()> {
    let col = Column::from_options(&[None, None, Some(3i32), None]);
    // groups: [0,0) empty, [0,2) all NA, [2,4) one value
    let gby = Groupby::from_offsets(vec![0, 0, 2, 4])?;

    let sum = reduce(ReduceOp::Sum, &col, &gby, Grouping::GtoAll)?;
    assert_eq!(sum.to_vec::<i64>(), vec![Some(0), Some(0), Some(3)]);
    let prod = reduce(ReduceOp::Prod, &col, &gby, Grouping::GtoAll)?;
    assert_eq!(prod.to_vec::<i64>(), vec![Some(1), Some(1), Some(3)]);

    for op in [ReduceOp::Mean, ReduceOp::Min, ReduceOp::Max, ReduceOp::First, ReduceOp::Sd] {
        let out = reduce(op, &col, &gby, Grouping::GtoAll)?;
        assert!(out.is_na(0), "{op} of an empty group");
        assert!(out.is_na(1), "{op} of an all-NA group");
    }

    let count = reduce(ReduceOp::Count, &col, &gby, Grouping::GtoAll)?;
    let countna = reduce(ReduceOp::CountNa, &col, &gby, Grouping::GtoAll)?;
    for (g, (i0, i1)) in gby.iter().enumerate() {
        let total = count.get_element::<i64>(g).unwrap_or(-1) + countna.get_element::<i64>(g).unwrap_or(-1);
        assert_eq!(total, (i1 - i0) as i64);
    }
    Ok(())
}

#[test]
fn mean_and_sd() -> anyhow::Result<()> {
    let col = Column::from_slice(&[2.0f64, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
    let gby = Groupby::single_group(8);
    let mean = reduce(ReduceOp::Mean, &col, &gby, Grouping::GtoAll)?;
    assert_eq!(mean.to_vec::<f64>(), vec![Some(5.0)]);
    let sd = reduce(ReduceOp::Sd, &col, &gby, Grouping::GtoAll)?;
    let v = sd.get_element::<f64>(0).unwrap_or(f64::NAN);
    assert!((v - (32.0f64 / 7.0).sqrt()).abs() < 1e-9, "sd = {v}");
    Ok(())
}

#[test]
fn grouping_to_one_repeats_values() -> anyhow::Result<()> {
    let col = Column::from_options(&[Some(5i32), None, Some(2)]);
    let gby = Groupby::from_offsets(vec![0, 3, 5, 6])?;
    let sum = reduce(ReduceOp::Sum, &col, &gby, Grouping::GtoOne)?;
    assert_eq!(sum.to_vec::<i64>(), vec![Some(15), Some(0), Some(2)]);
    let count = reduce(ReduceOp::Count, &col, &gby, Grouping::GtoOne)?;
    assert_eq!(count.to_vec::<i64>(), vec![Some(3), Some(0), Some(1)]);

    let mismatched = reduce(ReduceOp::Sum, &Column::from_slice(&[1i32]), &gby, Grouping::GtoOne);
    assert_eq!(error_kind(&mismatched.unwrap_err()), Some(ErrorKind::Value));
    Ok(())
}

#[test]
fn string_reductions() -> anyhow::Result<()> {
    let col = Column::from_strs(&[Some("a"), None, Some("c")]);
    let gby = Groupby::single_group(3);
    let first = reduce(ReduceOp::First, &col, &gby, Grouping::GtoAll)?;
    assert_eq!(first.to_vec::<String>(), vec![Some("a".to_string())]);
    let count = reduce(ReduceOp::Count, &col, &gby, Grouping::GtoAll)?;
    assert_eq!(count.to_vec::<i64>(), vec![Some(2)]);

    let err = reduce(ReduceOp::Sum, &col, &gby, Grouping::GtoAll).unwrap_err();
    assert_eq!(error_kind(&err), Some(ErrorKind::Type));
    Ok(())
}

#[test]
fn nullary_counts() -> anyhow::Result<()> {
    let gby = Groupby::from_offsets(vec![0, 4, 4, 9])?;
    assert_eq!(count_rows(&gby).to_vec::<i64>(), vec![Some(4), Some(0), Some(5)]);
    assert_eq!(countna_rows(&gby).to_vec::<i64>(), vec![Some(0); 3]);
    Ok(())
}

#[test]
fn parallel_reduction_matches_lazy() -> anyhow::Result<()> {
    let pool = ThreadPool::new(4);
    let col = random_int_column(3000, 11, 5);
    let (order, gby) = group(&[col.clone()], &[SortFlags::default()])?;
    let sorted = col.apply_rowindex(&order);
    for op in [ReduceOp::Sum, ReduceOp::Max, ReduceOp::Mean, ReduceOp::Count] {
        let lazy = reduce(op, &sorted, &gby, Grouping::GtoAll)?;
        let par = reduce_par(&pool, op, &sorted, &gby)?;
        assert!(!par.is_virtual());
        assert_eq!(par.to_values(), lazy.to_values(), "{op}");
    }
    Ok(())
}

#[test]
fn na_keys_sort_first() -> anyhow::Result<()> {
    let col = Column::from_options(&[Some(3i32), None, Some(1), Some(2), None]);
    let asc = sort(&[col.clone()], &[SortFlags::default()])?;
    let desc = sort(&[col.clone()], &[SortFlags::descending()])?;
    assert_eq!(col.apply_rowindex(&asc).to_vec::<i32>(), vec![None, None, Some(1), Some(2), Some(3)]);
    assert_eq!(col.apply_rowindex(&desc).to_vec::<i32>(), vec![None, None, Some(3), Some(2), Some(1)]);
    Ok(())
}

#[test]
fn multi_key_grouping() -> anyhow::Result<()> {
    let a = Column::from_slice(&[1i32, 0, 1, 0, 1]);
    let b = Column::from_strs(&[Some("x"), Some("y"), Some("x"), Some("x"), Some("z")]);
    let (order, gby) = group(&[a.clone(), b.clone()], &[SortFlags::default(); 2])?;
    assert_eq!(gby.offsets(), &[0, 1, 2, 4, 5]);
    let keys: Vec<(Option<i32>, Option<String>)> = gby
        .iter()
        .map(|(i0, _)| {
            let r = order.nth(i0).unwrap_or(0);
            (a.get_element(r), b.get_element(r))
        })
        .collect();
    assert_eq!(
        keys,
        vec![
            (Some(0), Some("x".into())),
            (Some(0), Some("y".into())),
            (Some(1), Some("x".into())),
            (Some(1), Some("z".into())),
        ]
    );
    Ok(())
}

#[test]
fn sort_only_columns_order_within_groups() -> anyhow::Result<()> {
    let key = Column::from_slice(&[2i32, 1, 2, 1]);
    let tiebreak = Column::from_slice(&[5i32, 9, 3, 7]);
    let flags = [
        SortFlags::default(),
        SortFlags {
            descending: false,
            sort_only: true,
        },
    ];
    let (order, gby) = group(&[key.clone(), tiebreak.clone()], &flags)?;
    assert_eq!(gby.offsets(), &[0, 2, 4]);
    assert_eq!(key.apply_rowindex(&order).to_vec::<i32>(), vec![Some(1), Some(1), Some(2), Some(2)]);
    assert_eq!(
        tiebreak.apply_rowindex(&order).to_vec::<i32>(),
        vec![Some(7), Some(9), Some(3), Some(5)]
    );

    let (_, gby) = group(&[tiebreak], &flags[1..])?;
    assert_eq!(gby.offsets(), &[0, 4]);
    Ok(())
}

#[test]
fn zero_rows_form_one_empty_group() -> anyhow::Result<()> {
    let empty = Column::from_slice::<i32>(&[]);
    let (order, gby) = group(&[empty.clone()], &[SortFlags::default()])?;
    assert_eq!(order.size(), 0);
    assert_eq!(gby.offsets(), &[0, 0]);
    assert_eq!(gby.size(), 1);

    let sums = reduce(ReduceOp::Sum, &empty, &gby, Grouping::GtoAll)?;
    assert_eq!(sums.to_vec::<i64>(), vec![Some(0)]);
    Ok(())
}

#[test]
fn zero_keys_form_one_group() -> anyhow::Result<()> {
    let (order, gby) = group_rows(5, &[], &[])?;
    assert!(order.is_identity());
    assert_eq!(order.size(), 5);
    assert_eq!(gby, Groupby::single_group(5));

    let (order, gby) = group(&[], &[])?;
    assert_eq!(order.size(), 0);
    assert_eq!(gby.offsets(), &[0, 0]);

    let err = group_rows(3, &[Column::from_slice(&[1i32, 2])], &[]).unwrap_err();
    assert_eq!(error_kind(&err), Some(ErrorKind::Value));
    assert!(sort(&[], &[]).is_err());
    Ok(())
}

#[test]
fn integer_overflow_gives_na() -> anyhow::Result<()> {
    let col = Column::from_slice(&[i64::MAX, 1, 1 << 62, 2, 3, 4]);
    let gby = Groupby::from_offsets(vec![0, 2, 4, 6])?;
    let sums = reduce(ReduceOp::Sum, &col, &gby, Grouping::GtoAll)?;
    assert_eq!(sums.to_vec::<i64>(), vec![None, Some((1 << 62) + 2), Some(7)]);
    let prods = reduce(ReduceOp::Prod, &col, &gby, Grouping::GtoAll)?;
    assert_eq!(prods.to_vec::<i64>(), vec![Some(i64::MAX), None, Some(12)]);

    let per_group = Column::from_slice(&[i64::MAX, 3]);
    let gby = Groupby::from_offsets(vec![0, 2, 4])?;
    let sums = reduce(ReduceOp::Sum, &per_group, &gby, Grouping::GtoOne)?;
    assert_eq!(sums.to_vec::<i64>(), vec![None, Some(6)]);
    Ok(())
}
