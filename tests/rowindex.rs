use ironframe::testing::{assert_columns_equal, random_int_column};
use ironframe::{Column, RowIndex, SType};

fn selections() -> anyhow::Result<Vec<RowIndex>> {
    Ok(vec![
        RowIndex::identity(20),
        RowIndex::slice(2, 15, 1)?,
        RowIndex::slice(14, 8, -2)?,
        RowIndex::slice(3, 6, 0)?,
        RowIndex::from_indices(vec![5, -1, 0, 7, 7, 1]),
        RowIndex::from_indices64(vec![4, 3, 2, 1, 0]),
    ])
}

#[test]
fn product_matches_sequential_application() -> anyhow::Result<()> {
    let col = random_int_column(40, 5, 11);
    let base = RowIndex::slice(10, 20, 1)?;
    let picks = selections()?;
    for b in &picks {
        for c in &picks {
            if b.check_bounds(base.size()).is_err() {
                continue;
            }
            let c = &RowIndex::from_indices(
                c.to_indices()
                    .into_iter()
                    .map(|i| if i >= b.size() as i64 { -1 } else { i })
                    .collect(),
            );
            let stepwise = col.apply_rowindex(&base).apply_rowindex(b).apply_rowindex(c);
            let composed = col.apply_rowindex(&(&(&base * b) * c));
            assert_columns_equal(&composed, &stepwise);

            let left = &(&base * b) * c;
            let right = &base * &(b * c);
            assert_eq!(left.to_indices(), right.to_indices());
        }
    }
    Ok(())
}

#[test]
fn slice_products_stay_slices() -> anyhow::Result<()> {
    let a = RowIndex::slice(5, 10, 2)?;
    let b = RowIndex::slice(9, 4, -3)?;
    let ab = &a * &b;
    assert!(ab.is_slice());
    assert_eq!(ab.to_indices(), vec![23, 17, 11, 5]);
    Ok(())
}

#[test]
fn negative_slice_below_zero_is_rejected() {
    assert!(RowIndex::slice(2, 4, -1).is_err());
    assert!(RowIndex::slice(3, 4, -1).is_ok());
}

#[test]
fn missing_entries_produce_na() -> anyhow::Result<()> {
    let col = Column::from_slice(&[10i64, 20, 30]);
    let picked = col.apply_rowindex(&RowIndex::from_indices(vec![2, -1, 0]));
    assert_eq!(picked.to_vec::<i64>(), vec![Some(30), None, Some(10)]);

    let all_na = col.apply_rowindex(&RowIndex::from_indices(vec![-1, -1]));
    assert_eq!(all_na.stype(), SType::Int64);
    assert_eq!(all_na.to_vec::<i64>(), vec![None, None]);
    Ok(())
}

#[test]
fn bounds_are_checked() -> anyhow::Result<()> {
    let col = Column::from_slice(&[1i32, 2, 3]);
    assert!(col.try_apply_rowindex(&RowIndex::from_indices(vec![0, 3])).is_err());
    assert!(col.try_apply_rowindex(&RowIndex::slice(1, 3, 1)?).is_err());
    assert!(col.try_apply_rowindex(&RowIndex::slice(2, 3, -1)?).is_ok());
    Ok(())
}

#[test]
fn filter_selects_true_rows() -> anyhow::Result<()> {
    let mask = Column::from_options(&[Some(true), None, Some(false), Some(true)]);
    let ri = RowIndex::from_filter(&mask)?;
    assert_eq!(ri.to_indices(), vec![0, 3]);
    assert!(RowIndex::from_filter(&Column::from_slice(&[1i32])).is_err());
    Ok(())
}
