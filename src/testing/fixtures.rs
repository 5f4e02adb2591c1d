//! Deterministic test data.

use crate::column::Column;
use crate::frame::Frame;
use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::io::Write;
use tempfile::NamedTempFile;

/// Small pseudo-random generator so fixtures do not depend on `rand`.
#[derive(Clone, Debug)]
pub struct Lcg(u64);

impl Lcg {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self(seed ^ 0x9E37_79B9_7F4A_7C15)
    }

    pub fn next_u64(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        self.0 >> 11
    }

    /// Uniform in `0..n` (`n > 0`).
    pub fn below(&mut self, n: u64) -> u64 {
        self.next_u64() % n
    }
}

/// `Int32` column of `n` values in `0..100`, with every `na_every`-th row NA
/// (`0` for none).
///
/// ```
/// use ironframe::testing::random_int_column;
///
/// let col = random_int_column(10, 3, 7);
/// assert_eq!(col.nrows(), 10);
/// assert!(col.is_na(0) && col.is_na(3));
/// ```
#[must_use]
pub fn random_int_column(n: usize, na_every: usize, seed: u64) -> Column {
    let mut rng = Lcg::new(seed);
    let values: Vec<Option<i32>> = (0..n)
        .map(|i| {
            let v = i32::try_from(rng.below(100)).unwrap_or_default();
            (na_every == 0 || i % na_every != 0).then_some(v)
        })
        .collect();
    Column::from_options(&values)
}

/// Frame with a sorted key column `[1, 1, 2, 2, 2, 3]`, a value column
/// `[10, 20, 30, 40, 50, 60]` and a label column.
#[must_use]
pub fn grouped_frame() -> Frame {
    Frame::from_pairs([
        ("key", Column::from_slice(&[1i32, 1, 2, 2, 2, 3])),
        ("value", Column::from_slice(&[10i32, 20, 30, 40, 50, 60])),
        (
            "label",
            Column::from_strs(&[Some("a"), Some("b"), Some("c"), None, Some("e"), Some("f")]),
        ),
    ])
    .unwrap_or_else(|e| panic!("grouped_frame fixture: {e:#}"))
}

/// CSV text with a header and `nrows` rows of columns
/// `id` (int), `name` (string), `score` (float, blank every 13th row) and
/// `flag` (bool).
#[must_use]
pub fn sample_csv(nrows: usize) -> String {
    let mut out = String::with_capacity(32 * (nrows + 1));
    out.push_str("id,name,score,flag\n");
    for i in 0..nrows {
        let score = if i % 13 == 5 {
            String::new()
        } else {
            format!("{}.5", i % 1000)
        };
        let flag = if i % 3 == 0 { "true" } else { "false" };
        let _ = writeln!(out, "{i},name{},{score},{flag}", i % 7);
    }
    out
}

/// CSV text whose `text` column contains quoted fields with embedded
/// separators and line breaks, so that chunk boundaries guessed from line
/// starts are often wrong.
#[must_use]
pub fn multiline_csv(nrows: usize) -> String {
    let mut out = String::from("id,text\n");
    for i in 0..nrows {
        if i % 4 == 1 {
            let _ = writeln!(out, "{i},\"line one, part {i}\nline two\"");
        } else {
            let _ = writeln!(out, "{i},plain {i}");
        }
    }
    out
}

/// Write `bytes` to a new temporary file, deleted when the handle drops.
///
/// # Errors
/// When the file cannot be created or written.
pub fn temp_file_with(bytes: &[u8]) -> Result<NamedTempFile> {
    let mut f = NamedTempFile::new().context("create temporary file")?;
    f.write_all(bytes).context("write temporary file")?;
    f.flush().context("flush temporary file")?;
    Ok(f)
}
