use ironframe::error::{ErrorKind, error_kind};
use ironframe::options::Options;
use ironframe::utils::{hardware_concurrency, resolve_nthreads};
use ironframe::{Config, CsvConfig, Session, ThreadPool};
use serde_json::json;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

#[test]
fn nthreads_option_resizes_the_pool() -> anyhow::Result<()> {
    let session = Session::new(Config {
        nthreads: 2,
        ..Config::default()
    });
    assert_eq!(session.pool().size(), 2);
    let opts = session.options();
    assert_eq!(opts.get("nthreads")?, json!(2));

    opts.set("nthreads", &json!(5))?;
    assert_eq!(session.pool().size(), 5);

    opts.set("nthreads", &json!(0))?;
    assert_eq!(session.pool().size(), hardware_concurrency());

    opts.set("nthreads", &json!(-1))?;
    assert_eq!(session.pool().size(), resolve_nthreads(-1));
    assert!(session.pool().size() >= 1);

    opts.set("nthreads", &json!(-100_000))?;
    assert_eq!(session.pool().size(), 1);
    Ok(())
}

#[test]
fn option_errors() {
    let opts = Options::with_pool(Arc::new(ThreadPool::new(1)));
    let err = opts.set("nthreads", &json!("four")).unwrap_err();
    assert_eq!(error_kind(&err), Some(ErrorKind::Value));
    let err = opts.set("nthreads", &json!(2.5)).unwrap_err();
    assert_eq!(error_kind(&err), Some(ErrorKind::Value));

    let err = opts.get("no.such.option").unwrap_err();
    assert_eq!(error_kind(&err), Some(ErrorKind::Value));
    assert!(opts.set("no.such.option", &json!(1)).is_err());
    assert!(opts.describe("nthreads").is_ok());
}

#[test]
fn custom_options_round_trip() -> anyhow::Result<()> {
    let opts = Options::new();
    let store = Arc::new(AtomicI64::new(10));
    let (getter, setter) = (Arc::clone(&store), Arc::clone(&store));
    opts.register(
        "display.max_rows",
        "Rows shown when printing",
        Arc::new(move || json!(getter.load(Ordering::SeqCst))),
        Arc::new(move |v: &serde_json::Value| {
            let n = v.as_i64().ok_or_else(|| anyhow::anyhow!("not an integer"))?;
            setter.store(n, Ordering::SeqCst);
            Ok(())
        }),
    );
    opts.set("display.max_rows", &json!(42))?;
    assert_eq!(store.load(Ordering::SeqCst), 42);
    assert_eq!(opts.get("display.max_rows")?, json!(42));
    assert_eq!(opts.names(), vec!["display.max_rows".to_string()]);
    assert_eq!(opts.describe("display.max_rows")?, "Rows shown when printing");
    Ok(())
}

#[cfg(feature = "io-csv")]
#[test]
fn config_from_json_file() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("ironframe.json");
    std::fs::write(
        &path,
        r#"{ "nthreads": 3, "csv": { "quote": "'", "header": false, "max_nrows": 10 } }"#,
    )?;
    let cfg = Config::from_json_file(&path)?;
    assert_eq!(cfg.nthreads, 3);
    assert_eq!(
        cfg.csv,
        CsvConfig {
            quote: '\'',
            header: false,
            max_nrows: Some(10),
            ..CsvConfig::default()
        }
    );

    let session = Session::new(cfg);
    assert_eq!(session.pool().size(), 3);
    let params = session.csv_params()?;
    assert_eq!(params.quote, b'\'');
    assert!(!params.header);
    assert_eq!(params.max_nrows, Some(10));
    Ok(())
}

#[test]
fn config_errors() {
    let err = Config::from_json_str(r#"{ "nthreads": "many" }"#).unwrap_err();
    assert_eq!(error_kind(&err), Some(ErrorKind::Value));
    let err = Config::from_json_file("/nonexistent/ironframe.json").unwrap_err();
    assert_eq!(error_kind(&err), Some(ErrorKind::Io));
}

#[cfg(feature = "io-csv")]
#[test]
fn non_ascii_separator_is_rejected() -> anyhow::Result<()> {
    let session = Session::new(Config::from_json_str(r#"{ "csv": { "sep": "é" } }"#)?);
    let err = session.csv_params().unwrap_err();
    assert_eq!(error_kind(&err), Some(ErrorKind::Value));
    assert!(session.director().is_err());
    Ok(())
}

#[test]
fn sessions_are_independent() -> anyhow::Result<()> {
    let a = Session::new(Config {
        nthreads: 1,
        ..Config::default()
    });
    let b = Session::new(Config {
        nthreads: 3,
        ..Config::default()
    });
    a.options().set("nthreads", &json!(2))?;
    assert_eq!(a.pool().size(), 2);
    assert_eq!(b.pool().size(), 3);
    let shared = b.shared_pool();
    assert_eq!(shared.size(), 3);
    Ok(())
}
