use ocr_bench::cli::resolve_log_path;
use ocr_bench::config::Config;
use ocr_bench::util::open_append;
use std::io::Write;
use std::path::Path;

#[test]
fn dispatch_and_score_log_to_separate_files() {
    let cfg = Config::default();
    let run_dir = Path::new("out");

    let dispatch = resolve_log_path(&cfg, run_dir, "dispatch").unwrap();
    let score = resolve_log_path(&cfg, run_dir, "score").unwrap();
    assert_ne!(dispatch, score);
    assert_eq!(dispatch, run_dir.join("ocr-bench-dispatch.log"));
    assert_eq!(score, run_dir.join("ocr-bench-score.log"));
}

#[test]
fn file_logging_can_be_disabled_or_redirected() {
    let mut cfg = Config::default();
    cfg.logging.file_path = "logs/bench.log".into();
    assert_eq!(
        resolve_log_path(&cfg, Path::new("out"), "score").unwrap(),
        Path::new("logs/bench.log")
    );

    cfg.logging.write_to_file = false;
    assert!(resolve_log_path(&cfg, Path::new("out"), "score").is_none());
}

#[test]
fn reopening_a_log_keeps_earlier_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("bench.log");

    writeln!(open_append(&path).unwrap(), "WARN slot=1 doc=a document failed").unwrap();
    writeln!(open_append(&path).unwrap(), "INFO scored 3 documents").unwrap();

    let log = std::fs::read_to_string(&path).unwrap();
    assert_eq!(
        log,
        "WARN slot=1 doc=a document failed\nINFO scored 3 documents\n"
    );
}
