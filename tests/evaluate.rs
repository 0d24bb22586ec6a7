use ocr_bench::config::{Config, EngineVariant};
use ocr_bench::evaluate::{Evaluator, SkipReason};
use ocr_bench::ground_truth::Annotation;
use std::path::Path;

const HELLO_WORLD: &str = r#"{"annotations": [
    {"annotation.text": "World", "annotation.bbox": [0, 20, 10, 10]},
    {"annotation.text": "Hello", "annotation.bbox": [0, 0, 10, 10]}
]}"#;

fn write_prediction(pred_dir: &Path, id: &str, file: &str, text: &str) {
    let dir = pred_dir.join(id);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(file), text).unwrap();
}

#[test]
fn missing_ground_truth_is_skipped_not_fatal() {
    let root = tempfile::tempdir().unwrap();
    let pred = root.path().join("pred");
    let gt = root.path().join("gt");
    std::fs::create_dir_all(&gt).unwrap();

    write_prediction(&pred, "a", "result.mmd", "<p>Hello Word</p>");
    write_prediction(&pred, "b", "result.mmd", "whatever");
    write_prediction(&pred, "c", "result.mmd", "# Hello World");
    std::fs::write(gt.join("a.json"), HELLO_WORLD).unwrap();
    std::fs::write(gt.join("c.json"), HELLO_WORLD).unwrap();

    let eval = Evaluator::new(&Config::default()).run(&pred, &gt).unwrap();

    let ids: Vec<&str> = eval.report.records.iter().map(|r| r.document.as_str()).collect();
    assert_eq!(ids, vec!["a", "c"]);
    assert_eq!(eval.report.total_documents, 2);
    assert_eq!(eval.report.total_gt_len, 22);
    assert_eq!(eval.report.total_edit_distance, 1);

    assert_eq!(eval.skipped.len(), 1);
    assert_eq!(eval.skipped[0].document, "b");
    assert_eq!(eval.skipped[0].reason, SkipReason::MissingGroundTruth);
}

#[test]
fn unreadable_inputs_are_classified() {
    let root = tempfile::tempdir().unwrap();
    let pred = root.path().join("pred");
    let gt = root.path().join("gt");
    std::fs::create_dir_all(&gt).unwrap();

    write_prediction(&pred, "bad_json", "result.mmd", "x");
    std::fs::write(gt.join("bad_json.json"), "{not json").unwrap();

    // Directory exists but the artifact was never written (failed inference).
    std::fs::create_dir_all(pred.join("no_artifact")).unwrap();
    std::fs::write(gt.join("no_artifact.json"), HELLO_WORLD).unwrap();

    write_prediction(&pred, "ok", "result.mmd", "Hello World");
    std::fs::write(gt.join("ok.json"), HELLO_WORLD).unwrap();

    // Loose files next to the per-document directories are ignored.
    std::fs::write(pred.join("dispatch_summary.json"), "{}").unwrap();

    let eval = Evaluator::new(&Config::default()).run(&pred, &gt).unwrap();
    assert_eq!(eval.report.total_documents, 1);
    assert_eq!(eval.report.accuracy, 100.0);

    let reasons: Vec<(&str, SkipReason)> = eval
        .skipped
        .iter()
        .map(|s| (s.document.as_str(), s.reason))
        .collect();
    assert_eq!(
        reasons,
        vec![
            ("bad_json", SkipReason::UnreadableGroundTruth),
            ("no_artifact", SkipReason::MissingPrediction),
        ]
    );
}

#[test]
fn prompt_echo_variant_reads_text_artifacts() {
    let root = tempfile::tempdir().unwrap();
    let pred = root.path().join("pred");
    let gt = root.path().join("gt");
    std::fs::create_dir_all(&gt).unwrap();

    write_prediction(&pred, "p1", "ocr_result.txt", "User: OCR: Assistant: Hello World");
    std::fs::write(gt.join("p1.json"), HELLO_WORLD).unwrap();

    let mut cfg = Config::default();
    cfg.engine.variant = EngineVariant::PromptEcho;
    let eval = Evaluator::new(&cfg).run(&pred, &gt).unwrap();
    assert_eq!(eval.report.records[0].edit_distance, 0);
}

#[test]
fn missing_base_directories_are_fatal() {
    let root = tempfile::tempdir().unwrap();
    let eval = Evaluator::new(&Config::default());
    assert!(eval.run(&root.path().join("nope"), root.path()).is_err());
    assert!(eval.run(root.path(), &root.path().join("nope")).is_err());
}

#[test]
fn unicode_normalization_is_opt_in() {
    // Decomposed Hangul jamo in the label, precomposed syllables in the prediction.
    let anns = vec![Annotation::new("\u{1112}\u{1161}", [0.0, 0.0, 1.0, 1.0])];

    let plain = Evaluator::new(&Config::default()).score_texts(&anns, "하");
    assert_eq!(plain.edit_distance, 2);

    let mut cfg = Config::default();
    cfg.scoring.normalize_unicode = true;
    let folded = Evaluator::new(&cfg).score_texts(&anns, "하");
    assert_eq!(folded.edit_distance, 0);
}
