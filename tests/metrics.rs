use ocr_bench::config::EngineVariant;
use ocr_bench::ground_truth::{Annotation, reconstruct};
use ocr_bench::metrics::{ScoreRecord, aggregate, score};
use ocr_bench::normalize::normalize;

fn record(gt_len: usize, edit_distance: usize) -> ScoreRecord {
    ScoreRecord {
        document: String::new(),
        gt_len,
        pred_len: gt_len,
        edit_distance,
        cer: edit_distance as f64 / gt_len as f64,
        accuracy: 0.0,
    }
}

#[test]
fn empty_ground_truth_boundaries() {
    let both_empty = score("", "");
    assert_eq!(
        (both_empty.edit_distance, both_empty.cer, both_empty.accuracy),
        (0, 0.0, 100.0)
    );

    let only_pred = score("", "abc");
    assert_eq!(
        (only_pred.edit_distance, only_pred.cer, only_pred.accuracy),
        (3, 1.0, 0.0)
    );
    assert_eq!(only_pred.pred_len, 3);
}

#[test]
fn accuracy_is_clamped_at_zero() {
    let r = score("ab", "xyzxyz");
    assert_eq!(r.edit_distance, 6);
    assert_eq!(r.cer, 3.0);
    assert_eq!(r.accuracy, 0.0);
}

#[test]
fn counts_code_points_not_bytes() {
    let r = score("허가증", "허가중");
    assert_eq!(r.gt_len, 3);
    assert_eq!(r.edit_distance, 1);
    assert!((r.cer - 1.0 / 3.0).abs() < 1e-12);
}

#[test]
fn corpus_cer_is_length_weighted() {
    let report = aggregate(vec![record(10, 2), record(20, 2)]);
    assert_eq!(report.total_documents, 2);
    assert_eq!(report.total_gt_len, 30);
    assert_eq!(report.total_edit_distance, 4);
    assert!((report.cer - 4.0 / 30.0).abs() < 1e-12);
    assert!((report.cer - 0.15).abs() > 0.01, "must not be the mean of per-document CERs");
    assert!((report.accuracy - (1.0 - 4.0 / 30.0) * 100.0).abs() < 1e-9);
}

#[test]
fn all_empty_ground_truth_reports_zero_cer() {
    let report = aggregate(vec![score("", "abc"), score("", "")]);
    assert_eq!(report.cer, 0.0);
    assert_eq!(report.accuracy, 100.0);
    assert_eq!(report.records[0].cer, 1.0);
}

#[test]
fn empty_corpus() {
    let report = aggregate(Vec::new());
    assert_eq!(report.total_documents, 0);
    assert_eq!(report.cer, 0.0);
}

#[test]
fn hello_world_end_to_end() {
    let gt = reconstruct(&[
        Annotation::new("World", [0.0, 20.0, 10.0, 10.0]),
        Annotation::new("Hello", [0.0, 0.0, 10.0, 10.0]),
    ]);
    assert_eq!(gt, "Hello World");

    let pred = normalize("<p>Hello Word</p>", EngineVariant::Markdown);
    assert_eq!(pred, "Hello Word");

    let r = score(&gt, &pred).with_document("page_001");
    assert_eq!(r.document, "page_001");
    assert_eq!(r.edit_distance, 1);
    assert!((r.cer - 1.0 / 11.0).abs() < 1e-12);
    assert_eq!(format!("{:.2}", r.accuracy), "90.91");
}
