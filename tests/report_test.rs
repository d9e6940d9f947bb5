//! HTMLレポート出力の統合テスト

use chrono::{Local, TimeZone};
use defect_vision::report::write_report;
use defect_vision_common::{
    default_report_type, render_report, Defect, Inspection, InspectionStatus, ReportType, Severity,
};
use tempfile::tempdir;

fn create_test_inspection(index: usize, location: &str) -> Inspection {
    Inspection {
        id: format!("INS-{}", 1700000000000u64 + index as u64),
        product_id: format!("PRD-{}", 1000 + index),
        line: "Line A".to_string(),
        timestamp: "09:15:00 AM".to_string(),
        status: if index % 2 == 0 { InspectionStatus::Pass } else { InspectionStatus::Critical },
        defects_found: 1,
        confidence: 88.0,
        defects: vec![Defect {
            defect_type: "Crack".to_string(),
            severity: Severity::Critical,
            location: location.to_string(),
            confidence: 93.0,
        }],
    }
}

#[test]
fn test_write_report_to_directory() {
    let dir = tempdir().expect("Failed to create temp dir");
    let generated_at = Local.with_ymd_and_hms(2025, 6, 1, 14, 30, 0).unwrap();
    let inspections: Vec<_> = (0..3).map(|i| create_test_inspection(i, "weld seam")).collect();

    let report_type = default_report_type(inspections.len());
    assert_eq!(report_type, ReportType::Daily);

    let html = render_report(&inspections, report_type, None, generated_at).unwrap();
    let path = write_report(&html, dir.path(), generated_at).expect("レポート出力に失敗");

    assert_eq!(path, dir.path().join("inspection-report-2025-06-01.html"));
    let written = std::fs::read_to_string(&path).expect("ファイル読み込み失敗");
    assert!(written.contains("Daily Quality Control Report"));
    assert!(written.contains("INS-1700000000001"));
}

#[test]
fn test_written_report_escapes_markup() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("nested").join("report.html");
    let generated_at = Local::now();
    let inspections = vec![create_test_inspection(1, "<script>alert(1)</script>")];

    let html = render_report(&inspections, ReportType::Single, None, generated_at).unwrap();
    let path = write_report(&html, &output, generated_at).unwrap();

    assert_eq!(path, output);
    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains("&lt;script&gt;"));
    assert!(!written.contains("<script>alert"));
}
