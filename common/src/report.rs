//! 検査レポート（HTML）生成
//!
//! 入力はAI生成テキストを含むため、自由記述フィールドはすべて
//! 文字数制限のうえHTMLエスケープする。数値はレンジにクランプし、
//! 上限を超えたレコード・欠陥は切り捨てる（エラーにはしない）。

use crate::error::{Error, Result};
use crate::parser::truncate_chars;
use crate::types::{clamp_confidence, Inspection, InspectionStatus, ReportType, Severity};
use chrono::{DateTime, Local};
use std::fmt::Write;

/// 1レポートあたりの最大検査件数
pub const MAX_INSPECTIONS: usize = 100;
/// 1検査あたりの最大欠陥件数
pub const MAX_DEFECTS_PER_INSPECTION: usize = 50;
pub const MAX_TITLE_LEN: usize = 200;
const MAX_FIELD_LEN: usize = 50;
const MAX_TYPE_LEN: usize = 100;
const MAX_LOCATION_LEN: usize = 200;
const MAX_DEFECTS_FOUND: usize = 1000;

/// HTMLエスケープ
pub fn escape_html(unsafe_text: &str) -> String {
    let mut escaped = String::with_capacity(unsafe_text.len());
    for c in unsafe_text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#039;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// 切り詰め→エスケープ。空なら既定値
fn safe_text(value: &str, max_chars: usize, fallback: &str) -> String {
    let escaped = escape_html(&truncate_chars(value, max_chars));
    if escaped.is_empty() {
        fallback.to_string()
    } else {
        escaped
    }
}

/// 出力用に無害化したレコード
struct SafeInspection {
    id: String,
    product_id: String,
    line: String,
    status: InspectionStatus,
    defects_found: usize,
    confidence: f64,
    defects: Vec<SafeDefect>,
}

struct SafeDefect {
    defect_type: String,
    severity: Severity,
    location: String,
    confidence: f64,
}

fn sanitize(inspection: &Inspection) -> SafeInspection {
    SafeInspection {
        id: safe_text(&inspection.id, MAX_FIELD_LEN, "Unknown"),
        product_id: safe_text(&inspection.product_id, MAX_FIELD_LEN, "Unknown"),
        line: safe_text(&inspection.line, MAX_FIELD_LEN, "Unknown"),
        status: inspection.status,
        defects_found: inspection.defects_found.min(MAX_DEFECTS_FOUND),
        confidence: clamp_confidence(inspection.confidence),
        defects: inspection
            .defects
            .iter()
            .take(MAX_DEFECTS_PER_INSPECTION)
            .map(|d| SafeDefect {
                defect_type: safe_text(&d.defect_type, MAX_TYPE_LEN, "Unknown"),
                severity: d.severity,
                location: safe_text(&d.location, MAX_LOCATION_LEN, "Unknown"),
                confidence: clamp_confidence(d.confidence),
            })
            .collect(),
    }
}

/// レコード件数から既定のレポート種別を選ぶ（1件ならsingle）
pub fn default_report_type(count: usize) -> ReportType {
    if count == 1 {
        ReportType::Single
    } else {
        ReportType::Daily
    }
}

/// 検査レコード列からHTMLレポートを生成
///
/// # Arguments
/// * `inspections` - 検査レコード（先頭 MAX_INSPECTIONS 件のみ使用）
/// * `report_type` - レポート種別（タイトル既定値に影響）
/// * `title` - 任意のタイトル
/// * `generated_at` - 生成日時（レポートIDにも使用）
///
/// # Returns
/// 完全なHTML文書。レコードが空なら `Error::EmptyReport`
pub fn render_report(
    inspections: &[Inspection],
    report_type: ReportType,
    title: Option<&str>,
    generated_at: DateTime<Local>,
) -> Result<String> {
    if inspections.is_empty() {
        return Err(Error::EmptyReport);
    }

    let records: Vec<SafeInspection> = inspections
        .iter()
        .take(MAX_INSPECTIONS)
        .map(sanitize)
        .collect();

    let total = records.len();
    let pass_count = records.iter().filter(|i| i.status == InspectionStatus::Pass).count();
    let critical_count = records.iter().filter(|i| i.status == InspectionStatus::Critical).count();
    let total_defects: usize = records.iter().map(|i| i.defects_found).sum();
    let pass_rate = format!("{:.1}", pass_count as f64 / total as f64 * 100.0);

    let report_title = match title.map(|t| safe_text(t, MAX_TITLE_LEN, "")) {
        Some(t) if !t.is_empty() => t,
        _ => match report_type {
            ReportType::Single => format!("Inspection Report - {}", records[0].id),
            ReportType::Daily => "Daily Quality Control Report".to_string(),
            ReportType::Batch => "Batch Inspection Report".to_string(),
        },
    };

    let date = generated_at.format("%B %-d, %Y, %I:%M %p");
    let report_id = format!("RPT-{}", generated_at.timestamp_millis());

    let mut rows = String::new();
    for inspection in &records {
        render_row(&mut rows, inspection);
    }

    Ok(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>{report_title}</title>
  <style>
    @media print {{
      body {{ -webkit-print-color-adjust: exact; print-color-adjust: exact; }}
    }}
  </style>
</head>
<body style="font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; margin: 0; padding: 40px; background-color: #f1f5f9; color: #1e293b;">
  <div style="max-width: 900px; margin: 0 auto; background: white; border-radius: 12px; overflow: hidden;">
    <div style="background: linear-gradient(135deg, #1e40af, #7c3aed); padding: 32px; color: white;">
      <h1 style="margin: 0 0 8px 0; font-size: 28px;">{report_title}</h1>
      <p style="margin: 0; opacity: 0.9;">Generated: {date}</p>
    </div>
    <div style="display: grid; grid-template-columns: repeat(4, 1fr); gap: 16px; padding: 24px;">
      {total_card}
      {pass_card}
      {defect_card}
      {critical_card}
    </div>
    <div style="padding: 0 24px 24px;">
      <h2 style="margin: 0 0 16px 0; font-size: 18px;">Inspection Details</h2>
      <table style="width: 100%; border-collapse: collapse; font-size: 14px;">
        <thead>
          <tr style="background-color: #f1f5f9;">
            <th style="padding: 12px; text-align: left;">ID</th>
            <th style="padding: 12px; text-align: left;">Product</th>
            <th style="padding: 12px; text-align: left;">Line</th>
            <th style="padding: 12px; text-align: left;">Status</th>
            <th style="padding: 12px; text-align: center;">Defects</th>
            <th style="padding: 12px; text-align: right;">Confidence</th>
          </tr>
        </thead>
        <tbody>
{rows}        </tbody>
      </table>
    </div>
    <div style="background: #f8fafc; padding: 16px 24px; border-top: 1px solid #e2e8f0;">
      <p style="margin: 0; font-size: 12px; color: #64748b; text-align: center;">
        DefectVision AI Quality Control System • Report ID: {report_id}
      </p>
    </div>
  </div>
</body>
</html>
"#,
        total_card = summary_card(&total.to_string(), "Total Inspections", "#f8fafc", "#1e40af"),
        pass_card = summary_card(&format!("{}%", pass_rate), "Pass Rate", "#dcfce7", "#166534"),
        defect_card = summary_card(&total_defects.to_string(), "Total Defects", "#fef9c3", "#854d0e"),
        critical_card = summary_card(&critical_count.to_string(), "Critical Issues", "#fee2e2", "#991b1b"),
    ))
}

fn summary_card(value: &str, label: &str, background: &str, color: &str) -> String {
    format!(
        r#"<div style="background: {background}; border-radius: 8px; padding: 16px; text-align: center;">
        <p style="margin: 0; font-size: 32px; font-weight: 700; color: {color};">{value}</p>
        <p style="margin: 4px 0 0 0; font-size: 12px; color: {color}; text-transform: uppercase;">{label}</p>
      </div>"#
    )
}

fn status_colors(status: InspectionStatus) -> (&'static str, &'static str) {
    match status {
        InspectionStatus::Pass => ("#dcfce7", "#166534"),
        InspectionStatus::Warning => ("#fef9c3", "#854d0e"),
        InspectionStatus::Critical => ("#fee2e2", "#991b1b"),
    }
}

fn severity_colors(severity: Severity) -> (&'static str, &'static str) {
    match severity {
        Severity::Critical => ("#fee2e2", "#991b1b"),
        Severity::High => ("#ffedd5", "#9a3412"),
        Severity::Medium => ("#fef9c3", "#854d0e"),
        Severity::Low => ("#f0fdf4", "#166534"),
    }
}

fn render_row(out: &mut String, inspection: &SafeInspection) {
    let (status_bg, status_fg) = status_colors(inspection.status);
    let defect_color = if inspection.defects_found > 0 { "#dc2626" } else { "#6b7280" };

    // String への write! は失敗しない
    let _ = write!(
        out,
        r#"          <tr>
            <td style="padding: 12px; font-family: monospace;">{id}</td>
            <td style="padding: 12px;">{product}</td>
            <td style="padding: 12px;">{line}</td>
            <td style="padding: 12px;"><span style="padding: 4px 12px; border-radius: 9999px; font-size: 12px; text-transform: uppercase; background-color: {status_bg}; color: {status_fg};">{status}</span></td>
            <td style="padding: 12px; text-align: center; color: {defect_color};">{defects_found}</td>
            <td style="padding: 12px; text-align: right; font-family: monospace;">{confidence:.1}%</td>
          </tr>
"#,
        id = inspection.id,
        product = inspection.product_id,
        line = inspection.line,
        status = inspection.status,
        defects_found = inspection.defects_found,
        confidence = inspection.confidence,
    );

    if inspection.defects.is_empty() {
        return;
    }

    out.push_str(
        "          <tr>\n            <td colspan=\"6\" style=\"padding: 12px 24px; background-color: #f8fafc;\">\n              <p style=\"font-size: 12px; color: #64748b;\">Detected Defects:</p>\n",
    );
    for defect in &inspection.defects {
        let (bg, fg) = severity_colors(defect.severity);
        let _ = write!(
            out,
            r#"              <div style="display: inline-block; margin: 0 12px 8px 0; padding: 8px 12px; background: white; border-radius: 6px; border: 1px solid #e2e8f0;">
                <strong>{defect_type}</strong>
                <span style="margin-left: 8px; padding: 2px 6px; border-radius: 4px; font-size: 10px; text-transform: uppercase; background-color: {bg}; color: {fg};">{severity}</span>
                <br><small style="color: #64748b;">{location} • {confidence:.1}% confidence</small>
              </div>
"#,
            defect_type = defect.defect_type,
            severity = defect.severity,
            location = defect.location,
            confidence = defect.confidence,
        );
    }
    out.push_str("            </td>\n          </tr>\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Defect;
    use chrono::TimeZone;

    fn generated_at() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 3, 14, 9, 30, 0).unwrap()
    }

    fn record(id: &str, status: InspectionStatus, defects: Vec<Defect>) -> Inspection {
        Inspection {
            id: id.to_string(),
            product_id: "CMP-4321".to_string(),
            line: "Line B".to_string(),
            timestamp: "09:29:59 AM".to_string(),
            status,
            defects_found: defects.len(),
            confidence: 87.25,
            defects,
        }
    }

    fn defect(location: &str) -> Defect {
        Defect {
            defect_type: "Crack".to_string(),
            severity: Severity::High,
            location: location.to_string(),
            confidence: 77.0,
        }
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#039;Jerry&#039;&lt;/a&gt;"
        );
    }

    #[test]
    fn test_location_markup_is_escaped() {
        let records = vec![record(
            "INS-1",
            InspectionStatus::Warning,
            vec![defect("<script>alert(1)</script>")],
        )];

        let html = render_report(&records, ReportType::Single, None, generated_at()).unwrap();
        assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn test_empty_report_is_error() {
        let result = render_report(&[], ReportType::Daily, None, generated_at());
        assert!(matches!(result, Err(Error::EmptyReport)));
    }

    #[test]
    fn test_default_titles() {
        let records = vec![record("INS-42", InspectionStatus::Pass, vec![])];

        let single = render_report(&records, ReportType::Single, None, generated_at()).unwrap();
        assert!(single.contains("<title>Inspection Report - INS-42</title>"));

        let daily = render_report(&records, ReportType::Daily, None, generated_at()).unwrap();
        assert!(daily.contains("<title>Daily Quality Control Report</title>"));

        let batch = render_report(&records, ReportType::Batch, None, generated_at()).unwrap();
        assert!(batch.contains("<title>Batch Inspection Report</title>"));
    }

    #[test]
    fn test_custom_title_escaped() {
        let records = vec![record("INS-1", InspectionStatus::Pass, vec![])];
        let html =
            render_report(&records, ReportType::Daily, Some("Shift <B>"), generated_at()).unwrap();
        assert!(html.contains("<title>Shift &lt;B&gt;</title>"));
    }

    #[test]
    fn test_inspection_cap() {
        let records: Vec<_> = (0..120)
            .map(|i| record(&format!("INS-{:03}", i), InspectionStatus::Pass, vec![]))
            .collect();

        let html = render_report(&records, ReportType::Batch, None, generated_at()).unwrap();
        assert!(html.contains("INS-099"));
        assert!(!html.contains("INS-100"));
        assert!(html.contains(">100</p>"));
    }

    #[test]
    fn test_defect_cap() {
        let defects: Vec<_> = (0..60).map(|i| defect(&format!("spot-{}-end", i))).collect();
        let records = vec![record("INS-1", InspectionStatus::Critical, defects)];

        let html = render_report(&records, ReportType::Single, None, generated_at()).unwrap();
        assert!(html.contains("spot-49-end"));
        assert!(!html.contains("spot-50-end"));
    }

    #[test]
    fn test_confidence_clamped() {
        let mut inspection = record("INS-1", InspectionStatus::Pass, vec![]);
        inspection.confidence = 250.0;

        let html = render_report(&[inspection], ReportType::Single, None, generated_at()).unwrap();
        assert!(html.contains("100.0%</td>"));
    }

    #[test]
    fn test_summary_counts_verdicts() {
        let records = vec![
            record("INS-1", InspectionStatus::Pass, vec![]),
            record("INS-2", InspectionStatus::Critical, vec![defect("base")]),
            record("INS-3", InspectionStatus::Warning, vec![]),
            record("INS-4", InspectionStatus::Pass, vec![]),
        ];

        let html = render_report(&records, ReportType::Daily, None, generated_at()).unwrap();
        assert!(html.contains(">50.0%</p>"));
        assert!(html.contains("Detected Defects:"));
    }

    #[test]
    fn test_report_id_and_date() {
        let records = vec![record("INS-1", InspectionStatus::Pass, vec![])];
        let at = generated_at();

        let html = render_report(&records, ReportType::Single, None, at).unwrap();
        assert!(html.contains(&format!("RPT-{}", at.timestamp_millis())));
        assert!(html.contains("Generated: March 14, 2025, 09:30 AM"));
    }

    #[test]
    fn test_default_report_type() {
        assert_eq!(default_report_type(1), ReportType::Single);
        assert_eq!(default_report_type(5), ReportType::Daily);
    }
}
