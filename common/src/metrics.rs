//! 集計ロジック（ダッシュボード指標）
//!
//! 検査レコード列から合格率・欠陥数・重大件数と欠陥種別分布を算出する。
//! 合格率には「軽微な欠陥のみのwarningは合格扱い」という方針を含む。

use crate::types::{Inspection, InspectionStatus, Severity};
use serde::Serialize;

/// 未登録の欠陥種別に使う色
pub const DEFAULT_DEFECT_COLOR: &str = "hsl(220, 70%, 50%)";

/// 欠陥種別 → チャート色
const DEFECT_COLORS: &[(&str, &str)] = &[
    // 表面欠陥
    ("Surface Scratch", "hsl(38, 92%, 50%)"),
    ("Surface Defect", "hsl(38, 92%, 50%)"),
    ("Scratch", "hsl(38, 92%, 50%)"),
    ("Dent", "hsl(35, 85%, 45%)"),
    ("Pitting", "hsl(32, 80%, 48%)"),
    ("Abrasion", "hsl(40, 88%, 52%)"),
    // 構造欠陥
    ("Structural Defect", "hsl(0, 72%, 51%)"),
    ("Crack", "hsl(0, 72%, 51%)"),
    ("Fracture", "hsl(5, 75%, 48%)"),
    ("Deformation", "hsl(10, 70%, 50%)"),
    ("Warping", "hsl(15, 68%, 52%)"),
    // 寸法
    ("Dimensional Issue", "hsl(185, 85%, 50%)"),
    ("Dimensional Problem", "hsl(185, 85%, 50%)"),
    ("Misalignment", "hsl(190, 80%, 48%)"),
    ("Size Irregularity", "hsl(180, 75%, 45%)"),
    // 色・塗装
    ("Color Variation", "hsl(280, 70%, 55%)"),
    ("Coating Issue", "hsl(285, 65%, 52%)"),
    ("Discoloration", "hsl(275, 72%, 50%)"),
    ("Stain", "hsl(270, 68%, 48%)"),
    // 異物
    ("Contamination", "hsl(120, 60%, 40%)"),
    ("Foreign Particle", "hsl(125, 55%, 42%)"),
    ("Debris", "hsl(115, 58%, 38%)"),
    // 組立
    ("Assembly Defect", "hsl(200, 70%, 50%)"),
    ("Missing Part", "hsl(205, 65%, 48%)"),
    ("Improper Assembly", "hsl(195, 72%, 52%)"),
    // エッジ
    ("Edge Irregularity", "hsl(45, 85%, 50%)"),
    ("Edge Defect", "hsl(48, 82%, 48%)"),
];

/// ダッシュボード指標
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub total_inspections: usize,
    /// レコードが無いときは None（0%ではない）
    pub pass_rate: Option<f64>,
    pub total_defects: usize,
    pub critical_issues: usize,
}

/// 欠陥種別分布の1要素
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionEntry {
    pub name: String,
    pub value: usize,
    pub color: &'static str,
}

/// 合格扱いか
///
/// pass、または全欠陥が low/medium の warning。
pub fn is_pass_equivalent(inspection: &Inspection) -> bool {
    match inspection.status {
        InspectionStatus::Pass => true,
        InspectionStatus::Warning => inspection.defects.iter().all(|d| d.severity.is_minor()),
        InspectionStatus::Critical => false,
    }
}

/// 重大扱いか（判定がcritical、またはcritical欠陥を1件以上含む）
pub fn is_critical(inspection: &Inspection) -> bool {
    inspection.status == InspectionStatus::Critical
        || inspection
            .defects
            .iter()
            .any(|d| d.severity == Severity::Critical)
}

pub fn compute_metrics(inspections: &[Inspection]) -> Metrics {
    let total = inspections.len();
    let pass_count = inspections.iter().filter(|i| is_pass_equivalent(i)).count();

    Metrics {
        total_inspections: total,
        pass_rate: if total > 0 {
            Some(pass_count as f64 / total as f64 * 100.0)
        } else {
            None
        },
        total_defects: inspections.iter().map(|i| i.defects_found).sum(),
        critical_issues: inspections.iter().filter(|i| is_critical(i)).count(),
    }
}

/// 欠陥種別ごとの件数（初出順、件数順ではない）
pub fn defect_distribution(inspections: &[Inspection]) -> Vec<DistributionEntry> {
    let mut entries: Vec<DistributionEntry> = Vec::new();

    for defect in inspections.iter().flat_map(|i| i.defects.iter()) {
        match entries.iter_mut().find(|e| e.name == defect.defect_type) {
            Some(entry) => entry.value += 1,
            None => entries.push(DistributionEntry {
                name: defect.defect_type.clone(),
                value: 1,
                color: defect_color(&defect.defect_type),
            }),
        }
    }

    entries
}

pub fn defect_color(defect_type: &str) -> &'static str {
    DEFECT_COLORS
        .iter()
        .find(|(name, _)| *name == defect_type)
        .map(|(_, color)| *color)
        .unwrap_or(DEFAULT_DEFECT_COLOR)
}

/// 合格率の表示（None はプレースホルダ）
pub fn format_pass_rate(pass_rate: Option<f64>) -> String {
    match pass_rate {
        Some(rate) => format!("{:.1}%", rate),
        None => "—".to_string(),
    }
}
