//! 検査データの型定義
//!
//! CLIと将来のWeb版で共有される型:
//! - AnalyzedDefect / DefectAnalysis: AI解析エンドポイントの出力
//! - Defect / Inspection: ダッシュボードで保持する検査レコード
//! - ReportType: レポート種別

use serde::{Deserialize, Serialize};
use std::fmt;

/// 欠陥の重大度（low < medium < high < critical）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    /// 列挙外の値は medium に丸める
    pub fn parse_lenient(value: &str) -> Self {
        match value {
            "low" => Severity::Low,
            "medium" => Severity::Medium,
            "high" => Severity::High,
            "critical" => Severity::Critical,
            _ => Severity::Medium,
        }
    }

    /// 合格扱いの判定に使う軽微な重大度か
    pub fn is_minor(&self) -> bool {
        matches!(self, Severity::Low | Severity::Medium)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 検査全体の判定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InspectionStatus {
    Pass,
    Warning,
    Critical,
}

impl InspectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InspectionStatus::Pass => "pass",
            InspectionStatus::Warning => "warning",
            InspectionStatus::Critical => "critical",
        }
    }

    /// 列挙外の値は warning に丸める
    pub fn parse_lenient(value: &str) -> Self {
        match value {
            "pass" => InspectionStatus::Pass,
            "warning" => InspectionStatus::Warning,
            "critical" => InspectionStatus::Critical,
            _ => InspectionStatus::Warning,
        }
    }
}

impl fmt::Display for InspectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 解析エンドポイントが返す欠陥1件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedDefect {
    #[serde(rename = "type")]
    pub defect_type: String,
    pub severity: Severity,
    pub location: String,
    pub description: String,
    pub confidence: f64,
}

/// 解析エンドポイントの正規化済みレスポンス
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefectAnalysis {
    pub overall_status: InspectionStatus,
    pub confidence: f64,
    #[serde(default)]
    pub defects: Vec<AnalyzedDefect>,
}

/// 検査レコード内の欠陥
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Defect {
    #[serde(rename = "type")]
    pub defect_type: String,
    pub severity: Severity,
    pub location: String,
    pub confidence: f64,
}

impl From<&AnalyzedDefect> for Defect {
    fn from(d: &AnalyzedDefect) -> Self {
        Self {
            defect_type: d.defect_type.clone(),
            severity: d.severity,
            location: d.location.clone(),
            confidence: clamp_confidence(d.confidence),
        }
    }
}

/// 識別情報を持たない検査結果（addInspectionの入力）
#[derive(Debug, Clone, PartialEq)]
pub struct InspectionDraft {
    pub status: InspectionStatus,
    pub confidence: f64,
    pub defects_found: usize,
    pub defects: Vec<Defect>,
}

impl From<&DefectAnalysis> for InspectionDraft {
    fn from(analysis: &DefectAnalysis) -> Self {
        Self {
            status: analysis.overall_status,
            confidence: clamp_confidence(analysis.confidence),
            defects_found: analysis.defects.len(),
            defects: analysis.defects.iter().map(Defect::from).collect(),
        }
    }
}

/// 完了した検査1件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inspection {
    pub id: String,
    pub product_id: String,
    pub line: String,
    pub timestamp: String,
    pub status: InspectionStatus,
    pub defects_found: usize,
    pub confidence: f64,
    #[serde(default)]
    pub defects: Vec<Defect>,
}

/// レポート種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportType {
    #[default]
    Single,
    Daily,
    Batch,
}

impl ReportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportType::Single => "single",
            ReportType::Daily => "daily",
            ReportType::Batch => "batch",
        }
    }
}

impl std::str::FromStr for ReportType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "single" => Ok(ReportType::Single),
            "daily" => Ok(ReportType::Daily),
            "batch" => Ok(ReportType::Batch),
            _ => Err(format!("Unknown report type: {}. Use single, daily, or batch", s)),
        }
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 信頼度を [0, 100] に丸める（NaNは0）
pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 100.0)
}
