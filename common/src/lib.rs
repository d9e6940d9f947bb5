//! Defect Vision Common Library
//!
//! CLIと将来のWeb版で共有される型・パーサー・集計・レポート生成

pub mod types;
pub mod error;
pub mod parser;
pub mod prompts;
pub mod metrics;
pub mod report;

pub use types::{
    clamp_confidence, AnalyzedDefect, Defect, DefectAnalysis, Inspection, InspectionDraft,
    InspectionStatus, ReportType, Severity,
};
pub use error::{Error, Result};
pub use parser::{extract_json, normalize_analysis, parse_defect_response};
pub use prompts::{build_inspection_prompt, USER_INSTRUCTION};
pub use metrics::{
    compute_metrics, defect_distribution, format_pass_rate, is_critical, is_pass_equivalent,
    DistributionEntry, Metrics,
};
pub use report::{default_report_type, escape_html, render_report};
