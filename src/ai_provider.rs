use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// 解析バックエンドの種類
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalyzerKind {
    /// 解析エンドポイント（`{imageBase64}` をPOST）
    #[default]
    Endpoint,
    /// チャット補完ゲートウェイへ直接問い合わせ
    Gateway,
}

impl AnalyzerKind {
    pub fn label(&self) -> &'static str {
        match self {
            AnalyzerKind::Endpoint => "endpoint",
            AnalyzerKind::Gateway => "gateway",
        }
    }
}
