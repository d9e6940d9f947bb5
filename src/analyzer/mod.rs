//! 欠陥解析クライアント
//!
//! - EndpointAnalyzer: 解析エンドポイント（Bearer認証）へ画像を送信
//! - GatewayAnalyzer: チャット補完ゲートウェイへ直接問い合わせ
//!
//! どちらも再試行はしない（再実行は利用者の操作で行う）。

mod endpoint;
mod gateway;

pub use crate::ai_provider::AnalyzerKind;
pub use endpoint::EndpointAnalyzer;
pub use gateway::GatewayAnalyzer;

use crate::config::Config;
use crate::error::{DefectVisionError, Result};
use async_trait::async_trait;
use defect_vision_common::DefectAnalysis;
use serde::Deserialize;
use std::sync::Arc;

/// 画像1枚を解析して正規化済みの結果を返す
#[async_trait]
pub trait DefectAnalyzer: Send + Sync {
    async fn analyze(&self, image_data_url: &str) -> Result<DefectAnalysis>;
}

/// 設定からバックエンドを組み立てる
pub fn build_analyzer(config: &Config, kind: AnalyzerKind) -> Result<Arc<dyn DefectAnalyzer>> {
    let client = reqwest::Client::builder()
        .user_agent(concat!("defect-vision/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| DefectVisionError::Config(format!("HTTPクライアント初期化エラー: {}", e)))?;

    match kind {
        AnalyzerKind::Endpoint => Ok(Arc::new(EndpointAnalyzer::new(
            client,
            config.analyze_endpoint.clone(),
            config.access_token(),
        ))),
        AnalyzerKind::Gateway => Ok(Arc::new(GatewayAnalyzer::new(
            client,
            config.gateway_url.clone(),
            config.gateway_model.clone(),
            config.get_api_key()?,
        ))),
    }
}

/// `{ "error": "..." }` 形式のエラーペイロード
#[derive(Debug, Deserialize)]
struct ErrorPayload {
    error: String,
}

/// エラーペイロードならメッセージを取り出す
fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorPayload>(body).ok().map(|p| p.error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message() {
        assert_eq!(
            error_message(r#"{"error": "Rate limit exceeded"}"#).as_deref(),
            Some("Rate limit exceeded")
        );
        assert_eq!(error_message(r#"{"overall_status": "pass"}"#), None);
        assert_eq!(error_message("not json"), None);
    }

    #[test]
    fn test_build_gateway_requires_api_key() {
        std::env::remove_var("DEFECT_VISION_API_KEY");
        let config = Config::default();
        let result = build_analyzer(&config, AnalyzerKind::Gateway);
        assert!(matches!(result, Err(DefectVisionError::MissingCredentials)));
    }
}
