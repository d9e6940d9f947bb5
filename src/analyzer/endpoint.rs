use super::{error_message, DefectAnalyzer};
use crate::error::{DefectVisionError, Result};
use async_trait::async_trait;
use defect_vision_common::{normalize_analysis, DefectAnalysis};
use serde::Serialize;
use tracing::{debug, warn};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeRequest<'a> {
    image_base64: &'a str,
}

/// 解析エンドポイントクライアント
///
/// 認証トークンが無い場合は送信前に `MissingCredentials` を返す。
pub struct EndpointAnalyzer {
    client: reqwest::Client,
    endpoint: String,
    access_token: Option<String>,
}

impl EndpointAnalyzer {
    pub fn new(client: reqwest::Client, endpoint: String, access_token: Option<String>) -> Self {
        Self {
            client,
            endpoint,
            access_token,
        }
    }
}

#[async_trait]
impl DefectAnalyzer for EndpointAnalyzer {
    async fn analyze(&self, image_data_url: &str) -> Result<DefectAnalysis> {
        let token = self
            .access_token
            .as_deref()
            .ok_or(DefectVisionError::MissingCredentials)?;

        debug!(endpoint = %self.endpoint, bytes = image_data_url.len(), "解析リクエスト送信");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(token)
            .json(&AnalyzeRequest {
                image_base64: image_data_url,
            })
            .send()
            .await
            .map_err(|e| {
                warn!("解析エンドポイント接続エラー: {}", e);
                DefectVisionError::ApiCall(format!("Failed to connect to AI service: {}", e))
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DefectVisionError::ApiCall(format!("Failed to read AI service response: {}", e)))?;

        // エラーペイロードはステータスに関わらずそのまま返す
        if let Some(message) = error_message(&body) {
            warn!(%status, "解析エンドポイントがエラーを返却: {}", message);
            return Err(DefectVisionError::ApiCall(message));
        }

        if !status.is_success() {
            return Err(DefectVisionError::ApiCall(format!(
                "AI service error (status {})",
                status.as_u16()
            )));
        }

        if body.trim().is_empty() || body.trim() == "null" {
            return Err(DefectVisionError::EmptyResponse);
        }

        let value: serde_json::Value = serde_json::from_str(&body)
            .map_err(|e| DefectVisionError::ApiParse(format!("解析結果が不正なJSON: {}", e)))?;

        normalize_analysis(value).map_err(|e| DefectVisionError::ApiParse(e.to_string()))
    }
}
