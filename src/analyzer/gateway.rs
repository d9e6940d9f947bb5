//! チャット補完ゲートウェイ連携
//!
//! 解析エンドポイントと同じ処理をクライアント側で行う:
//! 入力検証 → システムプロンプト + 画像を送信 → 応答JSONを抽出・正規化

use super::{error_message, DefectAnalyzer};
use crate::error::{DefectVisionError, Result};
use crate::image::validate_data_url;
use async_trait::async_trait;
use defect_vision_common::{build_inspection_prompt, parse_defect_response, DefectAnalysis, USER_INSTRUCTION};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

/// チャット補完リクエスト
#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
}

#[derive(Serialize)]
struct Message {
    role: &'static str,
    content: MessageContent,
}

#[derive(Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

/// チャット補完レスポンス
#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

pub struct GatewayAnalyzer {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: String,
}

impl GatewayAnalyzer {
    pub fn new(client: reqwest::Client, url: String, model: String, api_key: String) -> Self {
        Self {
            client,
            url,
            model,
            api_key,
        }
    }

    fn build_request(&self, image_data_url: &str) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system",
                    content: MessageContent::Text(build_inspection_prompt()),
                },
                Message {
                    role: "user",
                    content: MessageContent::Parts(vec![
                        ContentPart::Text {
                            text: USER_INSTRUCTION.to_string(),
                        },
                        ContentPart::ImageUrl {
                            image_url: ImageUrl {
                                url: image_data_url.to_string(),
                            },
                        },
                    ]),
                },
            ],
        }
    }
}

/// ゲートウェイのHTTPステータスを利用者向けメッセージへ
fn status_message(status: u16) -> &'static str {
    match status {
        429 => "Rate limit exceeded. Please try again in a moment.",
        402 => "AI credits exhausted. Please add more credits to continue.",
        _ => "AI analysis failed",
    }
}

#[async_trait]
impl DefectAnalyzer for GatewayAnalyzer {
    async fn analyze(&self, image_data_url: &str) -> Result<DefectAnalysis> {
        validate_data_url(image_data_url)?;

        debug!(model = %self.model, "ゲートウェイへ解析リクエスト送信");

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&self.build_request(image_data_url))
            .send()
            .await
            .map_err(|e| DefectVisionError::ApiCall(format!("Failed to connect to AI service: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(%status, "AIゲートウェイエラー: {}", body);
            return Err(DefectVisionError::ApiCall(status_message(status.as_u16()).to_string()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| DefectVisionError::ApiCall(format!("Failed to read AI service response: {}", e)))?;

        if let Some(message) = error_message(&body) {
            return Err(DefectVisionError::ApiCall(message));
        }

        let content = serde_json::from_str::<ChatResponse>(&body)
            .ok()
            .and_then(|r| r.choices.into_iter().next())
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| {
                error!("AI応答にcontentがありません");
                DefectVisionError::ApiCall("Invalid AI response".into())
            })?;

        parse_defect_response(&content).map_err(|e| {
            error!("AI応答のパース失敗: {}", e);
            DefectVisionError::ApiParse("Failed to parse AI analysis result".into())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyzer() -> GatewayAnalyzer {
        GatewayAnalyzer::new(
            reqwest::Client::new(),
            "http://127.0.0.1:9/v1/chat/completions".into(),
            "google/gemini-2.5-flash".into(),
            "test-key".into(),
        )
    }

    #[test]
    fn test_request_shape() {
        let request = analyzer().build_request("data:image/png;base64,aGVsbG8=");
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["model"], "google/gemini-2.5-flash");
        assert_eq!(json["messages"][0]["role"], "system");
        assert!(json["messages"][0]["content"].is_string());
        assert_eq!(json["messages"][1]["content"][0]["type"], "text");
        assert_eq!(json["messages"][1]["content"][1]["type"], "image_url");
        assert_eq!(
            json["messages"][1]["content"][1]["image_url"]["url"],
            "data:image/png;base64,aGVsbG8="
        );
    }

    #[test]
    fn test_status_message() {
        assert!(status_message(429).contains("Rate limit"));
        assert!(status_message(402).contains("credits"));
        assert_eq!(status_message(500), "AI analysis failed");
    }

    #[tokio::test]
    async fn test_invalid_image_rejected_before_request() {
        let result = analyzer().analyze("not-a-data-url").await;
        assert!(matches!(result, Err(DefectVisionError::InvalidImage(_))));
    }
}
