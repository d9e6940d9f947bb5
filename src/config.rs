use crate::analyzer::AnalyzerKind;
use crate::error::{DefectVisionError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const ACCESS_TOKEN_ENV: &str = "DEFECT_VISION_ACCESS_TOKEN";
const USER_ID_ENV: &str = "DEFECT_VISION_USER_ID";
const API_KEY_ENV: &str = "DEFECT_VISION_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub provider: AnalyzerKind,
    /// 解析エンドポイント（`{imageBase64}` を受け付ける）
    pub analyze_endpoint: String,
    /// チャット補完ゲートウェイ（provider = gateway のとき）
    pub gateway_url: String,
    pub gateway_model: String,
    pub access_token: Option<String>,
    pub user_id: Option<String>,
    pub api_key: Option<String>,
    pub store_path: Option<PathBuf>,
    pub batch_delay_ms: u64,
    pub history_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: AnalyzerKind::Endpoint,
            analyze_endpoint: "http://localhost:54321/functions/v1/analyze-defect".into(),
            gateway_url: "https://ai.gateway.lovable.dev/v1/chat/completions".into(),
            gateway_model: "google/gemini-2.5-flash".into(),
            access_token: None,
            user_id: None,
            api_key: None,
            store_path: None,
            batch_delay_ms: 500, // 上流のレート制限対策
            history_limit: 100,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| DefectVisionError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("defect-vision"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// 検査レコードの保存先
    pub fn resolved_store_path(&self) -> Result<PathBuf> {
        match &self.store_path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::config_dir()?.join("inspections.json")),
        }
    }

    /// Bearer認証トークン（環境変数を優先）
    pub fn access_token(&self) -> Option<String> {
        env_or(ACCESS_TOKEN_ENV, &self.access_token)
    }

    /// サインイン中のユーザーID（環境変数を優先）
    pub fn user_id(&self) -> Option<String> {
        env_or(USER_ID_ENV, &self.user_id)
    }

    pub fn get_api_key(&self) -> Result<String> {
        env_or(API_KEY_ENV, &self.api_key).ok_or(DefectVisionError::MissingCredentials)
    }

    pub fn batch_delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.batch_delay_ms)
    }
}

fn env_or(name: &str, fallback: &Option<String>) -> Option<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => fallback.clone(),
    }
}
