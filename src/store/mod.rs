//! 検査レコードの永続化ストア
//!
//! 検査IDをキーにした行テーブルと、挿入イベントのプッシュフィードを提供する。

mod json_store;

pub use json_store::JsonStore;

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// 保存済みの行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectionRow {
    pub inspection_id: String,
    pub product_id: String,
    pub production_line: String,
    pub status: String,
    pub defects_found: i64,
    pub confidence: f64,
    #[serde(default)]
    pub defects: serde_json::Value,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

/// 挿入する行（created_at はストアが付与）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewInspectionRow {
    pub inspection_id: String,
    pub product_id: String,
    pub production_line: String,
    pub status: String,
    pub defects_found: i64,
    pub confidence: f64,
    pub defects: serde_json::Value,
    pub user_id: String,
}

#[async_trait]
pub trait InspectionStore: Send + Sync {
    /// created_at の新しい順に最大 limit 件
    async fn fetch_recent(&self, limit: usize) -> Result<Vec<InspectionRow>>;

    /// 行を挿入し、購読者へ挿入イベントを流す。検査IDの重複はエラー
    async fn insert(&self, row: NewInspectionRow) -> Result<InspectionRow>;

    /// 挿入イベントの購読
    fn subscribe(&self) -> broadcast::Receiver<InspectionRow>;
}
