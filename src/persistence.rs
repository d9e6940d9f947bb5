//! 永続化アダプタ
//!
//! - 起動時に直近N件を読み込んでコレクションへ取り込む
//! - 挿入フィードを購読し、リモート由来の行を同じ重複排除規則でマージする
//! - ローカルで追加した検査をサインイン中のユーザーで書き込む

use crate::auth::AuthProvider;
use crate::error::Result;
use crate::model::{lock_model, SharedModel, TIMESTAMP_FORMAT};
use crate::store::{InspectionRow, InspectionStore, NewInspectionRow};
use chrono::Local;
use defect_vision_common::{clamp_confidence, Defect, Inspection, InspectionStatus, Severity};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// 書き込み結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    /// 未サインインのため書き込みをスキップ
    SignInRequired,
}

/// 挿入フィードの購読。破棄すると購読タスクも止まる
pub struct Subscription {
    handle: JoinHandle<()>,
}

impl Subscription {
    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub struct PersistenceAdapter {
    store: Arc<dyn InspectionStore>,
    auth: Arc<dyn AuthProvider>,
}

impl PersistenceAdapter {
    pub fn new(store: Arc<dyn InspectionStore>, auth: Arc<dyn AuthProvider>) -> Self {
        Self { store, auth }
    }

    /// 直近 limit 件（新しい順）
    pub async fn load_recent(&self, limit: usize) -> Result<Vec<Inspection>> {
        let rows = self.store.fetch_recent(limit).await?;
        Ok(rows.iter().map(row_to_inspection).collect())
    }

    /// 挿入フィードを購読してモデルへマージする
    ///
    /// tokio ランタイム内で呼ぶこと。
    pub fn subscribe(&self, model: SharedModel) -> Subscription {
        let mut rx = self.store.subscribe();

        let handle = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(row) => {
                        let inspection = row_to_inspection(&row);
                        let id = inspection.id.clone();
                        if lock_model(&model).insert(inspection) {
                            debug!(%id, "フィードから検査を追加");
                        } else {
                            debug!(%id, "既存の検査のためスキップ");
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "挿入フィードの取りこぼし");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        Subscription { handle }
    }

    /// 検査をストアへ書き込む（未サインインならスキップ）
    pub async fn save(&self, inspection: &Inspection) -> Result<SaveOutcome> {
        let Some(user) = self.auth.current_user() else {
            warn!(id = %inspection.id, "未サインインのため保存をスキップ");
            return Ok(SaveOutcome::SignInRequired);
        };

        self.store.insert(inspection_to_row(inspection, &user.id)).await?;
        info!(id = %inspection.id, "検査を保存");
        Ok(SaveOutcome::Saved)
    }
}

pub fn inspection_to_row(inspection: &Inspection, user_id: &str) -> NewInspectionRow {
    NewInspectionRow {
        inspection_id: inspection.id.clone(),
        product_id: inspection.product_id.clone(),
        production_line: inspection.line.clone(),
        status: inspection.status.as_str().to_string(),
        defects_found: inspection.defects_found as i64,
        confidence: inspection.confidence,
        defects: serde_json::to_value(&inspection.defects).unwrap_or(Value::Array(Vec::new())),
        user_id: user_id.to_string(),
    }
}

/// 行 → 検査レコード。時刻はローカル時刻で表示用に整形する
pub fn row_to_inspection(row: &InspectionRow) -> Inspection {
    Inspection {
        id: row.inspection_id.clone(),
        product_id: row.product_id.clone(),
        line: row.production_line.clone(),
        timestamp: row
            .created_at
            .with_timezone(&Local)
            .format(TIMESTAMP_FORMAT)
            .to_string(),
        status: InspectionStatus::parse_lenient(&row.status),
        defects_found: row.defects_found.max(0) as usize,
        confidence: clamp_confidence(row.confidence),
        defects: defects_from_value(&row.defects),
    }
}

/// JSON列の欠陥配列を読む。不正な要素は既定値で補う
fn defects_from_value(value: &Value) -> Vec<Defect> {
    let Some(items) = value.as_array() else {
        return Vec::new();
    };

    items
        .iter()
        .filter(|item| item.is_object())
        .map(|item| Defect {
            defect_type: item
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("Unknown")
                .to_string(),
            severity: item
                .get("severity")
                .and_then(Value::as_str)
                .map(Severity::parse_lenient)
                .unwrap_or(Severity::Medium),
            location: item
                .get("location")
                .and_then(Value::as_str)
                .unwrap_or("Unknown")
                .to_string(),
            confidence: clamp_confidence(item.get("confidence").and_then(Value::as_f64).unwrap_or(0.0)),
        })
        .collect()
}
