//! 検査セッション
//!
//! 検査コレクション・永続化アダプタ・通知チャネルをまとめたサービス。
//! 起動時に生成して必要な箇所へ渡し、終了時に `shutdown` で購読を解放する。

use crate::error::Result;
use crate::model::{lock_model, InspectionModel, SharedModel};
use crate::persistence::{PersistenceAdapter, SaveOutcome, Subscription};
use defect_vision_common::{DistributionEntry, Inspection, InspectionDraft, Metrics};
use std::fmt;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// 利用者向けの通知
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    SignInRequired,
    SaveFailed(String),
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::SignInRequired => {
                write!(f, "Authentication required: Please sign in to save inspections.")
            }
            Notice::SaveFailed(message) => write!(f, "Failed to save inspection: {}", message),
        }
    }
}

pub struct InspectionSession {
    model: SharedModel,
    adapter: Arc<PersistenceAdapter>,
    notices: mpsc::UnboundedSender<Notice>,
    pending: Mutex<Vec<JoinHandle<()>>>,
    subscription: Mutex<Option<Subscription>>,
}

impl InspectionSession {
    /// セッションと通知の受信側を生成
    pub fn new(adapter: PersistenceAdapter) -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Self {
            model: InspectionModel::new().shared(),
            adapter: Arc::new(adapter),
            notices: tx,
            pending: Mutex::new(Vec::new()),
            subscription: Mutex::new(None),
        };
        (session, rx)
    }

    /// フィード購読を開始してから直近 limit 件を取り込む
    ///
    /// 購読を先に張るので、読み込み中に届いた行も取りこぼさない。
    ///
    /// # Returns
    /// 取り込んだ件数
    pub async fn start(&self, limit: usize) -> Result<usize> {
        let subscription = self.adapter.subscribe(Arc::clone(&self.model));
        *self.lock_subscription() = Some(subscription);

        let recent = self.adapter.load_recent(limit).await?;
        let added = lock_model(&self.model).seed(recent);
        info!(added, "既存の検査を読み込み");
        Ok(added)
    }

    /// 解析結果を追加し、バックグラウンドで保存する
    ///
    /// 保存に失敗してもローカルの追加は取り消さない。
    pub fn add_inspection(&self, draft: InspectionDraft) -> Inspection {
        let inspection = lock_model(&self.model).add_inspection(draft);

        let adapter = Arc::clone(&self.adapter);
        let notices = self.notices.clone();
        let record = inspection.clone();
        let handle = tokio::spawn(async move {
            let notice = match adapter.save(&record).await {
                Ok(SaveOutcome::Saved) => return,
                Ok(SaveOutcome::SignInRequired) => Notice::SignInRequired,
                Err(e) => {
                    warn!(id = %record.id, "保存失敗: {}", e);
                    Notice::SaveFailed(e.to_string())
                }
            };
            // 受信側が無ければ通知は捨てる
            let _ = notices.send(notice);
        });

        let mut pending = self.lock_pending();
        pending.retain(|h| !h.is_finished());
        pending.push(handle);

        inspection
    }

    pub fn clear_inspections(&self) {
        lock_model(&self.model).clear();
    }

    /// 新しい順のスナップショット
    pub fn inspections(&self) -> Vec<Inspection> {
        lock_model(&self.model).inspections().to_vec()
    }

    pub fn metrics(&self) -> Metrics {
        lock_model(&self.model).metrics()
    }

    pub fn defect_distribution(&self) -> Vec<DistributionEntry> {
        lock_model(&self.model).defect_distribution()
    }

    /// 実行中の保存をすべて待つ
    pub async fn flush(&self) {
        let handles: Vec<_> = std::mem::take(&mut *self.lock_pending());
        for handle in handles {
            if let Err(e) = handle.await {
                warn!("保存タスクが異常終了: {}", e);
            }
        }
    }

    /// フィード購読を解放
    pub fn shutdown(&self) {
        if self.lock_subscription().take().is_some() {
            info!("フィード購読を解除");
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.lock_subscription()
            .as_ref()
            .map(Subscription::is_active)
            .unwrap_or(false)
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_subscription(&self) -> std::sync::MutexGuard<'_, Option<Subscription>> {
        self.subscription.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for InspectionSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}
