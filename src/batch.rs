//! バッチ解析
//!
//! キューに積んだ画像を1枚ずつ順番に解析し、成功した結果を検査セッションへ追加する。
//! 各画像の状態は pending → analyzing → complete / error と遷移する。
//! 完了・エラーは終端で、自動再試行はしない。

use crate::analyzer::DefectAnalyzer;
use crate::error::{DefectVisionError, Result};
use crate::image::encode_data_url;
use crate::scanner::is_image_path;
use crate::session::InspectionSession;
use async_trait::async_trait;
use chrono::Utc;
use defect_vision_common::{InspectionDraft, InspectionStatus};
use rand::Rng;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    Pending,
    Analyzing,
    Complete,
    Error,
}

impl ItemStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemStatus::Complete | ItemStatus::Error)
    }
}

/// 完了した画像の結果要約
#[derive(Debug, Clone, PartialEq)]
pub struct ItemResult {
    pub status: InspectionStatus,
    pub defects_found: usize,
}

#[derive(Debug, Clone)]
pub struct BatchItem {
    pub id: String,
    pub path: PathBuf,
    pub file_name: String,
    pub status: ItemStatus,
    pub result: Option<ItemResult>,
    pub error: Option<String>,
}

#[derive(Debug, Default)]
struct QueueState {
    items: Vec<BatchItem>,
    processing: bool,
}

/// バッチキュー（クローンしても同じキューを指す）
#[derive(Debug, Clone, Default)]
pub struct BatchQueue {
    state: Arc<Mutex<QueueState>>,
}

impl BatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// 画像を pending として追加（画像以外は無視）
    ///
    /// # Returns
    /// 追加した件数
    pub fn enqueue<P: AsRef<Path>>(&self, paths: &[P]) -> Result<usize> {
        let mut state = self.lock();
        if state.processing {
            return Err(DefectVisionError::QueueBusy);
        }

        let mut added = 0;
        for path in paths {
            let path = path.as_ref();
            if !is_image_path(path) {
                debug!(path = %path.display(), "画像以外のためスキップ");
                continue;
            }
            state.items.push(BatchItem {
                id: new_item_id(),
                path: path.to_path_buf(),
                file_name: path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default(),
                status: ItemStatus::Pending,
                result: None,
                error: None,
            });
            added += 1;
        }
        Ok(added)
    }

    /// pending の画像を取り除く
    ///
    /// # Returns
    /// 取り除いたら true
    pub fn remove(&self, id: &str) -> Result<bool> {
        let mut state = self.lock();
        if state.processing {
            return Err(DefectVisionError::QueueBusy);
        }

        let before = state.items.len();
        state
            .items
            .retain(|item| !(item.id == id && item.status == ItemStatus::Pending));
        Ok(state.items.len() != before)
    }

    /// 全件クリア（処理中は不可）
    pub fn clear(&self) -> Result<()> {
        let mut state = self.lock();
        if state.processing {
            return Err(DefectVisionError::QueueBusy);
        }
        state.items.clear();
        Ok(())
    }

    pub fn items(&self) -> Vec<BatchItem> {
        self.lock().items.clone()
    }

    pub fn is_processing(&self) -> bool {
        self.lock().processing
    }

    pub fn pending_count(&self) -> usize {
        self.count(ItemStatus::Pending)
    }

    pub fn count(&self, status: ItemStatus) -> usize {
        self.lock().items.iter().filter(|i| i.status == status).count()
    }

    fn pending_snapshot(&self) -> Vec<(String, PathBuf)> {
        self.lock()
            .items
            .iter()
            .filter(|i| i.status == ItemStatus::Pending)
            .map(|i| (i.id.clone(), i.path.clone()))
            .collect()
    }

    fn update<F: FnOnce(&mut BatchItem)>(&self, id: &str, f: F) -> Option<BatchItem> {
        let mut state = self.lock();
        let item = state.items.iter_mut().find(|i| i.id == id)?;
        f(item);
        Some(item.clone())
    }

    fn set_processing(&self, processing: bool) {
        self.lock().processing = processing;
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn new_item_id() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..9)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect();
    format!("batch-{}-{}", Utc::now().timestamp_millis(), suffix)
}

/// 画像間の待ち時間
#[async_trait]
pub trait Pacer: Send + Sync {
    async fn pause(&self);
}

/// 固定時間待つ（上流のレート制限対策）
pub struct FixedDelay(pub Duration);

#[async_trait]
impl Pacer for FixedDelay {
    async fn pause(&self) {
        tokio::time::sleep(self.0).await;
    }
}

/// 待たない（テスト用）
pub struct NoDelay;

#[async_trait]
impl Pacer for NoDelay {
    async fn pause(&self) {}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub completed: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn processed(&self) -> usize {
        self.completed + self.failed
    }
}

/// 処理中フラグを必ず戻す
struct ProcessingGuard<'a>(&'a BatchQueue);

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.0.set_processing(false);
    }
}

pub struct BatchRunner {
    analyzer: Arc<dyn DefectAnalyzer>,
    session: Arc<InspectionSession>,
    pacer: Box<dyn Pacer>,
}

impl BatchRunner {
    pub fn new(
        analyzer: Arc<dyn DefectAnalyzer>,
        session: Arc<InspectionSession>,
        pacer: Box<dyn Pacer>,
    ) -> Self {
        Self {
            analyzer,
            session,
            pacer,
        }
    }

    /// 実行開始時点の pending を順番に解析する
    ///
    /// 途中で追加された画像は今回の実行に含めない。1枚の失敗で全体は止めない。
    /// `on_progress` には画像が終端状態になるたびに (処理済み件数, 対象件数, 画像) を渡す。
    pub async fn run<F>(&self, queue: &BatchQueue, mut on_progress: F) -> BatchSummary
    where
        F: FnMut(usize, usize, &BatchItem),
    {
        let targets = queue.pending_snapshot();
        let total = targets.len();
        let mut summary = BatchSummary::default();
        if total == 0 {
            return summary;
        }

        queue.set_processing(true);
        let _guard = ProcessingGuard(queue);
        info!(total, "バッチ解析開始");

        for (index, (id, path)) in targets.into_iter().enumerate() {
            queue.update(&id, |item| item.status = ItemStatus::Analyzing);

            let finished = match self.analyze_one(&path).await {
                Ok(draft) => {
                    let result = ItemResult {
                        status: draft.status,
                        defects_found: draft.defects_found,
                    };
                    self.session.add_inspection(draft);
                    summary.completed += 1;
                    queue.update(&id, |item| {
                        item.status = ItemStatus::Complete;
                        item.result = Some(result);
                    })
                }
                Err(e) => {
                    warn!(path = %path.display(), "解析失敗: {}", e);
                    summary.failed += 1;
                    queue.update(&id, |item| {
                        item.status = ItemStatus::Error;
                        item.error = Some(e.to_string());
                    })
                }
            };

            if let Some(item) = finished {
                on_progress(index + 1, total, &item);
            }

            if index + 1 < total {
                self.pacer.pause().await;
            }
        }

        info!(
            completed = summary.completed,
            failed = summary.failed,
            "バッチ解析完了"
        );
        summary
    }

    async fn analyze_one(&self, path: &Path) -> Result<InspectionDraft> {
        let data_url = encode_data_url(path)?;
        let analysis = self.analyzer.analyze(&data_url).await?;
        Ok(InspectionDraft::from(&analysis))
    }
}
