//! JSONファイルストア
//!
//! 行をメモリに保持し、パスが指定されていれば挿入ごとにファイルへ書き出す。
//! 同じファイルを複数プロセスが共有できるよう、書き込みはロックファイルで排他し、
//! ファイル上の行を取り込んでから一時ファイル経由で置き換える。
//! 挿入イベント（他プロセスが書いた行を含む）は broadcast チャネルで購読者へ流す。

use super::{InspectionRow, InspectionStore, NewInspectionRow};
use crate::error::{DefectVisionError, Result};
use async_trait::async_trait;
use chrono::Utc;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::broadcast;
use tracing::debug;

/// 購読者ごとのバッファ件数
const FEED_CAPACITY: usize = 256;

/// ストアファイルの構造
#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    /// バージョン（互換性チェック用）
    version: u32,
    rows: Vec<InspectionRow>,
}

impl StoreFile {
    const CURRENT_VERSION: u32 = 1;

    /// ファイル上の行（無ければ空）
    fn read_rows(path: &Path) -> Result<Vec<InspectionRow>> {
        if !path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(File::open(path)?);
        let file: StoreFile = serde_json::from_reader(reader)
            .map_err(|e| DefectVisionError::Store(format!("{}: {}", path.display(), e)))?;

        if file.version != Self::CURRENT_VERSION {
            return Err(DefectVisionError::Store(format!(
                "未対応のストアバージョン: {}",
                file.version
            )));
        }
        Ok(file.rows)
    }

    /// 一時ファイルに書いてから置き換える
    fn write_rows(path: &Path, rows: &[InspectionRow]) -> Result<()> {
        let file = StoreFile {
            version: Self::CURRENT_VERSION,
            rows: rows.to_vec(),
        };

        let tmp_path = sibling_path(path, "tmp");
        let mut writer = BufWriter::new(File::create(&tmp_path)?);
        serde_json::to_writer_pretty(&mut writer, &file)?;
        writer.flush()?;
        drop(writer);

        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }
}

/// `inspections.json` → `inspections.json.<suffix>`
fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

/// 書き込み中の排他ロック（破棄で解放）
struct WriteLock {
    file: File,
}

impl WriteLock {
    fn acquire(store_path: &Path) -> Result<Self> {
        if let Some(parent) = store_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(sibling_path(store_path, "lock"))?;
        file.lock_exclusive()?;
        Ok(Self { file })
    }
}

impl Drop for WriteLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

pub struct JsonStore {
    path: Option<PathBuf>,
    rows: Mutex<Vec<InspectionRow>>,
    feed: broadcast::Sender<InspectionRow>,
}

impl JsonStore {
    /// ファイルに書き出さないストア
    pub fn in_memory() -> Self {
        Self::with_rows(None, Vec::new())
    }

    /// ファイルを読み込んで開く（無ければ空）
    pub fn open(path: &Path) -> Result<Self> {
        let rows = StoreFile::read_rows(path)?;
        debug!(rows = rows.len(), path = %path.display(), "ストア読み込み");
        Ok(Self::with_rows(Some(path.to_path_buf()), rows))
    }

    fn with_rows(path: Option<PathBuf>, rows: Vec<InspectionRow>) -> Self {
        let (feed, _) = broadcast::channel(FEED_CAPACITY);
        Self {
            path,
            rows: Mutex::new(rows),
            feed,
        }
    }

    pub fn len(&self) -> usize {
        self.lock_rows().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 他のハンドル・プロセスが書いた行を取り込み、購読者へ流す
    ///
    /// # Returns
    /// 新たに取り込んだ件数
    pub fn refresh(&self) -> Result<usize> {
        let Some(path) = &self.path else {
            return Ok(0);
        };

        let added = self.merge(StoreFile::read_rows(path)?);
        let count = added.len();
        self.broadcast(added);
        Ok(count)
    }

    fn lock_rows(&self) -> MutexGuard<'_, Vec<InspectionRow>> {
        self.rows.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 未知の行だけを追加し、追加した行を返す
    fn merge(&self, rows: Vec<InspectionRow>) -> Vec<InspectionRow> {
        let mut current = self.lock_rows();
        let mut added = Vec::new();
        for row in rows {
            if !current.iter().any(|r| r.inspection_id == row.inspection_id) {
                current.push(row.clone());
                added.push(row);
            }
        }
        added
    }

    fn broadcast(&self, rows: Vec<InspectionRow>) {
        for row in rows {
            let id = row.inspection_id.clone();
            if self.feed.send(row).is_err() {
                debug!("購読者なし: {}", id);
            }
        }
    }
}

#[async_trait]
impl InspectionStore for JsonStore {
    async fn fetch_recent(&self, limit: usize) -> Result<Vec<InspectionRow>> {
        self.refresh()?;

        let mut rows = self.lock_rows().clone();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows.truncate(limit);
        Ok(rows)
    }

    async fn insert(&self, row: NewInspectionRow) -> Result<InspectionRow> {
        if row.user_id.trim().is_empty() {
            return Err(DefectVisionError::Store("user_id が必要です".into()));
        }

        // ファイル上の最新の行と突き合わせてから書く
        let _lock = match &self.path {
            Some(path) => Some(WriteLock::acquire(path)?),
            None => None,
        };
        let external = match &self.path {
            Some(path) => self.merge(StoreFile::read_rows(path)?),
            None => Vec::new(),
        };
        self.broadcast(external);

        let stored = InspectionRow {
            inspection_id: row.inspection_id,
            product_id: row.product_id,
            production_line: row.production_line,
            status: row.status,
            defects_found: row.defects_found,
            confidence: row.confidence,
            defects: row.defects,
            user_id: row.user_id,
            created_at: Utc::now(),
        };

        {
            let mut rows = self.lock_rows();
            if rows.iter().any(|r| r.inspection_id == stored.inspection_id) {
                return Err(DefectVisionError::Store(format!(
                    "検査IDが重複しています: {}",
                    stored.inspection_id
                )));
            }
            rows.push(stored.clone());
            if let Some(path) = &self.path {
                if let Err(e) = StoreFile::write_rows(path, &rows) {
                    rows.pop();
                    return Err(e);
                }
            }
        }

        self.broadcast(vec![stored.clone()]);
        Ok(stored)
    }

    fn subscribe(&self) -> broadcast::Receiver<InspectionRow> {
        self.feed.subscribe()
    }
}
