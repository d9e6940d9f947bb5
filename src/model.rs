//! 検査コレクション（集計モデル）
//!
//! セッション中の検査レコードを新しい順に保持する。
//! 同じIDのレコードは二重に入らない（ローカル追加とプッシュフィードの
//! エコーが競合しても1件になる）。

use chrono::Local;
use defect_vision_common::{
    compute_metrics, defect_distribution, DistributionEntry, Inspection, InspectionDraft, Metrics,
};
use rand::Rng;
use std::sync::{Arc, Mutex, MutexGuard};

const PRODUCT_PREFIXES: &[&str] = &["PRD", "CMP", "ASM"];
const PRODUCTION_LINES: &[&str] = &["Line A", "Line B", "Line C", "Line D"];

const ID_PREFIX: &str = "INS-";

fn inspection_id(millis: i64) -> String {
    format!("{}{}", ID_PREFIX, millis)
}

/// 表示用の時刻書式（例: 02:15:09 PM）
pub const TIMESTAMP_FORMAT: &str = "%I:%M:%S %p";

pub type SharedModel = Arc<Mutex<InspectionModel>>;

/// 共有モデルをロック（ポイズン時も中身を使う）
pub fn lock_model(model: &SharedModel) -> MutexGuard<'_, InspectionModel> {
    model.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Default)]
pub struct InspectionModel {
    inspections: Vec<Inspection>,
    last_id_millis: i64,
}

impl InspectionModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared(self) -> SharedModel {
        Arc::new(Mutex::new(self))
    }

    /// 新しい順の検査レコード
    pub fn inspections(&self) -> &[Inspection] {
        &self.inspections
    }

    pub fn len(&self) -> usize {
        self.inspections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inspections.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inspections.iter().any(|i| i.id == id)
    }

    /// 解析結果に識別情報（ID・製品ID・ライン・時刻）を付与
    pub fn create(&mut self, draft: InspectionDraft) -> Inspection {
        let now = Local::now();
        // 同一ミリ秒の連続追加や取り込み済みIDとも重ならないよう進める
        let mut millis = now.timestamp_millis().max(self.last_id_millis + 1);
        while self.contains(&inspection_id(millis)) {
            millis += 1;
        }
        self.last_id_millis = millis;

        let mut rng = rand::thread_rng();
        let prefix = PRODUCT_PREFIXES[rng.gen_range(0..PRODUCT_PREFIXES.len())];
        let line = PRODUCTION_LINES[rng.gen_range(0..PRODUCTION_LINES.len())];

        Inspection {
            id: inspection_id(millis),
            product_id: format!("{}-{}", prefix, rng.gen_range(1000..10000)),
            line: line.to_string(),
            timestamp: now.format(TIMESTAMP_FORMAT).to_string(),
            status: draft.status,
            defects_found: draft.defects_found,
            confidence: draft.confidence,
            defects: draft.defects,
        }
    }

    /// 先頭に追加。同じIDが既にあれば何もしない
    ///
    /// # Returns
    /// 追加したら true
    pub fn insert(&mut self, inspection: Inspection) -> bool {
        if self.contains(&inspection.id) {
            return false;
        }
        self.observe_id(&inspection.id);
        self.inspections.insert(0, inspection);
        true
    }

    /// 既存IDの時刻部分より後から採番する
    fn observe_id(&mut self, id: &str) {
        if let Some(millis) = id.strip_prefix(ID_PREFIX).and_then(|m| m.parse::<i64>().ok()) {
            self.last_id_millis = self.last_id_millis.max(millis);
        }
    }

    /// create + insert
    pub fn add_inspection(&mut self, draft: InspectionDraft) -> Inspection {
        let inspection = self.create(draft);
        self.insert(inspection.clone());
        inspection
    }

    /// 既存レコード（新しい順）を末尾に取り込む。重複は捨てる
    pub fn seed(&mut self, inspections: Vec<Inspection>) -> usize {
        let mut added = 0;
        for inspection in inspections {
            if !self.contains(&inspection.id) {
                self.observe_id(&inspection.id);
                self.inspections.push(inspection);
                added += 1;
            }
        }
        added
    }

    /// 全件削除（確認・取り消しなし）
    pub fn clear(&mut self) {
        self.inspections.clear();
    }

    pub fn metrics(&self) -> Metrics {
        compute_metrics(&self.inspections)
    }

    pub fn defect_distribution(&self) -> Vec<DistributionEntry> {
        defect_distribution(&self.inspections)
    }
}
