/// 计数流程: 每次处理一个片段
///
/// 1. 找出文件库中最早的、尚未被任何 PeopleCountRecord 引用的片段
/// 2. 读取该片段的检测结果 `<detections_dir>/<片段名>.jsonl`
/// 3. 越线计数, 追加一条 PeopleCountRecord (ISO 文本时间戳)
///
/// 打不开的片段跳过, 换下一个; 失败过的片段排在其它待处理片段之后重试.
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use super::{is_clip, Clock};
use crate::config::CountingConfig;
use crate::counting::{count_clip, track_source, DetectionLog};
use crate::error::Result;
use crate::gen_record_id;
use crate::records::{PeopleCountRecord, TimestampValue};
use crate::store::{BlobInfo, BlobStore, Records};

pub struct CountingPass {
    records: Records,
    blobs: Arc<dyn BlobStore>,
    config: CountingConfig,
    detections_dir: PathBuf,
    prefix: String,
    utc_offset_hours: i32,
    clock: Arc<dyn Clock>,
    failed: HashSet<String>, // 本进程内失败过的片段
}

impl CountingPass {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        records: Records,
        blobs: Arc<dyn BlobStore>,
        config: CountingConfig,
        detections_dir: &Path,
        prefix: &str,
        utc_offset_hours: i32,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            records,
            blobs,
            config,
            detections_dir: detections_dir.to_path_buf(),
            prefix: prefix.to_string(),
            utc_offset_hours,
            clock,
            failed: HashSet::new(),
        }
    }

    /// 全部未计数片段: 先按上传时间从早到晚, 失败过的排在最后
    pub fn pending_clips(&self) -> Result<Vec<BlobInfo>> {
        let counted: HashSet<String> = self
            .records
            .people_counts()?
            .into_iter()
            .map(|r| r.video_name)
            .collect();

        let mut pending: Vec<BlobInfo> = self
            .blobs
            .list(&self.prefix)?
            .into_iter()
            .filter(|b| is_clip(&b.name, &self.prefix) && !counted.contains(&b.name))
            .collect();
        pending.sort_by(|a, b| {
            self.failed
                .contains(&a.name)
                .cmp(&self.failed.contains(&b.name))
                .then_with(|| a.updated.cmp(&b.updated))
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(pending)
    }

    /// 下一个要处理的片段
    pub fn next_pending(&self) -> Result<Option<BlobInfo>> {
        Ok(self.pending_clips()?.into_iter().next())
    }

    /// 片段对应的检测结果文件
    pub fn detections_path(&self, blob_name: &str) -> PathBuf {
        let stem = Path::new(blob_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| blob_name.to_string());
        self.detections_dir.join(format!("{}.jsonl", stem))
    }

    /// 处理一个片段; 没有待处理片段时返回 None
    ///
    /// 记录库/文件库故障直接返回; 单个片段失败则换下一个,
    /// 全部失败时返回最后一个错误.
    pub fn run_once(&mut self) -> Result<Option<PeopleCountRecord>> {
        let pending = self.pending_clips()?;
        if pending.is_empty() {
            info!("✅ 没有新的片段");
            return Ok(None);
        }

        let mut last_err = None;
        for blob in pending {
            info!("📥 新片段: {}", blob.name);
            match self.count(&blob) {
                Ok(record) => {
                    self.failed.remove(&blob.name);
                    return Ok(Some(record));
                }
                Err(e) if e.is_transient() => return Err(e),
                Err(e) => {
                    warn!("⚠️  {} 计数失败, 跳过: {}", blob.name, e);
                    self.failed.insert(blob.name);
                    last_err = Some(e);
                }
            }
        }
        match last_err {
            Some(e) => Err(e),
            None => Ok(None),
        }
    }

    fn count(&self, blob: &BlobInfo) -> Result<PeopleCountRecord> {
        let log = DetectionLog::open(&self.detections_path(&blob.name))?;
        let mut source = track_source(log, &self.config);
        let summary = count_clip(source.as_mut(), &self.config);
        info!(
            "📊 {}: {} 帧 | In={} Out={} Total={}",
            blob.name,
            summary.frames,
            summary.state.in_count,
            summary.state.out_count,
            summary.state.total_count
        );

        let now = self.clock.now();
        let record = PeopleCountRecord::from_state(
            &blob.name,
            &summary.state,
            TimestampValue::iso_text(now, self.utc_offset_hours),
            Some(self.blobs.public_url(&blob.name)),
        );
        let id = gen_record_id("count", now, self.utc_offset_hours);
        self.records.append_people_count(Some(id), &record)?;
        info!("💾 计数结果已保存");
        Ok(record)
    }
}
