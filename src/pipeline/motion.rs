/// 运动流程: 轮询文件库, 分析每个尚未处理的片段
///
/// 已处理集合在第一次成功读取记录库时由已有的 moverate 记录初始化, 之后只在内存中维护.
/// 启动时记录库不可用不会退出, 由调度器退避后重试.
/// 单个片段打不开时记录警告, 下一轮重试; 下载的工作副本无论成败都删除.
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{is_clip, Clock};
use crate::config::MotionConfig;
use crate::error::{PipelineError, Result, StoreError};
use crate::gen_record_id;
use crate::input::{FfmpegFrameSource, FrameSource};
use crate::motion::{HornSchunckFlow, MotionAnalyzer};
use crate::records::{MotionSummaryRecord, TimestampValue};
use crate::store::{BlobStore, Records};

/// 本地文件 → 帧源
pub type SourceOpener = Box<dyn Fn(&Path) -> Result<Box<dyn FrameSource>> + Send + Sync>;

/// 下载到工作目录的副本, 离开作用域即删除
struct WorkingCopy {
    path: PathBuf,
}

impl Drop for WorkingCopy {
    fn drop(&mut self) {
        if self.path.exists() {
            match fs::remove_file(&self.path) {
                Ok(()) => debug!("🗑️  已删除 {}", self.path.display()),
                Err(e) => warn!("⚠️  删除 {} 失败: {}", self.path.display(), e),
            }
        }
    }
}

pub struct MotionPass {
    records: Records,
    blobs: Arc<dyn BlobStore>,
    analyzer: MotionAnalyzer<HornSchunckFlow>,
    opener: SourceOpener,
    work_dir: PathBuf,
    prefix: String,
    utc_offset_hours: i32,
    clock: Arc<dyn Clock>,
    processed: Option<HashSet<String>>, // None = 尚未从记录库加载
}

impl MotionPass {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        records: Records,
        blobs: Arc<dyn BlobStore>,
        config: MotionConfig,
        work_dir: &Path,
        prefix: &str,
        utc_offset_hours: i32,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        fs::create_dir_all(work_dir).map_err(StoreError::from)?;
        let flow = HornSchunckFlow::from_config(&config);
        Ok(Self {
            records,
            blobs,
            analyzer: MotionAnalyzer::new(config, flow),
            opener: Box::new(|path: &Path| -> Result<Box<dyn FrameSource>> {
                let source = FfmpegFrameSource::open(path)?;
                Ok(Box::new(source) as Box<dyn FrameSource>)
            }),
            work_dir: work_dir.to_path_buf(),
            prefix: prefix.to_string(),
            utc_offset_hours,
            clock,
            processed: None,
        })
    }

    /// 替换帧源 (离线测试或其它解码方式)
    pub fn with_source_opener(mut self, opener: SourceOpener) -> Self {
        self.opener = opener;
        self
    }

    pub fn is_processed(&self, blob_name: &str) -> bool {
        self.processed
            .as_ref()
            .is_some_and(|set| set.contains(blob_name))
    }

    /// 已处理集合, 首次调用时从记录库加载
    fn processed_set(&mut self) -> Result<&mut HashSet<String>> {
        if self.processed.is_none() {
            let seeded: HashSet<String> = self
                .records
                .motion_summaries()?
                .into_iter()
                .map(|r| r.video_path)
                .collect();
            info!("📋 已分析片段: {} 个", seeded.len());
            self.processed = Some(seeded);
        }
        Ok(self.processed.get_or_insert_with(HashSet::new))
    }

    /// 处理本轮所有新片段, 返回新写入的记录
    ///
    /// 记录库/文件库故障直接返回, 由调度器退避.
    pub fn poll_once(&mut self) -> Result<Vec<MotionSummaryRecord>> {
        info!("🔄 检查新视频...");
        let names = self.blobs.list(&self.prefix)?;
        let prefix = self.prefix.clone();
        let processed = self.processed_set()?;
        let pending: Vec<String> = names
            .into_iter()
            .map(|b| b.name)
            .filter(|name| is_clip(name, &prefix) && !processed.contains(name))
            .collect();

        let mut saved = Vec::new();
        for blob_name in pending {
            info!("📥 新视频: {}", blob_name);
            match self.process(&blob_name) {
                Ok(record) => {
                    self.processed_set()?.insert(blob_name);
                    saved.push(record);
                }
                Err(e) if e.is_transient() => return Err(e),
                Err(e) => warn!("⚠️  {} 分析失败, 下轮重试: {}", blob_name, e),
            }
        }
        Ok(saved)
    }

    fn process(&self, blob_name: &str) -> Result<MotionSummaryRecord> {
        let file_name = Path::new(blob_name)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| PipelineError::SourceUnavailable(blob_name.to_string()))?;
        let copy = WorkingCopy {
            path: self.work_dir.join(file_name),
        };
        self.blobs.download(blob_name, &copy.path)?;

        info!("🔍 分析中...");
        let mut source = (self.opener)(&copy.path)?;
        let summary = self.analyzer.analyze(source.as_mut())?;

        let now = self.clock.now();
        let analysis_id = gen_record_id("analysis", now, self.utc_offset_hours);
        let record = MotionSummaryRecord::from_summary(
            &analysis_id,
            blob_name,
            &summary,
            TimestampValue::structured(now),
        );
        self.records.append_motion(&record)?;
        info!(
            "💾 已保存 {}: {:.2} ({})",
            analysis_id, record.overall_score, record.overall_level
        );
        Ok(record)
    }
}
