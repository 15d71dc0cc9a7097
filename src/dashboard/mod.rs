/// 展示边界 (Presentation boundary)
///
/// 三个只读操作, 可被多个请求同时调用:
/// - correlated_rows: 最近 N 个视频的关联报表
/// - next_video:      播放队列的下一项
/// - chart:           运动等级 / 人数图表 (PNG)
///
/// 不向调用方抛错: 记录库故障时返回空结果, 由展示层自行处理.
pub mod chart;

pub use chart::{render_png, ChartImage, ChartKind, ChartSeries};

use std::sync::{Arc, Mutex};

use tracing::error;

use crate::config::PipelineConfig;
use crate::correlate::{CorrelatedRow, Correlator};
use crate::error::Result;
use crate::playback::{PlaybackItem, PlaybackQueue};
use crate::store::{BlobStore, Records};

pub struct Dashboard {
    records: Records,
    correlator: Correlator,
    playback: Mutex<PlaybackQueue>,
    window: usize,
}

impl Dashboard {
    pub fn new(records: Records, blobs: Arc<dyn BlobStore>, config: &PipelineConfig) -> Self {
        Self {
            correlator: Correlator::from_config(&config.correlate),
            playback: Mutex::new(PlaybackQueue::new(
                records.clone(),
                blobs,
                config.playback.clone(),
            )),
            window: config.correlate.recent_window,
            records,
        }
    }

    /// 默认窗口
    pub fn window(&self) -> usize {
        self.window
    }

    /// 最近 `limit` 个视频与人数/运动记录的关联结果, 按时间升序
    pub fn correlated_rows(&self, limit: usize) -> Vec<CorrelatedRow> {
        match self.try_correlated_rows(limit) {
            Ok(rows) => rows,
            Err(e) => {
                error!("❌ 关联数据读取失败: {}", e);
                Vec::new()
            }
        }
    }

    fn try_correlated_rows(&self, limit: usize) -> Result<Vec<CorrelatedRow>> {
        let videos = self.records.latest_videos(limit)?;
        let people = self.records.people_counts()?;
        let motion = self.records.motion_summaries()?;
        Ok(self.correlator.correlate(&videos, &people, &motion))
    }

    pub fn next_video(&self) -> Option<PlaybackItem> {
        match self.playback.lock() {
            Ok(mut queue) => queue.next(),
            Err(_) => {
                error!("❌ 播放队列锁已损坏");
                None
            }
        }
    }

    /// 基于默认窗口的关联结果画图; 没有数据时返回 None
    pub fn chart(&self, kind: ChartKind) -> Option<ChartImage> {
        let rows = self.correlated_rows(self.window);
        let series = match kind {
            ChartKind::MoveRate => ChartSeries::move_rate(&rows),
            ChartKind::PeopleCount => ChartSeries::people_count(&rows),
        };
        match render_png(&series) {
            Ok(chart) => chart,
            Err(e) => {
                error!("❌ 图表渲染失败: {}", e);
                None
            }
        }
    }
}
