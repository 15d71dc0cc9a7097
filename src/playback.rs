//! 播放队列 (Playback Queue)
//!
//! 最近视频的循环游标: 读到队尾 (或队列为空) 时从记录库重建快照,
//! 位置归零后再读. 重建时只保留文件库中仍存在的视频, 并为每个视频
//! 生成限时链接.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::config::PlaybackConfig;
use crate::records::{TimestampValue, VideoRecord};
use crate::store::{BlobStore, Records};

/// 一个可播放的视频
#[derive(Clone, Debug, PartialEq)]
pub struct PlaybackItem {
    pub name: String,
    pub url: String,
    pub expires_at: DateTime<Utc>,
    pub timestamp: Option<TimestampValue>,
    /// 文件库中的最后修改时间
    pub updated: Option<DateTime<Utc>>,
}

/// 队列快照与当前位置, `0 <= position <= queue.len()`
#[derive(Clone, Debug, Default)]
pub struct PlaybackCursor {
    queue: Vec<PlaybackItem>,
    position: usize,
}

impl PlaybackCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// 队尾或空队列都需要先重建
    pub fn is_exhausted(&self) -> bool {
        self.position >= self.queue.len()
    }

    /// 替换快照, 位置归零
    pub fn reset(&mut self, queue: Vec<PlaybackItem>) {
        self.queue = queue;
        self.position = 0;
    }

    /// 读取当前项并前进; 需要时先调用 `refresh` 重建
    pub fn next_with<F>(&mut self, refresh: F) -> Option<PlaybackItem>
    where
        F: FnOnce() -> Vec<PlaybackItem>,
    {
        if self.is_exhausted() {
            self.reset(refresh());
        }
        let item = self.queue.get(self.position)?.clone();
        self.position += 1;
        Some(item)
    }
}

/// 记录库 + 文件库支撑的播放队列
pub struct PlaybackQueue {
    cursor: PlaybackCursor,
    records: Records,
    blobs: Arc<dyn BlobStore>,
    config: PlaybackConfig,
}

impl PlaybackQueue {
    pub fn new(records: Records, blobs: Arc<dyn BlobStore>, config: PlaybackConfig) -> Self {
        Self {
            cursor: PlaybackCursor::new(),
            records,
            blobs,
            config,
        }
    }

    pub fn cursor(&self) -> &PlaybackCursor {
        &self.cursor
    }

    pub fn next(&mut self) -> Option<PlaybackItem> {
        let Self {
            cursor,
            records,
            blobs,
            config,
        } = self;
        cursor.next_with(|| build_snapshot(records, blobs.as_ref(), config))
    }
}

/// 新的在前; 记录库不可用时返回空快照
fn build_snapshot(records: &Records, blobs: &dyn BlobStore, config: &PlaybackConfig) -> Vec<PlaybackItem> {
    let videos = match records.latest_videos(usize::MAX) {
        Ok(v) => v,
        Err(e) => {
            error!("❌ 读取视频记录失败: {}", e);
            return Vec::new();
        }
    };

    let ttl = Duration::from_secs(config.url_ttl_secs.max(0) as u64);
    let items: Vec<PlaybackItem> = videos
        .into_iter()
        .filter_map(|video| playable(video, blobs, config, ttl))
        .collect();

    info!("🔄 播放队列已更新: {} 个视频", items.len());
    items
}

fn playable(
    video: VideoRecord,
    blobs: &dyn BlobStore,
    config: &PlaybackConfig,
    ttl: Duration,
) -> Option<PlaybackItem> {
    let blob_name = format!("{}{}", config.video_prefix, video.file_name);
    match blobs.exists(&blob_name) {
        Ok(true) => {}
        // 文件可能已被单独清理
        Ok(false) => return None,
        Err(e) => {
            warn!("⚠️  检查 {} 失败: {}", blob_name, e);
            return None;
        }
    }

    let signed = match blobs.signed_url(&blob_name, ttl) {
        Ok(s) => s,
        Err(e) => {
            warn!("⚠️  生成 {} 链接失败: {}", blob_name, e);
            return None;
        }
    };
    let updated = blobs
        .list(&blob_name)
        .ok()
        .and_then(|list| list.into_iter().find(|b| b.name == blob_name))
        .map(|b| b.updated);

    Some(PlaybackItem {
        name: video.file_name,
        url: signed.url,
        expires_at: signed.expires_at,
        timestamp: video.timestamp,
        updated,
    })
}
