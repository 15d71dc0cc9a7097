//! 越线计数器 (Line-Crossing Counter)
//!
//! 计数线由两个端点定义, 但判定时只取两端点纵坐标的中点 `line_y`,
//! 即把任意直线近似为水平阈值. 这只对大致水平的计数线成立;
//! 横向范围被完全忽略, 倾斜安装的计数线需要在现场几何上重新确认.
//!
//! 相邻两次观测之间:
//! - `py < line_y <= cy` → 出 (out)
//! - `py >= line_y > cy` → 进 (in)
//!
//! 在阈值附近来回抖动的目标会被重复计数, 每一对相邻帧独立判定.

use serde::{Deserialize, Serialize};

use super::buffer::TrackPositionBuffer;
use super::types::{Centroid, TrackId, TrackedDetection};

/// 计数线 (两端点, 像素坐标)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CountingLine {
    pub start: (f32, f32),
    pub end: (f32, f32),
}

impl CountingLine {
    pub fn new(start: (f32, f32), end: (f32, f32)) -> Self {
        Self { start, end }
    }

    /// 现场部署几何: 起点 (0, h-50), 终点 (w-1450, h-300)
    pub fn from_frame_size(width: u32, height: u32) -> Self {
        Self {
            start: (0.0, height.saturating_sub(50) as f32),
            end: (
                width.saturating_sub(1450) as f32,
                height.saturating_sub(300) as f32,
            ),
        }
    }

    /// 水平判定阈值: 两端点纵坐标的中点
    pub fn threshold_y(&self) -> f32 {
        (self.start.1 + self.end.1) / 2.0
    }
}

/// 越线方向
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrossingDirection {
    In,
    Out,
}

/// 计数状态, 每个片段从零开始
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossingCounterState {
    pub in_count: u64,
    pub out_count: u64,
    pub total_count: i64,
}

impl CrossingCounterState {
    /// 记一次越线, 并重算 total = in - out
    pub fn record(&mut self, direction: CrossingDirection) {
        match direction {
            CrossingDirection::In => self.in_count += 1,
            CrossingDirection::Out => self.out_count += 1,
        }
        self.total_count = self.in_count as i64 - self.out_count as i64;
    }
}

/// 越线事件
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CrossingEvent {
    pub track_id: TrackId,
    pub direction: CrossingDirection,
    pub frame_index: u64,
    pub state_after: CrossingCounterState,
}

/// 判定一次相邻观测是否越线
pub fn classify_transition(py: f32, cy: f32, line_y: f32) -> Option<CrossingDirection> {
    if py < line_y && line_y <= cy {
        Some(CrossingDirection::Out)
    } else if py >= line_y && line_y > cy {
        Some(CrossingDirection::In)
    } else {
        None
    }
}

/// 单个片段的越线计数器
#[derive(Clone, Debug)]
pub struct LineCrossingCounter {
    line_y: f32,
    buffer: TrackPositionBuffer,
    state: CrossingCounterState,
}

impl LineCrossingCounter {
    pub fn new(line: CountingLine, max_age_frames: u64) -> Self {
        Self::with_threshold(line.threshold_y(), max_age_frames)
    }

    pub fn with_threshold(line_y: f32, max_age_frames: u64) -> Self {
        Self {
            line_y,
            buffer: TrackPositionBuffer::new(max_age_frames),
            state: CrossingCounterState::default(),
        }
    }

    pub fn line_y(&self) -> f32 {
        self.line_y
    }

    pub fn state(&self) -> CrossingCounterState {
        self.state
    }

    /// 当前缓存的轨迹数
    pub fn tracked(&self) -> usize {
        self.buffer.len()
    }

    /// 观测一个轨迹的新位置
    pub fn observe(
        &mut self,
        track_id: TrackId,
        centroid: Centroid,
        frame_index: u64,
    ) -> Option<CrossingEvent> {
        let previous = self.buffer.update(track_id, centroid, frame_index)?;
        let direction = classify_transition(previous.y, centroid.y, self.line_y)?;

        self.state.record(direction);
        Some(CrossingEvent {
            track_id,
            direction,
            frame_index,
            state_after: self.state,
        })
    }

    /// 观测一整帧: 先清除过期轨迹, 再逐个判定
    pub fn observe_frame(
        &mut self,
        frame_index: u64,
        detections: &[TrackedDetection],
    ) -> Vec<CrossingEvent> {
        self.buffer.evict_stale(frame_index);
        detections
            .iter()
            .filter_map(|d| self.observe(d.track_id, d.centroid, frame_index))
            .collect()
    }

    /// 结束片段, 交出最终状态 (位置缓存随之丢弃)
    pub fn finish(self) -> CrossingCounterState {
        self.state
    }
}
