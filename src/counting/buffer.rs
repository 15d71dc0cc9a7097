//! 轨迹位置缓存 (Track Position Buffer)
//!
//! 每个轨迹ID只保留最后一次看到的中心点. 缓存里没有的ID视为新轨迹,
//! 第一次出现不产生越线事件. 超过 `max_age_frames` 未出现的轨迹被清除,
//! 之后再出现也按新轨迹处理.

use std::collections::HashMap;

use super::types::{Centroid, TrackId};

#[derive(Clone, Copy, Debug)]
struct Entry {
    centroid: Centroid,
    last_seen: u64,
}

/// track_id → 最后位置
#[derive(Clone, Debug)]
pub struct TrackPositionBuffer {
    positions: HashMap<TrackId, Entry>,
    max_age_frames: u64,
}

impl TrackPositionBuffer {
    pub fn new(max_age_frames: u64) -> Self {
        Self {
            positions: HashMap::new(),
            max_age_frames,
        }
    }

    /// 最后位置 (不考虑是否过期)
    pub fn get(&self, track_id: TrackId) -> Option<Centroid> {
        self.positions.get(&track_id).map(|e| e.centroid)
    }

    /// 写入新位置, 返回仍然有效的上一位置
    ///
    /// 上一位置距今超过 `max_age_frames` 帧时返回 None, 与被清除的轨迹一致.
    pub fn update(&mut self, track_id: TrackId, centroid: Centroid, frame_index: u64) -> Option<Centroid> {
        let previous = self.positions.insert(
            track_id,
            Entry {
                centroid,
                last_seen: frame_index,
            },
        )?;

        if frame_index.saturating_sub(previous.last_seen) > self.max_age_frames {
            None
        } else {
            Some(previous.centroid)
        }
    }

    /// 清除过期轨迹, 返回清除数量
    pub fn evict_stale(&mut self, current_frame: u64) -> usize {
        let before = self.positions.len();
        let max_age = self.max_age_frames;
        self.positions
            .retain(|_, e| current_frame.saturating_sub(e.last_seen) <= max_age);
        before - self.positions.len()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn clear(&mut self) {
        self.positions.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_sighting_has_no_previous() {
        let mut buf = TrackPositionBuffer::new(10);
        assert_eq!(buf.update(1, Centroid::new(0.0, 80.0), 1), None);
        assert_eq!(buf.get(1), Some(Centroid::new(0.0, 80.0)));
    }

    #[test]
    fn test_update_returns_previous() {
        let mut buf = TrackPositionBuffer::new(10);
        buf.update(1, Centroid::new(0.0, 80.0), 1);
        let prev = buf.update(1, Centroid::new(0.0, 120.0), 2);
        assert_eq!(prev, Some(Centroid::new(0.0, 80.0)));
        assert_eq!(buf.get(1), Some(Centroid::new(0.0, 120.0)));
    }

    #[test]
    fn test_evict_stale() {
        let mut buf = TrackPositionBuffer::new(5);
        buf.update(1, Centroid::new(0.0, 0.0), 1);
        buf.update(2, Centroid::new(0.0, 0.0), 8);
        assert_eq!(buf.evict_stale(10), 1);
        assert_eq!(buf.len(), 1);
        assert!(buf.get(1).is_none());
        assert!(buf.get(2).is_some());
    }

    #[test]
    fn test_stale_previous_is_ignored() {
        let mut buf = TrackPositionBuffer::new(5);
        buf.update(7, Centroid::new(0.0, 80.0), 1);
        // 间隔 9 帧, 超过 5 帧
        assert_eq!(buf.update(7, Centroid::new(0.0, 120.0), 10), None);
        // 之后恢复正常
        assert!(buf.update(7, Centroid::new(0.0, 90.0), 11).is_some());
    }
}
