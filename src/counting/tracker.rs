//! IoU 两轮匹配跟踪器 (ByteTrack 思路)
//!
//! 只用于没有自带轨迹ID的原始检测结果:
//! 1. 高分框优先匹配所有轨迹 (IOU)
//! 2. 低分框救援第一轮没匹配上的轨迹
//! 3. 未匹配的高分框新建轨迹, 丢失过久的轨迹删除
//!
//! 运动模型只是中心点匀速预测, 不做外观特征.

use std::cmp::Ordering;

use crate::config::TrackerParams;

use super::types::{BBox, TrackId};

/// 单条轨迹
#[derive(Clone, Debug)]
struct Track {
    id: TrackId,
    bbox: BBox,
    /// 中心点速度 (像素/帧)
    velocity: (f32, f32),
    frames_lost: u32,
}

impl Track {
    fn new(id: TrackId, bbox: BBox) -> Self {
        Self {
            id,
            bbox,
            velocity: (0.0, 0.0),
            frames_lost: 0,
        }
    }

    /// 按匀速模型预测当前帧位置
    fn predicted(&self) -> BBox {
        let steps = (self.frames_lost + 1) as f32;
        self.bbox
            .shifted(self.velocity.0 * steps, self.velocity.1 * steps)
    }

    fn update(&mut self, bbox: BBox) {
        let steps = (self.frames_lost + 1) as f32;
        let old = self.bbox.center();
        let new = bbox.center();
        let vx = (new.x - old.x) / steps;
        let vy = (new.y - old.y) / steps;
        // 速度平滑, 压住检测框抖动
        self.velocity = (
            0.5 * self.velocity.0 + 0.5 * vx,
            0.5 * self.velocity.1 + 0.5 * vy,
        );
        self.bbox = bbox;
        self.frames_lost = 0;
    }
}

/// IoU 跟踪器
pub struct IouTracker {
    tracks: Vec<Track>,
    next_id: TrackId,
    params: TrackerParams,
}

impl IouTracker {
    pub fn new(params: TrackerParams) -> Self {
        Self {
            tracks: Vec::new(),
            next_id: 1,
            params,
        }
    }

    /// 当前存活的轨迹数 (含丢失中的)
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// 更新一帧, 返回本帧出现的 (轨迹ID, 检测框)
    pub fn update(&mut self, detections: &[BBox]) -> Vec<(TrackId, BBox)> {
        let mut high: Vec<usize> = Vec::new();
        let mut low: Vec<usize> = Vec::new();
        for (idx, det) in detections.iter().enumerate() {
            if det.confidence >= self.params.high_score_threshold {
                high.push(idx);
            } else if det.confidence >= self.params.low_score_threshold {
                low.push(idx);
            }
        }

        // 第一轮: 高分框 + 所有轨迹
        let all_tracks: Vec<usize> = (0..self.tracks.len()).collect();
        let mut assignments =
            self.greedy_match(detections, &high, &all_tracks, self.params.high_iou_threshold);

        // 第二轮: 低分框救援剩余轨迹
        let mut track_matched = vec![false; self.tracks.len()];
        for &(_, track_idx) in &assignments {
            track_matched[track_idx] = true;
        }
        let remaining: Vec<usize> = (0..self.tracks.len())
            .filter(|&i| !track_matched[i])
            .collect();
        let rescued = self.greedy_match(detections, &low, &remaining, self.params.low_iou_threshold);
        assignments.extend(rescued);

        let mut det_matched = vec![false; detections.len()];
        let mut track_matched = vec![false; self.tracks.len()];
        let mut seen: Vec<(TrackId, BBox)> = Vec::with_capacity(assignments.len());

        for (det_idx, track_idx) in assignments {
            det_matched[det_idx] = true;
            track_matched[track_idx] = true;
            let track = &mut self.tracks[track_idx];
            track.update(detections[det_idx]);
            seen.push((track.id, track.bbox));
        }

        for (track_idx, matched) in track_matched.iter().enumerate() {
            if !matched {
                self.tracks[track_idx].frames_lost += 1;
            }
        }

        // 未匹配的高分框 → 新轨迹
        for &det_idx in &high {
            if !det_matched[det_idx] {
                let track = Track::new(self.next_id, detections[det_idx]);
                self.next_id += 1;
                seen.push((track.id, track.bbox));
                self.tracks.push(track);
            }
        }

        let max_lost = self.params.max_lost_frames;
        self.tracks.retain(|t| t.frames_lost <= max_lost);

        seen
    }

    /// 贪心IOU匹配, 返回 (检测下标, 轨迹下标)
    fn greedy_match(
        &self,
        detections: &[BBox],
        det_indices: &[usize],
        track_indices: &[usize],
        iou_threshold: f32,
    ) -> Vec<(usize, usize)> {
        if det_indices.is_empty() || track_indices.is_empty() {
            return Vec::new();
        }

        let mut candidates: Vec<(f32, usize, usize)> = Vec::new();
        for &det_idx in det_indices {
            for &track_idx in track_indices {
                let iou = detections[det_idx].iou(&self.tracks[track_idx].predicted());
                if iou >= iou_threshold {
                    candidates.push((iou, det_idx, track_idx));
                }
            }
        }

        // IOU从大到小
        candidates.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

        let mut used_det = vec![false; detections.len()];
        let mut used_track = vec![false; self.tracks.len()];
        let mut assignments = Vec::new();
        for (_, det_idx, track_idx) in candidates {
            if !used_det[det_idx] && !used_track[track_idx] {
                used_det[det_idx] = true;
                used_track[track_idx] = true;
                assignments.push((det_idx, track_idx));
            }
        }
        assignments
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person(x: f32, y: f32, conf: f32) -> BBox {
        BBox::new(x, y, x + 40.0, y + 100.0, conf, 0)
    }

    #[test]
    fn test_keeps_id_for_moving_person() {
        let mut tracker = IouTracker::new(TrackerParams::default());
        let first = tracker.update(&[person(100.0, 100.0, 0.9)]);
        assert_eq!(first.len(), 1);
        let id = first[0].0;

        for step in 1..10 {
            let out = tracker.update(&[person(100.0, 100.0 + step as f32 * 8.0, 0.9)]);
            assert_eq!(out.len(), 1);
            assert_eq!(out[0].0, id);
        }
    }

    #[test]
    fn test_low_score_box_rescues_but_never_creates() {
        let mut tracker = IouTracker::new(TrackerParams::default());
        // 低分框不建轨迹
        assert!(tracker.update(&[person(0.0, 0.0, 0.2)]).is_empty());
        assert_eq!(tracker.track_count(), 0);

        let id = tracker.update(&[person(0.0, 0.0, 0.9)])[0].0;
        let rescued = tracker.update(&[person(2.0, 2.0, 0.2)]);
        assert_eq!(rescued, vec![(id, person(2.0, 2.0, 0.2))]);
    }

    #[test]
    fn test_two_people_get_distinct_ids() {
        let mut tracker = IouTracker::new(TrackerParams::default());
        let out = tracker.update(&[person(0.0, 0.0, 0.9), person(500.0, 0.0, 0.9)]);
        assert_eq!(out.len(), 2);
        assert_ne!(out[0].0, out[1].0);
    }

    #[test]
    fn test_lost_track_expires() {
        let params = TrackerParams {
            max_lost_frames: 2,
            ..TrackerParams::default()
        };
        let mut tracker = IouTracker::new(params);
        let id = tracker.update(&[person(0.0, 0.0, 0.9)])[0].0;
        for _ in 0..3 {
            tracker.update(&[]);
        }
        assert_eq!(tracker.track_count(), 0);
        let again = tracker.update(&[person(0.0, 0.0, 0.9)]);
        assert_ne!(again[0].0, id);
    }
}
