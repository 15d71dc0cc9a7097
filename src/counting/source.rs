//! 跟踪结果输入 (Tracked-detection source)
//!
//! 检测器/跟踪器在本系统之外运行, 每个片段产出一个 jsonl 文件, 每行一帧:
//!
//! ```json
//! {"frame_index": 12, "detections": [{"track_id": 3, "bbox": [x1, y1, x2, y2], "confidence": 0.8, "class_id": 0}]}
//! ```
//!
//! 所有框都带 `track_id` 时直接使用; 否则交给 [`IouTracker`] 重新分配ID.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::CountingConfig;
use crate::error::{PipelineError, Result};

use super::counter::{CountingLine, CrossingCounterState, CrossingEvent, LineCrossingCounter};
use super::tracker::IouTracker;
use super::types::{BBox, TrackId, TrackedDetection, TrackedFrame};

/// 逐帧产出跟踪结果
pub trait TrackSource {
    fn next_frame(&mut self) -> Option<TrackedFrame>;
}

/// 文件中的一个框
#[derive(Clone, Debug, Deserialize)]
pub struct DetectionEntry {
    #[serde(default)]
    pub track_id: Option<TrackId>,
    pub bbox: [f32; 4],
    #[serde(default = "default_confidence")]
    pub confidence: f32,
    #[serde(default)]
    pub class_id: u32,
}

fn default_confidence() -> f32 {
    1.0
}

/// 文件中的一帧
#[derive(Clone, Debug, Deserialize)]
pub struct DetectionLine {
    pub frame_index: u64,
    #[serde(default)]
    pub detections: Vec<DetectionEntry>,
}

impl DetectionEntry {
    pub fn to_bbox(&self) -> BBox {
        let [x1, y1, x2, y2] = self.bbox;
        BBox::new(x1, y1, x2, y2, self.confidence, self.class_id)
    }
}

/// 一个片段的全部检测结果
#[derive(Clone, Debug, Default)]
pub struct DetectionLog {
    frames: Vec<DetectionLine>,
}

impl DetectionLog {
    /// 读取 jsonl 文件, 坏行跳过
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            PipelineError::SourceUnavailable(format!("{}: {}", path.display(), e))
        })?;

        let mut frames = Vec::new();
        for (line_no, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| {
                PipelineError::SourceUnavailable(format!("{}: {}", path.display(), e))
            })?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<DetectionLine>(&line) {
                Ok(frame) => frames.push(frame),
                Err(e) => warn!("⚠️  检测结果第 {} 行无法解析, 跳过: {}", line_no + 1, e),
            }
        }
        Ok(Self::from_frames(frames))
    }

    pub fn from_frames(mut frames: Vec<DetectionLine>) -> Self {
        frames.sort_by_key(|f| f.frame_index);
        Self { frames }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// 是否所有框都已带轨迹ID
    pub fn is_pre_tracked(&self) -> bool {
        self.frames
            .iter()
            .flat_map(|f| f.detections.iter())
            .all(|d| d.track_id.is_some())
    }
}

/// 已带ID的检测结果: 只做类别/置信度过滤
pub struct PreTrackedSource {
    frames: std::vec::IntoIter<DetectionLine>,
    person_class: u32,
    conf_threshold: f32,
}

impl PreTrackedSource {
    pub fn new(log: DetectionLog, person_class: u32, conf_threshold: f32) -> Self {
        Self {
            frames: log.frames.into_iter(),
            person_class,
            conf_threshold,
        }
    }
}

impl TrackSource for PreTrackedSource {
    fn next_frame(&mut self) -> Option<TrackedFrame> {
        let line = self.frames.next()?;
        let detections = line
            .detections
            .iter()
            .filter(|d| d.class_id == self.person_class && d.confidence >= self.conf_threshold)
            .filter_map(|d| {
                d.track_id
                    .map(|id| TrackedDetection::from_bbox(id, &d.to_bbox(), line.frame_index))
            })
            .collect();
        Some(TrackedFrame {
            frame_index: line.frame_index,
            detections,
        })
    }
}

/// 原始检测框 → IoU跟踪 → 带ID结果
pub struct TrackingSource {
    frames: std::vec::IntoIter<DetectionLine>,
    tracker: IouTracker,
    person_class: u32,
    conf_threshold: f32,
}

impl TrackingSource {
    pub fn new(log: DetectionLog, config: &CountingConfig) -> Self {
        Self {
            frames: log.frames.into_iter(),
            tracker: IouTracker::new(config.tracker.clone()),
            person_class: config.person_class,
            conf_threshold: config.conf_threshold,
        }
    }
}

impl TrackSource for TrackingSource {
    fn next_frame(&mut self) -> Option<TrackedFrame> {
        let line = self.frames.next()?;
        let boxes: Vec<BBox> = line
            .detections
            .iter()
            .filter(|d| d.class_id == self.person_class && d.confidence >= self.conf_threshold)
            .map(|d| d.to_bbox())
            .collect();
        let detections = self
            .tracker
            .update(&boxes)
            .into_iter()
            .map(|(id, bbox)| TrackedDetection::from_bbox(id, &bbox, line.frame_index))
            .collect();
        Some(TrackedFrame {
            frame_index: line.frame_index,
            detections,
        })
    }
}

/// 根据文件内容选择输入方式
pub fn track_source(log: DetectionLog, config: &CountingConfig) -> Box<dyn TrackSource> {
    if log.is_pre_tracked() {
        debug!("检测结果已带轨迹ID, 直接计数");
        Box::new(PreTrackedSource::new(
            log,
            config.person_class,
            config.conf_threshold,
        ))
    } else {
        debug!("检测结果缺少轨迹ID, 使用IoU跟踪器");
        Box::new(TrackingSource::new(log, config))
    }
}

/// 一个片段的计数结果
#[derive(Clone, Debug, Default)]
pub struct CountSummary {
    pub state: CrossingCounterState,
    pub frames: u64,
    pub events: Vec<CrossingEvent>,
}

/// 对一个片段跑完越线计数
pub fn count_clip(source: &mut dyn TrackSource, config: &CountingConfig) -> CountSummary {
    let line = CountingLine::new(config.line_start, config.line_end);
    let mut counter = LineCrossingCounter::new(line, config.max_age_frames);
    let mut summary = CountSummary::default();

    while let Some(frame) = source.next_frame() {
        summary.frames += 1;
        for event in counter.observe_frame(frame.frame_index, &frame.detections) {
            debug!(
                "帧 {}: ID{} {:?} | In={} Out={} Total={}",
                event.frame_index,
                event.track_id,
                event.direction,
                event.state_after.in_count,
                event.state_after.out_count,
                event.state_after.total_count
            );
            summary.events.push(event);
        }
    }

    summary.state = counter.finish();
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counting::counter::CrossingDirection;
    use std::io::Write;

    fn config_with_line_y(y: f32) -> CountingConfig {
        CountingConfig {
            line_start: (0.0, y),
            line_end: (100.0, y),
            ..CountingConfig::default()
        }
    }

    fn entry(track_id: Option<u64>, cy: f32, conf: f32) -> DetectionEntry {
        DetectionEntry {
            track_id,
            bbox: [10.0, cy - 50.0, 50.0, cy + 50.0],
            confidence: conf,
            class_id: 0,
        }
    }

    fn line(frame_index: u64, detections: Vec<DetectionEntry>) -> DetectionLine {
        DetectionLine {
            frame_index,
            detections,
        }
    }

    #[test]
    fn test_pre_tracked_counting() {
        let log = DetectionLog::from_frames(vec![
            line(1, vec![entry(Some(1), 80.0, 0.9)]),
            line(2, vec![entry(Some(1), 120.0, 0.9)]),
            line(3, vec![entry(Some(1), 90.0, 0.9)]),
        ]);
        assert!(log.is_pre_tracked());

        let config = config_with_line_y(100.0);
        let mut source = track_source(log, &config);
        let summary = count_clip(source.as_mut(), &config);

        assert_eq!(summary.frames, 3);
        assert_eq!(summary.events.len(), 2);
        assert_eq!(summary.events[0].direction, CrossingDirection::Out);
        assert_eq!(summary.state.in_count, 1);
        assert_eq!(summary.state.out_count, 1);
        assert_eq!(summary.state.total_count, 0);
    }

    #[test]
    fn test_other_classes_ignored() {
        let mut cat = entry(Some(5), 80.0, 0.9);
        cat.class_id = 15;
        let mut cat_later = entry(Some(5), 120.0, 0.9);
        cat_later.class_id = 15;
        let log = DetectionLog::from_frames(vec![line(1, vec![cat]), line(2, vec![cat_later])]);

        let config = config_with_line_y(100.0);
        let mut source = track_source(log, &config);
        assert_eq!(count_clip(source.as_mut(), &config).state.out_count, 0);
    }

    #[test]
    fn test_untracked_boxes_are_tracked_then_counted() {
        // 一个人每帧向下移动 10 像素, 穿过 y=100
        let frames = (0..6)
            .map(|i| line(i, vec![entry(None, 70.0 + i as f32 * 10.0, 0.9)]))
            .collect();
        let log = DetectionLog::from_frames(frames);
        assert!(!log.is_pre_tracked());

        let config = config_with_line_y(100.0);
        let mut source = track_source(log, &config);
        let summary = count_clip(source.as_mut(), &config);
        assert_eq!(summary.state.out_count, 1);
        assert_eq!(summary.state.total_count, -1);
    }

    #[test]
    fn test_open_skips_bad_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.jsonl");
        let mut file = File::create(&path).unwrap();
        writeln!(file, r#"{{"frame_index": 2, "detections": [{{"track_id": 1, "bbox": [0, 70, 10, 90]}}]}}"#).unwrap();
        writeln!(file, "garbage").unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"{{"frame_index": 1, "detections": []}}"#).unwrap();
        drop(file);

        let log = DetectionLog::open(&path).unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log.frames[0].frame_index, 1);
    }

    #[test]
    fn test_open_missing_file() {
        let err = DetectionLog::open(Path::new("/nonexistent/clip.jsonl")).unwrap_err();
        assert!(matches!(err, PipelineError::SourceUnavailable(_)));
    }
}
