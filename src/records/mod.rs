/// 记录类型 (Persisted records)
///
/// 三个集合, 各由一个流程写入, 写入后不再修改:
/// - videos:         VideoRecord (录制流程)
/// - people_counter: PeopleCountRecord (计数流程)
/// - moverate:       MotionSummaryRecord (运动流程)
pub mod timestamp;

pub use timestamp::{parse_timestamp, timestamp_of, TimestampValue};

use serde::{Deserialize, Serialize};

use crate::counting::CrossingCounterState;
use crate::motion::{MotionLevel, MotionSummary};

// ========== 集合名 ==========
pub const VIDEOS: &str = "videos";
pub const PEOPLE_COUNTER: &str = "people_counter";
pub const MOVERATE: &str = "moverate";

/// 录制片段元数据
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VideoRecord {
    #[serde(rename = "fileName")]
    pub file_name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<TimestampValue>,
}

/// 单个片段的越线计数结果
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PeopleCountRecord {
    /// 文件库中的片段名 (如 `videos/camera_xxx.mp4`)
    pub video_name: String,
    #[serde(rename = "in")]
    pub in_count: u64,
    #[serde(rename = "out")]
    pub out_count: u64,
    pub total_count: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<TimestampValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
}

impl PeopleCountRecord {
    pub fn from_state(
        video_name: &str,
        state: &CrossingCounterState,
        timestamp: TimestampValue,
        video_url: Option<String>,
    ) -> Self {
        Self {
            video_name: video_name.to_string(),
            in_count: state.in_count,
            out_count: state.out_count,
            total_count: state.total_count,
            timestamp: Some(timestamp),
            video_url,
        }
    }
}

/// 单个片段的运动摘要
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MotionSummaryRecord {
    pub analysis_id: String,
    pub video_path: String,
    pub overall_score: f64,
    pub overall_level: MotionLevel,
    #[serde(default)]
    pub segment_scores: Vec<f64>,
    pub frame_count: u64,
    #[serde(default)]
    pub degenerate_frames: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<TimestampValue>,
}

impl MotionSummaryRecord {
    /// 总分保留两位小数, 等级按未取整的分数计算
    pub fn from_summary(
        analysis_id: &str,
        video_path: &str,
        summary: &MotionSummary,
        timestamp: TimestampValue,
    ) -> Self {
        Self {
            analysis_id: analysis_id.to_string(),
            video_path: video_path.to_string(),
            overall_score: (summary.overall_score * 100.0).round() / 100.0,
            overall_level: summary.level,
            segment_scores: summary.segment_scores.to_vec(),
            frame_count: summary.frame_count,
            degenerate_frames: summary.degenerate_frames,
            timestamp: Some(timestamp),
        }
    }
}
