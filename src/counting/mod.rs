/// 越线计数系统 (Line-Crossing Counting)
///
/// 每个片段一个计数器, 片段结束后丢弃
/// - Buffer:  轨迹位置缓存
/// - Counter: 水平阈值越线判定 + 进/出/净人数
/// - Tracker: 原始检测框的IoU两轮跟踪
/// - Source:  外部检测/跟踪结果输入
pub mod buffer;
pub mod counter;
pub mod source;
pub mod tracker;
pub mod types;

pub use buffer::TrackPositionBuffer;
pub use counter::{
    classify_transition, CountingLine, CrossingCounterState, CrossingDirection, CrossingEvent,
    LineCrossingCounter,
};
pub use source::{count_clip, track_source, CountSummary, DetectionLog, TrackSource};
pub use tracker::IouTracker;
pub use types::{BBox, Centroid, TrackId, TrackedDetection, TrackedFrame};
