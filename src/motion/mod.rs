/// 运动强度分析 (Motion Intensity)
///
/// - Flow:     帧预处理 + 金字塔稠密光流
/// - Analyzer: 指数平滑, 10段分段, 等级映射
pub mod analyzer;
pub mod flow;

pub use analyzer::{MotionAccumulator, MotionAnalyzer, MotionLevel, MotionSample, MotionSummary, SEGMENT_COUNT};
pub use flow::{prepare_frame, FlowEstimator, HornSchunckFlow};
