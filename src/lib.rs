#![allow(clippy::type_complexity)]
// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 楼宇人流视频分析 (Building occupancy video analytics)
//!
//! 三个独立流程通过记录库同步:
//! 1. 计数流程: 追踪框 → 越线计数 → PeopleCountRecord
//! 2. 运动流程: 视频帧 → 稠密光流 → MotionSummaryRecord
//! 3. 展示流程: VideoRecord + 最近邻时间关联 → 报表/图表/播放队列
pub mod config; // 流程配置参数
pub mod correlate; // 时间戳关联
pub mod counting; // 越线计数
pub mod dashboard; // 展示边界
pub mod error; // 错误分类
pub mod input; // 视频帧输入
pub mod logging; // 日志初始化
pub mod motion; // 运动强度分析
pub mod pipeline; // 三个处理流程 + 调度
pub mod playback; // 播放队列
pub mod records; // 记录类型
pub mod store; // 记录库与文件库

pub use crate::config::PipelineConfig;
pub use crate::error::{PipelineError, StoreError};

use chrono::{DateTime, FixedOffset, Offset, Utc};
use rand::Rng;

/// 展示时区默认偏移 (Asia/Bangkok, UTC+7)
pub const DEFAULT_UTC_OFFSET_HOURS: i32 = 7;

/// 固定偏移时区, 越界时退回UTC
pub fn fixed_offset(hours: i32) -> FixedOffset {
    FixedOffset::east_opt(hours * 60 * 60).unwrap_or_else(|| Utc.fix())
}

/// 生成时间字符串, 日期与时间之间用 `delimiter` 连接
pub fn gen_time_string(now: DateTime<Utc>, offset_hours: i32, delimiter: &str) -> String {
    let t_now = now.with_timezone(&fixed_offset(offset_hours));
    let fmt = format!("%Y%m%d{}%H%M%S", delimiter);
    t_now.format(&fmt).to_string()
}

/// 生成记录ID: `{prefix}_{YYYYmmdd_HHMMSS}_{8位十六进制}`
pub fn gen_record_id(prefix: &str, now: DateTime<Utc>, offset_hours: i32) -> String {
    let suffix: u32 = rand::thread_rng().gen();
    format!(
        "{}_{}_{:08x}",
        prefix,
        gen_time_string(now, offset_hours, "_"),
        suffix
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_time_string_uses_offset() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 20, 30, 0).unwrap();
        assert_eq!(gen_time_string(now, 7, "_"), "20240102_033000");
    }

    #[test]
    fn test_record_id_shape() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 5, 0, 0).unwrap();
        let id = gen_record_id("analysis", now, 7);
        assert!(id.starts_with("analysis_20240101_120000_"));
        assert_eq!(id.len(), "analysis_20240101_120000_".len() + 8);
    }
}
