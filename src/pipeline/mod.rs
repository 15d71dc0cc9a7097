/// 处理流程 (Processing passes)
///
/// 三个流程各自独立运行, 互不共享内存, 只通过记录库/文件库同步:
/// - Ingest:   登记新录制的片段 (上传 + VideoRecord)
/// - Counting: 取最早未计数的片段, 越线计数 → PeopleCountRecord
/// - Motion:   轮询未分析的片段, 运动强度 → MotionSummaryRecord
/// - Schedule: 可取消的轮询 + 故障退避
pub mod counting;
pub mod ingest;
pub mod motion;
pub mod schedule;

pub use counting::CountingPass;
pub use ingest::IngestPass;
pub use motion::{MotionPass, SourceOpener};
pub use schedule::{shutdown_channel, ChannelTicker, RunStats, Scheduler, ShutdownHandle, Ticker};

use chrono::{DateTime, Utc};

/// 时间来源 (记录时间戳与ID)
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// 系统时间
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// 固定时间 (测试)
#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// 文件库中的片段: 指定前缀下的 `.mp4`
pub(crate) fn is_clip(name: &str, prefix: &str) -> bool {
    name.starts_with(prefix) && name.ends_with(".mp4")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_clip() {
        assert!(is_clip("videos/camera_1.mp4", "videos/"));
        assert!(!is_clip("videos/camera_1.jsonl", "videos/"));
        assert!(!is_clip("counter_videos/camera_1.mp4", "videos/"));
    }
}
