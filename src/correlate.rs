//! 时间戳关联 (Timestamp Correlator)
//!
//! 以视频记录为主序列, 分别在人数记录与运动记录中找时间差最小的一条
//! (最近邻, 默认不限距离). 三个流程各自写入时间戳, 彼此不同步, 所以
//! 结果的正确性依赖三个流程的节奏大致相同.
//!
//! 复杂度 O(P × (A + B)); 只对最近一小段视频做关联, 线性扫描足够.

use chrono::{DateTime, Duration, Utc};
use tracing::warn;

use crate::config::CorrelateConfig;
use crate::records::{MotionSummaryRecord, PeopleCountRecord, TimestampValue, VideoRecord};

/// 人数记录缺失时的默认值
pub const DEFAULT_NUM_PEOPLE: i64 = 0;
/// 运动记录缺失时的默认等级文本
pub const UNKNOWN_MOVE_RATE: &str = "Unknown";

/// 关联后的一行 (只用于展示, 不落库)
#[derive(Clone, Debug, PartialEq)]
pub struct CorrelatedRow {
    /// 展示时间 `HH:MM:SS`
    pub timestamp: String,
    pub num_people: i64,
    pub move_rate: String,
    pub video_name: String,
    /// 视频时间戳 (排序用)
    pub captured_at: DateTime<Utc>,
}

pub struct Correlator {
    max_gap: Option<Duration>,
    utc_offset_hours: i32,
}

impl Correlator {
    pub fn new(max_gap: Option<Duration>, utc_offset_hours: i32) -> Self {
        Self {
            max_gap,
            utc_offset_hours,
        }
    }

    pub fn from_config(config: &CorrelateConfig) -> Self {
        Self::new(
            config.max_gap_secs.map(Duration::seconds),
            config.utc_offset_hours,
        )
    }

    /// 关联三个记录流, 按视频时间升序输出
    ///
    /// 时间戳缺失或无法解析的记录单独跳过.
    pub fn correlate(
        &self,
        primary: &[VideoRecord],
        people: &[PeopleCountRecord],
        motion: &[MotionSummaryRecord],
    ) -> Vec<CorrelatedRow> {
        let people: Vec<(DateTime<Utc>, &PeopleCountRecord)> = people
            .iter()
            .filter_map(|r| with_time("people_counter", &r.video_name, r.timestamp.as_ref(), r))
            .collect();
        let motion: Vec<(DateTime<Utc>, &MotionSummaryRecord)> = motion
            .iter()
            .filter_map(|r| with_time("moverate", &r.analysis_id, r.timestamp.as_ref(), r))
            .collect();

        let mut rows: Vec<CorrelatedRow> = primary
            .iter()
            .filter_map(|video| {
                let ts = video.timestamp.as_ref();
                let (captured_at, video) = with_time("videos", &video.file_name, ts, video)?;

                let num_people = self
                    .nearest(captured_at, &people)
                    .map(|p| p.total_count)
                    .unwrap_or(DEFAULT_NUM_PEOPLE);
                let move_rate = self
                    .nearest(captured_at, &motion)
                    .map(|m| m.overall_level.label().to_string())
                    .unwrap_or_else(|| UNKNOWN_MOVE_RATE.to_string());

                Some(CorrelatedRow {
                    timestamp: ts
                        .map(|t| t.display(self.utc_offset_hours))
                        .unwrap_or_default(),
                    num_people,
                    move_rate,
                    video_name: video.file_name.clone(),
                    captured_at,
                })
            })
            .collect();

        rows.sort_by_key(|r| r.captured_at);
        rows
    }

    /// 时间差最小的记录; 相同差值保留先出现的一条
    fn nearest<'a, T>(&self, at: DateTime<Utc>, candidates: &[(DateTime<Utc>, &'a T)]) -> Option<&'a T> {
        let mut best: Option<(Duration, &'a T)> = None;
        for (ts, record) in candidates {
            let diff = if *ts >= at { *ts - at } else { at - *ts };
            if let Some(gap) = self.max_gap {
                if diff > gap {
                    continue;
                }
            }
            if best.map_or(true, |(d, _)| diff < d) {
                best = Some((diff, *record));
            }
        }
        best.map(|(_, r)| r)
    }
}

fn with_time<'a, T>(
    collection: &str,
    key: &str,
    ts: Option<&TimestampValue>,
    record: &'a T,
) -> Option<(DateTime<Utc>, &'a T)> {
    match ts.and_then(|t| t.parse()) {
        Some(dt) => Some((dt, record)),
        None => {
            warn!("⚠️  {} 记录 {} 时间戳缺失或无法解析, 跳过", collection, key);
            None
        }
    }
}
