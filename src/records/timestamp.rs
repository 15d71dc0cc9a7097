//! 时间戳值 (Timestamp values)
//!
//! 记录里的时间戳有两种写法:
//! - 结构化: `{"seconds": 1704110400, "nanos": 0}`
//! - 文本:   RFC3339, `YYYY-MM-DD HH:MM:SS[.f]`, `YYYY-MM-DDTHH:MM:SS[.f]` (无时区按UTC)

use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::fixed_offset;

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// 记录中的时间点
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimestampValue {
    Structured { seconds: i64, nanos: u32 },
    Text(String),
}

impl TimestampValue {
    /// 结构化时间点
    pub fn structured(dt: DateTime<Utc>) -> Self {
        TimestampValue::Structured {
            seconds: dt.timestamp(),
            nanos: dt.timestamp_subsec_nanos(),
        }
    }

    /// ISO-8601 文本, 带展示时区偏移
    pub fn iso_text(dt: DateTime<Utc>, offset_hours: i32) -> Self {
        let local = dt.with_timezone(&fixed_offset(offset_hours));
        TimestampValue::Text(local.to_rfc3339_opts(SecondsFormat::Micros, false))
    }

    pub fn parse(&self) -> Option<DateTime<Utc>> {
        match self {
            TimestampValue::Structured { seconds, nanos } => {
                Utc.timestamp_opt(*seconds, *nanos).single()
            }
            TimestampValue::Text(text) => parse_timestamp(text),
        }
    }

    /// 展示用 `HH:MM:SS` (固定时区); 解析失败退回原文前19个字符
    pub fn display(&self, offset_hours: i32) -> String {
        match self.parse() {
            Some(dt) => dt
                .with_timezone(&fixed_offset(offset_hours))
                .format("%H:%M:%S")
                .to_string(),
            None => match self {
                TimestampValue::Text(text) if !text.is_empty() => {
                    text.chars().take(19).collect()
                }
                _ => "Unknown".to_string(),
            },
        }
    }
}

/// 解析文本时间戳
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// 从原始文档中取 `timestamp` 字段
pub fn timestamp_of(doc: &Value) -> Option<DateTime<Utc>> {
    let value = doc.get("timestamp")?;
    serde_json::from_value::<TimestampValue>(value.clone())
        .ok()?
        .parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_accepted_forms() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2024-01-01T12:00:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-01T19:00:00+07:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-01 12:00:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-01T12:00:00"), Some(expected));
        assert!(parse_timestamp("2024-01-01 12:00:00.250").is_some());
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_untagged_serde() {
        let v: TimestampValue = serde_json::from_value(json!({"seconds": 10, "nanos": 5})).unwrap();
        assert_eq!(v, TimestampValue::Structured { seconds: 10, nanos: 5 });
        let v: TimestampValue = serde_json::from_value(json!("2024-01-01 00:00:00")).unwrap();
        assert!(matches!(v, TimestampValue::Text(_)));
    }

    #[test]
    fn test_display_in_bangkok() {
        let v = TimestampValue::Text("2024-01-01T20:30:15Z".to_string());
        assert_eq!(v.display(7), "03:30:15");
        let naive = TimestampValue::Text("2024-01-01 01:00:00".to_string());
        assert_eq!(naive.display(7), "08:00:00");
    }

    #[test]
    fn test_display_fallbacks() {
        let v = TimestampValue::Text("2024-13-45 99:99:99 garbage".to_string());
        assert_eq!(v.display(7), "2024-13-45 99:99:99");
        assert_eq!(TimestampValue::Text(String::new()).display(7), "Unknown");
    }

    #[test]
    fn test_iso_text_round_trip() {
        let dt = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
        let v = TimestampValue::iso_text(dt, 7);
        match &v {
            TimestampValue::Text(text) => assert!(text.starts_with("2024-05-06T14:08:09")),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(v.parse(), Some(dt));
        assert_eq!(TimestampValue::structured(dt).parse(), Some(dt));
    }

    #[test]
    fn test_timestamp_of_document() {
        assert!(timestamp_of(&json!({"timestamp": {"seconds": 0, "nanos": 0}})).is_some());
        assert!(timestamp_of(&json!({"timestamp": "nope"})).is_none());
        assert!(timestamp_of(&json!({"other": 1})).is_none());
    }
}
