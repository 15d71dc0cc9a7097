/// 类型化记录读写
///
/// 读取时逐条解码, 解码失败的文档记一条警告后跳过, 不影响其它记录.
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use super::{RecordStore, StoredDocument};
use crate::error::{PipelineError, Result, StoreError};
use crate::records::{
    MotionSummaryRecord, PeopleCountRecord, VideoRecord, MOVERATE, PEOPLE_COUNTER, VIDEOS,
};

#[derive(Clone)]
pub struct Records {
    store: Arc<dyn RecordStore>,
}

impl Records {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    fn append<T: Serialize>(&self, collection: &str, id: Option<String>, record: &T) -> Result<String> {
        let doc = serde_json::to_value(record).map_err(StoreError::from)?;
        Ok(self.store.append(collection, id, doc)?)
    }

    pub fn append_video(&self, record: &VideoRecord) -> Result<String> {
        self.append(VIDEOS, None, record)
    }

    pub fn append_people_count(&self, id: Option<String>, record: &PeopleCountRecord) -> Result<String> {
        self.append(PEOPLE_COUNTER, id, record)
    }

    /// 以 analysis_id 作为文档ID
    pub fn append_motion(&self, record: &MotionSummaryRecord) -> Result<String> {
        self.append(MOVERATE, Some(record.analysis_id.clone()), record)
    }

    pub fn videos(&self) -> Result<Vec<VideoRecord>> {
        Ok(decode_all(VIDEOS, self.store.query_all(VIDEOS)?))
    }

    /// 最近的 `limit` 个视频, 新的在前
    pub fn latest_videos(&self, limit: usize) -> Result<Vec<VideoRecord>> {
        Ok(decode_all(VIDEOS, self.store.query_latest(VIDEOS, limit)?))
    }

    pub fn people_counts(&self) -> Result<Vec<PeopleCountRecord>> {
        Ok(decode_all(PEOPLE_COUNTER, self.store.query_all(PEOPLE_COUNTER)?))
    }

    pub fn motion_summaries(&self) -> Result<Vec<MotionSummaryRecord>> {
        Ok(decode_all(MOVERATE, self.store.query_all(MOVERATE)?))
    }
}

fn decode_all<T: DeserializeOwned>(collection: &str, docs: Vec<StoredDocument>) -> Vec<T> {
    docs.into_iter()
        .filter_map(|doc| match decode(collection, doc) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("⚠️  {}", e);
                None
            }
        })
        .collect()
}

fn decode<T: DeserializeOwned>(collection: &str, doc: StoredDocument) -> Result<T> {
    serde_json::from_value(doc.data).map_err(|e| PipelineError::MalformedRecord {
        collection: collection.to_string(),
        id: doc.id,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::TimestampValue;
    use crate::store::MemoryStore;
    use serde_json::json;

    #[test]
    fn test_malformed_documents_skipped() {
        let store = Arc::new(MemoryStore::new());
        store
            .append(VIDEOS, None, json!({"fileName": "a.mp4", "url": "u"}))
            .unwrap();
        store.append(VIDEOS, None, json!({"url": "no name"})).unwrap();
        store
            .append(PEOPLE_COUNTER, None, json!({"video_name": "v", "in": "x"}))
            .unwrap();

        let records = Records::new(store);
        assert_eq!(records.videos().unwrap().len(), 1);
        assert!(records.people_counts().unwrap().is_empty());
    }

    #[test]
    fn test_round_trip_through_store() {
        let records = Records::new(Arc::new(MemoryStore::new()));
        let video = VideoRecord {
            file_name: "camera_1.mp4".to_string(),
            url: "file:///blobs/videos/camera_1.mp4".to_string(),
            timestamp: Some(TimestampValue::Text("2024-01-01 00:00:00".to_string())),
        };
        records.append_video(&video).unwrap();
        assert_eq!(records.latest_videos(10).unwrap(), vec![video]);
    }
}
