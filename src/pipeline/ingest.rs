/// 片段登记: 本地录制文件 → 文件库 `videos/<文件名>` + VideoRecord
///
/// RTSP 录制本身不在这里, 由外部录制程序产出本地 mp4.
use std::path::Path;
use std::sync::Arc;

use tracing::info;

use super::Clock;
use crate::error::{PipelineError, Result};
use crate::records::{TimestampValue, VideoRecord};
use crate::store::{BlobStore, Records};

pub struct IngestPass {
    records: Records,
    blobs: Arc<dyn BlobStore>,
    prefix: String,
    clock: Arc<dyn Clock>,
}

impl IngestPass {
    pub fn new(records: Records, blobs: Arc<dyn BlobStore>, prefix: &str, clock: Arc<dyn Clock>) -> Self {
        Self {
            records,
            blobs,
            prefix: prefix.to_string(),
            clock,
        }
    }

    pub fn register(&self, local: &Path) -> Result<VideoRecord> {
        if !local.is_file() {
            return Err(PipelineError::SourceUnavailable(format!(
                "{}: 文件不存在",
                local.display()
            )));
        }
        let file_name = local
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| PipelineError::SourceUnavailable(local.display().to_string()))?;

        let blob_name = format!("{}{}", self.prefix, file_name);
        self.blobs.upload(local, &blob_name)?;

        let record = VideoRecord {
            file_name,
            url: self.blobs.public_url(&blob_name),
            timestamp: Some(TimestampValue::structured(self.clock.now())),
        };
        let id = self.records.append_video(&record)?;
        info!("📥 已登记 {} ({})", record.file_name, id);
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::FixedClock;
    use crate::store::{LocalBlobStore, MemoryStore};
    use chrono::{TimeZone, Utc};
    use std::fs;

    #[test]
    fn test_register_uploads_and_records() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = Arc::new(LocalBlobStore::open(&dir.path().join("blobs")).unwrap());
        let records = Records::new(Arc::new(MemoryStore::new()));
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let pass = IngestPass::new(records.clone(), blobs.clone(), "videos/", Arc::new(FixedClock(now)));

        let clip = dir.path().join("camera_20240101_190000.mp4");
        fs::write(&clip, b"mp4").unwrap();
        let record = pass.register(&clip).unwrap();

        assert_eq!(record.file_name, "camera_20240101_190000.mp4");
        assert!(blobs.exists("videos/camera_20240101_190000.mp4").unwrap());
        assert!(record.url.ends_with("videos/camera_20240101_190000.mp4"));
        assert_eq!(record.timestamp.as_ref().and_then(|t| t.parse()), Some(now));
        assert_eq!(records.videos().unwrap(), vec![record]);
    }

    #[test]
    fn test_register_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = Arc::new(LocalBlobStore::open(dir.path()).unwrap());
        let records = Records::new(Arc::new(MemoryStore::new()));
        let pass = IngestPass::new(records, blobs, "videos/", Arc::new(FixedClock(Utc::now())));
        let err = pass.register(&dir.path().join("nope.mp4")).unwrap_err();
        assert!(matches!(err, PipelineError::SourceUnavailable(_)));
    }
}
