/// 存储系统 (Record store + Blob store)
///
/// 三个流程之间不共享内存, 只通过这里同步
/// - RecordStore: 只追加的文档库 (内存 / jsonl 文件)
/// - BlobStore:   视频文件库 (本地目录)
/// - Records:     类型化读写, 坏记录跳过
pub mod blob;
pub mod jsonl;
pub mod memory;
pub mod repository;

pub use blob::{BlobInfo, BlobStore, LocalBlobStore, SignedUrl};
pub use jsonl::JsonlStore;
pub use memory::MemoryStore;
pub use repository::Records;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::StorageConfig;
use crate::error::StoreError;
use crate::records::timestamp_of;

/// 库中的一条文档
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub id: String,
    pub data: Value,
}

/// 文档库接口
///
/// 只追加, 每条文档ID唯一; 多个写入方之间无需协调.
pub trait RecordStore: Send + Sync {
    /// 追加一条文档; `id` 为 None 时由库生成, 返回最终ID
    fn append(&self, collection: &str, id: Option<String>, doc: Value) -> Result<String, StoreError>;

    /// 集合中的全部文档 (写入顺序)
    fn query_all(&self, collection: &str) -> Result<Vec<StoredDocument>, StoreError>;

    /// 按时间戳倒序的前 `limit` 条, 时间戳无法解析的排在最后
    fn query_latest(&self, collection: &str, limit: usize) -> Result<Vec<StoredDocument>, StoreError> {
        let mut docs = self.query_all(collection)?;
        sort_latest_first(&mut docs);
        docs.truncate(limit);
        Ok(docs)
    }
}

/// 按存储配置打开本地记录库与文件库
pub fn open_local(storage: &StorageConfig) -> Result<(Records, Arc<dyn BlobStore>), StoreError> {
    let store: Arc<dyn RecordStore> = Arc::new(JsonlStore::open(&storage.records_dir())?);
    let blobs: Arc<dyn BlobStore> = Arc::new(LocalBlobStore::open(&storage.blobs_dir())?);
    Ok((Records::new(store), blobs))
}

/// 时间戳倒序 (稳定排序)
pub fn sort_latest_first(docs: &mut [StoredDocument]) {
    docs.sort_by_cached_key(|d| std::cmp::Reverse(timestamp_of(&d.data)));
}

/// 集合名/文件名只允许简单字符, 防止跳出数据目录
pub(crate) fn check_collection(collection: &str) -> Result<(), StoreError> {
    let valid = !collection.is_empty()
        && collection
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidName(collection.to_string()))
    }
}

/// 生成文档ID
pub(crate) fn new_document_id(collection: &str) -> String {
    crate::gen_record_id(collection, chrono::Utc::now(), crate::DEFAULT_UTC_OFFSET_HOURS)
}
