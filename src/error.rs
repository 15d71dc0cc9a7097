//! 错误分类 (Error taxonomy)
//!
//! - SourceUnavailable: 视频/文件打不开, 放弃当前片段
//! - MalformedRecord:   单条记录字段缺失或无法解析, 跳过
//! - BackingStore:      记录库/文件库暂时不可用, 退避后重试
//!
//! 光流数值退化 (零值/NaN) 不作为错误抛出, 由分析器就地替换并计数.
use thiserror::Error;

/// 记录库与文件库错误
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("duplicate id {id} in {collection}")]
    Duplicate { collection: String, id: String },

    #[error("invalid name: {0}")]
    InvalidName(String),
}

/// 流程错误
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("malformed record {id} in {collection}: {reason}")]
    MalformedRecord {
        collection: String,
        id: String,
        reason: String,
    },

    #[error("backing store error: {0}")]
    BackingStore(#[from] StoreError),
}

impl PipelineError {
    /// 是否值得退避重试 (只有记录库/文件库故障)
    pub fn is_transient(&self) -> bool {
        matches!(self, PipelineError::BackingStore(_))
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
