//! 视频文件库 (Blob store)
//!
//! 对象名用 `/` 分隔 (如 `videos/camera_20240101_120000.mp4`).
//! 本地实现把对象放在根目录下同名路径, 链接为 `file://` 形式.

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::{debug, info};

use crate::error::StoreError;

/// 对象元数据
#[derive(Clone, Debug, PartialEq)]
pub struct BlobInfo {
    pub name: String,
    pub updated: DateTime<Utc>,
    pub size: u64,
}

/// 限时访问链接
#[derive(Clone, Debug, PartialEq)]
pub struct SignedUrl {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

pub trait BlobStore: Send + Sync {
    fn exists(&self, name: &str) -> Result<bool, StoreError>;

    /// 对象不存在时返回 NotFound
    fn signed_url(&self, name: &str, ttl: Duration) -> Result<SignedUrl, StoreError>;

    fn upload(&self, local: &Path, name: &str) -> Result<BlobInfo, StoreError>;

    fn public_url(&self, name: &str) -> String;

    /// 以 `prefix` 开头的全部对象
    fn list(&self, prefix: &str) -> Result<Vec<BlobInfo>, StoreError>;

    fn download(&self, name: &str, dest: &Path) -> Result<(), StoreError>;
}

/// 本地目录文件库
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn open(root: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 对象名 → 本地路径, 拒绝 `..` 与绝对路径
    fn object_path(&self, name: &str) -> Result<PathBuf, StoreError> {
        let rel = Path::new(name);
        let clean = !name.is_empty()
            && rel
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !clean {
            return Err(StoreError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(rel))
    }

    fn info(&self, name: &str, path: &Path) -> Result<BlobInfo, StoreError> {
        let meta = fs::metadata(path)?;
        Ok(BlobInfo {
            name: name.to_string(),
            updated: DateTime::<Utc>::from(meta.modified()?),
            size: meta.len(),
        })
    }

    fn walk(&self, dir: &Path, prefix: &str, out: &mut Vec<BlobInfo>) -> Result<(), StoreError> {
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                self.walk(&path, prefix, out)?;
                continue;
            }
            let Ok(rel) = path.strip_prefix(&self.root) else {
                continue;
            };
            let name = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if name.starts_with(prefix) {
                out.push(self.info(&name, &path)?);
            }
        }
        Ok(())
    }
}

impl BlobStore for LocalBlobStore {
    fn exists(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.object_path(name)?.is_file())
    }

    fn signed_url(&self, name: &str, ttl: Duration) -> Result<SignedUrl, StoreError> {
        if !self.exists(name)? {
            return Err(StoreError::NotFound(name.to_string()));
        }
        let expires_at = Utc::now() + chrono::Duration::seconds(ttl.as_secs() as i64);
        let token: u64 = rand::thread_rng().gen();
        Ok(SignedUrl {
            url: format!(
                "{}?expires={}&token={:016x}",
                self.public_url(name),
                expires_at.timestamp(),
                token
            ),
            expires_at,
        })
    }

    fn upload(&self, local: &Path, name: &str) -> Result<BlobInfo, StoreError> {
        let dest = self.object_path(name)?;
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        let bytes = fs::copy(local, &dest)?;
        info!("💾 已上传 {} ({} 字节)", name, bytes);
        self.info(name, &dest)
    }

    fn public_url(&self, name: &str) -> String {
        format!("file://{}/{}", self.root.display(), name)
    }

    fn list(&self, prefix: &str) -> Result<Vec<BlobInfo>, StoreError> {
        let mut out = Vec::new();
        self.walk(&self.root, prefix, &mut out)?;
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    fn download(&self, name: &str, dest: &Path) -> Result<(), StoreError> {
        let src = self.object_path(name)?;
        if !src.is_file() {
            return Err(StoreError::NotFound(name.to_string()));
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(&src, dest)?;
        debug!("📥 已下载 {} → {}", name, dest.display());
        Ok(())
    }
}
