/// jsonl 文件文档库
///
/// 每个集合一个 `<collection>.jsonl`, 每行一条 `{"id": ..., "data": {...}}`.
/// 多个流程进程可以同时追加; 读取时坏行跳过.
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::Value;
use tracing::{debug, warn};

use super::{check_collection, new_document_id, RecordStore, StoredDocument};
use crate::error::StoreError;

pub struct JsonlStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlStore {
    /// 打开 (必要时创建) 数据目录
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(dir)?;
        debug!("📂 记录库目录: {}", dir.display());
        Ok(Self {
            dir: dir.to_path_buf(),
            write_lock: Mutex::new(()),
        })
    }

    fn collection_path(&self, collection: &str) -> Result<PathBuf, StoreError> {
        check_collection(collection)?;
        Ok(self.dir.join(format!("{}.jsonl", collection)))
    }

    fn read_collection(&self, path: &Path) -> Result<Vec<StoredDocument>, StoreError> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut docs = Vec::new();
        for (line_no, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<StoredDocument>(&line) {
                Ok(doc) => docs.push(doc),
                Err(e) => warn!(
                    "⚠️  {} 第 {} 行无法解析, 跳过: {}",
                    path.display(),
                    line_no + 1,
                    e
                ),
            }
        }
        Ok(docs)
    }
}

impl RecordStore for JsonlStore {
    fn append(&self, collection: &str, id: Option<String>, doc: Value) -> Result<String, StoreError> {
        let path = self.collection_path(collection)?;
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| StoreError::Unavailable("写锁已损坏".to_string()))?;

        let id = match id {
            Some(id) => {
                if self.read_collection(&path)?.iter().any(|d| d.id == id) {
                    return Err(StoreError::Duplicate {
                        collection: collection.to_string(),
                        id,
                    });
                }
                id
            }
            None => new_document_id(collection),
        };

        let stored = StoredDocument {
            id: id.clone(),
            data: doc,
        };
        let mut line = serde_json::to_string(&stored)?;
        line.push('\n');

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        file.write_all(line.as_bytes())?;
        file.flush()?;
        Ok(id)
    }

    fn query_all(&self, collection: &str) -> Result<Vec<StoredDocument>, StoreError> {
        let path = self.collection_path(collection)?;
        self.read_collection(&path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlStore::open(dir.path()).unwrap();
        store
            .append("people_counter", Some("p1".into()), json!({"in": 1}))
            .unwrap();
        store.append("people_counter", None, json!({"in": 2})).unwrap();
        drop(store);

        let reopened = JsonlStore::open(dir.path()).unwrap();
        let docs = reopened.query_all("people_counter").unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].id, "p1");
        assert_eq!(docs[1].data["in"], 2);
    }

    #[test]
    fn test_malformed_lines_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlStore::open(dir.path()).unwrap();
        store.append("videos", Some("ok".into()), json!({})).unwrap();
        let mut file = OpenOptions::new()
            .append(true)
            .open(dir.path().join("videos.jsonl"))
            .unwrap();
        writeln!(file, "{{ truncated").unwrap();
        drop(file);
        store.append("videos", Some("ok2".into()), json!({})).unwrap();

        let ids: Vec<String> = store
            .query_all("videos")
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, vec!["ok", "ok2"]);
    }

    #[test]
    fn test_missing_collection_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlStore::open(dir.path()).unwrap();
        assert!(store.query_all("moverate").unwrap().is_empty());
        assert!(store.query_all("../x").is_err());
    }

    #[test]
    fn test_duplicate_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlStore::open(dir.path()).unwrap();
        store.append("moverate", Some("a".into()), json!({})).unwrap();
        assert!(matches!(
            store.append("moverate", Some("a".into()), json!({})),
            Err(StoreError::Duplicate { .. })
        ));
    }
}
