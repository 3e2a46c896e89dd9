//! JSON Lines 文件持久层
//!
//! 每种记录类型一个只追加文件 `<dir>/<kind>.jsonl`，每行一条记录。

use crate::RecordStore;
use crate::entity::{Entity, stamp};
use crate::error::StoreError;
use crate::query::RecordQuery;
use chrono::Utc;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// 文件持久层
#[derive(Debug)]
pub struct JsonLinesStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonLinesStore {
    /// 打开（必要时创建）存储目录
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        debug!("JSON lines store at {}", dir.display());
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_of<T: Entity>(&self) -> PathBuf {
        self.dir.join(format!("{}.jsonl", T::KIND))
    }

    /// 按插入顺序读取全部记录
    ///
    /// 无法解析的行（如写入中断留下的半行）跳过并告警。
    fn load<T: Entity>(&self) -> Result<Vec<T>, StoreError> {
        let path = self.file_of::<T>();
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<T>(&line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(
                    "Skipping unreadable line {} in {}: {}",
                    index + 1,
                    path.display(),
                    e
                ),
            }
        }
        Ok(records)
    }
}

impl RecordStore for JsonLinesStore {
    fn insert<T: Entity>(&self, mut record: T) -> Result<T, StoreError> {
        stamp(&mut record, Utc::now());
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        let _guard = self.write_lock.lock();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.file_of::<T>())?;
        file.write_all(line.as_bytes())?;
        file.flush()?;
        Ok(record)
    }

    fn query<T: Entity>(&self, query: &RecordQuery) -> Result<Vec<T>, StoreError> {
        let plan = query.plan::<T>()?;
        Ok(plan.apply(self.load::<T>()?))
    }

    fn get_by_id<T: Entity>(&self, id: Uuid) -> Result<Option<T>, StoreError> {
        Ok(self
            .load::<T>()?
            .into_iter()
            .find(|r| r.record_id() == Some(id)))
    }
}
