//! 进程内持久层（生命周期与进程相同）

use crate::RecordStore;
use crate::entity::{Entity, stamp};
use crate::error::StoreError;
use crate::query::RecordQuery;
use chrono::Utc;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// 按记录类型分区、保持插入顺序的内存存储
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<&'static str, Vec<Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 某类记录的条数
    pub fn count<T: Entity>(&self) -> usize {
        self.tables.read().get(T::KIND).map_or(0, Vec::len)
    }

    fn load<T: Entity>(&self) -> Result<Vec<T>, StoreError> {
        let tables = self.tables.read();
        let Some(rows) = tables.get(T::KIND) else {
            return Ok(Vec::new());
        };
        rows.iter()
            .map(|row| serde_json::from_value(row.clone()).map_err(StoreError::from))
            .collect()
    }
}

impl RecordStore for MemoryStore {
    fn insert<T: Entity>(&self, mut record: T) -> Result<T, StoreError> {
        stamp(&mut record, Utc::now());
        let row = serde_json::to_value(&record)?;
        self.tables.write().entry(T::KIND).or_default().push(row);
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
