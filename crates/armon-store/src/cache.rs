//! 有界最近记录缓存
//!
//! 位于持久层之前，缓存某一记录类型最近插入的至多 `capacity`（默认 20）条。
//!
//! **写路径**：先写持久层，成功后才追加到缓存，超出容量时淘汰最早插入的一条。
//! 写入失败的记录永远不会进入缓存。
//!
//! **读路径**：只有当缓存可证明持有全部符合条件的记录时才由缓存应答，
//! 否则以完全相同的参数回源。前提是缓存是该记录类型的唯一写入者，
//! 且创建时间按写入顺序不减。
//!
//! 可证明包含的两种情形（`min` 为缓存中限定字段的最小值）：
//!
//! 1. 下界严格大于 `min`，或等于 `min` 且不包含下界：所有符合条件的记录都比
//!    缓存最早的记录新，任何排序都可由缓存应答。
//! 2. 按限定字段降序，且缓存中时间严格大于 `min` 的符合条件记录不少于
//!    `skip + limit` 条：结果页完全落在缓存内。
//!
//! 与 `min` 相等的记录不参与计数，持久层中可能还有同一秒、已被淘汰的记录。

use crate::RecordStore;
use crate::entity::Entity;
use crate::error::StoreError;
use crate::query::{QueryPlan, RecordQuery};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, trace};
use uuid::Uuid;

/// 默认缓存容量
pub const MAX_CACHE_COUNT: usize = 20;

/// 有界最近记录缓存
pub struct ObjectCache<T: Entity, S: RecordStore> {
    store: Arc<S>,
    buffer: Mutex<VecDeque<T>>,
    capacity: usize,
}

impl<T: Entity, S: RecordStore> ObjectCache<T, S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_capacity(store, MAX_CACHE_COUNT)
    }

    /// 指定容量（至少为 1）
    pub fn with_capacity(store: Arc<S>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            store,
            buffer: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.buffer.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.lock().is_empty()
    }

    /// 按插入顺序复制缓存内容
    pub fn snapshot(&self) -> Vec<T> {
        self.buffer.lock().iter().cloned().collect()
    }

    /// 最近插入的记录
    pub fn latest(&self) -> Option<T> {
        self.buffer.lock().back().cloned()
    }

    /// 缓存窗口 `(min, max)`（按创建时间）
    pub fn window(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let buffer = self.buffer.lock();
        let mut times = buffer.iter().filter_map(|r| r.created_at());
        let first = times.next()?;
        Some(times.fold((first, first), |(lo, hi), t| (lo.min(t), hi.max(t))))
    }

    /// 用持久层中最新的记录预热缓存
    ///
    /// 只在缓存为空时生效，返回载入条数。
    pub fn warm_up(&self) -> Result<usize, StoreError> {
        if !self.is_empty() {
            return Ok(0);
        }
        let latest: Vec<T> = self
            .store
            .query(&RecordQuery::new().limit(self.capacity))?;

        let mut buffer = self.buffer.lock();
        // 持久层按降序返回，缓存保持插入（升序）顺序
        for record in latest.into_iter().rev() {
            buffer.push_back(record);
        }
        debug!("Cache for {} warmed with {} records", T::KIND, buffer.len());
        Ok(buffer.len())
    }

    /// 插入一条记录
    ///
    /// 持久层写入成功后才进入缓存，返回补全元数据后的记录。
    pub fn insert(&self, record: T) -> Result<T, StoreError> {
        let saved = self.store.insert(record)?;

        let mut buffer = self.buffer.lock();
        buffer.push_back(saved.clone());
        while buffer.len() > self.capacity {
            buffer.pop_front();
        }
        Ok(saved)
    }

    /// 批量插入，遇到第一个失败即停止（之前的记录保持已写入）
    pub fn insert_many(&self, records: impl IntoIterator<Item = T>) -> Result<Vec<T>, StoreError> {
        records.into_iter().map(|r| self.insert(r)).collect()
    }

    /// 范围查询
    pub fn query(&self, query: &RecordQuery) -> Result<Vec<T>, StoreError> {
        let plan = query.plan::<T>()?;
        let snapshot = self.snapshot();

        if !snapshot.is_empty() && covers(&plan, &snapshot) {
            trace!("Cache hit for {} query", T::KIND);
            return Ok(plan.apply(snapshot));
        }
        trace!("Cache miss for {} query, delegating", T::KIND);
        self.store.query(query)
    }

    /// 按 id 查找：先查缓存，再查持久层
    pub fn get_by_id(&self, id: Uuid) -> Result<Option<T>, StoreError> {
        let cached = self
            .buffer
            .lock()
            .iter()
            .find(|r| r.record_id() == Some(id))
            .cloned();
        match cached {
            Some(record) => Ok(Some(record)),
            None => self.store.get_by_id(id),
        }
    }
}

/// 缓存是否可证明持有查询的全部结果
fn covers<T: Entity>(plan: &QueryPlan, snapshot: &[T]) -> bool {
    let times: Option<Vec<DateTime<Utc>>> =
        snapshot.iter().map(|r| r.field_time(plan.restrict)).collect();
    let Some(min) = times.as_ref().and_then(|t| t.iter().min().copied()) else {
        return false;
    };

    let q = &plan.query;
    if let Some(after) = q.after
        && (after > min || (after == min && !q.include_after))
    {
        return true;
    }

    if plan.order.is_descending_by(plan.restrict) {
        let needed = q.skip.saturating_add(q.limit);
        let newer = snapshot
            .iter()
            .filter(|r| plan.matches(*r))
            .filter(|r| r.field_time(plan.restrict).is_some_and(|t| t > min))
            .count();
        return newer >= needed;
    }

    false
}
