//! # Armon Store
//!
//! 记录存储层：持久层接口与两种后端，以及位于持久层之前的有界最近记录缓存。
//!
//! ## 模块
//!
//! - `entity`: 记录元数据与 [`Entity`] trait
//! - `models`: 具体记录类型（实时数据、线路配置）
//! - `query`: 范围 / 排序 / 分页查询
//! - `memory`: 进程内持久层
//! - `jsonl`: JSON Lines 文件持久层
//! - `cache`: 有界最近记录缓存

pub mod cache;
pub mod entity;
mod error;
pub mod jsonl;
pub mod memory;
pub mod models;
pub mod query;

pub use cache::{MAX_CACHE_COUNT, ObjectCache};
pub use entity::{CREATED_AT, Entity, RecordMeta, stamp};
pub use error::StoreError;
pub use jsonl::JsonLinesStore;
pub use memory::MemoryStore;
pub use models::{Dashboard, ServiceConfig};
pub use query::{DEFAULT_LIMIT, OrderSpec, OrderTerm, RecordQuery};

use uuid::Uuid;

/// 持久层接口
///
/// 写入时补全缺失的 id 与创建时间（截断到整秒）；查询按插入顺序稳定排序。
pub trait RecordStore: Send + Sync + 'static {
    /// 写入一条记录，返回补全元数据后的记录
    fn insert<T: Entity>(&self, record: T) -> Result<T, StoreError>;

    /// 范围查询
    fn query<T: Entity>(&self, query: &RecordQuery) -> Result<Vec<T>, StoreError>;

    /// 按 id 查找
    fn get_by_id<T: Entity>(&self, id: Uuid) -> Result<Option<T>, StoreError>;
}

/// 运行期选定的持久层
pub enum AnyStore {
    Memory(MemoryStore),
    JsonLines(JsonLinesStore),
}

impl RecordStore for AnyStore {
    fn insert<T: Entity>(&self, record: T) -> Result<T, StoreError> {
        match self {
            AnyStore::Memory(store) => store.insert(record),
            AnyStore::JsonLines(store) => store.insert(record),
        }
    }

    fn query<T: Entity>(&self, query: &RecordQuery) -> Result<Vec<T>, StoreError> {
        match self {
            AnyStore::Memory(store) => store.query(query),
            AnyStore::JsonLines(store) => store.query(query),
        }
    }

    fn get_by_id<T: Entity>(&self, id: Uuid) -> Result<Option<T>, StoreError> {
        match self {
            AnyStore::Memory(store) => store.get_by_id(id),
            AnyStore::JsonLines(store) => store.get_by_id(id),
        }
    }
}
