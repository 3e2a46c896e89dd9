//! 记录实体

use chrono::{DateTime, SubsecRound, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 所有记录共有的元数据
///
/// `record_id` 创建时分配后不可变；`created_at` 创建时分配，截断到整秒。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// 创建时间字段名
pub const CREATED_AT: &str = "createdAt";

/// 记录实体
pub trait Entity: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// 记录类型名（持久化的分区键）
    const KIND: &'static str;

    /// 可用于范围限定与排序的时间字段
    const TIME_FIELDS: &'static [&'static str] = &[CREATED_AT];

    fn meta(&self) -> &RecordMeta;

    fn meta_mut(&mut self) -> &mut RecordMeta;

    /// 业务时间，默认等于创建时间
    fn time(&self) -> Option<DateTime<Utc>> {
        self.meta().created_at
    }

    /// 按字段名取时间值
    fn field_time(&self, field: &str) -> Option<DateTime<Utc>> {
        if field.eq_ignore_ascii_case(CREATED_AT) {
            self.meta().created_at
        } else {
            self.time()
        }
    }

    fn record_id(&self) -> Option<Uuid> {
        self.meta().record_id
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.meta().created_at
    }
}

/// 规范化字段名
///
/// 大小写不敏感，`createAt` 视为 `createdAt` 的别名。
pub fn resolve_field<T: Entity>(field: &str) -> Option<&'static str> {
    let field = field.trim();
    if field.eq_ignore_ascii_case("createAt") {
        return Some(CREATED_AT);
    }
    T::TIME_FIELDS
        .iter()
        .copied()
        .find(|known| known.eq_ignore_ascii_case(field))
}

/// 写入前补全元数据
///
/// 缺失 id 时分配新 UUID，缺失创建时间时取 `now`，创建时间一律截断到整秒。
pub fn stamp<T: Entity>(record: &mut T, now: DateTime<Utc>) {
    let meta = record.meta_mut();
    if meta.record_id.is_none() {
        meta.record_id = Some(Uuid::new_v4());
    }
    let created_at = meta.created_at.unwrap_or(now);
    meta.created_at = Some(created_at.trunc_subsecs(0));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Dashboard;
    use chrono::TimeZone;

    #[test]
    fn test_stamp_assigns_id_and_truncates() {
        let now = Utc.with_ymd_and_hms(2024, 3, 17, 14, 5, 9).unwrap()
            + chrono::Duration::milliseconds(750);
        let mut record = Dashboard::new(7);
        stamp(&mut record, now);

        assert!(record.record_id().is_some());
        assert_eq!(
            record.created_at(),
            Some(Utc.with_ymd_and_hms(2024, 3, 17, 14, 5, 9).unwrap())
        );
    }

    #[test]
    fn test_stamp_keeps_existing_id() {
        let id = Uuid::new_v4();
        let mut record = Dashboard::new(1);
        record.meta_mut().record_id = Some(id);
        stamp(&mut record, Utc::now());
        assert_eq!(record.record_id(), Some(id));
    }

    #[test]
    fn test_resolve_field() {
        assert_eq!(resolve_field::<Dashboard>("createdAt"), Some(CREATED_AT));
        assert_eq!(resolve_field::<Dashboard>("CreateAt"), Some(CREATED_AT));
        assert_eq!(resolve_field::<Dashboard>("CREATEDAT"), Some(CREATED_AT));
        assert_eq!(resolve_field::<Dashboard>("value"), None);
    }
}
