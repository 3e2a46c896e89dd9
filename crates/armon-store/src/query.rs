//! 范围查询
//!
//! 所有后端与缓存共用同一套过滤 / 排序 / 分页语义，保证缓存命中与回源
//! 得到相同结果。排序键完全相同的记录按插入序号沿主方向排列。

use crate::entity::{CREATED_AT, Entity, resolve_field};
use crate::error::StoreError;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;

/// 默认分页大小
pub const DEFAULT_LIMIT: usize = 10;

/// 单个排序项
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderTerm {
    pub field: &'static str,
    pub descending: bool,
}

/// 排序表达式
///
/// 逗号或空格分隔的 `[+|-]field`；`-` 为降序，`+` 或无符号为升序。
/// 空表达式表示按限定字段降序。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderSpec {
    terms: Vec<OrderTerm>,
}

impl OrderSpec {
    pub fn parse<T: Entity>(spec: &str, restrict: &'static str) -> Result<Self, StoreError> {
        let mut terms = Vec::new();
        for token in spec.split([',', ' ']).filter(|t| !t.is_empty()) {
            let (descending, name) = match token.as_bytes()[0] {
                b'-' => (true, &token[1..]),
                b'+' => (false, &token[1..]),
                _ => (false, token),
            };
            if name.is_empty() {
                return Err(StoreError::InvalidOrder(spec.to_string()));
            }
            let field = resolve_field::<T>(name).ok_or_else(|| StoreError::UnknownField {
                kind: T::KIND,
                field: name.to_string(),
            })?;
            terms.push(OrderTerm { field, descending });
        }

        if terms.is_empty() {
            terms.push(OrderTerm {
                field: restrict,
                descending: true,
            });
        }
        Ok(Self { terms })
    }

    pub fn terms(&self) -> &[OrderTerm] {
        &self.terms
    }

    /// 主排序是否为指定字段降序
    pub fn is_descending_by(&self, field: &str) -> bool {
        matches!(self.terms.first(), Some(t) if t.descending && t.field == field)
    }

    /// 比较两条记录；排序项全部相等时再以创建时间按主方向比较
    pub fn compare<T: Entity>(&self, a: &T, b: &T) -> Ordering {
        for term in &self.terms {
            let ord = directed(a.field_time(term.field).cmp(&b.field_time(term.field)), term.descending);
            if ord != Ordering::Equal {
                return ord;
            }
        }
        let descending = self.terms.first().is_some_and(|t| t.descending);
        directed(a.created_at().cmp(&b.created_at()), descending)
    }
}

fn directed(ord: Ordering, descending: bool) -> Ordering {
    if descending { ord.reverse() } else { ord }
}

/// 范围查询参数
///
/// # Example
///
/// ```
/// use armon_store::RecordQuery;
/// use chrono::Utc;
///
/// let query = RecordQuery::new()
///     .after(Utc::now(), true)
///     .skip(5)
///     .limit(20)
///     .order("+createdAt");
/// assert_eq!(query.limit, 20);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordQuery {
    /// 限定字段
    pub restrict: String,
    pub after: Option<DateTime<Utc>>,
    pub before: Option<DateTime<Utc>>,
    pub include_after: bool,
    pub include_before: bool,
    pub skip: usize,
    pub limit: usize,
    /// 排序表达式
    pub order: String,
}

impl Default for RecordQuery {
    fn default() -> Self {
        Self {
            restrict: CREATED_AT.to_string(),
            after: None,
            before: None,
            include_after: false,
            include_before: false,
            skip: 0,
            limit: DEFAULT_LIMIT,
            order: format!("-{}", CREATED_AT),
        }
    }
}

impl RecordQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn restrict(mut self, field: impl Into<String>) -> Self {
        self.restrict = field.into();
        self
    }

    /// 下界，`inclusive` 为真时包含等于下界的记录
    pub fn after(mut self, time: DateTime<Utc>, inclusive: bool) -> Self {
        self.after = Some(time);
        self.include_after = inclusive;
        self
    }

    /// 上界，`inclusive` 为真时包含等于上界的记录
    pub fn before(mut self, time: DateTime<Utc>, inclusive: bool) -> Self {
        self.before = Some(time);
        self.include_before = inclusive;
        self
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn order(mut self, order: impl Into<String>) -> Self {
        self.order = order.into();
        self
    }

    /// 解析限定字段与排序表达式
    pub fn plan<T: Entity>(&self) -> Result<QueryPlan, StoreError> {
        let restrict =
            resolve_field::<T>(&self.restrict).ok_or_else(|| StoreError::UnknownField {
                kind: T::KIND,
                field: self.restrict.clone(),
            })?;
        let order = OrderSpec::parse::<T>(&self.order, restrict)?;
        Ok(QueryPlan {
            restrict,
            order,
            query: self.clone(),
        })
    }
}

/// 已解析的查询
#[derive(Debug, Clone)]
pub struct QueryPlan {
    pub restrict: &'static str,
    pub order: OrderSpec,
    pub query: RecordQuery,
}

impl QueryPlan {
    /// 时间是否落在查询边界内
    pub fn in_bounds(&self, time: Option<DateTime<Utc>>) -> bool {
        let q = &self.query;
        if let Some(after) = q.after {
            match time {
                Some(t) if t > after || (q.include_after && t == after) => {},
                _ => return false,
            }
        }
        if let Some(before) = q.before {
            match time {
                Some(t) if t < before || (q.include_before && t == before) => {},
                _ => return false,
            }
        }
        true
    }

    pub fn matches<T: Entity>(&self, record: &T) -> bool {
        self.in_bounds(record.field_time(self.restrict))
    }

    /// 过滤、排序、分页
    ///
    /// `records` 须为插入顺序。排序键全部相等时按插入序号、沿主方向排列：
    /// 降序时后插入的记录在前。
    pub fn apply<T: Entity>(&self, records: impl IntoIterator<Item = T>) -> Vec<T> {
        let descending = self.order.terms().first().is_some_and(|t| t.descending);
        let mut selected: Vec<(usize, T)> = records
            .into_iter()
            .enumerate()
            .filter(|(_, r)| self.matches(r))
            .collect();
        selected.sort_by(|(ia, a), (ib, b)| {
            self.order
                .compare(a, b)
                .then_with(|| directed(ia.cmp(ib), descending))
        });
        selected
            .into_iter()
            .map(|(_, r)| r)
            .skip(self.query.skip)
            .take(self.query.limit)
            .collect()
    }
}
