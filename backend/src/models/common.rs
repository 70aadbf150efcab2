//! Pagination and caller identity shared across resources.

use serde::{Deserialize, Serialize};

use crate::define_string_enum;

pub const DEFAULT_PAGE_LIMIT: usize = 50;
pub const MAX_PAGE_LIMIT: usize = 500;
/// Largest offset a storage backend can address (SQL `OFFSET` is a bigint).
pub const MAX_PAGE_OFFSET: usize = i64::MAX as usize;

define_string_enum!(
    /// Farm role of the calling user, ordered from most to least privileged.
    Role {
        Owner => "owner",
        Staff => "staff",
        Viewer => "viewer",
    }
);

impl Role {
    fn rank(self) -> u8 {
        match self {
            Role::Owner => 2,
            Role::Staff => 1,
            Role::Viewer => 0,
        }
    }

    /// Whether this role grants at least the privileges of `required`.
    pub fn allows(self, required: Role) -> bool {
        self.rank() >= required.rank()
    }
}

/// `limit`/`offset` query parameters.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: Option<usize>,
}

impl ListParams {
    pub fn new(limit: Option<usize>, offset: Option<usize>) -> Self {
        Self { limit, offset }
    }

    /// Limit with the default applied and clamped to [`MAX_PAGE_LIMIT`].
    pub fn limit(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .clamp(1, MAX_PAGE_LIMIT)
    }

    /// Offset with the default applied and capped at [`MAX_PAGE_OFFSET`].
    pub fn offset(&self) -> usize {
        self.offset.unwrap_or(0).min(MAX_PAGE_OFFSET)
    }

    /// Slice an already filtered and ordered collection.
    pub fn paginate<T>(&self, items: Vec<T>) -> Page<T> {
        let total = items.len();
        let limit = self.limit();
        let offset = self.offset();
        let data = items.into_iter().skip(offset).take(limit).collect();
        Page {
            data,
            total,
            limit,
            offset,
        }
    }
}

/// One window of a list together with the unwindowed total.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            data: self.data.into_iter().map(f).collect(),
            total: self.total,
            limit: self.limit,
            offset: self.offset,
        }
    }
}
