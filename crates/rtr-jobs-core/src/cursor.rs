//! Opaque pagination markers.
//!
//! A marker is `"<offset>:<page>"`: the absolute offset to hand back to the
//! object store, plus a logical page number that tracks forward traversal.
//! Markers are produced by [`paginate`] from the paging metadata of the page
//! that was just served.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Page size used when the caller does not supply one.
pub const DEFAULT_PAGE_LIMIT: usize = 10;

/// Which marker produced the current request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Forward,
    Backward,
}

/// Decoded marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cursor {
    pub offset: usize,
    pub page: usize,
}

impl Cursor {
    pub fn new(offset: usize, page: usize) -> Self {
        Self { offset, page }
    }

    /// Decode a marker. Anything that is not two non-negative integers
    /// separated by a single colon restarts at the first page.
    pub fn decode(marker: &str) -> Self {
        let mut parts = marker.split(':');
        let (Some(offset), Some(page), None) = (parts.next(), parts.next(), parts.next()) else {
            return Self::default();
        };
        match (offset.trim().parse(), page.trim().parse()) {
            (Ok(offset), Ok(page)) => Self { offset, page },
            _ => Self::default(),
        }
    }

    pub fn encode(&self) -> String {
        format!("{}:{}", self.offset, self.page)
    }
}

/// Compute `(prev, next)` markers for the page that was just fetched.
///
/// * `direction`, `page`, `prior_offset` describe the incoming request.
/// * `limit` is the page size.
/// * `new_offset` and `total` come from the store; a `new_offset` of 0 means
///   no further results.
pub fn paginate(
    direction: Direction,
    page: usize,
    prior_offset: usize,
    limit: usize,
    new_offset: usize,
    total: usize,
) -> (String, String) {
    let mut prev = String::new();
    let mut next = String::new();

    if page == 0 {
        if total == 0 || new_offset == 0 {
            return (prev, next);
        }
        next = Cursor::new(new_offset, 1).encode();
        return (prev, next);
    }

    let limit = limit.max(1);
    let back = prior_offset as i64 - limit as i64;

    if new_offset == 0 {
        if back >= 0 {
            let total_pages = total.div_ceil(limit);
            prev = format!("{}:{}", back, total_pages as i64 - 1);
        }
        return (prev, next);
    }

    next = match direction {
        Direction::Forward => Cursor::new(new_offset, page + 1).encode(),
        Direction::Backward => Cursor::new(new_offset, page).encode(),
    };
    prev = if back > 0 {
        format!("{}:{}", back, page)
    } else {
        "0:1".to_string()
    };

    (prev, next)
}

/// Paging metadata returned with every list response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paging {
    pub count: usize,
    pub limit: usize,
    pub next: String,
    pub prev: String,
    pub total: usize,
}

/// Pagination parameters of a list request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: usize,
    pub cursor: Cursor,
    pub direction: Direction,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_LIMIT,
            cursor: Cursor::default(),
            direction: Direction::Forward,
        }
    }
}

impl PageRequest {
    /// Build from raw `limit`, `next` and `prev` query values.
    ///
    /// A non-positive limit keeps the default. An offset of 0 always means the
    /// first page, whatever page number the marker carried.
    pub fn from_query(
        limit: Option<&str>,
        next: Option<&str>,
        prev: Option<&str>,
    ) -> Result<Self, CoreError> {
        let mut req = Self::default();

        if let Some(raw) = limit.map(str::trim).filter(|s| !s.is_empty()) {
            let parsed: i64 = raw
                .parse()
                .map_err(|e: std::num::ParseIntError| CoreError::InvalidLimit(e.to_string()))?;
            if parsed > 0 {
                req.limit = parsed as usize;
            }
        }

        let next = next.filter(|s| !s.is_empty());
        let prev = prev.filter(|s| !s.is_empty());
        let marker = match (next, prev) {
            (Some(_), Some(_)) => return Err(CoreError::ConflictingCursor),
            (None, Some(p)) => {
                req.direction = Direction::Backward;
                p
            }
            (Some(n), None) => n,
            (None, None) => "",
        };

        req.cursor = Cursor::decode(marker);
        if req.cursor.offset == 0 {
            req.cursor.page = 0;
        }
        Ok(req)
    }

    /// Markers and metadata for the page that was fetched with this request.
    pub fn paging(&self, count: usize, new_offset: usize, total: usize) -> Paging {
        let (prev, next) = paginate(
            self.direction,
            self.cursor.page,
            self.cursor.offset,
            self.limit,
            new_offset,
            total,
        );
        Paging {
            count,
            limit: self.limit,
            next,
            prev,
            total,
        }
    }
}

#[cfg(test)]
#[path = "cursor_tests.rs"]
mod tests;
