//! Page/limit pagination shared by every list endpoint

use crate::error::{validation_error, AppError};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

pub const MAX_PAGE_SIZE: u32 = 100;

/// A validated page request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    /// Build from optional query values, applying `default_limit` when absent
    pub fn from_query(
        page: Option<u32>,
        limit: Option<u32>,
        default_limit: u32,
    ) -> Result<Self, AppError> {
        let page = page.unwrap_or(1);
        let limit = limit.unwrap_or(default_limit);

        if page < 1 {
            return Err(validation_error("page", "Page must be at least 1"));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&limit) {
            return Err(validation_error(
                "limit",
                format!("Limit must be between 1 and {}", MAX_PAGE_SIZE),
            ));
        }

        Ok(Self { page, limit })
    }

    /// First page of `limit` items, used for dashboard widgets
    pub fn first(limit: u32) -> Self {
        Self { page: 1, limit }
    }

    /// Every row in one page, for nested collections of a detail view
    pub fn unbounded() -> Self {
        Self {
            page: 1,
            limit: u32::MAX,
        }
    }

    pub fn offset(&self) -> u64 {
        (self.page as u64 - 1) * self.limit as u64
    }
}

/// Pagination block of a list response
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub pages: u64,
}

impl Pagination {
    pub fn new(request: PageRequest, total: u64) -> Self {
        Self {
            page: request.page,
            limit: request.limit,
            total,
            pages: total.div_ceil(request.limit as u64),
        }
    }
}

/// Apply a page window to an already filtered and sorted collection
pub fn paginate<T>(items: Vec<T>, request: PageRequest) -> (Vec<T>, u64) {
    let total = items.len() as u64;
    let page = items
        .into_iter()
        .skip(request.offset() as usize)
        .take(request.limit as usize)
        .collect();
    (page, total)
}

/// A named collection plus its pagination block.
///
/// Serializes as `{"<key>": [...], "pagination": {...}}`.
#[derive(Debug)]
pub struct Listing<T> {
    pub key: &'static str,
    pub items: Vec<T>,
    pub pagination: Pagination,
}

impl<T> Listing<T> {
    pub fn new(key: &'static str, (items, total): (Vec<T>, u64), request: PageRequest) -> Self {
        Self {
            key,
            items,
            pagination: Pagination::new(request, total),
        }
    }
}

impl<T: Serialize> Serialize for Listing<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry(self.key, &self.items)?;
        map.serialize_entry("pagination", &self.pagination)?;
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_pages_is_ceiling() {
        let req = PageRequest::from_query(None, Some(10), 10).unwrap();
        assert_eq!(Pagination::new(req, 0).pages, 0);
        assert_eq!(Pagination::new(req, 1).pages, 1);
        assert_eq!(Pagination::new(req, 10).pages, 1);
        assert_eq!(Pagination::new(req, 11).pages, 2);
        assert_eq!(Pagination::new(req, 95).pages, 10);
    }

    #[test]
    fn test_page_past_end_is_empty() {
        let items: Vec<u32> = (0..25).collect();
        let req = PageRequest::from_query(Some(3), Some(10), 10).unwrap();
        let (page, total) = paginate(items.clone(), req);
        assert_eq!(page, vec![20, 21, 22, 23, 24]);
        assert_eq!(total, 25);

        let past = PageRequest::from_query(Some(4), Some(10), 10).unwrap();
        let (page, total) = paginate(items, past);
        assert!(page.is_empty());
        assert_eq!(total, 25);
    }

    #[test]
    fn test_defaults_and_bounds() {
        let req = PageRequest::from_query(None, None, 20).unwrap();
        assert_eq!(req, PageRequest { page: 1, limit: 20 });
        assert_eq!(req.offset(), 0);

        assert!(PageRequest::from_query(Some(0), None, 10).is_err());
        assert!(PageRequest::from_query(None, Some(0), 10).is_err());
        assert!(PageRequest::from_query(None, Some(101), 10).is_err());
        assert_eq!(PageRequest::from_query(Some(3), Some(7), 10).unwrap().offset(), 14);
    }

    #[test]
    fn test_listing_serializes_under_key() {
        let req = PageRequest::first(2);
        let listing = Listing::new("leads", (vec!["a", "b"], 5), req);
        let json = serde_json::to_value(&listing).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "leads": ["a", "b"],
                "pagination": {"page": 1, "limit": 2, "total": 5, "pages": 3}
            })
        );
    }
}
