use serde::{Deserialize, Serialize};

/// Paginated envelope as sent by the backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageSchema<T> {
    pub data: Vec<T>,
    pub total_count: u64,
    pub total_pages: u64,
    pub batch_size: u64,
    pub current_page: u64,
}

/// One page of results, items already mapped to domain types
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total_count: u64,
    pub total_pages: u64,
    pub batch_size: u64,
    pub current_page: u64,
}

impl<T> Page<T> {
    /// Map a wire envelope, converting each item with its `From` impl
    pub fn from_schema<S>(raw: PageSchema<S>) -> Self
    where
        T: From<S>,
    {
        Self {
            data: raw.data.into_iter().map(T::from).collect(),
            total_count: raw.total_count,
            total_pages: raw.total_pages,
            batch_size: raw.batch_size,
            current_page: raw.current_page,
        }
    }

    pub fn has_next(&self) -> bool {
        self.current_page < self.total_pages
    }

    pub fn has_prev(&self) -> bool {
        self.current_page > 1
    }
}
