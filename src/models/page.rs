use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page<T> {
    pub content: Vec<T>,
    pub page: usize,
    pub size: usize,
    pub total_elements: usize,
    pub total_pages: usize,
}

impl<T> Page<T> {
    pub fn from_sorted(items: Vec<T>, page: usize, size: usize) -> Self {
        let total_elements = items.len();
        let total_pages = total_elements.div_ceil(size);

        let content = items
            .into_iter()
            .skip(page.saturating_mul(size))
            .take(size)
            .collect();

        Self {
            content,
            page,
            size,
            total_elements,
            total_pages,
        }
    }
}
