//! List windowing options shared by all list operations.

/// Offset/limit window plus the caller's raw filter.
///
/// `query` and `query_type` are carried through for logging only; the filter
/// language of the kernel is not interpreted here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub query: Option<String>,
    pub query_type: Option<String>,
    /// Number of leading items to skip.
    pub position: usize,
    /// Maximum number of items returned.
    pub size: usize,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl ListQuery {
    /// Window returning every item.
    pub fn unbounded() -> Self {
        Self {
            query: None,
            query_type: None,
            position: 0,
            size: usize::MAX,
        }
    }

    pub fn window(position: usize, size: usize) -> Self {
        Self {
            position,
            size,
            ..Self::unbounded()
        }
    }

    /// Applies the window to an already ordered sequence.
    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        items
            .into_iter()
            .skip(self.position)
            .take(self.size)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::ListQuery;

    #[test]
    fn window_is_a_maximum_near_the_end() {
        let items: Vec<u32> = (0..5).collect();
        assert_eq!(ListQuery::window(1, 2).apply(items.clone()), vec![1, 2]);
        assert_eq!(ListQuery::window(4, 10).apply(items.clone()), vec![4]);
        assert!(ListQuery::window(9, 10).apply(items.clone()).is_empty());
        assert_eq!(ListQuery::unbounded().apply(items).len(), 5);
    }
}
