use std::cmp::Ordering;
use std::sync::Arc;

type Compare<T> = Arc<dyn Fn(&T, &T) -> Ordering + Send + Sync>;

/// How a subscription orders its records. Sorting is stable, so records that compare equal keep
/// the store's path order.
pub struct SortOrder<T> {
    compare: Option<Compare<T>>,
}

impl<T> Clone for SortOrder<T> {
    fn clone(&self) -> Self {
        Self {
            compare: self.compare.clone(),
        }
    }
}

impl<T: 'static> SortOrder<T> {
    /// Keeps the store's order.
    pub fn unsorted() -> Self {
        Self { compare: None }
    }

    pub fn ascending<K, F>(key: F) -> Self
    where
        K: Ord,
        F: Fn(&T) -> K + Send + Sync + 'static,
    {
        Self {
            compare: Some(Arc::new(move |a, b| key(a).cmp(&key(b)))),
        }
    }

    pub fn descending<K, F>(key: F) -> Self
    where
        K: Ord,
        F: Fn(&T) -> K + Send + Sync + 'static,
    {
        Self {
            compare: Some(Arc::new(move |a, b| key(b).cmp(&key(a)))),
        }
    }

    /// Breaks ties of `self` with `next`.
    pub fn then(self, next: SortOrder<T>) -> Self {
        match (self.compare, next.compare) {
            (Some(first), Some(second)) => Self {
                compare: Some(Arc::new(move |a, b| first(a, b).then_with(|| second(a, b)))),
            },
            (first, None) => Self { compare: first },
            (None, second) => Self { compare: second },
        }
    }

    pub fn sort(&self, records: &mut [T]) {
        if let Some(compare) = &self.compare {
            records.sort_by(|a, b| compare(a, b));
        }
    }
}

impl<T: 'static> Default for SortOrder<T> {
    fn default() -> Self {
        Self::unsorted()
    }
}
