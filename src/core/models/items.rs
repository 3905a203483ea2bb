use std::sync::Arc;

/// Persistent ordered set of shared values.
///
/// Every operation returns a new set. Elements are compared by pointer, so
/// whatever an operation does not touch stays the very same `Arc`.
#[derive(Debug)]
pub struct Items<X>(Vec<Arc<X>>);

impl<X> Clone for Items<X> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<X> Default for Items<X> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<X> Items<X> {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<X>> {
        self.0.iter()
    }

    pub fn has(&self, item: &Arc<X>) -> bool {
        self.0.iter().any(|i| Arc::ptr_eq(i, item))
    }

    pub fn find(&self, mut predicate: impl FnMut(&X) -> bool) -> Option<&Arc<X>> {
        self.0.iter().find(|i| predicate(i))
    }

    /// Append items not already present.
    pub fn add(&self, items: impl IntoIterator<Item = Arc<X>>) -> Self {
        let mut next = self.clone();
        for item in items {
            if !next.has(&item) {
                next.0.push(item);
            }
        }
        next
    }

    /// Swap `old` for `new` in place.
    pub fn replace(&self, old: &Arc<X>, new: Arc<X>) -> Self {
        Self(
            self.0
                .iter()
                .map(|i| {
                    if Arc::ptr_eq(i, old) {
                        Arc::clone(&new)
                    } else {
                        Arc::clone(i)
                    }
                })
                .collect(),
        )
    }

    pub fn delete(&self, item: &Arc<X>) -> Self {
        Self(
            self.0
                .iter()
                .filter(|i| !Arc::ptr_eq(i, item))
                .cloned()
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_skips_duplicates() {
        let a = Arc::new("a");
        let items = Items::default().add([a.clone(), a.clone()]);
        assert_eq!(items.len(), 1);
        let b = Arc::new("a");
        let items = items.add([b.clone()]);
        assert_eq!(items.len(), 2, "equal values with distinct identity are kept");
    }

    #[test]
    fn replace_keeps_other_elements_identical() {
        let a = Arc::new(1);
        let b = Arc::new(2);
        let c = Arc::new(3);
        let items = Items::default().add([a.clone(), b.clone(), c.clone()]);
        let d = Arc::new(4);
        let next = items.replace(&b, d.clone());

        let got: Vec<_> = next.iter().cloned().collect();
        assert!(Arc::ptr_eq(&got[0], &a));
        assert!(Arc::ptr_eq(&got[1], &d));
        assert!(Arc::ptr_eq(&got[2], &c));
        assert!(items.has(&b), "original set is untouched");
        assert!(!next.has(&b));
    }

    #[test]
    fn delete_and_find() {
        let a = Arc::new(1);
        let b = Arc::new(2);
        let items = Items::default().add([a.clone(), b.clone()]);
        let next = items.delete(&a);
        assert_eq!(next.len(), 1);
        assert!(next.find(|x| *x == 2).is_some_and(|x| Arc::ptr_eq(x, &b)));
        assert!(next.find(|x| *x == 1).is_none());
    }
}
