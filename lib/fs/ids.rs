use crate::fs::{NamespaceId, ROOT_NAMESPACE_ID};
use crate::sync::{Mutex, unpoison};

/// Monotonically increasing namespace id allocator.
///
/// Every id comes out of one exclusive critical section. Ids are never reset and never reused;
/// once the 32-bit space is exhausted [`generate`](Self::generate) keeps returning `None`.
pub struct IdGenerator {
    next: Mutex<Option<NamespaceId>>,
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new(ROOT_NAMESPACE_ID + 1)
    }
}

impl IdGenerator {
    /// Start issuing ids at `base`.
    #[must_use]
    pub fn new(base: NamespaceId) -> Self {
        Self {
            next: Mutex::new(Some(base)),
        }
    }

    /// Issue the next id.
    pub fn generate(&self) -> Option<NamespaceId> {
        let mut next = unpoison(self.next.lock());
        let id = (*next)?;
        *next = id.checked_add(1);
        Some(id)
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;

    #[test]
    fn ids_are_sequential_from_base() {
        let ids = IdGenerator::new(7);
        assert_eq!(ids.generate(), Some(7));
        assert_eq!(ids.generate(), Some(8));
    }

    #[test]
    fn exhausted_space_never_wraps() {
        let ids = IdGenerator::new(NamespaceId::MAX);
        assert_eq!(ids.generate(), Some(NamespaceId::MAX));
        assert_eq!(ids.generate(), None);
        assert_eq!(ids.generate(), None);
    }
}
