//! Deallocation policy applied when a view is created by allocation.

use serde::{Deserialize, Serialize};

/// Decides whether an allocated view receives a deallocation hook.
///
/// By default every allocation attaches a hook that returns the block to its
/// allocator. `Suppress` is used when the foreign side manages the block's
/// lifetime itself: the view is allocated but does not own its memory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeallocationPolicy {
    #[default]
    Attach,
    Suppress,
}

impl DeallocationPolicy {
    /// Maps the declarative "no deallocator" flag to a policy.
    pub fn from_no_deallocator(no_deallocator: bool) -> DeallocationPolicy {
        if no_deallocator {
            DeallocationPolicy::Suppress
        } else {
            DeallocationPolicy::Attach
        }
    }

    pub fn attaches(self) -> bool {
        self == DeallocationPolicy::Attach
    }

    pub fn suppresses(self) -> bool {
        self == DeallocationPolicy::Suppress
    }

    /// Combines the policy of an enclosing scope with a nested one.
    /// Suppression in either scope wins.
    pub fn combine(self, nested: DeallocationPolicy) -> DeallocationPolicy {
        DeallocationPolicy::from_no_deallocator(self.suppresses() || nested.suppresses())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_attaches() {
        assert!(DeallocationPolicy::default().attaches());
        assert!(DeallocationPolicy::from_no_deallocator(true).suppresses());
    }

    #[test]
    fn test_combine() {
        use DeallocationPolicy::*;
        assert_eq!(Attach.combine(Attach), Attach);
        assert_eq!(Attach.combine(Suppress), Suppress);
        assert_eq!(Suppress.combine(Attach), Suppress);
    }
}
