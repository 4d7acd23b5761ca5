// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Synchronization fence handles.
//!
//! A [`Fence`] is an opaque handle to a GPU/display synchronization point.
//! The composition core never waits on fences; it only routes them between
//! the hardware composer, the render backend, and layer front-ends. The
//! handle therefore carries identity (and merge lineage, for diagnostics)
//! rather than any waitable state.

use std::sync::Arc;

/// An opaque fence handle.
///
/// `Fence::NO_FENCE` is the invalid fence; it compares equal only to other
/// invalid fences. Valid fences compare equal only to clones of themselves.
#[derive(Clone, Default)]
pub struct Fence {
    inner: Option<Arc<FenceNode>>,
}

struct FenceNode {
    label: &'static str,
    merged_from: Option<(Fence, Fence)>,
}

impl Fence {
    /// The invalid fence, meaning "no synchronization required".
    pub const NO_FENCE: Self = Self { inner: None };

    /// Creates a new distinct valid fence.
    #[must_use]
    pub fn new(label: &'static str) -> Self {
        Self {
            inner: Some(Arc::new(FenceNode {
                label,
                merged_from: None,
            })),
        }
    }

    /// Returns whether this is a valid fence.
    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.inner.is_some()
    }

    /// Returns the label this fence was created with, if valid.
    #[must_use]
    pub fn label(&self) -> Option<&'static str> {
        self.inner.as_ref().map(|n| n.label)
    }

    /// Merges two fences into one that represents both signal points.
    ///
    /// Merging with an invalid fence returns the other fence unchanged;
    /// merging two invalid fences returns `NO_FENCE`.
    #[must_use]
    pub fn merge(label: &'static str, a: &Self, b: &Self) -> Self {
        match (a.is_valid(), b.is_valid()) {
            (false, false) => Self::NO_FENCE,
            (true, false) => a.clone(),
            (false, true) => b.clone(),
            (true, true) => Self {
                inner: Some(Arc::new(FenceNode {
                    label,
                    merged_from: Some((a.clone(), b.clone())),
                })),
            },
        }
    }

    /// Returns the two fences this one was merged from, if any.
    #[must_use]
    pub fn merged_from(&self) -> Option<(&Self, &Self)> {
        self.inner
            .as_ref()
            .and_then(|n| n.merged_from.as_ref())
            .map(|(a, b)| (a, b))
    }
}

impl PartialEq for Fence {
    fn eq(&self, other: &Self) -> bool {
        match (&self.inner, &other.inner) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Eq for Fence {}

impl core::fmt::Debug for Fence {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match &self.inner {
            None => write!(f, "Fence(none)"),
            Some(n) => write!(f, "Fence({:?})", n.label),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_fence_is_invalid() {
        assert!(!Fence::NO_FENCE.is_valid());
        assert_eq!(Fence::NO_FENCE, Fence::NO_FENCE);
        assert_eq!(Fence::NO_FENCE.label(), None);
    }

    #[test]
    fn distinct_fences_are_unequal() {
        let a = Fence::new("a");
        let b = Fence::new("b");
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
        assert_ne!(a, Fence::NO_FENCE);
    }

    #[test]
    fn merge_with_invalid_returns_other() {
        let a = Fence::new("a");
        assert_eq!(Fence::merge("m", &a, &Fence::NO_FENCE), a);
        assert_eq!(Fence::merge("m", &Fence::NO_FENCE, &a), a);
        assert_eq!(
            Fence::merge("m", &Fence::NO_FENCE, &Fence::NO_FENCE),
            Fence::NO_FENCE
        );
    }

    #[test]
    fn merge_of_two_valid_records_lineage() {
        let a = Fence::new("a");
        let b = Fence::new("b");
        let m = Fence::merge("merged", &a, &b);
        assert!(m.is_valid());
        assert_ne!(m, a);
        assert_ne!(m, b);
        let (ma, mb) = m.merged_from().unwrap();
        assert_eq!(*ma, a);
        assert_eq!(*mb, b);
    }
}
