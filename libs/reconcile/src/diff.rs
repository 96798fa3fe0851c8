//! Symmetric set difference between provider-reported and stored names.

use std::collections::BTreeSet;

/// Result of diffing an observed name set against a stored one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagDiff {
    /// Names the provider reports that the store does not know about.
    pub only_observed: BTreeSet<String>,

    /// Names the store holds that the provider no longer reports.
    pub only_stored: BTreeSet<String>,
}

impl TagDiff {
    /// Diff `observed` against `stored`. Duplicates on either side collapse.
    pub fn between<I, J, A, B>(observed: I, stored: J) -> Self
    where
        I: IntoIterator<Item = A>,
        J: IntoIterator<Item = B>,
        A: Into<String>,
        B: Into<String>,
    {
        let observed: BTreeSet<String> = observed.into_iter().map(Into::into).collect();
        let stored: BTreeSet<String> = stored.into_iter().map(Into::into).collect();

        Self {
            only_observed: observed.difference(&stored).cloned().collect(),
            only_stored: stored.difference(&observed).cloned().collect(),
        }
    }
}
