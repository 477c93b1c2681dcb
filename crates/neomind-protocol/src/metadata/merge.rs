//! Merge policy for metadata expansion maps.
//!
//! Expansion maps (`expands`) are free-form side tables attached to metadata
//! items. When two metadata documents are combined the caller decides, via
//! [`MergeOption`]s, which expansion keys may cross over:
//!
//! - no [`ExpandsMerge`] option: every source key overwrites the destination
//! - [`ExpandsMerge::ignore`]: listed keys are not copied
//! - [`ExpandsMerge::remove`]: listed keys are not copied and are deleted
//!   from the destination afterwards
//! - [`ExpandsMerge::ignore_all`]: nothing is copied

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::{DeviceMetadataType, Expands};

/// Directive controlling how two metadata documents are merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOption {
    /// Keep items that already exist in the destination
    IgnoreExists,
    /// Merge the expansion maps of items present on both sides
    MergeExpands,
    /// Filter which expansion keys are merged
    ExpandsMerge(ExpandsMerge),
}

impl MergeOption {
    pub fn id(&self) -> &'static str {
        match self {
            MergeOption::IgnoreExists => "ignoreExists",
            MergeOption::MergeExpands => "mergeExpands",
            MergeOption::ExpandsMerge(_) => "expandsMerge",
        }
    }

    /// Whether `target` appears in `options`.
    pub fn has(options: &[MergeOption], target: &MergeOption) -> bool {
        options.iter().any(|option| option == target)
    }

    pub fn as_expands_merge(&self) -> Option<&ExpandsMerge> {
        match self {
            MergeOption::ExpandsMerge(merge) => Some(merge),
            _ => None,
        }
    }
}

impl From<ExpandsMerge> for MergeOption {
    fn from(merge: ExpandsMerge) -> Self {
        MergeOption::ExpandsMerge(merge)
    }
}

/// What happens to the matched keys of an [`ExpandsMerge`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpandsMergeMode {
    /// Do not copy matched keys
    Ignore,
    /// Do not copy matched keys, then delete them from the destination
    Remove,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum KeySelector {
    Keys(HashSet<String>),
    All,
}

/// Key filter applied while merging expansion maps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandsMerge {
    keys: KeySelector,
    mode: ExpandsMergeMode,
}

impl ExpandsMerge {
    pub fn ignore<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: KeySelector::Keys(keys.into_iter().map(Into::into).collect()),
            mode: ExpandsMergeMode::Ignore,
        }
    }

    pub fn remove<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: KeySelector::Keys(keys.into_iter().map(Into::into).collect()),
            mode: ExpandsMergeMode::Remove,
        }
    }

    /// Skip every expansion key.
    pub fn ignore_all() -> Self {
        Self {
            keys: KeySelector::All,
            mode: ExpandsMergeMode::Ignore,
        }
    }

    pub fn mode(&self) -> ExpandsMergeMode {
        self.mode
    }

    pub fn is_ignored(&self, key: &str) -> bool {
        match &self.keys {
            KeySelector::Keys(keys) => keys.contains(key),
            KeySelector::All => true,
        }
    }

    /// Copy the keys of `from` that this filter lets through.
    pub fn merge_into(&self, from: &Expands, to: &mut Expands) {
        for (key, value) in from {
            if !self.is_ignored(key) {
                to.insert(key.clone(), value.clone());
            }
        }
    }

    fn remove_matched(&self, to: &mut Expands) {
        if let (ExpandsMergeMode::Remove, KeySelector::Keys(keys)) = (self.mode, &self.keys) {
            for key in keys {
                to.remove(key);
            }
        }
    }
}

/// Merge `from` into `to` under `options`.
///
/// Every [`ExpandsMerge`] in `options` is applied in order. When none is
/// present the merge is a plain union where source keys win.
pub fn merge_expands(
    metadata_type: DeviceMetadataType,
    from: &Expands,
    to: &mut Expands,
    options: &[MergeOption],
) {
    if from.is_empty() {
        return;
    }

    let mut merged = false;
    for expands_merge in options.iter().filter_map(MergeOption::as_expands_merge) {
        merged = true;
        expands_merge.merge_into(from, to);
        expands_merge.remove_matched(to);
    }

    if !merged {
        for (key, value) in from {
            to.insert(key.clone(), value.clone());
        }
    }

    tracing::trace!(
        "Merged {} expands key(s) for {:?}, filtered: {}",
        from.len(),
        metadata_type,
        merged
    );
}
