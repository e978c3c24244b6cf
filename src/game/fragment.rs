//! Fragment Catalog
//!
//! Read-only fragment records, grouped by `memoryKey`. Keys are ordered the
//! way a JavaScript object orders its own keys: array-index keys (`"2"`,
//! `"10"`) first in ascending numeric order, then every other key in order of
//! first appearance. Deck building is a pure function of (seed, pairs,
//! catalog) and deals the same deck as a browser build of the game.

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

/// Catalog shipped with the crate.
const BUILTIN_CATALOG: &str = include_str!("../../data/fragments.json");

/// Immutable catalog record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fragment {
    /// Unique id
    pub id: String,

    /// Grouping key; fragments sharing it are a matchable group
    pub memory_key: String,

    /// Text revealed on flip
    pub prompt: String,

    /// Optional image reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Optional sound reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sound: Option<String>,

    /// Narrative text shown when the key is matched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vignette: Option<String>,

    /// Informational tags (unordered)
    #[serde(default)]
    pub tags: Vec<String>,
}

/// All variants sharing one memory key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FragmentGroup {
    /// Shared memory key
    pub key: String,
    /// Variants, in catalog order
    pub variants: Vec<Fragment>,
}

impl FragmentGroup {
    /// Can this group contribute a pair to a deck?
    pub fn is_matchable(&self) -> bool {
        self.variants.len() >= 2
    }
}

/// Fragment catalog, loaded once and never mutated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Catalog {
    groups: Vec<FragmentGroup>,
}

impl Catalog {
    /// Group a fragment list by key.
    pub fn from_fragments(fragments: Vec<Fragment>) -> Result<Self, CatalogError> {
        if fragments.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut seen_ids = std::collections::BTreeSet::new();
        let mut groups: Vec<FragmentGroup> = Vec::new();

        for fragment in fragments {
            if !seen_ids.insert(fragment.id.clone()) {
                return Err(CatalogError::DuplicateId(fragment.id));
            }
            match groups.iter_mut().find(|g| g.key == fragment.memory_key) {
                Some(group) => group.variants.push(fragment),
                None => groups.push(FragmentGroup {
                    key: fragment.memory_key.clone(),
                    variants: vec![fragment],
                }),
            }
        }

        // Stable, so non-index keys keep their first-appearance order
        groups.sort_by_key(|g| match array_index(&g.key) {
            Some(n) => (0, n),
            None => (1, 0),
        });

        Ok(Self { groups })
    }

    /// Parse a JSON array of fragment records.
    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        let fragments: Vec<Fragment> = serde_json::from_str(json)?;
        Self::from_fragments(fragments)
    }

    /// The catalog bundled with the crate.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_json_str(BUILTIN_CATALOG)
    }

    /// Groups in key order (array-index keys first).
    pub fn groups(&self) -> &[FragmentGroup] {
        &self.groups
    }

    /// Look up a group by key.
    pub fn group(&self, key: &str) -> Option<&FragmentGroup> {
        self.groups.iter().find(|g| g.key == key)
    }

    /// Number of distinct keys.
    pub fn key_count(&self) -> usize {
        self.groups.len()
    }

    /// Vignette text for a key (first variant carrying one).
    pub fn vignette(&self, key: &str) -> Option<&str> {
        self.group(key)?
            .variants
            .iter()
            .find_map(|f| f.vignette.as_deref())
    }
}

/// Canonical array index: decimal digits without a leading zero, below
/// `u32::MAX`.
fn array_index(key: &str) -> Option<u32> {
    let n: u32 = key.parse().ok()?;
    (n != u32::MAX && n.to_string() == key).then_some(n)
}
