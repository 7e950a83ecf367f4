use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};

use crate::types::ResourceId;

/// Identity of an edorg as the Admin API sees it.
///
/// Built only through [`edorg_key_v1`](super::edorg_key_v1) or
/// [`edorg_key_v2`](super::edorg_key_v2); a v1 key never equals a v2 key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdOrgKey {
    pub(super) ods_instance_id: Option<i64>,
    pub(super) education_organization_id: i64,
}

impl fmt::Display for EdOrgKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ods_instance_id {
            Some(ods) => write!(f, "{ods}-{}", self.education_organization_id),
            None => write!(f, "{}", self.education_organization_id),
        }
    }
}

/// One entry of an allowed-id set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AuthKey {
    Id(ResourceId),
    EdOrg(EdOrgKey),
}

impl From<ResourceId> for AuthKey {
    fn from(id: ResourceId) -> Self {
        Self::Id(id)
    }
}

impl From<EdOrgKey> for AuthKey {
    fn from(key: EdOrgKey) -> Self {
        Self::EdOrg(key)
    }
}

impl Serialize for AuthKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Id(id) => serializer.serialize_i64(*id),
            Self::EdOrg(key) => serializer.collect_str(key),
        }
    }
}

/// The resources a team may act upon for one privilege.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ids {
    /// Every instance, no filtering.
    All,
    Set(BTreeSet<AuthKey>),
}

impl Default for Ids {
    fn default() -> Self {
        Self::empty()
    }
}

impl Ids {
    #[must_use]
    pub fn empty() -> Self {
        Self::Set(BTreeSet::new())
    }

    pub fn from_ids(ids: impl IntoIterator<Item = ResourceId>) -> Self {
        Self::Set(ids.into_iter().map(AuthKey::Id).collect())
    }

    pub fn from_keys(keys: impl IntoIterator<Item = AuthKey>) -> Self {
        Self::Set(keys.into_iter().collect())
    }

    #[must_use]
    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Set(set) if set.is_empty())
    }

    /// Point check against an id that was not known when the cache was built.
    #[must_use]
    pub fn contains(&self, id: ResourceId) -> bool {
        self.contains_key(&AuthKey::Id(id))
    }

    #[must_use]
    pub fn contains_key(&self, key: &AuthKey) -> bool {
        match self {
            Self::All => true,
            Self::Set(set) => set.contains(key),
        }
    }

    /// `All` absorbs everything; sets are unioned.
    pub fn union_with(&mut self, other: Ids) {
        match (&mut *self, other) {
            (Self::All, _) => {}
            (this, Self::All) => *this = Self::All,
            (Self::Set(mine), Self::Set(theirs)) => mine.extend(theirs),
        }
    }
}

impl Serialize for Ids {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::All => serializer.serialize_bool(true),
            Self::Set(set) => {
                let mut seq = serializer.serialize_seq(Some(set.len()))?;
                for key in set {
                    seq.serialize_element(key)?;
                }
                seq.end()
            }
        }
    }
}

/// Id sets partitioned by an environment or tenant id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScopedIds {
    /// Set by a global grant: every scope key, including ones created later, is `All`.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    all_scopes: bool,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    scopes: BTreeMap<ResourceId, Ids>,
}

impl ScopedIds {
    #[must_use]
    pub fn get(&self, scope: ResourceId) -> Ids {
        if self.all_scopes {
            return Ids::All;
        }
        self.scopes.get(&scope).cloned().unwrap_or_default()
    }

    pub(crate) fn grant_all_scopes(&mut self) {
        self.all_scopes = true;
        self.scopes.clear();
    }

    pub(crate) fn grant(&mut self, scope: ResourceId, ids: Ids) {
        if self.all_scopes || ids.is_empty() {
            return;
        }
        self.scopes.entry(scope).or_default().union_with(ids);
    }

    /// Scope keys with an explicit entry. Empty when `all_scopes` is set.
    pub fn scope_keys(&self) -> impl Iterator<Item = ResourceId> + '_ {
        self.scopes.keys().copied()
    }

    #[must_use]
    pub fn is_all_scopes(&self) -> bool {
        self.all_scopes
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.all_scopes && self.scopes.is_empty()
    }
}
