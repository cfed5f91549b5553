//! Interface versions and cross-version matching.

use crate::TypeIdentity;

use std::fmt::{Display, Formatter, Result as FormatResult};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl Display for Version {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        write!(formatter, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Successive revisions of one logical interface, in registration order.
///
/// Each [`TypeIdentity`] appears at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionedTypeFallback {
    types: Vec<(TypeIdentity, Version)>,
}

impl VersionedTypeFallback {
    pub fn new(types: impl IntoIterator<Item = (TypeIdentity, Version)>) -> Self {
        let mut fallback = Self::default();
        for (identity, version) in types {
            fallback.push(identity, version);
        }
        fallback
    }

    pub fn single(identity: TypeIdentity, version: Version) -> Self {
        Self {
            types: vec![(identity, version)],
        }
    }

    /// Appends a revision. Returns false if the identity was already present.
    pub fn push(&mut self, identity: TypeIdentity, version: Version) -> bool {
        if self.contains(&identity) {
            return false;
        }

        self.types.push((identity, version));
        true
    }

    pub fn types(&self) -> &[(TypeIdentity, Version)] {
        &self.types
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn contains(&self, identity: &TypeIdentity) -> bool {
        self.version_of(identity).is_some()
    }

    pub fn version_of(&self, identity: &TypeIdentity) -> Option<Version> {
        self.types
            .iter()
            .find(|(candidate, _)| candidate == identity)
            .map(|(_, version)| *version)
    }

    /// True when both fallbacks share at least one type identity, whatever the versions.
    pub fn is_partial_match(&self, other: &VersionedTypeFallback) -> bool {
        self.types
            .iter()
            .any(|(identity, _)| other.contains(identity))
    }

    /// Picks, among the identities both sides know, the one `other` holds at its highest version.
    ///
    /// The returned identity is borrowed from `other`. Equal versions on the other side are
    /// resolved in favour of the identity this side holds at the higher version. The call is
    /// deliberately asymmetric: `a.highest_version_match(b)` and `b.highest_version_match(a)`
    /// may differ.
    pub fn highest_version_match<'a>(
        &self,
        other: &'a VersionedTypeFallback,
    ) -> Option<&'a TypeIdentity> {
        other
            .types
            .iter()
            .filter_map(|(identity, other_version)| {
                self.version_of(identity)
                    .map(|own_version| (identity, *other_version, own_version))
            })
            .fold(
                None,
                |best: Option<(&'a TypeIdentity, Version, Version)>, candidate| match best {
                    Some(current) if (current.1, current.2) >= (candidate.1, candidate.2) => {
                        Some(current)
                    }
                    _ => Some(candidate),
                },
            )
            .map(|(identity, _, _)| identity)
    }
}
