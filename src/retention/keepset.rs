use crate::error::KeepSetError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Opaque identifier of a user-equivalent identity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Principal(String);

impl Principal {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Principal {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The principals a run must keep. Fixed once built; never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeepSet {
    principals: BTreeSet<Principal>,
}

impl KeepSet {
    pub fn new<I, S>(principals: I) -> Result<Self, KeepSetError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = BTreeSet::new();
        for raw in principals {
            let raw = raw.into();
            if raw.trim().is_empty() {
                return Err(KeepSetError::BlankPrincipal);
            }
            set.insert(Principal(raw));
        }
        if set.is_empty() {
            return Err(KeepSetError::Empty);
        }
        Ok(Self { principals: set })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.principals.iter().any(|p| p.as_str() == id)
    }

    pub fn len(&self) -> usize {
        self.principals.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Principal> {
        self.principals.iter()
    }

    /// Identifiers as plain strings, sorted.
    pub fn ids(&self) -> BTreeSet<String> {
        self.principals.iter().map(|p| p.0.clone()).collect()
    }
}
