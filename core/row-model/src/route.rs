//! FILENAME: core/row-model/src/route.rs
//! PURPOSE: A route is the path of group keys addressing one level of the hierarchy.
//! CONTEXT: The empty route addresses the top level. Routes are used by
//! transactions, purges and row source requests.

use std::fmt;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Ordered group keys from the top level down to a group node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Route(SmallVec<[String; 4]>);

impl Route {
    /// The route of the top level.
    pub fn root() -> Self {
        Route(SmallVec::new())
    }

    pub fn from_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Route(keys.into_iter().map(Into::into).collect())
    }

    pub fn keys(&self) -> &[String] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns a new route one level deeper.
    pub fn child(&self, key: impl Into<String>) -> Route {
        let mut keys = self.0.clone();
        keys.push(key.into());
        Route(keys)
    }

    pub fn parent(&self) -> Option<Route> {
        if self.0.is_empty() {
            return None;
        }
        let mut keys = self.0.clone();
        keys.pop();
        Some(Route(keys))
    }

    pub fn last(&self) -> Option<&str> {
        self.0.last().map(|s| s.as_str())
    }

    /// True if `prefix` addresses this route or one of its ancestors.
    pub fn starts_with(&self, prefix: &Route) -> bool {
        self.0.len() >= prefix.0.len() && self.0[..prefix.0.len()] == prefix.0[..]
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0.join("/"))
    }
}

impl From<Vec<String>> for Route {
    fn from(keys: Vec<String>) -> Self {
        Route(keys.into_iter().collect())
    }
}

impl From<&[&str]> for Route {
    fn from(keys: &[&str]) -> Self {
        Route::from_keys(keys.iter().copied())
    }
}
