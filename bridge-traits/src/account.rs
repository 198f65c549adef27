//! Account Identity
//!
//! The core never inspects account details. It only needs an identity it can
//! compare, so that "clean everything for the current account" touches the
//! right watches.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque, comparable account identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Source of the currently selected account
///
/// Implemented by the host shell, which owns account selection.
pub trait AccountContext: Send + Sync {
    /// The active account, if anyone is signed in
    fn current_account(&self) -> Option<AccountId>;
}
