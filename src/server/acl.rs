//! Access control boundary
//!
//! The platform's account/user ACL store is external. This module defines the
//! check the command catalog needs from it and a table-driven implementation
//! used by the CLI and tests.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::utils::error::DcsError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    None,
    Read,
    #[default]
    Write,
    All,
}

impl FromStr for AccessLevel {
    type Err = DcsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "0" => Ok(AccessLevel::None),
            "read" | "view" | "1" => Ok(AccessLevel::Read),
            "write" | "2" => Ok(AccessLevel::Write),
            "all" | "3" => Ok(AccessLevel::All),
            other => Err(DcsError::InvalidArguments(format!(
                "unknown access level '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AccessLevel::None => "none",
            AccessLevel::Read => "read",
            AccessLevel::Write => "write",
            AccessLevel::All => "all",
        };
        f.write_str(s)
    }
}

/// Resolves a user's access level against a named ACL
pub trait AccessControl {
    /// Access level of `user` on `acl_name`, or `default` if no rule applies
    fn access_level(&self, user: &str, acl_name: &str, default: AccessLevel) -> AccessLevel;

    fn has_write_access(&self, user: &str, acl_name: &str, default: AccessLevel) -> bool {
        self.access_level(user, acl_name, default) >= AccessLevel::Write
    }
}

/// Qualify an ACL name with a child name (`parent.child`)
pub fn child_acl_name(parent: &str, child: &str) -> String {
    let parent = parent.trim();
    let child = child.trim();
    if parent.is_empty() {
        child.to_string()
    } else if child.is_empty() {
        parent.to_string()
    } else {
        format!("{}.{}", parent, child)
    }
}

/// Explicit grants per user and ACL name
#[derive(Debug, Clone, Default)]
pub struct AccessRules {
    grants: HashMap<(String, String), AccessLevel>,
    user_defaults: HashMap<String, AccessLevel>,
}

impl AccessRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(&mut self, user: &str, acl_name: &str, level: AccessLevel) -> &mut Self {
        self.grants
            .insert((user.to_string(), acl_name.to_string()), level);
        self
    }

    /// Level applied to every ACL the user has no explicit grant for
    pub fn grant_all(&mut self, user: &str, level: AccessLevel) -> &mut Self {
        self.user_defaults.insert(user.to_string(), level);
        self
    }
}

impl AccessControl for AccessRules {
    fn access_level(&self, user: &str, acl_name: &str, default: AccessLevel) -> AccessLevel {
        self.grants
            .get(&(user.to_string(), acl_name.to_string()))
            .or_else(|| self.user_defaults.get(user))
            .copied()
            .unwrap_or(default)
    }
}
