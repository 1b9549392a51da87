//! Caller identity as handed over by the token verifier.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Account type discriminant carried by bearer tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Vendor,
    Admin,
}

impl Role {
    /// Admins may do anything a vendor may do.
    pub fn satisfies(self, required: Role) -> bool {
        self == required || self == Role::Admin
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "customer" | "0" => Ok(Role::Customer),
            "vendor" | "1" => Ok(Role::Vendor),
            "admin" | "2" => Ok(Role::Admin),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// Authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// User id.
    pub subject: String,
    pub role: Role,
}
