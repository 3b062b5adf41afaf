//! Account roles and role-gated capabilities

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Roles a user may hold. A user always holds `User`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    User,
    Author,
    Editor,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "USER"),
            Role::Author => write!(f, "AUTHOR"),
            Role::Editor => write!(f, "EDITOR"),
            Role::Admin => write!(f, "ADMIN"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "USER" => Ok(Role::User),
            "AUTHOR" => Ok(Role::Author),
            "EDITOR" => Ok(Role::Editor),
            "ADMIN" => Ok(Role::Admin),
            other => Err(format!("Unknown role: {other}")),
        }
    }
}

/// Whether the role set allows publishing books and series
pub fn can_publish(roles: &[Role]) -> bool {
    roles.iter().any(|r| matches!(r, Role::Author | Role::Admin))
}

/// Whether the role set allows administering other accounts
pub fn is_admin(roles: &[Role]) -> bool {
    roles.contains(&Role::Admin)
}

/// Sort, dedupe and make sure `User` is present
pub fn normalize_roles(mut roles: Vec<Role>) -> Vec<Role> {
    roles.push(Role::User);
    roles.sort();
    roles.dedup();
    roles
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_capability() {
        assert!(!can_publish(&[Role::User]));
        assert!(!can_publish(&[Role::User, Role::Editor]));
        assert!(can_publish(&[Role::User, Role::Author]));
        assert!(can_publish(&[Role::Admin]));
    }

    #[test]
    fn test_normalize_roles() {
        let roles = normalize_roles(vec![Role::Admin, Role::Author, Role::Admin]);
        assert_eq!(roles, vec![Role::User, Role::Author, Role::Admin]);
        assert_eq!(normalize_roles(vec![]), vec![Role::User]);
    }

    #[test]
    fn test_parse_and_serialize() {
        assert_eq!("author".parse::<Role>(), Ok(Role::Author));
        assert!("owner".parse::<Role>().is_err());
        assert_eq!(serde_json::to_string(&Role::Editor).unwrap(), "\"EDITOR\"");
        assert_eq!(Role::Admin.to_string(), "ADMIN");
    }
}
