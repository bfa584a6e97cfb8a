//! Role model and display helpers.
//!
//! The remote API stores a user's role field in several shapes: an array of
//! role objects, a single object, a bare string, or nothing at all. Payloads
//! are normalized into [`Roles`] once when they are read, and the rest of the
//! code only ever sees the closed [`Role`] type.

use crate::{error::Result, Error};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Name of the role that implicitly holds every permission.
pub const ADMIN_ROLE: &str = "admin";
/// Name of the second-highest display role.
pub const MODERATOR_ROLE: &str = "moderator";
/// Label shown for users without any role.
pub const DEFAULT_LABEL: &str = "user";

/// A single role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Role {
    Named {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(default)]
        permissions: Vec<String>,
    },
    Unset,
}

impl Role {
    /// A named role without description or permissions.
    pub fn named(name: impl AsRef<str>) -> Self {
        Role::Named {
            name: normalize_name(name.as_ref()),
            description: None,
            permissions: Vec::new(),
        }
    }

    /// The role name, if set.
    pub fn name(&self) -> Option<&str> {
        match self {
            Role::Named { name, .. } => Some(name),
            Role::Unset => None,
        }
    }

    /// Permissions attached to this role.
    pub fn permissions(&self) -> &[String] {
        match self {
            Role::Named { permissions, .. } => permissions,
            Role::Unset => &[],
        }
    }

    fn from_object(map: &serde_json::Map<String, Value>) -> Result<Self> {
        let name = map
            .get("name")
            .and_then(Value::as_str)
            .map(normalize_name)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| Error::InvalidRole("role object without a name".into()))?;

        let description = map
            .get("description")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(String::from);

        let permissions = match map.get("permissions") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::String(p)) => vec![p.trim().to_string()],
            Some(Value::Array(values)) => values
                .iter()
                .filter_map(Value::as_str)
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect(),
            Some(other) => {
                return Err(Error::InvalidRole(format!(
                    "permissions of role '{name}' must be strings, got {other}"
                )));
            }
        };

        Ok(Role::Named {
            name,
            description,
            permissions: dedup(permissions),
        })
    }
}

fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

fn dedup(values: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(values.len());
    for value in values {
        if !out.contains(&value) {
            out.push(value);
        }
    }
    out
}

/// The normalized role set of one user.
///
/// Holds only named roles; an empty set is the unset role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Roles {
    roles: Vec<Role>,
}

impl Roles {
    /// A user with no role.
    pub fn unset() -> Self {
        Self::default()
    }

    /// Normalize a raw role field.
    pub fn from_value(value: &Value) -> Result<Self> {
        let mut roles = Roles::unset();
        match value {
            Value::Null => {}
            Value::String(_) | Value::Object(_) => roles.push(Self::single(value)?),
            Value::Array(values) => {
                for value in values {
                    roles.push(Self::single(value)?);
                }
            }
            other => {
                return Err(Error::InvalidRole(format!("unsupported role value: {other}")));
            }
        }
        Ok(roles)
    }

    fn single(value: &Value) -> Result<Role> {
        match value {
            Value::Null => Ok(Role::Unset),
            Value::String(s) if s.trim().is_empty() => Ok(Role::Unset),
            Value::String(s) => Ok(Role::named(s)),
            Value::Object(map) => Role::from_object(map),
            other => Err(Error::InvalidRole(format!("unsupported role value: {other}"))),
        }
    }

    /// Add a role, merging it into an existing role of the same name.
    pub fn push(&mut self, role: Role) {
        let Role::Named {
            name,
            description,
            permissions,
        } = role
        else {
            return;
        };

        let existing = self.roles.iter_mut().find(|r| r.name() == Some(name.as_str()));
        match existing {
            Some(Role::Named {
                description: existing_description,
                permissions: existing_permissions,
                ..
            }) => {
                if existing_description.is_none() {
                    *existing_description = description;
                }
                for permission in permissions {
                    if !existing_permissions.contains(&permission) {
                        existing_permissions.push(permission);
                    }
                }
            }
            _ => self.roles.push(Role::Named {
                name,
                description,
                permissions,
            }),
        }
    }

    /// Merge another role set into this one.
    pub fn merge(&mut self, other: Roles) {
        for role in other.roles {
            self.push(role);
        }
    }

    /// All named roles.
    pub fn iter(&self) -> impl Iterator<Item = &Role> {
        self.roles.iter()
    }

    pub fn is_unset(&self) -> bool {
        self.roles.is_empty()
    }

    pub fn has_role(&self, name: &str) -> bool {
        let name = normalize_name(name);
        self.roles.iter().any(|r| r.name() == Some(name.as_str()))
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(ADMIN_ROLE)
    }

    /// Admins hold every permission.
    pub fn has_permission(&self, permission: &str) -> bool {
        self.is_admin()
            || self
                .roles
                .iter()
                .any(|r| r.permissions().iter().any(|p| p == permission))
    }

    /// The role to display for the user.
    pub fn label(&self) -> &str {
        if self.is_admin() {
            ADMIN_ROLE
        } else if self.has_role(MODERATOR_ROLE) {
            MODERATOR_ROLE
        } else {
            self.roles
                .iter()
                .find_map(Role::name)
                .unwrap_or(DEFAULT_LABEL)
        }
    }

    /// Union of all permissions, in first-seen order.
    pub fn permissions(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for permission in self.roles.iter().flat_map(Role::permissions) {
            if !out.contains(&permission.as_str()) {
                out.push(permission);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn absent_role_is_unset() {
        let roles = Roles::from_value(&Value::Null).unwrap();
        assert!(roles.is_unset());
        assert_eq!(roles.label(), DEFAULT_LABEL);
        assert!(!roles.has_permission("candidates:write"));
    }

    #[test]
    fn bare_string() {
        let roles = Roles::from_value(&json!(" Admin ")).unwrap();
        assert!(roles.is_admin());
        assert_eq!(roles.label(), "admin");

        let roles = Roles::from_value(&json!("")).unwrap();
        assert!(roles.is_unset());
    }

    #[test]
    fn single_object() {
        let roles = Roles::from_value(&json!({
            "name": "editor",
            "description": "Edits FAQ",
            "permissions": ["faq:write", "faq:write", "faq:read"]
        }))
        .unwrap();

        assert_eq!(roles.label(), "editor");
        assert_eq!(roles.permissions(), vec!["faq:write", "faq:read"]);
        assert!(roles.has_permission("faq:read"));
        assert!(!roles.has_permission("candidates:write"));
    }

    #[test]
    fn array_of_mixed_shapes_merges_duplicates() {
        let roles = Roles::from_value(&json!([
            "moderator",
            {"name": "Moderator", "description": "Moderates", "permissions": "votes:read"},
            {"name": "editor", "permissions": ["faq:write"]},
            null
        ]))
        .unwrap();

        assert_eq!(roles.iter().count(), 2);
        assert_eq!(roles.label(), "moderator");
        assert_eq!(roles.permissions(), vec!["votes:read", "faq:write"]);

        let moderator = roles.iter().next().unwrap();
        assert_eq!(
            moderator,
            &Role::Named {
                name: "moderator".into(),
                description: Some("Moderates".into()),
                permissions: vec!["votes:read".into()],
            }
        );
    }

    #[test]
    fn admin_holds_every_permission() {
        let roles = Roles::from_value(&json!([{"name": "admin"}])).unwrap();
        assert!(roles.has_permission("anything"));
    }

    #[test]
    fn invalid_shapes_are_rejected() {
        assert!(Roles::from_value(&json!(42)).is_err());
        assert!(Roles::from_value(&json!([true])).is_err());
        assert!(Roles::from_value(&json!({"description": "no name"})).is_err());
        assert!(Roles::from_value(&json!({"name": "x", "permissions": 3})).is_err());
    }

    #[test]
    fn merge_role_sets() {
        let mut a = Roles::from_value(&json!({"name": "editor", "permissions": ["faq:write"]})).unwrap();
        let b = Roles::from_value(&json!([{"name": "editor", "permissions": ["faq:delete"]}, "admin"])).unwrap();
        a.merge(b);

        assert!(a.is_admin());
        assert_eq!(a.permissions(), vec!["faq:write", "faq:delete"]);
    }

    #[test]
    fn serializes_as_array() {
        let roles = Roles::from_value(&json!("admin")).unwrap();
        let json = serde_json::to_value(&roles).unwrap();
        assert_eq!(
            json,
            json!([{"kind": "named", "name": "admin", "permissions": []}])
        );

        let parsed: Roles = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, roles);
    }
}
