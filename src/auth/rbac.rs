//! Role-based permission decisions.
//!
//! The role-to-permission mapping is static configuration built once at
//! startup. Dispatch is enum-keyed throughout; the `"resource.operation"`
//! string form exists only at the serialization edge.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use crate::entities::users::Role;

use super::error::AuthError;
use super::session::SessionUser;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Users,
    Games,
    Categories,
    DownloadLinks,
    SystemSettings,
}

impl Resource {
    const ALL: [Self; 5] = [
        Self::Users,
        Self::Games,
        Self::Categories,
        Self::DownloadLinks,
        Self::SystemSettings,
    ];

    const fn as_str(self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Games => "games",
            Self::Categories => "categories",
            Self::DownloadLinks => "download_links",
            Self::SystemSettings => "system_settings",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
    Approve,
    Reject,
    Publish,
    Manage,
}

impl Operation {
    const ALL: [Self; 8] = [
        Self::Create,
        Self::Read,
        Self::Update,
        Self::Delete,
        Self::Approve,
        Self::Reject,
        Self::Publish,
        Self::Manage,
    ];

    const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Publish => "publish",
            Self::Manage => "manage",
        }
    }
}

/// An immutable resource/operation pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Permission {
    pub resource: Resource,
    pub operation: Operation,
}

impl Permission {
    #[must_use]
    pub const fn new(resource: Resource, operation: Operation) -> Self {
        Self { resource, operation }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.resource.as_str(), self.operation.as_str())
    }
}

impl FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (res, op) = s
            .split_once('.')
            .ok_or_else(|| format!("malformed permission: {s}"))?;

        let resource = Resource::ALL
            .into_iter()
            .find(|r| r.as_str() == res)
            .ok_or_else(|| format!("unknown resource: {res}"))?;
        let operation = Operation::ALL
            .into_iter()
            .find(|o| o.as_str() == op)
            .ok_or_else(|| format!("unknown operation: {op}"))?;

        Ok(Self { resource, operation })
    }
}

/// Whether a permission check additionally requires the caller to own the
/// targeted resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    Any,
    Required,
}

/// Result of a successful [`PermissionTable::require`]. When `must_own` is
/// set the handler has to compare the caller id against the resource's
/// owner id; the engine only signals that the check is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grant {
    pub must_own: bool,
}

pub struct PermissionTable {
    grants: HashMap<Role, HashSet<Permission>>,
}

impl PermissionTable {
    /// The reference configuration: admin holds every pairing, user a
    /// curated subset covering self-service and own-content management.
    #[must_use]
    pub fn standard() -> Self {
        let mut grants: HashMap<Role, HashSet<Permission>> = HashMap::new();

        let admin: HashSet<Permission> = Resource::ALL
            .into_iter()
            .flat_map(|r| Operation::ALL.into_iter().map(move |o| Permission::new(r, o)))
            .collect();

        let user: HashSet<Permission> = [
            Permission::new(Resource::Users, Operation::Read),
            Permission::new(Resource::Users, Operation::Update),
            Permission::new(Resource::Games, Operation::Create),
            Permission::new(Resource::Games, Operation::Read),
            Permission::new(Resource::Games, Operation::Update),
            Permission::new(Resource::Categories, Operation::Read),
            Permission::new(Resource::DownloadLinks, Operation::Create),
            Permission::new(Resource::DownloadLinks, Operation::Read),
            Permission::new(Resource::DownloadLinks, Operation::Update),
            Permission::new(Resource::DownloadLinks, Operation::Delete),
        ]
        .into_iter()
        .collect();

        grants.insert(Role::Admin, admin);
        grants.insert(Role::User, user);

        Self { grants }
    }

    /// Pure and total: false for anonymous callers, set lookup otherwise.
    #[must_use]
    pub fn has_permission(&self, user: Option<&SessionUser>, permission: Permission) -> bool {
        user.is_some_and(|u| {
            self.grants
                .get(&u.role)
                .is_some_and(|set| set.contains(&permission))
        })
    }

    /// Gates a request: anonymous callers are rejected distinctly (401
    /// semantics) from authenticated callers lacking the permission (403).
    /// Admins are exempt from ownership checks.
    pub fn require(
        &self,
        user: Option<&SessionUser>,
        permission: Permission,
        ownership: Ownership,
    ) -> Result<Grant, AuthError> {
        let Some(user) = user else {
            return Err(AuthError::UnauthorizedAccess);
        };

        if !self.has_permission(Some(user), permission) {
            return Err(AuthError::ForbiddenAccess);
        }

        Ok(Grant {
            must_own: ownership == Ownership::Required && user.role != Role::Admin,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> PermissionTable {
        PermissionTable::standard()
    }

    fn admin() -> SessionUser {
        SessionUser {
            id: 1,
            username: "root".to_string(),
            email: "root@example.com".to_string(),
            role: Role::Admin,
        }
    }

    fn member() -> SessionUser {
        SessionUser {
            id: 2,
            username: "casey".to_string(),
            email: "casey@example.com".to_string(),
            role: Role::User,
        }
    }

    #[test]
    fn admin_is_a_superset_of_user() {
        let t = table();
        for perm in t.grants[&Role::User].iter() {
            assert!(t.grants[&Role::Admin].contains(perm), "admin missing {perm}");
        }
    }

    #[test]
    fn permission_truth_table() {
        let t = table();
        let delete_games: Permission = "games.delete".parse().unwrap();
        let read_games: Permission = "games.read".parse().unwrap();
        let manage_users: Permission = "users.manage".parse().unwrap();

        assert!(t.has_permission(Some(&admin()), delete_games));
        assert!(!t.has_permission(Some(&member()), delete_games));
        assert!(t.has_permission(Some(&member()), read_games));
        assert!(t.has_permission(Some(&admin()), manage_users));
        assert!(!t.has_permission(Some(&member()), manage_users));
        assert!(!t.has_permission(None, read_games));
    }

    #[test]
    fn require_distinguishes_401_from_403() {
        let t = table();
        let manage_users: Permission = "users.manage".parse().unwrap();

        assert_eq!(
            t.require(None, manage_users, Ownership::Any),
            Err(AuthError::UnauthorizedAccess)
        );
        assert_eq!(
            t.require(Some(&member()), manage_users, Ownership::Any),
            Err(AuthError::ForbiddenAccess)
        );
        assert!(t.require(Some(&admin()), manage_users, Ownership::Any).is_ok());
    }

    #[test]
    fn ownership_is_signalled_but_admins_are_exempt() {
        let t = table();
        let update_games: Permission = "games.update".parse().unwrap();

        let grant = t
            .require(Some(&member()), update_games, Ownership::Required)
            .unwrap();
        assert!(grant.must_own);

        let grant = t
            .require(Some(&admin()), update_games, Ownership::Required)
            .unwrap();
        assert!(!grant.must_own);
    }

    #[test]
    fn permission_string_round_trip() {
        for r in Resource::ALL {
            for o in Operation::ALL {
                let perm = Permission::new(r, o);
                let parsed: Permission = perm.to_string().parse().unwrap();
                assert_eq!(parsed, perm);
            }
        }

        assert!("games".parse::<Permission>().is_err());
        assert!("games.destroy".parse::<Permission>().is_err());
        assert!("widgets.read".parse::<Permission>().is_err());
    }
}
