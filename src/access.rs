//! Roles, permissions and the policy that connects them.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    SalesManager,
    AccountManager,
    Bde,
    PreSales,
    Developer,
}

impl Role {
    pub const ALL: [Role; 6] = [
        Role::Admin,
        Role::SalesManager,
        Role::AccountManager,
        Role::Bde,
        Role::PreSales,
        Role::Developer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::SalesManager => "sales_manager",
            Role::AccountManager => "account_manager",
            Role::Bde => "bde",
            Role::PreSales => "pre_sales",
            Role::Developer => "developer",
        }
    }

    /// Maps a stored role string to a role; unrecognised values get the
    /// least privileged role.
    pub fn from_db(raw: &str) -> Self {
        raw.parse().unwrap_or_else(|_| {
            tracing::warn!("Unknown role '{}' treated as developer", raw);
            Role::Developer
        })
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "sales_manager" => Ok(Role::SalesManager),
            "account_manager" => Ok(Role::AccountManager),
            "bde" => Ok(Role::Bde),
            "pre_sales" => Ok(Role::PreSales),
            "developer" => Ok(Role::Developer),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ViewLeads,
    ManageLeads,
    DeleteLeads,
    RunInsights,
    ViewNotes,
    WriteNotes,
    ManageUsers,
}

impl Permission {
    pub const ALL: [Permission; 7] = [
        Permission::ViewLeads,
        Permission::ManageLeads,
        Permission::DeleteLeads,
        Permission::RunInsights,
        Permission::ViewNotes,
        Permission::WriteNotes,
        Permission::ManageUsers,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ViewLeads => "view_leads",
            Permission::ManageLeads => "manage_leads",
            Permission::DeleteLeads => "delete_leads",
            Permission::RunInsights => "run_insights",
            Permission::ViewNotes => "view_notes",
            Permission::WriteNotes => "write_notes",
            Permission::ManageUsers => "manage_users",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether `role` holds `permission`.
pub fn is_allowed(role: Role, permission: Permission) -> bool {
    use Permission::*;

    match role {
        Role::Admin => true,
        Role::SalesManager => permission != ManageUsers,
        Role::AccountManager | Role::Bde | Role::PreSales => matches!(
            permission,
            ViewLeads | ManageLeads | RunInsights | ViewNotes | WriteNotes
        ),
        Role::Developer => matches!(permission, ViewLeads | RunInsights | ViewNotes),
    }
}

/// Every permission `role` holds.
pub fn permissions_for(role: Role) -> Vec<Permission> {
    Permission::ALL
        .into_iter()
        .filter(|p| is_allowed(role, *p))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_holds_everything() {
        assert_eq!(permissions_for(Role::Admin), Permission::ALL.to_vec());
    }

    #[test]
    fn test_only_admin_manages_users() {
        for role in [
            Role::SalesManager,
            Role::AccountManager,
            Role::Bde,
            Role::PreSales,
            Role::Developer,
        ] {
            assert!(!is_allowed(role, Permission::ManageUsers), "{}", role);
        }
    }

    #[test]
    fn test_delete_restricted_to_managers() {
        assert!(is_allowed(Role::SalesManager, Permission::DeleteLeads));
        assert!(!is_allowed(Role::Bde, Permission::DeleteLeads));
        assert!(!is_allowed(Role::AccountManager, Permission::DeleteLeads));
    }

    #[test]
    fn test_developer_is_read_only() {
        assert!(is_allowed(Role::Developer, Permission::ViewLeads));
        assert!(is_allowed(Role::Developer, Permission::RunInsights));
        assert!(!is_allowed(Role::Developer, Permission::ManageLeads));
        assert!(!is_allowed(Role::Developer, Permission::WriteNotes));
    }

    #[test]
    fn test_unknown_role_is_least_privileged() {
        assert_eq!(Role::from_db("superuser"), Role::Developer);
        assert_eq!(Role::from_db("pre_sales"), Role::PreSales);
    }
}
