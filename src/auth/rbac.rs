use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Parent,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Parent => "parent",
            Role::Admin => "admin",
        }
    }

    /// Unknown role strings fall back to the least privileged role.
    pub fn parse(role: &str) -> Self {
        match role {
            "admin" => Role::Admin,
            _ => Role::Parent,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Permission {
    ManageOwnStudents,
    ViewAdminDashboard,
    ManageUsers,
    ResolveErrors,
}

pub fn has_permission(role: &str, permission: &Permission) -> bool {
    match Role::parse(role) {
        Role::Admin => true,
        Role::Parent => matches!(permission, Permission::ManageOwnStudents),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_has_everything() {
        for p in [
            Permission::ManageOwnStudents,
            Permission::ViewAdminDashboard,
            Permission::ManageUsers,
            Permission::ResolveErrors,
        ] {
            assert!(has_permission("admin", &p));
        }
    }

    #[test]
    fn test_parent_limited_to_own_students() {
        assert!(has_permission("parent", &Permission::ManageOwnStudents));
        assert!(!has_permission("parent", &Permission::ViewAdminDashboard));
        assert!(!has_permission("parent", &Permission::ManageUsers));
    }

    #[test]
    fn test_unknown_role_is_parent() {
        assert_eq!(Role::parse("super_admin"), Role::Parent);
        assert!(!has_permission("operator", &Permission::ResolveErrors));
    }
}
