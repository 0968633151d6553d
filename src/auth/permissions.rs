use serde::{Deserialize, Serialize};

/// Access tier assigned to a user by their organization membership record.
///
/// Roles are never computed; they are read from the membership row and parsed
/// with [`Role::parse`]. Anything unrecognized falls back to `None`, which
/// grants nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[serde(rename = "SuperAdmin")]
    SuperAdmin,
    Admin,
    Editor,
    Viewer,
    #[default]
    None,
}

impl Role {
    /// Parse the role string stored on a membership record. Historical data
    /// uses both "user" and "editor" for the same tier.
    pub fn parse(value: Option<&str>) -> Role {
        match value {
            Some("SuperAdmin") => Role::SuperAdmin,
            Some("admin") => Role::Admin,
            Some("user") | Some("editor") => Role::Editor,
            Some("viewer") => Role::Viewer,
            _ => Role::None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::SuperAdmin => "SuperAdmin",
            Role::Admin => "admin",
            Role::Editor => "editor",
            Role::Viewer => "viewer",
            Role::None => "none",
        }
    }

    /// The authorization decision: does this role grant the capability?
    /// Total over all inputs; there is no error path.
    pub fn allows(self, capability: Capability) -> bool {
        CapabilitySet::for_role(self).contains(capability)
    }

    /// Restricted roles only ever see content rows they created themselves.
    pub fn is_restricted(self) -> bool {
        matches!(self, Role::Editor | Role::Viewer)
    }
}

/// A single named permission flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    View,
    AddContent,
    AddFields,
    AddCollections,
    Edit,
    Delete,
    Manage,
    ManageOrganizations,
}

impl Capability {
    /// Human-readable verb phrase used in denial notifications.
    pub fn describe(self) -> &'static str {
        match self {
            Capability::View => "view",
            Capability::AddContent => "add content",
            Capability::AddFields => "add fields",
            Capability::AddCollections => "add collections",
            Capability::Edit => "edit",
            Capability::Delete => "delete",
            Capability::Manage => "manage",
            Capability::ManageOrganizations => "manage organizations",
        }
    }
}

/// The complete set of capability flags for one role. Every role maps to a
/// full set; the table is fixed at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CapabilitySet {
    pub can_view: bool,
    pub can_add_content: bool,
    pub can_add_fields: bool,
    pub can_add_collections: bool,
    pub can_edit: bool,
    pub can_delete: bool,
    pub can_manage: bool,
    pub can_manage_organizations: bool,
}

impl CapabilitySet {
    const NONE: CapabilitySet = CapabilitySet {
        can_view: false,
        can_add_content: false,
        can_add_fields: false,
        can_add_collections: false,
        can_edit: false,
        can_delete: false,
        can_manage: false,
        can_manage_organizations: false,
    };

    pub const fn for_role(role: Role) -> CapabilitySet {
        match role {
            Role::SuperAdmin => CapabilitySet {
                can_view: true,
                can_add_content: true,
                can_add_fields: true,
                can_add_collections: true,
                can_edit: true,
                can_delete: true,
                can_manage: true,
                can_manage_organizations: true,
            },
            Role::Admin => CapabilitySet {
                can_view: true,
                can_add_content: true,
                can_add_fields: true,
                can_add_collections: true,
                can_edit: true,
                can_delete: true,
                can_manage: true,
                can_manage_organizations: false,
            },
            Role::Editor => CapabilitySet {
                can_view: true,
                can_add_content: true,
                ..Self::NONE
            },
            Role::Viewer => CapabilitySet { can_view: true, ..Self::NONE },
            Role::None => Self::NONE,
        }
    }

    pub const fn contains(&self, capability: Capability) -> bool {
        match capability {
            Capability::View => self.can_view,
            Capability::AddContent => self.can_add_content,
            Capability::AddFields => self.can_add_fields,
            Capability::AddCollections => self.can_add_collections,
            Capability::Edit => self.can_edit,
            Capability::Delete => self.can_delete,
            Capability::Manage => self.can_manage,
            Capability::ManageOrganizations => self.can_manage_organizations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Capability; 8] = [
        Capability::View,
        Capability::AddContent,
        Capability::AddFields,
        Capability::AddCollections,
        Capability::Edit,
        Capability::Delete,
        Capability::Manage,
        Capability::ManageOrganizations,
    ];

    #[test]
    fn unknown_and_absent_roles_grant_nothing() {
        for role in [Role::parse(None), Role::parse(Some("owner")), Role::parse(Some(""))] {
            assert_eq!(role, Role::None);
            for cap in ALL {
                assert!(!role.allows(cap), "none role must not grant {:?}", cap);
            }
        }
    }

    #[test]
    fn viewer_can_only_view() {
        assert!(Role::Viewer.allows(Capability::View));
        for cap in ALL.iter().filter(|c| **c != Capability::View) {
            assert!(!Role::Viewer.allows(*cap));
        }
    }

    #[test]
    fn editor_can_view_and_add_content_only() {
        assert!(Role::Editor.allows(Capability::View));
        assert!(Role::Editor.allows(Capability::AddContent));
        for cap in [
            Capability::AddFields,
            Capability::AddCollections,
            Capability::Edit,
            Capability::Delete,
            Capability::Manage,
            Capability::ManageOrganizations,
        ] {
            assert!(!Role::Editor.allows(cap));
        }
    }

    #[test]
    fn admin_has_everything_except_organization_management() {
        for cap in ALL.iter().filter(|c| **c != Capability::ManageOrganizations) {
            assert!(Role::Admin.allows(*cap));
        }
        assert!(!Role::Admin.allows(Capability::ManageOrganizations));
    }

    #[test]
    fn super_admin_has_everything() {
        for cap in ALL {
            assert!(Role::SuperAdmin.allows(cap));
        }
    }

    #[test]
    fn role_strings_alias_user_to_editor() {
        assert_eq!(Role::parse(Some("user")), Role::Editor);
        assert_eq!(Role::parse(Some("editor")), Role::Editor);
        assert_eq!(Role::parse(Some("admin")), Role::Admin);
        assert_eq!(Role::parse(Some("SuperAdmin")), Role::SuperAdmin);
        assert_eq!(Role::parse(Some("viewer")), Role::Viewer);
    }
}
