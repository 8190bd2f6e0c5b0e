//! Role-based access control.
//!
//! Local mirror of the backend's permission table. The table is built once at
//! process start, stored behind a [`OnceLock`], and never mutated. Checks are
//! pure lookups: an unknown role, an unknown module, or the absence of a
//! session all deny.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

/// Operator roles, matching the backend RBAC role labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Client,
    VolunteerAdmin,
    Msb,
    Npo,
    Government,
    Administrator,
    SuperAdmin,
}

impl Role {
    /// All known roles.
    pub const ALL: [Self; 7] = [
        Self::Client,
        Self::VolunteerAdmin,
        Self::Msb,
        Self::Npo,
        Self::Government,
        Self::Administrator,
        Self::SuperAdmin,
    ];

    /// Backend wire label for this role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::VolunteerAdmin => "volunteer_admin",
            Self::Msb => "msb",
            Self::Npo => "npo",
            Self::Government => "government",
            Self::Administrator => "administrator",
            Self::SuperAdmin => "super_admin",
        }
    }

    /// Privilege level; higher means more privileged.
    #[must_use]
    pub const fn level(self) -> u8 {
        match self {
            Self::Client => 0,
            Self::VolunteerAdmin | Self::Msb | Self::Npo => 1,
            Self::Government => 2,
            Self::Administrator => 3,
            Self::SuperAdmin => 4,
        }
    }

    /// Whether this role is an administrative role.
    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Administrator | Self::SuperAdmin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

/// Error for role labels the local mirror does not know.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

/// Resource categories, matching the backend module names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Module {
    Volunteers,
    Vacancies,
    Leisure,
    Projects,
    Events,
    News,
    Users,
    Courses,
    Certificates,
    Experts,
    Resumes,
}

impl Module {
    /// All known modules.
    pub const ALL: [Self; 11] = [
        Self::Volunteers,
        Self::Vacancies,
        Self::Leisure,
        Self::Projects,
        Self::Events,
        Self::News,
        Self::Users,
        Self::Courses,
        Self::Certificates,
        Self::Experts,
        Self::Resumes,
    ];

    /// Backend wire label for this module.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Volunteers => "volunteers",
            Self::Vacancies => "vacancies",
            Self::Leisure => "leisure",
            Self::Projects => "projects",
            Self::Events => "events",
            Self::News => "news",
            Self::Users => "users",
            Self::Courses => "courses",
            Self::Certificates => "certificates",
            Self::Experts => "experts",
            Self::Resumes => "resumes",
        }
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Module {
    type Err = UnknownModule;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|module| module.as_str() == s)
            .ok_or_else(|| UnknownModule(s.to_string()))
    }
}

/// Error for module labels the local mirror does not know.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown module: {0}")]
pub struct UnknownModule(pub String);

/// Operations a role may hold on a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Read,
    Create,
    Update,
    Delete,
}

impl Permission {
    /// All four operations.
    pub const ALL: [Self; 4] = [Self::Read, Self::Create, Self::Update, Self::Delete];

    /// Backend wire label for this operation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compact permission set for one (role, module) entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PermissionSet(u8);

impl PermissionSet {
    /// Empty set.
    pub const NONE: Self = Self(0);
    /// Read only.
    pub const READ: Self = Self(1);
    /// All four operations.
    pub const CRUD: Self = Self(0b1111);

    const fn bit(permission: Permission) -> u8 {
        match permission {
            Permission::Read => 1,
            Permission::Create => 2,
            Permission::Update => 4,
            Permission::Delete => 8,
        }
    }

    /// Whether the set contains `permission`.
    #[must_use]
    pub const fn contains(self, permission: Permission) -> bool {
        self.0 & Self::bit(permission) != 0
    }

    /// Whether the set grants read and nothing else.
    #[must_use]
    pub const fn is_read_only(self) -> bool {
        self.0 == Self::READ.0
    }
}

/// Static (role, module) -> operation-set table.
///
/// Mirrors the backend's RBAC configuration. Constructed once, immutable
/// thereafter; use [`PermissionTable::global`] for the shared instance.
#[derive(Debug)]
pub struct PermissionTable {
    grants: HashMap<(Role, Module), PermissionSet>,
}

impl PermissionTable {
    /// Build the built-in table.
    #[must_use]
    pub fn builtin() -> Self {
        let mut grants = HashMap::new();
        let mut grant = |role: Role, module: Module, set: PermissionSet| {
            grants.insert((role, module), set);
        };

        grant(Role::VolunteerAdmin, Module::Volunteers, PermissionSet::CRUD);

        grant(Role::Msb, Module::Vacancies, PermissionSet::CRUD);
        grant(Role::Msb, Module::Leisure, PermissionSet::CRUD);

        grant(Role::Npo, Module::Projects, PermissionSet::CRUD);
        grant(Role::Npo, Module::Events, PermissionSet::CRUD);

        for module in Module::ALL {
            grant(Role::Government, module, PermissionSet::READ);
            grant(Role::Administrator, module, PermissionSet::CRUD);
            grant(Role::SuperAdmin, module, PermissionSet::CRUD);
        }

        Self { grants }
    }

    /// Shared process-wide table.
    pub fn global() -> &'static Self {
        static TABLE: OnceLock<PermissionTable> = OnceLock::new();
        TABLE.get_or_init(Self::builtin)
    }

    /// Whether `role` holds `permission` on `module`.
    #[must_use]
    pub fn allows(&self, role: Role, module: Module, permission: Permission) -> bool {
        self.grants
            .get(&(role, module))
            .is_some_and(|set| set.contains(permission))
    }

    /// Operation set for `(role, module)`; empty when not granted.
    #[must_use]
    pub fn grants(&self, role: Role, module: Module) -> PermissionSet {
        self.grants
            .get(&(role, module))
            .copied()
            .unwrap_or(PermissionSet::NONE)
    }

    /// Modules `role` can read, in canonical module order.
    #[must_use]
    pub fn readable_modules(&self, role: Role) -> Vec<Module> {
        Module::ALL
            .into_iter()
            .filter(|module| self.allows(role, *module, Permission::Read))
            .collect()
    }
}

/// Permission checking context for one interaction.
///
/// Carries the role of the current session, or `None` for unauthenticated
/// users, which behaves as the empty-permission role.
#[derive(Debug, Clone, Copy)]
pub struct RbacContext {
    role: Option<Role>,
}

impl RbacContext {
    /// Context for an authenticated role.
    #[must_use]
    pub const fn new(role: Role) -> Self {
        Self { role: Some(role) }
    }

    /// Context for an unauthenticated user; denies everything.
    #[must_use]
    pub const fn anonymous() -> Self {
        Self { role: None }
    }

    /// The current role, if authenticated.
    #[must_use]
    pub const fn role(&self) -> Option<Role> {
        self.role
    }

    /// Whether the current role holds `permission` on `module`.
    #[must_use]
    pub fn can(&self, module: Module, permission: Permission) -> bool {
        self.role
            .is_some_and(|role| PermissionTable::global().allows(role, module, permission))
    }

    /// Shorthand for a read check.
    #[must_use]
    pub fn can_read(&self, module: Module) -> bool {
        self.can(module, Permission::Read)
    }

    /// Shorthand for an update check.
    #[must_use]
    pub fn can_update(&self, module: Module) -> bool {
        self.can(module, Permission::Update)
    }

    /// Shorthand for a delete check.
    #[must_use]
    pub fn can_delete(&self, module: Module) -> bool {
        self.can(module, Permission::Delete)
    }

    /// Whether the current role has read access and no mutations on
    /// `module`.
    #[must_use]
    pub fn is_read_only(&self, module: Module) -> bool {
        self.role
            .is_some_and(|role| PermissionTable::global().grants(role, module).is_read_only())
    }

    /// Whether the current role is administrator or super admin.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role.is_some_and(Role::is_admin)
    }

    /// Modules readable by the current role.
    #[must_use]
    pub fn readable_modules(&self) -> Vec<Module> {
        self.role
            .map(|role| PermissionTable::global().readable_modules(role))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ungranted_pairs_deny_every_operation() {
        let table = PermissionTable::builtin();
        for role in Role::ALL {
            for module in Module::ALL {
                if table.grants(role, module) == PermissionSet::NONE {
                    for permission in Permission::ALL {
                        assert!(
                            !table.allows(role, module, permission),
                            "{role} unexpectedly allowed {permission} on {module}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn client_has_no_grants() {
        let table = PermissionTable::builtin();
        for module in Module::ALL {
            for permission in Permission::ALL {
                assert!(!table.allows(Role::Client, module, permission));
            }
        }
    }

    #[test]
    fn government_reads_everything_mutates_nothing() {
        let table = PermissionTable::builtin();
        for module in Module::ALL {
            assert!(table.allows(Role::Government, module, Permission::Read));
            assert!(!table.allows(Role::Government, module, Permission::Create));
            assert!(!table.allows(Role::Government, module, Permission::Update));
            assert!(!table.allows(Role::Government, module, Permission::Delete));
            assert!(table.grants(Role::Government, module).is_read_only());
        }
    }

    #[test]
    fn super_admin_holds_all_operations_everywhere() {
        let table = PermissionTable::builtin();
        for module in Module::ALL {
            for permission in Permission::ALL {
                assert!(table.allows(Role::SuperAdmin, module, permission));
            }
        }
    }

    #[test]
    fn volunteer_admin_scope() {
        let table = PermissionTable::builtin();
        for permission in Permission::ALL {
            assert!(table.allows(Role::VolunteerAdmin, Module::Volunteers, permission));
        }
        assert!(!table.allows(Role::VolunteerAdmin, Module::Vacancies, Permission::Read));
        assert!(!table.allows(Role::VolunteerAdmin, Module::Events, Permission::Read));
    }

    #[test]
    fn msb_and_npo_scopes() {
        let table = PermissionTable::builtin();
        assert!(table.allows(Role::Msb, Module::Vacancies, Permission::Delete));
        assert!(table.allows(Role::Msb, Module::Leisure, Permission::Create));
        assert!(!table.allows(Role::Msb, Module::Projects, Permission::Read));

        assert!(table.allows(Role::Npo, Module::Projects, Permission::Update));
        assert!(table.allows(Role::Npo, Module::Events, Permission::Read));
        assert!(!table.allows(Role::Npo, Module::Vacancies, Permission::Read));
    }

    #[test]
    fn anonymous_context_denies_everything() {
        let rbac = RbacContext::anonymous();
        for module in Module::ALL {
            for permission in Permission::ALL {
                assert!(!rbac.can(module, permission));
            }
        }
        assert!(!rbac.is_admin());
        assert!(rbac.readable_modules().is_empty());
    }

    #[test]
    fn role_labels_round_trip() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("overlord".parse::<Role>().is_err());
    }

    #[test]
    fn module_labels_round_trip() {
        for module in Module::ALL {
            assert_eq!(module.as_str().parse::<Module>().unwrap(), module);
        }
        assert!("payroll".parse::<Module>().is_err());
    }

    #[test]
    fn role_hierarchy_is_ordered() {
        assert!(Role::SuperAdmin.level() > Role::Administrator.level());
        assert!(Role::Administrator.level() > Role::Government.level());
        assert!(Role::Government.level() > Role::Npo.level());
        assert!(Role::Npo.level() > Role::Client.level());
    }

    #[test]
    fn readable_modules_for_government_covers_all() {
        assert_eq!(
            PermissionTable::builtin().readable_modules(Role::Government),
            Module::ALL.to_vec()
        );
    }
}
