//! Platform-seeded system roles.

use crate::{Authority, Capability, PermissionSet, RoleRegistry};

pub const SUPER_ADMIN: &str = "Super Admin";
pub const SCHOOL_ADMIN: &str = "School Admin";
pub const SAFEGUARDING_LEAD: &str = "Designated Safeguarding Lead";
pub const HEAD_OF_YEAR: &str = "Head of Year";
pub const TEACHER: &str = "Teacher";
pub const SUPPORT_STAFF: &str = "Support Staff";

struct SystemRole {
    name: &'static str,
    description: &'static str,
    authority: Authority,
    permissions: fn() -> PermissionSet,
}

const SYSTEM_ROLES: [SystemRole; 6] = [
    SystemRole {
        name: SUPER_ADMIN,
        description: "Platform operator with authority over every tenant",
        authority: Authority::Platform,
        permissions: PermissionSet::all,
    },
    SystemRole {
        name: SCHOOL_ADMIN,
        description: "Runs one organization: users, roles, settings and reporting",
        authority: Authority::Tenant,
        permissions: school_admin,
    },
    SystemRole {
        name: SAFEGUARDING_LEAD,
        description: "Owns safeguarding records across the whole organization",
        authority: Authority::Tenant,
        permissions: safeguarding_lead,
    },
    SystemRole {
        name: HEAD_OF_YEAR,
        description: "Pastoral lead for the year groups they are assigned",
        authority: Authority::Tenant,
        permissions: head_of_year,
    },
    SystemRole {
        name: TEACHER,
        description: "Classroom staff: behaviour logging and seating plans",
        authority: Authority::Tenant,
        permissions: teacher,
    },
    SystemRole {
        name: SUPPORT_STAFF,
        description: "Read-only access to behaviour records and rosters",
        authority: Authority::Tenant,
        permissions: support_staff,
    },
];

fn school_admin() -> PermissionSet {
    PermissionSet::all().without(Capability::ManageSafeguardingRecords)
}

fn safeguarding_lead() -> PermissionSet {
    PermissionSet::from_granted([
        Capability::ViewSafeguardingRecords,
        Capability::ManageSafeguardingRecords,
        Capability::ViewBehaviourRecords,
        Capability::RunReports,
        Capability::ExportData,
        Capability::ShowRiskAnalysis,
        Capability::ShowBehaviourTrends,
        Capability::ShowActivityFeed,
    ])
}

fn head_of_year() -> PermissionSet {
    PermissionSet::from_granted([
        Capability::ViewSafeguardingRecords,
        Capability::ViewBehaviourRecords,
        Capability::EditBehaviourRecords,
        Capability::ManageSeating,
        Capability::RunReports,
        Capability::ShowRiskAnalysis,
        Capability::ShowBehaviourTrends,
        Capability::ShowRoster,
    ])
}

fn teacher() -> PermissionSet {
    PermissionSet::from_granted([
        Capability::ViewBehaviourRecords,
        Capability::EditBehaviourRecords,
        Capability::ManageSeating,
        Capability::ShowRoster,
        Capability::ShowBehaviourTrends,
    ])
}

fn support_staff() -> PermissionSet {
    PermissionSet::from_granted([Capability::ViewBehaviourRecords, Capability::ShowRoster])
}

impl RoleRegistry {
    /// A registry holding the platform's system roles.
    pub fn with_system_defaults() -> Self {
        let mut registry = Self::new();
        for role in &SYSTEM_ROLES {
            if let Err(e) = registry.seed_system_role(
                role.name,
                Some(role.description),
                (role.permissions)(),
                role.authority,
            ) {
                tracing::error!(name = role.name, error = %e, "failed to seed system role");
            }
        }
        registry
    }
}
