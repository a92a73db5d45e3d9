//! Fixed permission vocabulary.
//!
//! Every role carries a complete [`PermissionSet`]: one boolean per
//! [`Capability`]. There is no map of optional flags, so a role without a value
//! for some capability cannot be constructed.

use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single named permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    ViewSafeguardingRecords,
    ManageSafeguardingRecords,
    ViewBehaviourRecords,
    EditBehaviourRecords,
    ManageSeating,
    RunReports,
    ExportData,
    ManageUsers,
    ManageRoles,
    ConfigureSystem,
    // Dashboard display toggles.
    ShowRiskAnalysis,
    ShowBehaviourTrends,
    ShowRoster,
    ShowActivityFeed,
}

impl Capability {
    pub const ALL: [Capability; 14] = [
        Capability::ViewSafeguardingRecords,
        Capability::ManageSafeguardingRecords,
        Capability::ViewBehaviourRecords,
        Capability::EditBehaviourRecords,
        Capability::ManageSeating,
        Capability::RunReports,
        Capability::ExportData,
        Capability::ManageUsers,
        Capability::ManageRoles,
        Capability::ConfigureSystem,
        Capability::ShowRiskAnalysis,
        Capability::ShowBehaviourTrends,
        Capability::ShowRoster,
        Capability::ShowActivityFeed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Capability::ViewSafeguardingRecords => "view-safeguarding-records",
            Capability::ManageSafeguardingRecords => "manage-safeguarding-records",
            Capability::ViewBehaviourRecords => "view-behaviour-records",
            Capability::EditBehaviourRecords => "edit-behaviour-records",
            Capability::ManageSeating => "manage-seating",
            Capability::RunReports => "run-reports",
            Capability::ExportData => "export-data",
            Capability::ManageUsers => "manage-users",
            Capability::ManageRoles => "manage-roles",
            Capability::ConfigureSystem => "configure-system",
            Capability::ShowRiskAnalysis => "show-risk-analysis",
            Capability::ShowBehaviourTrends => "show-behaviour-trends",
            Capability::ShowRoster => "show-roster",
            Capability::ShowActivityFeed => "show-activity-feed",
        }
    }

    /// Whether this capability toggles a dashboard widget rather than a CRUD action.
    pub fn is_dashboard_widget(self) -> bool {
        matches!(
            self,
            Capability::ShowRiskAnalysis
                | Capability::ShowBehaviourTrends
                | Capability::ShowRoster
                | Capability::ShowActivityFeed
        )
    }

    /// Capabilities that imply visibility of every record in the tenant,
    /// regardless of the holder's allowed scopes.
    pub fn implies_tenant_wide_visibility(self) -> bool {
        matches!(
            self,
            Capability::ManageUsers
                | Capability::ManageSafeguardingRecords
                | Capability::ConfigureSystem
        )
    }
}

impl core::fmt::Display for Capability {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A capability name that is not part of the fixed vocabulary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown capability '{0}'")]
pub struct UnknownCapability(pub String);

impl FromStr for Capability {
    type Err = UnknownCapability;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        Capability::ALL
            .into_iter()
            .find(|c| c.as_str() == name)
            .ok_or_else(|| UnknownCapability(name.to_string()))
    }
}

/// Dashboard widget toggles, nested inside a [`PermissionSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct DashboardWidgets {
    pub show_risk_analysis: bool,
    pub show_behaviour_trends: bool,
    pub show_roster: bool,
    pub show_activity_feed: bool,
}

/// Complete permission record of a role.
///
/// Deserializing a record with missing keys fills them with `false`; unknown
/// keys are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct PermissionSet {
    pub view_safeguarding_records: bool,
    pub manage_safeguarding_records: bool,
    pub view_behaviour_records: bool,
    pub edit_behaviour_records: bool,
    pub manage_seating: bool,
    pub run_reports: bool,
    pub export_data: bool,
    pub manage_users: bool,
    pub manage_roles: bool,
    pub configure_system: bool,
    pub dashboard: DashboardWidgets,
}

impl PermissionSet {
    /// A set granting nothing.
    pub fn none() -> Self {
        Self::default()
    }

    /// A set granting every capability.
    pub fn all() -> Self {
        Self::from_granted(Capability::ALL)
    }

    /// Build a set from the capabilities it grants; everything else is `false`.
    pub fn from_granted(granted: impl IntoIterator<Item = Capability>) -> Self {
        let mut set = Self::none();
        for capability in granted {
            set.set(capability, true);
        }
        set
    }

    pub fn with(mut self, capability: Capability) -> Self {
        self.set(capability, true);
        self
    }

    pub fn without(mut self, capability: Capability) -> Self {
        self.set(capability, false);
        self
    }

    pub fn grants(&self, capability: Capability) -> bool {
        match capability {
            Capability::ViewSafeguardingRecords => self.view_safeguarding_records,
            Capability::ManageSafeguardingRecords => self.manage_safeguarding_records,
            Capability::ViewBehaviourRecords => self.view_behaviour_records,
            Capability::EditBehaviourRecords => self.edit_behaviour_records,
            Capability::ManageSeating => self.manage_seating,
            Capability::RunReports => self.run_reports,
            Capability::ExportData => self.export_data,
            Capability::ManageUsers => self.manage_users,
            Capability::ManageRoles => self.manage_roles,
            Capability::ConfigureSystem => self.configure_system,
            Capability::ShowRiskAnalysis => self.dashboard.show_risk_analysis,
            Capability::ShowBehaviourTrends => self.dashboard.show_behaviour_trends,
            Capability::ShowRoster => self.dashboard.show_roster,
            Capability::ShowActivityFeed => self.dashboard.show_activity_feed,
        }
    }

    pub fn set(&mut self, capability: Capability, value: bool) {
        let slot = match capability {
            Capability::ViewSafeguardingRecords => &mut self.view_safeguarding_records,
            Capability::ManageSafeguardingRecords => &mut self.manage_safeguarding_records,
            Capability::ViewBehaviourRecords => &mut self.view_behaviour_records,
            Capability::EditBehaviourRecords => &mut self.edit_behaviour_records,
            Capability::ManageSeating => &mut self.manage_seating,
            Capability::RunReports => &mut self.run_reports,
            Capability::ExportData => &mut self.export_data,
            Capability::ManageUsers => &mut self.manage_users,
            Capability::ManageRoles => &mut self.manage_roles,
            Capability::ConfigureSystem => &mut self.configure_system,
            Capability::ShowRiskAnalysis => &mut self.dashboard.show_risk_analysis,
            Capability::ShowBehaviourTrends => &mut self.dashboard.show_behaviour_trends,
            Capability::ShowRoster => &mut self.dashboard.show_roster,
            Capability::ShowActivityFeed => &mut self.dashboard.show_activity_feed,
        };
        *slot = value;
    }

    /// Granted capabilities in vocabulary order.
    pub fn granted(&self) -> Vec<Capability> {
        Capability::ALL
            .into_iter()
            .filter(|c| self.grants(*c))
            .collect()
    }

    /// True when every capability granted here is also granted by `other`.
    pub fn is_subset_of(&self, other: &PermissionSet) -> bool {
        Capability::ALL
            .into_iter()
            .all(|c| !self.grants(c) || other.grants(c))
    }

    /// Whether the holder sees every record of its tenant (scope filtering is skipped).
    pub fn has_tenant_wide_visibility(&self) -> bool {
        Capability::ALL
            .into_iter()
            .any(|c| c.implies_tenant_wide_visibility() && self.grants(c))
    }
}
