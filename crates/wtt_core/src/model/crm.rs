//! Foreign object model of the CRM activity kernel.
//!
//! # Responsibility
//! - Mirror the kernel objects the gateway hands out (trackers, activities,
//!   resource assignments, accounts, resources).
//! - Provide the identity path (`ObjectPath`) every kernel object is addressed by.
//!
//! # Invariants
//! - The externally visible id of an object is the last segment of its path.
//! - `EntityState::Disabled` is terminal from the service's perspective.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::{Display, Formatter};

/// Package of activity kernel objects.
pub const ACTIVITY_PACKAGE: &str = "org.opencrx.kernel.activity1";
/// Package of account kernel objects.
pub const ACCOUNT_PACKAGE: &str = "org.opencrx.kernel.account1";
/// Activity priority "not applicable".
pub const PRIORITY_NA: i64 = 0;

static XRI_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^xri://@openmdx\*([A-Za-z0-9_.]+)((?:/[^/\s]+)+)$").expect("valid xri regex")
});

/// Hierarchical identity path of a kernel object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectPath {
    package: String,
    segments: Vec<String>,
}

impl ObjectPath {
    /// Path of a provider/segment root inside one package.
    pub fn segment_root(package: &str, provider: &str, segment: &str) -> Self {
        Self {
            package: package.to_string(),
            segments: vec![
                "provider".to_string(),
                provider.to_string(),
                "segment".to_string(),
                segment.to_string(),
            ],
        }
    }

    /// Returns a descendant path with the given segments appended.
    pub fn descendant(&self, parts: &[&str]) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(parts.iter().map(|part| (*part).to_string()));
        Self {
            package: self.package.clone(),
            segments,
        }
    }

    /// Parses an `xri://@openmdx*<package>/...` string.
    pub fn parse(xri: &str) -> Option<Self> {
        let captures = XRI_RE.captures(xri.trim())?;
        let package = captures.get(1)?.as_str().to_string();
        let segments = captures
            .get(2)?
            .as_str()
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .collect();
        Some(Self { package, segments })
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    /// Last path segment; this is the object's id.
    pub fn last_segment(&self) -> &str {
        self.segments.last().map_or("", String::as_str)
    }

    pub fn to_xri(&self) -> String {
        format!("xri://@openmdx*{}/{}", self.package, self.segments.join("/"))
    }
}

impl Display for ObjectPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_xri())
    }
}

/// Soft-delete state of a kernel object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntityState {
    #[default]
    Active,
    Disabled,
}

impl EntityState {
    pub fn from_disabled_flag(disabled: bool) -> Self {
        if disabled {
            Self::Disabled
        } else {
            Self::Active
        }
    }

    pub fn is_disabled(self) -> bool {
        self == Self::Disabled
    }
}

/// Audit metadata maintained by the kernel. Epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AuditInfo {
    pub created_at: i64,
    pub created_by: String,
    pub modified_at: i64,
    pub modified_by: String,
}

/// Common accessors of every addressable kernel object.
pub trait CrmObject {
    fn path(&self) -> &ObjectPath;
    fn state(&self) -> EntityState;

    fn id(&self) -> &str {
        self.path().last_segment()
    }

    fn is_active(&self) -> bool {
        !self.state().is_disabled()
    }
}

macro_rules! impl_crm_object {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl CrmObject for $ty {
                fn path(&self) -> &ObjectPath {
                    &self.path
                }

                fn state(&self) -> EntityState {
                    self.state
                }
            }
        )+
    };
}

/// Organisation account acting as customer of a project group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegalEntity {
    pub path: ObjectPath,
    pub name: String,
    pub state: EntityState,
    pub audit: AuditInfo,
}

/// Activity tracker of type customer project group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityTracker {
    pub path: ObjectPath,
    pub name: String,
    pub description: Option<String>,
    /// Id of the account assigned with the customer role, if any.
    pub customer_id: Option<String>,
    pub state: EntityState,
    pub audit: AuditInfo,
}

/// Class of activities an activity creator produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityClass {
    Incident,
    Task,
    Meeting,
}

impl ActivityClass {
    pub fn as_db(self) -> &'static str {
        match self {
            Self::Incident => "incident",
            Self::Task => "task",
            Self::Meeting => "meeting",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "incident" => Some(Self::Incident),
            "task" => Some(Self::Task),
            "meeting" => Some(Self::Meeting),
            _ => None,
        }
    }
}

/// Template through which activities of one tracker are created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityCreator {
    pub path: ObjectPath,
    pub tracker_id: String,
    pub name: String,
    pub activity_class: ActivityClass,
}

impl ActivityCreator {
    pub fn id(&self) -> &str {
        self.path.last_segment()
    }
}

/// Activity; projects and sub-projects are stored as activities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activity {
    pub path: ObjectPath,
    /// Tracker the activity is assigned to.
    pub tracker_id: String,
    pub name: String,
    pub description: Option<String>,
    pub scheduled_start: Option<i64>,
    pub scheduled_end: Option<i64>,
    pub priority: i64,
    pub state: EntityState,
    pub audit: AuditInfo,
}

/// Typed directed link between two activities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityLinkType {
    /// `from` is a child of `to`.
    IsChildOf,
    RelatesTo,
}

impl ActivityLinkType {
    pub fn as_db(self) -> &'static str {
        match self {
            Self::IsChildOf => "is_child_of",
            Self::RelatesTo => "relates_to",
        }
    }
}

/// Resource (usually a person) that can be assigned to activities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub path: ObjectPath,
    pub name: String,
    pub contact_id: Option<String>,
    pub state: EntityState,
    pub audit: AuditInfo,
}

/// Role a resource plays on an activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceRole {
    Member,
    Manager,
    Observer,
}

impl ResourceRole {
    pub fn as_db(self) -> &'static str {
        match self {
            Self::Member => "member",
            Self::Manager => "manager",
            Self::Observer => "observer",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "member" => Some(Self::Member),
            "manager" => Some(Self::Manager),
            "observer" => Some(Self::Observer),
            _ => None,
        }
    }
}

/// Assignment of a resource to one activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceAssignment {
    pub path: ObjectPath,
    pub activity_id: String,
    /// Assigned resource; `None` when the assignment was created without one.
    pub resource_id: Option<String>,
    /// Current name of the assigned resource.
    pub resource_name: Option<String>,
    /// Name recorded on the assignment itself.
    pub name: String,
    pub role: ResourceRole,
    pub state: EntityState,
    pub audit: AuditInfo,
}

impl_crm_object!(LegalEntity, ActivityTracker, Activity, Resource, ResourceAssignment);

/// Fields of a new customer project group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTracker {
    pub name: String,
    pub description: Option<String>,
}

/// Parameters handed to an activity creator.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewActivityParams {
    pub name: String,
    pub description: Option<String>,
    /// Epoch ms; `None` schedules at creation time.
    pub scheduled_start: Option<i64>,
    /// Epoch ms; `None` schedules at creation time.
    pub scheduled_end: Option<i64>,
    pub priority: i64,
}

/// Fields of a new resource assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewResourceAssignment {
    pub name: String,
    pub resource_id: Option<String>,
    pub role: ResourceRole,
}

/// Writable subset of a tracker or activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChanges {
    pub name: String,
    pub description: Option<String>,
}
