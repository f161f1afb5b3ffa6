//! Object kinds, the whitelist of known property keys, and the per-type
//! priority table used to print properties in their customary order.
//!
//! The key list is the Nagios core object definition keys plus the few op5
//! extras (`name`, `obsess`, `parallelize_check`, `register`, `hourly_value`).
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use crate::error::{NagcfgError, Result};

use ObjectType::*;

pub const DEFAULT_INDENT: usize = 4;
/// Padded key width on output, and the column limit for block delimiters on input.
pub const DEFAULT_ALIGN: usize = 31;
/// Separates a check command from its arguments.
pub const SEP_CMD: &str = "!";
pub const SEP_LIST: &str = ",";

// ------------- ObjectType -------------
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectType {
    Command,
    Contact,
    ContactGroup,
    Host,
    HostDependency,
    HostEscalation,
    HostExtInfo,
    HostGroup,
    Service,
    ServiceDependency,
    ServiceEscalation,
    ServiceExtInfo,
    ServiceGroup,
    TimePeriod,
}

impl ObjectType {
    pub const ALL: [ObjectType; 14] = [
        Command,
        Contact,
        ContactGroup,
        Host,
        HostDependency,
        HostEscalation,
        HostExtInfo,
        HostGroup,
        Service,
        ServiceDependency,
        ServiceEscalation,
        ServiceExtInfo,
        ServiceGroup,
        TimePeriod,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Command => "command",
            Contact => "contact",
            ContactGroup => "contactgroup",
            Host => "host",
            HostDependency => "hostdependency",
            HostEscalation => "hostescalation",
            HostExtInfo => "hostextinfo",
            HostGroup => "hostgroup",
            Service => "service",
            ServiceDependency => "servicedependency",
            ServiceEscalation => "serviceescalation",
            ServiceExtInfo => "serviceextinfo",
            ServiceGroup => "servicegroup",
            TimePeriod => "timeperiod",
        }
    }
    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|t| t.as_str()).collect()
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectType {
    type Err = NagcfgError;
    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .find(|t| t.as_str() == s)
            .copied()
            .ok_or_else(|| NagcfgError::Config(format!("unknown object type {s:?}")))
    }
}

// ------------- Known keys -------------
pub const KNOWN_KEYS: [&str; 97] = [
    "2d_coords",
    "3d_coords",
    "action_url",
    "active_checks_enabled",
    "address",
    "addressx",
    "alias",
    "can_submit_commands",
    "check_command",
    "check_freshness",
    "check_interval",
    "check_period",
    "command_line",
    "command_name",
    "contact_groups",
    "contact_name",
    "contactgroup_members",
    "contactgroup_name",
    "contactgroups",
    "contacts",
    "dependency_period",
    "dependent_host_name",
    "dependent_hostgroup_name",
    "dependent_service_description",
    "dependent_servicegroup_name",
    "display_name",
    "email",
    "escalation_options",
    "escalation_period",
    "event_handler",
    "event_handler_enabled",
    "exclude",
    "execution_failure_criteria",
    "first_notification",
    "first_notification_delay",
    "flap_detection_enabled",
    "flap_detection_options",
    "freshness_threshold",
    "friday",
    "high_flap_threshold",
    "host_name",
    "host_notification_commands",
    "host_notification_options",
    "host_notification_period",
    "host_notifications_enabled",
    "hostgroup_members",
    "hostgroup_name",
    "hostgroups",
    "icon_image",
    "icon_image_alt",
    "inherits_parent",
    "initial_state",
    "is_volatile",
    "last_notification",
    "low_flap_threshold",
    "max_check_attempts",
    "members",
    "monday",
    "notes",
    "notes_url",
    "notification_failure_criteria",
    "notification_interval",
    "notification_options",
    "notification_period",
    "notifications_enabled",
    "obsess_over_host",
    "obsess_over_service",
    "pager",
    "parents",
    "passive_checks_enabled",
    "process_perf_data",
    "retain_nonstatus_information",
    "retain_status_information",
    "retry_interval",
    "saturday",
    "service_description",
    "service_notification_commands",
    "service_notification_options",
    "service_notification_period",
    "service_notifications_enabled",
    "servicegroup_members",
    "servicegroup_name",
    "servicegroups",
    "stalking_options",
    "statusmap_image",
    "sunday",
    "thursday",
    "timeperiod_name",
    "tuesday",
    "use",
    "vrml_image",
    "wednesday",
    // op5 only
    "name",
    "obsess",
    "parallelize_check",
    "register",
    "hourly_value",
];

pub fn is_known_property(key: &str) -> bool {
    KEY_INDEX.contains_key(key)
}

// ------------- Sort order -------------

/// Highest priority that takes part in ordering. Anything above sorts last.
pub const MAX_PRIORITY: u8 = 98;
const UNORDERED: u16 = MAX_PRIORITY as u16 + 1;

pub type SortEntry = (&'static str, &'static [(ObjectType, u8)]);

// Order per type follows the Nagios object definition docs, except that op5
// writes check_command before servicegroups.
pub const SORT_ENTRIES: &[SortEntry] = &[
    ("2d_coords", &[(Host, 42), (HostExtInfo, 8)]),
    ("3d_coords", &[(Host, 43), (HostExtInfo, 9)]),
    ("action_url", &[(Host, 37), (HostExtInfo, 3), (HostGroup, 6), (Service, 37), (ServiceExtInfo, 4), (ServiceGroup, 6)]),
    ("active_checks_enabled", &[(Host, 12), (Service, 12)]),
    ("address", &[(Host, 4)]),
    ("addressx", &[(Contact, 14)]),
    ("alias", &[(Host, 2), (HostGroup, 1), (ServiceGroup, 1), (Contact, 2), (ContactGroup, 1), (TimePeriod, 1)]),
    ("can_submit_commands", &[(Contact, 15)]),
    ("check_command", &[(Host, 7), (Service, 7)]),
    ("check_freshness", &[(Host, 16), (Service, 16)]),
    ("check_interval", &[(Host, 10), (Service, 10)]),
    ("check_period", &[(Host, 14), (Service, 14)]),
    ("command_line", &[(Command, 1)]),
    ("command_name", &[(Command, 0)]),
    ("contact_groups", &[(Host, 28), (HostEscalation, 3), (Service, 33), (ServiceEscalation, 4)]),
    ("contact_name", &[(Contact, 1)]),
    ("contactgroup_members", &[(ContactGroup, 3)]),
    ("contactgroup_name", &[(ContactGroup, 0)]),
    ("contactgroups", &[(Contact, 3)]),
    ("contacts", &[(Host, 27), (HostEscalation, 2), (Service, 32), (ServiceEscalation, 3)]),
    ("dependency_period", &[(HostDependency, 7), (ServiceDependency, 11)]),
    ("dependent_host_name", &[(HostDependency, 0), (ServiceDependency, 0)]),
    ("dependent_hostgroup_name", &[(HostDependency, 1), (ServiceDependency, 1)]),
    ("dependent_service_description", &[(ServiceDependency, 4)]),
    ("dependent_servicegroup_name", &[(ServiceDependency, 3)]),
    ("display_name", &[(Host, 3), (Service, 4)]),
    ("email", &[(Contact, 12)]),
    ("escalation_options", &[(HostEscalation, 8), (ServiceEscalation, 9)]),
    ("escalation_period", &[(HostEscalation, 7), (ServiceEscalation, 8)]),
    ("event_handler", &[(Host, 18), (Service, 18)]),
    ("event_handler_enabled", &[(Host, 19), (Service, 19)]),
    ("exclude", &[(TimePeriod, 4)]),
    ("execution_failure_criteria", &[(HostDependency, 5), (ServiceDependency, 9)]),
    ("first_notification", &[(HostEscalation, 4), (ServiceEscalation, 5)]),
    ("first_notification_delay", &[(Host, 30), (Service, 28)]),
    ("flap_detection_enabled", &[(Host, 22), (Service, 22)]),
    ("flap_detection_options", &[(Host, 23), (Service, 23)]),
    ("freshness_threshold", &[(Host, 17), (Service, 17)]),
    ("friday", &[(TimePeriod, 2)]),
    ("high_flap_threshold", &[(Host, 21), (Service, 21)]),
    ("host_name", &[(Host, 1), (HostDependency, 2), (HostEscalation, 0), (HostExtInfo, 0), (Service, 1), (ServiceDependency, 5), (ServiceEscalation, 0), (ServiceExtInfo, 0)]),
    ("host_notification_commands", &[(Contact, 10)]),
    ("host_notification_options", &[(Contact, 8)]),
    ("host_notification_period", &[(Contact, 6)]),
    ("host_notifications_enabled", &[(Contact, 4)]),
    ("hostgroup_members", &[(HostGroup, 3)]),
    ("hostgroup_name", &[(HostDependency, 3), (HostEscalation, 1), (HostGroup, 0), (Service, 2), (ServiceDependency, 6), (ServiceEscalation, 1)]),
    ("hostgroups", &[(Host, 6)]),
    ("icon_image", &[(Host, 38), (HostExtInfo, 4), (Service, 38), (ServiceExtInfo, 5)]),
    ("icon_image_alt", &[(Host, 39), (HostExtInfo, 5), (Service, 39), (ServiceExtInfo, 6)]),
    ("inherits_parent", &[(HostDependency, 4), (ServiceDependency, 8)]),
    ("initial_state", &[(Host, 8), (Service, 8)]),
    ("is_volatile", &[(Service, 6)]),
    ("last_notification", &[(HostEscalation, 5), (ServiceEscalation, 6)]),
    ("low_flap_threshold", &[(Host, 20), (Service, 20)]),
    ("max_check_attempts", &[(Host, 9), (Service, 9)]),
    ("members", &[(ContactGroup, 2), (HostGroup, 2), (ServiceGroup, 2)]),
    ("monday", &[(TimePeriod, 2)]),
    ("notes", &[(Host, 35), (HostExtInfo, 1), (HostGroup, 4), (Service, 35), (ServiceExtInfo, 2), (ServiceGroup, 4)]),
    ("notes_url", &[(Host, 36), (HostExtInfo, 2), (HostGroup, 5), (Service, 36), (ServiceExtInfo, 3), (ServiceGroup, 5)]),
    ("notification_failure_criteria", &[(HostDependency, 6), (ServiceDependency, 10)]),
    ("notification_interval", &[(Host, 29), (HostEscalation, 6), (Service, 27), (ServiceEscalation, 7)]),
    ("notification_options", &[(Host, 32), (Service, 30)]),
    ("notification_period", &[(Host, 31), (Service, 29)]),
    ("notifications_enabled", &[(Host, 33), (Service, 31)]),
    ("obsess_over_host", &[(Host, 15)]),
    ("obsess_over_service", &[(Service, 15)]),
    ("pager", &[(Contact, 13)]),
    ("parents", &[(Host, 5)]),
    ("passive_checks_enabled", &[(Host, 13), (Service, 13)]),
    ("process_perf_data", &[(Host, 24), (Service, 24)]),
    ("retain_nonstatus_information", &[(Contact, 17), (Host, 26), (Service, 26)]),
    ("retain_status_information", &[(Contact, 16), (Host, 25), (Service, 25)]),
    ("retry_interval", &[(Host, 11), (Service, 11)]),
    ("saturday", &[(TimePeriod, 2)]),
    ("service_description", &[(Service, 3), (ServiceDependency, 7), (ServiceEscalation, 2), (ServiceExtInfo, 1)]),
    ("service_notification_commands", &[(Contact, 11)]),
    ("service_notification_options", &[(Contact, 9)]),
    ("service_notification_period", &[(Contact, 7)]),
    ("service_notifications_enabled", &[(Contact, 5)]),
    ("servicegroup_members", &[(ServiceGroup, 3)]),
    ("servicegroup_name", &[(ServiceDependency, 2), (ServiceGroup, 0)]),
    ("servicegroups", &[(Service, 5)]),
    ("stalking_options", &[(Host, 34), (Service, 34)]),
    ("statusmap_image", &[(Host, 41), (HostExtInfo, 7)]),
    ("sunday", &[(TimePeriod, 2)]),
    ("thursday", &[(TimePeriod, 2)]),
    ("timeperiod_name", &[(TimePeriod, 0)]),
    ("tuesday", &[(TimePeriod, 2)]),
    ("use", &[(Contact, 0), (Host, 0), (Service, 0)]),
    ("vrml_image", &[(Host, 40), (HostExtInfo, 6)]),
    ("wednesday", &[(TimePeriod, 2)]),
    ("name", &[(Service, 43)]),
    ("obsess", &[(Service, 41)]),
    ("parallelize_check", &[(Service, 40)]),
    ("register", &[(Service, 42)]),
    ("hourly_value", &[(Service, 44)]),
];

lazy_static! {
    static ref KEY_INDEX: HashMap<&'static str, usize> = KNOWN_KEYS
        .iter()
        .enumerate()
        .map(|(i, k)| (*k, i))
        .collect();
    /// The process-wide table, built once and read-only afterwards.
    pub static ref SORT_ORDER: SortOrder = SortOrder::from_entries(SORT_ENTRIES);
}

/// Priority lookup keyed by (known key, object type).
#[derive(Debug)]
pub struct SortOrder {
    priorities: HashMap<(usize, ObjectType), u8>,
    problems: Vec<String>,
}

impl SortOrder {
    /// Builds a table from raw entries. Problems are collected rather than
    /// raised so that [`SortOrder::validate`] can report all of them at once.
    pub fn from_entries(entries: &[SortEntry]) -> Self {
        let mut priorities = HashMap::new();
        let mut problems = Vec::new();
        let mut seen_keys = HashSet::new();
        for (key, per_type) in entries {
            let Some(&index) = KEY_INDEX.get(key) else {
                problems.push(format!("key {key:?} is not a known property"));
                continue;
            };
            if !seen_keys.insert(index) {
                problems.push(format!("key {key:?} appears more than once"));
            }
            for (object_type, priority) in per_type.iter() {
                if priorities.insert((index, *object_type), *priority).is_some() {
                    problems.push(format!("duplicate entry for ({key}, {object_type})"));
                }
            }
        }
        Self { priorities, problems }
    }

    /// Checks that the table is free of duplicates and covers every known key
    /// and every object type.
    pub fn validate(&self) -> Result<()> {
        let mut problems = self.problems.clone();
        let covered_keys: HashSet<usize> = self.priorities.keys().map(|(k, _)| *k).collect();
        for (index, key) in KNOWN_KEYS.iter().enumerate() {
            if !covered_keys.contains(&index) {
                problems.push(format!("key {key:?} has no sort entry"));
            }
        }
        let covered_types: HashSet<ObjectType> = self.priorities.keys().map(|(_, t)| *t).collect();
        for object_type in ObjectType::ALL {
            if !covered_types.contains(&object_type) {
                problems.push(format!("object type {object_type} has no sort entries"));
            }
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(NagcfgError::Invariant(problems.join("; ")))
        }
    }

    /// The ordering priority of `key` within `object_type`, if it has one in
    /// the valid range.
    pub fn priority(&self, key: &str, object_type: ObjectType) -> Option<u8> {
        let index = KEY_INDEX.get(key)?;
        self.priorities
            .get(&(*index, object_type))
            .copied()
            .filter(|p| *p <= MAX_PRIORITY)
    }

    /// Sort rank: the priority, or a value after every valid priority.
    pub fn rank(&self, key: &str, object_type: ObjectType) -> u16 {
        self.priority(key, object_type).map_or(UNORDERED, u16::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_table_is_complete() {
        SORT_ORDER.validate().unwrap();
    }

    #[test]
    fn out_of_range_priority_sorts_last() {
        let table = SortOrder::from_entries(&[("use", &[(Host, 99)]), ("alias", &[(Host, 2)])]);
        assert_eq!(table.priority("use", Host), None);
        assert_eq!(table.rank("use", Host), UNORDERED);
        assert_eq!(table.rank("alias", Host), 2);
    }

    #[test]
    fn duplicates_and_unknown_keys_are_reported() {
        let table = SortOrder::from_entries(&[
            ("register", &[(Service, 42)]),
            ("register", &[(Service, 44)]),
            ("no_such_key", &[(Service, 1)]),
        ]);
        let message = table.validate().unwrap_err().to_string();
        assert!(message.contains("appears more than once"));
        assert!(message.contains("duplicate entry for (register, service)"));
        assert!(message.contains("no_such_key"));
        assert!(message.contains("has no sort entry"));
    }
}
