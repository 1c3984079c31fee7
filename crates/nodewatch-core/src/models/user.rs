//! User identity and authorization models

use serde::{Deserialize, Deserializer, Serialize};

/// Capability tier derived from the backend's numeric rights level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rights {
    /// Tier 1: sees every machine, can acknowledge alerts
    Admin,
    /// Tier 2: scoped to an assigned machine, can acknowledge alerts
    Supervisor,
    /// Any other tier: scoped, read-only
    #[default]
    Operator,
}

impl Rights {
    /// Map the backend's numeric rights level
    pub fn from_tier(tier: i64) -> Self {
        match tier {
            1 => Self::Admin,
            2 => Self::Supervisor,
            _ => Self::Operator,
        }
    }

    /// Whether this tier may acknowledge (resolve) alerts
    pub fn can_acknowledge(self) -> bool {
        matches!(self, Self::Admin | Self::Supervisor)
    }

    /// Whether this tier sees alerts for every machine
    pub fn full_visibility(self) -> bool {
        matches!(self, Self::Admin)
    }
}

/// A machine assignment entry on a user record
///
/// The backend returns these as `{"id": 5}`, `{"machine_id": 5}` or a bare
/// number depending on its version.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MachineAssignment {
    /// Object form
    Entry {
        /// Assigned machine identifier
        #[serde(alias = "machine_id")]
        id: i64,
    },
    /// Bare identifier form
    Id(i64),
}

impl MachineAssignment {
    /// The assigned machine identifier
    pub fn machine_id(&self) -> i64 {
        match self {
            Self::Entry { id } | Self::Id(id) => *id,
        }
    }
}

/// An operator/administrator account
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct User {
    /// User identifier
    pub id: i64,

    /// Display name
    pub name: Option<String>,

    /// Login handle
    pub login: Option<String>,

    /// Role description, e.g. "Field Operator"
    pub role: Option<String>,

    /// Numeric rights tier as stored by the backend
    pub rights: Option<i64>,

    /// Job designation
    pub designation: Option<String>,

    /// National id-card number
    pub cnic: Option<String>,

    /// Directly assigned machine, older backend shape
    pub machine_id: Option<i64>,

    /// Machine assignments; absent means the detail record was never loaded
    #[serde(deserialize_with = "deserialize_assignments")]
    pub requested_machines: Option<Vec<MachineAssignment>>,
}

impl User {
    /// Capability tier for this user
    pub fn capability(&self) -> Rights {
        Rights::from_tier(self.rights.unwrap_or_default())
    }

    /// The machine this user is scoped to, if any
    pub fn assigned_machine(&self) -> Option<i64> {
        self.requested_machines
            .as_ref()
            .and_then(|assignments| assignments.first())
            .map(MachineAssignment::machine_id)
            .or(self.machine_id)
    }

    /// Whether the assignment information has been loaded at all
    ///
    /// Session records may omit `requested_machines` entirely; the detail
    /// endpoint is the source of truth in that case.
    pub fn knows_assignment(&self) -> bool {
        self.requested_machines.is_some() || self.machine_id.is_some()
    }

    /// Merge the detail record for this user over the session record
    pub fn merge_detail(&mut self, detail: User) {
        if detail.name.is_some() {
            self.name = detail.name;
        }
        if detail.login.is_some() {
            self.login = detail.login;
        }
        if detail.role.is_some() {
            self.role = detail.role;
        }
        if detail.rights.is_some() {
            self.rights = detail.rights;
        }
        if detail.designation.is_some() {
            self.designation = detail.designation;
        }
        if detail.cnic.is_some() {
            self.cnic = detail.cnic;
        }
        if detail.machine_id.is_some() {
            self.machine_id = detail.machine_id;
        }
        if detail.requested_machines.is_some() {
            self.requested_machines = detail.requested_machines;
        }
    }
}

/// Accept a list of assignments, a single assignment, or null
fn deserialize_assignments<'de, D>(
    deserializer: D,
) -> Result<Option<Vec<MachineAssignment>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Many(Vec<MachineAssignment>),
        One(MachineAssignment),
    }

    let raw = Option::<Raw>::deserialize(deserializer)?;
    Ok(raw.map(|raw| match raw {
        Raw::Many(assignments) => assignments,
        Raw::One(assignment) => vec![assignment],
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(1, Rights::Admin)]
    #[case(2, Rights::Supervisor)]
    #[case(3, Rights::Operator)]
    #[case(0, Rights::Operator)]
    fn maps_numeric_tier(#[case] tier: i64, #[case] expected: Rights) {
        assert_eq!(Rights::from_tier(tier), expected);
    }

    #[test]
    fn acknowledge_capability_follows_tier() {
        assert!(Rights::Admin.can_acknowledge());
        assert!(Rights::Supervisor.can_acknowledge());
        assert!(!Rights::Operator.can_acknowledge());
        assert!(Rights::Admin.full_visibility());
        assert!(!Rights::Supervisor.full_visibility());
    }

    #[rstest]
    #[case(serde_json::json!([{ "id": 5 }]), Some(5))]
    #[case(serde_json::json!([{ "machine_id": 9 }]), Some(9))]
    #[case(serde_json::json!([7, 8]), Some(7))]
    #[case(serde_json::json!(4), Some(4))]
    #[case(serde_json::json!([]), None)]
    fn assignment_shapes(#[case] raw: serde_json::Value, #[case] expected: Option<i64>) {
        let user: User = serde_json::from_value(serde_json::json!({
            "id": 1,
            "requested_machines": raw,
        }))
        .unwrap();
        assert_eq!(user.assigned_machine(), expected);
    }

    #[test]
    fn falls_back_to_flat_machine_id() {
        let user: User = serde_json::from_value(serde_json::json!({
            "id": 1,
            "machine_id": 11,
        }))
        .unwrap();
        assert_eq!(user.assigned_machine(), Some(11));
    }

    #[test]
    fn session_record_without_assignments_is_unresolved() {
        let user: User = serde_json::from_value(serde_json::json!({ "id": 2, "rights": 2 }))
            .unwrap();
        assert!(!user.knows_assignment());
    }

    #[test]
    fn detail_merge_fills_assignment() {
        let mut session: User =
            serde_json::from_value(serde_json::json!({ "id": 2, "rights": 2 })).unwrap();
        let detail: User = serde_json::from_value(serde_json::json!({
            "id": 2,
            "name": "R. Vega",
            "requested_machines": [{ "id": 5 }],
        }))
        .unwrap();

        session.merge_detail(detail);

        assert_eq!(session.assigned_machine(), Some(5));
        assert_eq!(session.name.as_deref(), Some("R. Vega"));
        assert_eq!(session.rights, Some(2));
    }
}
