//! Identifier type tags scoping a pattern/counter pair within an organization.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Kind of business identifier being minted.
///
/// New kinds are added as variants here and in the `identifier_type`
/// Postgres enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "identifier_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdentifierType {
    Employee,
    Device,
    Loan,
    Applicant,
}

impl IdentifierType {
    pub const ALL: [IdentifierType; 4] = [
        IdentifierType::Employee,
        IdentifierType::Device,
        IdentifierType::Loan,
        IdentifierType::Applicant,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IdentifierType::Employee => "EMPLOYEE",
            IdentifierType::Device => "DEVICE",
            IdentifierType::Loan => "LOAN",
            IdentifierType::Applicant => "APPLICANT",
        }
    }

    /// Whether patterns of this type must carry a non-empty prefix.
    ///
    /// Applicant numbers are date-qualified and may stand without one.
    pub fn requires_prefix(&self) -> bool {
        !matches!(self, IdentifierType::Applicant)
    }
}

impl fmt::Display for IdentifierType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IdentifierType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        IdentifierType::ALL
            .into_iter()
            .find(|t| t.as_str() == upper)
            .ok_or_else(|| format!("Unknown identifier type '{s}'"))
    }
}
