//! Identity vocabulary shared by tokens and stored employees

use serde::{Deserialize, Serialize};

/// Employee role within a company
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Recruiter,
    Interviewer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Recruiter => "recruiter",
            Role::Interviewer => "interviewer",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "recruiter" => Ok(Role::Recruiter),
            "interviewer" => Ok(Role::Interviewer),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

/// What a signed token may be used for
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenPurpose {
    /// Authenticates API calls. Remote identity-provider tokens carry no
    /// purpose claim and decode as this.
    #[default]
    Access,
    /// Exchanged for a new access token
    Refresh,
    /// Completes signup for an invited employee
    Onboarding,
}

impl std::fmt::Display for TokenPurpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenPurpose::Access => write!(f, "access"),
            TokenPurpose::Refresh => write!(f, "refresh"),
            TokenPurpose::Onboarding => write!(f, "onboarding"),
        }
    }
}
