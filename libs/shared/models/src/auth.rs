use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Patient,
    Doctor,
    Staff,
}

impl Role {
    /// Where an unauthenticated viewer of this role is sent.
    pub fn sign_in_route(&self) -> &'static str {
        match self {
            Role::Patient => "/login",
            Role::Doctor => "/login-doctor",
            Role::Staff => "/login-staff",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Patient => "PATIENT",
            Role::Doctor => "DOCTOR",
            Role::Staff => "STAFF",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JwtClaims {
    pub sub: String,
    pub role: Role,
    pub profile_id: Option<i64>,
    pub doctor_id: Option<i64>,
    pub staff_id: Option<i64>,
    pub email: Option<String>,
    pub username: Option<String>,
    pub exp: Option<i64>,
    pub iat: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub subject: String,
    pub role: Role,
    pub profile_id: Option<i64>,
    pub doctor_id: Option<i64>,
    pub staff_id: Option<i64>,
    pub email: Option<String>,
    pub username: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// A decoded identity together with the raw bearer token it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub token: String,
    pub identity: Identity,
}

impl Session {
    pub fn role(&self) -> Role {
        self.identity.role
    }
}
