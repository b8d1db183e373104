use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::auth::validate::{validate_optional, validate_required};
use crate::errors::AppError;

/// Portal roles. `pengurus` are organization officers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Pengurus,
    Anggota,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Pengurus => "pengurus",
            Role::Anggota => "anggota",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "pengurus" => Ok(Role::Pengurus),
            "anggota" => Ok(Role::Anggota),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// Internal user row for authentication; includes the password hash.
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password: String,
    pub name: String,
    pub role: Role,
}

/// Public profile, safe to serialize.
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub name: String,
    pub nim: Option<String>,
    pub jabatan: Option<String>,
    pub role: Role,
}

pub struct NewUser {
    pub username: String,
    pub password: String,
    pub name: String,
    pub nim: Option<String>,
    pub jabatan: Option<String>,
    pub role: Role,
}

/// Request body for provisioning an account.
#[derive(Debug, Deserialize)]
pub struct UserRequest {
    pub username: String,
    pub password: String,
    pub name: String,
    pub nim: Option<String>,
    pub jabatan: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

impl UserRequest {
    /// Field checks for a new account; returns the requested role
    /// (`anggota` when omitted).
    pub fn validate(&self) -> Result<Role, AppError> {
        let mut errors = Vec::new();
        errors.extend(validate_required(&self.username, "Username", 50));
        errors.extend(validate_required(&self.name, "Name", 255));
        if self.password.chars().count() < 8 {
            errors.push("Password must be at least 8 characters".to_string());
        }
        errors.extend(validate_optional(self.nim.as_deref(), "NIM", 50));
        errors.extend(validate_optional(self.jabatan.as_deref(), "Jabatan", 100));

        let role = match self.role.as_deref().map(str::trim) {
            None | Some("") => Role::Anggota,
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                errors.push(e);
                Role::Anggota
            }),
        };

        if errors.is_empty() { Ok(role) } else { Err(AppError::Validation(errors)) }
    }
}
