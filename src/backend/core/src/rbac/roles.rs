//! The closed set of school roles and their static permission tables.
//!
//! | Role        | Level | Acts on                                    | May create                          |
//! |-------------|-------|--------------------------------------------|-------------------------------------|
//! | SUPER_ADMIN | 5     | SUPER_ADMIN, ADMIN, STAFF, TEACHER, STUDENT | every role                          |
//! | ADMIN       | 4     | ADMIN, STAFF, TEACHER, STUDENT              | STAFF, TEACHER, STUDENT, GUARDIAN   |
//! | STAFF       | 3     | STAFF, STUDENT                              | TEACHER, STUDENT, GUARDIAN          |
//! | TEACHER     | 2     | TEACHER, STUDENT                            | none                                |
//! | STUDENT     | 1     | STUDENT                                     | none                                |
//! | GUARDIAN    | 1     | GUARDIAN                                    | none                                |
//!
//! Every table is an exhaustive `match`, so adding a role fails to compile
//! until each table has an answer for it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TrackError;

/// A caller's role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    SuperAdmin,
    Admin,
    Staff,
    Teacher,
    Student,
    Guardian,
}

impl Role {
    /// All roles, highest tier first.
    pub const ALL: [Role; 6] = [
        Role::SuperAdmin,
        Role::Admin,
        Role::Staff,
        Role::Teacher,
        Role::Student,
        Role::Guardian,
    ];

    /// Wire/database name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SuperAdmin => "SUPER_ADMIN",
            Self::Admin => "ADMIN",
            Self::Staff => "STAFF",
            Self::Teacher => "TEACHER",
            Self::Student => "STUDENT",
            Self::Guardian => "GUARDIAN",
        }
    }

    /// Position in the role hierarchy. Higher outranks lower.
    pub const fn hierarchy(&self) -> u8 {
        match self {
            Self::SuperAdmin => 5,
            Self::Admin => 4,
            Self::Staff => 3,
            Self::Teacher => 2,
            Self::Student => 1,
            Self::Guardian => 1,
        }
    }

    /// Roles this role may act upon (`rolePermissions`).
    pub fn acts_on(&self) -> &'static [Role] {
        match self {
            Self::SuperAdmin => &[
                Role::SuperAdmin,
                Role::Admin,
                Role::Staff,
                Role::Teacher,
                Role::Student,
            ],
            Self::Admin => &[Role::Admin, Role::Staff, Role::Teacher, Role::Student],
            Self::Staff => &[Role::Staff, Role::Student],
            Self::Teacher => &[Role::Teacher, Role::Student],
            Self::Student => &[Role::Student],
            Self::Guardian => &[Role::Guardian],
        }
    }

    /// Roles this role may create accounts for (`userCreateRolePermissions`).
    pub fn creatable_roles(&self) -> &'static [Role] {
        match self {
            Self::SuperAdmin => &Role::ALL,
            Self::Admin => &[Role::Staff, Role::Teacher, Role::Student, Role::Guardian],
            Self::Staff => &[Role::Teacher, Role::Student, Role::Guardian],
            Self::Teacher | Self::Student | Self::Guardian => &[],
        }
    }

    /// The global operator role that bypasses tenant state checks.
    pub fn is_super_admin(&self) -> bool {
        matches!(self, Self::SuperAdmin)
    }

    /// ADMIN and above.
    pub fn is_school_admin(&self) -> bool {
        self.hierarchy() >= Role::Admin.hierarchy()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = TrackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| TrackError::validation(format!("Unknown role: {}", s)))
    }
}
