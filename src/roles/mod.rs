use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Named privilege levels, totally ordered by rank. Lower rank = higher
/// privilege; `PrimaryOwner` is the apex and is held by exactly one user
/// per tenant at any committed instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Role {
    PrimaryOwner = 0,
    Owner = 1,
    Admin = 2,
    User = 3,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::PrimaryOwner, Role::Owner, Role::Admin, Role::User];

    /// Numeric ordinal used for hierarchy comparisons.
    pub const fn rank(self) -> u8 {
        self as u8
    }

    pub const fn is_apex(self) -> bool {
        matches!(self, Role::PrimaryOwner)
    }

    /// Stable wire name, matching the stored membership rows.
    pub const fn as_str(self) -> &'static str {
        match self {
            Role::PrimaryOwner => "PrimaryOwner",
            Role::Owner => "Owner",
            Role::Admin => "Admin",
            Role::User => "User",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("'{0}' is not a system role")]
pub struct RoleParseError(pub String);

impl FromStr for Role {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PrimaryOwner" => Ok(Role::PrimaryOwner),
            "Owner" => Ok(Role::Owner),
            "Admin" => Ok(Role::Admin),
            "User" => Ok(Role::User),
            other => Err(RoleParseError(other.to_string())),
        }
    }
}

/// Decides whether a commanding user may act on a recipient user. Pure and
/// total; callers read both users' single committed role first.
///
/// The lowest rank never acts on any account, and an apex holder never acts
/// on another apex holder. The apex-vs-apex refusal stays load-bearing even
/// though the singleton invariant should make it unreachable.
pub fn can_act(commanding: Role, recipient: Role) -> bool {
    if commanding == Role::User {
        return false;
    }
    if commanding.is_apex() && recipient.is_apex() {
        return false;
    }
    commanding.is_apex() || commanding.rank() <= recipient.rank()
}
