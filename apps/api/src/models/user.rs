use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Balance assumed when a profile's `parseTokens` is missing.
pub const MISSING_BALANCE: i64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
    Owner,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::Owner => "owner",
        }
    }

    /// Admins and owners bypass token metering and may access any record.
    pub fn is_elevated(&self) -> bool {
        matches!(self, Role::Admin | Role::Owner)
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            "owner" => Ok(Role::Owner),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// The only identity the pipeline trusts. Resolved upstream and passed in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub uid: String,
    pub role: Role,
}

impl Caller {
    pub fn can_access(&self, owner_id: &str) -> bool {
        self.role.is_elevated() || self.uid == owner_id
    }
}

/// Targeting fields consumed by the Judgment Scorer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileTargeting {
    pub target_role: String,
    pub seniority: String,
    pub industries: Vec<String>,
    pub must_have_keywords: Vec<String>,
    pub nice_to_have_keywords: Vec<String>,
    pub locations: Vec<String>,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub uid: String,
    pub role: Role,
    /// Consumable balance. Only meaningful for `Role::User`. `None` reads as `MISSING_BALANCE`.
    pub parse_tokens: Option<i64>,
    #[serde(flatten)]
    pub targeting: ProfileTargeting,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    /// Profile created on first sign-in.
    pub fn new_default(uid: &str, starting_tokens: i64) -> Self {
        let now = Utc::now();
        Self {
            uid: uid.to_string(),
            role: Role::User,
            parse_tokens: Some(starting_tokens),
            targeting: ProfileTargeting::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn effective_balance(&self) -> i64 {
        self.parse_tokens.unwrap_or(MISSING_BALANCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing_is_case_insensitive() {
        assert_eq!("Admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!(" owner".parse::<Role>().unwrap(), Role::Owner);
        assert!("superuser".parse::<Role>().is_err());
    }

    #[test]
    fn test_caller_access_rules() {
        let user = Caller {
            uid: "alice".to_string(),
            role: Role::User,
        };
        assert!(user.can_access("alice"));
        assert!(!user.can_access("bob"));

        let admin = Caller {
            uid: "root".to_string(),
            role: Role::Admin,
        };
        assert!(admin.can_access("bob"));
    }

    #[test]
    fn test_missing_balance_reads_as_one() {
        let mut profile = UserProfile::new_default("u", 2);
        assert_eq!(profile.effective_balance(), 2);
        profile.parse_tokens = None;
        assert_eq!(profile.effective_balance(), MISSING_BALANCE);
    }

    #[test]
    fn test_profile_serializes_flat_targeting() {
        let profile = UserProfile::new_default("u", 2);
        let value = serde_json::to_value(&profile).unwrap();
        assert_eq!(value["parseTokens"], 2);
        assert_eq!(value["role"], "user");
        assert!(value["mustHaveKeywords"].is_array());
    }
}
