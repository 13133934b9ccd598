use crate::error::{Error, Result};
use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

const MAX_CODE_LEN: usize = 128;

fn validate_simple_name(value: &str, kind: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidId(format!("{kind} must not be empty")));
    }
    if trimmed.len() > MAX_CODE_LEN {
        return Err(Error::InvalidId(format!(
            "{kind} length must be <= {MAX_CODE_LEN}"
        )));
    }
    if !trimmed.chars().all(is_allowed_name_char) {
        return Err(Error::InvalidId(format!(
            "{kind} contains invalid characters"
        )));
    }
    Ok(trimmed.to_string())
}

fn is_allowed_name_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, ':' | '_' | '-')
}

macro_rules! define_key_type {
    ($(#[$doc:meta])* $name:ident, $kind:expr) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[cfg_attr(feature = "serde", serde(transparent))]
        pub struct $name(i64);

        impl $name {
            /// Wraps a raw store key.
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            /// Returns the raw store key.
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl From<$name> for i64 {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(value: &str) -> Result<Self> {
                value
                    .trim()
                    .parse::<i64>()
                    .map(Self)
                    .map_err(|_| Error::InvalidId(format!("{} must be an integer", $kind)))
            }
        }
    };
}

define_key_type!(
    /// User (actor) identifier.
    UserId,
    "user id"
);
define_key_type!(
    /// Persisted role key.
    RoleId,
    "role id"
);
define_key_type!(
    /// Persisted permission key.
    PermissionId,
    "permission id"
);
define_key_type!(
    /// Scope node identifier.
    ScopeNodeId,
    "scope node id"
);
define_key_type!(
    /// Company identifier.
    CompanyId,
    "company id"
);

/// Unique role code, e.g. `Cmanager`.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct RoleCode(String);

impl RoleCode {
    /// Creates a validated role code.
    pub fn new(value: impl AsRef<str>) -> Result<Self> {
        validate_simple_name(value.as_ref(), "role code").map(Self)
    }

    /// Creates a role code from a trusted string without validation.
    pub fn from_string(value: String) -> Self {
        Self(value)
    }

    /// Returns the underlying string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoleCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RoleCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for RoleCode {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for RoleCode {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

impl From<String> for RoleCode {
    fn from(value: String) -> Self {
        Self::from_string(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_code_should_trim() {
        let code = RoleCode::try_from(" Cmanager ").unwrap();
        assert_eq!(code.as_str(), "Cmanager");
    }

    #[test]
    fn role_code_should_reject_invalid_chars() {
        let err = RoleCode::try_from("c manager").expect_err("must reject");
        assert!(err.to_string().contains("role code"));
    }

    #[test]
    fn scope_node_id_should_parse_integers_only() {
        assert_eq!("42".parse::<ScopeNodeId>().unwrap(), ScopeNodeId::new(42));
        assert_eq!(" 7 ".parse::<ScopeNodeId>().unwrap().get(), 7);

        let err = "abc".parse::<ScopeNodeId>().expect_err("must reject");
        assert!(matches!(err, Error::InvalidId(_)));
    }
}
