use crate::error::{Error, Result};
use std::borrow::Borrow;
use std::fmt;

/// Reserved module-less code granting universal bypass.
pub const SUPER_ADMIN: &str = "SUPER_ADMIN";

/// Module the reserved [`SUPER_ADMIN`] permission is filed under.
pub const SYSTEM_MODULE: &str = "SYSTEM";

/// Permission code wrapper (`MODULE_ACTION`, uppercase).
///
/// Matching is exact and case-sensitive; codes are never normalized.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct PermissionCode(String);

impl PermissionCode {
    /// Parses and validates a permission code.
    ///
    /// Surrounding whitespace is trimmed; case is preserved and must already
    /// be uppercase.
    pub fn new(value: impl AsRef<str>) -> Result<Self> {
        let trimmed = value.as_ref().trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidPermission(
                "permission code must not be empty".to_string(),
            ));
        }
        if !is_code_shaped(trimmed) {
            return Err(Error::InvalidPermission(format!(
                "{trimmed:?} must be uppercase tokens joined by '_'"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Creates a permission code from a trusted string without validation.
    pub fn from_string(value: String) -> Self {
        Self(value)
    }

    /// The reserved super-admin code.
    pub fn super_admin() -> Self {
        Self(SUPER_ADMIN.to_string())
    }

    /// Returns whether this is the reserved super-admin code.
    pub fn is_super_admin(&self) -> bool {
        self.0 == SUPER_ADMIN
    }

    /// Returns the underlying string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PermissionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PermissionCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for PermissionCode {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for PermissionCode {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

impl From<String> for PermissionCode {
    fn from(value: String) -> Self {
        Self::from_string(value)
    }
}

/// Grantable action kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
    Activate,
    Assign,
    Approve,
    Fulfill,
    Reject,
    Adjust,
    Transfer,
    ConfirmPayment,
    Print,
    View,
    Manage,
    All,
}

impl Action {
    /// Actions every module receives.
    pub const CRUD: [Action; 4] = [Action::Create, Action::Read, Action::Update, Action::Delete];

    /// Code segment for this action.
    pub fn as_upper(self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Read => "READ",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Activate => "ACTIVATE",
            Self::Assign => "ASSIGN",
            Self::Approve => "APPROVE",
            Self::Fulfill => "FULFILL",
            Self::Reject => "REJECT",
            Self::Adjust => "ADJUST",
            Self::Transfer => "TRANSFER",
            Self::ConfirmPayment => "CONFIRMPAYMENT",
            Self::Print => "PRINT",
            Self::View => "VIEW",
            Self::Manage => "MANAGE",
            Self::All => "ALL",
        }
    }

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            Self::ConfirmPayment => "Confirm payment",
            Self::Create => "Create",
            Self::Read => "Read",
            Self::Update => "Update",
            Self::Delete => "Delete",
            Self::Activate => "Activate",
            Self::Assign => "Assign",
            Self::Approve => "Approve",
            Self::Fulfill => "Fulfill",
            Self::Reject => "Reject",
            Self::Adjust => "Adjust",
            Self::Transfer => "Transfer",
            Self::Print => "Print",
            Self::View => "View",
            Self::Manage => "Manage",
            Self::All => "All",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_upper())
    }
}

/// Immutable catalog entry.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Permission {
    pub code: PermissionCode,
    pub module: String,
    pub action: Action,
    pub name: String,
    pub description: String,
}

impl Permission {
    /// Builds the entry for a module/action pair.
    pub fn for_module(module: &str, action: Action) -> Self {
        let readable = module.replace('_', " ").to_ascii_lowercase();
        Self {
            code: permission_code(module, action),
            module: module.to_string(),
            action,
            name: format!("{} {readable}", action.label()),
            description: format!("{} access to {readable}", action.label()),
        }
    }

    /// The reserved universal-bypass entry.
    pub fn super_admin() -> Self {
        Self {
            code: PermissionCode::super_admin(),
            module: SYSTEM_MODULE.to_string(),
            action: Action::All,
            name: "Super admin".to_string(),
            description: "Bypasses every permission and scope check".to_string(),
        }
    }
}

/// Formats `{MODULE}_{ACTION}`.
///
/// Both the permission generator and the grant matrix go through this
/// function so their codes cannot drift apart.
pub fn permission_code(module: &str, action: Action) -> PermissionCode {
    PermissionCode(format!("{module}_{}", action.as_upper()))
}

/// Returns whether `value` is two or more uppercase tokens joined by single
/// underscores. A lone token such as `ADMIN` is a policy name, not a code.
pub fn is_code_shaped(value: &str) -> bool {
    value.contains('_')
        && value.split('_').all(|token| {
            !token.is_empty()
                && token
                    .chars()
                    .all(|ch| ch.is_ascii_uppercase() || ch.is_ascii_digit())
        })
}
