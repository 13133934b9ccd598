use crate::permission::PermissionCode;
use crate::types::{RoleCode, ScopeNodeId};
use std::fmt;
use thiserror::Error;

/// Store-layer error type.
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// Crate result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Why a scope check failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeDenial {
    /// The request targets a scope node but the actor has no home node.
    NoActorScope { target: ScopeNodeId },
    /// The target is not a descendant of (or equal to) the actor's node.
    OutsideSubtree {
        actor: ScopeNodeId,
        target: ScopeNodeId,
    },
    /// The target value could not be parsed and strict parsing is on.
    MalformedTarget { value: String },
}

impl fmt::Display for ScopeDenial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoActorScope { target } => write!(
                f,
                "actor has no scope, cannot authorize scoped resource {target}"
            ),
            Self::OutsideSubtree { actor, target } => {
                write!(f, "scope node {target} is outside the subtree of {actor}")
            }
            Self::MalformedTarget { value } => write!(f, "malformed scope node id {value:?}"),
        }
    }
}

/// Errors returned by this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Store error wrapper.
    #[error("store error: {0}")]
    Store(#[source] StoreError),
    /// Invalid identifier input.
    #[error("invalid id: {0}")]
    InvalidId(String),
    /// Invalid permission input.
    #[error("invalid permission: {0}")]
    InvalidPermission(String),
    /// A scope node violates the tree invariants.
    #[error("invalid scope node: {0}")]
    InvalidScopeNode(String),
    /// A grant-matrix entry references something absent from the catalog.
    #[error("catalog inconsistency: role {role} references unknown permission {permission}")]
    CatalogInconsistency {
        role: RoleCode,
        permission: PermissionCode,
    },
    /// A policy name does not resolve to a known requirement.
    #[error("unknown policy: {0}")]
    UnknownPolicy(String),
    /// No verified identity was supplied.
    #[error("authentication required")]
    AuthenticationRequired,
    /// The identity lacks the required permission code.
    #[error("permission denied: missing {permission}")]
    PermissionDenied { permission: PermissionCode },
    /// The target scope is not reachable from the actor.
    #[error("scope denied: {0}")]
    ScopeDenied(ScopeDenial),
}

impl From<StoreError> for Error {
    fn from(error: StoreError) -> Self {
        Self::Store(error)
    }
}
