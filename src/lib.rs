//! Scope-hierarchy RBAC for multi-tenant organizations.
//!
//! Every request is checked against two independent constraints: does the
//! actor hold the named permission, and does the target scope node lie in
//! the actor's subtree (company, state, district, local). The crate provides
//! the declarative [`Catalog`], the [`Synchronizer`] that keeps persisted
//! permission/role/grant tables in line with it, and the [`Engine`] that
//! answers permission, reachability and per-request questions over a
//! pluggable async [`Store`]. The default behavior is deny-by-default.
//!
//! # Examples
//!
//! Seeding the catalog and authorizing a request with the in-memory store:
//! ```no_run
//! use scope_rbac::{
//!     Catalog, EngineBuilder, Identity, MemoryStore, PolicyRegistry, RequestContext,
//!     Synchronizer, UserId,
//! };
//! # async fn run() -> scope_rbac::Result<()> {
//! let store = MemoryStore::new();
//! let report = Synchronizer::new(store.clone(), Catalog::standard())
//!     .synchronize(false)
//!     .await?;
//! for line in report.lines() {
//!     println!("{line}");
//! }
//!
//! let policies = PolicyRegistry::from_catalog(&Catalog::standard());
//! let engine = EngineBuilder::new(store).build();
//! let request = RequestContext::new(Identity::new(UserId::new(1))).with_query("scopeNodeId", "55");
//! let decision = engine
//!     .authorize(&policies.resolve("PRODUCTS_READ")?, &request)
//!     .await?;
//! # let _ = decision;
//! # Ok(())
//! # }
//! ```
//!
//! Creating a process-local cache (enable `memory-cache`):
//! ```no_run
//! # #[cfg(feature = "memory-cache")]
//! # {
//! use scope_rbac::MemoryCache;
//! use std::time::Duration;
//! let cache = MemoryCache::new(1024).with_ttl(Duration::from_secs(30));
//! # let _ = cache;
//! # }
//! ```
#![forbid(unsafe_code)]

mod cache;
pub mod catalog;
mod context;
mod engine;
mod error;
mod permission;
mod policy;
mod scope;
mod store;
mod sync;
mod types;
#[cfg(feature = "memory-cache")]
mod memory_cache;

#[cfg(feature = "memory-store")]
mod memory_store;

#[cfg(feature = "axum")]
pub mod axum;

pub use crate::cache::{Cache, NoCache};
pub use crate::catalog::{Catalog, GrantMatrix, Role};
pub use crate::context::{Identity, RequestContext};
pub use crate::engine::{
    DEFAULT_SCOPE_PARAM, Decision, DenyReason, Engine, EngineBuilder, EngineConfig,
};
pub use crate::error::{Error, Result, ScopeDenial, StoreError};
pub use crate::permission::{
    Action, Permission, PermissionCode, SUPER_ADMIN, is_code_shaped, permission_code,
};
pub use crate::policy::{PolicyRegistry, Requirement};
pub use crate::scope::{ScopeNode, ScopeType, subtree};
pub use crate::store::{
    AssignmentStore, CatalogStore, PermissionRecord, RoleRecord, ScopeStore, Store,
};
pub use crate::sync::{Change, SyncReport, SyncWarning, Synchronizer};
pub use crate::types::{CompanyId, PermissionId, RoleCode, RoleId, ScopeNodeId, UserId};

#[cfg(feature = "memory-store")]
pub use crate::memory_store::MemoryStore;

#[cfg(feature = "memory-cache")]
pub use crate::memory_cache::MemoryCache;
