use crate::cache::{Cache, NoCache};
use crate::catalog::SUPER_ADMIN_ROLE;
use crate::context::RequestContext;
use crate::error::{Error, Result, ScopeDenial};
use crate::permission::{PermissionCode, SUPER_ADMIN};
use crate::policy::Requirement;
use crate::scope::subtree;
use crate::store::Store;
use crate::types::{CompanyId, RoleCode, ScopeNodeId, UserId};
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, warn};

/// Name of the request parameter carrying the target scope node.
pub const DEFAULT_SCOPE_PARAM: &str = "scopeNodeId";

/// Why a request was denied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    /// No verified identity.
    AuthenticationRequired,
    /// The identity lacks the required permission.
    PermissionDenied { permission: PermissionCode },
    /// The target scope is not reachable.
    ScopeDenied(ScopeDenial),
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AuthenticationRequired => f.write_str("authentication required"),
            Self::PermissionDenied { permission } => write!(f, "permission denied: {permission}"),
            Self::ScopeDenied(denial) => write!(f, "scope denied: {denial}"),
        }
    }
}

/// Authorization decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The request may proceed.
    Allow,
    /// The request is refused.
    Deny(DenyReason),
}

impl Decision {
    /// Returns whether the decision is [`Decision::Allow`].
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Converts a deny into the matching [`Error`].
    pub fn into_result(self) -> Result<()> {
        match self {
            Self::Allow => Ok(()),
            Self::Deny(DenyReason::AuthenticationRequired) => Err(Error::AuthenticationRequired),
            Self::Deny(DenyReason::PermissionDenied { permission }) => {
                Err(Error::PermissionDenied { permission })
            }
            Self::Deny(DenyReason::ScopeDenied(denial)) => Err(Error::ScopeDenied(denial)),
        }
    }
}

/// Pipeline configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EngineConfig {
    /// Role marker that bypasses every check.
    pub super_admin_role: RoleCode,
    /// Query/route parameter naming the target scope node.
    pub scope_param: String,
    /// Deny instead of ignoring a non-numeric target scope value.
    pub reject_malformed_scope: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            super_admin_role: RoleCode::from_string(SUPER_ADMIN_ROLE.to_string()),
            scope_param: DEFAULT_SCOPE_PARAM.to_string(),
            reject_malformed_scope: false,
        }
    }
}

/// Authorization engine with pluggable store and optional cache.
///
/// Read-only: nothing here writes to the store.
#[derive(Debug)]
pub struct Engine<S, C = NoCache> {
    store: S,
    cache: C,
    config: EngineConfig,
}

/// Builder for [`Engine`].
pub struct EngineBuilder<S, C = NoCache> {
    store: S,
    cache: C,
    config: EngineConfig,
}

impl<S> EngineBuilder<S, NoCache> {
    /// Creates a new builder with default configuration.
    pub fn new(store: S) -> Self {
        Self {
            store,
            cache: NoCache,
            config: EngineConfig::default(),
        }
    }
}

impl<S, C> EngineBuilder<S, C> {
    /// Replaces the whole configuration.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the super-admin role marker.
    pub fn super_admin_role(mut self, role: RoleCode) -> Self {
        self.config.super_admin_role = role;
        self
    }

    /// Sets the parameter name carrying the target scope node.
    pub fn scope_param(mut self, name: impl Into<String>) -> Self {
        self.config.scope_param = name.into();
        self
    }

    /// Enables or disables denying non-numeric target scope values.
    pub fn reject_malformed_scope(mut self, on: bool) -> Self {
        self.config.reject_malformed_scope = on;
        self
    }

    /// Sets the cache implementation.
    pub fn cache<C2: Cache>(self, cache: C2) -> EngineBuilder<S, C2> {
        EngineBuilder {
            store: self.store,
            cache,
            config: self.config,
        }
    }

    /// Builds the engine.
    pub fn build(self) -> Engine<S, C> {
        Engine {
            store: self.store,
            cache: self.cache,
            config: self.config,
        }
    }
}

impl<S, C> Engine<S, C> {
    /// Active configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

impl<S, C> Engine<S, C>
where
    S: Store,
    C: Cache,
{
    /// Union of permission codes across all of the user's roles.
    pub async fn user_permissions(&self, user: UserId) -> Result<HashSet<PermissionCode>> {
        if let Some(cached) = self.cache.get_permissions(user).await {
            return Ok(cached.into_iter().collect());
        }

        let roles = self.store.user_roles(user).await.map_err(Error::from)?;
        let mut permissions = HashSet::new();
        for role in roles {
            let granted = self
                .store
                .role_permissions(role)
                .await
                .map_err(Error::from)?;
            permissions.extend(granted.into_iter().map(|record| record.permission.code));
        }

        self.cache
            .set_permissions(user, permissions.iter().cloned().collect())
            .await;
        Ok(permissions)
    }

    /// Exact, case-sensitive membership test.
    pub async fn has_permission(&self, user: UserId, code: &str) -> Result<bool> {
        Ok(self.user_permissions(user).await?.contains(code))
    }

    /// Returns whether the user holds at least one of `codes`.
    pub async fn has_any_permission(&self, user: UserId, codes: &[&str]) -> Result<bool> {
        let permissions = self.user_permissions(user).await?;
        Ok(codes.iter().any(|code| permissions.contains(*code)))
    }

    /// Scope nodes the actor may operate on: its own node and every
    /// descendant. Empty when the actor's node cannot be resolved.
    pub async fn accessible_scope_ids(&self, actor: ScopeNodeId) -> Result<HashSet<ScopeNodeId>> {
        if let Some(cached) = self.cache.get_subtree(actor).await {
            return Ok(cached.into_iter().collect());
        }

        let Some(node) = self.store.scope_node(actor).await.map_err(Error::from)? else {
            debug!(scope_node_id = %actor, "actor scope node not found");
            return Ok(HashSet::new());
        };
        let nodes = self
            .store
            .company_scope_nodes(node.company_id)
            .await
            .map_err(Error::from)?;
        let accessible = subtree(&nodes, actor);

        self.cache
            .set_subtree(node.company_id, actor, accessible.iter().copied().collect())
            .await;
        Ok(accessible)
    }

    /// Returns whether `target` lies in the actor's subtree.
    pub async fn can_access(&self, actor: ScopeNodeId, target: ScopeNodeId) -> Result<bool> {
        Ok(self.accessible_scope_ids(actor).await?.contains(&target))
    }

    /// Fails with [`Error::ScopeDenied`] unless `target` lies in the actor's
    /// subtree.
    pub async fn ensure_in_subtree(&self, actor: ScopeNodeId, target: ScopeNodeId) -> Result<()> {
        if self.can_access(actor, target).await? {
            return Ok(());
        }
        Err(Error::ScopeDenied(ScopeDenial::OutsideSubtree { actor, target }))
    }

    /// Decides whether the request may proceed.
    ///
    /// Order: authentication, super-admin bypass, permission, then the scope
    /// check when the request names a target scope node. Store failures are
    /// returned as errors rather than decisions.
    pub async fn authorize(
        &self,
        requirement: &Requirement,
        request: &RequestContext,
    ) -> Result<Decision> {
        let Some(identity) = request.identity() else {
            return Ok(self.deny(None, requirement, DenyReason::AuthenticationRequired));
        };
        let user = identity.user_id;

        if identity.has_role(self.config.super_admin_role.as_str())
            || identity.has_permission_claim(SUPER_ADMIN)
        {
            debug!(user_id = %user, "super-admin bypass");
            return Ok(Decision::Allow);
        }

        let permissions = self.user_permissions(user).await?;
        if permissions.contains(SUPER_ADMIN) {
            debug!(user_id = %user, "super-admin bypass");
            return Ok(Decision::Allow);
        }
        if !permissions.contains(requirement.permission()) {
            let reason = DenyReason::PermissionDenied {
                permission: requirement.permission().clone(),
            };
            return Ok(self.deny(Some(user), requirement, reason));
        }

        let Some(raw) = request.param(&self.config.scope_param) else {
            return Ok(Decision::Allow);
        };
        let target = match raw.parse::<ScopeNodeId>() {
            Ok(target) => target,
            Err(_) if self.config.reject_malformed_scope => {
                let reason = DenyReason::ScopeDenied(ScopeDenial::MalformedTarget {
                    value: raw.to_string(),
                });
                return Ok(self.deny(Some(user), requirement, reason));
            }
            Err(_) => {
                warn!(user_id = %user, value = raw, "ignoring non-numeric scope node id");
                return Ok(Decision::Allow);
            }
        };

        let Some(actor) = identity.scope_node_id else {
            let reason = DenyReason::ScopeDenied(ScopeDenial::NoActorScope { target });
            return Ok(self.deny(Some(user), requirement, reason));
        };
        if self.can_access(actor, target).await? {
            return Ok(Decision::Allow);
        }
        let reason = DenyReason::ScopeDenied(ScopeDenial::OutsideSubtree { actor, target });
        Ok(self.deny(Some(user), requirement, reason))
    }

    /// Drops cached permissions of a user (role assignment changed).
    pub async fn invalidate_user(&self, user: UserId) {
        self.cache.invalidate_user(user).await;
    }

    /// Drops every cached permission set (grants changed, e.g. after a sync).
    pub async fn invalidate_permissions(&self) {
        self.cache.invalidate_permissions().await;
    }

    /// Drops cached subtrees of a company (its scope tree changed).
    pub async fn invalidate_company(&self, company: CompanyId) {
        self.cache.invalidate_company(company).await;
    }

    fn deny(&self, user: Option<UserId>, requirement: &Requirement, reason: DenyReason) -> Decision {
        debug!(
            user_id = ?user.map(UserId::get),
            permission = %requirement,
            reason = %reason,
            "authorization denied"
        );
        Decision::Deny(reason)
    }
}
