use crate::permission::PermissionCode;
use crate::types::{CompanyId, ScopeNodeId, UserId};
use async_trait::async_trait;

/// Cache interface for effective permissions and materialized subtrees.
///
/// Entries are derived data; a miss always falls back to the store.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Gets cached permission codes for a user.
    async fn get_permissions(&self, user: UserId) -> Option<Vec<PermissionCode>>;

    /// Sets cached permission codes for a user.
    async fn set_permissions(&self, user: UserId, perms: Vec<PermissionCode>);

    /// Gets the cached accessible set rooted at a scope node.
    async fn get_subtree(&self, node: ScopeNodeId) -> Option<Vec<ScopeNodeId>>;

    /// Sets the accessible set rooted at a node of `company`.
    async fn set_subtree(&self, company: CompanyId, node: ScopeNodeId, ids: Vec<ScopeNodeId>);

    /// Invalidates cached permissions for a user.
    async fn invalidate_user(&self, user: UserId);

    /// Invalidates every cached permission set (role grants changed).
    async fn invalidate_permissions(&self);

    /// Invalidates every cached subtree of a company (its tree changed).
    async fn invalidate_company(&self, company: CompanyId);
}

/// No-op cache implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCache;

#[async_trait]
impl Cache for NoCache {
    async fn get_permissions(&self, _user: UserId) -> Option<Vec<PermissionCode>> {
        None
    }

    async fn set_permissions(&self, _user: UserId, _perms: Vec<PermissionCode>) {}

    async fn get_subtree(&self, _node: ScopeNodeId) -> Option<Vec<ScopeNodeId>> {
        None
    }

    async fn set_subtree(&self, _company: CompanyId, _node: ScopeNodeId, _ids: Vec<ScopeNodeId>) {}

    async fn invalidate_user(&self, _user: UserId) {}

    async fn invalidate_permissions(&self) {}

    async fn invalidate_company(&self, _company: CompanyId) {}
}
