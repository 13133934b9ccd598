use crate::catalog::Role;
use crate::error::StoreError;
use crate::permission::Permission;
use crate::scope::ScopeNode;
use crate::types::{CompanyId, PermissionId, RoleId, ScopeNodeId, UserId};
use async_trait::async_trait;

/// Persisted permission row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionRecord {
    pub id: PermissionId,
    pub permission: Permission,
}

/// Persisted role row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleRecord {
    pub id: RoleId,
    pub role: Role,
}

/// Store interface for the permission, role and grant tables.
#[async_trait]
pub trait CatalogStore {
    /// Returns every persisted permission.
    async fn permissions(&self) -> std::result::Result<Vec<PermissionRecord>, StoreError>;

    /// Inserts a permission. Codes are unique.
    async fn insert_permission(
        &self,
        permission: Permission,
    ) -> std::result::Result<PermissionId, StoreError>;

    /// Returns every persisted role.
    async fn roles(&self) -> std::result::Result<Vec<RoleRecord>, StoreError>;

    /// Inserts a role. Codes are unique.
    async fn insert_role(&self, role: Role) -> std::result::Result<RoleId, StoreError>;

    /// Returns permissions granted to a role.
    async fn role_permissions(
        &self,
        role: RoleId,
    ) -> std::result::Result<Vec<PermissionRecord>, StoreError>;

    /// Inserts the `(role, permission)` grant row.
    async fn insert_grant(
        &self,
        role: RoleId,
        permission: PermissionId,
    ) -> std::result::Result<(), StoreError>;

    /// Deletes the `(role, permission)` grant row.
    async fn delete_grant(
        &self,
        role: RoleId,
        permission: PermissionId,
    ) -> std::result::Result<(), StoreError>;
}

/// Store interface for user role assignments.
#[async_trait]
pub trait AssignmentStore {
    /// Returns roles assigned to a user.
    async fn user_roles(&self, user: UserId) -> std::result::Result<Vec<RoleId>, StoreError>;
}

/// Store interface for the scope tree.
#[async_trait]
pub trait ScopeStore {
    /// Point lookup of a scope node.
    async fn scope_node(
        &self,
        id: ScopeNodeId,
    ) -> std::result::Result<Option<ScopeNode>, StoreError>;

    /// Returns every node belonging to a company.
    async fn company_scope_nodes(
        &self,
        company: CompanyId,
    ) -> std::result::Result<Vec<ScopeNode>, StoreError>;
}

/// Composite store trait.
pub trait Store: CatalogStore + AssignmentStore + ScopeStore + Send + Sync {}

impl<T> Store for T where T: CatalogStore + AssignmentStore + ScopeStore + Send + Sync {}
