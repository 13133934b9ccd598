use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::catalog::Role;
use crate::error::{Error, Result, StoreError};
use crate::permission::Permission;
use crate::scope::ScopeNode;
use crate::store::{AssignmentStore, CatalogStore, PermissionRecord, RoleRecord, ScopeStore};
use crate::types::{CompanyId, PermissionId, RoleId, ScopeNodeId, UserId};

/// In-memory store implementation for tests, demos and single-process use.
///
/// Enforces the unique codes and composite keys a relational schema would,
/// and validates scope-tree links on insert.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    next_id: AtomicI64,
    permissions: RwLock<BTreeMap<PermissionId, Permission>>,
    roles: RwLock<BTreeMap<RoleId, Role>>,
    grants: RwLock<BTreeSet<(RoleId, PermissionId)>>,
    user_roles: RwLock<HashMap<UserId, BTreeSet<RoleId>>>,
    scope_nodes: RwLock<BTreeMap<ScopeNodeId, ScopeNode>>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> i64 {
        self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Adds a scope node after checking its parent link.
    pub fn add_scope_node(&self, node: ScopeNode) -> Result<()> {
        let mut guard = write(&self.inner.scope_nodes);
        if guard.contains_key(&node.id) {
            return Err(Error::InvalidScopeNode(format!(
                "scope node {} already exists",
                node.id
            )));
        }
        let parent = node.parent_id.and_then(|id| guard.get(&id));
        node.validate_parent(parent)?;
        guard.insert(node.id, node);
        Ok(())
    }

    /// Soft-deactivates a scope node. Returns `false` when it does not exist.
    pub fn deactivate_scope_node(&self, id: ScopeNodeId) -> bool {
        let mut guard = write(&self.inner.scope_nodes);
        match guard.get_mut(&id) {
            Some(node) => {
                node.is_active = false;
                true
            }
            None => false,
        }
    }

    /// Assigns a role to a user.
    pub fn assign_role(&self, user: UserId, role: RoleId) {
        let mut guard = write(&self.inner.user_roles);
        guard.entry(user).or_default().insert(role);
    }

    /// Looks up a role key by code.
    pub fn role_id(&self, code: &str) -> Option<RoleId> {
        let guard = read(&self.inner.roles);
        guard
            .iter()
            .find(|(_, role)| role.code.as_str() == code)
            .map(|(id, _)| *id)
    }

    /// Looks up a permission key by code.
    pub fn permission_id(&self, code: &str) -> Option<PermissionId> {
        let guard = read(&self.inner.permissions);
        guard
            .iter()
            .find(|(_, permission)| permission.code.as_str() == code)
            .map(|(id, _)| *id)
    }

    /// Grants a permission to a role by code, outside any catalog.
    ///
    /// Returns `false` when either code is unknown.
    pub fn grant(&self, role: &str, permission: &str) -> bool {
        let (Some(role), Some(permission)) = (self.role_id(role), self.permission_id(permission))
        else {
            return false;
        };
        write(&self.inner.grants).insert((role, permission));
        true
    }

    /// Deletes a permission and its grants. Returns `false` when absent.
    pub fn remove_permission(&self, code: &str) -> bool {
        let Some(id) = self.permission_id(code) else {
            return false;
        };
        write(&self.inner.permissions).remove(&id);
        write(&self.inner.grants).retain(|(_, permission)| *permission != id);
        true
    }

    /// Number of persisted permissions.
    pub fn permission_count(&self) -> usize {
        read(&self.inner.permissions).len()
    }

    /// Number of persisted roles.
    pub fn role_count(&self) -> usize {
        read(&self.inner.roles).len()
    }

    /// Number of persisted grant rows.
    pub fn grant_count(&self) -> usize {
        read(&self.inner.grants).len()
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn permissions(&self) -> std::result::Result<Vec<PermissionRecord>, StoreError> {
        let guard = read(&self.inner.permissions);
        Ok(guard
            .iter()
            .map(|(id, permission)| PermissionRecord {
                id: *id,
                permission: permission.clone(),
            })
            .collect())
    }

    async fn insert_permission(
        &self,
        permission: Permission,
    ) -> std::result::Result<PermissionId, StoreError> {
        let mut guard = write(&self.inner.permissions);
        if guard.values().any(|existing| existing.code == permission.code) {
            return Err(format!("duplicate permission code {}", permission.code).into());
        }
        let id = PermissionId::new(self.next_id());
        guard.insert(id, permission);
        Ok(id)
    }

    async fn roles(&self) -> std::result::Result<Vec<RoleRecord>, StoreError> {
        let guard = read(&self.inner.roles);
        Ok(guard
            .iter()
            .map(|(id, role)| RoleRecord {
                id: *id,
                role: role.clone(),
            })
            .collect())
    }

    async fn insert_role(&self, role: Role) -> std::result::Result<RoleId, StoreError> {
        let mut guard = write(&self.inner.roles);
        if guard.values().any(|existing| existing.code == role.code) {
            return Err(format!("duplicate role code {}", role.code).into());
        }
        let id = RoleId::new(self.next_id());
        guard.insert(id, role);
        Ok(id)
    }

    async fn role_permissions(
        &self,
        role: RoleId,
    ) -> std::result::Result<Vec<PermissionRecord>, StoreError> {
        let grants = read(&self.inner.grants);
        let permissions = read(&self.inner.permissions);
        Ok(grants
            .range((role, PermissionId::new(i64::MIN))..=(role, PermissionId::new(i64::MAX)))
            .filter_map(|(_, id)| {
                permissions.get(id).map(|permission| PermissionRecord {
                    id: *id,
                    permission: permission.clone(),
                })
            })
            .collect())
    }

    async fn insert_grant(
        &self,
        role: RoleId,
        permission: PermissionId,
    ) -> std::result::Result<(), StoreError> {
        if !read(&self.inner.roles).contains_key(&role) {
            return Err(format!("role {role} does not exist").into());
        }
        if !read(&self.inner.permissions).contains_key(&permission) {
            return Err(format!("permission {permission} does not exist").into());
        }
        if !write(&self.inner.grants).insert((role, permission)) {
            return Err(format!("grant ({role}, {permission}) already exists").into());
        }
        Ok(())
    }

    async fn delete_grant(
        &self,
        role: RoleId,
        permission: PermissionId,
    ) -> std::result::Result<(), StoreError> {
        write(&self.inner.grants).remove(&(role, permission));
        Ok(())
    }
}

#[async_trait]
impl AssignmentStore for MemoryStore {
    async fn user_roles(&self, user: UserId) -> std::result::Result<Vec<RoleId>, StoreError> {
        let guard = read(&self.inner.user_roles);
        Ok(guard
            .get(&user)
            .map(|roles| roles.iter().copied().collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl ScopeStore for MemoryStore {
    async fn scope_node(
        &self,
        id: ScopeNodeId,
    ) -> std::result::Result<Option<ScopeNode>, StoreError> {
        let guard = read(&self.inner.scope_nodes);
        Ok(guard.get(&id).cloned())
    }

    async fn company_scope_nodes(
        &self,
        company: CompanyId,
    ) -> std::result::Result<Vec<ScopeNode>, StoreError> {
        let guard = read(&self.inner.scope_nodes);
        Ok(guard
            .values()
            .filter(|node| node.company_id == company)
            .cloned()
            .collect())
    }
}
