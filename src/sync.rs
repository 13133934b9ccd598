//! Reconciles persisted permissions, roles and grants against a [`Catalog`].

use crate::catalog::Catalog;
use crate::error::{Error, Result};
use crate::permission::PermissionCode;
use crate::store::CatalogStore;
use crate::types::{PermissionId, RoleCode, RoleId};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use tracing::{debug, info, warn};

/// One applied change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    AddedPermission(PermissionCode),
    AddedRole(RoleCode),
    Granted {
        role: RoleCode,
        permission: PermissionCode,
    },
    Revoked {
        role: RoleCode,
        permission: PermissionCode,
    },
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AddedPermission(code) => write!(f, "Added Permission: {code}"),
            Self::AddedRole(code) => write!(f, "Added Role: {code}"),
            Self::Granted { role, permission } => write!(f, "Granted {permission} to {role}"),
            Self::Revoked { role, permission } => write!(f, "Revoked {permission} from {role}"),
        }
    }
}

/// A grant-matrix entry that could not be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncWarning {
    /// The permission code is not in the persisted catalog.
    UnknownPermission {
        role: RoleCode,
        permission: PermissionCode,
    },
    /// The role code is not persisted.
    UnknownRole(RoleCode),
}

impl fmt::Display for SyncWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownPermission { role, permission } => {
                write!(f, "role {role} references unknown permission {permission}")
            }
            Self::UnknownRole(role) => write!(f, "grant matrix references unknown role {role}"),
        }
    }
}

impl From<SyncWarning> for Error {
    fn from(warning: SyncWarning) -> Self {
        match warning {
            SyncWarning::UnknownPermission { role, permission } => {
                Error::CatalogInconsistency { role, permission }
            }
            SyncWarning::UnknownRole(role) => {
                Error::InvalidId(format!("grant matrix references unknown role {role}"))
            }
        }
    }
}

/// Outcome of a synchronization run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    changes: Vec<Change>,
    warnings: Vec<SyncWarning>,
}

impl SyncReport {
    /// Changes in the order they were applied.
    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    /// Matrix entries that were skipped.
    pub fn warnings(&self) -> &[SyncWarning] {
        &self.warnings
    }

    /// Human-readable change records.
    pub fn lines(&self) -> Vec<String> {
        self.changes.iter().map(ToString::to_string).collect()
    }

    /// Returns whether nothing was changed.
    pub fn is_noop(&self) -> bool {
        self.changes.is_empty()
    }

    fn record(&mut self, change: Change) {
        info!(change = %change, "catalog sync");
        self.changes.push(change);
    }

    fn warn(&mut self, warning: SyncWarning) {
        warn!(warning = %warning, "catalog sync skipped grant");
        self.warnings.push(warning);
    }
}

/// Catalog synchronizer ("seeder").
///
/// Each insert or delete is its own store call, so an interrupted run keeps
/// its partial progress and a rerun finishes the job. Runs are not mutually
/// exclusive; callers serialize them.
#[derive(Debug)]
pub struct Synchronizer<S> {
    store: S,
    catalog: Catalog,
    validate_catalog: bool,
}

impl<S> Synchronizer<S> {
    /// Creates a synchronizer for `catalog`.
    pub fn new(store: S, catalog: Catalog) -> Self {
        Self {
            store,
            catalog,
            validate_catalog: true,
        }
    }

    /// Enables or disables the up-front [`Catalog::validate`] pass.
    ///
    /// When disabled, dangling matrix entries are only reported as warnings.
    pub fn validate_catalog(mut self, on: bool) -> Self {
        self.validate_catalog = on;
        self
    }

    /// The catalog being reconciled to.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }
}

impl<S> Synchronizer<S>
where
    S: CatalogStore + Send + Sync,
{
    /// Brings persisted tables in line with the catalog.
    ///
    /// Missing permissions, roles and grants are added. With
    /// `allow_revocation`, grants a role holds beyond its matrix entry are
    /// deleted. Permissions and roles are never deleted.
    pub async fn synchronize(&self, allow_revocation: bool) -> Result<SyncReport> {
        if self.validate_catalog {
            self.catalog.validate()?;
        }

        let mut report = SyncReport::default();
        self.sync_permissions(&mut report).await?;
        self.sync_roles(&mut report).await?;
        self.sync_grants(allow_revocation, &mut report).await?;

        debug!(
            changes = report.changes.len(),
            warnings = report.warnings.len(),
            allow_revocation,
            "catalog sync finished"
        );
        Ok(report)
    }

    async fn sync_permissions(&self, report: &mut SyncReport) -> Result<()> {
        let mut existing: HashSet<PermissionCode> = self
            .store
            .permissions()
            .await
            .map_err(Error::from)?
            .into_iter()
            .map(|record| record.permission.code)
            .collect();

        for permission in self.catalog.permissions() {
            if existing.contains(&permission.code) {
                continue;
            }
            self.store
                .insert_permission(permission.clone())
                .await
                .map_err(Error::from)?;
            existing.insert(permission.code.clone());
            report.record(Change::AddedPermission(permission.code.clone()));
        }
        Ok(())
    }

    async fn sync_roles(&self, report: &mut SyncReport) -> Result<()> {
        let mut existing: HashSet<RoleCode> = self
            .store
            .roles()
            .await
            .map_err(Error::from)?
            .into_iter()
            .map(|record| record.role.code)
            .collect();

        for role in self.catalog.roles() {
            if existing.contains(&role.code) {
                continue;
            }
            self.store
                .insert_role(role.clone())
                .await
                .map_err(Error::from)?;
            existing.insert(role.code.clone());
            report.record(Change::AddedRole(role.code.clone()));
        }
        Ok(())
    }

    async fn sync_grants(&self, allow_revocation: bool, report: &mut SyncReport) -> Result<()> {
        let permission_ids: HashMap<PermissionCode, PermissionId> = self
            .store
            .permissions()
            .await
            .map_err(Error::from)?
            .into_iter()
            .map(|record| (record.permission.code, record.id))
            .collect();
        let role_ids: HashMap<RoleCode, RoleId> = self
            .store
            .roles()
            .await
            .map_err(Error::from)?
            .into_iter()
            .map(|record| (record.role.code, record.id))
            .collect();

        for (role, target) in self.catalog.grants() {
            let Some(&role_id) = role_ids.get(role) else {
                report.warn(SyncWarning::UnknownRole(role.clone()));
                continue;
            };

            let current: BTreeMap<PermissionCode, PermissionId> = self
                .store
                .role_permissions(role_id)
                .await
                .map_err(Error::from)?
                .into_iter()
                .map(|record| (record.permission.code, record.id))
                .collect();

            for code in target.iter().filter(|code| !current.contains_key(*code)) {
                let Some(&permission_id) = permission_ids.get(code) else {
                    report.warn(SyncWarning::UnknownPermission {
                        role: role.clone(),
                        permission: code.clone(),
                    });
                    continue;
                };
                self.store
                    .insert_grant(role_id, permission_id)
                    .await
                    .map_err(Error::from)?;
                report.record(Change::Granted {
                    role: role.clone(),
                    permission: code.clone(),
                });
            }

            if !allow_revocation {
                continue;
            }
            for (code, permission_id) in current.iter().filter(|(code, _)| !target.contains(*code)) {
                self.store
                    .delete_grant(role_id, *permission_id)
                    .await
                    .map_err(Error::from)?;
                report.record(Change::Revoked {
                    role: role.clone(),
                    permission: code.clone(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "memory-store")]
    use crate::MemoryStore;
    #[cfg(feature = "memory-store")]
    use crate::catalog::{GrantMatrix, Role, generate_permissions, generate_roles};
    #[cfg(feature = "memory-store")]
    use crate::permission::{Action, Permission, permission_code};
    #[cfg(feature = "memory-store")]
    use crate::scope::ScopeType;
    #[cfg(feature = "memory-store")]
    use futures::executor::block_on;
    #[cfg(feature = "memory-store")]
    use std::collections::BTreeSet;

    #[cfg(feature = "memory-store")]
    fn role(code: &str) -> Role {
        Role {
            code: RoleCode::try_from(code).unwrap(),
            name: code.to_string(),
            scope_type: ScopeType::Company,
            is_system: true,
        }
    }

    #[cfg(feature = "memory-store")]
    fn small_catalog() -> Catalog {
        let permissions = vec![
            Permission::for_module("PRODUCTS", Action::Read),
            Permission::for_module("PRODUCTS", Action::Delete),
        ];
        let mut grants = GrantMatrix::new();
        grants.insert(
            RoleCode::try_from("Cmanager").unwrap(),
            BTreeSet::from([permission_code("PRODUCTS", Action::Read)]),
        );
        Catalog::new(permissions, vec![role("Cmanager")], grants)
    }

    #[test]
    fn change_should_render_human_readable_lines() {
        let added = Change::AddedPermission(PermissionCode::try_from("PRODUCTS_READ").unwrap());
        let role_added = Change::AddedRole(RoleCode::try_from("Cmanager").unwrap());

        assert_eq!(added.to_string(), "Added Permission: PRODUCTS_READ");
        assert_eq!(role_added.to_string(), "Added Role: Cmanager");
    }

    #[cfg(feature = "memory-store")]
    #[test]
    fn first_run_should_add_everything_in_order() {
        let store = MemoryStore::new();
        let report = block_on(Synchronizer::new(store.clone(), small_catalog()).synchronize(false))
            .unwrap();

        assert_eq!(
            report.lines(),
            vec![
                "Added Permission: PRODUCTS_READ",
                "Added Permission: PRODUCTS_DELETE",
                "Added Role: Cmanager",
                "Granted PRODUCTS_READ to Cmanager",
            ]
        );
        assert!(report.warnings().is_empty());
        assert_eq!(store.grant_count(), 1);
    }

    #[cfg(feature = "memory-store")]
    #[test]
    fn dangling_matrix_code_should_warn_without_validation() {
        let store = MemoryStore::new();
        let mut grants = GrantMatrix::new();
        grants.insert(
            RoleCode::try_from("Cmanager").unwrap(),
            BTreeSet::from([
                permission_code("PRODUCTS", Action::Read),
                permission_code("PRODUCTS", Action::Approve),
            ]),
        );
        let catalog = Catalog::new(
            vec![Permission::for_module("PRODUCTS", Action::Read)],
            vec![role("Cmanager")],
            grants,
        );

        let report = block_on(
            Synchronizer::new(store.clone(), catalog)
                .validate_catalog(false)
                .synchronize(false),
        )
        .unwrap();

        assert_eq!(store.grant_count(), 1);
        assert_eq!(
            report.warnings(),
            &[SyncWarning::UnknownPermission {
                role: RoleCode::try_from("Cmanager").unwrap(),
                permission: PermissionCode::try_from("PRODUCTS_APPROVE").unwrap(),
            }]
        );
    }

    #[cfg(feature = "memory-store")]
    #[test]
    fn dangling_matrix_code_should_fail_fast_with_validation() {
        let store = MemoryStore::new();
        let mut grants = GrantMatrix::new();
        grants.insert(
            RoleCode::try_from("Cmanager").unwrap(),
            BTreeSet::from([permission_code("PRODUCTS", Action::Approve)]),
        );
        let catalog = Catalog::new(generate_permissions(), generate_roles(), grants);

        let result = block_on(Synchronizer::new(store.clone(), catalog).synchronize(false));

        assert!(matches!(result, Err(Error::CatalogInconsistency { .. })));
        assert_eq!(store.permission_count(), 0);
    }

    #[cfg(feature = "memory-store")]
    #[test]
    fn unknown_matrix_role_should_warn() {
        let store = MemoryStore::new();
        let mut grants = GrantMatrix::new();
        grants.insert(
            RoleCode::try_from("Ghost").unwrap(),
            BTreeSet::from([permission_code("PRODUCTS", Action::Read)]),
        );
        let catalog = Catalog::new(
            vec![Permission::for_module("PRODUCTS", Action::Read)],
            Vec::new(),
            grants,
        );

        let report = block_on(Synchronizer::new(store, catalog).synchronize(false)).unwrap();

        assert_eq!(
            report.warnings(),
            &[SyncWarning::UnknownRole(RoleCode::try_from("Ghost").unwrap())]
        );
    }

    #[test]
    fn warning_should_convert_to_catalog_inconsistency() {
        let warning = SyncWarning::UnknownPermission {
            role: RoleCode::try_from("Cmanager").unwrap(),
            permission: PermissionCode::try_from("PRODUCTS_APPROVE").unwrap(),
        };
        assert!(matches!(
            Error::from(warning),
            Error::CatalogInconsistency { .. }
        ));
    }
}
