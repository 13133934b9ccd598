//! Declarative permission, role and grant definitions.
//!
//! Everything here is pure and deterministic. The [`Catalog`] value is the
//! source of truth the synchronizer reconciles persisted tables against.

use crate::error::{Error, Result};
use crate::permission::{Action, Permission, PermissionCode, permission_code};
use crate::scope::ScopeType;
use crate::types::RoleCode;
use std::collections::{BTreeMap, BTreeSet, HashSet};

pub const COMPANIES: &str = "COMPANIES";
pub const SCOPE_NODES: &str = "SCOPE_NODES";
pub const USERS: &str = "USERS";
pub const ROLES: &str = "ROLES";
pub const PERMISSIONS: &str = "PERMISSIONS";
pub const API_KEYS: &str = "API_KEYS";
pub const PRODUCTS: &str = "PRODUCTS";
pub const CATEGORIES: &str = "CATEGORIES";
pub const INVENTORY: &str = "INVENTORY";
pub const STOCK_REQUESTS: &str = "STOCK_REQUESTS";
pub const WALLET: &str = "WALLET";
pub const INVOICES: &str = "INVOICES";
pub const SALES: &str = "SALES";
pub const REPORTS: &str = "REPORTS";
pub const SETTINGS: &str = "SETTINGS";

/// Code of the role that receives every permission.
pub const SUPER_ADMIN_ROLE: &str = "SuperAdmin";

const MODULES: [&str; 15] = [
    COMPANIES,
    SCOPE_NODES,
    USERS,
    ROLES,
    PERMISSIONS,
    API_KEYS,
    PRODUCTS,
    CATEGORIES,
    INVENTORY,
    STOCK_REQUESTS,
    WALLET,
    INVOICES,
    SALES,
    REPORTS,
    SETTINGS,
];

/// Role archetype.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Role {
    pub code: RoleCode,
    pub name: String,
    /// Level the role is meant for. Descriptive only; grants are not checked
    /// against it.
    pub scope_type: ScopeType,
    pub is_system: bool,
}

impl Role {
    fn system(code: &str, name: &str, scope_type: ScopeType) -> Self {
        Self {
            code: RoleCode::from_string(code.to_string()),
            name: name.to_string(),
            scope_type,
            is_system: true,
        }
    }
}

/// Role code to granted permission codes.
pub type GrantMatrix = BTreeMap<RoleCode, BTreeSet<PermissionCode>>;

/// Module names in declaration order.
pub fn list_modules() -> Vec<&'static str> {
    MODULES.to_vec()
}

/// Actions a module receives on top of CRUD.
pub fn special_actions(module: &str) -> &'static [Action] {
    match module {
        COMPANIES | SCOPE_NODES | API_KEYS => &[Action::Activate],
        USERS => &[Action::Activate, Action::Assign],
        ROLES => &[Action::Assign],
        INVENTORY => &[Action::Adjust, Action::Transfer],
        STOCK_REQUESTS => &[Action::Approve, Action::Fulfill, Action::Reject],
        WALLET => &[Action::Transfer, Action::ConfirmPayment],
        INVOICES => &[Action::ConfirmPayment, Action::Print],
        REPORTS => &[Action::View],
        SETTINGS => &[Action::Manage],
        _ => &[],
    }
}

/// Every action generated for `module`, CRUD first.
pub fn module_actions(module: &str) -> Vec<Action> {
    let mut actions = Action::CRUD.to_vec();
    actions.extend_from_slice(special_actions(module));
    actions
}

/// Generates the permission catalog, ending with `SUPER_ADMIN`.
pub fn generate_permissions() -> Vec<Permission> {
    let mut permissions: Vec<Permission> = MODULES
        .iter()
        .flat_map(|module| {
            module_actions(module)
                .into_iter()
                .map(move |action| Permission::for_module(module, action))
        })
        .collect();
    permissions.push(Permission::super_admin());
    permissions
}

/// Generates the role archetypes: one super-admin plus admin, manager and
/// employee at each business level.
pub fn generate_roles() -> Vec<Role> {
    vec![
        Role::system(SUPER_ADMIN_ROLE, "Super admin", ScopeType::SuperAdmin),
        Role::system("Cadmin", "Company admin", ScopeType::Company),
        Role::system("Cmanager", "Company manager", ScopeType::Company),
        Role::system("Cemployee", "Company employee", ScopeType::Company),
        Role::system("Sadmin", "State admin", ScopeType::State),
        Role::system("Smanager", "State manager", ScopeType::State),
        Role::system("Semployee", "State employee", ScopeType::State),
        Role::system("Dadmin", "District admin", ScopeType::District),
        Role::system("Dmanager", "District manager", ScopeType::District),
        Role::system("Demployee", "District employee", ScopeType::District),
        Role::system("Ladmin", "Local admin", ScopeType::Local),
        Role::system("Lmanager", "Local manager", ScopeType::Local),
        Role::system("Lemployee", "Local employee", ScopeType::Local),
    ]
}

fn grants(entries: &[(&str, &[Action])]) -> BTreeSet<PermissionCode> {
    entries
        .iter()
        .flat_map(|(module, actions)| actions.iter().map(|action| permission_code(module, *action)))
        .collect()
}

fn read_all(modules: &[&str]) -> BTreeSet<PermissionCode> {
    modules
        .iter()
        .map(|module| permission_code(module, Action::Read))
        .collect()
}

fn full(modules: &[&str]) -> BTreeSet<PermissionCode> {
    modules
        .iter()
        .flat_map(|module| {
            module_actions(module)
                .into_iter()
                .map(move |action| permission_code(module, action))
        })
        .collect()
}

fn regional_admin() -> BTreeSet<PermissionCode> {
    use Action::*;

    let mut set = full(&[USERS, INVENTORY, STOCK_REQUESTS, INVOICES, SALES]);
    set.extend(grants(&[
        (SCOPE_NODES, &[Read]),
        (ROLES, &[Read, Assign]),
        (PRODUCTS, &[Read]),
        (CATEGORIES, &[Read]),
        (WALLET, &[Read, Transfer]),
        (REPORTS, &[Read, View]),
    ]));
    set
}

fn regional_manager() -> BTreeSet<PermissionCode> {
    use Action::*;

    let mut set = read_all(&[SCOPE_NODES, USERS, PRODUCTS, CATEGORIES, INVENTORY, WALLET, INVOICES]);
    set.extend(grants(&[
        (INVENTORY, &[Adjust, Transfer]),
        (STOCK_REQUESTS, &[Create, Read, Approve, Reject]),
        (SALES, &[Read]),
        (REPORTS, &[Read, View]),
    ]));
    set
}

fn employee() -> BTreeSet<PermissionCode> {
    use Action::*;

    let mut set = read_all(&[PRODUCTS, CATEGORIES, INVENTORY]);
    set.extend(grants(&[
        (STOCK_REQUESTS, &[Create, Read]),
        (SALES, &[Create, Read]),
        (INVOICES, &[Read, Print]),
    ]));
    set
}

/// Generates the role to permission grant matrix.
///
/// The super-admin role gets every generated code, `SUPER_ADMIN` included.
/// Other roles get hand-curated subsets.
pub fn generate_grant_matrix() -> GrantMatrix {
    use Action::*;

    let mut matrix = GrantMatrix::new();
    let code = |value: &str| RoleCode::from_string(value.to_string());

    matrix.insert(
        code(SUPER_ADMIN_ROLE),
        generate_permissions().into_iter().map(|p| p.code).collect(),
    );

    matrix.insert(code("Cadmin"), full(&MODULES));

    let mut company_manager = read_all(&MODULES);
    company_manager.extend(grants(&[
        (PRODUCTS, &[Create, Update]),
        (CATEGORIES, &[Create, Update]),
        (INVENTORY, &[Create, Update, Adjust, Transfer]),
        (STOCK_REQUESTS, &[Create, Update, Approve, Reject]),
        (INVOICES, &[Print]),
        (REPORTS, &[View]),
    ]));
    matrix.insert(code("Cmanager"), company_manager);

    let mut company_employee = employee();
    company_employee.extend(read_all(&[SCOPE_NODES, REPORTS]));
    matrix.insert(code("Cemployee"), company_employee);

    for admin in ["Sadmin", "Dadmin"] {
        matrix.insert(code(admin), regional_admin());
    }
    for manager in ["Smanager", "Dmanager"] {
        matrix.insert(code(manager), regional_manager());
    }

    let mut local_admin = full(&[INVENTORY, SALES, INVOICES]);
    local_admin.extend(grants(&[
        (USERS, &[Create, Read, Update, Activate]),
        (PRODUCTS, &[Read]),
        (CATEGORIES, &[Read]),
        (STOCK_REQUESTS, &[Create, Read, Update, Fulfill]),
        (WALLET, &[Read, ConfirmPayment]),
        (REPORTS, &[View]),
    ]));
    matrix.insert(code("Ladmin"), local_admin);

    let mut local_manager = employee();
    local_manager.extend(grants(&[
        (INVENTORY, &[Update, Adjust]),
        (STOCK_REQUESTS, &[Fulfill]),
        (SALES, &[Update]),
        (INVOICES, &[Create]),
        (WALLET, &[Read]),
    ]));
    matrix.insert(code("Lmanager"), local_manager);

    for staff in ["Semployee", "Demployee", "Lemployee"] {
        matrix.insert(code(staff), employee());
    }

    matrix
}

/// Permissions, roles and grants that persisted tables are reconciled to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    permissions: Vec<Permission>,
    roles: Vec<Role>,
    grants: GrantMatrix,
}

impl Catalog {
    /// Builds a catalog from explicit parts.
    pub fn new(permissions: Vec<Permission>, roles: Vec<Role>, grants: GrantMatrix) -> Self {
        Self {
            permissions,
            roles,
            grants,
        }
    }

    /// The built-in retail catalog.
    pub fn standard() -> Self {
        Self::new(generate_permissions(), generate_roles(), generate_grant_matrix())
    }

    /// Catalog permissions in declaration order.
    pub fn permissions(&self) -> &[Permission] {
        &self.permissions
    }

    /// Catalog roles in declaration order.
    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    /// The grant matrix.
    pub fn grants(&self) -> &GrantMatrix {
        &self.grants
    }

    /// Returns whether `code` is a catalog permission.
    pub fn contains_permission(&self, code: &str) -> bool {
        self.permissions.iter().any(|p| p.code.as_str() == code)
    }

    /// Checks that codes are unique and that every matrix entry names a
    /// catalog permission.
    pub fn validate(&self) -> Result<()> {
        let mut codes = HashSet::with_capacity(self.permissions.len());
        for permission in &self.permissions {
            if !codes.insert(permission.code.as_str()) {
                return Err(Error::InvalidPermission(format!(
                    "duplicate permission code {}",
                    permission.code
                )));
            }
        }

        let mut role_codes = HashSet::with_capacity(self.roles.len());
        for role in &self.roles {
            if !role_codes.insert(role.code.as_str()) {
                return Err(Error::InvalidId(format!("duplicate role code {}", role.code)));
            }
        }

        for (role, permissions) in &self.grants {
            if let Some(missing) = permissions.iter().find(|p| !codes.contains(p.as_str())) {
                return Err(Error::CatalogInconsistency {
                    role: role.clone(),
                    permission: missing.clone(),
                });
            }
        }
        Ok(())
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::standard()
    }
}
