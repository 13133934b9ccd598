//! Policy names to permission requirements.
//!
//! Code-shaped names (`PRODUCTS_READ`) resolve to a requirement for that
//! code, but only when the code is in the catalog the registry was built
//! from. Anything else must be registered by name first.

use crate::catalog::Catalog;
use crate::error::{Error, Result};
use crate::permission::{PermissionCode, is_code_shaped};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// A request's permission requirement.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Requirement {
    permission: PermissionCode,
}

impl Requirement {
    /// Requires `permission`.
    pub fn new(permission: PermissionCode) -> Self {
        Self { permission }
    }

    /// The required permission code.
    pub fn permission(&self) -> &PermissionCode {
        &self.permission
    }
}

impl From<PermissionCode> for Requirement {
    fn from(permission: PermissionCode) -> Self {
        Self::new(permission)
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.permission, f)
    }
}

/// Closed registry of policy names.
#[derive(Debug, Clone, Default)]
pub struct PolicyRegistry {
    known: HashSet<PermissionCode>,
    named: HashMap<String, Requirement>,
}

impl PolicyRegistry {
    /// Registers every permission code of `catalog`.
    pub fn from_catalog(catalog: &Catalog) -> Self {
        Self {
            known: catalog
                .permissions()
                .iter()
                .map(|p| p.code.clone())
                .collect(),
            named: HashMap::new(),
        }
    }

    /// Registers a named policy. Fails when the requirement's code is not a
    /// catalog permission or the name collides with a permission code.
    pub fn register(&mut self, name: impl Into<String>, requirement: Requirement) -> Result<()> {
        let name = name.into();
        if is_code_shaped(&name) {
            return Err(Error::UnknownPolicy(format!(
                "{name} is shaped like a permission code and cannot be a named policy"
            )));
        }
        if !self.known.contains(requirement.permission()) {
            return Err(Error::UnknownPolicy(format!(
                "{name} requires unknown permission {}",
                requirement.permission()
            )));
        }
        self.named.insert(name, requirement);
        Ok(())
    }

    /// Resolves a policy name.
    pub fn resolve(&self, name: &str) -> Result<Requirement> {
        if is_code_shaped(name) {
            return self
                .known
                .get(name)
                .cloned()
                .map(Requirement::new)
                .ok_or_else(|| Error::UnknownPolicy(name.to_string()));
        }
        self.named
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownPolicy(name.to_string()))
    }

    /// Returns whether `code` is a registered permission code.
    pub fn is_known(&self, code: &str) -> bool {
        self.known.contains(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> PolicyRegistry {
        PolicyRegistry::from_catalog(&Catalog::standard())
    }

    #[test]
    fn resolve_should_synthesize_catalog_codes() {
        let requirement = registry().resolve("PRODUCTS_READ").unwrap();
        assert_eq!(requirement.permission().as_str(), "PRODUCTS_READ");

        let requirement = registry().resolve("STOCK_REQUESTS_APPROVE").unwrap();
        assert_eq!(requirement.to_string(), "STOCK_REQUESTS_APPROVE");
    }

    #[test]
    fn resolve_should_reject_unknown_codes() {
        let result = registry().resolve("ANYTHING_DELETE");
        assert!(matches!(result, Err(Error::UnknownPolicy(_))));
    }

    #[test]
    fn resolve_should_fall_back_to_named_policies() {
        let mut registry = registry();
        registry
            .register(
                "CanSell",
                Requirement::new(PermissionCode::try_from("SALES_CREATE").unwrap()),
            )
            .unwrap();

        assert_eq!(
            registry.resolve("CanSell").unwrap().permission().as_str(),
            "SALES_CREATE"
        );
        assert!(registry.resolve("CanRefund").is_err());
    }

    #[test]
    fn single_token_names_should_be_registrable() {
        let mut registry = registry();
        registry
            .register(
                "CASHIER",
                Requirement::new(PermissionCode::try_from("SALES_CREATE").unwrap()),
            )
            .unwrap();

        assert_eq!(
            registry.resolve("CASHIER").unwrap().permission().as_str(),
            "SALES_CREATE"
        );
        assert!(matches!(
            registry.resolve("ADMIN"),
            Err(Error::UnknownPolicy(_))
        ));
    }

    #[test]
    fn register_should_reject_unknown_or_code_shaped_names() {
        let mut registry = registry();

        let unknown = registry.register(
            "CanFly",
            Requirement::new(PermissionCode::try_from("PLANES_FLY").unwrap()),
        );
        assert!(unknown.is_err());

        let shaped = registry.register(
            "PRODUCTS_BROWSE",
            Requirement::new(PermissionCode::try_from("PRODUCTS_READ").unwrap()),
        );
        assert!(shaped.is_err());
    }
}
