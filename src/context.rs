//! Identity and per-request inputs to the authorization pipeline.

use crate::permission::PermissionCode;
use crate::types::{CompanyId, RoleCode, ScopeNodeId, UserId};
use std::collections::HashMap;

/// Verified identity of the actor making a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Authenticated user id.
    pub user_id: UserId,
    /// Role markers carried by the credential.
    pub roles: Vec<RoleCode>,
    /// Permission claims carried by the credential. Only consulted for the
    /// super-admin bypass; regular checks go through the store.
    pub permissions: Vec<PermissionCode>,
    /// Home scope node, if any.
    pub scope_node_id: Option<ScopeNodeId>,
    /// Company attached out of band (API-key style actors).
    pub company_id: Option<CompanyId>,
}

impl Identity {
    /// Creates an identity with no roles, claims or scope.
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            roles: Vec::new(),
            permissions: Vec::new(),
            scope_node_id: None,
            company_id: None,
        }
    }

    /// Adds a role marker.
    pub fn with_role(mut self, role: RoleCode) -> Self {
        self.roles.push(role);
        self
    }

    /// Adds a permission claim.
    pub fn with_permission(mut self, permission: PermissionCode) -> Self {
        self.permissions.push(permission);
        self
    }

    /// Sets the home scope node.
    pub fn with_scope_node(mut self, scope_node_id: ScopeNodeId) -> Self {
        self.scope_node_id = Some(scope_node_id);
        self
    }

    /// Sets the side-channel company id.
    pub fn with_company(mut self, company_id: CompanyId) -> Self {
        self.company_id = Some(company_id);
        self
    }

    /// Returns whether the credential carries the role marker.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.as_str() == role)
    }

    /// Returns whether the credential carries the permission claim.
    pub fn has_permission_claim(&self, code: &str) -> bool {
        self.permissions.iter().any(|p| p.as_str() == code)
    }
}

/// Inputs of one inbound request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    identity: Option<Identity>,
    query: HashMap<String, String>,
    route: HashMap<String, String>,
}

impl RequestContext {
    /// A request with no verified identity.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// A request made by `identity`.
    pub fn new(identity: Identity) -> Self {
        Self {
            identity: Some(identity),
            ..Self::default()
        }
    }

    /// Adds a query parameter.
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    /// Adds a route parameter.
    pub fn with_route(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.route.insert(name.into(), value.into());
        self
    }

    /// Replaces the query parameters.
    pub fn with_query_params(mut self, query: HashMap<String, String>) -> Self {
        self.query = query;
        self
    }

    /// Replaces the route parameters.
    pub fn with_route_params(mut self, route: HashMap<String, String>) -> Self {
        self.route = route;
        self
    }

    /// The verified identity, if any.
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// First non-empty value of `name`, query before route.
    pub fn param(&self, name: &str) -> Option<&str> {
        [&self.query, &self.route]
            .into_iter()
            .filter_map(|params| params.get(name))
            .map(|value| value.trim())
            .find(|value| !value.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn param_should_prefer_query_over_route() {
        let request = RequestContext::anonymous()
            .with_query("scopeNodeId", "7")
            .with_route("scopeNodeId", "8");

        assert_eq!(request.param("scopeNodeId"), Some("7"));
    }

    #[test]
    fn param_should_fall_back_when_query_is_blank() {
        let request = RequestContext::anonymous()
            .with_query("scopeNodeId", "  ")
            .with_route("scopeNodeId", "8");

        assert_eq!(request.param("scopeNodeId"), Some("8"));
        assert_eq!(request.param("other"), None);
    }

    #[test]
    fn identity_should_match_markers_exactly() {
        let identity = Identity::new(UserId::new(1))
            .with_role(RoleCode::try_from("SuperAdmin").unwrap())
            .with_permission(PermissionCode::super_admin());

        assert!(identity.has_role("SuperAdmin"));
        assert!(!identity.has_role("superadmin"));
        assert!(identity.has_permission_claim("SUPER_ADMIN"));
    }
}
