//! Scope tree model and the reference reachability traversal.

use crate::error::{Error, Result};
use crate::types::{CompanyId, ScopeNodeId};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

/// Organizational level, ordered from the root down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum ScopeType {
    SuperAdmin = 0,
    Company = 1,
    State = 2,
    District = 3,
    Local = 4,
}

impl ScopeType {
    /// Every level, root first.
    pub const ALL: [ScopeType; 5] = [
        ScopeType::SuperAdmin,
        ScopeType::Company,
        ScopeType::State,
        ScopeType::District,
        ScopeType::Local,
    ];

    /// Stored discriminant.
    pub fn level(self) -> u8 {
        self as u8
    }

    /// Returns whether a node of this type may parent a node of `child` type.
    pub fn can_parent(self, child: ScopeType) -> bool {
        child > self
    }
}

impl TryFrom<u8> for ScopeType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        Self::ALL
            .get(usize::from(value))
            .copied()
            .ok_or_else(|| Error::InvalidScopeNode(format!("unknown scope type {value}")))
    }
}

impl fmt::Display for ScopeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SuperAdmin => "SuperAdmin",
            Self::Company => "Company",
            Self::State => "State",
            Self::District => "District",
            Self::Local => "Local",
        };
        f.write_str(name)
    }
}

/// A node in the organizational hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScopeNode {
    pub id: ScopeNodeId,
    pub scope_type: ScopeType,
    pub company_id: CompanyId,
    pub parent_id: Option<ScopeNodeId>,
    pub is_active: bool,
}

impl ScopeNode {
    /// Creates an active root node (no parent).
    pub fn root(id: ScopeNodeId, scope_type: ScopeType, company_id: CompanyId) -> Self {
        Self {
            id,
            scope_type,
            company_id,
            parent_id: None,
            is_active: true,
        }
    }

    /// Creates an active node under `parent`, inheriting its company.
    pub fn child_of(parent: &ScopeNode, id: ScopeNodeId, scope_type: ScopeType) -> Self {
        Self {
            id,
            scope_type,
            company_id: parent.company_id,
            parent_id: Some(parent.id),
            is_active: true,
        }
    }

    /// Checks the parent-link invariants against the resolved parent.
    ///
    /// Roots may only be super-admin or company nodes. A child must share its
    /// parent's company and sit strictly deeper.
    pub fn validate_parent(&self, parent: Option<&ScopeNode>) -> Result<()> {
        match (self.parent_id, parent) {
            (None, None) => {
                if self.scope_type > ScopeType::Company {
                    return Err(Error::InvalidScopeNode(format!(
                        "{} node {} requires a parent",
                        self.scope_type, self.id
                    )));
                }
                Ok(())
            }
            (Some(parent_id), Some(parent)) if parent.id == parent_id => {
                if parent.company_id != self.company_id {
                    return Err(Error::InvalidScopeNode(format!(
                        "node {} belongs to company {} but parent {} belongs to {}",
                        self.id, self.company_id, parent.id, parent.company_id
                    )));
                }
                if !parent.scope_type.can_parent(self.scope_type) {
                    return Err(Error::InvalidScopeNode(format!(
                        "{} node {} cannot sit under {} node {}",
                        self.scope_type, self.id, parent.scope_type, parent.id
                    )));
                }
                Ok(())
            }
            (Some(parent_id), _) => Err(Error::InvalidScopeNode(format!(
                "parent {parent_id} of node {} does not exist",
                self.id
            ))),
            (None, Some(parent)) => Err(Error::InvalidScopeNode(format!(
                "node {} has no parent id but {} was supplied",
                self.id, parent.id
            ))),
        }
    }
}

/// Breadth-first traversal from `start` over parent-to-child edges.
///
/// The result always contains `start`. Nodes are followed regardless of their
/// active flag; a revisited id ends that branch, so malformed input with a
/// cycle still terminates.
pub fn subtree(nodes: &[ScopeNode], start: ScopeNodeId) -> HashSet<ScopeNodeId> {
    let mut children: HashMap<ScopeNodeId, Vec<ScopeNodeId>> = HashMap::new();
    for node in nodes {
        if let Some(parent) = node.parent_id {
            children.entry(parent).or_default().push(node.id);
        }
    }

    let mut visited = HashSet::from([start]);
    let mut queue = VecDeque::from([start]);
    while let Some(current) = queue.pop_front() {
        let Some(next) = children.get(&current) else {
            continue;
        };
        for &child in next {
            if visited.insert(child) {
                queue.push_back(child);
            }
        }
    }
    visited
}
