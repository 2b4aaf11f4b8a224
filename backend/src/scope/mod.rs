// backend/src/scope/mod.rs

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{CoreError, CoreResult};
use crate::models::{Agent, AgentRole, Role};
use crate::report::filters::ReportFilters;
use crate::store::Store;

pub mod area_tree;

pub use area_tree::{ensure_forest, AreaTree};

// ───────────────────────────────────────
// Caller
// ───────────────────────────────────────
#[derive(Debug, Clone)]
pub struct Caller {
    pub agent: Agent,
    pub roles: Vec<AgentRole>,
}

impl Caller {
    pub fn id(&self) -> i64 {
        self.agent.id
    }

    pub fn area_id(&self) -> Option<i64> {
        self.agent.area_id
    }

    /// Highest authority among the caller's assignments; plain agent when
    /// nothing is assigned.
    pub fn role(&self) -> Role {
        self.roles.iter().map(|r| r.role).max().unwrap_or(Role::Agente)
    }

    /// Area of the earliest role assignment that carries one.
    pub fn first_scoped_area(&self) -> Option<i64> {
        self.roles
            .iter()
            .filter(|r| r.area_id.is_some())
            .min_by_key(|r| r.id)
            .and_then(|r| r.area_id)
    }
}

// ───────────────────────────────────────
// Scope
// ───────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaScope {
    Unbounded,
    Areas(BTreeSet<i64>),
}

impl AreaScope {
    pub fn contains(&self, area_id: Option<i64>) -> bool {
        match self {
            Self::Unbounded => true,
            Self::Areas(set) => area_id.map_or(false, |a| set.contains(&a)),
        }
    }

    /// Explicit id list, or `None` when unbounded.
    pub fn ids(&self) -> Option<Vec<i64>> {
        match self {
            Self::Unbounded => None,
            Self::Areas(set) => Some(set.iter().copied().collect()),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Areas(set) if set.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Scope {
    pub role: Role,
    pub area_scope: AreaScope,
    /// Agent restriction from the filters (or the caller alone for `agente`).
    pub agent_ids: Option<Vec<i64>>,
    /// The caller may only see themselves, whatever their area.
    pub self_only: bool,
}

impl Scope {
    pub fn admits(&self, agent: &Agent) -> bool {
        let listed = self.agent_ids.as_ref().map_or(true, |ids| ids.contains(&agent.id));
        if self.self_only {
            return listed;
        }
        listed && self.area_scope.contains(agent.area_id)
    }
}

/// Reads and writes are scoped differently for `agente_avanzado`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

fn effective_role(role: Role, access: Access) -> Role {
    match (role, access) {
        (Role::AgenteAvanzado, Access::Read) => Role::Jefatura,
        (Role::AgenteAvanzado, Access::Write) => Role::Agente,
        (r, _) => r,
    }
}

// ───────────────────────────────────────
// Resolver
// ───────────────────────────────────────
pub struct ScopeResolver<'a> {
    store: &'a dyn Store,
}

impl<'a> ScopeResolver<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    pub async fn load_caller(&self, agent_id: i64) -> CoreResult<Caller> {
        let agent = self
            .store
            .get_agent(agent_id)
            .await?
            .filter(|a| a.active)
            .ok_or_else(|| CoreError::not_found(format!("agent {agent_id} not found or inactive")))?;
        let roles = self.store.roles_of(agent_id).await?;
        Ok(Caller { agent, roles })
    }

    /// Filter agents, loaded and checked for existence and `active`.
    async fn filter_agents(&self, filters: &ReportFilters) -> CoreResult<Vec<Agent>> {
        let Some(ids) = filters.agent.as_deref() else {
            return Ok(Vec::new());
        };
        let by_id: HashMap<i64, Agent> = self
            .store
            .agents_by_ids(ids)
            .await?
            .into_iter()
            .map(|a| (a.id, a))
            .collect();
        ids.iter()
            .map(|id| match by_id.get(id) {
                Some(a) if a.active => Ok(a.clone()),
                _ => Err(CoreError::not_found(format!("agent {id} not found or inactive"))),
            })
            .collect()
    }

    pub async fn resolve(&self, caller: &Caller, filters: &ReportFilters, access: Access) -> CoreResult<Scope> {
        let role = effective_role(caller.role(), access);
        let agents = self.filter_agents(filters).await?;
        let deny = |msg: String| {
            warn!(caller = caller.id(), role = %role, "{msg}");
            CoreError::PermissionDenied(msg)
        };

        let scope = match role {
            Role::Agente | Role::AgenteAvanzado => {
                if filters.area.is_some() {
                    return Err(deny("agents cannot filter by area".into()));
                }
                if let Some(other) = agents.iter().find(|a| a.id != caller.id()) {
                    return Err(deny(format!("agent {} is outside the caller's scope", other.id)));
                }
                Scope {
                    role,
                    area_scope: AreaScope::Areas(caller.area_id().into_iter().collect()),
                    agent_ids: Some(vec![caller.id()]),
                    self_only: true,
                }
            }
            Role::Jefatura => {
                let own = caller.area_id().ok_or_else(|| deny("no area assigned".into()))?;
                if let Some(area) = filters.area.iter().flatten().find(|&&a| a != own) {
                    return Err(deny(format!("area {area} is outside the caller's area")));
                }
                if let Some(a) = agents.iter().find(|a| a.area_id != Some(own)) {
                    return Err(deny(format!("agent {} is outside the caller's area", a.id)));
                }
                Scope {
                    role,
                    area_scope: AreaScope::Areas(BTreeSet::from([own])),
                    agent_ids: filters.agent.clone(),
                    self_only: false,
                }
            }
            Role::Director => {
                let own = caller.area_id().ok_or_else(|| deny("no area assigned".into()))?;
                let tree = self.area_tree().await?;
                let subtree = tree.descendants(own)?;
                let area_scope = match filters.area.as_deref() {
                    Some(requested) => {
                        if let Some(area) = requested.iter().find(|a| !subtree.contains(*a)) {
                            return Err(deny(format!("area {area} is outside the caller's subtree")));
                        }
                        tree.descendants_of_all(requested)?
                    }
                    None => subtree,
                };
                if let Some(a) = agents.iter().find(|a| !a.area_id.map_or(false, |x| area_scope.contains(&x))) {
                    return Err(deny(format!("agent {} is outside the caller's subtree", a.id)));
                }
                Scope {
                    role,
                    area_scope: AreaScope::Areas(area_scope),
                    agent_ids: filters.agent.clone(),
                    self_only: false,
                }
            }
            Role::Administrator => {
                let area_scope = match filters.area.as_deref() {
                    Some(requested) => {
                        let tree = self.area_tree().await?;
                        if let Some(area) = requested.iter().find(|&&a| !tree.is_active(a)) {
                            return Err(CoreError::not_found(format!("area {area} not found or inactive")));
                        }
                        AreaScope::Areas(tree.descendants_of_all(requested)?)
                    }
                    None => AreaScope::Unbounded,
                };
                if let Some(a) = agents.iter().find(|a| !area_scope.contains(a.area_id)) {
                    return Err(CoreError::invalid_filter(format!(
                        "agent {} does not belong to the requested areas",
                        a.id
                    )));
                }
                Scope {
                    role,
                    area_scope,
                    agent_ids: filters.agent.clone(),
                    self_only: false,
                }
            }
        };

        debug!(caller = caller.id(), role = %role, area_scope = ?scope.area_scope, "scope resolved");
        Ok(scope)
    }

    async fn area_tree(&self) -> CoreResult<AreaTree> {
        let areas = self.store.list_areas().await?;
        AreaTree::build(&areas)
    }

    /// Each `(index, agent_id)` must name an agent whose supervisor is the
    /// caller. The first offender is reported with its index.
    pub async fn ensure_direct_subordinates(&self, caller: &Caller, items: &[(usize, i64)]) -> CoreResult<()> {
        let subordinates: BTreeSet<i64> = self.store.direct_subordinates(caller.id()).await?.into_iter().collect();
        for &(index, agent_id) in items {
            if !subordinates.contains(&agent_id) {
                warn!(caller = caller.id(), agent_id, index, "planning for a non-subordinate");
                return Err(CoreError::PermissionDenied(format!(
                    "assignment {index}: agent {agent_id} is not a direct subordinate of the caller"
                )));
            }
        }
        Ok(())
    }
}
