//! Agent records and the capabilities formations need from them.

use horde_index::{BoundingCircle, Vec2};
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

use crate::{AgentId, FormationId};

/// Combat role an agent plays; drives role-based slot costs.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum RoleClass {
    Archer,
    #[default]
    Fighter,
    Mage,
}

impl RoleClass {
    pub const ALL: [Self; 3] = [Self::Archer, Self::Fighter, Self::Mage];

    /// Row of this role in a [`crate::CostTable`].
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Archer => 0,
            Self::Fighter => 1,
            Self::Mage => 2,
        }
    }
}

/// What a formation manager needs from a member.
pub trait FormationAgent {
    /// Stable identity used for membership checks.
    fn id(&self) -> AgentId;

    /// Footprint used by the spatial index.
    fn collider(&self) -> BoundingCircle;

    fn role_class(&self) -> RoleClass;

    fn set_target_position(&mut self, target: Vec2);

    fn set_target_orientation(&mut self, target: f32);
}

/// Lookup from weak agent identities to live agents.
pub trait AgentRoster {
    type Agent: FormationAgent;

    fn agent(&self, id: AgentId) -> Option<&Self::Agent>;

    fn agent_mut(&mut self, id: AgentId) -> Option<&mut Self::Agent>;
}

/// Scalar fields used when spawning an agent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AgentData {
    pub position: Vec2,
    pub heading: f32,
    pub radius: f32,
    pub role: RoleClass,
}

impl AgentData {
    #[must_use]
    pub const fn new(position: Vec2, heading: f32, radius: f32, role: RoleClass) -> Self {
        Self {
            position,
            heading,
            radius,
            role,
        }
    }
}

impl Default for AgentData {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            heading: 0.0,
            radius: 12.0,
            role: RoleClass::default(),
        }
    }
}

/// Live agent record owned by an [`AgentArena`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentState {
    id: AgentId,
    pub position: Vec2,
    pub heading: f32,
    pub radius: f32,
    pub role: RoleClass,
    /// Last position pushed by a formation; starts at the spawn position.
    pub target_position: Vec2,
    /// Last orientation pushed by a formation; starts at the spawn heading.
    pub target_orientation: f32,
    /// Formation this agent currently belongs to.
    pub formation: Option<FormationId>,
    /// Agents whose colliders overlapped this agent's sensing range on the last tick.
    pub neighbors: Vec<AgentId>,
}

impl AgentState {
    fn from_data(id: AgentId, data: AgentData) -> Self {
        Self {
            id,
            position: data.position,
            heading: data.heading,
            radius: data.radius,
            role: data.role,
            target_position: data.position,
            target_orientation: data.heading,
            formation: None,
            neighbors: Vec::new(),
        }
    }

    /// Snapshot of the spawn-time scalar fields at the current position.
    #[must_use]
    pub fn data(&self) -> AgentData {
        AgentData::new(self.position, self.heading, self.radius, self.role)
    }
}

impl FormationAgent for AgentState {
    fn id(&self) -> AgentId {
        self.id
    }

    fn collider(&self) -> BoundingCircle {
        BoundingCircle::new(self.position, self.radius)
    }

    fn role_class(&self) -> RoleClass {
        self.role
    }

    fn set_target_position(&mut self, target: Vec2) {
        self.target_position = target;
    }

    fn set_target_orientation(&mut self, target: f32) {
        self.target_orientation = target;
    }
}

/// Generational storage for live agents.
#[derive(Debug, Default)]
pub struct AgentArena {
    slots: SlotMap<AgentId, AgentState>,
}

impl AgentArena {
    /// Create an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: SlotMap::with_key(),
        }
    }

    /// Create an arena with reserved capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: SlotMap::with_capacity_and_key(capacity),
        }
    }

    /// Number of live agents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Insert a new agent and return its handle.
    pub fn insert(&mut self, data: AgentData) -> AgentId {
        self.slots
            .insert_with_key(|id| AgentState::from_data(id, data))
    }

    /// Remove `id`, returning its record if it was present.
    pub fn remove(&mut self, id: AgentId) -> Option<AgentState> {
        self.slots.remove(id)
    }

    /// Returns true if `id` refers to a live agent.
    #[must_use]
    pub fn contains(&self, id: AgentId) -> bool {
        self.slots.contains_key(id)
    }

    #[must_use]
    pub fn get(&self, id: AgentId) -> Option<&AgentState> {
        self.slots.get(id)
    }

    #[must_use]
    pub fn get_mut(&mut self, id: AgentId) -> Option<&mut AgentState> {
        self.slots.get_mut(id)
    }

    /// Iterate agents in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (AgentId, &AgentState)> + '_ {
        self.slots.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (AgentId, &mut AgentState)> + '_ {
        self.slots.iter_mut()
    }

    /// Live agent handles in slot order.
    pub fn ids(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.slots.keys()
    }

    /// Remove every agent.
    pub fn clear(&mut self) {
        self.slots.clear();
    }
}

impl AgentRoster for AgentArena {
    type Agent = AgentState;

    fn agent(&self, id: AgentId) -> Option<&AgentState> {
        self.slots.get(id)
    }

    fn agent_mut(&mut self, id: AgentId) -> Option<&mut AgentState> {
        self.slots.get_mut(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn archer_at(x: f32, y: f32) -> AgentData {
        AgentData::new(Vec2::new(x, y), 0.5, 10.0, RoleClass::Archer)
    }

    #[test]
    fn insert_allocates_unique_handles() {
        let mut arena = AgentArena::new();
        let a = arena.insert(archer_at(0.0, 0.0));
        let b = arena.insert(archer_at(1.0, 1.0));
        assert_ne!(a, b);
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.get(a).map(FormationAgent::id), Some(a));
        assert_eq!(arena.get(b).map(FormationAgent::id), Some(b));
    }

    #[test]
    fn removed_handles_are_not_reused_immediately() {
        let mut arena = AgentArena::new();
        let a = arena.insert(archer_at(0.0, 0.0));
        let removed = arena.remove(a).expect("agent removed");
        assert_eq!(removed.role, RoleClass::Archer);
        assert!(!arena.contains(a));
        let b = arena.insert(archer_at(2.0, 2.0));
        assert_ne!(a, b, "generational handles should not alias");
        assert!(arena.agent(a).is_none());
    }

    #[test]
    fn new_agents_target_their_spawn_pose() {
        let mut arena = AgentArena::new();
        let id = arena.insert(archer_at(4.0, -3.0));
        let agent = arena.get(id).expect("agent");
        assert_eq!(agent.target_position, Vec2::new(4.0, -3.0));
        assert_eq!(agent.target_orientation, 0.5);
        assert_eq!(
            agent.collider(),
            BoundingCircle::new(Vec2::new(4.0, -3.0), 10.0)
        );
        assert_eq!(agent.data(), archer_at(4.0, -3.0));
    }

    #[test]
    fn target_setters_write_their_own_fields() {
        let mut arena = AgentArena::new();
        let id = arena.insert(archer_at(0.0, 0.0));
        let agent = arena.agent_mut(id).expect("agent");
        agent.set_target_position(Vec2::new(9.0, 9.0));
        agent.set_target_orientation(-1.0);
        assert_eq!(agent.target_position, Vec2::new(9.0, 9.0));
        assert_eq!(agent.target_orientation, -1.0);
    }

    #[test]
    fn role_indices_are_distinct() {
        let mut seen = [false; 3];
        for role in RoleClass::ALL {
            assert!(!seen[role.index()]);
            seen[role.index()] = true;
        }
    }
}
