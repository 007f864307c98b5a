//! Per-tick orchestration: index rebuild, neighbour fan-out, formation targets.

use horde_index::{BoundingCircle, QuadTree, Vec2, wrap_signed_angle};
use ordered_float::OrderedFloat;
use rand::{Rng, rngs::SmallRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use std::collections::VecDeque;
use std::f32::consts::{PI, TAU};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace, warn};

use crate::agent::{AgentArena, AgentData, AgentState, FormationAgent, RoleClass};
use crate::manager::FormationManager;
use crate::pattern::{FormationKind, FormationPattern, SlotOffset};
use crate::{AgentId, FormationId, HordeConfig, Tick, WorldStateError};

/// Where a formation reads its anchor pose each tick.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum FormationAnchor {
    /// The player pose passed to [`WorldState::step`].
    Player,
    /// Position and heading of a live agent. Targets are not pushed while the
    /// leader is missing.
    Leader(AgentId),
    /// A constant pose.
    Fixed(SlotOffset),
}

/// Aggregate counters captured at the end of every tick.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TickSummary {
    pub tick: Tick,
    pub agent_count: usize,
    /// Agents accepted by the spatial index this tick.
    pub indexed: usize,
    /// Agents left out of the index because they were outside the play area.
    pub dropped: usize,
    /// Total neighbour entries gathered across all agents.
    pub neighbor_links: usize,
    pub formations: usize,
    pub targets_pushed: usize,
    /// Formation members without a slot.
    pub unassigned: usize,
}

#[derive(Debug)]
struct FormationEntry {
    manager: FormationManager,
    anchor: FormationAnchor,
}

/// Simulation state: live agents, the spatial index and every formation.
pub struct WorldState {
    config: HordeConfig,
    tick: Tick,
    rng: SmallRng,
    agents: AgentArena,
    index: QuadTree<AgentId>,
    formations: SlotMap<FormationId, FormationEntry>,
    history: VecDeque<TickSummary>,
}

impl fmt::Debug for WorldState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorldState")
            .field("config", &self.config)
            .field("tick", &self.tick)
            .field("agent_count", &self.agents.len())
            .field("formation_count", &self.formations.len())
            .finish()
    }
}

impl WorldState {
    /// Instantiate a new world using the supplied configuration.
    pub fn new(config: HordeConfig) -> Result<Self, WorldStateError> {
        config.validate()?;
        let index = QuadTree::new(config.play_area(), config.node_capacity)?;
        let rng = config.seeded_rng();
        let history_capacity = config.history_capacity;
        Ok(Self {
            agents: AgentArena::with_capacity(config.agent_limit),
            config,
            tick: Tick::zero(),
            rng,
            index,
            formations: SlotMap::with_key(),
            history: VecDeque::with_capacity(history_capacity),
        })
    }

    /// Returns an immutable reference to configuration.
    #[must_use]
    pub fn config(&self) -> &HordeConfig {
        &self.config
    }

    /// Current simulation tick.
    #[must_use]
    pub const fn tick(&self) -> Tick {
        self.tick
    }

    /// Iterate over retained tick summaries.
    pub fn history(&self) -> impl Iterator<Item = &TickSummary> {
        self.history.iter()
    }

    /// Read-only access to the agent arena.
    #[must_use]
    pub fn agents(&self) -> &AgentArena {
        &self.agents
    }

    /// Mutable access to the agent arena.
    ///
    /// Agents removed through this handle are dropped from their formations on
    /// the next [`WorldState::step`].
    #[must_use]
    pub fn agents_mut(&mut self) -> &mut AgentArena {
        &mut self.agents
    }

    #[must_use]
    pub fn agent(&self, id: AgentId) -> Option<&AgentState> {
        self.agents.get(id)
    }

    /// Number of live agents.
    #[must_use]
    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    /// Neighbours gathered for `id` on the last tick, nearest first.
    #[must_use]
    pub fn neighbors(&self, id: AgentId) -> Option<&[AgentId]> {
        self.agents.get(id).map(|agent| agent.neighbors.as_slice())
    }

    /// The spatial index as rebuilt on the last tick.
    #[must_use]
    pub fn index(&self) -> &QuadTree<AgentId> {
        &self.index
    }

    /// Agents indexed on the last tick whose colliders intersect `range`.
    #[must_use]
    pub fn query_range(&self, range: &BoundingCircle) -> Vec<AgentId> {
        self.index.query(range)
    }

    /// Spawn a new agent, returning its handle.
    pub fn spawn_agent(&mut self, data: AgentData) -> Result<AgentId, WorldStateError> {
        if self.agents.len() >= self.config.agent_limit {
            return Err(WorldStateError::PopulationLimit {
                limit: self.config.agent_limit,
            });
        }
        Ok(self.agents.insert(data))
    }

    /// Spawn up to `spawn_batch` agents on a ring of `spawn_radius` around
    /// `center`, facing inward with random roles.
    ///
    /// Fails only when the population is already at its limit; otherwise the
    /// batch is trimmed to fit.
    pub fn spawn_wave(&mut self, center: Vec2) -> Result<Vec<AgentId>, WorldStateError> {
        let room = self.config.agent_limit.saturating_sub(self.agents.len());
        if room == 0 {
            return Err(WorldStateError::PopulationLimit {
                limit: self.config.agent_limit,
            });
        }
        let count = self.config.spawn_batch.min(room);
        let area = self.config.play_area();
        let mut spawned = Vec::with_capacity(count);
        for _ in 0..count {
            let angle = self.rng.random_range(0.0..TAU);
            let role = RoleClass::ALL[self.rng.random_range(0..RoleClass::ALL.len())];
            let position =
                area.clamp_point(center + Vec2::from_angle(angle) * self.config.spawn_radius);
            let data = AgentData::new(
                position,
                wrap_signed_angle(angle + PI),
                self.config.agent_radius,
                role,
            );
            spawned.push(self.agents.insert(data));
        }
        debug!(count, center_x = center.x, center_y = center.y, "spawned wave");
        Ok(spawned)
    }

    /// Remove an agent, leaving its formation first.
    pub fn remove_agent(&mut self, id: AgentId) -> Option<AgentState> {
        let removed = self.agents.remove(id)?;
        if let Some(entry) = removed
            .formation
            .and_then(|formation| self.formations.get_mut(formation))
        {
            entry.manager.remove_character(id);
        }
        Some(removed)
    }

    /// Remove every agent; formations stay but become empty.
    pub fn clear_agents(&mut self) {
        self.agents.clear();
        self.index.clear();
        for entry in self.formations.values_mut() {
            entry.manager.clear();
        }
    }

    /// Create an empty formation of a built-in kind.
    pub fn create_formation(
        &mut self,
        kind: FormationKind,
        anchor: FormationAnchor,
    ) -> FormationId {
        let pattern = kind.pattern(self.config.circle_agent_radius);
        self.create_formation_with(pattern, anchor)
    }

    /// Create an empty formation driven by `pattern`.
    pub fn create_formation_with(
        &mut self,
        pattern: Arc<dyn FormationPattern>,
        anchor: FormationAnchor,
    ) -> FormationId {
        let manager = FormationManager::new(pattern, self.config.formation_config());
        let id = self.formations.insert(FormationEntry { manager, anchor });
        debug!(formation = ?id, ?anchor, "formation created");
        id
    }

    /// Drop a formation and release its members. Returns how many were released.
    pub fn disband_formation(&mut self, id: FormationId) -> Result<usize, WorldStateError> {
        let entry = self
            .formations
            .remove(id)
            .ok_or(WorldStateError::UnknownFormation(id))?;
        let mut released = 0;
        for member in entry.manager.members() {
            if let Some(agent) = self.agents.get_mut(member.agent) {
                agent.formation = None;
                released += 1;
            }
        }
        debug!(formation = ?id, released, "formation disbanded");
        Ok(released)
    }

    /// Add `agent` to `formation`.
    pub fn join_formation(
        &mut self,
        agent: AgentId,
        formation: FormationId,
    ) -> Result<(), WorldStateError> {
        let state = self
            .agents
            .get(agent)
            .ok_or(WorldStateError::UnknownAgent(agent))?;
        if let Some(current) = state.formation {
            return Err(WorldStateError::AlreadyInFormation {
                agent,
                formation: current,
            });
        }
        let entry = self
            .formations
            .get_mut(formation)
            .ok_or(WorldStateError::UnknownFormation(formation))?;
        if !entry.manager.add_character(state) {
            return Err(WorldStateError::FormationFull(formation));
        }
        if let Some(state) = self.agents.get_mut(agent) {
            state.formation = Some(formation);
        }
        trace!(?agent, ?formation, "joined formation");
        Ok(())
    }

    /// Remove `agent` from whichever formation holds it, returning that formation.
    pub fn leave_formation(
        &mut self,
        agent: AgentId,
    ) -> Result<Option<FormationId>, WorldStateError> {
        let state = self
            .agents
            .get_mut(agent)
            .ok_or(WorldStateError::UnknownAgent(agent))?;
        let Some(formation) = state.formation.take() else {
            return Ok(None);
        };
        if let Some(entry) = self.formations.get_mut(formation) {
            entry.manager.remove_character(agent);
        }
        trace!(?agent, ?formation, "left formation");
        Ok(Some(formation))
    }

    #[must_use]
    pub fn formation(&self, id: FormationId) -> Option<&FormationManager> {
        self.formations.get(id).map(|entry| &entry.manager)
    }

    /// Mutable access to a formation's manager, e.g. to change its cost limit.
    #[must_use]
    pub fn formation_mut(&mut self, id: FormationId) -> Option<&mut FormationManager> {
        self.formations.get_mut(id).map(|entry| &mut entry.manager)
    }

    #[must_use]
    pub fn formation_anchor(&self, id: FormationId) -> Option<FormationAnchor> {
        self.formations.get(id).map(|entry| entry.anchor)
    }

    pub fn set_formation_anchor(
        &mut self,
        id: FormationId,
        anchor: FormationAnchor,
    ) -> Result<(), WorldStateError> {
        let entry = self
            .formations
            .get_mut(id)
            .ok_or(WorldStateError::UnknownFormation(id))?;
        entry.anchor = anchor;
        Ok(())
    }

    pub fn formations(&self) -> impl Iterator<Item = (FormationId, &FormationManager)> + '_ {
        self.formations.iter().map(|(id, entry)| (id, &entry.manager))
    }

    #[must_use]
    pub fn formation_count(&self) -> usize {
        self.formations.len()
    }

    fn stage_index(&mut self) -> (usize, usize) {
        let stats = self
            .index
            .rebuild(self.agents.iter().map(|(id, agent)| (id, agent.collider())));
        if stats.dropped > 0 {
            warn!(dropped = stats.dropped, "agents outside the play area were not indexed");
        }
        (stats.inserted, stats.dropped)
    }

    fn stage_sense(&mut self) -> usize {
        let sense_radius = self.config.sense_radius;
        let area = self.index.boundary();
        // Agents the index dropped this tick sense nothing.
        let ranges: Vec<(AgentId, BoundingCircle)> = self
            .agents
            .iter()
            .map(|(id, agent)| (id, agent.collider()))
            .filter(|(_, collider)| area.contains_circle_center(collider))
            .map(|(id, collider)| (id, collider.inflate(sense_radius)))
            .collect();
        let index = &self.index;

        let found: Vec<Vec<AgentId>> = ranges
            .par_iter()
            .map(|(id, range)| {
                let mut hits: Vec<(OrderedFloat<f32>, AgentId)> = Vec::new();
                index.visit_range(range, &mut |other: &AgentId, dist_sq| {
                    if other != id {
                        hits.push((dist_sq, *other));
                    }
                });
                hits.sort_by_key(|&(dist_sq, _)| dist_sq);
                hits.into_iter().map(|(_, other)| other).collect()
            })
            .collect();

        for (_, agent) in self.agents.iter_mut() {
            agent.neighbors.clear();
        }
        let mut links = 0;
        for ((id, _), neighbors) in ranges.iter().zip(found) {
            links += neighbors.len();
            if let Some(agent) = self.agents.get_mut(*id) {
                agent.neighbors = neighbors;
            }
        }
        links
    }

    fn stage_formations(&mut self, player: SlotOffset) -> (usize, usize) {
        let mut pushed = 0;
        let mut unassigned = 0;
        for (id, entry) in &mut self.formations {
            entry.manager.sync_members(&self.agents);
            unassigned += entry.manager.unassigned().count();
            let anchor = match entry.anchor {
                FormationAnchor::Player => player,
                FormationAnchor::Fixed(pose) => pose,
                FormationAnchor::Leader(leader) => match self.agents.get(leader) {
                    Some(agent) => SlotOffset::new(agent.position, agent.heading),
                    None => {
                        debug!(formation = ?id, ?leader, "leader missing; targets left unchanged");
                        continue;
                    }
                },
            };
            pushed += entry.manager.update_slots(anchor, &mut self.agents);
        }
        (pushed, unassigned)
    }

    fn stage_summary(&mut self, summary: TickSummary) {
        if self.history.len() >= self.config.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(summary);
    }

    /// Execute one tick with the player at `player` and return its summary.
    pub fn step(&mut self, player: SlotOffset) -> TickSummary {
        let next_tick = self.tick.next();
        let (indexed, dropped) = self.stage_index();
        let neighbor_links = self.stage_sense();
        let (targets_pushed, unassigned) = self.stage_formations(player);

        let summary = TickSummary {
            tick: next_tick,
            agent_count: self.agents.len(),
            indexed,
            dropped,
            neighbor_links,
            formations: self.formations.len(),
            targets_pushed,
            unassigned,
        };
        trace!(?summary, "tick complete");
        self.stage_summary(summary.clone());
        self.tick = next_tick;
        summary
    }
}
