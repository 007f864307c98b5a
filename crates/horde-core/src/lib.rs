//! Core types for the horde simulation: agents, formation patterns, the slot
//! assignment engine, and the per-tick world orchestrator.

pub mod agent;
pub mod manager;
pub mod pattern;
pub mod world;

pub use agent::{AgentArena, AgentData, AgentRoster, AgentState, FormationAgent, RoleClass};
pub use horde_index::{
    BoundingBox, BoundingCircle, IndexError, NeighborhoodIndex, QuadTree, Vec2, wrap_signed_angle,
};
pub use manager::{FormationConfig, FormationManager, Member};
pub use pattern::{
    AttackType, BoundedPattern, CircularPattern, CostTable, FormationKind, FormationPattern,
    RoleBasedPattern, RoleSlot, SlotAssignment, SlotOffset,
};
pub use world::{FormationAnchor, TickSummary, WorldState};

use rand::{SeedableRng, rngs::SmallRng};
use serde::{Deserialize, Serialize};
use slotmap::new_key_type;
use thiserror::Error;

new_key_type! {
    /// Stable handle for agents backed by a generational slot map.
    pub struct AgentId;
    /// Stable handle for formation instances.
    pub struct FormationId;
}

/// High level simulation clock (ticks processed since boot).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct Tick(pub u64);

impl Tick {
    /// Returns the next sequential tick.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Resets the tick counter back to zero.
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }
}

/// Errors raised by world and formation bookkeeping.
#[derive(Debug, Error, PartialEq)]
pub enum WorldStateError {
    /// Indicates an invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// Spawning would exceed the configured agent limit.
    #[error("population limit of {limit} agents reached")]
    PopulationLimit { limit: usize },
    #[error("unknown agent {0:?}")]
    UnknownAgent(AgentId),
    #[error("unknown formation {0:?}")]
    UnknownFormation(FormationId),
    /// The formation pattern refused another member.
    #[error("formation {0:?} cannot admit another member")]
    FormationFull(FormationId),
    #[error("agent {agent:?} already belongs to formation {formation:?}")]
    AlreadyInFormation {
        agent: AgentId,
        formation: FormationId,
    },
    #[error(transparent)]
    Index(#[from] IndexError),
}

/// Static configuration for a horde world.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HordeConfig {
    /// Width of the play area in world units; the area is centred on the origin.
    pub world_width: f32,
    /// Height of the play area in world units.
    pub world_height: f32,
    /// Entries a spatial index node holds before it splits.
    pub node_capacity: usize,
    /// Slot costs at or above this value make a slot ineligible.
    pub cost_limit: f32,
    /// Extra radius added to an agent's collider when gathering neighbours.
    pub sense_radius: f32,
    /// Maximum number of live agents.
    pub agent_limit: usize,
    /// Agents spawned per wave.
    pub spawn_batch: usize,
    /// Distance from the wave centre at which agents appear.
    pub spawn_radius: f32,
    /// Collider radius given to spawned agents.
    pub agent_radius: f32,
    /// Per-agent footprint used to size circular formations.
    pub circle_agent_radius: f32,
    /// Optional RNG seed for reproducible worlds.
    pub rng_seed: Option<u64>,
    /// Maximum number of recent tick summaries retained in-memory.
    pub history_capacity: usize,
}

impl Default for HordeConfig {
    fn default() -> Self {
        Self {
            world_width: 2_000.0,
            world_height: 2_000.0,
            node_capacity: 4,
            cost_limit: 1_500.0,
            sense_radius: 8.0,
            agent_limit: 1_000,
            spawn_batch: 25,
            spawn_radius: 600.0,
            agent_radius: 12.0,
            circle_agent_radius: 25.0,
            rng_seed: None,
            history_capacity: 256,
        }
    }
}

impl HordeConfig {
    /// Checks every knob, returning the first offending one.
    pub fn validate(&self) -> Result<(), WorldStateError> {
        let positive = |value: f32| value.is_finite() && value > 0.0;
        if !positive(self.world_width) || !positive(self.world_height) {
            return Err(WorldStateError::InvalidConfig(
                "world dimensions must be positive",
            ));
        }
        if self.node_capacity == 0 {
            return Err(WorldStateError::InvalidConfig(
                "node_capacity must be non-zero",
            ));
        }
        if !positive(self.cost_limit) {
            return Err(WorldStateError::InvalidConfig("cost_limit must be positive"));
        }
        if !self.sense_radius.is_finite() || self.sense_radius < 0.0 {
            return Err(WorldStateError::InvalidConfig(
                "sense_radius must be non-negative",
            ));
        }
        if !positive(self.agent_radius) || !positive(self.circle_agent_radius) {
            return Err(WorldStateError::InvalidConfig(
                "agent_radius and circle_agent_radius must be positive",
            ));
        }
        if !self.spawn_radius.is_finite() || self.spawn_radius < 0.0 {
            return Err(WorldStateError::InvalidConfig(
                "spawn_radius must be non-negative",
            ));
        }
        if self.history_capacity == 0 {
            return Err(WorldStateError::InvalidConfig(
                "history_capacity must be non-zero",
            ));
        }
        Ok(())
    }

    /// Root boundary for the spatial index.
    #[must_use]
    pub fn play_area(&self) -> BoundingBox {
        BoundingBox::from_center_size(Vec2::ZERO, self.world_width, self.world_height)
    }

    /// Settings handed to each formation manager.
    #[must_use]
    pub fn formation_config(&self) -> FormationConfig {
        FormationConfig {
            cost_limit: self.cost_limit,
        }
    }

    /// Returns the configured RNG seed, generating one from entropy if absent.
    fn seeded_rng(&self) -> SmallRng {
        match self.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::seed_from_u64(rand::random()),
        }
    }
}
