//! Formation patterns: where slots sit relative to the anchor and how well each
//! role fits each slot.

use horde_index::{Vec2, wrap_signed_angle};
use serde::{Deserialize, Serialize};
use std::f32::consts::{PI, TAU};
use std::fmt;
use std::sync::Arc;

use crate::AgentId;
use crate::agent::RoleClass;

/// Position and orientation of a slot relative to a formation anchor.
///
/// Also used for the anchor pose itself.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct SlotOffset {
    pub position: Vec2,
    pub orientation: f32,
}

impl SlotOffset {
    #[must_use]
    pub const fn new(position: Vec2, orientation: f32) -> Self {
        Self {
            position,
            orientation,
        }
    }
}

/// An agent occupying a slot. Holds only the agent's identity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SlotAssignment {
    pub agent: AgentId,
    pub slot: usize,
}

/// Kind of attack a role-based slot is laid out for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AttackType {
    Magic,
    Melee,
    Missile,
}

impl AttackType {
    pub const ALL: [Self; 3] = [Self::Magic, Self::Melee, Self::Missile];

    /// Column of this attack type in a [`CostTable`].
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Magic => 0,
            Self::Melee => 1,
            Self::Missile => 2,
        }
    }
}

/// Role × attack-type compatibility costs. Lower is a better fit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CostTable {
    /// Rows indexed by [`RoleClass::index`], columns by [`AttackType::index`].
    pub rows: [[f32; 3]; 3],
}

impl Default for CostTable {
    fn default() -> Self {
        Self {
            rows: [
                // Magic, Melee, Missile
                [1_000.0, 1_500.0, 0.0], // Archer
                [2_000.0, 0.0, 1_500.0], // Fighter
                [0.0, 2_000.0, 500.0],   // Mage
            ],
        }
    }
}

impl CostTable {
    #[must_use]
    pub fn cost(&self, role: RoleClass, attack: AttackType) -> f32 {
        self.rows[role.index()][attack.index()]
    }
}

/// Slot layout and role affinity for one formation shape.
pub trait FormationPattern: fmt::Debug + Send + Sync {
    /// Number of slots the pattern offers for `members` agents.
    fn slot_count(&self, members: usize) -> usize;

    /// Offset of `slot` when the formation has `total_slots` slots.
    fn slot_location(&self, slot: usize, total_slots: usize) -> SlotOffset;

    /// Cost of placing an agent of `role` into `slot`.
    fn slot_cost(&self, role: RoleClass, slot: usize) -> f32;

    /// Whether the pattern can hold `count` members.
    fn supports_slots(&self, _count: usize) -> bool {
        true
    }

    /// Mean offset of the filled slots, position and orientation averaged separately.
    fn drift_offset(&self, assignments: &[SlotAssignment], total_slots: usize) -> SlotOffset {
        if assignments.is_empty() {
            return SlotOffset::default();
        }
        let mut sum = SlotOffset::default();
        for assignment in assignments {
            let location = self.slot_location(assignment.slot, total_slots);
            sum.position += location.position;
            sum.orientation += location.orientation;
        }
        let count = assignments.len() as f32;
        SlotOffset::new(sum.position / count, sum.orientation / count)
    }
}

/// Ring of outward-facing slots, one per member, spaced so footprints of radius
/// `agent_radius` just touch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CircularPattern {
    pub agent_radius: f32,
}

impl CircularPattern {
    #[must_use]
    pub const fn new(agent_radius: f32) -> Self {
        Self { agent_radius }
    }

    /// Ring radius for `total_slots` members.
    #[must_use]
    pub fn ring_radius(&self, total_slots: usize) -> f32 {
        if total_slots < 2 {
            return 0.0;
        }
        self.agent_radius / (PI / total_slots as f32).sin()
    }
}

impl Default for CircularPattern {
    fn default() -> Self {
        Self::new(25.0)
    }
}

impl FormationPattern for CircularPattern {
    fn slot_count(&self, members: usize) -> usize {
        members
    }

    fn slot_location(&self, slot: usize, total_slots: usize) -> SlotOffset {
        if total_slots == 0 {
            return SlotOffset::default();
        }
        let angle = slot as f32 / total_slots as f32 * TAU;
        let position = Vec2::from_angle(angle) * self.ring_radius(total_slots);
        SlotOffset::new(position, wrap_signed_angle(angle))
    }

    fn slot_cost(&self, _role: RoleClass, _slot: usize) -> f32 {
        0.0
    }
}

/// One entry of a role-based slot table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RoleSlot {
    pub offset: SlotOffset,
    pub attack: AttackType,
}

impl RoleSlot {
    #[must_use]
    pub const fn new(x: f32, y: f32, orientation: f32, attack: AttackType) -> Self {
        Self {
            offset: SlotOffset::new(Vec2::new(x, y), orientation),
            attack,
        }
    }
}

/// Fixed slot table where each slot favours an attack type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoleBasedPattern {
    slots: Vec<RoleSlot>,
    costs: CostTable,
}

impl RoleBasedPattern {
    /// Pattern over `slots` with the default cost table.
    #[must_use]
    pub fn new(slots: Vec<RoleSlot>) -> Self {
        Self::with_costs(slots, CostTable::default())
    }

    #[must_use]
    pub fn with_costs(slots: Vec<RoleSlot>, costs: CostTable) -> Self {
        Self { slots, costs }
    }

    /// Nine slots in three ranks facing forward (`-y`): melee in front, missile
    /// in the middle and magic at the rear.
    #[must_use]
    pub fn battle_line() -> Self {
        const SPACING: f32 = 50.0;
        let mut slots = Vec::with_capacity(9);
        for (rank, attack) in [AttackType::Melee, AttackType::Missile, AttackType::Magic]
            .into_iter()
            .enumerate()
        {
            let y = (rank as f32 - 1.0) * SPACING;
            for file in 0..3 {
                let x = (file as f32 - 1.0) * SPACING;
                slots.push(RoleSlot::new(x, y, 0.0, attack));
            }
        }
        Self::new(slots)
    }

    #[must_use]
    pub fn slots(&self) -> &[RoleSlot] {
        &self.slots
    }

    #[must_use]
    pub fn costs(&self) -> &CostTable {
        &self.costs
    }
}

impl Default for RoleBasedPattern {
    fn default() -> Self {
        Self::battle_line()
    }
}

impl FormationPattern for RoleBasedPattern {
    fn slot_count(&self, _members: usize) -> usize {
        self.slots.len()
    }

    fn slot_location(&self, slot: usize, _total_slots: usize) -> SlotOffset {
        debug_assert!(slot < self.slots.len(), "slot {slot} outside role table");
        self.slots.get(slot).map_or_else(SlotOffset::default, |entry| {
            SlotOffset::new(
                entry.offset.position,
                wrap_signed_angle(entry.offset.orientation),
            )
        })
    }

    fn slot_cost(&self, role: RoleClass, slot: usize) -> f32 {
        debug_assert!(slot < self.slots.len(), "slot {slot} outside role table");
        self.slots
            .get(slot)
            .map_or(f32::INFINITY, |entry| self.costs.cost(role, entry.attack))
    }
}

/// Caps another pattern at `max_members`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BoundedPattern<P> {
    pub inner: P,
    pub max_members: usize,
}

impl<P: FormationPattern> BoundedPattern<P> {
    #[must_use]
    pub const fn new(inner: P, max_members: usize) -> Self {
        Self { inner, max_members }
    }
}

impl<P: FormationPattern> FormationPattern for BoundedPattern<P> {
    fn slot_count(&self, members: usize) -> usize {
        self.inner.slot_count(members)
    }

    fn slot_location(&self, slot: usize, total_slots: usize) -> SlotOffset {
        self.inner.slot_location(slot, total_slots)
    }

    fn slot_cost(&self, role: RoleClass, slot: usize) -> f32 {
        self.inner.slot_cost(role, slot)
    }

    fn supports_slots(&self, count: usize) -> bool {
        count <= self.max_members && self.inner.supports_slots(count)
    }

    fn drift_offset(&self, assignments: &[SlotAssignment], total_slots: usize) -> SlotOffset {
        self.inner.drift_offset(assignments, total_slots)
    }
}

/// Built-in formation shapes.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum FormationKind {
    /// [`CircularPattern`]: role-agnostic ring.
    #[default]
    DefensiveCircle,
    /// [`RoleBasedPattern::battle_line`]: ranks keyed by attack type.
    SlotRole,
}

impl FormationKind {
    /// Build the pattern for this kind; `agent_radius` sizes circular rings.
    #[must_use]
    pub fn pattern(self, agent_radius: f32) -> Arc<dyn FormationPattern> {
        match self {
            Self::DefensiveCircle => Arc::new(CircularPattern::new(agent_radius)),
            Self::SlotRole => Arc::new(RoleBasedPattern::battle_line()),
        }
    }
}
