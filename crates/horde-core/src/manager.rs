//! Slot assignment for a single formation instance.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, trace};

use crate::AgentId;
use crate::agent::{AgentRoster, FormationAgent, RoleClass};
use crate::pattern::{FormationPattern, SlotAssignment, SlotOffset};

/// Per-formation tuning handed in by the owning world.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FormationConfig {
    /// Slots costing this much or more are never assigned.
    pub cost_limit: f32,
}

impl Default for FormationConfig {
    fn default() -> Self {
        Self {
            cost_limit: 1_500.0,
        }
    }
}

/// A tracked member: identity plus the role last read from its agent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Member {
    pub agent: AgentId,
    pub role: RoleClass,
}

struct Candidate {
    member: usize,
    ease: OrderedFloat<f32>,
    options: Vec<(usize, OrderedFloat<f32>)>,
}

/// Maps members onto pattern slots and turns slots into absolute targets.
///
/// Membership changes rerun the greedy assignment immediately; target pushing
/// happens once per tick through [`FormationManager::update_slots`].
#[derive(Debug, Clone)]
pub struct FormationManager {
    pattern: Arc<dyn FormationPattern>,
    config: FormationConfig,
    members: Vec<Member>,
    assignments: Vec<SlotAssignment>,
    slot_count: usize,
    drift: SlotOffset,
}

impl FormationManager {
    #[must_use]
    pub fn new(pattern: Arc<dyn FormationPattern>, config: FormationConfig) -> Self {
        let slot_count = pattern.slot_count(0);
        Self {
            pattern,
            config,
            members: Vec::new(),
            assignments: Vec::new(),
            slot_count,
            drift: SlotOffset::default(),
        }
    }

    #[must_use]
    pub fn pattern(&self) -> &Arc<dyn FormationPattern> {
        &self.pattern
    }

    #[must_use]
    pub fn config(&self) -> FormationConfig {
        self.config
    }

    #[must_use]
    pub fn cost_limit(&self) -> f32 {
        self.config.cost_limit
    }

    /// Change the eligibility threshold and reassign.
    pub fn set_cost_limit(&mut self, cost_limit: f32) {
        self.config.cost_limit = cost_limit;
        self.update_slot_assignments();
    }

    /// Every tracked member, assigned or not.
    #[must_use]
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    #[must_use]
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Current assignments, ordered by slot.
    #[must_use]
    pub fn slot_assignments(&self) -> &[SlotAssignment] {
        &self.assignments
    }

    /// Slots offered by the pattern for the current membership.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    #[must_use]
    pub fn drift_offset(&self) -> SlotOffset {
        self.drift
    }

    #[must_use]
    pub fn contains(&self, agent: AgentId) -> bool {
        self.members.iter().any(|member| member.agent == agent)
    }

    /// Slot currently held by `agent`, if any.
    #[must_use]
    pub fn slot_of(&self, agent: AgentId) -> Option<usize> {
        self.assignments
            .iter()
            .find(|assignment| assignment.agent == agent)
            .map(|assignment| assignment.slot)
    }

    /// Members that did not receive a slot in the last assignment pass.
    pub fn unassigned(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.members
            .iter()
            .map(|member| member.agent)
            .filter(|agent| self.slot_of(*agent).is_none())
    }

    /// Track `agent` and reassign. Returns `false` without mutating when the
    /// agent is already a member or the pattern cannot hold another one.
    pub fn add_character<A>(&mut self, agent: &A) -> bool
    where
        A: FormationAgent + ?Sized,
    {
        let id = agent.id();
        if self.contains(id) || !self.pattern.supports_slots(self.members.len() + 1) {
            return false;
        }
        self.members.push(Member {
            agent: id,
            role: agent.role_class(),
        });
        self.update_slot_assignments();
        true
    }

    /// Stop tracking `agent` and reassign. Returns `false` if it was not a member.
    pub fn remove_character(&mut self, agent: AgentId) -> bool {
        let Some(position) = self.members.iter().position(|member| member.agent == agent) else {
            return false;
        };
        self.members.swap_remove(position);
        self.update_slot_assignments();
        true
    }

    /// Drop members whose agent no longer resolves in `roster` and pick up role
    /// changes on the rest, reassigning if either happened. Returns how many went.
    pub fn sync_members<R>(&mut self, roster: &R) -> usize
    where
        R: AgentRoster + ?Sized,
    {
        let before = self.members.len();
        let mut roles_changed = 0usize;
        self.members.retain_mut(|member| match roster.agent(member.agent) {
            Some(agent) => {
                let role = agent.role_class();
                if role != member.role {
                    member.role = role;
                    roles_changed += 1;
                }
                true
            }
            None => false,
        });
        let removed = before - self.members.len();
        if removed > 0 || roles_changed > 0 {
            debug!(
                removed,
                roles_changed,
                remaining = self.members.len(),
                "formation members synced"
            );
            self.update_slot_assignments();
        }
        removed
    }

    /// Forget every member.
    pub fn clear(&mut self) {
        self.members.clear();
        self.update_slot_assignments();
    }

    /// Greedy assignment: members with the fewest cheap options choose first and
    /// take their cheapest unclaimed eligible slot.
    pub fn update_slot_assignments(&mut self) {
        let slot_count = self.pattern.slot_count(self.members.len());
        let limit = self.config.cost_limit;

        let mut candidates: Vec<Candidate> = self
            .members
            .iter()
            .enumerate()
            .map(|(member, entry)| {
                let mut options: Vec<(usize, OrderedFloat<f32>)> = (0..slot_count)
                    .filter_map(|slot| {
                        let cost = self.pattern.slot_cost(entry.role, slot);
                        (cost < limit).then_some((slot, OrderedFloat(cost)))
                    })
                    .collect();
                options.sort_by_key(|&(_, cost)| cost);
                let ease: f32 = options
                    .iter()
                    .map(|&(_, cost)| 1.0 / (1.0 + cost.into_inner()))
                    .sum();
                Candidate {
                    member,
                    ease: OrderedFloat(ease),
                    options,
                }
            })
            .collect();
        candidates.sort_by_key(|candidate| candidate.ease);

        let mut claimed = vec![false; slot_count];
        let mut assignments = Vec::with_capacity(self.members.len().min(slot_count));
        for candidate in &candidates {
            let agent = self.members[candidate.member].agent;
            let choice = candidate
                .options
                .iter()
                .map(|&(slot, _)| slot)
                .find(|&slot| !claimed[slot]);
            match choice {
                Some(slot) => {
                    claimed[slot] = true;
                    assignments.push(SlotAssignment { agent, slot });
                }
                None => {
                    trace!(?agent, ease = candidate.ease.into_inner(), "no eligible slot");
                }
            }
        }
        assignments.sort_by_key(|assignment| assignment.slot);

        self.drift = self.pattern.drift_offset(&assignments, slot_count);
        self.slot_count = slot_count;
        self.assignments = assignments;
        debug!(
            members = self.members.len(),
            assigned = self.assignments.len(),
            slots = slot_count,
            "formation slots reassigned"
        );
    }

    /// Absolute pose for `slot` given the anchor pose.
    #[must_use]
    pub fn slot_target(&self, anchor: SlotOffset, slot: usize) -> SlotOffset {
        let offset = self.pattern.slot_location(slot, self.slot_count);
        SlotOffset::new(
            anchor.position + offset.position - self.drift.position,
            anchor.orientation + offset.orientation - self.drift.orientation,
        )
    }

    /// Push every assigned slot's absolute pose to its agent. Returns the number
    /// of agents updated; assignments whose agent is gone are skipped.
    pub fn update_slots<R>(&self, anchor: SlotOffset, roster: &mut R) -> usize
    where
        R: AgentRoster + ?Sized,
    {
        let mut pushed = 0;
        for assignment in &self.assignments {
            let target = self.slot_target(anchor, assignment.slot);
            if let Some(agent) = roster.agent_mut(assignment.agent) {
                agent.set_target_position(target.position);
                agent.set_target_orientation(target.orientation);
                pushed += 1;
            }
        }
        pushed
    }
}
