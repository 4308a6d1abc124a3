//! Diplomatic relations between houses.
//!
//! Relations are directed: (A, B) holds A's stance toward B, which may
//! differ from (B, A). Escalation driven by command execution is handled
//! by the conflict phase; this module owns the data model, the legal
//! transitions, and the countdown timers.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

use crate::defines::diplomacy as defines;
use crate::ids::HouseId;

/// `serde_json` requires string map keys; tuple keys are serialized as a
/// sequence of pairs instead.
fn serialize_relations<S>(
    map: &BTreeMap<(HouseId, HouseId), DiplomaticRelation>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let pairs: Vec<(&(HouseId, HouseId), &DiplomaticRelation)> = map.iter().collect();
    pairs.serialize(serializer)
}

fn deserialize_relations<'de, D>(
    deserializer: D,
) -> Result<BTreeMap<(HouseId, HouseId), DiplomaticRelation>, D::Error>
where
    D: Deserializer<'de>,
{
    let pairs: Vec<((HouseId, HouseId), DiplomaticRelation)> =
        Deserialize::deserialize(deserializer)?;
    Ok(pairs.into_iter().collect())
}

/// A's stance toward B.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub enum DiplomaticStance {
    #[default]
    Neutral,
    NonAggression,
    Hostile,
    Enemy,
}

/// One directed relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DiplomaticRelation {
    pub stance: DiplomaticStance,
    /// Turns of proposal refusal remaining after a dishonorable act.
    pub dishonor_turns: u32,
    /// Turns of enforced isolation remaining after a pact violation.
    pub isolation_turns: u32,
    /// Times this house has broken a pact with the other.
    pub pact_violations: u32,
}

/// A pending diplomatic proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub from: HouseId,
    pub to: HouseId,
    pub kind: ProposalKind,
    /// Turns before the proposal expires unanswered.
    pub turns_remaining: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProposalKind {
    NonAggression,
    /// Stand down from Hostile to Neutral.
    Truce,
}

/// All diplomatic state for a game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DiplomacyState {
    /// Directed relations; absent entries read as Neutral.
    #[serde(
        serialize_with = "serialize_relations",
        deserialize_with = "deserialize_relations"
    )]
    pub relations: BTreeMap<(HouseId, HouseId), DiplomaticRelation>,
    pub proposals: Vec<Proposal>,
}

impl DiplomacyState {
    pub fn stance(&self, from: HouseId, to: HouseId) -> DiplomaticStance {
        self.relations
            .get(&(from, to))
            .map(|r| r.stance)
            .unwrap_or_default()
    }

    pub fn relation_mut(&mut self, from: HouseId, to: HouseId) -> &mut DiplomaticRelation {
        self.relations.entry((from, to)).or_default()
    }

    /// Set a directed stance.
    pub fn set_stance(&mut self, from: HouseId, to: HouseId, stance: DiplomaticStance) {
        self.relation_mut(from, to).stance = stance;
    }

    /// Set the stance both ways (mutual pacts, mutual war).
    pub fn set_mutual(&mut self, a: HouseId, b: HouseId, stance: DiplomaticStance) {
        self.set_stance(a, b, stance);
        self.set_stance(b, a, stance);
    }

    /// Either side sees the other as Enemy.
    pub fn at_war(&self, a: HouseId, b: HouseId) -> bool {
        self.stance(a, b) == DiplomaticStance::Enemy
            || self.stance(b, a) == DiplomaticStance::Enemy
    }

    /// Escalate `from`'s stance toward `to` (and the reverse: aggression
    /// is noticed). Never de-escalates.
    pub fn escalate(&mut self, from: HouseId, to: HouseId, at_least: DiplomaticStance) {
        for (a, b) in [(from, to), (to, from)] {
            let rel = self.relation_mut(a, b);
            if rel.stance < at_least {
                rel.stance = at_least;
            }
        }
    }

    /// Breaking a non-aggression pact: stance drops to Hostile both ways,
    /// the violator takes dishonor and isolation timers plus a violation
    /// count.
    pub fn record_pact_violation(&mut self, violator: HouseId, victim: HouseId) {
        self.set_mutual(violator, victim, DiplomaticStance::Hostile);
        let rel = self.relation_mut(violator, victim);
        rel.pact_violations += 1;
        rel.dishonor_turns = defines::DISHONOR_TURNS;
        rel.isolation_turns = defines::ISOLATION_TURNS;
    }

    /// A house under dishonor cannot have proposals accepted.
    pub fn is_dishonored(&self, house: HouseId) -> bool {
        self.relations
            .iter()
            .any(|(&(from, _), rel)| from == house && rel.dishonor_turns > 0)
    }

    pub fn submit_proposal(&mut self, from: HouseId, to: HouseId, kind: ProposalKind) {
        // One outstanding proposal per (from, to, kind)
        if self
            .proposals
            .iter()
            .any(|p| p.from == from && p.to == to && p.kind == kind)
        {
            return;
        }
        self.proposals.push(Proposal {
            from,
            to,
            kind,
            turns_remaining: defines::PROPOSAL_EXPIRY_TURNS,
        });
    }

    /// Accept a pending proposal, applying its stance change. Returns
    /// false when no such proposal exists or the proposer is dishonored.
    pub fn accept_proposal(&mut self, from: HouseId, to: HouseId) -> bool {
        let Some(idx) = self.proposals.iter().position(|p| p.from == from && p.to == to) else {
            return false;
        };
        if self.is_dishonored(from) {
            return false;
        }
        let proposal = self.proposals.remove(idx);
        match proposal.kind {
            ProposalKind::NonAggression => {
                self.set_mutual(from, to, DiplomaticStance::NonAggression);
            }
            ProposalKind::Truce => {
                // Only de-escalates Hostile; open war must burn out
                if self.stance(from, to) == DiplomaticStance::Hostile
                    && self.stance(to, from) == DiplomaticStance::Hostile
                {
                    self.set_mutual(from, to, DiplomaticStance::Neutral);
                }
            }
        }
        true
    }

    pub fn reject_proposal(&mut self, from: HouseId, to: HouseId) {
        self.proposals.retain(|p| !(p.from == from && p.to == to));
    }

    /// Advance all countdown timers one turn; expired proposals drop.
    pub fn advance_timers(&mut self) {
        for rel in self.relations.values_mut() {
            rel.dishonor_turns = rel.dishonor_turns.saturating_sub(1);
            rel.isolation_turns = rel.isolation_turns.saturating_sub(1);
        }
        for p in &mut self.proposals {
            p.turns_remaining = p.turns_remaining.saturating_sub(1);
        }
        self.proposals.retain(|p| p.turns_remaining > 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: HouseId = HouseId(1);
    const B: HouseId = HouseId(2);

    #[test]
    fn absent_relation_reads_neutral() {
        let d = DiplomacyState::default();
        assert_eq!(d.stance(A, B), DiplomaticStance::Neutral);
        assert!(!d.at_war(A, B));
    }

    #[test]
    fn escalation_is_monotonic_and_mutual() {
        let mut d = DiplomacyState::default();
        d.escalate(A, B, DiplomaticStance::Hostile);
        assert_eq!(d.stance(A, B), DiplomaticStance::Hostile);
        assert_eq!(d.stance(B, A), DiplomaticStance::Hostile);

        // Escalating to a lower tier changes nothing
        d.escalate(A, B, DiplomaticStance::NonAggression);
        assert_eq!(d.stance(A, B), DiplomaticStance::Hostile);

        d.escalate(B, A, DiplomaticStance::Enemy);
        assert!(d.at_war(A, B));
    }

    #[test]
    fn pact_violation_starts_timers() {
        let mut d = DiplomacyState::default();
        d.set_mutual(A, B, DiplomaticStance::NonAggression);
        d.record_pact_violation(A, B);

        assert_eq!(d.stance(A, B), DiplomaticStance::Hostile);
        assert!(d.is_dishonored(A));
        assert!(!d.is_dishonored(B));
        assert_eq!(d.relations[&(A, B)].pact_violations, 1);

        for _ in 0..defines::DISHONOR_TURNS {
            d.advance_timers();
        }
        assert!(!d.is_dishonored(A));
    }

    #[test]
    fn proposals_expire_and_accept_applies_stance() {
        let mut d = DiplomacyState::default();
        d.submit_proposal(A, B, ProposalKind::NonAggression);
        // Duplicate submission is a no-op
        d.submit_proposal(A, B, ProposalKind::NonAggression);
        assert_eq!(d.proposals.len(), 1);

        assert!(d.accept_proposal(A, B));
        assert_eq!(d.stance(A, B), DiplomaticStance::NonAggression);
        assert_eq!(d.stance(B, A), DiplomaticStance::NonAggression);
        assert!(d.proposals.is_empty());

        d.submit_proposal(B, A, ProposalKind::Truce);
        for _ in 0..defines::PROPOSAL_EXPIRY_TURNS {
            d.advance_timers();
        }
        assert!(d.proposals.is_empty());
        assert!(!d.accept_proposal(B, A));
    }

    #[test]
    fn dishonored_house_cannot_close_proposals() {
        let mut d = DiplomacyState::default();
        d.set_mutual(A, B, DiplomaticStance::NonAggression);
        d.record_pact_violation(A, B);
        d.submit_proposal(A, B, ProposalKind::NonAggression);
        assert!(!d.accept_proposal(A, B));
    }
}
