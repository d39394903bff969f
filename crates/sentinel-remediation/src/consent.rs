//! Consent gate for pending remediation proposals
//!
//! Holds at most one pending proposal per pipeline id. A new proposal for the
//! same id replaces the old one. Consuming a proposal is a single atomic
//! remove, so concurrent consent calls for one id can never both obtain it.

use dashmap::DashMap;
use sentinel_model::RemediationProposal;

/// Human decision on a pending proposal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentDecision {
    Approved,
    Declined,
}

impl ConsentDecision {
    #[inline]
    #[must_use]
    pub fn from_approved(approved: bool) -> Self {
        if approved {
            Self::Approved
        } else {
            Self::Declined
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Declined => "declined",
        }
    }
}

/// Keyed store of consent-pending proposals
#[derive(Debug, Default)]
pub struct ConsentGate {
    pending: DashMap<String, RemediationProposal>,
}

impl ConsentGate {
    /// Create an empty gate
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a proposal under its pipeline id
    ///
    /// Returns the proposal it replaced, if any.
    pub fn propose(&self, proposal: RemediationProposal) -> Option<RemediationProposal> {
        let id = proposal.pipeline_id().to_string();
        let replaced = self.pending.insert(id.clone(), proposal);
        if replaced.is_some() {
            tracing::debug!(pipeline_id = %id, "replaced pending proposal");
        }
        replaced
    }

    /// Atomically take the pending proposal for `pipeline_id`
    pub fn consume(&self, pipeline_id: &str) -> Option<RemediationProposal> {
        self.pending.remove(pipeline_id).map(|(_, proposal)| proposal)
    }

    /// Copy of the pending proposal, leaving it in place
    #[must_use]
    pub fn pending(&self, pipeline_id: &str) -> Option<RemediationProposal> {
        self.pending.get(pipeline_id).map(|entry| entry.value().clone())
    }

    /// Drop a pending proposal without a consent decision
    pub fn discard(&self, pipeline_id: &str) -> bool {
        self.pending.remove(pipeline_id).is_some()
    }

    /// Pipeline ids with a pending proposal, sorted
    #[must_use]
    pub fn pending_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.pending.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::FailureCategory;
    use crate::proposal::ProposalGenerator;
    use sentinel_model::{PipelineRun, PipelineStatus};
    use std::sync::Arc;

    fn proposal(id: &str, category: FailureCategory) -> RemediationProposal {
        let run = PipelineRun::new(id, "svc", "main", PipelineStatus::Failure);
        ProposalGenerator::new().generate(category, &run)
    }

    #[test]
    fn propose_overwrites_rather_than_merges() {
        let gate = ConsentGate::new();
        assert!(gate.propose(proposal("p1", FailureCategory::Transient)).is_none());

        let replaced = gate.propose(proposal("p1", FailureCategory::Unknown));
        assert_eq!(replaced.unwrap().actions().len(), 3);

        assert_eq!(gate.pending_count(), 1);
        assert_eq!(gate.pending("p1").unwrap().actions().len(), 1);
    }

    #[test]
    fn consume_removes_exactly_once() {
        let gate = ConsentGate::new();
        gate.propose(proposal("p1", FailureCategory::Timeout));

        assert!(gate.consume("p1").is_some());
        assert!(gate.consume("p1").is_none());
        assert!(gate.is_empty());
    }

    #[test]
    fn pending_ids_and_discard() {
        let gate = ConsentGate::new();
        gate.propose(proposal("b", FailureCategory::Timeout));
        gate.propose(proposal("a", FailureCategory::Timeout));
        assert_eq!(gate.pending_ids(), vec!["a".to_string(), "b".to_string()]);

        assert!(gate.discard("a"));
        assert!(!gate.discard("a"));
        assert_eq!(gate.pending_ids(), vec!["b".to_string()]);
    }

    #[test]
    fn concurrent_consumers_get_the_proposal_once() {
        let gate = Arc::new(ConsentGate::new());
        gate.propose(proposal("p1", FailureCategory::Transient));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gate = Arc::clone(&gate);
                std::thread::spawn(move || gate.consume("p1").is_some())
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn decision_from_bool() {
        assert_eq!(ConsentDecision::from_approved(true), ConsentDecision::Approved);
        assert_eq!(ConsentDecision::from_approved(false).as_str(), "declined");
    }
}
