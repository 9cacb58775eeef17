//! Soft ceiling on the number of generated quiz sets.
//!
//! The count and the later insert are separate statements, so concurrent
//! submissions can each pass the check and push the total past the ceiling.
//! The ceiling bounds operating cost; it is not a consistency invariant.

use tracing::{debug, instrument, warn};

use crate::error::PipelineError;
use crate::store::{OwnerFilter, QuizStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuotaScope {
    /// One ceiling shared by everyone.
    #[default]
    Global,
    /// The ceiling applies to each owner separately; anonymous submissions
    /// share one bucket.
    PerOwner,
}

impl QuotaScope {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "global" => Some(Self::Global),
            "per-owner" | "per_owner" | "owner" => Some(Self::PerOwner),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaPolicy {
    pub ceiling: u64,
    pub scope: QuotaScope,
}

impl Default for QuotaPolicy {
    fn default() -> Self {
        Self { ceiling: 100, scope: QuotaScope::Global }
    }
}

impl QuotaPolicy {
    pub fn filter<'a>(&self, owner: Option<&'a str>) -> OwnerFilter<'a> {
        match (self.scope, owner) {
            (QuotaScope::Global, _) => OwnerFilter::Any,
            (QuotaScope::PerOwner, Some(owner)) => OwnerFilter::Owner(owner),
            (QuotaScope::PerOwner, None) => OwnerFilter::Anonymous,
        }
    }

    /// Reject when the relevant count has reached the ceiling.
    #[instrument(target = "doc_quiz::quota", skip(self, store), fields(ceiling = self.ceiling))]
    pub async fn check(&self, store: &dyn QuizStore, owner: Option<&str>) -> Result<(), PipelineError> {
        let count = store.count_quiz_sets(self.filter(owner)).await?;
        if count >= self.ceiling {
            warn!(count, ceiling = self.ceiling, "Quota exceeded");
            return Err(PipelineError::QuotaExceeded { count, ceiling: self.ceiling });
        }
        debug!(count, "Quota check passed");
        Ok(())
    }
}
