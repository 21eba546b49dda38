// ============================================================================
// Subscription Data Quality
// ============================================================================

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Quality of the data currently flowing on a subscription.
///
/// Reported to [`QualityListener`](crate::interfaces::QualityListener)
/// implementations when the transport detects sequence gaps or recovers from
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Quality {
    Ok,
    MaybeStale,
    Stale,
    PartialStale,
    ForcedStale,
    Duplicate,
    Unknown,
}

impl Quality {
    /// True once data can no longer be assumed current.
    pub fn is_stale(&self) -> bool {
        matches!(
            self,
            Quality::Stale | Quality::PartialStale | Quality::ForcedStale
        )
    }
}
