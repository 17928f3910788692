use crate::types::View;
use prometheus_client::{
    metrics::{counter::Counter, gauge::Gauge},
    registry::Registry,
};

/// Metrics for the [super::SafetyRules].
pub struct Metrics {
    /// Number of votes produced
    pub votes: Counter,
    /// Number of timeouts produced (excluding repeated requests for the same view)
    pub timeouts: Counter,
    /// Number of declined vote requests
    pub declined_votes: Counter,
    /// Number of declined timeout requests
    pub declined_timeouts: Counter,
    /// Highest view voted or timed out in
    pub highest_acknowledged_view: Gauge,
    /// Highest locked one-chain view
    pub locked_one_chain_view: Gauge,
}

impl Metrics {
    /// Create and return a new set of metrics, registered with the given registry.
    pub fn init(registry: &mut Registry) -> Self {
        let votes = Counter::default();
        registry.register("votes", "Number of votes produced", votes.clone());
        let timeouts = Counter::default();
        registry.register("timeouts", "Number of timeouts produced", timeouts.clone());
        let declined_votes = Counter::default();
        registry.register(
            "declined_votes",
            "Number of declined vote requests",
            declined_votes.clone(),
        );
        let declined_timeouts = Counter::default();
        registry.register(
            "declined_timeouts",
            "Number of declined timeout requests",
            declined_timeouts.clone(),
        );
        let highest_acknowledged_view = Gauge::default();
        registry.register(
            "highest_acknowledged_view",
            "Highest view voted or timed out in",
            highest_acknowledged_view.clone(),
        );
        let locked_one_chain_view = Gauge::default();
        registry.register(
            "locked_one_chain_view",
            "Highest locked one-chain view",
            locked_one_chain_view.clone(),
        );
        Self {
            votes,
            timeouts,
            declined_votes,
            declined_timeouts,
            highest_acknowledged_view,
            locked_one_chain_view,
        }
    }

    /// Records the current watermarks.
    ///
    /// Views beyond `i64::MAX` are reported as `i64::MAX`.
    pub fn watermarks(&self, highest_acknowledged: View, locked: View) {
        self.highest_acknowledged_view
            .set(i64::try_from(highest_acknowledged).unwrap_or(i64::MAX));
        self.locked_one_chain_view
            .set(i64::try_from(locked).unwrap_or(i64::MAX));
    }
}
