use rsscore::telemetry::MetricsSnapshot;
use rsscore::{MeasurementSummary, Metadata};
use serde::{Deserialize, Serialize};

/// Everything the HTTP bridge serves.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BridgeModel {
    pub latest: Option<MeasurementSummary>,
    pub metadata: Option<Metadata>,
    pub stats: MetricsSnapshot,
    pub status: String,
}
