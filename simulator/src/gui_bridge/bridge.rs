use crate::gui_bridge::model::BridgeModel;
use log::{error, info};
use rsscore::telemetry::MetricsSnapshot;
use rsscore::{MeasurementSummary, Metadata};
use serde::Serialize;
use serde_json::json;
use std::{
    net::SocketAddr,
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
    thread,
};
use tokio::runtime::Builder;
use warp::{http::StatusCode, reply::Response, Filter, Reply};

pub fn gui_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 9000))
}

type SharedModel = Arc<RwLock<BridgeModel>>;

fn read(state: &SharedModel) -> RwLockReadGuard<'_, BridgeModel> {
    state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write(state: &SharedModel) -> RwLockWriteGuard<'_, BridgeModel> {
    state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn json_or_404<T: Serialize>(value: Option<&T>, what: &str) -> Response {
    match value {
        Some(value) => warp::reply::json(value).into_response(),
        None => warp::reply::with_status(
            warp::reply::json(&json!({ "status": format!("no {} yet", what) })),
            StatusCode::NOT_FOUND,
        )
        .into_response(),
    }
}

/// `GET /measurement`, `GET /metadata` and `GET /stats` over the shared model.
fn routes(
    state: SharedModel,
) -> impl Filter<Extract = (Response,), Error = warp::Rejection> + Clone {
    let state_filter = warp::any().map(move || state.clone());

    let measurement = warp::path("measurement")
        .and(warp::path::end())
        .and(warp::get())
        .and(state_filter.clone())
        .map(|state: SharedModel| json_or_404(read(&state).latest.as_ref(), "measurement"));

    let metadata = warp::path("metadata")
        .and(warp::path::end())
        .and(warp::get())
        .and(state_filter.clone())
        .map(|state: SharedModel| json_or_404(read(&state).metadata.as_ref(), "metadata"));

    let stats = warp::path("stats")
        .and(warp::path::end())
        .and(warp::get())
        .and(state_filter)
        .map(|state: SharedModel| {
            let model = read(&state);
            warp::reply::json(&json!({
                "status": model.status,
                "stats": model.stats,
            }))
            .into_response()
        });

    measurement.or(metadata).unify().or(stats).unify()
}

/// Publishes session results over HTTP for external viewers.
pub struct GuiBridge {
    state: SharedModel,
}

impl GuiBridge {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(BridgeModel::default())),
        }
    }

    /// Serves the routes on a background thread with its own runtime.
    pub fn serve(&self, address: SocketAddr) {
        let routes = routes(self.state.clone());
        thread::spawn(move || {
            let runtime = match Builder::new_current_thread().enable_all().build() {
                Ok(runtime) => runtime,
                Err(err) => {
                    error!("failed to build bridge runtime: {}", err);
                    return;
                }
            };
            info!("bridge listening on http://{}", address);
            runtime.block_on(async move {
                warp::serve(routes).run(address).await;
            });
        });
    }

    pub fn publish_metadata(&self, metadata: &Metadata) {
        write(&self.state).metadata = Some(*metadata);
    }

    pub fn publish_measurement(&self, summary: &MeasurementSummary) {
        let mut guard = write(&self.state);
        guard.latest = Some(summary.clone());
        println!(
            "[GUI] result {}: {} values, peak {:?}, rms {:.1}",
            summary.sequence_number, summary.data_length, summary.peak_index, summary.rms
        );
    }

    pub fn publish_stats(&self, stats: MetricsSnapshot) {
        write(&self.state).stats = stats;
    }

    pub fn publish_status(&self, message: &str) {
        write(&self.state).status = message.to_string();
        println!("[GUI] {}", message);
    }

    #[cfg(test)]
    pub fn snapshot(&self) -> BridgeModel {
        read(&self.state).clone()
    }
}

impl Default for GuiBridge {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::config::{DeliveryMode, WorkflowConfig};
    use crate::workflow::runner::Runner;
    use rsscore::ServiceKind;

    fn published_bridge() -> GuiBridge {
        let mut cfg = WorkflowConfig::from_service(ServiceKind::PowerBins);
        cfg.mode = DeliveryMode::Once;
        cfg.cycles = 2;
        let gui = GuiBridge::new();
        let result = Runner::new(cfg)
            .execute(|metadata, summary| {
                gui.publish_metadata(metadata);
                gui.publish_measurement(summary);
            })
            .unwrap();
        gui.publish_stats(result.metrics);
        gui
    }

    #[test]
    fn gui_bridge_keeps_the_latest_result() {
        let gui = published_bridge();
        let snapshot = gui.snapshot();
        assert_eq!(snapshot.latest.unwrap().sequence_number, 2);
        assert_eq!(snapshot.stats.measurements, 2);
        assert_eq!(snapshot.metadata.unwrap().actual_bin_count, Some(8));
    }

    #[tokio::test]
    async fn routes_serve_json_and_404_before_data() {
        let empty = routes(GuiBridge::new().state.clone());
        let response = warp::test::request()
            .path("/measurement")
            .reply(&empty)
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let gui = published_bridge();
        let filter = routes(gui.state.clone());
        let response = warp::test::request().path("/measurement").reply(&filter).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["sequence_number"], 2);

        let response = warp::test::request().path("/stats").reply(&filter).await;
        let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["stats"]["measurements"], 2);
    }
}
