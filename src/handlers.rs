use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    extract::State,
    http::StatusCode,
    response::{sse::{Event, Sse}, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::stream::Stream;
use hashbrown::HashMap;
use log::{error, info, warn};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::{broadcast, watch};

use crate::config::AppConfig;
use crate::ga::GeneticAlgorithm;
use crate::models::{GaParameters, OptimizationRequest, SearchOutcome, SearchStatus};

/// Stop channels of the searches currently running, keyed by run id.
#[derive(Clone, Default)]
pub struct RunRegistry {
    next_id: Arc<AtomicU64>,
    runs: Arc<Mutex<HashMap<u64, watch::Sender<bool>>>>,
}

/// Removes its run from the registry when dropped.
pub struct RunGuard {
    pub run_id: u64,
    registry: RunRegistry,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.registry.lock().remove(&self.run_id);
    }
}

impl RunRegistry {
    fn lock(&self) -> MutexGuard<'_, HashMap<u64, watch::Sender<bool>>> {
        self.runs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Opens a fresh stop channel for a new run.
    pub fn register(&self) -> (RunGuard, watch::Receiver<bool>) {
        let run_id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (stop_tx, stop_rx) = watch::channel(false);
        self.lock().insert(run_id, stop_tx);
        let guard = RunGuard {
            run_id,
            registry: self.clone(),
        };
        (guard, stop_rx)
    }

    /// Signals one run, or every active run when `run_id` is `None`.
    /// Returns how many runs were signalled.
    pub fn stop(&self, run_id: Option<u64>) -> usize {
        let runs = self.lock();
        match run_id {
            Some(id) => runs.get(&id).map_or(0, |tx| {
                tx.send_replace(true);
                1
            }),
            None => {
                for tx in runs.values() {
                    tx.send_replace(true);
                }
                runs.len()
            }
        }
    }

    pub fn active(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.lock().keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub status_tx: broadcast::Sender<SearchStatus>,
    pub runs: RunRegistry,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let (status_tx, _) = broadcast::channel(1024);
        Self {
            config: Arc::new(config),
            status_tx,
            runs: RunRegistry::default(),
        }
    }
}

/// Body of `POST /stop`; without a run id every active run is stopped.
#[derive(Debug, Deserialize, Default)]
pub struct StopRequest {
    pub run_id: Option<u64>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/generate_timetable", get(generate_timetable_handler))
        .route("/optimize", post(optimize_handler))
        .route("/status", get(status_handler))
        .route("/stop", post(stop_handler))
        .with_state(state)
}

/// Runs the search on the blocking pool so the runtime stays responsive.
async fn run_search_task(
    state: &AppState,
    parameters: GaParameters,
) -> Result<(u64, SearchOutcome), StatusCode> {
    let config = Arc::clone(&state.config);
    let status_tx = state.status_tx.clone();
    let (guard, stop_rx) = state.runs.register();
    let run_id = guard.run_id;

    let outcome = tokio::task::spawn_blocking(move || {
        GeneticAlgorithm::new(&config.domain, parameters)
            .with_status(status_tx)
            .with_stop_signal(stop_rx)
            .with_run_id(run_id)
            .run()
    })
    .await
    .map_err(|e| {
        error!("Search task {} failed: {}", run_id, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    drop(guard);
    Ok((run_id, outcome))
}

/// Returns the week as `{ day: [labels] }`, valid or not.
pub async fn generate_timetable_handler(
    State(state): State<AppState>,
) -> Result<Response, StatusCode> {
    let parameters = state.config.search.clone();
    let (run_id, outcome) = run_search_task(&state, parameters).await?;
    info!("Generated timetable in run {} (valid = {})", run_id, outcome.is_valid);
    Ok(Json(outcome.timetable).into_response())
}

pub async fn optimize_handler(
    State(state): State<AppState>,
    body: Option<Json<OptimizationRequest>>,
) -> Result<Response, StatusCode> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let parameters = req.apply(&state.config.search);
    if let Err(e) = parameters.validate() {
        error!("Rejected optimize request: {}", e);
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "error": e.to_string() })),
        )
            .into_response());
    }

    let (run_id, outcome) = run_search_task(&state, parameters).await?;

    Ok(Json(json!({
        "success": true,
        "run_id": run_id,
        "fitness": outcome.fitness,
        "is_valid": outcome.is_valid,
        "generations": outcome.generations,
        "termination": outcome.termination,
        "elapsed_ms": outcome.elapsed_time.as_millis() as u64,
        "violations": outcome.violations,
        "timetable": outcome.timetable,
    }))
    .into_response())
}

pub async fn status_handler(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>> + 'static> {
    let mut rx = state.status_tx.subscribe();

    let stream = async_stream::stream! {
        while let Ok(status) = rx.recv().await {
            match serde_json::to_string(&status) {
                Ok(data) => {
                    yield Ok(Event::default().data(data).event("status"));
                }
                Err(e) => error!("Serialization error: {}", e),
            }
        }
    };

    Sse::new(stream)
}

pub async fn stop_handler(
    State(state): State<AppState>,
    body: Option<Json<StopRequest>>,
) -> Response {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let stopped = state.runs.stop(req.run_id);

    if let (Some(run_id), 0) = (req.run_id, stopped) {
        warn!("Stop requested for unknown run {}", run_id);
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "success": false, "error": format!("no active run {}", run_id) })),
        )
            .into_response();
    }

    info!("Stop requested, {} run(s) signalled", stopped);
    Json(json!({ "success": true, "stopped": stopped })).into_response()
}
