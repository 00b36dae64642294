//! Test utilities for API server integration tests

use axum_test::TestServer;
use chrono::{Duration, TimeZone, Utc};
use std::sync::Arc;
use stocksignal::core::http::{create_router, AppState};
use stocksignal::db::{MemoryRepository, Repository};
use stocksignal::metrics::Metrics;
use stocksignal::models::{Action, CompositeSignal, SignalDirection, SignalEvent, SignalKind};

/// Test helper for API server integration tests
#[allow(dead_code)]
pub struct TestApiServer {
    pub server: TestServer,
    pub state: AppState,
    pub repository: Option<Arc<MemoryRepository>>,
}

impl TestApiServer {
    pub async fn new() -> Self {
        let repository = Arc::new(MemoryRepository::new());
        Self::build(Some(repository))
    }

    pub async fn without_database() -> Self {
        Self::build(None)
    }

    fn build(repository: Option<Arc<MemoryRepository>>) -> Self {
        let metrics = Arc::new(Metrics::new().expect("metrics initialization"));
        let state = AppState::new(
            metrics,
            repository.clone().map(|repo| repo as Arc<dyn Repository>),
        );
        let app = create_router(state.clone());
        let server = TestServer::new(app).expect("start test server");
        Self {
            server,
            state,
            repository,
        }
    }

    /// Three daily composites for `symbol`, the last one a buy.
    pub async fn seed_signals(&self, symbol: &str) {
        let repo = self.repository.as_ref().expect("repository");
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let signals: Vec<CompositeSignal> = (0..3)
            .map(|i| {
                let timestamp = start + Duration::days(i);
                let event = SignalEvent::new(
                    timestamp,
                    "ma_cross",
                    SignalKind::CrossUp,
                    0.4 + 0.1 * i as f64,
                    SignalDirection::Bullish,
                );
                CompositeSignal {
                    symbol: symbol.to_string(),
                    timestamp,
                    score: if i == 2 { 0.5 } else { 0.0 },
                    action: if i == 2 { Action::Buy } else { Action::Hold },
                    contributing_events: vec![event],
                }
            })
            .collect();
        repo.write_composites(&signals).await.expect("seed composites");
    }
}
