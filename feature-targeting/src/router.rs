use std::sync::Arc;

use axum::{
    routing::{get, patch},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::flag_registry::MemoryFlagRegistry;
use crate::v0_endpoint;

#[derive(Clone)]
pub struct State {
    pub registry: Arc<MemoryFlagRegistry>,
    pub config: Config,
}

async fn index() -> &'static str {
    "feature targeting"
}

async fn liveness() -> &'static str {
    "ok"
}

pub fn router(registry: Arc<MemoryFlagRegistry>, config: Config) -> Router {
    let state = State { registry, config };

    Router::new()
        .route("/", get(index))
        .route("/_liveness", get(liveness))
        .route(
            "/flags",
            get(v0_endpoint::list_flags).post(v0_endpoint::create_flag),
        )
        .route("/flags/mine", get(v0_endpoint::my_flags))
        .route("/flags/:flag", patch(v0_endpoint::update_flag))
        .route(
            "/flags/:flag/targeting/:environment",
            get(v0_endpoint::get_targeting).put(v0_endpoint::put_targeting),
        )
        .route("/flags/:flag/preview", get(v0_endpoint::preview_flag))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
