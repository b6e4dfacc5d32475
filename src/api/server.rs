use crate::api::routes;
use crate::cache::SessionCache;
use crate::config::Shared;
use crate::session::events::SessionEvents;
use std::future::Future;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Shared,
    pub cache: Arc<SessionCache>,
    pub events: SessionEvents,
}

pub fn new(state: AppState) -> impl Future<Output = hyper::Result<()>> {
    let addr = state.config.api_bind_addr;
    axum::Server::bind(&addr).serve(routes::new(state).into_make_service())
}
