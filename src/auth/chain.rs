/// Filter Chain
///
/// An explicit, ordered list of request interceptors run in front of the
/// routes. Each stage either hands the request on or answers it. Headers a
/// stage queues (login-flow cookies, mostly) are attached to whatever response
/// the request ends up with.
use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::debug;

/// Outcome of a single stage
#[derive(Debug)]
pub enum Interception {
    /// Pass the (possibly annotated) request to the next stage
    Continue(Request),
    /// Stop here and answer the client
    Respond(Response),
}

/// A stage in the filter chain.
///
/// Stages run synchronously and must not panic on any input; a failure that
/// should not reach the client is logged and turned into `Continue`.
pub trait Interceptor: Send + Sync {
    fn name(&self) -> &'static str;

    fn intercept(&self, req: Request, outgoing: &mut HeaderMap) -> Interception;
}

#[derive(Clone)]
pub struct FilterChain {
    stages: Arc<[Arc<dyn Interceptor>]>,
}

impl std::fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.stage_names()).finish()
    }
}

impl FilterChain {
    /// Stages run in the order given.
    pub fn new(stages: Vec<Arc<dyn Interceptor>>) -> Self {
        Self {
            stages: stages.into(),
        }
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// Run the stages over `req`, returning the outcome and the queued response headers.
    pub fn apply(&self, req: Request) -> (Interception, HeaderMap) {
        let mut outgoing = HeaderMap::new();
        let mut req = req;

        for stage in self.stages.iter() {
            match stage.intercept(req, &mut outgoing) {
                Interception::Continue(next) => req = next,
                Interception::Respond(response) => {
                    debug!("Filter chain answered by stage {}", stage.name());
                    return (Interception::Respond(response), outgoing);
                }
            }
        }

        (Interception::Continue(req), outgoing)
    }
}

/// Axum middleware running the filter chain before the routes
pub async fn run_filter_chain(
    State(chain): State<FilterChain>,
    req: Request,
    next: Next,
) -> Response {
    let (outcome, outgoing) = chain.apply(req);

    let mut response = match outcome {
        Interception::Continue(req) => next.run(req).await,
        Interception::Respond(response) => response,
    };

    let headers = response.headers_mut();
    for (name, value) in outgoing.iter() {
        headers.append(name.clone(), value.clone());
    }

    response
}
