use axum::{
    Router,
    http::{HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub mod auth;
pub mod config;
pub mod middleware;
pub mod routes;
pub mod users;

use auth::{
    AccessPolicy, AuthenticationFilter, FilterChain, Interceptor, OAuthCompletionHandler,
    ProviderRedirect, ProviderRegistry, RedirectStatePreserver, TokenCodec, run_filter_chain,
};
use config::{Config, CorsConfig, LoggingConfig};
use users::{InMemoryUserDirectory, UserDirectory};

/// Long-lived, read-only services shared by every request
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub codec: Arc<TokenCodec>,
    pub providers: Arc<ProviderRegistry>,
    pub directory: Arc<dyn UserDirectory>,
}

impl AppState {
    pub fn new(
        config: Config,
        codec: Arc<TokenCodec>,
        providers: Arc<ProviderRegistry>,
        directory: Arc<dyn UserDirectory>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            codec,
            providers,
            directory,
        }
    }

    /// Codec and providers from configuration, users kept in memory
    pub fn from_config(config: Config) -> Result<Self, auth::AuthError> {
        let codec = Arc::new(TokenCodec::from_config(&config.auth));
        let providers = Arc::new(ProviderRegistry::from_config(&config.auth.providers)?);
        Ok(Self::new(
            config,
            codec,
            providers,
            Arc::new(InMemoryUserDirectory::new()),
        ))
    }
}

/// The request filter chain, in execution order.
///
/// The redirect preserver must run before login initiation so its cookie
/// rides on the provider redirect; the access policy must run last.
pub fn filter_chain(state: &AppState) -> FilterChain {
    let auth = &state.config.auth;
    let stages: Vec<Arc<dyn Interceptor>> = vec![
        Arc::new(RedirectStatePreserver::new(
            auth.cookie.clone(),
            auth.allowed_redirect_origins.clone(),
        )),
        Arc::new(ProviderRedirect::new(
            state.providers.clone(),
            auth.cookie.clone(),
        )),
        Arc::new(AuthenticationFilter::new(state.codec.clone())),
        Arc::new(AccessPolicy::new(auth.permit_paths.clone())),
    ];
    FilterChain::new(stages)
}

/// Cross-origin policy for the browser client; answers preflight requests
/// before they reach the filter chain.
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring invalid CORS origin '{}': {}", origin, e);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        // A wildcard is not permitted together with credentials.
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
        .max_age(Duration::from_secs(config.max_age_secs))
}

/// Assemble the application: request id, then CORS, then the filter chain, then the routes.
pub fn build_app(state: AppState) -> Router {
    let chain = filter_chain(&state);
    debug!("Filter chain: {:?}", chain);

    let completion = OAuthCompletionHandler::new(
        state.providers.clone(),
        state.directory.clone(),
        state.codec.clone(),
        &state.config.auth,
    );

    routes::router(routes::RouteState {
        providers: state.providers.clone(),
        completion,
    })
    .layer(from_fn_with_state(chain, run_filter_chain))
    .layer(cors_layer(&state.config.cors))
    .layer(from_fn(middleware::request_id_middleware))
}

/// Install the global tracing subscriber. `RUST_LOG` takes precedence over
/// the configured level.
pub fn init_tracing(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let registry = tracing_subscriber::registry().with(filter);

    let result = if config.json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };

    if let Err(e) = result {
        eprintln!("tracing already initialised: {}", e);
    }
}

/// Starts the web server with custom configuration.
///
/// Returns the bound port once the listener is up; the server runs until
/// `shutdown_rx` fires.
pub async fn start_server_with_config(
    config: Config,
    shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) -> anyhow::Result<u16> {
    config.validate()?;
    let state = AppState::from_config(config)?;
    start_server_with_state(state, shutdown_rx).await
}

/// Starts the web server around prepared state
pub async fn start_server_with_state(
    state: AppState,
    shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) -> anyhow::Result<u16> {
    let addr = state.config.server_addr();
    let providers = state.providers.names();
    let app = build_app(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind {}: {}", addr, e))?;
    let local_addr = listener.local_addr()?;

    info!("listening on {}", local_addr);
    info!("Login providers: {:?}", providers);

    tokio::spawn(async move {
        let server = axum::serve(listener, app).with_graceful_shutdown(async {
            shutdown_rx.await.ok();
        });
        if let Err(e) = server.await {
            warn!("server error: {}", e);
        }
        info!("server stopped");
    });

    Ok(local_addr.port())
}
