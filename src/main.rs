use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use std::env;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use parcel_scout::{types::*, AppState, LookupError};

fn parse_port_from_args() -> Option<u16> {
    let mut args = std::env::args().peekable();
    while let Some(a) = args.next() {
        if a == "--port" {
            if let Some(v) = args.next() {
                if let Ok(p) = v.parse::<u16>() {
                    return Some(p);
                }
            }
        } else if let Some(rest) = a.strip_prefix("--port=") {
            if let Ok(p) = rest.parse::<u16>() {
                return Some(p);
            }
        }
    }
    None
}

fn port_from_env() -> Option<u16> {
    for k in ["PARCEL_SCOUT_PORT", "PORT"] {
        if let Ok(v) = std::env::var(k) {
            if let Ok(p) = v.trim().parse::<u16>() {
                return Some(p);
            }
        }
    }
    None
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=warn"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    info!("Starting parcel-scout");

    let http_timeout = env::var("HTTP_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(30);
    let connect_timeout = env::var("HTTP_CONNECT_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(10);
    let http_client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(http_timeout))
        .connect_timeout(std::time::Duration::from_secs(connect_timeout))
        .build()?;

    let state = Arc::new(AppState::new(http_client));
    match state.browser_pool.executable() {
        Some(exe) => info!("browser executable: {}", exe),
        None if state.browser_pool.available() => info!("using remote browser endpoint"),
        None => warn!("no browser found; lookups will fail with BROWSER_LAUNCH_FAILED"),
    }
    if !state.search.is_configured() {
        warn!("semantic search key not set; fallback resolver disabled");
    }

    let app = Router::new()
        .route("/", get(health_check))
        .route("/health", get(health_check))
        .route("/lookup", post(lookup_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    let port: u16 = parse_port_from_args()
        .or_else(port_from_env)
        .unwrap_or(5080);
    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(l) => l,
        Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
            anyhow::bail!(
                "Address already in use: {}. Stop the existing process or run with --port {} (or set PORT/PARCEL_SCOUT_PORT).",
                bind_addr,
                port.saturating_add(1)
            )
        }
        Err(e) => return Err(e.into()),
    };
    info!("parcel-scout listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state.clone()))
        .await?;

    Ok(())
}

async fn shutdown_signal(state: Arc<AppState>) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).ok();

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = async {
                if let Some(ref mut s) = sigterm {
                    s.recv().await;
                } else {
                    futures::future::pending::<()>().await;
                }
            } => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    state.browser_pool.shutdown().await;
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "parcel-scout",
        "version": env!("CARGO_PKG_VERSION"),
        "site": state.lookup.site().name,
        "layoutVersion": state.lookup.site().layout_version,
        "browserAvailable": state.lookup.browser_available(),
        "openContexts": state.browser_pool.open_contexts(),
        "fallbackConfigured": state.lookup.fallback_configured(),
    }))
}

fn status_for(err: &LookupError) -> StatusCode {
    match err {
        LookupError::BrowserLaunchFailed { .. } => StatusCode::SERVICE_UNAVAILABLE,
        LookupError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        LookupError::Blocked { .. } => StatusCode::TOO_MANY_REQUESTS,
        LookupError::NavigationFailed { .. } | LookupError::Parse { .. } => StatusCode::BAD_GATEWAY,
    }
}

async fn lookup_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LookupRequest>,
) -> Result<Json<LookupResponse>, (StatusCode, Json<ErrorResponse>)> {
    if request.address.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                code: "INVALID_REQUEST".to_string(),
                message: "address must not be empty".to_string(),
                transient: false,
            }),
        ));
    }

    match state.lookup.lookup(&request.address).await {
        Ok(response) => Ok(Json(response)),
        Err(e) => {
            error!("Lookup error [{}]: {}", e.code(), e);
            Err((status_for(&e), Json(e.to_response())))
        }
    }
}
