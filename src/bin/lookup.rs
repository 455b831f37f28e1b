use parcel_scout::AppState;

const USAGE: &str = "parcel-lookup [--check] [--version] <address...>";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries the JSON response only
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }
    if args.iter().any(|a| a == "--help" || a == "-h") {
        eprintln!("usage: {}", USAGE);
        return Ok(());
    }

    let state = AppState::new(reqwest::Client::builder().build()?);

    if args.iter().any(|a| a == "--check") {
        let report = serde_json::json!({
            "browserExecutable": state.browser_pool.executable(),
            "browserAvailable": state.browser_pool.available(),
            "fallbackConfigured": state.search.is_configured(),
            "navigationTimeoutMs": state.config.resolve_navigation_timeout().as_millis() as u64,
            "operationTimeoutMs": state.config.resolve_operation_timeout().as_millis() as u64,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        if !state.browser_pool.available() {
            std::process::exit(2);
        }
        return Ok(());
    }

    let address = args
        .iter()
        .filter(|a| !a.starts_with("--"))
        .cloned()
        .collect::<Vec<_>>()
        .join(" ");
    if address.trim().is_empty() {
        anyhow::bail!("missing address; usage: {}", USAGE);
    }

    let outcome = state.lookup.lookup(&address).await;
    state.browser_pool.shutdown().await;

    match outcome {
        Ok(response) => {
            println!("{}", serde_json::to_string_pretty(&response)?);
            if !response.found() {
                std::process::exit(1);
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!("lookup failed [{}]: {}", e.code(), e);
            println!("{}", serde_json::to_string_pretty(&e.to_response())?);
            std::process::exit(3);
        }
    }
}
