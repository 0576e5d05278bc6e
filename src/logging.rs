use serde_json::Value;
use tracing::info;

/// Records an administrative action under the `erp::audit` target.
pub fn audit(action: &str, actor: &str, details: &Value) {
    info!(target: "erp::audit", action, actor, details = %details, "audit");
}

#[cfg(feature = "server")]
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}
