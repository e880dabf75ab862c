//! Login, call the API, and check navigation against a running asset backend
//!
//! Usage:
//!   ASSET_API_BASE_URL=http://localhost:8080/api \
//!   ASSET_USERNAME=admin ASSET_PASSWORD=admin123 \
//!   cargo run --example login_flow

use asset_rs_client::{ClientConfig, GuardDecision, HttpClient, RouteGuard, SessionStore};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,asset_rs_client=debug")),
        )
        .init();

    let config = ClientConfig::from_env()?;
    let username = std::env::var("ASSET_USERNAME").unwrap_or_else(|_| "admin".to_string());
    let password = std::env::var("ASSET_PASSWORD").unwrap_or_else(|_| "admin123".to_string());

    println!("=== Asset Rust Client Example ===");
    println!("API: {}", config.base_url);
    println!("User: {}", username);
    println!();

    let session = SessionStore::from_config(config)?;
    if !session.is_authenticated() {
        session.login(&username, &password).await?;
    }
    println!("✓ Logged in as {}", session.username());
    println!("  Roles: {:?}", session.roles());
    println!("  Permissions: {:?}", session.permissions());
    println!();

    let client = HttpClient::new(session.clone())?;
    match client.get::<Value>("/assets").await {
        Ok(assets) => println!("✓ Assets: {assets}"),
        Err(e) => println!("! Failed to list assets: {e}"),
    }
    println!();

    let guard = RouteGuard::default();
    for route in guard.routes().routes() {
        let verdict = match guard.navigate(&route.path, session.as_ref()) {
            GuardDecision::Allow => "allowed".to_string(),
            GuardDecision::Redirect(redirect) => format!("redirect -> {}", redirect.target()),
        };
        println!("  {:<24} {}", route.path, verdict);
    }
    println!();

    session.logout()?;
    println!("Done!");

    Ok(())
}
