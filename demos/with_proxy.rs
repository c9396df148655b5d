//! Example: Wait for a confirmation code through an HTTP proxy.
//!
//! The IMAP connection is tunneled with HTTP `CONNECT` before the TLS
//! handshake, so the proxy only ever sees encrypted bytes.
//!
//! # Usage
//!
//! ```bash
//! export EMAIL_ADDRESS="your@email.com"
//! export EMAIL_PASSWORD="your-app-password"
//! export PROXY_HOST="proxy.example.com"
//! export PROXY_PORT="8080"
//! export PROXY_USER="username"
//! export PROXY_PASS="password"
//!
//! cargo run --example with_proxy
//! ```

use chrono::Utc;
use email_code::{login, wait_for_code, LoginConfig};
use std::env;
use std::time::Duration;

#[tokio::main]
async fn main() -> email_code::Result<()> {
    // Email credentials
    let email = env::var("EMAIL_ADDRESS").expect("EMAIL_ADDRESS environment variable required");
    let password =
        env::var("EMAIL_PASSWORD").expect("EMAIL_PASSWORD environment variable required");

    // Proxy configuration: all four values are required once a host is given
    let proxy_host = env::var("PROXY_HOST").expect("PROXY_HOST environment variable required");
    let proxy_port: u16 = env::var("PROXY_PORT")
        .expect("PROXY_PORT environment variable required")
        .parse()
        .expect("PROXY_PORT must be a valid port number");
    let proxy_user = env::var("PROXY_USER").expect("PROXY_USER environment variable required");
    let proxy_pass = env::var("PROXY_PASS").expect("PROXY_PASS environment variable required");

    let config = LoginConfig::builder()
        .imap_proxy_host(&proxy_host)
        .imap_proxy_port(proxy_port)
        .imap_proxy_user(proxy_user)
        .imap_proxy_pass(proxy_pass)
        // Tunnels are slower to set up
        .connect_timeout(Duration::from_secs(60))
        .build()?;

    if let Some(proxy) = config.proxy() {
        println!("Using HTTP proxy {proxy}");
    }
    println!("Connecting to IMAP server for {email} via proxy...");

    let started = Utc::now();
    let mut session = login(&email, &password, &config).await?;

    println!("Connected via proxy!");
    println!("IMAP Host: {}", session.imap_host());
    println!(
        "\nWaiting up to {} sec for a confirmation code...",
        config.polling.timeout.as_secs()
    );

    match wait_for_code(&mut session, &email, Some(started), &config.polling).await {
        Ok(code) => println!("Got code: {code}"),
        Err(e) => println!("No code: {e}"),
    }

    session.logout().await?;

    println!("\nDisconnected from proxy.");
    Ok(())
}
