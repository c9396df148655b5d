//! Internal module for establishing TLS connections to IMAP servers.
//!
//! The socket is either opened directly or obtained from an HTTP CONNECT
//! tunnel; in both cases the TLS handshake runs before any IMAP byte is sent.

use crate::error::{Error, Result};
use crate::proxy::HttpProxy;
use rustls::ClientConfig;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::{debug, instrument};
use webpki_roots::TLS_SERVER_ROOTS;

/// A TLS stream over TCP, used for IMAP communication.
pub(crate) type TlsStream = tokio_rustls::client::TlsStream<TcpStream>;

/// Opens TLS connections, optionally through a tunnel strategy chosen at
/// construction.
#[derive(Clone)]
pub(crate) struct Transport {
    connector: TlsConnector,
    tunnel: Option<HttpProxy>,
}

impl Transport {
    /// Builds a transport. Without `tls_config` the bundled Mozilla roots are trusted.
    pub(crate) fn new(tunnel: Option<HttpProxy>, tls_config: Option<Arc<ClientConfig>>) -> Self {
        let connector = TlsConnector::from(tls_config.unwrap_or_else(default_tls_config));
        Self { connector, tunnel }
    }

    /// Connects to `host:port` and completes the TLS handshake with `host` as
    /// the expected certificate name.
    #[instrument(
        name = "connection::establish_tls",
        skip(self),
        fields(proxy_enabled = self.tunnel.is_some())
    )]
    pub(crate) async fn connect(&self, host: &str, port: u16) -> Result<TlsStream> {
        let server_name = parse_server_name(host)?;
        let tcp_stream = self.open_socket(host, port).await?;

        debug!("Performing TLS handshake");

        self.connector
            .connect(server_name, tcp_stream)
            .await
            .map_err(|source| Error::TlsConnect {
                target: format!("{host}:{port}"),
                source,
            })
    }

    async fn open_socket(&self, host: &str, port: u16) -> Result<TcpStream> {
        match &self.tunnel {
            Some(proxy) => proxy.open_tunnel(host, port).await,
            None => connect_direct(host, port).await,
        }
    }
}

/// Creates a TLS client config trusting the bundled Mozilla root certificates.
fn default_tls_config() -> Arc<ClientConfig> {
    let mut root_cert_store = rustls::RootCertStore::empty();
    root_cert_store.add_trust_anchors(TLS_SERVER_ROOTS.iter().map(|ta| {
        rustls::OwnedTrustAnchor::from_subject_spki_name_constraints(
            ta.subject,
            ta.spki,
            ta.name_constraints,
        )
    }));

    let tls_config = ClientConfig::builder()
        .with_safe_defaults()
        .with_root_certificates(root_cert_store)
        .with_no_client_auth();

    Arc::new(tls_config)
}

/// Parses server name for TLS SNI and certificate verification.
fn parse_server_name(host: &str) -> Result<rustls::ServerName> {
    rustls::ServerName::try_from(host).map_err(|source| Error::InvalidDnsName {
        host: host.to_string(),
        source,
    })
}

#[instrument(name = "connection::direct", skip_all)]
async fn connect_direct(host: &str, port: u16) -> Result<TcpStream> {
    debug!(host, port, "Establishing direct TCP connection");

    TcpStream::connect((host, port))
        .await
        .map_err(|source| Error::TcpConnect {
            target: format!("{host}:{port}"),
            source,
        })
}
