//! IMAP connection and TLS helpers
//!
//! Provides the low-level `connect()` and `examine()` functions used by
//! [`MailSession`](crate::MailSession), and the mapping from async-imap
//! failures onto this crate's error kinds.

use crate::config::{ImapConfig, TlsMode};
use crate::error::{Error, Result, server_reason};
use crate::mailbox::MailboxName;
use async_imap::Session;
use async_imap::imap_proto::{Response, Status};
use rustls::pki_types::ServerName;
use std::fmt;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_util::compat::{Compat, TokioAsyncReadCompatExt};
use tracing::{debug, info};

/// A TLS-wrapped IMAP session.
pub type ImapSession = Session<Compat<tokio_rustls::client::TlsStream<TcpStream>>>;

/// Build the TLS connector for `config`.
///
/// Certificates are checked against the Mozilla root set unless the
/// config opts out with `accept_invalid_certs`.
fn tls_connector(config: &ImapConfig) -> Result<TlsConnector> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = rustls::ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| Error::Connectivity(format!("TLS setup failed: {e}")))?;

    let tls = if config.accept_invalid_certs {
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(DangerousVerifier))
            .with_no_client_auth()
    } else {
        let mut roots = rustls::RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        builder.with_root_certificates(roots).with_no_client_auth()
    };

    Ok(TlsConnector::from(Arc::new(tls)))
}

/// Open a fresh TLS-wrapped, logged-in IMAP session.
///
/// Connects to `config.host:config.port`, establishes TLS (directly or
/// via STARTTLS), checks the server greeting, and logs in.
pub async fn connect(config: &ImapConfig) -> Result<ImapSession> {
    let addr = format!("{}:{}", config.host, config.port);
    debug!(%addr, tls = ?config.tls, "Connecting to IMAP server");

    let tcp_stream = TcpStream::connect(&addr)
        .await
        .map_err(|e| Error::Connectivity(format!("{addr}: {e}")))?;

    let connector = tls_connector(config)?;
    let server_name = ServerName::try_from(config.host.clone())
        .map_err(|e| Error::Connectivity(format!("Invalid server name: {e}")))?;

    let tls_client = match config.tls {
        TlsMode::Implicit => {
            let tls_stream = connector
                .connect(server_name, tcp_stream)
                .await
                .map_err(|e| Error::Connectivity(format!("TLS handshake failed: {e}")))?;

            let mut client = async_imap::Client::new(tls_stream.compat());
            read_greeting(&mut client).await?;
            client
        }
        TlsMode::StartTls => {
            let mut client = async_imap::Client::new(tcp_stream.compat());
            read_greeting(&mut client).await?;

            client
                .run_command_and_check_ok("STARTTLS", None)
                .await
                .map_err(|e| Error::Protocol(format!("STARTTLS failed: {}", server_reason(&e))))?;

            let inner = client.into_inner().into_inner();
            let tls_stream = connector
                .connect(server_name, inner)
                .await
                .map_err(|e| Error::Connectivity(format!("TLS handshake failed: {e}")))?;

            async_imap::Client::new(tls_stream.compat())
        }
    };

    let session = tls_client
        .login(&config.username, &config.password)
        .await
        .map_err(|(e, _)| match e {
            async_imap::error::Error::No(_) => Error::Authentication(server_reason(&e)),
            other => transport_or_protocol(&other),
        })?;

    info!(host = %config.host, user = %config.username, "Connected to IMAP server");
    Ok(session)
}

/// EXAMINE (read-only SELECT) a mailbox and return its message count.
pub async fn examine(session: &mut ImapSession, mailbox: &MailboxName) -> Result<u32> {
    let selected = session.examine(mailbox.as_str()).await.map_err(|e| match e {
        async_imap::error::Error::No(_) => {
            Error::MailboxNotFound(format!("{mailbox}: {}", server_reason(&e)))
        }
        other => transport_or_protocol(&other),
    })?;

    debug!(%mailbox, exists = selected.exists, "Mailbox examined");
    Ok(selected.exists)
}

/// Classify a failure that is not a server refusal.
pub fn transport_or_protocol(err: &async_imap::error::Error) -> Error {
    match err {
        async_imap::error::Error::Io(_) => Error::Connectivity(server_reason(err)),
        _ => Error::Protocol(server_reason(err)),
    }
}

/// Consume the untagged greeting and require `OK` or `PREAUTH`.
async fn read_greeting<T>(client: &mut async_imap::Client<T>) -> Result<()>
where
    T: futures::io::AsyncRead + futures::io::AsyncWrite + Unpin + fmt::Debug + Send,
{
    let greeting = match client.read_response().await {
        Ok(Some(greeting)) => greeting,
        Ok(None) => {
            return Err(Error::Protocol(
                "Connection closed before server greeting".into(),
            ));
        }
        Err(e) => return Err(Error::Protocol(format!("Unreadable server greeting: {e}"))),
    };

    match greeting.parsed() {
        Response::Data {
            status: Status::Ok | Status::PreAuth,
            ..
        } => Ok(()),
        Response::Data {
            status,
            information,
            ..
        } => Err(Error::Protocol(format!(
            "Server greeting was {status:?}: {}",
            information.as_deref().unwrap_or_default().trim()
        ))),
        other => Err(Error::Protocol(format!(
            "Unexpected server greeting: {other:?}"
        ))),
    }
}

/// Certificate verifier that accepts all certificates
/// (for bridges and test servers with self-signed certs).
#[derive(Debug)]
struct DangerousVerifier;

impl rustls::client::danger::ServerCertVerifier for DangerousVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> std::result::Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}
