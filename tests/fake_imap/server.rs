//! In-process fake IMAP server for integration testing
//!
//! # Connection lifecycle
//!
//! ```text
//!   Client connects via TCP
//!       |
//!   Implicit TLS: TLS handshake right away (IMAPS, port 993)
//!       |
//!   Server sends greeting: "* OK IMAP4rev1 ready\r\n"
//!       |
//!   STARTTLS mode: client sends STARTTLS, then the TLS handshake
//!       |
//!   Client sends LOGIN with username and password
//!       |
//!   Client issues commands: EXAMINE, UID SEARCH, UID FETCH, CLOSE
//!       |
//!   Client sends LOGOUT
//! ```
//!
//! ## Command format
//!
//! Every client command starts with a **tag** chosen by the client
//! (async-imap uses `A0001`, `A0002`, etc.). The server echoes it in
//! the completion response. Lines prefixed with `*` are **untagged**
//! data sent before the tagged OK/NO/BAD:
//!
//! ```text
//!   Client:  A0003 UID SEARCH SUBJECT "invoice"
//!   Server:  * SEARCH 4 7
//!   Server:  A0003 OK SEARCH completed
//! ```
//!
//! ## FETCH and literals
//!
//! Message bodies travel as **counted literals**: `{bytecount}\r\n`
//! followed by exactly that many raw bytes:
//!
//! ```text
//!   * 1 FETCH (UID 42 BODY[] {1234}
//!   <exactly 1234 bytes of raw RFC 5322 message>
//!   )
//! ```

use super::handlers::{
    handle_close, handle_examine, handle_login, handle_logout, handle_uid_fetch,
    handle_uid_search,
};
use super::io::write_line;
use super::mailbox::Mailbox;
use imap_codec::CommandCodec;
use imap_codec::decode::Decoder;
use imap_codec::imap_types::command::CommandBody;
use imap_codec::imap_types::mailbox::Mailbox as ImapMailbox;
use rcgen::generate_simple_self_signed;
use rustls::pki_types::PrivatePkcs8KeyDer;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;

/// How the server sets up TLS on each connection.
#[derive(Debug, Clone, Copy, Default)]
pub enum Transport {
    /// TLS from the first byte.
    #[default]
    Implicit,
    /// Plaintext greeting, then STARTTLS.
    StartTls,
}

/// Per-server behavior knobs.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub transport: Transport,
    /// Full greeting line, CRLF included.
    pub greeting: String,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            transport: Transport::Implicit,
            greeting: "* OK IMAP4rev1 Fake server ready\r\n".to_string(),
        }
    }
}

impl ServerOptions {
    pub fn starttls() -> Self {
        Self {
            transport: Transport::StartTls,
            ..Self::default()
        }
    }

    pub fn greeting(mut self, line: &str) -> Self {
        self.greeting = format!("{line}\r\n");
        self
    }
}

/// A fake IMAP server that runs on localhost with an OS-assigned port.
///
/// The server generates a self-signed TLS certificate at startup using
/// `rcgen`, so clients must be configured to accept invalid
/// certificates (or expect the handshake to fail).
pub struct FakeImapServer {
    port: u16,
    /// Handle to the background task so it lives as long as the server.
    handle: tokio::task::JoinHandle<()>,
}

impl FakeImapServer {
    /// Start an implicit-TLS server with the default greeting.
    pub async fn start(mailbox: Mailbox) -> Self {
        Self::start_with(mailbox, ServerOptions::default()).await
    }

    /// Start a server with the given mailbox state and options.
    ///
    /// Binds to `127.0.0.1:0` so the OS picks a free port, then spawns
    /// a tokio task that accepts connections until the server is
    /// dropped.
    pub async fn start_with(mailbox: Mailbox, options: ServerOptions) -> Self {
        // Multiple tests may race to install the provider; losing the
        // race is fine.
        let _ = rustls::crypto::ring::default_provider().install_default();

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind to ephemeral port");
        let port = listener.local_addr().unwrap().port();

        let cert = generate_simple_self_signed(vec!["127.0.0.1".to_string()])
            .expect("generate self-signed cert");

        let cert_der = cert.cert.der().clone();
        let key_der = PrivatePkcs8KeyDer::from(cert.key_pair.serialize_der());

        let tls_config = rustls::ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(vec![cert_der], key_der.into())
            .expect("build server TLS config");

        let acceptor = TlsAcceptor::from(Arc::new(tls_config));
        let mailbox = Arc::new(mailbox);
        let options = Arc::new(options);

        let handle = tokio::spawn(async move {
            loop {
                let Ok((stream, _addr)) = listener.accept().await else {
                    break;
                };
                let acceptor = acceptor.clone();
                let mailbox = mailbox.clone();
                let options = options.clone();
                tokio::spawn(async move {
                    handle_connection(stream, acceptor, &mailbox, &options).await;
                });
            }
        });

        Self { port, handle }
    }

    /// The port the server is listening on.
    pub const fn port(&self) -> u16 {
        self.port
    }
}

impl Drop for FakeImapServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn handle_connection(
    stream: TcpStream,
    acceptor: TlsAcceptor,
    mailbox: &Mailbox,
    options: &ServerOptions,
) {
    match options.transport {
        Transport::Implicit => {
            let Ok(tls_stream) = acceptor.accept(stream).await else {
                return;
            };
            let mut reader = BufReader::new(tls_stream);
            if write_line(&mut reader, &options.greeting).await.is_err() {
                return;
            }
            handle_imap_session(reader, mailbox).await;
        }
        Transport::StartTls => {
            let mut reader = BufReader::new(stream);
            if write_line(&mut reader, &options.greeting).await.is_err() {
                return;
            }
            if !accept_starttls(&mut reader).await {
                return;
            }

            let tcp = reader.into_inner();
            let Ok(tls_stream) = acceptor.accept(tcp).await else {
                return;
            };
            handle_imap_session(BufReader::new(tls_stream), mailbox).await;
        }
    }
}

/// Read one plaintext command and answer it if it is STARTTLS.
async fn accept_starttls(reader: &mut BufReader<TcpStream>) -> bool {
    let mut line = String::new();
    if reader.read_line(&mut line).await.is_err() {
        return false;
    }

    let parts: Vec<&str> = line.trim().splitn(2, ' ').collect();
    if parts.len() < 2 {
        return false;
    }
    let tag = parts[0];

    if !parts[1].eq_ignore_ascii_case("STARTTLS") {
        let resp = format!("{tag} BAD Expected STARTTLS\r\n");
        let _ = write_line(reader, &resp).await;
        return false;
    }

    let resp = format!("{tag} OK Begin TLS negotiation now\r\n");
    write_line(reader, &resp).await.is_ok()
}

/// Extract the folder name from a parsed `imap_types::Mailbox`.
fn mailbox_name(mb: &ImapMailbox<'_>) -> String {
    match mb {
        ImapMailbox::Inbox => "INBOX".to_string(),
        ImapMailbox::Other(other) => {
            let bytes: &[u8] = other.as_ref();
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

/// Run the IMAP command loop over an established stream.
///
/// Uses `imap-codec`'s `CommandCodec` to parse each client command
/// into a strongly-typed `Command`, then dispatches on the
/// `CommandBody` variant. Anything this reader never sends is answered
/// with BAD.
async fn handle_imap_session<S: AsyncRead + AsyncWrite + Unpin>(
    mut reader: BufReader<S>,
    mailbox: &Mailbox,
) {
    let mut authenticated = false;
    let mut selected_folder: Option<String> = None;
    let codec = CommandCodec::default();

    loop {
        let mut line = String::new();
        match reader.read_line(&mut line).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let Ok((_, command)) = codec.decode(line.as_bytes()) else {
            let tag = trimmed.split_whitespace().next().unwrap_or("*");
            let resp = format!("{tag} BAD Parse error\r\n");
            if write_line(&mut reader, &resp).await.is_err() {
                break;
            }
            continue;
        };

        let tag = command.tag.inner();

        match command.body {
            CommandBody::Login {
                ref username,
                ref password,
                ..
            } => {
                authenticated =
                    handle_login(tag, username.as_ref(), password.declassify().as_ref(), &mut reader)
                        .await;
            }
            CommandBody::Logout => {
                handle_logout(tag, &mut reader).await;
                break;
            }
            _ if !authenticated => {
                let resp = format!("{tag} BAD Not authenticated\r\n");
                if write_line(&mut reader, &resp).await.is_err() {
                    break;
                }
            }
            CommandBody::Examine { mailbox: ref mb, .. } => {
                let name = mailbox_name(mb);
                selected_folder = handle_examine(tag, &name, mailbox, &mut reader).await;
            }
            CommandBody::Search {
                ref criteria,
                uid: true,
                ..
            } => {
                handle_uid_search(
                    tag,
                    criteria.as_ref(),
                    mailbox,
                    selected_folder.as_deref(),
                    &mut reader,
                )
                .await;
            }
            CommandBody::Fetch {
                ref sequence_set,
                uid: true,
                ..
            } => {
                handle_uid_fetch(
                    tag,
                    sequence_set,
                    mailbox,
                    selected_folder.as_deref(),
                    &mut reader,
                )
                .await;
            }
            CommandBody::Close => {
                handle_close(tag, selected_folder.take().is_some(), &mut reader).await;
            }
            _ => {
                let resp = format!("{tag} BAD Unknown command\r\n");
                if write_line(&mut reader, &resp).await.is_err() {
                    break;
                }
            }
        }
    }
}
