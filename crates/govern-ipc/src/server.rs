//! Governor-side Sipc listener
//!
//! Children the governor spawned dial back here, identify themselves with a
//! single `hello {port} {appName}` line, and stay connected so the governor
//! can push advisory commands. Sessions are owned by the server; everyone
//! else holds a non-owning [`SessionSender`].

use govern_util::AppName;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::{SipcError, SipcResult, HELLO_WORD};

/// Notifications from the server to its owner (the governor)
#[derive(Debug)]
pub enum ServerEvent {
    /// A child identified itself; the sender reaches that child's session
    ChildConnected {
        app: AppName,
        sender: SessionSender,
    },
    /// A child's session ended (EOF or read error)
    ChildDisconnected { app: AppName },
    /// A non-hello line received from a child
    Line { app: AppName, line: String },
}

/// Non-owning handle for pushing commands to one child's session.
///
/// Cloneable and cheap; sending fails once the session is gone, which the
/// caller treats as advisory-message loss.
#[derive(Debug, Clone)]
pub struct SessionSender {
    tx: mpsc::UnboundedSender<String>,
}

impl SessionSender {
    /// Queue a single-line command for the child. Fails if the session
    /// has already closed.
    pub fn send_command(&self, command: &str) -> SipcResult<()> {
        self.tx
            .send(command.to_string())
            .map_err(|_| SipcError::ConnectionClosed)
    }
}

/// Sipc server
pub struct SipcServer {
    bind_host: String,
    listener: Option<TcpListener>,
    port: u16,
    sessions: Arc<RwLock<HashMap<AppName, SessionSender>>>,
    event_tx: mpsc::UnboundedSender<ServerEvent>,
    event_rx: Arc<Mutex<Option<mpsc::UnboundedReceiver<ServerEvent>>>>,
}

impl SipcServer {
    /// Create a new server for the given host. The port may be 0 for an
    /// OS-assigned port; `start` resolves the real one.
    pub fn new(bind_host: impl Into<String>, port: u16) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        Self {
            bind_host: bind_host.into(),
            listener: None,
            port,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            event_tx,
            event_rx: Arc::new(Mutex::new(Some(event_rx))),
        }
    }

    /// Bind the listener and resolve the port
    pub async fn start(&mut self) -> SipcResult<()> {
        let listener = TcpListener::bind((self.bind_host.as_str(), self.port)).await?;
        self.port = listener.local_addr()?.port();

        info!(host = %self.bind_host, port = self.port, "Sipc listening");

        self.listener = Some(listener);
        Ok(())
    }

    /// The resolved listen port (valid after `start`)
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Get receiver for server events
    pub async fn take_event_receiver(&self) -> Option<mpsc::UnboundedReceiver<ServerEvent>> {
        self.event_rx.lock().await.take()
    }

    /// Get the session sender for a named child, if connected
    pub async fn sender_for(&self, app: &AppName) -> Option<SessionSender> {
        self.sessions.read().await.get(app).cloned()
    }

    /// Connected child count
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Accept connections in a loop
    pub async fn run(&self) -> SipcResult<()> {
        let listener = self
            .listener
            .as_ref()
            .ok_or_else(|| SipcError::ServerError("Server not started".into()))?;

        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    debug!(peer = %peer, "Child connecting");
                    self.handle_child(stream).await;
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    async fn handle_child(&self, stream: TcpStream) {
        let (read_half, write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        let sessions = self.sessions.clone();
        let event_tx = self.event_tx.clone();
        let own_port = self.port;

        tokio::spawn(async move {
            // The first line must identify the child: `hello {port} {app}`
            let mut hello = String::new();
            match reader.read_line(&mut hello).await {
                Ok(0) => {
                    debug!("Child disconnected before hello");
                    return;
                }
                Ok(_) => {}
                Err(e) => {
                    debug!(error = %e, "Read error before hello");
                    return;
                }
            }

            let app = match parse_hello(hello.trim(), own_port) {
                Ok(app) => app,
                Err(e) => {
                    warn!(error = %e, line = %hello.trim(), "Rejecting child");
                    return;
                }
            };

            info!(app = %app, "Child identified");

            let (command_tx, mut command_rx) = mpsc::unbounded_channel::<String>();
            let sender = SessionSender { tx: command_tx };

            {
                let mut sessions = sessions.write().await;
                if sessions.insert(app.clone(), sender.clone()).is_some() {
                    warn!(app = %app, "Replacing existing session");
                }
            }

            let _ = event_tx.send(ServerEvent::ChildConnected {
                app: app.clone(),
                sender,
            });

            // Writer task: queued commands -> child, one per line
            let writer_app = app.clone();
            tokio::spawn(async move {
                let mut writer = write_half;
                while let Some(command) = command_rx.recv().await {
                    let mut msg = command;
                    msg.push('\n');
                    if let Err(e) = writer.write_all(msg.as_bytes()).await {
                        debug!(app = %writer_app, error = %e, "Write error");
                        break;
                    }
                }
            });

            // Reader loop: lines from the child until EOF
            let mut line = String::new();
            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) => {
                        debug!(app = %app, "Child disconnected (EOF)");
                        break;
                    }
                    Ok(_) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        let _ = event_tx.send(ServerEvent::Line {
                            app: app.clone(),
                            line: line.to_string(),
                        });
                    }
                    Err(e) => {
                        debug!(app = %app, error = %e, "Read error");
                        break;
                    }
                }
            }

            sessions.write().await.remove(&app);
            let _ = event_tx.send(ServerEvent::ChildDisconnected { app });
        });
    }
}

/// Parse `hello {port} {app}`, checking the port names this governor.
fn parse_hello(line: &str, own_port: u16) -> SipcResult<AppName> {
    let mut words = line.split_whitespace();

    match words.next() {
        Some(w) if w == HELLO_WORD => {}
        _ => return Err(SipcError::InvalidHello(line.to_string())),
    }

    let port: u16 = words
        .next()
        .and_then(|p| p.parse().ok())
        .ok_or_else(|| SipcError::InvalidHello(line.to_string()))?;

    if port != own_port {
        return Err(SipcError::InvalidHello(format!(
            "port {port} does not match listener port {own_port}"
        )));
    }

    let app = words
        .next()
        .ok_or_else(|| SipcError::InvalidHello(line.to_string()))?;

    if words.next().is_some() {
        return Err(SipcError::InvalidHello(line.to_string()));
    }

    Ok(AppName::new(app))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_hello_accepts_matching_port() {
        let app = parse_hello("hello 4410 billing", 4410).unwrap();
        assert_eq!(app, AppName::new("billing"));
    }

    #[test]
    fn parse_hello_rejects_wrong_port() {
        assert!(parse_hello("hello 4411 billing", 4410).is_err());
    }

    #[test]
    fn parse_hello_rejects_garbage() {
        assert!(parse_hello("howdy 4410 billing", 4410).is_err());
        assert!(parse_hello("hello billing", 4410).is_err());
        assert!(parse_hello("hello 4410", 4410).is_err());
        assert!(parse_hello("hello 4410 billing extra", 4410).is_err());
    }

    #[tokio::test]
    async fn server_binds_dynamic_port() {
        let mut server = SipcServer::new("127.0.0.1", 0);
        server.start().await.unwrap();
        assert_ne!(server.port(), 0);
    }
}
