//! Loopback control server
//!
//! Provides request-response communication and push notifications of app
//! events to subscribed clients. A tray agent or view front end drives the
//! app through this server.

use std::net::SocketAddr;

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use crate::app::{AppHandle, Command, HandleError};
use crate::events::AppEvent;

use super::protocol::{Notification, Request, Response, MAX_MESSAGE_LEN};

/// Control server handling client connections
pub struct Server {
    listener: TcpListener,
    app: AppHandle,
    events: broadcast::Sender<AppEvent>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Server {
    /// Bind the control server
    pub async fn bind(
        addr: SocketAddr,
        app: AppHandle,
        events: broadcast::Sender<AppEvent>,
    ) -> Result<Self> {
        if !addr.ip().is_loopback() {
            warn!(%addr, "control server bound to a non-loopback address");
        }

        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind control server on {addr}"))?;

        let (shutdown_tx, _) = broadcast::channel(1);

        info!(addr = %listener.local_addr()?, "control server listening");

        Ok(Self {
            listener,
            app,
            events,
            shutdown_tx,
        })
    }

    #[cfg(test)]
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Run the server, accepting connections
    pub async fn run(&self) -> Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    debug!(%peer, "client connected");
                    let app = self.app.clone();
                    let events = self.events.clone();
                    let mut shutdown_rx = self.shutdown_tx.subscribe();

                    tokio::spawn(async move {
                        tokio::select! {
                            result = handle_client(stream, app, events) => {
                                if let Err(e) = result {
                                    warn!(?e, "client handler error");
                                }
                            }
                            _ = shutdown_rx.recv() => {
                                debug!("client handler shutting down");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(?e, "accept error");
                }
            }
        }
    }

    /// Disconnect every client
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
        info!("control server shutdown complete");
    }
}

/// Serve one client until it disconnects
async fn handle_client(
    stream: TcpStream,
    app: AppHandle,
    events: broadcast::Sender<AppEvent>,
) -> Result<()> {
    let (mut reader, mut writer) = stream.into_split();

    // Frames are read on their own task so a pushed notification never
    // interrupts a half-read request.
    let (request_tx, mut request_rx) = mpsc::channel::<Vec<u8>>(8);
    let reader_task = tokio::spawn(async move {
        loop {
            match read_frame(&mut reader).await {
                Ok(Some(frame)) => {
                    if request_tx.send(frame).await.is_err() {
                        break;
                    }
                }
                Ok(None) => {
                    debug!("client disconnected");
                    break;
                }
                Err(e) => {
                    warn!(?e, "failed to read request");
                    break;
                }
            }
        }
    });

    let mut subscription: Option<broadcast::Receiver<AppEvent>> = None;

    let result = loop {
        tokio::select! {
            frame = request_rx.recv() => {
                let Some(frame) = frame else { break Ok(()) };
                let response = match serde_json::from_slice::<Request>(&frame) {
                    Ok(request) => {
                        debug!(?request, "received request");
                        if matches!(request, Request::Subscribe) && subscription.is_none() {
                            subscription = Some(events.subscribe());
                            debug!("client subscribed to notifications");
                        }
                        process_request(request, &app).await
                    }
                    Err(e) => Response::error("bad_request", e.to_string()),
                };
                if let Err(e) = write_frame(&mut writer, &response).await {
                    break Err(e);
                }
            }
            event = next_event(&mut subscription) => match event {
                Ok(event) => {
                    let note = Notification::Event { event };
                    if let Err(e) = write_frame(&mut writer, &note).await {
                        break Err(e);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    subscription = None;
                }
            },
        }
    };

    reader_task.abort();
    result
}

/// Next event for a subscribed client; never resolves otherwise
async fn next_event(
    subscription: &mut Option<broadcast::Receiver<AppEvent>>,
) -> Result<AppEvent, broadcast::error::RecvError> {
    match subscription {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Process a request and return a response
async fn process_request(request: Request, app: &AppHandle) -> Response {
    match dispatch(request, app).await {
        Ok(response) => response,
        Err(e) => Response::error("unavailable", e.to_string()),
    }
}

async fn dispatch(request: Request, app: &AppHandle) -> Result<Response, HandleError> {
    let response = match request {
        Request::Ping => Response::Pong,
        Request::Subscribe => Response::Subscribed,
        Request::GetStatus => Response::Status(app.status().await?),

        Request::Show => ack(app, Command::Show).await?,
        Request::Hide => ack(app, Command::Hide).await?,
        Request::Toggle => ack(app, Command::Toggle).await?,
        Request::Exit => ack(app, Command::Exit).await?,
        Request::Minimize => ack(app, Command::Minimized).await?,
        Request::Close => ack(app, Command::CloseRequested).await?,

        Request::Query { category, search } => Response::Shortcuts {
            shortcuts: app.query(category, search).await?,
        },
        Request::ListCategories => Response::Categories(app.categories().await?),

        Request::AddShortcut { shortcut } => Response::Shortcut {
            shortcut: Some(app.add_shortcut(shortcut).await?),
        },
        Request::UpdateShortcut { id, patch } => Response::Shortcut {
            shortcut: app.update_shortcut(id, patch).await?,
        },
        Request::RemoveShortcut { id } => {
            let removed = app.remove_shortcut(id.clone()).await?;
            Response::Removed { id, removed }
        }

        Request::GetSettings => Response::Settings {
            settings: app.settings().await?,
        },
        Request::UpdateSettings { settings } => Response::Settings {
            settings: app.update_settings(settings).await?,
        },
    };
    Ok(response)
}

async fn ack(app: &AppHandle, command: Command) -> Result<Response, HandleError> {
    app.send(command).await?;
    Ok(Response::Ack)
}

/// Read one length-prefixed frame; `None` on clean disconnect
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_MESSAGE_LEN {
        bail!("message too large: {len} bytes");
    }

    let mut msg_buf = vec![0u8; len];
    reader.read_exact(&mut msg_buf).await?;
    Ok(Some(msg_buf))
}

/// Send a length-prefixed JSON message
pub async fn write_frame<W, T>(writer: &mut W, msg: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: serde::Serialize,
{
    let msg_bytes = serde_json::to_vec(msg)?;
    let msg_len = (msg_bytes.len() as u32).to_le_bytes();

    writer.write_all(&msg_len).await?;
    writer.write_all(&msg_bytes).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::Controller;
    use crate::hotkey::testing::FakeBackend;
    use crate::hotkey::HotkeyRegistrar;
    use crate::settings::{Settings, WindowGeometry};
    use crate::store::{LoadSource, PersistQueue, ShortcutRecord, ShortcutStore};
    use crate::window::HeadlessWindow;

    async fn start_app() -> (SocketAddr, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let (queue, _task) = PersistQueue::spawn();
        let store = ShortcutStore::from_parts(
            dir.path().join("shortcuts.json"),
            vec![ShortcutRecord {
                category: "Browser".into(),
                keys: "Ctrl + T".into(),
                description: "New Tab".into(),
                ..Default::default()
            }],
            Vec::new(),
            LoadSource::User,
            queue.clone(),
        );
        let (hotkey_tx, hotkey_rx) = mpsc::channel(8);
        let (event_tx, _) = broadcast::channel(32);
        let (command_tx, command_rx) = mpsc::channel(8);

        let mut controller = Controller::new(
            store,
            Settings::default(),
            dir.path().join("settings.json"),
            queue,
            HotkeyRegistrar::new(FakeBackend::default(), hotkey_tx),
            HeadlessWindow::new(WindowGeometry::default()),
            event_tx.clone(),
        );
        tokio::spawn(async move { controller.run(hotkey_rx, command_rx).await });

        let server = Server::bind(
            "127.0.0.1:0".parse().unwrap(),
            AppHandle::new(command_tx),
            event_tx,
        )
        .await
        .unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(async move { server.run().await });

        (addr, dir)
    }

    async fn call(stream: &mut TcpStream, request: &Request) -> serde_json::Value {
        write_frame(stream, request).await.unwrap();
        receive(stream).await
    }

    async fn receive(stream: &mut TcpStream) -> serde_json::Value {
        let frame = read_frame(stream).await.unwrap().unwrap();
        serde_json::from_slice(&frame).unwrap()
    }

    #[tokio::test]
    async fn test_ping_and_query() {
        let (addr, _dir) = start_app().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        assert_eq!(call(&mut stream, &Request::Ping).await["type"], "pong");

        let reply = call(
            &mut stream,
            &Request::Query {
                category: Some("All".into()),
                search: Some("tab".into()),
            },
        )
        .await;
        assert_eq!(reply["type"], "shortcuts");
        assert_eq!(reply["shortcuts"][0]["keys"], "Ctrl + T");
    }

    #[tokio::test]
    async fn test_subscriber_receives_events() {
        let (addr, _dir) = start_app().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        assert_eq!(call(&mut stream, &Request::Subscribe).await["type"], "subscribed");
        assert_eq!(call(&mut stream, &Request::Toggle).await["type"], "ack");

        let note = receive(&mut stream).await;
        assert_eq!(note["type"], "event");
        assert_eq!(note["event"]["type"], "window_shown");
    }

    #[tokio::test]
    async fn test_close_keeps_app_running() {
        let (addr, _dir) = start_app().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        assert_eq!(call(&mut stream, &Request::Show).await["type"], "ack");
        assert_eq!(call(&mut stream, &Request::Close).await["type"], "ack");

        let status = call(&mut stream, &Request::GetStatus).await;
        assert_eq!(status["type"], "status");
        assert_eq!(status["window_visible"], false);
        assert_eq!(status["shortcut_count"], 1);
    }

    #[tokio::test]
    async fn test_bad_request_gets_error_response() {
        let (addr, _dir) = start_app().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        let body = br#"{"type":"launch_rockets"}"#;
        stream.write_all(&(body.len() as u32).to_le_bytes()).await.unwrap();
        stream.write_all(body).await.unwrap();

        let reply = receive(&mut stream).await;
        assert_eq!(reply["type"], "error");
        assert_eq!(reply["code"], "bad_request");

        // The connection stays usable
        assert_eq!(call(&mut stream, &Request::Ping).await["type"], "pong");
    }
}
