use std::fs;
use std::io::ErrorKind;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc};

use patchwire_core::SessionId;
use patchwire_renderer::{Render, RenderContext, TemplateEngine, TemplateRenderer};
use patchwire_sync::{
    DeliveryChannel, DeliveryError, PipelineConfig, RenderPipeline, SessionRegistry,
    TracingObserver,
};

use crate::error::{io_err, DaemonError};
use crate::protocol::{DaemonRequest, DaemonResponse};
use crate::settings::{LogFormat, Settings};

/// Outgoing lines buffered per connection before writers apply backpressure.
const CONNECTION_BUFFER: usize = 64;

/// How long a closing connection may take to flush its queued lines.
const WRITER_DRAIN: Duration = Duration::from_secs(1);

/// Shared by every connection.
struct DaemonState {
    settings: Settings,
    renderer: Arc<dyn Render>,
    registry: SessionRegistry,
    started_at_unix: u64,
}

/// Delivers a session's events to the connection that joined it.
struct ConnectionDelivery {
    out: mpsc::Sender<String>,
}

#[async_trait]
impl DeliveryChannel for ConnectionDelivery {
    async fn deliver(&self, session: &SessionId, payload: &str) -> Result<(), DeliveryError> {
        let session = serde_json::to_string(session)
            .map_err(|err| DeliveryError::Failed(err.to_string()))?;
        // `payload` is already an encoded event.
        let line = format!("{{\"session\":{session},\"event\":{payload}}}");
        self.out.send(line).await.map_err(|_| DeliveryError::Closed)
    }
}

/// Start the daemon runtime and block the current thread until it exits.
pub fn start_blocking(settings: Settings) -> Result<(), DaemonError> {
    init_tracing(&settings.log_filter, settings.log_format);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(settings))
}

/// Run the daemon runtime.
pub async fn run(settings: Settings) -> Result<(), DaemonError> {
    let engine = TemplateEngine::from_dir(&settings.templates)?;
    let renderer: Arc<dyn Render> = Arc::new(TemplateRenderer::new(engine, settings.template.clone())?);
    tracing::info!(
        templates = %settings.templates.display(),
        template = %settings.template,
        "templates loaded",
    );

    let state = Arc::new(DaemonState {
        settings,
        renderer,
        registry: SessionRegistry::new(),
        started_at_unix: unix_seconds_now(),
    });
    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    let socket_handle = {
        let shutdown = shutdown_tx.clone();
        let state = state.clone();
        tokio::spawn(async move {
            let result = socket_server_task(state, shutdown.clone(), shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let mut shutdown_rx = shutdown.subscribe();
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down daemon");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(DaemonError::Protocol(format!("ctrl-c handler failed: {err}"))),
                    }
                }
            }
        })
    };

    let (socket_result, signal_result) = tokio::join!(socket_handle, signal_handle);
    handle_join("socket_server", socket_result)?;
    handle_join("signal_handler", signal_result)?;
    Ok(())
}

async fn socket_server_task(
    state: Arc<DaemonState>,
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let socket = state.settings.socket.clone();
    if let Some(dir) = socket.parent() {
        if !dir.exists() {
            fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        }
    }
    prepare_socket_for_bind(&socket)?;

    let listener = UnixListener::bind(&socket).map_err(|e| io_err(&socket, e))?;
    set_socket_permissions(&socket)?;
    tracing::info!(socket = %socket.display(), "daemon listening");

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            accepted = listener.accept() => {
                let (stream, _) = accepted.map_err(|e| io_err(&socket, e))?;
                let state = state.clone();
                let shutdown_tx = shutdown_tx.clone();
                tokio::spawn(async move {
                    if let Err(err) = handle_socket_client(stream, state, shutdown_tx).await {
                        tracing::error!(error = %err, "socket client error");
                    }
                });
            }
        }
    }

    if socket.exists() {
        let _ = fs::remove_file(&socket);
    }
    Ok(())
}

async fn handle_socket_client(
    stream: UnixStream,
    state: Arc<DaemonState>,
    shutdown_tx: broadcast::Sender<()>,
) -> Result<(), DaemonError> {
    let (reader, writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    // Responses and pushed events share one ordered outgoing queue.
    let (out_tx, out_rx) = mpsc::channel::<String>(CONNECTION_BUFFER);
    let writer_task = tokio::spawn(async move {
        if let Err(err) = write_lines(writer, out_rx).await {
            tracing::debug!(error = %err, "connection writer stopped");
        }
    });

    let mut joined: Vec<SessionId> = Vec::new();
    let result = serve_requests(&mut lines, &state, &out_tx, &mut joined).await;

    for session in joined {
        if state.registry.close(&session).await.is_ok() {
            tracing::info!(session = %session, "session closed with its connection");
        }
    }

    // The stop response must reach the client before the runtime winds down.
    drop(out_tx);
    let _ = tokio::time::timeout(WRITER_DRAIN, writer_task).await;
    let stop_requested = result?;
    if stop_requested {
        let _ = shutdown_tx.send(());
    }
    Ok(())
}

/// Serve requests until the client hangs up or sends `stop`. Returns whether
/// `stop` was requested.
async fn serve_requests(
    lines: &mut Lines<BufReader<OwnedReadHalf>>,
    state: &DaemonState,
    out_tx: &mpsc::Sender<String>,
    joined: &mut Vec<SessionId>,
) -> Result<bool, DaemonError> {
    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| io_err("daemon socket read", e))?
    {
        if line.trim().is_empty() {
            continue;
        }

        let request: Result<DaemonRequest, _> = serde_json::from_str(&line);
        let request = match request {
            Ok(request) => request,
            Err(err) => {
                send_response(
                    out_tx,
                    &DaemonResponse::error(format!("invalid request JSON: {err}")),
                )
                .await?;
                continue;
            }
        };

        let response = match handle_request(&request, state, out_tx, joined).await {
            Ok(data) => DaemonResponse::ok(data),
            Err(err) => DaemonResponse::error(err.to_string()),
        };
        send_response(out_tx, &response).await?;
        if request.cmd == "stop" {
            return Ok(true);
        }
    }
    Ok(false)
}

async fn handle_request(
    request: &DaemonRequest,
    state: &DaemonState,
    out_tx: &mpsc::Sender<String>,
    joined: &mut Vec<SessionId>,
) -> Result<Value, DaemonError> {
    match request.cmd.as_str() {
        "join" => {
            let session = require_session(request)?;
            let config = PipelineConfig::new(
                state.renderer.clone(),
                Arc::new(ConnectionDelivery {
                    out: out_tx.clone(),
                }),
            )
            .with_observer(Arc::new(TracingObserver))
            .with_canonical(state.settings.canonical());
            state
                .registry
                .open(RenderPipeline::new(session.clone(), config))
                .await?;
            tracing::info!(session = %session, "session joined");
            joined.push(session.clone());
            Ok(json!({ "session": session }))
        }
        "render" => {
            let session = require_session(request)?;
            let handle = state.registry.get(&session).await?;
            let context = RenderContext::new(session.clone())
                .with_assigns(request.assigns.clone().unwrap_or(Value::Null));
            let outcome = handle.render(context).await?;
            let ops = match &outcome {
                patchwire_sync::RenderOutcome::Patched { ops } => ops.len(),
                _ => 0,
            };
            Ok(json!({ "session": session, "outcome": outcome.label(), "ops": ops }))
        }
        "leave" => {
            let session = require_session(request)?;
            state.registry.close(&session).await?;
            joined.retain(|s| s != &session);
            tracing::info!(session = %session, "session left");
            Ok(json!({ "session": session }))
        }
        "status" => Ok(build_status_payload(state).await),
        "stop" => Ok(json!({ "stopping": true })),
        other => Err(DaemonError::Protocol(format!("unknown command '{other}'"))),
    }
}

fn require_session(request: &DaemonRequest) -> Result<SessionId, DaemonError> {
    request
        .session
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(SessionId::from)
        .ok_or_else(|| DaemonError::Protocol(format!("'{}' requires a session", request.cmd)))
}

async fn build_status_payload(state: &DaemonState) -> Value {
    let sessions: Vec<Value> = state
        .registry
        .snapshot()
        .await
        .into_iter()
        .map(|(id, session_state)| json!({ "id": id, "state": session_state }))
        .collect();

    json!({
        "running": true,
        "started_at_unix": state.started_at_unix,
        "socket": state.settings.socket.display().to_string(),
        "template": state.settings.template,
        "sessions": sessions,
    })
}

fn prepare_socket_for_bind(socket: &Path) -> Result<(), DaemonError> {
    if !socket.exists() {
        return Ok(());
    }

    match StdUnixStream::connect(socket) {
        Ok(_) => {
            return Err(DaemonError::Protocol(format!(
                "daemon socket already in use: {}",
                socket.display()
            )));
        }
        Err(err) => {
            tracing::warn!(
                socket = %socket.display(),
                error = %err,
                "removing stale daemon socket before bind",
            );
        }
    }

    match fs::remove_file(socket) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(socket, err)),
    }
}

async fn send_response(
    out_tx: &mpsc::Sender<String>,
    response: &DaemonResponse,
) -> Result<(), DaemonError> {
    let payload = serde_json::to_string(response)?;
    out_tx
        .send(payload)
        .await
        .map_err(|_| DaemonError::ChannelClosed("connection writer"))
}

async fn write_lines(
    mut writer: OwnedWriteHalf,
    mut lines: mpsc::Receiver<String>,
) -> Result<(), DaemonError> {
    while let Some(line) = lines.recv().await {
        writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| io_err("daemon socket write", e))?;
        writer
            .write_all(b"\n")
            .await
            .map_err(|e| io_err("daemon socket write", e))?;
        writer
            .flush()
            .await
            .map_err(|e| io_err("daemon socket flush", e))?;
    }
    Ok(())
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Protocol(format!(
            "{task} task join failure: {err}"
        ))),
    }
}

fn unix_seconds_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Install the global subscriber. `RUST_LOG` wins over `default_filter`.
pub fn init_tracing(default_filter: &str, format: LogFormat) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = match format {
        LogFormat::Text => fmt().with_env_filter(filter).with_target(false).try_init(),
        LogFormat::Json => fmt().json().with_env_filter(filter).try_init(),
    };
}

#[cfg(unix)]
fn set_socket_permissions(path: &Path) -> Result<(), DaemonError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_socket_permissions(_path: &Path) -> Result<(), DaemonError> {
    Ok(())
}
