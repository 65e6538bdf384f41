//! Session driver.
//!
//! Runs one session end to end: select the credential, connect through a
//! [`Connector`], run the configured [`SessionMode`] and classify the result.

use tokio::io::{AsyncBufRead, AsyncWrite};
use tracing::{debug, info};

use super::credential;
use super::error::{ConfigError, SessionError};
use super::shell::multiplex;
use super::transport::{Connector, TransportHandle};
use super::types::{SessionMode, SessionOutcome, Settings};

/// Local streams the interactive shell is wired to.
pub struct LocalTerminal<I, O, E> {
    pub input: I,
    pub output: O,
    pub error: E,
}

impl<I, O, E> LocalTerminal<I, O, E> {
    pub fn new(input: I, output: O, error: E) -> Self {
        Self {
            input,
            output,
            error,
        }
    }
}

/// Run one session and classify how it ended.
///
/// Configuration problems are returned as `Err` before any network attempt.
/// Everything after that, including connect failures, becomes a classified
/// [`SessionOutcome`]. The terminal is only used in [`SessionMode::Shell`].
pub async fn run_session<I, O, E>(
    settings: &Settings,
    connector: &dyn Connector,
    terminal: LocalTerminal<I, O, E>,
) -> Result<SessionOutcome, ConfigError>
where
    I: AsyncBufRead + Send + Unpin + 'static,
    O: AsyncWrite + Send + Unpin + 'static,
    E: AsyncWrite + Send + Unpin + 'static,
{
    let request = &settings.request;
    let credential = credential::resolve(request)?;

    debug!(
        "Connecting to {}:{} as {} with {}",
        request.host,
        request.effective_port(),
        request.user,
        credential.method()
    );

    let handle = match connector
        .connect(request, credential, &settings.policy, request.connect_timeout)
        .await
    {
        Ok(handle) => handle,
        Err(e) => {
            debug!("Connect failed: {}", e);
            return Ok(SessionOutcome::from_error(e));
        }
    };

    let result = run_mode(handle.as_ref(), &settings.mode, terminal).await;
    handle.disconnect().await;

    if let Err(e) = &result {
        debug!("Session failed: {}", e);
    }
    Ok(SessionOutcome::from_result(result))
}

async fn run_mode<I, O, E>(
    handle: &dyn TransportHandle,
    mode: &SessionMode,
    terminal: LocalTerminal<I, O, E>,
) -> Result<(), SessionError>
where
    I: AsyncBufRead + Send + Unpin + 'static,
    O: AsyncWrite + Send + Unpin + 'static,
    E: AsyncWrite + Send + Unpin + 'static,
{
    match mode {
        SessionMode::Probe { command } => {
            let output = handle.run_command(command).await?;
            info!("Probe {:?} returned {} bytes", command, output.len());
        }
        SessionMode::Shell => {
            let link = handle.open_shell().await?;
            let summary = multiplex(link, terminal.input, terminal.output, terminal.error).await;
            info!(
                "Shell ended: {} lines sent, {} stdout lines, {} stderr lines",
                summary.lines_written, summary.stdout_lines, summary.stderr_lines
            );
            debug!("Shell flows: {:?}", summary);
        }
    }
    Ok(())
}
