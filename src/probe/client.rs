//! SSH connection establishment and session channels.
//!
//! ## Connection Lifecycle
//!
//! 1. **Strategy**: Build the authentication strategy from the credential.
//!    Key material is decoded before any network traffic.
//!
//! 2. **Client Configuration**: Build the russh client configuration with
//!    keepalive and no inactivity timeout (interactive I/O may idle forever).
//!
//! 3. **Dial**: TCP connect plus protocol handshake. The host key is checked
//!    during the handshake per the [`HostVerificationPolicy`].
//!
//! 4. **Authentication**: One attempt with the single strategy. A rejection
//!    becomes [`SessionError::AuthenticationRejected`]. Steps 3 and 4 are
//!    bounded together by the connect timeout.
//!
//! 5. **Channels**: [`run_command`] for the one-shot probe, [`open_shell`] for
//!    the interactive mode.
//!
//! There are no retries. Errors are returned whole for classification.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::{Channel, ChannelMsg, ChannelReadHalf, Disconnect, client};
use tokio::io::{AsyncWriteExt, DuplexStream};
use tracing::{debug, info, warn};

use super::auth::strategy_for;
use super::error::{ConfigError, SessionError};
use super::session::SshClientHandler;
use super::shell::{ChannelWriter, ShellLink};
use super::transport::{Connector, TransportHandle};
use super::types::{ConnectionRequest, Credential, HostVerificationPolicy};

/// Keepalive interval for established connections
pub(crate) const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Unanswered keepalives before the connection is dropped
pub(crate) const KEEPALIVE_MAX: usize = 3;

/// Buffer size of the in-process pipes carrying shell output
const SHELL_PIPE_CAPACITY: usize = 64 * 1024;

/// Build russh client configuration.
///
/// No inactivity timeout is set: only the connect phase is time-bounded.
pub(crate) fn build_client_config() -> Arc<client::Config> {
    Arc::new(client::Config {
        inactivity_timeout: None,
        keepalive_interval: Some(KEEPALIVE_INTERVAL),
        keepalive_max: KEEPALIVE_MAX,
        ..Default::default()
    })
}

/// Join host and port into a dialable address, bracketing IPv6 literals.
pub(crate) fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

fn parse_port(request: &ConnectionRequest) -> Result<u16, ConfigError> {
    request
        .effective_port()
        .parse::<u16>()
        .map_err(|_| ConfigError::InvalidPort(request.port.clone()))
}

/// Establish an SSH connection and authenticate.
///
/// This is the core connection function that:
/// 1. Builds the authentication strategy from `credential`
/// 2. Connects and handshakes within `timeout`
/// 3. Authenticates once with that strategy
///
/// Dial, handshake and authentication share the one `timeout`.
pub async fn connect(
    request: &ConnectionRequest,
    credential: Credential,
    policy: &HostVerificationPolicy,
    timeout: Duration,
) -> Result<client::Handle<SshClientHandler>, SessionError> {
    let strategy = strategy_for(credential)?;

    let port = parse_port(request)?;
    let address = join_host_port(&request.host, port);
    let handler = SshClientHandler::new(request.host.clone(), port, policy.clone());

    debug!("Dialing {} with a {:?} connect timeout", address, timeout);
    let attempt = async {
        let mut handle = client::connect(
            build_client_config(),
            (request.host.as_str(), port),
            handler,
        )
        .await
        .map_err(|e| SessionError::from_connect(&address, e))?;

        debug!(
            "Authenticating to {} as {} using {}",
            address,
            request.user,
            strategy.name()
        );
        if !strategy.authenticate(&mut handle, &request.user).await? {
            return Err(SessionError::AuthenticationRejected {
                method: strategy.name(),
            });
        }
        Ok::<_, SessionError>(handle)
    };

    // Userauth counts as part of the handshake, so one deadline covers both
    let handle = tokio::time::timeout(timeout, attempt)
        .await
        .map_err(|_| SessionError::ConnectTimeout {
            address: address.clone(),
            timeout,
        })??;

    info!("Connected to {} as {}", address, request.user);
    Ok(handle)
}

/// Execute a command on a fresh session channel.
///
/// Returns stdout and stderr bytes combined in arrival order. A non-zero exit
/// status is logged but is not an error: the probe checks reachability and
/// authentication, not the command itself.
pub async fn run_command(
    handle: &client::Handle<SshClientHandler>,
    command: &str,
) -> Result<Vec<u8>, SessionError> {
    let mut channel = handle
        .channel_open_session()
        .await
        .map_err(SessionError::ChannelOpen)?;

    channel
        .exec(true, command)
        .await
        .map_err(SessionError::ChannelRequest)?;
    await_request_reply(&mut channel, "exec").await?;

    let mut combined = Vec::with_capacity(4096);
    let mut exit_code: Option<u32> = None;

    loop {
        match channel.wait().await {
            Some(ChannelMsg::Data { data }) => {
                combined.extend_from_slice(&data);
            }
            Some(ChannelMsg::ExtendedData { data, ext }) => {
                // ext == 1 is stderr in SSH protocol
                if ext == 1 {
                    combined.extend_from_slice(&data);
                }
            }
            Some(ChannelMsg::ExitStatus { exit_status }) => {
                exit_code = Some(exit_status);
            }
            Some(ChannelMsg::Eof) => {
                // Continue to wait for exit status if not received yet
                if exit_code.is_some() {
                    break;
                }
            }
            Some(ChannelMsg::Close) | None => break,
            Some(_) => {}
        }
    }

    close_channel(&channel).await;

    match exit_code {
        Some(0) => debug!("Probe command {:?} succeeded", command),
        Some(code) => warn!("Probe command {:?} exited with status {}", command, code),
        None => warn!("Probe command {:?} ended without an exit status", command),
    }

    Ok(combined)
}

/// Wait for the server's answer to a `want_reply` channel request.
///
/// Sending the request does not wait for the reply, so a rejection would
/// otherwise only show up later in the message stream.
async fn await_request_reply(
    channel: &mut Channel<client::Msg>,
    request: &'static str,
) -> Result<(), SessionError> {
    loop {
        match channel.wait().await {
            Some(ChannelMsg::Success) => return Ok(()),
            Some(ChannelMsg::Failure) => {
                close_channel(channel).await;
                return Err(SessionError::ChannelRejected(request));
            }
            Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => {
                return Err(SessionError::ChannelRejected(request));
            }
            Some(msg) => debug!("Ignoring {:?} before the {} reply", msg, request),
        }
    }
}

async fn close_channel(channel: &Channel<client::Msg>) {
    if let Err(e) = channel.close().await {
        debug!("Closing channel failed: {}", e);
    }
}

/// Open an interactive shell channel.
///
/// No PTY is requested, so stderr stays a separate stream. The channel's
/// message stream is split into an output pipe and an error pipe; both reach
/// end-of-stream when the channel ends.
pub async fn open_shell(
    handle: &client::Handle<SshClientHandler>,
) -> Result<ShellLink, SessionError> {
    let mut channel = handle
        .channel_open_session()
        .await
        .map_err(SessionError::ChannelOpen)?;

    channel
        .request_shell(true)
        .await
        .map_err(SessionError::ChannelRequest)?;
    await_request_reply(&mut channel, "shell").await?;

    let (read_half, write_half) = channel.split();
    let (output_tx, output_rx) = tokio::io::duplex(SHELL_PIPE_CAPACITY);
    let (error_tx, error_rx) = tokio::io::duplex(SHELL_PIPE_CAPACITY);

    tokio::spawn(split_channel_output(read_half, output_tx, error_tx));

    Ok(ShellLink::new(
        Arc::new(ChannelWriter::new(write_half)),
        output_rx,
        error_rx,
    ))
}

/// Route channel data to the output pipe and extended data to the error pipe.
///
/// Dropping both pipe ends on return signals end-of-stream to their readers.
async fn split_channel_output(
    mut read_half: ChannelReadHalf,
    mut output: DuplexStream,
    mut error: DuplexStream,
) {
    let mut error_open = true;

    while let Some(msg) = read_half.wait().await {
        match msg {
            ChannelMsg::Data { data } => {
                if output.write_all(&data).await.is_err() {
                    debug!("Shell output reader gone, stopping");
                    break;
                }
            }
            ChannelMsg::ExtendedData { data, ext } => {
                if ext == 1 && error_open && error.write_all(&data).await.is_err() {
                    debug!("Shell error reader gone, dropping further stderr");
                    error_open = false;
                }
            }
            ChannelMsg::ExitStatus { exit_status } => {
                debug!("Remote shell exited with status {}", exit_status);
            }
            ChannelMsg::Failure => {
                warn!("Server rejected a request on the shell channel");
                break;
            }
            ChannelMsg::Eof | ChannelMsg::Close => break,
            _ => {}
        }
    }
}

/// russh-backed [`Connector`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RusshConnector;

#[async_trait]
impl Connector for RusshConnector {
    async fn connect(
        &self,
        request: &ConnectionRequest,
        credential: Credential,
        policy: &HostVerificationPolicy,
        timeout: Duration,
    ) -> Result<Box<dyn TransportHandle>, SessionError> {
        let handle = connect(request, credential, policy, timeout).await?;
        Ok(Box::new(RusshHandle { handle }))
    }
}

/// An authenticated russh connection.
pub struct RusshHandle {
    handle: client::Handle<SshClientHandler>,
}

#[async_trait]
impl TransportHandle for RusshHandle {
    async fn run_command(&self, command: &str) -> Result<Vec<u8>, SessionError> {
        run_command(&self.handle, command).await
    }

    async fn open_shell(&self) -> Result<ShellLink, SessionError> {
        open_shell(&self.handle).await
    }

    async fn disconnect(&self) {
        if let Err(e) = self
            .handle
            .disconnect(Disconnect::ByApplication, "", "English")
            .await
        {
            debug!("Disconnect failed: {}", e);
        }
    }
}
