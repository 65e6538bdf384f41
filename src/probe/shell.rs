//! Interactive shell multiplexing.
//!
//! # Architecture
//!
//! - `ShellLink`: an open shell channel seen as one input sink plus two
//!   independent output streams (stdout and stderr).
//! - `ChannelWriter`: the russh-backed input sink.
//! - [`multiplex`]: wires a `ShellLink` to local streams with three flows:
//!
//! ```text
//!  local input ──► producer ──► queue (10) ──► writer ──► channel input
//!  channel stdout ──────────────────────────► stdout flow ──► output sink
//!  channel stderr ──────────────────────────► stderr flow ──► error sink
//! ```
//!
//! The stdout flow ending means the session is over. The channel is then
//! closed, which ends the remote stderr stream, and the local input producer
//! is stopped, which ends the writer's queue. No other stop signal exists.

use std::sync::Arc;

use async_trait::async_trait;
use russh::ChannelWriteHalf;
use russh::client;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::error::SessionError;

/// Capacity of the queue between the local input producer and the writer flow
pub const INPUT_QUEUE_CAPACITY: usize = 10;

/// Input side of a shell channel.
#[async_trait]
pub trait ShellInput: Send + Sync {
    /// Send raw bytes to the remote shell's stdin.
    async fn write(&self, data: &[u8]) -> Result<(), SessionError>;

    /// Signal end of input.
    async fn eof(&self) -> Result<(), SessionError>;

    /// Close the channel in both directions.
    async fn close(&self) -> Result<(), SessionError>;
}

/// Write handle for sending input to a shell channel.
///
/// Wraps `russh::ChannelWriteHalf` so input can be written without holding
/// the read half.
pub struct ChannelWriter {
    write_half: ChannelWriteHalf<client::Msg>,
}

impl ChannelWriter {
    pub fn new(write_half: ChannelWriteHalf<client::Msg>) -> Self {
        Self { write_half }
    }
}

#[async_trait]
impl ShellInput for ChannelWriter {
    async fn write(&self, data: &[u8]) -> Result<(), SessionError> {
        self.write_half
            .data(data)
            .await
            .map_err(SessionError::ChannelWrite)
    }

    async fn eof(&self) -> Result<(), SessionError> {
        self.write_half
            .eof()
            .await
            .map_err(SessionError::ChannelWrite)
    }

    async fn close(&self) -> Result<(), SessionError> {
        self.write_half
            .close()
            .await
            .map_err(SessionError::ChannelWrite)
    }
}

/// An open shell channel.
pub struct ShellLink {
    input: Arc<dyn ShellInput>,
    output: Box<dyn AsyncRead + Send + Unpin>,
    error: Box<dyn AsyncRead + Send + Unpin>,
}

impl ShellLink {
    pub fn new(
        input: Arc<dyn ShellInput>,
        output: impl AsyncRead + Send + Unpin + 'static,
        error: impl AsyncRead + Send + Unpin + 'static,
    ) -> Self {
        Self {
            input,
            output: Box::new(output),
            error: Box::new(error),
        }
    }
}

/// How a flow stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowEnd {
    /// Its source reached end of stream.
    Finished,
    /// The session ended while local input was still open.
    ChannelClosed,
    /// A read or write failed.
    Failed(String),
}

/// What happened during an interactive session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellSummary {
    pub lines_written: usize,
    pub writer: FlowEnd,
    pub stdout: FlowEnd,
    pub stderr: FlowEnd,
    pub stdout_lines: usize,
    pub stderr_lines: usize,
}

/// Bounded queue feeding the writer flow.
pub fn input_queue() -> (mpsc::Sender<String>, mpsc::Receiver<String>) {
    mpsc::channel(INPUT_QUEUE_CAPACITY)
}

/// Run an interactive session until the remote stdout ends.
///
/// Lines read from `local_input` are written to the channel in order, each
/// with a trailing `\n`. Remote stdout and stderr are forwarded line by line
/// to `output` and `error`. Stream failures end only the flow they occur in.
pub async fn multiplex<I, O, E>(
    link: ShellLink,
    local_input: I,
    output: O,
    error: E,
) -> ShellSummary
where
    I: AsyncBufRead + Send + Unpin + 'static,
    O: AsyncWrite + Send + Unpin + 'static,
    E: AsyncWrite + Send + Unpin + 'static,
{
    let ShellLink {
        input,
        output: remote_output,
        error: remote_error,
    } = link;

    let (queue_tx, queue_rx) = input_queue();

    let producer = tokio::spawn(feed_local_input(local_input, queue_tx));
    let writer = tokio::spawn(write_lines(input.clone(), queue_rx));
    let stderr = tokio::spawn(forward_lines("stderr", remote_error, error));
    let stdout = tokio::spawn(forward_lines("stdout", remote_output, output));

    let (stdout_lines, stdout_end) = join_flow("stdout", stdout).await;
    debug!("Shell stdout ended ({:?}), closing channel", stdout_end);

    if let Err(e) = input.close().await {
        debug!("Closing shell channel failed: {}", e);
    }

    // Dropping the producer's sender ends the writer's queue
    producer.abort();

    let (lines_written, mut writer_end) = join_flow("writer", writer).await;
    let input_ended = matches!(producer.await, Ok(true));
    if !input_ended && writer_end == FlowEnd::Finished {
        writer_end = FlowEnd::ChannelClosed;
    }
    let (stderr_lines, stderr_end) = join_flow("stderr", stderr).await;

    ShellSummary {
        lines_written,
        writer: writer_end,
        stdout: stdout_end,
        stderr: stderr_end,
        stdout_lines,
        stderr_lines,
    }
}

async fn join_flow(name: &str, flow: JoinHandle<(usize, FlowEnd)>) -> (usize, FlowEnd) {
    match flow.await {
        Ok(result) => result,
        Err(e) => {
            warn!("Shell {} flow aborted: {}", name, e);
            (0, FlowEnd::Failed(e.to_string()))
        }
    }
}

/// Enqueue local input lines, waiting while the queue is full.
///
/// Returns `true` once local input has ended on its own.
async fn feed_local_input<I>(local_input: I, queue: mpsc::Sender<String>) -> bool
where
    I: AsyncBufRead + Unpin,
{
    let mut lines = local_input.lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if queue.send(line).await.is_err() {
                    debug!("Writer flow gone, dropping local input");
                    return false;
                }
            }
            Ok(None) => {
                debug!("Local input exhausted");
                return true;
            }
            Err(e) => {
                warn!("Failed to read local input: {}", e);
                return true;
            }
        }
    }
}

async fn write_lines(
    input: Arc<dyn ShellInput>,
    mut queue: mpsc::Receiver<String>,
) -> (usize, FlowEnd) {
    let mut written = 0;

    while let Some(mut line) = queue.recv().await {
        line.push('\n');
        if let Err(e) = input.write(line.as_bytes()).await {
            warn!("Failed to write to shell: {}", e);
            return (written, FlowEnd::Failed(e.to_string()));
        }
        written += 1;
    }

    if let Err(e) = input.eof().await {
        debug!("Failed to send EOF to shell: {}", e);
        return (written, FlowEnd::Failed(e.to_string()));
    }
    (written, FlowEnd::Finished)
}

async fn forward_lines<R, W>(stream: &'static str, reader: R, mut sink: W) -> (usize, FlowEnd)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();
    let mut forwarded = 0;

    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => {
                debug!("Shell {} reached end of stream", stream);
                return (forwarded, FlowEnd::Finished);
            }
            Ok(_) => {
                if let Err(e) = write_line(&mut sink, &line).await {
                    warn!("Failed to forward shell {}: {}", stream, e);
                    return (forwarded, FlowEnd::Failed(e.to_string()));
                }
                forwarded += 1;
            }
            Err(e) => {
                warn!("Failed to read shell {}: {}", stream, e);
                return (forwarded, FlowEnd::Failed(e.to_string()));
            }
        }
    }
}

async fn write_line<W: AsyncWrite + Unpin>(sink: &mut W, line: &[u8]) -> std::io::Result<()> {
    sink.write_all(line).await?;
    sink.flush().await
}
