//! Transport 1: stdio (spec.md §4.6 "Transport 1: stdio"). Newline-
//! delimited JSON on stdin/stdout; log output is diverted to stderr by
//! the logging setup in [`portunix_core::logging`], never stdout, so it
//! never corrupts the framing.

use crate::dispatcher::Dispatcher;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Heuristic for "this process was launched by an AI assistant, not an
/// interactive shell" (spec.md §4.6 "Entered automatically when..."):
/// piped stdin, or no controlling terminal. Checked with `is_terminal`
/// rather than a TTY ioctl, matching how the teacher's CLI binary
/// distinguishes interactive from piped output for its own formatting.
pub fn should_auto_enter_stdio() -> bool {
    use std::io::IsTerminal;
    !std::io::stdin().is_terminal()
}

/// A single-threaded read loop: reads one newline-delimited JSON request
/// at a time from `stdin`, dispatches it synchronously, writes the
/// response to `stdout`. Exits cleanly when stdin reaches EOF or `cancel`
/// fires.
pub async fn run(dispatcher: Arc<Dispatcher>, cancel: CancellationToken) -> anyhow::Result<()> {
    let stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(stdin).lines();

    info!("MCP stdio transport started");
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("MCP stdio transport cancelled");
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    info!("MCP stdio transport reached EOF");
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                let response = dispatcher.handle(line.as_bytes()).await;
                if let Err(e) = write_response(&mut stdout, &response).await {
                    warn!(error = %e, "failed to write MCP stdio response");
                    break;
                }
            }
        }
    }
    Ok(())
}

async fn write_response<W: AsyncWriteExt + Unpin>(out: &mut W, response: &[u8]) -> std::io::Result<()> {
    out.write_all(response).await?;
    out.write_all(b"\n").await?;
    out.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::{Dispatcher, PermissionLevel};
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn write_response_appends_a_trailing_newline() {
        let (mut client, mut server) = tokio::io::duplex(256);
        write_response(&mut server, br#"{"ok":true}"#).await.unwrap();
        drop(server);

        let mut buf = Vec::new();
        client.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, b"{\"ok\":true}\n");
    }

    #[tokio::test]
    async fn cancelling_before_any_input_stops_the_read_loop_immediately() {
        let dispatcher = Arc::new(Dispatcher::new(PermissionLevel::Standard, "portunix-mcp", "0.1.0"));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = tokio::time::timeout(std::time::Duration::from_secs(1), run(dispatcher, cancel)).await;
        assert!(result.is_ok(), "run() did not exit promptly after cancellation");
    }
}
