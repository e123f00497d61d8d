//! One-shot native messaging exchange over stdio.
//!
//! The browser starts a fresh host per request: read one framed message,
//! answer it, exit. A zero-length, truncated or unreadable first frame ends
//! the exchange without a response.

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{info, warn};

use super::codec::NativeMessageCodec;
use crate::models::envelope::{Failure, Request};
use crate::service::Supervisor;
use crate::{AppError, Result};

/// Serve a single request read from `reader`, answering on `writer`.
///
/// Returns `Ok(false)` when no request was read and nothing was written.
///
/// # Errors
///
/// Returns `AppError::Ipc` if the response cannot be written.
pub async fn serve_one<R, W>(supervisor: &Supervisor, reader: R, writer: W) -> Result<bool>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut frames = FramedRead::new(reader, NativeMessageCodec::new());
    let frame = match frames.next().await {
        Some(Ok(frame)) if !frame.is_empty() => frame,
        Some(Ok(_)) | None => {
            info!("no request received");
            return Ok(false);
        }
        Some(Err(err)) => {
            warn!(%err, "unreadable request frame");
            return Ok(false);
        }
    };

    let response = match serde_json::from_slice::<Request>(&frame) {
        Ok(request) => match supervisor.handle(&request).await {
            Ok(reply) => serde_json::to_vec(&reply),
            Err(err) => {
                warn!(%err, "request failed");
                serde_json::to_vec(&Failure::from(&err))
            }
        },
        Err(err) => serde_json::to_vec(&Failure::from(&AppError::from(err))),
    }
    .map_err(|err| AppError::Ipc(format!("failed to encode response: {err}")))?;

    let mut sink = FramedWrite::new(writer, NativeMessageCodec::new());
    sink.send(Bytes::from(response)).await?;
    sink.flush().await?;
    Ok(true)
}

/// Serve one request on the process's stdin and stdout.
///
/// # Errors
///
/// Returns `AppError::Ipc` if the response cannot be written.
pub async fn serve_stdio(supervisor: &Supervisor) -> Result<bool> {
    serve_one(supervisor, tokio::io::stdin(), tokio::io::stdout()).await
}
