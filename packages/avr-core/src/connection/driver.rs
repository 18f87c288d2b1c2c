//! Background task that owns the socket: connect, run the session, and
//! reconnect according to [`ReconnectPolicy`](super::reconnect::ReconnectPolicy).

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;

use crate::protocol::encode::refresh_queries;
use crate::protocol::{InboundFrame, LineCodec, OutboundFrame, Zone};

use super::events::ConnectionEventKind;
use super::reconnect::ReconnectDecision;
use super::status::ConnectionState;
use super::transport::{BoxedStream, ConnectionError};
use super::Inner;

/// How a live session ended.
enum SessionEnd {
    Cancelled,
    Closed(ConnectionError),
}

pub(super) async fn run(inner: Arc<Inner>, cancel: CancellationToken) {
    loop {
        inner.set_state(
            ConnectionState::Connecting,
            format!("Connecting to {}", inner.host),
        );

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            result = inner.connector.connect(&inner.host, inner.config.port) => result,
        };

        let cause = match opened {
            Ok(stream) => match run_session(&inner, stream, &cancel).await {
                SessionEnd::Cancelled => {
                    inner.emit(ConnectionEventKind::Closed { had_error: false });
                    return;
                }
                SessionEnd::Closed(cause) => cause,
            },
            Err(cause) => cause,
        };

        let had_error = !matches!(cause, ConnectionError::Closed);
        log::warn!("[Connection] {} closed: {}", inner.host, cause);
        inner.emit(ConnectionEventKind::Closed { had_error });

        match inner.policy.decide(inner.reconnect_attempts(), &cause) {
            ReconnectDecision::Retry { attempt, delay } => {
                log::info!(
                    "[Connection] Reconnecting to {} in {:?} (attempt {}/{})",
                    inner.host,
                    delay,
                    attempt,
                    inner.policy.max_attempts
                );
                inner.set_reconnecting(attempt, delay);
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            ReconnectDecision::GiveUp { reason } => {
                log::error!("[Connection] {}: {}", inner.host, reason);
                inner.set_state(ConnectionState::Failed, reason);
                return;
            }
        }
    }
}

async fn run_session(inner: &Inner, stream: BoxedStream, cancel: &CancellationToken) -> SessionEnd {
    let framed = Framed::new(stream, LineCodec::new(inner.config.max_line_length));
    let (mut sink, mut frames) = framed.split::<OutboundFrame>();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();

    inner.on_connected(outbound_tx);
    log::info!("[Connection] Connected to {}", inner.host);

    let refresh = Zone::ALL
        .into_iter()
        .flat_map(refresh_queries)
        .map(|query| Ok::<_, std::io::Error>(OutboundFrame::Command(query)));
    if let Err(e) = sink.send_all(&mut futures::stream::iter(refresh)).await {
        inner.on_session_end();
        return SessionEnd::Closed(e.into());
    }

    let end = loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break SessionEnd::Cancelled,
            frame = frames.next() => match frame {
                Some(Ok(InboundFrame::Line(line))) => inner.handle_line(&line),
                Some(Ok(InboundFrame::Refusal(reply))) => {
                    log::trace!("[Connection] Declining option {}", reply[2]);
                    if let Err(e) = sink.send(OutboundFrame::Negotiation(reply)).await {
                        break SessionEnd::Closed(e.into());
                    }
                }
                Some(Err(e)) => break SessionEnd::Closed(e.into()),
                None => break SessionEnd::Closed(ConnectionError::Closed),
            },
            Some(command) = outbound_rx.recv() => {
                log::debug!("[Connection] {} <- {}", inner.host, command);
                if let Err(e) = sink.send(OutboundFrame::Command(command)).await {
                    break SessionEnd::Closed(e.into());
                }
            }
        }
    };

    inner.on_session_end();
    end
}
