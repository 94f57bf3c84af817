//! WebSocket transport for the DevTools protocol.
//!
//! The transport owns the socket and exposes two unbounded channels of JSON
//! values. A writer task serializes outbound values into text frames and a
//! reader task parses inbound frames. Dropping the outbound sender closes the
//! socket; the inbound receiver yields `None` once the peer goes away.


use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Channel halves produced by a connected transport.
pub struct TransportParts {
	/// Outbound messages, written to the socket in send order.
	pub sender: mpsc::UnboundedSender<Value>,
	/// Inbound messages parsed from text or binary frames.
	pub receiver: mpsc::UnboundedReceiver<Value>,
}

/// Connects to a DevTools WebSocket URL and starts the I/O tasks.
pub async fn connect(ws_url: &str) -> Result<TransportParts> {
	let (stream, _response) = tokio_tungstenite::connect_async(ws_url)
		.await
		.map_err(|e| Error::ConnectionFailed(format!("{ws_url}: {e}")))?;
	debug!(target = "msgr.cdp", url = ws_url, "websocket connected");
	Ok(spawn_io(stream))
}

/// Splits an established socket into reader and writer tasks.
pub fn spawn_io<S>(stream: WebSocketStream<S>) -> TransportParts
where
	S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
	let (mut sink, mut source) = stream.split();
	let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Value>();
	let (in_tx, in_rx) = mpsc::unbounded_channel::<Value>();

	tokio::spawn(async move {
		while let Some(message) = out_rx.recv().await {
			let text = match serde_json::to_string(&message) {
				Ok(text) => text,
				Err(err) => {
					warn!(target = "msgr.cdp", error = %err, "dropping unserializable message");
					continue;
				}
			};
			if let Err(err) = sink.send(Message::Text(text)).await {
				debug!(target = "msgr.cdp", error = %err, "websocket write failed");
				break;
			}
		}
		let _ = sink.close().await;
	});

	tokio::spawn(async move {
		while let Some(frame) = source.next().await {
			let parsed = match frame {
				Ok(Message::Text(text)) => serde_json::from_str::<Value>(&text),
				Ok(Message::Binary(bytes)) => serde_json::from_slice::<Value>(&bytes),
				Ok(Message::Close(_)) => break,
				Ok(_) => continue,
				Err(err) => {
					debug!(target = "msgr.cdp", error = %err, "websocket read failed");
					break;
				}
			};

			match parsed {
				Ok(value) => {
					if in_tx.send(value).is_err() {
						break;
					}
				}
				Err(err) => warn!(target = "msgr.cdp", error = %err, "ignoring non-JSON frame"),
			}
		}
		debug!(target = "msgr.cdp", "websocket reader finished");
	});

	TransportParts {
		sender: out_tx,
		receiver: in_rx,
	}
}
