//! Request/response correlation over a DevTools transport.
//!
//! # Message Flow
//!
//! 1. Caller invokes [`Connection::send`] with a method, params and optional session id
//! 2. Connection assigns the next request id and parks a oneshot sender
//! 3. Request is pushed onto the transport's outbound channel
//! 4. Receive loop matches the response id and completes the oneshot
//! 5. Caller gets the `result` object or a classified [`Error`]
//!
//! When the transport goes away every parked request fails with
//! [`Error::ChannelClosed`] and later sends fail immediately.


use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::Mutex as TokioMutex;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::transport::{self, TransportParts};

/// Default ceiling for a single CDP command.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Pending request callbacks keyed by request ID.
type CallbackMap = Arc<TokioMutex<HashMap<u64, oneshot::Sender<Result<Value>>>>>;

/// CDP error payload.
#[derive(Debug, Deserialize)]
struct ProtocolError {
	code: i64,
	message: String,
}

/// Response to a command (has `id`).
#[derive(Debug, Deserialize)]
struct Response {
	id: u64,
	#[serde(default)]
	result: Option<Value>,
	#[serde(default)]
	error: Option<ProtocolError>,
}

/// Event pushed by the browser (no `id`).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Event {
	method: String,
	#[serde(default)]
	session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Inbound {
	Response(Response),
	Event(Event),
	Unknown(Value),
}

/// RAII guard ensuring callback cleanup when a request future is dropped.
struct CancelGuard {
	id: u64,
	callbacks: CallbackMap,
	completed: bool,
}

impl CancelGuard {
	fn new(id: u64, callbacks: CallbackMap) -> Self {
		Self {
			id,
			callbacks,
			completed: false,
		}
	}

	fn complete(&mut self) {
		self.completed = true;
	}
}

impl Drop for CancelGuard {
	fn drop(&mut self) {
		if self.completed {
			return;
		}

		let id = self.id;
		let callbacks = Arc::clone(&self.callbacks);

		if let Ok(handle) = tokio::runtime::Handle::try_current() {
			handle.spawn(async move {
				if callbacks.lock().await.remove(&id).is_some() {
					trace!(target = "msgr.cdp", id, "removed orphaned callback");
				}
			});
		}
	}
}

/// Future returned by [`Connection::send`] with automatic cancellation cleanup.
struct ResponseFuture {
	rx: oneshot::Receiver<Result<Value>>,
	guard: CancelGuard,
}

impl Future for ResponseFuture {
	type Output = Result<Value>;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		match Pin::new(&mut self.rx).poll(cx) {
			Poll::Ready(result) => {
				self.guard.complete();
				Poll::Ready(result.map_err(|_| Error::ChannelClosed).and_then(|r| r))
			}
			Poll::Pending => Poll::Pending,
		}
	}
}

/// Multiplexed CDP connection to one browser endpoint.
///
/// Page sessions share the browser connection through flattened session ids.
pub struct Connection {
	last_id: AtomicU64,
	callbacks: CallbackMap,
	outbound_tx: mpsc::UnboundedSender<Value>,
	closed: Arc<AtomicBool>,
	call_timeout: Duration,
}

impl Connection {
	/// Connects to a browser-level DevTools WebSocket URL.
	pub async fn connect(ws_url: &str, call_timeout: Duration) -> Result<Arc<Self>> {
		let parts = transport::connect(ws_url).await?;
		Ok(Self::from_parts(parts, call_timeout))
	}

	/// Builds a connection over already-established transport channels.
	pub fn from_parts(parts: TransportParts, call_timeout: Duration) -> Arc<Self> {
		let callbacks: CallbackMap = Arc::new(TokioMutex::new(HashMap::new()));
		let closed = Arc::new(AtomicBool::new(false));

		tokio::spawn(run_receive_loop(parts.receiver, Arc::clone(&callbacks), Arc::clone(&closed)));

		Arc::new(Self {
			last_id: AtomicU64::new(0),
			callbacks,
			outbound_tx: parts.sender,
			closed,
			call_timeout,
		})
	}

	/// Returns true once the underlying transport has gone away.
	pub fn is_closed(&self) -> bool {
		self.closed.load(Ordering::Acquire)
	}

	/// Sends a command and awaits its result.
	///
	/// `session_id` routes the command to an attached page session; `None`
	/// targets the browser itself.
	pub async fn send(&self, method: &str, params: Value, session_id: Option<&str>) -> Result<Value> {
		if self.is_closed() {
			return Err(Error::ChannelClosed);
		}

		let id = self.last_id.fetch_add(1, Ordering::Relaxed) + 1;
		let (tx, rx) = oneshot::channel();
		self.callbacks.lock().await.insert(id, tx);
		let response = ResponseFuture {
			rx,
			guard: CancelGuard::new(id, Arc::clone(&self.callbacks)),
		};

		// The receive loop may have drained callbacks between the check above and the insert.
		if self.is_closed() {
			return Err(Error::ChannelClosed);
		}

		let mut request = json!({ "id": id, "method": method, "params": params });
		if let Some(session_id) = session_id {
			request["sessionId"] = Value::String(session_id.to_string());
		}
		trace!(target = "msgr.cdp", id, method, session = ?session_id, "send");

		if self.outbound_tx.send(request).is_err() {
			return Err(Error::ChannelClosed);
		}

		match tokio::time::timeout(self.call_timeout, response).await {
			Ok(result) => result,
			Err(_) => Err(Error::Timeout {
				what: method.to_string(),
				ms: self.call_timeout.as_millis() as u64,
			}),
		}
	}
}

async fn run_receive_loop(mut receiver: mpsc::UnboundedReceiver<Value>, callbacks: CallbackMap, closed: Arc<AtomicBool>) {
	while let Some(message) = receiver.recv().await {
		match serde_json::from_value::<Inbound>(message) {
			Ok(Inbound::Response(response)) => {
				let outcome = match response.error {
					Some(err) => Err(Error::from_protocol(err.code, err.message)),
					None => Ok(response.result.unwrap_or(Value::Null)),
				};
				match callbacks.lock().await.remove(&response.id) {
					Some(sender) => {
						let _ = sender.send(outcome);
					}
					None => debug!(target = "msgr.cdp", id = response.id, "response for unknown request id"),
				}
			}
			Ok(Inbound::Event(event)) => {
				if event.method == "Target.detachedFromTarget" || event.method == "Inspector.detached" {
					debug!(target = "msgr.cdp", method = %event.method, session = ?event.session_id, "target detached");
				} else {
					trace!(target = "msgr.cdp", method = %event.method, "event");
				}
			}
			Ok(Inbound::Unknown(value)) => trace!(target = "msgr.cdp", %value, "unrecognized message"),
			Err(err) => debug!(target = "msgr.cdp", error = %err, "failed to decode message"),
		}
	}

	closed.store(true, Ordering::Release);
	let pending: Vec<_> = callbacks.lock().await.drain().collect();
	if !pending.is_empty() {
		debug!(target = "msgr.cdp", count = pending.len(), "failing pending requests after disconnect");
	}
	for (_, sender) in pending {
		let _ = sender.send(Err(Error::ChannelClosed));
	}
}
