//! HTTP surface over [`ChatService`].

pub mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use axum::routing::{get, post};
use msgr::ChatService;
use tokio::net::TcpListener;
use tracing::{info, warn};

pub fn router(service: Arc<ChatService>) -> Router {
	Router::new()
		.route("/health", get(handlers::health))
		.route("/session", post(handlers::ensure_session))
		.route("/messages", post(handlers::send_message))
		.route("/snapshots", get(handlers::list_snapshots).post(handlers::capture_snapshot))
		.route("/snapshots/latest", get(handlers::latest_snapshot))
		.route("/snapshots/{id}", get(handlers::get_snapshot).delete(handlers::delete_snapshot))
		.with_state(service)
}

/// Serves until Ctrl-C or SIGTERM, then tears the session down.
pub async fn serve(service: Arc<ChatService>, host: &str, port: u16) -> Result<()> {
	let addr: SocketAddr = format!("{host}:{port}")
		.parse()
		.with_context(|| format!("Invalid host/port combination: {host}:{port}"))?;

	let listener = TcpListener::bind(addr)
		.await
		.with_context(|| format!("Failed to bind HTTP server to {addr}"))?;
	info!(target = "msgr.server", %addr, "listening");

	let served = axum::serve(listener, router(Arc::clone(&service)))
		.with_graceful_shutdown(shutdown_signal())
		.await
		.context("HTTP server error");

	service.shutdown().await;
	info!(target = "msgr.server", "stopped");
	served
}

async fn shutdown_signal() {
	let ctrl_c = async {
		if let Err(err) = tokio::signal::ctrl_c().await {
			warn!(target = "msgr.server", error = %err, "failed to listen for Ctrl-C");
			std::future::pending::<()>().await;
		}
	};

	#[cfg(unix)]
	let terminate = async {
		use tokio::signal::unix::{SignalKind, signal};
		match signal(SignalKind::terminate()) {
			Ok(mut sigterm) => {
				sigterm.recv().await;
			}
			Err(err) => {
				warn!(target = "msgr.server", error = %err, "failed to listen for SIGTERM");
				std::future::pending::<()>().await;
			}
		}
	};
	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => info!(target = "msgr.server", "received Ctrl-C, shutting down"),
		_ = terminate => info!(target = "msgr.server", "received SIGTERM, shutting down"),
	}
}
