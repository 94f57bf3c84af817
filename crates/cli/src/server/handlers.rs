use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use msgr::protocol::{
	DispatchRequest, DispatchResult, ErrorCode, FailureReason, SessionHealth, Snapshot, SnapshotOutcome, SnapshotQuery,
};
use msgr::{ChatService, Error};
use tracing::debug;

type Service = State<Arc<ChatService>>;

/// Service error rendered as `{code, message}` with a mapped status.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
	fn from(err: Error) -> Self {
		Self(err)
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let status = status_for_code(self.0.code());
		debug!(target = "msgr.server", %status, code = %self.0.code(), "request failed");
		(status, Json(self.0.to_body())).into_response()
	}
}

pub fn status_for_code(code: ErrorCode) -> StatusCode {
	match code {
		ErrorCode::NotFound | ErrorCode::Empty => StatusCode::NOT_FOUND,
		ErrorCode::InvalidPayload | ErrorCode::ConfigError => StatusCode::UNPROCESSABLE_ENTITY,
		ErrorCode::SessionNotReady
		| ErrorCode::LoginFailed
		| ErrorCode::StepUpTimeout
		| ErrorCode::DriverUnavailable
		| ErrorCode::AuthLost => StatusCode::SERVICE_UNAVAILABLE,
		ErrorCode::InputNotFound | ErrorCode::UiStepFailed | ErrorCode::MalformedResponse | ErrorCode::UpstreamError => {
			StatusCode::BAD_GATEWAY
		}
		ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
	}
}

pub fn status_for_failure(reason: FailureReason) -> StatusCode {
	match reason {
		FailureReason::InvalidPayload => StatusCode::UNPROCESSABLE_ENTITY,
		FailureReason::SessionUnavailable | FailureReason::AuthLost => StatusCode::SERVICE_UNAVAILABLE,
		FailureReason::InputNotFound | FailureReason::UiStepFailed => StatusCode::BAD_GATEWAY,
	}
}

pub async fn health(State(service): Service) -> Json<SessionHealth> {
	Json(service.session_health())
}

pub async fn ensure_session(State(service): Service) -> Result<Json<SessionHealth>, ApiError> {
	Ok(Json(service.ensure_session_ready().await?))
}

pub async fn send_message(
	State(service): Service,
	request: Result<Json<DispatchRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<DispatchResult>), ApiError> {
	let Json(request) = request.map_err(|rejection| Error::InvalidPayload(rejection.body_text()))?;
	let result = service.dispatch_message(&request).await;
	let status = result.failure_reason.map_or(StatusCode::OK, status_for_failure);
	Ok((status, Json(result)))
}

pub async fn capture_snapshot(State(service): Service) -> Result<Json<SnapshotOutcome>, ApiError> {
	Ok(Json(service.fetch_and_save_snapshot().await?))
}

pub async fn list_snapshots(State(service): Service) -> Result<Json<SnapshotQuery>, ApiError> {
	Ok(Json(service.get_snapshot(None)?))
}

pub async fn latest_snapshot(State(service): Service) -> Result<Json<Snapshot>, ApiError> {
	Ok(Json(service.latest_snapshot()?))
}

pub async fn get_snapshot(State(service): Service, Path(id): Path<String>) -> Result<Json<SnapshotQuery>, ApiError> {
	Ok(Json(service.get_snapshot(Some(&id))?))
}

pub async fn delete_snapshot(State(service): Service, Path(id): Path<String>) -> Result<StatusCode, ApiError> {
	service.delete_snapshot(&id)?;
	Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn error_codes_map_to_statuses() {
		assert_eq!(status_for_code(ErrorCode::Empty), StatusCode::NOT_FOUND);
		assert_eq!(status_for_code(ErrorCode::ConfigError), StatusCode::UNPROCESSABLE_ENTITY);
		assert_eq!(status_for_code(ErrorCode::AuthLost), StatusCode::SERVICE_UNAVAILABLE);
		assert_eq!(status_for_code(ErrorCode::UpstreamError), StatusCode::BAD_GATEWAY);
	}

	#[test]
	fn failure_reasons_map_to_statuses() {
		assert_eq!(
			status_for_failure(FailureReason::InvalidPayload),
			StatusCode::UNPROCESSABLE_ENTITY
		);
		assert_eq!(
			status_for_failure(FailureReason::SessionUnavailable),
			StatusCode::SERVICE_UNAVAILABLE
		);
		assert_eq!(status_for_failure(FailureReason::InputNotFound), StatusCode::BAD_GATEWAY);
	}
}
