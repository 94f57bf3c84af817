//! Session lifecycle against the mock driver.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{LoginMode, MockDriver, test_config};
use msgr::config::Config;
use msgr::driver::{DriverError, FetchRequest};
use msgr::protocol::SessionState;
use msgr::{Error, SessionManager};

fn manager(config: &Config) -> (MockDriver, Arc<SessionManager>) {
	let driver = MockDriver::new(config);
	let manager = Arc::new(SessionManager::from_config(Arc::new(driver.clone()), config));
	(driver, manager)
}

fn list_request() -> FetchRequest {
	FetchRequest {
		url: format!("{}/api/conversations", common::BASE_URL),
		method: "GET".into(),
		headers: Vec::new(),
		body: None,
		timeout: Duration::from_secs(1),
	}
}

#[tokio::test]
async fn login_reaches_ready_and_bumps_generation() {
	let (driver, manager) = manager(&test_config());
	assert_eq!(manager.state(), SessionState::Uninitialized);

	manager.ensure_ready().await.unwrap();
	assert_eq!(manager.state(), SessionState::Ready);
	assert!(manager.health().ready);
	assert_eq!(manager.generation(), 1);
	assert_eq!(driver.submits(), 1);

	// Idempotent while Ready.
	manager.ensure_ready().await.unwrap();
	assert_eq!(driver.launches(), 1);
	assert_eq!(driver.submits(), 1);

	let login_log = &driver.scope_logs()[0];
	assert!(login_log.contains(&"fill:input[name=\"username\"]:alice".to_string()));
	assert!(login_log.iter().all(|call| !call.contains("s3cret")));
	assert_eq!(login_log.last().map(String::as_str), Some("close"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_callers_share_one_login() {
	let (driver, manager) = manager(&test_config());
	driver.set_launch_delay(Duration::from_millis(50));

	let handles: Vec<_> = (0..8)
		.map(|_| {
			let manager = Arc::clone(&manager);
			tokio::spawn(async move { manager.ensure_ready().await })
		})
		.collect();
	for handle in handles {
		handle.await.unwrap().unwrap();
	}

	assert_eq!(driver.launches(), 1);
	assert_eq!(driver.submits(), 1);
	assert_eq!(manager.state(), SessionState::Ready);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_callers_share_one_failure() {
	let (driver, manager) = manager(&test_config());
	driver.set_login_mode(LoginMode::Blank);
	driver.set_launch_delay(Duration::from_millis(50));

	let handles: Vec<_> = (0..4)
		.map(|_| {
			let manager = Arc::clone(&manager);
			tokio::spawn(async move { manager.ensure_ready().await })
		})
		.collect();
	let mut errors = Vec::new();
	for handle in handles {
		errors.push(handle.await.unwrap().unwrap_err());
	}

	assert_eq!(driver.launches(), 1);
	assert!(errors.iter().all(|err| err == &errors[0]));
	assert!(matches!(errors[0], Error::LoginFailed(_)));
}

#[tokio::test]
async fn existing_authentication_skips_the_form() {
	let (driver, manager) = manager(&test_config());
	driver.set_login_mode(LoginMode::AlreadyAuthenticated);

	manager.ensure_ready().await.unwrap();
	assert_eq!(manager.state(), SessionState::Ready);
	assert_eq!(driver.submits(), 0);
}

#[tokio::test]
async fn blank_login_page_is_indeterminate() {
	let (driver, manager) = manager(&test_config());
	driver.set_login_mode(LoginMode::Blank);

	let err = manager.ensure_ready().await.unwrap_err();
	assert!(matches!(err, Error::LoginFailed(ref msg) if msg.contains("neither")), "{err}");
	assert_eq!(manager.state(), SessionState::Failed);
	assert_eq!(driver.submits(), 0);
}

#[tokio::test]
async fn rejected_credentials_fail_fast() {
	let mut config = test_config();
	config.selectors.login_error = Some(".login-error".into());
	let (driver, manager) = manager(&config);
	driver.set_login_mode(LoginMode::Rejected);

	let err = manager.ensure_ready().await.unwrap_err();
	assert_eq!(err, Error::LoginFailed("Incorrect password".into()));
	assert_eq!(manager.state(), SessionState::Failed);
}

#[tokio::test]
async fn missing_credentials_fail_login() {
	let mut config = test_config();
	config.credentials.password.clear();
	let (driver, manager) = manager(&config);

	let err = manager.ensure_ready().await.unwrap_err();
	assert!(matches!(err, Error::LoginFailed(_)));
	assert_eq!(driver.submits(), 0);
}

#[tokio::test]
async fn step_up_prompt_then_confirmation_reaches_ready() {
	let (driver, manager) = manager(&test_config());
	driver.set_login_mode(LoginMode::StepUp {
		confirm_after: Some(Duration::from_millis(40)),
	});

	manager.ensure_ready().await.unwrap();
	assert_eq!(manager.state(), SessionState::Ready);
}

#[tokio::test]
async fn step_up_state_is_observable_while_waiting() {
	let (driver, manager) = manager(&test_config());
	driver.set_login_mode(LoginMode::StepUp {
		confirm_after: Some(Duration::from_millis(150)),
	});

	let waiter = {
		let manager = Arc::clone(&manager);
		tokio::spawn(async move { manager.ensure_ready().await })
	};
	tokio::time::sleep(Duration::from_millis(60)).await;
	assert_eq!(manager.state(), SessionState::AwaitingStepUp);
	assert!(!manager.health().ready);

	waiter.await.unwrap().unwrap();
	assert_eq!(manager.state(), SessionState::Ready);
}

#[tokio::test]
async fn unconfirmed_step_up_times_out() {
	let config = test_config();
	let (driver, manager) = manager(&config);
	driver.set_login_mode(LoginMode::StepUp { confirm_after: None });

	let err = manager.ensure_ready().await.unwrap_err();
	assert_eq!(
		err,
		Error::StepUpTimeout {
			ms: config.timeouts.step_up_ms
		}
	);
	assert_eq!(manager.state(), SessionState::Failed);
}

#[tokio::test]
async fn silent_step_up_is_assumed_without_prompt_selector() {
	let mut config = test_config();
	config.selectors.step_up_prompt = None;
	let (driver, manager) = manager(&config);
	// Confirmation lands after the login window (200ms) but inside step-up (300ms).
	driver.set_login_mode(LoginMode::SilentStepUp {
		confirm_after: Some(Duration::from_millis(260)),
	});

	manager.ensure_ready().await.unwrap();
	assert_eq!(manager.state(), SessionState::Ready);
}

#[tokio::test]
async fn login_window_running_out_with_prompt_selector_fails() {
	let (driver, manager) = manager(&test_config());
	driver.set_login_mode(LoginMode::SilentStepUp { confirm_after: None });

	let err = manager.ensure_ready().await.unwrap_err();
	assert!(matches!(err, Error::LoginFailed(_)), "{err}");
}

#[tokio::test]
async fn launch_failure_is_driver_unavailable() {
	let (driver, manager) = manager(&test_config());
	driver.set_fail_launch(true);

	let err = manager.ensure_ready().await.unwrap_err();
	assert!(matches!(err, Error::DriverUnavailable(_)));
	assert_eq!(manager.state(), SessionState::Failed);

	driver.set_fail_launch(false);
	manager.ensure_ready().await.unwrap();
	assert_eq!(manager.state(), SessionState::Ready);
}

#[tokio::test]
async fn stale_generation_cannot_expire_fresh_session() {
	let (_driver, manager) = manager(&test_config());
	manager.ensure_ready().await.unwrap();
	let stale = manager.generation();

	assert!(manager.mark_expired(stale, "context closed"));
	assert_eq!(manager.state(), SessionState::Expired);

	manager.ensure_ready().await.unwrap();
	assert_eq!(manager.generation(), stale + 1);

	assert!(!manager.mark_expired(stale, "late report from old scope"));
	assert_eq!(manager.state(), SessionState::Ready);
}

#[tokio::test]
async fn expired_session_reauthenticates_with_fresh_context() {
	let (driver, manager) = manager(&test_config());
	manager.ensure_ready().await.unwrap();
	manager.mark_expired(manager.generation(), "test");

	manager.ensure_ready().await.unwrap();
	assert_eq!(driver.launches(), 2);
	assert_eq!(driver.submits(), 2);
	assert_eq!(driver.contexts_closed(), 1);
}

#[tokio::test]
async fn scope_on_gone_context_expires_session() {
	let (driver, manager) = manager(&test_config());
	manager.ensure_ready().await.unwrap();
	driver.set_context_gone(true);

	let err = manager.new_scoped_context().await.err().unwrap();
	assert!(matches!(err, Error::AuthLost(_)));
	assert_eq!(manager.state(), SessionState::Expired);
}

#[tokio::test]
async fn unauthorized_fetch_expires_session() {
	let (driver, manager) = manager(&test_config());
	manager.ensure_ready().await.unwrap();
	driver.respond_with(401, "unauthorized");

	let err = manager.fetch(list_request()).await.unwrap_err();
	assert!(matches!(err, Error::AuthLost(_)));
	assert_eq!(manager.state(), SessionState::Expired);
}

#[tokio::test]
async fn fetch_requires_ready_session() {
	let (driver, manager) = manager(&test_config());
	let err = manager.fetch(list_request()).await.unwrap_err();
	assert_eq!(
		err,
		Error::SessionNotReady {
			state: SessionState::Uninitialized
		}
	);
	assert!(driver.fetches().is_empty());
}

#[tokio::test]
async fn fetch_context_loss_is_auth_lost() {
	let (driver, manager) = manager(&test_config());
	manager.ensure_ready().await.unwrap();
	driver.fail_fetch(DriverError::ContextClosed("browser gone".into()));

	let err = manager.fetch(list_request()).await.unwrap_err();
	assert!(matches!(err, Error::AuthLost(_)));
	assert_eq!(manager.state(), SessionState::Expired);
}

#[tokio::test]
async fn teardown_is_idempotent() {
	let (driver, manager) = manager(&test_config());
	manager.ensure_ready().await.unwrap();

	manager.teardown().await;
	assert_eq!(manager.state(), SessionState::Uninitialized);
	assert_eq!(driver.contexts_closed(), 1);

	manager.teardown().await;
	assert_eq!(manager.state(), SessionState::Uninitialized);
	assert_eq!(driver.contexts_closed(), 1);

	manager.ensure_ready().await.unwrap();
	assert_eq!(driver.launches(), 2);
}
