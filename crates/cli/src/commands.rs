use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use msgr::{ChatService, Config};
use serde::Serialize;

use crate::cli::{Cli, Commands, send_request};
use crate::server;

pub async fn run(cli: Cli) -> Result<ExitCode> {
	let mut config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
	cli.apply_overrides(&mut config);
	let service = Arc::new(ChatService::from_config(&config));

	let code = match cli.command {
		Commands::Serve { host, port } => {
			server::serve(Arc::clone(&service), &host, port).await?;
			ExitCode::SUCCESS
		}
		Commands::Login => {
			let outcome = service.ensure_session_ready().await;
			finish(&service, outcome).await?
		}
		Commands::Send {
			target,
			body,
			image,
			file,
		} => {
			let request = send_request(&target, &body, image.as_deref(), file.as_deref());
			let result = service.dispatch_message(&request).await;
			service.shutdown().await;
			print_json(&result)?;
			if result.succeeded { ExitCode::SUCCESS } else { ExitCode::FAILURE }
		}
		Commands::Snapshot => {
			let outcome = service.fetch_and_save_snapshot().await;
			finish(&service, outcome).await?
		}
	};
	Ok(code)
}

/// Tears the session down and prints either the value or the error body.
async fn finish<T: Serialize>(service: &ChatService, outcome: msgr::Result<T>) -> Result<ExitCode> {
	service.shutdown().await;
	match outcome {
		Ok(value) => {
			print_json(&value)?;
			Ok(ExitCode::SUCCESS)
		}
		Err(err) => {
			print_json(&err.to_body())?;
			eprintln!("error: {err}");
			Ok(ExitCode::FAILURE)
		}
	}
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
	let rendered = serde_json::to_string_pretty(value).context("failed to serialize output")?;
	println!("{rendered}");
	Ok(())
}
