use std::path::PathBuf;

use clap::builder::Styles;
use clap::builder::styling::AnsiColor;
use clap::{Parser, Subcommand};
use msgr::Config;
use msgr::protocol::{AttachmentKind, DispatchRequest, MessagePayload};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8787;

/// Cargo-like help colors.
fn help_styles() -> Styles {
	Styles::styled()
		.header(AnsiColor::Green.on_default().bold())
		.usage(AnsiColor::Green.on_default().bold())
		.literal(AnsiColor::Cyan.on_default())
		.placeholder(AnsiColor::Cyan.on_default())
}

#[derive(Parser, Debug)]
#[command(name = "msgr")]
#[command(about = "Shared authenticated chat session: send messages and capture conversation lists")]
#[command(version)]
#[command(styles = help_styles())]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Config file (defaults to <config dir>/msgr/config.json)
	#[arg(long, global = true, value_name = "FILE")]
	pub config: Option<PathBuf>,

	/// Attach to a running browser instead of launching one
	#[arg(long, global = true, value_name = "URL")]
	pub cdp_endpoint: Option<String>,

	/// Show the browser window
	#[arg(long, global = true)]
	pub headful: bool,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
	/// Run the HTTP API
	Serve {
		#[arg(long, default_value = DEFAULT_HOST)]
		host: String,
		#[arg(long, default_value_t = DEFAULT_PORT)]
		port: u16,
	},

	/// Log in and print session health
	Login,

	/// Send one message
	Send {
		/// Conversation id
		target: String,
		/// Message text
		#[arg(default_value = "")]
		body: String,
		/// Attach an image (URL or local path)
		#[arg(long, value_name = "REF", conflicts_with = "file")]
		image: Option<String>,
		/// Attach a file (URL or local path)
		#[arg(long, value_name = "REF")]
		file: Option<String>,
	},

	/// Capture the conversation list and print it
	Snapshot,
}

impl Cli {
	/// Applies command-line overrides on top of the loaded config.
	pub fn apply_overrides(&self, config: &mut Config) {
		if let Some(endpoint) = &self.cdp_endpoint {
			config.browser.cdp_endpoint = Some(endpoint.clone());
		}
		if self.headful {
			config.browser.headless = false;
		}
	}
}

/// Builds the dispatch request for `msgr send`.
pub fn send_request(target: &str, body: &str, image: Option<&str>, file: Option<&str>) -> DispatchRequest {
	let payload = match (image, file) {
		(Some(reference), _) => MessagePayload::with_attachment(body, AttachmentKind::Image, reference),
		(None, Some(reference)) => MessagePayload::with_attachment(body, AttachmentKind::File, reference),
		(None, None) => MessagePayload::text(body),
	};
	DispatchRequest::new(target, payload)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn serve_defaults() {
		let cli = Cli::try_parse_from(["msgr", "serve"]).unwrap();
		assert_eq!(
			cli.command,
			Commands::Serve {
				host: DEFAULT_HOST.into(),
				port: DEFAULT_PORT
			}
		);
		assert_eq!(cli.verbose, 0);
		assert!(!cli.headful);
	}

	#[test]
	fn global_flags_after_subcommand() {
		let cli = Cli::try_parse_from([
			"msgr",
			"login",
			"-vv",
			"--headful",
			"--cdp-endpoint",
			"http://127.0.0.1:9222",
			"--config",
			"/tmp/msgr.json",
		])
		.unwrap();
		assert_eq!(cli.command, Commands::Login);
		assert_eq!(cli.verbose, 2);
		assert_eq!(cli.config, Some(PathBuf::from("/tmp/msgr.json")));

		let mut config = Config::default();
		cli.apply_overrides(&mut config);
		assert!(!config.browser.headless);
		assert_eq!(config.browser.cdp_endpoint.as_deref(), Some("http://127.0.0.1:9222"));
	}

	#[test]
	fn send_with_image() {
		let cli = Cli::try_parse_from(["msgr", "send", "c-1", "look", "--image", "https://cdn.test/a.png"]).unwrap();
		let Commands::Send {
			target,
			body,
			image,
			file,
		} = cli.command
		else {
			panic!("expected send");
		};
		let request = send_request(&target, &body, image.as_deref(), file.as_deref());
		assert_eq!(request.target, "c-1");
		assert_eq!(request.payload.kind, AttachmentKind::Image);
		assert_eq!(request.payload.reference.as_deref(), Some("https://cdn.test/a.png"));
	}

	#[test]
	fn image_and_file_conflict() {
		assert!(Cli::try_parse_from(["msgr", "send", "c-1", "x", "--image", "a", "--file", "b"]).is_err());
	}

	#[test]
	fn text_send_without_attachment() {
		let request = send_request("c-1", "hi", None, None);
		assert_eq!(request.payload, MessagePayload::text("hi"));
	}
}
