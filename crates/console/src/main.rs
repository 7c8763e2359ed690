//! SupportLink console
//!
//! Terminal host for the support widget: renders the widget state to stdout
//! and turns stdin lines into widget commands.

mod commands;
mod render;

use std::env;
use std::sync::Arc;

use anyhow::Context;
use supportlink_client::websocket::WsConnector;
use supportlink_client::{Config, Widget, WidgetHandle};
use supportlink_shared::{Identity, Role, SharedError};
use tokio::io::{AsyncBufReadExt, BufReader};

use commands::{parse_line, resolve_notification, Input, HELP};
use render::Renderer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_logging();

    let config = Config::from_env().context("Invalid configuration")?;
    let identity = identity_from_env().context("Invalid identity")?;
    let role = identity.role;

    tracing::info!(
        url = %config.ws_url,
        identity_id = %identity.identity_id,
        role = %role,
        alert_feed = config.enable_alert_feed,
        "Starting SupportLink console"
    );

    let widget = Widget::new(config, Arc::new(WsConnector))
        .on_connection_error(|surface, error| {
            println!("! {} unavailable: {}", surface.as_str(), error);
        })
        .spawn();
    widget.set_identity(Some(identity));

    println!("{}", HELP);

    let mut state = widget.subscribe();
    let mut renderer = Renderer::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };
                let input = parse_line(&line);
                if input == Input::Quit {
                    break;
                }
                apply(&widget, role, input);
            }
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = state.borrow_and_update().clone();
                for line in renderer.render(&snapshot) {
                    println!("{}", line);
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    widget.shutdown().await;
    Ok(())
}

fn apply(widget: &WidgetHandle, role: Role, input: Input) {
    match input {
        Input::Message(text) => {
            if role == Role::Customer {
                widget.signal_typing();
            }
            widget.set_input(text);
            widget.send_message();
        }
        Input::Select(id) => widget.select_counterparty(id),
        Input::ToggleOpen => widget.toggle_open(),
        Input::Dismiss(arg) => {
            let id = resolve_notification(&widget.snapshot(), &arg);
            widget.dismiss_notification(id);
        }
        Input::Typing => widget.signal_typing(),
        Input::Unknown(line) => println!("? {} ({})", line, HELP),
        Input::Empty | Input::Quit => {}
    }
}

fn identity_from_env() -> Result<Identity, SharedError> {
    let identity_id = required("SUPPORTLINK_IDENTITY_ID")?;
    let role: Role = env::var("SUPPORTLINK_ROLE")
        .unwrap_or_else(|_| "CUSTOMER".to_string())
        .parse()?;
    let display_name =
        env::var("SUPPORTLINK_DISPLAY_NAME").unwrap_or_else(|_| identity_id.clone());
    let credential = required("SUPPORTLINK_TOKEN")?;

    Ok(Identity::new(identity_id, role, display_name, credential))
}

fn required(var: &'static str) -> Result<String, SharedError> {
    env::var(var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or(SharedError::MissingField(var))
}

fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("supportlink_client=info,supportlink_console=info"));

    // Logs go to stderr so they never interleave with the rendered chat
    if env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
            .ok();
    }
}
