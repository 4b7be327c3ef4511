use std::io::{self, Stdout};
use std::path::Path;

use anyhow::{Context, Result};
use chat_client::api::ApiClient;
use chat_client::app::App;
use chat_client::app_event::{AppEvent, AppEventSender};
use chat_client::config::Cli;
use chat_client::ui;
use clap::Parser;
use crossterm::{
    event::{Event, EventStream},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures::StreamExt;
use ratatui::prelude::*;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.resolve().await?;
    let _log_guard = init_logging(&config.log_file)?;

    let api = ApiClient::from_config(&config)?;
    tracing::info!(base_url = %config.base_url, "starting chat client");

    // Results of background requests flow back to the UI loop here
    let (tx, mut rx) = mpsc::unbounded_channel::<AppEvent>();
    let mut app = App::new(api, AppEventSender::new(tx));

    // Setup Terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run(&mut terminal, &mut app, &mut rx).await;

    // Restore Terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

async fn run(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut App,
    rx: &mut UnboundedReceiver<AppEvent>,
) -> Result<()> {
    app.start();
    let mut input = EventStream::new();

    while !app.should_quit {
        terminal.draw(|f| ui::render(f, app))?;

        tokio::select! {
            Some(event) = rx.recv() => app.handle_event(event),
            maybe_event = input.next() => match maybe_event {
                Some(Ok(Event::Key(key))) => app.handle_key(key),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e).context("failed to read terminal input"),
                None => break,
            },
        }
    }

    Ok(())
}

/// The terminal is busy drawing the UI, so logs go to a file.
fn init_logging(log_file: &Path) -> Result<WorkerGuard> {
    let directory = log_file
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = log_file
        .file_name()
        .with_context(|| format!("log file {} has no file name", log_file.display()))?;

    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(directory, file_name));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chat=info,chat_client=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false),
        )
        .init();
    Ok(guard)
}
