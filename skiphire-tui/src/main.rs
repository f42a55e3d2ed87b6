//! Terminal UI for skiphire that lets users browse skip sizes and prices for a location.

mod app;
mod input;
mod ui;

use std::{
    env,
    fs::OpenOptions,
    io,
    sync::{Arc, Mutex},
    time::{Duration as StdDuration, Instant},
};

use anyhow::{Result, anyhow};
use clap::Parser;
use crossterm::{
    event::{
        self, DisableFocusChange, DisableMouseCapture, EnableFocusChange, EnableMouseCapture, Event as CEvent,
    },
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend, layout::Rect};
use reqwest::Client;
use skiphire_core::{model::Location, service::SkipHireService, settings::Settings};
use skiphire_provider_wewantwaste as wewantwaste;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::app::App;
use crate::input::Action;

const LOG_VAR: &str = "SKIPHIRE_LOG";
const LOG_FILE_VAR: &str = "SKIPHIRE_LOG_FILE";
const DEFAULT_LOG_FILE: &str = "skiphire.log";

/// Browse skip hire options and prices for a location.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Postcode to look up, e.g. NR32
    #[arg(long)]
    postcode: Option<String>,
    /// Area within the postcode, e.g. Lowestoft
    #[arg(long)]
    area: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(err) = dotenvy::dotenv()
        && !err.not_found()
    {
        return Err(err.into());
    }
    let args = Args::parse();
    init_tracing()?;

    // HTTP + service setup
    let settings = Settings::from_env()?;
    let client = Client::builder()
        .user_agent("skiphire/0.1")
        .timeout(settings.http_timeout)
        .build()?;
    let service = Arc::new(SkipHireService::new(
        wewantwaste::gateway(client, &settings),
        &settings,
    ));

    let location = Location::resolve(
        args.postcode.as_deref(),
        args.area.as_deref(),
        &settings.default_location,
    );
    info!(%location, base_url = %settings.base_url, "starting");

    // Terminal init
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture, EnableFocusChange)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // App state
    let width = terminal.size()?.width;
    let app = App::new(service, location, width);

    // Run event loop
    let res = run(&mut terminal, app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture,
        DisableFocusChange
    )?;
    terminal.show_cursor()?;

    res
}

/// Log to a file when `SKIPHIRE_LOG` is set; stdout belongs to the UI.
fn init_tracing() -> Result<()> {
    let Ok(filter) = env::var(LOG_VAR) else {
        return Ok(());
    };
    let path = env::var(LOG_FILE_VAR).unwrap_or_else(|_| DEFAULT_LOG_FILE.to_owned());
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|err| anyhow!("failed to install log subscriber: {err}"))
}

async fn run(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, mut app: App) -> Result<()> {
    app.is_loading = true;
    terminal.draw(|frame| ui::draw(frame, &app))?;
    app.load().await;

    loop {
        app.tick(Instant::now());
        if app.revalidate_due(Instant::now()) {
            app.load().await;
        }

        // Draw current UI
        terminal.draw(|frame| ui::draw(frame, &app))?;

        // Poll for input (non-blocking, small timeout so animations and refreshes advance)
        if !event::poll(StdDuration::from_millis(50))? {
            continue;
        }

        let now = Instant::now();
        let action = match event::read()? {
            CEvent::Key(key) => input::handle_key_event(key, &mut app, now),
            CEvent::Mouse(mouse) => {
                let size = terminal.size()?;
                let area = Rect::new(0, 0, size.width, size.height);
                input::handle_mouse_event(mouse, &mut app, area, now)
            }
            CEvent::Resize(width, _height) => {
                app.resize(width);
                Action::None
            }
            CEvent::FocusGained if !app.is_refreshing => {
                app.load().await;
                Action::None
            }
            _ => Action::None,
        };

        match action {
            Action::Quit => break,
            Action::None => {}
            Action::Prefetch(id) => app.service.prefetch_option(id),
            Action::Retry => {
                app.is_loading = true;
                terminal.draw(|frame| ui::draw(frame, &app))?;
                app.retry().await;
            }
            Action::OpenDetails(id) => match app.service.option(id).await {
                Ok(cached) => app.show_details(cached.value),
                Err(err) => {
                    app.error_message = Some(format!("Failed to load skip details: {err}"));
                }
            },
            Action::Continue => app.confirm_selection(),
        }
    }

    app.service.stop_observing(&app.location);
    Ok(())
}
