mod api;
mod app;
mod data;
mod models;
mod scheduler;
mod scoring;
mod store;
mod tui;
mod ui;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event};
use tokio::sync::Mutex;

use api::ApiState;
use app::App;
use store::Store;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install().map_err(|err| anyhow::anyhow!(err))?;
    dotenvy::dotenv().ok();
    env_logger::init();

    let db_path = std::env::var("EXAM_TUTOR_DB").unwrap_or_else(|_| "exam_tutor.db".to_string());
    let store = Store::open(&db_path).await?;
    let app = App::new(store).await?;
    let state = ApiState {
        app: Arc::new(Mutex::new(app)),
    };

    spawn_api(state.clone());

    let mut terminal = tui::init()?;
    let res = run_app(&mut terminal, &state).await;
    tui::restore();

    res
}

fn spawn_api(state: ApiState) {
    let addr: SocketAddr = std::env::var("EXAM_TUTOR_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:7878".to_string())
        .parse()
        .unwrap_or_else(|_| ([127, 0, 0, 1], 7878).into());
    let router = api::router(state);

    tokio::spawn(async move {
        let listener = match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(err) => {
                log::error!("api bind failed on {addr}: {err}");
                return;
            }
        };
        log::info!("api listening on {addr}");
        if let Err(err) = axum::serve(listener, router).await {
            log::error!("api server stopped: {err}");
        }
    });
}

async fn run_app(terminal: &mut tui::Tui, state: &ApiState) -> Result<()> {
    loop {
        {
            let app = state.app.lock().await;
            if app.exit {
                break;
            }
            terminal.draw(|frame| ui::render(&app, frame))?;
        }

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                let mut app = state.app.lock().await;
                app.handle_key(key).await?;
            }
        }
    }
    Ok(())
}
