use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use log::{error, info, warn};
use tokio::sync::Mutex;

use server::api::{self, ApiState};
use server::app::Application;
use server::{config, db, scheduler, snapshot};

// Command line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Path to the game configuration JSON
    #[clap(short, long)]
    config_file: PathBuf,

    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Server port to listen on
    #[clap(short, long, default_value = "8080")]
    port: u16,

    /// Spawn dogs at random road points instead of the first road start
    #[clap(long)]
    randomize_spawn_points: bool,

    /// Simulation tick period in milliseconds
    #[clap(long, default_value = "50")]
    tick_period: u64,

    /// Autosave period in milliseconds (0 disables the autosave driver)
    #[clap(long, default_value = "0")]
    autosave_period: u64,

    /// World state file, restored on start and saved on shutdown
    #[clap(long)]
    state_file: Option<PathBuf>,

    /// Disable the periodic drivers; the world advances only through the
    /// test tick endpoint
    #[clap(long)]
    test_mode: bool,
}

const GAME_DB_URL: &str = "GAME_DB_URL";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Warning: RUST_LOG environment variable not set. Set it to display logs!");
        eprintln!("Recommended: RUST_LOG=info");
    }

    let args = Args::parse();

    let db_url = std::env::var(GAME_DB_URL)
        .with_context(|| format!("{GAME_DB_URL} environment variable not found"))?;
    let workers = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let repo = db::PostgresChampions::connect(&db_url, (workers / 2).max(1) as u32)
        .await
        .context("failed to prepare the records database")?;

    let game = config::load_game(&args.config_file)?;
    let mut app = Application::new(
        game,
        Arc::new(repo),
        args.randomize_spawn_points,
        args.test_mode,
    );

    if let Some(path) = &args.state_file {
        match snapshot::load_from_file(path) {
            Ok(saved) => match snapshot::restore(&mut app, saved) {
                Ok(()) => info!("world state restored from {}", path.display()),
                Err(err) => warn!("state file ignored, starting empty: {err:#}"),
            },
            Err(err) => warn!("no usable state file, starting empty: {err:#}"),
        }
    }

    let state = Arc::new(ApiState {
        app: Mutex::new(app),
        state_file: if args.test_mode {
            args.state_file.clone()
        } else {
            None
        },
    });

    let (stop_drivers, stop_flag) = tokio::sync::watch::channel(false);
    let mut drivers = Vec::new();
    if !args.test_mode {
        drivers.push(scheduler::spawn_tick_loop(
            state.clone(),
            Duration::from_millis(args.tick_period),
            stop_flag.clone(),
        ));
        if args.autosave_period > 0 {
            if let Some(path) = args.state_file.clone() {
                drivers.push(scheduler::spawn_autosave_loop(
                    state.clone(),
                    Duration::from_millis(args.autosave_period),
                    path,
                    stop_flag.clone(),
                ));
            }
        }
    }
    drop(stop_flag);

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("game server listening on {addr}");

    axum::serve(listener, api::router(state.clone()))
        .with_graceful_shutdown(scheduler::shutdown_signal())
        .await
        .context("server error")?;

    // Stop the periodic drivers and drain any in-flight firing before the
    // final save so nothing mutates the world while it is written out.
    let _ = stop_drivers.send(true);
    for driver in drivers {
        let _ = driver.await;
    }

    if let Some(path) = &args.state_file {
        let app = state.app.lock().await;
        match snapshot::save_to_file(&app, path) {
            Ok(()) => info!("final world state saved to {}", path.display()),
            Err(err) => error!("final snapshot failed: {err:#}"),
        }
    }
    info!("server stopped");
    Ok(())
}
