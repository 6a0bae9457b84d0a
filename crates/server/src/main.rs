//! Evo-Arena — evolutionary paper-trading bot arena
//!
//! Usage:
//!   evo-arena serve --port 3001            — Launch web server with UI
//!   evo-arena run --symbols BTCUSDT        — Run the arena headless from CLI
//!   evo-arena reset --yes                  — Wipe saved arena state

use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{get, post},
    Router,
};
use clap::{Parser, Subcommand};
use engine::{Arena, ArenaConfig, BinanceFuturesClient, SignalPool};
use persistence::repository::{SessionRepository, SnapshotRepository};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::{error, info};

const APP_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "-", env!("GIT_HASH"));

#[derive(Parser)]
#[command(name = "evo-arena")]
#[command(about = "Evolutionary paper-trading bot arena", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch the arena web server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        /// Port to listen on
        #[arg(short, long, default_value_t = 3001)]
        port: u16,
    },
    /// Run the arena headless until Ctrl+C
    Run {
        /// Symbols the genesis population trades (comma-separated)
        #[arg(long, value_delimiter = ',')]
        symbols: Vec<String>,
        /// Seconds between trading cycles
        #[arg(long, default_value_t = 6)]
        cycle_secs: u64,
        /// Ignore any saved snapshot and start from genesis
        #[arg(long)]
        fresh: bool,
    },
    /// Wipe the saved arena snapshot (the session archive is kept)
    Reset {
        /// Confirm the wipe
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Clone)]
struct AppState {
    arena: Arc<Arena>,
    db: Arc<persistence::Database>,
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("debug,engine=debug,evo_arena=debug")
    } else {
        EnvFilter::new("info,engine=info,evo_arena=info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).compact())
        .with(filter)
        .init();
}

fn db_path_from_env() -> String {
    std::env::var("ARENA_DB_PATH").unwrap_or_else(|_| "data/arena.db".to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    dotenvy::dotenv().ok();

    match cli.command {
        Commands::Serve { host, port } => {
            cmd_serve(&host, port).await?;
        }
        Commands::Run {
            symbols,
            cycle_secs,
            fresh,
        } => {
            cmd_run(symbols, cycle_secs, fresh).await?;
        }
        Commands::Reset { yes } => {
            cmd_reset(yes).await?;
        }
    }

    Ok(())
}

// ============================================================================
// Serve command — Axum web server
// ============================================================================

async fn cmd_serve(host: &str, port: u16) -> anyhow::Result<()> {
    info!("Evo-Arena v{} starting...", APP_VERSION);

    let db_path = db_path_from_env();
    let db = persistence::Database::new(&db_path).await.map_err(|e| {
        error!("Failed to initialize database: {}", e);
        anyhow::anyhow!("Database initialization failed: {}", e)
    })?;
    info!("Database initialized: {}", db_path);

    let market = Arc::new(BinanceFuturesClient::new());
    let pool = Arc::new(SignalPool::new(market));
    let arena = Arc::new(Arena::new(
        pool,
        Some(db.pool_clone()),
        ArenaConfig::default(),
    ));
    arena.restore().await;
    arena.start();

    let state = AppState {
        arena,
        db: Arc::new(db),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Determine static files directory
    let exe_path = std::env::current_exe().unwrap_or_default();
    let exe_dir = exe_path.parent().unwrap_or(std::path::Path::new("."));
    let dist_dir = exe_dir.join("dist");
    let static_dir = if dist_dir.exists() {
        dist_dir
    } else {
        std::path::PathBuf::from("dist")
    };

    let api_routes = Router::new()
        .route("/health", get(api_health))
        .route("/arena/status", get(api_arena_status))
        .route("/arena/leaderboard", get(api_leaderboard))
        .route("/arena/stats", get(api_stats))
        .route("/arena/hall-of-fame", get(api_hall_of_fame))
        .route("/arena/start", post(api_arena_start))
        .route("/arena/stop", post(api_arena_stop))
        .route("/arena/reset", post(api_arena_reset))
        .route("/arena/sessions", get(api_sessions))
        .route("/arena/sessions/:session_id", get(api_session_detail))
        .with_state(state);

    let app = Router::new()
        .nest("/api", api_routes)
        .fallback_service(ServeDir::new(&static_dir))
        .layer(cors);

    let addr: std::net::SocketAddr = format!("{}:{}", host, port).parse()?;
    println!("\n=== Evo-Arena v{} ===", APP_VERSION);
    println!("Evolutionary Trading Arena");
    println!("Listening on http://{}", addr);
    println!("\nEndpoints:");
    println!("  GET  /api/health                  - Health check");
    println!("  GET  /api/arena/status            - Full per-bot detail");
    println!("  GET  /api/arena/leaderboard       - Bots ranked by bankroll");
    println!("  GET  /api/arena/stats             - Arena-wide aggregates");
    println!("  GET  /api/arena/hall-of-fame      - Historically strong genomes");
    println!("  POST /api/arena/start             - Start the trading loops");
    println!("  POST /api/arena/stop              - Stop and archive sessions");
    println!("  POST /api/arena/reset             - Back to the genesis population");
    println!("  GET  /api/arena/sessions          - Archived session list");
    println!("  GET  /api/arena/sessions/:id      - One session with genome and trades");
    println!("\n  Database: {}", db_path);
    println!("\nPress Ctrl+C to stop\n");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Run command — headless CLI mode
// ============================================================================

async fn cmd_run(symbols: Vec<String>, cycle_secs: u64, fresh: bool) -> anyhow::Result<()> {
    println!("\n=== Evo-Arena v{} ===", APP_VERSION);

    let db_path = db_path_from_env();
    let db = persistence::Database::new(&db_path)
        .await
        .map_err(|e| anyhow::anyhow!("Database initialization failed: {}", e))?;

    let config = ArenaConfig {
        symbols: if symbols.is_empty() {
            ArenaConfig::default().symbols
        } else {
            symbols
        },
        cycle_secs,
        ..ArenaConfig::default()
    };
    println!("Database: {}", db_path);
    println!(
        "Symbols: {} | Cycle: {}s | Mode: {}",
        config.symbols.join(", "),
        config.cycle_secs,
        if fresh { "fresh" } else { "resume" }
    );
    println!("Press Ctrl+C to stop\n");

    let market = Arc::new(BinanceFuturesClient::new());
    let pool = Arc::new(SignalPool::new(market));
    let arena = Arc::new(Arena::new(pool, Some(db.pool_clone()), config));

    if fresh {
        info!("--fresh given, skipping snapshot restore");
    } else {
        arena.restore().await;
    }
    arena.start();

    // Ctrl+C stops the arena; the display loop below notices and exits
    let arena_for_ctrlc = arena.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl+C received, stopping arena...");
        arena_for_ctrlc.stop().await;
    });

    // Leaderboard display loop
    loop {
        tokio::time::sleep(tokio::time::Duration::from_secs(10)).await;
        if !arena.is_running() {
            break;
        }
        let board = arena.leaderboard();
        println!(
            "\n  Generation {} | Cycle {}",
            board["generation"], board["cycle"]
        );
        if let Some(bots) = board["bots"].as_array() {
            for bot in bots {
                println!(
                    "  {:>2}. {:<10} ${:>10.2}  {:>5.1}% wr  {:>4} trades  {:>2} deaths",
                    bot["rank"].as_u64().unwrap_or(0),
                    bot["name"].as_str().unwrap_or("?"),
                    bot["bankroll"].as_f64().unwrap_or(0.0),
                    bot["win_rate"].as_f64().unwrap_or(0.0),
                    bot["trades"].as_u64().unwrap_or(0),
                    bot["death_count"].as_u64().unwrap_or(0),
                );
            }
        }
    }

    println!("\nArena stopped.");
    Ok(())
}

// ============================================================================
// Reset command
// ============================================================================

async fn cmd_reset(yes: bool) -> anyhow::Result<()> {
    if !yes {
        println!("This wipes the saved arena state; archived sessions are kept.");
        println!("Re-run with --yes to confirm.");
        return Ok(());
    }

    let db_path = db_path_from_env();
    let db = persistence::Database::new(&db_path)
        .await
        .map_err(|e| anyhow::anyhow!("Database initialization failed: {}", e))?;

    let removed = SnapshotRepository::new(db.pool())
        .clear()
        .await
        .map_err(|e| anyhow::anyhow!("Snapshot clear failed: {}", e))?;
    println!(
        "Arena state cleared ({} snapshot removed). Next start seeds a fresh genesis population.",
        removed
    );
    Ok(())
}

// ============================================================================
// API Handlers — Arena
// ============================================================================

/// GET /api/health
async fn api_health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "evo-arena",
        "version": APP_VERSION,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// GET /api/arena/status — full per-bot detail
async fn api_arena_status(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(state.arena.status())
}

/// GET /api/arena/leaderboard — bots ranked by bankroll
async fn api_leaderboard(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(state.arena.leaderboard())
}

/// GET /api/arena/stats — arena-wide aggregates and best performers
async fn api_stats(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(state.arena.stats())
}

/// GET /api/arena/hall-of-fame
async fn api_hall_of_fame(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(state.arena.hall_of_fame())
}

/// POST /api/arena/start
async fn api_arena_start(State(state): State<AppState>) -> Json<serde_json::Value> {
    let started = state.arena.start();
    if started {
        info!("Arena started via API");
    }
    Json(json!({
        "success": started,
        "message": if started { "Arena started" } else { "Arena already running" },
    }))
}

/// POST /api/arena/stop
async fn api_arena_stop(State(state): State<AppState>) -> Json<serde_json::Value> {
    let stopped = state.arena.stop().await;
    if stopped {
        info!("Arena stopped via API");
    }
    Json(json!({
        "success": stopped,
        "message": if stopped { "Arena stopped, sessions archived" } else { "Arena was not running" },
    }))
}

/// POST /api/arena/reset — wipe state, reseed genesis. Does not restart.
async fn api_arena_reset(State(state): State<AppState>) -> Json<serde_json::Value> {
    match state.arena.reset().await {
        Ok(()) => {
            info!("Arena reset via API");
            Json(json!({
                "success": true,
                "message": "Arena reset to genesis; POST /api/arena/start to resume",
            }))
        }
        Err(e) => Json(json!({
            "success": false,
            "message": format!("Reset failed: {}", e),
        })),
    }
}

#[derive(Deserialize)]
struct SessionsQuery {
    limit: Option<i64>,
}

/// GET /api/arena/sessions — archived session summaries, newest first
async fn api_sessions(
    State(state): State<AppState>,
    Query(query): Query<SessionsQuery>,
) -> Json<serde_json::Value> {
    let limit = query.limit.unwrap_or(50).clamp(1, 500);
    let repo = SessionRepository::new(state.db.pool());
    match repo.list(limit).await {
        Ok(sessions) => Json(json!({
            "success": true,
            "count": sessions.len(),
            "sessions": sessions,
        })),
        Err(e) => Json(json!({
            "success": false,
            "message": format!("Session query failed: {}", e),
        })),
    }
}

/// GET /api/arena/sessions/:id — one session with its genome and trade tail
async fn api_session_detail(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Json<serde_json::Value> {
    let repo = SessionRepository::new(state.db.pool());
    match repo.get(&session_id).await {
        Ok(Some(row)) => {
            let genome: serde_json::Value =
                serde_json::from_str(&row.genome_json).unwrap_or(serde_json::Value::Null);
            let trades: serde_json::Value = row
                .trades_json
                .as_deref()
                .and_then(|s| serde_json::from_str(s).ok())
                .unwrap_or(serde_json::Value::Null);
            let strategies: serde_json::Value = row
                .active_strategies_json
                .as_deref()
                .and_then(|s| serde_json::from_str(s).ok())
                .unwrap_or(serde_json::Value::Null);
            Json(json!({
                "success": true,
                "session": {
                    "session_id": row.session_id,
                    "bot_id": row.bot_id,
                    "bot_name": row.bot_name,
                    "generation": row.generation,
                    "start_bankroll": row.start_bankroll,
                    "end_bankroll": row.end_bankroll,
                    "peak_bankroll": row.peak_bankroll,
                    "trades": row.trades,
                    "wins": row.wins,
                    "losses": row.losses,
                    "win_rate": row.win_rate,
                    "max_drawdown_pct": row.max_drawdown_pct,
                    "fitness": row.fitness,
                    "death_count": row.death_count,
                    "end_reason": row.end_reason,
                    "started_at": row.started_at,
                    "ended_at": row.ended_at,
                    "genome": genome,
                    "recent_trades": trades,
                    "active_strategies": strategies,
                },
            }))
        }
        Ok(None) => Json(json!({
            "success": false,
            "message": "Session not found",
        })),
        Err(e) => Json(json!({
            "success": false,
            "message": format!("Session query failed: {}", e),
        })),
    }
}
