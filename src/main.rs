//! KEIBA: race scoring, bet combination and stake planner
//!
//! Entry point. Loads configuration, initialises structured logging,
//! opens a session for the configured startup race and serves the
//! session API until shutdown.

use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

use keiba::config;
use keiba::dashboard::{self, DashboardState};
use keiba::data;
use keiba::ranking::RankKey;
use keiba::session::SessionRegistry;
use keiba::types::RaceMeta;

const BANNER: &str = r#"
 _  _______ ___ ____    _
| |/ / ____|_ _| __ )  / \
| ' /|  _|  | ||  _ \ / _ \
| . \| |___ | || |_) / ___ \
|_|\_\_____|___|____/_/   \_\

  Race scoring, combination and stake planner
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let config_path = std::env::var("KEIBA_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    let cfg = config::AppConfig::load(&config_path)?;

    init_logging();

    println!("{BANNER}");
    info!(
        name = %cfg.app.name,
        currency = %cfg.app.currency,
        config = %config_path,
        "KEIBA starting up"
    );

    // -- Roster source & registry ----------------------------------------

    let source = data::build_source(&cfg.data);
    let registry = Arc::new(SessionRegistry::new(&cfg));

    let meta = RaceMeta::new(
        Utc::now().date_naive(),
        cfg.app.startup_course,
        cfg.app.startup_race,
    )?;
    let roster = source
        .fetch_roster(&meta)
        .await
        .with_context(|| format!("Failed to load roster for {meta} from {}", source.name()))?;
    let id = registry.open(meta, roster).await?;

    {
        let session = registry.get(id).await?;
        let session = session.lock().await;
        let leaders = session.ranking().leaders(cfg.display.highlight_top);
        for row in session
            .runner_table(RankKey::Composite, None, &cfg.display.highlight_rule())
            .iter()
            .filter(|r| leaders.contains(&r.number))
        {
            info!(
                number = row.number,
                name = %row.name,
                composite = %row.composite,
                odds = %row.odds,
                rank = row.score_rank,
                "Leader"
            );
        }
    }

    // -- Serve -----------------------------------------------------------

    if !cfg.dashboard.enabled {
        info!("Dashboard disabled; nothing left to do.");
        return Ok(());
    }

    let state = Arc::new(DashboardState::new(registry, source));
    info!("Serving session API. Press Ctrl+C to stop.");
    dashboard::serve(state, cfg.dashboard.port, async {
        let _ = tokio::signal::ctrl_c().await;
        info!("Shutdown signal received.");
    })
    .await?;

    info!("KEIBA shut down cleanly.");
    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("keiba=info"));

    let json_logging = std::env::var("KEIBA_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
