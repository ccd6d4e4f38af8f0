//! Highlight engine CLI
//!
//! Reads an analyzed game as JSON and prints its curated highlights.

use std::fs;

use highlight_engine::{DetectorConfig, GameInput, HighlightDetector, HighlightError};
use tracing::info;

fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let path = std::env::args()
        .nth(1)
        .ok_or(HighlightError::MissingData("usage: highlight-engine <input.json>"))?;

    let config = DetectorConfig::load()?;
    let raw = fs::read_to_string(&path).map_err(HighlightError::from)?;
    let game: GameInput = serde_json::from_str(&raw).map_err(HighlightError::from)?;
    info!(
        "Loaded {} moves from {} (opening ends {}, middlegame ends {})",
        game.moves.len(),
        path,
        game.opening_end,
        game.middlegame_end
    );

    let detector = HighlightDetector::new(&config);
    let highlights = detector.detect(&game.moves, game.phases());
    info!("{} highlights", highlights.len());

    println!("{}", serde_json::to_string_pretty(&highlights)?);
    Ok(())
}
