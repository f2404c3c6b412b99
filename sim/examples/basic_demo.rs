//! Basic demonstration of the overworld simulation.
//!
//! Run with: cargo run --example basic_demo
//! Set `RUST_LOG=mmo_sim=debug` for per-system logging.

use mmo_sim::{Directions, Engine, GameEvent, WorldConfig};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("=== Overworld - Simulation Demo ===\n");

    let mut engine = Engine::new(WorldConfig::default())?;
    let meta = engine.meta();
    println!("World: {}x{}", meta.width, meta.height);

    let ticks = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&ticks);
    engine.on_update(move |snapshot| {
        let tick = counter.fetch_add(1, Ordering::Relaxed) + 1;
        if tick % 15 == 0 {
            for (player, view) in &snapshot.field_of_view {
                println!(
                    "tick {tick:>4} | {player}: {} visible entities, {} visible cells",
                    view.entities.len(),
                    view.cells.len()
                );
            }
        }
    });

    engine.start()?;

    engine.schedule(GameEvent::joined("alice"));
    engine.schedule(GameEvent::joined("bob"));
    tokio::time::sleep(Duration::from_millis(500)).await;

    println!("\n--- alice walks right, bob walks down ---\n");
    engine.schedule(GameEvent::moved("alice", Directions { right: true, ..Default::default() }));
    engine.schedule(GameEvent::moved("bob", Directions { down: true, ..Default::default() }));
    tokio::time::sleep(Duration::from_secs(2)).await;

    engine.schedule(GameEvent::moved("alice", Directions::default()));
    engine.schedule(GameEvent::moved("bob", Directions::default()));
    engine.schedule(GameEvent::left("bob"));
    tokio::time::sleep(Duration::from_millis(500)).await;

    engine.stop().await;

    println!("\n=== Final State (JSON) ===\n");
    let world = engine.world();
    let world = world.lock();
    println!("{}", world.snapshot().to_json_pretty()?);
    println!("\nTicks run: {}", world.current_tick());

    Ok(())
}
