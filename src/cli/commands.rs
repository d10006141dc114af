use tokio::time::MissedTickBehavior;
use tracing::info;

use crate::config::game::GameConfig;
use crate::config::generation::GenerationParams;
use crate::persistence::SaveStore;
use crate::simulation::Game;
use crate::world::generation::{generate_world, print_world_summary, render_region, summarize};

/// Seconds between status lines while a session runs.
const STATUS_INTERVAL_SECS: f32 = 30.0;

/// Generate a world and print its summary, optionally as JSON and with a
/// symbol preview around the spawn point.
pub fn generate(params: &GenerationParams, json: bool, preview: Option<u32>) -> Result<(), String> {
    params.validate()?;
    let world = generate_world(params);

    if json {
        let text = serde_json::to_string_pretty(&summarize(&world))
            .map_err(|e| format!("Cannot encode summary: {}", e))?;
        println!("{}", text);
    } else {
        print_world_summary(&world);
    }

    if let Some(size) = preview {
        println!();
        print!(
            "{}",
            render_region(&world, world.spawn.0, world.spawn.1, size * 2, size)
        );
    }
    Ok(())
}

/// Host a game until Ctrl-C. Starts from a save when `load` names one.
pub async fn host(
    config: &GameConfig,
    params: &GenerationParams,
    load: Option<&str>,
    save_on_exit: Option<&str>,
) -> Result<(), String> {
    let mut game = Game::new(config.clone(), params);
    if let Some(name) = load {
        if !game.load_game(name) {
            return Err(format!("Cannot load save '{}'", name));
        }
    }
    if !game.start_host().await {
        return Err(format!("Cannot listen on {}:{}", config.bind, config.port));
    }
    eprintln!(
        "Hosting seed {} on {}",
        game.seed(),
        game.session_addr()
            .map(|a| a.to_string())
            .unwrap_or_default()
    );

    run_session(&mut game, save_on_exit).await;
    Ok(())
}

/// Join a host and follow it until Ctrl-C or until the host goes away.
pub async fn join(
    config: &GameConfig,
    params: &GenerationParams,
    addr: &str,
    save_on_exit: Option<&str>,
) -> Result<(), String> {
    let mut game = Game::new(config.clone(), params);
    if !game.join(addr).await {
        return Err(format!("Cannot connect to {}", addr));
    }
    eprintln!("Connected to {}", addr);

    run_session(&mut game, save_on_exit).await;
    Ok(())
}

/// Fixed-rate tick loop. Missed ticks are skipped, never run in a burst.
async fn run_session(game: &mut Game, save_on_exit: Option<&str>) {
    let mut interval = tokio::time::interval(game.config().tick_interval());
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let status_every = ((game.config().tick_rate_hz * STATUS_INTERVAL_SECS) as u64).max(1);
    let was_client = !game.is_host();

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = &mut shutdown => {
                eprintln!("\nShutdown signal received");
                break;
            }
        }

        game.tick();

        if was_client && game.role().is_none() {
            eprintln!("Disconnected from host");
            break;
        }
        if game.tick_count() % status_every == 0 {
            info!(
                tick = game.tick_count(),
                seed = game.seed(),
                peers = game.remotes().len(),
                rabbits = game.wildlife().alive_count(),
                health = game.player().health(),
                hunger = game.player().hunger(),
                "Status"
            );
        }
    }

    if let Some(name) = save_on_exit {
        if game.save_game(name) {
            eprintln!("Saved as '{}'", name);
        } else {
            eprintln!("Warning: could not save '{}'", name);
        }
    }
    game.leave_session();
    eprintln!("Stopped at tick {}", game.tick_count());
}

pub fn list_saves(config: &GameConfig) -> Result<(), String> {
    let store = SaveStore::new(&config.save_directory);
    let saves = store
        .list_metadata()
        .map_err(|e| format!("Cannot list saves: {}", e))?;

    if saves.is_empty() {
        println!("No saves found in {}", store.dir().display());
        return Ok(());
    }
    println!("{:<32} {:>16} {:>8}", "Name", "Saved (ms)", "Version");
    println!("{}", "-".repeat(58));
    for meta in &saves {
        println!(
            "{:<32} {:>16} {:>8}",
            meta.name, meta.timestamp_ms, meta.format_version
        );
    }
    println!("\n{} save(s) in {}", saves.len(), store.dir().display());
    Ok(())
}

pub fn show_save(config: &GameConfig, name: &str) -> Result<(), String> {
    let store = SaveStore::new(&config.save_directory);
    let snapshot = store
        .load(name)
        .map_err(|e| format!("Cannot load save '{}': {}", name, e))?;

    let p = &snapshot.player;
    println!("=== Save '{}' ===", snapshot.metadata.name);
    println!("Saved at: {} ms", snapshot.metadata.timestamp_ms);
    println!("Format version: {}", snapshot.metadata.format_version);
    println!(
        "Player: ({:.2}, {:.2}) facing {:?}, health {}, hunger {}, xp {}, level {}",
        p.x, p.y, p.direction, p.health, p.hunger, p.experience, p.level
    );
    println!("Rabbits: {}", snapshot.wildlife.len());
    println!();
    print_world_summary(&snapshot.world());
    Ok(())
}

pub fn delete_save(config: &GameConfig, name: &str) -> Result<(), String> {
    let store = SaveStore::new(&config.save_directory);
    store
        .delete(name)
        .map_err(|e| format!("Cannot delete save '{}': {}", name, e))?;
    println!("Deleted '{}'", name);
    Ok(())
}
