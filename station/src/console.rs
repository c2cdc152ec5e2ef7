//! Line-oriented console for playing one session.
//!
//! The protocol is plain text on stdin/stdout, so it also suits scripted
//! play and automated testing:
//! - Lines starting with `#` are console commands (save, load, quit, ...)
//! - Every other line is sent to the game as a player command
//! - Output lines are tagged (`[NARRATOR]`, `[STATUS]`, `[ERROR]`, ...)

use station_core::{GameEngine, StateSnapshot};
use std::io::{self, BufRead, Write};

const CONSOLE_HELP: &[&str] = &[
    "  #quit            - Exit the game",
    "  #save <name>     - Save the game",
    "  #load <name>     - Load a saved game into this session",
    "  #saves           - List saved games, newest first",
    "  #model <backend> - Switch the narrative backend (claude, openai, openrouter, gemini, llama)",
    "  #status          - Show current game status",
    "  #help            - Show this help",
];

/// Run one session until `#quit` or end of input.
pub async fn run_console(engine: &GameEngine) -> io::Result<()> {
    let start = engine.start_session().await;
    let session = start.session_id;

    println!("=== Dark Station Chronicles ===");
    println!();
    println!("{}", start.opening);
    println!();
    println!("Console commands:");
    for line in CONSOLE_HELP {
        println!("{line}");
    }
    println!();
    print_status(&start.snapshot);
    println!();

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(command) = line.strip_prefix('#') {
            let parts: Vec<&str> = command.split_whitespace().collect();
            match parts.as_slice() {
                ["quit"] | ["exit"] => {
                    println!("Goodbye!");
                    break;
                }
                ["save", name] => match engine.save(session, name).await {
                    Ok(info) => println!("[SAVED] {} ({} turns)", info.name, info.metadata.turns),
                    Err(e) => println!("[ERROR] Save failed: {e}"),
                },
                ["load", name] => match engine.restore(session, name).await {
                    Ok(loaded) => {
                        println!("[LOADED] {}", loaded.save.name);
                        print_status(&loaded.snapshot);
                    }
                    Err(e) => println!("[ERROR] Load failed: {e}"),
                },
                ["saves"] => match engine.list_saves().await {
                    Ok(saves) if saves.is_empty() => println!("[SAVES] none"),
                    Ok(saves) => {
                        println!("[SAVES]");
                        for save in saves {
                            println!(
                                "  {} - {} (level {}, {} turns, {})",
                                save.name,
                                save.metadata.room,
                                save.metadata.level,
                                save.metadata.turns,
                                save.metadata.saved_at.format("%Y-%m-%d %H:%M:%S UTC"),
                            );
                        }
                    }
                    Err(e) => println!("[ERROR] Listing saves failed: {e}"),
                },
                ["model", backend] | ["backend", backend] => {
                    match engine.switch_backend(session, backend).await {
                        Ok(active) => println!("[MODEL] Now narrating with {active}"),
                        Err(e) => println!("[ERROR] {e}"),
                    }
                }
                ["status"] => match engine.snapshot(session).await {
                    Ok(snapshot) => print_status(&snapshot),
                    Err(e) => println!("[ERROR] {e}"),
                },
                ["help"] => {
                    println!("[HELP]");
                    for line in CONSOLE_HELP {
                        println!("{line}");
                    }
                    println!("  (anything else is sent to the game; try `help`)");
                }
                ["save"] | ["load"] | ["model"] | ["backend"] => {
                    println!("[ERROR] Usage: #{} <name>", parts[0]);
                }
                _ => println!("[ERROR] Unknown command. Type #help for help."),
            }
            stdout.flush()?;
            continue;
        }

        print!("[PROCESSING]");
        stdout.flush()?;

        let result = engine.process_command(session, line).await;
        print!("\r            \r");
        match result {
            Ok(response) => {
                println!("[NARRATOR]");
                for para in response.narrative.split("\n\n") {
                    println!("{para}");
                }
                println!();
            }
            Err(e) => println!("[ERROR] {e}"),
        }
        stdout.flush()?;
    }

    engine.end_session(session).await.ok();
    Ok(())
}

fn print_status(snapshot: &StateSnapshot) {
    println!("[STATUS]");
    println!("  Location: {}", snapshot.room);
    println!("  Exits: {}", join_or_none(&snapshot.exits));
    println!("  Items here: {}", join_or_none(&snapshot.items_here));
    println!(
        "  Health: {}  Energy: {}  Level: {}  XP: {}",
        snapshot.health, snapshot.energy, snapshot.level, snapshot.experience
    );
    println!(
        "  Class: {}",
        snapshot
            .class
            .map_or_else(|| "not chosen".to_string(), |class| class.to_string())
    );
    println!("  Inventory: {}", join_or_none(&snapshot.inventory));
    println!("  Narrator: {}", snapshot.active_backend);
    println!("  Turns: {}", snapshot.turn_count);
}

fn join_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}
