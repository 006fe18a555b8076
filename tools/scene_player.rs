/// Scene Player: plays a story directory in the terminal.
///
/// Usage: scene_player --story <dir> [--autoplay] [--seed <n>] [--max-steps <n>]
///
/// Commands:
///   next | n | <enter>      skip the reveal, or proceed
///   choose <i> | c <i>      pick a branch option
///   auto                    toggle auto-advance
///   box                     hide or show the dialogue box
///   wait <secs>             let time pass
///   speed text|auto <v>     set a speed in 0..=1
///   status                  show the current node and line
///   help                    list commands
///   quit                    exit

use novel_engine::core::host::{
    ChoicePresenter, DialogueDisplay, DialogueLog, Presentation, SceneCompleteHandler,
};
use novel_engine::core::input::InputAction;
use novel_engine::schema::character::CharacterId;
use novel_engine::schema::scene::SceneId;
use novel_engine::{RunnerError, RunnerStatus, SceneRunner};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io::{self, BufRead, Write};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const FRAME: Duration = Duration::from_millis(100);

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage();
        return;
    }

    let mut story_dir = None;
    let mut autoplay = false;
    let mut seed: u64 = 42;
    let mut max_steps: usize = 10_000;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--story" if i + 1 < args.len() => {
                i += 1;
                story_dir = Some(args[i].clone());
            }
            "--autoplay" => autoplay = true,
            "--seed" if i + 1 < args.len() => {
                i += 1;
                seed = args[i].parse().unwrap_or(42);
            }
            "--max-steps" if i + 1 < args.len() => {
                i += 1;
                max_steps = args[i].parse().unwrap_or(10_000);
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let Some(story_dir) = story_dir else {
        eprintln!("ERROR: --story <dir> is required");
        print_usage();
        std::process::exit(1);
    };

    let mut runner = match SceneRunner::builder()
        .story_dir(&story_dir)
        .host(ConsoleHost)
        .build()
    {
        Ok(runner) => runner,
        Err(e) => {
            eprintln!("ERROR: Failed to load story: {}", e);
            std::process::exit(1);
        }
    };

    println!(
        "Loaded {} scenes, {} characters",
        runner.scenes().len(),
        runner.characters().len()
    );

    if let Err(e) = runner.start() {
        eprintln!("ERROR: {}", e);
        std::process::exit(1);
    }

    let result = if autoplay {
        println!("Autoplay, seed {}\n", seed);
        autoplay_story(&mut runner, seed, max_steps)
    } else {
        println!("Type 'help' for commands.\n");
        interactive(&mut runner)
    };

    if let Err(e) = result {
        eprintln!("ERROR: {}", e);
        std::process::exit(1);
    }
}

/// Let auto-advance carry the story and pick branch options at random.
fn autoplay_story(runner: &mut SceneRunner, seed: u64, max_steps: usize) -> Result<(), RunnerError> {
    let mut rng = StdRng::seed_from_u64(seed);
    runner.set_auto_advance(true);

    for _ in 0..max_steps {
        match runner.status() {
            RunnerStatus::Running => {}
            status => {
                println!("\nStopped: {:?}", status);
                return Ok(());
            }
        }
        if let Some(count) = runner.pending_choices().map(|c| c.len()) {
            let pick = rng.gen_range(0..count);
            println!("  -> choosing {}", pick);
            runner.choose(pick)?;
            continue;
        }
        runner.update(FRAME)?;
    }

    println!("\nStopped after {} steps", max_steps);
    Ok(())
}

fn interactive(runner: &mut SceneRunner) -> Result<(), RunnerError> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("player> ");
        stdout.flush().ok();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).is_err() || line.is_empty() {
            break;
        }
        let parts: Vec<&str> = line.split_whitespace().collect();
        let cmd = parts.first().map(|p| p.to_lowercase()).unwrap_or_default();

        let outcome = match cmd.as_str() {
            "quit" | "exit" | "q" => {
                println!("Goodbye.");
                break;
            }
            "help" | "h" | "?" => {
                print_help();
                continue;
            }
            "" | "next" | "n" => runner.handle_input(InputAction::Proceed),
            "choose" | "c" => match parts.get(1).and_then(|p| p.parse().ok()) {
                Some(index) => runner.handle_input(InputAction::Choose(index)),
                None => {
                    println!("Usage: choose <index>");
                    continue;
                }
            },
            "auto" => runner.handle_input(InputAction::ToggleAuto),
            "box" => runner.handle_input(InputAction::ToggleDialogueBox),
            "wait" => {
                let secs: f64 = parts.get(1).and_then(|p| p.parse().ok()).unwrap_or(1.0);
                match Duration::try_from_secs_f64(secs) {
                    Ok(dt) => runner.update(dt)?,
                    Err(_) => println!("Usage: wait <seconds>"),
                }
                continue;
            }
            "speed" => {
                match (parts.get(1), parts.get(2).and_then(|v| v.parse::<f32>().ok())) {
                    (Some(&"text"), Some(v)) => runner.set_text_speed(v),
                    (Some(&"auto"), Some(v)) => runner.set_auto_speed(v),
                    _ => println!("Usage: speed text|auto <0..1>"),
                }
                continue;
            }
            "status" => {
                print_status(runner);
                continue;
            }
            _ => {
                println!("Unknown command '{}'. Type 'help'.", cmd);
                continue;
            }
        };

        match outcome {
            Ok(outcome) => println!("  ({:?})", outcome),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => println!("  {}", e),
        }
    }

    Ok(())
}

fn print_status(runner: &SceneRunner) {
    println!("  status: {:?}", runner.status());
    if let (Some(scene), Some(node)) = (runner.scene_id(), runner.current_node()) {
        println!("  at scene {} node {} ({})", scene, node.id, node.kind.name());
    }
    if let Some(speaker) = runner.speaker() {
        println!("  {}: {}", speaker, runner.visible_text());
    }
    println!(
        "  typing: {}, input: {}, auto: {} (speed {:.2}), text speed {:.2}",
        runner.is_typing(),
        runner.input_allowed(),
        runner.auto_enabled(),
        runner.auto_speed(),
        runner.text_speed()
    );
}

/// Prints what a real front end would render. The per-character reveal
/// is left out; the log line carries the full text.
#[derive(Clone, Copy)]
struct ConsoleHost;

impl Presentation for ConsoleHost {
    fn set_background(&mut self, image: &str) {
        println!("[background] {}", image);
    }

    fn set_bgm(&mut self, track: &str) {
        println!("[bgm] {}", track);
    }

    fn play_sfx(&mut self, clip: &str) {
        println!("[sfx] {}", clip);
    }

    fn update_character(&mut self, character: CharacterId, show: bool) {
        let verb = if show { "enters" } else { "leaves" };
        println!("[stage] character {} {}", character, verb);
    }

    fn set_sprite(&mut self, character: CharacterId, sprite: &str) {
        println!("[stage] character {} wears {}", character, sprite);
    }

    fn highlight_speaker(&mut self, _character: CharacterId) {}
}

impl DialogueDisplay for ConsoleHost {
    fn show_speaker_name(&mut self, _name: &str) {}

    fn show_dialogue_text(&mut self, _text: &str) {}

    fn set_dialogue_box_visible(&mut self, visible: bool) {
        println!("[box] {}", if visible { "shown" } else { "hidden" });
    }
}

impl ChoicePresenter for ConsoleHost {
    fn present_choices(&mut self, labels: &[String]) {
        for (i, label) in labels.iter().enumerate() {
            println!("  {}) {}", i, label);
        }
    }
}

impl DialogueLog for ConsoleHost {
    fn log_dialogue_line(&mut self, speaker: &str, sprite: Option<&str>, text: &str) {
        match sprite {
            Some(sprite) => println!("{} [{}]: {}", speaker, sprite, text),
            None => println!("{}: {}", speaker, text),
        }
    }
}

impl SceneCompleteHandler for ConsoleHost {
    fn on_scene_complete(&mut self, scene: SceneId) {
        println!("[end] scene {} complete", scene);
    }
}

fn print_usage() {
    println!("Usage: scene_player --story <dir> [--autoplay] [--seed <n>] [--max-steps <n>]");
    println!();
    println!("Options:");
    println!("  --story <dir>      Story directory (characters.ron, settings.ron, scenes/)");
    println!("  --autoplay         Play unattended, picking branch options at random");
    println!("  --seed <n>         RNG seed for autoplay choices (default: 42)");
    println!("  --max-steps <n>    Autoplay frame limit (default: 10000)");
}

fn print_help() {
    println!("Commands:");
    println!("  next | n | <enter>      Skip the reveal, or proceed");
    println!("  choose <i> | c <i>      Pick a branch option");
    println!("  auto                    Toggle auto-advance");
    println!("  box                     Hide or show the dialogue box");
    println!("  wait <secs>             Let time pass (default 1)");
    println!("  speed text|auto <v>     Set a speed in 0..=1");
    println!("  status                  Show the current node and line");
    println!("  help                    This message");
    println!("  quit                    Exit");
}
