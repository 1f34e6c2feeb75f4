mod render;

use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use swarnam_contracts::{
    parse_command, ChatCommand, ImageRef, ScenarioKind, SessionObserver, SessionState,
    ShotKind, SnapshotWriter, CHAT_HELP_COMMANDS,
};
use swarnam_engine::{
    error_chain_text, DryrunService, ExpansionOutcome, GeminiConfig, GeminiService,
    Orchestrator, ScenarioOutcome, UploadOutcome,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "swarnam-rs", version, about = "Swarnam jewelry visualization CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Chat(ChatArgs),
    Run(RunArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    Gemini,
    Dryrun,
}

#[derive(Debug, Args)]
struct BackendArgs {
    #[arg(long, value_enum, default_value_t = Backend::Gemini)]
    backend: Backend,
    #[arg(long, default_value_t = 0)]
    dryrun_latency_ms: u64,
    #[arg(long)]
    analysis_model: Option<String>,
    #[arg(long)]
    image_model: Option<String>,
}

#[derive(Debug, Parser)]
struct ChatArgs {
    #[arg(long)]
    out: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
    #[command(flatten)]
    backend: BackendArgs,
}

#[derive(Debug, Parser)]
struct RunArgs {
    #[arg(long)]
    image: PathBuf,
    #[arg(long)]
    out: PathBuf,
    #[arg(long)]
    expand: Vec<ScenarioKind>,
    #[arg(long)]
    events: Option<PathBuf>,
    #[command(flatten)]
    backend: BackendArgs,
}

fn main() {
    init_tracing();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("swarnam-rs error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Chat(args) => {
            run_chat(args)?;
            Ok(0)
        }
        Command::Run(args) => run_run(args),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn build_orchestrator(
    args: &BackendArgs,
    observer: Arc<dyn SessionObserver>,
) -> Result<Orchestrator> {
    let orchestrator = match args.backend {
        Backend::Dryrun => Orchestrator::from_service(
            DryrunService::new().with_latency(Duration::from_millis(args.dryrun_latency_ms)),
        ),
        Backend::Gemini => {
            let mut config = GeminiConfig::from_env();
            if let Some(model) = args.analysis_model.clone() {
                config.analysis_model = model;
            }
            if let Some(model) = args.image_model.clone() {
                config.image_model = model;
            }
            let service =
                GeminiService::new(config).context("failed to configure the Gemini backend")?;
            info!(
                analysis_model = %service.config().analysis_model,
                image_model = %service.config().image_model,
                "using Gemini backend"
            );
            Orchestrator::from_service(service)
        }
    };
    Ok(orchestrator.with_observer(observer))
}

fn open_events(out: &Path, events: Option<PathBuf>) -> Result<SnapshotWriter> {
    fs::create_dir_all(out)
        .with_context(|| format!("failed to create output dir {}", out.display()))?;
    let path = events.unwrap_or_else(|| out.join("events.jsonl"));
    Ok(SnapshotWriter::new(path, Uuid::new_v4().to_string()))
}

fn run_run(args: RunArgs) -> Result<i32> {
    let events = open_events(&args.out, args.events.clone())?;
    let orchestrator = build_orchestrator(&args.backend, Arc::new(events.clone()))?;
    let image = load_upload(&args.image)?;

    let mut clean = true;
    match orchestrator.start_upload(image)? {
        UploadOutcome::Settled { scenarios, .. } => {
            for (scenario, outcome) in scenarios.iter() {
                if let ScenarioOutcome::Failed(reason) = outcome {
                    eprintln!("{scenario} generation failed: {reason}");
                    clean = false;
                }
            }
        }
        UploadOutcome::Superseded { token } => {
            eprintln!("Upload #{token} was superseded before generation.");
            clean = false;
        }
    }

    for scenario in args.expand.iter().copied() {
        match orchestrator.expand_scenario(scenario) {
            Ok(ExpansionOutcome::Unavailable) => {
                eprintln!("{scenario} has no look to expand.");
                clean = false;
            }
            Ok(_) => {}
            Err(err) => {
                eprintln!("{scenario} expansion failed: {}", error_chain_text(&err));
                clean = false;
            }
        }
    }

    let state = orchestrator.snapshot();
    print!("{}", render::render_state(&state));
    orchestrator.close_expansion();

    for path in save_gallery(&state, &args.out)? {
        println!("Saved {}", path.display());
    }
    println!("Events: {} (run {})", events.path().display(), events.run_id());
    Ok(if clean { 0 } else { 2 })
}

/// Forwards every snapshot to the events file and prints a progress line.
struct ChatView {
    events: SnapshotWriter,
}

impl SessionObserver for ChatView {
    fn on_transition(&self, transition: &str, state: &SessionState) {
        self.events.on_transition(transition, state);
        println!("{}", render::transition_line(transition, state));
    }
}

fn run_chat(args: ChatArgs) -> Result<()> {
    let events = open_events(&args.out, args.events.clone())?;
    info!(run_id = events.run_id(), path = %events.path().display(), "chat session events");
    let orchestrator = build_orchestrator(&args.backend, Arc::new(ChatView { events }))?;

    let stdin = io::stdin();
    let mut line = String::new();
    let mut workers: Vec<JoinHandle<()>> = Vec::new();

    println!("Swarnam chat started. Type /help for commands.");

    loop {
        print!("> ");
        io::stdout().flush()?;

        line.clear();
        let read = match stdin.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }
        workers.retain(|worker| !worker.is_finished());

        match parse_command(&line) {
            ChatCommand::Noop => continue,
            ChatCommand::Help => {
                println!("Commands: {}", CHAT_HELP_COMMANDS.join(" "));
            }
            ChatCommand::Upload(path) => match load_upload(&path) {
                Ok(image) => workers.push(spawn_upload(&orchestrator, image)?),
                Err(err) => println!("Upload failed: {err:#}"),
            },
            ChatCommand::Expand(scenario) => {
                workers.push(spawn_expansion(&orchestrator, scenario)?);
            }
            ChatCommand::Close => {
                if !orchestrator.close_expansion() {
                    println!("No portfolio is open.");
                }
            }
            ChatCommand::Status => {
                print!("{}", render::render_state(&orchestrator.snapshot()));
            }
            ChatCommand::Save => match save_gallery(&orchestrator.snapshot(), &args.out) {
                Ok(paths) if paths.is_empty() => println!("Nothing to save yet."),
                Ok(paths) => {
                    for path in paths {
                        println!("Saved {}", path.display());
                    }
                }
                Err(err) => println!("Save failed: {err:#}"),
            },
            ChatCommand::Quit => break,
            ChatCommand::Invalid(message) => println!("{message}"),
            ChatCommand::Unknown(raw) => println!("Unknown command: {raw} (try /help)"),
        }
    }

    for worker in workers {
        if worker.join().is_err() {
            warn!("chat worker panicked");
        }
    }
    Ok(())
}

fn spawn_upload(orchestrator: &Orchestrator, image: ImageRef) -> Result<JoinHandle<()>> {
    let orchestrator = orchestrator.clone();
    thread::Builder::new()
        .name("swarnam-upload".to_string())
        .spawn(move || match orchestrator.start_upload(image) {
            Ok(UploadOutcome::Settled { token, scenarios }) => {
                let failed: Vec<String> = scenarios
                    .iter()
                    .filter(|(_, outcome)| matches!(outcome, ScenarioOutcome::Failed(_)))
                    .map(|(scenario, _)| scenario.label().to_string())
                    .collect();
                if failed.is_empty() {
                    println!("Upload #{token}: looks ready. Try /expand <scenario>.");
                } else {
                    println!("Upload #{token}: generation failed for {}.", failed.join(", "));
                }
            }
            Ok(UploadOutcome::Superseded { token }) => {
                println!("Upload #{token} was replaced by a newer upload.");
            }
            Err(err) => println!("Analysis failed: {}", error_chain_text(&err)),
        })
        .context("failed to spawn upload worker")
}

fn spawn_expansion(orchestrator: &Orchestrator, scenario: ScenarioKind) -> Result<JoinHandle<()>> {
    let orchestrator = orchestrator.clone();
    thread::Builder::new()
        .name(format!("swarnam-expand-{}", scenario.slug()))
        .spawn(move || match orchestrator.expand_scenario(scenario) {
            Ok(ExpansionOutcome::Unavailable) => {
                println!("{scenario} has no look to expand yet.");
            }
            Ok(ExpansionOutcome::Completed { fetched }) => {
                println!("{scenario} portfolio ready ({fetched} new shots).");
            }
            Ok(ExpansionOutcome::Cached) => println!("{scenario} portfolio reopened."),
            Ok(ExpansionOutcome::InFlight) => println!("{scenario} portfolio is still rendering."),
            Ok(ExpansionOutcome::Superseded { .. }) => {
                println!("{scenario} portfolio was replaced by a newer upload.");
            }
            Err(err) => println!("{scenario} expansion failed: {}", error_chain_text(&err)),
        })
        .context("failed to spawn expansion worker")
}

fn load_upload(path: &Path) -> Result<ImageRef> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    if bytes.is_empty() {
        bail!("{} is empty", path.display());
    }
    Ok(ImageRef::from_bytes(guess_image_mime(path), &bytes))
}

fn guess_image_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "heic" | "heif" => "image/heic",
        _ => "image/png",
    }
}

/// Writes every generated look and expansion shot into `out`.
fn save_gallery(state: &SessionState, out: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(out)
        .with_context(|| format!("failed to create output dir {}", out.display()))?;
    let mut saved = Vec::new();
    for (scenario, slot) in state.results().iter() {
        let Some(result) = slot else {
            continue;
        };
        let path = out.join(format!(
            "Swarnam-{}.{}",
            scenario.label(),
            result.image_url.extension()
        ));
        write_image(&path, &result.image_url)?;
        saved.push(path);

        for shot in state.expansion_shots(scenario) {
            let path = out.join(format!(
                "Swarnam-{}-{}.{}",
                scenario.label(),
                shot_file_label(shot.kind),
                shot.image_url.extension()
            ));
            write_image(&path, &shot.image_url)?;
            saved.push(path);
        }
    }
    Ok(saved)
}

fn shot_file_label(shot: ShotKind) -> String {
    shot.label().replace(' ', "-")
}

fn write_image(path: &Path, image: &ImageRef) -> Result<()> {
    let bytes = image
        .decode()
        .with_context(|| format!("invalid image data for {}", path.display()))?;
    fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))
}
