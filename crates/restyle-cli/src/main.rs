use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use restyle_contracts::catalog::{QuickTransform, StyleCatalog};
use restyle_contracts::chat::{parse_intent, CHAT_HELP_COMMANDS};
use restyle_contracts::events::EventWriter;
use restyle_contracts::gallery::{FileImageStore, GalleryManager, ImageStore, MemoryImageStore};
use restyle_contracts::images::StoredImage;
use restyle_engine::export;
use restyle_engine::{
    provider_from_config, Completion, ConfigOverrides, Controller, ControllerError, EngineConfig,
    GenerationJob, Session, SessionEvent, SourceImage, ZoomTarget,
};
use serde_json::Value;

#[derive(Debug, Parser)]
#[command(name = "restyle", version, about = "Redraw images in anime art styles")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Default, Args)]
struct GlobalArgs {
    /// Image provider: gemini or dryrun
    #[arg(long, global = true)]
    provider: Option<String>,
    #[arg(long, global = true)]
    model: Option<String>,
    /// Directory holding gallery.json and events.jsonl
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    #[arg(long, global = true)]
    events: Option<PathBuf>,
    /// Keep the gallery in memory for this run only
    #[arg(long, global = true)]
    ephemeral: bool,
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the available art styles
    Styles,
    /// Restyle one image and write the result as a PNG
    Transform(TransformArgs),
    Gallery {
        #[command(subcommand)]
        command: GalleryCommand,
    },
    /// Interactive session driven by slash commands
    Session,
}

#[derive(Debug, Parser)]
struct TransformArgs {
    /// Source image path, or - for stdin
    #[arg(long)]
    image: PathBuf,
    #[arg(long, conflicts_with_all = ["quick", "prompt"])]
    style: Option<String>,
    #[arg(long, conflicts_with = "prompt")]
    quick: Option<String>,
    #[arg(long)]
    prompt: Option<String>,
    #[arg(long, default_value = ".")]
    out: PathBuf,
    /// Also add the result to the gallery
    #[arg(long)]
    save: bool,
}

#[derive(Debug, Subcommand)]
enum GalleryCommand {
    List,
    Delete {
        id: i64,
    },
    Export {
        id: i64,
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("restyle error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);

    let config = EngineConfig::from_env_with(ConfigOverrides {
        provider: cli.global.provider.clone(),
        model: cli.global.model.clone(),
        data_dir: cli.global.data_dir.clone(),
    });
    tracing::debug!(provider = %config.provider, model = %config.model, "resolved configuration");

    match cli.command {
        Command::Styles => {
            print_styles(&StyleCatalog::default());
            Ok(0)
        }
        Command::Transform(args) => run_transform(&cli.global, &config, args),
        Command::Gallery { command } => run_gallery(&cli.global, &config, command),
        Command::Session => run_session(&cli.global, &config),
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_writer(io::stderr)
        .try_init();
}

fn open_store(global: &GlobalArgs, config: &EngineConfig) -> Arc<dyn ImageStore> {
    if global.ephemeral {
        return Arc::new(MemoryImageStore::new());
    }
    match config.data_dir.as_ref() {
        Some(dir) => Arc::new(FileImageStore::new(dir.clone())),
        None => Arc::new(FileImageStore::unavailable()),
    }
}

fn journal_path(global: &GlobalArgs, config: &EngineConfig) -> Option<PathBuf> {
    if global.events.is_some() || global.ephemeral {
        return global.events.clone();
    }
    config.events_path()
}

fn build_controller(global: &GlobalArgs, config: &EngineConfig) -> Controller {
    let gallery = GalleryManager::new(open_store(global, config));
    let controller = Controller::new(gallery, StyleCatalog::default());
    match journal_path(global, config) {
        Some(path) => controller.with_journal(EventWriter::for_new_session(path)),
        None => controller,
    }
}

fn load_source(path: &Path) -> Result<SourceImage> {
    if path == Path::new("-") {
        return SourceImage::from_reader("stdin", io::stdin().lock())
            .context("failed to read image from stdin");
    }
    SourceImage::from_path(path).with_context(|| format!("failed to load {}", path.display()))
}

fn run_transform(global: &GlobalArgs, config: &EngineConfig, args: TransformArgs) -> Result<i32> {
    let provider = provider_from_config(config)?;
    let mut session = Session::new(build_controller(global, config), provider);
    session.controller_mut().upload(load_source(&args.image)?);

    let job = match (
        args.style.as_deref(),
        args.quick.as_deref(),
        args.prompt.as_deref(),
    ) {
        (Some(style), _, _) => session.controller_mut().select_style(style)?,
        (None, Some(raw), _) => {
            let transform = QuickTransform::parse(raw)
                .with_context(|| format!("unknown quick transform '{raw}' (expected male or female)"))?;
            session.controller_mut().quick_transform(transform)?
        }
        (None, None, Some(prompt)) => session.controller_mut().manual_prompt(prompt)?,
        (None, None, None) => bail!("pass one of --style, --quick or --prompt"),
    };

    println!("Generating {} with {}...", job.label(), session.provider_name());
    session.run_blocking(job);
    if let Some(message) = session.controller().error() {
        bail!("{message}");
    }

    let path = session.controller().download(&args.out)?;
    println!("Wrote {}", path.display());
    if args.save {
        session.controller_mut().save_result()?;
        println!(
            "Saved to gallery ({} images).",
            session.controller().gallery_items().len()
        );
    }
    Ok(0)
}

fn run_gallery(global: &GlobalArgs, config: &EngineConfig, command: GalleryCommand) -> Result<i32> {
    let mut controller = build_controller(global, config);
    match command {
        GalleryCommand::List => {
            print_gallery(controller.load_gallery()?);
        }
        GalleryCommand::Delete { id } => {
            controller.delete_from_gallery(id)?;
            println!("Deleted {id}.");
        }
        GalleryCommand::Export { id, out } => {
            let stored = controller
                .load_gallery()?
                .iter()
                .find(|image| image.id == id)
                .cloned()
                .ok_or(ControllerError::NotInGallery(id))?;
            let image = stored
                .decode()
                .with_context(|| format!("gallery image {id} is corrupt"))?;
            let path = export::write_png(&image, &out, id)?;
            println!("Wrote {}", path.display());
        }
    }
    Ok(0)
}

fn run_session(global: &GlobalArgs, config: &EngineConfig) -> Result<i32> {
    let provider = provider_from_config(config)?;
    let mut session = Session::new(build_controller(global, config), provider);
    if let Err(err) = session.controller_mut().load_gallery() {
        println!("{err}");
    }

    let _reader = session.spawn_line_reader(BufReader::new(io::stdin()))?;
    println!(
        "Restyle session started ({} provider). Type /help for commands.",
        session.provider_name()
    );
    print_prompt()?;

    let mut input_open = true;
    while let Some(event) = session.next_event() {
        if handle_event(&mut session, event, &mut input_open)? == Flow::Quit {
            break;
        }
        if input_open {
            print_prompt()?;
        }
    }
    Ok(0)
}

/// Once input has closed the session only lives until nothing is in flight.
fn handle_event(session: &mut Session, event: SessionEvent, input_open: &mut bool) -> Result<Flow> {
    match event {
        SessionEvent::Input(line) => handle_line(session, &line),
        SessionEvent::InputClosed => {
            *input_open = false;
            if !session.controller().is_loading() {
                return Ok(Flow::Quit);
            }
            println!("Waiting for the current generation to finish...");
            Ok(Flow::Continue)
        }
        SessionEvent::GenerationFinished { token, outcome } => {
            if session.handle_completion(token, outcome) == Completion::Applied {
                print_outcome(session.controller());
            }
            if !*input_open && !session.controller().is_loading() {
                return Ok(Flow::Quit);
            }
            Ok(Flow::Continue)
        }
    }
}

fn print_prompt() -> Result<()> {
    print!("> ");
    io::stdout().flush()?;
    Ok(())
}

fn handle_line(session: &mut Session, line: &str) -> Result<Flow> {
    let intent = parse_intent(line);
    match intent.action.as_str() {
        "noop" => {}
        "help" => println!("Commands: {}", CHAT_HELP_COMMANDS.join(" ")),
        "quit" => return Ok(Flow::Quit),
        "list_styles" => print_styles(session.controller().catalog()),
        "upload" => {
            let Some(path) = intent.arg_str("path") else {
                println!("/upload requires a path");
                return Ok(Flow::Continue);
            };
            match load_source(Path::new(path)) {
                Ok(source) => {
                    let name = source.name.clone();
                    session.controller_mut().upload(source);
                    println!("Loaded {name}.");
                }
                Err(err) => println!("{err:#}"),
            }
        }
        "apply_style" => {
            let Some(style) = intent.arg_str("target") else {
                println!(
                    "/style requires a style id ({})",
                    session.controller().catalog().ids().join(", ")
                );
                return Ok(Flow::Continue);
            };
            let job = session.controller_mut().select_style(style);
            start_generation(session, job)?;
        }
        "quick_transform" => {
            let Some(transform) = intent.arg_str("target").and_then(QuickTransform::parse) else {
                println!("Unknown quick transform.");
                return Ok(Flow::Continue);
            };
            let job = session.controller_mut().quick_transform(transform);
            start_generation(session, job)?;
        }
        "generate" => {
            let prompt = intent.prompt.clone().unwrap_or_default();
            let job = session.controller_mut().manual_prompt(&prompt);
            start_generation(session, job)?;
        }
        "save_result" => match session.controller_mut().save_result() {
            Ok(true) => println!(
                "Saved to gallery ({} images).",
                session.controller().gallery_items().len()
            ),
            Ok(false) => println!("Nothing to save yet."),
            Err(err) => println!("{err}"),
        },
        "open_gallery" => match session.controller_mut().open_gallery() {
            Ok(items) => print_gallery(items),
            Err(err) => println!("{err}"),
        },
        "delete_image" => {
            let Some(id) = intent.command_args.get("id").and_then(Value::as_i64) else {
                println!("/delete requires a numeric gallery id");
                return Ok(Flow::Continue);
            };
            match session.controller_mut().delete_from_gallery(id) {
                Ok(()) => println!("Deleted {id}."),
                Err(err) => println!("{err}"),
            }
        }
        "zoom" => {
            let Some(target) = ZoomTarget::parse(intent.arg_str("target").unwrap_or("result"))
            else {
                println!("/zoom expects original, result or a gallery id");
                return Ok(Flow::Continue);
            };
            match session.controller_mut().zoom(target) {
                Ok(path) => println!("Viewing {}", path.display()),
                Err(err) => println!("{err}"),
            }
        }
        "close" => {
            let controller = session.controller_mut();
            controller.close_zoom();
            controller.close_gallery();
            println!("Closed.");
        }
        "download" => {
            let dir = intent
                .arg_str("path")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."));
            match session.controller().download(&dir) {
                Ok(path) => println!("Wrote {}", path.display()),
                Err(err) => println!("{err}"),
            }
        }
        "status" => {
            for line in status_lines(session.controller()) {
                println!("{line}");
            }
        }
        "unknown" => println!(
            "Unknown command: /{}. Type /help for commands.",
            intent.arg_str("command").unwrap_or_default()
        ),
        other => println!("Unsupported action: {other}"),
    }
    Ok(Flow::Continue)
}

fn start_generation(
    session: &mut Session,
    job: Result<GenerationJob, ControllerError>,
) -> Result<()> {
    match job {
        Ok(job) => {
            println!("Generating {}...", job.label());
            session.dispatch(job)?;
        }
        Err(err) => println!("{err}"),
    }
    Ok(())
}

fn print_styles(catalog: &StyleCatalog) {
    for style in catalog.list() {
        println!("{:<14} {}", style.id, style.name);
        println!("    {}", style.description);
    }
    let quick = QuickTransform::ALL
        .iter()
        .map(|transform| transform.name())
        .collect::<Vec<_>>();
    println!("Quick transforms: {}", quick.join(", "));
}

fn gallery_line(image: &StoredImage) -> String {
    match image.decode() {
        Ok(decoded) => format!("{:>14}  {}", image.id, decoded.mime_type),
        Err(err) => format!("{:>14}  unreadable ({err})", image.id),
    }
}

fn print_gallery(items: &[StoredImage]) {
    if items.is_empty() {
        println!("Gallery is empty.");
        return;
    }
    for image in items {
        println!("{}", gallery_line(image));
    }
}

fn print_outcome(controller: &Controller) {
    if let Some(message) = controller.error() {
        println!("{message}");
        return;
    }
    match controller.result_preview() {
        Some(path) => println!("Result ready: {}", path.display()),
        None => println!("Result ready."),
    }
}

fn status_lines(controller: &Controller) -> Vec<String> {
    let mut lines = vec![format!("Phase: {}", controller.phase().as_str())];
    if let Some(source) = controller.source() {
        lines.push(with_preview(
            format!("Source: {} ({})", source.name, source.mime_type),
            controller.source_preview(),
        ));
    }
    if let Some(label) = controller.in_flight_label() {
        lines.push(format!("Generating: {label}"));
    }
    if let Some(result) = controller.result() {
        let saved = if controller.is_result_saved() { "saved" } else { "not saved" };
        lines.push(with_preview(
            format!("Result: {} ({saved})", result.mime_type),
            controller.result_preview(),
        ));
    }
    lines.push(format!("Gallery: {} images", controller.gallery_items().len()));
    if let Some(message) = controller.error() {
        lines.push(format!("Error: {message}"));
    }
    lines
}

fn with_preview(line: String, preview: Option<&Path>) -> String {
    match preview {
        Some(path) => format!("{line} at {}", path.display()),
        None => line,
    }
}
