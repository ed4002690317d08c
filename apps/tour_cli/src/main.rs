use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use scan_core::{
    config::load_settings_from,
    overlay::{self, barrier_chips, rating_badge, score_label, summarize_barriers},
    tour::{lock_tour, TourController},
    CandidateFile, GuideService, HttpScanApi, KeyboardHub, OrchestratorError, OrchestratorEvent,
    OrchestratorSettings, OrchestratorState, ScanOrchestrator, ScanService, ScanServices, TourKey,
    TourView,
};
use shared::{
    domain::{ImageId, ProfileId, ScanId, ScanStatus, WheelchairType},
    protocol::{
        BarrierFilter, ScanCreate, ScanListQuery, WheelchairProfile, WheelchairProfileCreate,
    },
};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "tour", about = "Wheelchair accessibility scans from the terminal")]
struct Args {
    #[arg(long, default_value = "tour.toml")]
    config: PathBuf,
    #[arg(long)]
    server_url: Option<String>,
    /// Wheelchair profile used for analysis and guides.
    #[arg(long)]
    profile: Option<ProfileId>,
    #[arg(long)]
    poll_ms: Option<u64>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a scan from image files, analyze it and walk the guide.
    New {
        #[arg(long)]
        name: String,
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },
    /// Resume a scan wherever it left off.
    Open { scan_id: ScanId },
    List {
        #[arg(long)]
        status: Option<ScanStatus>,
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// Barrier counts for a scan with a guide.
    Summary { scan_id: ScanId },
    /// Spatial graph of an analyzed scan.
    World { scan_id: ScanId },
    /// Barriers detected in a scan, or in one of its images.
    Barriers {
        scan_id: ScanId,
        #[arg(long)]
        image: Option<ImageId>,
    },
    #[command(subcommand)]
    Profiles(ProfileCommand),
    Delete { scan_id: ScanId },
}

#[derive(Subcommand, Debug)]
enum ProfileCommand {
    List,
    Show {
        profile_id: ProfileId,
    },
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        width_cm: f64,
        #[arg(long)]
        length_cm: f64,
        #[arg(long)]
        door_cm: f64,
        #[arg(long)]
        step_cm: Option<f64>,
        #[arg(long)]
        slope: Option<f64>,
        #[arg(long = "type")]
        wheelchair_type: Option<WheelchairType>,
        #[arg(long)]
        gravel: bool,
        #[arg(long)]
        grass: bool,
    },
    Delete {
        profile_id: ProfileId,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    let args = Args::parse();

    let mut settings = load_settings_from(&args.config);
    if let Some(url) = args.server_url {
        settings.server_url = url;
    }
    if let Some(profile) = args.profile {
        settings.wheelchair_profile_id = Some(profile);
    }
    if let Some(ms) = args.poll_ms {
        settings.poll_interval_ms = ms;
    }
    info!(server_url = %settings.server_url, "using scan service");

    let api = Arc::new(HttpScanApi::new(&settings.api_base_url(), settings.request_timeout())?);
    let services = ScanServices::from_backend(Arc::clone(&api));
    let orchestrator_settings = OrchestratorSettings::from(&settings);

    match args.command {
        Command::New {
            name,
            location,
            description,
            images,
        } => {
            let create = ScanCreate {
                name,
                description,
                location,
            };
            let mut orchestrator =
                ScanOrchestrator::create(create, services, orchestrator_settings).await?;
            println!("Created scan {}", orchestrator.scan_id());
            let files = read_candidates(&images).await?;
            match orchestrator.ingest_images(files).await {
                Ok(uploaded) => println!("Uploaded {} image(s)", uploaded.len()),
                Err(OrchestratorError::Validation(failure)) => {
                    println!("Uploaded {} image(s), skipped:", failure.committed);
                    for message in failure.messages() {
                        println!("  {message}");
                    }
                }
                Err(err) => return Err(err.into()),
            }
            drive(&mut orchestrator).await
        }
        Command::Open { scan_id } => {
            let mut orchestrator =
                ScanOrchestrator::open(scan_id, services, orchestrator_settings).await?;
            drive(&mut orchestrator).await
        }
        Command::List { status, limit } => {
            let page = api
                .list_scans(ScanListQuery {
                    status,
                    limit: Some(limit),
                    offset: None,
                })
                .await?;
            for scan in &page.items {
                println!(
                    "{}  {:<10}  {:>3} image(s)  {}",
                    scan.id,
                    scan.status.as_str(),
                    scan.image_count,
                    scan.name
                );
            }
            println!("{} of {} scan(s)", page.items.len(), page.total);
            Ok(())
        }
        Command::Summary { scan_id } => {
            let orchestrator =
                ScanOrchestrator::open(scan_id, services, orchestrator_settings).await?;
            let Some(guide) = orchestrator.guide() else {
                println!("No guide yet; scan is {}", orchestrator.state().as_str());
                return Ok(());
            };
            let tally = summarize_barriers(
                guide
                    .navigation_steps
                    .iter()
                    .flat_map(|step| step.barriers.iter()),
            );
            println!(
                "{}: {} ({} barrier(s))",
                guide.title,
                score_label(guide.accessibility_score),
                tally.total
            );
            for (severity, count) in tally.severity_rows() {
                println!("  {:<9} {count}", overlay::severity_badge(severity).label);
            }
            for (barrier_type, count) in tally.type_rows() {
                println!("  {:<15} {count}", overlay::barrier_type_label(barrier_type));
            }
            Ok(())
        }
        Command::World { scan_id } => {
            let orchestrator =
                ScanOrchestrator::open(scan_id, services, orchestrator_settings).await?;
            let model = orchestrator.world_model().await?;
            for node in &model.nodes {
                println!(
                    "{:<8} {:<24} {:?}  {}",
                    node.id,
                    node.label,
                    node.space_type,
                    score_label(Some(node.accessibility_score))
                );
            }
            let path: Vec<&str> = model
                .recommended_nodes()
                .iter()
                .map(|node| node.label.as_str())
                .collect();
            if !path.is_empty() {
                println!("Recommended path: {}", path.join(" -> "));
            }
            for edge in model.blocked_edges() {
                println!(
                    "  blocked {} -> {}: {}",
                    edge.source,
                    edge.target,
                    edge.notes.as_deref().unwrap_or("not traversable")
                );
            }
            Ok(())
        }
        Command::Barriers { scan_id, image } => {
            let orchestrator =
                ScanOrchestrator::open(scan_id, services, orchestrator_settings).await?;
            let barriers = match image {
                Some(image_id) => orchestrator.image_barriers(image_id).await?,
                None => orchestrator.barriers(BarrierFilter::default()).await?,
            };
            for barrier in barriers {
                println!(
                    "{:<9} {:<15} {}",
                    overlay::severity_badge(barrier.severity).label,
                    overlay::barrier_type_label(barrier.barrier_type),
                    barrier.description
                );
                if let Some(tip) = &barrier.recommendation {
                    println!("          tip: {tip}");
                }
            }
            Ok(())
        }
        Command::Profiles(command) => run_profile_command(&api, command).await,
        Command::Delete { scan_id } => {
            let orchestrator =
                ScanOrchestrator::open(scan_id, services, orchestrator_settings).await?;
            orchestrator.delete().await?;
            println!("Deleted scan {scan_id}");
            Ok(())
        }
    }
}

async fn run_profile_command(api: &HttpScanApi, command: ProfileCommand) -> Result<()> {
    match command {
        ProfileCommand::List => {
            for profile in api.list_wheelchair_profiles().await? {
                print_profile(&profile);
            }
        }
        ProfileCommand::Show { profile_id } => {
            let profile = api.get_wheelchair_profile(profile_id).await?;
            print_profile(&profile);
            if let Some(description) = &profile.description {
                println!("  {description}");
            }
        }
        ProfileCommand::Create {
            name,
            description,
            width_cm,
            length_cm,
            door_cm,
            step_cm,
            slope,
            wheelchair_type,
            gravel,
            grass,
        } => {
            let mut request = WheelchairProfileCreate::new(name, width_cm, length_cm, door_cm);
            request.description = description;
            request.can_handle_gravel = gravel;
            request.can_handle_grass = grass;
            if let Some(step) = step_cm {
                request.max_step_height_cm = step;
            }
            if let Some(slope) = slope {
                request.max_slope_percent = slope;
            }
            if let Some(kind) = wheelchair_type {
                request.wheelchair_type = kind;
            }
            let profile = api.create_wheelchair_profile(request).await?;
            info!(profile_id = %profile.id, "created wheelchair profile");
            print_profile(&profile);
        }
        ProfileCommand::Delete { profile_id } => {
            api.delete_wheelchair_profile(profile_id).await?;
            println!("Deleted profile {profile_id}");
        }
    }
    Ok(())
}

fn print_profile(profile: &WheelchairProfile) {
    println!(
        "{}  {} ({}{})  door >= {}cm, step <= {}cm, slope <= {}%",
        profile.id,
        profile.name,
        profile.wheelchair_type.as_str(),
        if profile.is_default { ", default" } else { "" },
        profile.min_door_width_cm,
        profile.max_step_height_cm,
        profile.max_slope_percent
    );
}

async fn read_candidates(paths: &[PathBuf]) -> Result<Vec<CandidateFile>> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        files.push(CandidateFile::from_bytes(
            file_name(path),
            mime_guess::from_path(path)
                .first_raw()
                .unwrap_or("application/octet-stream"),
            bytes,
        ));
    }
    Ok(files)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Moves the scan forward from whatever state it is in until the tour ends.
async fn drive(orchestrator: &mut ScanOrchestrator) -> Result<()> {
    if orchestrator.state() == OrchestratorState::ReadyToAnalyze {
        let job = orchestrator.start_analysis().await?;
        println!("Analysis {} started", job.id);
    }

    loop {
        let outcome = tokio::select! {
            update = orchestrator.process_next_update() => Some(update),
            _ = tokio::signal::ctrl_c() => None,
        };
        match outcome {
            None => {
                orchestrator.abort();
                bail!("analysis interrupted");
            }
            Some(Err(err)) => return Err(err.into()),
            Some(Ok(false)) => break,
            Some(Ok(true)) => {
                if let Some(job) = orchestrator.job() {
                    println!(
                        "  {:?}: {} image(s) analyzed, {} barrier(s) found",
                        job.status, job.total_images_analyzed, job.total_barriers_found
                    );
                }
            }
        }
    }

    match orchestrator.state() {
        OrchestratorState::Touring => run_tour(orchestrator).await,
        OrchestratorState::Failed => bail!(
            "scan {} failed: {}",
            orchestrator.scan_id(),
            orchestrator.error().unwrap_or("unknown error")
        ),
        OrchestratorState::Uploading => bail!("scan {} has no images", orchestrator.scan_id()),
        other => bail!("scan {} stopped while {}", orchestrator.scan_id(), other.as_str()),
    }
}

async fn run_tour(orchestrator: &ScanOrchestrator) -> Result<()> {
    let Some(tour) = orchestrator.tour() else {
        bail!("no tour available");
    };
    let mut events = orchestrator.subscribe();
    let hub = KeyboardHub::new();
    let view = TourView::activate(Arc::clone(&tour), &hub);

    if let Some(guide) = orchestrator.guide() {
        println!("\n{}\n{}", guide.title, guide.summary);
        for alert in &guide.critical_alerts {
            println!("! {alert}");
        }
    }
    print_help();
    render(&lock_tour(&tour));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        let (command, arg) = input.split_once(' ').unwrap_or((input, ""));
        match command {
            "" | "n" => {
                hub.dispatch(TourKey::Space);
            }
            "p" => {
                hub.dispatch(TourKey::ArrowLeft);
            }
            "a" => lock_tour(&tour).toggle_alerts(),
            "g" => match arg.trim().parse::<usize>() {
                Ok(n) if n > 0 => {
                    lock_tour(&tour).go_to(n - 1);
                }
                _ => println!("usage: g <step>"),
            },
            "s" => select_barrier(&mut lock_tour(&tour), arg),
            "q" => break,
            _ => {
                print_help();
                continue;
            }
        }
        if tour_completed(&mut events) {
            println!("Tour complete.");
            break;
        }
        render(&lock_tour(&tour));
    }

    drop(view);
    Ok(())
}

/// `s N` toggles barrier N on the current step; a bare `s` clears it.
fn select_barrier(tour: &mut TourController, arg: &str) {
    if arg.trim().is_empty() {
        tour.clear_selection();
        return;
    }
    let picked = arg
        .trim()
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| tour.current_step().barriers.get(i))
        .map(|barrier| barrier.id);
    match picked {
        Some(id) => tour.select_barrier(id),
        None => warn!(arg, "no such barrier on this step"),
    }
}

fn tour_completed(events: &mut broadcast::Receiver<OrchestratorEvent>) -> bool {
    while let Ok(event) = events.try_recv() {
        if event == OrchestratorEvent::TourCompleted {
            return true;
        }
    }
    false
}

fn print_help() {
    println!("keys: [enter]/n next, p previous, g N jump, s [N] select barrier, a alerts, q quit");
}

fn render(tour: &TourController) {
    let step = tour.current_step();
    let dots: Vec<&str> = tour
        .steps()
        .iter()
        .enumerate()
        .map(|(i, s)| {
            if i == tour.current_index() {
                "@"
            } else {
                match overlay::rating_dot_color(s.accessibility_rating) {
                    overlay::ColorToken::Green => "o",
                    overlay::ColorToken::Yellow => "~",
                    overlay::ColorToken::Orange => "x",
                    _ => "X",
                }
            }
        })
        .collect();

    println!(
        "\n[{}] step {}/{} ({:.0}%)  {}",
        dots.concat(),
        tour.current_index() + 1,
        tour.total_steps(),
        tour.progress_percent(),
        rating_badge(step.accessibility_rating).label
    );
    println!("{}\n  {}", step.title, step.description);

    let selected = tour.selected_barrier();
    for (i, chip) in barrier_chips(step, selected).iter().enumerate() {
        let marker = if chip.selected { '>' } else { ' ' };
        println!("{marker} {}. {} ({})", i + 1, chip.label, chip.color.as_str());
    }
    if let Some(barrier) = step.barriers.iter().find(|b| Some(b.id) == selected) {
        println!("    {}", barrier.description);
        if let Some(tip) = &barrier.recommendation {
            println!("    tip: {tip}");
        }
    }
    for alert in tour.visible_alerts() {
        println!("  ! {alert}");
    }
    for recommendation in &step.recommendations {
        println!("  - {recommendation}");
    }
}
