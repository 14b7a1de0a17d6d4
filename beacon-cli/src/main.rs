//! Beaconcast command-line application
//!
//! Manages a persisted list of proximity beacons and broadcasts the enabled
//! ones through the simulated radio, rotating them over the available
//! advertising slots.

mod settings;

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use beacon_mux::{
    run_broadcast_actor, Beacon, BeaconId, BeaconRegistry, BeaconStore, BroadcastCommand,
    BroadcastController, BroadcastEvent, JsonFileStore, PowerState,
};
use beacon_protocol::{
    AdvertisementPayload, BeaconIdentity, DEFAULT_MAJOR, DEFAULT_MEASURED_POWER, DEFAULT_MINOR,
};
use beacon_sim::{
    create_virtual_radio_channel, run_virtual_radio_task, VirtualRadio, VirtualRadioCommand,
    VirtualRadioConfig, VirtualRadioState,
};
use clap::{Args, Parser, Subcommand};
use settings::Settings;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "beaconcast")]
#[command(about = "Broadcast many proximity beacons over a few advertising slots", long_about = None)]
#[command(version)]
struct Cli {
    /// Beacon list file (overrides settings)
    #[arg(long, global = true)]
    beacons: Option<PathBuf>,

    /// Concurrent advertising slots (overrides settings)
    #[arg(long, global = true)]
    slots: Option<usize>,

    /// Maximum enabled beacons (overrides settings)
    #[arg(long, global = true)]
    max_enabled: Option<usize>,

    /// Rotation interval in milliseconds (overrides settings)
    #[arg(long, global = true)]
    interval_ms: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List beacons, favorites first
    List,
    /// Add a beacon
    Add(IdentityArgs),
    /// Edit a beacon's name or identity
    Edit {
        /// Beacon id or unique id prefix
        id: String,
        #[command(flatten)]
        identity: IdentityArgs,
    },
    /// Remove a beacon
    Remove {
        /// Beacon id or unique id prefix
        id: String,
    },
    /// Toggle a beacon's favorite flag
    Favorite {
        /// Beacon id or unique id prefix
        id: String,
    },
    /// Print the advertisement record for an identity
    Encode {
        /// Proximity UUID
        #[arg(long)]
        uuid: String,
        #[arg(long, default_value_t = DEFAULT_MAJOR)]
        major: u16,
        #[arg(long, default_value_t = DEFAULT_MINOR)]
        minor: u16,
        #[arg(long, default_value_t = DEFAULT_MEASURED_POWER, allow_negative_numbers = true)]
        power: i8,
    },
    /// Broadcast beacons through the simulated radio
    Run(RunArgs),
    /// Show effective settings
    Config {
        /// Write the effective settings back to disk
        #[arg(long)]
        save: bool,
    },
}

#[derive(Args)]
struct IdentityArgs {
    /// Display name
    #[arg(long)]
    name: Option<String>,
    /// Proximity UUID (generated when adding without one)
    #[arg(long)]
    uuid: Option<String>,
    #[arg(long)]
    major: Option<u16>,
    #[arg(long)]
    minor: Option<u16>,
    /// Measured power at 1m (dBm)
    #[arg(long, allow_negative_numbers = true)]
    power: Option<i8>,
}

#[derive(Args)]
struct RunArgs {
    /// Beacons to enable (id or unique id prefix)
    #[arg(long = "enable", value_name = "ID")]
    enable: Vec<String>,
    /// Enable every beacon, up to the admission limit
    #[arg(long, conflicts_with = "enable")]
    all: bool,
    /// Stop after this many seconds instead of waiting for Ctrl-C
    #[arg(long)]
    duration_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "beaconcast=info,beacon_protocol=info,beacon_mux=info,beacon_sim=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let settings = effective_settings(Settings::load(), &cli);

    match cli.command {
        Commands::List => cmd_list(&settings),
        Commands::Add(args) => cmd_add(&settings, args),
        Commands::Edit { id, identity } => cmd_edit(&settings, &id, identity),
        Commands::Remove { id } => cmd_remove(&settings, &id),
        Commands::Favorite { id } => cmd_favorite(&settings, &id),
        Commands::Encode {
            uuid,
            major,
            minor,
            power,
        } => cmd_encode(&uuid, major, minor, power),
        Commands::Run(args) => cmd_run(&settings, args).await,
        Commands::Config { save } => cmd_config(&settings, save),
    }
}

/// Apply command-line overrides on top of saved settings
fn effective_settings(mut settings: Settings, cli: &Cli) -> Settings {
    if let Some(path) = &cli.beacons {
        settings.beacons_file = Some(path.clone());
    }
    if let Some(slots) = cli.slots {
        settings.broadcast.max_concurrent = slots;
    }
    if let Some(max_enabled) = cli.max_enabled {
        settings.broadcast.max_enabled = max_enabled;
    }
    if let Some(interval_ms) = cli.interval_ms {
        settings.broadcast.tick_interval_ms = interval_ms;
    }
    settings
}

// ============================================================================
// Beacon list commands
// ============================================================================

fn open_registry(settings: &Settings) -> Result<(BeaconRegistry, JsonFileStore)> {
    let store = JsonFileStore::new(settings.beacons_path()?);
    let beacons = store
        .load()
        .with_context(|| format!("Failed to load {}", store.path().display()))?;

    let mut registry = BeaconRegistry::new(settings.broadcast.max_enabled);
    registry.load(beacons);
    Ok((registry, store))
}

fn save_registry(registry: &BeaconRegistry, store: &mut JsonFileStore) -> Result<()> {
    store
        .save(registry.beacons())
        .with_context(|| format!("Failed to save {}", store.path().display()))
}

/// Find a beacon by full id or unique prefix
fn resolve_id(beacons: &[Beacon], query: &str) -> Result<BeaconId> {
    let needle = query.trim().to_ascii_lowercase();
    if needle.is_empty() {
        bail!("Empty beacon id");
    }

    let matches: Vec<BeaconId> = beacons
        .iter()
        .filter(|b| {
            b.id.to_string().starts_with(&needle)
                || b.id.as_uuid().simple().to_string().starts_with(&needle)
        })
        .map(|b| b.id)
        .collect();

    match matches.as_slice() {
        [id] => Ok(*id),
        [] => bail!("No beacon matches '{}'", query),
        _ => bail!(
            "'{}' matches {} beacons; use more characters",
            query,
            matches.len()
        ),
    }
}

fn format_beacon(beacon: &Beacon) -> String {
    format!(
        "{} {}  {:<20} {}  major={} minor={} power={}",
        if beacon.favorite { '*' } else { ' ' },
        beacon.id.short(),
        beacon.display_name(),
        beacon.identity.uuid_string(),
        beacon.identity.major,
        beacon.identity.minor,
        beacon.identity.measured_power
    )
}

fn cmd_list(settings: &Settings) -> Result<()> {
    let (registry, _) = open_registry(settings)?;
    if registry.is_empty() {
        println!("No beacons. Add one with `beaconcast add --name <NAME>`.");
        return Ok(());
    }

    for beacon in registry.display_order() {
        println!("{}", format_beacon(beacon));
    }
    Ok(())
}

fn cmd_add(settings: &Settings, args: IdentityArgs) -> Result<()> {
    let (mut registry, mut store) = open_registry(settings)?;
    let name = args.name.unwrap_or_default();

    let id = registry.add_parsed(name, args.uuid.as_deref(), args.major, args.minor, args.power)?;
    save_registry(&registry, &mut store)?;

    if let Some(beacon) = registry.get(id) {
        println!("Added {}", format_beacon(beacon));
    }
    Ok(())
}

fn cmd_edit(settings: &Settings, query: &str, args: IdentityArgs) -> Result<()> {
    let (mut registry, mut store) = open_registry(settings)?;
    let id = resolve_id(registry.beacons(), query)?;
    let current = registry
        .get(id)
        .cloned()
        .with_context(|| format!("Beacon {} disappeared", id))?;

    let major = args.major.unwrap_or(current.identity.major);
    let minor = args.minor.unwrap_or(current.identity.minor);
    let power = args.power.unwrap_or(current.identity.measured_power);
    let identity = match args.uuid.as_deref() {
        Some(uuid) => BeaconIdentity::parse(uuid, major, minor, power)?,
        None => BeaconIdentity::new(current.identity.proximity_uuid, major, minor, power),
    };
    let name = args.name.unwrap_or(current.name);

    registry.update(id, name, identity)?;
    save_registry(&registry, &mut store)?;

    if let Some(beacon) = registry.get(id) {
        println!("Updated {}", format_beacon(beacon));
    }
    Ok(())
}

fn cmd_remove(settings: &Settings, query: &str) -> Result<()> {
    let (mut registry, mut store) = open_registry(settings)?;
    let id = resolve_id(registry.beacons(), query)?;

    let removed = registry
        .remove(id)
        .with_context(|| format!("Beacon {} disappeared", id))?;
    save_registry(&registry, &mut store)?;

    println!("Removed {}", format_beacon(&removed));
    Ok(())
}

fn cmd_favorite(settings: &Settings, query: &str) -> Result<()> {
    let (mut registry, mut store) = open_registry(settings)?;
    let id = resolve_id(registry.beacons(), query)?;

    let favorite = registry.toggle_favorite(id)?;
    save_registry(&registry, &mut store)?;

    println!(
        "{} {}",
        id.short(),
        if favorite { "is now a favorite" } else { "is no longer a favorite" }
    );
    Ok(())
}

fn cmd_encode(uuid: &str, major: u16, minor: u16, power: i8) -> Result<()> {
    let identity = BeaconIdentity::parse(uuid, major, minor, power)?;
    let payload = AdvertisementPayload::for_identity(&identity);
    println!("{}", identity);
    println!("{} = {}", payload.key, payload.record);
    Ok(())
}

fn cmd_config(settings: &Settings, save: bool) -> Result<()> {
    match Settings::settings_path() {
        Some(path) => println!("Settings: {}", path.display()),
        None => println!("Settings: (no config directory)"),
    }
    println!("Beacons:  {}", settings.beacons_path()?.display());
    println!(
        "{}",
        serde_json::to_string_pretty(settings).context("Failed to serialize settings")?
    );

    if save {
        let path = settings.save()?;
        println!("Saved {}", path.display());
    }
    Ok(())
}

// ============================================================================
// Broadcasting
// ============================================================================

/// Human-readable line for an event, if it is worth showing
fn describe_event(event: &BroadcastEvent, names: &HashMap<BeaconId, String>) -> Option<String> {
    let name = |id: &BeaconId| names.get(id).cloned().unwrap_or_else(|| id.short());

    match event {
        BroadcastEvent::EnabledChanged { id, enabled } => Some(format!(
            "{} {}",
            name(id),
            if *enabled { "enabled" } else { "disabled" }
        )),
        BroadcastEvent::AdmissionRejected { id, limit } => Some(format!(
            "Cannot enable {}: at most {} beacons can broadcast at once",
            name(id),
            limit
        )),
        BroadcastEvent::OnAirChanged { on_air } if on_air.is_empty() => {
            Some("On air: (nothing)".to_string())
        }
        BroadcastEvent::OnAirChanged { on_air } => Some(format!(
            "On air: {}",
            on_air.iter().map(name).collect::<Vec<_>>().join(", ")
        )),
        BroadcastEvent::PhaseChanged { from, to } => {
            Some(format!("Rotation {} -> {}", from.name(), to.name()))
        }
        BroadcastEvent::Status { message } => Some(message.clone()),
        BroadcastEvent::Error { source, message } => Some(format!("{} error: {}", source, message)),
        _ => None,
    }
}

/// Print events until the actor closes its event stream
async fn print_events(
    mut event_rx: mpsc::Receiver<BroadcastEvent>,
    mut state_rx: broadcast::Receiver<VirtualRadioState>,
    names: HashMap<BeaconId, String>,
) {
    let mut radio_open = true;

    loop {
        tokio::select! {
            event = event_rx.recv() => {
                let Some(event) = event else { break; };
                if let Some(line) = describe_event(&event, &names) {
                    println!("{}", line);
                }
            }

            state = state_rx.recv(), if radio_open => {
                match state {
                    Ok(state) => debug!(
                        "Radio {}: advertising {:?}",
                        state.power,
                        state.advertising.iter().map(|i| i.to_string()).collect::<Vec<_>>()
                    ),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        debug!("Missed {} radio state updates", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => radio_open = false,
                }
            }
        }
    }
}

async fn request<T>(
    cmd_tx: &mpsc::Sender<BroadcastCommand>,
    build: impl FnOnce(oneshot::Sender<T>) -> BroadcastCommand,
) -> Result<T> {
    let (tx, rx) = oneshot::channel();
    cmd_tx
        .send(build(tx))
        .await
        .context("Broadcast actor stopped")?;
    rx.await.context("Broadcast actor stopped")
}

async fn cmd_run(settings: &Settings, args: RunArgs) -> Result<()> {
    let config = settings.broadcast.clone();
    let store = JsonFileStore::new(settings.beacons_path()?);

    let (adapter, io) = create_virtual_radio_channel(PowerState::On);
    let (cmd_tx, cmd_rx) = mpsc::channel(64);
    let (event_tx, event_rx) = mpsc::channel(256);
    let (radio_tx, radio_rx) = mpsc::channel(16);
    let (state_tx, state_rx) = broadcast::channel(64);

    let radio = VirtualRadio::from_config(VirtualRadioConfig {
        id: "sim-radio".to_string(),
        initial_power: PowerState::On,
        max_payloads: config.max_concurrent,
    });
    let radio_task = tokio::spawn(run_virtual_radio_task(
        radio,
        io,
        radio_rx,
        cmd_tx.clone(),
        state_tx,
    ));

    info!(
        "Broadcasting with {} slots, up to {} enabled, rotating every {}ms",
        config.max_concurrent, config.max_enabled, config.tick_interval_ms
    );
    let controller = BroadcastController::with_config(config, adapter);
    let actor = tokio::spawn(run_broadcast_actor(controller, store, cmd_rx, event_tx));

    let beacons = request(&cmd_tx, |response| BroadcastCommand::ListBeacons { response }).await?;
    let names: HashMap<BeaconId, String> = beacons
        .iter()
        .map(|b| (b.id, b.display_name().to_string()))
        .collect();
    let printer = tokio::spawn(print_events(event_rx, state_rx, names));

    let targets: Vec<BeaconId> = if args.all {
        beacons.iter().map(|b| b.id).collect()
    } else {
        args.enable
            .iter()
            .map(|query| resolve_id(&beacons, query))
            .collect::<Result<_>>()?
    };
    if targets.is_empty() {
        println!("Nothing to broadcast; pass --enable <ID> or --all");
    }

    for id in targets {
        let result = request(&cmd_tx, |response| BroadcastCommand::SetEnabled {
            id,
            enabled: true,
            response,
        })
        .await?;
        if let Err(e) = result {
            debug!("Not enabling {}: {}", id.short(), e);
        }
    }

    match args.duration_secs {
        Some(secs) => {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(secs)) => {}
                result = tokio::signal::ctrl_c() => result.context("Failed to listen for Ctrl-C")?,
            }
        }
        None => tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl-C")?,
    }

    info!("Stopping broadcast");
    let _ = cmd_tx.send(BroadcastCommand::Shutdown).await;
    let _ = actor.await;
    let _ = radio_tx.send(VirtualRadioCommand::Shutdown).await;
    let _ = radio_task.await;
    drop(cmd_tx);
    let _ = printer.await;

    Ok(())
}
