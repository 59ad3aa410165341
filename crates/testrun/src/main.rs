use std::env;
use std::fs;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context as _};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use directories::BaseDirs;
use testrun::store::{
    selectors, AppState, Intent, Resource, Store, StoreHandle, StoreSettings, TokioTimer,
};
use testrun::HttpTestrunClient;
use testrun_core::config::ConfigFile;
use testrun_core::paths::{compute_paths, PathInputs, TrsPaths};
use testrun_protocol::{Device, TestModule};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "trs", version, about = "Testrun client: watch and drive compliance test runs")]
struct Cli {
    /// Base URL of the Testrun API
    #[arg(long, global = true, value_name = "URL", env = "TRS_API_URL")]
    api_url: Option<String>,

    #[arg(long, global = true, value_name = "PATH", env = "TRS_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, global = true, value_name = "DIR", env = "TRS_DIR")]
    trs_dir: Option<PathBuf>,

    #[arg(long, global = true, env = "TRS_LOG", value_name = "LEVEL")]
    log_level: Option<String>,

    #[arg(long, global = true, value_name = "MS", env = "TRS_POLL_INTERVAL_MS")]
    poll_interval_ms: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the current testrun status
    Status,
    /// Follow the testrun status until it finishes
    Watch,
    /// Start a testrun against a registered device
    Start {
        #[arg(long, value_name = "MAC")]
        mac: String,
        #[arg(long, value_name = "VERSION")]
        firmware: Option<String>,
    },
    /// Stop the running testrun
    Stop,
    Devices,
    /// Add, edit or delete a registered device
    Device {
        #[command(subcommand)]
        command: DeviceCommand,
    },
    Profiles,
    /// Show host interfaces and the roles assigned to them
    Interfaces,
    /// Print the backend system configuration
    Config,
    Version {
        /// Also query the backend version
        #[arg(long)]
        remote: bool,
    },
    Completion {
        #[command(subcommand)]
        command: CompletionCommand,
    },
}

#[derive(Subcommand, Debug)]
enum DeviceCommand {
    /// Register a new device
    Add {
        #[arg(long, value_name = "MAC")]
        mac: String,
        #[arg(long)]
        manufacturer: String,
        #[arg(long)]
        model: String,
        /// Test module to enable; repeatable
        #[arg(long = "module", value_name = "NAME")]
        modules: Vec<String>,
    },
    /// Change a registered device
    Edit {
        #[arg(long, value_name = "MAC")]
        mac: String,
        #[arg(long, value_name = "MAC")]
        new_mac: Option<String>,
        #[arg(long)]
        manufacturer: Option<String>,
        #[arg(long)]
        model: Option<String>,
        #[arg(long, value_name = "NAME")]
        enable: Vec<String>,
        #[arg(long, value_name = "NAME")]
        disable: Vec<String>,
    },
    /// Remove a registered device
    Delete {
        #[arg(long, value_name = "MAC")]
        mac: String,
    },
}

#[derive(Subcommand, Debug)]
enum CompletionCommand {
    Bash,
    Fish,
    Powershell,
    Zsh,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let paths = resolve_paths(cli.trs_dir.as_ref(), cli.config.as_ref())?;
    let config = ConfigFile::load(&paths.config_file)?
        .with_overrides(cli.api_url.as_deref(), cli.poll_interval_ms)?;

    let log_level = cli.log_level.as_deref().or(config.log_level.as_deref());
    init_logging(&paths, log_level)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        api_url = config.effective_api_url(),
        "trs starting"
    );

    match cli.command {
        Command::Version { remote: false } => version(),
        Command::Completion { command } => completion(command),
        command => dispatch(command, &config).await,
    }
}

fn resolve_paths(
    trs_dir_override: Option<&PathBuf>,
    config_file_override: Option<&PathBuf>,
) -> anyhow::Result<TrsPaths> {
    let base_dirs = BaseDirs::new().ok_or_else(|| anyhow!("could not determine home directory"))?;
    let home_dir = base_dirs.home_dir().to_path_buf();

    let xdg_config_home = match env::var_os("XDG_CONFIG_HOME") {
        Some(v) => Some(PathBuf::from(v)),
        None => Some(base_dirs.config_dir().to_path_buf()),
    };

    Ok(compute_paths(PathInputs {
        home_dir,
        xdg_config_home,
        trs_dir_override: trs_dir_override.cloned(),
        config_file_override: config_file_override.cloned(),
    }))
}

fn init_logging(paths: &TrsPaths, log_level: Option<&str>) -> anyhow::Result<()> {
    let level = log_level
        .map(str::to_owned)
        .or_else(|| env::var("TRS_LOG").ok())
        .or_else(|| env::var("RUST_LOG").ok())
        .unwrap_or_else(|| "info".to_owned());
    let file_filter =
        EnvFilter::try_new(&level).with_context(|| format!("parse log level {level:?}"))?;

    let file = log_file(&paths.log_dir).map(|writer| {
        fmt::layer()
            .with_ansi(false)
            .with_writer(writer)
            .with_filter(file_filter)
    });

    // stdout carries command output; the terminal only gets warnings
    let terminal = fmt::layer()
        .with_target(false)
        .with_writer(io::stderr)
        .with_filter(LevelFilter::WARN);

    tracing_subscriber::registry()
        .with(file)
        .with(terminal)
        .try_init()
        .context("install tracing subscriber")
}

/// Daily `trs.<date>.log` files under `dir`, or `None` when the directory
/// cannot be used.
fn log_file(dir: &Path) -> Option<RollingFileAppender> {
    fs::create_dir_all(dir).ok()?;
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("trs")
        .filename_suffix("log")
        .max_log_files(7)
        .build(dir)
        .ok()
}

async fn dispatch(command: Command, config: &ConfigFile) -> anyhow::Result<()> {
    let polling = config.effective_polling();
    let client = HttpTestrunClient::new(
        config.effective_api_url(),
        Duration::from_millis(polling.effective_request_timeout_ms()),
    )?;
    let settings = StoreSettings {
        poll_interval: Duration::from_millis(polling.effective_interval_ms()),
    };
    let (store, task) = Store::spawn(Arc::new(client), Arc::new(TokioTimer), settings);

    let result = match command {
        Command::Status => status(&store).await,
        Command::Watch => watch(&store).await,
        Command::Start { mac, firmware } => start(&store, &mac, firmware).await,
        Command::Stop => stop(&store).await,
        Command::Devices => devices(&store).await,
        Command::Device { command } => device(&store, command).await,
        Command::Profiles => profiles(&store).await,
        Command::Interfaces => interfaces(&store).await,
        Command::Config => system_config(&store).await,
        Command::Version { .. } => remote_version(&store).await,
        Command::Completion { .. } => Ok(()),
    };

    store.shutdown();
    task.await.context("join store task")?;
    result
}

/// Runs one fetch intent to completion and fails with the recorded error.
async fn fetch(store: &StoreHandle, intent: Intent, resource: Resource) -> anyhow::Result<AppState> {
    let state = store
        .dispatch_and_wait([intent], |s| !selectors::is_loading(s, resource))
        .await?;
    if let Some(failure) = selectors::error_for(&state, resource) {
        bail!("fetch {resource}: {failure}");
    }
    Ok(state)
}

async fn fetch_status_once(store: &StoreHandle) -> anyhow::Result<AppState> {
    let state = store
        .dispatch_and_wait([Intent::FetchSystemStatus], |s| {
            s.poll.cycles_started() > 0 && !selectors::is_status_fetch_in_flight(s)
        })
        .await?;
    if !state.poll.is_idle() {
        store.dispatch(Intent::StopInterval)?;
    }
    if let Some(failure) = selectors::error_for(&state, Resource::SystemStatus) {
        bail!("fetch system status: {failure}");
    }
    Ok(state)
}

async fn status(store: &StoreHandle) -> anyhow::Result<()> {
    let state = fetch_status_once(store).await?;
    print_status(&state);
    Ok(())
}

async fn watch(store: &StoreHandle) -> anyhow::Result<()> {
    let mut rx = store.subscribe();
    drop(rx.borrow_and_update());
    store.dispatch(Intent::FetchSystemStatus)?;

    let mut last = None;
    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = rx.borrow_and_update().clone();
                if state.poll.cycles_started() == 0 {
                    continue;
                }
                let current = selectors::testrun_status(&state).clone();
                if last.as_ref() != Some(&current) {
                    print_status(&state);
                    last = Some(current);
                }
                if state.poll.is_idle() {
                    if let Some(failure) = selectors::error_for(&state, Resource::SystemStatus) {
                        bail!("fetch system status: {failure}");
                    }
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted; stopping status polling");
                store.dispatch(Intent::StopInterval)?;
                break;
            }
        }
    }
    Ok(())
}

async fn start(store: &StoreHandle, mac: &str, firmware: Option<String>) -> anyhow::Result<()> {
    fetch(store, Intent::FetchInterfaces, Resource::Interfaces).await?;
    fetch(store, Intent::FetchSystemConfig, Resource::SystemConfig).await?;
    let state = fetch(store, Intent::FetchDevices, Resource::Devices).await?;
    fetch_status_once(store).await?;

    let mut device = selectors::devices(&state)
        .iter()
        .find(|d| d.mac_addr.eq_ignore_ascii_case(mac))
        .cloned()
        .ok_or_else(|| anyhow!("no device with mac address {mac}"))?;
    if firmware.is_some() {
        device.firmware = firmware;
    }

    if let Some(blocker) = store.select(selectors::start_blocker) {
        bail!("cannot start testrun: {blocker}");
    }

    let state = fetch(
        store,
        Intent::StartTestrun {
            device: device.clone(),
        },
        Resource::StartTestrun,
    )
    .await?;
    store.dispatch(Intent::StopInterval)?;

    println!("started testrun for {}", device.display_name());
    print_status(&state);
    Ok(())
}

async fn stop(store: &StoreHandle) -> anyhow::Result<()> {
    let state = store
        .dispatch_and_wait([Intent::StopTestrun], |s| {
            selectors::error_for(s, Resource::StopTestrun).is_some()
                || (!selectors::is_loading(s, Resource::StopTestrun)
                    && s.poll.cycles_started() > 0
                    && !selectors::is_status_fetch_in_flight(s))
        })
        .await?;
    if let Some(failure) = selectors::error_for(&state, Resource::StopTestrun) {
        bail!("stop testrun: {failure}");
    }
    store.dispatch(Intent::StopInterval)?;

    println!("testrun stopped");
    print_status(&state);
    Ok(())
}

async fn devices(store: &StoreHandle) -> anyhow::Result<()> {
    let state = fetch(store, Intent::FetchDevices, Resource::Devices).await?;
    if !selectors::has_devices(&state) {
        println!("No devices");
        return Ok(());
    }
    for device in selectors::devices(&state) {
        let modules: Vec<&str> = device.enabled_modules().collect();
        println!(
            "{}\t{}\t{}\t{}",
            device.mac_addr,
            device.display_name(),
            device.firmware.as_deref().unwrap_or("-"),
            modules.join(",")
        );
    }
    Ok(())
}

async fn profiles(store: &StoreHandle) -> anyhow::Result<()> {
    let state = fetch(store, Intent::FetchRiskProfiles, Resource::RiskProfiles).await?;
    if !selectors::has_risk_profiles(&state) {
        println!("No risk profiles");
        return Ok(());
    }
    for profile in selectors::risk_profiles(&state) {
        println!(
            "{}\t{:?}\t{}",
            profile.name,
            profile.status,
            profile.risk.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

async fn interfaces(store: &StoreHandle) -> anyhow::Result<()> {
    // roles come from the system config; a missing config leaves them unassigned
    let state = store
        .dispatch_and_wait([Intent::FetchSystemConfig, Intent::FetchInterfaces], |s| {
            !selectors::is_loading(s, Resource::SystemConfig)
                && !selectors::is_loading(s, Resource::Interfaces)
        })
        .await?;
    if let Some(failure) = selectors::error_for(&state, Resource::Interfaces) {
        bail!("fetch interfaces: {failure}");
    }

    if let Some(host) = selectors::host_interfaces(&state) {
        for (name, address) in &host.0 {
            println!("{name}\t{address}");
        }
    }

    let roles = selectors::interfaces(&state);
    let validation = selectors::interfaces_validation(&state);
    for (role, name, valid) in [
        ("internet", roles.internet.as_deref(), validation.internet),
        ("device", roles.device.as_deref(), validation.device),
    ] {
        println!(
            "{role}\t{}\t{}",
            name.unwrap_or("-"),
            if valid { "ok" } else { "invalid" }
        );
    }
    Ok(())
}

async fn device(store: &StoreHandle, command: DeviceCommand) -> anyhow::Result<()> {
    match command {
        DeviceCommand::Add {
            mac,
            manufacturer,
            model,
            modules,
        } => {
            let device = Device {
                mac_addr: mac,
                manufacturer,
                model,
                firmware: None,
                test_modules: modules
                    .into_iter()
                    .map(|name| (name, TestModule { enabled: true }))
                    .collect(),
            };
            fetch(
                store,
                Intent::CreateDevice {
                    device: device.clone(),
                },
                Resource::CreateDevice,
            )
            .await?;
            println!("added {}", device.display_name());
        }
        DeviceCommand::Edit {
            mac,
            new_mac,
            manufacturer,
            model,
            enable,
            disable,
        } => {
            let stored = registered(store, &mac).await?;
            let mut device = stored.clone();
            if let Some(new_mac) = new_mac {
                device.mac_addr = new_mac;
            }
            if let Some(manufacturer) = manufacturer {
                device.manufacturer = manufacturer;
            }
            if let Some(model) = model {
                device.model = model;
            }
            for (names, enabled) in [(enable, true), (disable, false)] {
                for name in names {
                    device.test_modules.insert(name, TestModule { enabled });
                }
            }
            fetch(
                store,
                Intent::EditDevice {
                    mac_addr: stored.mac_addr,
                    device: device.clone(),
                },
                Resource::EditDevice,
            )
            .await?;
            println!("updated {}", device.display_name());
        }
        DeviceCommand::Delete { mac } => {
            let device = registered(store, &mac).await?;
            fetch(
                store,
                Intent::DeleteDevice {
                    device: device.clone(),
                },
                Resource::DeleteDevice,
            )
            .await?;
            println!("deleted {}", device.display_name());
        }
    }
    Ok(())
}

async fn registered(store: &StoreHandle, mac: &str) -> anyhow::Result<Device> {
    let state = fetch(store, Intent::FetchDevices, Resource::Devices).await?;
    selectors::devices(&state)
        .iter()
        .find(|d| d.mac_addr.eq_ignore_ascii_case(mac))
        .cloned()
        .ok_or_else(|| anyhow!("no device with mac address {mac}"))
}

async fn system_config(store: &StoreHandle) -> anyhow::Result<()> {
    let state = fetch(store, Intent::FetchSystemConfig, Resource::SystemConfig).await?;
    if let Some(config) = &state.system_config {
        let json = serde_json::to_string_pretty(config).context("encode system config")?;
        println!("{json}");
    }
    if selectors::setting_missed_error(&state).is_some() {
        eprintln!("warning: connection settings are missing");
    }
    Ok(())
}

async fn remote_version(store: &StoreHandle) -> anyhow::Result<()> {
    version()?;
    let state = fetch(store, Intent::FetchSystemVersion, Resource::SystemVersion).await?;
    if let Some(remote) = selectors::system_version(&state) {
        println!(
            "backend {}",
            remote.installed_version.as_deref().unwrap_or("unknown")
        );
        if remote.update_available {
            println!(
                "update available: {}",
                remote.latest_version.as_deref().unwrap_or("unknown")
            );
        }
    }
    Ok(())
}

fn print_status(state: &AppState) {
    let status = selectors::testrun_status(state);
    let device = status
        .device
        .as_ref()
        .map(|d| d.display_name())
        .unwrap_or_else(|| "-".to_owned());
    let summary = selectors::results_summary(state);

    let mut line = format!(
        "{}\t{}\t{}/{} tests",
        status.status, device, summary.completed, summary.total
    );
    if summary.completed > 0 {
        line.push_str(&format!(
            " ({} compliant, {} non-compliant)",
            summary.compliant, summary.non_compliant
        ));
    }
    if let Some(elapsed) = selectors::testrun_duration(state) {
        line.push_str(&format!("\t{}s", elapsed.as_secs()));
    }
    println!("{line}");
}

fn version() -> anyhow::Result<()> {
    println!("{}", env!("CARGO_PKG_VERSION"));
    Ok(())
}

fn completion(command: CompletionCommand) -> anyhow::Result<()> {
    let shell = match command {
        CompletionCommand::Bash => Shell::Bash,
        CompletionCommand::Fish => Shell::Fish,
        CompletionCommand::Powershell => Shell::PowerShell,
        CompletionCommand::Zsh => Shell::Zsh,
    };

    let mut cmd = Cli::command();
    let mut buf = Vec::new();
    generate(shell, &mut cmd, "trs", &mut buf);
    match io::stdout().write_all(&buf) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        Err(err) => Err(err).context("write completion script to stdout"),
    }
}
