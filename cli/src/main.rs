//! Command line front end for the AT document store, the scope compiler,
//! and the model-based test executor. Every subcommand prints one pretty
//! JSON document on stdout; diagnostics go to stderr via `tracing`.

use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use anyhow::Result;
use atforge_core::AdbTransport;
use atforge_core::DocumentStore;
use atforge_core::NullAgentRunner;
use atforge_core::SerialConfig;
use atforge_core::SerialTransport;
use atforge_core::Settings;
use atforge_core::compile_assets;
use atforge_core::debug_checks;
use atforge_core::executor;
use atforge_core::list_adb_devices;
use atforge_core::list_serial_ports;
use atforge_core::propose_config_change;
use atforge_protocol::TransportMode;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use serde_json::Value;
use serde_json::json;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "atforge",
    about = "Compile scoped AT command models and walk them against a modem",
    version
)]
struct Cli {
    /// Document store root. Overrides `storage.root` from settings.
    #[arg(long = "root", global = true, value_name = "DIR")]
    root: Option<PathBuf>,

    /// Settings file to read instead of `atforge.toml`.
    #[arg(long = "config", global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Seed any missing source documents and print the store layout.
    Init,

    /// Print a source document, the build artifacts, or the last compile report.
    Show {
        #[arg(value_enum)]
        target: ShowTarget,
    },

    /// Replace a source document with the JSON body of a file.
    Save {
        #[arg(value_enum)]
        doc: SourceDoc,

        /// File holding the new document body.
        #[arg(long = "file", value_name = "FILE")]
        file: PathBuf,

        /// Merge into an existing baseline spec instead of replacing it.
        #[arg(long = "locked-baseline")]
        locked_baseline: bool,
    },

    /// Compile the manifest scope into build artifacts and print the report.
    Compile {
        /// Ask the agent runner for an advisor note on the report.
        #[arg(long = "advise")]
        advise: bool,
    },

    /// Turn a change request into a validated manifest/extension proposal.
    Config {
        /// Request text, e.g. "disable sms and voice".
        request: String,

        /// Draft candidates with the agent runner instead of the no-op source.
        #[arg(long = "llm")]
        llm: bool,

        /// Persist the proposed manifest and extension.
        #[arg(long = "apply")]
        apply: bool,

        /// Recompile the build artifacts after applying.
        #[arg(long = "compile", requires = "apply")]
        compile: bool,
    },

    /// Walk the active EFSM against a device and print the run summary.
    Run {
        #[command(flatten)]
        transport: TransportArgs,

        /// Transition budget for the walk.
        #[arg(long = "max-steps", value_name = "N")]
        max_steps: Option<usize>,
    },

    /// Reset manifest and extension to their defaults and recompile.
    Reset,

    /// List candidate serial ports or adb devices.
    Devices {
        #[arg(value_enum)]
        kind: DeviceKind,
    },

    /// Probe transport health without walking the model.
    Debug {
        #[command(flatten)]
        transport: TransportArgs,
    },
}

/// Flags shared by `run` and `debug` for reaching the device.
#[derive(Debug, Args)]
struct TransportArgs {
    /// Transport to drive.
    #[arg(long = "mode", value_enum)]
    mode: ModeArg,

    /// Serial device path override, e.g. /dev/ttyUSB2.
    #[arg(long = "port", value_name = "PATH")]
    port: Option<String>,

    /// Serial baudrate override.
    #[arg(long = "baud", value_name = "RATE")]
    baud: Option<u32>,

    /// adb device serial override for bridge mode.
    #[arg(long = "device", value_name = "SERIAL")]
    device: Option<String>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModeArg {
    /// AT commands over a local serial port.
    Serial,
    /// Telephony state snapshots through adb.
    Bridge,
}

impl From<ModeArg> for TransportMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Serial => Self::Serial,
            ModeArg::Bridge => Self::Bridge,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ShowTarget {
    Spec,
    Profile,
    Manifest,
    Extension,
    Efsm,
    Build,
    Report,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SourceDoc {
    Spec,
    Profile,
    Manifest,
    Extension,
    Efsm,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum DeviceKind {
    Serial,
    Adb,
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let settings = Settings::load(cli.config.as_deref())?;
    let root = cli.root.unwrap_or_else(|| settings.storage.root.clone());
    let store = DocumentStore::new(root);

    let output = match cli.command {
        Command::Init => cmd_init(&store)?,
        Command::Show { target } => cmd_show(&store, target)?,
        Command::Save {
            doc,
            file,
            locked_baseline,
        } => cmd_save(&store, doc, &file, locked_baseline)?,
        Command::Compile { advise } => cmd_compile(&store, &settings, advise)?,
        Command::Config {
            request,
            llm,
            apply,
            compile,
        } => cmd_config(&store, &settings, &request, llm, apply, compile)?,
        Command::Run {
            transport,
            max_steps,
        } => cmd_run(&store, &settings, &transport, max_steps)?,
        Command::Reset => cmd_reset(&store)?,
        Command::Devices { kind } => cmd_devices(kind)?,
        Command::Debug { transport } => cmd_debug(&store, &settings, &transport)?,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Logs go to stderr so stdout stays valid JSON for piping.
fn init_logging() {
    let default_level = "info";
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(default_level))
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

// ── subcommand handlers ─────────────────────────────────────────────────────

fn cmd_init(store: &DocumentStore) -> Result<Value> {
    store.ensure_assets()?;
    Ok(json!({
        "root": store.root(),
        "documents": {
            "spec": store.spec_path(),
            "profile": store.profile_path(),
            "efsm": store.efsm_path(),
            "manifest": store.manifest_path(),
            "extension": store.extension_path(),
        },
        "build": {
            "effective_atspec": store.effective_spec_path(),
            "effective_profile": store.effective_profile_path(),
            "active_efsm": store.active_efsm_path(),
            "report": store.compile_report_path(),
        },
    }))
}

fn cmd_show(store: &DocumentStore, target: ShowTarget) -> Result<Value> {
    store.ensure_assets()?;
    Ok(match target {
        ShowTarget::Spec => store.load_spec(),
        ShowTarget::Profile => store.load_profile(),
        ShowTarget::Manifest => store.load_manifest(),
        ShowTarget::Extension => store.load_extension(),
        ShowTarget::Efsm => store.load_efsm(),
        ShowTarget::Build => store.load_build(),
        ShowTarget::Report => store
            .load_build()
            .get("report")
            .cloned()
            .unwrap_or_else(|| json!({})),
    })
}

fn cmd_save(
    store: &DocumentStore,
    doc: SourceDoc,
    file: &Path,
    locked_baseline: bool,
) -> Result<Value> {
    store.ensure_assets()?;
    let text =
        fs::read_to_string(file).with_context(|| format!("read {}", file.display()))?;
    let data: Value = serde_json::from_str(&text)
        .with_context(|| format!("parse {} as JSON", file.display()))?;

    if locked_baseline && !matches!(doc, SourceDoc::Spec) {
        warn!("--locked-baseline only affects the baseline spec; ignoring");
    }

    Ok(match doc {
        SourceDoc::Spec => {
            let mode = store.save_spec(&data, locked_baseline)?;
            json!({"saved": true, "path": store.spec_path(), "mode": mode.as_str()})
        }
        SourceDoc::Profile => {
            store.save_profile(&data)?;
            json!({"saved": true, "path": store.profile_path()})
        }
        SourceDoc::Manifest => {
            store.save_manifest(&data)?;
            json!({"saved": true, "path": store.manifest_path()})
        }
        SourceDoc::Extension => {
            store.save_extension(&data)?;
            json!({"saved": true, "path": store.extension_path()})
        }
        SourceDoc::Efsm => {
            store.save_efsm(&data)?;
            json!({"saved": true, "path": store.efsm_path()})
        }
    })
}

fn cmd_compile(store: &DocumentStore, settings: &Settings, advise: bool) -> Result<Value> {
    store.ensure_assets()?;
    let use_llm = advise || settings.agent.use_llm;
    let output = compile_assets(store, &NullAgentRunner, use_llm)?;
    Ok(serde_json::to_value(&output.report)?)
}

fn cmd_config(
    store: &DocumentStore,
    settings: &Settings,
    request: &str,
    llm: bool,
    apply: bool,
    compile_after_apply: bool,
) -> Result<Value> {
    store.ensure_assets()?;
    let use_llm = llm || settings.agent.use_llm;
    let manifest = store.load_manifest();
    let extension = store.load_extension();

    let proposal = propose_config_change(
        &NullAgentRunner,
        &manifest,
        &extension,
        request.trim(),
        use_llm,
        settings.agent.max_attempts,
    )?;

    if apply {
        store.save_manifest(&proposal.manifest_new)?;
        store.save_extension(&proposal.extension_new)?;
    }
    let compiled = apply && compile_after_apply;
    let compile_result = if compiled {
        let output = compile_assets(store, &NullAgentRunner, use_llm)?;
        serde_json::to_value(&output.report)?
    } else {
        json!({})
    };

    Ok(json!({
        "applied": apply,
        "compiled": compiled,
        "change_spec": proposal.change_spec,
        "manifest_patch": proposal.manifest_patch,
        "extension_mode": proposal.extension_mode,
        "extension_patch": proposal.extension_patch,
        "manifest": proposal.manifest_new,
        "extension": proposal.extension_new,
        "retries_used": proposal.attempts,
        "compile_result": compile_result,
    }))
}

fn cmd_run(
    store: &DocumentStore,
    settings: &Settings,
    args: &TransportArgs,
    max_steps: Option<usize>,
) -> Result<Value> {
    store.ensure_assets()?;
    let max_steps = max_steps.unwrap_or(settings.executor.max_steps);

    let summary = match args.mode {
        ModeArg::Serial => {
            let mut transport = SerialTransport::new(serial_config(store, settings, args));
            executor::run(store, &mut transport, max_steps)
        }
        ModeArg::Bridge => {
            let device = args.device.as_deref().unwrap_or(&settings.adb.device);
            let mut transport =
                AdbTransport::new(device, Duration::from_secs(settings.adb.timeout_secs));
            executor::run(store, &mut transport, max_steps)
        }
    };
    Ok(serde_json::to_value(&summary)?)
}

fn cmd_reset(store: &DocumentStore) -> Result<Value> {
    store.ensure_assets()?;
    store.reset_config_layers()?;
    let output = compile_assets(store, &NullAgentRunner, false)?;
    Ok(json!({
        "reset": true,
        "manifest": store.load_manifest(),
        "extension": store.load_extension(),
        "compile_result": serde_json::to_value(&output.report)?,
    }))
}

fn cmd_devices(kind: DeviceKind) -> Result<Value> {
    Ok(match kind {
        DeviceKind::Serial => serde_json::to_value(list_serial_ports())?,
        DeviceKind::Adb => serde_json::to_value(list_adb_devices())?,
    })
}

fn cmd_debug(store: &DocumentStore, settings: &Settings, args: &TransportArgs) -> Result<Value> {
    store.ensure_assets()?;
    let config = serial_config(store, settings, args);
    let device = args.device.as_deref().unwrap_or(&settings.adb.device);
    let report = debug_checks(
        args.mode.into(),
        &config,
        device,
        Duration::from_secs(settings.adb.timeout_secs),
    );
    Ok(serde_json::to_value(&report)?)
}

/// Settings first, CLI flags on top, then framing from the active profile.
/// The profile never carries port or baudrate, so flag overrides survive.
fn serial_config(store: &DocumentStore, settings: &Settings, args: &TransportArgs) -> SerialConfig {
    let mut config = SerialConfig::from_settings(&settings.serial);
    if let Some(port) = &args.port {
        config.port = port.clone();
    }
    if let Some(baud) = args.baud {
        config.baudrate = baud;
    }
    config.apply_profile(&store.runtime_profile());
    config
}
