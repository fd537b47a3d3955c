//! twokeys detector
//!
//! Watches keyboards and reports their hotkeys to the twokeys server.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use futures::future::join_all;
use tracing_subscriber::EnvFilter;

use twokeys_detector::detect::{detect_keyboard, DEFAULT_INPUTS_DIR};
use twokeys_detector::device::enumerate_keyboards;
use twokeys_detector::report::trigger_url;
use twokeys_detector::shutdown::wait_for_signal;
use twokeys_detector::{HttpReporter, KeyboardSession, Reporter, SessionHandle, Shutdown};

#[derive(Parser, Debug)]
#[command(name = "twokeys-detector")]
#[command(about = "Keyboard hotkey detector for twokeys")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        global = true,
        default_value = "~/.config/twokeys/detector.kdl"
    )]
    config: String,

    /// Log every key event
    #[arg(long, global = true, conflicts_with = "silent")]
    debug: bool,

    /// Only log errors
    #[arg(long, global = true)]
    silent: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Watch keyboards and report their hotkeys
    Watch {
        /// Keyboard names from the configuration file
        #[arg(required = true)]
        keyboards: Vec<String>,

        /// Leave the keyboards usable by other programs
        #[arg(long)]
        no_lock: bool,
    },

    /// Validate the configuration file
    Validate,

    /// List available keyboards
    Devices,

    /// Print the device path of the next keyboard a key is pressed on
    Detect {
        /// Directory of input devices to watch
        #[arg(long, default_value = DEFAULT_INPUTS_DIR)]
        inputs_path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.debug {
        "debug"
    } else if cli.silent {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    // Expand tilde in config path
    let config_path: PathBuf = shellexpand::tilde(&cli.config).into_owned().into();

    match cli.command {
        Commands::Watch { keyboards, no_lock } => cmd_watch(&config_path, &keyboards, no_lock).await,
        Commands::Validate => cmd_validate(&config_path),
        Commands::Devices => cmd_devices(),
        Commands::Detect { inputs_path } => cmd_detect(&inputs_path).await,
    }
}

async fn cmd_watch(config_path: &Path, keyboards: &[String], no_lock: bool) -> Result<()> {
    tracing::info!("Loading configuration from {}", config_path.display());
    let config = twokeys_config::parse_config(config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;

    let lock = config.global.lock_keyboards && !no_lock;
    if !lock {
        tracing::info!("Keyboards will not be locked");
    }

    let reporter: Arc<dyn Reporter> = Arc::new(HttpReporter::new(&config.global.server)?);
    tracing::info!("Reporting hotkeys to {}", trigger_url(&config.global.server));

    // Open everything before grabbing anything
    let mut sessions = Vec::with_capacity(keyboards.len());
    for name in keyboards {
        let keyboard = config.keyboard(name).with_context(|| {
            format!(
                "Keyboard {} is not defined in {}",
                name,
                config_path.display()
            )
        })?;
        let session = KeyboardSession::open(keyboard, lock, reporter.clone())
            .with_context(|| format!("Failed to start keyboard {}", name))?;
        sessions.push(session);
    }

    let handles: Vec<SessionHandle> = sessions
        .into_iter()
        .map(|session| session.spawn(Shutdown::new()))
        .collect();
    let shutdowns: Vec<Shutdown> = handles.iter().map(|h| h.shutdown().clone()).collect();

    let signals = tokio::spawn(async move {
        match wait_for_signal().await {
            Ok(name) => tracing::info!("Received {}, shutting down...", name),
            Err(e) => tracing::error!("Failed to listen for signals: {}", e),
        }
        for shutdown in &shutdowns {
            shutdown.trigger();
        }
    });

    tracing::info!("Watching {} keyboard(s)", handles.len());

    let results = join_all(handles.into_iter().map(|handle| async move {
        let name = handle.keyboard().to_string();
        (name, handle.join().await)
    }))
    .await;
    signals.abort();

    let mut failed = 0;
    for (name, result) in results {
        match result {
            Ok(()) => tracing::info!("Keyboard {} stopped", name),
            Err(e) => {
                tracing::error!("Keyboard {} stopped: {}", name, e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{} keyboard session(s) ended with an error", failed);
    }
    Ok(())
}

fn cmd_validate(config_path: &Path) -> Result<()> {
    println!("Validating configuration: {}", config_path.display());

    match twokeys_config::parse_config(config_path) {
        Ok(config) => {
            println!("Configuration is valid!");
            println!("  Server: {}", trigger_url(&config.global.server));
            println!("  Lock keyboards: {}", config.global.lock_keyboards);
            println!("  Keyboards: {}", config.keyboards.len());
            for keyboard in &config.keyboards {
                println!(
                    "    - {} ({} device(s), {} hotkey(s), {} custom key(s))",
                    keyboard.name,
                    keyboard.paths.len(),
                    keyboard.hotkeys.len(),
                    keyboard.map.len()
                );
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("{:?}", miette::Report::new(e));
            bail!("Invalid configuration");
        }
    }
}

fn cmd_devices() -> Result<()> {
    println!("Available keyboards:\n");

    for device in enumerate_keyboards()? {
        println!("  {}", device.name);
        println!("    Path: {}", device.path.display());
        println!("    ID: {}", device.vendor_product());
        println!();
    }

    Ok(())
}

async fn cmd_detect(inputs_path: &Path) -> Result<()> {
    let path = tokio::select! {
        result = detect_keyboard(inputs_path) => result?,
        signal = wait_for_signal() => bail!("Detection cancelled by {}", signal?),
    };

    println!("{}", path.display());
    Ok(())
}
