//! touchpadd Daemon
//!
//! A daemon for Linux desktops that keeps the touchpad's enabled state
//! consistent across the daemon's own toggle setting, the desktop's
//! `send-events` peripheral setting and per-device xinput state, and
//! auto-toggles the touchpad on mouse hotplug.

use clap::Parser;
use tokio::sync::mpsc;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use touchpadd::{
    dbus::{init_dbus_service, DBUS_INTERFACE, DBUS_PATH},
    engine::{Engine, EngineEvent, UiEvent},
    hotplug::HotplugWatcher,
    indicator::{new_shared_state, SharedIndicatorState},
    notification::Notifier,
    settings::{self, ConfigWatcher, ExtensionConfig, ExtensionSettings},
    sysconf::{spawn_monitor, SystemSettings},
    xinput::XinputDriver,
};

/// touchpadd - Touchpad state sync daemon for Linux desktops
#[derive(Parser, Debug)]
#[command(name = "touchpadd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/touchpadd/config.json)
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// List attached pointing devices and exit
    #[arg(long)]
    list_devices: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("touchpadd starting...");

    // Handle --list-devices flag
    if args.list_devices {
        list_pointing_devices();
        return Ok(());
    }

    let config_path = args.config.or_else(settings::default_config_path);

    let (engine_tx, engine_rx) = mpsc::unbounded_channel::<EngineEvent>();
    let (ui_tx, ui_rx) = mpsc::unbounded_channel::<UiEvent>();

    // Extension settings store, file-backed where possible
    let ext = match &config_path {
        Some(path) => {
            info!("Configuration: {}", path.display());
            ExtensionSettings::load(path)
        }
        None => {
            warn!("Could not determine config directory, settings will not persist");
            ExtensionSettings::in_memory(ExtensionConfig::default())
        }
    };

    // Probe the device tool once; the engine degrades features that need it
    let xinput_usable = XinputDriver::probe();
    if xinput_usable {
        info!("xinput is available");
    } else {
        warn!("Can't find xinput, device-level switching degraded");
    }

    // System store plus its change monitor
    let sys = SystemSettings::gsettings();
    let _monitor = spawn_monitor(engine_tx.clone());

    // Config hot-reload watcher
    let _config_watcher = config_path.as_ref().and_then(|path| {
        match ConfigWatcher::spawn(path, engine_tx.clone()) {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                warn!(error = %e, "Config watching disabled");
                None
            }
        }
    });

    // Mouse hotplug watcher
    let _hotplug = match HotplugWatcher::spawn(engine_tx.clone()) {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            warn!(error = %e, "Mouse hotplug watching disabled");
            None
        }
    };

    // Shared presentation state and the D-Bus surface reading it
    let state = new_shared_state();
    let connection = match init_dbus_service(state.clone(), engine_tx.clone()).await {
        Ok(conn) => {
            info!("D-Bus service initialized successfully");
            conn
        }
        Err(e) => {
            error!("Failed to initialize D-Bus service: {}", e);
            return Err(e.into());
        }
    };

    // The reconciliation engine: settle initial state, then consume events
    let mut engine = Engine::new(
        ext,
        sys,
        Box::new(XinputDriver::new()),
        engine_tx.clone(),
        ui_tx,
    );
    engine.startup(xinput_usable);
    let mut engine_handle = tokio::spawn(engine.run(engine_rx));

    // Presentation task: D-Bus signals, properties and notifications
    let ui_handle = tokio::spawn(process_ui_events(ui_rx, state, connection.clone()));

    info!("touchpadd ready");

    // Wait for shutdown signal; the engine resets device state on its way out
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received, exiting...");
            let _ = engine_tx.send(EngineEvent::Shutdown);
            if let Err(e) = (&mut engine_handle).await {
                error!("Engine task panicked: {:?}", e);
            }
        }
        result = &mut engine_handle => {
            if let Err(e) = result {
                error!("Engine task panicked: {:?}", e);
            }
        }
    }

    ui_handle.abort();
    info!("touchpadd stopped");
    Ok(())
}

/// List all classified pointing devices
fn list_pointing_devices() {
    println!("Scanning for pointing devices...\n");

    let devices = XinputDriver::new().list_all();

    if devices.is_empty() {
        println!("No pointing devices found.");
        println!("\nTroubleshooting:");
        println!("  - Ensure the xinput tool is installed");
        println!("  - Run inside an X11 or XWayland session");
        return;
    }

    println!("Found {} pointing device(s):\n", devices.len());

    for (i, device) in devices.iter().enumerate() {
        println!("{}. {} [{}]", i + 1, device.name, device.class);
        println!("   id: {}", device.id);
        println!();
    }
}

/// Consume presentation updates from the engine
///
/// Updates the shared indicator state the D-Bus properties read, emits
/// the StateChanged signal, and raises notifications when asked to.
async fn process_ui_events(
    mut ui_rx: mpsc::UnboundedReceiver<UiEvent>,
    state: SharedIndicatorState,
    connection: zbus::Connection,
) {
    let mut notifier = Notifier::new();

    while let Some(event) = ui_rx.recv().await {
        match event {
            UiEvent::StateChanged { enabled, announce } => {
                state.write().await.enabled = enabled;

                if let Err(e) = emit_state_changed(&connection, enabled).await {
                    error!("Failed to emit StateChanged signal: {}", e);
                }

                if let Some(announce_enabled) = announce {
                    if let Err(e) = notifier.notify(&connection, announce_enabled).await {
                        warn!("Failed to raise notification: {}", e);
                    }
                }
            }
            UiEvent::Indicator(indicator) => {
                *state.write().await = indicator;
                info!(
                    icon = indicator.icon_name(),
                    visible = indicator.visible,
                    "Indicator updated"
                );
            }
        }
    }
}

/// Emit the StateChanged signal via D-Bus
///
/// Broadcast so panel applets and scripts can track the touchpad without
/// polling the property.
async fn emit_state_changed(
    connection: &zbus::Connection,
    enabled: bool,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    connection.emit_signal(
        None::<&str>,  // destination (None = broadcast)
        DBUS_PATH,
        DBUS_INTERFACE,
        "StateChanged",
        &(enabled,),
    ).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use touchpadd::indicator::IndicatorState;

    #[test]
    fn test_args_defaults() {
        let args = Args::parse_from(["touchpadd"]);
        assert!(args.config.is_none());
        assert!(!args.verbose);
        assert!(!args.list_devices);
    }

    #[test]
    fn test_args_verbose() {
        let args = Args::parse_from(["touchpadd", "--verbose"]);
        assert!(args.verbose);
    }

    #[test]
    fn test_args_list_devices() {
        let args = Args::parse_from(["touchpadd", "--list-devices"]);
        assert!(args.list_devices);
    }

    #[test]
    fn test_args_config_path() {
        let args = Args::parse_from(["touchpadd", "--config", "/tmp/tp.json"]);
        assert_eq!(
            args.config.as_deref(),
            Some(std::path::Path::new("/tmp/tp.json"))
        );
    }

    #[tokio::test]
    async fn test_ui_event_channel_preserves_order() {
        let (tx, mut rx) = mpsc::unbounded_channel::<UiEvent>();

        tx.send(UiEvent::StateChanged {
            enabled: false,
            announce: Some(false),
        })
        .unwrap();
        tx.send(UiEvent::Indicator(IndicatorState::compute(true, false)))
            .unwrap();

        let first = rx.recv().await.unwrap();
        assert!(matches!(first, UiEvent::StateChanged { enabled: false, .. }));

        let second = rx.recv().await.unwrap();
        assert!(matches!(second, UiEvent::Indicator(state) if !state.enabled && state.visible));
    }
}
