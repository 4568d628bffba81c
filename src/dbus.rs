//! D-Bus control surface for touchpadd
//!
//! Implements the org.touchpadd.Daemon interface. This is the daemon's
//! user-facing toggle: desktop keybindings, panel applets and scripts
//! call `Toggle`/`SetTouchpad` here instead of editing the config file.
//!
//! ## Interface: org.touchpadd.Daemon
//!
//! ### Methods:
//! - `Toggle()` - Flip the touchpad flag
//! - `SetTouchpad(enabled: bool)` - Set the touchpad flag
//! - `ListDevices(class: String) -> Vec<(u32, String)>` - Attached devices
//!
//! ### Signals:
//! - `StateChanged(enabled: bool)` - Emitted after each reconciled change
//!
//! Mutations are forwarded onto the engine channel; the engine applies
//! them through the same reconciliation path as every other trigger.

use tokio::sync::mpsc;
use zbus::{fdo, interface, object_server::SignalEmitter};

use crate::engine::EngineEvent;
use crate::indicator::SharedIndicatorState;
use crate::xinput::{DeviceClass, DeviceControl, XinputDriver};

/// D-Bus interface name
pub const DBUS_INTERFACE: &str = "org.touchpadd.Daemon";

/// D-Bus object path
pub const DBUS_PATH: &str = "/org/touchpadd/Daemon";

/// D-Bus bus name
pub const DBUS_NAME: &str = "org.touchpadd";

/// touchpadd D-Bus service
pub struct TouchpadService {
    /// Latest reconciled indicator state
    state: SharedIndicatorState,
    /// Channel into the engine loop
    engine: mpsc::UnboundedSender<EngineEvent>,
    /// Enumerator for ListDevices
    devices: XinputDriver,
    /// Daemon version
    version: String,
}

impl TouchpadService {
    /// Create a new D-Bus service instance
    pub fn new(state: SharedIndicatorState, engine: mpsc::UnboundedSender<EngineEvent>) -> Self {
        Self {
            state,
            engine,
            devices: XinputDriver::new(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    fn send(&self, event: EngineEvent) -> fdo::Result<()> {
        self.engine
            .send(event)
            .map_err(|e| fdo::Error::Failed(format!("Engine unavailable: {}", e)))
    }
}

#[interface(name = "org.touchpadd.Daemon")]
impl TouchpadService {
    /// Flip the touchpad flag.
    ///
    /// The hook for a desktop keybinding: bind a shortcut to this method
    /// to toggle the touchpad from the keyboard.
    async fn toggle(&self) -> fdo::Result<()> {
        tracing::info!("Toggle called");
        self.send(EngineEvent::Toggle)
    }

    /// Set the touchpad flag to a specific value
    async fn set_touchpad(&self, enabled: bool) -> fdo::Result<()> {
        tracing::info!(enabled, "SetTouchpad called");
        self.send(EngineEvent::SetTouchpad(enabled))
    }

    /// List attached pointing devices of a class
    ///
    /// # Arguments
    /// * `class` - "touchpad", "mouse" or "trackpoint"
    ///
    /// # Returns
    /// Vec of (id, name) pairs; empty when no device of the class is
    /// attached or the enumeration tool is unavailable.
    async fn list_devices(&self, class: String) -> fdo::Result<Vec<(u32, String)>> {
        let class = DeviceClass::parse(&class)
            .ok_or_else(|| fdo::Error::InvalidArgs(format!("Unknown device class: {}", class)))?;
        Ok(self
            .devices
            .list(class)
            .into_iter()
            .map(|d| (d.id, d.name))
            .collect())
    }

    /// Signal emitted after every reconciled touchpad state change
    ///
    /// # Arguments
    /// * `enabled` - The reconciled touchpad flag
    #[zbus(signal)]
    async fn state_changed(emitter: &SignalEmitter<'_>, enabled: bool) -> zbus::Result<()>;

    /// Get the reconciled touchpad flag
    #[zbus(property)]
    async fn touchpad_enabled(&self) -> bool {
        self.state.read().await.enabled
    }

    /// Get whether a panel front-end should show the indicator
    #[zbus(property)]
    async fn panel_visible(&self) -> bool {
        self.state.read().await.visible
    }

    /// Get the icon a panel front-end should display
    #[zbus(property)]
    async fn icon_name(&self) -> String {
        self.state.read().await.icon_name().to_string()
    }

    /// Get daemon version
    #[zbus(property)]
    async fn daemon_version(&self) -> &str {
        &self.version
    }
}

/// Initialize and run the D-Bus service
///
/// Connects to the session bus, registers the service name, and exports
/// the interface at the object path.
///
/// # Returns
/// A `zbus::Connection` that should be kept alive for the service to run.
pub async fn init_dbus_service(
    state: SharedIndicatorState,
    engine: mpsc::UnboundedSender<EngineEvent>,
) -> zbus::Result<zbus::Connection> {
    let service = TouchpadService::new(state, engine);

    let connection = zbus::connection::Builder::session()?
        .name(DBUS_NAME)?
        .serve_at(DBUS_PATH, service)?
        .build()
        .await?;

    tracing::info!(
        name = DBUS_NAME,
        path = DBUS_PATH,
        "D-Bus service registered"
    );

    Ok(connection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicator::new_shared_state;

    #[test]
    fn test_dbus_constants() {
        assert_eq!(DBUS_INTERFACE, "org.touchpadd.Daemon");
        assert_eq!(DBUS_PATH, "/org/touchpadd/Daemon");
        assert_eq!(DBUS_NAME, "org.touchpadd");
    }

    #[test]
    fn test_mutations_reach_engine_channel() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let service = TouchpadService::new(new_shared_state(), tx);

        service.send(EngineEvent::Toggle).unwrap();
        service.send(EngineEvent::SetTouchpad(false)).unwrap();

        assert!(matches!(rx.try_recv(), Ok(EngineEvent::Toggle)));
        assert!(matches!(rx.try_recv(), Ok(EngineEvent::SetTouchpad(false))));
    }

    #[test]
    fn test_service_creation() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let service = TouchpadService::new(new_shared_state(), tx);
        assert!(!service.version.is_empty());
    }
}
