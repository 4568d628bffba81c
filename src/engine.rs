//! State reconciliation engine
//!
//! Keeps three sources of truth in agreement: the extension store's
//! `touchpad-enabled` flag, the desktop's `send-events` mode, and (under
//! the xinput switch method) per-device enable state.
//!
//! Change handling for the engine's own writes runs depth-first, the way
//! a settings backend delivers change signals to a local writer; external
//! changes arrive as [`EngineEvent`]s on a single channel consumed by one
//! task, so no two handlers ever interleave. Recursion is broken by the
//! fixed-point check in [`Engine::sync_pointing_device`]: once flag and
//! mode agree, re-entrant triggers return without writing.

use tokio::sync::mpsc;

use crate::coalesce::Coalesce;
use crate::hotplug::PlugEvent;
use crate::indicator::IndicatorState;
use crate::settings::{ExtensionSettings, SettingKey, SwitchMethod};
use crate::sysconf::{SendEvents, SystemSettings};
use crate::xinput::{DeviceClass, DeviceControl};

/// Everything that can wake the engine
#[derive(Debug)]
pub enum EngineEvent {
    /// An extension key changed externally (config edit)
    ExtensionKeyChanged(SettingKey),
    /// The system `send-events` key changed
    SystemModeChanged,
    /// The config file was touched; reload and diff
    ConfigFileChanged,
    /// A mouse device node appeared or disappeared
    MousePlug(PlugEvent),
    /// User request (D-Bus): set the touchpad flag
    SetTouchpad(bool),
    /// User request (D-Bus): flip the touchpad flag
    Toggle,
    /// Deferred visibility recomputation fired
    SyncVisibility,
    /// Leave the loop and reset device state
    Shutdown,
}

/// Presentation updates emitted by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiEvent {
    /// The touchpad flag changed.
    ///
    /// `announce` carries the notification text state when a desktop
    /// notification should be raised (`show-notifications` on).
    StateChanged {
        enabled: bool,
        announce: Option<bool>,
    },
    /// The debounced visibility sync produced a fresh indicator state
    Indicator(IndicatorState),
}

/// Which side triggered a pointing-device sync
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SyncTrigger {
    /// The extension's `touchpad-enabled` flag
    TouchpadFlag,
    /// The system's `send-events` mode
    SystemMode,
}

/// The reconciliation engine.
///
/// Owns both settings stores and the device driver. Constructed at
/// startup, dropped at shutdown; there is no ambient instance.
pub struct Engine {
    ext: ExtensionSettings,
    sys: SystemSettings,
    devices: Box<dyn DeviceControl>,
    /// Cached switch method, refreshed when the key changes
    switch_method: SwitchMethod,
    /// Forces one full resync after a switch-method change
    switch_method_changed: bool,
    /// Single-slot debounce for the visibility sync
    visibility: Coalesce,
    events: mpsc::UnboundedSender<EngineEvent>,
    ui: mpsc::UnboundedSender<UiEvent>,
}

impl Engine {
    pub fn new(
        ext: ExtensionSettings,
        sys: SystemSettings,
        devices: Box<dyn DeviceControl>,
        events: mpsc::UnboundedSender<EngineEvent>,
        ui: mpsc::UnboundedSender<UiEvent>,
    ) -> Self {
        let switch_method = ext.switch_method();
        Self {
            ext,
            sys,
            devices,
            switch_method,
            switch_method_changed: false,
            visibility: Coalesce::new(),
            events,
            ui,
        }
    }

    /// Settle initial state.
    ///
    /// Leaves device-level state enabled unless the xinput method owns it,
    /// repairs a `send-events` value that disagrees with a still-enabled
    /// flag, emulates a mouse-removed event so a touchpad disabled before
    /// the last unplug comes back, and runs one full sync.
    pub fn startup(&mut self, xinput_usable: bool) {
        if !xinput_usable {
            tracing::warn!("xinput unavailable, disabling trackpoint autoswitch");
            self.ext.set_autoswitch_trackpoint(false);
        }

        if self.switch_method != SwitchMethod::Xinput {
            self.devices.enable_all(DeviceClass::Touchpad);
        }

        if self.switch_method != SwitchMethod::Gconf
            && !self.sys.send_events().is_enabled()
            && self.ext.touchpad_enabled()
        {
            self.write_mode(SendEvents::Enabled);
        }

        // As if the mouse had just been unplugged: settles auto-switch
        // state left over from a previous session or suspend
        self.on_mouse_plugged(PlugEvent::Removed);

        self.sync_pointing_device(SyncTrigger::TouchpadFlag);
        self.queue_visibility_sync();
        self.publish_state(false);

        tracing::info!(
            method = %self.switch_method,
            enabled = self.ext.touchpad_enabled(),
            "Engine started"
        );
    }

    /// Consume events until shutdown, then reset device state.
    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<EngineEvent>) {
        while let Some(event) = rx.recv().await {
            if matches!(event, EngineEvent::Shutdown) {
                tracing::info!("Engine shutting down");
                break;
            }
            self.handle(event);
        }
        self.reset();
    }

    /// Dispatch one event. Runs to completion before the next event.
    pub fn handle(&mut self, event: EngineEvent) {
        tracing::trace!(?event, "Engine event");
        match event {
            EngineEvent::ExtensionKeyChanged(key) => self.on_extension_key_changed(key),
            EngineEvent::SystemModeChanged => {
                self.sync_pointing_device(SyncTrigger::SystemMode)
            }
            EngineEvent::ConfigFileChanged => {
                for key in self.ext.reload() {
                    self.on_extension_key_changed(key);
                }
            }
            EngineEvent::MousePlug(plug) => self.on_mouse_plugged(plug),
            EngineEvent::SetTouchpad(enabled) => self.request_touchpad(enabled),
            EngineEvent::Toggle => {
                let enabled = !self.ext.touchpad_enabled();
                self.request_touchpad(enabled);
            }
            EngineEvent::SyncVisibility => self.sync_visibility(),
            EngineEvent::Shutdown => {}
        }
    }

    /// Leave the system in a known-good state: whatever the last decision
    /// was, device-level state ends up enabled.
    pub fn reset(&mut self) {
        tracing::info!("Resetting device state to enabled");
        self.devices.enable_all(DeviceClass::Touchpad);
    }

    // ========================================================================
    // Change handlers
    // ========================================================================

    fn on_extension_key_changed(&mut self, key: SettingKey) {
        match key {
            SettingKey::TouchpadEnabled => {
                self.sync_pointing_device(SyncTrigger::TouchpadFlag);
                self.queue_visibility_sync();
                self.publish_state(true);
            }
            SettingKey::SwitchMethod => self.on_switch_method_changed(),
            SettingKey::ShowPanelIcon => self.queue_visibility_sync(),
            // Read live when they matter; nothing to reconcile
            SettingKey::ShowNotifications
            | SettingKey::AutoswitchTouchpad
            | SettingKey::AutoswitchTrackpoint => {}
        }
    }

    /// A switch-method change always forces one full resync, even when
    /// flag and mode already agree, so the new mechanism takes over the
    /// device-level state from the old one.
    fn on_switch_method_changed(&mut self) {
        let old = self.switch_method;
        self.switch_method = self.ext.switch_method();
        self.switch_method_changed = true;
        tracing::info!(from = %old, to = %self.switch_method, "Switch method changed");

        if self.switch_method != SwitchMethod::Xinput {
            self.devices.enable_all(DeviceClass::Touchpad);
        }

        self.sync_pointing_device(SyncTrigger::TouchpadFlag);
    }

    /// A mouse appeared or disappeared; maybe auto-toggle the touchpad.
    fn on_mouse_plugged(&mut self, plug: PlugEvent) {
        if !self.ext.autoswitch_touchpad() {
            return;
        }

        let mouse_count = self.devices.list(DeviceClass::Mouse).len();
        tracing::debug!(?plug, mouse_count, "Mouse plug event");

        match plug {
            PlugEvent::Removed => {
                if mouse_count == 0 && !self.ext.touchpad_enabled() {
                    tracing::info!("Last mouse removed, enabling touchpad");
                    self.write_flag(true);
                }
            }
            PlugEvent::Added => {
                if mouse_count != 0 && self.ext.touchpad_enabled() {
                    tracing::info!("Mouse plugged in, disabling touchpad");
                    self.write_flag(false);
                }
            }
        }
    }

    /// User-initiated flag write (D-Bus toggle or set). Skipped when the
    /// store is not writable.
    fn request_touchpad(&mut self, enabled: bool) {
        if !self.ext.is_writable() {
            tracing::warn!("Ignoring touchpad request, settings store is not writable");
            return;
        }
        self.write_flag(enabled);
    }

    // ========================================================================
    // Reconciliation
    // ========================================================================

    /// Bring flag, mode and device state into agreement.
    ///
    /// The in-sync early return is the recursion breaker: writes made
    /// below re-enter this function through change dispatch and stop here
    /// once agreement is reached.
    fn sync_pointing_device(&mut self, trigger: SyncTrigger) {
        let mode = self.sys.send_events();
        let flag = self.ext.touchpad_enabled();
        let in_sync = in_sync(flag, mode);

        if in_sync && !self.switch_method_changed {
            tracing::debug!("Already in sync");
            return;
        }

        tracing::debug!(?trigger, flag, mode = %mode, forced = self.switch_method_changed, "Syncing pointing device");

        match trigger {
            SyncTrigger::TouchpadFlag => self.sync_touchpad(flag, mode, in_sync),
            SyncTrigger::SystemMode => self.onset_send_events(flag, mode),
        }

        if self.switch_method_changed {
            self.switch_method_changed = false;
        }
    }

    /// The flag changed; propagate per the switch method.
    fn sync_touchpad(&mut self, flag: bool, mode: SendEvents, was_in_sync: bool) {
        match self.switch_method {
            SwitchMethod::Gconf => self.onset_touchpad_enable(flag, mode),
            SwitchMethod::Xinput => {
                // Keep the two settings mirrored for any UI reading them
                if !was_in_sync {
                    self.onset_touchpad_enable(flag, mode);
                }
                self.devices.switch_all(DeviceClass::Touchpad, flag);
                // Disabling a touchpad that does not exist must not stick
                if !flag && !self.devices.is_present(DeviceClass::Touchpad) {
                    tracing::info!("No touchpad attached, keeping flag enabled");
                    self.write_flag(true);
                }
            }
        }
    }

    /// The system mode changed (or any non-flag trigger); pull the flag
    /// into agreement.
    fn onset_send_events(&mut self, flag: bool, mode: SendEvents) {
        if !mode.is_enabled() && flag {
            self.write_flag(false);
            return;
        }

        if mode.is_enabled() && !flag {
            // The mode may have been flipped externally while device-level
            // state was left disabled by the xinput method
            if self.switch_method != SwitchMethod::Gconf {
                self.devices.enable_all(DeviceClass::Touchpad);
            }
            self.write_flag(true);
        }
    }

    /// Push the flag's value onto the system mode.
    fn onset_touchpad_enable(&mut self, flag: bool, mode: SendEvents) {
        if flag && !mode.is_enabled() {
            self.write_mode(SendEvents::Enabled);
            return;
        }

        if !flag && mode != SendEvents::Disabled {
            self.write_mode(SendEvents::Disabled);
        }
    }

    // ========================================================================
    // Writes with synchronous change dispatch
    // ========================================================================

    /// Write the flag and dispatch its change handling depth-first, like a
    /// settings backend signalling a local writer.
    fn write_flag(&mut self, enabled: bool) {
        if self.ext.set_touchpad_enabled(enabled) {
            self.on_extension_key_changed(SettingKey::TouchpadEnabled);
        }
    }

    /// Write the system mode and dispatch its change handling. The real
    /// backend echoes the change again through the monitor; that second
    /// notification lands on the channel and is absorbed at the fixed
    /// point.
    fn write_mode(&mut self, mode: SendEvents) {
        self.sys.set_send_events(mode);
        self.sync_pointing_device(SyncTrigger::SystemMode);
    }

    // ========================================================================
    // Presentation
    // ========================================================================

    /// Request a deferred visibility recomputation; collapses with any
    /// already-pending request.
    fn queue_visibility_sync(&mut self) {
        if self.visibility.schedule() {
            let _ = self.events.send(EngineEvent::SyncVisibility);
        }
    }

    fn sync_visibility(&mut self) {
        self.visibility.clear();
        let state =
            IndicatorState::compute(self.ext.show_panelicon(), self.ext.touchpad_enabled());
        tracing::debug!(enabled = state.enabled, visible = state.visible, "Visibility synced");
        let _ = self.ui.send(UiEvent::Indicator(state));
    }

    fn publish_state(&self, with_notification: bool) {
        let enabled = self.ext.touchpad_enabled();
        let announce = (with_notification && self.ext.show_notifications())
            .then(|| enabled && self.sys.send_events().is_enabled());
        let _ = self.ui.send(UiEvent::StateChanged { enabled, announce });
    }
}

/// The mirroring predicate: flag and mode agree only in the two terminal
/// combinations.
fn in_sync(flag: bool, mode: SendEvents) -> bool {
    let both_enabled = flag && mode == SendEvents::Enabled;
    let both_disabled = !flag && mode == SendEvents::Disabled;
    both_enabled || both_disabled
}

// ============================================================================
// Tests
// ============================================================================
