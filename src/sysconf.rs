//! System settings store
//!
//! Wraps the desktop environment's authoritative touchpad setting, the
//! GSettings key `org.gnome.desktop.peripherals.touchpad send-events`.
//! Reads and writes go through short-lived `gsettings` invocations; change
//! notifications come from a long-lived `gsettings monitor` subprocess
//! whose output lines are forwarded onto the engine channel.
//!
//! An in-memory backend stands in for GSettings in tests and mirrors its
//! notification behavior: a write that changes the value echoes a change
//! event, exactly like the monitor does for the real key.

use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::LinesStream;
use tokio_stream::StreamExt;

use crate::command::run_command;
use crate::engine::EngineEvent;

/// GSettings schema owning the touchpad peripheral settings
pub const TOUCHPAD_SCHEMA: &str = "org.gnome.desktop.peripherals.touchpad";

/// The send-events key within [`TOUCHPAD_SCHEMA`]
pub const KEY_SEND_EVENTS: &str = "send-events";

/// The desktop's send-events mode for the touchpad.
///
/// Closed at the parse boundary: GVariant strings outside the schema's
/// range never cross into the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendEvents {
    Enabled,
    Disabled,
    /// GNOME's third mode; counts as "not enabled" for reconciliation
    DisabledOnExternalMouse,
}

impl SendEvents {
    /// Parse a `gsettings get` output value, with or without the
    /// surrounding GVariant quotes.
    pub fn parse(raw: &str) -> Option<Self> {
        let value = raw.trim().trim_matches('\'');
        match value {
            "enabled" => Some(SendEvents::Enabled),
            "disabled" => Some(SendEvents::Disabled),
            "disabled-on-external-mouse" => Some(SendEvents::DisabledOnExternalMouse),
            _ => None,
        }
    }

    /// The GVariant string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            SendEvents::Enabled => "enabled",
            SendEvents::Disabled => "disabled",
            SendEvents::DisabledOnExternalMouse => "disabled-on-external-mouse",
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, SendEvents::Enabled)
    }
}

impl std::fmt::Display for SendEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

enum Backend {
    /// The real desktop key, via the `gsettings` tool
    Gsettings,
    /// In-memory value that echoes changes onto the engine channel
    Memory {
        mode: SendEvents,
        events: mpsc::UnboundedSender<EngineEvent>,
    },
}

/// Handle to the system-owned `send-events` setting
pub struct SystemSettings {
    backend: Backend,
}

impl SystemSettings {
    /// A store backed by the desktop's GSettings database
    pub fn gsettings() -> Self {
        Self {
            backend: Backend::Gsettings,
        }
    }

    /// A store backed by process memory
    pub fn in_memory(initial: SendEvents, events: mpsc::UnboundedSender<EngineEvent>) -> Self {
        Self {
            backend: Backend::Memory {
                mode: initial,
                events,
            },
        }
    }

    /// Read the current send-events mode.
    ///
    /// An unavailable or unparsable `gsettings` degrades to `Enabled`:
    /// the engine then has nothing to reconcile against and leaves the
    /// touchpad alone.
    pub fn send_events(&self) -> SendEvents {
        match &self.backend {
            Backend::Gsettings => {
                let out = run_command("gsettings", &["get", TOUCHPAD_SCHEMA, KEY_SEND_EVENTS]);
                match out.as_deref().and_then(SendEvents::parse) {
                    Some(mode) => mode,
                    None => {
                        tracing::warn!("Could not read send-events, assuming enabled");
                        SendEvents::Enabled
                    }
                }
            }
            Backend::Memory { mode, .. } => *mode,
        }
    }

    /// Write the send-events mode.
    ///
    /// For the GSettings backend the change notification comes back
    /// asynchronously through the monitor subprocess; the memory backend
    /// echoes it directly. Either way the engine sees the same
    /// re-notification it must absorb at the fixed point.
    pub fn set_send_events(&mut self, mode: SendEvents) {
        tracing::debug!(mode = %mode, "Writing send-events");
        match &mut self.backend {
            Backend::Gsettings => {
                let value = mode.as_str();
                if run_command(
                    "gsettings",
                    &["set", TOUCHPAD_SCHEMA, KEY_SEND_EVENTS, value],
                )
                .is_none()
                {
                    tracing::warn!(mode = %mode, "Failed to write send-events");
                }
            }
            Backend::Memory { mode: current, events } => {
                if *current != mode {
                    *current = mode;
                    let _ = events.send(EngineEvent::SystemModeChanged);
                }
            }
        }
    }
}

/// Spawn the `gsettings monitor` reader.
///
/// Each line the monitor prints (`send-events: 'disabled'`) becomes a
/// [`EngineEvent::SystemModeChanged`]. The task ends when the subprocess
/// exits; a missing `gsettings` just means no system-side notifications,
/// which the engine tolerates.
pub fn spawn_monitor(events: mpsc::UnboundedSender<EngineEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let child = tokio::process::Command::new("gsettings")
            .args(["monitor", TOUCHPAD_SCHEMA, KEY_SEND_EVENTS])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn();

        let mut child = match child {
            Ok(child) => child,
            Err(e) => {
                tracing::warn!(error = %e, "Could not start gsettings monitor, system changes will not be tracked");
                return;
            }
        };

        let stdout = match child.stdout.take() {
            Some(stdout) => stdout,
            None => return,
        };

        tracing::info!(schema = TOUCHPAD_SCHEMA, key = KEY_SEND_EVENTS, "Monitoring system settings");

        let mut lines = LinesStream::new(BufReader::new(stdout).lines());
        while let Some(line) = lines.next().await {
            match line {
                Ok(line) => {
                    tracing::debug!(line = %line, "System settings change");
                    if events.send(EngineEvent::SystemModeChanged).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "gsettings monitor read error");
                    break;
                }
            }
        }

        tracing::info!("gsettings monitor ended");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quoted_values() {
        assert_eq!(SendEvents::parse("'enabled'\n"), Some(SendEvents::Enabled));
        assert_eq!(SendEvents::parse("'disabled'"), Some(SendEvents::Disabled));
        assert_eq!(
            SendEvents::parse("'disabled-on-external-mouse'"),
            Some(SendEvents::DisabledOnExternalMouse)
        );
    }

    #[test]
    fn test_parse_bare_values() {
        assert_eq!(SendEvents::parse("enabled"), Some(SendEvents::Enabled));
        assert_eq!(SendEvents::parse("disabled"), Some(SendEvents::Disabled));
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert_eq!(SendEvents::parse("'default'"), None);
        assert_eq!(SendEvents::parse(""), None);
        assert_eq!(SendEvents::parse("'Enabled'"), None);
    }

    #[test]
    fn test_only_enabled_counts_as_enabled() {
        assert!(SendEvents::Enabled.is_enabled());
        assert!(!SendEvents::Disabled.is_enabled());
        assert!(!SendEvents::DisabledOnExternalMouse.is_enabled());
    }

    #[test]
    fn test_memory_backend_echoes_changes() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut sys = SystemSettings::in_memory(SendEvents::Enabled, tx);

        sys.set_send_events(SendEvents::Disabled);
        assert_eq!(sys.send_events(), SendEvents::Disabled);
        assert!(matches!(rx.try_recv(), Ok(EngineEvent::SystemModeChanged)));

        // Same value again: no echo
        sys.set_send_events(SendEvents::Disabled);
        assert!(rx.try_recv().is_err());
    }
}
