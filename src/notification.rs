//! Desktop notifications
//!
//! Raises a transient, low-urgency notification through the
//! `org.freedesktop.Notifications` service whenever the touchpad state
//! changes and the `show-notifications` preference is on. Each new
//! notification replaces the previous one so rapid toggling never stacks
//! bubbles.

use std::collections::HashMap;

use zbus::proxy::Proxy;
use zbus::zvariant::Value;

use crate::indicator::{ICON_DISABLED, ICON_ENABLED};

const NOTIFY_DEST: &str = "org.freedesktop.Notifications";
const NOTIFY_PATH: &str = "/org/freedesktop/Notifications";
const NOTIFY_INTERFACE: &str = "org.freedesktop.Notifications";

/// Low urgency per the freedesktop notification spec
const URGENCY_LOW: u8 = 0;

/// Summary line shown on every notification
const SUMMARY: &str = "Touchpad Indicator";

/// Notification text for a state
fn body_text(enabled: bool) -> &'static str {
    if enabled {
        "Touchpad Enabled"
    } else {
        "Touchpad Disabled"
    }
}

/// Sends state-change notifications, replacing the previous bubble.
pub struct Notifier {
    /// Server-assigned id of the last notification we raised
    last_id: u32,
}

impl Notifier {
    pub fn new() -> Self {
        Self { last_id: 0 }
    }

    /// Raise (or replace) the state notification.
    pub async fn notify(
        &mut self,
        connection: &zbus::Connection,
        enabled: bool,
    ) -> zbus::Result<()> {
        let proxy = Proxy::new(connection, NOTIFY_DEST, NOTIFY_PATH, NOTIFY_INTERFACE).await?;

        let icon = if enabled { ICON_ENABLED } else { ICON_DISABLED };
        let mut hints: HashMap<&str, Value<'_>> = HashMap::new();
        hints.insert("urgency", Value::U8(URGENCY_LOW));
        hints.insert("transient", Value::Bool(true));

        let reply = proxy
            .call_method(
                "Notify",
                &(
                    "touchpadd",
                    self.last_id,
                    icon,
                    SUMMARY,
                    body_text(enabled),
                    Vec::<&str>::new(),
                    hints,
                    -1i32,
                ),
            )
            .await?;

        self.last_id = reply.body().deserialize()?;
        tracing::debug!(enabled, id = self.last_id, "Notification raised");
        Ok(())
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_text() {
        assert_eq!(body_text(true), "Touchpad Enabled");
        assert_eq!(body_text(false), "Touchpad Disabled");
    }

    #[test]
    fn test_notifier_starts_without_replacement() {
        let notifier = Notifier::new();
        assert_eq!(notifier.last_id, 0);
    }
}
