//! Indicator presentation state
//!
//! Icon name and panel visibility as pure functions of the engine's
//! resulting state. Shared with the D-Bus service so properties reflect
//! the latest reconciliation outcome.

use std::sync::Arc;
use tokio::sync::RwLock;

/// Icon shown while the touchpad is enabled
pub const ICON_ENABLED: &str = "input-touchpad-symbolic";

/// Icon shown while the touchpad is disabled
pub const ICON_DISABLED: &str = "touchpad-disabled-symbolic";

/// What a panel front-end should currently display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndicatorState {
    /// The reconciled touchpad flag
    pub enabled: bool,
    /// Whether the panel icon should be shown at all
    pub visible: bool,
}

impl Default for IndicatorState {
    fn default() -> Self {
        Self {
            enabled: true,
            visible: true,
        }
    }
}

impl IndicatorState {
    /// Compute presentation state from the settings.
    ///
    /// The icon stays visible while the always-show preference is on, or
    /// while the touchpad is enabled (so a disabled touchpad with the
    /// preference off hides the indicator).
    pub fn compute(show_panelicon: bool, enabled: bool) -> Self {
        Self {
            enabled,
            visible: show_panelicon || enabled,
        }
    }

    pub fn icon_name(&self) -> &'static str {
        if self.enabled {
            ICON_ENABLED
        } else {
            ICON_DISABLED
        }
    }
}

/// Indicator state shared between the engine loop and the D-Bus service
pub type SharedIndicatorState = Arc<RwLock<IndicatorState>>;

/// Create a new shared indicator state
pub fn new_shared_state() -> SharedIndicatorState {
    Arc::new(RwLock::new(IndicatorState::default()))
}
