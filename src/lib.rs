//! touchpadd Library
//!
//! Public API for testing and integration.

pub mod coalesce;
pub mod command;
pub mod dbus;
pub mod engine;
pub mod hotplug;
pub mod indicator;
pub mod notification;
pub mod settings;
pub mod sysconf;
pub mod xinput;

/// Re-export commonly used types
pub use coalesce::Coalesce;
pub use dbus::{init_dbus_service, TouchpadService, DBUS_INTERFACE, DBUS_NAME, DBUS_PATH};
pub use engine::{Engine, EngineEvent, UiEvent};
pub use hotplug::{HotplugWatcher, PlugEvent, DEV_INPUT};
pub use indicator::{new_shared_state, IndicatorState, SharedIndicatorState, ICON_DISABLED, ICON_ENABLED};
pub use notification::Notifier;
pub use settings::{
    default_config_path, ConfigWatcher, ExtensionConfig, ExtensionSettings, SettingKey,
    SwitchMethod,
};
pub use sysconf::{spawn_monitor, SendEvents, SystemSettings, KEY_SEND_EVENTS, TOUCHPAD_SCHEMA};
pub use xinput::{DeviceClass, DeviceControl, PointingDevice, XinputDriver};
