//! Pointing device enumeration and switching via the `xinput` tool
//!
//! `xinput list` output is parsed into classified pointing devices;
//! individual devices are flipped with `xinput --enable/--disable <id>`.
//! A missing or failing tool degrades to "no devices found" and no-op
//! switching, never an error: the engine's touchpad-absence invariant
//! compensates for the rest.

use crate::command::run_command;

/// Classification used to filter enumeration and switching
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceClass {
    Touchpad,
    Mouse,
    Trackpoint,
}

impl DeviceClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceClass::Touchpad => "touchpad",
            DeviceClass::Mouse => "mouse",
            DeviceClass::Trackpoint => "trackpoint",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "touchpad" => Some(DeviceClass::Touchpad),
            "mouse" => Some(DeviceClass::Mouse),
            "trackpoint" => Some(DeviceClass::Trackpoint),
            _ => None,
        }
    }
}

impl std::fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One attached pointing device as reported by `xinput list`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointingDevice {
    /// xinput device id
    pub id: u32,
    /// Device name as reported by the X server
    pub name: String,
    pub class: DeviceClass,
}

/// Device-level enumeration and switching.
///
/// The engine only talks to this trait; production uses [`XinputDriver`],
/// tests substitute a recording fake.
pub trait DeviceControl: Send {
    /// Current devices of `class`; empty when the tool is unavailable
    fn list(&self, class: DeviceClass) -> Vec<PointingDevice>;

    /// Enable every device of `class`
    fn enable_all(&self, class: DeviceClass);

    /// Set every device of `class` to `enabled`
    fn switch_all(&self, class: DeviceClass, enabled: bool);

    /// Whether any device of `class` is currently attached
    fn is_present(&self, class: DeviceClass) -> bool {
        !self.list(class).is_empty()
    }
}

/// Name fragments identifying a touchpad
const TOUCHPAD_NAMES: &[&str] = &[
    "touchpad",
    "glidepoint",
    "fingersensingpad",
    "bcm5974",
    "trackpad",
    "smartpad",
];

/// Name fragments identifying a trackpoint-style stick
const TRACKPOINT_NAMES: &[&str] = &[
    "trackpoint",
    "accu point",
    "trackstick",
    "touchstyk",
    "pointing stick",
    "dualpoint stick",
];

/// Name fragments identifying a mouse
const MOUSE_NAMES: &[&str] = &["mouse"];

/// The production [`DeviceControl`] implementation
pub struct XinputDriver;

impl XinputDriver {
    pub fn new() -> Self {
        Self
    }

    /// Whether the `xinput` tool can run at all. Checked once at startup.
    pub fn probe() -> bool {
        run_command("xinput", &["list"]).is_some()
    }

    /// All classified pointing devices currently attached
    pub fn list_all(&self) -> Vec<PointingDevice> {
        match run_command("xinput", &["list"]) {
            Some(output) => parse_device_list(&output),
            None => {
                tracing::warn!("xinput list failed, reporting no devices");
                Vec::new()
            }
        }
    }

    fn set_device(&self, device: &PointingDevice, enabled: bool) {
        let id = device.id.to_string();
        let flag = if enabled { "--enable" } else { "--disable" };
        if run_command("xinput", &[flag, &id]).is_none() {
            tracing::warn!(id = device.id, name = %device.name, flag, "xinput switch failed");
        } else {
            tracing::debug!(id = device.id, name = %device.name, enabled, "Device switched");
        }
    }
}

impl Default for XinputDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceControl for XinputDriver {
    fn list(&self, class: DeviceClass) -> Vec<PointingDevice> {
        self.list_all()
            .into_iter()
            .filter(|d| d.class == class)
            .collect()
    }

    fn enable_all(&self, class: DeviceClass) {
        for device in self.list(class) {
            self.set_device(&device, true);
        }
    }

    fn switch_all(&self, class: DeviceClass, enabled: bool) {
        for device in self.list(class) {
            self.set_device(&device, enabled);
        }
    }
}

/// Parse `xinput list` output into classified slave pointing devices.
///
/// Master virtual pointers and XTEST devices are skipped; unclassifiable
/// names (keyboards, tablets) are dropped.
pub fn parse_device_list(output: &str) -> Vec<PointingDevice> {
    let mut devices = Vec::new();

    for line in output.lines() {
        if line.contains("master") || line.contains("XTEST") {
            continue;
        }
        let (name, rest) = match line.split_once("id=") {
            Some(parts) => parts,
            None => continue,
        };

        let id: u32 = match rest
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect::<String>()
            .parse()
        {
            Ok(id) => id,
            Err(_) => continue,
        };

        let name = name
            .trim_matches(|c: char| c.is_whitespace() || "⎡⎜⎣↳∼".contains(c))
            .to_string();

        if let Some(class) = classify(&name) {
            devices.push(PointingDevice { id, name, class });
        }
    }

    devices
}

/// Classify a device by its reported name.
///
/// Touchpad and trackpoint fragments are checked before "mouse" so names
/// like "TPPS/2 IBM TrackPoint Mouse" land in the right class.
pub fn classify(name: &str) -> Option<DeviceClass> {
    let lower = name.to_lowercase();
    if TOUCHPAD_NAMES.iter().any(|n| lower.contains(n)) {
        return Some(DeviceClass::Touchpad);
    }
    if TRACKPOINT_NAMES.iter().any(|n| lower.contains(n)) {
        return Some(DeviceClass::Trackpoint);
    }
    if MOUSE_NAMES.iter().any(|n| lower.contains(n)) {
        return Some(DeviceClass::Mouse);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
⎡ Virtual core pointer                    \tid=2\t[master pointer  (3)]
⎜   ↳ Virtual core XTEST pointer              \tid=4\t[slave  pointer  (2)]
⎜   ↳ SynPS/2 Synaptics TouchPad              \tid=12\t[slave  pointer  (2)]
⎜   ↳ Logitech USB Optical Mouse              \tid=10\t[slave  pointer  (2)]
⎜   ↳ TPPS/2 IBM TrackPoint                   \tid=13\t[slave  pointer  (2)]
⎣ Virtual core keyboard                   \tid=3\t[master keyboard (2)]
    ↳ Virtual core XTEST keyboard             \tid=5\t[slave  keyboard (3)]
    ↳ AT Translated Set 2 keyboard            \tid=11\t[slave  keyboard (3)]
";

    #[test]
    fn test_parse_sample_output() {
        let devices = parse_device_list(SAMPLE);
        assert_eq!(devices.len(), 3);

        assert_eq!(devices[0].id, 12);
        assert_eq!(devices[0].name, "SynPS/2 Synaptics TouchPad");
        assert_eq!(devices[0].class, DeviceClass::Touchpad);

        assert_eq!(devices[1].id, 10);
        assert_eq!(devices[1].class, DeviceClass::Mouse);

        assert_eq!(devices[2].id, 13);
        assert_eq!(devices[2].class, DeviceClass::Trackpoint);
    }

    #[test]
    fn test_parse_skips_masters_and_xtest() {
        let devices = parse_device_list(SAMPLE);
        assert!(devices.iter().all(|d| d.id != 2 && d.id != 4));
    }

    #[test]
    fn test_parse_empty_output() {
        assert!(parse_device_list("").is_empty());
        assert!(parse_device_list("garbage without ids\n").is_empty());
    }

    #[test]
    fn test_classify_touchpads() {
        assert_eq!(classify("SynPS/2 Synaptics TouchPad"), Some(DeviceClass::Touchpad));
        assert_eq!(classify("Apple Inc. bcm5974"), Some(DeviceClass::Touchpad));
        assert_eq!(classify("ALPS GlidePoint"), Some(DeviceClass::Touchpad));
    }

    #[test]
    fn test_classify_trackpoint_beats_mouse() {
        // A stick that also says "mouse" is still a trackpoint
        assert_eq!(
            classify("TPPS/2 IBM TrackPoint Mouse"),
            Some(DeviceClass::Trackpoint)
        );
        assert_eq!(classify("AlpsPS/2 ALPS DualPoint Stick"), Some(DeviceClass::Trackpoint));
    }

    #[test]
    fn test_classify_mice_and_others() {
        assert_eq!(classify("Logitech USB Optical Mouse"), Some(DeviceClass::Mouse));
        assert_eq!(classify("AT Translated Set 2 keyboard"), None);
        assert_eq!(classify("Wacom Intuos Pad"), None);
    }

    #[test]
    fn test_class_round_trip() {
        for class in [DeviceClass::Touchpad, DeviceClass::Mouse, DeviceClass::Trackpoint] {
            assert_eq!(DeviceClass::parse(class.as_str()), Some(class));
        }
        assert_eq!(DeviceClass::parse("keyboard"), None);
    }
}
