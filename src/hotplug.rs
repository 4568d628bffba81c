//! Mouse hotplug watcher
//!
//! Watches `/dev/input` for device nodes appearing and disappearing.
//! Only paths containing "mouse" matter, and only creation/removal event
//! kinds; everything else (attribute changes, access events, unrelated
//! devices) is ignored. Matching events are forwarded to the engine,
//! which decides whether the touchpad should auto-toggle.

use std::path::Path;

use notify::event::EventKind;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::engine::EngineEvent;

/// Directory where the kernel exposes input device nodes
pub const DEV_INPUT: &str = "/dev/input";

/// A mouse device node appeared or disappeared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlugEvent {
    Added,
    Removed,
}

/// Owns the `/dev/input` watch; dropping it cancels the subscription.
pub struct HotplugWatcher {
    _watcher: RecommendedWatcher,
}

impl HotplugWatcher {
    /// Start watching `/dev/input` and forward mouse plug events.
    pub fn spawn(events: mpsc::UnboundedSender<EngineEvent>) -> Result<Self, notify::Error> {
        Self::spawn_at(Path::new(DEV_INPUT), events)
    }

    fn spawn_at(
        dir: &Path,
        events: mpsc::UnboundedSender<EngineEvent>,
    ) -> Result<Self, notify::Error> {
        let mut watcher = notify::recommended_watcher(
            move |res: Result<notify::Event, notify::Error>| match res {
                Ok(event) => {
                    if let Some(plug) = classify_event(&event) {
                        tracing::debug!(?plug, paths = ?event.paths, "Mouse device node change");
                        let _ = events.send(EngineEvent::MousePlug(plug));
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Device watch error");
                }
            },
        )?;
        watcher.watch(dir, RecursiveMode::NonRecursive)?;

        tracing::info!(dir = %dir.display(), "Watching for mouse hotplug");
        Ok(Self { _watcher: watcher })
    }
}

/// Map a filesystem event to a plug event, if it concerns a mouse node.
pub fn classify_event(event: &notify::Event) -> Option<PlugEvent> {
    let plug = match event.kind {
        EventKind::Create(_) => PlugEvent::Added,
        EventKind::Remove(_) => PlugEvent::Removed,
        _ => return None,
    };

    let mouse = event
        .paths
        .iter()
        .any(|p| p.to_string_lossy().contains("mouse"));
    if mouse {
        Some(plug)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, ModifyKind, RemoveKind};
    use std::path::PathBuf;

    fn event(kind: EventKind, path: &str) -> notify::Event {
        let mut ev = notify::Event::new(kind);
        ev.paths.push(PathBuf::from(path));
        ev
    }

    #[test]
    fn test_mouse_created_is_added() {
        let ev = event(EventKind::Create(CreateKind::File), "/dev/input/mouse0");
        assert_eq!(classify_event(&ev), Some(PlugEvent::Added));
    }

    #[test]
    fn test_mouse_removed_is_removed() {
        let ev = event(EventKind::Remove(RemoveKind::File), "/dev/input/mouse0");
        assert_eq!(classify_event(&ev), Some(PlugEvent::Removed));
    }

    #[test]
    fn test_non_mouse_paths_ignored() {
        let ev = event(EventKind::Create(CreateKind::File), "/dev/input/event7");
        assert_eq!(classify_event(&ev), None);
    }

    #[test]
    fn test_other_event_kinds_ignored() {
        let ev = event(
            EventKind::Modify(ModifyKind::Any),
            "/dev/input/mouse0",
        );
        assert_eq!(classify_event(&ev), None);
        let ev = event(EventKind::Access(notify::event::AccessKind::Any), "/dev/input/mouse0");
        assert_eq!(classify_event(&ev), None);
    }
}
