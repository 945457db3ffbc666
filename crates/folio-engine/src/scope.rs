//! Process-wide markup reader state and the guards that scope it.
//!
//! The markup reader keeps a global settings file and a global registry of
//! directives and roles. A build acquires [`patch_docutils`] and then
//! [`docutils_namespace`]; dropping the guards (in reverse order, also
//! while unwinding) restores whatever was there before.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, const_mutex};
use tracing::debug;

/// Reader settings file looked up in the configuration directory.
pub const SETTINGS_FILENAME: &str = "docutils.conf";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Registry {
    directives: BTreeSet<String>,
    roles: BTreeSet<String>,
}

#[derive(Debug)]
struct MarkupState {
    settings_file: Option<PathBuf>,
    registry: Registry,
}

static STATE: Mutex<MarkupState> = const_mutex(MarkupState {
    settings_file: None,
    registry: Registry {
        directives: BTreeSet::new(),
        roles: BTreeSet::new(),
    },
});

/// Restores the previous settings file on drop.
#[must_use = "the patch is undone as soon as the guard is dropped"]
#[derive(Debug)]
pub struct DocutilsPatch {
    previous: Option<PathBuf>,
}

/// Point the reader at `confdir/docutils.conf` when that file exists.
pub fn patch_docutils(confdir: Option<&Path>) -> DocutilsPatch {
    let settings = confdir
        .map(|dir| dir.join(SETTINGS_FILENAME))
        .filter(|path| path.is_file());
    if let Some(path) = &settings {
        debug!(path = %path.display(), "using reader settings file");
    }
    let previous = std::mem::replace(&mut STATE.lock().settings_file, settings);
    DocutilsPatch { previous }
}

impl Drop for DocutilsPatch {
    fn drop(&mut self) {
        STATE.lock().settings_file = self.previous.take();
    }
}

/// Restores the directive and role registry on drop.
#[must_use = "the namespace is torn down as soon as the guard is dropped"]
#[derive(Debug)]
pub struct DocutilsNamespace {
    snapshot: Registry,
}

/// Isolate directive and role registrations made until the guard drops.
pub fn docutils_namespace() -> DocutilsNamespace {
    let snapshot = STATE.lock().registry.clone();
    DocutilsNamespace { snapshot }
}

impl Drop for DocutilsNamespace {
    fn drop(&mut self) {
        STATE.lock().registry = std::mem::take(&mut self.snapshot);
    }
}

/// The settings file currently in effect.
pub fn settings_file() -> Option<PathBuf> {
    STATE.lock().settings_file.clone()
}

pub fn register_directive(name: &str) {
    STATE.lock().registry.directives.insert(name.to_string());
}

pub fn register_role(name: &str) {
    STATE.lock().registry.roles.insert(name.to_string());
}

pub fn is_directive_registered(name: &str) -> bool {
    STATE.lock().registry.directives.contains(name)
}

pub fn is_role_registered(name: &str) -> bool {
    STATE.lock().registry.roles.contains(name)
}
