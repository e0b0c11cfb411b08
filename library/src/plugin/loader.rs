//! Loading filter plugins from dynamic libraries.
//!
//! A plugin is a `cdylib` exporting `create_filter_plugin`. Modules are
//! checked before they are opened: anything belonging to the host runtime or
//! built for another architecture is rejected.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use libloading::{Library, Symbol};
use log::{debug, info, warn};

use crate::error::BuildError;
use crate::model::project::{PluginReference, Project};
use crate::plugin::filter::{FilterPlugin, FilterPluginCreateFn};
use crate::plugin::registry::FilterRegistry;

const CREATE_SYMBOL: &[u8] = b"create_filter_plugin";
const HEADER_LIMIT: u64 = 64 * 1024;

/// Description of a loaded plugin module.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PluginHandle {
    pub path: PathBuf,
    pub plugin_id: String,
    pub name: String,
    pub version: (u32, u32, u32),
    pub filters: Vec<String>,
}

struct LoadedModule {
    handle: PluginHandle,
    // Dropped before `library`, which owns its vtable.
    _plugin: Arc<dyn FilterPlugin>,
    _library: Arc<Library>,
}

#[derive(Default)]
struct LoaderState {
    modules: HashMap<PathBuf, LoadedModule>,
    load_order: Vec<PathBuf>,
    dependencies: Vec<Library>,
    /// Dependency name → path it was resolved to.
    probe_cache: HashMap<String, PathBuf>,
}

/// Result of loading every plugin a project declares.
#[derive(Debug, Default)]
pub struct PluginLoadReport {
    pub loaded: Vec<PluginHandle>,
    pub failed: Vec<(PathBuf, BuildError)>,
}

impl PluginLoadReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct PluginLoader {
    search_paths: Vec<PathBuf>,
    state: Mutex<LoaderState>,
}

impl PluginLoader {
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        Self {
            search_paths,
            state: Mutex::new(LoaderState::default()),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, LoaderState>, BuildError> {
        self.state
            .lock()
            .map_err(|_| BuildError::plugin("plugin loader state poisoned"))
    }

    /// Load the plugin at `path` and register its filters.
    ///
    /// Loading the same canonical path twice returns the first handle.
    pub fn load(
        &self,
        path: &Path,
        registry: &mut FilterRegistry,
    ) -> Result<PluginHandle, BuildError> {
        let canonical = path.canonicalize().map_err(|e| {
            BuildError::plugin(format!("Cannot resolve plugin {}: {}", path.display(), e))
        })?;

        let mut state = self.lock()?;
        if let Some(module) = state.modules.get(&canonical) {
            debug!("Plugin {} already loaded", canonical.display());
            return Ok(module.handle.clone());
        }

        check_module(&canonical)?;

        let library = Arc::new(unsafe { Library::new(&canonical)? });
        let plugin: Arc<dyn FilterPlugin> = unsafe {
            let constructor: Symbol<FilterPluginCreateFn> = library.get(CREATE_SYMBOL)?;
            let raw = constructor();
            if raw.is_null() {
                return Err(BuildError::plugin(format!(
                    "Plugin constructor in {} returned null",
                    canonical.display()
                )));
            }
            Arc::from(Box::from_raw(raw))
        };

        let filters = registry.register_plugin(plugin.as_ref());
        registry.attach_library(&filters, &library);

        let handle = PluginHandle {
            path: canonical.clone(),
            plugin_id: plugin.id().to_string(),
            name: plugin.name(),
            version: plugin.version(),
            filters,
        };
        info!(
            "Loaded plugin '{}' {:?} from {} ({} filters)",
            handle.plugin_id,
            handle.version,
            canonical.display(),
            handle.filters.len()
        );

        state.load_order.push(canonical.clone());
        state.modules.insert(
            canonical,
            LoadedModule {
                handle: handle.clone(),
                _plugin: plugin,
                _library: library,
            },
        );
        Ok(handle)
    }

    /// Load a project's plugin reference: its declared dependencies first,
    /// then the plugin itself.
    pub fn load_reference(
        &self,
        reference: &PluginReference,
        project_dir: Option<&Path>,
        registry: &mut FilterRegistry,
    ) -> Result<PluginHandle, BuildError> {
        let mut path = reference.resolve_path(project_dir);
        if !path.exists() {
            if let Some(found) = self.find_in_search_paths(&path) {
                debug!("Plugin {} found at {}", path.display(), found.display());
                path = found;
            }
        }

        let plugin_dir = path.parent().filter(|dir| !dir.as_os_str().is_empty());
        for dependency in &reference.dependencies {
            self.resolve_dependency_near(dependency, plugin_dir)?;
        }

        let handle = self.load(&path, registry)?;
        if let Some(expected) = &reference.version {
            let (major, minor, patch) = handle.version;
            let actual = format!("{}.{}.{}", major, minor, patch);
            if &actual != expected {
                warn!(
                    "Plugin '{}' is version {}, project expects {}",
                    handle.plugin_id, actual, expected
                );
            }
        }
        Ok(handle)
    }

    /// Load every plugin reference of `project`. Failures are logged and
    /// collected; the filters they would provide fall back to placeholders.
    pub fn load_project_plugins(
        &self,
        project: &Project,
        registry: &mut FilterRegistry,
    ) -> PluginLoadReport {
        let mut report = PluginLoadReport::default();
        let project_dir = project.base_dir.as_deref();
        for reference in project.plugin_references() {
            match self.load_reference(reference, project_dir, registry) {
                Ok(handle) => report.loaded.push(handle),
                Err(e) => {
                    warn!("Failed to load plugin {}: {}", reference.path.display(), e);
                    report.failed.push((reference.path.clone(), e));
                }
            }
        }
        report
    }

    /// Make the dependency module `name` available to plugins.
    ///
    /// The platform loader is tried first. On failure every probe directory
    /// is tried in order and the first loadable candidate wins.
    pub fn resolve_dependency(&self, name: &str) -> Result<PathBuf, BuildError> {
        self.resolve_dependency_near(name, None)
    }

    /// Like [`resolve_dependency`](Self::resolve_dependency), probing
    /// `plugin_dir` right after the configured search paths.
    fn resolve_dependency_near(
        &self,
        name: &str,
        plugin_dir: Option<&Path>,
    ) -> Result<PathBuf, BuildError> {
        let mut state = self.lock()?;
        if let Some(path) = state.probe_cache.get(name) {
            return Ok(path.clone());
        }

        match unsafe { open_global(Path::new(name)) } {
            Ok(library) => {
                debug!("Dependency '{}' resolved by the platform loader", name);
                state.dependencies.push(library);
                state.probe_cache.insert(name.to_string(), PathBuf::from(name));
                return Ok(PathBuf::from(name));
            }
            Err(e) => debug!("Platform loader could not open '{}': {}", name, e),
        }

        let directories = self.probe_directories_locked(&state, plugin_dir);
        for directory in &directories {
            let candidate = directory.join(name);
            if !candidate.is_file() {
                continue;
            }
            if let Err(e) = check_module(&candidate) {
                warn!("Skipping {}: {}", candidate.display(), e);
                continue;
            }
            match unsafe { open_global(&candidate) } {
                Ok(library) => {
                    info!("Dependency '{}' loaded from {}", name, directory.display());
                    state.dependencies.push(library);
                    state.probe_cache.insert(name.to_string(), candidate.clone());
                    return Ok(candidate);
                }
                Err(e) => warn!("Failed to load {}: {}", candidate.display(), e),
            }
        }

        Err(BuildError::plugin(format!(
            "Dependency '{}' not found in {} probe directories",
            name,
            directories.len()
        )))
    }

    /// Configured search paths, then the directories of loaded plugins in
    /// load order, without duplicates.
    pub fn probe_directories(&self) -> Vec<PathBuf> {
        match self.lock() {
            Ok(state) => self.probe_directories_locked(&state, None),
            Err(_) => self.search_paths.clone(),
        }
    }

    fn probe_directories_locked(
        &self,
        state: &LoaderState,
        plugin_dir: Option<&Path>,
    ) -> Vec<PathBuf> {
        let mut directories: Vec<PathBuf> = Vec::new();
        let loaded_dirs = state
            .load_order
            .iter()
            .filter_map(|p| p.parent().map(Path::to_path_buf));
        let candidates = self
            .search_paths
            .iter()
            .cloned()
            .chain(plugin_dir.map(Path::to_path_buf))
            .chain(loaded_dirs);
        for directory in candidates {
            if !directories.contains(&directory) {
                directories.push(directory);
            }
        }
        directories
    }

    fn find_in_search_paths(&self, path: &Path) -> Option<PathBuf> {
        let file_name = path.file_name()?;
        self.search_paths
            .iter()
            .map(|dir| dir.join(file_name))
            .find(|candidate| candidate.is_file())
    }

    pub fn loaded(&self) -> Vec<PluginHandle> {
        match self.lock() {
            Ok(state) => state
                .load_order
                .iter()
                .filter_map(|p| state.modules.get(p).map(|m| m.handle.clone()))
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}

#[cfg(unix)]
unsafe fn open_global(path: &Path) -> Result<Library, libloading::Error> {
    use libloading::os::unix::{Library as UnixLibrary, RTLD_GLOBAL, RTLD_NOW};
    unsafe { UnixLibrary::open(Some(path), RTLD_NOW | RTLD_GLOBAL) }.map(Library::from)
}

#[cfg(not(unix))]
unsafe fn open_global(path: &Path) -> Result<Library, libloading::Error> {
    unsafe { Library::new(path) }
}

/// Reject modules that must not be loaded as plugins.
pub fn check_module(path: &Path) -> Result<(), BuildError> {
    if is_host_runtime_module(path) {
        return Err(BuildError::plugin(format!(
            "{} belongs to the host runtime",
            path.display()
        )));
    }

    let mut header = Vec::new();
    File::open(path)?.take(HEADER_LIMIT).read_to_end(&mut header)?;
    match module_architecture(&header) {
        Some(arch) if arch == "universal" || arch == std::env::consts::ARCH => Ok(()),
        Some(arch) => Err(BuildError::plugin(format!(
            "{} targets {}, host is {}",
            path.display(),
            arch,
            std::env::consts::ARCH
        ))),
        None => Err(BuildError::plugin(format!(
            "{} is not a recognised module format",
            path.display()
        ))),
    }
}

/// True for the running executable and Rust runtime libraries.
pub fn is_host_runtime_module(path: &Path) -> bool {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    if let Ok(exe) = std::env::current_exe().and_then(|p| p.canonicalize()) {
        if exe == canonical {
            return true;
        }
    }

    let Some(stem) = canonical.file_stem().and_then(|s| s.to_str()) else {
        return false;
    };
    let stem = stem.to_ascii_lowercase();
    let stem = stem.strip_prefix("lib").unwrap_or(&stem);
    ["std", "test", "rustc_driver"]
        .iter()
        .any(|name| has_hash_suffix(stem, name))
        || ["c.so", "vcruntime", "ucrtbase"]
            .iter()
            .any(|prefix| stem.starts_with(prefix))
        || stem == "c"
        || stem == "msvcrt"
}

/// `name-<hex hash>`, the file stem rustc gives its runtime dylibs.
fn has_hash_suffix(stem: &str, name: &str) -> bool {
    stem.strip_prefix(name)
        .and_then(|rest| rest.strip_prefix('-'))
        .is_some_and(|hash| !hash.is_empty() && hash.chars().all(|c| c.is_ascii_hexdigit()))
}

fn u16_at(bytes: &[u8], offset: usize, little_endian: bool) -> Option<u16> {
    let raw: [u8; 2] = bytes.get(offset..offset + 2)?.try_into().ok()?;
    Some(if little_endian {
        u16::from_le_bytes(raw)
    } else {
        u16::from_be_bytes(raw)
    })
}

fn u32_at(bytes: &[u8], offset: usize, little_endian: bool) -> Option<u32> {
    let raw: [u8; 4] = bytes.get(offset..offset + 4)?.try_into().ok()?;
    Some(if little_endian {
        u32::from_le_bytes(raw)
    } else {
        u32::from_be_bytes(raw)
    })
}

/// Architecture named in an ELF, PE or Mach-O header, using the names of
/// `std::env::consts::ARCH`. Fat Mach-O binaries report `"universal"`.
pub fn module_architecture(header: &[u8]) -> Option<&'static str> {
    if header.starts_with(b"\x7fELF") {
        let little_endian = *header.get(5)? == 1;
        return match u16_at(header, 18, little_endian)? {
            0x03 => Some("x86"),
            0x28 => Some("arm"),
            0x3E => Some("x86_64"),
            0xB7 => Some("aarch64"),
            0xF3 => Some("riscv64"),
            _ => None,
        };
    }

    if header.starts_with(b"MZ") {
        let pe_offset = u32_at(header, 0x3C, true)? as usize;
        if header.get(pe_offset..pe_offset + 4)? != b"PE\0\0" {
            return None;
        }
        return match u16_at(header, pe_offset + 4, true)? {
            0x014C => Some("x86"),
            0x8664 => Some("x86_64"),
            0xAA64 => Some("aarch64"),
            0x01C4 => Some("arm"),
            _ => None,
        };
    }

    match u32_at(header, 0, true)? {
        0xFEED_FACF | 0xFEED_FACE => match u32_at(header, 4, true)? {
            0x0100_0007 => Some("x86_64"),
            0x0100_000C => Some("aarch64"),
            0x0000_0007 => Some("x86"),
            0x0000_000C => Some("arm"),
            _ => None,
        },
        0xBEBA_FECA => Some("universal"),
        _ => None,
    }
}
