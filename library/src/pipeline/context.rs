//! Build-wide services handed to filters.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Component, Path, PathBuf};

use log::Level;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::error::BuildError;
use crate::model::project::{ConfigurationPath, Project};
use crate::pipeline::monitor::Monitor;

/// Settings type resolvable through [`BuildContext::settings`].
pub trait GlobalSettings: DeserializeOwned + Default {
    /// Key of the project settings item holding this type.
    const KEY: &'static str;
}

/// Log levels available to filters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    fn level(self) -> Level {
        match self {
            LogLevel::Trace => Level::Trace,
            LogLevel::Debug => Level::Debug,
            LogLevel::Info => Level::Info,
            LogLevel::Warning => Level::Warn,
            LogLevel::Error | LogLevel::Critical => Level::Error,
        }
    }
}

/// Stateless per-build environment: roots, active configuration and settings.
#[derive(Clone, Debug)]
pub struct BuildContext {
    source_root: PathBuf,
    target_root: PathBuf,
    configuration: ConfigurationPath,
    settings: HashMap<String, serde_json::Value>,
}

impl BuildContext {
    pub fn new(
        source_root: impl Into<PathBuf>,
        target_root: impl Into<PathBuf>,
        configuration: ConfigurationPath,
    ) -> Self {
        Self {
            source_root: source_root.into(),
            target_root: target_root.into(),
            configuration,
            settings: HashMap::new(),
        }
    }

    /// Take every settings item of `project`. Later items with the same key win.
    pub fn with_project_settings(mut self, project: &Project) -> Self {
        for item in project.settings() {
            self.settings.insert(item.key.clone(), item.values.clone());
        }
        self
    }

    pub fn with_setting(mut self, key: &str, values: serde_json::Value) -> Self {
        self.settings.insert(key.to_string(), values);
        self
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    pub fn target_root(&self) -> &Path {
        &self.target_root
    }

    pub fn configuration(&self) -> &ConfigurationPath {
        &self.configuration
    }

    /// Resolve settings of type `T`; an absent item yields `T::default()`.
    pub fn settings<T: GlobalSettings>(&self) -> Result<T, BuildError> {
        match self.settings.get(T::KEY) {
            Some(values) => serde_json::from_value(values.clone())
                .map_err(|e| BuildError::Settings(format!("'{}': {}", T::KEY, e))),
            None => Ok(T::default()),
        }
    }

    pub fn resolve_source(&self, relative: impl AsRef<Path>) -> Result<PathBuf, BuildError> {
        scoped(&self.source_root, relative.as_ref())
    }

    pub fn resolve_target(&self, relative: impl AsRef<Path>) -> Result<PathBuf, BuildError> {
        scoped(&self.target_root, relative.as_ref())
    }

    pub fn open_read(&self, relative: impl AsRef<Path>) -> Result<FileReadContext, BuildError> {
        let path = self.resolve_source(relative)?;
        let file = File::open(&path)?;
        Ok(FileReadContext {
            path,
            reader: BufReader::new(file),
        })
    }

    /// Create a file under the target root, creating parent directories.
    pub fn open_write(&self, relative: impl AsRef<Path>) -> Result<FileWriteContext, BuildError> {
        let path = self.resolve_target(relative)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(&path)?;
        Ok(FileWriteContext {
            path,
            writer: BufWriter::new(file),
        })
    }
}

/// Join `relative` onto `root`, refusing to leave the root.
fn scoped(root: &Path, relative: &Path) -> Result<PathBuf, BuildError> {
    let mut resolved = root.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            _ => {
                return Err(BuildError::InvalidArgument(format!(
                    "{} escapes {}",
                    relative.display(),
                    root.display()
                )));
            }
        }
    }
    Ok(resolved)
}

/// Buffered reader over a file below the source root.
pub struct FileReadContext {
    path: PathBuf,
    reader: BufReader<File>,
}

impl FileReadContext {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read_to_string(&mut self) -> io::Result<String> {
        let mut text = String::new();
        self.reader.read_to_string(&mut text)?;
        Ok(text)
    }
}

impl Read for FileReadContext {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

/// Buffered writer over a file below the target root.
pub struct FileWriteContext {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl FileWriteContext {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush and close, returning the written path.
    pub fn finish(mut self) -> io::Result<PathBuf> {
        self.writer.flush()?;
        Ok(self.path)
    }
}

impl Write for FileWriteContext {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// What a filter sees while it computes.
pub struct FilterContext<'a> {
    node: Uuid,
    class_identifier: &'a str,
    monitor: &'a dyn Monitor,
    build: &'a BuildContext,
}

impl<'a> FilterContext<'a> {
    pub fn new(
        node: Uuid,
        class_identifier: &'a str,
        monitor: &'a dyn Monitor,
        build: &'a BuildContext,
    ) -> Self {
        Self {
            node,
            class_identifier,
            monitor,
            build,
        }
    }

    pub fn node(&self) -> Uuid {
        self.node
    }

    pub fn build(&self) -> &BuildContext {
        self.build
    }

    /// Monitor scoped to this node, for handing to invoked templates.
    pub fn monitor(&self) -> &dyn Monitor {
        self.monitor
    }

    pub fn report_progress(&self, progress: f32) {
        self.monitor.report(progress);
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.monitor.is_cancel_requested()
    }

    pub fn settings<T: GlobalSettings>(&self) -> Result<T, BuildError> {
        self.build.settings::<T>()
    }

    pub fn open_read(&self, relative: impl AsRef<Path>) -> Result<FileReadContext, BuildError> {
        self.build.open_read(relative)
    }

    pub fn open_write(&self, relative: impl AsRef<Path>) -> Result<FileWriteContext, BuildError> {
        self.build.open_write(relative)
    }

    pub fn log(&self, level: LogLevel, message: &str) {
        if level == LogLevel::Critical {
            log::log!(
                target: "filter",
                level.level(),
                "[critical] {} {}: {}",
                self.class_identifier,
                self.node,
                message
            );
        } else {
            log::log!(
                target: "filter",
                level.level(),
                "{} {}: {}",
                self.class_identifier,
                self.node,
                message
            );
        }
    }

    pub fn trace(&self, message: &str) {
        self.log(LogLevel::Trace, message);
    }

    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    pub fn warning(&self, message: &str) {
        self.log(LogLevel::Warning, message);
    }

    pub fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }

    pub fn critical(&self, message: &str) {
        self.log(LogLevel::Critical, message);
    }
}
