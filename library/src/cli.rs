//! `content-build` command line entry.

use std::path::PathBuf;
use std::sync::Arc;

use log::{error, info};

use crate::config::{EngineConfig, load_config};
use crate::error::BuildError;
use crate::model::project::{ConfigurationPath, Project};
use crate::pipeline::build::{BuildRequest, Builder};
use crate::pipeline::monitor::{CancellationToken, LogMonitor};
use crate::plugin::loader::PluginLoader;
use crate::plugin::registry::FilterRegistry;

const USAGE: &str = "Usage: content-build <project.json> [configuration] [source-dir] \
    [target-dir] [--parallel] [--task <name>]...";

#[derive(Debug, PartialEq)]
struct Arguments {
    project: PathBuf,
    configuration: Option<String>,
    source: Option<PathBuf>,
    target: Option<PathBuf>,
    parallel: bool,
    tasks: Vec<String>,
}

fn parse_arguments(args: &[String]) -> Result<Arguments, BuildError> {
    let mut positional = Vec::new();
    let mut parallel = false;
    let mut tasks = Vec::new();
    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--parallel" => parallel = true,
            "--task" => match iter.next() {
                Some(name) => tasks.push(name.clone()),
                None => return Err(BuildError::InvalidArgument("--task needs a name".into())),
            },
            flag if flag.starts_with("--") => {
                return Err(BuildError::InvalidArgument(format!(
                    "unknown option {}\n{}",
                    flag, USAGE
                )));
            }
            value => positional.push(value.to_string()),
        }
    }

    if positional.is_empty() || positional.len() > 4 {
        return Err(BuildError::InvalidArgument(USAGE.to_string()));
    }
    let mut positional = positional.into_iter();
    Ok(Arguments {
        project: positional.next().map(PathBuf::from).unwrap_or_default(),
        configuration: positional.next(),
        source: positional.next().map(PathBuf::from),
        target: positional.next().map(PathBuf::from),
        parallel,
        tasks,
    })
}

/// Build a project from command line arguments (`args[0]` is the program).
pub fn run(args: Vec<String>) -> Result<(), BuildError> {
    run_with_config(args, load_config())
}

pub fn run_with_config(args: Vec<String>, config: EngineConfig) -> Result<(), BuildError> {
    let arguments = parse_arguments(&args)?;
    let project = Project::load_from_file(&arguments.project)?;
    let project_dir = project.base_dir.clone().unwrap_or_else(|| PathBuf::from("."));

    let configuration = match &arguments.configuration {
        Some(path) => ConfigurationPath::parse(path)?,
        None => config.default_configuration.clone(),
    };
    let source = arguments.source.unwrap_or_else(|| project_dir.clone());
    let target = arguments.target.unwrap_or_else(|| project_dir.join("build"));

    let mut registry = FilterRegistry::with_builtins();
    let loader = PluginLoader::new(config.plugin_search_paths.clone());
    let plugins = loader.load_project_plugins(&project, &mut registry);
    info!(
        "{} plugins loaded, {} failed, {} filter types available",
        plugins.loaded.len(),
        plugins.failed.len(),
        registry.filter_types().len()
    );

    let mut request = BuildRequest::new(configuration, source, target);
    request.parallel = arguments.parallel || config.parallel_tasks;
    request.tasks = arguments.tasks;

    let builder = Builder::new(Arc::new(registry));
    let monitor = LogMonitor::new(CancellationToken::new());
    let report = builder.build(&project, &request, &monitor);

    let failed = report.failures().count();
    if failed > 0 {
        for outcome in report.failures() {
            if let Err(e) = &outcome.result {
                error!("{}: {}", outcome.task_name, e);
            }
        }
        return Err(BuildError::runtime(format!(
            "{} of {} tasks failed",
            failed,
            report.outcomes.len()
        )));
    }
    info!("Build finished: {} tasks", report.outcomes.len());
    Ok(())
}
