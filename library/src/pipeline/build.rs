//! Runs every enabled task of a project.

use std::path::PathBuf;
use std::sync::Arc;

use log::{error, info, warn};
use rayon::prelude::*;
use uuid::Uuid;

use crate::error::BuildError;
use crate::model::project::{ConfigurationPath, Project, Task};
use crate::pipeline::context::BuildContext;
use crate::pipeline::evaluator::PipelineEvaluator;
use crate::pipeline::monitor::{Monitor, SubMonitor};
use crate::plugin::registry::FilterRegistry;
use crate::plugin::value::Value;

/// Inputs of one build.
#[derive(Clone, Debug)]
pub struct BuildRequest {
    pub configuration: ConfigurationPath,
    pub source_root: PathBuf,
    pub target_root: PathBuf,
    /// Run tasks on the rayon pool instead of one after another.
    pub parallel: bool,
    /// Restrict the build to these task names. Empty means all.
    pub tasks: Vec<String>,
}

impl BuildRequest {
    pub fn new(
        configuration: ConfigurationPath,
        source_root: impl Into<PathBuf>,
        target_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            configuration,
            source_root: source_root.into(),
            target_root: target_root.into(),
            parallel: false,
            tasks: Vec::new(),
        }
    }
}

#[derive(Debug)]
pub struct TaskOutcome {
    pub task_id: Uuid,
    pub task_name: String,
    pub result: Result<Value, BuildError>,
}

#[derive(Debug, Default)]
pub struct BuildReport {
    pub outcomes: Vec<TaskOutcome>,
}

impl BuildReport {
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &TaskOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }

    pub fn outcome(&self, task_name: &str) -> Option<&TaskOutcome> {
        self.outcomes.iter().find(|o| o.task_name == task_name)
    }

    pub fn was_cancelled(&self) -> bool {
        self.outcomes
            .iter()
            .any(|o| matches!(&o.result, Err(e) if e.is_cancelled()))
    }
}

pub struct Builder {
    registry: Arc<FilterRegistry>,
}

impl Builder {
    pub fn new(registry: Arc<FilterRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<FilterRegistry> {
        &self.registry
    }

    /// Build every selected, enabled task. A failing task does not stop the
    /// others; outcomes are reported in document order.
    pub fn build(
        &self,
        project: &Project,
        request: &BuildRequest,
        monitor: &dyn Monitor,
    ) -> BuildReport {
        let context = Arc::new(
            BuildContext::new(
                &request.source_root,
                &request.target_root,
                request.configuration.clone(),
            )
            .with_project_settings(project),
        );

        let tasks: Vec<&Task> = project
            .tasks()
            .filter(|task| {
                if !task.enabled {
                    info!("Skipping disabled task '{}'", task.name);
                    return false;
                }
                request.tasks.is_empty() || request.tasks.contains(&task.name)
            })
            .collect();
        for name in &request.tasks {
            if project.find_task(name).is_none() {
                warn!("Requested task '{}' does not exist", name);
            }
        }

        info!(
            "Building {} tasks under {}",
            tasks.len(),
            request.configuration
        );
        let count = tasks.len();
        let run = |(index, task): (usize, &&Task)| {
            let sub = SubMonitor::part(monitor, index, count);
            let result = self.build_task(project, task, &request.configuration, &context, &sub);
            match &result {
                Ok(_) => info!("Task '{}' succeeded", task.name),
                Err(e) if e.is_cancelled() => warn!("Task '{}' cancelled", task.name),
                Err(e) => error!("Task '{}' failed: {}", task.name, e),
            }
            TaskOutcome {
                task_id: task.id,
                task_name: task.name.clone(),
                result,
            }
        };

        let outcomes = if request.parallel {
            tasks.par_iter().enumerate().map(run).collect()
        } else {
            tasks.iter().enumerate().map(run).collect()
        };
        monitor.report(1.0);
        BuildReport { outcomes }
    }

    /// Set up and evaluate one task.
    pub fn build_task(
        &self,
        project: &Project,
        task: &Task,
        configuration: &ConfigurationPath,
        context: &Arc<BuildContext>,
        monitor: &dyn Monitor,
    ) -> Result<Value, BuildError> {
        if monitor.is_cancel_requested() {
            return Err(BuildError::Cancelled);
        }
        let mut evaluator = PipelineEvaluator::for_task(
            task,
            configuration.clone(),
            Arc::clone(&self.registry),
            Arc::clone(context),
        );
        evaluator.set_up(project, &task.pipeline)?;
        evaluator.evaluate(monitor, &[])
    }
}
