mod common;

use std::fs;
use std::sync::Arc;

use content_pipeline::cli::run_with_config;
use content_pipeline::config::EngineConfig;
use content_pipeline::model::project::{
    Node, Project, ProjectItem, PropertyProviderMut, SettingsItem, Task,
};
use content_pipeline::pipeline::{
    CancellationToken, FilterContext, GlobalSettings, NullMonitor, ProgressMonitor,
};
use content_pipeline::plugin::{Filter, FilterDescriptor, FilterError, FilterRegistry, Value};
use content_pipeline::{BuildError, BuildRequest, Builder};
use serde::Deserialize;
use serde_json::json;

use common::{add, assign, root};

fn adding_task(name: &str, a: i64, b: i64) -> Task {
    let mut task = Task::new(name);
    let x = assign(&mut task.pipeline, a);
    let y = assign(&mut task.pipeline, b);
    let root_id = add(&mut task.pipeline, x, y);
    task.pipeline.set_root(root_id);
    task
}

/// Task whose root has no node.
fn broken_task(name: &str) -> Task {
    let mut task = Task::new(name);
    task.pipeline.set_root(uuid::Uuid::new_v4());
    task
}

fn sample_project() -> Project {
    let mut project = Project::new();
    project.add_task(adding_task("Small", 1, 2));
    project.add_task(broken_task("Broken"));
    let mut disabled = adding_task("Disabled", 5, 5);
    disabled.enabled = false;
    project.add_task(disabled);
    project.add_task(adding_task("Large", 100, 200));
    project
}

fn builtins() -> Builder {
    Builder::new(Arc::new(FilterRegistry::with_builtins()))
}

#[test]
fn test_failing_task_does_not_stop_others() {
    let project = sample_project();
    let request = BuildRequest::new(root(), "/tmp/source", "/tmp/target");
    let report = builtins().build(&project, &request, &NullMonitor);

    let names: Vec<&str> = report.outcomes.iter().map(|o| o.task_name.as_str()).collect();
    assert_eq!(names, vec!["Small", "Broken", "Large"]);
    assert!(!report.is_success());
    assert_eq!(report.failures().count(), 1);
    assert!(matches!(
        report.outcome("Broken").unwrap().result,
        Err(BuildError::RootNotFound { .. })
    ));
    assert_eq!(
        report.outcome("Large").unwrap().result.as_ref().unwrap(),
        &Value::Integer(300)
    );
}

#[test]
fn test_parallel_matches_sequential() {
    let project = sample_project();
    let mut request = BuildRequest::new(root(), "/tmp/source", "/tmp/target");
    let builder = builtins();
    let sequential = builder.build(&project, &request, &NullMonitor);
    request.parallel = true;
    let parallel = builder.build(&project, &request, &NullMonitor);

    assert_eq!(sequential.outcomes.len(), parallel.outcomes.len());
    for (s, p) in sequential.outcomes.iter().zip(parallel.outcomes.iter()) {
        assert_eq!(s.task_id, p.task_id);
        assert_eq!(s.result.as_ref().ok(), p.result.as_ref().ok());
    }
}

#[test]
fn test_task_selection_by_name() {
    let project = sample_project();
    let mut request = BuildRequest::new(root(), "/tmp/source", "/tmp/target");
    request.tasks = vec!["Large".to_string(), "Missing".to_string()];
    let report = builtins().build(&project, &request, &NullMonitor);
    assert_eq!(report.outcomes.len(), 1);
    assert!(report.is_success());
}

#[test]
fn test_cancelled_build_reports_cancellation() {
    let project = sample_project();
    let request = BuildRequest::new(root(), "/tmp/source", "/tmp/target");
    let token = CancellationToken::new();
    token.cancel();
    let monitor = ProgressMonitor::new(token);

    let report = builtins().build(&project, &request, &monitor);
    assert!(report.was_cancelled());
    assert_eq!(monitor.progress(), 1.0);
}

#[derive(Deserialize, Debug, PartialEq)]
#[serde(default)]
struct Quality {
    level: i64,
}

impl Default for Quality {
    fn default() -> Self {
        Self { level: 3 }
    }
}

impl GlobalSettings for Quality {
    const KEY: &'static str = "Quality";
}

/// Outputs the `Quality` level of the build.
#[derive(Default)]
struct QualityLevel;

impl Filter for QualityLevel {
    fn descriptor(&self) -> FilterDescriptor {
        FilterDescriptor::new("QualityLevel")
    }

    fn set_input(&mut self, name: &str, _value: Value) -> Result<(), FilterError> {
        Err(FilterError::UnknownInput(name.to_string()))
    }

    fn evaluate(&mut self, context: &mut FilterContext<'_>) -> Result<Value, FilterError> {
        Ok(Value::Integer(context.settings::<Quality>()?.level))
    }
}

fn quality_project() -> Project {
    let mut project = Project::new();
    let mut task = Task::new("Quality");
    let id = task.pipeline.add_node(Node::new("QualityLevel"));
    task.pipeline.set_root(id);
    project.add_task(task);
    project
}

fn quality_level(project: &Project) -> Result<Value, BuildError> {
    let mut registry = FilterRegistry::with_builtins();
    registry.register::<QualityLevel>();
    let request = BuildRequest::new(root(), "/tmp/source", "/tmp/target");
    let mut report = Builder::new(Arc::new(registry)).build(project, &request, &NullMonitor);
    report.outcomes.remove(0).result
}

#[test]
fn test_settings_resolved_by_filter() {
    let mut project = quality_project();
    assert_eq!(quality_level(&project).unwrap(), Value::Integer(3));

    project.add_item(ProjectItem::Settings(SettingsItem::new(
        "Quality",
        json!({ "level": 9 }),
    )));
    assert_eq!(quality_level(&project).unwrap(), Value::Integer(9));

    project.add_item(ProjectItem::Settings(SettingsItem::new(
        "Quality",
        json!({ "level": "high" }),
    )));
    assert!(quality_level(&project).unwrap_err().is_plugin_failure());
}

fn write_task(file_name: &str) -> Task {
    let mut task = Task::new("Readme");
    let content = assign(&mut task.pipeline, 42);
    let mut node = Node::new("WriteTextFile");
    {
        let mut props = node.properties_mut(&root());
        props.set_array("Content", &[content.to_string()]);
        props.set_value("FileName", Some(file_name));
    }
    let id = task.pipeline.add_node(node);
    task.pipeline.set_root(id);
    task
}

#[test]
fn test_write_text_file_lands_in_target() {
    let dir = tempfile::tempdir().unwrap();
    let mut project = Project::new();
    project.add_task(write_task("docs/answer.txt"));

    let request = BuildRequest::new(root(), dir.path(), dir.path().join("out"));
    let report = builtins().build(&project, &request, &NullMonitor);
    assert!(report.is_success());
    let written = dir.path().join("out").join("docs").join("answer.txt");
    assert_eq!(fs::read_to_string(&written).unwrap(), "42");
}

#[test]
fn test_write_outside_target_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut project = Project::new();
    project.add_task(write_task("../escape.txt"));

    let request = BuildRequest::new(root(), dir.path(), dir.path().join("out"));
    let report = builtins().build(&project, &request, &NullMonitor);
    assert!(!report.is_success());
    assert!(!dir.path().join("escape.txt").exists());
}

#[test]
fn test_cli_builds_project_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut project = Project::new();
    project.add_task(write_task("answer.txt"));
    let path = dir.path().join("game.json");
    project.save_to_file(&path).unwrap();

    let args = vec![
        "content-build".to_string(),
        path.to_string_lossy().into_owned(),
        "Root".to_string(),
    ];
    run_with_config(args, EngineConfig::default()).unwrap();
    let built = dir.path().join("build").join("answer.txt");
    assert_eq!(fs::read_to_string(built).unwrap(), "42");
}

#[test]
fn test_cli_reports_failed_tasks() {
    let dir = tempfile::tempdir().unwrap();
    let project = sample_project();
    let path = dir.path().join("broken.json");
    project.save_to_file(&path).unwrap();

    let args = vec!["content-build".to_string(), path.to_string_lossy().into_owned()];
    let err = run_with_config(args, EngineConfig::default()).unwrap_err();
    assert!(err.to_string().contains("1 of 3 tasks failed"));
}
