mod common;

use content_pipeline::model::project::{
    CURRENT_VERSION, ConfigurationPath, Node, PluginReference, Project, ProjectItem,
    PropertyProvider, PropertyProviderMut, Task,
};
use content_pipeline::{BuildError, Value};
use serde_json::json;

use common::{add, assign, debug, evaluate, root};

const DOCUMENT: &str = r#"{
    "version": 3,
    "metadata": { "copyright": "Studio", "created": "2024-05-01T12:00:00Z" },
    "items": [
        {
            "kind": "Task",
            "id": "7b0c8a52-0f8c-4d8e-9d0e-8f7d1c1a0001",
            "name": "Answer",
            "pipeline": {
                "root": "7b0c8a52-0f8c-4d8e-9d0e-8f7d1c1a0003",
                "nodes": [
                    {
                        "id": "7b0c8a52-0f8c-4d8e-9d0e-8f7d1c1a0002",
                        "class_identifier": "AssignIntegerValue",
                        "configurations": [
                            { "path": "Root", "properties": { "Value": "40" } },
                            { "path": "Root.Debug", "properties": { "Value": "1" } }
                        ]
                    },
                    {
                        "id": "7b0c8a52-0f8c-4d8e-9d0e-8f7d1c1a0003",
                        "class_identifier": "SumIntegerValues",
                        "configurations": [
                            {
                                "path": "Root",
                                "properties": {
                                    "Values": [
                                        "7b0c8a52-0f8c-4d8e-9d0e-8f7d1c1a0002",
                                        "7b0c8a52-0f8c-4d8e-9d0e-8f7d1c1a0002"
                                    ]
                                }
                            }
                        ]
                    }
                ]
            }
        },
        { "kind": "Storyboard", "id": "7b0c8a52-0f8c-4d8e-9d0e-8f7d1c1a0009", "frames": [1, 2, 3] }
    ]
}"#;

#[test]
fn test_load_document_and_build() {
    let project = Project::load(DOCUMENT).unwrap();
    assert_eq!(project.metadata.copyright.as_deref(), Some("Studio"));
    assert_eq!(project.items.len(), 2);
    assert!(matches!(project.items[1], ProjectItem::Unknown(_)));

    let task = project.find_task("Answer").unwrap();
    assert_eq!(evaluate(&project, task, root()).unwrap(), Value::Integer(80));
    assert_eq!(evaluate(&project, task, debug()).unwrap(), Value::Integer(2));
}

#[test]
fn test_unknown_items_survive_round_trip() {
    let project = Project::load(DOCUMENT).unwrap();
    let saved = project.save().unwrap();
    let reloaded = Project::load(&saved).unwrap();
    assert_eq!(project, reloaded);

    let document: serde_json::Value = serde_json::from_str(&saved).unwrap();
    assert_eq!(document["items"][1]["frames"], json!([1, 2, 3]));
}

#[test]
fn test_file_round_trip_sets_base_dir() {
    let dir = tempfile::tempdir().unwrap();
    let mut project = Project::new();
    project.add_item(ProjectItem::PluginReference(PluginReference::new(
        "plugins/librandom_value_plugin.so",
    )));
    let path = dir.path().join("project.json");
    project.save_to_file(&path).unwrap();

    let loaded = Project::load_from_file(&path).unwrap();
    assert_eq!(loaded.version, CURRENT_VERSION);
    let base = dir.path().canonicalize().unwrap();
    assert_eq!(loaded.base_dir.as_deref(), Some(base.as_path()));
    assert_eq!(
        loaded.plugin_paths(),
        vec![base.join("plugins/librandom_value_plugin.so")]
    );
}

#[test]
fn test_malformed_known_item_is_an_error() {
    let json = r#"{ "version": 3, "items": [ { "kind": "Task", "name": 12 } ] }"#;
    assert!(matches!(Project::load(json), Err(BuildError::Json(_))));
    assert!(matches!(
        Project::load(r#"{ "items": [] }"#),
        Err(BuildError::Document(_))
    ));
}

#[test]
fn test_duplicated_task_is_independent() {
    let mut project = Project::new();
    let mut task = Task::new("Original");
    let a = assign(&mut task.pipeline, 2);
    let b = assign(&mut task.pipeline, 3);
    let root_id = add(&mut task.pipeline, a, b);
    task.pipeline.set_root(root_id);

    let (mut copy, ids) = task.duplicate("Copy");
    assert_ne!(copy.id, task.id);
    assert_eq!(copy.pipeline.root, Some(ids[&root_id]));
    assert!(!copy.pipeline.contains(a));

    // references point at the copied nodes
    let copied_root = copy.pipeline.node(ids[&root_id]).unwrap();
    assert_eq!(
        copied_root.properties(&root()).get_array("Value1", &[]),
        vec![ids[&a].to_string()]
    );

    copy.pipeline
        .node_mut(ids[&a])
        .unwrap()
        .properties_mut(&root())
        .set_value("Value", Some("20"));

    project.add_task(task);
    project.add_task(copy);
    let original = project.find_task("Original").unwrap();
    let copy = project.find_task("Copy").unwrap();
    assert_eq!(evaluate(&project, original, root()).unwrap(), Value::Integer(5));
    assert_eq!(evaluate(&project, copy, root()).unwrap(), Value::Integer(23));
}

#[test]
fn test_overrides_only_touch_their_layer() {
    let mut node = Node::new("AssignIntegerValue");
    node.properties_mut(&root()).set_value("Value", Some("1"));
    node.properties_mut(&debug()).set_value("Value", Some("2"));

    assert_eq!(node.properties(&root()).get_value("Value", ""), "1");
    assert_eq!(node.properties(&debug()).get_value("Value", ""), "2");
    assert!(node.properties(&debug()).contains_own("Value"));

    let release = ConfigurationPath::parse("Root.Release").unwrap();
    assert_eq!(node.properties(&release).get_value("Value", ""), "1");
    assert!(!node.properties(&release).contains_own("Value"));
}
