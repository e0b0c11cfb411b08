//! Filters shipped with the engine.

mod arithmetic;
mod template;
mod text;

pub use arithmetic::{AddIntegerValues, AssignIntegerValue, SumIntegerValues};
pub use template::InvokeTemplate;
pub use text::{WriteTextFile, render_text};

use crate::plugin::registry::FilterRegistry;

pub fn register_builtins(registry: &mut FilterRegistry) {
    registry.register::<AssignIntegerValue>();
    registry.register::<AddIntegerValues>();
    registry.register::<SumIntegerValues>();
    registry.register::<WriteTextFile>();
    registry.register::<InvokeTemplate>();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::project::ConfigurationPath;
    use crate::pipeline::context::{BuildContext, FilterContext};
    use crate::pipeline::monitor::NullMonitor;
    use crate::plugin::filter::{Filter, FilterError};
    use crate::plugin::value::Value;
    use uuid::Uuid;

    fn run(filter: &mut dyn Filter, build: &BuildContext) -> Result<Value, FilterError> {
        let monitor = NullMonitor;
        let mut context = FilterContext::new(Uuid::new_v4(), "Test", &monitor, build);
        filter.evaluate(&mut context)
    }

    fn build_context(root: &std::path::Path) -> BuildContext {
        BuildContext::new(root, root, ConfigurationPath::root())
    }

    #[test]
    fn test_add_requires_both_inputs() {
        let build = build_context(std::path::Path::new("/tmp"));
        let mut add = AddIntegerValues::default();
        add.set_input("Value1", Value::Integer(5)).unwrap();
        assert!(matches!(run(&mut add, &build), Err(FilterError::MissingInput(_))));
        add.set_input("Value2", Value::Integer(7)).unwrap();
        assert_eq!(run(&mut add, &build).unwrap(), Value::Integer(12));
        assert!(add.set_input("Value3", Value::Integer(1)).is_err());
        assert!(add.set_input("Value1", Value::from("5")).is_err());
    }

    #[test]
    fn test_sum_handles_overflow() {
        let build = build_context(std::path::Path::new("/tmp"));
        let mut sum = SumIntegerValues::default();
        assert_eq!(run(&mut sum, &build).unwrap(), Value::Integer(0));
        sum.set_input("Values", Value::Array(vec![Value::Integer(i64::MAX), Value::Integer(1)]))
            .unwrap();
        assert!(run(&mut sum, &build).is_err());
    }

    #[test]
    fn test_write_text_file_and_preview() {
        let dir = tempfile::tempdir().unwrap();
        let build = build_context(dir.path());
        let mut write = WriteTextFile::default();
        write.set_input("Content", Value::Array(vec![Value::Integer(1), Value::from("two")]))
            .unwrap();
        write.set_input("FileName", Value::from("out/result.txt")).unwrap();

        let monitor = NullMonitor;
        let mut context = FilterContext::new(Uuid::new_v4(), "WriteTextFile", &monitor, &build);
        let previewed = write.preview(&mut context).unwrap();
        assert!(!dir.path().join("out/result.txt").exists());

        let written = write.evaluate(&mut context).unwrap();
        assert_eq!(written, previewed);
        let text = std::fs::read_to_string(dir.path().join("out/result.txt")).unwrap();
        assert_eq!(text, "1\ntwo");
    }
}
