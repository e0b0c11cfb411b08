use std::io::Write;
use std::path::PathBuf;

use crate::pipeline::context::FilterContext;
use crate::plugin::filter::{Filter, FilterDescriptor, FilterError, InputDescriptor};
use crate::plugin::value::{Value, ValueType};

/// Text rendering of scalar values and arrays of them, one item per line.
pub fn render_text(value: &Value) -> Option<String> {
    match value {
        Value::Text(s) => Some(s.clone()),
        Value::Integer(i) => Some(i.to_string()),
        Value::Float(f) => Some(f.to_string()),
        Value::Boolean(b) => Some(b.to_string()),
        Value::Date(d) => Some(d.to_rfc3339()),
        Value::Path(p) => Some(p.to_string_lossy().into_owned()),
        Value::Array(items) => items
            .iter()
            .map(render_text)
            .collect::<Option<Vec<_>>>()
            .map(|lines| lines.join("\n")),
        Value::None | Value::Object(_) | Value::Pipeline(_) => None,
    }
}

/// Writes the output of its `Content` node to a file below the target root.
#[derive(Default)]
pub struct WriteTextFile {
    content: Option<Value>,
    file_name: Option<PathBuf>,
}

impl WriteTextFile {
    fn target(&self) -> Result<&PathBuf, FilterError> {
        self.file_name
            .as_ref()
            .ok_or_else(|| FilterError::MissingInput("FileName".to_string()))
    }
}

impl Filter for WriteTextFile {
    fn descriptor(&self) -> FilterDescriptor {
        FilterDescriptor::new("WriteTextFile")
            .with_title("Write Text File")
            .with_format("Write {FileName}")
            .with_input(InputDescriptor::node("Content"))
            .with_input(InputDescriptor::value("FileName", ValueType::FilePath))
    }

    fn set_input(&mut self, name: &str, value: Value) -> Result<(), FilterError> {
        match name {
            "Content" => self.content = Some(value),
            "FileName" => {
                self.file_name = Some(
                    value
                        .as_path()
                        .ok_or_else(|| FilterError::input_type(name, ValueType::FilePath, &value))?,
                )
            }
            _ => return Err(FilterError::UnknownInput(name.to_string())),
        }
        Ok(())
    }

    fn evaluate(&mut self, context: &mut FilterContext<'_>) -> Result<Value, FilterError> {
        let target = self.target()?.clone();
        let content = self
            .content
            .as_ref()
            .ok_or_else(|| FilterError::MissingInput("Content".to_string()))?;
        let text = render_text(content)
            .ok_or_else(|| FilterError::input_type("Content", "text", content))?;

        let mut file = context.open_write(&target)?;
        file.write_all(text.as_bytes())?;
        let written = file.finish()?;
        context.info(&format!("Wrote {} bytes to {}", text.len(), written.display()));
        Ok(Value::Path(written))
    }

    /// Reports the path without touching the file system.
    fn preview(&mut self, context: &mut FilterContext<'_>) -> Result<Value, FilterError> {
        let target = self.target()?;
        Ok(Value::Path(context.build().resolve_target(target)?))
    }
}
