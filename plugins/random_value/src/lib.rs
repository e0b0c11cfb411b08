use content_pipeline::pipeline::FilterContext;
use content_pipeline::plugin::{
    Filter, FilterDescriptor, FilterError, FilterPlugin, FilterRegistry, InputDescriptor, Plugin,
    Value, ValueType, integer_input,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub struct RandomValuePlugin;

impl Plugin for RandomValuePlugin {
    fn id(&self) -> &'static str {
        "random_value_plugin"
    }

    fn name(&self) -> String {
        "Random Value".to_string()
    }

    fn version(&self) -> (u32, u32, u32) {
        (0, 1, 0)
    }
}

impl FilterPlugin for RandomValuePlugin {
    fn register(&self, registry: &mut FilterRegistry) {
        registry.register::<RandomIntegerValue>();
    }
}

/// Deterministic pseudo-random integer in `[Minimum, Maximum]` for a seed.
pub struct RandomIntegerValue {
    seed: i64,
    minimum: i64,
    maximum: i64,
}

impl Default for RandomIntegerValue {
    fn default() -> Self {
        Self {
            seed: 0,
            minimum: 0,
            maximum: 100,
        }
    }
}

impl Filter for RandomIntegerValue {
    fn descriptor(&self) -> FilterDescriptor {
        FilterDescriptor::new("RandomIntegerValue")
            .with_title("Random Integer")
            .with_format("random({Minimum}..{Maximum})")
            .with_input(InputDescriptor::value("Seed", ValueType::Integer).with_default("0"))
            .with_input(InputDescriptor::value("Minimum", ValueType::Integer).with_default("0"))
            .with_input(InputDescriptor::value("Maximum", ValueType::Integer).with_default("100"))
    }

    fn set_input(&mut self, name: &str, value: Value) -> Result<(), FilterError> {
        match name {
            "Seed" => self.seed = integer_input(name, &value)?,
            "Minimum" => self.minimum = integer_input(name, &value)?,
            "Maximum" => self.maximum = integer_input(name, &value)?,
            _ => return Err(FilterError::UnknownInput(name.to_string())),
        }
        Ok(())
    }

    fn evaluate(&mut self, _context: &mut FilterContext<'_>) -> Result<Value, FilterError> {
        if self.minimum > self.maximum {
            return Err(FilterError::message(format!(
                "Minimum {} exceeds Maximum {}",
                self.minimum, self.maximum
            )));
        }
        let mut rng = StdRng::seed_from_u64(self.seed as u64);
        Ok(Value::Integer(rng.gen_range(self.minimum..=self.maximum)))
    }
}

#[allow(improper_ctypes_definitions)]
#[no_mangle]
pub extern "C" fn create_filter_plugin() -> *mut dyn FilterPlugin {
    let plugin: Box<dyn FilterPlugin> = Box::new(RandomValuePlugin);
    Box::into_raw(plugin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use content_pipeline::model::project::ConfigurationPath;
    use content_pipeline::pipeline::{BuildContext, NullMonitor};

    fn sample(seed: i64) -> Value {
        let build = BuildContext::new("/tmp", "/tmp", ConfigurationPath::root());
        let monitor = NullMonitor;
        let mut context =
            FilterContext::new(Default::default(), "RandomIntegerValue", &monitor, &build);
        let mut filter = RandomIntegerValue::default();
        filter.set_input("Seed", Value::Integer(seed)).unwrap();
        filter.set_input("Minimum", Value::Integer(10)).unwrap();
        filter.set_input("Maximum", Value::Integer(20)).unwrap();
        filter.evaluate(&mut context).unwrap()
    }

    #[test]
    fn test_same_seed_same_value() {
        let first = sample(42);
        assert_eq!(first, sample(42));
        let value = first.as_i64().unwrap();
        assert!((10..=20).contains(&value));
    }

    #[test]
    fn test_plugin_registers_filter() {
        let mut registry = FilterRegistry::new();
        let keys = registry.register_plugin(&RandomValuePlugin);
        assert_eq!(keys, vec!["RandomIntegerValue".to_string()]);
    }
}
