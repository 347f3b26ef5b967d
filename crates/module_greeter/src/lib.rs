use module_system::properties::{DescribeFields, FieldDescriptor, TypeTag};
use module_system::{Module, ModuleSystemError, PropertyHolder};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

const DEFAULT_MESSAGE: &str = "Hello from the greeter module";

// ============================================================================
// Sample Module: Greeter
// ============================================================================

/// Greeting settings shared with other modules through a property holder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Greeting {
    pub message: String,
    pub times_enabled: u32,
}

impl DescribeFields for Greeting {
    fn fields() -> &'static [FieldDescriptor] {
        const FIELDS: &[FieldDescriptor] = &[
            FieldDescriptor::new("message", TypeTag::Text, true),
            FieldDescriptor::new("times_enabled", TypeTag::Integer, false),
        ];
        FIELDS
    }
}

/// A simple module that greets on enable and says goodbye on disable.
pub struct GreeterModule {
    properties: PropertyHolder,
    times_enabled: u32,
}

impl GreeterModule {
    pub fn new() -> Self {
        info!("🎉 GreeterModule: Creating new instance");
        let properties = PropertyHolder::for_entity::<Greeting>();
        if let Err(e) = properties.set_property("message", DEFAULT_MESSAGE.to_string()) {
            warn!("GreeterModule: could not store greeting: {}", e);
        }
        Self {
            properties,
            times_enabled: 0,
        }
    }

    /// The current greeting.
    pub fn greeting(&self) -> Greeting {
        Greeting {
            message: self
                .properties
                .get_value::<String>("message")
                .ok()
                .flatten()
                .map(|message| message.as_str().to_string())
                .unwrap_or_else(|| DEFAULT_MESSAGE.to_string()),
            times_enabled: self.times_enabled,
        }
    }

    pub fn properties(&self) -> &PropertyHolder {
        &self.properties
    }
}

impl Default for GreeterModule {
    fn default() -> Self {
        Self::new()
    }
}

impl Module for GreeterModule {
    fn enable(&mut self) -> Result<(), ModuleSystemError> {
        self.times_enabled += 1;
        let greeting = self.greeting();
        info!("👋 GreeterModule: {}", greeting.message);
        debug!("GreeterModule enabled {} time(s)", greeting.times_enabled);
        Ok(())
    }

    fn disable(&mut self) -> Result<(), ModuleSystemError> {
        info!("👋 GreeterModule: Goodbye!");
        Ok(())
    }
}

module_system::export_module!(create_greeter, GreeterModule::new);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enable_counts_and_greets() {
        let mut module = GreeterModule::new();
        module.enable().unwrap();
        module.enable().unwrap();

        let greeting = module.greeting();
        assert_eq!(greeting.message, "Hello from the greeter module");
        assert_eq!(greeting.times_enabled, 2);
        assert!(module.disable().is_ok());
        assert!(module.is_reloadable());
    }

    #[test]
    fn test_greeting_follows_shared_property() {
        let mut module = GreeterModule::new();
        module
            .properties()
            .set_property("message", "Welcome back".to_string())
            .unwrap();
        module.enable().unwrap();
        assert_eq!(module.greeting().message, "Welcome back");
    }

    #[test]
    fn test_only_mutable_fields_get_slots() {
        let module = GreeterModule::new();
        assert_eq!(module.properties().names(), vec!["message".to_string()]);
    }

    #[test]
    fn test_exported_constructor_builds_a_module() {
        let raw = unsafe { create_greeter() };
        assert!(!raw.is_null());
        let mut module = unsafe { Box::from_raw(raw) };
        assert!(module.enable().is_ok());
    }
}
