//! Shared property caches.
//!
//! Properties travel in serialized form and are decoded lazily into a typed
//! value on first access. A decoded value may be an instance of a type that
//! lives in a module's boundary, so the registry resets every decoded value
//! whenever a module is unloaded; the next access decodes again from the
//! serialized form.

use crate::error::ModuleSystemError;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::Any;
use std::sync::Arc;

/// A collection of cached shared values the registry can reset.
pub trait SharedStateCollection: Send + Sync {
    /// Drops every decoded value, keeping the serialized forms.
    fn reset_cached_properties(&self);
}

/// A serialized value plus its lazily decoded form.
pub struct SharedProperty {
    serialized: RwLock<serde_json::Value>,
    decoded: RwLock<Option<Arc<dyn Any + Send + Sync>>>,
}

impl SharedProperty {
    pub fn new(serialized: serde_json::Value) -> Self {
        Self {
            serialized: RwLock::new(serialized),
            decoded: RwLock::new(None),
        }
    }

    pub fn from_value<T>(value: T) -> Result<Self, ModuleSystemError>
    where
        T: Serialize + Send + Sync + 'static,
    {
        let property = Self::new(serde_json::Value::Null);
        property.set(value)?;
        Ok(property)
    }

    pub fn set<T>(&self, value: T) -> Result<(), ModuleSystemError>
    where
        T: Serialize + Send + Sync + 'static,
    {
        let serialized = serde_json::to_value(&value)?;
        *self.serialized.write() = serialized;
        let decoded: Arc<dyn Any + Send + Sync> = Arc::new(value);
        *self.decoded.write() = Some(decoded);
        Ok(())
    }

    /// Returns the decoded value, decoding from the serialized form when the
    /// cache is empty or holds a different type.
    pub fn get<T>(&self) -> Result<Arc<T>, ModuleSystemError>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        if let Some(decoded) = self.decoded.read().as_ref() {
            if let Ok(value) = Arc::clone(decoded).downcast::<T>() {
                return Ok(value);
            }
        }

        let value: Arc<T> = Arc::new(serde_json::from_value(self.serialized())?);
        *self.decoded.write() = Some(value.clone() as Arc<dyn Any + Send + Sync>);
        Ok(value)
    }

    pub fn serialized(&self) -> serde_json::Value {
        self.serialized.read().clone()
    }

    pub fn is_decoded(&self) -> bool {
        self.decoded.read().is_some()
    }

    pub fn reset(&self) {
        *self.decoded.write() = None;
    }
}

/// Kind of value a declared field holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    Bool,
    Integer,
    Float,
    Text,
    List,
    Map,
    /// A structured value, named by its type.
    Object(&'static str),
}

/// One statically declared field of an entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub type_tag: TypeTag,
    pub mutable: bool,
}

impl FieldDescriptor {
    pub const fn new(name: &'static str, type_tag: TypeTag, mutable: bool) -> Self {
        Self {
            name,
            type_tag,
            mutable,
        }
    }
}

/// Entity types that publish their fields as a static table.
///
/// ```ignore
/// impl DescribeFields for ServiceGroup {
///     fn fields() -> &'static [FieldDescriptor] {
///         const FIELDS: &[FieldDescriptor] = &[
///             FieldDescriptor::new("name", TypeTag::Text, false),
///             FieldDescriptor::new("maxMemory", TypeTag::Integer, true),
///         ];
///         FIELDS
///     }
/// }
/// ```
pub trait DescribeFields {
    fn fields() -> &'static [FieldDescriptor];

    fn field(name: &str) -> Option<&'static FieldDescriptor> {
        Self::fields().iter().find(|field| field.name == name)
    }
}

/// Named shared properties.
#[derive(Default)]
pub struct PropertyHolder {
    properties: DashMap<String, Arc<SharedProperty>>,
}

impl PropertyHolder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a holder with an empty slot for every mutable field of `T`.
    pub fn for_entity<T: DescribeFields>() -> Self {
        let holder = Self::new();
        for field in T::fields().iter().filter(|field| field.mutable) {
            holder.properties.insert(
                field.name.to_string(),
                Arc::new(SharedProperty::new(serde_json::Value::Null)),
            );
        }
        holder
    }

    pub fn set_property<T>(&self, name: &str, value: T) -> Result<Arc<SharedProperty>, ModuleSystemError>
    where
        T: Serialize + Send + Sync + 'static,
    {
        if let Some(property) = self.property(name) {
            property.set(value)?;
            return Ok(property);
        }
        let property = Arc::new(SharedProperty::from_value(value)?);
        self.properties.insert(name.to_string(), Arc::clone(&property));
        Ok(property)
    }

    pub fn property(&self, name: &str) -> Option<Arc<SharedProperty>> {
        self.properties.get(name).map(|entry| Arc::clone(entry.value()))
    }

    pub fn get_value<T>(&self, name: &str) -> Result<Option<Arc<T>>, ModuleSystemError>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        self.property(name).map(|property| property.get::<T>()).transpose()
    }

    pub fn remove_property(&self, name: &str) -> Option<Arc<SharedProperty>> {
        self.properties.remove(name).map(|(_, property)| property)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.properties.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }
}

impl SharedStateCollection for PropertyHolder {
    fn reset_cached_properties(&self) {
        for entry in self.properties.iter() {
            entry.value().reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Layout {
        lines: Vec<String>,
    }

    struct ServiceGroup;

    impl DescribeFields for ServiceGroup {
        fn fields() -> &'static [FieldDescriptor] {
            const FIELDS: &[FieldDescriptor] = &[
                FieldDescriptor::new("name", TypeTag::Text, false),
                FieldDescriptor::new("maxMemory", TypeTag::Integer, true),
                FieldDescriptor::new("layout", TypeTag::Object("Layout"), true),
            ];
            FIELDS
        }
    }

    #[test]
    fn test_decoded_value_survives_until_reset() {
        let holder = PropertyHolder::new();
        let layout = Layout {
            lines: vec!["Lobby".to_string()],
        };
        let property = holder.set_property("layout", layout.clone()).unwrap();
        assert!(property.is_decoded());

        holder.reset_cached_properties();
        assert!(!property.is_decoded());

        let decoded = holder.get_value::<Layout>("layout").unwrap().unwrap();
        assert_eq!(*decoded, layout);
        assert!(property.is_decoded());
    }

    #[test]
    fn test_get_with_other_type_decodes_again() {
        let property = SharedProperty::from_value(42u32).unwrap();
        assert_eq!(*property.get::<u64>().unwrap(), 42);
        assert!(property.get::<Layout>().is_err());
    }

    #[test]
    fn test_holder_for_entity_uses_static_field_table() {
        let holder = PropertyHolder::for_entity::<ServiceGroup>();
        assert_eq!(holder.names(), vec!["layout", "maxMemory"]);
        assert_eq!(
            ServiceGroup::field("maxMemory").map(|field| field.type_tag),
            Some(TypeTag::Integer)
        );
        assert!(ServiceGroup::field("unknown").is_none());
        assert_eq!(holder.get_value::<Option<u64>>("maxMemory").unwrap(), Some(Arc::new(None)));
        assert_eq!(holder.get_value::<u64>("missing").unwrap(), None);
    }
}
