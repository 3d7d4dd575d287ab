//! Bridge between schema classes and Rust types.
//!
//! Schemas come from `schemars`, and resolved values deserialize back into
//! the type with `serde`.

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{Result, SchemaClass};

impl SchemaClass {
    /// Build a facade whose schema is generated from `C`.
    ///
    /// # Errors
    ///
    /// Fails when the generated schema uses constructs the tree cannot
    /// represent, or when `value` does not fit it.
    pub fn for_type<C: JsonSchema>(value: Value, fallbacks: Vec<Value>) -> Result<Self> {
        let schema = schemars::schema_for!(C);
        let schema_json = serde_json::to_value(&schema)?;
        trace!("generated schema for {}: {schema_json}", std::any::type_name::<C>());
        Self::with_fallbacks(&schema_json, value, fallbacks)
    }

    /// Deserialize the resolved value, fallback and default values included.
    ///
    /// # Errors
    ///
    /// [`SchemaError::Json`](crate::SchemaError::Json) when the value does
    /// not fit `C`.
    pub fn to_typed<C: DeserializeOwned>(&self) -> Result<C> {
        let value = self.value().unwrap_or(Value::Null);
        Ok(serde_json::from_value(value)?)
    }
}

#[cfg(test)]
mod tests {
    use schemars::JsonSchema;
    use serde::Deserialize;
    use serde_json::json;

    use super::*;
    use crate::{NodeType, SchemaError};

    #[derive(Debug, Deserialize, JsonSchema, PartialEq)]
    #[serde(rename_all = "kebab-case")]
    enum Profile {
        Debug,
        Release,
    }

    #[derive(Debug, Deserialize, JsonSchema, PartialEq)]
    struct Build {
        profile: Profile,
        features: Vec<String>,
    }

    /// Project settings.
    #[derive(Debug, Deserialize, JsonSchema, PartialEq)]
    struct Project {
        /// Crate to build.
        name: String,
        jobs: Option<u32>,
        build: Build,
    }

    #[test]
    fn test_for_type() {
        let class = SchemaClass::for_type::<Project>(
            json!({ "name": "kernel", "build": { "profile": "release", "features": ["smp"] } }),
            vec![json!({ "jobs": 4 })],
        )
        .unwrap();

        assert_eq!(class.type_of("name").unwrap(), Some(NodeType::String));
        assert_eq!(class.type_of("jobs").unwrap(), Some(NodeType::Integer));
        assert_eq!(class.type_of("build.profile").unwrap(), Some(NodeType::Enum));
        assert_eq!(class.type_of("build.features").unwrap(), Some(NodeType::Array));
        assert!(class.property("name").unwrap().required);
        assert!(!class.property("jobs").unwrap().required);
        assert_eq!(
            class.node("name").unwrap().unwrap().description(),
            Some("Crate to build.")
        );

        let project: Project = class.to_typed().unwrap();
        assert_eq!(
            project,
            Project {
                name: "kernel".into(),
                jobs: Some(4),
                build: Build {
                    profile: Profile::Release,
                    features: vec!["smp".into()],
                },
            }
        );
    }

    #[test]
    fn test_to_typed_reports_missing_fields() {
        let class = SchemaClass::for_type::<Project>(json!({ "name": "kernel" }), Vec::new()).unwrap();
        let err = class.to_typed::<Project>().unwrap_err();
        assert!(matches!(err, SchemaError::Json(_)));
    }
}
