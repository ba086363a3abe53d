//! Tracker configuration.
//!
//! Names the designated type/key properties and the properties the
//! walker must never track. Loads from TOML text or is built in code;
//! unknown keys are rejected.

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct TrackerConfig {
    /// Property carrying the logical type tag of an object.
    pub type_property: String,
    /// Property carrying the identity payload of an object.
    pub key_property: String,
    /// Additional properties to exclude from walking and diffing.
    pub ignored_properties: Vec<String>,
    /// Endpoint for the load/save collaborator; unused by the engine.
    pub service_endpoint: Option<String>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            type_property: "_type".to_owned(),
            key_property: "_key".to_owned(),
            ignored_properties: Vec::new(),
            service_endpoint: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse tracker config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("`{field}` must not be empty")]
    EmptyProperty { field: &'static str },
    #[error("`type_property` and `key_property` must differ, both are `{name}`")]
    PropertyClash { name: String },
}

impl TrackerConfig {
    pub fn from_toml_str(text: &str) -> Result<TrackerConfig, ConfigError> {
        let config: TrackerConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.type_property.is_empty() {
            return Err(ConfigError::EmptyProperty {
                field: "type_property",
            });
        }
        if self.key_property.is_empty() {
            return Err(ConfigError::EmptyProperty {
                field: "key_property",
            });
        }
        if self.type_property == self.key_property {
            return Err(ConfigError::PropertyClash {
                name: self.type_property.clone(),
            });
        }
        Ok(())
    }

    /// Reserved names carry tracker metadata and are never walked.
    pub fn is_reserved(&self, name: &str) -> bool {
        name == self.type_property || name == self.key_property
    }

    /// Whether discovery and diffing must skip this property.
    pub fn is_ignored(&self, name: &str) -> bool {
        self.is_reserved(name) || self.ignored_properties.iter().any(|ignored| ignored == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_underscore_metadata_names() {
        let config = TrackerConfig::default();
        assert_eq!(config.type_property, "_type");
        assert_eq!(config.key_property, "_key");
        assert!(config.ignored_properties.is_empty());
        assert!(config.service_endpoint.is_none());
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let config = TrackerConfig::from_toml_str(
            r#"
            ignored_properties = ["cache", "ui_state"]
            service_endpoint = "mem://golf"
            "#,
        )
        .expect("config should parse");

        assert_eq!(config.type_property, "_type");
        assert_eq!(config.ignored_properties, vec!["cache", "ui_state"]);
        assert_eq!(config.service_endpoint.as_deref(), Some("mem://golf"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = TrackerConfig::from_toml_str("tracked_property = \"x\"")
            .expect_err("unknown key must fail");
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn clashing_metadata_names_are_rejected() {
        let err = TrackerConfig::from_toml_str(
            "type_property = \"meta\"\nkey_property = \"meta\"\n",
        )
        .expect_err("clash must fail");
        assert!(matches!(err, ConfigError::PropertyClash { name } if name == "meta"));
    }

    #[test]
    fn ignored_covers_reserved_and_listed_names() {
        let config = TrackerConfig {
            ignored_properties: vec!["cache".to_owned()],
            ..TrackerConfig::default()
        };

        assert!(config.is_ignored("_type"));
        assert!(config.is_ignored("_key"));
        assert!(config.is_ignored("cache"));
        assert!(!config.is_ignored("name"));
    }
}
