//! Mapper configuration.

use crate::naming::{NamingFn, snake_case};

/// Configuration for [`Mapper`](crate::Mapper).
#[derive(Debug, Clone)]
pub struct MapperConfig {
    /// Tag key holding an explicit column name (`"-"` skips the field).
    pub tag_key: String,
    /// Tag key holding write directives (`omit`, `omitZero`, ...).
    pub options_key: String,
    /// Naming convention applied to fields without an explicit column name.
    pub naming: NamingFn,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            tag_key: "db".to_string(),
            options_key: "pgload".to_string(),
            naming: snake_case,
        }
    }
}

impl MapperConfig {
    /// Create a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the column name tag key.
    pub fn tag_key(mut self, key: impl Into<String>) -> Self {
        self.tag_key = key.into();
        self
    }

    /// Set the directive tag key.
    pub fn options_key(mut self, key: impl Into<String>) -> Self {
        self.options_key = key.into();
        self
    }

    /// Set the naming convention.
    pub fn naming(mut self, naming: NamingFn) -> Self {
        self.naming = naming;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::verbatim;

    #[test]
    fn defaults() {
        let config = MapperConfig::default();
        assert_eq!(config.tag_key, "db");
        assert_eq!(config.options_key, "pgload");
        assert_eq!((config.naming)("FirstName"), "first_name");
    }

    #[test]
    fn builder_overrides() {
        let config = MapperConfig::new()
            .tag_key("sql")
            .options_key("load")
            .naming(verbatim);
        assert_eq!(config.tag_key, "sql");
        assert_eq!(config.options_key, "load");
        assert_eq!((config.naming)("FirstName"), "FirstName");
    }
}
