use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::path::{DEFAULT_DELIMITER, PathCodec};

/// Physical layout of the node table.
///
/// Every component receives this value at construction. Identifiers are
/// interpolated into SQL, so [`TreeConfig::validate`] must pass before use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    pub table: String,
    pub columns: ColumnNames,
    pub delimiter: char,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnNames {
    pub id: String,
    pub parent_id: String,
    pub path: String,
    pub title: String,
    pub attributes: String,
    pub deleted_at: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            id: "Fid".into(),
            parent_id: "Fparent_id".into(),
            path: "Fpath".into(),
            title: "Ftitle".into(),
            attributes: "Fattributes".into(),
            deleted_at: "Fdeleted_at".into(),
        }
    }
}

impl ColumnNames {
    fn all(&self) -> [(&'static str, &str); 6] {
        [
            ("id", &self.id),
            ("parent_id", &self.parent_id),
            ("path", &self.path),
            ("title", &self.title),
            ("attributes", &self.attributes),
            ("deleted_at", &self.deleted_at),
        ]
    }
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            table: "t_tree".into(),
            columns: ColumnNames::default(),
            delimiter: DEFAULT_DELIMITER,
        }
    }
}

impl TreeConfig {
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Parse and validate a TOML document. Missing keys fall back to defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, CoreError> {
        let config: Self =
            toml::from_str(s).map_err(|e| CoreError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        check_identifier("table", &self.table)?;
        let columns = self.columns.all();
        for (role, name) in &columns {
            check_identifier(role, name)?;
        }
        for (i, (role, name)) in columns.iter().enumerate() {
            if let Some((other, _)) = columns[i + 1..]
                .iter()
                .find(|(_, n)| n.eq_ignore_ascii_case(name))
            {
                return Err(CoreError::InvalidConfig(format!(
                    "columns `{role}` and `{other}` share the name {name:?}"
                )));
            }
        }
        if self.delimiter.is_ascii_digit() || self.delimiter.is_whitespace() {
            return Err(CoreError::InvalidConfig(format!(
                "delimiter {:?} would be ambiguous inside a path",
                self.delimiter
            )));
        }
        Ok(())
    }

    pub fn codec(&self) -> PathCodec {
        PathCodec::new(self.delimiter)
    }
}

fn check_identifier(role: &str, name: &str) -> Result<(), CoreError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(CoreError::InvalidConfig(format!("{role} name {name:?} is not a plain identifier")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = TreeConfig::default();
        config.validate().unwrap();
        assert_eq!(config.table, "t_tree");
        assert_eq!(config.columns.path, "Fpath");
        assert_eq!(config.codec().delimiter(), '/');
    }

    #[test]
    fn toml_overrides_merge_with_defaults() {
        let config = TreeConfig::from_toml_str(
            r#"
            table = "categories"

            [columns]
            id = "category_id"
            path = "lineage"
            "#,
        )
        .unwrap();
        assert_eq!(config.table, "categories");
        assert_eq!(config.columns.id, "category_id");
        assert_eq!(config.columns.path, "lineage");
        assert_eq!(config.columns.parent_id, "Fparent_id");
        assert_eq!(config.delimiter, '/');
    }

    #[test]
    fn rejects_injection_in_identifiers() {
        let config = TreeConfig::default().with_table("t_tree; DROP TABLE x");
        assert!(matches!(config.validate(), Err(CoreError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_duplicate_columns() {
        let mut config = TreeConfig::default();
        config.columns.title = "fpath".into();
        assert!(matches!(config.validate(), Err(CoreError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_digit_delimiter() {
        let err = TreeConfig::from_toml_str("delimiter = \"1\"").unwrap_err();
        assert!(matches!(err, CoreError::InvalidConfig(_)));
    }
}
