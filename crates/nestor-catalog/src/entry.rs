use chrono::{DateTime, Utc};
use nestor_program::{ArgumentCodec, Arguments, NestedProgram};
use nestor_utils::error::{CatalogError, ProgramError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Catalog primary key; integer or UUID depending on the deployment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntryId {
    Number(u64),
    Text(String),
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// One stored nested program definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntryId>,
    pub title: String,
    pub entrypoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
    /// Either a JSON object or a JSON-encoded string, depending on the server version
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub arguments: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
}

impl CatalogEntry {
    /// Entry for creating `program` in the catalog
    #[must_use]
    pub fn from_program(program: &NestedProgram) -> Self {
        Self {
            id: None,
            title: program.title().to_string(),
            entrypoint: program.entrypoint().to_string(),
            working_dir: Some(program.working_dir().to_string()),
            arguments: Value::Object(program.arguments().clone()),
            description: program.description().map(str::to_string),
            version: program.version().map(str::to_string),
            created: None,
        }
    }

    fn arguments(&self) -> Result<Arguments, ProgramError> {
        match &self.arguments {
            Value::Null => Ok(Arguments::new()),
            Value::String(text) if text.trim().is_empty() => Ok(Arguments::new()),
            Value::String(text) => Ok(ArgumentCodec::decode(text)?),
            Value::Object(map) => Ok(map.clone()),
            other => Ok(ArgumentCodec::to_arguments(other)?),
        }
    }

    /// Validate the stored definition as a runnable program
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::InvalidEntry` if a required field is empty or the
    /// stored arguments are not a transport-safe mapping.
    pub fn to_program(&self) -> Result<NestedProgram, CatalogError> {
        let invalid = |source: ProgramError| CatalogError::InvalidEntry {
            title: self.title.clone(),
            source,
        };

        let mut builder = NestedProgram::builder(&self.title, &self.entrypoint)
            .arguments(self.arguments().map_err(invalid)?);
        if let Some(dir) = self.working_dir.as_deref().filter(|d| !d.is_empty()) {
            builder = builder.working_dir(dir);
        }
        if let Some(description) = &self.description {
            builder = builder.description(description);
        }
        if let Some(version) = &self.version {
            builder = builder.version(version);
        }
        builder.build().map_err(invalid)
    }
}

/// The entry created last, by `created` timestamp, falling back to list order.
pub(crate) fn newest(entries: Vec<CatalogEntry>) -> Option<CatalogEntry> {
    // `max_by_key` keeps the last maximum, so equal or missing timestamps
    // resolve to the entry listed last; the catalog lists oldest first.
    entries.into_iter().max_by_key(|entry| entry.created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nestor_utils::error::ArgumentError;
    use serde_json::json;

    fn entry(value: Value) -> CatalogEntry {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_entry_with_string_arguments() {
        let entry = entry(json!({
            "id": "5d3c0f64-6a1c-4bd6-9d55-0c77c7f0d0f1",
            "title": "simple_job",
            "entrypoint": "job.py",
            "working_dir": "/srv/resources",
            "arguments": "{\"one\": 1}",
            "version": "0.0.1",
            "created": "2023-03-01T10:00:00Z"
        }));

        let program = entry.to_program().unwrap();
        assert_eq!(program.title(), "simple_job");
        assert_eq!(program.working_dir().as_str(), "/srv/resources");
        assert_eq!(program.arguments()["one"], json!(1));
        assert_eq!(
            entry.id.unwrap().to_string(),
            "5d3c0f64-6a1c-4bd6-9d55-0c77c7f0d0f1"
        );
    }

    #[test]
    fn test_entry_with_object_arguments_and_numeric_id() {
        let entry = entry(json!({
            "id": 7,
            "title": "simple_job",
            "entrypoint": "job.py",
            "arguments": {"json": {"one": 1, "two": 2}}
        }));

        let program = entry.to_program().unwrap();
        assert_eq!(program.working_dir().as_str(), ".");
        assert_eq!(program.arguments()["json"]["two"], json!(2));
        assert_eq!(entry.id, Some(EntryId::Number(7)));
    }

    #[test]
    fn test_entry_with_non_mapping_arguments_is_invalid() {
        let entry = entry(json!({
            "title": "simple_job",
            "entrypoint": "job.py",
            "arguments": "[1, 2]"
        }));

        match entry.to_program() {
            Err(CatalogError::InvalidEntry { title, source }) => {
                assert_eq!(title, "simple_job");
                assert!(matches!(
                    source,
                    ProgramError::Argument(ArgumentError::NotAMapping { .. })
                ));
            }
            other => panic!("expected InvalidEntry, got {other:?}"),
        }
    }

    #[test]
    fn test_entry_with_empty_entrypoint_is_invalid() {
        let entry = entry(json!({"title": "simple_job", "entrypoint": ""}));
        assert!(matches!(
            entry.to_program(),
            Err(CatalogError::InvalidEntry { .. })
        ));
    }

    #[test]
    fn test_newest_prefers_created_then_order() {
        let older = entry(json!({"id": 1, "title": "t", "entrypoint": "a.py", "created": "2023-01-01T00:00:00Z"}));
        let newer = entry(json!({"id": 2, "title": "t", "entrypoint": "b.py", "created": "2023-06-01T00:00:00Z"}));
        let picked = newest(vec![newer.clone(), older.clone()]).unwrap();
        assert_eq!(picked.id, Some(EntryId::Number(2)));

        let first = entry(json!({"id": 1, "title": "t", "entrypoint": "a.py"}));
        let second = entry(json!({"id": 2, "title": "t", "entrypoint": "b.py"}));
        assert_eq!(newest(vec![first, second]).unwrap().id, Some(EntryId::Number(2)));

        assert!(newest(Vec::new()).is_none());
    }

    #[test]
    fn test_from_program_round_trips() {
        let program = NestedProgram::builder("simple_job", "job.py")
            .argument("one", &1)
            .description("description")
            .build()
            .unwrap();

        let entry = CatalogEntry::from_program(&program);
        assert_eq!(entry.to_program().unwrap(), program);
    }
}
