use camino::{Utf8Path, Utf8PathBuf};
use nestor_utils::error::{ArgumentError, ProgramError};
use serde::Serialize;
use std::path::PathBuf;
use tracing::debug;

use crate::codec::{ArgumentCodec, Arguments};

/// Immutable description of a unit of work.
///
/// Constructed through [`NestedProgram::builder`]; a value of this type always
/// has a non-empty title and entrypoint and transport-safe arguments.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NestedProgram {
    title: String,
    entrypoint: String,
    working_dir: Utf8PathBuf,
    arguments: Arguments,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<String>,
}

impl NestedProgram {
    /// Start building a program with the two required fields.
    pub fn builder(title: impl Into<String>, entrypoint: impl Into<String>) -> NestedProgramBuilder {
        NestedProgramBuilder {
            title: title.into(),
            entrypoint: entrypoint.into(),
            working_dir: None,
            arguments: Arguments::new(),
            description: None,
            version: None,
            error: None,
        }
    }

    /// Job name and catalog key
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Path of the executable artifact, relative to [`working_dir`](Self::working_dir)
    #[must_use]
    pub fn entrypoint(&self) -> &str {
        &self.entrypoint
    }

    #[must_use]
    pub fn working_dir(&self) -> &Utf8Path {
        &self.working_dir
    }

    #[must_use]
    pub fn arguments(&self) -> &Arguments {
        &self.arguments
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Arguments in their wire encoding.
    pub fn encoded_arguments(&self) -> Result<String, ArgumentError> {
        ArgumentCodec::encode(&self.arguments)
    }
}

/// Builder for [`NestedProgram`].
///
/// Setter failures are remembered and reported by [`build`](Self::build), so a
/// chain of setters needs only one `?`.
#[derive(Debug, Clone)]
#[must_use]
pub struct NestedProgramBuilder {
    title: String,
    entrypoint: String,
    working_dir: Option<Utf8PathBuf>,
    arguments: Arguments,
    description: Option<String>,
    version: Option<String>,
    error: Option<ProgramError>,
}

impl NestedProgramBuilder {
    pub fn working_dir(mut self, dir: impl Into<Utf8PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Set the working directory from a platform path, which must be UTF-8.
    pub fn working_dir_path(mut self, dir: impl Into<PathBuf>) -> Self {
        match Utf8PathBuf::from_path_buf(dir.into()) {
            Ok(dir) => self.working_dir = Some(dir),
            Err(dir) => self.fail(ProgramError::NonUtf8WorkingDir(dir.display().to_string())),
        }
        self
    }

    /// Replace all arguments.
    pub fn arguments(mut self, arguments: Arguments) -> Self {
        self.arguments = arguments;
        self
    }

    /// Replace all arguments with a serializable value that forms a mapping.
    pub fn arguments_from<T: ?Sized + Serialize>(mut self, value: &T) -> Self {
        match ArgumentCodec::to_arguments(value) {
            Ok(arguments) => self.arguments = arguments,
            Err(err) => self.fail(err.into()),
        }
        self
    }

    /// Add one argument; a later call with the same key replaces the value.
    pub fn argument<T: ?Sized + Serialize>(mut self, key: impl Into<String>, value: &T) -> Self {
        let key = key.into();
        match ArgumentCodec::to_value(&key, value) {
            Ok(value) => {
                self.arguments.insert(key, value);
            }
            Err(err) => self.fail(err.into()),
        }
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    fn fail(&mut self, err: ProgramError) {
        self.error.get_or_insert(err);
    }

    /// Validate and freeze the program.
    pub fn build(self) -> Result<NestedProgram, ProgramError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        if self.title.trim().is_empty() {
            return Err(ProgramError::EmptyField { field: "title" });
        }
        if self.entrypoint.trim().is_empty() {
            return Err(ProgramError::EmptyField {
                field: "entrypoint",
            });
        }
        ArgumentCodec::validate(&self.arguments)?;

        let working_dir = self.working_dir.unwrap_or_else(|| Utf8PathBuf::from("."));
        debug!(
            title = %self.title,
            entrypoint = %self.entrypoint,
            working_dir = %working_dir,
            arguments = self.arguments.len(),
            "Built nested program"
        );

        Ok(NestedProgram {
            title: self.title,
            entrypoint: self.entrypoint,
            working_dir,
            arguments: self.arguments,
            description: self.description,
            version: self.version,
        })
    }
}
