//! Schema parser (verb module)
//!
//! Transforms YAML files into a sealed [`Registry`] and a [`CompilerConfig`].

use serde::Deserialize;
use std::path::Path;

use crate::config::CompilerConfig;
use crate::error::ParseError;
use crate::semantic_model::{Cube, Registry};

/// Top-level layout of a schema file
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SchemaFile {
    cubes: Vec<Cube>,
}

/// Parse a cube schema from a YAML file
pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Registry, ParseError> {
    parse_str(&read(path.as_ref())?)
}

/// Parse a cube schema from a YAML string and seal it into a registry
pub fn parse_str(yaml: &str) -> Result<Registry, ParseError> {
    let file: SchemaFile = serde_yaml::from_str(yaml)?;
    let registry = file
        .cubes
        .into_iter()
        .fold(Registry::builder(), |builder, cube| builder.cube(cube))
        .build()?;
    Ok(registry)
}

/// Parse compiler settings from a YAML file
pub fn parse_config_file<P: AsRef<Path>>(path: P) -> Result<CompilerConfig, ParseError> {
    parse_config_str(&read(path.as_ref())?)
}

/// Parse compiler settings from a YAML string. Missing keys take defaults.
pub fn parse_config_str(yaml: &str) -> Result<CompilerConfig, ParseError> {
    // An empty document is an empty config
    if yaml.trim().is_empty() {
        return Ok(CompilerConfig::default());
    }
    Ok(serde_yaml::from_str(yaml)?)
}

fn read(path: &Path) -> Result<String, ParseError> {
    std::fs::read_to_string(path).map_err(|e| ParseError::Io {
        path: path.display().to_string(),
        source: e,
    })
}
