//! Resource definition validation: identifiers and internal consistency.

use crate::config::ResourceDefinition;
use crate::error::ConfigError;
use std::collections::HashSet;

/// True when `s` is non-empty and only contains `[A-Za-z0-9_]`.
pub fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

fn check_identifier(s: &str) -> Result<(), ConfigError> {
    if is_identifier(s) {
        Ok(())
    } else {
        Err(ConfigError::InvalidIdentifier(s.to_string()))
    }
}

/// Validate a definition before it is registered. Every name that will be
/// interpolated into SQL or a route must be a plain identifier.
pub fn validate(def: &ResourceDefinition) -> Result<(), ConfigError> {
    check_identifier(&def.name)?;
    check_identifier(&def.table)?;
    check_identifier(&def.path_segment)?;
    check_identifier(&def.primary_key)?;

    let mut seen = HashSet::new();
    seen.insert(def.primary_key.as_str());
    for f in &def.fields {
        check_identifier(&f.name)?;
        if !seen.insert(f.name.as_str()) {
            return Err(ConfigError::DuplicateResource(format!("{}.{}", def.name, f.name)));
        }
    }
    Ok(())
}
