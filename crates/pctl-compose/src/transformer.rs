use std::collections::HashMap;

use serde_yaml::Value;

use crate::{ComposeError, ComposeFile};

/// Outcome of rewriting build directives into image references.
#[derive(Debug)]
pub struct TransformResult {
    pub transformed_content: String,
    pub services_modified: Vec<String>,
}

/// Replace each built service's `build:` directive with an `image:`
/// reference from the tag map.
///
/// Services absent from the map are left untouched; a map entry whose
/// service does not exist in the document is an error. The rest of the
/// document (volumes, networks, unrelated service keys) survives the
/// round trip unchanged.
pub fn transform(
    content: &str,
    image_tags: &HashMap<String, String>,
) -> Result<TransformResult, ComposeError> {
    let compose = ComposeFile::parse(content)?;
    let mut doc = compose.document().clone();

    let mut services_modified = Vec::new();

    // Deterministic application order for stable output and errors.
    let mut names: Vec<&String> = image_tags.keys().collect();
    names.sort();

    for name in names {
        let service = doc
            .get_mut("services")
            .and_then(|services| services.get_mut(name.as_str()))
            .ok_or_else(|| ComposeError::ServiceNotFound(name.clone()))?;

        let mapping = service
            .as_mapping_mut()
            .ok_or_else(|| ComposeError::InvalidService(name.clone()))?;

        mapping.remove(&Value::from("build"));
        mapping.insert(
            Value::String("image".to_owned()),
            Value::String(image_tags[name].clone()),
        );
        services_modified.push(name.clone());
    }

    let transformed_content =
        serde_yaml::to_string(&doc).map_err(|e| ComposeError::Serialize { source: e })?;

    Ok(TransformResult {
        transformed_content,
        services_modified,
    })
}
