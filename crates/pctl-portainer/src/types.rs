use std::collections::HashMap;

use serde::Deserialize;

/// A Portainer stack.
#[derive(Debug, Clone, Deserialize)]
pub struct Stack {
    #[serde(rename = "Id")]
    pub id: i64,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "EndpointId")]
    pub environment_id: i64,
    #[serde(rename = "Status", default)]
    pub status: i64,
}

/// A container as reported by the Docker proxy.
#[derive(Debug, Clone, Deserialize)]
pub struct Container {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Names", default)]
    pub names: Vec<String>,
    #[serde(rename = "Image", default)]
    pub image: String,
    #[serde(rename = "Status", default)]
    pub status: String,
    #[serde(rename = "State", default)]
    pub state: String,
    #[serde(rename = "Created", default)]
    pub created: i64,
    #[serde(rename = "Labels", default)]
    pub labels: HashMap<String, String>,
}

impl Container {
    /// Primary name without the leading slash the Docker API includes.
    pub fn display_name(&self) -> &str {
        self.names
            .first()
            .map(|name| name.trim_start_matches('/'))
            .unwrap_or(self.id.as_str())
    }
}
