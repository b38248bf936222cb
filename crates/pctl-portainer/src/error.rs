#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("failed to build HTTP client")]
    ClientBuild { source: reqwest::Error },

    #[error("request to Portainer failed")]
    Http { source: reqwest::Error },

    #[error("Portainer API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("failed to decode Portainer response")]
    Decode { source: reqwest::Error },

    #[error("docker reported a build error: {message}")]
    Build { message: String },

    #[error("failed to encode build arguments")]
    EncodeBuildArgs { source: serde_json::Error },
}
