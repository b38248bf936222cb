use std::time::{SystemTime, UNIX_EPOCH};

const MAX_TAG_LENGTH: usize = 128;

/// The placeholders a tag template may use.
const TEMPLATE_VARS: [&str; 4] = ["{{stack}}", "{{service}}", "{{hash}}", "{{timestamp}}"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TagError {
    #[error("tag cannot be empty")]
    Empty,

    #[error("tag too long: {0} characters (max {MAX_TAG_LENGTH})")]
    TooLong(usize),

    #[error("tag has too many parts separated by ':' (max 2)")]
    TooManyParts,

    #[error("tag part {0} is empty")]
    EmptyPart(usize),

    #[error("tag contains invalid character: {0:?}")]
    InvalidChar(char),

    #[error("tag format cannot be empty")]
    EmptyTemplate,

    #[error("unclosed template variable in tag format")]
    UnclosedVariable,

    #[error(
        "invalid template variable: {0} (valid variables: {{{{stack}}}}, {{{{service}}}}, {{{{hash}}}}, {{{{timestamp}}}})"
    )]
    UnknownVariable(String),

    #[error("tag format produces an invalid tag: {0}")]
    InvalidRender(Box<TagError>),
}

/// Renders the configured tag template for one stack's services.
pub struct TagGenerator {
    stack_name: String,
    tag_format: String,
}

impl TagGenerator {
    pub fn new(stack_name: &str, tag_format: &str) -> Self {
        Self {
            stack_name: stack_name.to_owned(),
            tag_format: tag_format.to_owned(),
        }
    }

    /// Substitute the four recognized placeholders. Anything else in the
    /// template passes through unchanged.
    pub fn generate(&self, service_name: &str, content_hash: &str) -> String {
        self.tag_format
            .replace("{{stack}}", &self.stack_name)
            .replace("{{service}}", service_name)
            .replace("{{hash}}", content_hash)
            .replace("{{timestamp}}", &unix_timestamp().to_string())
    }
}

fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Check that a rendered tag follows image-reference naming rules.
pub fn validate_tag(tag: &str) -> Result<(), TagError> {
    if tag.is_empty() {
        return Err(TagError::Empty);
    }
    if tag.len() > MAX_TAG_LENGTH {
        return Err(TagError::TooLong(tag.len()));
    }

    if let Some(ws) = tag.chars().find(|c| matches!(c, ' ' | '\t' | '\n' | '\r')) {
        return Err(TagError::InvalidChar(ws));
    }

    let parts: Vec<&str> = tag.split(':').collect();
    if parts.len() > 2 {
        return Err(TagError::TooManyParts);
    }

    for (index, part) in parts.iter().enumerate() {
        if part.is_empty() {
            return Err(TagError::EmptyPart(index + 1));
        }
        if let Some(bad) = part.chars().find(|c| !is_valid_tag_char(*c)) {
            return Err(TagError::InvalidChar(bad));
        }
    }

    Ok(())
}

fn is_valid_tag_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')
}

/// Check a tag template: every `{{…}}` token must be one of the four
/// recognized variables, and a render with sample values must produce a
/// tag [`validate_tag`] accepts — catching templates that are
/// syntactically fine but can only produce illegal tags.
pub fn validate_template(template: &str) -> Result<(), TagError> {
    if template.is_empty() {
        return Err(TagError::EmptyTemplate);
    }

    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        let Some(end) = rest[start..].find("}}") else {
            return Err(TagError::UnclosedVariable);
        };
        let token = &rest[start..start + end + 2];
        if !TEMPLATE_VARS.contains(&token) {
            return Err(TagError::UnknownVariable(token.to_owned()));
        }
        rest = &rest[start + end + 2..];
    }

    let sample = template
        .replace("{{stack}}", "test-stack")
        .replace("{{service}}", "test-service")
        .replace("{{hash}}", "abc123")
        .replace("{{timestamp}}", "1234567890");

    validate_tag(&sample).map_err(|e| TagError::InvalidRender(Box::new(e)))
}
