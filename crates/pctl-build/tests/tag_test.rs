use pctl_build::{TagError, TagGenerator, validate_tag, validate_template};
use proptest::prelude::*;

// ── Generation ──

#[test]
fn substitutes_all_placeholders() {
    let generator = TagGenerator::new("demo", "pctl-{{stack}}-{{service}}:{{hash}}");
    let tag = generator.generate("web", "abc123def456");

    assert_eq!(tag, "pctl-demo-web:abc123def456");
}

#[test]
fn unrecognized_text_passes_through() {
    let generator = TagGenerator::new("demo", "registry.local/{{service}}:v1-{{hash}}");
    let tag = generator.generate("web", "cafe01");

    assert_eq!(tag, "registry.local/web:v1-cafe01");
}

#[test]
fn timestamp_renders_as_unix_seconds() {
    let generator = TagGenerator::new("demo", "{{service}}:{{timestamp}}");
    let tag = generator.generate("web", "unused");

    let (_, timestamp) = tag.split_once(':').unwrap();
    let seconds: u64 = timestamp.parse().unwrap();
    // Some time after 2024-01-01.
    assert!(seconds > 1_704_000_000);
}

#[test]
fn generation_is_reproducible() {
    let generator = TagGenerator::new("demo", "pctl-{{stack}}-{{service}}:{{hash}}");
    assert_eq!(
        generator.generate("web", "abc123"),
        generator.generate("web", "abc123")
    );
}

// ── Tag validation ──

#[test]
fn accepts_common_tags() {
    assert!(validate_tag("myapp:latest").is_ok());
    assert!(validate_tag("my-app_service:v1.0.0").is_ok());
    assert!(validate_tag("pctl-demo-web:abc123def456").is_ok());
    assert!(validate_tag("untagged-name").is_ok());
}

#[test]
fn rejects_empty_tag() {
    assert_eq!(validate_tag(""), Err(TagError::Empty));
}

#[test]
fn rejects_overlong_tag() {
    let tag = "a".repeat(129);
    assert_eq!(validate_tag(&tag), Err(TagError::TooLong(129)));
    assert!(validate_tag(&"a".repeat(128)).is_ok());
}

#[test]
fn rejects_whitespace() {
    assert!(matches!(
        validate_tag("my app:latest"),
        Err(TagError::InvalidChar(' '))
    ));
    assert!(matches!(
        validate_tag("my\tapp"),
        Err(TagError::InvalidChar('\t'))
    ));
}

#[test]
fn rejects_double_colon() {
    assert_eq!(
        validate_tag("registry:5000:tag"),
        Err(TagError::TooManyParts)
    );
}

#[test]
fn rejects_at_sign() {
    assert!(matches!(
        validate_tag("app@sha256"),
        Err(TagError::InvalidChar('@'))
    ));
}

#[test]
fn rejects_empty_parts() {
    assert_eq!(validate_tag("app:"), Err(TagError::EmptyPart(2)));
    assert_eq!(validate_tag(":latest"), Err(TagError::EmptyPart(1)));
}

// ── Template validation ──

#[test]
fn accepts_the_default_template() {
    assert!(validate_template("pctl-{{stack}}-{{service}}:{{hash}}").is_ok());
    assert!(validate_template("{{stack}}-{{service}}:{{hash}}").is_ok());
    assert!(validate_template("{{service}}:{{timestamp}}").is_ok());
}

#[test]
fn rejects_empty_template() {
    assert_eq!(validate_template(""), Err(TagError::EmptyTemplate));
}

#[test]
fn rejects_unknown_variable() {
    assert_eq!(
        validate_template("{{unknown}}"),
        Err(TagError::UnknownVariable("{{unknown}}".to_owned()))
    );
}

#[test]
fn rejects_unclosed_variable() {
    assert_eq!(validate_template("{{stack"), Err(TagError::UnclosedVariable));
}

#[test]
fn rejects_template_rendering_an_invalid_tag() {
    // Two colons once rendered.
    let result = validate_template("{{stack}}:{{service}}:{{hash}}");
    assert!(matches!(result, Err(TagError::InvalidRender(_))));

    // A slash is fine in templates but illegal in the rendered tag
    // segments.
    let result = validate_template("{{stack}} {{service}}");
    assert!(matches!(result, Err(TagError::InvalidRender(_))));
}

// ── Properties ──

proptest! {
    #[test]
    fn tags_from_the_safe_charset_validate(name in "[A-Za-z0-9._-]{1,60}", version in "[A-Za-z0-9._-]{1,30}") {
        let tag = format!("{name}:{version}");
        prop_assert!(validate_tag(&tag).is_ok());
    }

    #[test]
    fn tags_with_forbidden_characters_fail(bad in "[ @:/#$]", name in "[a-z0-9]{1,20}") {
        let tag = format!("{name}{bad}{bad}{name}");
        prop_assert!(validate_tag(&tag).is_err());
    }

    #[test]
    fn generation_never_leaves_known_placeholders(service in "[a-z]{1,12}", hash in "[0-9a-f]{12}") {
        let generator = TagGenerator::new("stack", "pctl-{{stack}}-{{service}}:{{hash}}");
        let tag = generator.generate(&service, &hash);
        prop_assert!(!tag.contains("{{"));
        prop_assert_eq!(tag, format!("pctl-stack-{}:{}", service, hash));
    }
}
