use std::collections::HashMap;

use pctl_compose::{ComposeError, ComposeFile, transform};

const COMPOSE: &str = r#"
version: "3.8"
services:
  web:
    build: ./web
    ports:
      - "8080:80"
    environment:
      - APP_ENV=prod
  db:
    image: postgres:16
    volumes:
      - dbdata:/var/lib/postgresql/data
volumes:
  dbdata: {}
"#;

fn tags(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect()
}

#[test]
fn replaces_build_with_image() {
    let result = transform(COMPOSE, &tags(&[("web", "pctl-demo-web:abc123def456")])).unwrap();

    assert_eq!(result.services_modified, vec!["web"]);

    let doc = ComposeFile::parse(&result.transformed_content).unwrap();
    let web = doc.document()["services"]["web"].clone();
    assert_eq!(web["image"].as_str(), Some("pctl-demo-web:abc123def456"));
    assert!(web.get("build").is_none());
}

#[test]
fn untouched_services_and_keys_survive() {
    let result = transform(COMPOSE, &tags(&[("web", "pctl-demo-web:abc")])).unwrap();
    let doc = ComposeFile::parse(&result.transformed_content).unwrap();

    let root = doc.document();
    assert_eq!(
        root["services"]["db"]["image"].as_str(),
        Some("postgres:16")
    );
    assert!(root["services"]["db"]["volumes"].is_sequence());
    assert!(root["volumes"]["dbdata"].is_mapping());
    assert_eq!(
        root["services"]["web"]["ports"][0].as_str(),
        Some("8080:80")
    );
    assert_eq!(root["version"].as_str(), Some("3.8"));
}

#[test]
fn unknown_service_in_tag_map_errors() {
    let result = transform(COMPOSE, &tags(&[("worker", "pctl-demo-worker:abc")]));
    assert!(matches!(result, Err(ComposeError::ServiceNotFound(ref s)) if s == "worker"));
}

#[test]
fn empty_tag_map_leaves_document_equivalent() {
    let result = transform(COMPOSE, &HashMap::new()).unwrap();
    assert!(result.services_modified.is_empty());

    let doc = ComposeFile::parse(&result.transformed_content).unwrap();
    assert!(doc.document()["services"]["web"].get("build").is_some());
}

#[test]
fn transformed_output_reparses() {
    let result = transform(COMPOSE, &tags(&[("web", "pctl-demo-web:abc")])).unwrap();
    assert!(ComposeFile::parse(&result.transformed_content).is_ok());
}
