//! Integration tests for TOML transform definitions
//!
//! Loads the fixture config, turns it into descriptors and runs them through
//! the pipeline next to the built-in registry.

use bundle_patcher::config::{
    load_from_path, load_from_str, ConfigError, ValidationIssue,
};
use bundle_patcher::{builtin, Anchor, TargetEnvironment, TransformError, TransformPipeline};
use std::fs;
use std::path::PathBuf;

fn fixtures() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn fixture_module(id: &str) -> String {
    fs::read_to_string(fixtures().join("tree").join(id)).unwrap()
}

#[test]
fn test_load_fixture_config() {
    let config = load_from_path(fixtures().join("transforms.toml")).unwrap();
    assert_eq!(config.meta.name, "fixture-transforms");
    assert_eq!(config.transforms.len(), 2);

    let descriptors = config.to_descriptors().unwrap();
    let names: Vec<&str> = descriptors.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["index-banner", "prng-seed"]);

    assert_eq!(descriptors[0].anchor, Anchor::Prepend);
    assert_eq!(
        descriptors[1].anchor,
        Anchor::Literal("let state = 0x2545f491;".to_string())
    );
    for descriptor in &descriptors {
        assert_eq!(descriptor.targets().count(), TargetEnvironment::ALL.len());
    }
}

#[test]
fn test_config_descriptors_run_after_builtins() {
    let config = load_from_path(fixtures().join("transforms.toml")).unwrap();
    let target = TargetEnvironment::Server;
    let mut descriptors = builtin::registry(target);
    descriptors.extend(config.to_descriptors().unwrap());
    let pipeline = TransformPipeline::new(target, descriptors);

    let index = fixture_module("index.js");
    let patched = pipeline.transform("index.js", &index).unwrap().unwrap();
    assert_eq!(patched.text, format!("// flavor: server\n{index}"));
    assert_eq!(patched.applied, vec!["index-banner".to_string()]);

    let prng = fixture_module("runtime/prng.js");
    let patched = pipeline.transform("runtime/prng.js", &prng).unwrap().unwrap();
    assert!(patched.text.starts_with("let state = Date.now() | 1;\n"));
    assert!(!patched.text.contains("0x2545f491"));

    let random = fixture_module("runtime/random.js");
    let patched = pipeline.transform("runtime/random.js", &random).unwrap().unwrap();
    assert_eq!(patched.applied, vec![builtin::RANDOM_SOURCE.to_string()]);
}

#[test]
fn test_exact_matcher_does_not_match_nested_id() {
    let config = load_from_path(fixtures().join("transforms.toml")).unwrap();
    let pipeline = TransformPipeline::new(
        TargetEnvironment::Browser,
        config.to_descriptors().unwrap(),
    );

    let result = pipeline
        .transform("nested/index.js", "export {};\n")
        .unwrap();
    assert!(result.is_none());
}

#[test]
fn test_config_with_missing_target_fails_at_rewrite() {
    let toml = r#"
[meta]
name = "partial"

[[transforms]]
id = "server-only"

[transforms.module]
type = "contains"
value = "prng"

[transforms.anchor]
type = "literal"
text = "let state = 0x2545f491;"

[transforms.replacements]
server = "let state = 1;"
"#;
    let config = load_from_str(toml).unwrap();
    let pipeline = TransformPipeline::new(
        TargetEnvironment::Browser,
        config.to_descriptors().unwrap(),
    );

    let prng = fixture_module("runtime/prng.js");
    let err = pipeline.transform("runtime/prng.js", &prng).unwrap_err();
    assert_eq!(
        err,
        TransformError::UnsupportedTarget {
            transform: "server-only".to_string(),
            module_id: "runtime/prng.js".to_string(),
            target: TargetEnvironment::Browser,
        }
    );
}

#[test]
fn test_invalid_config_reports_every_issue() {
    let toml = r#"
[[transforms]]
id = "first"

[transforms.module]
type = "suffix"
value = ""

[transforms.anchor]
type = "literal"
text = "x"

[transforms.replacements]
desktop = "y"

[[transforms]]
id = "first"

[transforms.module]
type = "exact"
value = "a.js"

[transforms.anchor]
type = "prepend"
"#;
    let err = load_from_str(toml).unwrap_err();
    let ConfigError::Validation { source, .. } = &err else {
        panic!("expected validation error, got {err:?}");
    };

    assert!(source.issues.contains(&ValidationIssue::MissingField {
        transform_id: Some("first".to_string()),
        field: "module.value",
    }));
    assert!(source.issues.contains(&ValidationIssue::UnknownTarget {
        transform_id: Some("first".to_string()),
        target: "desktop".to_string(),
    }));
    assert!(source
        .issues
        .contains(&ValidationIssue::DuplicateId("first".to_string())));
    assert!(source.issues.contains(&ValidationIssue::MissingField {
        transform_id: Some("first".to_string()),
        field: "replacements",
    }));
}

#[test]
fn test_unknown_anchor_type_is_parse_error() {
    let toml = r#"
[[transforms]]
id = "bad"

[transforms.module]
type = "exact"
value = "a.js"

[transforms.anchor]
type = "regex"
pattern = ".*"

[transforms.replacements]
server = ""
"#;
    let err = load_from_str(toml).unwrap_err();
    assert!(matches!(err, ConfigError::Toml { .. }));
}
