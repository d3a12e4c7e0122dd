//! CLI integration tests
//!
//! These tests run the built binary, so they only exist with the `cli`
//! feature enabled.

#![cfg(feature = "cli")]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::{tempdir, TempDir};

const SCHEMA: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="root">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="item" maxOccurs="unbounded">
          <xs:complexType>
            <xs:attribute name="id" type="xs:integer"/>
          </xs:complexType>
        </xs:element>
        <xs:element name="ref" minOccurs="0" maxOccurs="unbounded">
          <xs:complexType>
            <xs:attribute name="to" type="xs:integer"/>
          </xs:complexType>
        </xs:element>
      </xs:sequence>
    </xs:complexType>
    <xs:key name="itemKey">
      <xs:selector xpath="item"/>
      <xs:field xpath="@id"/>
    </xs:key>
    <xs:keyref name="itemRef" refer="itemKey">
      <xs:selector xpath="ref"/>
      <xs:field xpath="@to"/>
    </xs:keyref>
  </xs:element>
</xs:schema>"#;

fn xmlschema_idc_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_xmlschema-idc"))
}

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("schema.xsd"), SCHEMA).unwrap();
        fs::write(
            dir.path().join("valid.xml"),
            r#"<root><item id="1"/><item id="2"/><ref to="02"/></root>"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("invalid.xml"),
            r#"<root><item id="1"/><item id="01"/><ref to="3"/></root>"#,
        )
        .unwrap();
        Self { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

fn run(args: &[&Path]) -> Output {
    Command::new(xmlschema_idc_bin())
        .args(args)
        .output()
        .expect("Failed to execute command")
}

// ============================================================================
// Inspect Command Tests
// ============================================================================

#[test]
fn test_cli_inspect_basic() {
    let fixture = Fixture::new();
    let schema = fixture.path("schema.xsd");
    let output = run(&[Path::new("inspect"), Path::new("--schema"), &schema]);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "inspect should succeed");
    assert!(stdout.contains("xmlschema-idc"), "should show version");
    assert!(stdout.contains("key itemKey on root"), "should list the key: {}", stdout);
    assert!(stdout.contains("refer:    itemKey"), "should show the keyref target");
}

#[test]
fn test_cli_inspect_json_output() {
    let fixture = Fixture::new();
    let schema = fixture.path("schema.xsd");
    let output = run(&[Path::new("inspect"), Path::new("--json"), Path::new("--schema"), &schema]);

    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let constraints = json["constraints"].as_array().unwrap();
    assert_eq!(constraints.len(), 2);
    assert_eq!(constraints[1]["kind"], "keyref");
    assert_eq!(constraints[1]["resolved"], true);
}

// ============================================================================
// Validate Command Tests
// ============================================================================

#[test]
fn test_cli_validate_valid_document() {
    let fixture = Fixture::new();
    let schema = fixture.path("schema.xsd");
    let valid = fixture.path("valid.xml");
    let output = run(&[Path::new("validate"), Path::new("--schema"), &schema, &valid]);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "valid document should pass: {}", stdout);
    assert!(stdout.contains("is valid"));
}

#[test]
fn test_cli_validate_invalid_document() {
    let fixture = Fixture::new();
    let schema = fixture.path("schema.xsd");
    let valid = fixture.path("valid.xml");
    let invalid = fixture.path("invalid.xml");
    let output = run(&[Path::new("validate"), Path::new("--schema"), &schema, &valid, &invalid]);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(output.status.code(), Some(1));
    assert!(stdout.contains("DuplicateKeyValue"), "{}", stdout);
    assert!(stdout.contains("KeyRefNotFound"), "{}", stdout);
}

#[test]
fn test_cli_validate_json_output() {
    let fixture = Fixture::new();
    let schema = fixture.path("schema.xsd");
    let invalid = fixture.path("invalid.xml");
    let output = run(&[Path::new("validate"), Path::new("--json"), Path::new("--schema"), &schema, &invalid]);

    assert_eq!(output.status.code(), Some(1));
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let document = &json["documents"][0];
    assert_eq!(document["valid"], false);
    assert_eq!(document["violations"].as_array().unwrap().len(), 2);
    assert_eq!(document["violations"][0]["code"], "DuplicateKeyValue");
    assert_eq!(document["violations"][0]["values"], "(1)");
}

#[test]
fn test_cli_missing_schema() {
    let fixture = Fixture::new();
    let missing = fixture.path("missing.xsd");
    let valid = fixture.path("valid.xml");
    let output = run(&[Path::new("validate"), Path::new("--schema"), &missing, &valid]);

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr.contains("Error:"));
}
