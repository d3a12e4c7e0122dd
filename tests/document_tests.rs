//! End-to-end tests: schema loading plus streaming document validation

use std::fs;

use pretty_assertions::assert_eq;
use tempfile::tempdir;
use xmlschema_idc::validators::{CollectingReporter, ErrorCode};
use xmlschema_idc::{DocumentValidator, Error, Limits, QName, SchemaLoader, TypedValue};

const LIBRARY_NS: &str = "urn:library";

const LIBRARY_XSD: &str = r#"<?xml version="1.0"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
           xmlns:l="urn:library"
           targetNamespace="urn:library"
           elementFormDefault="qualified">
  <xs:element name="library">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="book" maxOccurs="unbounded">
          <xs:complexType>
            <xs:sequence>
              <xs:element name="title" type="xs:string"/>
            </xs:sequence>
            <xs:attribute name="id" type="xs:integer"/>
          </xs:complexType>
        </xs:element>
        <xs:element name="loan" minOccurs="0" maxOccurs="unbounded">
          <xs:complexType>
            <xs:attribute name="book" type="xs:integer"/>
          </xs:complexType>
        </xs:element>
      </xs:sequence>
    </xs:complexType>
    <xs:key name="bookKey">
      <xs:selector xpath="l:book"/>
      <xs:field xpath="@id"/>
    </xs:key>
    <xs:keyref name="loanRef" refer="l:bookKey">
      <xs:selector xpath="l:loan"/>
      <xs:field xpath="@book"/>
    </xs:keyref>
    <xs:unique name="titleUnique">
      <xs:selector xpath="l:book"/>
      <xs:field xpath="l:title"/>
    </xs:unique>
  </xs:element>
</xs:schema>"#;

const VALID_LIBRARY: &str = r#"<?xml version="1.0"?>
<library xmlns="urn:library">
  <book id="1"><title>Dune</title></book>
  <book id="02"><title>Emma</title></book>
  <loan book="2"/>
  <loan book="01"/>
</library>"#;

const INVALID_LIBRARY: &str = r#"<?xml version="1.0"?>
<library xmlns="urn:library">
  <!-- duplicate id and title -->
  <book id="1"><title>Dune</title></book>
  <book id="1"><title>Dune</title></book>
  <book><title>Emma</title></book>
  <loan book="3"/>
</library>"#;

fn lib(local: &str) -> QName {
    QName::namespaced(LIBRARY_NS, local)
}

fn library_validator() -> DocumentValidator<CollectingReporter> {
    let schema = SchemaLoader::new().load_str(LIBRARY_XSD).unwrap();
    DocumentValidator::new(schema.table().unwrap(), CollectingReporter::new())
        .with_type_hints(schema.type_hints.clone())
}

#[test]
fn test_valid_document() {
    let mut validator = library_validator();
    let summary = validator.validate_str(VALID_LIBRARY).unwrap();

    assert!(validator.reporter().is_empty(), "{:?}", validator.reporter().violations());
    assert_eq!(summary.committed(&lib("bookKey")).len(), 2);
    assert_eq!(summary.committed(&lib("titleUnique")).len(), 2);
    assert_eq!(summary.keyrefs.checked, 2);
    assert_eq!(summary.keyrefs.failed, 0);
}

#[test]
fn test_invalid_document() {
    let mut validator = library_validator();
    validator.validate_str(INVALID_LIBRARY).unwrap();

    assert_eq!(
        validator.reporter().codes(),
        vec![
            ErrorCode::DuplicateKeyValue,
            ErrorCode::DuplicateUniqueValue,
            ErrorCode::AbsentKeyValue,
            ErrorCode::KeyRefNotFound,
        ]
    );

    let violations = validator.reporter().violations();
    assert_eq!(violations[0].constraint, lib("bookKey"));
    assert_eq!(violations[0].element, lib("book"));
    assert_eq!(violations[0].values.as_deref(), Some("(1)"));
    assert_eq!(violations[1].values.as_deref(), Some("(Dune)"));
    assert_eq!(violations[3].constraint, lib("bookKey"));
    assert_eq!(violations[3].element, lib("loan"));
    assert_eq!(violations[3].values.as_deref(), Some("(3)"));
}

#[test]
fn test_validator_is_reusable() {
    let mut validator = library_validator();

    validator.validate_str(INVALID_LIBRARY).unwrap();
    assert_eq!(validator.reporter_mut().take().len(), 4);

    validator.validate_str(VALID_LIBRARY).unwrap();
    assert!(validator.reporter().is_empty());
}

#[test]
fn test_malformed_document_reports_nothing() {
    let mut validator = library_validator();
    let truncated = r#"<library xmlns="urn:library"><book id="1"/><book id="1"/><loan book="9"/>"#;

    let err = validator.validate_str(truncated).unwrap_err();
    assert!(matches!(err, Error::Xml(_)));
    // duplicates found before the failure were already reported; the
    // dangling keyref was never resolved
    assert_eq!(validator.reporter().count(ErrorCode::KeyRefNotFound), 0);
    assert_eq!(validator.validator().deferred_keyref_count(), 0);

    validator.reporter_mut().clear();
    validator.validate_str(VALID_LIBRARY).unwrap();
    assert!(validator.reporter().is_empty());
}

#[test]
fn test_nil_key_field() {
    let xsd = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="root">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="code" type="xs:integer" nillable="true" maxOccurs="unbounded"/>
      </xs:sequence>
    </xs:complexType>
    <xs:key name="codeKey">
      <xs:selector xpath="code"/>
      <xs:field xpath="."/>
    </xs:key>
  </xs:element>
</xs:schema>"#;
    let xml = r#"<root xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
  <code>1</code>
  <code xsi:nil="true"/>
  <code>01</code>
</root>"#;

    let schema = SchemaLoader::new().load_str(xsd).unwrap();
    let mut validator = DocumentValidator::new(schema.table().unwrap(), CollectingReporter::new())
        .with_type_hints(schema.type_hints);
    validator.validate_str(xml).unwrap();

    assert_eq!(
        validator.reporter().codes(),
        vec![
            ErrorCode::KeyMatchesNillable,
            ErrorCode::AbsentKeyValue,
            ErrorCode::DuplicateKeyValue,
        ]
    );
}

#[test]
fn test_prefixed_document_matches_default_namespace_schema() {
    let xml = r#"<lib:library xmlns:lib="urn:library">
  <lib:book id="5"><lib:title>Ulysses</lib:title></lib:book>
  <lib:loan book="6"/>
</lib:library>"#;

    let mut validator = library_validator();
    validator.validate_str(xml).unwrap();

    assert_eq!(validator.reporter().codes(), vec![ErrorCode::KeyRefNotFound]);
}

#[test]
fn test_elements_outside_namespace_are_not_selected() {
    let xml = r#"<library xmlns="urn:library">
  <book xmlns="urn:other" id="1"/>
  <book xmlns="urn:other" id="1"/>
</library>"#;

    let mut validator = library_validator();
    let summary = validator.validate_str(xml).unwrap();

    assert!(validator.reporter().is_empty());
    assert!(summary.committed(&lib("bookKey")).is_empty());
}

#[test]
fn test_validate_files() {
    let dir = tempdir().unwrap();
    let schema_path = dir.path().join("library.xsd");
    let valid_path = dir.path().join("valid.xml");
    let invalid_path = dir.path().join("invalid.xml");
    fs::write(&schema_path, LIBRARY_XSD).unwrap();
    fs::write(&valid_path, VALID_LIBRARY).unwrap();
    fs::write(&invalid_path, INVALID_LIBRARY).unwrap();

    let schema = SchemaLoader::new().load_file(&schema_path).unwrap();
    let mut validator = DocumentValidator::new(schema.table().unwrap(), CollectingReporter::new())
        .with_type_hints(schema.type_hints);

    validator.validate_file(&valid_path).unwrap();
    assert!(validator.reporter().is_empty());

    validator.validate_file(&invalid_path).unwrap();
    assert_eq!(validator.reporter().len(), 4);

    let err = validator.validate_file(dir.path().join("missing.xml")).unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}

#[test]
fn test_schema_file_errors_carry_location() {
    let dir = tempdir().unwrap();
    let schema_path = dir.path().join("broken.xsd");
    let xsd = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="root">
    <xs:key><xs:selector xpath="item"/><xs:field xpath="@id"/></xs:key>
  </xs:element>
</xs:schema>"#;
    fs::write(&schema_path, xsd).unwrap();

    let err = SchemaLoader::new().load_file(&schema_path).unwrap_err();
    assert!(matches!(err, Error::Parse(_)));
    assert!(err.to_string().contains("broken.xsd"), "{}", err);
}

#[test]
fn test_limits_from_json() {
    let limits = Limits::from_json(r#"{"max_xml_depth": 2}"#).unwrap();
    assert_eq!(limits.max_xml_depth, 2);
    assert_eq!(limits.max_attributes, Limits::default().max_attributes);

    let mut validator = library_validator().with_limits(limits);
    let err = validator.validate_str(VALID_LIBRARY).unwrap_err();
    assert!(matches!(err, Error::LimitExceeded(_)));
    assert!(validator.reporter().is_empty());
}

#[test]
fn test_deferred_keyref_limit() {
    let limits = Limits::from_json(r#"{"max_deferred_keyrefs": 1}"#).unwrap();
    let mut validator = library_validator().with_limits(limits);

    let xml = r#"<library xmlns="urn:library">
  <book id="1"><title>A</title></book>
  <loan book="1"/>
  <loan book="1"/>
</library>"#;
    let err = validator.validate_str(xml).unwrap_err();
    assert!(matches!(err, Error::LimitExceeded(_)));
}

#[test]
fn test_invalid_limits_json() {
    assert!(matches!(Limits::from_json("{"), Err(Error::Json(_))));
}

#[test]
fn test_invalid_date_kept_as_string() {
    let xsd = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="root">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="item" maxOccurs="unbounded">
          <xs:complexType>
            <xs:attribute name="d" type="xs:date"/>
          </xs:complexType>
        </xs:element>
      </xs:sequence>
    </xs:complexType>
    <xs:unique name="dateUnique">
      <xs:selector xpath="item"/>
      <xs:field xpath="@d"/>
    </xs:unique>
  </xs:element>
</xs:schema>"#;
    let xml = r#"<root><item d="xéabcde"/><item d="2024-01-01"/><item d="xéabcde"/></root>"#;

    let schema = SchemaLoader::new().load_str(xsd).unwrap();
    let mut validator = DocumentValidator::new(schema.table().unwrap(), CollectingReporter::new())
        .with_type_hints(schema.type_hints);
    let summary = validator.validate_str(xml).unwrap();

    assert_eq!(validator.reporter().codes(), vec![ErrorCode::DuplicateUniqueValue]);
    let committed = summary.committed(&QName::local("dateUnique"));
    assert_eq!(committed.len(), 2);
    assert_eq!(committed[0].values(), &[TypedValue::string("xéabcde")]);
}
