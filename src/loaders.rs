//! Schema loading
//!
//! This module extracts identity constraints and simple type hints from an
//! XSD document. Only what identity validation needs is read: named element
//! declarations, the `xs:unique`, `xs:key` and `xs:keyref` children they
//! carry, and the built-in types behind element and attribute declarations.

use std::fs;
use std::path::Path;

use roxmltree::{Document, Node};

use crate::documents::TypeHints;
use crate::error::{Error, ParseError, Result};
use crate::limits::Limits;
use crate::namespaces::{NamespaceContext, QName};
use crate::validators::{
    ConstraintViolation, ErrorReporter, IdentityBuilder, IdentityConstraintTable, XsdIdentity,
};
use crate::XSD_NAMESPACE;

/// Constraints and type hints read from one schema document
#[derive(Debug, Clone, Default)]
pub struct LoadedSchema {
    /// The schema's targetNamespace
    pub target_namespace: Option<String>,
    /// Identity constraints, in document order
    pub constraints: Vec<XsdIdentity>,
    /// Built-in types of declared elements and attributes
    pub type_hints: TypeHints,
}

impl LoadedSchema {
    /// Build a constraint table from the loaded constraints
    pub fn table(&self) -> Result<IdentityConstraintTable> {
        IdentityConstraintTable::new(self.constraints.iter().cloned())
    }
}

/// Loader for identity constraints declared in XSD documents
#[derive(Debug, Clone, Default)]
pub struct SchemaLoader {
    /// Resource limits
    limits: Limits,
}

struct Context<'a, 'input> {
    root: Node<'a, 'input>,
    target_namespace: Option<&'a str>,
    elements_qualified: bool,
    attributes_qualified: bool,
}

impl SchemaLoader {
    /// Create a new loader with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Load a schema file
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<LoadedSchema> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        self.load_str(&content).map_err(|e| match e {
            Error::Parse(p) => Error::Parse(p.with_location(path.display().to_string())),
            other => other,
        })
    }

    /// Load a schema from text. Any invalid selector or field fails the load.
    pub fn load_str(&self, xsd: &str) -> Result<LoadedSchema> {
        self.load(xsd, None::<&mut crate::validators::CollectingReporter>)
    }

    /// Load a schema from text, reporting constraints whose selector or
    /// field does not compile as `InvalidFieldPath` and skipping them
    pub fn load_str_reporting<R: ErrorReporter + ?Sized>(
        &self,
        xsd: &str,
        reporter: &mut R,
    ) -> Result<LoadedSchema> {
        self.load(xsd, Some(reporter))
    }

    fn load<R: ErrorReporter + ?Sized>(&self, xsd: &str, mut reporter: Option<&mut R>) -> Result<LoadedSchema> {
        self.limits.check_xml_size(xsd.len())?;

        let doc = Document::parse(xsd)
            .map_err(|e| Error::Xml(format!("Failed to parse schema: {}", e)))?;
        let root = doc.root_element();
        if !is_xsd(root, "schema") {
            return Err(ParseError::new(format!(
                "root element is not xs:schema but '{}'",
                root.tag_name().name()
            ))
            .into());
        }

        let ctx = Context {
            root,
            target_namespace: root.attribute("targetNamespace"),
            elements_qualified: root.attribute("elementFormDefault") == Some("qualified"),
            attributes_qualified: root.attribute("attributeFormDefault") == Some("qualified"),
        };

        let mut schema = LoadedSchema {
            target_namespace: ctx.target_namespace.map(str::to_string),
            ..LoadedSchema::default()
        };

        for node in root.descendants().filter(|n| n.is_element()) {
            if is_xsd(node, "element") {
                let Some(element) = ctx.declared_name(node, ctx.elements_qualified) else {
                    continue;
                };
                if let Some(type_name) = ctx.builtin_type(node) {
                    schema.type_hints.add_element(element.clone(), type_name);
                }
                for constraint in node.children().filter(|c| {
                    is_xsd(*c, "unique") || is_xsd(*c, "key") || is_xsd(*c, "keyref")
                }) {
                    match ctx.identity(constraint, &element) {
                        Ok(identity) => schema.constraints.push(identity),
                        Err(Error::XPath(e)) if reporter.is_some() => {
                            let name = ctx.constraint_name(constraint);
                            tracing::warn!(constraint = %name, error = %e, "constraint skipped");
                            if let Some(reporter) = reporter.as_deref_mut() {
                                reporter.report_constraint_error(
                                    ConstraintViolation::new(e.code(), name, element.clone())
                                        .with_values(e.to_string()),
                                );
                            }
                        }
                        Err(e) => return Err(e),
                    }
                }
            } else if is_xsd(node, "attribute") {
                let Some(attribute) = ctx.declared_name(node, ctx.attributes_qualified) else {
                    continue;
                };
                if let Some(type_name) = ctx.builtin_type(node) {
                    schema.type_hints.add_attribute(attribute, type_name);
                }
            }
        }

        tracing::debug!(
            constraints = schema.constraints.len(),
            hints = schema.type_hints.len(),
            "schema loaded"
        );
        Ok(schema)
    }
}

fn is_xsd(node: Node<'_, '_>, local: &str) -> bool {
    node.is_element()
        && node.tag_name().namespace() == Some(XSD_NAMESPACE)
        && node.tag_name().name() == local
}

fn xsd_children<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    local: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children().filter(move |c| is_xsd(*c, local))
}

/// In-scope prefix bindings of a schema node
fn namespaces_of(node: Node<'_, '_>) -> NamespaceContext {
    let mut ctx = NamespaceContext::new();
    for ns in node.namespaces() {
        match ns.name() {
            Some(prefix) => ctx.add_prefix(prefix, ns.uri()),
            None => ctx.set_default_namespace(ns.uri()),
        }
    }
    ctx
}

impl<'a, 'input> Context<'a, 'input> {
    /// Expanded name of a named element or attribute declaration
    fn declared_name(&self, node: Node<'a, 'input>, qualified_default: bool) -> Option<QName> {
        let name = node.attribute("name")?;
        let global = node.parent_element().map(|p| p == self.root).unwrap_or(false);
        let qualified = global
            || match node.attribute("form") {
                Some(form) => form == "qualified",
                None => qualified_default,
            };
        Some(if qualified {
            QName::new(self.target_namespace, name)
        } else {
            QName::local(name)
        })
    }

    fn constraint_name(&self, node: Node<'a, 'input>) -> QName {
        QName::new(self.target_namespace, node.attribute("name").unwrap_or_default())
    }

    /// Resolve a QName-valued attribute (`refer`, `type`, `base`)
    fn resolve(&self, node: Node<'a, 'input>, value: &str) -> Result<QName> {
        namespaces_of(node).resolve(value.trim())
    }

    fn identity(&self, node: Node<'a, 'input>, element: &QName) -> Result<XsdIdentity> {
        let name = self.constraint_name(node);
        let mut builder = match node.tag_name().name() {
            "key" => IdentityBuilder::key(),
            "keyref" => IdentityBuilder::keyref(),
            _ => IdentityBuilder::unique(),
        };
        if node.attribute("name").is_some() {
            builder = builder.name(name.clone());
        }
        builder = builder.element(element.clone()).namespaces(namespaces_of(node));

        if let Some(refer) = node.attribute("refer") {
            builder = builder.refer(self.resolve(node, refer)?);
        }
        if let Some(selector) = xsd_children(node, "selector").next() {
            let xpath = selector.attribute("xpath").ok_or_else(|| {
                ParseError::new(format!("selector of '{}' has no xpath attribute", name))
            })?;
            builder = builder.selector(xpath);
        }
        for field in xsd_children(node, "field") {
            let xpath = field.attribute("xpath").ok_or_else(|| {
                ParseError::new(format!("field of '{}' has no xpath attribute", name))
            })?;
            builder = builder.field(xpath);
        }

        builder.build()
    }

    /// Built-in type behind a declaration's `type` attribute or inline
    /// simpleType, following one named simpleType restriction
    fn builtin_type(&self, node: Node<'a, 'input>) -> Option<String> {
        if let Some(type_attr) = node.attribute("type") {
            let type_name = self.resolve(node, type_attr).ok()?;
            return self.builtin_of(node, &type_name);
        }
        let simple = xsd_children(node, "simpleType").next()?;
        self.restriction_base(simple)
    }

    fn builtin_of(&self, node: Node<'a, 'input>, type_name: &QName) -> Option<String> {
        if type_name.namespace() == Some(XSD_NAMESPACE) {
            return Some(type_name.local_name.clone());
        }
        if type_name.namespace() != self.target_namespace {
            tracing::trace!(type_name = %type_name, declaration = ?node.attribute("name"), "type outside target namespace");
            return None;
        }
        let simple = xsd_children(self.root, "simpleType")
            .find(|s| s.attribute("name") == Some(type_name.local_name.as_str()))?;
        self.restriction_base(simple)
    }

    fn restriction_base(&self, simple: Node<'a, 'input>) -> Option<String> {
        let restriction = xsd_children(simple, "restriction").next()?;
        let base = self.resolve(restriction, restriction.attribute("base")?).ok()?;
        (base.namespace() == Some(XSD_NAMESPACE)).then(|| base.local_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validators::{CollectingReporter, ErrorCode, IdentityConstraintKind};

    const CATALOG: &str = r#"<?xml version="1.0"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
           xmlns:c="urn:catalog"
           targetNamespace="urn:catalog"
           elementFormDefault="qualified">
  <xs:simpleType name="code">
    <xs:restriction base="xs:integer"/>
  </xs:simpleType>
  <xs:element name="catalog">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="product" maxOccurs="unbounded">
          <xs:complexType>
            <xs:attribute name="id" type="c:code"/>
            <xs:attribute name="label" type="xs:token"/>
          </xs:complexType>
        </xs:element>
        <xs:element name="order" type="xs:string" maxOccurs="unbounded"/>
      </xs:sequence>
    </xs:complexType>
    <xs:key name="productKey">
      <xs:selector xpath="c:product"/>
      <xs:field xpath="@id"/>
    </xs:key>
    <xs:keyref name="orderRef" refer="c:productKey">
      <xs:selector xpath="c:order"/>
      <xs:field xpath="."/>
    </xs:keyref>
  </xs:element>
</xs:schema>"#;

    #[test]
    fn test_load_constraints() {
        let schema = SchemaLoader::new().load_str(CATALOG).unwrap();

        assert_eq!(schema.target_namespace.as_deref(), Some("urn:catalog"));
        assert_eq!(schema.constraints.len(), 2);

        let key = &schema.constraints[0];
        assert_eq!(key.name, QName::namespaced("urn:catalog", "productKey"));
        assert_eq!(key.kind, IdentityConstraintKind::Key);
        assert_eq!(key.element, QName::namespaced("urn:catalog", "catalog"));
        assert_eq!(key.selector.xpath, "c:product");

        let keyref = &schema.constraints[1];
        assert_eq!(keyref.refer, Some(QName::namespaced("urn:catalog", "productKey")));

        let table = schema.table().unwrap();
        assert!(table.target_of(&keyref.name).is_some());
    }

    #[test]
    fn test_load_type_hints() {
        let schema = SchemaLoader::new().load_str(CATALOG).unwrap();
        let hints = &schema.type_hints;

        assert_eq!(hints.attribute_type(&QName::local("id")), Some("integer"));
        assert_eq!(hints.attribute_type(&QName::local("label")), Some("token"));
        assert_eq!(
            hints.element_type(&QName::namespaced("urn:catalog", "order")),
            Some("string")
        );
        assert_eq!(hints.element_type(&QName::namespaced("urn:catalog", "product")), None);
    }

    #[test]
    fn test_unqualified_local_elements() {
        let xsd = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:t">
  <xs:element name="root">
    <xs:complexType><xs:sequence>
      <xs:element name="list">
        <xs:unique name="u"><xs:selector xpath="item"/><xs:field xpath="@id"/></xs:unique>
      </xs:element>
    </xs:sequence></xs:complexType>
  </xs:element>
</xs:schema>"#;
        let schema = SchemaLoader::new().load_str(xsd).unwrap();
        assert_eq!(schema.constraints[0].element, QName::local("list"));
        assert_eq!(schema.constraints[0].name, QName::namespaced("urn:t", "u"));
    }

    #[test]
    fn test_invalid_path_strict_and_reporting() {
        let xsd = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="root">
    <xs:unique name="bad"><xs:selector xpath="item"/><xs:field xpath="@id/x"/></xs:unique>
    <xs:unique name="good"><xs:selector xpath="item"/><xs:field xpath="@id"/></xs:unique>
  </xs:element>
</xs:schema>"#;

        let err = SchemaLoader::new().load_str(xsd).unwrap_err();
        assert!(matches!(err, Error::XPath(_)));

        let mut reporter = CollectingReporter::new();
        let schema = SchemaLoader::new().load_str_reporting(xsd, &mut reporter).unwrap();
        assert_eq!(schema.constraints.len(), 1);
        assert_eq!(schema.constraints[0].name, QName::local("good"));
        assert_eq!(reporter.codes(), vec![ErrorCode::InvalidFieldPath]);
        assert_eq!(reporter.violations()[0].constraint, QName::local("bad"));
    }

    #[test]
    fn test_not_a_schema() {
        let err = SchemaLoader::new().load_str("<root/>").unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
        let err = SchemaLoader::new().load_str("<xs:schema").unwrap_err();
        assert!(matches!(err, Error::Xml(_)));
    }
}
