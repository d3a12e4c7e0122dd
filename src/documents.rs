//! Streaming document validation
//!
//! This module drives an [`IdentityValidator`] straight from XML text with
//! quick-xml's namespace-aware reader. No tree is built: each start, end,
//! and text event is turned into the validator's structural events as it is
//! read. Element and attribute values are typed through [`TypeHints`].

use std::borrow::Cow;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::NsReader;

use crate::error::{Error, Result};
use crate::limits::Limits;
use crate::namespaces::QName;
use crate::validators::{
    ErrorReporter, IdentityConstraintTable, IdentityValidator, TypedValue, ValidationSummary,
};
use crate::XSI_NAMESPACE;

/// Built-in type names for element content and attribute values.
///
/// Names without a hint are typed as `xs:anySimpleType`, i.e. compared as
/// plain strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeHints {
    elements: HashMap<QName, String>,
    attributes: HashMap<QName, String>,
}

impl TypeHints {
    /// Create empty hints
    pub fn new() -> Self {
        Self::default()
    }

    /// Type the content of elements named `name` as built-in `type_name`
    pub fn with_element(mut self, name: QName, type_name: impl Into<String>) -> Self {
        self.add_element(name, type_name);
        self
    }

    /// Type attributes named `name` as built-in `type_name`
    pub fn with_attribute(mut self, name: QName, type_name: impl Into<String>) -> Self {
        self.add_attribute(name, type_name);
        self
    }

    /// Add an element hint; the first hint for a name wins
    pub fn add_element(&mut self, name: QName, type_name: impl Into<String>) {
        self.elements.entry(name).or_insert_with(|| type_name.into());
    }

    /// Add an attribute hint; the first hint for a name wins
    pub fn add_attribute(&mut self, name: QName, type_name: impl Into<String>) {
        self.attributes.entry(name).or_insert_with(|| type_name.into());
    }

    /// Built-in type of an element's content
    pub fn element_type(&self, name: &QName) -> Option<&str> {
        self.elements.get(name).map(String::as_str)
    }

    /// Built-in type of an attribute
    pub fn attribute_type(&self, name: &QName) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Number of hints
    pub fn len(&self) -> usize {
        self.elements.len() + self.attributes.len()
    }

    /// Check if there are no hints
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty() && self.attributes.is_empty()
    }

    fn typed(type_name: Option<&str>, name: &QName, lexical: &str) -> TypedValue {
        let type_name = type_name.unwrap_or("anySimpleType");
        match TypedValue::from_builtin(type_name, lexical) {
            Ok(value) => value,
            Err(e) => {
                // Lexical validity is the grammar's concern; compare as text
                tracing::warn!(%name, type_name, error = %e, "value kept as string");
                TypedValue::string(lexical)
            }
        }
    }

    /// Type an element's character content
    pub fn element_value(&self, name: &QName, lexical: &str) -> TypedValue {
        Self::typed(self.element_type(name), name, lexical)
    }

    /// Type an attribute value
    pub fn attribute_value(&self, name: &QName, lexical: &str) -> TypedValue {
        Self::typed(self.attribute_type(name), name, lexical)
    }
}

/// An element whose end tag has not been read yet
#[derive(Debug)]
struct Frame {
    name: QName,
    nil: bool,
    has_children: bool,
    text: String,
}

/// Validates XML documents against a constraint table in one pass
#[derive(Debug)]
pub struct DocumentValidator<R: ErrorReporter> {
    validator: IdentityValidator<R>,
    hints: TypeHints,
    limits: Limits,
}

impl<R: ErrorReporter> DocumentValidator<R> {
    /// Create a document validator with default limits and no type hints
    pub fn new(table: IdentityConstraintTable, reporter: R) -> Self {
        Self {
            validator: IdentityValidator::new(table, reporter),
            hints: TypeHints::new(),
            limits: Limits::default(),
        }
    }

    /// Set the type hints
    pub fn with_type_hints(mut self, hints: TypeHints) -> Self {
        self.hints = hints;
        self
    }

    /// Set the limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// The underlying event validator
    pub fn validator(&self) -> &IdentityValidator<R> {
        &self.validator
    }

    /// The error reporter
    pub fn reporter(&self) -> &R {
        self.validator.reporter()
    }

    /// Mutable access to the error reporter
    pub fn reporter_mut(&mut self) -> &mut R {
        self.validator.reporter_mut()
    }

    /// Consume the driver, returning its reporter
    pub fn into_reporter(self) -> R {
        self.validator.into_reporter()
    }

    /// Validate an XML file
    pub fn validate_file(&mut self, path: impl AsRef<Path>) -> Result<ValidationSummary> {
        let path = path.as_ref();
        let metadata = fs::metadata(path)?;
        self.limits.check_xml_size(metadata.len() as usize)?;
        let xml = fs::read_to_string(path)?;
        self.validate_str(&xml)
    }

    /// Validate an XML document held in memory.
    ///
    /// Malformed XML or an exceeded limit aborts the pass: open scopes are
    /// dropped, deferred keyrefs are not resolved, and the error is
    /// returned. Constraint violations go to the reporter.
    pub fn validate_str(&mut self, xml: &str) -> Result<ValidationSummary> {
        match self.run(xml) {
            Ok(summary) => Ok(summary),
            Err(e) => {
                tracing::debug!(error = %e, "document aborted");
                self.validator.abort();
                Err(e)
            }
        }
    }

    fn run(&mut self, xml: &str) -> Result<ValidationSummary> {
        self.limits.check_xml_size(xml.len())?;

        let mut reader = NsReader::from_str(xml);
        reader.trim_text(false);
        let mut stack: Vec<Frame> = Vec::new();

        loop {
            let position = reader.buffer_position();
            let (ns, event) = reader.read_resolved_event().map_err(|e| {
                Error::Xml(format!("Error parsing XML at position {}: {}", position, e))
            })?;
            match event {
                Event::Start(e) => {
                    let name = expanded_name(ns, e.local_name().as_ref())?;
                    let frame = self.open(&reader, name, &e, &mut stack)?;
                    stack.push(frame);
                }
                Event::Empty(e) => {
                    let name = expanded_name(ns, e.local_name().as_ref())?;
                    let frame = self.open(&reader, name, &e, &mut stack)?;
                    self.close(frame)?;
                }
                Event::End(_) => {
                    let frame = stack
                        .pop()
                        .ok_or_else(|| Error::Xml("Unexpected end tag".to_string()))?;
                    self.close(frame)?;
                }
                Event::Text(e) => {
                    if let Some(frame) = stack.last_mut() {
                        let text = e
                            .unescape()
                            .map_err(|e| Error::Xml(format!("Failed to unescape text: {}", e)))?;
                        frame.text.push_str(&text);
                    }
                }
                Event::CData(e) => {
                    if let Some(frame) = stack.last_mut() {
                        let bytes = e.into_inner();
                        let text = std::str::from_utf8(&bytes)
                            .map_err(|e| Error::Xml(format!("Invalid CDATA section: {}", e)))?;
                        frame.text.push_str(text);
                    }
                }
                Event::Eof => break,
                _ => {} // Comments, processing instructions, declarations
            }
        }

        if let Some(frame) = stack.last() {
            return Err(Error::Xml(format!(
                "Unexpected end of document inside element {}",
                frame.name
            )));
        }
        Ok(self.validator.end_document())
    }

    fn open(
        &mut self,
        reader: &NsReader<&[u8]>,
        name: QName,
        start: &BytesStart<'_>,
        stack: &mut [Frame],
    ) -> Result<Frame> {
        self.limits.check_xml_depth(stack.len() + 1)?;

        if let Some(parent) = stack.last_mut() {
            parent.has_children = true;
        }

        let mut nil = false;
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| Error::Xml(format!("Failed to parse attribute: {}", e)))?;
            if attr.key.as_namespace_binding().is_some() {
                continue;
            }
            let (attr_ns, local) = reader.resolve_attribute(attr.key);
            let attr_name = expanded_name(attr_ns, local.as_ref())?;
            let lexical: Cow<'_, str> = attr
                .unescape_value()
                .map_err(|e| Error::Xml(format!("Failed to unescape attribute value: {}", e)))?;

            if attr_name.namespace() == Some(XSI_NAMESPACE) && attr_name.local_name == "nil" {
                nil = matches!(lexical.trim(), "true" | "1");
            }
            let value = self.hints.attribute_value(&attr_name, &lexical);
            attributes.push((attr_name, value));
        }
        self.limits.check_attributes(attributes.len())?;

        self.validator.open_element(&name, &attributes);
        self.limits.check_open_scopes(self.validator.open_scope_count())?;

        Ok(Frame {
            name,
            nil,
            has_children: false,
            text: String::new(),
        })
    }

    fn close(&mut self, frame: Frame) -> Result<()> {
        if !frame.has_children {
            let value = if frame.nil {
                TypedValue::string(frame.text)
            } else {
                self.hints.element_value(&frame.name, &frame.text)
            };
            self.validator.character_content(&value, frame.nil);
        }
        self.validator.close_element(&frame.name);
        self.limits.check_deferred_keyrefs(self.validator.deferred_keyref_count())
    }
}

fn expanded_name(ns: ResolveResult<'_>, local: &[u8]) -> Result<QName> {
    let local = std::str::from_utf8(local)
        .map_err(|e| Error::Xml(format!("Invalid name: {}", e)))?;
    match ns {
        ResolveResult::Bound(namespace) => {
            let uri = std::str::from_utf8(namespace.as_ref())
                .map_err(|e| Error::Xml(format!("Invalid namespace URI: {}", e)))?;
            Ok(QName::namespaced(uri, local))
        }
        ResolveResult::Unbound => Ok(QName::local(local)),
        ResolveResult::Unknown(prefix) => Err(Error::Namespace(format!(
            "Unknown prefix: {}",
            String::from_utf8_lossy(&prefix)
        ))),
    }
}
