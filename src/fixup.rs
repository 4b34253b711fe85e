//! Whole-document normalization.
//!
//! Besides merging text, a pass over the document repairs namespace
//! declarations so every element and attribute name resolves to its
//! namespace URI where it sits, and reports content that could not be
//! serialized as well-formed XML. Nothing is rejected up front: each
//! problem becomes a [`Diagnostic`] and the walk carries on.

use log::{debug, trace};

use super::config::XmlVersion;
use super::dom::{Attribute, CDataSection, Document, Element, Node};
use super::error::{Error, Result};
use super::qname::{self, XMLNS_NS_URI, XML_NS_URI};
use super::str::XmlStr;

/// Which parts of the pass run. Text is always merged.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct NormalizeOptions {
    /// Add the `xmlns` declarations names need and re-prefix
    /// attributes whose prefix does not resolve.
    pub namespaces: bool,
    /// Split CDATA sections around `]]>` instead of reporting them.
    pub split_cdata_sections: bool,
    /// Check character data, comments, processing instructions and
    /// attribute values against the document's XML version.
    pub well_formed: bool,
}

impl Default for NormalizeOptions {
    fn default() -> NormalizeOptions {
        NormalizeOptions {
            namespaces: true,
            split_cdata_sections: true,
            well_formed: true,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Problem {
    /// A character the document's XML version does not allow.
    InvalidCharacter(char),
    /// A name that is not valid under the current XML version.
    InvalidName,
    DoubleHyphenInComment,
    /// A CDATA section contains `]]>` and splitting is off.
    CDataTerminator,
    CDataSectionSplit,
    /// An element or attribute created without namespace support.
    NoLocalName,
    /// A prefix declared for the XMLNS namespace itself.
    XmlnsBinding,
    /// A repair that the tree refused, such as on a read-only node.
    Rejected(Error),
}

/// One problem found while normalizing a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic<'d> {
    pub severity: Severity,
    pub problem: Problem,
    pub node: Node<'d>,
}

/// Prefix bindings in scope, innermost last.
#[derive(Debug)]
struct Bindings {
    bound: Vec<(Option<String>, String)>,
    scopes: Vec<usize>,
}

impl Bindings {
    fn new() -> Bindings {
        Bindings {
            bound: vec![(Some("xml".to_owned()), XML_NS_URI.to_owned())],
            scopes: Vec::new(),
        }
    }

    fn push_scope(&mut self) {
        self.scopes.push(self.bound.len());
    }

    fn pop_scope(&mut self) {
        if let Some(len) = self.scopes.pop() {
            self.bound.truncate(len);
        }
    }

    fn declare(&mut self, prefix: Option<&str>, uri: &str) {
        self.bound.push((prefix.map(str::to_owned), uri.to_owned()));
    }

    fn uri(&self, prefix: Option<&str>) -> Option<&str> {
        self.bound.iter().rev()
            .find(|(p, _)| p.as_deref() == prefix)
            .map(|(_, uri)| uri.as_str())
    }

    /// A prefix currently bound to `uri` and not shadowed.
    fn prefix(&self, uri: &str) -> Option<&str> {
        self.bound.iter().rev()
            .filter(|(_, u)| u == uri)
            .filter_map(|(p, _)| p.as_deref())
            .find(|&p| self.uri(Some(p)) == Some(uri))
    }

    fn declared_here(&self, prefix: &str) -> bool {
        let start = self.scopes.last().copied().unwrap_or(0);
        self.bound[start..].iter().any(|(p, _)| p.as_deref() == Some(prefix))
    }

    fn has_default(&self) -> bool {
        self.uri(None).map_or(false, |uri| !uri.is_empty())
    }
}

struct Fixup<'d> {
    document: Document<'d>,
    options: NormalizeOptions,
    version: XmlVersion,
    recheck_names: bool,
    bindings: Bindings,
    generated: usize,
    diagnostics: Vec<Diagnostic<'d>>,
}

pub(crate) fn normalize_document(document: Document<'_>, options: NormalizeOptions) -> Vec<Diagnostic<'_>> {
    document.root().as_node().normalize();

    let mut fixup = Fixup {
        document,
        options,
        version: document.xml_version(),
        recheck_names: document.with_tree(|t| t.properties.version_changed),
        bindings: Bindings::new(),
        generated: 0,
        diagnostics: Vec::new(),
    };
    fixup.children(document.root().as_node());
    document.with_tree(|t| t.properties.version_changed = false);

    debug!(target: "dom.normalize", "normalized document with {} diagnostics", fixup.diagnostics.len());
    fixup.diagnostics
}

fn attributes_of(element: Element<'_>) -> Vec<Attribute<'_>> {
    element.attributes().iter().filter_map(Node::attribute).collect()
}

impl<'d> Fixup<'d> {
    fn report(&mut self, severity: Severity, problem: Problem, node: Node<'d>) {
        trace!(target: "dom.normalize", "{:?} {:?} at {:?}", severity, problem, node);
        self.diagnostics.push(Diagnostic { severity, problem, node });
    }

    fn children(&mut self, parent: Node<'d>) {
        let mut child = parent.first_child();
        while let Some(node) = child {
            child = self.node(node).next_sibling();
        }
    }

    /// Returns the last node the visit left in place of `node`.
    fn node(&mut self, node: Node<'d>) -> Node<'d> {
        match node {
            Node::Element(element) => self.element(element),
            Node::Text(text) => self.check_text(node, text.data()),
            Node::CDataSection(section) => return self.cdata_section(section),
            Node::Comment(comment) => {
                let data = comment.data();
                self.check_text(node, data);
                if self.options.well_formed && (data.contains("--") || data.ends_with('-')) {
                    self.report(Severity::Error, Problem::DoubleHyphenInComment, node);
                }
            }
            Node::ProcessingInstruction(pi) => {
                self.check_name(node);
                self.check_text(node, pi.data());
            }
            Node::EntityReference(_) => self.check_name(node),
            _ => {}
        }
        node
    }

    fn check_text(&mut self, node: Node<'d>, data: &str) {
        if !self.options.well_formed {
            return;
        }
        if let Some(c) = data.first_invalid_char(self.version) {
            self.report(Severity::Error, Problem::InvalidCharacter(c), node);
        }
    }

    fn check_name(&mut self, node: Node<'d>) {
        if !self.recheck_names {
            return;
        }
        let name = node.node_name();
        let valid = match node.local_name() {
            Some(_) => qname::parse_qname(name, self.version).is_ok(),
            None => qname::check_name(name, self.version).is_ok(),
        };
        if !valid {
            self.report(Severity::Error, Problem::InvalidName, node);
        }
    }

    fn element(&mut self, element: Element<'d>) {
        self.check_name(element.as_node());
        if self.options.namespaces {
            self.bindings.push_scope();
            self.fix_namespaces(element);
        }

        for attribute in attributes_of(element) {
            self.check_name(attribute.as_node());
            self.check_text(attribute.as_node(), &attribute.value());
        }
        self.children(element.as_node());

        if self.options.namespaces {
            self.bindings.pop_scope();
        }
    }

    fn fix_namespaces(&mut self, element: Element<'d>) {
        let attributes = attributes_of(element);

        for &attribute in &attributes {
            if attribute.namespace_uri() != Some(XMLNS_NS_URI) {
                continue;
            }
            let value = attribute.value();
            if value == XMLNS_NS_URI {
                self.report(Severity::Error, Problem::XmlnsBinding, attribute.as_node());
                continue;
            }
            let prefix = attribute.prefix().and(attribute.local_name());
            self.bindings.declare(prefix, &value);
        }

        match element.namespace_uri() {
            Some(uri) => {
                let prefix = element.prefix();
                if self.bindings.uri(prefix) != Some(uri) {
                    self.declare(element, prefix, uri);
                }
            }
            None if element.local_name().is_none() => {
                self.report(Severity::Error, Problem::NoLocalName, element.as_node());
            }
            None => {
                if self.bindings.has_default() {
                    self.declare(element, None, "");
                }
            }
        }

        for attribute in attributes {
            let uri = match attribute.namespace_uri() {
                Some(XMLNS_NS_URI) => continue,
                Some(uri) => uri,
                None => {
                    if attribute.local_name().is_none() {
                        self.report(Severity::Error, Problem::NoLocalName, attribute.as_node());
                    }
                    continue;
                }
            };
            let prefix = attribute.prefix();
            if prefix.is_some() && self.bindings.uri(prefix) == Some(uri) {
                continue;
            }

            let bound = self.bindings.prefix(uri).map(str::to_owned);
            let chosen = match bound {
                Some(bound) => bound,
                None => {
                    let fresh = match prefix {
                        Some(p) if !self.bindings.declared_here(p) => p.to_owned(),
                        _ => self.fresh_prefix(),
                    };
                    self.declare(element, Some(fresh.as_str()), uri);
                    fresh
                }
            };
            let local = attribute.local_name().unwrap_or_else(|| attribute.name());
            let qualified = format!("{}:{}", chosen, local);
            if let Err(e) = self.document.rename_node(attribute, Some(uri), &qualified) {
                self.report(Severity::Error, Problem::Rejected(e), attribute.as_node());
            }
        }
    }

    fn fresh_prefix(&mut self) -> String {
        loop {
            self.generated += 1;
            let prefix = format!("NS{}", self.generated);
            if self.bindings.uri(Some(prefix.as_str())).is_none() {
                return prefix;
            }
        }
    }

    fn declare(&mut self, element: Element<'d>, prefix: Option<&str>, uri: &str) {
        let name = match prefix {
            Some(p) => format!("xmlns:{}", p),
            None => "xmlns".to_owned(),
        };
        match element.set_attribute_ns(Some(XMLNS_NS_URI), &name, uri) {
            Ok(_) => {
                trace!(target: "dom.normalize", "declared {} = {:?} on {:?}", name, uri, element);
                self.bindings.declare(prefix, uri);
            }
            Err(e) => self.report(Severity::Error, Problem::Rejected(e), element.as_node()),
        }
    }

    fn cdata_section(&mut self, section: CDataSection<'d>) -> Node<'d> {
        let node = section.as_node();
        let data = section.data();
        self.check_text(node, data);
        if !data.contains("]]>") {
            return node;
        }
        if !self.options.split_cdata_sections {
            self.report(Severity::Error, Problem::CDataTerminator, node);
            return node;
        }
        match self.split(section, data) {
            Ok(last) => {
                self.report(Severity::Warning, Problem::CDataSectionSplit, node);
                last
            }
            Err(e) => {
                self.report(Severity::Error, Problem::Rejected(e), node);
                node
            }
        }
    }

    /// Break the section after each `]]` of a `]]>`, so the `>` opens
    /// the next section.
    fn split(&self, section: CDataSection<'d>, data: &str) -> Result<Node<'d>> {
        let pieces: Vec<&str> = data.split("]]>").collect();
        let last = pieces.len() - 1;
        let mut texts = pieces.iter().enumerate().map(|(i, piece)| {
            let open = if i == 0 { "" } else { ">" };
            let close = if i == last { "" } else { "]]" };
            format!("{}{}{}", open, piece, close)
        });

        let parent = match section.parent() {
            Some(parent) => parent,
            None => return Ok(section.as_node()),
        };
        if let Some(first) = texts.next() {
            section.set_data(&first)?;
        }
        let mut previous = section.as_node();
        for text in texts {
            let piece = self.document.create_cdata_section(&text);
            parent.insert_before(piece, previous.next_sibling())?;
            previous = piece.as_node();
        }
        Ok(previous)
    }
}
