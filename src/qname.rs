//! Splitting and checking qualified names.
//!
//! A qualified name is either `local` or `prefix:local`, where both
//! parts are `NCName`s. The parsing is done with `peresil` string
//! points so that each step reports how far it got.

use peresil::{Progress, Status, StringPoint};

use super::config::XmlVersion;
use super::error::{Error, Result};
use super::str::XmlStr;

pub const XML_NS_URI: &str = "http://www.w3.org/XML/1998/namespace";
pub const XMLNS_NS_URI: &str = "http://www.w3.org/2000/xmlns/";

/// The parts of a successfully parsed qualified name.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PrefixedName<'a> {
    pub prefix: Option<&'a str>,
    pub local_part: &'a str,
}

type NameProgress<'a> = Progress<StringPoint<'a>, &'a str, ()>;

fn consume_ncname(pt: StringPoint<'_>, version: XmlVersion) -> NameProgress<'_> {
    pt.consume_to(pt.s.end_of_ncname(version))
}

fn namespace_error(name: &str, reason: &'static str) -> Error {
    Error::Namespace { name: name.to_owned(), reason }
}

fn invalid_character(name: &str) -> Error {
    Error::InvalidCharacter { name: name.to_owned() }
}

/// Check a name that is not namespace-aware, such as the name given to
/// `create_element` or `create_entity_reference`.
pub fn check_name(name: &str, version: XmlVersion) -> Result<()> {
    if name.is_xml_name(version) {
        Ok(())
    } else {
        Err(invalid_character(name))
    }
}

/// Split a qualified name into its prefix and local part, validating
/// the colon structure and the characters of both parts.
pub fn parse_qname(name: &str, version: XmlVersion) -> Result<PrefixedName<'_>> {
    check_name(name, version)?;

    let colons = name.matches(':').count();
    if name.starts_with(':') || name.ends_with(':') || colons > 1 {
        return Err(namespace_error(name, "a qualified name has at most one inner colon"));
    }

    let start = StringPoint::new(name);

    let (after_first, first) = match consume_ncname(start, version) {
        Progress { point, status: Status::Success(v) } => (point, v),
        Progress { status: Status::Failure(()), .. } => return Err(invalid_character(name)),
    };

    if after_first.is_empty() {
        return Ok(PrefixedName { prefix: None, local_part: first });
    }

    let after_colon = match after_first.consume_literal(":") {
        Progress { point, status: Status::Success(_) } => point,
        Progress { status: Status::Failure(()), .. } => return Err(invalid_character(name)),
    };

    match consume_ncname(after_colon, version) {
        Progress { point, status: Status::Success(local_part) } if point.is_empty() => {
            Ok(PrefixedName { prefix: Some(first), local_part })
        }
        _ => Err(invalid_character(name)),
    }
}

/// Split a qualified name without any validation, for documents that
/// have error checking turned off.
pub fn split_unchecked(name: &str) -> PrefixedName<'_> {
    match name.find(':') {
        Some(idx) => PrefixedName { prefix: Some(&name[..idx]), local_part: &name[idx + 1..] },
        None => PrefixedName { prefix: None, local_part: name },
    }
}

/// Apply the namespace constraints that tie prefixes to URIs.
pub fn check_namespace(name: &str, parts: PrefixedName<'_>, namespace_uri: Option<&str>) -> Result<()> {
    let is_xmlns = parts.prefix == Some("xmlns") || (parts.prefix.is_none() && parts.local_part == "xmlns");

    if parts.prefix.is_some() && namespace_uri.is_none() {
        return Err(namespace_error(name, "a prefix requires a namespace URI"));
    }
    if parts.prefix == Some("xml") && namespace_uri != Some(XML_NS_URI) {
        return Err(namespace_error(name, "the xml prefix is bound to the XML namespace"));
    }
    if is_xmlns && namespace_uri != Some(XMLNS_NS_URI) {
        return Err(namespace_error(name, "xmlns is bound to the XMLNS namespace"));
    }
    if !is_xmlns && namespace_uri == Some(XMLNS_NS_URI) {
        return Err(namespace_error(name, "the XMLNS namespace may only be used with xmlns"));
    }
    Ok(())
}

/// Parse and check a namespace-aware name in one step. An empty
/// namespace URI is treated as no namespace.
pub fn resolve<'a>(
    name: &'a str,
    namespace_uri: Option<&str>,
    version: XmlVersion,
    error_checking: bool,
) -> Result<PrefixedName<'a>> {
    if !error_checking {
        return Ok(split_unchecked(name));
    }

    let namespace_uri = namespace_uri.filter(|ns| !ns.is_empty());
    let parts = parse_qname(name, version)?;
    check_namespace(name, parts, namespace_uri)?;
    Ok(parts)
}
