//! Per-document settings.

/// The XML version whose name rules a document enforces.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum XmlVersion {
    V1_0,
    V1_1,
}

impl Default for XmlVersion {
    fn default() -> XmlVersion { XmlVersion::V1_0 }
}

impl XmlVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            XmlVersion::V1_0 => "1.0",
            XmlVersion::V1_1 => "1.1",
        }
    }
}

/// Settings chosen when a `Package` is created.
///
/// ```
/// use sxd_dom_core::{Config, Package, XmlVersion};
///
/// let config = Config { xml_version: XmlVersion::V1_1, ..Config::default() };
/// let package = Package::with_config(config);
/// assert_eq!(XmlVersion::V1_1, package.as_document().xml_version());
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Config {
    /// Run the precondition checks of every mutation. Turning this off
    /// trades safety for speed when the caller is known to build a
    /// well-formed tree, such as a parser.
    pub error_checking: bool,
    pub xml_version: XmlVersion,
    /// Keep a per-parent position cache for live child lists.
    pub child_list_cache: bool,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            error_checking: true,
            xml_version: XmlVersion::V1_0,
            child_list_cache: true,
        }
    }
}
