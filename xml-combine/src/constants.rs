//! Constants used throughout xml-combine.
//!
//! The defaults here are shared by [`CombineOptions`](crate::CombineOptions)
//! and the command-line front end.

/// Default name of the synthetic root element of the combined document.
pub const DEFAULT_ROOT_ELEMENT: &str = "combined";

/// Default output file name.
pub const DEFAULT_OUTPUT: &str = "combined.xml";

/// Default number of parse attempts per file.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Suffix appended to the root element name to build the wrapper used for
/// files with more than one top-level element.
pub const WRAPPER_SUFFIX: &str = "_wrapper";

/// File name suffix (compared case-insensitively) of candidate input files.
pub const XML_SUFFIX: &str = ".xml";

/// Attribute name of a default namespace declaration.
pub const XMLNS: &str = "xmlns";

/// Reserved prefix bound to [`XML_NAMESPACE`]; never registered.
pub const XML_PREFIX: &str = "xml";

/// Namespace URI permanently bound to the `xml` prefix.
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// XML declaration written at the top of every output document.
pub const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>";
