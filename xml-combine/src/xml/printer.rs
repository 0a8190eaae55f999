//! XML printer that outputs element trees.
//!
//! Output is deterministic: attributes are written in stored order and the
//! namespace declarations handed to [`XmlPrinter::print_document`] are
//! written on the root element only.

use std::io::Write;

use crate::constants::XML_DECLARATION;
use crate::node::Element;

/// Options for XML printing.
#[derive(Debug, Clone, Default)]
pub struct XmlPrinterOptions {
    /// Whether to pretty-print with indentation.
    pub pretty_print: bool,
}

/// XML printer that outputs element trees.
pub struct XmlPrinter<W: Write> {
    writer: W,
    options: XmlPrinterOptions,
}

impl<W: Write> XmlPrinter<W> {
    /// Creates a new XML printer.
    pub fn new(writer: W) -> Self {
        Self::with_options(writer, XmlPrinterOptions::default())
    }

    /// Creates a new XML printer with the given options.
    pub fn with_options(writer: W, options: XmlPrinterOptions) -> Self {
        XmlPrinter { writer, options }
    }

    /// Prints a complete document: declaration, then `root` carrying the
    /// given namespace declarations as (attribute name, uri) pairs.
    pub fn print_document(
        &mut self,
        root: &Element,
        namespace_decls: &[(String, String)],
    ) -> std::io::Result<()> {
        writeln!(self.writer, "{XML_DECLARATION}")?;
        self.print_element(root, namespace_decls, 0)?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn print_element(
        &mut self,
        element: &Element,
        extra_attrs: &[(String, String)],
        level: usize,
    ) -> std::io::Result<()> {
        let qname = element.tag();
        write!(self.writer, "<{qname}")?;

        let attrs = extra_attrs
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
            .chain(
                element
                    .attributes()
                    .iter()
                    .map(|(name, value)| (name.as_str(), value.as_str())),
            );
        for (name, value) in attrs {
            write!(self.writer, " {}=\"{}\"", name, to_entities(value, true))?;
        }

        if element.is_empty() {
            // No content - use self-closing tag
            return write!(self.writer, " />");
        }
        write!(self.writer, ">")?;

        // Indenting inside mixed content would change the text
        let indent = self.options.pretty_print && !element.has_mixed_content();

        if let Some(text) = element.text() {
            write!(self.writer, "{}", to_entities(text, false))?;
        }
        for child in element.children() {
            if indent {
                writeln!(self.writer)?;
                write!(self.writer, "{}", indent_str(level + 1))?;
            }
            self.print_element(child, &[], level + 1)?;
            if let Some(tail) = child.tail() {
                write!(self.writer, "{}", to_entities(tail, false))?;
            }
        }
        if indent && element.child_count() > 0 {
            writeln!(self.writer)?;
            write!(self.writer, "{}", indent_str(level))?;
        }

        write!(self.writer, "</{qname}>")
    }
}

fn indent_str(level: usize) -> String {
    "  ".repeat(level)
}

/// Converts special characters to XML entities.
///
/// Inside attribute values, line breaks and tabs are written as character
/// references so they survive attribute-value normalization.
fn to_entities(s: &str, attribute: bool) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '\'' => result.push_str("&apos;"),
            '"' => result.push_str("&quot;"),
            '\n' if attribute => result.push_str("&#10;"),
            '\r' => result.push_str("&#13;"),
            '\t' if attribute => result.push_str("&#9;"),
            _ => result.push(c),
        }
    }
    result
}

/// Prints an element as a complete document to a string.
pub fn print_to_string(root: &Element) -> std::io::Result<String> {
    let mut output = Vec::new();
    XmlPrinter::new(&mut output).print_document(root, &[])?;
    Ok(String::from_utf8_lossy(&output).to_string())
}

/// Prints an element as a complete document to a string with pretty printing.
pub fn print_to_string_pretty(root: &Element) -> std::io::Result<String> {
    let mut output = Vec::new();
    let options = XmlPrinterOptions { pretty_print: true };
    XmlPrinter::with_options(&mut output, options).print_document(root, &[])?;
    Ok(String::from_utf8_lossy(&output).to_string())
}
