#![forbid(unsafe_code)]

//! XML writing through uppsala's XmlWriter, used to build the `Signature`
//! element.

use nfeouro_core::Error;

/// Streaming writer over `uppsala::XmlWriter` that checks element nesting.
pub struct XmlWriter {
    writer: uppsala::XmlWriter,
    open: Vec<String>,
}

impl XmlWriter {
    pub fn new() -> Self {
        Self {
            writer: uppsala::XmlWriter::new(),
            open: Vec::new(),
        }
    }

    /// Start an element with the given name and attributes.
    pub fn start_element(&mut self, name: &str, attrs: &[(&str, &str)]) {
        self.writer.start_element(name, attrs);
        self.open.push(name.to_owned());
    }

    /// Write a self-closing element.
    pub fn empty_element(&mut self, name: &str, attrs: &[(&str, &str)]) {
        self.writer.empty_element(name, attrs);
    }

    /// Write `<name>text</name>`.
    pub fn text_element(&mut self, name: &str, text: &str) -> Result<(), Error> {
        self.start_element(name, &[]);
        self.text(text);
        self.end_element(name)
    }

    /// End the current element; `name` must match the open one.
    pub fn end_element(&mut self, name: &str) -> Result<(), Error> {
        match self.open.pop() {
            Some(open) if open == name => {
                self.writer.end_element(name);
                Ok(())
            }
            Some(open) => Err(Error::XmlStructure(format!(
                "closing <{name}> while <{open}> is open"
            ))),
            None => Err(Error::XmlStructure(format!(
                "closing <{name}> with no open element"
            ))),
        }
    }

    /// Write escaped character data.
    pub fn text(&mut self, text: &str) {
        self.writer.text(text);
    }

    /// Finish writing; fails if an element is still open.
    pub fn into_string(self) -> Result<String, Error> {
        if let Some(open) = self.open.last() {
            return Err(Error::XmlStructure(format!("<{open}> was never closed")));
        }
        Ok(self.writer.into_string())
    }
}

impl Default for XmlWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for XmlWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XmlWriter").field("open", &self.open).finish()
    }
}
