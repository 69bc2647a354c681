//! Forward-only XMLTV stream writer
//!
//! Thin sequencing layer over the quick-xml event writer. The adapter tracks
//! only the stack of currently open element names, so memory usage is bounded
//! by nesting depth (at most four for XMLTV), not by document size. That
//! bound is what keeps a multi-hundred-thousand-programme export stable.
//!
//! Text and attribute escaping for the XML reserved characters is delegated
//! to quick-xml's event types.

use std::io::Write;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::errors::{ExportError, ScopeError};
use crate::xmltv::builders::Instruction;

/// Streaming writer with strict LIFO scope discipline.
pub struct XmltvWriter<W: Write> {
    writer: Writer<W>,
    open: Vec<&'static str>,
}

impl<W: Write> XmltvWriter<W> {
    /// Wrap a sink and emit the XML declaration.
    ///
    /// Output is not pretty-printed: the document is a machine-to-machine
    /// artifact and contiguous markup keeps text content byte-exact.
    pub fn new(sink: W) -> Result<Self, ExportError> {
        let mut writer = Writer::new(sink);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        Ok(Self {
            writer,
            open: Vec::new(),
        })
    }

    /// Open a nested scope with the given attributes.
    pub fn open_scope(
        &mut self,
        name: &'static str,
        attrs: &[(&'static str, String)],
    ) -> Result<(), ExportError> {
        let mut start = BytesStart::new(name);
        for (key, value) in attrs {
            start.push_attribute((*key, value.as_str()));
        }
        self.writer.write_event(Event::Start(start))?;
        self.open.push(name);
        Ok(())
    }

    /// Close the most recently opened scope.
    pub fn close_scope(&mut self) -> Result<(), ExportError> {
        let name = self.open.pop().ok_or(ScopeError::Underflow)?;
        self.writer.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }

    /// Write text content inside the current scope.
    pub fn write_text(&mut self, value: &str) -> Result<(), ExportError> {
        if self.open.is_empty() {
            return Err(ScopeError::TextOutsideScope.into());
        }
        self.writer.write_event(Event::Text(BytesText::new(value)))?;
        Ok(())
    }

    /// Emit a self-closing element with the given attributes.
    pub fn self_closing(
        &mut self,
        name: &'static str,
        attrs: &[(&'static str, String)],
    ) -> Result<(), ExportError> {
        let mut start = BytesStart::new(name);
        for (key, value) in attrs {
            start.push_attribute((*key, value.as_str()));
        }
        self.writer.write_event(Event::Empty(start))?;
        Ok(())
    }

    /// Execute a builder's instruction sequence in order.
    pub fn execute(&mut self, instructions: &[Instruction]) -> Result<(), ExportError> {
        for instruction in instructions {
            match instruction {
                Instruction::Open { name, attrs } => self.open_scope(name, attrs)?,
                Instruction::Text(value) => self.write_text(value)?,
                Instruction::Close => self.close_scope()?,
                Instruction::SelfClosing { name, attrs } => self.self_closing(name, attrs)?,
            }
        }
        Ok(())
    }

    /// Finish the stream, returning the sink.
    ///
    /// Any scope still open at this point is a defect in the calling code.
    pub fn finish(mut self) -> Result<W, ExportError> {
        if !self.open.is_empty() {
            return Err(ScopeError::UnclosedScopes {
                depth: self.open.len(),
            }
            .into());
        }
        // Trailing newline so the document ends like a text file should.
        self.writer.get_mut().write_all(b"\n")?;
        Ok(self.writer.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn into_string(writer: XmltvWriter<Vec<u8>>) -> String {
        String::from_utf8(writer.finish().unwrap()).unwrap()
    }

    #[test]
    fn writes_nested_scopes_in_order() {
        let mut writer = XmltvWriter::new(Vec::new()).unwrap();
        writer.open_scope("tv", &[]).unwrap();
        writer
            .open_scope("channel", &[("id", "5.1".to_string())])
            .unwrap();
        writer.open_scope("display-name", &[]).unwrap();
        writer.write_text("KTTV").unwrap();
        writer.close_scope().unwrap();
        writer.close_scope().unwrap();
        writer.close_scope().unwrap();

        let xml = into_string(writer);
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("<channel id=\"5.1\">"));
        assert!(xml.contains("<display-name>KTTV</display-name>"));
        assert!(xml.trim_end().ends_with("</tv>"));
    }

    #[test]
    fn escapes_reserved_characters() {
        let mut writer = XmltvWriter::new(Vec::new()).unwrap();
        writer
            .open_scope("tv", &[("note", "a \"quoted\" <value> & more".to_string())])
            .unwrap();
        writer.write_text("Tom & Jerry <uncut>").unwrap();
        writer.close_scope().unwrap();

        let xml = into_string(writer);
        assert!(xml.contains("Tom &amp; Jerry &lt;uncut&gt;"));
        assert!(xml.contains("&quot;quoted&quot;"));
        assert!(!xml.contains("<uncut>"));
    }

    #[test]
    fn close_without_open_is_a_scope_error() {
        let mut writer = XmltvWriter::new(Vec::new()).unwrap();
        let err = writer.close_scope().unwrap_err();
        assert!(matches!(
            err,
            ExportError::Scope(ScopeError::Underflow)
        ));
    }

    #[test]
    fn text_outside_scope_is_a_scope_error() {
        let mut writer = XmltvWriter::new(Vec::new()).unwrap();
        let err = writer.write_text("orphan").unwrap_err();
        assert!(matches!(
            err,
            ExportError::Scope(ScopeError::TextOutsideScope)
        ));
    }

    #[test]
    fn finishing_with_open_scopes_is_a_scope_error() {
        let mut writer = XmltvWriter::new(Vec::new()).unwrap();
        writer.open_scope("tv", &[]).unwrap();
        writer.open_scope("channel", &[]).unwrap();
        let err = writer.finish().unwrap_err();
        assert!(matches!(
            err,
            ExportError::Scope(ScopeError::UnclosedScopes { depth: 2 })
        ));
    }

    #[test]
    fn self_closing_element_with_attributes() {
        let mut writer = XmltvWriter::new(Vec::new()).unwrap();
        writer.open_scope("channel", &[]).unwrap();
        writer
            .self_closing("icon", &[("src", "https://example.com/logo.png".to_string())])
            .unwrap();
        writer.close_scope().unwrap();

        let xml = into_string(writer);
        assert!(xml.contains("<icon src=\"https://example.com/logo.png\"/>"));
    }
}
