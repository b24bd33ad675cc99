//! Window lexer
//!
//! Pull-style lexer over a closed byte window: every markup construct that
//! starts inside the window also ends inside it (the streaming layer
//! guarantees this via its boundary search). The lexer is resumable across
//! windows: the open-element stack and the absolute base offset are handed
//! back in via [`Lexer::resume`].
//!
//! All spans and error offsets are absolute positions in the source stream.

use std::collections::VecDeque;

use super::attributes::parse_attributes;
use super::cursor::Cursor;
use super::events::ScanEvent;
use crate::error::SplitError;

/// Pull lexer producing [`ScanEvent`]s from a byte window
pub struct Lexer<'a> {
    cur: Cursor<'a>,
    base: usize,
    open: Vec<Vec<u8>>,
    pending: VecDeque<ScanEvent<'a>>,
    failed: bool,
}

impl<'a> Lexer<'a> {
    /// Create a lexer over a complete document or a first window
    pub fn new(window: &'a [u8]) -> Self {
        Lexer::resume(window, 0, Vec::new())
    }

    /// Continue lexing a later window: `base` is the absolute offset of the
    /// window start, `open` the element stack handed back by [`into_open`].
    ///
    /// [`into_open`]: Lexer::into_open
    pub fn resume(window: &'a [u8], base: usize, open: Vec<Vec<u8>>) -> Self {
        Lexer {
            cur: Cursor::new(window),
            base,
            open,
            pending: VecDeque::new(),
            failed: false,
        }
    }

    /// Current element nesting depth
    #[inline]
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    /// Name of the innermost open element, if any
    #[inline]
    pub fn innermost(&self) -> Option<&[u8]> {
        self.open.last().map(|n| n.as_slice())
    }

    /// Hand the open-element stack back for the next window
    pub fn into_open(self) -> Vec<Vec<u8>> {
        self.open
    }

    /// Check that no elements remain open; used when the window is the
    /// entire document.
    pub fn finish(&self) -> Result<(), SplitError> {
        if let Some(name) = self.open.last() {
            return Err(SplitError::malformed(
                self.base + self.cur.position(),
                format!(
                    "input ended with unclosed element <{}>",
                    String::from_utf8_lossy(name)
                ),
            ));
        }
        Ok(())
    }

    /// Get the next event, or None at the end of the window
    ///
    /// After an error no further events are produced.
    pub fn next_event(&mut self) -> Result<Option<ScanEvent<'a>>, SplitError> {
        if self.failed {
            return Ok(None);
        }
        if let Some(ev) = self.pending.pop_front() {
            return Ok(Some(ev));
        }
        if self.cur.is_eof() {
            return Ok(None);
        }

        let result = match self.cur.peek() {
            Some(b'<') => self.scan_markup(),
            _ => self.scan_text(),
        };
        if result.is_err() {
            self.failed = true;
        }
        result
    }

    fn scan_text(&mut self) -> Result<Option<ScanEvent<'a>>, SplitError> {
        let start = self.cur.position();
        let end = self
            .cur
            .find_byte(b'<')
            .unwrap_or(start + self.cur.remaining().len());
        self.cur.set_position(end);
        Ok(Some(ScanEvent::Text {
            content: self.cur.slice(start, end),
            span: (self.base + start, self.base + end),
        }))
    }

    fn scan_markup(&mut self) -> Result<Option<ScanEvent<'a>>, SplitError> {
        let start = self.cur.position();
        self.cur.advance(1); // Skip '<'

        match self.cur.peek() {
            Some(b'/') => self.scan_end_tag(start),
            Some(b'!') => self.scan_bang_markup(start),
            Some(b'?') => self.scan_pi(start),
            Some(_) => self.scan_start_tag(start),
            None => Err(SplitError::malformed(
                self.base + start,
                "input ended inside markup",
            )),
        }
    }

    fn scan_start_tag(&mut self, start: usize) -> Result<Option<ScanEvent<'a>>, SplitError> {
        let name = self.cur.read_name().ok_or_else(|| {
            SplitError::malformed(self.base + self.cur.position(), "invalid element name")
        })?;
        let name_end = self.cur.position();

        let gt = self.cur.find_tag_end_quoted().ok_or_else(|| {
            SplitError::malformed(self.base + start, "unterminated start tag")
        })?;

        let self_closing = gt > name_end && self.cur.slice(gt - 1, gt) == b"/";
        let attrs_end = if self_closing { gt - 1 } else { gt };
        let attr_slice = self.cur.slice(name_end, attrs_end);

        let attrs = parse_attributes(attr_slice).map_err(|off| {
            SplitError::malformed(
                self.base + name_end + off,
                "attribute value not properly quoted",
            )
        })?;

        for attr in attrs {
            self.pending.push_back(ScanEvent::Attribute {
                name: attr.name,
                value: attr.value,
                raw_value: attr.raw_value,
                span: (
                    self.base + name_end + attr.offset,
                    self.base + name_end + attr.end,
                ),
            });
        }
        let close_start = if self_closing { gt - 1 } else { gt };
        self.pending.push_back(ScanEvent::StartTagClose {
            self_closing,
            span: (self.base + close_start, self.base + gt + 1),
        });

        if !self_closing {
            self.open.push(name.to_vec());
        }
        self.cur.set_position(gt + 1);

        Ok(Some(ScanEvent::StartTagOpen {
            name,
            span: (self.base + start, self.base + name_end),
        }))
    }

    fn scan_end_tag(&mut self, start: usize) -> Result<Option<ScanEvent<'a>>, SplitError> {
        self.cur.advance(1); // Skip '/'
        let name = self.cur.read_name().ok_or_else(|| {
            SplitError::malformed(self.base + self.cur.position(), "invalid end tag name")
        })?;
        let gt = self
            .cur
            .find_byte(b'>')
            .ok_or_else(|| SplitError::malformed(self.base + start, "unterminated end tag"))?;

        match self.open.pop() {
            Some(open_name) if open_name == name => {}
            Some(open_name) => {
                return Err(SplitError::malformed(
                    self.base + start,
                    format!(
                        "end tag </{}> does not match open element <{}>",
                        String::from_utf8_lossy(name),
                        String::from_utf8_lossy(&open_name)
                    ),
                ));
            }
            None => {
                return Err(SplitError::malformed(
                    self.base + start,
                    format!(
                        "end tag </{}> without matching start tag",
                        String::from_utf8_lossy(name)
                    ),
                ));
            }
        }

        self.cur.set_position(gt + 1);
        Ok(Some(ScanEvent::EndTag {
            name,
            span: (self.base + start, self.base + gt + 1),
        }))
    }

    fn scan_bang_markup(&mut self, start: usize) -> Result<Option<ScanEvent<'a>>, SplitError> {
        self.cur.advance(1); // Skip '!'

        if self.cur.starts_with(b"--") {
            self.scan_comment(start)
        } else if self.cur.starts_with(b"[CDATA[") {
            self.scan_cdata(start)
        } else if self.cur.starts_with(b"DOCTYPE") {
            self.scan_doctype(start)
        } else {
            Err(SplitError::malformed(
                self.base + start,
                "unrecognized markup declaration",
            ))
        }
    }

    fn scan_comment(&mut self, start: usize) -> Result<Option<ScanEvent<'a>>, SplitError> {
        self.cur.advance(2); // Skip '--'
        loop {
            let pos = self.cur.find_byte(b'-').ok_or_else(|| {
                SplitError::malformed(self.base + start, "unterminated comment")
            })?;
            self.cur.set_position(pos);
            if self.cur.starts_with(b"-->") {
                self.cur.advance(3);
                return Ok(Some(ScanEvent::Comment {
                    span: (self.base + start, self.base + self.cur.position()),
                }));
            }
            self.cur.advance(1);
        }
    }

    fn scan_cdata(&mut self, start: usize) -> Result<Option<ScanEvent<'a>>, SplitError> {
        self.cur.advance(7); // Skip '[CDATA['
        let content_start = self.cur.position();
        loop {
            let pos = self.cur.find_byte(b']').ok_or_else(|| {
                SplitError::malformed(self.base + start, "unterminated CDATA section")
            })?;
            self.cur.set_position(pos);
            if self.cur.starts_with(b"]]>") {
                let content = self.cur.slice(content_start, pos);
                self.cur.advance(3);
                // CDATA rides along as text: the content is opaque to
                // matching, and the span keeps the raw markers.
                return Ok(Some(ScanEvent::Text {
                    content,
                    span: (self.base + start, self.base + self.cur.position()),
                }));
            }
            self.cur.advance(1);
        }
    }

    fn scan_pi(&mut self, start: usize) -> Result<Option<ScanEvent<'a>>, SplitError> {
        self.cur.advance(1); // Skip '?'
        loop {
            let pos = self.cur.find_byte(b'?').ok_or_else(|| {
                SplitError::malformed(self.base + start, "unterminated processing instruction")
            })?;
            self.cur.set_position(pos);
            if self.cur.starts_with(b"?>") {
                self.cur.advance(2);
                return Ok(Some(ScanEvent::ProcessingInstruction {
                    span: (self.base + start, self.base + self.cur.position()),
                }));
            }
            self.cur.advance(1);
        }
    }

    /// DOCTYPE is tolerated between elements and passed through like a
    /// processing instruction; the internal subset brackets are honored.
    fn scan_doctype(&mut self, start: usize) -> Result<Option<ScanEvent<'a>>, SplitError> {
        self.cur.advance(7); // Skip 'DOCTYPE'
        let mut in_subset = false;
        while let Some(b) = self.cur.peek() {
            match b {
                b'[' => in_subset = true,
                b']' => in_subset = false,
                b'>' if !in_subset => {
                    self.cur.advance(1);
                    return Ok(Some(ScanEvent::ProcessingInstruction {
                        span: (self.base + start, self.base + self.cur.position()),
                    }));
                }
                _ => {}
            }
            self.cur.advance(1);
        }
        Err(SplitError::malformed(
            self.base + start,
            "unterminated DOCTYPE declaration",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(input: &[u8]) -> Vec<ScanEvent<'_>> {
        let mut lexer = Lexer::new(input);
        let mut events = Vec::new();
        while let Some(ev) = lexer.next_event().unwrap() {
            events.push(ev);
        }
        events
    }

    #[test]
    fn test_simple_element() {
        let events = collect(b"<root>hello</root>");
        assert_eq!(events.len(), 4);
        assert!(matches!(events[0], ScanEvent::StartTagOpen { name: b"root", .. }));
        assert!(matches!(
            events[1],
            ScanEvent::StartTagClose { self_closing: false, .. }
        ));
        assert!(matches!(events[2], ScanEvent::Text { content: b"hello", .. }));
        assert!(matches!(events[3], ScanEvent::EndTag { name: b"root", .. }));
    }

    #[test]
    fn test_attributes_are_events() {
        let events = collect(b"<div id=\"main\" class=\"c\"/>");
        assert_eq!(events.len(), 4);
        assert!(matches!(events[1], ScanEvent::Attribute { name: b"id", .. }));
        assert!(matches!(events[2], ScanEvent::Attribute { name: b"class", .. }));
        assert!(matches!(
            events[3],
            ScanEvent::StartTagClose { self_closing: true, .. }
        ));
    }

    #[test]
    fn test_spans_are_absolute() {
        let input = b"<a><b>x</b></a>";
        let mut lexer = Lexer::new(input);
        let mut last_end = 0;
        while let Some(ev) = lexer.next_event().unwrap() {
            let (start, end) = ev.span();
            assert!(start <= end);
            assert!(end <= input.len());
            last_end = last_end.max(end);
        }
        assert_eq!(last_end, input.len());
    }

    #[test]
    fn test_mismatched_end_tag() {
        let mut lexer = Lexer::new(b"<a><b></a>");
        let mut err = None;
        loop {
            match lexer.next_event() {
                Ok(Some(_)) => continue,
                Ok(None) => break,
                Err(e) => {
                    err = Some(e);
                    break;
                }
            }
        }
        assert!(matches!(err, Some(SplitError::MalformedMarkup { .. })));
    }

    #[test]
    fn test_unclosed_elements_at_finish() {
        let mut lexer = Lexer::new(b"<a><b>");
        while let Some(_) = lexer.next_event().unwrap() {}
        assert!(lexer.finish().is_err());
    }

    #[test]
    fn test_xml_declaration_and_comment_pass_through() {
        let events = collect(b"<?xml version=\"1.0\"?><!-- note --><r/>");
        assert!(matches!(events[0], ScanEvent::ProcessingInstruction { .. }));
        assert!(matches!(events[1], ScanEvent::Comment { .. }));
        assert!(matches!(events[2], ScanEvent::StartTagOpen { name: b"r", .. }));
    }

    #[test]
    fn test_cdata_rides_as_text() {
        let events = collect(b"<s><![CDATA[a<b]]></s>");
        assert!(matches!(
            events[2],
            ScanEvent::Text { content: b"a<b", .. }
        ));
    }

    #[test]
    fn test_resume_across_windows() {
        let doc: &[u8] = b"<a><b>x</b></a>";
        let mut lexer = Lexer::new(&doc[..6]); // "<a><b>"
        while let Some(_) = lexer.next_event().unwrap() {}
        assert_eq!(lexer.depth(), 2);

        let open = lexer.into_open();
        let mut lexer = Lexer::resume(&doc[6..], 6, open);
        let mut names = Vec::new();
        while let Some(ev) = lexer.next_event().unwrap() {
            if let ScanEvent::EndTag { name, span } = ev {
                names.push((name.to_vec(), span));
            }
        }
        assert_eq!(names[0], (b"b".to_vec(), (7, 11)));
        assert_eq!(names[1], (b"a".to_vec(), (11, 15)));
        assert_eq!(lexer.depth(), 0);
    }

    #[test]
    fn test_doctype_tolerated() {
        let events = collect(b"<!DOCTYPE r [<!ENTITY x \"y\">]><r/>");
        assert!(matches!(events[0], ScanEvent::ProcessingInstruction { .. }));
        assert!(matches!(events[1], ScanEvent::StartTagOpen { name: b"r", .. }));
    }
}
