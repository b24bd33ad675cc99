//! Streaming element tokenizer
//!
//! Stateful splitter that consumes the input in chunks with bounded memory:
//! chunks append to a buffer, the buffer is processed up to the last safe
//! cut point, and processed bytes are drained. Only the text of the match
//! currently being captured is retained across cut points; everything
//! scanned while merely seeking is dropped.

use std::collections::VecDeque;

use log::{debug, trace};
use memchr::{memchr, memmem};

use crate::config::{SplitConfig, SplitMode};
use crate::core::cursor::split_name;
use crate::core::events::{ScanEvent, Span};
use crate::core::lexer::Lexer;
use crate::core::namespace::{NamespaceStack, NsBinding};
use crate::error::SplitError;
use crate::fragment::Fragment;
use crate::reader::Source;

/// Tokenizer state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Scanning, depth tracked, no match open
    Seeking,
    /// Inside a matched element, capturing its raw span
    Accumulating,
    /// One or more completed matches held until the group size is reached
    GroupBuffering,
    /// Input consumed cleanly; no further fragments
    Done,
    /// Terminal failure; no further events are consumed
    Failed,
}

/// Accumulator for the match currently being captured
struct MatchBuilder {
    /// Match bytes carried over from drained windows
    accumulated: Vec<u8>,
    /// Where the match starts in the current buffer
    start_in_buffer: usize,
    /// Absolute offset of the match start
    start_abs: usize,
    /// Element-stack depth the match root sits on
    home_depth: usize,
    /// Splice offset for inherited declarations, relative to the match
    /// start; set when the root start tag closes
    insert_rel: Option<usize>,
    /// Ancestor declarations the fragment needs to be self-contained
    inherited: Vec<NsBinding>,
}

/// Attributes of the start tag currently being assembled from events
struct PendingTag {
    name: Vec<u8>,
    start: usize,
    match_root: bool,
    /// xmlns declarations found on this tag
    decls: Vec<NsBinding>,
    /// Prefixes those declarations bind
    declared: Vec<Vec<u8>>,
    /// Prefixes used by the element name and its non-xmlns attributes
    used: Vec<Vec<u8>>,
}

impl PendingTag {
    fn new(name: &[u8], start: usize) -> Self {
        let mut tag = PendingTag {
            name: name.to_vec(),
            start,
            match_root: false,
            decls: Vec::new(),
            declared: Vec::new(),
            used: Vec::new(),
        };
        if let (Some(prefix), _) = split_name(name) {
            tag.used.push(prefix.to_vec());
        }
        tag
    }

    fn add_attribute(&mut self, name: &[u8], value: &[u8], raw_value: &[u8]) {
        if name == b"xmlns" || name.starts_with(b"xmlns:") {
            let prefix = if name == b"xmlns" { &b""[..] } else { &name[6..] };
            self.decls.push(NsBinding::new(prefix, value, raw_value));
            self.declared.push(prefix.to_vec());
        } else if let (Some(prefix), _) = split_name(name) {
            self.used.push(prefix.to_vec());
        }
    }
}

/// Chunk-fed splitter producing one fragment per matched element or group
pub struct StreamingSplitter<S: Source> {
    source: S,
    config: SplitConfig,
    target: Vec<u8>,
    ancestor: Option<Vec<u8>>,

    /// Accumulated input not yet processed
    buffer: Vec<u8>,
    /// Absolute offset of buffer[0] in the stream
    consumed: usize,
    /// Lexer open-element stack, carried between windows
    open: Vec<Vec<u8>>,

    /// Open-element names as the tokenizer sees them; moves in lockstep
    /// with the namespace stack
    elems: Vec<Vec<u8>>,
    ns: NamespaceStack,

    state: State,
    matcher: Option<MatchBuilder>,
    /// Completed matches pending until the group is full
    group: Vec<Vec<u8>>,
    /// Fragments completed but not yet pulled
    ready: VecDeque<Fragment>,
    /// Error held until all earlier fragments have been delivered
    error: Option<SplitError>,
}

impl<S: Source> StreamingSplitter<S> {
    /// Create a splitter over `source` with the given configuration
    pub fn new(config: SplitConfig, source: S) -> Self {
        debug!(
            "splitting <{}> (ancestor: {:?}, group: {}, mode: {:?})",
            config.target, config.ancestor, config.group_size, config.mode
        );
        let target = config.target.as_bytes().to_vec();
        let ancestor = config.ancestor.as_ref().map(|a| a.as_bytes().to_vec());
        StreamingSplitter {
            source,
            config,
            target,
            ancestor,
            buffer: Vec::with_capacity(8192),
            consumed: 0,
            open: Vec::new(),
            elems: Vec::new(),
            ns: NamespaceStack::new(),
            state: State::Seeking,
            matcher: None,
            group: Vec::new(),
            ready: VecDeque::new(),
            error: None,
        }
    }

    /// Current tokenizer state
    pub fn state(&self) -> State {
        self.state
    }

    /// Bytes currently held: undrained buffer plus the in-progress match
    pub fn buffered_len(&self) -> usize {
        let pending = self.matcher.as_ref().map_or(0, |m| m.accumulated.len());
        self.buffer.len() + pending
    }

    /// Produce the next fragment, or None once the input is exhausted
    ///
    /// Errors are surfaced at the point the affected fragment would have
    /// been emitted; fragments completed before the failure are still
    /// delivered first. After an error the splitter is terminal.
    pub fn next_fragment(&mut self) -> Result<Option<Fragment>, SplitError> {
        loop {
            if let Some(fragment) = self.ready.pop_front() {
                return Ok(Some(fragment));
            }
            if let Some(err) = self.error.take() {
                self.state = State::Failed;
                return Err(err);
            }
            if matches!(self.state, State::Done | State::Failed) {
                return Ok(None);
            }

            match self.config.mode {
                SplitMode::Streaming => self.pump_chunk()?,
                SplitMode::Buffered => self.pump_all()?,
            }
        }
    }

    /// Pull one chunk from the source and process it
    fn pump_chunk(&mut self) -> Result<(), SplitError> {
        match self.source.next_chunk() {
            Ok(Some(chunk)) => {
                self.buffer.extend_from_slice(chunk);
                self.process_buffer();
            }
            Ok(None) => self.finalize(),
            Err(e) => {
                self.state = State::Failed;
                return Err(e.into());
            }
        }
        Ok(())
    }

    /// Materialize the whole input, then run the same matching logic over
    /// it as a single window. Used by buffered mode only; the streaming
    /// path never does this.
    fn pump_all(&mut self) -> Result<(), SplitError> {
        loop {
            match self.source.next_chunk() {
                Ok(Some(chunk)) => self.buffer.extend_from_slice(chunk),
                Ok(None) => break,
                Err(e) => {
                    self.state = State::Failed;
                    return Err(e.into());
                }
            }
        }
        self.process_buffer();
        self.finalize();
        Ok(())
    }

    /// Process buffered bytes up to the last safe cut point, then drain
    fn process_buffer(&mut self) {
        let boundary = find_safe_boundary(&self.buffer);
        if boundary == 0 {
            return;
        }

        let buf = std::mem::take(&mut self.buffer);
        let result = self.process_window(&buf[..boundary]);
        self.buffer = buf;

        match result {
            Ok(()) => {
                // A match spanning the cut point carries its bytes over
                // before the buffer is drained.
                if let Some(m) = self.matcher.as_mut() {
                    m.accumulated
                        .extend_from_slice(&self.buffer[m.start_in_buffer..boundary]);
                    m.start_in_buffer = 0;
                }
                self.buffer.drain(..boundary);
                self.consumed += boundary;
            }
            Err(e) => self.error = Some(e),
        }
    }

    /// Lex one closed window and feed its events through the state machine
    fn process_window(&mut self, window: &[u8]) -> Result<(), SplitError> {
        let mut lexer = Lexer::resume(window, self.consumed, std::mem::take(&mut self.open));
        let mut pending: Option<PendingTag> = None;

        loop {
            let event = match lexer.next_event() {
                Ok(Some(ev)) => ev,
                Ok(None) => break,
                Err(e) => return Err(e),
            };
            match event {
                ScanEvent::StartTagOpen { name, span } => {
                    let mut tag = PendingTag::new(name, span.0);
                    if self.matcher.is_none() && self.is_target(name) && self.ancestor_matches() {
                        tag.match_root = true;
                        self.matcher = Some(MatchBuilder {
                            accumulated: Vec::new(),
                            start_in_buffer: span.0 - self.consumed,
                            start_abs: span.0,
                            home_depth: self.elems.len(),
                            insert_rel: None,
                            inherited: Vec::new(),
                        });
                        self.state = State::Accumulating;
                    }
                    pending = Some(tag);
                }
                ScanEvent::Attribute {
                    name,
                    value,
                    raw_value,
                    ..
                } => {
                    if let Some(tag) = pending.as_mut() {
                        tag.add_attribute(name, &value, raw_value);
                    }
                }
                ScanEvent::StartTagClose { self_closing, span } => {
                    let tag = pending
                        .take()
                        .expect("start tag close without matching open event");
                    self.close_start_tag(tag, self_closing, span, window)?;
                }
                ScanEvent::EndTag { span, .. } => {
                    self.close_element(span, window)?;
                }
                // Text, comments and processing instructions ride along in
                // the raw capture; nothing structural to do.
                _ => {}
            }
        }

        self.open = lexer.into_open();
        Ok(())
    }

    fn close_start_tag(
        &mut self,
        tag: PendingTag,
        self_closing: bool,
        span: Span,
        window: &[u8],
    ) -> Result<(), SplitError> {
        if self_closing {
            if self.matcher.is_some() {
                self.check_prefixes(&tag, true)?;
            }
            if tag.match_root {
                let m = self
                    .matcher
                    .as_mut()
                    .expect("match root closed without an open match");
                m.insert_rel = Some(span.1 - 2 - m.start_abs);
                m.inherited = self.ns.inherited_for(&tag.declared);
                self.complete_match(span.1, window);
            }
            return Ok(());
        }

        if tag.match_root {
            let m = self
                .matcher
                .as_mut()
                .expect("match root closed without an open match");
            m.insert_rel = Some(span.1 - 1 - m.start_abs);
            // Ancestor bindings only; the root's own frame is pushed below.
            m.inherited = self.ns.inherited_for(&tag.declared);
        }

        self.elems.push(tag.name.clone());
        self.ns.push_frame(tag.decls);
        assert_eq!(
            self.elems.len(),
            self.ns.depth(),
            "element and namespace stacks desynchronized"
        );

        if self.matcher.is_some() {
            let used = tag.used;
            for prefix in &used {
                if self.ns.resolve(prefix).is_none() {
                    return Err(SplitError::unbound_prefix(prefix, tag.start));
                }
            }
        }
        Ok(())
    }

    fn close_element(&mut self, span: Span, window: &[u8]) -> Result<(), SplitError> {
        if self.elems.pop().is_none() {
            panic!("element stack underflow: element and namespace stacks desynchronized");
        }
        self.ns.pop_frame();
        assert_eq!(
            self.elems.len(),
            self.ns.depth(),
            "element and namespace stacks desynchronized"
        );

        let completes = self
            .matcher
            .as_ref()
            .is_some_and(|m| self.elems.len() == m.home_depth);
        if completes {
            self.complete_match(span.1, window);
        }
        Ok(())
    }

    /// Every prefix used inside a matched fragment must have a binding in
    /// scope. `local_decls` covers self-closing tags whose declarations
    /// were never pushed as a frame.
    fn check_prefixes(&self, tag: &PendingTag, local_decls: bool) -> Result<(), SplitError> {
        for prefix in &tag.used {
            if local_decls && tag.declared.iter().any(|d| d == prefix) {
                continue;
            }
            if self.ns.resolve(prefix).is_none() {
                return Err(SplitError::unbound_prefix(prefix, tag.start));
            }
        }
        Ok(())
    }

    /// Extract the finished match verbatim, splice in inherited
    /// declarations, and hand it to grouping or the output queue.
    fn complete_match(&mut self, end_abs: usize, window: &[u8]) {
        let m = self.matcher.take().expect("completing without an open match");
        let end_in_buffer = end_abs - self.consumed;

        let mut raw = m.accumulated;
        raw.extend_from_slice(&window[m.start_in_buffer..end_in_buffer]);
        let data = inject_declarations(raw, m.insert_rel, &m.inherited);

        if self.config.grouped() {
            self.group.push(data);
            if self.group.len() >= self.config.group_size {
                self.flush_group();
            }
        } else {
            self.ready.push_back(Fragment::new(data));
        }
        self.state = if self.group.is_empty() {
            State::Seeking
        } else {
            State::GroupBuffering
        };
    }

    /// Wrap the pending group members as siblings and queue the result
    fn flush_group(&mut self) {
        let wrapper = self.config.group_wrapper.as_bytes();
        let mut data = Vec::with_capacity(
            self.group.iter().map(|g| g.len()).sum::<usize>() + 2 * wrapper.len() + 5,
        );
        data.push(b'<');
        data.extend_from_slice(wrapper);
        data.push(b'>');
        for member in self.group.drain(..) {
            data.extend_from_slice(&member);
        }
        data.extend_from_slice(b"</");
        data.extend_from_slice(wrapper);
        data.push(b'>');

        trace!("emitting group of fragments ({} bytes)", data.len());
        self.ready.push_back(Fragment::new(data));
    }

    /// Source is exhausted: flush leftovers or fail an open match
    fn finalize(&mut self) {
        if self.matcher.is_some() {
            self.error = Some(SplitError::malformed(
                self.consumed + self.buffer.len(),
                format!(
                    "input ended inside <{}> element being captured",
                    self.config.target
                ),
            ));
            return;
        }
        if !self.group.is_empty() {
            self.flush_group();
        }
        self.state = State::Done;
    }

    fn is_target(&self, name: &[u8]) -> bool {
        split_name(name).1 == self.target.as_slice()
    }

    /// With an ancestor configured, the match's immediate parent must
    /// carry that name; the target under any other parent is skipped.
    fn ancestor_matches(&self) -> bool {
        match &self.ancestor {
            None => true,
            Some(ancestor) => self
                .elems
                .last()
                .map(|parent| split_name(parent).1 == ancestor.as_slice())
                .unwrap_or(false),
        }
    }
}

impl<S: Source> Iterator for StreamingSplitter<S> {
    type Item = Result<Fragment, SplitError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_fragment() {
            Ok(Some(fragment)) => Some(Ok(fragment)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

/// Splice inherited declarations into the root start tag of a raw match
pub(crate) fn inject_declarations(
    raw: Vec<u8>,
    insert_at: Option<usize>,
    inherited: &[NsBinding],
) -> Vec<u8> {
    let Some(at) = insert_at else { return raw };
    if inherited.is_empty() {
        return raw;
    }

    let mut extra = Vec::new();
    for binding in inherited {
        extra.push(b' ');
        extra.extend_from_slice(&binding.declaration_bytes());
    }

    let mut out = Vec::with_capacity(raw.len() + extra.len());
    out.extend_from_slice(&raw[..at]);
    out.extend_from_slice(&extra);
    out.extend_from_slice(&raw[at..]);
    out
}

/// Find the largest prefix of the buffer that ends every markup construct
/// it starts. Text may be cut anywhere; a construct whose terminator has
/// not arrived yet keeps everything from its `<` in the buffer.
fn find_safe_boundary(buf: &[u8]) -> usize {
    let mut i = 0;
    while i < buf.len() {
        let lt = match memchr(b'<', &buf[i..]) {
            Some(offset) => i + offset,
            None => return buf.len(),
        };
        let rest = &buf[lt..];
        let end = match classify(rest) {
            Construct::Incomplete => None,
            Construct::Comment => memmem::find(&rest[4..], b"-->").map(|e| 4 + e + 3),
            Construct::CData => memmem::find(&rest[9..], b"]]>").map(|e| 9 + e + 3),
            Construct::Pi => memmem::find(&rest[2..], b"?>").map(|e| 2 + e + 2),
            Construct::Doctype => doctype_end(rest),
            Construct::Tag => tag_end(rest),
        };
        match end {
            Some(e) => i = lt + e,
            None => return lt,
        }
    }
    buf.len()
}

enum Construct {
    Incomplete,
    Comment,
    CData,
    Pi,
    Doctype,
    Tag,
}

/// Decide what construct starts at a `<`, or Incomplete if the buffer is
/// still too short to tell.
fn classify(rest: &[u8]) -> Construct {
    if rest.len() < 2 {
        return Construct::Incomplete;
    }
    match rest[1] {
        b'?' => Construct::Pi,
        b'!' => {
            if rest.starts_with(b"<!--") {
                Construct::Comment
            } else if rest.starts_with(b"<![CDATA[") {
                Construct::CData
            } else if rest.starts_with(b"<!DOCTYPE") {
                Construct::Doctype
            } else if b"<!--".starts_with(&rest[..rest.len().min(4)])
                || b"<![CDATA[".starts_with(&rest[..rest.len().min(9)])
                || b"<!DOCTYPE".starts_with(&rest[..rest.len().min(9)])
            {
                Construct::Incomplete
            } else {
                // Unknown declaration: treat as a tag so the lexer gets to
                // reject it instead of stalling the stream.
                Construct::Tag
            }
        }
        _ => Construct::Tag,
    }
}

/// Position just past the `>` closing a start or end tag, quote-aware
fn tag_end(rest: &[u8]) -> Option<usize> {
    let mut in_single = false;
    let mut in_double = false;
    for (i, &b) in rest.iter().enumerate().skip(1) {
        match b {
            b'"' if !in_single => in_double = !in_double,
            b'\'' if !in_double => in_single = !in_single,
            b'>' if !in_single && !in_double => return Some(i + 1),
            _ => {}
        }
    }
    None
}

/// Position just past the `>` closing a DOCTYPE, quote- and subset-aware
fn doctype_end(rest: &[u8]) -> Option<usize> {
    let mut in_single = false;
    let mut in_double = false;
    let mut in_subset = false;
    for (i, &b) in rest.iter().enumerate().skip(9) {
        match b {
            b'"' if !in_single => in_double = !in_double,
            b'\'' if !in_double => in_single = !in_single,
            b'[' if !in_single && !in_double => in_subset = true,
            b']' if !in_single && !in_double => in_subset = false,
            b'>' if !in_single && !in_double && !in_subset => return Some(i + 1),
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::SliceSource;

    const PERSONS: &[u8] = b"<persons><person>James</person><person>Claus</person>\
<person>Jonathan</person><person>Hadrian</person></persons>";

    const ORDERS: &[u8] = b"<orders xmlns=\"http:acme.com\"><order id=\"1\">A</order>\
<order id=\"2\">B</order><order id=\"3\">C</order></orders>";

    fn split_all(config: SplitConfig, input: &[u8]) -> Vec<Vec<u8>> {
        let mut splitter = StreamingSplitter::new(config, SliceSource::new(input));
        let mut out = Vec::new();
        while let Some(f) = splitter.next_fragment().unwrap() {
            out.push(f.into_bytes());
        }
        out
    }

    #[test]
    fn test_person_split() {
        let fragments = split_all(SplitConfig::element("person"), PERSONS);
        assert_eq!(
            fragments,
            vec![
                b"<person>James</person>".to_vec(),
                b"<person>Claus</person>".to_vec(),
                b"<person>Jonathan</person>".to_vec(),
                b"<person>Hadrian</person>".to_vec(),
            ]
        );
    }

    #[test]
    fn test_person_split_grouped() {
        let fragments = split_all(SplitConfig::element("person").group_size(4), PERSONS);
        assert_eq!(fragments.len(), 1);
        assert_eq!(
            fragments[0],
            b"<group><person>James</person><person>Claus</person>\
<person>Jonathan</person><person>Hadrian</person></group>"
                .to_vec()
        );
    }

    #[test]
    fn test_group_leftover_is_short() {
        let fragments = split_all(SplitConfig::element("person").group_size(3), PERSONS);
        assert_eq!(fragments.len(), 2);
        assert_eq!(
            fragments[0],
            b"<group><person>James</person><person>Claus</person>\
<person>Jonathan</person></group>"
                .to_vec()
        );
        assert_eq!(
            fragments[1],
            b"<group><person>Hadrian</person></group>".to_vec()
        );
    }

    #[test]
    fn test_custom_group_wrapper() {
        let fragments = split_all(
            SplitConfig::element("person")
                .group_size(4)
                .group_wrapper("people"),
            PERSONS,
        );
        assert!(fragments[0].starts_with(b"<people>"));
        assert!(fragments[0].ends_with(b"</people>"));
    }

    #[test]
    fn test_inherited_default_namespace() {
        let fragments = split_all(SplitConfig::element("order").ancestor("orders"), ORDERS);
        assert_eq!(
            fragments,
            vec![
                b"<order id=\"1\" xmlns=\"http:acme.com\">A</order>".to_vec(),
                b"<order id=\"2\" xmlns=\"http:acme.com\">B</order>".to_vec(),
                b"<order id=\"3\" xmlns=\"http:acme.com\">C</order>".to_vec(),
            ]
        );
    }

    #[test]
    fn test_empty_default_override_preserved() {
        let input: &[u8] = b"<orders xmlns=\"http:acme.com\">\
<order id=\"4\" xmlns=\"\">Illegal Action</order></orders>";
        let fragments = split_all(SplitConfig::element("order").ancestor("orders"), input);
        assert_eq!(
            fragments,
            vec![b"<order id=\"4\" xmlns=\"\">Illegal Action</order>".to_vec()]
        );
    }

    #[test]
    fn test_inherited_prefixed_namespace() {
        let input: &[u8] =
            b"<root xmlns:a=\"urn:a\"><item><a:x/></item><item>plain</item></root>";
        let fragments = split_all(SplitConfig::element("item"), input);
        assert_eq!(
            fragments,
            vec![
                b"<item xmlns:a=\"urn:a\"><a:x/></item>".to_vec(),
                b"<item xmlns:a=\"urn:a\">plain</item>".to_vec(),
            ]
        );
    }

    #[test]
    fn test_ancestor_scoping_excludes_other_parents() {
        let input: &[u8] = b"<root><orders><order>yes</order></orders>\
<archive><order>no</order></archive></root>";
        let fragments = split_all(SplitConfig::element("order").ancestor("orders"), input);
        assert_eq!(fragments, vec![b"<order>yes</order>".to_vec()]);
    }

    #[test]
    fn test_nested_target_inside_match_not_split() {
        let input: &[u8] = b"<r><e>outer<e>inner</e></e><e>second</e></r>";
        let fragments = split_all(SplitConfig::element("e"), input);
        assert_eq!(
            fragments,
            vec![
                b"<e>outer<e>inner</e></e>".to_vec(),
                b"<e>second</e>".to_vec(),
            ]
        );
    }

    #[test]
    fn test_self_closing_target() {
        let input: &[u8] = b"<persons><person/><person id=\"2\"/></persons>";
        let fragments = split_all(SplitConfig::element("person"), input);
        assert_eq!(
            fragments,
            vec![b"<person/>".to_vec(), b"<person id=\"2\"/>".to_vec()]
        );
    }

    #[test]
    fn test_self_closing_inherits_namespace() {
        let input: &[u8] = b"<orders xmlns=\"http:acme.com\"><order id=\"1\"/></orders>";
        let fragments = split_all(SplitConfig::element("order"), input);
        assert_eq!(
            fragments,
            vec![b"<order id=\"1\" xmlns=\"http:acme.com\"/>".to_vec()]
        );
    }

    #[test]
    fn test_cdata_and_comments_ride_verbatim() {
        let input: &[u8] = b"<r><e><![CDATA[5 > 4]]><!-- note --></e></r>";
        let fragments = split_all(SplitConfig::element("e"), input);
        assert_eq!(
            fragments,
            vec![b"<e><![CDATA[5 > 4]]><!-- note --></e>".to_vec()]
        );
    }

    #[test]
    fn test_chunk_boundary_independence() {
        for chunk_size in [1, 2, 3, 7, 1024] {
            let mut splitter = StreamingSplitter::new(
                SplitConfig::element("order").ancestor("orders"),
                SliceSource::with_chunk_size(ORDERS, chunk_size),
            );
            let mut fragments = Vec::new();
            while let Some(f) = splitter.next_fragment().unwrap() {
                fragments.push(f.into_bytes());
            }
            assert_eq!(fragments.len(), 3, "chunk size {}", chunk_size);
            assert_eq!(
                fragments[0],
                b"<order id=\"1\" xmlns=\"http:acme.com\">A</order>".to_vec()
            );
        }
    }

    #[test]
    fn test_buffered_mode_matches_streaming() {
        let streaming = split_all(SplitConfig::element("order").ancestor("orders"), ORDERS);
        let buffered = split_all(
            SplitConfig::element("order")
                .ancestor("orders")
                .mode(SplitMode::Buffered),
            ORDERS,
        );
        assert_eq!(streaming, buffered);
    }

    #[test]
    fn test_mismatched_end_tag_fails_without_fragments() {
        let mut splitter =
            StreamingSplitter::new(SplitConfig::element("b"), SliceSource::new(b"<a><b></a>"));
        let err = splitter.next_fragment().unwrap_err();
        assert!(matches!(err, SplitError::MalformedMarkup { .. }));
        // Terminal: nothing more comes out.
        assert!(splitter.next_fragment().unwrap().is_none());
        assert_eq!(splitter.state(), State::Failed);
    }

    #[test]
    fn test_unterminated_match_fails() {
        let mut splitter = StreamingSplitter::new(
            SplitConfig::element("person"),
            SliceSource::new(b"<persons><person>Ja"),
        );
        let err = splitter.next_fragment().unwrap_err();
        assert!(matches!(err, SplitError::MalformedMarkup { .. }));
    }

    #[test]
    fn test_unclosed_ancestor_without_open_match_is_clean() {
        // The wrapping element never closes, but no match is open at the
        // end, so the completed fragment is still delivered cleanly.
        let mut splitter = StreamingSplitter::new(
            SplitConfig::element("person"),
            SliceSource::new(b"<persons><person>J</person>"),
        );
        assert_eq!(
            splitter.next_fragment().unwrap().unwrap().as_bytes(),
            b"<person>J</person>"
        );
        assert!(splitter.next_fragment().unwrap().is_none());
        assert_eq!(splitter.state(), State::Done);
    }

    #[test]
    fn test_unbound_prefix_fails_stream() {
        let mut splitter = StreamingSplitter::new(
            SplitConfig::element("person"),
            SliceSource::new(b"<persons><person u:id=\"1\">x</person></persons>"),
        );
        let err = splitter.next_fragment().unwrap_err();
        assert!(matches!(err, SplitError::NamespaceResolution { .. }));
    }

    #[test]
    fn test_fragments_before_error_still_delivered() {
        let input: &[u8] = b"<r><e>ok</e><e>also</e><e></r>";
        let mut splitter =
            StreamingSplitter::new(SplitConfig::element("e"), SliceSource::new(input));
        assert_eq!(
            splitter.next_fragment().unwrap().unwrap().as_bytes(),
            b"<e>ok</e>"
        );
        assert_eq!(
            splitter.next_fragment().unwrap().unwrap().as_bytes(),
            b"<e>also</e>"
        );
        assert!(splitter.next_fragment().is_err());
    }

    #[test]
    fn test_io_error_propagates_unchanged() {
        struct FailingSource;
        impl Source for FailingSource {
            fn next_chunk(&mut self) -> std::io::Result<Option<&[u8]>> {
                Err(std::io::Error::new(std::io::ErrorKind::Other, "disk gone"))
            }
        }
        let mut splitter = StreamingSplitter::new(SplitConfig::element("e"), FailingSource);
        let err = splitter.next_fragment().unwrap_err();
        assert!(matches!(err, SplitError::Io(_)));
    }

    #[test]
    fn test_iterator_adapter() {
        let splitter =
            StreamingSplitter::new(SplitConfig::element("person"), SliceSource::new(PERSONS));
        let fragments: Vec<_> = splitter.map(|r| r.unwrap().into_bytes()).collect();
        assert_eq!(fragments.len(), 4);
    }

    #[test]
    fn test_streaming_memory_stays_bounded() {
        // Many large non-matching siblings around small matches: the
        // splitter must never hold much more than one chunk of skipped
        // content, independent of total document size.
        let filler = "x".repeat(50_000);
        let mut doc = String::from("<root>");
        for i in 0..20 {
            doc.push_str(&format!("<big>{}</big>", filler));
            doc.push_str(&format!("<item>{}</item>", i));
        }
        doc.push_str("</root>");

        let chunk_size = 4096;
        let mut splitter = StreamingSplitter::new(
            SplitConfig::element("item"),
            SliceSource::with_chunk_size(doc.as_bytes(), chunk_size),
        );

        let ceiling = 2 * chunk_size + 64;
        let mut count = 0;
        while let Some(_f) = splitter.next_fragment().unwrap() {
            count += 1;
            assert!(
                splitter.buffered_len() <= ceiling,
                "buffered {} bytes, ceiling {}",
                splitter.buffered_len(),
                ceiling
            );
        }
        assert_eq!(count, 20);
    }

    #[test]
    fn test_xml_declaration_and_whitespace_tolerated() {
        let input: &[u8] =
            b"<?xml version=\"1.0\"?>\n<persons>\n  <person>A</person>\n</persons>\n";
        let fragments = split_all(SplitConfig::element("person"), input);
        assert_eq!(fragments, vec![b"<person>A</person>".to_vec()]);
    }

    #[test]
    fn test_find_safe_boundary_cuts_text_anywhere() {
        assert_eq!(find_safe_boundary(b"<a>some text"), 12);
        assert_eq!(find_safe_boundary(b"<a>text<b"), 7);
        assert_eq!(find_safe_boundary(b"<a attr=\"un"), 0);
        assert_eq!(find_safe_boundary(b"<!-- a > b "), 0);
        assert_eq!(find_safe_boundary(b"<!-- a > b --><x"), 14);
        assert_eq!(find_safe_boundary(b"<![CDATA[ > "), 0);
        assert_eq!(find_safe_boundary(b"<c><![CDATA[>]]>"), 16);
    }
}
