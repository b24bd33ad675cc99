//! Path-based split adapter
//!
//! The contrasting buffered mode: the whole input is loaded into an arena
//! document, a path expression selects the nodes, and each matched node is
//! serialized as its verbatim source span plus the namespace declarations
//! it inherits from ancestors. Fragment content is byte-identical to what
//! the streaming tokenizer emits for the same logical match set.
//!
//! Requires O(document size) memory; use the streaming tokenizer for
//! inputs larger than memory.

use log::debug;

use super::streaming::inject_declarations;
use crate::dom::{Document, NodeId};
use crate::error::SplitError;
use crate::fragment::Fragment;
use crate::reader::Source;
use crate::xpath::{compile_cached, evaluate, Namespaces};

/// Whole-document splitter driven by a path expression
pub struct XPathSplitter<S: Source> {
    source: Option<S>,
    expression: String,
    namespaces: Namespaces,
    loaded: Option<Loaded>,
    failed: bool,
}

struct Loaded {
    doc: Document,
    matches: Vec<NodeId>,
    cursor: usize,
}

impl<S: Source> XPathSplitter<S> {
    /// Create a splitter evaluating `expression` with the given prefix
    /// table. Nothing is read until the first fragment is requested.
    pub fn new(expression: impl Into<String>, namespaces: Namespaces, source: S) -> Self {
        XPathSplitter {
            source: Some(source),
            expression: expression.into(),
            namespaces,
            loaded: None,
            failed: false,
        }
    }

    /// Produce the next fragment, or None once the match list is done
    ///
    /// A namespace-resolution failure is an error for that fragment only;
    /// later matches are still delivered. Load-time failures (read error,
    /// malformed document, bad expression) are terminal.
    pub fn next_fragment(&mut self) -> Result<Option<Fragment>, SplitError> {
        if self.failed {
            return Ok(None);
        }
        if self.loaded.is_none() {
            match self.load() {
                Ok(loaded) => self.loaded = Some(loaded),
                Err(e) => {
                    self.failed = true;
                    return Err(e);
                }
            }
        }

        let loaded = self.loaded.as_mut().expect("document just loaded");
        if loaded.cursor >= loaded.matches.len() {
            return Ok(None);
        }
        let id = loaded.matches[loaded.cursor];
        loaded.cursor += 1;
        serialize_node(&loaded.doc, id).map(Some)
    }

    /// Drain the source, build the tree and run the expression
    fn load(&mut self) -> Result<Loaded, SplitError> {
        let mut source = self.source.take().expect("source consumed twice");
        let mut input = Vec::new();
        while let Some(chunk) = source.next_chunk()? {
            input.extend_from_slice(chunk);
        }

        let doc = Document::parse(input)?;
        let path = compile_cached(&self.expression)?;
        let matches = evaluate(&doc, &path, &self.namespaces).map_err(SplitError::Path)?;
        debug!(
            "path '{}' matched {} nodes in {} bytes",
            self.expression,
            matches.len(),
            doc.input().len()
        );

        Ok(Loaded {
            doc,
            matches,
            cursor: 0,
        })
    }
}

impl<S: Source> Iterator for XPathSplitter<S> {
    type Item = Result<Fragment, SplitError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_fragment() {
            Ok(Some(fragment)) => Some(Ok(fragment)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

/// Serialize one matched node: verbatim span, inherited declarations
/// spliced into the root start tag, prefixes verified against the tree.
fn serialize_node(doc: &Document, id: NodeId) -> Result<Fragment, SplitError> {
    check_subtree_prefixes(doc, id)?;

    let node = doc.node(id);
    let (start, end) = node.span;
    let raw = doc.input()[start..end].to_vec();

    let insert_at = if node.self_closing {
        node.open_tag_end - 2 - start
    } else {
        node.open_tag_end - 1 - start
    };
    let inherited = doc.inherited_declarations(id);

    Ok(Fragment::new(inject_declarations(
        raw,
        Some(insert_at),
        &inherited,
    )))
}

/// Every element and attribute prefix inside the subtree must resolve
/// somewhere on its ancestor chain (fragment-internal declarations
/// included).
fn check_subtree_prefixes(doc: &Document, id: NodeId) -> Result<(), SplitError> {
    let mut pending = vec![id];
    while let Some(node_id) = pending.pop() {
        let node = doc.node(node_id);
        if !node.is_element() {
            continue;
        }
        if let Some(prefix) = doc.prefix(node_id) {
            if doc.resolve_prefix(node_id, prefix).is_none() {
                return Err(SplitError::unbound_prefix(prefix, node.span.0));
            }
        }
        for attr in doc.attributes(node_id) {
            let name = doc.string(attr.name_id);
            if name.starts_with(b"xmlns") {
                continue;
            }
            if let Some(colon) = name.iter().position(|&b| b == b':') {
                let prefix = &name[..colon];
                if doc.resolve_prefix(node_id, prefix).is_none() {
                    return Err(SplitError::unbound_prefix(prefix, node.span.0));
                }
            }
        }
        pending.extend(doc.children(node_id));
    }
    Ok(())
}
