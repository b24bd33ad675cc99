//! Arena document
//!
//! Whole-document tree built from the core lexer:
//! - Arena allocation, NodeId (u32) indices
//! - String interning for names and attribute values
//! - Every node keeps its source byte span, so a matched subtree is
//!   serialized verbatim from the retained input
//!
//! Requires O(document size) memory; this is the buffered half of the
//! split design, unsuitable for inputs the streaming tokenizer exists for.

use super::node::{AttributeEntry, Node, NodeId, NodeKind};
use super::strings::StringPool;
use crate::core::cursor::split_name;
use crate::core::events::ScanEvent;
use crate::core::lexer::Lexer;
use crate::core::namespace::{ns, NsBinding};
use crate::error::SplitError;

/// An XML document stored in arena format, owning its input
pub struct Document {
    input: Vec<u8>,
    nodes: Vec<Node>,
    attributes: Vec<AttributeEntry>,
    strings: StringPool,
    root_element: Option<NodeId>,
}

impl Document {
    /// Parse a complete document, taking ownership of the input.
    ///
    /// The whole tree is materialized; the document must be well-formed.
    pub fn parse(input: Vec<u8>) -> Result<Self, SplitError> {
        let mut nodes = vec![Node::document()];
        let mut attributes: Vec<AttributeEntry> = Vec::new();
        let mut strings = StringPool::new();
        let mut root_element: Option<NodeId> = None;

        {
            let mut lexer = Lexer::new(&input);
            // Stack of open node ids; the document node is the floor.
            let mut stack: Vec<NodeId> = vec![0];
            let mut current: Option<NodeId> = None;

            while let Some(event) = lexer.next_event()? {
                match event {
                    ScanEvent::StartTagOpen { name, span } => {
                        let parent = *stack.last().expect("document node missing");
                        let depth = stack.len() as u16;
                        let name_id = strings.intern(name);
                        let id = nodes.len() as NodeId;
                        let mut node = Node::element(name_id, parent, depth, span);
                        node.attr_start = attributes.len() as u32;
                        nodes.push(node);
                        append_child(&mut nodes, parent, id);
                        if parent == 0 && root_element.is_none() {
                            root_element = Some(id);
                        }
                        current = Some(id);
                    }
                    ScanEvent::Attribute {
                        name,
                        value,
                        raw_value,
                        ..
                    } => {
                        let id = current.expect("attribute outside start tag");
                        attributes.push(AttributeEntry {
                            name_id: strings.intern(name),
                            value_id: strings.intern(&value),
                            raw_id: strings.intern(raw_value),
                        });
                        let node = &mut nodes[id as usize];
                        node.attr_count += 1;
                    }
                    ScanEvent::StartTagClose { self_closing, span } => {
                        let id = current.take().expect("close without open start tag");
                        let node = &mut nodes[id as usize];
                        node.open_tag_end = span.1;
                        if self_closing {
                            node.self_closing = true;
                            node.span.1 = span.1;
                        } else {
                            stack.push(id);
                        }
                    }
                    ScanEvent::EndTag { span, .. } => {
                        let id = stack.pop().expect("end tag below document node");
                        nodes[id as usize].span.1 = span.1;
                    }
                    ScanEvent::Text { span, .. } => {
                        let parent = *stack.last().expect("document node missing");
                        let id = nodes.len() as NodeId;
                        nodes.push(Node::leaf(NodeKind::Text, parent, stack.len() as u16, span));
                        append_child(&mut nodes, parent, id);
                    }
                    ScanEvent::Comment { span } => {
                        let parent = *stack.last().expect("document node missing");
                        let id = nodes.len() as NodeId;
                        nodes.push(Node::leaf(
                            NodeKind::Comment,
                            parent,
                            stack.len() as u16,
                            span,
                        ));
                        append_child(&mut nodes, parent, id);
                    }
                    ScanEvent::ProcessingInstruction { span } => {
                        let parent = *stack.last().expect("document node missing");
                        let id = nodes.len() as NodeId;
                        nodes.push(Node::leaf(
                            NodeKind::ProcessingInstruction,
                            parent,
                            stack.len() as u16,
                            span,
                        ));
                        append_child(&mut nodes, parent, id);
                    }
                }
            }
            lexer.finish()?;
        }

        Ok(Document {
            input,
            nodes,
            attributes,
            strings,
            root_element,
        })
    }

    /// The original input bytes
    #[inline]
    pub fn input(&self) -> &[u8] {
        &self.input
    }

    /// Root element id, if the document has one
    pub fn root_element_id(&self) -> Option<NodeId> {
        self.root_element
    }

    /// Get a node by id
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id as usize]
    }

    /// Total number of nodes, document node included
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Full element name (may include prefix)
    pub fn name(&self, id: NodeId) -> &[u8] {
        self.strings.get(self.node(id).name_id)
    }

    /// Element local name, prefix stripped
    pub fn local_name(&self, id: NodeId) -> &[u8] {
        split_name(self.name(id)).1
    }

    /// Element name prefix, if any
    pub fn prefix(&self, id: NodeId) -> Option<&[u8]> {
        split_name(self.name(id)).0
    }

    /// Attributes of an element
    pub fn attributes(&self, id: NodeId) -> &[AttributeEntry] {
        let node = self.node(id);
        let start = node.attr_start as usize;
        &self.attributes[start..start + node.attr_count as usize]
    }

    /// Decoded value of a named attribute
    pub fn attribute_value(&self, id: NodeId, name: &[u8]) -> Option<&[u8]> {
        self.attributes(id)
            .iter()
            .find(|a| self.strings.get(a.name_id) == name)
            .map(|a| self.strings.get(a.value_id))
    }

    /// Interned string lookup
    pub fn string(&self, string_id: u32) -> &[u8] {
        self.strings.get(string_id)
    }

    /// Child node ids in document order
    pub fn children(&self, id: NodeId) -> ChildIter<'_> {
        ChildIter {
            doc: self,
            next: self.node(id).first_child,
        }
    }

    /// All descendant node ids in document order, self excluded
    pub fn descendants(&self, id: NodeId) -> DescendantIter<'_> {
        let mut stack = Vec::new();
        let mut children: Vec<NodeId> = self.children(id).collect();
        children.reverse();
        stack.extend(children);
        DescendantIter { doc: self, stack }
    }

    /// Resolve a namespace prefix by walking this element and its
    /// ancestors, nearest declaration first. The `xml` and `xmlns`
    /// prefixes are implicitly bound.
    pub fn resolve_prefix(&self, id: NodeId, prefix: &[u8]) -> Option<&[u8]> {
        let mut cursor = Some(id);
        while let Some(node_id) = cursor {
            let node = self.node(node_id);
            if node.is_element() {
                for attr in self.attributes(node_id).iter().rev() {
                    if let Some(declared) = decl_prefix(self.strings.get(attr.name_id)) {
                        if declared == prefix {
                            return Some(self.strings.get(attr.value_id));
                        }
                    }
                }
            }
            cursor = node.parent;
        }
        match prefix {
            b"xml" => Some(ns::XML),
            b"xmlns" => Some(ns::XMLNS),
            _ => None,
        }
    }

    /// Namespace URI of an element: its prefix binding, or the in-scope
    /// default namespace for unprefixed names. Empty means no namespace.
    pub fn element_uri(&self, id: NodeId) -> &[u8] {
        let prefix = self.prefix(id).unwrap_or(b"");
        self.resolve_prefix(id, prefix).unwrap_or(b"")
    }

    /// The declarations a fragment rooted at `id` inherits from its
    /// ancestors: the nearest binding for every prefix not declared on
    /// the fragment root itself, outermost-first.
    pub fn inherited_declarations(&self, id: NodeId) -> Vec<NsBinding> {
        let mut seen: Vec<&[u8]> = self
            .attributes(id)
            .iter()
            .filter_map(|a| decl_prefix(self.strings.get(a.name_id)))
            .collect();
        let mut inherited = Vec::new();

        let mut cursor = self.node(id).parent;
        while let Some(node_id) = cursor {
            let node = self.node(node_id);
            if node.is_element() {
                for attr in self.attributes(node_id).iter().rev() {
                    let name = self.strings.get(attr.name_id);
                    let Some(declared) = decl_prefix(name) else {
                        continue;
                    };
                    if seen.iter().any(|p| *p == declared) {
                        continue;
                    }
                    seen.push(declared);
                    inherited.push(NsBinding::new(
                        declared,
                        self.strings.get(attr.value_id),
                        self.strings.get(attr.raw_id),
                    ));
                }
            }
            cursor = node.parent;
        }

        inherited.reverse();
        inherited
    }
}

/// The prefix a declaration attribute binds, or None for ordinary ones
fn decl_prefix(attr_name: &[u8]) -> Option<&[u8]> {
    if attr_name == b"xmlns" {
        Some(b"")
    } else if attr_name.starts_with(b"xmlns:") {
        Some(&attr_name[6..])
    } else {
        None
    }
}

fn append_child(nodes: &mut [Node], parent: NodeId, child: NodeId) {
    let prev_last = {
        let parent_node = &mut nodes[parent as usize];
        let prev = parent_node.last_child;
        parent_node.last_child = Some(child);
        if parent_node.first_child.is_none() {
            parent_node.first_child = Some(child);
        }
        prev
    };
    if let Some(prev) = prev_last {
        nodes[prev as usize].next_sibling = Some(child);
    }
}

/// Iterator over child nodes
pub struct ChildIter<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for ChildIter<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.next?;
        self.next = self.doc.node(id).next_sibling;
        Some(id)
    }
}

/// Depth-first iterator over descendants
pub struct DescendantIter<'a> {
    doc: &'a Document,
    stack: Vec<NodeId>,
}

impl Iterator for DescendantIter<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        let mut children: Vec<NodeId> = self.doc.children(id).collect();
        children.reverse();
        self.stack.extend(children);
        Some(id)
    }
}
