//! Path evaluation
//!
//! Evaluates a parsed path against an arena document, producing the
//! matched element ids in document order. Step prefixes resolve through
//! the caller-supplied prefix table only, never from the document.

use super::parser::{Axis, NameTest, Path, Predicate, Step};
use super::Namespaces;
use crate::dom::{Document, NodeId};

/// Evaluate a path from the document root, returning matches in document
/// order with duplicates removed.
pub fn evaluate(doc: &Document, path: &Path, namespaces: &Namespaces) -> Result<Vec<NodeId>, String> {
    // The document node is the initial context.
    let mut current: Vec<NodeId> = vec![0];

    for step in &path.steps {
        let mut next: Vec<NodeId> = Vec::new();
        for &node in &current {
            match step.axis {
                Axis::Child => {
                    for child in doc.children(node) {
                        if matches_step(doc, child, step, namespaces)? {
                            next.push(child);
                        }
                    }
                }
                Axis::Descendant => {
                    for descendant in doc.descendants(node) {
                        if matches_step(doc, descendant, step, namespaces)? {
                            next.push(descendant);
                        }
                    }
                }
            }
        }
        // Node ids are assigned in document order; sort + dedup restores
        // it after overlapping descendant traversals.
        next.sort_unstable();
        next.dedup();
        current = next;
        if current.is_empty() {
            break;
        }
    }

    Ok(current)
}

fn matches_step(
    doc: &Document,
    id: NodeId,
    step: &Step,
    namespaces: &Namespaces,
) -> Result<bool, String> {
    if !doc.node(id).is_element() {
        return Ok(false);
    }
    if !matches_name(doc, id, &step.test, namespaces)? {
        return Ok(false);
    }
    if let Some(predicate) = &step.predicate {
        return Ok(matches_predicate(doc, id, predicate));
    }
    Ok(true)
}

fn matches_name(
    doc: &Document,
    id: NodeId,
    test: &NameTest,
    namespaces: &Namespaces,
) -> Result<bool, String> {
    match test {
        NameTest::Any => Ok(true),
        NameTest::Name { prefix, local } => {
            if doc.local_name(id) != local.as_bytes() {
                return Ok(false);
            }
            let expected_uri = match prefix {
                Some(p) => namespaces
                    .uri(p)
                    .ok_or_else(|| format!("prefix '{}' not bound in the supplied table", p))?,
                // An unprefixed step matches in the table's default
                // binding if present, else in no namespace.
                None => namespaces.uri("").unwrap_or(""),
            };
            Ok(doc.element_uri(id) == expected_uri.as_bytes())
        }
    }
}

fn matches_predicate(doc: &Document, id: NodeId, predicate: &Predicate) -> bool {
    match predicate {
        Predicate::AttrEquals { name, value } => {
            doc.attribute_value(id, name.as_bytes()) == Some(value.as_bytes())
        }
    }
}
