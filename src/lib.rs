//! xmlsplit - Split large XML documents into element fragments
//!
//! Splits a document on a repeating element and hands out each occurrence
//! as a self-contained, independently parseable fragment, with namespace
//! declarations inherited from ancestors carried along. Splitting starts
//! before the input is fully read and handles documents far larger than
//! memory.
//!
//! Strategies:
//! A: Streaming element tokenizer (chunk-fed, memory bounded to the match
//!    in progress)
//! B: Buffered tokenizer (whole input materialized, same matching logic)
//! C: Path splitter (arena document + path expression, for the cases
//!    where whole-tree semantics are wanted)
//!
//! ```
//! use xmlsplit::{split_slice, SplitConfig};
//!
//! let input = b"<persons><person>James</person><person>Claus</person></persons>";
//! let fragments = split_slice(SplitConfig::element("person"), input)
//!     .collect::<Result<Vec<_>, _>>()?;
//!
//! assert_eq!(fragments.len(), 2);
//! assert_eq!(fragments[0].as_bytes(), b"<person>James</person>");
//! # Ok::<(), xmlsplit::SplitError>(())
//! ```

pub mod config;
pub mod core;
pub mod dom;
pub mod error;
pub mod fragment;
pub mod reader;
pub mod strategy;
pub mod xpath;

pub use config::{SplitConfig, SplitMode};
pub use error::SplitError;
pub use fragment::Fragment;
pub use reader::{ReadSource, SliceSource, Source};
pub use strategy::{Splitter, State, StreamingSplitter, XPathSplitter};
pub use xpath::Namespaces;

use std::io::Read;

/// Split an in-memory document on a named element
pub fn split_slice(config: SplitConfig, input: &[u8]) -> StreamingSplitter<SliceSource<'_>> {
    StreamingSplitter::new(config, SliceSource::new(input))
}

/// Split a document supplied by any `Read` implementation
pub fn split_reader<R: Read>(config: SplitConfig, reader: R) -> StreamingSplitter<ReadSource<R>> {
    StreamingSplitter::new(config, ReadSource::new(reader))
}

/// Split an in-memory document with a path expression and prefix table
pub fn split_xpath<'a>(
    expression: &str,
    namespaces: Namespaces,
    input: &'a [u8],
) -> XPathSplitter<SliceSource<'a>> {
    XPathSplitter::new(expression, namespaces, SliceSource::new(input))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_slice_end_to_end() {
        let input: &[u8] = b"<persons><person>James</person><person>Claus</person></persons>";
        let fragments: Vec<_> = split_slice(SplitConfig::element("person"), input)
            .map(|r| r.unwrap().into_bytes())
            .collect();
        assert_eq!(
            fragments,
            vec![
                b"<person>James</person>".to_vec(),
                b"<person>Claus</person>".to_vec(),
            ]
        );
    }

    #[test]
    fn test_split_reader_end_to_end() {
        let input = b"<r><e>1</e><e>2</e><e>3</e></r>".to_vec();
        let fragments: Vec<_> =
            split_reader(SplitConfig::element("e"), std::io::Cursor::new(input))
                .map(|r| r.unwrap().into_bytes())
                .collect();
        assert_eq!(fragments.len(), 3);
    }

    #[test]
    fn test_split_xpath_end_to_end() {
        let input: &[u8] = b"<orders xmlns=\"http:acme.com\"><order id=\"1\">A</order></orders>";
        let fragments: Vec<_> = split_xpath(
            "//orders/order",
            Namespaces::new().add("", "http:acme.com"),
            input,
        )
        .map(|r| r.unwrap().into_bytes())
        .collect();
        assert_eq!(
            fragments,
            vec![b"<order id=\"1\" xmlns=\"http:acme.com\">A</order>".to_vec()]
        );
    }
}
