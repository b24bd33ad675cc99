//! Split configuration
//!
//! One record with named fields describes everything the element tokenizer
//! needs: the target name, an optional required immediate parent, the group
//! size, the wrapper element for grouped output, and the memory mode.

/// Default wrapper element for grouped fragments
pub const DEFAULT_GROUP_WRAPPER: &str = "group";

/// Memory mode for the element tokenizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SplitMode {
    /// Bound memory to the current in-progress match; input is consumed
    /// chunk by chunk.
    #[default]
    Streaming,
    /// The whole input is materialized up front; the same matching logic
    /// is reused purely for selection.
    Buffered,
}

/// What to tokenize
#[derive(Debug, Clone)]
pub struct SplitConfig {
    /// Local element name to match, at any nesting depth
    pub target: String,
    /// When set, a match only opens if the immediate parent element has
    /// this name; the target elsewhere is skipped, not errored.
    pub ancestor: Option<String>,
    /// Emit one fragment per `group_size` matches; 1 means no grouping
    pub group_size: usize,
    /// Wrapper element name for grouped output
    pub group_wrapper: String,
    /// Memory mode
    pub mode: SplitMode,
}

impl SplitConfig {
    /// Configuration matching `target` anywhere, ungrouped, streaming
    pub fn element(target: impl Into<String>) -> Self {
        SplitConfig {
            target: target.into(),
            ancestor: None,
            group_size: 1,
            group_wrapper: DEFAULT_GROUP_WRAPPER.to_string(),
            mode: SplitMode::Streaming,
        }
    }

    /// Require the match's immediate parent to have this name
    pub fn ancestor(mut self, name: impl Into<String>) -> Self {
        self.ancestor = Some(name.into());
        self
    }

    /// Batch this many consecutive matches into one wrapped fragment
    pub fn group_size(mut self, n: usize) -> Self {
        self.group_size = n.max(1);
        self
    }

    /// Name the wrapper element used for grouped output
    pub fn group_wrapper(mut self, name: impl Into<String>) -> Self {
        self.group_wrapper = name.into();
        self
    }

    /// Select the memory mode
    pub fn mode(mut self, mode: SplitMode) -> Self {
        self.mode = mode;
        self
    }

    /// True when grouping is in effect
    pub fn grouped(&self) -> bool {
        self.group_size > 1
    }
}
