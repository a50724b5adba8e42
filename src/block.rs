//! Page block lexer.
//!
//! Every page source (the shared template as well as each content file) is a
//! mix of literal markup and embedded script code. Code is wrapped in a fixed
//! marker pair:
//!
//! ```text
//! <h1>@title@</h1>
//! <? cvars.title = "About" ?>
//! <p>Body</p>
//! ```
//!
//! [`parse_blocks`] partitions the source into an ordered sequence of
//! [`Block`]s, alternating between text and code, without gaps or overlaps.
//! Markers are stripped from code blocks and restored by
//! [`Lexed::reassemble`].
//!
//! ## Edge cases
//!
//! - Lexing always starts in text mode, so the first block is text (possibly
//!   empty). Empty text blocks between adjacent markers are kept.
//! - A marker cannot start on the final character of the input.
//! - Markers do not nest: `<?` inside code and `?>` inside text are literal.
//! - A code block that is never closed runs to the end of input. This is not
//!   an error; [`Lexed::unterminated`] records it so callers can warn.

/// Opens a code block.
pub const CODE_OPEN: &str = "<?";
/// Closes a code block.
pub const CODE_CLOSE: &str = "?>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Text,
    Code,
}

/// A contiguous run of literal text or embedded code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub kind: BlockKind,
    pub content: String,
}

impl Block {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            kind: BlockKind::Text,
            content: content.into(),
        }
    }

    pub fn code(content: impl Into<String>) -> Self {
        Self {
            kind: BlockKind::Code,
            content: content.into(),
        }
    }

    pub fn is_code(&self) -> bool {
        self.kind == BlockKind::Code
    }
}

/// Result of lexing one page source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lexed {
    pub blocks: Vec<Block>,
    /// The last block is code that was opened but never closed.
    pub unterminated: bool,
}

impl Lexed {
    /// Rebuild the original source from the blocks.
    pub fn reassemble(&self) -> String {
        let mut out = String::new();
        let last = self.blocks.len().saturating_sub(1);
        for (i, block) in self.blocks.iter().enumerate() {
            match block.kind {
                BlockKind::Text => out.push_str(&block.content),
                BlockKind::Code => {
                    out.push_str(CODE_OPEN);
                    out.push_str(&block.content);
                    if !(self.unterminated && i == last) {
                        out.push_str(CODE_CLOSE);
                    }
                }
            }
        }
        out
    }
}

/// Split a page source into text and code blocks.
pub fn parse_blocks(source: &str) -> Lexed {
    BlockLexer::new(source).run()
}

/// Segment-boundary state machine.
///
/// Only ASCII marker bytes are matched, so every boundary falls on a UTF-8
/// character boundary and slicing `source` is always valid.
struct BlockLexer<'a> {
    source: &'a str,
    segment_start: usize,
    mode: BlockKind,
    blocks: Vec<Block>,
}

impl<'a> BlockLexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            segment_start: 0,
            mode: BlockKind::Text,
            blocks: Vec::new(),
        }
    }

    fn run(mut self) -> Lexed {
        let bytes = self.source.as_bytes();
        let mut cur = 0;
        while cur + 1 < bytes.len() {
            match (self.mode, bytes[cur], bytes[cur + 1]) {
                (BlockKind::Text, b'<', b'?') => {
                    self.open_code(cur);
                    cur += CODE_OPEN.len();
                }
                (BlockKind::Code, b'?', b'>') => {
                    self.close_code(cur);
                    cur += CODE_CLOSE.len();
                }
                _ => cur += 1,
            }
        }
        self.finish()
    }

    fn open_code(&mut self, marker_at: usize) {
        self.end_segment(marker_at, marker_at + CODE_OPEN.len(), BlockKind::Code);
    }

    fn close_code(&mut self, marker_at: usize) {
        self.end_segment(marker_at, marker_at + CODE_CLOSE.len(), BlockKind::Text);
    }

    fn end_segment(&mut self, end: usize, next_start: usize, next_mode: BlockKind) {
        self.push(end);
        self.segment_start = next_start;
        self.mode = next_mode;
    }

    fn push(&mut self, end: usize) {
        let content = &self.source[self.segment_start..end];
        self.blocks.push(Block {
            kind: self.mode,
            content: content.to_string(),
        });
    }

    fn finish(mut self) -> Lexed {
        self.push(self.source.len());
        Lexed {
            unterminated: self.mode == BlockKind::Code,
            blocks: self.blocks,
        }
    }
}
