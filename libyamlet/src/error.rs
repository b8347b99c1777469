//! Error types and source positions for the YAML pipeline.
//!
//! Each pipeline phase has its own error enum:
//! - [`ScanError`]: malformed lexical input (bad escapes, unterminated
//!   quotes, forbidden code points, stale simple keys).
//! - [`ParseError`]: grammar violations and directive problems; wraps
//!   [`ScanError`] since the parser pulls from the scanner.
//! - [`EmitError`]: event sequences that violate the expected grammar.
//!   Unlike the other two, an `EmitError` indicates a bug in the event
//!   producer, not malformed external input.
//!
//! Every input-related variant carries a [`Mark`] identifying where the
//! problem was found, and scalar/collection variants additionally carry
//! the mark of the enclosing construct so messages can say both "while
//! scanning X" and "found Y".

use std::fmt;
use thiserror::Error;

/// Result type for the parsing pipeline.
pub type Result<T> = std::result::Result<T, ParseError>;

/// A snapshot of a position in the input stream.
///
/// Marks exist for diagnostics only; no parsing decision depends on one.
/// `index` counts characters from the start of the stream, `line` and
/// `col` are zero-based and displayed one-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Mark {
    /// Character offset from the start of the stream.
    pub index: usize,
    /// Zero-based line number.
    pub line: usize,
    /// Zero-based column number.
    pub col: usize,
}

impl Mark {
    /// Create a mark at an explicit position.
    pub fn new(index: usize, line: usize, col: usize) -> Self {
        Self { index, line, col }
    }

    /// Render the marked source line with a caret underneath.
    ///
    /// Returns an empty string if the mark's line is not present in
    /// `source` (for example when the error position is past the end of
    /// a truncated buffer).
    pub fn snippet(&self, source: &str) -> String {
        match source.split('\n').nth(self.line) {
            Some(line) => {
                let line = line.strip_suffix('\r').unwrap_or(line);
                let caret_col = self.col.min(line.chars().count());
                format!("{}\n{}^", line, " ".repeat(caret_col))
            }
            None => String::new(),
        }
    }
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line + 1, self.col + 1)
    }
}

/// A start/end pair of marks delimiting a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: Mark,
    pub end: Mark,
}

impl Span {
    /// Span covering `start..end`.
    pub fn new(start: Mark, end: Mark) -> Self {
        Self { start, end }
    }

    /// Zero-width span at a single mark.
    pub fn empty(mark: Mark) -> Self {
        Self {
            start: mark,
            end: mark,
        }
    }
}

/// Error raised by the scanner for malformed lexical input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    /// A code point outside the YAML printable set appeared in the input.
    #[error("Forbidden code point U+{code:04X} in input stream, {mark}")]
    ForbiddenCharacter { code: u32, mark: Mark },

    /// A tab appeared where indentation spaces are required.
    #[error("Found a tab character where an indentation space is expected, {mark}")]
    TabInIndentation { mark: Mark },

    /// A simple-key candidate went stale while still required.
    #[error("Could not find expected ':' for the simple key, {mark}")]
    StaleSimpleKey { mark: Mark },

    /// A ':' appeared where no mapping value may start.
    #[error("Mapping values are not allowed in this context, {mark}")]
    UnexpectedValue { mark: Mark },

    /// A '?' appeared where no mapping key may start.
    #[error("Mapping keys are not allowed in this context, {mark}")]
    UnexpectedKey { mark: Mark },

    /// A '-' entry indicator appeared where no block sequence may start.
    #[error("Block sequence entries are not allowed in this context, {mark}")]
    UnexpectedBlockEntry { mark: Mark },

    /// An anchor or alias name was empty or ended on a bad character.
    #[error("While scanning an {what} starting at {start}, did not find a valid name character, {mark}")]
    BadAnchor {
        what: &'static str,
        start: Mark,
        mark: Mark,
    },

    /// An unknown escape character followed a backslash.
    #[error("While scanning a double-quoted scalar starting at {start}, found unknown escape character {found:?}, {mark}")]
    BadEscape {
        found: char,
        start: Mark,
        mark: Mark,
    },

    /// A numeric escape contained a non-hexadecimal digit.
    #[error("While scanning a double-quoted scalar starting at {start}, expected a hexadecimal digit in the escape sequence, {mark}")]
    BadHexEscape { start: Mark, mark: Mark },

    /// A numeric escape produced a value outside the Unicode range.
    #[error("While scanning a double-quoted scalar starting at {start}, escape produced invalid code point U+{value:04X}, {mark}")]
    EscapeOutOfRange {
        value: u32,
        start: Mark,
        mark: Mark,
    },

    /// A quoted scalar ran into the end of the stream.
    #[error("While scanning a quoted scalar starting at {start}, found unexpected end of stream, {mark}")]
    UnterminatedQuote { start: Mark, mark: Mark },

    /// A quoted scalar ran into a document indicator.
    #[error("While scanning a quoted scalar starting at {start}, found unexpected document indicator, {mark}")]
    DocumentIndicatorInQuote { start: Mark, mark: Mark },

    /// A block scalar header was malformed.
    #[error("While scanning a block scalar starting at {start}, {problem}, {mark}")]
    BadBlockHeader {
        problem: &'static str,
        start: Mark,
        mark: Mark,
    },

    /// A directive line was malformed.
    #[error("While scanning a directive starting at {start}, {problem}, {mark}")]
    BadDirective {
        problem: &'static str,
        start: Mark,
        mark: Mark,
    },

    /// A tag was malformed.
    #[error("While scanning a tag starting at {start}, {problem}, {mark}")]
    BadTag {
        problem: &'static str,
        start: Mark,
        mark: Mark,
    },

    /// A character appeared that cannot begin any token.
    #[error("Found a character {found:?} that cannot start any token, {mark}")]
    UnexpectedCharacter { found: char, mark: Mark },

    /// The token stream ended while a token was still expected.
    #[error("Unexpected end of token stream, {mark}")]
    UnexpectedEndOfStream { mark: Mark },
}

impl ScanError {
    /// The position where the problem was found.
    pub fn mark(&self) -> Mark {
        match *self {
            ScanError::ForbiddenCharacter { mark, .. }
            | ScanError::TabInIndentation { mark }
            | ScanError::StaleSimpleKey { mark }
            | ScanError::UnexpectedValue { mark }
            | ScanError::UnexpectedKey { mark }
            | ScanError::UnexpectedBlockEntry { mark }
            | ScanError::BadAnchor { mark, .. }
            | ScanError::BadEscape { mark, .. }
            | ScanError::BadHexEscape { mark, .. }
            | ScanError::EscapeOutOfRange { mark, .. }
            | ScanError::UnterminatedQuote { mark, .. }
            | ScanError::DocumentIndicatorInQuote { mark, .. }
            | ScanError::BadBlockHeader { mark, .. }
            | ScanError::BadDirective { mark, .. }
            | ScanError::BadTag { mark, .. }
            | ScanError::UnexpectedCharacter { mark, .. }
            | ScanError::UnexpectedEndOfStream { mark } => mark,
        }
    }

    /// The start of the enclosing construct, when one exists.
    pub fn context_mark(&self) -> Option<Mark> {
        match *self {
            ScanError::BadAnchor { start, .. }
            | ScanError::BadEscape { start, .. }
            | ScanError::BadHexEscape { start, .. }
            | ScanError::EscapeOutOfRange { start, .. }
            | ScanError::UnterminatedQuote { start, .. }
            | ScanError::DocumentIndicatorInQuote { start, .. }
            | ScanError::BadBlockHeader { start, .. }
            | ScanError::BadDirective { start, .. }
            | ScanError::BadTag { start, .. } => Some(start),
            _ => None,
        }
    }
}

/// Error raised by the parser for grammar violations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// A lexical error surfaced while pulling tokens.
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// A token did not fit the grammar of the enclosing construct.
    #[error("While parsing {context} starting at {context_mark}, expected {expected} but found {found}, {mark}")]
    UnexpectedToken {
        context: &'static str,
        context_mark: Mark,
        expected: &'static str,
        found: String,
        mark: Mark,
    },

    /// A token did not fit the grammar and no construct was open.
    #[error("Expected {expected} but found {found}, {mark}")]
    Unexpected {
        expected: &'static str,
        found: String,
        mark: Mark,
    },

    /// Two `%YAML` directives appeared in one document.
    #[error("Found a duplicate %YAML directive, {mark}")]
    DuplicateVersionDirective { mark: Mark },

    /// The `%YAML` directive named a version this engine cannot process.
    #[error("Found an incompatible YAML version {major}.{minor}, {mark}")]
    UnsupportedVersion { major: u32, minor: u32, mark: Mark },

    /// Two `%TAG` directives declared the same handle in one document.
    #[error("Found a duplicate %TAG directive for handle {handle:?}, {mark}")]
    DuplicateTagHandle { handle: String, mark: Mark },

    /// A tag used a handle no `%TAG` directive declared.
    #[error("Found undefined tag handle {handle:?}, {mark}")]
    UnknownTagHandle { handle: String, mark: Mark },

    /// A node carried more than one anchor.
    #[error("Found a duplicate anchor on the same node, {mark}")]
    DuplicateAnchor { mark: Mark },

    /// A node carried more than one tag.
    #[error("Found a duplicate tag on the same node, {mark}")]
    DuplicateTag { mark: Mark },
}

impl ParseError {
    /// The position where the problem was found.
    pub fn mark(&self) -> Mark {
        match *self {
            ParseError::Scan(ref e) => e.mark(),
            ParseError::UnexpectedToken { mark, .. }
            | ParseError::Unexpected { mark, .. }
            | ParseError::DuplicateVersionDirective { mark }
            | ParseError::UnsupportedVersion { mark, .. }
            | ParseError::DuplicateTagHandle { mark, .. }
            | ParseError::UnknownTagHandle { mark, .. }
            | ParseError::DuplicateAnchor { mark }
            | ParseError::DuplicateTag { mark } => mark,
        }
    }

    /// The start of the enclosing construct, when one exists.
    pub fn context_mark(&self) -> Option<Mark> {
        match *self {
            ParseError::Scan(ref e) => e.context_mark(),
            ParseError::UnexpectedToken { context_mark, .. } => Some(context_mark),
            _ => None,
        }
    }

    /// Render the full two-line diagnostic: problem, optional context
    /// line, and the source snippet with a caret.
    pub fn render(&self, source: &str, label: Option<&str>) -> String {
        let mut out = String::new();
        match label {
            Some(name) => out.push_str(&format!("{} in <{}>\n", self, name)),
            None => out.push_str(&format!("{}\n", self)),
        }
        out.push_str(&self.mark().snippet(source));
        out
    }
}

/// Error raised by the emitter for event sequences that violate the
/// grammar. Always indicates a bug in the event producer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmitError {
    /// An event arrived that the current output state cannot accept.
    #[error("Expected {expected}, found {found} event")]
    UnexpectedEvent {
        expected: &'static str,
        found: &'static str,
    },

    /// An event arrived after the stream was closed.
    #[error("No events are expected after the stream end")]
    StreamEnded,

    /// A tag could not be formatted for output.
    #[error("Cannot format tag {tag:?} for output")]
    InvalidTag { tag: String },

    /// The output sink rejected a write.
    #[error("Output sink error")]
    Sink(#[from] fmt::Error),
}
