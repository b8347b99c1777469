//! Phase 1: Scanner
//!
//! The scanner converts a stream of code points into a lazy sequence of
//! tokens. It owns all indentation and flow-nesting state:
//! - An indentation stack, strictly increasing, unwound on dedent with
//!   one `BlockEnd` token per level popped.
//! - A flow level counting unclosed `[` / `{`; indentation is ignored
//!   inside flow context.
//! - One simple-key candidate per flow level. Key/value association is
//!   discovered only when `:` appears, so a `Key` token (and, for the
//!   first key at an indentation level, a `BlockMappingStart`) is
//!   inserted retroactively at the candidate's recorded token position.
//!   Candidates go stale when the line changes or after
//!   `max_simple_key_len` characters; staling a required candidate is a
//!   hard error.
//!
//! Tokens are produced on demand: each `next_token` call performs only
//! the work needed to hand out one token, and the scanner stays valid
//! and resumable between calls.

use std::collections::VecDeque;

use log::trace;

use crate::error::{Mark, ScanError, Span};
use crate::token::{Chomping, ScalarStyle, Token, TokenKind};

/// Options fixed for the lifetime of one scanner.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Name of the input, used when rendering diagnostics.
    pub label: Option<String>,
    /// Distance in characters after which a simple-key candidate goes
    /// stale. The YAML specification caps this at 1024.
    pub max_simple_key_len: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            label: None,
            max_simple_key_len: 1024,
        }
    }
}

/// A candidate simple key: a possible mapping key awaiting its ':'.
#[derive(Debug, Clone)]
struct SimpleKey {
    /// Whether this candidate is still viable.
    possible: bool,
    /// Required keys sit at the start of a line at the block indent;
    /// staling one is an error rather than a silent downgrade.
    required: bool,
    /// Absolute token number where the Key token would be inserted.
    token_number: usize,
    /// Where the candidate's content begins.
    mark: Mark,
}

impl SimpleKey {
    fn inactive() -> Self {
        Self {
            possible: false,
            required: false,
            token_number: 0,
            mark: Mark::default(),
        }
    }
}

/// The character-to-token engine.
pub struct Scanner<I: Iterator<Item = char>> {
    source: I,
    buffer: VecDeque<char>,
    mark: Mark,
    opts: ScanOptions,

    tokens: VecDeque<Token>,
    /// Number of tokens already handed to the consumer; token insertion
    /// positions are absolute, so this converts them to queue indices.
    tokens_taken: usize,
    token_available: bool,

    stream_start_produced: bool,
    stream_end_produced: bool,

    /// Current block indentation column, -1 at stream level.
    indent: isize,
    indents: Vec<isize>,
    flow_level: usize,

    simple_keys: Vec<SimpleKey>,
    simple_key_allowed: bool,
}

/// Build a scanner over the characters of a string slice.
pub fn from_str(input: &str) -> Scanner<std::str::Chars<'_>> {
    Scanner::new(input.chars())
}

impl<I: Iterator<Item = char>> Scanner<I> {
    /// Create a scanner with default options.
    pub fn new(source: I) -> Self {
        Self::with_options(source, ScanOptions::default())
    }

    /// Create a scanner with explicit options.
    pub fn with_options(source: I, opts: ScanOptions) -> Self {
        Self {
            source,
            buffer: VecDeque::new(),
            mark: Mark::default(),
            opts,
            tokens: VecDeque::new(),
            tokens_taken: 0,
            token_available: false,
            stream_start_produced: false,
            stream_end_produced: false,
            indent: -1,
            indents: Vec::new(),
            flow_level: 0,
            simple_keys: Vec::new(),
            simple_key_allowed: true,
        }
    }

    /// The scanner's current position in the input.
    pub fn mark(&self) -> Mark {
        self.mark
    }

    /// The label naming this input, if any.
    pub fn label(&self) -> Option<&str> {
        self.opts.label.as_deref()
    }

    /// Whether the `StreamEnd` token has been produced.
    pub fn stream_ended(&self) -> bool {
        self.stream_end_produced
    }

    /// Inspect the next token without consuming it.
    pub fn peek_token(&mut self) -> Result<&Token, ScanError> {
        if !self.token_available {
            self.fetch_more_tokens()?;
        }
        match self.tokens.front() {
            Some(token) => Ok(token),
            None => Err(ScanError::UnexpectedEndOfStream { mark: self.mark }),
        }
    }

    /// Consume and return the next token.
    pub fn next_token(&mut self) -> Result<Token, ScanError> {
        if !self.token_available {
            self.fetch_more_tokens()?;
        }
        match self.tokens.pop_front() {
            Some(token) => {
                self.token_available = false;
                self.tokens_taken += 1;
                Ok(token)
            }
            None => Err(ScanError::UnexpectedEndOfStream { mark: self.mark }),
        }
    }

    /// Test the next token's kind without consuming it.
    pub fn next_is(&mut self, pred: impl FnOnce(&TokenKind) -> bool) -> Result<bool, ScanError> {
        Ok(pred(&self.peek_token()?.kind))
    }

    // =========================================================================
    // Token fetching
    // =========================================================================

    /// Fetch tokens until the head of the queue is safe to hand out. The
    /// head is not safe while a simple-key candidate still points at it:
    /// the pending ':' discovery could yet insert a Key token in front.
    fn fetch_more_tokens(&mut self) -> Result<(), ScanError> {
        loop {
            let mut need_more = false;
            if self.tokens.is_empty() {
                need_more = true;
            } else {
                self.stale_simple_keys()?;
                for key in &self.simple_keys {
                    if key.possible && key.token_number == self.tokens_taken {
                        need_more = true;
                        break;
                    }
                }
            }
            if !need_more {
                break;
            }
            self.fetch_next_token()?;
        }
        self.token_available = true;
        Ok(())
    }

    fn fetch_next_token(&mut self) -> Result<(), ScanError> {
        self.lookahead(1);
        if !self.stream_start_produced {
            self.fetch_stream_start();
            return Ok(());
        }

        self.scan_to_next_token()?;
        self.stale_simple_keys()?;
        self.unwind_indent(self.mark.col as isize);

        self.lookahead(4);
        if is_z(self.ch()) {
            return self.fetch_stream_end();
        }

        let c = self.ch();
        if self.mark.col == 0 {
            if c == '%' {
                return self.fetch_directive();
            }
            if c == '-'
                && self.ch_at(1) == '-'
                && self.ch_at(2) == '-'
                && is_blankz(self.ch_at(3))
            {
                return self.fetch_document_indicator(TokenKind::DocumentStart);
            }
            if c == '.'
                && self.ch_at(1) == '.'
                && self.ch_at(2) == '.'
                && is_blankz(self.ch_at(3))
            {
                return self.fetch_document_indicator(TokenKind::DocumentEnd);
            }
        }

        match c {
            '[' => self.fetch_flow_collection_start(TokenKind::FlowSequenceStart),
            '{' => self.fetch_flow_collection_start(TokenKind::FlowMappingStart),
            ']' => self.fetch_flow_collection_end(TokenKind::FlowSequenceEnd),
            '}' => self.fetch_flow_collection_end(TokenKind::FlowMappingEnd),
            ',' => self.fetch_flow_entry(),
            '-' if is_blankz(self.ch_at(1)) => self.fetch_block_entry(),
            '?' if self.flow_level > 0 || is_blankz(self.ch_at(1)) => self.fetch_key(),
            ':' if self.flow_level > 0 || is_blankz(self.ch_at(1)) => self.fetch_value(),
            '*' => self.fetch_anchor(false),
            '&' => self.fetch_anchor(true),
            '!' => self.fetch_tag(),
            '|' if self.flow_level == 0 => self.fetch_block_scalar(true),
            '>' if self.flow_level == 0 => self.fetch_block_scalar(false),
            '\'' => self.fetch_flow_scalar(true),
            '"' => self.fetch_flow_scalar(false),
            _ if self.can_start_plain(c) => self.fetch_plain_scalar(),
            _ => Err(ScanError::UnexpectedCharacter {
                found: c,
                mark: self.mark,
            }),
        }
    }

    /// Whether `c` at the current position may begin a plain scalar.
    fn can_start_plain(&self, c: char) -> bool {
        match c {
            c if is_blankz(c) => false,
            ',' | '[' | ']' | '{' | '}' | '#' | '&' | '*' | '!' | '|' | '>' | '\'' | '"' | '%'
            | '@' | '`' => false,
            '-' => !is_blankz(self.ch_at(1)),
            '?' | ':' => self.flow_level == 0 && !is_blankz(self.ch_at(1)),
            _ => true,
        }
    }

    /// Skip separation whitespace, comments, and line breaks to the
    /// start of the next token. Crossing a line break in block context
    /// re-allows simple keys.
    fn scan_to_next_token(&mut self) -> Result<(), ScanError> {
        loop {
            self.lookahead(1);
            // A byte order mark is stripped once at stream start.
            if self.mark.index == 0 && self.ch() == '\u{feff}' {
                self.skip();
                continue;
            }
            match self.ch() {
                ' ' => self.skip(),
                // Tabs never count as indentation: they are skipped only
                // inside flow context or after the line's first token.
                '\t' if self.flow_level > 0 || !self.simple_key_allowed => self.skip(),
                '#' => {
                    while !is_breakz(self.ch()) {
                        let c = self.ch();
                        if !is_printable(c) {
                            return Err(ScanError::ForbiddenCharacter {
                                code: c as u32,
                                mark: self.mark,
                            });
                        }
                        self.skip();
                        self.lookahead(1);
                    }
                }
                c if is_break(c) => {
                    self.lookahead(2);
                    self.skip_break();
                    if self.flow_level == 0 {
                        self.simple_key_allowed = true;
                    }
                }
                _ => break,
            }
        }
        Ok(())
    }

    // =========================================================================
    // Simple keys
    // =========================================================================

    /// Invalidate candidates whose line has passed or whose span exceeds
    /// the maximum simple-key length. A stale required key is an error.
    fn stale_simple_keys(&mut self) -> Result<(), ScanError> {
        for key in &mut self.simple_keys {
            if key.possible
                && (key.mark.line < self.mark.line
                    || key.mark.index + self.opts.max_simple_key_len < self.mark.index)
            {
                if key.required {
                    return Err(ScanError::StaleSimpleKey { mark: key.mark });
                }
                key.possible = false;
            }
        }
        Ok(())
    }

    /// Record the current position as a simple-key candidate for the
    /// current flow level, replacing any previous candidate there.
    fn save_simple_key(&mut self) -> Result<(), ScanError> {
        if self.simple_key_allowed {
            let key = SimpleKey {
                possible: true,
                required: self.flow_level == 0 && self.indent == self.mark.col as isize,
                token_number: self.tokens_taken + self.tokens.len(),
                mark: self.mark,
            };
            self.remove_simple_key()?;
            *self
                .simple_keys
                .last_mut()
                .expect("a simple key slot exists per flow level") = key;
        }
        Ok(())
    }

    /// Drop the current level's candidate. Dropping a required candidate
    /// means its ':' can no longer appear, which is an error.
    fn remove_simple_key(&mut self) -> Result<(), ScanError> {
        let key = self
            .simple_keys
            .last_mut()
            .expect("a simple key slot exists per flow level");
        if key.possible && key.required {
            return Err(ScanError::StaleSimpleKey { mark: key.mark });
        }
        key.possible = false;
        Ok(())
    }

    // =========================================================================
    // Indentation
    // =========================================================================

    /// Push a new indentation level and open a block collection token.
    /// `number`, when given, is the absolute token position the opening
    /// token must be inserted at (before a retroactive Key).
    fn roll_indent(&mut self, col: usize, number: Option<usize>, kind: TokenKind, mark: Mark) {
        if self.flow_level > 0 {
            return;
        }
        if self.indent < col as isize {
            self.indents.push(self.indent);
            self.indent = col as isize;
            let token = Token::new(kind, Span::empty(mark));
            match number {
                Some(n) => self.tokens.insert(n - self.tokens_taken, token),
                None => self.tokens.push_back(token),
            }
        }
    }

    /// Pop indentation levels down to `col`, emitting one `BlockEnd`
    /// token per level popped. The stack is strictly increasing, so each
    /// pop closes exactly one block collection.
    fn unwind_indent(&mut self, col: isize) {
        if self.flow_level > 0 {
            return;
        }
        while self.indent > col {
            trace!("unwinding block indent {} to column {}", self.indent, col);
            self.tokens
                .push_back(Token::new(TokenKind::BlockEnd, Span::empty(self.mark)));
            self.indent = self.indents.pop().unwrap_or(-1);
        }
    }

    // =========================================================================
    // Fetch routines
    // =========================================================================

    fn fetch_stream_start(&mut self) {
        let mark = self.mark;
        self.indent = -1;
        self.stream_start_produced = true;
        self.simple_key_allowed = true;
        self.simple_keys.push(SimpleKey::inactive());
        self.tokens
            .push_back(Token::new(TokenKind::StreamStart, Span::empty(mark)));
    }

    fn fetch_stream_end(&mut self) -> Result<(), ScanError> {
        // Force a line start so the indentation unwind sees column 0.
        if self.mark.col != 0 {
            self.mark.col = 0;
            self.mark.line += 1;
        }
        self.unwind_indent(-1);
        self.remove_simple_key()?;
        self.simple_key_allowed = false;
        self.stream_end_produced = true;
        self.tokens
            .push_back(Token::new(TokenKind::StreamEnd, Span::empty(self.mark)));
        Ok(())
    }

    fn fetch_directive(&mut self) -> Result<(), ScanError> {
        self.unwind_indent(-1);
        self.remove_simple_key()?;
        self.simple_key_allowed = false;
        if let Some(token) = self.scan_directive()? {
            self.tokens.push_back(token);
        }
        Ok(())
    }

    fn fetch_document_indicator(&mut self, kind: TokenKind) -> Result<(), ScanError> {
        self.unwind_indent(-1);
        self.remove_simple_key()?;
        self.simple_key_allowed = false;
        let start = self.mark;
        self.skip();
        self.skip();
        self.skip();
        self.tokens
            .push_back(Token::new(kind, Span::new(start, self.mark)));
        Ok(())
    }

    fn fetch_flow_collection_start(&mut self, kind: TokenKind) -> Result<(), ScanError> {
        // The bracket itself may begin a simple key: `[a, b]: value`.
        self.save_simple_key()?;
        self.simple_keys.push(SimpleKey::inactive());
        self.flow_level += 1;
        self.simple_key_allowed = true;
        let start = self.mark;
        self.skip();
        self.tokens
            .push_back(Token::new(kind, Span::new(start, self.mark)));
        Ok(())
    }

    fn fetch_flow_collection_end(&mut self, kind: TokenKind) -> Result<(), ScanError> {
        self.remove_simple_key()?;
        if self.flow_level > 0 {
            self.flow_level -= 1;
            self.simple_keys.pop();
        }
        self.simple_key_allowed = false;
        let start = self.mark;
        self.skip();
        self.tokens
            .push_back(Token::new(kind, Span::new(start, self.mark)));
        Ok(())
    }

    fn fetch_flow_entry(&mut self) -> Result<(), ScanError> {
        self.remove_simple_key()?;
        self.simple_key_allowed = true;
        let start = self.mark;
        self.skip();
        self.tokens
            .push_back(Token::new(TokenKind::FlowEntry, Span::new(start, self.mark)));
        Ok(())
    }

    fn fetch_block_entry(&mut self) -> Result<(), ScanError> {
        if self.flow_level == 0 {
            if !self.simple_key_allowed {
                return Err(ScanError::UnexpectedBlockEntry { mark: self.mark });
            }
            self.roll_indent(
                self.mark.col,
                None,
                TokenKind::BlockSequenceStart,
                self.mark,
            );
        }
        // A '-' inside flow context is left for the parser to report,
        // which can name the surrounding construct.
        self.remove_simple_key()?;
        self.simple_key_allowed = true;
        let start = self.mark;
        self.skip();
        self.tokens.push_back(Token::new(
            TokenKind::BlockEntry,
            Span::new(start, self.mark),
        ));
        Ok(())
    }

    fn fetch_key(&mut self) -> Result<(), ScanError> {
        if self.flow_level == 0 {
            if !self.simple_key_allowed {
                return Err(ScanError::UnexpectedKey { mark: self.mark });
            }
            self.roll_indent(self.mark.col, None, TokenKind::BlockMappingStart, self.mark);
        }
        self.remove_simple_key()?;
        self.simple_key_allowed = self.flow_level == 0;
        let start = self.mark;
        self.skip();
        self.tokens
            .push_back(Token::new(TokenKind::Key, Span::new(start, self.mark)));
        Ok(())
    }

    fn fetch_value(&mut self) -> Result<(), ScanError> {
        let key = self
            .simple_keys
            .last()
            .expect("a simple key slot exists per flow level")
            .clone();
        if key.possible {
            // The ':' resolves the pending candidate: insert the Key
            // token back at the candidate's position, and open the block
            // mapping there if this is the first key at that indent.
            let index = key.token_number - self.tokens_taken;
            self.tokens
                .insert(index, Token::new(TokenKind::Key, Span::empty(key.mark)));
            self.roll_indent(
                key.mark.col,
                Some(key.token_number),
                TokenKind::BlockMappingStart,
                key.mark,
            );
            self.simple_keys
                .last_mut()
                .expect("a simple key slot exists per flow level")
                .possible = false;
            self.simple_key_allowed = false;
        } else {
            if self.flow_level == 0 {
                if !self.simple_key_allowed {
                    return Err(ScanError::UnexpectedValue { mark: self.mark });
                }
                self.roll_indent(self.mark.col, None, TokenKind::BlockMappingStart, self.mark);
            }
            self.simple_key_allowed = self.flow_level == 0;
        }
        let start = self.mark;
        self.skip();
        self.tokens
            .push_back(Token::new(TokenKind::Value, Span::new(start, self.mark)));
        Ok(())
    }

    fn fetch_anchor(&mut self, define: bool) -> Result<(), ScanError> {
        self.save_simple_key()?;
        self.simple_key_allowed = false;
        let token = self.scan_anchor(define)?;
        self.tokens.push_back(token);
        Ok(())
    }

    fn fetch_tag(&mut self) -> Result<(), ScanError> {
        self.save_simple_key()?;
        self.simple_key_allowed = false;
        let token = self.scan_tag()?;
        self.tokens.push_back(token);
        Ok(())
    }

    fn fetch_block_scalar(&mut self, literal: bool) -> Result<(), ScanError> {
        self.remove_simple_key()?;
        // A simple key may follow a block scalar.
        self.simple_key_allowed = true;
        let token = self.scan_block_scalar(literal)?;
        self.tokens.push_back(token);
        Ok(())
    }

    fn fetch_flow_scalar(&mut self, single: bool) -> Result<(), ScanError> {
        self.save_simple_key()?;
        self.simple_key_allowed = false;
        let token = self.scan_flow_scalar(single)?;
        self.tokens.push_back(token);
        Ok(())
    }

    fn fetch_plain_scalar(&mut self) -> Result<(), ScanError> {
        self.save_simple_key()?;
        self.simple_key_allowed = false;
        let token = self.scan_plain_scalar()?;
        self.tokens.push_back(token);
        Ok(())
    }

    // =========================================================================
    // Directive scanning
    // =========================================================================

    /// Scan one `%` directive line. Unknown directives are skipped and
    /// produce no token.
    fn scan_directive(&mut self) -> Result<Option<Token>, ScanError> {
        let start = self.mark;
        self.skip(); // '%'
        let name = self.scan_directive_name(start)?;
        let kind = match name.as_str() {
            "YAML" => Some(self.scan_version_directive(start)?),
            "TAG" => Some(self.scan_tag_directive(start)?),
            _ => {
                log::warn!("skipping unknown directive %{}", name);
                self.lookahead(1);
                while !is_breakz(self.ch()) {
                    self.skip();
                    self.lookahead(1);
                }
                None
            }
        };

        // Only blanks and a comment may follow the directive payload.
        self.lookahead(1);
        while is_blank(self.ch()) {
            self.skip();
            self.lookahead(1);
        }
        if self.ch() == '#' {
            while !is_breakz(self.ch()) {
                self.skip();
                self.lookahead(1);
            }
        }
        if !is_breakz(self.ch()) {
            return Err(ScanError::BadDirective {
                problem: "did not find expected comment or line break",
                start,
                mark: self.mark,
            });
        }
        if is_break(self.ch()) {
            self.lookahead(2);
            self.skip_break();
        }

        Ok(kind.map(|kind| Token::new(kind, Span::new(start, self.mark))))
    }

    fn scan_directive_name(&mut self, start: Mark) -> Result<String, ScanError> {
        let mut name = String::new();
        self.lookahead(1);
        while is_word_char(self.ch()) {
            name.push(self.ch());
            self.skip();
            self.lookahead(1);
        }
        if name.is_empty() {
            return Err(ScanError::BadDirective {
                problem: "did not find expected directive name",
                start,
                mark: self.mark,
            });
        }
        if !is_blankz(self.ch()) {
            return Err(ScanError::BadDirective {
                problem: "found unexpected non-alphabetical character",
                start,
                mark: self.mark,
            });
        }
        Ok(name)
    }

    fn scan_version_directive(&mut self, start: Mark) -> Result<TokenKind, ScanError> {
        self.lookahead(1);
        while is_blank(self.ch()) {
            self.skip();
            self.lookahead(1);
        }
        let major = self.scan_version_number(start)?;
        if self.ch() != '.' {
            return Err(ScanError::BadDirective {
                problem: "did not find expected digit or '.' character",
                start,
                mark: self.mark,
            });
        }
        self.skip();
        let minor = self.scan_version_number(start)?;
        Ok(TokenKind::VersionDirective { major, minor })
    }

    fn scan_version_number(&mut self, start: Mark) -> Result<u32, ScanError> {
        let mut value: u32 = 0;
        let mut digits = 0;
        self.lookahead(1);
        while let Some(d) = self.ch().to_digit(10) {
            value = value * 10 + d;
            digits += 1;
            if digits > 9 {
                return Err(ScanError::BadDirective {
                    problem: "found an overly long version number",
                    start,
                    mark: self.mark,
                });
            }
            self.skip();
            self.lookahead(1);
        }
        if digits == 0 {
            return Err(ScanError::BadDirective {
                problem: "did not find expected version number",
                start,
                mark: self.mark,
            });
        }
        Ok(value)
    }

    fn scan_tag_directive(&mut self, start: Mark) -> Result<TokenKind, ScanError> {
        self.lookahead(1);
        while is_blank(self.ch()) {
            self.skip();
            self.lookahead(1);
        }
        let handle = self.scan_tag_handle(true, start)?;
        self.lookahead(1);
        if !is_blank(self.ch()) {
            return Err(ScanError::BadDirective {
                problem: "did not find expected whitespace after tag handle",
                start,
                mark: self.mark,
            });
        }
        while is_blank(self.ch()) {
            self.skip();
            self.lookahead(1);
        }
        let prefix = self.scan_tag_uri(true, "", start)?;
        if prefix.is_empty() {
            return Err(ScanError::BadDirective {
                problem: "did not find expected tag prefix",
                start,
                mark: self.mark,
            });
        }
        self.lookahead(1);
        if !is_blankz(self.ch()) {
            return Err(ScanError::BadDirective {
                problem: "did not find expected whitespace after tag prefix",
                start,
                mark: self.mark,
            });
        }
        Ok(TokenKind::TagDirective { handle, prefix })
    }

    // =========================================================================
    // Anchor and tag scanning
    // =========================================================================

    fn scan_anchor(&mut self, define: bool) -> Result<Token, ScanError> {
        let what = if define { "anchor" } else { "alias" };
        let start = self.mark;
        self.skip(); // '&' or '*'
        let mut name = String::new();
        self.lookahead(1);
        while is_anchor_char(self.ch()) {
            name.push(self.ch());
            self.skip();
            self.lookahead(1);
        }
        let c = self.ch();
        if name.is_empty() || !(is_blankz(c) || matches!(c, ',' | ']' | '}' | ':')) {
            return Err(ScanError::BadAnchor {
                what,
                start,
                mark: self.mark,
            });
        }
        let kind = if define {
            TokenKind::Anchor(name)
        } else {
            TokenKind::Alias(name)
        };
        Ok(Token::new(kind, Span::new(start, self.mark)))
    }

    fn scan_tag(&mut self) -> Result<Token, ScanError> {
        let start = self.mark;
        let handle;
        let suffix;

        self.lookahead(2);
        if self.ch_at(1) == '<' {
            // Verbatim tag: !<uri>
            handle = String::new();
            self.skip();
            self.skip();
            suffix = self.scan_tag_uri(true, "", start)?;
            if self.ch() != '>' {
                return Err(ScanError::BadTag {
                    problem: "did not find expected '>'",
                    start,
                    mark: self.mark,
                });
            }
            if suffix.is_empty() {
                return Err(ScanError::BadTag {
                    problem: "did not find expected tag URI",
                    start,
                    mark: self.mark,
                });
            }
            self.skip();
        } else {
            let scanned = self.scan_tag_handle(false, start)?;
            if scanned.len() > 1 && scanned.ends_with('!') {
                // Named handle: !name!suffix
                handle = scanned;
                suffix = self.scan_tag_uri(false, "", start)?;
                if suffix.is_empty() {
                    return Err(ScanError::BadTag {
                        problem: "did not find expected tag suffix",
                        start,
                        mark: self.mark,
                    });
                }
            } else {
                // The handle scan consumed the start of a '!suffix' form
                // (or just '!'); what it read past the '!' seeds the
                // suffix. An empty suffix is the non-specific tag.
                suffix = self.scan_tag_uri(false, &scanned[1..], start)?;
                handle = "!".to_string();
            }
        }

        self.lookahead(1);
        let c = self.ch();
        if !is_blankz(c) && !(self.flow_level > 0 && is_flow_indicator(c)) {
            return Err(ScanError::BadTag {
                problem: "did not find expected whitespace or line break",
                start,
                mark: self.mark,
            });
        }
        Ok(Token::new(
            TokenKind::Tag { handle, suffix },
            Span::new(start, self.mark),
        ))
    }

    fn scan_tag_handle(&mut self, directive: bool, start: Mark) -> Result<String, ScanError> {
        if self.ch() != '!' {
            return Err(ScanError::BadTag {
                problem: "did not find expected '!'",
                start,
                mark: self.mark,
            });
        }
        let mut handle = String::from("!");
        self.skip();
        self.lookahead(1);
        while is_word_char(self.ch()) {
            handle.push(self.ch());
            self.skip();
            self.lookahead(1);
        }
        if self.ch() == '!' {
            handle.push('!');
            self.skip();
        } else if directive && handle != "!" {
            // A %TAG handle with name characters must close with '!'.
            return Err(ScanError::BadDirective {
                problem: "did not find expected '!' closing the tag handle",
                start,
                mark: self.mark,
            });
        }
        Ok(handle)
    }

    /// Scan tag URI characters with `%HH` escapes decoded, continuing
    /// from `head` when the handle scan consumed part of the suffix.
    /// Directive prefixes and verbatim tags admit flow indicator
    /// characters; plain tag suffixes treat them as delimiters.
    fn scan_tag_uri(
        &mut self,
        allow_flow_indicators: bool,
        head: &str,
        start: Mark,
    ) -> Result<String, ScanError> {
        let mut uri = String::from(head);
        self.lookahead(1);
        loop {
            let c = self.ch();
            let accepted = c.is_ascii_alphanumeric()
                || matches!(
                    c,
                    ';' | '/' | '?' | ':' | '@' | '&' | '=' | '+' | '$' | '.' | '!' | '~' | '*'
                        | '\'' | '(' | ')' | '-' | '_'
                )
                || (allow_flow_indicators && matches!(c, ',' | '[' | ']'));
            if accepted {
                uri.push(c);
                self.skip();
            } else if c == '%' {
                uri.push_str(&self.scan_uri_escapes(start)?);
            } else {
                break;
            }
            self.lookahead(1);
        }
        Ok(uri)
    }

    /// Decode a run of `%HH` escapes as UTF-8 bytes.
    fn scan_uri_escapes(&mut self, start: Mark) -> Result<String, ScanError> {
        let mut bytes = Vec::new();
        while self.ch() == '%' {
            self.lookahead(3);
            let hi = self.ch_at(1).to_digit(16);
            let lo = self.ch_at(2).to_digit(16);
            match (hi, lo) {
                (Some(hi), Some(lo)) => {
                    bytes.push((hi * 16 + lo) as u8);
                    self.skip();
                    self.skip();
                    self.skip();
                }
                _ => {
                    return Err(ScanError::BadTag {
                        problem: "did not find expected hexadecimal digit in URI escape",
                        start,
                        mark: self.mark,
                    });
                }
            }
            self.lookahead(1);
        }
        String::from_utf8(bytes).map_err(|_| ScanError::BadTag {
            problem: "found invalid UTF-8 in URI escape",
            start,
            mark: self.mark,
        })
    }

    // =========================================================================
    // Block scalar scanning
    // =========================================================================

    fn scan_block_scalar(&mut self, literal: bool) -> Result<Token, ScanError> {
        let start = self.mark;
        let mut chomping = Chomping::Clip;
        let mut increment: usize = 0;

        self.skip(); // '|' or '>'
        self.lookahead(1);

        // Header: chomping indicator and indentation indicator, either order.
        let c = self.ch();
        if c == '+' || c == '-' {
            chomping = if c == '+' {
                Chomping::Keep
            } else {
                Chomping::Strip
            };
            self.skip();
            self.lookahead(1);
            if let Some(d) = self.ch().to_digit(10) {
                if d == 0 {
                    return Err(ScanError::BadBlockHeader {
                        problem: "found an indentation indicator equal to 0",
                        start,
                        mark: self.mark,
                    });
                }
                increment = d as usize;
                self.skip();
            }
        } else if let Some(d) = c.to_digit(10) {
            if d == 0 {
                return Err(ScanError::BadBlockHeader {
                    problem: "found an indentation indicator equal to 0",
                    start,
                    mark: self.mark,
                });
            }
            increment = d as usize;
            self.skip();
            self.lookahead(1);
            let c = self.ch();
            if c == '+' || c == '-' {
                chomping = if c == '+' {
                    Chomping::Keep
                } else {
                    Chomping::Strip
                };
                self.skip();
            }
        }

        // Only blanks and a comment may follow the header.
        self.lookahead(1);
        while is_blank(self.ch()) {
            self.skip();
            self.lookahead(1);
        }
        if self.ch() == '#' {
            while !is_breakz(self.ch()) {
                self.skip();
                self.lookahead(1);
            }
        }
        if !is_breakz(self.ch()) {
            return Err(ScanError::BadBlockHeader {
                problem: "did not find expected comment or line break",
                start,
                mark: self.mark,
            });
        }
        if is_break(self.ch()) {
            self.lookahead(2);
            self.skip_break();
        }

        let mut string = String::new();
        let mut leading_break = String::new();
        let mut trailing_breaks = String::new();
        let mut leading_blank = false;

        let mut indent: usize = 0;
        if increment > 0 {
            indent = if self.indent >= 0 {
                self.indent as usize + increment
            } else {
                increment
            };
        }

        self.block_scalar_breaks(&mut indent, &mut trailing_breaks)?;
        self.lookahead(1);

        while self.mark.col == indent && !is_z(self.ch()) {
            let trailing_blank = is_blank(self.ch());
            // Folded style joins a single break between non-blank lines
            // into a space; everything else keeps its breaks.
            if !literal && leading_break.starts_with('\n') && !leading_blank && !trailing_blank {
                if trailing_breaks.is_empty() {
                    string.push(' ');
                }
            } else {
                string.push_str(&leading_break);
            }
            leading_break.clear();
            string.push_str(&trailing_breaks);
            trailing_breaks.clear();

            leading_blank = is_blank(self.ch());
            while !is_breakz(self.ch()) {
                let c = self.ch();
                if !is_printable(c) {
                    return Err(ScanError::ForbiddenCharacter {
                        code: c as u32,
                        mark: self.mark,
                    });
                }
                string.push(c);
                self.skip();
                self.lookahead(1);
            }
            if is_z(self.ch()) {
                break;
            }
            self.lookahead(2);
            self.read_break(&mut leading_break);
            self.block_scalar_breaks(&mut indent, &mut trailing_breaks)?;
            self.lookahead(1);
        }

        // Chomp trailing line breaks.
        if chomping != Chomping::Strip {
            string.push_str(&leading_break);
        }
        if chomping == Chomping::Keep {
            string.push_str(&trailing_breaks);
        }

        let style = if literal {
            ScalarStyle::Literal
        } else {
            ScalarStyle::Folded
        };
        Ok(Token::new(
            TokenKind::Scalar {
                value: string,
                style,
            },
            Span::new(start, self.mark),
        ))
    }

    /// Consume blank lines and indentation inside a block scalar,
    /// detecting the content indentation when no explicit indicator was
    /// given.
    fn block_scalar_breaks(
        &mut self,
        indent: &mut usize,
        breaks: &mut String,
    ) -> Result<(), ScanError> {
        let mut max_indent: usize = 0;
        loop {
            self.lookahead(1);
            while (*indent == 0 || self.mark.col < *indent) && self.ch() == ' ' {
                self.skip();
                self.lookahead(1);
            }
            if self.mark.col > max_indent {
                max_indent = self.mark.col;
            }
            if (*indent == 0 || self.mark.col < *indent) && self.ch() == '\t' {
                return Err(ScanError::TabInIndentation { mark: self.mark });
            }
            if !is_break(self.ch()) {
                break;
            }
            self.lookahead(2);
            self.read_break(breaks);
        }
        if *indent == 0 {
            *indent = max_indent;
            if (*indent as isize) < self.indent + 1 {
                *indent = (self.indent + 1) as usize;
            }
            if *indent < 1 {
                *indent = 1;
            }
        }
        Ok(())
    }

    // =========================================================================
    // Flow scalar scanning
    // =========================================================================

    fn scan_flow_scalar(&mut self, single: bool) -> Result<Token, ScanError> {
        let start = self.mark;
        let mut string = String::new();
        let mut leading_break = String::new();
        let mut trailing_breaks = String::new();
        let mut whitespaces = String::new();

        self.skip(); // opening quote
        loop {
            self.lookahead(4);
            if self.mark.col == 0
                && ((self.ch() == '-' && self.ch_at(1) == '-' && self.ch_at(2) == '-')
                    || (self.ch() == '.' && self.ch_at(1) == '.' && self.ch_at(2) == '.'))
                && is_blankz(self.ch_at(3))
            {
                return Err(ScanError::DocumentIndicatorInQuote {
                    start,
                    mark: self.mark,
                });
            }
            if is_z(self.ch()) {
                return Err(ScanError::UnterminatedQuote {
                    start,
                    mark: self.mark,
                });
            }

            let mut leading_blanks = false;
            self.lookahead(2);
            while !is_blankz(self.ch()) {
                if single && self.ch() == '\'' && self.ch_at(1) == '\'' {
                    // An escaped single quote.
                    string.push('\'');
                    self.skip();
                    self.skip();
                } else if (single && self.ch() == '\'') || (!single && self.ch() == '"') {
                    break;
                } else if !single && self.ch() == '\\' && is_break(self.ch_at(1)) {
                    // An escaped line break is removed entirely.
                    self.lookahead(3);
                    self.skip();
                    self.skip_break();
                    leading_blanks = true;
                    break;
                } else if !single && self.ch() == '\\' {
                    self.scan_quoted_escape(start, &mut string)?;
                } else {
                    let c = self.ch();
                    if !is_printable(c) {
                        return Err(ScanError::ForbiddenCharacter {
                            code: c as u32,
                            mark: self.mark,
                        });
                    }
                    string.push(c);
                    self.skip();
                }
                self.lookahead(2);
            }

            self.lookahead(1);
            if (single && self.ch() == '\'') || (!single && self.ch() == '"') {
                break;
            }

            // Consume blanks and breaks, folding between content runs.
            self.lookahead(1);
            while is_blank(self.ch()) || is_break(self.ch()) {
                if is_blank(self.ch()) {
                    if leading_blanks {
                        self.skip();
                    } else {
                        whitespaces.push(self.ch());
                        self.skip();
                    }
                } else {
                    self.lookahead(2);
                    if leading_blanks {
                        self.read_break(&mut trailing_breaks);
                    } else {
                        whitespaces.clear();
                        self.read_break(&mut leading_break);
                        leading_blanks = true;
                    }
                }
                self.lookahead(1);
            }

            if leading_blanks {
                if leading_break.starts_with('\n') {
                    // A single break folds to a space, several keep all
                    // but the first.
                    if trailing_breaks.is_empty() {
                        string.push(' ');
                    } else {
                        string.push_str(&trailing_breaks);
                        trailing_breaks.clear();
                    }
                    leading_break.clear();
                } else {
                    string.push_str(&leading_break);
                    string.push_str(&trailing_breaks);
                    leading_break.clear();
                    trailing_breaks.clear();
                }
            } else {
                string.push_str(&whitespaces);
                whitespaces.clear();
            }
        }

        self.skip(); // closing quote
        let style = if single {
            ScalarStyle::SingleQuoted
        } else {
            ScalarStyle::DoubleQuoted
        };
        Ok(Token::new(
            TokenKind::Scalar {
                value: string,
                style,
            },
            Span::new(start, self.mark),
        ))
    }

    /// Decode one backslash escape inside a double-quoted scalar.
    fn scan_quoted_escape(&mut self, start: Mark, out: &mut String) -> Result<(), ScanError> {
        self.lookahead(2);
        self.skip(); // '\\'
        let c = self.ch();
        let code_length = match c {
            'x' => 2,
            'u' => 4,
            'U' => 8,
            _ => 0,
        };
        if code_length > 0 {
            self.skip();
            self.lookahead(code_length);
            let mut value: u32 = 0;
            for k in 0..code_length {
                match self.ch_at(k).to_digit(16) {
                    Some(d) => value = (value << 4) | d,
                    None => {
                        return Err(ScanError::BadHexEscape {
                            start,
                            mark: self.mark,
                        });
                    }
                }
            }
            match char::from_u32(value) {
                Some(decoded) => out.push(decoded),
                None => {
                    return Err(ScanError::EscapeOutOfRange {
                        value,
                        start,
                        mark: self.mark,
                    });
                }
            }
            for _ in 0..code_length {
                self.skip();
            }
            return Ok(());
        }
        let decoded = match c {
            '0' => '\0',
            'a' => '\x07',
            'b' => '\x08',
            't' => '\t',
            'n' => '\n',
            'v' => '\x0b',
            'f' => '\x0c',
            'r' => '\r',
            'e' => '\x1b',
            ' ' => ' ',
            '"' => '"',
            '/' => '/',
            '\\' => '\\',
            'N' => '\u{85}',
            '_' => '\u{a0}',
            'L' => '\u{2028}',
            'P' => '\u{2029}',
            _ => {
                return Err(ScanError::BadEscape {
                    found: c,
                    start,
                    mark: self.mark,
                });
            }
        };
        out.push(decoded);
        self.skip();
        Ok(())
    }

    // =========================================================================
    // Plain scalar scanning
    // =========================================================================

    fn scan_plain_scalar(&mut self) -> Result<Token, ScanError> {
        let start = self.mark;
        let mut end = self.mark;
        // Continuation lines must clear the enclosing block indent.
        let indent = self.indent + 1;

        let mut string = String::new();
        let mut leading_break = String::new();
        let mut trailing_breaks = String::new();
        let mut whitespaces = String::new();
        let mut leading_blanks = false;

        loop {
            self.lookahead(4);
            if self.mark.col == 0
                && ((self.ch() == '-' && self.ch_at(1) == '-' && self.ch_at(2) == '-')
                    || (self.ch() == '.' && self.ch_at(1) == '.' && self.ch_at(2) == '.'))
                && is_blankz(self.ch_at(3))
            {
                break;
            }
            if self.ch() == '#' {
                break;
            }

            while !is_blankz(self.ch()) {
                let c = self.ch();
                if c == ':'
                    && (is_blankz(self.ch_at(1))
                        || (self.flow_level > 0 && is_flow_indicator(self.ch_at(1))))
                {
                    break;
                }
                if self.flow_level > 0 && is_flow_indicator(c) {
                    break;
                }

                // Join pending whitespace before appending content.
                if leading_blanks || !whitespaces.is_empty() {
                    if leading_blanks {
                        if leading_break.starts_with('\n') {
                            if trailing_breaks.is_empty() {
                                string.push(' ');
                            } else {
                                string.push_str(&trailing_breaks);
                                trailing_breaks.clear();
                            }
                            leading_break.clear();
                        } else {
                            string.push_str(&leading_break);
                            string.push_str(&trailing_breaks);
                            leading_break.clear();
                            trailing_breaks.clear();
                        }
                        leading_blanks = false;
                    } else {
                        string.push_str(&whitespaces);
                        whitespaces.clear();
                    }
                }

                if !is_printable(c) {
                    return Err(ScanError::ForbiddenCharacter {
                        code: c as u32,
                        mark: self.mark,
                    });
                }
                string.push(c);
                self.skip();
                self.lookahead(2);
            }
            end = self.mark;

            if !(is_blank(self.ch()) || is_break(self.ch())) {
                break;
            }

            while is_blank(self.ch()) || is_break(self.ch()) {
                if is_blank(self.ch()) {
                    if leading_blanks && (self.mark.col as isize) < indent && self.ch() == '\t' {
                        return Err(ScanError::TabInIndentation { mark: self.mark });
                    }
                    if leading_blanks {
                        self.skip();
                    } else {
                        whitespaces.push(self.ch());
                        self.skip();
                    }
                } else {
                    self.lookahead(2);
                    if leading_blanks {
                        self.read_break(&mut trailing_breaks);
                    } else {
                        whitespaces.clear();
                        self.read_break(&mut leading_break);
                        leading_blanks = true;
                    }
                }
                self.lookahead(1);
            }

            // Indentation ends the scalar in block context.
            if self.flow_level == 0 && (self.mark.col as isize) < indent {
                break;
            }
        }

        // A plain scalar that crossed a line break leaves room for a
        // simple key on the next line.
        if leading_blanks {
            self.simple_key_allowed = true;
        }

        Ok(Token::new(
            TokenKind::Scalar {
                value: string,
                style: ScalarStyle::Plain,
            },
            Span::new(start, end),
        ))
    }

    // =========================================================================
    // Character primitives
    // =========================================================================

    /// Ensure at least `count` characters of lookahead, padding with NUL
    /// sentinels once the source is exhausted.
    fn lookahead(&mut self, count: usize) {
        while self.buffer.len() < count {
            match self.source.next() {
                Some(c) => self.buffer.push_back(c),
                None => self.buffer.push_back('\0'),
            }
        }
    }

    /// The current character. Requires prior `lookahead(1)`.
    fn ch(&self) -> char {
        self.buffer[0]
    }

    /// The character `offset` positions ahead. Requires prior lookahead.
    fn ch_at(&self, offset: usize) -> char {
        self.buffer[offset]
    }

    /// Consume one non-break character.
    fn skip(&mut self) {
        if self.buffer.pop_front().is_some() {
            self.mark.index += 1;
            self.mark.col += 1;
        }
    }

    /// Consume one line break, treating CRLF as a single break.
    /// Requires `lookahead(2)`.
    fn skip_break(&mut self) {
        if self.ch() == '\r' && self.ch_at(1) == '\n' {
            self.buffer.pop_front();
            self.buffer.pop_front();
            self.mark.index += 2;
        } else if is_break(self.ch()) {
            self.buffer.pop_front();
            self.mark.index += 1;
        } else {
            return;
        }
        self.mark.line += 1;
        self.mark.col = 0;
    }

    /// Consume one line break and record it, normalized to LF.
    /// Requires `lookahead(2)`.
    fn read_break(&mut self, out: &mut String) {
        out.push('\n');
        self.skip_break();
    }
}

// =============================================================================
// Character classes
// =============================================================================

fn is_z(c: char) -> bool {
    c == '\0'
}

fn is_break(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\u{85}' | '\u{2028}' | '\u{2029}')
}

fn is_breakz(c: char) -> bool {
    is_break(c) || is_z(c)
}

fn is_blank(c: char) -> bool {
    c == ' ' || c == '\t'
}

fn is_blankz(c: char) -> bool {
    is_blank(c) || is_breakz(c)
}

fn is_flow_indicator(c: char) -> bool {
    matches!(c, ',' | '[' | ']' | '{' | '}')
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

/// Anchor and alias name characters. The published grammar admits any
/// non-space character outside the flow indicators; this engine also
/// rejects ':' in names, a deliberate deviation kept for compatibility
/// with the reference implementation.
fn is_anchor_char(c: char) -> bool {
    !is_blankz(c) && !is_flow_indicator(c) && c != ':'
}

/// The YAML printable set: TAB, LF, CR, NEL, and the printable planes.
fn is_printable(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r' | '\u{85}')
        || ('\x20'..='\x7e').contains(&c)
        || ('\u{a0}'..='\u{d7ff}').contains(&c)
        || ('\u{e000}'..='\u{fffd}').contains(&c)
        || c >= '\u{10000}'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        let mut scanner = from_str(input);
        let mut out = Vec::new();
        loop {
            let token = scanner.next_token().expect("scan should succeed");
            let done = token.kind == TokenKind::StreamEnd;
            out.push(token.kind);
            if done {
                break;
            }
        }
        out
    }

    fn scan_error(input: &str) -> ScanError {
        let mut scanner = from_str(input);
        loop {
            match scanner.next_token() {
                Ok(token) => {
                    if token.kind == TokenKind::StreamEnd {
                        panic!("expected a scan error for {:?}", input);
                    }
                }
                Err(e) => return e,
            }
        }
    }

    fn plain(value: &str) -> TokenKind {
        TokenKind::Scalar {
            value: value.to_string(),
            style: ScalarStyle::Plain,
        }
    }

    #[test]
    fn test_simple_block_mapping() {
        assert_eq!(
            kinds("key: value\n"),
            vec![
                TokenKind::StreamStart,
                TokenKind::BlockMappingStart,
                TokenKind::Key,
                plain("key"),
                TokenKind::Value,
                plain("value"),
                TokenKind::BlockEnd,
                TokenKind::StreamEnd,
            ]
        );
    }

    #[test]
    fn test_block_sequence() {
        assert_eq!(
            kinds("- a\n- b\n"),
            vec![
                TokenKind::StreamStart,
                TokenKind::BlockSequenceStart,
                TokenKind::BlockEntry,
                plain("a"),
                TokenKind::BlockEntry,
                plain("b"),
                TokenKind::BlockEnd,
                TokenKind::StreamEnd,
            ]
        );
    }

    #[test]
    fn test_indentless_sequence_has_no_sequence_start() {
        // A sequence at the same indent as its key opens no new level.
        assert_eq!(
            kinds("key:\n- a\n"),
            vec![
                TokenKind::StreamStart,
                TokenKind::BlockMappingStart,
                TokenKind::Key,
                plain("key"),
                TokenKind::Value,
                TokenKind::BlockEntry,
                plain("a"),
                TokenKind::BlockEnd,
                TokenKind::StreamEnd,
            ]
        );
    }

    #[test]
    fn test_block_end_count_matches_block_starts() {
        let tokens = kinds("a:\n  b:\n    - 1\n    - c: 2\n");
        let starts = tokens
            .iter()
            .filter(|k| {
                matches!(
                    k,
                    TokenKind::BlockMappingStart | TokenKind::BlockSequenceStart
                )
            })
            .count();
        let ends = tokens
            .iter()
            .filter(|k| matches!(k, TokenKind::BlockEnd))
            .count();
        assert_eq!(starts, ends);
        assert_eq!(starts, 4);
    }

    #[test]
    fn test_flow_mapping_tokens() {
        assert_eq!(
            kinds("{a: 1, b: 2}"),
            vec![
                TokenKind::StreamStart,
                TokenKind::FlowMappingStart,
                TokenKind::Key,
                plain("a"),
                TokenKind::Value,
                plain("1"),
                TokenKind::FlowEntry,
                TokenKind::Key,
                plain("b"),
                TokenKind::Value,
                plain("2"),
                TokenKind::FlowMappingEnd,
                TokenKind::StreamEnd,
            ]
        );
    }

    #[test]
    fn test_flow_sequence_nested_in_block() {
        assert_eq!(
            kinds("list: [1, 2]\n"),
            vec![
                TokenKind::StreamStart,
                TokenKind::BlockMappingStart,
                TokenKind::Key,
                plain("list"),
                TokenKind::Value,
                TokenKind::FlowSequenceStart,
                plain("1"),
                TokenKind::FlowEntry,
                plain("2"),
                TokenKind::FlowSequenceEnd,
                TokenKind::BlockEnd,
                TokenKind::StreamEnd,
            ]
        );
    }

    #[test]
    fn test_adjacent_value_after_quoted_key() {
        assert_eq!(
            kinds("{\"a\":1}"),
            vec![
                TokenKind::StreamStart,
                TokenKind::FlowMappingStart,
                TokenKind::Key,
                TokenKind::Scalar {
                    value: "a".into(),
                    style: ScalarStyle::DoubleQuoted,
                },
                TokenKind::Value,
                plain("1"),
                TokenKind::FlowMappingEnd,
                TokenKind::StreamEnd,
            ]
        );
    }

    #[test]
    fn test_plain_scalar_keeps_colon_without_space() {
        assert_eq!(kinds("a:b\n")[1], plain("a:b"));
    }

    #[test]
    fn test_plain_scalar_folds_lines() {
        // One break folds to a space; a blank line keeps one break.
        assert_eq!(kinds("a\n b\n")[1], plain("a b"));
        assert_eq!(kinds("a\n\n b\n")[1], plain("a\nb"));
    }

    #[test]
    fn test_plain_scalar_stops_at_comment() {
        assert_eq!(kinds("value # note\n")[1], plain("value"));
    }

    #[test]
    fn test_document_markers() {
        assert_eq!(
            kinds("---\na\n...\n"),
            vec![
                TokenKind::StreamStart,
                TokenKind::DocumentStart,
                plain("a"),
                TokenKind::DocumentEnd,
                TokenKind::StreamEnd,
            ]
        );
    }

    #[test]
    fn test_directives() {
        assert_eq!(
            kinds("%YAML 1.2\n%TAG !e! tag:example.com,2000:\n---\na\n"),
            vec![
                TokenKind::StreamStart,
                TokenKind::VersionDirective { major: 1, minor: 2 },
                TokenKind::TagDirective {
                    handle: "!e!".into(),
                    prefix: "tag:example.com,2000:".into(),
                },
                TokenKind::DocumentStart,
                plain("a"),
                TokenKind::StreamEnd,
            ]
        );
    }

    #[test]
    fn test_unknown_directive_is_skipped() {
        assert_eq!(
            kinds("%FOO bar\n---\na\n"),
            vec![
                TokenKind::StreamStart,
                TokenKind::DocumentStart,
                plain("a"),
                TokenKind::StreamEnd,
            ]
        );
    }

    #[test]
    fn test_anchor_alias_tokens() {
        assert_eq!(
            kinds("- &a x\n- *a\n"),
            vec![
                TokenKind::StreamStart,
                TokenKind::BlockSequenceStart,
                TokenKind::BlockEntry,
                TokenKind::Anchor("a".into()),
                plain("x"),
                TokenKind::BlockEntry,
                TokenKind::Alias("a".into()),
                TokenKind::BlockEnd,
                TokenKind::StreamEnd,
            ]
        );
    }

    #[test]
    fn test_anchor_name_rejects_colon() {
        // The name stops at ':' and the following character decides
        // validity; '&a:' before a value is accepted, a bare '&' is not.
        assert!(matches!(
            scan_error("- &\n"),
            ScanError::BadAnchor { what: "anchor", .. }
        ));
    }

    #[test]
    fn test_tag_tokens() {
        assert_eq!(
            kinds("!!str a\n")[1],
            TokenKind::Tag {
                handle: "!!".into(),
                suffix: "str".into(),
            }
        );
        assert_eq!(
            kinds("!<tag:example.com,2000:x> a\n")[1],
            TokenKind::Tag {
                handle: "".into(),
                suffix: "tag:example.com,2000:x".into(),
            }
        );
        assert_eq!(
            kinds("! a\n")[1],
            TokenKind::Tag {
                handle: "!".into(),
                suffix: "".into(),
            }
        );
    }

    #[test]
    fn test_single_quoted_scalar() {
        assert_eq!(
            kinds("'it''s'\n")[1],
            TokenKind::Scalar {
                value: "it's".into(),
                style: ScalarStyle::SingleQuoted,
            }
        );
    }

    #[test]
    fn test_double_quoted_escapes() {
        assert_eq!(
            kinds("\"a\\tb\\x41\\u00e9\\U0001F600\\n\"\n")[1],
            TokenKind::Scalar {
                value: "a\tbA\u{e9}\u{1F600}\n".into(),
                style: ScalarStyle::DoubleQuoted,
            }
        );
    }

    #[test]
    fn test_double_quoted_folding() {
        assert_eq!(
            kinds("\"a\n b\"\n")[1],
            TokenKind::Scalar {
                value: "a b".into(),
                style: ScalarStyle::DoubleQuoted,
            }
        );
        // An escaped break joins without a space.
        assert_eq!(
            kinds("\"a\\\nb\"\n")[1],
            TokenKind::Scalar {
                value: "ab".into(),
                style: ScalarStyle::DoubleQuoted,
            }
        );
    }

    #[test]
    fn test_bad_escape_is_error() {
        assert!(matches!(
            scan_error("\"a\\qb\"\n"),
            ScanError::BadEscape { found: 'q', .. }
        ));
        assert!(matches!(
            scan_error("\"\\xZZ\"\n"),
            ScanError::BadHexEscape { .. }
        ));
        assert!(matches!(
            scan_error("\"\\UFFFFFFFF\"\n"),
            ScanError::EscapeOutOfRange { .. }
        ));
    }

    #[test]
    fn test_unterminated_quote_is_error() {
        assert!(matches!(
            scan_error("\"abc\n"),
            ScanError::UnterminatedQuote { .. }
        ));
    }

    #[test]
    fn test_literal_block_scalar_clip() {
        assert_eq!(
            kinds("|\n  a\n  b\n\n")[1],
            TokenKind::Scalar {
                value: "a\nb\n".into(),
                style: ScalarStyle::Literal,
            }
        );
    }

    #[test]
    fn test_literal_block_scalar_strip_and_keep() {
        assert_eq!(
            kinds("|-\n  a\n\n")[1],
            TokenKind::Scalar {
                value: "a".into(),
                style: ScalarStyle::Literal,
            }
        );
        assert_eq!(
            kinds("|+\n  a\n\n")[1],
            TokenKind::Scalar {
                value: "a\n\n".into(),
                style: ScalarStyle::Literal,
            }
        );
    }

    #[test]
    fn test_folded_block_scalar() {
        // Adjacent lines fold to a space; more-indented lines keep
        // their breaks.
        assert_eq!(
            kinds(">\n  a\n  b\n")[1],
            TokenKind::Scalar {
                value: "a b\n".into(),
                style: ScalarStyle::Folded,
            }
        );
        assert_eq!(
            kinds(">\n  a\n   b\n")[1],
            TokenKind::Scalar {
                value: "a\n b\n".into(),
                style: ScalarStyle::Folded,
            }
        );
    }

    #[test]
    fn test_block_scalar_explicit_indent() {
        assert_eq!(
            kinds("|2\n   a\n")[1],
            TokenKind::Scalar {
                value: " a\n".into(),
                style: ScalarStyle::Literal,
            }
        );
    }

    #[test]
    fn test_block_scalar_zero_indicator_is_error() {
        assert!(matches!(
            scan_error("|0\n a\n"),
            ScanError::BadBlockHeader { .. }
        ));
    }

    #[test]
    fn test_simple_key_staleness_across_lines() {
        // The candidate recorded at "a" dies on the line break, so the
        // ':' on the next line inserts no Key token before it.
        assert_eq!(
            kinds("a\n: b\n"),
            vec![
                TokenKind::StreamStart,
                plain("a"),
                TokenKind::BlockMappingStart,
                TokenKind::Value,
                plain("b"),
                TokenKind::BlockEnd,
                TokenKind::StreamEnd,
            ]
        );
    }

    #[test]
    fn test_required_simple_key_must_find_colon() {
        // Inside a block mapping, a candidate at the mapping's indent is
        // required; a line without ':' stales it fatally.
        assert!(matches!(
            scan_error("a: 1\nb\nc: 2\n"),
            ScanError::StaleSimpleKey { .. }
        ));
    }

    #[test]
    fn test_overlong_simple_key_is_dropped() {
        // Past the length limit the candidate is gone, so the ':' is a
        // misplaced value indicator.
        let long_key = "k".repeat(1100);
        let err = scan_error(&format!("{}: 1\n", long_key));
        assert!(matches!(err, ScanError::UnexpectedValue { .. }));
    }

    #[test]
    fn test_forbidden_character() {
        assert!(matches!(
            scan_error("a: \"b\u{7}c\"\n"),
            ScanError::ForbiddenCharacter { code: 7, .. }
        ));
    }

    #[test]
    fn test_marks_track_position() {
        let mut scanner = from_str("key: value\n");
        // StreamStart, BlockMappingStart, Key are virtual; the scalar
        // token's span covers the word itself.
        loop {
            let token = scanner.next_token().unwrap();
            if let TokenKind::Scalar { ref value, .. } = token.kind {
                if value == "value" {
                    assert_eq!(token.span.start.line, 0);
                    assert_eq!(token.span.start.col, 5);
                    assert_eq!(token.span.end.col, 10);
                    break;
                }
            }
        }
    }

    #[test]
    fn test_bom_is_stripped() {
        assert_eq!(
            kinds("\u{feff}a\n"),
            vec![TokenKind::StreamStart, plain("a"), TokenKind::StreamEnd]
        );
    }

    #[test]
    fn test_peek_does_not_consume() {
        let mut scanner = from_str("a\n");
        let peeked = scanner.peek_token().unwrap().kind.clone();
        let taken = scanner.next_token().unwrap().kind;
        assert_eq!(peeked, taken);
        assert!(scanner
            .next_is(|k| matches!(k, TokenKind::Scalar { .. }))
            .unwrap());
    }
}
