//! Phase 2: Parser
//!
//! The parser consumes tokens from the scanner and produces a lazy
//! sequence of events according to the YAML grammar:
//!
//! ```text
//! stream   := STREAM-START document* STREAM-END
//! document := DIRECTIVE* DOCUMENT-START node? DOCUMENT-END*
//! node     := ALIAS | properties? (SCALAR | block-collection | flow-collection)
//! ```
//!
//! The grammar runs as a state machine whose state is an explicit value
//! on a stack, not native recursion: each state consumes zero or more
//! tokens, produces at most one event, and either transitions to a new
//! state or pushes a continuation before descending into a sub-grammar.
//! Documents of any nesting depth therefore cost only stack entries, and
//! the whole process is drivable one `next_event` call at a time.

use std::collections::HashMap;

use log::debug;

use crate::error::{Mark, ParseError, Result};
use crate::event::{CollectionStyle, Event};
use crate::scanner::{self, Scanner};
use crate::token::{ScalarStyle, TokenKind};

/// One pending grammar continuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    StreamStart,
    ImplicitDocumentStart,
    DocumentStart,
    DocumentContent,
    DocumentEnd,
    BlockNode,
    BlockSequenceFirstEntry,
    BlockSequenceEntry,
    IndentlessSequenceEntry,
    BlockMappingFirstKey,
    BlockMappingKey,
    BlockMappingValue,
    FlowSequenceFirstEntry,
    FlowSequenceEntry,
    FlowSequenceEntryMappingKey,
    FlowSequenceEntryMappingValue,
    FlowSequenceEntryMappingEnd,
    FlowMappingFirstKey,
    FlowMappingKey,
    FlowMappingValue,
    FlowMappingEmptyValue,
    End,
}

/// The token-to-event engine.
pub struct Parser<I: Iterator<Item = char>> {
    scanner: Scanner<I>,
    state: State,
    states: Vec<State>,
    /// Start marks of open constructs, for "while parsing a ..." errors.
    marks: Vec<Mark>,
    current: Option<(Event, Mark)>,
    stream_ended: bool,
    version: Option<(u32, u32)>,
    tag_handles: HashMap<String, String>,
}

/// Build a parser over the characters of a string slice.
pub fn from_str(input: &str) -> Parser<std::str::Chars<'_>> {
    Parser::new(scanner::from_str(input))
}

impl<I: Iterator<Item = char>> Parser<I> {
    /// Create a parser pulling from the given scanner.
    pub fn new(scanner: Scanner<I>) -> Self {
        Self {
            scanner,
            state: State::StreamStart,
            states: Vec::new(),
            marks: Vec::new(),
            current: None,
            stream_ended: false,
            version: None,
            tag_handles: HashMap::new(),
        }
    }

    /// Inspect the next event without consuming it.
    pub fn peek_event(&mut self) -> Result<&(Event, Mark)> {
        if self.current.is_none() {
            self.current = Some(self.parse()?);
        }
        Ok(self
            .current
            .as_ref()
            .expect("current event was just populated"))
    }

    /// Consume and return the next event with the mark where it began.
    pub fn next_event(&mut self) -> Result<(Event, Mark)> {
        match self.current.take() {
            Some(pair) => Ok(pair),
            None => self.parse(),
        }
    }

    /// Test the next event without consuming it.
    pub fn next_is(&mut self, pred: impl FnOnce(&Event) -> bool) -> Result<bool> {
        Ok(pred(&self.peek_event()?.0))
    }

    fn parse(&mut self) -> Result<(Event, Mark)> {
        if self.state == State::End {
            return Ok((Event::StreamEnd, self.scanner.mark()));
        }
        self.state_machine()
    }

    fn state_machine(&mut self) -> Result<(Event, Mark)> {
        match self.state {
            State::StreamStart => self.stream_start(),
            State::ImplicitDocumentStart => self.document_start(true),
            State::DocumentStart => self.document_start(false),
            State::DocumentContent => self.document_content(),
            State::DocumentEnd => self.document_end(),
            State::BlockNode => self.parse_node(true, false),
            State::BlockSequenceFirstEntry => self.block_sequence_entry(true),
            State::BlockSequenceEntry => self.block_sequence_entry(false),
            State::IndentlessSequenceEntry => self.indentless_sequence_entry(),
            State::BlockMappingFirstKey => self.block_mapping_key(true),
            State::BlockMappingKey => self.block_mapping_key(false),
            State::BlockMappingValue => self.block_mapping_value(),
            State::FlowSequenceFirstEntry => self.flow_sequence_entry(true),
            State::FlowSequenceEntry => self.flow_sequence_entry(false),
            State::FlowSequenceEntryMappingKey => self.flow_sequence_entry_mapping_key(),
            State::FlowSequenceEntryMappingValue => self.flow_sequence_entry_mapping_value(),
            State::FlowSequenceEntryMappingEnd => self.flow_sequence_entry_mapping_end(),
            State::FlowMappingFirstKey => self.flow_mapping_key(true),
            State::FlowMappingKey => self.flow_mapping_key(false),
            State::FlowMappingValue => self.flow_mapping_value(false),
            State::FlowMappingEmptyValue => self.flow_mapping_value(true),
            State::End => unreachable!("the End state is handled in parse"),
        }
    }

    fn pop_state(&mut self) {
        self.state = self
            .states
            .pop()
            .expect("a continuation state exists for every open construct");
    }

    fn push_state(&mut self, state: State) {
        self.states.push(state);
    }

    fn skip_token(&mut self) -> Result<()> {
        self.scanner.next_token()?;
        Ok(())
    }

    /// Peek the next token's kind and start mark.
    fn peek(&mut self) -> Result<(&TokenKind, Mark)> {
        let token = self.scanner.peek_token()?;
        let mark = token.span.start;
        Ok((&token.kind, mark))
    }

    fn unexpected(
        &self,
        context: &'static str,
        expected: &'static str,
        found: String,
        mark: Mark,
    ) -> ParseError {
        match self.marks.last() {
            Some(&context_mark) => ParseError::UnexpectedToken {
                context,
                context_mark,
                expected,
                found,
                mark,
            },
            None => ParseError::Unexpected {
                expected,
                found,
                mark,
            },
        }
    }

    // =========================================================================
    // Stream and documents
    // =========================================================================

    fn stream_start(&mut self) -> Result<(Event, Mark)> {
        let (kind, mark) = self.peek()?;
        match kind {
            TokenKind::StreamStart => {
                self.state = State::ImplicitDocumentStart;
                self.skip_token()?;
                Ok((Event::StreamStart, mark))
            }
            other => {
                let found = other.to_string();
                Err(self.unexpected("the stream", "<stream start>", found, mark))
            }
        }
    }

    fn document_start(&mut self, implicit: bool) -> Result<(Event, Mark)> {
        if !implicit {
            // Trailing '...' markers belong to the previous document.
            while matches!(self.peek()?.0, TokenKind::DocumentEnd) {
                self.skip_token()?;
            }
        }

        let (kind, mark) = self.peek()?;
        match kind {
            TokenKind::StreamEnd => {
                self.state = State::End;
                self.skip_token()?;
                self.stream_ended = true;
                Ok((Event::StreamEnd, mark))
            }
            TokenKind::VersionDirective { .. }
            | TokenKind::TagDirective { .. }
            | TokenKind::DocumentStart => self.explicit_document_start(),
            _ if implicit => {
                debug!("starting implicit document");
                self.process_directives()?;
                self.push_state(State::DocumentEnd);
                self.state = State::BlockNode;
                Ok((Event::DocumentStart { explicit: false }, mark))
            }
            _ => self.explicit_document_start(),
        }
    }

    fn explicit_document_start(&mut self) -> Result<(Event, Mark)> {
        self.process_directives()?;
        let (kind, mark) = self.peek()?;
        match kind {
            TokenKind::DocumentStart => {
                debug!("starting explicit document");
                self.push_state(State::DocumentEnd);
                self.state = State::DocumentContent;
                self.skip_token()?;
                Ok((Event::DocumentStart { explicit: true }, mark))
            }
            other => {
                let found = other.to_string();
                Err(self.unexpected("a document", "'---'", found, mark))
            }
        }
    }

    /// Accumulate `%YAML` and `%TAG` directives for the next document.
    fn process_directives(&mut self) -> Result<()> {
        self.version = None;
        self.tag_handles.clear();
        loop {
            enum Directive {
                Version(u32, u32, Mark),
                Tag(String, String, Mark),
                Done,
            }
            let next = {
                let (kind, mark) = self.peek()?;
                match kind {
                    TokenKind::VersionDirective { major, minor } => {
                        Directive::Version(*major, *minor, mark)
                    }
                    TokenKind::TagDirective { handle, prefix } => {
                        Directive::Tag(handle.clone(), prefix.clone(), mark)
                    }
                    _ => Directive::Done,
                }
            };
            match next {
                Directive::Version(major, minor, mark) => {
                    if self.version.is_some() {
                        return Err(ParseError::DuplicateVersionDirective { mark });
                    }
                    if major != 1 {
                        return Err(ParseError::UnsupportedVersion { major, minor, mark });
                    }
                    self.version = Some((major, minor));
                    self.skip_token()?;
                }
                Directive::Tag(handle, prefix, mark) => {
                    if self.tag_handles.contains_key(&handle) {
                        return Err(ParseError::DuplicateTagHandle { handle, mark });
                    }
                    self.tag_handles.insert(handle, prefix);
                    self.skip_token()?;
                }
                Directive::Done => break,
            }
        }
        Ok(())
    }

    fn document_content(&mut self) -> Result<(Event, Mark)> {
        let (kind, mark) = self.peek()?;
        match kind {
            TokenKind::VersionDirective { .. }
            | TokenKind::TagDirective { .. }
            | TokenKind::DocumentStart
            | TokenKind::DocumentEnd
            | TokenKind::StreamEnd => {
                // An empty document yields a zero-length plain scalar at
                // the position the content would have occupied.
                self.pop_state();
                Ok((Event::empty_scalar(), mark))
            }
            _ => self.parse_node(true, false),
        }
    }

    fn document_end(&mut self) -> Result<(Event, Mark)> {
        let (kind, mark) = self.peek()?;
        let explicit = matches!(kind, TokenKind::DocumentEnd);
        if explicit {
            self.skip_token()?;
        }
        self.state = State::DocumentStart;
        Ok((Event::DocumentEnd { explicit }, mark))
    }

    // =========================================================================
    // Nodes
    // =========================================================================

    /// Expand a tag token against the document's handle table. The
    /// default `!` and `!!` handles apply unless overridden.
    fn resolve_tag(&self, handle: &str, suffix: &str, mark: Mark) -> Result<String> {
        if handle.is_empty() {
            // Verbatim !<uri> form.
            return Ok(suffix.to_string());
        }
        if handle == "!" && suffix.is_empty() {
            // Non-specific tag.
            return Ok("!".to_string());
        }
        let prefix = match self.tag_handles.get(handle) {
            Some(prefix) => prefix.as_str(),
            None => match handle {
                "!" => "!",
                "!!" => "tag:yaml.org,2002:",
                _ => {
                    return Err(ParseError::UnknownTagHandle {
                        handle: handle.to_string(),
                        mark,
                    });
                }
            },
        };
        Ok(format!("{}{}", prefix, suffix))
    }

    fn parse_node(&mut self, block: bool, indentless: bool) -> Result<(Event, Mark)> {
        let mut anchor: Option<String> = None;
        let mut tag: Option<String> = None;

        if matches!(self.peek()?.0, TokenKind::Alias(_)) {
            self.pop_state();
            let token = self.scanner.next_token()?;
            if let TokenKind::Alias(name) = token.kind {
                return Ok((Event::Alias { anchor: name }, token.span.start));
            }
            unreachable!("peeked token was an alias");
        }

        // Node properties, in either order, at most one of each.
        loop {
            let (kind, mark) = self.peek()?;
            match kind {
                TokenKind::Anchor(_) => {
                    if anchor.is_some() {
                        return Err(ParseError::DuplicateAnchor { mark });
                    }
                    let token = self.scanner.next_token()?;
                    if let TokenKind::Anchor(name) = token.kind {
                        anchor = Some(name);
                    }
                }
                TokenKind::Tag { .. } => {
                    if tag.is_some() {
                        return Err(ParseError::DuplicateTag { mark });
                    }
                    let token = self.scanner.next_token()?;
                    if let TokenKind::Tag { handle, suffix } = token.kind {
                        tag = Some(self.resolve_tag(&handle, &suffix, mark)?);
                    }
                }
                _ => break,
            }
        }

        let (kind, mark) = self.peek()?;
        match kind {
            TokenKind::BlockEntry if indentless => {
                self.state = State::IndentlessSequenceEntry;
                Ok((
                    Event::SequenceStart {
                        anchor,
                        tag,
                        style: CollectionStyle::Block,
                    },
                    mark,
                ))
            }
            TokenKind::Scalar { .. } => {
                self.pop_state();
                let token = self.scanner.next_token()?;
                if let TokenKind::Scalar { value, style } = token.kind {
                    let (plain_implicit, quoted_implicit) = match (&tag, style) {
                        (None, ScalarStyle::Plain) => (true, false),
                        (None, _) => (false, true),
                        (Some(t), _) if t == "!" => (false, true),
                        _ => (false, false),
                    };
                    return Ok((
                        Event::Scalar {
                            value,
                            style,
                            anchor,
                            tag,
                            plain_implicit,
                            quoted_implicit,
                        },
                        token.span.start,
                    ));
                }
                unreachable!("peeked token was a scalar");
            }
            TokenKind::FlowSequenceStart => {
                self.marks.push(mark);
                self.state = State::FlowSequenceFirstEntry;
                Ok((
                    Event::SequenceStart {
                        anchor,
                        tag,
                        style: CollectionStyle::Flow,
                    },
                    mark,
                ))
            }
            TokenKind::FlowMappingStart => {
                self.marks.push(mark);
                self.state = State::FlowMappingFirstKey;
                Ok((
                    Event::MappingStart {
                        anchor,
                        tag,
                        style: CollectionStyle::Flow,
                    },
                    mark,
                ))
            }
            TokenKind::BlockSequenceStart if block => {
                self.marks.push(mark);
                self.state = State::BlockSequenceFirstEntry;
                Ok((
                    Event::SequenceStart {
                        anchor,
                        tag,
                        style: CollectionStyle::Block,
                    },
                    mark,
                ))
            }
            TokenKind::BlockMappingStart if block => {
                self.marks.push(mark);
                self.state = State::BlockMappingFirstKey;
                Ok((
                    Event::MappingStart {
                        anchor,
                        tag,
                        style: CollectionStyle::Block,
                    },
                    mark,
                ))
            }
            _ if anchor.is_some() || tag.is_some() => {
                // Properties with no content make an empty node, placed
                // where the omitted content would have been.
                self.pop_state();
                Ok((Event::empty_scalar_with(anchor, tag), mark))
            }
            other => {
                let found = other.to_string();
                Err(self.unexpected("a node", "node content", found, mark))
            }
        }
    }

    // =========================================================================
    // Block collections
    // =========================================================================

    fn block_sequence_entry(&mut self, first: bool) -> Result<(Event, Mark)> {
        if first {
            // Consume the BlockSequenceStart that opened this state.
            self.skip_token()?;
        }
        let (kind, mark) = self.peek()?;
        match kind {
            TokenKind::BlockEnd => {
                self.pop_state();
                self.marks.pop();
                self.skip_token()?;
                Ok((Event::SequenceEnd, mark))
            }
            TokenKind::BlockEntry => {
                self.skip_token()?;
                let (kind, mark) = self.peek()?;
                if matches!(kind, TokenKind::BlockEntry | TokenKind::BlockEnd) {
                    self.state = State::BlockSequenceEntry;
                    Ok((Event::empty_scalar(), mark))
                } else {
                    self.push_state(State::BlockSequenceEntry);
                    self.parse_node(true, false)
                }
            }
            other => {
                let found = other.to_string();
                Err(self.unexpected("a block collection", "'-' indicator", found, mark))
            }
        }
    }

    fn indentless_sequence_entry(&mut self) -> Result<(Event, Mark)> {
        let (kind, mark) = self.peek()?;
        if !matches!(kind, TokenKind::BlockEntry) {
            // The sequence ends at the first token of the enclosing
            // construct; no BlockEnd token exists for indentless form.
            self.pop_state();
            return Ok((Event::SequenceEnd, mark));
        }
        self.skip_token()?;
        let (kind, mark) = self.peek()?;
        if matches!(
            kind,
            TokenKind::BlockEntry | TokenKind::Key | TokenKind::Value | TokenKind::BlockEnd
        ) {
            self.state = State::IndentlessSequenceEntry;
            Ok((Event::empty_scalar(), mark))
        } else {
            self.push_state(State::IndentlessSequenceEntry);
            self.parse_node(true, false)
        }
    }

    fn block_mapping_key(&mut self, first: bool) -> Result<(Event, Mark)> {
        if first {
            // Consume the BlockMappingStart that opened this state.
            self.skip_token()?;
        }
        let (kind, mark) = self.peek()?;
        match kind {
            TokenKind::Key => {
                self.skip_token()?;
                let (kind, mark) = self.peek()?;
                if matches!(
                    kind,
                    TokenKind::Key | TokenKind::Value | TokenKind::BlockEnd
                ) {
                    self.state = State::BlockMappingValue;
                    Ok((Event::empty_scalar(), mark))
                } else {
                    self.push_state(State::BlockMappingValue);
                    self.parse_node(true, true)
                }
            }
            // A value with no key makes an empty key scalar.
            TokenKind::Value => {
                self.state = State::BlockMappingValue;
                Ok((Event::empty_scalar(), mark))
            }
            TokenKind::BlockEnd => {
                self.pop_state();
                self.marks.pop();
                self.skip_token()?;
                Ok((Event::MappingEnd, mark))
            }
            other => {
                let found = other.to_string();
                Err(self.unexpected("a block mapping", "a mapping key", found, mark))
            }
        }
    }

    fn block_mapping_value(&mut self) -> Result<(Event, Mark)> {
        let (kind, mark) = self.peek()?;
        match kind {
            TokenKind::Value => {
                self.skip_token()?;
                let (kind, mark) = self.peek()?;
                if matches!(
                    kind,
                    TokenKind::Key | TokenKind::Value | TokenKind::BlockEnd
                ) {
                    self.state = State::BlockMappingKey;
                    Ok((Event::empty_scalar(), mark))
                } else {
                    self.push_state(State::BlockMappingKey);
                    self.parse_node(true, true)
                }
            }
            _ => {
                self.state = State::BlockMappingKey;
                Ok((Event::empty_scalar(), mark))
            }
        }
    }

    // =========================================================================
    // Flow collections
    // =========================================================================

    fn flow_sequence_entry(&mut self, first: bool) -> Result<(Event, Mark)> {
        if first {
            // Consume the FlowSequenceStart that opened this state.
            self.skip_token()?;
        }
        {
            let (kind, mark) = self.peek()?;
            match kind {
                TokenKind::FlowSequenceEnd => {
                    self.pop_state();
                    self.marks.pop();
                    self.skip_token()?;
                    return Ok((Event::SequenceEnd, mark));
                }
                TokenKind::FlowEntry if !first => {
                    self.skip_token()?;
                }
                other if !first => {
                    let found = other.to_string();
                    return Err(self.unexpected("a flow sequence", "',' or ']'", found, mark));
                }
                _ => {}
            }
        }
        let (kind, mark) = self.peek()?;
        match kind {
            TokenKind::FlowSequenceEnd => {
                self.pop_state();
                self.marks.pop();
                self.skip_token()?;
                Ok((Event::SequenceEnd, mark))
            }
            TokenKind::Key => {
                // The `[a: 1]` shorthand: a single-pair mapping nested
                // inside the sequence.
                self.state = State::FlowSequenceEntryMappingKey;
                self.skip_token()?;
                Ok((
                    Event::MappingStart {
                        anchor: None,
                        tag: None,
                        style: CollectionStyle::Flow,
                    },
                    mark,
                ))
            }
            _ => {
                self.push_state(State::FlowSequenceEntry);
                self.parse_node(false, false)
            }
        }
    }

    fn flow_sequence_entry_mapping_key(&mut self) -> Result<(Event, Mark)> {
        let (kind, mark) = self.peek()?;
        if matches!(
            kind,
            TokenKind::Value | TokenKind::FlowEntry | TokenKind::FlowSequenceEnd
        ) {
            self.skip_token()?;
            self.state = State::FlowSequenceEntryMappingValue;
            Ok((Event::empty_scalar(), mark))
        } else {
            self.push_state(State::FlowSequenceEntryMappingValue);
            self.parse_node(false, false)
        }
    }

    fn flow_sequence_entry_mapping_value(&mut self) -> Result<(Event, Mark)> {
        let (kind, mark) = self.peek()?;
        match kind {
            TokenKind::Value => {
                self.skip_token()?;
                let (kind, mark) = self.peek()?;
                if matches!(kind, TokenKind::FlowEntry | TokenKind::FlowSequenceEnd) {
                    self.state = State::FlowSequenceEntryMappingEnd;
                    Ok((Event::empty_scalar(), mark))
                } else {
                    self.push_state(State::FlowSequenceEntryMappingEnd);
                    self.parse_node(false, false)
                }
            }
            _ => {
                self.state = State::FlowSequenceEntryMappingEnd;
                Ok((Event::empty_scalar(), mark))
            }
        }
    }

    fn flow_sequence_entry_mapping_end(&mut self) -> Result<(Event, Mark)> {
        self.state = State::FlowSequenceEntry;
        Ok((Event::MappingEnd, self.scanner.mark()))
    }

    fn flow_mapping_key(&mut self, first: bool) -> Result<(Event, Mark)> {
        if first {
            // Consume the FlowMappingStart that opened this state.
            self.skip_token()?;
        }
        {
            let (kind, mark) = self.peek()?;
            match kind {
                TokenKind::FlowMappingEnd => {
                    self.pop_state();
                    self.marks.pop();
                    self.skip_token()?;
                    return Ok((Event::MappingEnd, mark));
                }
                TokenKind::FlowEntry if !first => {
                    self.skip_token()?;
                }
                other if !first => {
                    let found = other.to_string();
                    return Err(self.unexpected("a flow mapping", "',' or '}'", found, mark));
                }
                _ => {}
            }
        }
        let (kind, mark) = self.peek()?;
        match kind {
            TokenKind::Key => {
                self.skip_token()?;
                let (kind, mark) = self.peek()?;
                if matches!(
                    kind,
                    TokenKind::Value | TokenKind::FlowEntry | TokenKind::FlowMappingEnd
                ) {
                    self.state = State::FlowMappingValue;
                    Ok((Event::empty_scalar(), mark))
                } else {
                    self.push_state(State::FlowMappingValue);
                    self.parse_node(false, false)
                }
            }
            TokenKind::Value => {
                self.state = State::FlowMappingValue;
                Ok((Event::empty_scalar(), mark))
            }
            TokenKind::FlowMappingEnd => {
                self.pop_state();
                self.marks.pop();
                self.skip_token()?;
                Ok((Event::MappingEnd, mark))
            }
            _ => {
                self.push_state(State::FlowMappingEmptyValue);
                self.parse_node(false, false)
            }
        }
    }

    fn flow_mapping_value(&mut self, empty: bool) -> Result<(Event, Mark)> {
        let (kind, mark) = self.peek()?;
        if empty {
            self.state = State::FlowMappingKey;
            return Ok((Event::empty_scalar(), mark));
        }
        match kind {
            TokenKind::Value => {
                self.skip_token()?;
                let (kind, mark) = self.peek()?;
                if matches!(kind, TokenKind::FlowEntry | TokenKind::FlowMappingEnd) {
                    self.state = State::FlowMappingKey;
                    Ok((Event::empty_scalar(), mark))
                } else {
                    self.push_state(State::FlowMappingKey);
                    self.parse_node(false, false)
                }
            }
            _ => {
                self.state = State::FlowMappingKey;
                Ok((Event::empty_scalar(), mark))
            }
        }
    }
}

impl<I: Iterator<Item = char>> Iterator for Parser<I> {
    type Item = Result<(Event, Mark)>;

    /// Yield events to exhaustion. Iteration ends after `StreamEnd` or
    /// the first error; the reference behavior for errors is to abandon
    /// the stream.
    fn next(&mut self) -> Option<Self::Item> {
        if self.stream_ended && self.current.is_none() {
            return None;
        }
        match self.next_event() {
            Ok(pair) => {
                if pair.0 == Event::StreamEnd {
                    self.stream_ended = true;
                }
                Some(Ok(pair))
            }
            Err(e) => {
                self.stream_ended = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events(input: &str) -> Vec<Event> {
        let mut parser = from_str(input);
        let mut out = Vec::new();
        loop {
            let (event, _) = parser.next_event().expect("parse should succeed");
            let done = event == Event::StreamEnd;
            out.push(event);
            if done {
                break;
            }
        }
        out
    }

    fn parse_error(input: &str) -> ParseError {
        let mut parser = from_str(input);
        loop {
            match parser.next_event() {
                Ok((Event::StreamEnd, _)) => panic!("expected a parse error for {:?}", input),
                Ok(_) => continue,
                Err(e) => return e,
            }
        }
    }

    fn plain(value: &str) -> Event {
        Event::Scalar {
            value: value.to_string(),
            style: ScalarStyle::Plain,
            anchor: None,
            tag: None,
            plain_implicit: true,
            quoted_implicit: false,
        }
    }

    #[test]
    fn test_flow_mapping_events() {
        assert_eq!(
            events("{a: 1, b: 2}"),
            vec![
                Event::StreamStart,
                Event::DocumentStart { explicit: false },
                Event::MappingStart {
                    anchor: None,
                    tag: None,
                    style: CollectionStyle::Flow,
                },
                plain("a"),
                plain("1"),
                plain("b"),
                plain("2"),
                Event::MappingEnd,
                Event::DocumentEnd { explicit: false },
                Event::StreamEnd,
            ]
        );
    }

    #[test]
    fn test_block_mapping_with_nested_sequence() {
        assert_eq!(
            events("key:\n  - 1\n  - 2\n"),
            vec![
                Event::StreamStart,
                Event::DocumentStart { explicit: false },
                Event::MappingStart {
                    anchor: None,
                    tag: None,
                    style: CollectionStyle::Block,
                },
                plain("key"),
                Event::SequenceStart {
                    anchor: None,
                    tag: None,
                    style: CollectionStyle::Block,
                },
                plain("1"),
                plain("2"),
                Event::SequenceEnd,
                Event::MappingEnd,
                Event::DocumentEnd { explicit: false },
                Event::StreamEnd,
            ]
        );
    }

    #[test]
    fn test_indentless_sequence() {
        // A sequence at the key's own indent is legal and identical in
        // event terms to an indented one.
        assert_eq!(
            events("key:\n- 1\n- 2\n"),
            events("key:\n  - 1\n  - 2\n")
        );
    }

    #[test]
    fn test_empty_value_yields_empty_scalar() {
        let evs = events("key:\n");
        assert_eq!(evs[4], plain(""));
    }

    #[test]
    fn test_empty_document_yields_empty_scalar() {
        let evs = events("---\n");
        assert_eq!(
            evs,
            vec![
                Event::StreamStart,
                Event::DocumentStart { explicit: true },
                plain(""),
                Event::DocumentEnd { explicit: false },
                Event::StreamEnd,
            ]
        );
    }

    #[test]
    fn test_flow_pair_shorthand() {
        // [a: 1] expands to a one-entry mapping inside the sequence.
        assert_eq!(
            events("[a: 1]"),
            vec![
                Event::StreamStart,
                Event::DocumentStart { explicit: false },
                Event::SequenceStart {
                    anchor: None,
                    tag: None,
                    style: CollectionStyle::Flow,
                },
                Event::MappingStart {
                    anchor: None,
                    tag: None,
                    style: CollectionStyle::Flow,
                },
                plain("a"),
                plain("1"),
                Event::MappingEnd,
                Event::SequenceEnd,
                Event::DocumentEnd { explicit: false },
                Event::StreamEnd,
            ]
        );
    }

    #[test]
    fn test_anchor_and_alias_events() {
        let evs = events("- &a val\n- *a\n- *a\n");
        assert_eq!(
            evs[3],
            Event::Scalar {
                value: "val".into(),
                style: ScalarStyle::Plain,
                anchor: Some("a".into()),
                tag: None,
                plain_implicit: true,
                quoted_implicit: false,
            }
        );
        assert_eq!(evs[4], Event::Alias { anchor: "a".into() });
        assert_eq!(evs[5], Event::Alias { anchor: "a".into() });
    }

    #[test]
    fn test_tag_resolution() {
        let evs = events("!!str ok\n");
        match &evs[2] {
            Event::Scalar {
                tag,
                plain_implicit,
                quoted_implicit,
                ..
            } => {
                assert_eq!(tag.as_deref(), Some("tag:yaml.org,2002:str"));
                assert!(!plain_implicit);
                assert!(!quoted_implicit);
            }
            other => panic!("expected scalar, got {}", other.kind_name()),
        }
    }

    #[test]
    fn test_tag_directive_expands_handle() {
        let evs = events("%TAG !e! tag:example.com,2000:\n---\n!e!thing x\n");
        match &evs[2] {
            Event::Scalar { tag, .. } => {
                assert_eq!(tag.as_deref(), Some("tag:example.com,2000:thing"));
            }
            other => panic!("expected scalar, got {}", other.kind_name()),
        }
    }

    #[test]
    fn test_unknown_tag_handle_is_error() {
        assert!(matches!(
            parse_error("!x!thing a\n"),
            ParseError::UnknownTagHandle { .. }
        ));
    }

    #[test]
    fn test_duplicate_version_directive_is_error() {
        assert!(matches!(
            parse_error("%YAML 1.2\n%YAML 1.2\n---\na\n"),
            ParseError::DuplicateVersionDirective { .. }
        ));
    }

    #[test]
    fn test_duplicate_tag_handle_is_error() {
        assert!(matches!(
            parse_error("%TAG !e! tag:a:\n%TAG !e! tag:b:\n---\na\n"),
            ParseError::DuplicateTagHandle { .. }
        ));
    }

    #[test]
    fn test_tag_handles_reset_between_documents() {
        let err = parse_error("%TAG !e! tag:example.com,2000:\n---\n!e!a x\n---\n!e!a y\n");
        assert!(matches!(err, ParseError::UnknownTagHandle { .. }));
    }

    #[test]
    fn test_wrong_block_entry_is_an_error() {
        // "bar" sits at the mapping's indent with no ':' to bind it, so
        // its required key candidate stales fatally rather than
        // mis-parsing silently.
        let err = parse_error("- foo: 1\n  bar\n");
        assert!(matches!(
            err,
            ParseError::Scan(crate::error::ScanError::StaleSimpleKey { .. })
        ));
    }

    #[test]
    fn test_block_entry_in_mapping_names_context() {
        let err = parse_error("a: 1\n- b\n");
        match err {
            ParseError::UnexpectedToken {
                context,
                expected,
                found,
                ..
            } => {
                assert_eq!(context, "a block mapping");
                assert_eq!(expected, "a mapping key");
                assert_eq!(found, "'-'");
            }
            other => panic!("expected UnexpectedToken, got {other}"),
        }
    }

    #[test]
    fn test_multiple_documents() {
        let evs = events("one\n---\ntwo\n...\n");
        assert_eq!(
            evs,
            vec![
                Event::StreamStart,
                Event::DocumentStart { explicit: false },
                plain("one"),
                Event::DocumentEnd { explicit: false },
                Event::DocumentStart { explicit: true },
                plain("two"),
                Event::DocumentEnd { explicit: true },
                Event::StreamEnd,
            ]
        );
    }

    #[test]
    fn test_quoted_scalar_implicit_flags() {
        let evs = events("'a'\n");
        match &evs[2] {
            Event::Scalar {
                style,
                plain_implicit,
                quoted_implicit,
                ..
            } => {
                assert_eq!(*style, ScalarStyle::SingleQuoted);
                assert!(!plain_implicit);
                assert!(quoted_implicit);
            }
            other => panic!("expected scalar, got {}", other.kind_name()),
        }
    }

    #[test]
    fn test_explicit_key_form() {
        assert_eq!(
            events("? key\n: value\n"),
            vec![
                Event::StreamStart,
                Event::DocumentStart { explicit: false },
                Event::MappingStart {
                    anchor: None,
                    tag: None,
                    style: CollectionStyle::Block,
                },
                plain("key"),
                plain("value"),
                Event::MappingEnd,
                Event::DocumentEnd { explicit: false },
                Event::StreamEnd,
            ]
        );
    }

    #[test]
    fn test_peek_matches_next() {
        let mut parser = from_str("a: [1, 2]\nb: {c: d}\n");
        loop {
            let peeked = parser.peek_event().unwrap().clone();
            let taken = parser.next_event().unwrap();
            assert_eq!(peeked, taken);
            if taken.0 == Event::StreamEnd {
                break;
            }
        }
    }

    #[test]
    fn test_iterator_stops_after_stream_end() {
        let collected: Vec<_> = from_str("x\n").collect();
        assert_eq!(collected.len(), 5);
        assert!(collected.iter().all(|r| r.is_ok()));
    }

    #[test]
    fn test_error_marks_point_into_the_source() {
        // The stale key error points at the candidate itself: "bar" at
        // zero-based line 1, column 2.
        let err = parse_error("- foo: 1\n  bar\n");
        assert_eq!(err.mark().line, 1);
        assert_eq!(err.mark().col, 2);

        // A grammar error carries both the offender and the mark of the
        // enclosing construct.
        let err = parse_error("a: 1\n- b\n");
        assert_eq!(err.mark().line, 1);
        assert_eq!(err.context_mark(), Some(Mark::new(0, 0, 0)));
    }
}
