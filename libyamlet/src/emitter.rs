//! Phase 3: Emitter
//!
//! The emitter consumes events and writes formatted YAML text to any
//! [`std::fmt::Write`] sink. It mirrors the parser's design run in
//! reverse: a stack of pending output continuations tracks every
//! unterminated collection, and a small ring of buffered events supplies
//! the lookahead needed before a collection start can be formatted
//! (one extra event for documents, two for sequences, three for
//! mappings - enough to detect an immediately-empty collection).
//!
//! The heart of the emitter is scalar style selection: each scalar is
//! classified once ([`analyze_scalar`]), the classification yields the
//! set of legal styles, and the requested style is honored when legal
//! with fallback order plain, single-quoted, double-quoted. Block styles
//! are only used on request. Each style has its own writer that folds at
//! the configured width only at legal break points.

use std::collections::VecDeque;
use std::fmt;

use log::trace;

use crate::error::EmitError;
use crate::event::{CollectionStyle, Event};
use crate::token::ScalarStyle;

/// The default line width used when no usable width is configured.
const DEFAULT_WIDTH: usize = 80;

/// Keys longer than this are written in the explicit `?` form.
const MAX_SIMPLE_KEY_WIDTH: usize = 128;

/// Line break style written by the emitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineBreak {
    #[default]
    Lf,
    CrLf,
    Cr,
}

impl LineBreak {
    fn as_str(self) -> &'static str {
        match self {
            LineBreak::Lf => "\n",
            LineBreak::CrLf => "\r\n",
            LineBreak::Cr => "\r",
        }
    }
}

/// Options fixed for the lifetime of one emitter.
#[derive(Debug, Clone)]
pub struct EmitOptions {
    /// Force double-quoted scalars, explicit document markers, and flow
    /// collections with one entry per line.
    pub canonical: bool,
    /// Indentation step, clamped to 2..=9.
    pub indent: usize,
    /// Preferred line width for folding; widths no larger than twice the
    /// indent fall back to the default of 80.
    pub width: usize,
    /// Line break to write.
    pub line_break: LineBreak,
    /// Style for collections whose events leave the choice open.
    pub flow_style: CollectionStyle,
    /// Requested style for every scalar, overriding the events' own;
    /// still subject to the same legality rules and fallbacks.
    pub scalar_style: Option<ScalarStyle>,
    /// Put every flow collection entry on its own line.
    pub multiline_flow: bool,
}

impl Default for EmitOptions {
    fn default() -> Self {
        Self {
            canonical: false,
            indent: 2,
            width: DEFAULT_WIDTH,
            line_break: LineBreak::Lf,
            flow_style: CollectionStyle::Any,
            scalar_style: None,
            multiline_flow: false,
        }
    }
}

/// One pending output continuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EmitState {
    StreamStart,
    FirstDocumentStart,
    DocumentStart,
    DocumentRoot,
    DocumentEnd,
    FlowSequenceFirstItem,
    FlowSequenceItem,
    FlowMappingFirstKey,
    FlowMappingKey,
    FlowMappingSimpleValue,
    FlowMappingValue,
    BlockSequenceFirstItem,
    BlockSequenceItem,
    BlockMappingFirstKey,
    BlockMappingKey,
    BlockMappingSimpleValue,
    BlockMappingValue,
    End,
}

/// Classification of a scalar's content, driving style legality.
#[derive(Debug, Clone)]
struct ScalarAnalysis {
    empty: bool,
    multiline: bool,
    allow_flow_plain: bool,
    allow_block_plain: bool,
    allow_single_quoted: bool,
    allow_block: bool,
}

/// The event-to-text engine.
pub struct Emitter<W: fmt::Write> {
    sink: W,
    opts: EmitOptions,

    state: EmitState,
    states: Vec<EmitState>,
    events: VecDeque<Event>,

    indent: Option<usize>,
    indents: Vec<Option<usize>>,
    flow_level: usize,

    root_context: bool,
    mapping_context: bool,
    simple_key_context: bool,

    column: usize,
    whitespace: bool,
    indention: bool,
    open_ended: bool,

    /// Analysis cache carried from `check_simple_key` to the scalar
    /// writer for the same event.
    analysis: Option<ScalarAnalysis>,
}

/// Emit a full event sequence to a string with default options.
pub fn emit(events: &[Event]) -> Result<String, EmitError> {
    emit_with(events, EmitOptions::default())
}

/// Emit a full event sequence to a string with explicit options.
pub fn emit_with(events: &[Event], opts: EmitOptions) -> Result<String, EmitError> {
    let mut emitter = Emitter::with_options(String::new(), opts);
    for event in events {
        emitter.emit(event.clone())?;
    }
    Ok(emitter.into_inner())
}

impl<W: fmt::Write> Emitter<W> {
    /// Create an emitter with default options.
    pub fn new(sink: W) -> Self {
        Self::with_options(sink, EmitOptions::default())
    }

    /// Create an emitter with explicit options.
    pub fn with_options(sink: W, opts: EmitOptions) -> Self {
        Self {
            sink,
            opts,
            state: EmitState::StreamStart,
            states: Vec::new(),
            events: VecDeque::new(),
            indent: None,
            indents: Vec::new(),
            flow_level: 0,
            root_context: false,
            mapping_context: false,
            simple_key_context: false,
            column: 0,
            whitespace: true,
            indention: true,
            open_ended: false,
            analysis: None,
        }
    }

    /// Take back the output sink.
    pub fn into_inner(self) -> W {
        self.sink
    }

    /// Push one event. Output is written as soon as enough lookahead has
    /// accumulated; the buffer never holds more than the bounded
    /// lookahead window.
    pub fn emit(&mut self, event: Event) -> Result<(), EmitError> {
        self.events.push_back(event);
        while !self.need_more_events() {
            let event = self
                .events
                .pop_front()
                .expect("need_more_events returned false on an empty queue");
            self.process(event)?;
        }
        Ok(())
    }

    /// Whether the head event still needs lookahead before processing.
    fn need_more_events(&self) -> bool {
        match self.events.front() {
            None => true,
            Some(Event::DocumentStart { .. }) => self.need_events(1),
            Some(Event::SequenceStart { .. }) => self.need_events(2),
            Some(Event::MappingStart { .. }) => self.need_events(3),
            _ => false,
        }
    }

    fn need_events(&self, count: usize) -> bool {
        let mut level: i32 = 0;
        for event in self.events.iter().skip(1) {
            match event {
                Event::DocumentStart { .. }
                | Event::SequenceStart { .. }
                | Event::MappingStart { .. } => level += 1,
                Event::DocumentEnd { .. } | Event::SequenceEnd | Event::MappingEnd => level -= 1,
                Event::StreamEnd => level = -1,
                _ => {}
            }
            if level < 0 {
                return false;
            }
        }
        self.events.len() < count + 1
    }

    fn best_indent(&self) -> usize {
        if (2..=9).contains(&self.opts.indent) {
            self.opts.indent
        } else {
            2
        }
    }

    fn best_width(&self) -> usize {
        if self.opts.width > self.best_indent() * 2 {
            self.opts.width
        } else {
            DEFAULT_WIDTH
        }
    }

    fn process(&mut self, event: Event) -> Result<(), EmitError> {
        trace!("emitting {} in {:?}", event.kind_name(), self.state);
        match self.state {
            EmitState::StreamStart => self.expect_stream_start(event),
            EmitState::FirstDocumentStart => self.expect_document_start(event, true),
            EmitState::DocumentStart => self.expect_document_start(event, false),
            EmitState::DocumentRoot => {
                self.states.push(EmitState::DocumentEnd);
                self.expect_node(true, false, false, event)
            }
            EmitState::DocumentEnd => self.expect_document_end(event),
            EmitState::FlowSequenceFirstItem => self.expect_flow_sequence_item(event, true),
            EmitState::FlowSequenceItem => self.expect_flow_sequence_item(event, false),
            EmitState::FlowMappingFirstKey => self.expect_flow_mapping_key(event, true),
            EmitState::FlowMappingKey => self.expect_flow_mapping_key(event, false),
            EmitState::FlowMappingSimpleValue => self.expect_flow_mapping_simple_value(event),
            EmitState::FlowMappingValue => self.expect_flow_mapping_value(event),
            EmitState::BlockSequenceFirstItem => self.expect_block_sequence_item(event, true),
            EmitState::BlockSequenceItem => self.expect_block_sequence_item(event, false),
            EmitState::BlockMappingFirstKey => self.expect_block_mapping_key(event, true),
            EmitState::BlockMappingKey => self.expect_block_mapping_key(event, false),
            EmitState::BlockMappingSimpleValue => self.expect_block_mapping_simple_value(event),
            EmitState::BlockMappingValue => self.expect_block_mapping_value(event),
            EmitState::End => Err(EmitError::StreamEnded),
        }
    }

    fn pop_state(&mut self) -> EmitState {
        self.states
            .pop()
            .expect("a continuation state exists for every open construct")
    }

    // =========================================================================
    // Stream and documents
    // =========================================================================

    fn expect_stream_start(&mut self, event: Event) -> Result<(), EmitError> {
        match event {
            Event::StreamStart => {
                self.state = EmitState::FirstDocumentStart;
                Ok(())
            }
            other => Err(EmitError::UnexpectedEvent {
                expected: "StreamStart",
                found: other.kind_name(),
            }),
        }
    }

    fn expect_document_start(&mut self, event: Event, first: bool) -> Result<(), EmitError> {
        match event {
            Event::DocumentStart { explicit } => {
                let implicit = first
                    && !explicit
                    && !self.opts.canonical
                    && !self.check_empty_document();
                if !implicit {
                    self.write_indent()?;
                    self.write_indicator("---", true, false, false)?;
                    if self.opts.canonical {
                        self.write_indent()?;
                    }
                }
                self.state = EmitState::DocumentRoot;
                Ok(())
            }
            Event::StreamEnd => {
                if self.open_ended {
                    self.write_indicator("...", true, false, false)?;
                    self.write_indent()?;
                }
                self.state = EmitState::End;
                Ok(())
            }
            other => Err(EmitError::UnexpectedEvent {
                expected: "DocumentStart or StreamEnd",
                found: other.kind_name(),
            }),
        }
    }

    fn expect_document_end(&mut self, event: Event) -> Result<(), EmitError> {
        match event {
            Event::DocumentEnd { explicit } => {
                self.write_indent()?;
                if explicit {
                    self.write_indicator("...", true, false, false)?;
                    self.write_indent()?;
                }
                self.state = EmitState::DocumentStart;
                Ok(())
            }
            other => Err(EmitError::UnexpectedEvent {
                expected: "DocumentEnd",
                found: other.kind_name(),
            }),
        }
    }

    fn check_empty_document(&self) -> bool {
        matches!(
            self.events.front(),
            Some(Event::Scalar {
                value,
                anchor: None,
                tag: None,
                plain_implicit: true,
                ..
            }) if value.is_empty()
        )
    }

    fn check_empty_sequence(&self) -> bool {
        matches!(self.events.front(), Some(Event::SequenceEnd))
    }

    fn check_empty_mapping(&self) -> bool {
        matches!(self.events.front(), Some(Event::MappingEnd))
    }

    // =========================================================================
    // Nodes
    // =========================================================================

    fn expect_node(
        &mut self,
        root: bool,
        mapping: bool,
        simple_key: bool,
        event: Event,
    ) -> Result<(), EmitError> {
        self.root_context = root;
        self.mapping_context = mapping;
        self.simple_key_context = simple_key;

        match event {
            Event::Alias { anchor } => {
                self.write_anchor("*", &anchor)?;
                self.state = self.pop_state();
                Ok(())
            }
            Event::Scalar {
                value,
                style,
                anchor,
                tag,
                plain_implicit,
                quoted_implicit,
            } => {
                if let Some(name) = &anchor {
                    self.write_anchor("&", name)?;
                }
                let analysis = match self.analysis.take() {
                    Some(analysis) => analysis,
                    None => analyze_scalar(&value),
                };
                let requested = self.opts.scalar_style.unwrap_or(style);
                let chosen = self.choose_scalar_style(requested, plain_implicit, &analysis);
                self.process_tag(tag.as_deref(), chosen, plain_implicit, quoted_implicit)?;
                self.increase_indent(true, false);
                self.process_scalar(&value, chosen)?;
                self.indent = self.indents.pop().unwrap_or(None);
                self.state = self.pop_state();
                Ok(())
            }
            Event::SequenceStart { anchor, tag, style } => {
                if let Some(name) = &anchor {
                    self.write_anchor("&", name)?;
                }
                if let Some(tag) = &tag {
                    let prepared = prepare_tag(tag)?;
                    self.write_indicator(&prepared, true, false, false)?;
                }
                if self.flow_style(style) || self.check_empty_sequence() {
                    self.expect_flow_sequence()
                } else {
                    self.expect_block_sequence()
                }
            }
            Event::MappingStart { anchor, tag, style } => {
                if let Some(name) = &anchor {
                    self.write_anchor("&", name)?;
                }
                if let Some(tag) = &tag {
                    let prepared = prepare_tag(tag)?;
                    self.write_indicator(&prepared, true, false, false)?;
                }
                if self.flow_style(style) || self.check_empty_mapping() {
                    self.expect_flow_mapping()
                } else {
                    self.expect_block_mapping()
                }
            }
            other => Err(EmitError::UnexpectedEvent {
                expected: "a node",
                found: other.kind_name(),
            }),
        }
    }

    fn flow_style(&self, style: CollectionStyle) -> bool {
        if self.flow_level > 0 || self.opts.canonical {
            return true;
        }
        match style {
            CollectionStyle::Flow => true,
            CollectionStyle::Block => false,
            CollectionStyle::Any => self.opts.flow_style == CollectionStyle::Flow,
        }
    }

    // =========================================================================
    // Block collections
    // =========================================================================

    fn expect_block_sequence(&mut self) -> Result<(), EmitError> {
        // A sequence directly after a mapping key keeps the key's
        // indent, the indentless form.
        let indentless = self.mapping_context && !self.indention;
        self.increase_indent(false, indentless);
        self.state = EmitState::BlockSequenceFirstItem;
        Ok(())
    }

    fn expect_block_sequence_item(&mut self, event: Event, first: bool) -> Result<(), EmitError> {
        if !first && matches!(event, Event::SequenceEnd) {
            self.indent = self.indents.pop().unwrap_or(None);
            self.state = self.pop_state();
            return Ok(());
        }
        self.write_indent()?;
        self.write_indicator("-", true, false, true)?;
        self.states.push(EmitState::BlockSequenceItem);
        self.expect_node(false, false, false, event)
    }

    fn expect_block_mapping(&mut self) -> Result<(), EmitError> {
        self.increase_indent(false, false);
        self.state = EmitState::BlockMappingFirstKey;
        Ok(())
    }

    fn expect_block_mapping_key(&mut self, event: Event, first: bool) -> Result<(), EmitError> {
        if !first && matches!(event, Event::MappingEnd) {
            self.indent = self.indents.pop().unwrap_or(None);
            self.state = self.pop_state();
            return Ok(());
        }
        self.write_indent()?;
        if self.check_simple_key(&event) {
            self.states.push(EmitState::BlockMappingSimpleValue);
            self.expect_node(false, true, true, event)
        } else {
            self.write_indicator("?", true, false, true)?;
            self.states.push(EmitState::BlockMappingValue);
            self.expect_node(false, true, false, event)
        }
    }

    fn expect_block_mapping_simple_value(&mut self, event: Event) -> Result<(), EmitError> {
        self.write_indicator(":", false, false, false)?;
        self.states.push(EmitState::BlockMappingKey);
        self.expect_node(false, true, false, event)
    }

    fn expect_block_mapping_value(&mut self, event: Event) -> Result<(), EmitError> {
        self.write_indent()?;
        self.write_indicator(":", true, false, true)?;
        self.states.push(EmitState::BlockMappingKey);
        self.expect_node(false, true, false, event)
    }

    // =========================================================================
    // Flow collections
    // =========================================================================

    fn expect_flow_sequence(&mut self) -> Result<(), EmitError> {
        self.write_indicator("[", true, true, false)?;
        self.flow_level += 1;
        self.increase_indent(true, false);
        self.state = EmitState::FlowSequenceFirstItem;
        Ok(())
    }

    fn expect_flow_sequence_item(&mut self, event: Event, first: bool) -> Result<(), EmitError> {
        if matches!(event, Event::SequenceEnd) {
            self.indent = self.indents.pop().unwrap_or(None);
            self.flow_level -= 1;
            if !first && self.opts.canonical {
                self.write_indicator(",", false, false, false)?;
                self.write_indent()?;
            } else if !first && self.opts.multiline_flow {
                self.write_indent()?;
            }
            self.write_indicator("]", false, false, false)?;
            self.state = self.pop_state();
            return Ok(());
        }
        if !first {
            self.write_indicator(",", false, false, false)?;
        }
        if self.opts.canonical || self.column > self.best_width() || self.opts.multiline_flow {
            self.write_indent()?;
        }
        self.states.push(EmitState::FlowSequenceItem);
        self.expect_node(false, false, false, event)
    }

    fn expect_flow_mapping(&mut self) -> Result<(), EmitError> {
        self.write_indicator("{", true, true, false)?;
        self.flow_level += 1;
        self.increase_indent(true, false);
        self.state = EmitState::FlowMappingFirstKey;
        Ok(())
    }

    fn expect_flow_mapping_key(&mut self, event: Event, first: bool) -> Result<(), EmitError> {
        if matches!(event, Event::MappingEnd) {
            self.indent = self.indents.pop().unwrap_or(None);
            self.flow_level -= 1;
            if !first && self.opts.canonical {
                self.write_indicator(",", false, false, false)?;
                self.write_indent()?;
            } else if !first && self.opts.multiline_flow {
                self.write_indent()?;
            }
            self.write_indicator("}", false, false, false)?;
            self.state = self.pop_state();
            return Ok(());
        }
        if !first {
            self.write_indicator(",", false, false, false)?;
        }
        if self.opts.canonical || self.column > self.best_width() || self.opts.multiline_flow {
            self.write_indent()?;
        }
        if !self.opts.canonical && self.check_simple_key(&event) {
            self.states.push(EmitState::FlowMappingSimpleValue);
            self.expect_node(false, true, true, event)
        } else {
            self.write_indicator("?", true, false, false)?;
            self.states.push(EmitState::FlowMappingValue);
            self.expect_node(false, true, false, event)
        }
    }

    fn expect_flow_mapping_simple_value(&mut self, event: Event) -> Result<(), EmitError> {
        self.write_indicator(":", false, false, false)?;
        self.states.push(EmitState::FlowMappingKey);
        self.expect_node(false, true, false, event)
    }

    fn expect_flow_mapping_value(&mut self, event: Event) -> Result<(), EmitError> {
        if self.opts.canonical || self.column > self.best_width() {
            self.write_indent()?;
        }
        self.write_indicator(":", true, false, false)?;
        self.states.push(EmitState::FlowMappingKey);
        self.expect_node(false, true, false, event)
    }

    // =========================================================================
    // Keys, anchors, tags
    // =========================================================================

    /// Whether the upcoming node is small enough to sit before a `:` on
    /// one line. Long, empty, or multiline keys use the explicit form.
    fn check_simple_key(&mut self, event: &Event) -> bool {
        let mut length = 0;
        match event {
            Event::Alias { anchor } => {
                length += 1 + anchor.chars().count();
            }
            Event::Scalar {
                value, anchor, tag, ..
            } => {
                if let Some(name) = anchor {
                    length += 1 + name.chars().count();
                }
                if let Some(tag) = tag {
                    length += 2 + tag.chars().count();
                }
                let analysis = analyze_scalar(value);
                if analysis.empty || analysis.multiline {
                    self.analysis = Some(analysis);
                    return false;
                }
                length += value.chars().count();
                self.analysis = Some(analysis);
            }
            Event::SequenceStart { .. } => return self.check_empty_sequence(),
            Event::MappingStart { .. } => return self.check_empty_mapping(),
            _ => return false,
        }
        length < MAX_SIMPLE_KEY_WIDTH
    }

    fn write_anchor(&mut self, indicator: &str, name: &str) -> Result<(), EmitError> {
        let text = format!("{}{}", indicator, name);
        self.write_indicator(&text, true, false, false)
    }

    /// Write the node's tag when the loader could not re-infer it from
    /// the chosen style, or when canonical output demands it.
    fn process_tag(
        &mut self,
        tag: Option<&str>,
        chosen: ScalarStyle,
        plain_implicit: bool,
        quoted_implicit: bool,
    ) -> Result<(), EmitError> {
        let implicit_ok = if chosen == ScalarStyle::Plain {
            plain_implicit
        } else {
            quoted_implicit
        };
        let tag = match tag {
            None => return Ok(()),
            Some(tag) => tag,
        };
        if implicit_ok && !self.opts.canonical {
            return Ok(());
        }
        let prepared = prepare_tag(tag)?;
        self.write_indicator(&prepared, true, false, false)
    }

    // =========================================================================
    // Scalar styles
    // =========================================================================

    fn choose_scalar_style(
        &self,
        requested: ScalarStyle,
        plain_implicit: bool,
        analysis: &ScalarAnalysis,
    ) -> ScalarStyle {
        if requested == ScalarStyle::DoubleQuoted || self.opts.canonical {
            return ScalarStyle::DoubleQuoted;
        }
        if requested == ScalarStyle::Plain && plain_implicit {
            let key_blocked =
                self.simple_key_context && (analysis.empty || analysis.multiline);
            let allowed = if self.flow_level > 0 {
                analysis.allow_flow_plain
            } else {
                analysis.allow_block_plain
            };
            if !key_blocked && allowed {
                return ScalarStyle::Plain;
            }
        }
        if requested.is_block()
            && self.flow_level == 0
            && !self.simple_key_context
            && analysis.allow_block
        {
            return requested;
        }
        if (requested == ScalarStyle::Plain || requested == ScalarStyle::SingleQuoted)
            && analysis.allow_single_quoted
            && !(self.simple_key_context && analysis.multiline)
        {
            return ScalarStyle::SingleQuoted;
        }
        ScalarStyle::DoubleQuoted
    }

    fn process_scalar(&mut self, value: &str, style: ScalarStyle) -> Result<(), EmitError> {
        let split = !self.simple_key_context;
        match style {
            ScalarStyle::Plain => self.write_plain(value, split),
            ScalarStyle::SingleQuoted => self.write_single_quoted(value, split),
            ScalarStyle::DoubleQuoted => self.write_double_quoted(value, split),
            ScalarStyle::Literal => self.write_literal(value),
            ScalarStyle::Folded => self.write_folded(value),
        }
    }

    // =========================================================================
    // Low-level writing
    // =========================================================================

    fn increase_indent(&mut self, flow: bool, indentless: bool) {
        self.indents.push(self.indent);
        match self.indent {
            None => {
                self.indent = Some(if flow { self.best_indent() } else { 0 });
            }
            Some(level) => {
                if !indentless {
                    self.indent = Some(level + self.best_indent());
                }
            }
        }
    }

    fn write_indicator(
        &mut self,
        indicator: &str,
        need_whitespace: bool,
        whitespace: bool,
        indention: bool,
    ) -> Result<(), EmitError> {
        if self.whitespace || !need_whitespace {
            self.column += indicator.chars().count();
            self.sink.write_str(indicator)?;
        } else {
            self.column += 1 + indicator.chars().count();
            self.sink.write_str(" ")?;
            self.sink.write_str(indicator)?;
        }
        self.whitespace = whitespace;
        self.indention = self.indention && indention;
        self.open_ended = false;
        Ok(())
    }

    fn write_indent(&mut self) -> Result<(), EmitError> {
        let indent = self.indent.unwrap_or(0);
        if !self.indention || self.column > indent || (self.column == indent && !self.whitespace) {
            self.write_line_break(None)?;
        }
        if self.column < indent {
            self.whitespace = true;
            for _ in 0..indent - self.column {
                self.sink.write_str(" ")?;
            }
            self.column = indent;
        }
        Ok(())
    }

    fn write_line_break(&mut self, data: Option<char>) -> Result<(), EmitError> {
        self.whitespace = true;
        self.indention = true;
        self.column = 0;
        match data {
            Some(c) => self.sink.write_char(c)?,
            None => self.sink.write_str(self.opts.line_break.as_str())?,
        }
        Ok(())
    }

    // =========================================================================
    // Scalar writers
    // =========================================================================

    fn write_plain(&mut self, text: &str, split: bool) -> Result<(), EmitError> {
        if self.root_context {
            self.open_ended = true;
        }
        if text.is_empty() {
            return Ok(());
        }
        if !self.whitespace {
            self.column += 1;
            self.sink.write_str(" ")?;
        }
        self.whitespace = false;
        self.indention = false;

        let chars: Vec<char> = text.chars().collect();
        let mut spaces = false;
        let mut breaks = false;
        let mut start = 0;
        for end in 0..=chars.len() {
            let ch = chars.get(end).copied();
            if spaces {
                if ch != Some(' ') {
                    if start + 1 == end
                        && self.column > self.best_width()
                        && split
                        && start != 0
                        && end != chars.len()
                    {
                        self.write_indent()?;
                        self.whitespace = false;
                        self.indention = false;
                    } else {
                        self.write_chunk(&chars[start..end])?;
                    }
                    start = end;
                }
            } else if breaks {
                if !matches!(ch, Some(c) if is_break_char(c)) {
                    if chars[start] == '\n' {
                        self.write_line_break(None)?;
                    }
                    for &br in &chars[start..end] {
                        if br == '\n' {
                            self.write_line_break(None)?;
                        } else {
                            self.write_line_break(Some(br))?;
                        }
                    }
                    self.write_indent()?;
                    self.whitespace = false;
                    self.indention = false;
                    start = end;
                }
            } else if (ch.is_none() || matches!(ch, Some(c) if c == ' ' || is_break_char(c)))
                && start < end
            {
                self.write_chunk(&chars[start..end])?;
                start = end;
            }
            if let Some(c) = ch {
                spaces = c == ' ';
                breaks = is_break_char(c);
            }
        }
        Ok(())
    }

    fn write_single_quoted(&mut self, text: &str, split: bool) -> Result<(), EmitError> {
        self.write_indicator("'", true, false, false)?;
        let chars: Vec<char> = text.chars().collect();
        let mut spaces = false;
        let mut breaks = false;
        let mut start = 0;
        for end in 0..=chars.len() {
            let ch = chars.get(end).copied();
            if spaces {
                if ch != Some(' ') {
                    if start + 1 == end
                        && self.column > self.best_width()
                        && split
                        && start != 0
                        && end != chars.len()
                    {
                        self.write_indent()?;
                        self.whitespace = false;
                        self.indention = false;
                    } else {
                        self.write_chunk(&chars[start..end])?;
                    }
                    start = end;
                }
            } else if breaks {
                if !matches!(ch, Some(c) if is_break_char(c)) {
                    if chars[start] == '\n' {
                        self.write_line_break(None)?;
                    }
                    for &br in &chars[start..end] {
                        if br == '\n' {
                            self.write_line_break(None)?;
                        } else {
                            self.write_line_break(Some(br))?;
                        }
                    }
                    self.write_indent()?;
                    self.whitespace = false;
                    self.indention = false;
                    start = end;
                }
            } else if (ch.is_none()
                || matches!(ch, Some(c) if c == ' ' || c == '\'' || is_break_char(c)))
                && start < end
            {
                self.write_chunk(&chars[start..end])?;
                start = end;
            }
            if ch == Some('\'') {
                self.column += 2;
                self.sink.write_str("''")?;
                start = end + 1;
            }
            if let Some(c) = ch {
                spaces = c == ' ';
                breaks = is_break_char(c);
            }
        }
        self.write_indicator("'", false, false, false)
    }

    fn write_double_quoted(&mut self, text: &str, split: bool) -> Result<(), EmitError> {
        self.write_indicator("\"", true, false, false)?;
        let chars: Vec<char> = text.chars().collect();
        let mut start = 0;
        for end in 0..=chars.len() {
            let ch = chars.get(end).copied();
            let must_escape = match ch {
                None => true,
                Some(c) => {
                    matches!(c, '"' | '\\' | '\u{85}' | '\u{2028}' | '\u{2029}' | '\u{feff}')
                        || !is_emittable(c)
                }
            };
            if must_escape {
                if start < end {
                    self.write_chunk(&chars[start..end])?;
                    start = end;
                }
                if let Some(c) = ch {
                    let data = match short_escape(c) {
                        Some(short) => format!("\\{}", short),
                        None => {
                            let code = c as u32;
                            // The narrowest escape that fits the value.
                            if code <= 0xFF {
                                format!("\\x{:02X}", code)
                            } else if code <= 0xFFFF {
                                format!("\\u{:04X}", code)
                            } else {
                                format!("\\U{:08X}", code)
                            }
                        }
                    };
                    self.column += data.chars().count();
                    self.sink.write_str(&data)?;
                    start = end + 1;
                }
            }
            // Fold long lines with a backslash continuation, never
            // inside an escape sequence.
            if end > 0
                && end + 1 < chars.len()
                && (ch == Some(' ') || start >= end)
                && self.column + end.saturating_sub(start) > self.best_width()
                && split
            {
                let mut data: String = if start < end {
                    chars[start..end].iter().collect()
                } else {
                    String::new()
                };
                data.push('\\');
                if start < end {
                    start = end;
                }
                self.column += data.chars().count();
                self.sink.write_str(&data)?;
                self.write_indent()?;
                self.whitespace = false;
                self.indention = false;
                if start < chars.len() && chars[start] == ' ' {
                    // Protect the leading space on the continuation.
                    self.column += 1;
                    self.sink.write_str("\\")?;
                }
            }
        }
        self.write_indicator("\"", false, false, false)
    }

    /// Chomping hints for a block scalar header: an explicit indentation
    /// indicator when the content starts with a space or break, `-` when
    /// the final break is missing, `+` when extra trailing breaks must
    /// survive.
    fn block_hints(&self, text: &str) -> String {
        let mut hints = String::new();
        let chars: Vec<char> = text.chars().collect();
        if chars.is_empty() {
            return hints;
        }
        if chars[0] == ' ' || is_break_char(chars[0]) {
            hints.push_str(&self.best_indent().to_string());
        }
        let last = chars[chars.len() - 1];
        if !is_break_char(last) {
            hints.push('-');
        } else if chars.len() == 1 || is_break_char(chars[chars.len() - 2]) {
            hints.push('+');
        }
        hints
    }

    fn write_literal(&mut self, text: &str) -> Result<(), EmitError> {
        let hints = self.block_hints(text);
        self.write_indicator(&format!("|{}", hints), true, false, false)?;
        if hints.ends_with('+') {
            self.open_ended = true;
        }
        self.write_line_break(None)?;

        let chars: Vec<char> = text.chars().collect();
        let mut breaks = true;
        let mut start = 0;
        for end in 0..=chars.len() {
            let ch = chars.get(end).copied();
            if breaks {
                if !matches!(ch, Some(c) if is_break_char(c)) {
                    for &br in &chars[start..end] {
                        if br == '\n' {
                            self.write_line_break(None)?;
                        } else {
                            self.write_line_break(Some(br))?;
                        }
                    }
                    if ch.is_some() {
                        self.write_indent()?;
                    }
                    start = end;
                }
            } else if ch.is_none() || matches!(ch, Some(c) if is_break_char(c)) {
                self.write_chunk(&chars[start..end])?;
                if ch.is_none() {
                    self.write_line_break(None)?;
                }
                start = end;
            }
            if let Some(c) = ch {
                breaks = is_break_char(c);
            }
        }
        Ok(())
    }

    fn write_folded(&mut self, text: &str) -> Result<(), EmitError> {
        let hints = self.block_hints(text);
        self.write_indicator(&format!(">{}", hints), true, false, false)?;
        if hints.ends_with('+') {
            self.open_ended = true;
        }
        self.write_line_break(None)?;

        let chars: Vec<char> = text.chars().collect();
        let mut leading_space = true;
        let mut spaces = false;
        let mut breaks = true;
        let mut start = 0;
        for end in 0..=chars.len() {
            let ch = chars.get(end).copied();
            if breaks {
                if !matches!(ch, Some(c) if is_break_char(c)) {
                    // An empty separating line marks a real break; folded
                    // lines only need their newline re-folded to a space.
                    if !leading_space && ch.is_some() && ch != Some(' ') && chars[start] == '\n' {
                        self.write_line_break(None)?;
                    }
                    leading_space = ch == Some(' ');
                    for &br in &chars[start..end] {
                        if br == '\n' {
                            self.write_line_break(None)?;
                        } else {
                            self.write_line_break(Some(br))?;
                        }
                    }
                    if ch.is_some() {
                        self.write_indent()?;
                    }
                    start = end;
                }
            } else if spaces {
                if ch != Some(' ') {
                    if start + 1 == end && self.column > self.best_width() {
                        self.write_indent()?;
                        self.whitespace = false;
                        self.indention = false;
                    } else {
                        self.write_chunk(&chars[start..end])?;
                    }
                    start = end;
                }
            } else if (ch.is_none() || matches!(ch, Some(c) if c == ' ' || is_break_char(c)))
                && start < end
            {
                self.write_chunk(&chars[start..end])?;
                if ch.is_none() {
                    self.write_line_break(None)?;
                }
                start = end;
            }
            if let Some(c) = ch {
                breaks = is_break_char(c);
                spaces = c == ' ';
            }
        }
        Ok(())
    }

    fn write_chunk(&mut self, chars: &[char]) -> Result<(), EmitError> {
        self.column += chars.len();
        for &c in chars {
            self.sink.write_char(c)?;
        }
        Ok(())
    }
}

// =============================================================================
// Scalar analysis
// =============================================================================

/// Classify a scalar's content: indicator placement, whitespace at the
/// edges, line breaks, and special characters. The classification is
/// what makes each of the five styles legal or not.
fn analyze_scalar(scalar: &str) -> ScalarAnalysis {
    if scalar.is_empty() {
        return ScalarAnalysis {
            empty: true,
            multiline: false,
            allow_flow_plain: false,
            allow_block_plain: true,
            allow_single_quoted: true,
            allow_block: false,
        };
    }

    let chars: Vec<char> = scalar.chars().collect();
    let mut block_indicators = false;
    let mut flow_indicators = false;
    let mut line_breaks = false;
    let mut special_characters = false;

    let mut leading_space = false;
    let mut leading_break = false;
    let mut trailing_space = false;
    let mut trailing_break = false;
    let mut break_space = false;
    let mut space_break = false;

    if scalar.starts_with("---") || scalar.starts_with("...") {
        block_indicators = true;
        flow_indicators = true;
    }

    let mut preceded_by_whitespace = true;
    let mut followed_by_whitespace =
        chars.len() == 1 || matches!(chars[1], c if c == ' ' || is_break_char(c));
    let mut previous_space = false;
    let mut previous_break = false;

    for (index, &ch) in chars.iter().enumerate() {
        if index == 0 {
            match ch {
                '#' | ',' | '[' | ']' | '{' | '}' | '&' | '*' | '!' | '|' | '>' | '\'' | '"'
                | '%' | '@' | '`' => {
                    flow_indicators = true;
                    block_indicators = true;
                }
                '?' | ':' => {
                    flow_indicators = true;
                    if followed_by_whitespace {
                        block_indicators = true;
                    }
                }
                '-' if followed_by_whitespace => {
                    flow_indicators = true;
                    block_indicators = true;
                }
                _ => {}
            }
        } else {
            match ch {
                ',' | '?' | '[' | ']' | '{' | '}' => flow_indicators = true,
                ':' => {
                    flow_indicators = true;
                    if followed_by_whitespace {
                        block_indicators = true;
                    }
                }
                '#' if preceded_by_whitespace => {
                    flow_indicators = true;
                    block_indicators = true;
                }
                _ => {}
            }
        }

        if is_break_char(ch) {
            line_breaks = true;
        }
        if !(ch == '\n' || (' '..='\x7e').contains(&ch)) && !is_emittable(ch) {
            special_characters = true;
        }

        if ch == ' ' {
            if index == 0 {
                leading_space = true;
            }
            if index == chars.len() - 1 {
                trailing_space = true;
            }
            if previous_break {
                break_space = true;
            }
            previous_space = true;
            previous_break = false;
        } else if is_break_char(ch) {
            if index == 0 {
                leading_break = true;
            }
            if index == chars.len() - 1 {
                trailing_break = true;
            }
            if previous_space {
                space_break = true;
            }
            previous_space = false;
            previous_break = true;
        } else {
            previous_space = false;
            previous_break = false;
        }

        preceded_by_whitespace = ch == ' ' || is_break_char(ch);
        followed_by_whitespace = index + 2 >= chars.len()
            || matches!(chars[index + 2], c if c == ' ' || is_break_char(c));
    }

    let mut allow_flow_plain = true;
    let mut allow_block_plain = true;
    let mut allow_single_quoted = true;
    let mut allow_block = true;

    if leading_space || leading_break || trailing_space || trailing_break {
        allow_flow_plain = false;
        allow_block_plain = false;
    }
    if trailing_space {
        allow_block = false;
    }
    if break_space {
        allow_flow_plain = false;
        allow_block_plain = false;
        allow_single_quoted = false;
    }
    if space_break || special_characters {
        allow_flow_plain = false;
        allow_block_plain = false;
        allow_single_quoted = false;
        allow_block = false;
    }
    if line_breaks {
        allow_flow_plain = false;
        allow_block_plain = false;
    }
    if flow_indicators {
        allow_flow_plain = false;
    }
    if block_indicators {
        allow_block_plain = false;
    }

    ScalarAnalysis {
        empty: false,
        multiline: line_breaks,
        allow_flow_plain,
        allow_block_plain,
        allow_single_quoted,
        allow_block,
    }
}

// =============================================================================
// Tags
// =============================================================================

/// Default handle table applied in reverse when shortening tags.
const TAG_PREFIXES: [(&str, &str); 2] = [("!!", "tag:yaml.org,2002:"), ("!", "!")];

/// Characters that may appear raw in a tag suffix; everything else is
/// URI-escaped.
fn is_tag_safe_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(
            c,
            '-' | ';' | '/' | '?' | ':' | '@' | '&' | '=' | '+' | '$' | ',' | '_' | '.' | '~'
                | '*' | '\'' | '(' | ')' | '[' | ']'
        )
}

/// Format a resolved tag for output, preferring the shortest handle
/// form: `!` stays itself, `tag:yaml.org,2002:x` becomes `!!x`, local
/// `!x` tags stay local, and everything else is written verbatim.
fn prepare_tag(tag: &str) -> Result<String, EmitError> {
    if tag.is_empty() {
        return Err(EmitError::InvalidTag {
            tag: tag.to_string(),
        });
    }
    if tag == "!" {
        return Ok("!".to_string());
    }
    let mut handle = None;
    let mut suffix = tag;
    for (h, prefix) in TAG_PREFIXES {
        if let Some(rest) = tag.strip_prefix(prefix) {
            if !rest.is_empty() {
                handle = Some(h);
                suffix = rest;
                break;
            }
        }
    }
    let mut text = String::new();
    for c in suffix.chars() {
        if is_tag_safe_char(c) || (c == '!' && handle.is_none()) {
            text.push(c);
        } else {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).as_bytes() {
                text.push_str(&format!("%{:02X}", byte));
            }
        }
    }
    Ok(match handle {
        Some(handle) => format!("{}{}", handle, text),
        None => format!("!<{}>", text),
    })
}

// =============================================================================
// Character helpers
// =============================================================================

fn is_break_char(c: char) -> bool {
    matches!(c, '\n' | '\u{85}' | '\u{2028}' | '\u{2029}')
}

/// Characters the double-quoted writer may emit without escaping.
fn is_emittable(c: char) -> bool {
    ('\x20'..='\x7e').contains(&c)
        || ('\u{a0}'..='\u{d7ff}').contains(&c)
        || ('\u{e000}'..='\u{fffd}').contains(&c)
        || c >= '\u{10000}'
}

/// Single-letter escape for the double-quoted style, if one exists.
fn short_escape(c: char) -> Option<char> {
    Some(match c {
        '\0' => '0',
        '\x07' => 'a',
        '\x08' => 'b',
        '\t' => 't',
        '\n' => 'n',
        '\x0b' => 'v',
        '\x0c' => 'f',
        '\r' => 'r',
        '\x1b' => 'e',
        '"' => '"',
        '\\' => '\\',
        '\u{85}' => 'N',
        '\u{a0}' => '_',
        '\u{2028}' => 'L',
        '\u{2029}' => 'P',
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;

    fn events_of(input: &str) -> Vec<Event> {
        parser::from_str(input)
            .map(|r| r.expect("parse should succeed").0)
            .collect()
    }

    fn round_trip(input: &str) -> String {
        emit(&events_of(input)).expect("emit should succeed")
    }

    fn scalar_event(value: &str) -> Event {
        Event::Scalar {
            value: value.to_string(),
            style: ScalarStyle::Plain,
            anchor: None,
            tag: None,
            plain_implicit: true,
            quoted_implicit: false,
        }
    }

    fn doc(events: Vec<Event>) -> Vec<Event> {
        let mut all = vec![Event::StreamStart, Event::DocumentStart { explicit: false }];
        all.extend(events);
        all.push(Event::DocumentEnd { explicit: false });
        all.push(Event::StreamEnd);
        all
    }

    #[test]
    fn test_block_mapping_output() {
        assert_eq!(round_trip("a: 1\nb: 2\n"), "a: 1\nb: 2\n");
    }

    #[test]
    fn test_block_sequence_output() {
        assert_eq!(round_trip("- a\n- b\n"), "- a\n- b\n");
    }

    #[test]
    fn test_nested_block_output() {
        assert_eq!(
            round_trip("top:\n  one: 1\n  two:\n    - x\n    - y\n"),
            "top:\n  one: 1\n  two:\n  - x\n  - y\n"
        );
    }

    #[test]
    fn test_flow_styles_are_preserved() {
        assert_eq!(round_trip("{a: 1, b: 2}\n"), "{a: 1, b: 2}\n");
        assert_eq!(round_trip("[1, 2, 3]\n"), "[1, 2, 3]\n");
    }

    #[test]
    fn test_quoted_styles_are_preserved() {
        assert_eq!(round_trip("'a b'\n"), "'a b'\n");
        assert_eq!(round_trip("\"a\\nb\"\n"), "\"a\\nb\"\n");
    }

    #[test]
    fn test_multiline_value_never_plain() {
        let events = doc(vec![scalar_event("a\nb")]);
        let text = emit(&events).unwrap();
        assert!(!text.starts_with('a'), "multiline scalar emitted plain: {text:?}");
    }

    #[test]
    fn test_leading_space_never_plain() {
        let analysis = analyze_scalar(" x");
        assert!(!analysis.allow_flow_plain);
        assert!(!analysis.allow_block_plain);
        let analysis = analyze_scalar("x ");
        assert!(!analysis.allow_flow_plain);
        assert!(!analysis.allow_block_plain);
        assert!(!analysis.allow_block);
    }

    #[test]
    fn test_analysis_flags_indicators() {
        let analysis = analyze_scalar("a: b");
        assert!(!analysis.allow_block_plain);
        assert!(!analysis.allow_flow_plain);
        let analysis = analyze_scalar("a,b");
        assert!(!analysis.allow_flow_plain);
        assert!(analysis.allow_block_plain);
        let analysis = analyze_scalar("#x");
        assert!(!analysis.allow_block_plain);
    }

    #[test]
    fn test_canonical_forces_double_quotes_and_marker() {
        let events = doc(vec![scalar_event("plain")]);
        let opts = EmitOptions {
            canonical: true,
            ..EmitOptions::default()
        };
        let text = emit_with(&events, opts).unwrap();
        assert!(text.starts_with("---"));
        assert!(text.contains("\"plain\""));
    }

    #[test]
    fn test_anchor_written_once_alias_twice() {
        let text = round_trip("- &a val\n- *a\n- *a\n");
        assert_eq!(text, "- &a val\n- *a\n- *a\n");
    }

    #[test]
    fn test_literal_round_trip_with_chomping() {
        assert_eq!(round_trip("x: |\n  a\n  b\n"), "x: |\n  a\n  b\n");
        assert_eq!(round_trip("x: |-\n  a\n"), "x: |-\n  a\n");
        // Keep chomping leaves the document open-ended, so the stream
        // closes with an explicit end marker.
        assert_eq!(round_trip("x: |+\n  a\n\n"), "x: |+\n  a\n\n...\n");
    }

    #[test]
    fn test_block_hints() {
        let emitter = Emitter::new(String::new());
        assert_eq!(emitter.block_hints("a\n"), "");
        assert_eq!(emitter.block_hints("a"), "-");
        assert_eq!(emitter.block_hints("a\n\n"), "+");
        assert_eq!(emitter.block_hints(" a\n"), "2");
    }

    #[test]
    fn test_explicit_tag_is_written() {
        // An explicitly tagged value cannot stay plain (the loader
        // could not re-infer the tag), so it picks up single quotes.
        let text = round_trip("!!str ok\n");
        assert_eq!(text, "!!str 'ok'\n");
    }

    #[test]
    fn test_verbatim_tag_is_written() {
        let text = round_trip("!<tag:example.com,2000:x> ok\n");
        assert_eq!(text, "!<tag:example.com,2000:x> 'ok'\n");
    }

    #[test]
    fn test_prepare_tag_shortens_default_prefix() {
        assert_eq!(prepare_tag("tag:yaml.org,2002:str").unwrap(), "!!str");
        assert_eq!(prepare_tag("!local").unwrap(), "!local");
        assert_eq!(prepare_tag("!").unwrap(), "!");
        assert_eq!(
            prepare_tag("tag:example.com,2000:app/thing").unwrap(),
            "!<tag:example.com,2000:app/thing>"
        );
    }

    #[test]
    fn test_empty_collections() {
        assert_eq!(round_trip("a: []\nb: {}\n"), "a: []\nb: {}\n");
    }

    #[test]
    fn test_empty_value_round_trip() {
        assert_eq!(round_trip("key:\n"), "key:\n");
    }

    #[test]
    fn test_plain_root_scalar_closes_stream_open_ended() {
        assert_eq!(round_trip("word\n"), "word\n...\n");
    }

    #[test]
    fn test_multi_document_stream() {
        let text = round_trip("one\n---\ntwo\n");
        assert_eq!(text, "one\n--- two\n...\n");
    }

    #[test]
    fn test_width_folding_in_plain_scalar() {
        let long = "word ".repeat(30);
        let events = doc(vec![scalar_event(long.trim_end())]);
        let opts = EmitOptions {
            width: 40,
            ..EmitOptions::default()
        };
        let text = emit_with(&events, opts).unwrap();
        let body: Vec<&str> = text.lines().filter(|l| *l != "...").collect();
        assert!(body.len() > 1, "expected folding, got {text:?}");
        // Folding must never break inside a word.
        for line in &body {
            for word in line.split_whitespace() {
                assert_eq!(word, "word");
            }
        }
    }

    #[test]
    fn test_multiline_flow_option() {
        let opts = EmitOptions {
            multiline_flow: true,
            ..EmitOptions::default()
        };
        let text = emit_with(&events_of("[1, 2]\n"), opts).unwrap();
        assert_eq!(text, "[\n  1,\n  2\n]\n");
    }

    #[test]
    fn test_default_scalar_style_option() {
        let opts = EmitOptions {
            scalar_style: Some(ScalarStyle::SingleQuoted),
            ..EmitOptions::default()
        };
        let text = emit_with(&events_of("a: 1\n"), opts).unwrap();
        assert_eq!(text, "'a': '1'\n");
    }

    #[test]
    fn test_unexpected_event_is_fatal() {
        let mut emitter = Emitter::new(String::new());
        emitter.emit(Event::StreamStart).unwrap();
        let err = emitter.emit(Event::SequenceEnd).unwrap_err();
        assert!(matches!(err, EmitError::UnexpectedEvent { .. }));
    }

    #[test]
    fn test_event_after_stream_end_is_fatal() {
        let mut emitter = Emitter::new(String::new());
        emitter.emit(Event::StreamStart).unwrap();
        emitter.emit(Event::StreamEnd).unwrap();
        let err = emitter.emit(Event::StreamStart).unwrap_err();
        assert_eq!(err, EmitError::StreamEnded);
    }

    #[test]
    fn test_long_key_uses_explicit_form() {
        let key = "k".repeat(200);
        let events = doc(vec![
            Event::MappingStart {
                anchor: None,
                tag: None,
                style: CollectionStyle::Block,
            },
            scalar_event(&key),
            scalar_event("v"),
            Event::MappingEnd,
        ]);
        let text = emit(&events).unwrap();
        assert!(text.starts_with('?'), "expected explicit key: {text:?}");
    }

    #[test]
    fn test_special_characters_force_double_quotes() {
        let events = doc(vec![scalar_event("bell\u{7}")]);
        let text = emit(&events).unwrap();
        assert!(text.contains("\\a"), "expected escaped bell: {text:?}");
    }
}
