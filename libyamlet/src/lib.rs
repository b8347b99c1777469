//! Streaming YAML 1.2 engine.
//!
//! This crate converts a stream of characters into structured events and
//! back again, enforcing YAML's indentation, flow/block, and
//! scalar-style rules.
//!
//! # Processing Pipeline
//!
//! The engine operates in three phases, each drivable one unit at a
//! time:
//!
//! 1. **Scanner**: Converts code points into tokens, owning indentation
//!    and flow-nesting state, including the retroactive simple-key
//!    discovery YAML requires.
//!
//! 2. **Parser**: Converts tokens into events by running the YAML
//!    grammar as an explicit state machine, so documents of unbounded
//!    depth never grow the call stack.
//!
//! 3. **Emitter**: Converts events back into formatted text, choosing
//!    among the five scalar styles and folding at the configured width.
//!
//! Higher layers - composing a node graph, constructing native values,
//! serializing a graph back to events - consume this vocabulary but live
//! outside this crate.
//!
//! # Example
//!
//! ```
//! use libyamlet::{parse, emit, Event};
//!
//! let events = parse("{a: 1}").unwrap();
//! assert!(events.iter().any(|e| matches!(e, Event::MappingStart { .. })));
//! let text = emit(&events).unwrap();
//! assert_eq!(parse(&text).unwrap().len(), events.len());
//! ```

mod emitter;
mod error;
mod event;
mod parser;
mod scanner;
mod token;

pub use emitter::{emit, emit_with, EmitOptions, Emitter, LineBreak};
pub use error::{EmitError, Mark, ParseError, Result, ScanError, Span};
pub use event::{CollectionStyle, Event};
pub use parser::Parser;
pub use scanner::{ScanOptions, Scanner};
pub use token::{Chomping, ScalarStyle, Token, TokenKind};

/// Build a scanner over the characters of a string slice.
pub fn scan(input: &str) -> Scanner<std::str::Chars<'_>> {
    scanner::from_str(input)
}

/// Build a parser over the characters of a string slice.
pub fn parse_events(input: &str) -> Parser<std::str::Chars<'_>> {
    parser::from_str(input)
}

/// Parse every document in the stream, collecting all events eagerly.
pub fn parse(input: &str) -> Result<Vec<Event>> {
    let mut parser = parser::from_str(input);
    let mut events = Vec::new();
    loop {
        let (event, _) = parser.next_event()?;
        let done = event == Event::StreamEnd;
        events.push(event);
        if done {
            break;
        }
    }
    Ok(events)
}
