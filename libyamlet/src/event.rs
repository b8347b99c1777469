//! Event types produced by the parser and consumed by the emitter.
//!
//! An event describes one piece of document structure. Ten kinds cover
//! the whole grammar: stream and document boundaries, scalars, aliases,
//! and the starts/ends of sequences and mappings. Node events carry an
//! optional anchor; start events carry an optional resolved tag and the
//! information the emitter needs to decide whether the tag can be
//! omitted on output.

use crate::token::ScalarStyle;

/// How a collection was (or should be) presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollectionStyle {
    /// No preference; the emitter's options decide.
    #[default]
    Any,
    /// Indentation-based block style.
    Block,
    /// Bracketed flow style.
    Flow,
}

/// One unit of document structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The stream has begun.
    StreamStart,
    /// The stream has ended; no further events follow.
    StreamEnd,
    /// A document has begun. `explicit` records whether the source wrote
    /// the `---` marker.
    DocumentStart { explicit: bool },
    /// A document has ended. `explicit` records whether the source wrote
    /// the `...` marker.
    DocumentEnd { explicit: bool },
    /// A reference to a previously anchored node.
    Alias { anchor: String },
    /// A scalar value. The implicit pair records whether the tag may be
    /// omitted when the scalar is written plain / non-plain.
    Scalar {
        value: String,
        style: ScalarStyle,
        anchor: Option<String>,
        tag: Option<String>,
        plain_implicit: bool,
        quoted_implicit: bool,
    },
    /// A sequence has begun; entries follow until [`Event::SequenceEnd`].
    SequenceStart {
        anchor: Option<String>,
        tag: Option<String>,
        style: CollectionStyle,
    },
    /// The innermost open sequence has ended.
    SequenceEnd,
    /// A mapping has begun; key/value pairs follow until
    /// [`Event::MappingEnd`].
    MappingStart {
        anchor: Option<String>,
        tag: Option<String>,
        style: CollectionStyle,
    },
    /// The innermost open mapping has ended.
    MappingEnd,
}

impl Event {
    /// The synthetic event for omitted content: a zero-length plain
    /// scalar with no properties.
    pub(crate) fn empty_scalar() -> Event {
        Event::Scalar {
            value: String::new(),
            style: ScalarStyle::Plain,
            anchor: None,
            tag: None,
            plain_implicit: true,
            quoted_implicit: false,
        }
    }

    /// An omitted-content scalar that still carries node properties
    /// (an anchor or tag may precede an empty node).
    pub(crate) fn empty_scalar_with(anchor: Option<String>, tag: Option<String>) -> Event {
        let implicit = tag.is_none();
        Event::Scalar {
            value: String::new(),
            style: ScalarStyle::Plain,
            anchor,
            tag,
            plain_implicit: implicit,
            quoted_implicit: false,
        }
    }

    /// Short name of the event kind, used in emitter error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Event::StreamStart => "StreamStart",
            Event::StreamEnd => "StreamEnd",
            Event::DocumentStart { .. } => "DocumentStart",
            Event::DocumentEnd { .. } => "DocumentEnd",
            Event::Alias { .. } => "Alias",
            Event::Scalar { .. } => "Scalar",
            Event::SequenceStart { .. } => "SequenceStart",
            Event::SequenceEnd => "SequenceEnd",
            Event::MappingStart { .. } => "MappingStart",
            Event::MappingEnd => "MappingEnd",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_scalar_shape() {
        let ev = Event::empty_scalar();
        match ev {
            Event::Scalar {
                value,
                style,
                plain_implicit,
                quoted_implicit,
                ..
            } => {
                assert!(value.is_empty());
                assert_eq!(style, ScalarStyle::Plain);
                assert!(plain_implicit);
                assert!(!quoted_implicit);
            }
            other => panic!("expected scalar, got {}", other.kind_name()),
        }
    }

    #[test]
    fn test_empty_scalar_with_tag_is_not_implicit() {
        let ev = Event::empty_scalar_with(None, Some("tag:yaml.org,2002:str".into()));
        match ev {
            Event::Scalar { plain_implicit, .. } => assert!(!plain_implicit),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(Event::StreamStart.kind_name(), "StreamStart");
        assert_eq!(Event::SequenceEnd.kind_name(), "SequenceEnd");
    }
}
