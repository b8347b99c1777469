//! Test harness for the pipeline against fixture files.
//!
//! Every document under test/yaml/ must survive a full round trip:
//! parse to events, emit back to text, re-parse, and compare the two
//! event streams up to scalar-style normalization (a value may change
//! quoting but never content). Every document under test/err/ must fail
//! to parse.

use std::path::{Path, PathBuf};

use glob::glob;

use libyamlet::{emit, parse, Event};

/// Root test directory.
fn test_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .join("test")
}

/// Collect the fixture files in a subdirectory of test/, sorted.
fn fixture_files(subdir: &str) -> Vec<PathBuf> {
    let pattern = test_root().join(subdir).join("*.yaml");
    let mut files: Vec<PathBuf> = glob(pattern.to_str().unwrap())
        .expect("fixture glob pattern is valid")
        .filter_map(|entry| entry.ok())
        .collect();
    files.sort();
    assert!(!files.is_empty(), "no fixtures found under test/{subdir}");
    files
}

/// The identity of an event with presentation detail stripped: scalar
/// style, implicit flags, collection style, and document-marker
/// explicitness may all legally change across a round trip.
#[derive(Debug, PartialEq, Eq)]
enum Shape {
    StreamStart,
    StreamEnd,
    DocumentStart,
    DocumentEnd,
    Alias(String),
    Scalar(String, Option<String>, Option<String>),
    SequenceStart(Option<String>, Option<String>),
    SequenceEnd,
    MappingStart(Option<String>, Option<String>),
    MappingEnd,
}

fn shapes(events: &[Event]) -> Vec<Shape> {
    events
        .iter()
        .map(|event| match event {
            Event::StreamStart => Shape::StreamStart,
            Event::StreamEnd => Shape::StreamEnd,
            Event::DocumentStart { .. } => Shape::DocumentStart,
            Event::DocumentEnd { .. } => Shape::DocumentEnd,
            Event::Alias { anchor } => Shape::Alias(anchor.clone()),
            Event::Scalar {
                value, anchor, tag, ..
            } => Shape::Scalar(value.clone(), anchor.clone(), normalize_tag(tag)),
            Event::SequenceStart { anchor, tag, .. } => {
                Shape::SequenceStart(anchor.clone(), normalize_tag(tag))
            }
            Event::SequenceEnd => Shape::SequenceEnd,
            Event::MappingStart { anchor, tag, .. } => {
                Shape::MappingStart(anchor.clone(), normalize_tag(tag))
            }
            Event::MappingEnd => Shape::MappingEnd,
        })
        .collect()
}

/// The non-specific `!` tag asks the loader to use its default
/// resolution, which is also what an absent tag means for a quoted
/// scalar; the two forms are equivalent across a round trip.
fn normalize_tag(tag: &Option<String>) -> Option<String> {
    match tag.as_deref() {
        Some("!") | None => None,
        Some(other) => Some(other.to_string()),
    }
}

#[test]
fn test_valid_fixtures_round_trip() {
    for file in fixture_files("yaml") {
        let name = file.file_name().unwrap().to_string_lossy().to_string();
        let source = std::fs::read_to_string(&file).unwrap();

        let events = parse(&source)
            .unwrap_or_else(|e| panic!("{name}: failed to parse fixture: {e}"));
        let emitted = emit(&events)
            .unwrap_or_else(|e| panic!("{name}: failed to emit events: {e}"));
        let reparsed = parse(&emitted)
            .unwrap_or_else(|e| panic!("{name}: emitted text failed to re-parse: {e}\n{emitted}"));

        assert_eq!(
            shapes(&events),
            shapes(&reparsed),
            "{name}: round trip changed the event stream\nemitted:\n{emitted}"
        );
    }
}

#[test]
fn test_error_fixtures_fail_to_parse() {
    for file in fixture_files("err") {
        let name = file.file_name().unwrap().to_string_lossy().to_string();
        let source = std::fs::read_to_string(&file).unwrap();
        assert!(
            parse(&source).is_err(),
            "{name}: expected a parse error, but parsing succeeded"
        );
    }
}

#[test]
fn test_double_round_trip_is_stable() {
    // After one round trip the text is in the emitter's preferred form;
    // a second trip must reproduce it exactly.
    for file in fixture_files("yaml") {
        let name = file.file_name().unwrap().to_string_lossy().to_string();
        let source = std::fs::read_to_string(&file).unwrap();
        let once = emit(&parse(&source).unwrap()).unwrap();
        let twice = emit(&parse(&once).unwrap()).unwrap();
        assert_eq!(once, twice, "{name}: second round trip was not stable");
    }
}
