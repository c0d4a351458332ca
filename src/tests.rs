// Copyright (c) 2026 Arista Networks, Inc.
// Use of this source code is governed by the Apache License 2.0
// that can be found in the LICENSE file.

//! Unit tests for the scanner.
//!
//! These tests verify the shape of whole token streams for the YAML
//! constructs the scanner supports: block and flow collections, documents,
//! directives, and the five scalar styles. Finer-grained cases live next
//! to the code they exercise.

use super::*;

fn kinds(input: &str) -> Vec<TokenKind> {
    scan(input)
        .unwrap()
        .into_iter()
        .map(|t| t.kind)
        .collect()
}

fn plain(value: &str) -> TokenKind {
    TokenKind::Scalar {
        value: value.to_owned(),
        style: ScalarStyle::Plain,
    }
}

#[test]
fn test_empty_stream() {
    assert_eq!(kinds(""), vec![TokenKind::StreamStart, TokenKind::StreamEnd]);
}

#[test]
fn test_comment_only_stream() {
    assert_eq!(
        kinds("# just a comment\n"),
        vec![TokenKind::StreamStart, TokenKind::StreamEnd]
    );
}

#[test]
fn test_bare_scalar_document() {
    assert_eq!(
        kinds("hello\n"),
        vec![TokenKind::StreamStart, plain("hello"), TokenKind::StreamEnd]
    );
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
fn test_multiple_documents_close_open_blocks() {
    assert_eq!(
        kinds("---\na: 1\n---\nb: 2\n"),
        vec![
            TokenKind::StreamStart,
            TokenKind::DocumentStart,
            TokenKind::BlockMappingStart,
            TokenKind::Key,
            plain("a"),
            TokenKind::Value,
            plain("1"),
            TokenKind::BlockEnd,
            TokenKind::DocumentStart,
            TokenKind::BlockMappingStart,
            TokenKind::Key,
            plain("b"),
            TokenKind::Value,
            plain("2"),
            TokenKind::BlockEnd,
            TokenKind::StreamEnd,
        ]
    );
}

#[test]
fn test_sequence_of_mappings() {
    assert_eq!(
        kinds("- a: 1\n  b: 2\n- c: 3\n"),
        vec![
            TokenKind::StreamStart,
            TokenKind::BlockSequenceStart,
            TokenKind::BlockEntry,
            TokenKind::BlockMappingStart,
            TokenKind::Key,
            plain("a"),
            TokenKind::Value,
            plain("1"),
            TokenKind::Key,
            plain("b"),
            TokenKind::Value,
            plain("2"),
            TokenKind::BlockEnd,
            TokenKind::BlockEntry,
            TokenKind::BlockMappingStart,
            TokenKind::Key,
            plain("c"),
            TokenKind::Value,
            plain("3"),
            TokenKind::BlockEnd,
            TokenKind::BlockEnd,
            TokenKind::StreamEnd,
        ]
    );
}

#[test]
fn test_nested_block_sequences() {
    assert_eq!(
        kinds("- - a\n  - b\n- c\n"),
        vec![
            TokenKind::StreamStart,
            TokenKind::BlockSequenceStart,
            TokenKind::BlockEntry,
            TokenKind::BlockSequenceStart,
            TokenKind::BlockEntry,
            plain("a"),
            TokenKind::BlockEntry,
            plain("b"),
            TokenKind::BlockEnd,
            TokenKind::BlockEntry,
            plain("c"),
            TokenKind::BlockEnd,
            TokenKind::StreamEnd,
        ]
    );
}

#[test]
fn test_flow_collection_nested_in_block_mapping() {
    assert_eq!(
        kinds("a: [1, {b: 2}]\n"),
        vec![
            TokenKind::StreamStart,
            TokenKind::BlockMappingStart,
            TokenKind::Key,
            plain("a"),
            TokenKind::Value,
            TokenKind::FlowSequenceStart,
            plain("1"),
            TokenKind::FlowEntry,
            TokenKind::FlowMappingStart,
            TokenKind::Key,
            plain("b"),
            TokenKind::Value,
            plain("2"),
            TokenKind::FlowMappingEnd,
            TokenKind::FlowSequenceEnd,
            TokenKind::BlockEnd,
            TokenKind::StreamEnd,
        ]
    );
}

#[test]
fn test_comments_do_not_produce_tokens() {
    assert_eq!(
        kinds("# head\na: 1 # tail\n# foot\n"),
        vec![
            TokenKind::StreamStart,
            TokenKind::BlockMappingStart,
            TokenKind::Key,
            plain("a"),
            TokenKind::Value,
            plain("1"),
            TokenKind::BlockEnd,
            TokenKind::StreamEnd,
        ]
    );
}

#[test]
fn test_all_five_scalar_styles() {
    let input = "p: plain\ns: 'single'\nd: \"double\"\nl: |\n  lit\nf: >\n  fold\n";
    let styles: Vec<ScalarStyle> = scan(input)
        .unwrap()
        .into_iter()
        .filter_map(|t| match t.kind {
            TokenKind::Scalar { style, .. } => Some(style),
            _ => None,
        })
        .collect();
    assert!(styles.contains(&ScalarStyle::Plain));
    assert!(styles.contains(&ScalarStyle::SingleQuoted));
    assert!(styles.contains(&ScalarStyle::DoubleQuoted));
    assert!(styles.contains(&ScalarStyle::Literal));
    assert!(styles.contains(&ScalarStyle::Folded));
}

#[test]
fn test_marks_track_lines_and_columns() {
    let tokens = scan("a: 1\nbb: 22\n").unwrap();
    let one = tokens.iter().find(|t| t.kind == plain("1")).unwrap();
    assert_eq!(one.start, Mark::new(3, 0, 3));
    assert_eq!(one.end, Mark::new(4, 0, 4));
    let bb = tokens.iter().find(|t| t.kind == plain("bb")).unwrap();
    assert_eq!(bb.start, Mark::new(5, 1, 0));
}

#[test]
fn test_inserted_key_is_marked_at_candidate_start() {
    let tokens = scan("key: value\n").unwrap();
    let key = tokens.iter().find(|t| t.kind == TokenKind::Key).unwrap();
    assert_eq!(key.start, Mark::new(0, 0, 0));
    let mapping = tokens
        .iter()
        .find(|t| t.kind == TokenKind::BlockMappingStart)
        .unwrap();
    assert_eq!(mapping.start, Mark::new(0, 0, 0));
}

#[test]
fn test_token_spans_are_ordered() {
    let input = "a: [1, 2]\nb:\n  - x\n  - 'y'\n";
    let tokens = scan(input).unwrap();
    let mut previous_start = Mark::default();
    for token in &tokens {
        assert!(
            token.start.index <= token.end.index,
            "inverted span on {}",
            token.kind
        );
        assert!(
            previous_start.index <= token.start.index,
            "start went backwards at {}",
            token.kind
        );
        previous_start = token.start;
    }
}

#[test]
fn test_entire_input_is_consumed() {
    let input = "a: 1 # note\nb:\n  - 'x'\n";
    let mut scanner = Scanner::new(input.chars());
    while scanner.move_next().unwrap() {
        scanner.consume_current();
    }
    assert_eq!(scanner.current_position().index, input.chars().count());
}

#[test]
fn test_scan_reports_first_error() {
    let err = scan("x: @\n").unwrap_err();
    assert!(err.message.contains("cannot start any token"), "{}", err.message);
    assert_eq!(err.mark.line, 0);
    assert_eq!(err.mark.column, 3);
}
