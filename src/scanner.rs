// Copyright (c) 2026 Arista Networks, Inc.
// Use of this source code is governed by the Apache License 2.0
// that can be found in the LICENSE file.

//! The scanner: a stateful tokenizer turning characters into YAML tokens.
//!
//! Scanning YAML is harder than scanning token-by-token languages for three
//! reasons, and they shape everything in this module:
//!
//! - **Simple keys are recognized retroactively.** `a: 1` only becomes a
//!   mapping once the `:` is seen, at which point the scalar `a` is already
//!   queued. The scanner records a `SimpleKey` candidate per flow level
//!   and, on `:`, *inserts* a `Key` token behind already-produced tokens.
//!   No token leaves the queue while a still-possible candidate could force
//!   such an insertion ahead of it.
//! - **Indentation is structure.** Entering a deeper column synthesizes
//!   `BlockSequenceStart`/`BlockMappingStart`; returning to a shallower one
//!   synthesizes one `BlockEnd` per abandoned level.
//! - **Context switches the grammar.** Inside `[...]`/`{...}` indentation
//!   is insignificant and `,`/`:`/`?` and brackets terminate plain scalars;
//!   outside, they do not.
//!
//! The consumer pulls through [`Scanner::move_next`] / [`Scanner::current`]
//! / [`Scanner::consume_current`], or through the [`Iterator`] adapter.
//! Errors are fatal: the first [`ScanError`] poisons the scanner.

use crate::buffer::LookAheadBuffer;
use crate::error::{ScanError, ScanResult};
use crate::mark::Mark;
use crate::queue::TokenQueue;
use crate::token::{ScalarStyle, Token, TokenKind};

/// A simple key may occupy at most this many characters on one line.
const MAX_SIMPLE_KEY_LENGTH: usize = 1024;

fn is_nul(c: char) -> bool {
    c == '\0'
}

fn is_break(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\u{0085}' | '\u{2028}' | '\u{2029}')
}

fn is_breakz(c: char) -> bool {
    is_break(c) || is_nul(c)
}

fn is_blank(c: char) -> bool {
    c == ' ' || c == '\t'
}

fn is_blankz(c: char) -> bool {
    is_blank(c) || is_breakz(c)
}

/// Anchor, alias, handle, and directive names: `[A-Za-z0-9_-]`.
fn is_alpha(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Characters permitted in tag URIs, before `%XX` decoding.
fn is_uri_char(c: char) -> bool {
    is_alpha(c)
        || matches!(
            c,
            ';' | '/'
                | '?'
                | ':'
                | '@'
                | '&'
                | '='
                | '+'
                | '$'
                | ','
                | '.'
                | '!'
                | '~'
                | '*'
                | '\''
                | '('
                | ')'
                | '['
                | ']'
                | '%'
        )
}

fn as_hex(c: char) -> u32 {
    match c {
        '0'..='9' => c as u32 - '0' as u32,
        'a'..='f' => c as u32 - 'a' as u32 + 10,
        'A'..='F' => c as u32 - 'A' as u32 + 10,
        _ => 0,
    }
}

/// Block scalar chomping indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Chomping {
    /// `-` strip all trailing breaks
    Strip,
    /// (default) keep the final break, strip the rest
    #[default]
    Clip,
    /// `+` keep all trailing breaks
    Keep,
}

/// A candidate implicit mapping key.
///
/// Stored one per flow level (slot 0 is the block context). The candidate
/// stays `possible` until its `:` is found, it goes stale, or the grammar
/// rules it out. A `required` candidate sits exactly at the current block
/// indent, so failing to find its `:` is a syntax error rather than a
/// silent downgrade.
#[derive(Debug, Clone, Copy, Default)]
struct SimpleKey {
    possible: bool,
    required: bool,
    /// Stream-wide number of the token the key would become.
    token_number: usize,
    mark: Mark,
}

/// A streaming YAML 1.1 tokenizer over a pull-based character source.
///
/// Construct one scanner per input. Pull tokens with [`move_next`] /
/// [`current`] / [`consume_current`], or iterate:
///
/// ```
/// use yaml_scanner::{Scanner, TokenKind};
///
/// let tokens: Result<Vec<_>, _> = Scanner::new("a: 1\n".chars()).collect();
/// let kinds: Vec<TokenKind> = tokens.unwrap().into_iter().map(|t| t.kind).collect();
/// assert_eq!(kinds[0], TokenKind::StreamStart);
/// assert_eq!(kinds[kinds.len() - 1], TokenKind::StreamEnd);
/// ```
///
/// [`move_next`]: Self::move_next
/// [`current`]: Self::current
/// [`consume_current`]: Self::consume_current
#[derive(Debug)]
pub struct Scanner<I> {
    buffer: LookAheadBuffer<I>,
    mark: Mark,
    tokens: TokenQueue,
    current: Option<Token>,
    error: Option<ScanError>,
    error_yielded: bool,

    stream_start_produced: bool,
    stream_end_produced: bool,
    simple_key_allowed: bool,
    token_available: bool,

    /// Current block indentation column, -1 before the first collection.
    indent: isize,
    indents: Vec<isize>,
    simple_keys: Vec<SimpleKey>,
    flow_level: usize,
    tokens_parsed: usize,
}

impl<I: Iterator<Item = char>> Scanner<I> {
    /// Create a scanner over a character source.
    pub fn new(source: I) -> Self {
        Self {
            buffer: LookAheadBuffer::new(source),
            mark: Mark::default(),
            tokens: TokenQueue::new(),
            current: None,
            error: None,
            error_yielded: false,
            stream_start_produced: false,
            stream_end_produced: false,
            simple_key_allowed: false,
            token_available: false,
            indent: -1,
            indents: Vec::new(),
            simple_keys: Vec::new(),
            flow_level: 0,
            tokens_parsed: 0,
        }
    }

    /// The scanner's source mark at the last decision point.
    #[must_use]
    pub fn current_position(&self) -> Mark {
        self.mark
    }

    /// The token currently exposed, if any.
    #[must_use]
    pub fn current(&self) -> Option<&Token> {
        self.current.as_ref()
    }

    /// `true` once the `StreamStart` token has been produced.
    #[must_use]
    pub fn stream_started(&self) -> bool {
        self.stream_start_produced
    }

    /// `true` once the `StreamEnd` token has been handed out.
    #[must_use]
    pub fn stream_ended(&self) -> bool {
        self.stream_end_produced
    }

    /// Advance so that [`current`] is the next token of the stream.
    ///
    /// Returns `false` once the `StreamEnd` token has been consumed. An
    /// unconsumed current token is consumed implicitly. After an error the
    /// scanner is poisoned and every later call returns the same error.
    ///
    /// [`current`]: Self::current
    pub fn move_next(&mut self) -> ScanResult<bool> {
        if let Some(error) = &self.error {
            return Err(error.clone());
        }
        if self.current.is_some() {
            self.consume_current();
        }
        if self.stream_end_produced {
            return Ok(false);
        }
        if !self.token_available {
            if let Err(error) = self.fetch_more_tokens() {
                self.error = Some(error.clone());
                return Err(error);
            }
        }
        match self.tokens.dequeue() {
            Some(token) => {
                self.token_available = false;
                if token.kind == TokenKind::StreamEnd {
                    self.stream_end_produced = true;
                }
                self.current = Some(token);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Mark the current token consumed and hand it to the caller.
    ///
    /// Consumption drives the `tokens_parsed` bookkeeping that the
    /// simple-key machinery measures insertion offsets against, so a parser
    /// must consume every token it takes.
    pub fn consume_current(&mut self) -> Option<Token> {
        let token = self.current.take();
        if token.is_some() {
            self.tokens_parsed += 1;
            log::trace!("token consumed, {} parsed so far", self.tokens_parsed);
        }
        token
    }

    /// Fetch tokens until the head of the queue is safe to release.
    ///
    /// The head is unsafe while any still-possible simple key refers to it:
    /// a later `:` would have to insert a `Key` token in front of it.
    fn fetch_more_tokens(&mut self) -> ScanResult<()> {
        loop {
            let mut need_more = false;
            if self.tokens.is_empty() {
                need_more = true;
            } else {
                self.stale_simple_keys()?;
                for key in &self.simple_keys {
                    if key.possible && key.token_number == self.tokens_parsed {
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

    /// Scan and enqueue the next token(s) from the source.
    fn fetch_next_token(&mut self) -> ScanResult<()> {
        self.cache(1);

        if !self.stream_start_produced {
            self.fetch_stream_start();
            return Ok(());
        }

        self.scan_to_next_token();
        self.stale_simple_keys()?;
        self.unroll_indent(self.mark.column as isize);

        self.cache(4);

        if self.buffer.end_of_input() {
            return self.fetch_stream_end();
        }

        if self.mark.column == 0 && self.ch() == '%' {
            return self.fetch_directive();
        }
        if self.mark.column == 0 && self.next_is_document_indicator('-') {
            return self.fetch_document_indicator(TokenKind::DocumentStart);
        }
        if self.mark.column == 0 && self.next_is_document_indicator('.') {
            return self.fetch_document_indicator(TokenKind::DocumentEnd);
        }

        let c = self.ch();
        let next = self.buffer.peek(1);
        match c {
            '[' => self.fetch_flow_collection_start(TokenKind::FlowSequenceStart),
            '{' => self.fetch_flow_collection_start(TokenKind::FlowMappingStart),
            ']' => self.fetch_flow_collection_end(TokenKind::FlowSequenceEnd),
            '}' => self.fetch_flow_collection_end(TokenKind::FlowMappingEnd),
            ',' => self.fetch_flow_entry(),
            '-' if is_blankz(next) => self.fetch_block_entry(),
            '?' if self.flow_level > 0 || is_blankz(next) => self.fetch_key(),
            ':' if self.flow_level > 0 || is_blankz(next) => self.fetch_value(),
            '*' => self.fetch_anchor(true),
            '&' => self.fetch_anchor(false),
            '!' => self.fetch_tag(),
            '|' if self.flow_level == 0 => self.fetch_block_scalar(true),
            '>' if self.flow_level == 0 => self.fetch_block_scalar(false),
            '\'' => self.fetch_flow_scalar(true),
            '"' => self.fetch_flow_scalar(false),
            _ if self.can_start_plain_scalar() => self.fetch_plain_scalar(),
            _ => Err(ScanError::while_scanning(
                "for the next token",
                self.mark,
                "found character that cannot start any token",
            )),
        }
    }

    /// The plain scalar start rule, applied after every other dispatch arm
    /// has declined. Assumes 2 characters are cached.
    fn can_start_plain_scalar(&self) -> bool {
        let c = self.ch();
        let next = self.buffer.peek(1);
        match c {
            _ if is_blankz(c) => false,
            ',' | '[' | ']' | '{' | '}' | '#' | '&' | '*' | '!' | '|' | '>' | '\'' | '"' | '%'
            | '@' | '`' => false,
            '-' => !is_blank(next),
            '?' | ':' => self.flow_level == 0 && !is_blankz(next),
            _ => true,
        }
    }

    /// Invalidate simple-key candidates the source has moved past: a key
    /// must stay on one line and within 1024 characters of its start.
    fn stale_simple_keys(&mut self) -> ScanResult<()> {
        for key in &mut self.simple_keys {
            if key.possible
                && (key.mark.line < self.mark.line
                    || key.mark.index + MAX_SIMPLE_KEY_LENGTH < self.mark.index)
            {
                if key.required {
                    return Err(ScanError::while_scanning(
                        "a simple key",
                        key.mark,
                        "could not find expected ':'",
                    ));
                }
                key.possible = false;
            }
        }
        Ok(())
    }

    /// Skip inter-token spaces, comments, and line breaks. Tabs are only
    /// whitespace in the flow context or where a simple key is impossible;
    /// elsewhere they are left for the dispatcher to reject.
    fn scan_to_next_token(&mut self) {
        loop {
            self.cache(1);
            let c = self.ch();
            match c {
                '\u{FEFF}' if self.mark.index == 0 => {
                    // The byte-order mark does not occupy a column.
                    self.buffer.skip();
                    self.mark.index += 1;
                }
                ' ' => self.skip(),
                '\t' if self.flow_level > 0 || !self.simple_key_allowed => self.skip(),
                '#' => {
                    while !is_breakz(self.ch()) {
                        self.skip();
                        self.cache(1);
                    }
                }
                _ if is_break(c) => {
                    self.skip_line();
                    if self.flow_level == 0 {
                        self.simple_key_allowed = true;
                    }
                }
                _ => break,
            }
        }
    }

    fn fetch_stream_start(&mut self) {
        let mark = self.mark;
        self.indent = -1;
        self.simple_keys.push(SimpleKey::default());
        self.simple_key_allowed = true;
        self.stream_start_produced = true;
        self.enqueue(Token::at(TokenKind::StreamStart, mark));
    }

    fn fetch_stream_end(&mut self) -> ScanResult<()> {
        // Present the end of the stream as a fresh line.
        if self.mark.column != 0 {
            self.mark.column = 0;
            self.mark.line += 1;
        }
        self.unroll_indent(-1);
        self.remove_simple_key()?;
        self.simple_key_allowed = false;
        self.enqueue(Token::at(TokenKind::StreamEnd, self.mark));
        Ok(())
    }

    fn fetch_directive(&mut self) -> ScanResult<()> {
        self.unroll_indent(-1);
        self.remove_simple_key()?;
        self.simple_key_allowed = false;
        let token = self.scan_directive()?;
        self.enqueue(token);
        Ok(())
    }

    fn fetch_document_indicator(&mut self, kind: TokenKind) -> ScanResult<()> {
        self.unroll_indent(-1);
        self.remove_simple_key()?;
        self.simple_key_allowed = false;
        let start_mark = self.mark;
        self.skip();
        self.skip();
        self.skip();
        self.enqueue(Token::new(kind, start_mark, self.mark));
        Ok(())
    }

    fn fetch_flow_collection_start(&mut self, kind: TokenKind) -> ScanResult<()> {
        // '[' and '{' may themselves be part of a simple key: `[a]: b`.
        self.save_simple_key()?;
        self.increase_flow_level();
        self.simple_key_allowed = true;
        let start_mark = self.mark;
        self.skip();
        self.enqueue(Token::new(kind, start_mark, self.mark));
        Ok(())
    }

    fn fetch_flow_collection_end(&mut self, kind: TokenKind) -> ScanResult<()> {
        self.remove_simple_key()?;
        self.decrease_flow_level();
        self.simple_key_allowed = false;
        let start_mark = self.mark;
        self.skip();
        self.enqueue(Token::new(kind, start_mark, self.mark));
        Ok(())
    }

    fn fetch_flow_entry(&mut self) -> ScanResult<()> {
        self.remove_simple_key()?;
        self.simple_key_allowed = true;
        let start_mark = self.mark;
        self.skip();
        self.enqueue(Token::new(TokenKind::FlowEntry, start_mark, self.mark));
        Ok(())
    }

    fn increase_flow_level(&mut self) {
        self.simple_keys.push(SimpleKey::default());
        self.flow_level += 1;
    }

    fn decrease_flow_level(&mut self) {
        if self.flow_level > 0 {
            self.flow_level -= 1;
            self.simple_keys.pop();
        }
    }

    fn fetch_block_entry(&mut self) -> ScanResult<()> {
        if self.flow_level == 0 {
            if !self.simple_key_allowed {
                return Err(ScanError::new(
                    self.mark,
                    "block sequence entries are not allowed in this context",
                ));
            }
            self.roll_indent(
                self.mark.column,
                None,
                TokenKind::BlockSequenceStart,
                self.mark,
            );
        }
        // In the flow context a '-' entry is grammatically impossible, but
        // the parser can report it with better context than we can.
        self.remove_simple_key()?;
        self.simple_key_allowed = true;
        let start_mark = self.mark;
        self.skip();
        self.enqueue(Token::new(TokenKind::BlockEntry, start_mark, self.mark));
        Ok(())
    }

    fn fetch_key(&mut self) -> ScanResult<()> {
        if self.flow_level == 0 {
            if !self.simple_key_allowed {
                return Err(ScanError::new(
                    self.mark,
                    "mapping keys are not allowed in this context",
                ));
            }
            self.roll_indent(
                self.mark.column,
                None,
                TokenKind::BlockMappingStart,
                self.mark,
            );
        }
        self.remove_simple_key()?;
        self.simple_key_allowed = self.flow_level == 0;
        let start_mark = self.mark;
        self.skip();
        self.enqueue(Token::new(TokenKind::Key, start_mark, self.mark));
        Ok(())
    }

    fn fetch_value(&mut self) -> ScanResult<()> {
        let key = self.simple_keys.last().copied().unwrap_or_default();
        if key.possible {
            // The candidate turned out to be a key after all: back-date a
            // Key token (and, in block context, a BlockMappingStart) to
            // where the candidate began.
            self.insert_token(
                key.token_number - self.tokens_parsed,
                Token::at(TokenKind::Key, key.mark),
            );
            self.roll_indent(
                key.mark.column,
                Some(key.token_number),
                TokenKind::BlockMappingStart,
                key.mark,
            );
            if let Some(slot) = self.simple_keys.last_mut() {
                slot.possible = false;
            }
            self.simple_key_allowed = false;
        } else {
            if self.flow_level == 0 {
                // The ':' follows an explicit '?' key or nothing at all.
                if !self.simple_key_allowed {
                    return Err(ScanError::new(
                        self.mark,
                        "mapping values are not allowed in this context",
                    ));
                }
                self.roll_indent(
                    self.mark.column,
                    None,
                    TokenKind::BlockMappingStart,
                    self.mark,
                );
            }
            self.simple_key_allowed = self.flow_level == 0;
        }
        let start_mark = self.mark;
        self.skip();
        self.enqueue(Token::new(TokenKind::Value, start_mark, self.mark));
        Ok(())
    }

    fn fetch_anchor(&mut self, alias: bool) -> ScanResult<()> {
        self.save_simple_key()?;
        self.simple_key_allowed = false;
        let token = self.scan_anchor(alias)?;
        self.enqueue(token);
        Ok(())
    }

    fn fetch_tag(&mut self) -> ScanResult<()> {
        self.save_simple_key()?;
        self.simple_key_allowed = false;
        let token = self.scan_tag()?;
        self.enqueue(token);
        Ok(())
    }

    fn fetch_block_scalar(&mut self, literal: bool) -> ScanResult<()> {
        self.remove_simple_key()?;
        // A simple key may follow a block scalar.
        self.simple_key_allowed = true;
        let token = self.scan_block_scalar(literal)?;
        self.enqueue(token);
        Ok(())
    }

    fn fetch_flow_scalar(&mut self, single: bool) -> ScanResult<()> {
        self.save_simple_key()?;
        self.simple_key_allowed = false;
        let token = self.scan_flow_scalar(single)?;
        self.enqueue(token);
        Ok(())
    }

    fn fetch_plain_scalar(&mut self) -> ScanResult<()> {
        self.save_simple_key()?;
        self.simple_key_allowed = false;
        let token = self.scan_plain_scalar()?;
        self.enqueue(token);
        Ok(())
    }

    /// Enter a deeper block collection if `column` is beyond the current
    /// indent. `number` back-dates the synthetic start token behind tokens
    /// already queued; `None` appends it.
    fn roll_indent(&mut self, column: usize, number: Option<usize>, kind: TokenKind, mark: Mark) {
        if self.flow_level > 0 {
            return;
        }
        if self.indent < column as isize {
            self.indents.push(self.indent);
            self.indent = column as isize;
            let token = Token::at(kind, mark);
            match number {
                Some(n) => self.insert_token(n - self.tokens_parsed, token),
                None => self.enqueue(token),
            }
        }
    }

    /// Leave block collections deeper than `column`, one `BlockEnd` each.
    fn unroll_indent(&mut self, column: isize) {
        if self.flow_level > 0 {
            return;
        }
        while self.indent > column {
            self.enqueue(Token::at(TokenKind::BlockEnd, self.mark));
            self.indent = self.indents.pop().unwrap_or(-1);
        }
    }

    /// Record the current position as a simple-key candidate, replacing the
    /// slot for this flow level.
    fn save_simple_key(&mut self) -> ScanResult<()> {
        let required = self.flow_level == 0 && self.indent == self.mark.column as isize;
        if self.simple_key_allowed {
            let key = SimpleKey {
                possible: true,
                required,
                token_number: self.tokens_parsed + self.tokens.len(),
                mark: self.mark,
            };
            self.remove_simple_key()?;
            log::trace!("simple key candidate at {}, token {}", key.mark, key.token_number);
            if let Some(slot) = self.simple_keys.last_mut() {
                *slot = key;
            }
        }
        Ok(())
    }

    /// Drop the candidate on the current flow level. Dropping a required
    /// candidate means its ':' can no longer appear.
    fn remove_simple_key(&mut self) -> ScanResult<()> {
        if let Some(key) = self.simple_keys.last_mut() {
            if key.possible && key.required {
                return Err(ScanError::while_scanning(
                    "a simple key",
                    key.mark,
                    "could not find expected ':'",
                ));
            }
            key.possible = false;
        }
        Ok(())
    }

    fn scan_directive(&mut self) -> ScanResult<Token> {
        let start_mark = self.mark;
        self.skip(); // '%'
        let name = self.scan_directive_name(start_mark)?;
        let kind = match name.as_str() {
            "YAML" => self.scan_version_directive_value(start_mark)?,
            "TAG" => self.scan_tag_directive_value(start_mark)?,
            _ => {
                return Err(ScanError::while_scanning(
                    "a directive",
                    start_mark,
                    "found unknown directive name",
                ));
            }
        };
        let end_mark = self.mark;

        // Eat the rest of the line: blanks, an optional comment, the break.
        self.cache(1);
        while is_blank(self.ch()) {
            self.skip();
            self.cache(1);
        }
        if self.ch() == '#' {
            while !is_breakz(self.ch()) {
                self.skip();
                self.cache(1);
            }
        }
        if !is_breakz(self.ch()) {
            return Err(ScanError::while_scanning(
                "a directive",
                start_mark,
                "did not find expected comment or line break",
            ));
        }
        if is_break(self.ch()) {
            self.skip_line();
        }
        Ok(Token::new(kind, start_mark, end_mark))
    }

    fn scan_directive_name(&mut self, start_mark: Mark) -> ScanResult<String> {
        let mut name = String::new();
        self.cache(1);
        while is_alpha(self.ch()) {
            name.push(self.ch());
            self.skip();
            self.cache(1);
        }
        if name.is_empty() {
            return Err(ScanError::while_scanning(
                "a directive",
                start_mark,
                "could not find expected directive name",
            ));
        }
        if !is_blankz(self.ch()) {
            return Err(ScanError::while_scanning(
                "a directive",
                start_mark,
                "found unexpected non-alphabetical character",
            ));
        }
        Ok(name)
    }

    fn scan_version_directive_value(&mut self, start_mark: Mark) -> ScanResult<TokenKind> {
        self.cache(1);
        while is_blank(self.ch()) {
            self.skip();
            self.cache(1);
        }
        let major = self.scan_version_directive_number(start_mark)?;
        if self.ch() != '.' {
            return Err(ScanError::while_scanning(
                "a %YAML directive",
                start_mark,
                "did not find expected digit or '.' character",
            ));
        }
        self.skip();
        let minor = self.scan_version_directive_number(start_mark)?;
        Ok(TokenKind::VersionDirective { major, minor })
    }

    fn scan_version_directive_number(&mut self, start_mark: Mark) -> ScanResult<u32> {
        const MAX_NUMBER_LENGTH: usize = 9;
        let mut value: u32 = 0;
        let mut length: usize = 0;
        self.cache(1);
        while self.ch().is_ascii_digit() {
            length += 1;
            if length > MAX_NUMBER_LENGTH {
                return Err(ScanError::while_scanning(
                    "a %YAML directive",
                    start_mark,
                    "found extremely long version number",
                ));
            }
            value = value * 10 + (self.ch() as u32 - '0' as u32);
            self.skip();
            self.cache(1);
        }
        if length == 0 {
            return Err(ScanError::while_scanning(
                "a %YAML directive",
                start_mark,
                "did not find expected version number",
            ));
        }
        Ok(value)
    }

    fn scan_tag_directive_value(&mut self, start_mark: Mark) -> ScanResult<TokenKind> {
        self.cache(1);
        while is_blank(self.ch()) {
            self.skip();
            self.cache(1);
        }
        let handle = self.scan_tag_handle(true, start_mark)?;
        self.cache(1);
        if !is_blank(self.ch()) {
            return Err(ScanError::while_scanning(
                "a %TAG directive",
                start_mark,
                "did not find expected whitespace",
            ));
        }
        while is_blank(self.ch()) {
            self.skip();
            self.cache(1);
        }
        let prefix = self.scan_tag_uri(true, false, "", start_mark)?;
        self.cache(1);
        if !is_blankz(self.ch()) {
            return Err(ScanError::while_scanning(
                "a %TAG directive",
                start_mark,
                "did not find expected whitespace or line break",
            ));
        }
        Ok(TokenKind::TagDirective { handle, prefix })
    }

    fn scan_anchor(&mut self, alias: bool) -> ScanResult<Token> {
        let what = if alias { "an alias" } else { "an anchor" };
        let start_mark = self.mark;
        self.skip(); // '*' or '&'
        let mut name = String::new();
        self.cache(1);
        while is_alpha(self.ch()) {
            name.push(self.ch());
            self.skip();
            self.cache(1);
        }
        let end_ok = is_blankz(self.ch())
            || matches!(self.ch(), '?' | ':' | ',' | ']' | '}' | '%' | '@' | '`');
        if name.is_empty() || !end_ok {
            return Err(ScanError::while_scanning(
                what,
                start_mark,
                "did not find expected alphabetic or numeric character",
            ));
        }
        let kind = if alias {
            TokenKind::AnchorAlias(name)
        } else {
            TokenKind::Anchor(name)
        };
        Ok(Token::new(kind, start_mark, self.mark))
    }

    fn scan_tag(&mut self) -> ScanResult<Token> {
        let start_mark = self.mark;
        self.cache(2);

        let (handle, suffix) = if self.buffer.peek(1) == '<' {
            // Verbatim tag: '!<' uri '>'.
            self.skip();
            self.skip();
            let suffix = self.scan_tag_uri(false, false, "", start_mark)?;
            if self.ch() != '>' {
                return Err(ScanError::while_scanning(
                    "a tag",
                    start_mark,
                    "did not find the expected '>'",
                ));
            }
            self.skip();
            (String::new(), suffix)
        } else {
            let first = self.scan_tag_handle(false, start_mark)?;
            if first.len() > 1 && first.starts_with('!') && first.ends_with('!') {
                // A true '!handle!' form; the suffix follows.
                let suffix = self.scan_tag_uri(false, false, "", start_mark)?;
                (first, suffix)
            } else {
                // Not a handle: the first segment is part of the suffix.
                let suffix = self.scan_tag_uri(false, true, &first, start_mark)?;
                if suffix.is_empty() {
                    // The non-specific '!' tag.
                    (String::new(), "!".to_owned())
                } else {
                    ("!".to_owned(), suffix)
                }
            }
        };

        self.cache(1);
        if !is_blankz(self.ch()) {
            return Err(ScanError::while_scanning(
                "a tag",
                start_mark,
                "did not find expected whitespace or line break",
            ));
        }
        Ok(Token::new(
            TokenKind::Tag { handle, suffix },
            start_mark,
            self.mark,
        ))
    }

    /// Scan a tag handle: `!`, `!!`, or `!name!`. In directive mode a bare
    /// `!name` (no closing `!`) is rejected.
    fn scan_tag_handle(&mut self, directive: bool, start_mark: Mark) -> ScanResult<String> {
        let what = if directive { "a %TAG directive" } else { "a tag" };
        self.cache(1);
        if self.ch() != '!' {
            return Err(ScanError::while_scanning(
                what,
                start_mark,
                "did not find expected '!'",
            ));
        }
        let mut handle = String::from("!");
        self.skip();
        self.cache(1);
        while is_alpha(self.ch()) {
            handle.push(self.ch());
            self.skip();
            self.cache(1);
        }
        if self.ch() == '!' {
            handle.push('!');
            self.skip();
        } else if directive && handle != "!" {
            return Err(ScanError::while_scanning(
                what,
                start_mark,
                "did not find expected '!'",
            ));
        }
        Ok(handle)
    }

    /// Scan a run of URI characters, decoding `%XX` escapes. `head` is a
    /// previously consumed segment whose leading `!` is not part of the
    /// URI.
    fn scan_tag_uri(
        &mut self,
        directive: bool,
        allow_empty: bool,
        head: &str,
        start_mark: Mark,
    ) -> ScanResult<String> {
        let what = if directive { "a %TAG directive" } else { "a tag" };
        let mut uri = if head.len() > 1 {
            head[1..].to_owned()
        } else {
            String::new()
        };
        self.cache(1);
        while is_uri_char(self.ch()) {
            if self.ch() == '%' {
                let c = self.scan_uri_escapes(what, start_mark)?;
                uri.push(c);
            } else {
                uri.push(self.ch());
                self.skip();
            }
            self.cache(1);
        }
        if uri.is_empty() && !allow_empty {
            return Err(ScanError::while_scanning(
                what,
                start_mark,
                "did not find expected tag URI",
            ));
        }
        Ok(uri)
    }

    /// Decode one `%XX`-escaped UTF-8 sequence into a character. The
    /// leading octet fixes the sequence length (1-4).
    fn scan_uri_escapes(&mut self, what: &str, start_mark: Mark) -> ScanResult<char> {
        let mut width: usize = 0;
        let mut code_point: u32 = 0;
        loop {
            self.cache(3);
            if !(self.ch() == '%'
                && self.buffer.peek(1).is_ascii_hexdigit()
                && self.buffer.peek(2).is_ascii_hexdigit())
            {
                return Err(ScanError::while_scanning(
                    what,
                    start_mark,
                    "did not find URI escaped octet",
                ));
            }
            let octet = (as_hex(self.buffer.peek(1)) << 4) + as_hex(self.buffer.peek(2));
            if width == 0 {
                (width, code_point) = match octet {
                    0x00..=0x7F => (1, octet),
                    0xC0..=0xDF => (2, octet & 0x1F),
                    0xE0..=0xEF => (3, octet & 0x0F),
                    0xF0..=0xF7 => (4, octet & 0x07),
                    _ => {
                        return Err(ScanError::while_scanning(
                            what,
                            start_mark,
                            "found an incorrect leading UTF-8 octet",
                        ));
                    }
                };
            } else {
                if octet & 0xC0 != 0x80 {
                    return Err(ScanError::while_scanning(
                        what,
                        start_mark,
                        "found an incorrect trailing UTF-8 octet",
                    ));
                }
                code_point = (code_point << 6) + (octet & 0x3F);
            }
            self.skip();
            self.skip();
            self.skip();
            width -= 1;
            if width == 0 {
                break;
            }
        }
        char::from_u32(code_point).ok_or_else(|| {
            ScanError::while_scanning(what, start_mark, "found an invalid Unicode character escape")
        })
    }

    fn scan_block_scalar(&mut self, literal: bool) -> ScanResult<Token> {
        let start_mark = self.mark;
        self.skip(); // '|' or '>'

        // Header: chomping and explicit indentation, in either order.
        let mut chomping = Chomping::Clip;
        let mut increment: usize = 0;
        self.cache(1);
        if matches!(self.ch(), '+' | '-') {
            chomping = if self.ch() == '+' {
                Chomping::Keep
            } else {
                Chomping::Strip
            };
            self.skip();
            self.cache(1);
            if self.ch().is_ascii_digit() {
                increment = self.scan_block_scalar_increment(start_mark)?;
            }
        } else if self.ch().is_ascii_digit() {
            increment = self.scan_block_scalar_increment(start_mark)?;
            self.cache(1);
            if matches!(self.ch(), '+' | '-') {
                chomping = if self.ch() == '+' {
                    Chomping::Keep
                } else {
                    Chomping::Strip
                };
                self.skip();
            }
        }

        // The rest of the header line: blanks, optional comment, a break.
        self.cache(1);
        while is_blank(self.ch()) {
            self.skip();
            self.cache(1);
        }
        if self.ch() == '#' {
            while !is_breakz(self.ch()) {
                self.skip();
                self.cache(1);
            }
        }
        if !is_breakz(self.ch()) {
            return Err(ScanError::while_scanning(
                "a block scalar",
                start_mark,
                "did not find expected comment or line break",
            ));
        }
        if is_break(self.ch()) {
            self.skip_line();
        }
        let mut end_mark = self.mark;

        let mut indent: usize = 0;
        if increment > 0 {
            indent = if self.indent >= 0 {
                self.indent as usize + increment
            } else {
                increment
            };
        }

        let mut string = String::new();
        let mut leading_break = String::new();
        let mut trailing_breaks = String::new();
        let mut leading_blank = false;

        self.scan_block_scalar_breaks(&mut indent, &mut trailing_breaks, start_mark, &mut end_mark)?;

        self.cache(1);
        while self.mark.column == indent && !is_nul(self.ch()) {
            // At the start of a non-empty content line.
            let trailing_blank = is_blank(self.ch());
            if !literal && leading_break.starts_with('\n') && !leading_blank && !trailing_blank {
                // Fold a single break between non-blank lines; blank lines
                // are carried over verbatim instead.
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
                string.push(self.ch());
                self.skip();
                self.cache(1);
            }
            if is_break(self.ch()) {
                self.read_break(&mut leading_break);
            }
            self.scan_block_scalar_breaks(
                &mut indent,
                &mut trailing_breaks,
                start_mark,
                &mut end_mark,
            )?;
            self.cache(1);
        }

        // Chomp the tail.
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
            start_mark,
            end_mark,
        ))
    }

    fn scan_block_scalar_increment(&mut self, start_mark: Mark) -> ScanResult<usize> {
        if self.ch() == '0' {
            return Err(ScanError::while_scanning(
                "a block scalar",
                start_mark,
                "found an indentation indicator equal to 0",
            ));
        }
        let increment = self.ch() as usize - '0' as usize;
        self.skip();
        Ok(increment)
    }

    /// Eat indentation spaces and line breaks between content lines. While
    /// `indent` is still undetermined (0), track the deepest column seen
    /// and settle on `max(deepest, parent + 1, 1)` afterwards.
    fn scan_block_scalar_breaks(
        &mut self,
        indent: &mut usize,
        breaks: &mut String,
        start_mark: Mark,
        end_mark: &mut Mark,
    ) -> ScanResult<()> {
        let mut max_indent: usize = 0;
        *end_mark = self.mark;
        loop {
            self.cache(1);
            while (*indent == 0 || self.mark.column < *indent) && self.ch() == ' ' {
                self.skip();
                self.cache(1);
            }
            if self.mark.column > max_indent {
                max_indent = self.mark.column;
            }
            if (*indent == 0 || self.mark.column < *indent) && self.ch() == '\t' {
                return Err(ScanError::while_scanning(
                    "a block scalar",
                    start_mark,
                    "found a tab character where an indentation space is expected",
                ));
            }
            if !is_break(self.ch()) {
                break;
            }
            self.read_break(breaks);
            *end_mark = self.mark;
        }
        if *indent == 0 {
            *indent = max_indent.max((self.indent + 1).max(1) as usize);
        }
        Ok(())
    }

    fn scan_flow_scalar(&mut self, single: bool) -> ScanResult<Token> {
        let what = if single {
            "a single-quoted scalar"
        } else {
            "a double-quoted scalar"
        };
        let quote = if single { '\'' } else { '"' };
        let start_mark = self.mark;
        self.skip(); // the opening quote

        let mut string = String::new();
        let mut leading_break = String::new();
        let mut trailing_breaks = String::new();
        let mut whitespaces = String::new();

        loop {
            self.cache(4);
            if self.mark.column == 0
                && (self.next_is_document_indicator('-') || self.next_is_document_indicator('.'))
            {
                return Err(ScanError::while_scanning(
                    what,
                    start_mark,
                    "found unexpected document indicator",
                ));
            }
            if is_nul(self.ch()) {
                return Err(ScanError::while_scanning(
                    what,
                    start_mark,
                    "found unexpected end of stream",
                ));
            }

            let mut leading_blanks = false;
            self.cache(2);
            while !is_blankz(self.ch()) {
                if single && self.ch() == '\'' && self.buffer.peek(1) == '\'' {
                    // '' is a quoted apostrophe.
                    string.push('\'');
                    self.skip();
                    self.skip();
                } else if self.ch() == quote {
                    break;
                } else if !single && self.ch() == '\\' && is_break(self.buffer.peek(1)) {
                    // Escaped break: swallow it, then eat the indentation.
                    self.skip();
                    self.skip_line();
                    leading_blanks = true;
                    break;
                } else if !single && self.ch() == '\\' {
                    self.scan_double_quoted_escape(start_mark, &mut string)?;
                } else {
                    string.push(self.ch());
                    self.skip();
                }
                self.cache(2);
            }

            self.cache(1);
            if self.ch() == quote {
                break;
            }

            self.cache(1);
            while is_blank(self.ch()) || is_break(self.ch()) {
                if is_blank(self.ch()) {
                    // Blanks after a break are indentation, not content.
                    if leading_blanks {
                        self.skip();
                    } else {
                        whitespaces.push(self.ch());
                        self.skip();
                    }
                } else if !leading_blanks {
                    whitespaces.clear();
                    self.read_break(&mut leading_break);
                    leading_blanks = true;
                } else {
                    self.read_break(&mut trailing_breaks);
                }
                self.cache(1);
            }

            if leading_blanks {
                if leading_break.starts_with('\n') {
                    // A single break folds to a space; a run of blank
                    // lines is kept as the blank lines themselves.
                    if trailing_breaks.is_empty() {
                        string.push(' ');
                    } else {
                        string.push_str(&trailing_breaks);
                        trailing_breaks.clear();
                    }
                } else {
                    string.push_str(&leading_break);
                    string.push_str(&trailing_breaks);
                    trailing_breaks.clear();
                }
                leading_break.clear();
            } else {
                string.push_str(&whitespaces);
                whitespaces.clear();
            }
        }

        self.skip(); // the closing quote
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
            start_mark,
            self.mark,
        ))
    }

    /// Decode one backslash escape of a double-quoted scalar into `out`.
    /// The cursor sits on the backslash.
    fn scan_double_quoted_escape(&mut self, start_mark: Mark, out: &mut String) -> ScanResult<()> {
        let mut code_length: usize = 0;
        self.cache(2);
        match self.buffer.peek(1) {
            '0' => out.push('\0'),
            'a' => out.push('\x07'),
            'b' => out.push('\x08'),
            't' | '\t' => out.push('\t'),
            'n' => out.push('\n'),
            'v' => out.push('\x0B'),
            'f' => out.push('\x0C'),
            'r' => out.push('\r'),
            'e' => out.push('\x1B'),
            ' ' => out.push(' '),
            '"' => out.push('"'),
            '\'' => out.push('\''),
            '\\' => out.push('\\'),
            'N' => out.push('\u{0085}'),
            '_' => out.push('\u{00A0}'),
            'L' => out.push('\u{2028}'),
            'P' => out.push('\u{2029}'),
            'x' => code_length = 2,
            'u' => code_length = 4,
            'U' => code_length = 8,
            _ => {
                return Err(ScanError::while_scanning(
                    "a double-quoted scalar",
                    start_mark,
                    "found unknown escape character",
                ));
            }
        }
        self.skip();
        self.skip();

        if code_length > 0 {
            self.cache(code_length);
            let mut value: u32 = 0;
            for k in 0..code_length {
                let c = self.buffer.peek(k);
                if !c.is_ascii_hexdigit() {
                    return Err(ScanError::while_scanning(
                        "a double-quoted scalar",
                        start_mark,
                        "did not find expected hexadecimal number",
                    ));
                }
                value = (value << 4) + as_hex(c);
            }
            let c = char::from_u32(value).ok_or_else(|| {
                ScanError::while_scanning(
                    "a double-quoted scalar",
                    start_mark,
                    "found invalid Unicode character escape code",
                )
            })?;
            out.push(c);
            for _ in 0..code_length {
                self.skip();
            }
        }
        Ok(())
    }

    fn scan_plain_scalar(&mut self) -> ScanResult<Token> {
        let indent = self.indent + 1;
        let start_mark = self.mark;
        let mut end_mark = self.mark;

        let mut string = String::new();
        let mut leading_break = String::new();
        let mut trailing_breaks = String::new();
        let mut whitespaces = String::new();
        let mut leading_blanks = false;

        loop {
            self.cache(4);
            if self.mark.column == 0
                && (self.next_is_document_indicator('-') || self.next_is_document_indicator('.'))
            {
                break;
            }
            if self.ch() == '#' {
                break;
            }

            while !is_blankz(self.ch()) {
                // An un-delimited ':' in flow context cannot be part of the
                // scalar, and cannot start a value either.
                if self.flow_level > 0
                    && self.ch() == ':'
                    && !is_blankz(self.buffer.peek(1))
                {
                    return Err(ScanError::while_scanning(
                        "a plain scalar",
                        start_mark,
                        "found unexpected ':'",
                    ));
                }
                if self.ch() == ':' && is_blankz(self.buffer.peek(1)) {
                    break;
                }
                if self.flow_level > 0
                    && matches!(self.ch(), ',' | ':' | '?' | '[' | ']' | '{' | '}')
                {
                    break;
                }

                if leading_blanks || !whitespaces.is_empty() {
                    if leading_blanks {
                        if leading_break.starts_with('\n') {
                            if trailing_breaks.is_empty() {
                                string.push(' ');
                            } else {
                                string.push_str(&trailing_breaks);
                                trailing_breaks.clear();
                            }
                        } else {
                            string.push_str(&leading_break);
                            string.push_str(&trailing_breaks);
                            trailing_breaks.clear();
                        }
                        leading_break.clear();
                        leading_blanks = false;
                    } else {
                        string.push_str(&whitespaces);
                        whitespaces.clear();
                    }
                }

                string.push(self.ch());
                self.skip();
                end_mark = self.mark;
                self.cache(2);
            }

            if !(is_blank(self.ch()) || is_break(self.ch())) {
                break;
            }

            self.cache(1);
            while is_blank(self.ch()) || is_break(self.ch()) {
                if is_blank(self.ch()) {
                    if leading_blanks
                        && (self.mark.column as isize) < indent
                        && self.ch() == '\t'
                    {
                        return Err(ScanError::while_scanning(
                            "a plain scalar",
                            start_mark,
                            "found a tab character that violates indentation",
                        ));
                    }
                    if leading_blanks {
                        self.skip();
                    } else {
                        whitespaces.push(self.ch());
                        self.skip();
                    }
                } else if !leading_blanks {
                    whitespaces.clear();
                    self.read_break(&mut leading_break);
                    leading_blanks = true;
                } else {
                    self.read_break(&mut trailing_breaks);
                }
                self.cache(1);
            }

            if self.flow_level == 0 && (self.mark.column as isize) < indent {
                break;
            }
        }

        // A multi-line plain scalar ends a line, so a simple key may follow.
        if leading_blanks {
            self.simple_key_allowed = true;
        }

        Ok(Token::new(
            TokenKind::Scalar {
                value: string,
                style: ScalarStyle::Plain,
            },
            start_mark,
            end_mark,
        ))
    }

    /// `---` or `...` at the cursor, followed by a blank, break, or the end
    /// of input. Assumes 4 characters are cached.
    fn next_is_document_indicator(&self, c: char) -> bool {
        self.buffer.peek(0) == c
            && self.buffer.peek(1) == c
            && self.buffer.peek(2) == c
            && is_blankz(self.buffer.peek(3))
    }

    fn ch(&self) -> char {
        self.buffer.peek(0)
    }

    fn cache(&mut self, count: usize) {
        self.buffer.cache(count);
    }

    /// Consume one non-break character.
    fn skip(&mut self) {
        self.buffer.skip();
        self.mark.index += 1;
        self.mark.column += 1;
    }

    /// Consume one line break, collapsing CR+LF into a single break.
    fn skip_line(&mut self) {
        self.cache(2);
        if self.ch() == '\r' && self.buffer.peek(1) == '\n' {
            self.buffer.skip();
            self.buffer.skip();
            self.mark.index += 2;
        } else {
            self.buffer.skip();
            self.mark.index += 1;
        }
        self.mark.line += 1;
        self.mark.column = 0;
    }

    /// Consume one line break and record it. CR, CR+LF, and NEL normalize
    /// to LF; LS and PS keep their identity.
    fn read_break(&mut self, out: &mut String) {
        let c = self.ch();
        if c == '\u{2028}' || c == '\u{2029}' {
            out.push(c);
        } else {
            out.push('\n');
        }
        self.skip_line();
    }

    fn enqueue(&mut self, token: Token) {
        log::trace!("token enqueued: {} at {}", token.kind, token.start);
        self.tokens.enqueue(token);
    }

    fn insert_token(&mut self, ahead: usize, token: Token) {
        log::trace!(
            "token inserted {} ahead of {} queued: {}",
            ahead,
            self.tokens.len(),
            token.kind
        );
        self.tokens.insert(ahead, token);
    }
}

impl<I: Iterator<Item = char>> Iterator for Scanner<I> {
    type Item = ScanResult<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.move_next() {
            Ok(true) => self.consume_current().map(Ok),
            Ok(false) => None,
            Err(error) => {
                if self.error_yielded {
                    None
                } else {
                    self.error_yielded = true;
                    Some(Err(error))
                }
            }
        }
    }
}
