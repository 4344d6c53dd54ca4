//! Streaming tokenizer for the package-definition subset of Emacs Lisp.
//!
//! The tokenizer pulls bytes from any [`Read`] on demand and hands out one
//! [`Token`] at a time, so a `-pkg.el` file is never buffered in full and a
//! parser that gives up early stops the reading as well.
//!
//! Reader macros are expanded on the fly: `'x` is produced as the token
//! sequence for `(quote x)`, which lets the parser treat both spellings as
//! one grammar.

use std::collections::VecDeque;
use std::fmt;
use std::io::{self, Bytes, Read};

// ============================================================================
// Tokens
// ============================================================================

/// Lexical category of a [`Token`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    OpenParen,
    CloseParen,
    /// Bare symbol, already folded to lowercase
    Symbol,
    /// String literal with escapes resolved
    String,
    EndOfInput,
}

/// A single lexical token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    /// Byte offset where the token starts
    pub offset: u64,
}

impl Token {
    fn new(kind: TokenKind, text: impl Into<String>, offset: u64) -> Self {
        Self {
            kind,
            text: text.into(),
            offset,
        }
    }

    /// Returns `true` if this is the symbol `name` (compared after folding).
    pub fn is_symbol(&self, name: &str) -> bool {
        self.kind == TokenKind::Symbol && self.text == name
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::OpenParen => write!(f, "'('"),
            TokenKind::CloseParen => write!(f, "')'"),
            TokenKind::Symbol => write!(f, "symbol `{}`", self.text),
            TokenKind::String => write!(f, "string {:?}", self.text),
            TokenKind::EndOfInput => write!(f, "end of input"),
        }
    }
}

/// A token that was cut short by the end of the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Truncation {
    pub fragment: &'static str,
    pub offset: u64,
}

// ============================================================================
// Tokenizer
// ============================================================================

/// Pull-based tokenizer over a byte stream.
///
/// Call [`Tokenizer::next_token`] (or iterate) to advance. Once the input is
/// exhausted, or the reader fails, a single [`TokenKind::EndOfInput`] is
/// produced; `next_token` keeps returning it afterwards while the iterator
/// stops. A read error is kept for the driver, see
/// [`Tokenizer::take_io_error`].
///
/// The tokenizer does no grammar validation. Bytes that cannot start a token
/// (digits, operators, whitespace) are skipped.
pub struct Tokenizer<R> {
    bytes: Bytes<R>,
    /// Number of bytes consumed so far
    position: u64,
    peeked: Option<u8>,
    exhausted: bool,
    /// Count of open parentheses read from the input
    depth: usize,
    /// Depths at which a `'` was read and whose closing `)` is still owed
    pending_quotes: Vec<usize>,
    queued: VecDeque<Token>,
    end_emitted: bool,
    truncated: Option<Truncation>,
    io_error: Option<io::Error>,
}

impl<R: Read> Tokenizer<R> {
    /// Creates a tokenizer reading from `reader`.
    ///
    /// Bytes are pulled one at a time, so pass a buffered reader.
    pub fn new(reader: R) -> Self {
        Self {
            bytes: reader.bytes(),
            position: 0,
            peeked: None,
            exhausted: false,
            depth: 0,
            pending_quotes: Vec::new(),
            queued: VecDeque::new(),
            end_emitted: false,
            truncated: None,
            io_error: None,
        }
    }

    /// Produces the next token.
    pub fn next_token(&mut self) -> Token {
        if let Some(token) = self.queued.pop_front() {
            return token;
        }

        loop {
            let Some(byte) = self.bump() else {
                return self.end_of_input();
            };
            let start = self.position - 1;

            match byte {
                b'\'' => {
                    self.pending_quotes.push(self.depth);
                    self.queued
                        .push_back(Token::new(TokenKind::Symbol, "quote", start));
                    return Token::new(TokenKind::OpenParen, "(", start);
                }
                b'(' => {
                    self.depth += 1;
                    return Token::new(TokenKind::OpenParen, "(", start);
                }
                b')' => {
                    self.depth = self.depth.saturating_sub(1);
                    self.close_finished_quotes(start);
                    return Token::new(TokenKind::CloseParen, ")", start);
                }
                b';' => self.skip_comment(),
                b'"' => {
                    let Some(token) = self.read_string(start) else {
                        return self.end_of_input();
                    };
                    self.close_finished_quotes(start);
                    return token;
                }
                b if b.is_ascii_alphabetic() || b == b'-' => {
                    let token = self.read_symbol(b, start);
                    self.close_finished_quotes(start);
                    return token;
                }
                _ => {}
            }
        }
    }

    /// The token that was cut short by end of input, if any.
    pub fn truncated(&self) -> Option<Truncation> {
        self.truncated
    }

    /// Takes the read error that ended the token stream, if any.
    pub fn take_io_error(&mut self) -> Option<io::Error> {
        self.io_error.take()
    }

    fn bump(&mut self) -> Option<u8> {
        if let Some(byte) = self.peeked.take() {
            self.position += 1;
            return Some(byte);
        }
        if self.exhausted {
            return None;
        }
        match self.bytes.next() {
            Some(Ok(byte)) => {
                self.position += 1;
                Some(byte)
            }
            Some(Err(e)) => {
                self.exhausted = true;
                self.io_error = Some(e);
                None
            }
            None => {
                self.exhausted = true;
                None
            }
        }
    }

    fn unread(&mut self, byte: u8) {
        self.peeked = Some(byte);
        self.position -= 1;
    }

    fn end_of_input(&mut self) -> Token {
        self.exhausted = true;
        Token::new(TokenKind::EndOfInput, "", self.position)
    }

    // A quoted list owes its `)` once depth drops back to where the quote
    // was read. A quoted atom owes it right away, the atom having been read
    // at that same depth.
    fn close_finished_quotes(&mut self, offset: u64) {
        while self.pending_quotes.last() == Some(&self.depth) {
            self.pending_quotes.pop();
            self.queued
                .push_back(Token::new(TokenKind::CloseParen, ")", offset));
        }
    }

    fn skip_comment(&mut self) {
        while let Some(byte) = self.bump() {
            if byte == b'\n' {
                break;
            }
        }
    }

    fn read_string(&mut self, start: u64) -> Option<Token> {
        let mut buf = Vec::new();
        loop {
            match self.bump() {
                Some(b'"') => break,
                // The escaped byte is taken verbatim, `\n` is just `n`.
                Some(b'\\') => match self.bump() {
                    Some(escaped) => buf.push(escaped),
                    None => return self.truncate("string", start),
                },
                Some(other) => buf.push(other),
                None => return self.truncate("string", start),
            }
        }
        Some(Token::new(
            TokenKind::String,
            String::from_utf8_lossy(&buf),
            start,
        ))
    }

    fn truncate(&mut self, fragment: &'static str, offset: u64) -> Option<Token> {
        self.truncated = Some(Truncation { fragment, offset });
        None
    }

    fn read_symbol(&mut self, first: u8, start: u64) -> Token {
        let mut buf = vec![first];
        while let Some(byte) = self.bump() {
            match byte {
                b' ' | b'\n' | b'\t' | b'\r' => break,
                b'(' | b')' | b'"' | b'\'' | b';' => {
                    self.unread(byte);
                    break;
                }
                other => buf.push(other),
            }
        }
        Token::new(
            TokenKind::Symbol,
            String::from_utf8_lossy(&buf).to_lowercase(),
            start,
        )
    }
}

impl<R: Read> Iterator for Tokenizer<R> {
    type Item = Token;

    /// Yields tokens up to and including the single `EndOfInput`.
    fn next(&mut self) -> Option<Token> {
        if self.end_emitted {
            return None;
        }
        let token = self.next_token();
        if token.kind == TokenKind::EndOfInput {
            self.end_emitted = true;
        }
        Some(token)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds_and_text(input: &str) -> Vec<(TokenKind, String)> {
        Tokenizer::new(input.as_bytes())
            .map(|t| (t.kind, t.text))
            .collect()
    }

    fn texts(input: &str) -> Vec<String> {
        Tokenizer::new(input.as_bytes())
            .filter(|t| t.kind != TokenKind::EndOfInput)
            .map(|t| t.text)
            .collect()
    }

    /// Reader that hands out its bytes and then fails.
    struct FailingReader {
        data: &'static [u8],
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.data.is_empty() {
                return Err(io::Error::new(io::ErrorKind::ConnectionReset, "upload aborted"));
            }
            let n = buf.len().min(self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    #[test]
    fn test_basic_form() {
        let tokens = kinds_and_text(r#"(define-package "foo" "1.0")"#);
        assert_eq!(
            tokens,
            vec![
                (TokenKind::OpenParen, "(".to_string()),
                (TokenKind::Symbol, "define-package".to_string()),
                (TokenKind::String, "foo".to_string()),
                (TokenKind::String, "1.0".to_string()),
                (TokenKind::CloseParen, ")".to_string()),
                (TokenKind::EndOfInput, String::new()),
            ]
        );
    }

    #[test]
    fn test_symbols_are_case_folded() {
        assert_eq!(texts("(DEFINE-PACKAGE Req1 )"), vec!["(", "define-package", "req1", ")"]);
    }

    #[test]
    fn test_symbol_stops_at_delimiters() {
        assert_eq!(texts("(nil)"), vec!["(", "nil", ")"]);
        assert_eq!(texts("(req1\"1.0\")"), vec!["(", "req1", "1.0", ")"]);
    }

    #[test]
    fn test_quote_expands_like_quote_form() {
        let short = texts(r#"'((req1 "1.0.0") (req2 "2.0.0"))"#);
        let long = texts(r#"(quote ((req1 "1.0.0") (req2 "2.0.0")))"#);
        let upper = texts(r#"(QUOTE ((REQ1 "1.0.0") (REQ2 "2.0.0")))"#);
        assert_eq!(short, long);
        assert_eq!(long, upper);
    }

    #[test]
    fn test_quote_inside_form_closes_before_outer_paren() {
        let tokens = texts(r#"(a '(b) c)"#);
        assert_eq!(tokens, vec!["(", "a", "(", "quote", "(", "b", ")", ")", "c", ")"]);
    }

    #[test]
    fn test_quoted_atoms_and_nested_quotes() {
        assert_eq!(texts("('a b)"), vec!["(", "(", "quote", "a", ")", "b", ")"]);
        assert_eq!(
            texts("''(x)"),
            vec!["(", "quote", "(", "quote", "(", "x", ")", ")", ")"]
        );
    }

    #[test]
    fn test_string_escapes_are_verbatim() {
        let tokens = kinds_and_text(r#""a \"quoted\" \n word""#);
        assert_eq!(tokens[0], (TokenKind::String, r#"a "quoted" n word"#.to_string()));
    }

    #[test]
    fn test_comments_and_stray_bytes_are_skipped() {
        let input = ";; -*- no-byte-compile: t -*-\n(+ 3 3) ; trailing\n";
        assert_eq!(texts(input), vec!["(", ")"]);
    }

    #[test]
    fn test_offsets_point_at_token_start() {
        let tokens: Vec<Token> = Tokenizer::new(&b"  (foo \"x\")"[..]).collect();
        assert_eq!(tokens[0].offset, 2);
        assert_eq!(tokens[1].offset, 3);
        assert_eq!(tokens[2].offset, 7);
        assert_eq!(tokens[3].offset, 10);
        assert_eq!(tokens[4].kind, TokenKind::EndOfInput);
        assert_eq!(tokens[4].offset, 11);
    }

    #[test]
    fn test_end_of_input_emitted_once_by_iterator() {
        let mut tokenizer = Tokenizer::new(&b"(a"[..]);
        let all: Vec<Token> = tokenizer.by_ref().collect();
        assert_eq!(all.len(), 3);
        assert_eq!(all[2].kind, TokenKind::EndOfInput);
        assert!(tokenizer.next().is_none());
        assert_eq!(tokenizer.next_token().kind, TokenKind::EndOfInput);
    }

    #[test]
    fn test_unterminated_string_is_truncation() {
        let mut tokenizer = Tokenizer::new(&b"(foo \"abc"[..]);
        assert_eq!(tokenizer.next_token().kind, TokenKind::OpenParen);
        assert_eq!(tokenizer.next_token().kind, TokenKind::Symbol);
        assert_eq!(tokenizer.next_token().kind, TokenKind::EndOfInput);
        assert_eq!(
            tokenizer.truncated(),
            Some(Truncation {
                fragment: "string",
                offset: 5
            })
        );
    }

    #[test]
    fn test_read_error_ends_stream_and_is_kept() {
        let mut tokenizer = Tokenizer::new(FailingReader { data: b"(foo " });
        let all: Vec<Token> = tokenizer.by_ref().collect();
        assert_eq!(all.last().map(|t| t.kind), Some(TokenKind::EndOfInput));
        let err = tokenizer.take_io_error().expect("read error should be kept");
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
        assert!(tokenizer.take_io_error().is_none());
    }
}
