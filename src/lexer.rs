//! Lexical analysis (tokenization) of a single input line.
//!
//! The lexer knows about whitespace and quotes only. Redirection operators
//! are ordinary words at this stage; the [`crate::parser`] decides which
//! words are operators, using [`Token::quoted`] to leave quoted ones alone.

/// A single word of the input line with its quotes removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Text of the word, quote characters stripped.
    pub text: String,
    /// True when any fragment of the word came from inside quotes.
    pub quoted: bool,
}

impl Token {
    /// An unquoted word.
    pub fn bare(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            quoted: false,
        }
    }

    /// A word that contained at least one quoted fragment.
    pub fn quoted(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            quoted: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexingState {
    Start,
    ReadingWord,
    ReadingSingleQuote,
    ReadingDoubleQuote,
}

struct LexingFSM<'a> {
    input: std::str::Chars<'a>,
    state: LexingState,
    buffer: String,
    quoted: bool,
}

impl<'a> LexingFSM<'a> {
    fn new(line: &'a str) -> Self {
        LexingFSM {
            input: line.chars(),
            state: LexingState::Start,
            buffer: String::new(),
            quoted: false,
        }
    }

    /// Runs the machine over the whole line.
    ///
    /// An unterminated quote is not an error: whatever follows the opening
    /// quote, up to the end of the line, belongs to the current word.
    fn make_tokens(mut self) -> Vec<Token> {
        let mut out = Vec::new();

        while let Some(ch) = self.input.next() {
            match self.state {
                LexingState::Start => self.handle_start(ch),
                LexingState::ReadingWord => self.handle_word(ch, &mut out),
                LexingState::ReadingSingleQuote => self.handle_quoted(ch, '\''),
                LexingState::ReadingDoubleQuote => self.handle_quoted(ch, '"'),
            }
        }

        if self.state != LexingState::Start {
            self.finish_word(&mut out);
        }
        out
    }

    fn handle_start(&mut self, ch: char) {
        match ch {
            c if is_separator(c) => {}
            '\'' => self.open_quote(LexingState::ReadingSingleQuote),
            '"' => self.open_quote(LexingState::ReadingDoubleQuote),
            c => {
                self.buffer.push(c);
                self.state = LexingState::ReadingWord;
            }
        }
    }

    fn handle_word(&mut self, ch: char, out: &mut Vec<Token>) {
        match ch {
            c if is_separator(c) => self.finish_word(out),
            '\'' => self.open_quote(LexingState::ReadingSingleQuote),
            '"' => self.open_quote(LexingState::ReadingDoubleQuote),
            c => self.buffer.push(c),
        }
    }

    fn handle_quoted(&mut self, ch: char, closing: char) {
        if ch == closing {
            self.state = LexingState::ReadingWord;
        } else {
            self.buffer.push(ch);
        }
    }

    fn open_quote(&mut self, state: LexingState) {
        self.quoted = true;
        self.state = state;
    }

    fn finish_word(&mut self, out: &mut Vec<Token>) {
        out.push(Token {
            text: std::mem::take(&mut self.buffer),
            quoted: std::mem::take(&mut self.quoted),
        });
        self.state = LexingState::Start;
    }
}

/// Split `line` into words, honoring single and double quotes.
///
/// Adjacent fragments are glued together, so `foo"bar baz"` is the single
/// word `foobar baz`. Whitespace outside quotes separates words and is never
/// part of one. Empty input produces no tokens.
pub fn split_into_tokens(line: &str) -> Vec<Token> {
    LexingFSM::new(line).make_tokens()
}

/// Only ASCII blanks split words; other Unicode spaces are ordinary characters.
fn is_separator(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r')
}
