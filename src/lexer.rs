use std::fmt;
use std::str::Chars;

#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    // Identifiers and keywords
    Identifier(String),
    Keyword(Keyword),

    // Literals
    NumericLiteral(f64),
    StringLiteral(String),
    BooleanLiteral(bool),
    NullLiteral,

    // Template literals carry their cooked text
    NoSubstitutionTemplate(String),
    TemplateHead(String),
    TemplateMiddle(String),
    TemplateTail(String),

    // Punctuators
    LeftBrace,                // {
    RightBrace,               // }
    LeftParen,                // (
    RightParen,               // )
    LeftBracket,              // [
    RightBracket,             // ]
    Dot,                      // .
    Ellipsis,                 // ...
    Semicolon,                // ;
    Comma,                    // ,
    LessThan,                 // <
    GreaterThan,              // >
    LessThanEqual,            // <=
    GreaterThanEqual,         // >=
    Equal,                    // ==
    NotEqual,                 // !=
    StrictEqual,              // ===
    StrictNotEqual,           // !==
    Plus,                     // +
    Minus,                    // -
    Star,                     // *
    Percent,                  // %
    Exponent,                 // **
    Increment,                // ++
    Decrement,                // --
    LeftShift,                // <<
    RightShift,               // >>
    UnsignedRightShift,       // >>>
    Ampersand,                // &
    Pipe,                     // |
    Caret,                    // ^
    Bang,                     // !
    Tilde,                    // ~
    LogicalAnd,               // &&
    LogicalOr,                // ||
    NullishCoalescing,        // ??
    Question,                 // ?
    Colon,                    // :
    Assign,                   // =
    PlusAssign,               // +=
    MinusAssign,              // -=
    StarAssign,               // *=
    PercentAssign,            // %=
    ExponentAssign,           // **=
    LeftShiftAssign,          // <<=
    RightShiftAssign,         // >>=
    UnsignedRightShiftAssign, // >>>=
    AmpersandAssign,          // &=
    PipeAssign,               // |=
    CaretAssign,              // ^=
    LogicalAndAssign,         // &&=
    LogicalOrAssign,          // ||=
    NullishAssign,            // ??=
    Arrow,                    // =>
    Slash,                    // /
    SlashAssign,              // /=

    // Special
    LineTerminator,
    Eof,
}

/// Punctuators ordered so that no entry is preceded by one of its own
/// prefixes.
const PUNCTUATORS: &[(&str, Token)] = &[
    (">>>=", Token::UnsignedRightShiftAssign),
    ("...", Token::Ellipsis),
    ("===", Token::StrictEqual),
    ("!==", Token::StrictNotEqual),
    ("**=", Token::ExponentAssign),
    ("<<=", Token::LeftShiftAssign),
    (">>=", Token::RightShiftAssign),
    (">>>", Token::UnsignedRightShift),
    ("&&=", Token::LogicalAndAssign),
    ("||=", Token::LogicalOrAssign),
    ("??=", Token::NullishAssign),
    ("=>", Token::Arrow),
    ("==", Token::Equal),
    ("!=", Token::NotEqual),
    ("<=", Token::LessThanEqual),
    (">=", Token::GreaterThanEqual),
    ("&&", Token::LogicalAnd),
    ("||", Token::LogicalOr),
    ("??", Token::NullishCoalescing),
    ("++", Token::Increment),
    ("--", Token::Decrement),
    ("+=", Token::PlusAssign),
    ("-=", Token::MinusAssign),
    ("*=", Token::StarAssign),
    ("/=", Token::SlashAssign),
    ("%=", Token::PercentAssign),
    ("&=", Token::AmpersandAssign),
    ("|=", Token::PipeAssign),
    ("^=", Token::CaretAssign),
    ("**", Token::Exponent),
    ("<<", Token::LeftShift),
    (">>", Token::RightShift),
    ("{", Token::LeftBrace),
    ("}", Token::RightBrace),
    ("(", Token::LeftParen),
    (")", Token::RightParen),
    ("[", Token::LeftBracket),
    ("]", Token::RightBracket),
    (".", Token::Dot),
    (";", Token::Semicolon),
    (",", Token::Comma),
    (":", Token::Colon),
    ("?", Token::Question),
    ("~", Token::Tilde),
    ("<", Token::LessThan),
    (">", Token::GreaterThan),
    ("=", Token::Assign),
    ("!", Token::Bang),
    ("+", Token::Plus),
    ("-", Token::Minus),
    ("*", Token::Star),
    ("/", Token::Slash),
    ("%", Token::Percent),
    ("&", Token::Ampersand),
    ("|", Token::Pipe),
    ("^", Token::Caret),
];

/// Reserved words. `when` and `of` are contextual and lex as plain
/// identifiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Keyword {
    Break,
    Case,
    Catch,
    Class,
    Const,
    Continue,
    Default,
    Delete,
    Do,
    Else,
    Extends,
    Finally,
    For,
    Function,
    If,
    In,
    Instanceof,
    Let,
    New,
    Return,
    Static,
    Super,
    Switch,
    This,
    Throw,
    Try,
    Typeof,
    Var,
    Void,
    While,
}

const KEYWORDS: &[(&str, Keyword)] = &[
    ("break", Keyword::Break),
    ("case", Keyword::Case),
    ("catch", Keyword::Catch),
    ("class", Keyword::Class),
    ("const", Keyword::Const),
    ("continue", Keyword::Continue),
    ("default", Keyword::Default),
    ("delete", Keyword::Delete),
    ("do", Keyword::Do),
    ("else", Keyword::Else),
    ("extends", Keyword::Extends),
    ("finally", Keyword::Finally),
    ("for", Keyword::For),
    ("function", Keyword::Function),
    ("if", Keyword::If),
    ("in", Keyword::In),
    ("instanceof", Keyword::Instanceof),
    ("let", Keyword::Let),
    ("new", Keyword::New),
    ("return", Keyword::Return),
    ("static", Keyword::Static),
    ("super", Keyword::Super),
    ("switch", Keyword::Switch),
    ("this", Keyword::This),
    ("throw", Keyword::Throw),
    ("try", Keyword::Try),
    ("typeof", Keyword::Typeof),
    ("var", Keyword::Var),
    ("void", Keyword::Void),
    ("while", Keyword::While),
];

impl Keyword {
    pub fn from_str(s: &str) -> Option<Keyword> {
        KEYWORDS.iter().find(|(text, _)| *text == s).map(|&(_, kw)| kw)
    }

    pub fn as_str(self) -> &'static str {
        KEYWORDS
            .iter()
            .find(|(_, kw)| *kw == self)
            .map_or("", |&(text, _)| text)
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: u32,
    pub column: u32,
}

#[derive(Clone, Debug)]
pub struct LexError {
    pub message: String,
    pub location: SourceLocation,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let SourceLocation { line, column } = self.location;
        write!(f, "{line}:{column}: {}", self.message)
    }
}

fn is_line_terminator(ch: char) -> bool {
    matches!(ch, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}

fn is_whitespace(ch: char) -> bool {
    matches!(ch, '\u{000B}' | '\u{000C}' | '\u{FEFF}') || (ch.is_whitespace() && !is_line_terminator(ch))
}

fn is_identifier_start(ch: char) -> bool {
    match ch {
        '_' | '$' => true,
        c if c.is_ascii() => c.is_ascii_alphabetic(),
        c => unicode_ident::is_xid_start(c),
    }
}

fn is_identifier_continue(ch: char) -> bool {
    match ch {
        '_' | '$' | '\u{200C}' | '\u{200D}' => true,
        c if c.is_ascii() => c.is_ascii_alphanumeric(),
        c => unicode_ident::is_xid_continue(c),
    }
}

pub struct Lexer<'a> {
    chars: Chars<'a>,
    current: Option<char>,
    at_start: bool,
    line: u32,
    column: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        let mut chars = source.chars();
        let current = chars.next();
        Self {
            chars,
            current,
            at_start: true,
            line: 1,
            column: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.current
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.current.take()?;
        self.column += 1;
        self.current = self.chars.next();
        Some(ch)
    }

    /// Consumes `ch` if it comes next.
    fn eat(&mut self, ch: char) -> bool {
        let hit = self.peek() == Some(ch);
        if hit {
            self.advance();
        }
        hit
    }

    /// Consumes characters while `pred` holds and returns them.
    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let mut out = String::new();
        while let Some(ch) = self.peek().filter(|&c| pred(c)) {
            out.push(ch);
            self.advance();
        }
        out
    }

    pub fn location(&self) -> SourceLocation {
        SourceLocation {
            line: self.line,
            column: self.column,
        }
    }

    fn error(&self, message: impl Into<String>) -> LexError {
        LexError {
            message: message.into(),
            location: self.location(),
        }
    }

    /// Bookkeeping after consuming the terminator `ch`. CRLF counts once.
    fn new_line(&mut self, ch: char) {
        if ch == '\r' {
            self.eat('\n');
        }
        self.line += 1;
        self.column = 0;
    }

    /// Skips a `/* */` comment whose opener is consumed. Reports whether it
    /// spanned a line break, which matters for ASI.
    fn skip_block_comment(&mut self) -> Result<bool, LexError> {
        let mut crossed_line = false;
        loop {
            match self.advance() {
                None => return Err(self.error("Unterminated block comment")),
                Some('*') if self.eat('/') => return Ok(crossed_line),
                Some(ch) if is_line_terminator(ch) => {
                    crossed_line = true;
                    self.new_line(ch);
                }
                Some(_) => {}
            }
        }
    }

    fn read_string(&mut self, quote: char) -> Result<String, LexError> {
        let mut s = String::new();
        loop {
            match self.advance() {
                Some(ch) if ch == quote => return Ok(s),
                None | Some('\n' | '\r' | '\u{2028}' | '\u{2029}') => {
                    return Err(self.error("Unterminated string literal"));
                }
                Some('\\') => self.read_escape(&mut s)?,
                Some(ch) => s.push(ch),
            }
        }
    }

    /// Exactly `count` hex digits.
    fn read_hex(&mut self, count: usize, what: &str) -> Result<u32, LexError> {
        let mut val = 0;
        for _ in 0..count {
            let digit = self.advance().and_then(|c| c.to_digit(16));
            val = val * 16 + digit.ok_or_else(|| self.error(format!("Invalid {what} escape")))?;
        }
        Ok(val)
    }

    /// Appends the value of the escape after a consumed backslash.
    fn read_escape(&mut self, out: &mut String) -> Result<(), LexError> {
        let Some(ch) = self.advance() else {
            return Err(self.error("Unterminated escape sequence"));
        };
        let simple = match ch {
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            'b' => '\u{0008}',
            'f' => '\u{000C}',
            'v' => '\u{000B}',
            '0' if !self.peek().is_some_and(|c| c.is_ascii_digit()) => '\0',
            '0'..='9' => return Err(self.error("Octal escape sequences are not allowed")),
            'x' => {
                let code = self.read_hex(2, "hex")?;
                out.extend(char::from_u32(code));
                return Ok(());
            }
            'u' => {
                out.push(self.read_unicode_escape()?);
                return Ok(());
            }
            c if is_line_terminator(c) => {
                self.new_line(c);
                return Ok(());
            }
            c => c,
        };
        out.push(simple);
        Ok(())
    }

    /// `XXXX` or `{X...}` after a consumed `\u`.
    fn read_unicode_escape(&mut self) -> Result<char, LexError> {
        if !self.eat('{') {
            // Lone surrogates have no UTF-8 form
            let code = self.read_hex(4, "Unicode")?;
            return Ok(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER));
        }
        let digits = self.take_while(|c| c.is_ascii_hexdigit());
        if digits.is_empty() || !self.eat('}') {
            return Err(self.error("Invalid Unicode escape"));
        }
        u32::from_str_radix(&digits, 16)
            .ok()
            .filter(|&code| code <= 0x10FFFF)
            .and_then(char::from_u32)
            .ok_or_else(|| self.error("Unicode code point out of range"))
    }

    fn read_number(&mut self, first: char) -> Result<Token, LexError> {
        if first == '0' {
            let radix = match self.peek() {
                Some('x' | 'X') => Some((16, "hex")),
                Some('o' | 'O') => Some((8, "octal")),
                Some('b' | 'B') => Some((2, "binary")),
                Some(c) if c.is_ascii_digit() => {
                    return Err(self.error("Legacy octal literals are not supported"));
                }
                _ => None,
            };
            if let Some((radix, what)) = radix {
                self.advance();
                let digits = self.take_while(|c| c.is_digit(radix) || c == '_');
                let val = u64::from_str_radix(&digits.replace('_', ""), radix)
                    .map_err(|_| self.error(format!("Invalid {what} literal")))?;
                return Ok(Token::NumericLiteral(val as f64));
            }
        }

        let decimal = |c: char| c.is_ascii_digit() || c == '_';
        let mut text = String::from(first);
        text += &self.take_while(decimal);
        if first != '.' && self.eat('.') {
            text.push('.');
            text += &self.take_while(decimal);
        }
        if let Some(e @ ('e' | 'E')) = self.peek() {
            self.advance();
            text.push(e);
            if let Some(sign @ ('+' | '-')) = self.peek() {
                self.advance();
                text.push(sign);
            }
            text += &self.take_while(decimal);
        }
        if self.peek().is_some_and(is_identifier_start) {
            return Err(self.error("Invalid or unexpected token after numeric literal"));
        }
        text.replace('_', "")
            .parse()
            .map(Token::NumericLiteral)
            .map_err(|_| self.error("Invalid numeric literal"))
    }

    fn read_word(&mut self, first: char) -> Result<Token, LexError> {
        let mut name = String::from(first);
        loop {
            name += &self.take_while(is_identifier_continue);
            if !self.eat('\\') {
                break;
            }
            if !self.eat('u') {
                return Err(self.error("Invalid escape in identifier"));
            }
            name.push(self.read_unicode_escape()?);
        }
        Ok(match name.as_str() {
            "true" => Token::BooleanLiteral(true),
            "false" => Token::BooleanLiteral(false),
            "null" => Token::NullLiteral,
            _ => Keyword::from_str(&name).map_or(Token::Identifier(name), Token::Keyword),
        })
    }

    pub fn next_token(&mut self) -> Result<Token, LexError> {
        loop {
            let skipped = self.take_while(is_whitespace);
            let at_start = std::mem::replace(&mut self.at_start, false) && skipped.is_empty();
            let Some(ch) = self.advance() else {
                return Ok(Token::Eof);
            };
            if is_line_terminator(ch) {
                self.new_line(ch);
                return Ok(Token::LineTerminator);
            }
            match (ch, self.peek()) {
                ('/', Some('/')) => {
                    self.take_while(|c| !is_line_terminator(c));
                }
                ('#', Some('!')) if at_start => {
                    self.take_while(|c| !is_line_terminator(c));
                }
                ('/', Some('*')) => {
                    self.advance();
                    if self.skip_block_comment()? {
                        return Ok(Token::LineTerminator);
                    }
                }
                ('\'' | '"', _) => return self.read_string(ch).map(Token::StringLiteral),
                ('`', _) => {
                    return self.read_template_part(Token::NoSubstitutionTemplate, Token::TemplateHead);
                }
                ('0'..='9', _) => return self.read_number(ch),
                ('.', Some('0'..='9')) => return self.read_number(ch),
                _ if is_identifier_start(ch) => return self.read_word(ch),
                _ => return self.read_punctuator(ch),
            }
        }
    }

    /// Cooked template text up to the closing backtick (`done`) or the next
    /// `${` (`open`).
    fn read_template_part(
        &mut self,
        done: fn(String) -> Token,
        open: fn(String) -> Token,
    ) -> Result<Token, LexError> {
        let mut cooked = String::new();
        loop {
            match self.advance() {
                None => return Err(self.error("Unterminated template literal")),
                Some('`') => return Ok(done(cooked)),
                Some('$') if self.eat('{') => return Ok(open(cooked)),
                Some('\\') => self.read_escape(&mut cooked)?,
                Some(ch) if is_line_terminator(ch) => {
                    self.new_line(ch);
                    cooked.push('\n');
                }
                Some(ch) => cooked.push(ch),
            }
        }
    }

    /// Resumes a template after the `}` closing a substitution.
    pub fn read_template_continuation(&mut self) -> Result<Token, LexError> {
        self.read_template_part(Token::TemplateTail, Token::TemplateMiddle)
    }

    /// Longest match against `PUNCTUATORS`, starting from the already
    /// consumed `ch`.
    fn read_punctuator(&mut self, ch: char) -> Result<Token, LexError> {
        let mut window = String::from(ch);
        window.extend(self.peek());
        window.extend(self.chars.clone().take(2));
        let Some((text, tok)) = PUNCTUATORS.iter().find(|(text, _)| window.starts_with(text)) else {
            return Err(self.error(format!("Unexpected character: {ch}")));
        };
        for _ in 1..text.len() {
            self.advance();
        }
        Ok(tok.clone())
    }

    pub fn tokenize_all(&mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = vec![self.next_token()?];
        while tokens.last() != Some(&Token::Eof) {
            tokens.push(self.next_token()?);
        }
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(src: &str) -> Vec<Token> {
        let mut all = Lexer::new(src).tokenize_all().unwrap();
        all.retain(|t| *t != Token::LineTerminator);
        all.pop();
        all
    }

    fn single(src: &str) -> Token {
        let toks = tokens(src);
        assert_eq!(toks.len(), 1, "{src} lexed as {toks:?}");
        toks[0].clone()
    }

    #[test]
    fn empty_source_is_just_eof() {
        assert_eq!(Lexer::new("").tokenize_all().unwrap(), vec![Token::Eof]);
    }

    #[test]
    fn keywords_and_contextual_words() {
        assert_eq!(
            tokens("let v = catchy; catch (e) when (e)"),
            vec![
                Token::Keyword(Keyword::Let),
                Token::Identifier("v".into()),
                Token::Assign,
                Token::Identifier("catchy".into()),
                Token::Semicolon,
                Token::Keyword(Keyword::Catch),
                Token::LeftParen,
                Token::Identifier("e".into()),
                Token::RightParen,
                Token::Identifier("when".into()),
                Token::LeftParen,
                Token::Identifier("e".into()),
                Token::RightParen,
            ]
        );
        assert_eq!(Keyword::from_str("finally"), Some(Keyword::Finally));
        assert_eq!(Keyword::Instanceof.as_str(), "instanceof");
        assert_eq!(single("a\\u0062c"), Token::Identifier("abc".into()));
    }

    #[test]
    fn literal_forms() {
        let cases = [
            ("0xff", 255.0),
            ("0b1010", 10.0),
            ("0o77", 63.0),
            ("1_000", 1000.0),
            ("1e3", 1000.0),
            ("2.5E-1", 0.25),
            (".5", 0.5),
        ];
        for (src, n) in cases {
            assert_eq!(single(src), Token::NumericLiteral(n), "{src}");
        }
        assert_eq!(single("null"), Token::NullLiteral);
        assert_eq!(single("false"), Token::BooleanLiteral(false));
        assert_eq!(single(r"'he\nllo'"), Token::StringLiteral("he\nllo".into()));
        assert_eq!(single(r#""\x41B\u{1F600}""#), Token::StringLiteral("AB\u{1F600}".into()));
    }

    #[test]
    fn punctuators_take_the_longest_match() {
        assert_eq!(single(">>>="), Token::UnsignedRightShiftAssign);
        assert_eq!(single("..."), Token::Ellipsis);
        assert_eq!(tokens("a=>!==b"), vec![
            Token::Identifier("a".into()),
            Token::Arrow,
            Token::StrictNotEqual,
            Token::Identifier("b".into()),
        ]);
        assert_eq!(tokens("x?.5:1"), vec![
            Token::Identifier("x".into()),
            Token::Question,
            Token::NumericLiteral(0.5),
            Token::Colon,
            Token::NumericLiteral(1.0),
        ]);
    }

    #[test]
    fn comments_and_line_breaks() {
        assert_eq!(single("#!/usr/bin/env jsguard\n// note\n/* x */ 42"), Token::NumericLiteral(42.0));
        assert_eq!(
            Lexer::new("a /*\n*/ b").tokenize_all().unwrap(),
            vec![
                Token::Identifier("a".into()),
                Token::LineTerminator,
                Token::Identifier("b".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn template_pieces() {
        assert_eq!(single("`hi`"), Token::NoSubstitutionTemplate("hi".into()));
        let mut lexer = Lexer::new("`a${x}b`");
        assert_eq!(lexer.next_token().unwrap(), Token::TemplateHead("a".into()));
        assert_eq!(lexer.next_token().unwrap(), Token::Identifier("x".into()));
        assert_eq!(lexer.next_token().unwrap(), Token::RightBrace);
        assert_eq!(lexer.read_template_continuation().unwrap(), Token::TemplateTail("b".into()));
    }

    #[test]
    fn errors_carry_their_line() {
        let err = Lexer::new("\n  'abc").tokenize_all().unwrap_err();
        assert_eq!(err.location.line, 2);
        assert!(err.message.contains("Unterminated"));
        assert!(Lexer::new("08").tokenize_all().is_err());
        assert!(Lexer::new("3in").tokenize_all().is_err());
    }
}
