//! Lexical analysis: the token model and the ordered pattern table.
//!
//! Tokens are produced lazily by matching the source position against an
//! ordered list of regex patterns; the first pattern to match wins. The
//! ordering carries meaning: literal patterns come before operators so
//! `.5` is a float rather than `.` `5`, longer operators come before
//! their prefixes (`++` before `+`, `<<=` before `<<` before `<`), and
//! keywords carry a trailing word boundary so `returned` is an
//! identifier. Only whitespace is skipped between tokens; concatenating
//! token spans reconstructs the non-whitespace source.

mod stream;

pub use stream::TokenStream;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use thiserror::Error;

use crumb::NumberType;

/// Byte range of a token in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// The closed, ordered set of token types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    // Literals
    FloatLiteral,
    IntLiteral,
    CharLiteral,
    StringLiteral,

    // Operators, longest first
    ShlAssign,
    ShrAssign,
    Ellipsis,
    Arrow,
    Increment,
    Decrement,
    Shl,
    Shr,
    Le,
    Ge,
    EqEq,
    Ne,
    AndAnd,
    OrOr,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PercentAssign,
    AmpAssign,
    CaretAssign,
    PipeAssign,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Assign,
    Lt,
    Gt,
    Amp,
    Pipe,
    Caret,
    Tilde,
    Bang,
    Question,
    Colon,
    Semicolon,
    Comma,
    Dot,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,

    // Keywords (the C89 set)
    Auto,
    Break,
    Case,
    Char,
    Const,
    Continue,
    Default,
    Do,
    Double,
    Else,
    Enum,
    Extern,
    Float,
    For,
    Goto,
    If,
    Int,
    Long,
    Register,
    Return,
    Short,
    Signed,
    Sizeof,
    Static,
    Struct,
    Switch,
    Typedef,
    Union,
    Unsigned,
    Void,
    Volatile,
    While,

    Identifier,
    EndOfFile,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::FloatLiteral => "floating literal",
            TokenKind::IntLiteral => "integer literal",
            TokenKind::CharLiteral => "character literal",
            TokenKind::StringLiteral => "string literal",
            TokenKind::ShlAssign => "'<<='",
            TokenKind::ShrAssign => "'>>='",
            TokenKind::Ellipsis => "'...'",
            TokenKind::Arrow => "'->'",
            TokenKind::Increment => "'++'",
            TokenKind::Decrement => "'--'",
            TokenKind::Shl => "'<<'",
            TokenKind::Shr => "'>>'",
            TokenKind::Le => "'<='",
            TokenKind::Ge => "'>='",
            TokenKind::EqEq => "'=='",
            TokenKind::Ne => "'!='",
            TokenKind::AndAnd => "'&&'",
            TokenKind::OrOr => "'||'",
            TokenKind::PlusAssign => "'+='",
            TokenKind::MinusAssign => "'-='",
            TokenKind::StarAssign => "'*='",
            TokenKind::SlashAssign => "'/='",
            TokenKind::PercentAssign => "'%='",
            TokenKind::AmpAssign => "'&='",
            TokenKind::CaretAssign => "'^='",
            TokenKind::PipeAssign => "'|='",
            TokenKind::Plus => "'+'",
            TokenKind::Minus => "'-'",
            TokenKind::Star => "'*'",
            TokenKind::Slash => "'/'",
            TokenKind::Percent => "'%'",
            TokenKind::Assign => "'='",
            TokenKind::Lt => "'<'",
            TokenKind::Gt => "'>'",
            TokenKind::Amp => "'&'",
            TokenKind::Pipe => "'|'",
            TokenKind::Caret => "'^'",
            TokenKind::Tilde => "'~'",
            TokenKind::Bang => "'!'",
            TokenKind::Question => "'?'",
            TokenKind::Colon => "':'",
            TokenKind::Semicolon => "';'",
            TokenKind::Comma => "','",
            TokenKind::Dot => "'.'",
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::LBrace => "'{'",
            TokenKind::RBrace => "'}'",
            TokenKind::LBracket => "'['",
            TokenKind::RBracket => "']'",
            TokenKind::Auto => "'auto'",
            TokenKind::Break => "'break'",
            TokenKind::Case => "'case'",
            TokenKind::Char => "'char'",
            TokenKind::Const => "'const'",
            TokenKind::Continue => "'continue'",
            TokenKind::Default => "'default'",
            TokenKind::Do => "'do'",
            TokenKind::Double => "'double'",
            TokenKind::Else => "'else'",
            TokenKind::Enum => "'enum'",
            TokenKind::Extern => "'extern'",
            TokenKind::Float => "'float'",
            TokenKind::For => "'for'",
            TokenKind::Goto => "'goto'",
            TokenKind::If => "'if'",
            TokenKind::Int => "'int'",
            TokenKind::Long => "'long'",
            TokenKind::Register => "'register'",
            TokenKind::Return => "'return'",
            TokenKind::Short => "'short'",
            TokenKind::Signed => "'signed'",
            TokenKind::Sizeof => "'sizeof'",
            TokenKind::Static => "'static'",
            TokenKind::Struct => "'struct'",
            TokenKind::Switch => "'switch'",
            TokenKind::Typedef => "'typedef'",
            TokenKind::Union => "'union'",
            TokenKind::Unsigned => "'unsigned'",
            TokenKind::Void => "'void'",
            TokenKind::Volatile => "'volatile'",
            TokenKind::While => "'while'",
            TokenKind::Identifier => "identifier",
            TokenKind::EndOfFile => "end of file",
        };
        write!(f, "{}", name)
    }
}

/// Semantic value extracted from a token's matched text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TokenValue {
    None,
    /// Identifiers, keywords, and operators keep their spelling.
    Text(String),
    Integer {
        value: u64,
        ty: NumberType,
    },
    Float {
        value: f64,
        ty: NumberType,
    },
    /// Decoded code point of a character literal.
    Char(u32),
    /// Decoded bytes of a string literal.
    Bytes(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub value: TokenValue,
    pub span: Span,
}

impl Token {
    /// Spelling of a text-valued token; empty for literals.
    pub fn text(&self) -> &str {
        match &self.value {
            TokenValue::Text(text) => text,
            _ => "",
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum LexError {
    #[error("unrecognized source at offset {offset}")]
    UnrecognizedSource { offset: usize },

    #[error("invalid literal '{text}' at offset {offset}")]
    InvalidLiteral { text: String, offset: usize },

    #[error("expected {expected} but found {found} at offset {offset}")]
    UnexpectedToken {
        expected: TokenKind,
        found: TokenKind,
        offset: usize,
    },
}

/// How a pattern turns its matched text into a token value.
#[derive(Debug, Clone, Copy)]
enum Extractor {
    Text,
    Integer,
    Float,
    Char,
    Str,
}

struct TokenPattern {
    kind: TokenKind,
    regex: Regex,
    extractor: Extractor,
}

const OPERATORS: &[(TokenKind, &str)] = &[
    (TokenKind::ShlAssign, "<<="),
    (TokenKind::ShrAssign, ">>="),
    (TokenKind::Ellipsis, "..."),
    (TokenKind::Arrow, "->"),
    (TokenKind::Increment, "++"),
    (TokenKind::Decrement, "--"),
    (TokenKind::Shl, "<<"),
    (TokenKind::Shr, ">>"),
    (TokenKind::Le, "<="),
    (TokenKind::Ge, ">="),
    (TokenKind::EqEq, "=="),
    (TokenKind::Ne, "!="),
    (TokenKind::AndAnd, "&&"),
    (TokenKind::OrOr, "||"),
    (TokenKind::PlusAssign, "+="),
    (TokenKind::MinusAssign, "-="),
    (TokenKind::StarAssign, "*="),
    (TokenKind::SlashAssign, "/="),
    (TokenKind::PercentAssign, "%="),
    (TokenKind::AmpAssign, "&="),
    (TokenKind::CaretAssign, "^="),
    (TokenKind::PipeAssign, "|="),
    (TokenKind::Plus, "+"),
    (TokenKind::Minus, "-"),
    (TokenKind::Star, "*"),
    (TokenKind::Slash, "/"),
    (TokenKind::Percent, "%"),
    (TokenKind::Assign, "="),
    (TokenKind::Lt, "<"),
    (TokenKind::Gt, ">"),
    (TokenKind::Amp, "&"),
    (TokenKind::Pipe, "|"),
    (TokenKind::Caret, "^"),
    (TokenKind::Tilde, "~"),
    (TokenKind::Bang, "!"),
    (TokenKind::Question, "?"),
    (TokenKind::Colon, ":"),
    (TokenKind::Semicolon, ";"),
    (TokenKind::Comma, ","),
    (TokenKind::Dot, "."),
    (TokenKind::LParen, "("),
    (TokenKind::RParen, ")"),
    (TokenKind::LBrace, "{"),
    (TokenKind::RBrace, "}"),
    (TokenKind::LBracket, "["),
    (TokenKind::RBracket, "]"),
];

const KEYWORDS: &[(TokenKind, &str)] = &[
    (TokenKind::Auto, "auto"),
    (TokenKind::Break, "break"),
    (TokenKind::Case, "case"),
    (TokenKind::Char, "char"),
    (TokenKind::Const, "const"),
    (TokenKind::Continue, "continue"),
    (TokenKind::Default, "default"),
    (TokenKind::Do, "do"),
    (TokenKind::Double, "double"),
    (TokenKind::Else, "else"),
    (TokenKind::Enum, "enum"),
    (TokenKind::Extern, "extern"),
    (TokenKind::Float, "float"),
    (TokenKind::For, "for"),
    (TokenKind::Goto, "goto"),
    (TokenKind::If, "if"),
    (TokenKind::Int, "int"),
    (TokenKind::Long, "long"),
    (TokenKind::Register, "register"),
    (TokenKind::Return, "return"),
    (TokenKind::Short, "short"),
    (TokenKind::Signed, "signed"),
    (TokenKind::Sizeof, "sizeof"),
    (TokenKind::Static, "static"),
    (TokenKind::Struct, "struct"),
    (TokenKind::Switch, "switch"),
    (TokenKind::Typedef, "typedef"),
    (TokenKind::Union, "union"),
    (TokenKind::Unsigned, "unsigned"),
    (TokenKind::Void, "void"),
    (TokenKind::Volatile, "volatile"),
    (TokenKind::While, "while"),
];

fn patterns() -> &'static [TokenPattern] {
    static PATTERNS: OnceLock<Vec<TokenPattern>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let mut table = Vec::new();
        let pattern = |kind, regex: &str, extractor| TokenPattern {
            kind,
            regex: Regex::new(regex).expect("token pattern must compile"),
            extractor,
        };

        // Literals first so `.5` beats the `.` operator and `1.5` beats
        // the integer prefix `1`.
        table.push(pattern(
            TokenKind::FloatLiteral,
            r"^(?:[0-9]+\.[0-9]*|\.[0-9]+)(?:[eE][+-]?[0-9]+)?[fFdD]?|^[0-9]+(?:[eE][+-]?[0-9]+)[fFdD]?",
            Extractor::Float,
        ));
        table.push(pattern(
            TokenKind::IntLiteral,
            r"^(?:0[xX][0-9a-fA-F]+|[0-9]+)(?:[uU][lL]?|[lL][uU]?)?",
            Extractor::Integer,
        ));
        table.push(pattern(
            TokenKind::CharLiteral,
            r#"^'(?:[^'\\]|\\(?:[0-7]{1,3}|x[0-9a-fA-F]+|u[0-9a-fA-F]{4}|['"?abfnrtv\\]))'"#,
            Extractor::Char,
        ));
        table.push(pattern(
            TokenKind::StringLiteral,
            r#"^"(?:[^"\\]|\\(?:[0-7]{1,3}|x[0-9a-fA-F]+|u[0-9a-fA-F]{4}|['"?abfnrtv\\]))*""#,
            Extractor::Str,
        ));

        for (kind, text) in OPERATORS {
            table.push(pattern(*kind, &format!("^{}", regex::escape(text)), Extractor::Text));
        }
        for (kind, text) in KEYWORDS {
            table.push(pattern(*kind, &format!(r"^{}\b", text), Extractor::Text));
        }

        // Identifiers last among the non-literal patterns.
        table.push(pattern(
            TokenKind::Identifier,
            r"^[A-Za-z_][A-Za-z0-9_]*",
            Extractor::Text,
        ));

        table
    })
}

/// Lazy token producer over a source string.
pub struct Lexer<'a> {
    source: &'a str,
    pos: usize,
    finished: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            pos: 0,
            finished: false,
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.source[self.pos..].chars().next() {
            if !ch.is_whitespace() {
                break;
            }
            self.pos += ch.len_utf8();
        }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        self.skip_whitespace();
        if self.pos >= self.source.len() {
            self.finished = true;
            return None;
        }

        let rest = &self.source[self.pos..];
        for pattern in patterns() {
            let Some(found) = pattern.regex.find(rest) else {
                continue;
            };
            let text = found.as_str();
            let span = Span {
                start: self.pos,
                end: self.pos + text.len(),
            };
            let value = match extract_value(pattern.extractor, text, self.pos) {
                Ok(value) => value,
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            };
            self.pos += text.len();
            return Some(Ok(Token {
                kind: pattern.kind,
                value,
                span,
            }));
        }

        self.finished = true;
        Some(Err(LexError::UnrecognizedSource { offset: self.pos }))
    }
}

fn extract_value(extractor: Extractor, text: &str, offset: usize) -> Result<TokenValue, LexError> {
    let invalid = || LexError::InvalidLiteral {
        text: text.to_string(),
        offset,
    };
    match extractor {
        Extractor::Text => Ok(TokenValue::Text(text.to_string())),
        Extractor::Integer => {
            let (value, ty) = extract_integer(text).ok_or_else(invalid)?;
            Ok(TokenValue::Integer { value, ty })
        }
        Extractor::Float => {
            let (value, ty) = extract_float(text).ok_or_else(invalid)?;
            Ok(TokenValue::Float { value, ty })
        }
        Extractor::Char => {
            let code = extract_char(text).ok_or_else(invalid)?;
            Ok(TokenValue::Char(code))
        }
        Extractor::Str => {
            let bytes = extract_string(text).ok_or_else(invalid)?;
            Ok(TokenValue::Bytes(bytes))
        }
    }
}

/// Hex, octal, and decimal forms with `u`/`l`/`ul` suffix promotion.
/// The default is `sint32`.
fn extract_integer(text: &str) -> Option<(u64, NumberType)> {
    let digits_end = text
        .find(|c: char| matches!(c, 'u' | 'U' | 'l' | 'L'))
        .unwrap_or(text.len());
    let (digits, suffix) = text.split_at(digits_end);
    let has_u = suffix.contains(['u', 'U']);
    let has_l = suffix.contains(['l', 'L']);

    let value = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()?
    } else if digits.len() > 1 && digits.starts_with('0') {
        u64::from_str_radix(&digits[1..], 8).ok()?
    } else {
        digits.parse::<u64>().ok()?
    };

    let ty = match (has_u, has_l) {
        (true, true) => NumberType::Uint64,
        (true, false) => NumberType::Uint32,
        (false, true) => NumberType::Sint64,
        (false, false) => NumberType::Sint32,
    };
    Some((value, ty))
}

/// `[digits].[digits][e[±]digits]` with `f`/`d` suffix; default `fp64`.
fn extract_float(text: &str) -> Option<(f64, NumberType)> {
    let (digits, ty) = match text.as_bytes().last()? {
        b'f' | b'F' => (&text[..text.len() - 1], NumberType::Fp32),
        b'd' | b'D' => (&text[..text.len() - 1], NumberType::Fp64),
        _ => (text, NumberType::Fp64),
    };
    let value = if let Some(stripped) = digits.strip_prefix('.') {
        format!("0.{}", stripped).parse::<f64>().ok()?
    } else {
        digits.parse::<f64>().ok()?
    };
    Some((value, ty))
}

fn extract_char(text: &str) -> Option<u32> {
    let inner = text.strip_prefix('\'')?.strip_suffix('\'')?;
    let mut chars = inner.chars().peekable();
    let code = match chars.next()? {
        '\\' => decode_escape(&mut chars)?,
        ch => ch as u32,
    };
    if chars.next().is_some() {
        return None;
    }
    Some(code)
}

fn extract_string(text: &str) -> Option<Vec<u8>> {
    let inner = text.strip_prefix('"')?.strip_suffix('"')?;
    let mut bytes = Vec::new();
    let mut chars = inner.chars().peekable();
    while let Some(ch) = chars.next() {
        let code = match ch {
            '\\' => decode_escape(&mut chars)?,
            ch => ch as u32,
        };
        if code <= 0xFF {
            bytes.push(code as u8);
        } else {
            let mut buffer = [0u8; 4];
            bytes.extend_from_slice(char::from_u32(code)?.encode_utf8(&mut buffer).as_bytes());
        }
    }
    Some(bytes)
}

/// Decode the characters after a backslash into a code point.
fn decode_escape(chars: &mut std::iter::Peekable<std::str::Chars>) -> Option<u32> {
    let ch = chars.next()?;
    let code = match ch {
        '\'' => 0x27,
        '"' => 0x22,
        '?' => 0x3F,
        'a' => 0x07,
        'b' => 0x08,
        'f' => 0x0C,
        'n' => 0x0A,
        'r' => 0x0D,
        't' => 0x09,
        'v' => 0x0B,
        '\\' => 0x5C,
        '0'..='7' => {
            let mut value = ch.to_digit(8)?;
            for _ in 0..2 {
                match chars.peek().and_then(|c| c.to_digit(8)) {
                    Some(digit) => {
                        chars.next();
                        value = value * 8 + digit;
                    }
                    None => break,
                }
            }
            value
        }
        'x' => {
            let mut value = 0u32;
            let mut any = false;
            while let Some(digit) = chars.peek().and_then(|c| c.to_digit(16)) {
                chars.next();
                value = value.wrapping_mul(16).wrapping_add(digit);
                any = true;
            }
            if !any {
                return None;
            }
            value
        }
        'u' => {
            let mut value = 0u32;
            for _ in 0..4 {
                let digit = chars.next()?.to_digit(16)?;
                value = value * 16 + digit;
            }
            value
        }
        _ => return None,
    };
    Some(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> Vec<Token> {
        Lexer::new(source).collect::<Result<Vec<_>, _>>().unwrap()
    }

    #[test]
    fn test_longer_operators_win_over_prefixes() {
        let tokens = lex("++ + <<= << <");
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Increment,
                TokenKind::Plus,
                TokenKind::ShlAssign,
                TokenKind::Shl,
                TokenKind::Lt,
            ]
        );
    }

    #[test]
    fn test_keyword_needs_word_boundary() {
        let tokens = lex("return returned");
        assert_eq!(tokens[0].kind, TokenKind::Return);
        assert_eq!(tokens[1].kind, TokenKind::Identifier);
        assert_eq!(tokens[1].text(), "returned");
    }

    #[test]
    fn test_integer_bases() {
        let tokens = lex("255 0xFF 0377 0");
        for token in &tokens {
            assert_eq!(token.kind, TokenKind::IntLiteral);
        }
        let values: Vec<_> = tokens
            .iter()
            .map(|t| match t.value {
                TokenValue::Integer { value, .. } => value,
                _ => panic!("expected integer value"),
            })
            .collect();
        assert_eq!(values, vec![255, 255, 255, 0]);
    }

    #[test]
    fn test_integer_suffix_promotion() {
        let expect = |source: &str, ty| {
            let tokens = lex(source);
            match tokens[0].value {
                TokenValue::Integer { ty: found, .. } => assert_eq!(found, ty, "{}", source),
                _ => panic!("expected integer"),
            }
        };
        expect("1", NumberType::Sint32);
        expect("1u", NumberType::Uint32);
        expect("1l", NumberType::Sint64);
        expect("1ul", NumberType::Uint64);
        expect("1LU", NumberType::Uint64);
    }

    #[test]
    fn test_float_forms() {
        let expect = |source: &str, value: f64, ty| {
            let tokens = lex(source);
            assert_eq!(tokens[0].kind, TokenKind::FloatLiteral, "{}", source);
            match tokens[0].value {
                TokenValue::Float { value: found, ty: found_ty } => {
                    assert!((found - value).abs() < 1e-12, "{}", source);
                    assert_eq!(found_ty, ty, "{}", source);
                }
                _ => panic!("expected float"),
            }
        };
        expect("1.5", 1.5, NumberType::Fp64);
        expect(".5", 0.5, NumberType::Fp64);
        expect("2.", 2.0, NumberType::Fp64);
        expect("1.5f", 1.5, NumberType::Fp32);
        expect("1e3", 1000.0, NumberType::Fp64);
        expect("2.5e-1", 0.25, NumberType::Fp64);
    }

    #[test]
    fn test_float_beats_integer_and_dot() {
        let tokens = lex("1.5 .5");
        assert_eq!(tokens[0].kind, TokenKind::FloatLiteral);
        assert_eq!(tokens[1].kind, TokenKind::FloatLiteral);
    }

    #[test]
    fn test_char_literals() {
        let expect = |source: &str, code: u32| {
            let tokens = lex(source);
            assert_eq!(tokens[0].kind, TokenKind::CharLiteral, "{}", source);
            assert_eq!(tokens[0].value, TokenValue::Char(code), "{}", source);
        };
        expect("'A'", 65);
        expect(r"'\n'", 10);
        expect(r"'\0'", 0);
        expect(r"'\101'", 65);
        expect(r"'\x41'", 65);
        expect(r"'A'", 65);
        expect(r"'\\'", 92);
        expect(r#"'\''"#, 39);
    }

    #[test]
    fn test_string_literal_decoding() {
        let tokens = lex(r#""a\tb\x21\0""#);
        assert_eq!(tokens[0].kind, TokenKind::StringLiteral);
        assert_eq!(
            tokens[0].value,
            TokenValue::Bytes(vec![b'a', b'\t', b'b', 0x21, 0])
        );
    }

    #[test]
    fn test_spans_reconstruct_non_whitespace_source() {
        let source = "int main ( ) { return 0x1F ; }";
        let tokens = lex(source);
        let rebuilt: String = tokens
            .iter()
            .map(|t| &source[t.span.start..t.span.end])
            .collect();
        let stripped: String = source.chars().filter(|c| !c.is_whitespace()).collect();
        assert_eq!(rebuilt, stripped);
    }

    #[test]
    fn test_unrecognized_source_is_fatal() {
        let mut lexer = Lexer::new("int @ x");
        assert!(lexer.next().unwrap().is_ok());
        match lexer.next().unwrap() {
            Err(LexError::UnrecognizedSource { offset: 4 }) => {}
            other => panic!("expected UnrecognizedSource, got {:?}", other),
        }
        assert!(lexer.next().is_none());
    }

    #[test]
    fn test_keywords_carry_their_spelling() {
        let tokens = lex("unsigned long");
        assert_eq!(tokens[0].kind, TokenKind::Unsigned);
        assert_eq!(tokens[0].text(), "unsigned");
        assert_eq!(tokens[1].kind, TokenKind::Long);
        assert_eq!(tokens[1].text(), "long");
    }

    #[test]
    fn test_empty_source_yields_no_tokens() {
        assert!(lex("   \n\t ").is_empty());
        assert!(lex("").is_empty());
    }
}
