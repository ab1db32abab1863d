use logos::Logos;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LexError {
    #[error("[Line {pos}] Unexpected character '{ch}'")]
    UnexpectedChar { ch: char, pos: Position },
    #[error("[Line {pos}] Unterminated string literal")]
    UnterminatedString { pos: Position },
}

/// A line/column pair, both 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Position { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[logos(skip r"[ \t\r\f]+")]
#[logos(skip r"//[^\n]*")]
pub enum TokenKind {
    // Keywords
    #[token("fn")]
    Fn,
    #[token("return")]
    Return,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("for")]
    For,
    #[token("printf")]
    Printf,
    #[token("struct")]
    Struct,
    #[token("true")]
    True,
    #[token("false")]
    False,

    // Identifiers and literals
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
    Identifier,
    #[regex(r"[0-9]+\.[0-9]+")]
    FloatLiteral,
    #[regex(r"[0-9]+")]
    IntegerLiteral,
    #[regex(r#""([^"\\]|\\.)*""#)]
    StringLiteral,

    // Operators
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,

    #[token("=")]
    Equals,
    #[token("+=")]
    PlusEquals,
    #[token("-=")]
    MinusEquals,
    #[token("*=")]
    StarEquals,
    #[token("/=")]
    SlashEquals,
    #[token("%=")]
    PercentEquals,

    // Comparison
    #[token("==")]
    DoubleEquals,
    #[token("!=")]
    NotEquals,
    #[token("<")]
    Less,
    #[token(">")]
    Greater,
    #[token("<=")]
    LessEquals,
    #[token(">=")]
    GreaterEquals,

    // Logical
    #[token("&&")]
    #[token("and")]
    And,
    #[token("||")]
    #[token("or")]
    Or,
    #[token("!")]
    Not,

    // Delimiters
    #[token(":=")]
    ColonEquals,
    #[token(":")]
    Colon,
    #[token("->")]
    Arrow,
    #[token(".")]
    Dot,
    #[token(",")]
    Comma,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("\n")]
    Newline,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TokenKind::Fn => "fn",
            TokenKind::Return => "return",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::For => "for",
            TokenKind::Printf => "printf",
            TokenKind::Struct => "struct",
            TokenKind::True => "true",
            TokenKind::False => "false",
            TokenKind::Identifier => "identifier",
            TokenKind::FloatLiteral => "float literal",
            TokenKind::IntegerLiteral => "integer literal",
            TokenKind::StringLiteral => "string literal",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::Equals => "=",
            TokenKind::PlusEquals => "+=",
            TokenKind::MinusEquals => "-=",
            TokenKind::StarEquals => "*=",
            TokenKind::SlashEquals => "/=",
            TokenKind::PercentEquals => "%=",
            TokenKind::DoubleEquals => "==",
            TokenKind::NotEquals => "!=",
            TokenKind::Less => "<",
            TokenKind::Greater => ">",
            TokenKind::LessEquals => "<=",
            TokenKind::GreaterEquals => ">=",
            TokenKind::And => "&&",
            TokenKind::Or => "||",
            TokenKind::Not => "!",
            TokenKind::ColonEquals => ":=",
            TokenKind::Colon => ":",
            TokenKind::Arrow => "->",
            TokenKind::Dot => ".",
            TokenKind::Comma => ",",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::Newline => "newline",
        };
        f.pad(text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub pos: Position,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, pos: Position) -> Self {
        Token {
            kind,
            text: text.into(),
            pos,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.kind == TokenKind::Newline {
            write!(f, "{:>7} {:16} \\n", self.pos.to_string(), self.kind)
        } else {
            write!(f, "{:>7} {:16} {}", self.pos.to_string(), self.kind, self.text)
        }
    }
}

/// Scan the whole source into tokens, stopping at the first lexical error.
pub fn lex(source: &str) -> Result<Vec<Token>, LexError> {
    let mut tokens = Vec::new();
    let mut lexer = TokenKind::lexer(source);
    let mut line = 1;
    let mut line_start = 0;

    while let Some(result) = lexer.next() {
        let span = lexer.span();
        let slice = lexer.slice();
        let column = source[line_start..span.start].chars().count() + 1;
        let pos = Position::new(line, column);

        let kind = match result {
            Ok(kind) => kind,
            Err(()) => {
                return Err(if slice.starts_with('"') {
                    LexError::UnterminatedString { pos }
                } else {
                    LexError::UnexpectedChar {
                        ch: slice.chars().next().unwrap_or('\0'),
                        pos,
                    }
                });
            }
        };

        tokens.push(Token::new(kind, slice, pos));

        // Strings may span lines; keep columns relative to the last newline.
        if let Some(offset) = slice.rfind('\n') {
            line += slice.matches('\n').count();
            line_start = span.start + offset + 1;
        }
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_function_header() {
        assert_eq!(
            kinds("fn main() -> i32 {"),
            vec![
                TokenKind::Fn,
                TokenKind::Identifier,
                TokenKind::LParen,
                TokenKind::RParen,
                TokenKind::Arrow,
                TokenKind::Identifier,
                TokenKind::LBrace,
            ]
        );
    }

    #[test]
    fn test_compound_operators_are_maximal() {
        assert_eq!(
            kinds("x := 1\nx += 2 x %= 3 a <= b != c"),
            vec![
                TokenKind::Identifier,
                TokenKind::ColonEquals,
                TokenKind::IntegerLiteral,
                TokenKind::Newline,
                TokenKind::Identifier,
                TokenKind::PlusEquals,
                TokenKind::IntegerLiteral,
                TokenKind::Identifier,
                TokenKind::PercentEquals,
                TokenKind::IntegerLiteral,
                TokenKind::Identifier,
                TokenKind::LessEquals,
                TokenKind::Identifier,
                TokenKind::NotEquals,
                TokenKind::Identifier,
            ]
        );
    }

    #[test]
    fn test_literals_and_keywords() {
        assert_eq!(
            kinds(r#"3.25 42 "hi\n" true and or printf"#),
            vec![
                TokenKind::FloatLiteral,
                TokenKind::IntegerLiteral,
                TokenKind::StringLiteral,
                TokenKind::True,
                TokenKind::And,
                TokenKind::Or,
                TokenKind::Printf,
            ]
        );
    }

    #[test]
    fn test_comments_are_skipped_but_newlines_kept() {
        assert_eq!(
            kinds("x // trailing comment\ny"),
            vec![TokenKind::Identifier, TokenKind::Newline, TokenKind::Identifier]
        );
    }

    #[test]
    fn test_positions() {
        let tokens = lex("fn f() {\n  return 1\n}").unwrap();
        let ret = tokens.iter().find(|t| t.kind == TokenKind::Return).unwrap();
        assert_eq!(ret.pos, Position::new(2, 3));
        let close = tokens.last().unwrap();
        assert_eq!(close.kind, TokenKind::RBrace);
        assert_eq!(close.pos, Position::new(3, 1));
    }

    #[test]
    fn test_token_text_is_raw() {
        let tokens = lex(r#"printf("%d\n", 7)"#).unwrap();
        assert_eq!(tokens[2].text, r#""%d\n""#);
        assert_eq!(tokens[4].text, "7");
    }

    #[test]
    fn test_unexpected_character() {
        let err = lex("x := 1 @ 2").unwrap_err();
        assert_eq!(
            err,
            LexError::UnexpectedChar {
                ch: '@',
                pos: Position::new(1, 8)
            }
        );
    }

    #[test]
    fn test_unterminated_string() {
        let err = lex("printf(\"oops").unwrap_err();
        assert!(matches!(err, LexError::UnterminatedString { .. }));
    }
}
