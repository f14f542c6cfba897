//! C token stream
//!
//! A flat tokenization that is good enough to find top-level declarations
//! in preprocessed output. Comments are dropped, unknown bytes are skipped,
//! and every token carries its 1-based source line.

use logos::Logos;

/// Raw tokens produced by logos.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n\f\v]+")]
#[logos(skip(r"//[^\n]*", allow_greedy = true))]
#[logos(skip r"/\*([^*]|\*+[^*/])*\*+/")]
#[logos(skip r"\\\r?\n")]
pub enum TokenKind {
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Identifier,
    #[regex(r"\.?[0-9]([0-9A-Za-z_.]|[eEpP][+-])*")]
    Number,
    #[regex(r#"[LuU8]*"([^"\\\n]|\\.)*""#)]
    String,
    #[regex(r"[LuU8]*'([^'\\\n]|\\.)*'")]
    Char,
    #[token("#")]
    Hash,
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
    #[token(";")]
    Semicolon,
    #[token(",")]
    Comma,
    #[token("=")]
    Assign,
    #[regex(r"[-+*/%&|^!~<>?:.]")]
    Punct,
}

/// A token with its spelling and the line it starts on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub spelling: String,
    pub line: usize,
}

impl Token {
    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }

    pub fn is_identifier(&self, spelling: &str) -> bool {
        self.kind == TokenKind::Identifier && self.spelling == spelling
    }
}

/// Tokenizes `source`, skipping anything the lexer does not recognise
pub fn tokenize(source: &str) -> Vec<Token> {
    let line_starts: Vec<usize> = std::iter::once(0)
        .chain(source.match_indices('\n').map(|(i, _)| i + 1))
        .collect();
    let line_of = |offset: usize| line_starts.partition_point(|&start| start <= offset);

    TokenKind::lexer(source)
        .spanned()
        .filter_map(|(kind, span)| {
            let kind = kind.ok()?;
            Some(Token {
                kind,
                spelling: source[span.clone()].to_string(),
                line: line_of(span.start),
            })
        })
        .collect()
}
