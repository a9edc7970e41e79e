//! Lexer for the markup subset understood by the editor, using logos
//!
//! Markup is lexed in two modes: [`ContentToken`] between tags and
//! [`TagToken`] inside a start tag. The parser morphs between them.

use logos::Logos;

/// Tokens between tags
#[derive(Logos, Debug, Clone, PartialEq, Eq)]
pub enum ContentToken<'src> {
    /// `<name`, start of a start tag
    #[regex(r"<[a-zA-Z][a-zA-Z0-9-]*", |lex| &lex.slice()[1..])]
    TagOpen(&'src str),

    /// `</name>`
    #[regex(r"</[a-zA-Z][a-zA-Z0-9-]*[ \t\r\n]*>", |lex| close_tag_name(lex.slice()))]
    TagClose(&'src str),

    /// Raw character data, entities still encoded
    #[regex(r"[^<]+", |lex| lex.slice())]
    Text(&'src str),
}

/// Tokens inside a start tag
#[derive(Logos, Debug, Clone, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n]+")]
pub enum TagToken<'src> {
    #[regex(r"[a-zA-Z_:][a-zA-Z0-9_:.-]*", |lex| lex.slice())]
    Name(&'src str),

    #[token("=")]
    Equals,

    #[regex(r#""[^"]*""#, |lex| strip_quotes(lex.slice()))]
    #[regex(r#"'[^']*'"#, |lex| strip_quotes(lex.slice()))]
    Quoted(&'src str),

    #[token(">")]
    End,

    #[token("/>")]
    SelfClose,
}

fn close_tag_name(slice: &str) -> &str {
    slice[2..].trim_end_matches('>').trim_end()
}

fn strip_quotes(slice: &str) -> &str {
    &slice[1..slice.len() - 1]
}
