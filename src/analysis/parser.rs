//! Top-level C declarations
//!
//! Walks a token stream and reports every file-scope function and variable
//! declaration: its name, whether it is a definition, and its linkage.
//! Function bodies and initializers are not parsed, only scanned for the
//! identifiers they mention.

use super::lexer::{Token, TokenKind};

/// What a declaration declares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Function,
    Variable,
}

/// Visibility of a declared name outside its translation unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Linkage {
    External,
    Internal,
}

/// One file-scope declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub kind: DeclKind,
    pub name: String,
    pub line: usize,
    pub is_definition: bool,
    pub linkage: Linkage,
    /// Identifiers used by the body or initializer, first-seen order
    pub references: Vec<String>,
}

const KEYWORDS: &[&str] = &[
    "auto", "break", "case", "char", "const", "continue", "default", "do", "double", "else",
    "enum", "extern", "float", "for", "goto", "if", "inline", "int", "long", "register",
    "restrict", "return", "short", "signed", "sizeof", "static", "struct", "switch", "typedef",
    "union", "unsigned", "void", "volatile", "while", "_Alignof", "_Atomic", "_Bool",
    "_Complex", "_Generic", "_Imaginary", "_Noreturn", "_Thread_local", "__extension__",
    "__inline", "__inline__", "__restrict", "__restrict__", "__const", "__const__",
    "__volatile", "__volatile__", "__signed", "__signed__", "__thread", "__int128",
    "__builtin_va_list",
];

/// Words that take a parenthesised argument which is never a declarator
const GROUP_WORDS: &[&str] = &[
    "__attribute__", "__attribute", "__asm__", "__asm", "asm", "__declspec", "__typeof__",
    "__typeof", "typeof", "_Alignas", "alignas", "_Static_assert", "static_assert",
];

fn is_keyword(spelling: &str) -> bool {
    KEYWORDS.contains(&spelling) || GROUP_WORDS.contains(&spelling)
}

fn is_name(token: &Token) -> bool {
    token.is(TokenKind::Identifier) && !is_keyword(&token.spelling)
}

/// Parses every file-scope declaration out of `tokens`
///
/// Preprocessor directive lines are skipped. Unbalanced input never
/// panics; at worst a declaration is missed.
pub fn parse_declarations(tokens: &[Token]) -> Vec<Declaration> {
    let mut declarations = Vec::new();
    let mut statement: Vec<&Token> = Vec::new();
    let mut depth = 0usize;
    let mut braces = 0usize;
    let mut i = 0;

    while i < tokens.len() {
        let token = &tokens[i];

        if token.is(TokenKind::Hash) && (i == 0 || tokens[i - 1].line != token.line) {
            while i < tokens.len() && tokens[i].line == token.line {
                i += 1;
            }
            continue;
        }

        match token.kind {
            TokenKind::LParen | TokenKind::LBracket => depth += 1,
            TokenKind::RParen | TokenKind::RBracket => depth = depth.saturating_sub(1),
            TokenKind::LBrace if depth == 0 && braces == 0 => {
                if let Some(name_at) = function_name(&statement) {
                    let (body, next) = brace_group(tokens, i);
                    declarations.push(Declaration {
                        kind: DeclKind::Function,
                        name: statement[name_at].spelling.clone(),
                        line: statement[name_at].line,
                        is_definition: true,
                        linkage: linkage(&statement),
                        references: references(body),
                    });
                    statement.clear();
                    i = next;
                    continue;
                }
                braces += 1;
            }
            TokenKind::LBrace => braces += 1,
            TokenKind::RBrace => braces = braces.saturating_sub(1),
            TokenKind::Semicolon if depth == 0 && braces == 0 => {
                declarations.extend(declarations_in(&statement));
                statement.clear();
                i += 1;
                continue;
            }
            _ => {}
        }

        statement.push(token);
        i += 1;
    }

    declarations
}

/// Returns the tokens inside the brace group opening at `open`, and the
/// index just past its closing brace
fn brace_group(tokens: &[Token], open: usize) -> (&[Token], usize) {
    let mut depth = 0usize;
    for (offset, token) in tokens[open..].iter().enumerate() {
        match token.kind {
            TokenKind::LBrace => depth += 1,
            TokenKind::RBrace => {
                depth -= 1;
                if depth == 0 {
                    let close = open + offset;
                    return (&tokens[open + 1..close], close + 1);
                }
            }
            _ => {}
        }
    }
    (&tokens[open + 1..], tokens.len())
}

/// Marks each token with its nesting depth within the statement
fn depths<'a>(statement: &[&'a Token]) -> Vec<(usize, &'a Token)> {
    let mut depth = 0usize;
    statement
        .iter()
        .map(|&token| match token.kind {
            TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => {
                depth += 1;
                (depth - 1, token)
            }
            TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                depth = depth.saturating_sub(1);
                (depth, token)
            }
            _ => (depth, token),
        })
        .collect()
}

/// Index of the name in a function declarator: the first top-level
/// identifier directly followed by a parameter list, if no initializer
/// comes first
fn function_name(declarator: &[&Token]) -> Option<usize> {
    let marked = depths(declarator);
    for (j, (depth, token)) in marked.iter().enumerate() {
        if *depth != 0 {
            continue;
        }
        if token.is(TokenKind::Assign) {
            return None;
        }
        if token.is(TokenKind::LParen) && j > 0 && is_name(marked[j - 1].1) {
            return Some(j - 1);
        }
    }
    None
}

fn linkage(statement: &[&Token]) -> Linkage {
    let internal = depths(statement)
        .iter()
        .any(|(depth, token)| *depth == 0 && token.is_identifier("static"));
    if internal {
        Linkage::Internal
    } else {
        Linkage::External
    }
}

/// Identifiers named in `tokens`, skipping keywords and member names
fn references<'a>(tokens: impl IntoIterator<Item = &'a Token>) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    let mut previous: [Option<&Token>; 2] = [None, None];

    for token in tokens {
        let member = match previous {
            [_, Some(dot)] if dot.spelling == "." => true,
            [Some(dash), Some(arrow)] if dash.spelling == "-" && arrow.spelling == ">" => true,
            _ => false,
        };
        if is_name(token) && !member && !names.contains(&token.spelling) {
            names.push(token.spelling.clone());
        }
        previous = [previous[1], Some(token)];
    }

    names
}

/// Declarations introduced by one `;`-terminated statement
fn declarations_in(statement: &[&Token]) -> Vec<Declaration> {
    let marked = depths(statement);
    let top_level = |word: &str| {
        marked
            .iter()
            .any(|(depth, token)| *depth == 0 && token.is_identifier(word))
    };

    if statement.is_empty() || top_level("typedef") {
        return Vec::new();
    }

    let is_extern = top_level("extern");
    let linkage = linkage(statement);

    let mut parts: Vec<&[&Token]> = Vec::new();
    let mut start = 0;
    for (j, (depth, token)) in marked.iter().enumerate() {
        if *depth == 0 && token.is(TokenKind::Comma) {
            parts.push(&statement[start..j]);
            start = j + 1;
        }
    }
    parts.push(&statement[start..]);

    let mut declarations = Vec::new();
    for part in parts {
        let assign = depths(part)
            .iter()
            .position(|(depth, token)| *depth == 0 && token.is(TokenKind::Assign));
        let (declarator, initializer) = match assign {
            Some(at) => (&part[..at], &part[at + 1..]),
            None => (part, &part[part.len()..]),
        };

        if let Some(name_at) = function_name(declarator) {
            declarations.push(Declaration {
                kind: DeclKind::Function,
                name: declarator[name_at].spelling.clone(),
                line: declarator[name_at].line,
                is_definition: false,
                linkage,
                references: Vec::new(),
            });
        } else if let Some(name) = variable_name(declarator) {
            declarations.push(Declaration {
                kind: DeclKind::Variable,
                name: name.spelling.clone(),
                line: name.line,
                is_definition: !is_extern || assign.is_some(),
                linkage,
                references: references(initializer.iter().copied()),
            });
        }
    }

    declarations
}

/// The declared name of a variable declarator, if it has one
///
/// Struct, union and enum tags, attribute groups and keywords are not
/// names. A declarator with no top-level name (a function pointer such as
/// `int (*handler)(int)`) takes the name inside its first parenthesis.
fn variable_name<'a>(declarator: &[&'a Token]) -> Option<&'a Token> {
    let marked = depths(declarator);
    let mut name = None;
    let mut after_tag = false;
    let mut skip_group = false;
    let mut group_depth = None;

    for (depth, token) in &marked {
        if let Some(open) = group_depth {
            if *depth > open || token.is(TokenKind::RParen) && *depth == open {
                if *depth == open {
                    group_depth = None;
                }
                continue;
            }
            group_depth = None;
        }
        if *depth != 0 {
            continue;
        }
        if skip_group {
            skip_group = false;
            if token.is(TokenKind::LParen) {
                group_depth = Some(0);
                continue;
            }
        }
        if GROUP_WORDS.contains(&token.spelling.as_str()) {
            skip_group = true;
            continue;
        }
        if after_tag {
            after_tag = false;
            if is_name(token) {
                continue;
            }
        }
        if ["struct", "union", "enum"].iter().any(|tag| token.is_identifier(tag)) {
            after_tag = true;
            continue;
        }
        if is_name(token) {
            name = Some(*token);
        }
    }

    name.or_else(|| {
        let first_group = marked
            .iter()
            .position(|(depth, token)| *depth == 0 && token.is(TokenKind::LParen))?;
        marked[first_group + 1..]
            .iter()
            .take_while(|(depth, _)| *depth > 0)
            .filter(|(depth, token)| *depth == 1 && is_name(token))
            .map(|(_, token)| *token)
            .last()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::lexer::tokenize;

    fn parse(source: &str) -> Vec<Declaration> {
        parse_declarations(&tokenize(source))
    }

    fn summary(source: &str) -> Vec<(String, DeclKind, bool, Linkage)> {
        parse(source)
            .into_iter()
            .map(|d| (d.name, d.kind, d.is_definition, d.linkage))
            .collect()
    }

    #[test]
    fn function_prototype_and_definition() {
        let decls = summary("int add(int a, int b);\nint add(int a, int b) { return a + b; }\n");

        assert_eq!(
            decls,
            vec![
                ("add".to_string(), DeclKind::Function, false, Linkage::External),
                ("add".to_string(), DeclKind::Function, true, Linkage::External),
            ]
        );
    }

    #[test]
    fn static_function_has_internal_linkage() {
        let decls = summary("static void helper(void) {}\n");
        assert_eq!(decls, vec![("helper".to_string(), DeclKind::Function, true, Linkage::Internal)]);
    }

    #[test]
    fn variables() {
        let decls = summary("extern int errno;\nint counter = 0, *cursor;\nstatic char buf[64];\n");

        assert_eq!(
            decls,
            vec![
                ("errno".to_string(), DeclKind::Variable, false, Linkage::External),
                ("counter".to_string(), DeclKind::Variable, true, Linkage::External),
                ("cursor".to_string(), DeclKind::Variable, true, Linkage::External),
                ("buf".to_string(), DeclKind::Variable, true, Linkage::Internal),
            ]
        );
    }

    #[test]
    fn typedefs_and_tags_declare_nothing() {
        let source = "typedef struct point { int x, y; } point_t;\nstruct list;\nenum colour { RED, GREEN };\n";
        assert!(parse(source).is_empty());
    }

    #[test]
    fn struct_typed_variable() {
        let decls = summary("struct point origin = { 0, 0 };\n");
        assert_eq!(decls, vec![("origin".to_string(), DeclKind::Variable, true, Linkage::External)]);
    }

    #[test]
    fn function_pointer_variable() {
        let decls = summary("void (*handler)(int sig);\n");
        assert_eq!(decls, vec![("handler".to_string(), DeclKind::Variable, true, Linkage::External)]);
    }

    #[test]
    fn gnu_attributes_and_asm_labels() {
        let source = "extern int printf (const char *__restrict __format, ...) __attribute__ ((__nothrow__));\n\
                      __attribute__((noreturn)) void die(void);\n\
                      extern int fileno_unlocked (int) __asm__ (\"\" \"fileno\");\n";
        let names: Vec<String> = parse(source).into_iter().map(|d| d.name).collect();

        assert_eq!(names, vec!["printf", "die", "fileno_unlocked"]);
    }

    #[test]
    fn function_body_references() {
        let source = "int main(void) {\n  struct s v;\n  v.count = helper(limit);\n  p->next = 0;\n  return helper(1);\n}\n";
        let decls = parse(source);

        assert_eq!(decls.len(), 1);
        assert_eq!(decls[0].references, vec!["s", "v", "helper", "limit", "p"]);
        assert_eq!(decls[0].line, 1);
    }

    #[test]
    fn initializer_references() {
        let decls = parse("int (*table[])(void) = { start, stop };\nint size = sizeof(table);\n");

        let size = decls.iter().find(|d| d.name == "size").unwrap();
        assert_eq!(size.references, vec!["table"]);
    }

    #[test]
    fn directive_lines_are_skipped() {
        let source = "#pragma depwalk begin_project_include\nint api(void);\n# 1 \"b.h\"\n";
        let decls = summary(source);

        assert_eq!(decls, vec![("api".to_string(), DeclKind::Function, false, Linkage::External)]);
    }

    #[test]
    fn braces_inside_strings_do_not_confuse_nesting() {
        let source = "void f(void) { puts(\"}\"); }\nint after;\n";
        let names: Vec<String> = parse(source).into_iter().map(|d| d.name).collect();

        assert_eq!(names, vec!["f", "after"]);
    }

    #[test]
    fn unbalanced_input_does_not_panic() {
        parse("int f(void) { if (x) {\n");
        parse("}} int g;\n");
        parse(")) int h(;\n");
    }
}
