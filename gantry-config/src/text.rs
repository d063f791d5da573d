//
// Copyright (c) The Gantry Core Contributors
//
// SPDX-License-Identifier: MIT
//

use crate::error::{Error, ParseError};
use crate::tree::{ConfigNode, ConfigTree};

const INDENT: usize = 4;

#[derive(Debug, Eq, PartialEq)]
enum Token {
    Word(String),
    Open,
    Close,
    Semi,
}

#[derive(Debug)]
struct SpannedToken {
    token: Token,
    line: usize,
}

// ===== parsing =====

pub(crate) fn parse(content: &str) -> Result<ConfigTree, Error> {
    let tokens = tokenize(content)?;
    let mut tree = ConfigTree::new();
    let mut pos = 0;
    parse_block(&tokens, &mut pos, &mut tree.root, 0)?;
    Ok(tree)
}

fn tokenize(content: &str) -> Result<Vec<SpannedToken>, Error> {
    let mut tokens = Vec::new();
    let mut chars = content.chars().peekable();
    let mut line = 1;

    while let Some(c) = chars.next() {
        match c {
            '\n' => line += 1,
            c if c.is_whitespace() => (),
            '#' => {
                // Comment runs to end of line.
                while let Some(&next) = chars.peek() {
                    if next == '\n' {
                        break;
                    }
                    chars.next();
                }
            }
            '{' => tokens.push(SpannedToken { token: Token::Open, line }),
            '}' => tokens.push(SpannedToken { token: Token::Close, line }),
            ';' => tokens.push(SpannedToken { token: Token::Semi, line }),
            '"' => {
                let start = line;
                let mut word = String::from('"');
                let mut closed = false;
                for next in chars.by_ref() {
                    if next == '\n' {
                        line += 1;
                    }
                    word.push(next);
                    if next == '"' {
                        closed = true;
                        break;
                    }
                }
                if !closed {
                    return Err(ParseError::new(
                        Some(start),
                        "unterminated quote",
                    )
                    .into());
                }
                tokens.push(SpannedToken { token: Token::Word(word), line });
            }
            c => {
                let mut word = String::from(c);
                while let Some(&next) = chars.peek() {
                    if next.is_whitespace()
                        || matches!(next, '{' | '}' | ';' | '#' | '"')
                    {
                        break;
                    }
                    word.push(next);
                    chars.next();
                }
                tokens.push(SpannedToken { token: Token::Word(word), line });
            }
        }
    }

    Ok(tokens)
}

// Parses statements into `node` until the block closes (or, at depth 0,
// the input ends).
fn parse_block(
    tokens: &[SpannedToken],
    pos: &mut usize,
    node: &mut ConfigNode,
    depth: usize,
) -> Result<(), Error> {
    let mut words: Vec<String> = Vec::new();

    while let Some(spanned) = tokens.get(*pos) {
        *pos += 1;
        match &spanned.token {
            Token::Word(word) => words.push(word.clone()),
            Token::Semi => {
                if words.is_empty() {
                    return Err(ParseError::new(
                        Some(spanned.line),
                        "empty statement",
                    )
                    .into());
                }
                insert_leaf(node, &std::mem::take(&mut words));
            }
            Token::Open => {
                if words.is_empty() {
                    return Err(ParseError::new(
                        Some(spanned.line),
                        "block with no statement name",
                    )
                    .into());
                }
                let container = descend(node, &std::mem::take(&mut words));
                parse_block(tokens, pos, container, depth + 1)?;
            }
            Token::Close => {
                if !words.is_empty() {
                    return Err(ParseError::new(
                        Some(spanned.line),
                        "statement missing ';'",
                    )
                    .into());
                }
                if depth == 0 {
                    return Err(ParseError::new(
                        Some(spanned.line),
                        "unexpected '}'",
                    )
                    .into());
                }
                return Ok(());
            }
        }
    }

    if depth != 0 {
        return Err(ParseError::new(None, "missing '}'").into());
    }
    if !words.is_empty() {
        return Err(ParseError::new(None, "statement missing ';'").into());
    }
    Ok(())
}

// A leaf statement `a b c;` nests as a -> b with value "c"; a single word
// is a presence statement.
fn insert_leaf(node: &mut ConfigNode, words: &[String]) {
    match words {
        [word] => {
            node.children.entry(word.clone()).or_default();
        }
        [path @ .., value] => {
            let leaf = descend(node, path);
            leaf.value = Some(value.clone());
        }
        [] => unreachable!(),
    }
}

fn descend<'a>(
    node: &'a mut ConfigNode,
    words: &[String],
) -> &'a mut ConfigNode {
    let mut node = node;
    for word in words {
        node = node.children.entry(word.clone()).or_default();
    }
    node
}

// ===== rendering =====

pub(crate) fn render(tree: &ConfigTree) -> String {
    let mut out = String::new();
    render_children(&tree.root, 0, &mut out);
    out
}

fn render_children(node: &ConfigNode, depth: usize, out: &mut String) {
    let pad = " ".repeat(depth * INDENT);
    for (name, child) in &node.children {
        if child.children.is_empty() {
            match &child.value {
                Some(value) => {
                    out.push_str(&format!("{}{} {};\n", pad, name, value))
                }
                None => out.push_str(&format!("{}{};\n", pad, name)),
            }
        } else {
            match &child.value {
                Some(value) => {
                    out.push_str(&format!("{}{} {} {{\n", pad, name, value))
                }
                None => out.push_str(&format!("{}{} {{\n", pad, name)),
            }
            render_children(child, depth + 1, out);
            out.push_str(&format!("{}}}\n", pad));
        }
    }
}

// ===== unit tests =====
