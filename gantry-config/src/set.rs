//
// Copyright (c) The Gantry Core Contributors
//
// SPDX-License-Identifier: MIT
//

use crate::error::{Error, ParseError};

// One parsed set-format line.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum SetLine {
    Set(Vec<String>),
    Delete(Vec<String>),
}

// Parses a set-format payload into its individual statements. Blank lines
// and '#' comments are skipped.
pub(crate) fn parse_lines(content: &str) -> Result<Vec<SetLine>, Error> {
    let mut lines = Vec::new();

    for (num, raw) in content.lines().enumerate() {
        let num = num + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut words = tokenize(line, num)?;
        if words.is_empty() {
            continue;
        }
        let keyword = words.remove(0);
        if words.is_empty() {
            return Err(ParseError::new(Some(num), "empty statement path").into());
        }
        match keyword.as_str() {
            "set" => lines.push(SetLine::Set(words)),
            "delete" => lines.push(SetLine::Delete(words)),
            _ => {
                return Err(ParseError::new(
                    Some(num),
                    format!("expected 'set' or 'delete', found '{}'", keyword),
                )
                .into());
            }
        }
    }

    Ok(lines)
}

// Quote-aware word splitter. Double-quoted groups form a single word and
// keep their quotes, so values containing spaces survive round trips.
fn tokenize(line: &str, num: usize) -> Result<Vec<String>, Error> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in line.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if in_quotes {
        return Err(ParseError::new(Some(num), "unterminated quote").into());
    }
    if !current.is_empty() {
        words.push(current);
    }

    Ok(words)
}

// ===== unit tests =====
