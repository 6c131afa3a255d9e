// src/core/comments.rs

//! Extraction of the comment block written directly above a function, used as
//! the default help text of a target.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // `--[[`, `--[==[`, ... at the start of a line. Captures the level and the rest.
    static ref BLOCK_OPEN_RE: Regex = Regex::new(r"^\s*--\[(=*)\[(.*)$").unwrap();
    // `-- text` at the start of a line.
    static ref LINE_RE: Regex = Regex::new(r"^\s*--\s?(.*)$").unwrap();
}

/// One comment of the script, with the (1-based) lines it spans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub text: String,
    pub first_line: usize,
    pub last_line: usize,
}

/// All comments of `source` that occupy whole lines, in source order.
pub fn parse(source: &str) -> Vec<Comment> {
    let mut comments = Vec::new();
    let mut lines = source.lines().enumerate().map(|(i, l)| (i + 1, l));

    while let Some((number, line)) = lines.next() {
        if let Some(caps) = BLOCK_OPEN_RE.captures(line) {
            let closer = format!("]{}]", caps.get(1).map_or("", |m| m.as_str()));
            let mut body = Vec::new();
            let mut rest = caps.get(2).map_or("", |m| m.as_str()).to_string();
            let mut last_line = number;
            loop {
                if let Some(end) = rest.find(&closer) {
                    body.push(block_line(rest.get(..end).unwrap_or("")));
                    break;
                }
                body.push(block_line(&rest));
                match lines.next() {
                    Some((n, l)) => {
                        last_line = n;
                        rest = l.to_string();
                    }
                    // Unterminated block: Lua itself rejects the script.
                    None => break,
                }
            }
            comments.push(Comment {
                text: body.join("\n").trim().to_string(),
                first_line: number,
                last_line,
            });
        } else if let Some(caps) = LINE_RE.captures(line) {
            comments.push(Comment {
                text: caps.get(1).map_or("", |m| m.as_str()).trim_end().to_string(),
                first_line: number,
                last_line: number,
            });
        }
    }
    comments
}

fn block_line(line: &str) -> String {
    line.trim().trim_end_matches("--").trim_end().to_string()
}

/// The contiguous run of comments ending on the line right above `line_defined`.
pub fn docstring(comments: &[Comment], line_defined: usize) -> Option<String> {
    let mut expected_end = line_defined.checked_sub(1)?;
    let mut block = Vec::new();
    for comment in comments.iter().rev() {
        if comment.last_line > expected_end {
            continue;
        }
        if comment.last_line != expected_end {
            break;
        }
        block.push(comment.text.as_str());
        expected_end = match comment.first_line.checked_sub(1) {
            Some(line) => line,
            None => break,
        };
    }
    block.reverse();

    let text = block.join("\n").trim().to_string();
    if text.is_empty() { None } else { Some(text) }
}

// MARK: --- UNIT TESTS ---
