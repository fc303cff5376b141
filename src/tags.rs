//! Tag extraction from note content: inline `#tag` markers and the
//! frontmatter `tags:` key in its three accepted shapes.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

/// Inline tag marker. The tag body allows word characters, slash, hyphen,
/// underscore and the CJK block; the marker must be preceded by start of
/// text, whitespace, or a non-word, non-hyphen, non-backslash character, so
/// `a#b` and `\#x` are not tags. Word characters are ASCII here on purpose:
/// an accented letter right before `#` does not suppress the tag.
fn inline_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:^|\s|[^\\0-9A-Za-z_\-])#([0-9A-Za-z_/\-\x{4e00}-\x{9fff}]+)")
            .unwrap_or_else(|e| panic!("inline tag pattern: {e}"))
    })
}

/// Canonicalizes a raw tag: trim, strip one leading `#`, trim again, and
/// drop empty path segments, so `a//b` and `a/b` name the same tag and
/// every key matches the node path the tree builds for it. Returns `None`
/// for anything left empty.
pub fn normalize(raw: &str) -> Option<String> {
    let t = raw.trim();
    let t = t.strip_prefix('#').unwrap_or(t).trim();
    let t = t
        .split('/')
        .filter(|seg| !seg.is_empty())
        .collect::<Vec<_>>()
        .join("/");
    if t.is_empty() {
        None
    } else {
        Some(t)
    }
}

fn push_unique(out: &mut Vec<String>, seen: &mut HashSet<String>, tag: String) {
    if seen.insert(tag.clone()) {
        out.push(tag);
    }
}

/// Scans content for inline tags, deduplicated in order of first appearance.
pub fn inline_tags(content: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    for cap in inline_tag_re().captures_iter(content) {
        if let Some(m) = cap.get(1) {
            if let Some(tag) = normalize(m.as_str()) {
                push_unique(&mut out, &mut seen, tag);
            }
        }
    }
    out
}

/// The leading `---` fenced block, when the content starts with one.
fn frontmatter_block(content: &str) -> Option<&str> {
    let rest = content.strip_prefix("---")?;
    let nl = rest.find('\n')?;
    if !rest[..nl].trim().is_empty() {
        return None;
    }
    let body = &rest[nl + 1..];
    let end = body.find("\n---")?;
    let block = &body[..end];
    Some(block.strip_suffix('\r').unwrap_or(block))
}

/// The `tags:` line: case-insensitive key at line start, tail after the
/// colon. Returns the line index and the trimmed tail.
fn tags_line(fm: &str) -> Option<(usize, &str)> {
    for (i, line) in fm.lines().enumerate() {
        let Some(head) = line.get(..4) else { continue };
        if head.eq_ignore_ascii_case("tags") {
            let rest = line[4..].trim_start();
            if let Some(tail) = rest.strip_prefix(':') {
                return Some((i, tail.trim()));
            }
        }
    }
    None
}

fn strip_outer_quotes(s: &str) -> &str {
    let s = s
        .strip_prefix('"')
        .or_else(|| s.strip_prefix('\''))
        .unwrap_or(s);
    s.strip_suffix('"')
        .or_else(|| s.strip_suffix('\''))
        .unwrap_or(s)
}

fn is_quoted(s: &str) -> bool {
    let starts = s.starts_with('"') || s.starts_with('\'');
    let ends = s.ends_with('"') || s.ends_with('\'');
    s.len() >= 2 && starts && ends
}

/// Parses the frontmatter `tags:` key. Three shapes are accepted:
/// an inline bracketed list `[a, "b/c"]`, a comma-joined scalar (quoted or
/// not), and a block sequence of `- tag` lines. The block sequence skips
/// blank lines and stops at the first non-item line. A bare unquoted scalar
/// without commas yields nothing; that shape only reaches the panel through
/// the host cache.
pub fn frontmatter_tags(content: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    let Some(fm) = frontmatter_block(content) else {
        return out;
    };
    let Some((line_idx, tail)) = tags_line(fm) else {
        return out;
    };

    if let Some(inner) = tail.strip_prefix('[') {
        let inner = inner.strip_suffix(']').unwrap_or(inner);
        for part in inner.split(',') {
            let cleaned: String = part.chars().filter(|c| *c != '"' && *c != '\'').collect();
            if let Some(tag) = normalize(&cleaned) {
                push_unique(&mut out, &mut seen, tag);
            }
        }
        return out;
    }

    if is_quoted(tail) || tail.contains(',') {
        for part in strip_outer_quotes(tail).split(',') {
            if let Some(tag) = normalize(part) {
                push_unique(&mut out, &mut seen, tag);
            }
        }
        return out;
    }

    for line in fm.lines().skip(line_idx + 1) {
        let trimmed = line.trim_start();
        if let Some(item) = trimmed.strip_prefix('-') {
            if let Some(tag) = normalize(strip_outer_quotes(item.trim())) {
                push_unique(&mut out, &mut seen, tag);
            }
        } else if line.trim().is_empty() {
            continue;
        } else {
            break;
        }
    }
    out
}

/// Full raw-content extraction: inline tags first, then frontmatter tags,
/// deduplicated across both.
pub fn content_tags(content: &str) -> Vec<String> {
    let mut out = inline_tags(content);
    let mut seen: HashSet<String> = out.iter().cloned().collect();
    for tag in frontmatter_tags(content) {
        push_unique(&mut out, &mut seen, tag);
    }
    out
}

/// Splits a comma-joined scalar the way the host cache presents string
/// frontmatter values.
pub fn split_scalar_list(value: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    for part in value.split(',') {
        if let Some(tag) = normalize(part) {
            push_unique(&mut out, &mut seen, tag);
        }
    }
    out
}
