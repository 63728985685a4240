//! Markdown parsing: front-matter splitting and body tokenization.
//!
//! The body is tokenized with `pulldown-cmark`'s offset iterator so every
//! extracted heading, link, code block and raw HTML fragment keeps the line
//! number it had in the original file.

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::models::{CodeBlock, Document, FrontMatter, Heading, HtmlFragment, Link};

/// Result of splitting a leading metadata block from a document.
#[derive(Debug, Default)]
pub struct FrontMatterSplit<'a> {
    pub front_matter: Option<FrontMatter>,
    pub error: Option<String>,
    pub body: &'a str,
    /// Lines consumed by the block, delimiters included.
    pub line_offset: usize,
}

/// Split `---` YAML or `+++` TOML front-matter from the body.
///
/// A block that is present but does not decode to a map yields
/// `front_matter: None` with `error` set; the body still starts after the
/// closing delimiter.
pub fn split_front_matter(content: &str) -> FrontMatterSplit<'_> {
    let (open, closers): (&str, &[&str]) = if content.starts_with("---") {
        ("---", &["---", "..."])
    } else if content.starts_with("+++") {
        ("+++", &["+++"])
    } else {
        return FrontMatterSplit {
            body: content,
            ..Default::default()
        };
    };

    let mut lines = content.split_inclusive('\n');
    let first = lines.next().unwrap_or_default();
    if first.trim_end() != open {
        return FrontMatterSplit {
            body: content,
            ..Default::default()
        };
    }

    let mut consumed = first.len();
    let mut raw_end = None;
    let mut line_count = 1;
    for line in lines {
        line_count += 1;
        if closers.contains(&line.trim_end()) {
            raw_end = Some((first.len(), consumed));
            consumed += line.len();
            break;
        }
        consumed += line.len();
    }

    let Some((raw_start, raw_stop)) = raw_end else {
        // Unterminated block: treat the whole document as body.
        return FrontMatterSplit {
            body: content,
            error: Some(format!("unterminated front-matter block (missing closing '{}')", open)),
            ..Default::default()
        };
    };

    let raw = &content[raw_start..raw_stop];
    let body = &content[consumed..];
    let parsed = if open == "---" {
        parse_yaml_front_matter(raw)
    } else {
        parse_toml_front_matter(raw)
    };

    match parsed {
        Ok(fm) => FrontMatterSplit {
            front_matter: Some(fm),
            error: None,
            body,
            line_offset: line_count,
        },
        Err(e) => FrontMatterSplit {
            front_matter: None,
            error: Some(e),
            body,
            line_offset: line_count,
        },
    }
}

fn parse_yaml_front_matter(raw: &str) -> Result<FrontMatter, String> {
    if raw.trim().is_empty() {
        return Ok(FrontMatter::new());
    }
    match serde_yaml::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(Value::Null) => Ok(FrontMatter::new()),
        Ok(other) => Err(format!("front-matter is not a key/value map (got {})", json_kind(&other))),
        Err(e) => Err(format!("invalid YAML front-matter: {}", e)),
    }
}

fn parse_toml_front_matter(raw: &str) -> Result<FrontMatter, String> {
    let table: toml::Table = toml::from_str(raw).map_err(|e| format!("invalid TOML front-matter: {}", e))?;
    Ok(table.into_iter().map(|(k, v)| (k, toml_to_json(v))).collect())
}

/// Native TOML datetimes become their string form so date fields read the
/// same as in YAML front-matter.
fn toml_to_json(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::from(i),
        toml::Value::Float(f) => serde_json::Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(d) => Value::String(d.to_string()),
        toml::Value::Array(items) => Value::Array(items.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(table.into_iter().map(|(k, v)| (k, toml_to_json(v))).collect()),
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Headings, links, code blocks and HTML extracted from a markdown body.
#[derive(Debug, Default)]
pub struct BodyTokens {
    pub headings: Vec<Heading>,
    pub links: Vec<Link>,
    pub code_blocks: Vec<CodeBlock>,
    pub html: Vec<HtmlFragment>,
}

/// Tokenize a markdown body. `line_offset` is added to every line number.
pub fn tokenize_body(body: &str, line_offset: usize) -> BodyTokens {
    let line_starts: Vec<usize> = std::iter::once(0)
        .chain(body.match_indices('\n').map(|(i, _)| i + 1))
        .collect();
    let line_of = |byte: usize| line_starts.partition_point(|&start| start <= byte) + line_offset;

    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_HEADING_ATTRIBUTES);

    let mut tokens = BodyTokens::default();
    let mut slugs = SlugCounter::default();

    let mut heading: Option<(u8, Option<String>, usize, String)> = None;
    let mut link: Option<(String, usize, String)> = None;
    let mut code: Option<CodeBlock> = None;

    for (event, range) in Parser::new_ext(body, options).into_offset_iter() {
        match event {
            Event::Start(Tag::Heading { level, id, .. }) => {
                heading = Some((
                    heading_level(level),
                    id.map(|i| i.to_string()),
                    line_of(range.start),
                    String::new(),
                ));
            }
            Event::End(TagEnd::Heading(_)) => {
                if let Some((level, explicit_id, line, text)) = heading.take() {
                    let text = text.trim().to_string();
                    let id = match explicit_id {
                        Some(id) => slugs.claim(id),
                        None => slugs.claim(slugify(&text)),
                    };
                    tokens.headings.push(Heading {
                        level,
                        text,
                        id,
                        line,
                    });
                }
            }
            Event::Start(Tag::Link { dest_url, .. }) => {
                link = Some((dest_url.to_string(), line_of(range.start), String::new()));
            }
            Event::End(TagEnd::Link) => {
                if let Some((href, line, text)) = link.take() {
                    tokens.links.push(Link { text, href, line });
                }
            }
            Event::Start(Tag::CodeBlock(kind)) => {
                let (language, first_line) = match kind {
                    CodeBlockKind::Fenced(info) => (
                        info.split(|c: char| c.is_whitespace() || c == ',' || c == '{')
                            .next()
                            .unwrap_or_default()
                            .to_lowercase(),
                        line_of(range.start) + 1,
                    ),
                    CodeBlockKind::Indented => (String::new(), line_of(range.start)),
                };
                let end = range.end.saturating_sub(1).max(range.start);
                code = Some(CodeBlock {
                    language,
                    body: String::new(),
                    line: first_line,
                    end_line: line_of(end),
                });
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some(block) = code.take() {
                    tokens.code_blocks.push(block);
                }
            }
            Event::Text(text) | Event::Code(text) => {
                if let Some(block) = code.as_mut() {
                    block.body.push_str(&text);
                    continue;
                }
                if let Some((_, _, _, buf)) = heading.as_mut() {
                    buf.push_str(&text);
                }
                if let Some((_, _, buf)) = link.as_mut() {
                    buf.push_str(&text);
                }
            }
            Event::Html(html) | Event::InlineHtml(html) => {
                tokens.html.push(HtmlFragment {
                    html: html.to_string(),
                    line: line_of(range.start),
                });
            }
            _ => {}
        }
    }

    tokens
}

fn heading_level(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

/// GitHub-style heading slug.
pub fn slugify(text: &str) -> String {
    text.trim()
        .to_lowercase()
        .chars()
        .filter_map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                Some(c)
            } else if c.is_whitespace() {
                Some('-')
            } else {
                None
            }
        })
        .collect()
}

/// Disambiguates repeated slugs the way GitHub does (`intro`, `intro-1`, …).
#[derive(Default)]
struct SlugCounter {
    seen: HashMap<String, usize>,
}

impl SlugCounter {
    fn claim(&mut self, slug: String) -> String {
        match self.seen.get_mut(&slug) {
            None => {
                self.seen.insert(slug.clone(), 0);
                slug
            }
            Some(n) => {
                *n += 1;
                let candidate = format!("{}-{}", slug, n);
                self.seen.insert(candidate.clone(), 0);
                candidate
            }
        }
    }
}

/// Parse a complete document from its path and content.
pub fn parse_document(path: PathBuf, relative_path: String, content: String) -> Document {
    let split = split_front_matter(&content);
    let line_offset = split.line_offset;
    let tokens = tokenize_body(split.body, line_offset);
    let front_matter = split.front_matter;
    let front_matter_error = split.error;

    Document {
        path,
        relative_path,
        front_matter,
        front_matter_error,
        body_line_offset: line_offset,
        headings: tokens.headings,
        links: tokens.links,
        code_blocks: tokens.code_blocks,
        html: tokens.html,
        content,
    }
}
