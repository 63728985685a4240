//! Code-style validator: checks code examples and embedded HTML against
//! the project's component conventions.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use std::collections::BTreeMap;

use crate::consistency::{example_language, ExampleLanguage};
use crate::engine::ValidationContext;
use crate::lexer::{tokenize, Syntax, Token, TokenKind};
use crate::models::{push_issue, Document, IssueMap, Severity, ValidationIssue, ValidatorResult};
use crate::traits::Validator;

pub const CODE_STYLE: &str = "codeStyle";

const MARKUP_LANGUAGES: &[&str] = &["html", "vue", "svelte", "astro", "xml", "htm"];
const TYPED_LANGUAGES: &[&str] = &["ts", "tsx", "typescript"];
/// Tokens scanned past a tag name before giving up on finding its end.
const MAX_TAG_TOKENS: usize = 128;
/// Keywords after which `<` starts JSX rather than a comparison.
const JSX_LEADING_KEYWORDS: &[&str] = &["return", "yield", "await", "default", "case", "else", "do", "in", "of"];

/// An attribute value as seen by the tag scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue<'a> {
    Literal(&'a str),
    Expression,
    Flag,
}

/// An opening JSX/HTML tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenTag<'a> {
    pub name: &'a str,
    pub attrs: Vec<(&'a str, AttrValue<'a>)>,
    /// 0-based line within the scanned source.
    pub line: usize,
}

impl<'a> OpenTag<'a> {
    pub fn literal(&self, attr: &str) -> Option<&'a str> {
        self.attrs.iter().find_map(|(name, value)| match value {
            AttrValue::Literal(v) if *name == attr => Some(*v),
            _ => None,
        })
    }
}

/// True if the `<` at `tokens[i]` can start a JSX element in script source.
fn jsx_position(tokens: &[Token<'_>], i: usize) -> bool {
    let Some(prev) = i.checked_sub(1).map(|p| &tokens[p]) else {
        return true;
    };
    match prev.kind {
        TokenKind::Number | TokenKind::Str | TokenKind::Template => false,
        TokenKind::Ident => JSX_LEADING_KEYWORDS.contains(&prev.text),
        TokenKind::Punct => !(prev.is_punct(')') || prev.is_punct(']')),
    }
}

/// Find opening tags in a token stream. Markup text may precede a tag;
/// script source only opens tags where an expression can start.
pub fn open_tags<'a>(tokens: &[Token<'a>], syntax: Syntax) -> Vec<OpenTag<'a>> {
    let mut tags = Vec::new();
    let mut i = 0;
    while i + 1 < tokens.len() {
        let (open, name) = (&tokens[i], &tokens[i + 1]);
        let starts_tag = open.is_punct('<')
            && name.kind == TokenKind::Ident
            && name.line == open.line
            && (syntax == Syntax::Markup || jsx_position(tokens, i));
        if !starts_tag {
            i += 1;
            continue;
        }

        let mut tag = OpenTag {
            name: name.text,
            attrs: Vec::new(),
            line: open.line,
        };
        let mut j = i + 2;
        let limit = (i + 2 + MAX_TAG_TOKENS).min(tokens.len());
        while j < limit {
            let tok = &tokens[j];
            if tok.is_punct('>') || tok.is_punct('<') {
                break;
            }
            if tok.is_punct('/') && tokens.get(j + 1).map(|t| t.is_punct('>')).unwrap_or(false) {
                break;
            }
            if tok.kind != TokenKind::Ident {
                j += 1;
                continue;
            }
            let attr = tok.text;
            if !tokens.get(j + 1).map(|t| t.is_punct('=')).unwrap_or(false) {
                tag.attrs.push((attr, AttrValue::Flag));
                j += 1;
                continue;
            }
            match tokens.get(j + 2) {
                Some(v) if matches!(v.kind, TokenKind::Str | TokenKind::Template) => {
                    tag.attrs.push((attr, AttrValue::Literal(v.text)));
                    j += 3;
                }
                Some(v) if v.is_punct('{') => {
                    let mut depth = 0usize;
                    let mut k = j + 2;
                    while k < tokens.len() {
                        if tokens[k].is_punct('{') {
                            depth += 1;
                        } else if tokens[k].is_punct('}') {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        k += 1;
                    }
                    tag.attrs.push((attr, AttrValue::Expression));
                    j = k + 1;
                }
                _ => {
                    tag.attrs.push((attr, AttrValue::Flag));
                    j += 2;
                }
            }
        }
        tags.push(tag);
        i = j.max(i + 2);
    }
    tags
}

/// True if a script example (or an MDX import line) imports `next/image`.
pub fn imports_optimized_image(doc: &Document) -> bool {
    let from_next_image = |tokens: &[Token<'_>]| {
        tokens
            .windows(2)
            .any(|w| (w[0].is_ident("from") || w[0].is_ident("import")) && w[1].kind == TokenKind::Str && w[1].text == "next/image")
    };

    let in_blocks = doc
        .code_blocks
        .iter()
        .filter(|b| example_language(&b.language) == ExampleLanguage::Script)
        .any(|b| from_next_image(&tokenize(&b.body, Syntax::Script)));
    in_blocks
        || doc
            .prose_lines()
            .filter(|(_, l)| l.trim_start().starts_with("import "))
            .any(|(_, l)| from_next_image(&tokenize(l, Syntax::Script)))
}

fn issue(severity: Severity, kind: &str, message: impl Into<String>, suggestion: String, line: usize) -> ValidationIssue {
    ValidationIssue::new(CODE_STYLE, severity, kind, message)
        .with_suggestion(suggestion)
        .at_line(line)
}

/// Tag-level checks shared by script and markup sources.
fn check_tags(
    tokens: &[Token<'_>],
    syntax: Syntax,
    base_line: usize,
    optimized_image: bool,
) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    for tag in open_tags(tokens, syntax) {
        let line = base_line + tag.line;
        match tag.name {
            "img" if !optimized_image => {
                let src = tag.literal("src").unwrap_or("...");
                let alt = tag.literal("alt").unwrap_or("");
                issues.push(issue(
                    Severity::Warning,
                    "img_instead_of_optimized",
                    "Use the optimized Image component instead of <img>",
                    format!(
                        "import Image from 'next/image' and write <Image src=\"{}\" alt=\"{}\" width={{800}} height={{600}} />",
                        src, alt
                    ),
                    line,
                ));
            }
            "a" => {
                let Some(href) = tag.literal("href") else {
                    continue;
                };
                if href.starts_with('/') && !href.starts_with("//") {
                    issues.push(issue(
                        Severity::Info,
                        "anchor_instead_of_link",
                        format!("Internal navigation to {} uses a plain <a>", href),
                        format!("import Link from 'next/link' and write <Link href=\"{}\">", href),
                        line,
                    ));
                }
            }
            _ => {}
        }
    }
    issues
}

fn check_unsafe_html(tokens: &[Token<'_>], base_line: usize) -> Vec<ValidationIssue> {
    tokens
        .iter()
        .filter(|t| t.is_ident("dangerouslySetInnerHTML"))
        .map(|t| {
            issue(
                Severity::Error,
                "unsafe_inner_html",
                "Example injects raw HTML with dangerouslySetInnerHTML",
                "Render the content as JSX, or sanitize it before injecting".to_string(),
                base_line + t.line,
            )
        })
        .collect()
}

fn check_script_style(tokens: &[Token<'_>], base_line: usize, typed: bool) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    for (i, tok) in tokens.iter().enumerate() {
        let next = tokens.get(i + 1);
        let prev_is_dot = i > 0 && tokens[i - 1].is_punct('.');

        if tok.is_ident("var") && !prev_is_dot && next.map(|n| n.kind == TokenKind::Ident || n.is_punct('{') || n.is_punct('[')).unwrap_or(false) {
            issues.push(issue(
                Severity::Warning,
                "var_declaration",
                "Example declares a variable with var",
                "Use const, or let when the binding is reassigned".to_string(),
                base_line + tok.line,
            ));
        }

        if typed && (tok.is_punct(':') || tok.is_ident("as")) && next.map(|n| n.is_ident("any")).unwrap_or(false) {
            issues.push(issue(
                Severity::Info,
                "explicit_any",
                "Example uses the any type",
                "Give the value a concrete type or use unknown".to_string(),
                base_line + tok.line,
            ));
        }

        if tok.is_ident("console")
            && !prev_is_dot
            && next.map(|n| n.is_punct('.')).unwrap_or(false)
            && tokens.get(i + 2).map(|n| n.is_ident("log")).unwrap_or(false)
        {
            issues.push(issue(
                Severity::Info,
                "console_statement",
                "Example leaves a console.log call",
                "Remove debugging output from published examples".to_string(),
                base_line + tok.line,
            ));
        }
    }
    issues
}

/// All code-style findings for one document.
pub fn check_document(doc: &Document) -> Vec<ValidationIssue> {
    let optimized_image = imports_optimized_image(doc);
    let mut issues = Vec::new();

    for block in &doc.code_blocks {
        let is_script = example_language(&block.language) == ExampleLanguage::Script;
        let is_markup = MARKUP_LANGUAGES.contains(&block.language.as_str());
        if is_script {
            let tokens = tokenize(&block.body, Syntax::Script);
            issues.extend(check_tags(&tokens, Syntax::Script, block.line, optimized_image));
            issues.extend(check_unsafe_html(&tokens, block.line));
            issues.extend(check_script_style(
                &tokens,
                block.line,
                TYPED_LANGUAGES.contains(&block.language.as_str()),
            ));
        } else if is_markup {
            let tokens = tokenize(&block.body, Syntax::Markup);
            issues.extend(check_tags(&tokens, Syntax::Markup, block.line, optimized_image));
            issues.extend(check_unsafe_html(&tokens, block.line));
        }
    }

    for fragment in &doc.html {
        let tokens = tokenize(&fragment.html, Syntax::Markup);
        issues.extend(check_tags(&tokens, Syntax::Markup, fragment.line, optimized_image));
    }

    issues
}

pub struct CodeStyleValidator;

#[async_trait]
impl Validator for CodeStyleValidator {
    fn name(&self) -> &str {
        CODE_STYLE
    }

    fn description(&self) -> &str {
        "Check code examples and embedded HTML against component and style conventions"
    }

    async fn validate(&self, ctx: &ValidationContext) -> Result<ValidatorResult> {
        let mut documents = IssueMap::new();
        let mut by_rule: BTreeMap<String, usize> = BTreeMap::new();
        let mut examples = 0usize;

        for doc in &ctx.documents {
            examples += doc.code_blocks.len();
            let key = doc.key();
            for issue in check_document(doc) {
                *by_rule.entry(issue.kind.clone()).or_default() += 1;
                push_issue(&mut documents, &key, issue);
            }
        }

        let total: usize = by_rule.values().sum();
        let summary = format!(
            "{} style findings in {} code examples across {} documents",
            total,
            examples,
            ctx.documents.len()
        );
        let details = json!({
            "examplesChecked": examples,
            "rules": by_rule,
        });

        Ok(ValidatorResult::from_issues(CODE_STYLE, documents, summary, details))
    }
}
