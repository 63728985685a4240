//! Consistency validator: terminology, link resolution and code-example
//! pattern checks.
//!
//! All three checks append to the same per-document issue list. Code
//! examples are analysed through [`crate::lexer`], so identifiers that
//! only appear in comments or string literals never match.

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tokio::task::JoinSet;

use crate::engine::ValidationContext;
use crate::lexer::{matching_paren, shell_commands, tokenize, Syntax, Token, TokenKind};
use crate::models::{push_issue, CodeBlock, Document, IssueMap, Severity, ValidationIssue, ValidatorResult};
use crate::traits::Validator;

pub const CONSISTENCY: &str = "consistency";

/// Built-in casual → canonical terminology.
const DEFAULT_TERMINOLOGY: &[(&str, &str)] = &[
    ("server component", "Server Component"),
    ("client component", "Client Component"),
    ("server action", "Server Action"),
    ("app router", "App Router"),
    ("pages router", "Pages Router"),
    ("next js", "Next.js"),
    ("nextjs", "Next.js"),
    ("node js", "Node.js"),
    ("nodejs", "Node.js"),
    ("typescript", "TypeScript"),
    ("javascript", "JavaScript"),
    ("tailwind css", "Tailwind CSS"),
    ("github", "GitHub"),
    ("vercel", "Vercel"),
];

const CLIENT_HOOKS: &[&str] = &[
    "useState",
    "useReducer",
    "useEffect",
    "useLayoutEffect",
    "useRef",
    "useTransition",
    "useSyncExternalStore",
];
const BROWSER_GLOBALS: &[&str] = &["window", "document", "localStorage", "sessionStorage", "navigator"];
const LEGACY_DATA_APIS: &[&str] = &[
    "getServerSideProps",
    "getStaticProps",
    "getStaticPaths",
    "getInitialProps",
];
const MEMO_HELPERS: &[&str] = &["cache", "unstable_cache", "useMemo", "useSWR", "useQuery", "memoize"];
const FETCH_CACHE_OPTIONS: &[&str] = &["cache", "next"];

/// A compiled terminology mapping.
pub struct TermRule {
    pub casual: String,
    pub canonical: String,
    pattern: Regex,
}

/// Built-in terminology merged with configured overrides.
pub fn terminology_rules(extra: &BTreeMap<String, String>) -> Result<Vec<TermRule>> {
    let mut table: BTreeMap<String, String> = DEFAULT_TERMINOLOGY
        .iter()
        .map(|(c, k)| (c.to_string(), k.to_string()))
        .collect();
    for (casual, canonical) in extra {
        table.insert(casual.to_lowercase(), canonical.clone());
    }

    table
        .into_iter()
        .map(|(casual, canonical)| {
            let words: Vec<String> = casual.split_whitespace().map(regex::escape).collect();
            let pattern = Regex::new(&format!(r"(?i)\b{}\b", words.join(r"\s+")))
                .with_context(|| format!("Invalid terminology entry: {}", casual))?;
            Ok(TermRule {
                casual,
                canonical,
                pattern,
            })
        })
        .collect()
}

/// Flag casual spellings on prose lines of documents that never use the
/// canonical form. One issue per rule per matching line.
pub fn check_terminology(doc: &Document, rules: &[TermRule]) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    for rule in rules {
        if doc.content.contains(&rule.canonical) {
            continue;
        }
        for (line_no, line) in doc.prose_lines() {
            if !rule.pattern.is_match(line) {
                continue;
            }
            let corrected = rule.pattern.replace_all(line, rule.canonical.as_str());
            issues.push(
                ValidationIssue::new(
                    CONSISTENCY,
                    Severity::Warning,
                    "terminology",
                    format!(
                        "Use \"{}\" instead of \"{}\": {}",
                        rule.canonical,
                        rule.casual,
                        line.trim()
                    ),
                )
                .with_suggestion(corrected.trim().to_string())
                .at_line(line_no),
            );
        }
    }
    issues
}

/// How a link href is treated.
#[derive(Debug, PartialEq, Eq)]
pub enum LinkTarget<'a> {
    Anchor(&'a str),
    External(&'a str),
    Relative { path: &'a str, fragment: Option<&'a str> },
    Ignored,
}

pub fn classify_link(href: &str) -> LinkTarget<'_> {
    let href = href.trim();
    if href.is_empty() || href == "#" {
        return LinkTarget::Ignored;
    }
    if let Some(anchor) = href.strip_prefix('#') {
        return LinkTarget::Anchor(anchor);
    }
    if href.starts_with("//") {
        return LinkTarget::External(href);
    }
    if let Some((scheme, _)) = href.split_once(':') {
        let is_scheme = scheme
            .chars()
            .next()
            .map(|c| c.is_ascii_alphabetic())
            .unwrap_or(false)
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
        if is_scheme {
            return if scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https") {
                LinkTarget::External(href)
            } else {
                LinkTarget::Ignored
            };
        }
    }

    let (path, fragment) = match href.split_once('#') {
        Some((p, f)) => (p, Some(f).filter(|f| !f.is_empty())),
        None => (href, None),
    };
    let path = path.split('?').next().unwrap_or_default();
    if path.is_empty() {
        return match fragment {
            Some(f) => LinkTarget::Anchor(f),
            None => LinkTarget::Ignored,
        };
    }
    LinkTarget::Relative { path, fragment }
}

/// Lexically resolve `.` and `..` components.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(b) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(b);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8(out).unwrap_or_else(|_| s.to_string())
}

/// Resolve a relative link to an existing file, trying markdown fallbacks.
pub fn resolve_link_path(
    doc_dir: &Path,
    project_root: &Path,
    docs_dir: &Path,
    path: &str,
) -> Option<PathBuf> {
    let decoded = percent_decode(path);
    let bases: Vec<(&Path, &str)> = match decoded.strip_prefix('/') {
        Some(rest) => vec![(project_root, rest), (docs_dir, rest)],
        None => vec![(doc_dir, decoded.as_str())],
    };

    for (base, rel) in bases {
        let target = normalize_path(&base.join(rel));
        if target.is_file() {
            return Some(target);
        }
        let display = target.display().to_string();
        let display = display.trim_end_matches('/');
        let candidates = [
            PathBuf::from(format!("{}.md", display)),
            PathBuf::from(format!("{}.mdx", display)),
            target.join("index.md"),
            target.join("index.mdx"),
            target.join("README.md"),
        ];
        if let Some(found) = candidates.into_iter().find(|c| c.is_file()) {
            return Some(found);
        }
    }
    None
}

fn heading_ids(doc: &Document) -> BTreeSet<&str> {
    doc.headings.iter().map(|h| h.id.as_str()).collect()
}

fn anchor_exists(ids: &BTreeSet<&str>, anchor: &str) -> bool {
    let decoded = percent_decode(anchor);
    ids.contains(decoded.as_str()) || ids.contains(decoded.to_lowercase().as_str())
}

/// Check anchors and relative links of one document.
///
/// `corpus` maps normalized document paths to documents, so fragments on
/// links to sibling documents are checked against their heading ids.
pub fn check_links(
    doc: &Document,
    corpus: &HashMap<PathBuf, &Document>,
    project_root: &Path,
    docs_dir: &Path,
) -> Vec<ValidationIssue> {
    let own_ids = heading_ids(doc);
    let doc_dir = doc.path.parent().unwrap_or(docs_dir);
    let mut issues = Vec::new();

    for link in &doc.links {
        match classify_link(&link.href) {
            LinkTarget::Anchor(anchor) => {
                if !anchor_exists(&own_ids, anchor) {
                    issues.push(
                        ValidationIssue::new(
                            CONSISTENCY,
                            Severity::Error,
                            "broken_anchor",
                            format!("Anchor #{} does not match any heading in this document", anchor),
                        )
                        .with_suggestion(anchor_suggestion(&own_ids))
                        .at_line(link.line),
                    );
                }
            }
            LinkTarget::Relative { path, fragment } => {
                let Some(target) = resolve_link_path(doc_dir, project_root, docs_dir, path) else {
                    issues.push(
                        ValidationIssue::new(
                            CONSISTENCY,
                            Severity::Error,
                            "broken_link",
                            format!("Link target not found: {}", link.href),
                        )
                        .with_suggestion("Fix the path or remove the link")
                        .at_line(link.line),
                    );
                    continue;
                };
                let (Some(fragment), Some(target_doc)) = (fragment, corpus.get(&target)) else {
                    continue;
                };
                let ids = heading_ids(target_doc);
                if !anchor_exists(&ids, fragment) {
                    issues.push(
                        ValidationIssue::new(
                            CONSISTENCY,
                            Severity::Error,
                            "broken_anchor",
                            format!(
                                "Anchor #{} does not match any heading in {}",
                                fragment, target_doc.relative_path
                            ),
                        )
                        .with_suggestion(anchor_suggestion(&ids))
                        .at_line(link.line),
                    );
                }
            }
            LinkTarget::External(_) | LinkTarget::Ignored => {}
        }
    }
    issues
}

fn anchor_suggestion(ids: &BTreeSet<&str>) -> String {
    if ids.is_empty() {
        "The target document has no headings".to_string()
    } else {
        let sample: Vec<String> = ids.iter().take(5).map(|id| format!("#{}", id)).collect();
        format!("Available anchors include: {}", sample.join(", "))
    }
}

/// HEAD-checks external URLs. Results live only for one validation run.
pub struct ExternalLinkChecker {
    client: reqwest::Client,
}

impl ExternalLinkChecker {
    pub fn new(timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("docval/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }

    /// Check every URL once. The value is `Some(reason)` for broken links.
    pub async fn check_all(&self, urls: BTreeSet<String>) -> HashMap<String, Option<String>> {
        let mut tasks = JoinSet::new();
        for url in urls {
            let client = self.client.clone();
            tasks.spawn(async move {
                let target = if url.starts_with("//") {
                    format!("https:{}", url)
                } else {
                    url.clone()
                };
                let outcome = match client.head(&target).send().await {
                    Ok(resp) if resp.status().as_u16() == 405 || resp.status().as_u16() == 501 => {
                        client.get(&target).send().await.map(|r| r.status())
                    }
                    other => other.map(|r| r.status()),
                };
                let verdict = match outcome {
                    Ok(status) if status.is_success() || status.is_redirection() => None,
                    Ok(status) => Some(format!("HTTP {}", status.as_u16())),
                    Err(e) => Some(e.to_string()),
                };
                (url, verdict)
            });
        }

        let mut results = HashMap::new();
        while let Some(joined) = tasks.join_next().await {
            if let Ok((url, verdict)) = joined {
                results.insert(url, verdict);
            }
        }
        results
    }
}

/// Language family of a fenced code block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExampleLanguage {
    Script,
    Style,
    Shell,
    Other,
}

pub fn example_language(language: &str) -> ExampleLanguage {
    match language {
        "js" | "jsx" | "ts" | "tsx" | "javascript" | "typescript" | "mjs" | "cjs" => {
            ExampleLanguage::Script
        }
        "css" | "scss" | "sass" | "less" => ExampleLanguage::Style,
        "sh" | "bash" | "shell" | "zsh" | "console" | "shell-session" => ExampleLanguage::Shell,
        _ => ExampleLanguage::Other,
    }
}

fn example_issue(
    severity: Severity,
    kind: &str,
    message: String,
    suggestion: &str,
    block: &CodeBlock,
    token_line: usize,
) -> ValidationIssue {
    ValidationIssue::new(CONSISTENCY, severity, kind, message)
        .with_suggestion(suggestion)
        .at_line(block.line + token_line)
}

/// Check one code example. Returns no issues for unknown languages.
pub fn check_code_example(block: &CodeBlock) -> Vec<ValidationIssue> {
    match example_language(&block.language) {
        ExampleLanguage::Script => check_script(block),
        ExampleLanguage::Style => check_style(block),
        ExampleLanguage::Shell => check_shell(block),
        ExampleLanguage::Other => Vec::new(),
    }
}

fn check_script(block: &CodeBlock) -> Vec<ValidationIssue> {
    let tokens = tokenize(&block.body, Syntax::Script);
    let mut issues = Vec::new();

    let has_directive = tokens
        .first()
        .map(|t| t.kind == TokenKind::Str && t.text == "use client")
        .unwrap_or(false);

    if !has_directive {
        let mut features: Vec<&str> = Vec::new();
        let mut first_line = None;
        for (i, tok) in tokens.iter().enumerate() {
            let found = client_feature(&tokens, i, tok);
            if let Some(name) = found {
                first_line.get_or_insert(tok.line);
                if !features.contains(&name) {
                    features.push(name);
                }
            }
        }
        if let Some(line) = first_line {
            issues.push(example_issue(
                Severity::Error,
                "missing_use_client",
                format!(
                    "Example uses client-only features ({}) without a 'use client' directive",
                    features.join(", ")
                ),
                "Add 'use client' as the first line of the example",
                block,
                line,
            ));
        }
    }

    let mut reported: Vec<&str> = Vec::new();
    for (i, tok) in tokens.iter().enumerate() {
        if tok.kind != TokenKind::Ident || !LEGACY_DATA_APIS.contains(&tok.text) {
            continue;
        }
        if is_member_access(&tokens, i) || reported.contains(&tok.text) {
            continue;
        }
        reported.push(tok.text);
        issues.push(example_issue(
            Severity::Error,
            "outdated_pattern",
            format!("{} is a legacy data-fetching API", tok.text),
            "Fetch data in a Server Component or route handler instead",
            block,
            tok.line,
        ));
    }

    let memo_ranges: Vec<(usize, usize)> = tokens
        .iter()
        .enumerate()
        .filter(|(i, t)| {
            t.kind == TokenKind::Ident
                && MEMO_HELPERS.contains(&t.text)
                && tokens.get(i + 1).map(|n| n.is_punct('(')).unwrap_or(false)
        })
        .filter_map(|(i, _)| matching_paren(&tokens, i + 1).map(|close| (i + 1, close)))
        .collect();

    for (i, tok) in tokens.iter().enumerate() {
        if !tok.is_ident("fetch") || is_member_access(&tokens, i) {
            continue;
        }
        if !tokens.get(i + 1).map(|n| n.is_punct('(')).unwrap_or(false) {
            continue;
        }
        // `function fetch(` or `async fetch(` declarations are not calls.
        if i > 0 && (tokens[i - 1].is_ident("function")) {
            continue;
        }
        if memo_ranges.iter().any(|(open, close)| i > *open && i < *close) {
            continue;
        }
        let close = matching_paren(&tokens, i + 1).unwrap_or(tokens.len());
        let has_cache_option = tokens[i + 1..close.min(tokens.len())]
            .windows(2)
            .any(|w| w[0].kind == TokenKind::Ident && FETCH_CACHE_OPTIONS.contains(&w[0].text) && w[1].is_punct(':'));
        if has_cache_option {
            continue;
        }
        issues.push(example_issue(
            Severity::Warning,
            "unmemoized_fetch",
            "fetch() call is not wrapped in a memoization helper and sets no cache options".to_string(),
            "Wrap the call in cache()/useSWR or pass { cache: ... } / { next: { revalidate } }",
            block,
            tok.line,
        ));
    }

    issues
}

fn is_member_access(tokens: &[Token<'_>], i: usize) -> bool {
    i > 0 && tokens[i - 1].is_punct('.')
}

/// Name of the client-only feature at `tokens[i]`, if any.
fn client_feature<'a>(tokens: &[Token<'a>], i: usize, tok: &Token<'a>) -> Option<&'a str> {
    if tok.kind != TokenKind::Ident || is_member_access(tokens, i) {
        return None;
    }
    let next = tokens.get(i + 1);
    if CLIENT_HOOKS.contains(&tok.text) && next.map(|n| n.is_punct('(') || n.is_punct('<')).unwrap_or(false) {
        return Some(tok.text);
    }
    if BROWSER_GLOBALS.contains(&tok.text) && next.map(|n| n.is_punct('.')).unwrap_or(false) {
        return Some(tok.text);
    }
    let is_handler = tok.text.len() > 2
        && tok.text.starts_with("on")
        && tok.text[2..].starts_with(|c: char| c.is_ascii_uppercase());
    if is_handler
        && next.map(|n| n.is_punct('=')).unwrap_or(false)
        && tokens.get(i + 2).map(|n| n.is_punct('{')).unwrap_or(false)
    {
        return Some(tok.text);
    }
    None
}

fn check_style(block: &CodeBlock) -> Vec<ValidationIssue> {
    let tokens = tokenize(&block.body, Syntax::Style);
    tokens
        .windows(2)
        .filter(|w| w[0].is_punct('!') && w[1].is_ident("important"))
        .map(|w| {
            example_issue(
                Severity::Warning,
                "important_override",
                "Style example forces an override with !important".to_string(),
                "Increase selector specificity or use a utility class instead",
                block,
                w[0].line,
            )
        })
        .collect()
}

fn check_shell(block: &CodeBlock) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    for cmd in shell_commands(&block.body) {
        let mut words: &[String] = &cmd.words;
        let mut reasons: Vec<&str> = Vec::new();
        if words.first().map(|w| w == "sudo").unwrap_or(false) {
            reasons.push("privilege escalation (sudo)");
            words = &words[1..];
            while words.first().map(|w| w.starts_with('-')).unwrap_or(false) {
                words = &words[1..];
            }
        }
        let Some(program) = words.first() else {
            if !reasons.is_empty() {
                issues.push(shell_issue(block, cmd.line, &reasons));
            }
            continue;
        };
        let args = &words[1..];
        match program.as_str() {
            "rm" if args.iter().any(|a| is_recursive_flag(a)) => reasons.push("recursive delete"),
            "chmod" if args.iter().any(|a| is_global_permission(a)) => {
                reasons.push("global permission change")
            }
            _ => {}
        }
        if !reasons.is_empty() {
            issues.push(shell_issue(block, cmd.line, &reasons));
        }
    }
    issues
}

fn is_recursive_flag(arg: &str) -> bool {
    if arg == "--recursive" {
        return true;
    }
    arg.starts_with('-') && !arg.starts_with("--") && arg[1..].chars().any(|c| c == 'r' || c == 'R')
}

fn is_global_permission(arg: &str) -> bool {
    matches!(arg, "-R" | "--recursive" | "777" | "0777" | "666" | "a+w" | "o+w" | "a+rwx" | "ugo+rwx")
}

fn shell_issue(block: &CodeBlock, line: usize, reasons: &[&str]) -> ValidationIssue {
    example_issue(
        Severity::Warning,
        "dangerous_command",
        format!("Shell example contains a destructive command: {}", reasons.join(", ")),
        "Scope the command to a specific path or explain the risk next to it",
        block,
        line,
    )
}

/// Terminology, link and code-example checks across the corpus.
pub struct ConsistencyValidator;

#[async_trait]
impl Validator for ConsistencyValidator {
    fn name(&self) -> &str {
        CONSISTENCY
    }

    fn description(&self) -> &str {
        "Check terminology, internal links and code examples"
    }

    async fn validate(&self, ctx: &ValidationContext) -> Result<ValidatorResult> {
        let rules = terminology_rules(&ctx.config.consistency.terminology)?;
        let corpus: HashMap<PathBuf, &Document> = ctx
            .documents
            .iter()
            .map(|d| (normalize_path(&d.path), d))
            .collect();

        let mut documents = IssueMap::new();
        let mut terminology_issues = 0usize;
        let mut broken_links = 0usize;
        let mut flagged_examples = 0usize;

        for doc in &ctx.documents {
            let key = doc.key();

            let terms = check_terminology(doc, &rules);
            terminology_issues += terms.len();
            for issue in terms {
                push_issue(&mut documents, &key, issue);
            }

            let links = check_links(doc, &corpus, &ctx.project_root, &ctx.docs_dir);
            broken_links += links.len();
            for issue in links {
                push_issue(&mut documents, &key, issue);
            }

            for block in &doc.code_blocks {
                let found = check_code_example(block);
                if !found.is_empty() {
                    flagged_examples += 1;
                }
                for issue in found {
                    push_issue(&mut documents, &key, issue);
                }
            }
        }

        let mut external_checked = 0usize;
        if !ctx.skip_external_links() {
            let mut by_url: BTreeMap<String, Vec<(String, usize)>> = BTreeMap::new();
            for doc in &ctx.documents {
                for link in &doc.links {
                    if let LinkTarget::External(url) = classify_link(&link.href) {
                        by_url
                            .entry(url.to_string())
                            .or_default()
                            .push((doc.key(), link.line));
                    }
                }
            }
            external_checked = by_url.len();
            tracing::debug!(urls = external_checked, "checking external links");

            let checker = ExternalLinkChecker::new(ctx.config.consistency.external_timeout_secs)?;
            let verdicts = checker.check_all(by_url.keys().cloned().collect()).await;
            for (url, uses) in &by_url {
                let Some(Some(reason)) = verdicts.get(url) else {
                    continue;
                };
                for (key, line) in uses {
                    broken_links += 1;
                    push_issue(
                        &mut documents,
                        key,
                        ValidationIssue::new(
                            CONSISTENCY,
                            Severity::Warning,
                            "broken_external_link",
                            format!("External link {} is unreachable: {}", url, reason),
                        )
                        .at_line(*line),
                    );
                }
            }
        }

        let summary = format!(
            "{} terminology issues, {} broken links, {} code examples flagged across {} documents",
            terminology_issues,
            broken_links,
            flagged_examples,
            ctx.documents.len()
        );
        let details = json!({
            "terminologyIssues": terminology_issues,
            "brokenLinks": broken_links,
            "outdatedExamples": flagged_examples,
            "externalLinksChecked": external_checked,
        });

        Ok(ValidatorResult::from_issues(CONSISTENCY, documents, summary, details))
    }
}
