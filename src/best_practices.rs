//! Best-practices validator: a fixed catalogue of heuristic rules over
//! document prose.
//!
//! A rule fires on a prose line matching its trigger unless a mitigating
//! qualifier appears on the same line or an adjacent one. Findings are
//! advisory; only the `error` tier fails the validator.

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;

use crate::engine::ValidationContext;
use crate::models::{push_issue, Document, IssueMap, Severity, ValidationIssue, ValidatorResult};
use crate::traits::Validator;

pub const BEST_PRACTICES: &str = "bestPractices";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleCategory {
    Architecture,
    Accuracy,
    Accessibility,
}

impl RuleCategory {
    pub fn label(self) -> &'static str {
        match self {
            Self::Architecture => "architecture",
            Self::Accuracy => "accuracy",
            Self::Accessibility => "accessibility",
        }
    }
}

struct RuleSpec {
    id: &'static str,
    severity: Severity,
    category: RuleCategory,
    trigger: &'static str,
    mitigation: Option<&'static str>,
    /// Matched text that also matches this is not a finding.
    unless_match: Option<&'static str>,
    message: &'static str,
    suggestion: &'static str,
}

const LINE_RULES: &[RuleSpec] = &[
    RuleSpec {
        id: "client_rendering_default",
        severity: Severity::Error,
        category: RuleCategory::Architecture,
        trigger: r"(?i)\b(?:client[- ]side\s+rendering|client\s+rendering|csr)\s+is\s+the\s+default\b|\bcomponents?\s+(?:are|is)\s+(?:rendered\s+)?(?:on\s+the\s+client|client[- ]side|client\s+components?)\s+by\s+default\b|\bby\s+default,?\s+(?:all\s+)?components\s+(?:are|render)\s+(?:rendered\s+)?(?:on\s+the\s+client|client[- ]side)",
        mitigation: Some(r"(?i)\bpages\s+router\b|\blegacy\b|\bbefore\s+(?:next\.?js\s+)?13\b|use client|\bunless\b|\bexcept\b"),
        unless_match: None,
        message: "Claims components render on the client by default; App Router components are Server Components by default",
        suggestion: "State that components are Server Components by default and opt into the client with 'use client'",
    },
    RuleSpec {
        id: "deprecated_data_fetching",
        severity: Severity::Warning,
        category: RuleCategory::Accuracy,
        trigger: r"\b(?:getServerSideProps|getStaticProps|getInitialProps)\b",
        mitigation: Some(r"(?i)\bdeprecated\b|\blegacy\b|\bpages\s+router\b|\bmigrat\w*|\binstead\s+of\b|\breplaced\b|\bno\s+longer\b"),
        unless_match: None,
        message: "Recommends a legacy data-fetching API",
        suggestion: "Describe fetching in Server Components or route handlers, or mark the API as legacy",
    },
    RuleSpec {
        id: "legacy_router_import",
        severity: Severity::Warning,
        category: RuleCategory::Accuracy,
        trigger: r"\bnext/router\b",
        mitigation: Some(r"(?i)next/navigation|\bpages\s+router\b|\blegacy\b|\bmigrat\w*|\binstead\b"),
        unless_match: None,
        message: "References next/router, which is not available in the App Router",
        suggestion: "Use useRouter, usePathname or useSearchParams from next/navigation",
    },
    RuleSpec {
        id: "effect_data_fetching",
        severity: Severity::Warning,
        category: RuleCategory::Architecture,
        trigger: r"(?i)\b(?:fetch|load)\w*\s+(?:the\s+)?(?:data\s+)?(?:in|inside|with|using)\s+(?:a\s+|an\s+)?`?useEffect\b|\buseEffect`?\s+(?:hook\s+)?(?:to|for)\s+(?:fetch|load)\w*",
        mitigation: Some(r"(?i)\bavoid\b|\bdon'?t\b|\bdo\s+not\b|\binstead\b|\banti-?pattern\b|\bserver\s+components?\b|\bswr\b|\breact\s+query\b|\btanstack\b"),
        unless_match: None,
        message: "Suggests fetching data inside useEffect",
        suggestion: "Fetch in a Server Component, or use a data library such as SWR on the client",
    },
    RuleSpec {
        id: "image_missing_alt",
        severity: Severity::Warning,
        category: RuleCategory::Accessibility,
        trigger: r"!\[\s*\]\([^)]*\)|<(?:img|Image)\b[^>]*>",
        mitigation: None,
        unless_match: Some(r"\balt\s*="),
        message: "Image has no alternative text",
        suggestion: "Describe the image in its alt text",
    },
    RuleSpec {
        id: "non_descriptive_link_text",
        severity: Severity::Info,
        category: RuleCategory::Accessibility,
        trigger: r"(?i)\[\s*(?:click\s+here|here|read\s+more|more|this\s+link|link)\s*\]\(",
        mitigation: None,
        unless_match: None,
        message: "Link text does not describe its destination",
        suggestion: "Use link text that names the target page or action",
    },
];

const INTERACTIVE_UI: &str = r"(?i)\b(?:buttons?|forms?|modals?|dialogs?|dropdowns?|inputs?|menus?|tooltips?|tabs|keyboard\s+shortcuts?)\b";
const ACCESSIBILITY_MENTION: &str = r"(?i)accessib|\ba11y\b|\baria-?|\bscreen\s+readers?\b|\bkeyboard\s+navigation\b|\bfocus\b|\bwcag\b|\balt\s+text\b";

/// A compiled line rule.
pub struct Rule {
    pub id: &'static str,
    pub severity: Severity,
    pub category: RuleCategory,
    trigger: Regex,
    mitigation: Option<Regex>,
    unless_match: Option<Regex>,
    message: &'static str,
    suggestion: &'static str,
}

impl Rule {
    fn fires_on(&self, line: &str) -> bool {
        self.trigger.find_iter(line).any(|m| {
            self.unless_match
                .as_ref()
                .map(|u| !u.is_match(m.as_str()))
                .unwrap_or(true)
        })
    }

    fn mitigated(&self, window: &[&str]) -> bool {
        match &self.mitigation {
            Some(m) => window.iter().any(|l| m.is_match(l)),
            None => false,
        }
    }
}

/// The compiled catalogue plus the document-level accessibility check.
pub struct RuleCatalogue {
    pub rules: Vec<Rule>,
    interactive: Regex,
    accessibility: Regex,
}

impl RuleCatalogue {
    pub fn new() -> Result<Self> {
        let rules = LINE_RULES
            .iter()
            .map(|spec| {
                let compile = |p: &str| Regex::new(p).with_context(|| format!("Invalid pattern in rule {}", spec.id));
                Ok(Rule {
                    id: spec.id,
                    severity: spec.severity,
                    category: spec.category,
                    trigger: compile(spec.trigger)?,
                    mitigation: spec.mitigation.map(compile).transpose()?,
                    unless_match: spec.unless_match.map(compile).transpose()?,
                    message: spec.message,
                    suggestion: spec.suggestion,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            rules,
            interactive: Regex::new(INTERACTIVE_UI)?,
            accessibility: Regex::new(ACCESSIBILITY_MENTION)?,
        })
    }

    /// Evaluate every rule against one document.
    pub fn check(&self, doc: &Document) -> Vec<(RuleCategory, ValidationIssue)> {
        let all_lines: Vec<&str> = doc.content.lines().collect();
        let mut found = Vec::new();

        for (line_no, line) in doc.prose_lines() {
            let idx = line_no - 1;
            let window = &all_lines[idx.saturating_sub(1)..(idx + 2).min(all_lines.len())];
            for rule in &self.rules {
                if rule.fires_on(line) && !rule.mitigated(window) {
                    found.push((
                        rule.category,
                        ValidationIssue::new(BEST_PRACTICES, rule.severity, rule.id, rule.message)
                            .with_suggestion(rule.suggestion)
                            .at_line(line_no),
                    ));
                }
            }
        }

        if let Some(issue) = self.check_accessibility_guidance(doc) {
            found.push((RuleCategory::Accessibility, issue));
        }
        found
    }

    /// Interactive UI discussed on two or more prose lines with no
    /// accessibility mention anywhere in the document.
    fn check_accessibility_guidance(&self, doc: &Document) -> Option<ValidationIssue> {
        if self.accessibility.is_match(&doc.content) {
            return None;
        }
        let interactive: Vec<usize> = doc
            .prose_lines()
            .filter(|(_, l)| self.interactive.is_match(l))
            .map(|(n, _)| n)
            .collect();
        if interactive.len() < 2 {
            return None;
        }
        Some(
            ValidationIssue::new(
                BEST_PRACTICES,
                Severity::Info,
                "missing_accessibility_guidance",
                "Document describes interactive UI but gives no accessibility guidance",
            )
            .with_suggestion("Mention keyboard support, focus handling or ARIA attributes")
            .at_line(interactive[0]),
        )
    }
}

pub struct BestPracticesValidator;

#[async_trait]
impl Validator for BestPracticesValidator {
    fn name(&self) -> &str {
        BEST_PRACTICES
    }

    fn description(&self) -> &str {
        "Check documentation prose against architecture, accuracy and accessibility rules"
    }

    async fn validate(&self, ctx: &ValidationContext) -> Result<ValidatorResult> {
        let catalogue = RuleCatalogue::new()?;

        let mut documents = IssueMap::new();
        let mut by_rule: BTreeMap<String, usize> = BTreeMap::new();
        let mut by_category: BTreeMap<RuleCategory, usize> = BTreeMap::new();

        for doc in &ctx.documents {
            let key = doc.key();
            for (category, issue) in catalogue.check(doc) {
                *by_rule.entry(issue.kind.clone()).or_default() += 1;
                *by_category.entry(category).or_default() += 1;
                push_issue(&mut documents, &key, issue);
            }
        }

        let total: usize = by_rule.values().sum();
        let errors = documents
            .values()
            .flatten()
            .filter(|i| i.severity == Severity::Error)
            .count();
        let summary = format!(
            "{} findings ({} errors) across {} documents",
            total,
            errors,
            ctx.documents.len()
        );
        let by_category: BTreeMap<&str, usize> = by_category
            .into_iter()
            .map(|(c, n)| (c.label(), n))
            .collect();
        let details = json!({
            "rules": by_rule,
            "categories": by_category,
        });

        Ok(ValidatorResult::from_issues(BEST_PRACTICES, documents, summary, details))
    }
}
