//! Extension traits for validators and tools.
//!
//! Validators inspect a parsed documentation set and report issues; tools
//! are the operations exposed to agents over MCP. Both are trait objects
//! collected in a registry, so a custom check or tool can be registered
//! next to the built-in ones.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────┐
//! │               ValidatorRegistry                │
//! │  freshness · consistency · bestPractices       │
//! │  coverage · codeStyle · (custom)               │
//! └──────────────┬─────────────────────────────────┘
//!                ▼
//!          Engine::validate() → AggregateReport
//!                ▲
//! ┌──────────────┴─────────────────────────────────┐
//! │                 ToolRegistry                   │
//! │  validate_docs · check_docs · (custom)         │
//! └──────────────┬─────────────────────────────────┘
//!                ▼
//!          McpBridge → stdio
//! ```
//!
//! # Usage
//!
//! ```rust
//! use docval::traits::{ToolRegistry, ValidatorRegistry};
//!
//! let validators = ValidatorRegistry::with_builtins();
//! let tools = ToolRegistry::with_builtins(&validators);
//! assert_eq!(tools.len(), 2);
//! ```

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;

use crate::best_practices::BestPracticesValidator;
use crate::code_style::CodeStyleValidator;
use crate::consistency::ConsistencyValidator;
use crate::coverage::CoverageValidator;
use crate::engine::{Engine, ValidationContext, ValidationOptions, Verbosity};
use crate::error::ToolError;
use crate::freshness::FreshnessValidator;
use crate::models::ValidatorResult;
use crate::schema::validate_params;

// ═══════════════════════════════════════════════════════════════════════
// Validator Trait
// ═══════════════════════════════════════════════════════════════════════

/// A documentation check run once per validation request.
///
/// Validators receive the shared, read-only [`ValidationContext`] and must
/// not mutate anything outside their own result. They run concurrently
/// with each other; an `Err` is recorded as a failed result for this
/// validator only.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use anyhow::Result;
/// use docval::engine::ValidationContext;
/// use docval::models::{IssueMap, ValidatorResult};
/// use docval::traits::Validator;
///
/// pub struct NonEmptyValidator;
///
/// #[async_trait]
/// impl Validator for NonEmptyValidator {
///     fn name(&self) -> &str { "nonEmpty" }
///     fn description(&self) -> &str { "Require at least one document" }
///
///     async fn validate(&self, ctx: &ValidationContext) -> Result<ValidatorResult> {
///         let summary = format!("{} documents", ctx.documents.len());
///         Ok(ValidatorResult::from_issues(self.name(), IssueMap::new(), summary, serde_json::Value::Null))
///     }
/// }
/// ```
#[async_trait]
pub trait Validator: Send + Sync {
    /// Name used as the report key and in the `validators` option.
    fn name(&self) -> &str;

    /// One-line description for listings.
    fn description(&self) -> &str;

    /// Run the check over every document in `ctx`.
    async fn validate(&self, ctx: &ValidationContext) -> Result<ValidatorResult>;
}

/// Registry of validators, in run and report order.
pub struct ValidatorRegistry {
    validators: Vec<Arc<dyn Validator>>,
}

impl ValidatorRegistry {
    /// Create an empty validator registry.
    pub fn new() -> Self {
        Self {
            validators: Vec::new(),
        }
    }

    /// Create a registry pre-loaded with the five built-in validators.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(FreshnessValidator));
        registry.register(Arc::new(ConsistencyValidator));
        registry.register(Arc::new(BestPracticesValidator));
        registry.register(Arc::new(CoverageValidator));
        registry.register(Arc::new(CodeStyleValidator));
        registry
    }

    /// Register a validator. A later registration with the same name
    /// replaces the earlier one.
    pub fn register(&mut self, validator: Arc<dyn Validator>) {
        self.validators.retain(|v| v.name() != validator.name());
        self.validators.push(validator);
    }

    pub fn validators(&self) -> &[Arc<dyn Validator>] {
        &self.validators
    }

    /// Find a validator by name.
    pub fn find(&self, name: &str) -> Option<Arc<dyn Validator>> {
        self.validators.iter().find(|v| v.name() == name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.validators.iter().map(|v| v.name().to_string()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }
}

impl Default for ValidatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Tool Trait
// ═══════════════════════════════════════════════════════════════════════

/// What a tool call produces: the structured payload plus a one-line
/// human-readable summary.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub structured: Value,
    pub text: String,
}

/// A tool that agents can discover and call.
///
/// Parameters are checked against [`parameters_schema`](Tool::parameters_schema)
/// by [`ToolRegistry::call`] before [`execute`](Tool::execute) runs, with
/// schema defaults filled in.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Lowercase identifier with underscores (e.g. `"validate_docs"`).
    fn name(&self) -> &str;

    /// One-line description for agent discovery.
    fn description(&self) -> &str;

    /// Whether this tool ships with docval. Defaults to `false`.
    fn is_builtin(&self) -> bool {
        false
    }

    /// JSON Schema for the parameters (`type: "object"`).
    fn parameters_schema(&self) -> Value;

    /// Execute the tool with validated parameters.
    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<ToolOutput>;
}

/// Shared state handed to every tool call.
#[derive(Clone)]
pub struct ToolContext {
    engine: Arc<Engine>,
}

impl ToolContext {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }
}

/// Pull a non-blank `path` out of validated parameters.
fn project_path<'a>(tool: &str, params: &'a Value) -> Result<&'a Path, ToolError> {
    match params.get("path").and_then(|p| p.as_str()) {
        Some(p) if !p.trim().is_empty() => Ok(Path::new(p)),
        _ => Err(ToolError::invalid_params(tool, "path must be a non-empty string")),
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Built-in Tool Implementations
// ═══════════════════════════════════════════════════════════════════════

/// Full validation run. Delegates to [`Engine::validate`].
pub struct ValidateDocsTool {
    validator_names: Vec<String>,
}

impl ValidateDocsTool {
    pub fn new(validators: &ValidatorRegistry) -> Self {
        Self {
            validator_names: validators.names(),
        }
    }
}

#[async_trait]
impl Tool for ValidateDocsTool {
    fn name(&self) -> &str {
        "validate_docs"
    }

    fn description(&self) -> &str {
        "Validate a project's documentation for freshness, consistency, best practices, coverage and code style"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Project root directory" },
                "options": {
                    "type": "object",
                    "additionalProperties": false,
                    "properties": {
                        "validators": {
                            "type": "array",
                            "description": "Validators to run (default: all)",
                            "items": { "type": "string", "enum": self.validator_names }
                        },
                        "verbosity": {
                            "type": "string",
                            "enum": Verbosity::NAMES,
                            "default": "detailed"
                        },
                        "skipExternalLinks": {
                            "type": "boolean",
                            "description": "Skip network checks of external links"
                        },
                        "minCoverage": {
                            "type": "number",
                            "minimum": 0,
                            "maximum": 100,
                            "description": "Minimum coverage percentage for the coverage validator to pass"
                        }
                    }
                }
            },
            "required": ["path"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<ToolOutput> {
        let path = project_path(self.name(), &params)?;
        let options: ValidationOptions = match params.get("options") {
            Some(v) => serde_json::from_value(v.clone())
                .map_err(|e| ToolError::invalid_params(self.name(), e.to_string()))?,
            None => ValidationOptions::default(),
        };

        let report = ctx.engine().validate(path, options).await?;
        Ok(ToolOutput {
            text: report.summary_line(),
            structured: serde_json::to_value(&report)?,
        })
    }
}

/// Quick existence check. Delegates to [`Engine::check`].
pub struct CheckDocsTool;

#[async_trait]
impl Tool for CheckDocsTool {
    fn name(&self) -> &str {
        "check_docs"
    }

    fn description(&self) -> &str {
        "Check whether a project has documentation and count the documents"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Project root directory" }
            },
            "required": ["path"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<ToolOutput> {
        let path = project_path(self.name(), &params)?;
        let check = ctx.engine().check(path)?;
        Ok(ToolOutput {
            text: check.message.clone(),
            structured: serde_json::to_value(&check)?,
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Tool Registry
// ═══════════════════════════════════════════════════════════════════════

/// Registry for tools (built-in and custom).
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty tool registry.
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Create a tool registry with `validate_docs` and `check_docs`.
    pub fn with_builtins(validators: &ValidatorRegistry) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(ValidateDocsTool::new(validators)));
        registry.register(Box::new(CheckDocsTool));
        registry
    }

    /// Register a tool.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(tool);
    }

    /// Get all registered tools.
    pub fn tools(&self) -> &[Box<dyn Tool>] {
        &self.tools
    }

    /// Find a tool by name.
    pub fn find(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    /// Look up, check and run a tool, classifying any failure.
    pub async fn call(&self, name: &str, args: Value, ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
        let tool = self
            .find(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        let params = validate_params(&tool.parameters_schema(), &args)
            .map_err(|e| ToolError::invalid_params(name, e.to_string()))?;
        tool.execute(params, ctx)
            .await
            .map_err(|e| ToolError::classify(name, e))
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::codes;

    fn context() -> (ToolRegistry, ToolContext) {
        let engine = Engine::new(Arc::new(Config::default()));
        let tools = ToolRegistry::with_builtins(engine.validators());
        (tools, ToolContext::new(Arc::new(engine)))
    }

    #[test]
    fn test_builtin_validator_order() {
        let registry = ValidatorRegistry::with_builtins();
        assert_eq!(
            registry.names(),
            vec!["freshness", "consistency", "bestPractices", "coverage", "codeStyle"]
        );
        assert!(registry.find("coverage").is_some());
        assert!(registry.find("spelling").is_none());
    }

    #[test]
    fn test_validate_schema_lists_validators() {
        let registry = ValidatorRegistry::with_builtins();
        let schema = ValidateDocsTool::new(&registry).parameters_schema();
        let names = &schema["properties"]["options"]["properties"]["validators"]["items"]["enum"];
        assert_eq!(names.as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let (tools, ctx) = context();
        let err = tools.call("lint_docs", json!({}), &ctx).await.unwrap_err();
        assert_eq!(err.code(), codes::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_missing_and_blank_path() {
        let (tools, ctx) = context();
        let err = tools.call("check_docs", json!({}), &ctx).await.unwrap_err();
        assert_eq!(err.code(), codes::INVALID_PARAMS);
        let err = tools.call("check_docs", json!({"path": "  "}), &ctx).await.unwrap_err();
        assert_eq!(err.code(), codes::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_nonexistent_project_is_invalid_params() {
        let (tools, ctx) = context();
        let err = tools
            .call("validate_docs", json!({"path": "/definitely/not/here"}), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.code(), codes::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_check_docs_output() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("docs")).unwrap();
        std::fs::write(tmp.path().join("docs/guide.md"), "# Guide\n").unwrap();

        let (tools, ctx) = context();
        let out = tools
            .call("check_docs", json!({"path": tmp.path().to_str().unwrap()}), &ctx)
            .await
            .unwrap();
        assert_eq!(out.structured["exists"], true);
        assert_eq!(out.structured["documentCount"], 1);
        assert!(out.text.contains("1 documentation files"));
    }
}
