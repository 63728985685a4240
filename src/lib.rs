//! # docval
//!
//! Documentation validation for software projects.
//!
//! docval discovers the Markdown documentation of a project, parses it,
//! and runs a set of independent validators over it: freshness against
//! the related source code, internal consistency, framework best
//! practices, coverage of components and features, and code-example
//! style. The aggregated report is available from the CLI and as MCP
//! tools over stdio.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌────────────────────────┐
//! │  Discovery  │──▶│   Parser     │──▶│  Validators (parallel) │
//! │ docs dir    │   │ front-matter │   │ freshness consistency  │
//! │ walkdir     │   │ links, code  │   │ bestPractices coverage │
//! └─────────────┘   └──────────────┘   │ codeStyle              │
//!                                      └───────────┬────────────┘
//!                                                  ▼
//!                                          ┌──────────────┐
//!                          ┌───────────────│    Engine    │
//!                          ▼               └──────┬───────┘
//!                     ┌──────────┐               ▼
//!                     │   CLI    │         ┌──────────┐
//!                     │ (docval) │         │ MCP stdio│
//!                     └──────────┘         └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! docval check .                        # is there documentation?
//! docval validate . --verbosity normal  # full run, exit 1 on failure
//! docval serve mcp                      # MCP tools on stdio
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Documents, issues and reports |
//! | [`discovery`] | Docs directory and file discovery |
//! | [`markdown`] | Front-matter and Markdown structure parsing |
//! | [`lexer`] | Token scanner for code examples |
//! | [`vcs`] | Last-change timestamps from git or mtime |
//! | [`freshness`] | Doc vs. related-code staleness |
//! | [`consistency`] | Terminology, links and outdated examples |
//! | [`best_practices`] | Framework best-practice rules |
//! | [`coverage`] | Documentation coverage |
//! | [`code_style`] | Style checks on code examples |
//! | [`engine`] | Validation runs and aggregation |
//! | [`traits`] | Validator and tool extension traits |
//! | [`schema`] | Tool parameter validation |
//! | [`mcp`] | MCP protocol bridge |
//! | [`server`] | MCP server over stdio |
//! | [`report`] | Terminal rendering |
//! | [`logging`] | Tracing subscriber setup |
//! | [`error`] | Typed errors and protocol codes |

pub mod best_practices;
pub mod code_style;
pub mod config;
pub mod consistency;
pub mod coverage;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod freshness;
pub mod lexer;
pub mod logging;
pub mod markdown;
pub mod mcp;
pub mod models;
pub mod report;
pub mod schema;
pub mod server;
pub mod traits;
pub mod vcs;
