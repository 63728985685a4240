use serde_json::{json, Value};
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{ChildStdin, ChildStdout, Command, Stdio};
use tempfile::TempDir;

fn docval_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("docval");
    path
}

/// Temp dir holding `config/docval.toml` and an empty `project/`.
fn setup_test_env() -> (TempDir, PathBuf, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let config_path = config_dir.join("docval.toml");
    fs::write(
        &config_path,
        r#"[freshness]
history = "mtime"

[consistency]
skip_external_links = true
"#,
    )
    .unwrap();

    let project = root.join("project");
    fs::create_dir_all(&project).unwrap();
    (tmp, config_path, project)
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn run_docval(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = docval_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env("DOCVAL_LOG", "warn")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run docval binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_check_without_docs() {
    let (_tmp, config_path, project) = setup_test_env();

    let (stdout, stderr, success) = run_docval(&config_path, &["check", project.to_str().unwrap()]);
    assert!(success, "check failed: {}", stderr);
    assert!(stdout.contains("No documentation directory found"));
    assert!(!project.join("docs").exists());
}

#[test]
fn test_check_json_counts_documents() {
    let (_tmp, config_path, project) = setup_test_env();
    write(&project, "docs/intro.md", "# Intro\n");
    write(&project, "docs/guides/setup.mdx", "# Setup\n");
    write(&project, "docs/notes.txt", "not documentation");

    let (stdout, stderr, success) = run_docval(&config_path, &["check", project.to_str().unwrap(), "--json"]);
    assert!(success, "check failed: {}", stderr);
    let check: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(check["exists"], true);
    assert_eq!(check["documentCount"], 2);
}

#[test]
fn test_validate_clean_docs_passes() {
    let (_tmp, config_path, project) = setup_test_env();
    write(&project, "docs/guide.md", "# Guide\n\nRead the [setup](./setup.md) page.\n");
    write(&project, "docs/setup.md", "# Setup\n\nInstall the dependencies.\n");

    let (stdout, stderr, success) = run_docval(
        &config_path,
        &["validate", project.to_str().unwrap(), "--validators", "consistency,codeStyle"],
    );
    assert!(success, "validate failed: {}\n{}", stdout, stderr);
    assert!(stdout.contains("consistency"));
    assert!(stdout.contains("PASSED"));
}

#[test]
fn test_validate_broken_link_fails_with_json_report() {
    let (_tmp, config_path, project) = setup_test_env();
    write(&project, "docs/guide.md", "# Guide\n\nSee [the API](./api.md) and [top](#nowhere).\n");

    let (stdout, _stderr, success) = run_docval(
        &config_path,
        &["validate", project.to_str().unwrap(), "--validators", "consistency", "--json"],
    );
    assert!(!success);

    let report: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(report["pass"], false);
    let consistency = &report["validators"]["consistency"];
    assert_eq!(consistency["pass"], false);

    let (_, issues) = consistency["documents"]
        .as_object()
        .unwrap()
        .iter()
        .find(|(k, _)| k.ends_with("guide.md"))
        .unwrap();
    let kinds: Vec<&str> = issues
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["type"].as_str().unwrap())
        .collect();
    assert!(kinds.contains(&"broken_link"));
    assert!(kinds.contains(&"broken_anchor"));
}

#[test]
fn test_validate_missing_project() {
    let (tmp, config_path, _project) = setup_test_env();
    let missing = tmp.path().join("nope");

    let (_stdout, stderr, success) = run_docval(&config_path, &["validate", missing.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("does not exist"), "stderr: {}", stderr);
}

#[test]
fn test_validate_unknown_validator() {
    let (_tmp, config_path, project) = setup_test_env();

    let (_stdout, stderr, success) = run_docval(
        &config_path,
        &["validate", project.to_str().unwrap(), "--validators", "spelling"],
    );
    assert!(!success);
    assert!(stderr.contains("unknown validator: spelling"), "stderr: {}", stderr);
}

#[test]
fn test_invalid_config_is_rejected() {
    let (_tmp, config_path, project) = setup_test_env();
    fs::write(&config_path, "[coverage]\nmin_percentage = 150\n").unwrap();

    let (_stdout, stderr, success) = run_docval(&config_path, &["check", project.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("min_percentage"), "stderr: {}", stderr);
}

// ─── MCP over stdio ─────────────────────────────────────────────────

fn send(stdin: &mut ChildStdin, message: Value) {
    writeln!(stdin, "{}", message).unwrap();
    stdin.flush().unwrap();
}

/// Next response carrying an `id`, skipping server notifications.
fn recv(stdout: &mut BufReader<ChildStdout>) -> Value {
    loop {
        let mut line = String::new();
        let n = stdout.read_line(&mut line).unwrap();
        assert!(n > 0, "server closed stdout");
        if line.trim().is_empty() {
            continue;
        }
        let message: Value = serde_json::from_str(&line).unwrap();
        if message.get("id").is_some() {
            return message;
        }
    }
}

#[test]
fn test_serve_mcp_over_stdio() {
    let (_tmp, config_path, project) = setup_test_env();
    write(&project, "docs/intro.md", "# Intro\n");

    let mut child = Command::new(docval_binary())
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(["serve", "mcp"])
        .env("DOCVAL_LOG", "warn")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();
    let mut stdin = child.stdin.take().unwrap();
    let mut stdout = BufReader::new(child.stdout.take().unwrap());

    send(
        &mut stdin,
        json!({
            "jsonrpc": "2.0", "id": 1, "method": "initialize",
            "params": {
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": { "name": "integration-test", "version": "0.0.0" }
            }
        }),
    );
    let init = recv(&mut stdout);
    assert_eq!(init["id"], 1);
    assert_eq!(init["result"]["serverInfo"]["name"], "docval");

    send(&mut stdin, json!({"jsonrpc": "2.0", "method": "notifications/initialized"}));

    send(&mut stdin, json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list", "params": {}}));
    let list = recv(&mut stdout);
    let names: Vec<&str> = list["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["validate_docs", "check_docs"]);

    send(
        &mut stdin,
        json!({
            "jsonrpc": "2.0", "id": 3, "method": "tools/call",
            "params": {
                "name": "validate_docs",
                "arguments": { "path": project.to_str().unwrap(), "options": { "skipExternalLinks": "yes" } }
            }
        }),
    );
    let bad = recv(&mut stdout);
    assert_eq!(bad["id"], 3);
    assert_eq!(bad["error"]["code"], -32602);

    send(
        &mut stdin,
        json!({
            "jsonrpc": "2.0", "id": 4, "method": "tools/call",
            "params": { "name": "check_docs", "arguments": { "path": project.to_str().unwrap() } }
        }),
    );
    let check = recv(&mut stdout);
    assert_eq!(check["id"], 4);
    assert_eq!(check["result"]["structuredContent"]["exists"], true);
    assert_eq!(check["result"]["structuredContent"]["documentCount"], 1);

    send(
        &mut stdin,
        json!({
            "jsonrpc": "2.0", "id": 5, "method": "tools/call",
            "params": { "name": "lint_docs", "arguments": {} }
        }),
    );
    let unknown = recv(&mut stdout);
    assert_eq!(unknown["error"]["code"], -32601);

    drop(stdin);
    let _ = child.wait();
}
