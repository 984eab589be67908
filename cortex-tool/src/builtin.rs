//! The canonical tool set (spec §4.3 table): real, minimal, local-process
//! implementations of `bash`, `read_file`, `write_file`, `edit`, `grep`,
//! `ls`, `web`, `git`, and `memory`.
//!
//! Path/command safety (rejecting `..`, secrets-looking paths, dangerous
//! subcommands) is the Approval Gate's and permission policy's job
//! (`cortex-exec`), not this registry's — these implementations do
//! whatever they're asked, same as `neuron-tool::builtin`'s tools do.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::process::Stdio;
use std::sync::Arc;

use cortex_core::state::{Scope, StateStore};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::registry::ToolDyn;
use crate::result::ToolResult;
use crate::schema::{ParamType, ParameterSchema, Sensitivity, ToolSchema};

fn arg_str<'a>(args: &'a serde_json::Value, name: &str) -> Option<&'a str> {
    args.get(name).and_then(|v| v.as_str())
}

/// Truncate output that would otherwise blow the caller's token budget.
const MAX_OUTPUT_BYTES: usize = 32_000;

fn truncate(mut s: String) -> String {
    if s.len() > MAX_OUTPUT_BYTES {
        let mut end = MAX_OUTPUT_BYTES;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        s.truncate(end);
        s.push_str("\n... (truncated)");
    }
    s
}

/// Runs an arbitrary shell command through the system shell.
pub struct BashTool {
    schema: ToolSchema,
}

impl Default for BashTool {
    fn default() -> Self {
        Self {
            schema: ToolSchema {
                name: "bash".into(),
                description: "run a shell command".into(),
                parameters: vec![
                    ParameterSchema::required("command", ParamType::String, "the command to run"),
                    ParameterSchema::optional(
                        "cwd",
                        ParamType::String,
                        "working directory, defaults to the process cwd",
                    ),
                ],
                category: Sensitivity::High,
            },
        }
    }
}

impl ToolDyn for BashTool {
    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    fn execute(
        &self,
        args: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = ToolResult> + Send + '_>> {
        Box::pin(async move {
            let Some(command) = arg_str(&args, "command") else {
                return ToolResult::err("missing command");
            };
            let mut cmd = Command::new("/bin/sh");
            cmd.arg("-c").arg(command);
            if let Some(cwd) = arg_str(&args, "cwd") {
                cmd.current_dir(cwd);
            }
            match cmd.output().await {
                Ok(output) => {
                    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
                    if !output.stderr.is_empty() {
                        combined.push_str("\n--- stderr ---\n");
                        combined.push_str(&String::from_utf8_lossy(&output.stderr));
                    }
                    if output.status.success() {
                        ToolResult::ok(truncate(combined))
                    } else {
                        ToolResult::err(format!(
                            "exit status {}: {}",
                            output.status.code().unwrap_or(-1),
                            truncate(combined)
                        ))
                    }
                }
                Err(e) => ToolResult::err(format!("spawn failed: {e}")),
            }
        })
    }
}

/// Reads a file's contents as UTF-8 (lossy).
pub struct ReadFileTool {
    schema: ToolSchema,
}

impl Default for ReadFileTool {
    fn default() -> Self {
        Self {
            schema: ToolSchema {
                name: "read_file".into(),
                description: "read file contents".into(),
                parameters: vec![ParameterSchema::required(
                    "path",
                    ParamType::String,
                    "path of the file to read",
                )],
                category: Sensitivity::Low,
            },
        }
    }
}

impl ToolDyn for ReadFileTool {
    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    fn execute(
        &self,
        args: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = ToolResult> + Send + '_>> {
        Box::pin(async move {
            let Some(path) = arg_str(&args, "path") else {
                return ToolResult::err("missing path");
            };
            match tokio::fs::read(path).await {
                Ok(bytes) => ToolResult::ok(truncate(String::from_utf8_lossy(&bytes).into_owned())),
                Err(e) => ToolResult::err(format!("read failed: {e}")),
            }
        })
    }
}

/// Creates or overwrites a file with the given content.
pub struct WriteFileTool {
    schema: ToolSchema,
}

impl Default for WriteFileTool {
    fn default() -> Self {
        Self {
            schema: ToolSchema {
                name: "write_file".into(),
                description: "create/overwrite a file".into(),
                parameters: vec![
                    ParameterSchema::required("path", ParamType::String, "path of the file to write"),
                    ParameterSchema::required("content", ParamType::String, "the exact bytes to write"),
                ],
                category: Sensitivity::High,
            },
        }
    }
}

impl ToolDyn for WriteFileTool {
    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    fn execute(
        &self,
        args: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = ToolResult> + Send + '_>> {
        Box::pin(async move {
            let Some(path) = arg_str(&args, "path") else {
                return ToolResult::err("missing path");
            };
            let Some(content) = arg_str(&args, "content") else {
                return ToolResult::err("missing content");
            };
            if let Some(parent) = Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    if let Err(e) = tokio::fs::create_dir_all(parent).await {
                        return ToolResult::err(format!("mkdir failed: {e}"));
                    }
                }
            }
            match tokio::fs::File::create(path).await {
                Ok(mut file) => match file.write_all(content.as_bytes()).await {
                    Ok(()) => ToolResult::ok(format!("wrote {} bytes to {path}", content.len())),
                    Err(e) => ToolResult::err(format!("write failed: {e}")),
                },
                Err(e) => ToolResult::err(format!("create failed: {e}")),
            }
        })
    }
}

/// Replaces the first occurrence of an exact string in a file.
pub struct EditTool {
    schema: ToolSchema,
}

impl Default for EditTool {
    fn default() -> Self {
        Self {
            schema: ToolSchema {
                name: "edit".into(),
                description: "string-replace in a file".into(),
                parameters: vec![
                    ParameterSchema::required("path", ParamType::String, "path of the file to edit"),
                    ParameterSchema::required("old_string", ParamType::String, "exact text to replace"),
                    ParameterSchema::required("new_string", ParamType::String, "replacement text"),
                ],
                category: Sensitivity::Medium,
            },
        }
    }
}

impl ToolDyn for EditTool {
    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    fn execute(
        &self,
        args: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = ToolResult> + Send + '_>> {
        Box::pin(async move {
            let Some(path) = arg_str(&args, "path") else {
                return ToolResult::err("missing path");
            };
            let Some(old) = arg_str(&args, "old_string") else {
                return ToolResult::err("missing old_string");
            };
            let Some(new) = arg_str(&args, "new_string") else {
                return ToolResult::err("missing new_string");
            };
            let current = match tokio::fs::read_to_string(path).await {
                Ok(c) => c,
                Err(e) => return ToolResult::err(format!("read failed: {e}")),
            };
            let Some(pos) = current.find(old) else {
                return ToolResult::err("old_string not found in file");
            };
            let mut updated = String::with_capacity(current.len());
            updated.push_str(&current[..pos]);
            updated.push_str(new);
            updated.push_str(&current[pos + old.len()..]);
            match tokio::fs::write(path, updated).await {
                Ok(()) => ToolResult::ok("edit applied"),
                Err(e) => ToolResult::err(format!("write failed: {e}")),
            }
        })
    }
}

/// Regex search over a file or directory tree.
pub struct GrepTool {
    schema: ToolSchema,
}

impl Default for GrepTool {
    fn default() -> Self {
        Self {
            schema: ToolSchema {
                name: "grep".into(),
                description: "pattern search".into(),
                parameters: vec![
                    ParameterSchema::required("pattern", ParamType::String, "regular expression to match"),
                    ParameterSchema::optional("path", ParamType::String, "file or directory to search, defaults to '.'"),
                ],
                category: Sensitivity::Low,
            },
        }
    }
}

fn walk(root: &Path, out: &mut Vec<std::path::PathBuf>) {
    let Ok(entries) = std::fs::read_dir(root) else { return };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            walk(&path, out);
        } else {
            out.push(path);
        }
    }
}

impl ToolDyn for GrepTool {
    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    fn execute(
        &self,
        args: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = ToolResult> + Send + '_>> {
        Box::pin(async move {
            let Some(pattern) = arg_str(&args, "pattern") else {
                return ToolResult::err("missing pattern");
            };
            let path = arg_str(&args, "path").unwrap_or(".").to_string();
            let re = match regex::Regex::new(pattern) {
                Ok(re) => re,
                Err(e) => return ToolResult::err(format!("bad pattern: {e}")),
            };
            let root = std::path::PathBuf::from(&path);
            let files = tokio::task::spawn_blocking(move || {
                let mut files = Vec::new();
                if root.is_dir() {
                    walk(&root, &mut files);
                } else {
                    files.push(root);
                }
                files
            })
            .await
            .unwrap_or_default();

            let mut matches = Vec::new();
            for file in files {
                let Ok(content) = tokio::fs::read_to_string(&file).await else {
                    continue;
                };
                for (lineno, line) in content.lines().enumerate() {
                    if re.is_match(line) {
                        matches.push(format!("{}:{}: {line}", file.display(), lineno + 1));
                    }
                }
            }
            if matches.is_empty() {
                ToolResult::ok("")
            } else {
                ToolResult::ok(truncate(matches.join("\n")))
            }
        })
    }
}

/// Lists a directory's immediate entries.
pub struct LsTool {
    schema: ToolSchema,
}

impl Default for LsTool {
    fn default() -> Self {
        Self {
            schema: ToolSchema {
                name: "ls".into(),
                description: "list directory".into(),
                parameters: vec![ParameterSchema::optional(
                    "path",
                    ParamType::String,
                    "directory to list, defaults to '.'",
                )],
                category: Sensitivity::Low,
            },
        }
    }
}

impl ToolDyn for LsTool {
    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    fn execute(
        &self,
        args: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = ToolResult> + Send + '_>> {
        Box::pin(async move {
            let path = arg_str(&args, "path").unwrap_or(".");
            match tokio::fs::read_dir(path).await {
                Ok(mut reader) => {
                    let mut names = Vec::new();
                    loop {
                        match reader.next_entry().await {
                            Ok(Some(entry)) => {
                                let suffix = if entry.path().is_dir() { "/" } else { "" };
                                names.push(format!("{}{suffix}", entry.file_name().to_string_lossy()));
                            }
                            Ok(None) => break,
                            Err(e) => return ToolResult::err(format!("read_dir failed: {e}")),
                        }
                    }
                    names.sort();
                    ToolResult::ok(names.join("\n"))
                }
                Err(e) => ToolResult::err(format!("ls failed: {e}")),
            }
        })
    }
}

/// Fetches a URL's body. "search" is treated as a fetch against the given
/// URL; a real search backend is an external collaborator (spec §1 scope).
pub struct WebTool {
    schema: ToolSchema,
    client: reqwest::Client,
}

impl Default for WebTool {
    fn default() -> Self {
        Self {
            schema: ToolSchema {
                name: "web".into(),
                description: "search or fetch URL".into(),
                parameters: vec![ParameterSchema::required(
                    "url",
                    ParamType::String,
                    "URL to fetch",
                )],
                category: Sensitivity::Medium,
            },
            client: reqwest::Client::new(),
        }
    }
}

impl ToolDyn for WebTool {
    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    fn execute(
        &self,
        args: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = ToolResult> + Send + '_>> {
        Box::pin(async move {
            let Some(url) = arg_str(&args, "url") else {
                return ToolResult::err("missing url");
            };
            match self.client.get(url).send().await {
                Ok(response) => {
                    let status = response.status();
                    match response.text().await {
                        Ok(body) if status.is_success() => ToolResult::ok(truncate(body)),
                        Ok(body) => ToolResult::err(format!("http {status}: {}", truncate(body))),
                        Err(e) => ToolResult::err(format!("body read failed: {e}")),
                    }
                }
                Err(e) => ToolResult::err(format!("request failed: {e}")),
            }
        })
    }
}

/// Runs a git subcommand in a working directory.
pub struct GitTool {
    schema: ToolSchema,
}

impl Default for GitTool {
    fn default() -> Self {
        Self {
            schema: ToolSchema {
                name: "git".into(),
                description: "git subcommand".into(),
                parameters: vec![
                    ParameterSchema::required("args", ParamType::Array, "git arguments, e.g. ['status']"),
                    ParameterSchema::optional("cwd", ParamType::String, "repository root, defaults to the process cwd"),
                ],
                category: Sensitivity::Medium,
            },
        }
    }
}

impl ToolDyn for GitTool {
    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    fn execute(
        &self,
        args: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = ToolResult> + Send + '_>> {
        Box::pin(async move {
            let Some(git_args) = args.get("args").and_then(|v| v.as_array()) else {
                return ToolResult::err("missing args");
            };
            let git_args: Vec<String> = git_args
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect();
            let mut cmd = Command::new("git");
            cmd.args(&git_args).stdin(Stdio::null());
            if let Some(cwd) = arg_str(&args, "cwd") {
                cmd.current_dir(cwd);
            }
            match cmd.output().await {
                Ok(output) => {
                    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
                    if !output.stderr.is_empty() {
                        combined.push_str(&String::from_utf8_lossy(&output.stderr));
                    }
                    if output.status.success() {
                        ToolResult::ok(truncate(combined))
                    } else {
                        ToolResult::err(truncate(combined))
                    }
                }
                Err(e) => ToolResult::err(format!("spawn failed: {e}")),
            }
        })
    }
}

/// Reads from or writes to the knowledge store (spec §4.3: "read/write
/// knowledge store"). Backed by any [`StateStore`], normally `cortex-store`.
pub struct MemoryTool {
    schema: ToolSchema,
    store: Arc<dyn StateStore>,
}

impl MemoryTool {
    /// Wrap a state store as the `memory` tool.
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self {
            schema: ToolSchema {
                name: "memory".into(),
                description: "read/write knowledge store".into(),
                parameters: vec![
                    ParameterSchema::required("operation", ParamType::String, "read, write, delete, or list")
                        .with_enum(["read", "write", "delete", "list"]),
                    ParameterSchema::required("scope", ParamType::String, "project or session")
                        .with_enum(["project", "session"]),
                    ParameterSchema::required("scope_id", ParamType::String, "id of the project or session"),
                    ParameterSchema::optional("key", ParamType::String, "key to read/write/delete, or prefix for list"),
                    ParameterSchema::optional("value", ParamType::String, "JSON value to write"),
                ],
                category: Sensitivity::Low,
            },
            store,
        }
    }

    fn scope_of(args: &serde_json::Value) -> Result<Scope, String> {
        let scope = arg_str(args, "scope").ok_or("missing scope")?;
        let id = arg_str(args, "scope_id").ok_or("missing scope_id")?.to_string();
        match scope {
            "project" => Ok(Scope::Project(id)),
            "session" => Ok(Scope::Session(id)),
            other => Err(format!("unknown scope '{other}'")),
        }
    }
}

impl ToolDyn for MemoryTool {
    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    fn execute(
        &self,
        args: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = ToolResult> + Send + '_>> {
        Box::pin(async move {
            let operation = arg_str(&args, "operation").unwrap_or_default();
            let scope = match Self::scope_of(&args) {
                Ok(scope) => scope,
                Err(e) => return ToolResult::err(e),
            };
            let key = arg_str(&args, "key").unwrap_or_default();

            match operation {
                "read" => match self.store.read(&scope, key).await {
                    Ok(Some(value)) => ToolResult::ok(value.to_string()),
                    Ok(None) => ToolResult::err(format!("not found: {key}")),
                    Err(e) => ToolResult::err(e.to_string()),
                },
                "write" => {
                    let Some(raw) = arg_str(&args, "value") else {
                        return ToolResult::err("missing value");
                    };
                    let value: serde_json::Value = match serde_json::from_str(raw) {
                        Ok(v) => v,
                        Err(_) => serde_json::Value::String(raw.to_string()),
                    };
                    match self.store.write(&scope, key, value).await {
                        Ok(()) => ToolResult::ok("written"),
                        Err(e) => ToolResult::err(e.to_string()),
                    }
                }
                "delete" => match self.store.delete(&scope, key).await {
                    Ok(()) => ToolResult::ok("deleted"),
                    Err(e) => ToolResult::err(e.to_string()),
                },
                "list" => match self.store.list(&scope, key).await {
                    Ok(keys) => ToolResult::ok(keys.join("\n")),
                    Err(e) => ToolResult::err(e.to_string()),
                },
                other => ToolResult::err(format!("unknown operation '{other}'")),
            }
        })
    }
}

/// Build a registry with the full canonical tool set (spec §4.3 table)
/// registered under their default schemas.
pub fn canonical_registry(memory_store: Arc<dyn StateStore>) -> crate::registry::ToolRegistry {
    let mut registry = crate::registry::ToolRegistry::new();
    registry.register(Arc::new(BashTool::default())).unwrap();
    registry.register(Arc::new(ReadFileTool::default())).unwrap();
    registry.register(Arc::new(WriteFileTool::default())).unwrap();
    registry.register(Arc::new(EditTool::default())).unwrap();
    registry.register(Arc::new(GrepTool::default())).unwrap();
    registry.register(Arc::new(LsTool::default())).unwrap();
    registry.register(Arc::new(WebTool::default())).unwrap();
    registry.register(Arc::new(GitTool::default())).unwrap();
    registry
        .register(Arc::new(MemoryTool::new(memory_store)))
        .unwrap();
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tokio::sync::RwLock;

    struct MemoryStoreStub {
        data: RwLock<HashMap<(Scope, String), serde_json::Value>>,
    }

    #[async_trait::async_trait]
    impl StateStore for MemoryStoreStub {
        async fn read(
            &self,
            scope: &Scope,
            key: &str,
        ) -> Result<Option<serde_json::Value>, cortex_core::state::StateError> {
            Ok(self.data.read().await.get(&(scope.clone(), key.to_string())).cloned())
        }

        async fn write(
            &self,
            scope: &Scope,
            key: &str,
            value: serde_json::Value,
        ) -> Result<(), cortex_core::state::StateError> {
            self.data.write().await.insert((scope.clone(), key.to_string()), value);
            Ok(())
        }

        async fn delete(&self, scope: &Scope, key: &str) -> Result<(), cortex_core::state::StateError> {
            self.data.write().await.remove(&(scope.clone(), key.to_string()));
            Ok(())
        }

        async fn list(&self, scope: &Scope, prefix: &str) -> Result<Vec<String>, cortex_core::state::StateError> {
            Ok(self
                .data
                .read()
                .await
                .keys()
                .filter(|(s, k)| s == scope && k.starts_with(prefix))
                .map(|(_, k)| k.clone())
                .collect())
        }
    }

    #[tokio::test]
    async fn write_then_read_roundtrips_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.txt");
        let write = WriteFileTool::default();
        let result = write
            .execute(serde_json::json!({"path": path.to_str().unwrap(), "content": "Hello World"}))
            .await;
        assert!(result.success);

        let read = ReadFileTool::default();
        let result = read
            .execute(serde_json::json!({"path": path.to_str().unwrap()}))
            .await;
        assert_eq!(result.output.unwrap(), "Hello World");
    }

    #[tokio::test]
    async fn edit_replaces_first_occurrence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.txt");
        tokio::fs::write(&path, "foo bar foo").await.unwrap();
        let edit = EditTool::default();
        let result = edit
            .execute(serde_json::json!({
                "path": path.to_str().unwrap(),
                "old_string": "foo",
                "new_string": "baz",
            }))
            .await;
        assert!(result.success);
        let updated = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(updated, "baz bar foo");
    }

    #[tokio::test]
    async fn edit_reports_missing_match() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.txt");
        tokio::fs::write(&path, "foo").await.unwrap();
        let edit = EditTool::default();
        let result = edit
            .execute(serde_json::json!({
                "path": path.to_str().unwrap(),
                "old_string": "nope",
                "new_string": "baz",
            }))
            .await;
        assert!(!result.success);
    }

    #[tokio::test]
    async fn ls_lists_directory_entries() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("a.txt"), "").await.unwrap();
        tokio::fs::create_dir(dir.path().join("sub")).await.unwrap();
        let ls = LsTool::default();
        let result = ls.execute(serde_json::json!({"path": dir.path().to_str().unwrap()})).await;
        assert!(result.success);
        let output = result.output.unwrap();
        assert!(output.contains("a.txt"));
        assert!(output.contains("sub/"));
    }

    #[tokio::test]
    async fn grep_finds_matching_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        tokio::fs::write(&path, "one\ntwo\nthree two\n").await.unwrap();
        let grep = GrepTool::default();
        let result = grep
            .execute(serde_json::json!({"pattern": "two", "path": path.to_str().unwrap()}))
            .await;
        assert!(result.success);
        let output = result.output.unwrap();
        assert_eq!(output.lines().count(), 2);
    }

    #[tokio::test]
    async fn memory_tool_round_trips_through_a_scope() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStoreStub {
            data: RwLock::new(HashMap::new()),
        });
        let memory = MemoryTool::new(store);
        let write = memory
            .execute(serde_json::json!({
                "operation": "write",
                "scope": "project",
                "scope_id": "p1",
                "key": "lang",
                "value": "\"rust\"",
            }))
            .await;
        assert!(write.success);

        let read = memory
            .execute(serde_json::json!({
                "operation": "read",
                "scope": "project",
                "scope_id": "p1",
                "key": "lang",
            }))
            .await;
        assert_eq!(read.output.unwrap(), "\"rust\"");
    }

    #[tokio::test]
    async fn bash_runs_a_command() {
        let bash = BashTool::default();
        let result = bash.execute(serde_json::json!({"command": "echo hi"})).await;
        assert!(result.success);
        assert_eq!(result.output.unwrap().trim(), "hi");
    }

    #[test]
    fn canonical_registry_has_all_nine_tools() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStoreStub {
            data: RwLock::new(HashMap::new()),
        });
        let registry = canonical_registry(store);
        assert_eq!(registry.list().len(), 9);
    }
}
