use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::{AppError, Result};
use crate::services::completion::ToolDefinition;
use crate::workspace::Workspace;

pub enum ToolOutput {
    /// Normal text result returned to the model.
    Success(String),
    /// Error result returned to the model; the loop keeps going.
    Error(String),
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn definition(&self) -> ToolDefinition;
    async fn execute(&self, workspace: &Workspace, input: &Value) -> Result<ToolOutput>;
}

pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new(max_file_size: usize) -> Self {
        let tools: Vec<Box<dyn Tool>> = vec![
            Box::new(ReadFile { max_file_size }),
            Box::new(WriteFile),
            Box::new(DeleteFile),
            Box::new(ListDirectory),
        ];
        Self { tools }
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.iter().find(|t| t.name() == name).map(|t| t.as_ref())
    }
}

fn definition(name: &str, description: &str, properties: Value, required: &[&str]) -> ToolDefinition {
    ToolDefinition {
        name: name.to_string(),
        description: description.to_string(),
        input_schema: json!({
            "type": "object",
            "properties": properties,
            "required": required,
        }),
    }
}

fn string_param<'a>(input: &'a Value, key: &str) -> std::result::Result<&'a str, ToolOutput> {
    input[key]
        .as_str()
        .ok_or_else(|| ToolOutput::Error(format!("Missing '{key}' parameter")))
}

/// Resolve a tool path, turning rejections into a recoverable tool error.
fn resolve(
    workspace: &Workspace,
    path: &str,
) -> std::result::Result<std::path::PathBuf, ToolOutput> {
    workspace
        .resolve(path)
        .map_err(|e| ToolOutput::Error(format!("Invalid path: {e}")))
}

macro_rules! try_tool {
    ($expr:expr) => {
        match $expr {
            Ok(value) => value,
            Err(output) => return Ok(output),
        }
    };
}

struct ReadFile {
    max_file_size: usize,
}

#[async_trait]
impl Tool for ReadFile {
    fn name(&self) -> &'static str {
        "read_file"
    }

    fn definition(&self) -> ToolDefinition {
        definition(
            self.name(),
            "Read a file from the repository. Use this to understand existing code before changing it.",
            json!({"path": {"type": "string", "description": "Path relative to the repository root"}}),
            &["path"],
        )
    }

    async fn execute(&self, workspace: &Workspace, input: &Value) -> Result<ToolOutput> {
        let path = try_tool!(string_param(input, "path"));
        let full_path = try_tool!(resolve(workspace, path));

        if !full_path.is_file() {
            return Ok(ToolOutput::Error(format!("File not found: {path}")));
        }

        let metadata = tokio::fs::metadata(&full_path)
            .await
            .map_err(|e| AppError::Workspace(format!("Failed to read file metadata: {e}")))?;
        if metadata.len() as usize > self.max_file_size {
            return Ok(ToolOutput::Error(format!(
                "File is too large ({} bytes, max {} bytes)",
                metadata.len(),
                self.max_file_size
            )));
        }

        match tokio::fs::read_to_string(&full_path).await {
            Ok(content) => Ok(ToolOutput::Success(content)),
            Err(e) => Ok(ToolOutput::Error(format!("Failed to read file: {e}"))),
        }
    }
}

struct WriteFile;

#[async_trait]
impl Tool for WriteFile {
    fn name(&self) -> &'static str {
        "write_file"
    }

    fn definition(&self) -> ToolDefinition {
        definition(
            self.name(),
            "Create a file or replace its entire content. Parent directories are created as needed.",
            json!({
                "path": {"type": "string", "description": "Path relative to the repository root"},
                "content": {"type": "string", "description": "The complete new file content"}
            }),
            &["path", "content"],
        )
    }

    async fn execute(&self, workspace: &Workspace, input: &Value) -> Result<ToolOutput> {
        let path = try_tool!(string_param(input, "path"));
        let content = try_tool!(string_param(input, "content"));
        let full_path = try_tool!(resolve(workspace, path));

        if full_path.is_dir() {
            return Ok(ToolOutput::Error(format!("{path} is a directory")));
        }
        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Workspace(format!("Failed to create directory: {e}")))?;
        }

        match tokio::fs::write(&full_path, content).await {
            Ok(()) => Ok(ToolOutput::Success(format!("Wrote {path}"))),
            Err(e) => Ok(ToolOutput::Error(format!("Failed to write file: {e}"))),
        }
    }
}

struct DeleteFile;

#[async_trait]
impl Tool for DeleteFile {
    fn name(&self) -> &'static str {
        "delete_file"
    }

    fn definition(&self) -> ToolDefinition {
        definition(
            self.name(),
            "Delete a file from the repository.",
            json!({"path": {"type": "string", "description": "Path relative to the repository root"}}),
            &["path"],
        )
    }

    async fn execute(&self, workspace: &Workspace, input: &Value) -> Result<ToolOutput> {
        let path = try_tool!(string_param(input, "path"));
        let full_path = try_tool!(resolve(workspace, path));

        if !full_path.is_file() {
            return Ok(ToolOutput::Error(format!("File not found: {path}")));
        }

        match tokio::fs::remove_file(&full_path).await {
            Ok(()) => Ok(ToolOutput::Success(format!("Deleted {path}"))),
            Err(e) => Ok(ToolOutput::Error(format!("Failed to delete file: {e}"))),
        }
    }
}

struct ListDirectory;

#[async_trait]
impl Tool for ListDirectory {
    fn name(&self) -> &'static str {
        "list_directory"
    }

    fn definition(&self) -> ToolDefinition {
        definition(
            self.name(),
            "List a directory. Entries are marked (file) or (dir). Use '.' for the repository root.",
            json!({"path": {"type": "string", "description": "Directory relative to the repository root"}}),
            &["path"],
        )
    }

    async fn execute(&self, workspace: &Workspace, input: &Value) -> Result<ToolOutput> {
        let path = try_tool!(string_param(input, "path"));
        let full_path = if path == "." || path.is_empty() {
            workspace.path.clone()
        } else {
            try_tool!(resolve(workspace, path))
        };

        if !full_path.is_dir() {
            return Ok(ToolOutput::Error(format!("Directory not found: {path}")));
        }

        let mut entries = Vec::new();
        let mut read_dir = tokio::fs::read_dir(&full_path)
            .await
            .map_err(|e| AppError::Workspace(format!("Failed to read directory: {e}")))?;
        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| AppError::Workspace(format!("Failed to read directory entry: {e}")))?
        {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') {
                continue;
            }
            let kind = match entry.file_type().await {
                Ok(t) if t.is_dir() => "dir",
                _ => "file",
            };
            entries.push(format!("{name} ({kind})"));
        }
        entries.sort();

        if entries.is_empty() {
            Ok(ToolOutput::Success("Directory is empty".to_string()))
        } else {
            Ok(ToolOutput::Success(entries.join("\n")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::testing::workspace_at;

    fn success(output: ToolOutput) -> String {
        match output {
            ToolOutput::Success(text) => text,
            ToolOutput::Error(text) => panic!("unexpected tool error: {text}"),
        }
    }

    fn error(output: ToolOutput) -> String {
        match output {
            ToolOutput::Error(text) => text,
            ToolOutput::Success(text) => panic!("unexpected tool success: {text}"),
        }
    }

    #[tokio::test]
    async fn test_write_then_read_nested_file() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = workspace_at(tmp.path());
        let registry = ToolRegistry::new(1024);

        let write = registry.get("write_file").unwrap();
        success(
            write
                .execute(&ws, &json!({"path": "src/flip.rs", "content": "fn flip() {}"}))
                .await
                .unwrap(),
        );

        let read = registry.get("read_file").unwrap();
        let content = success(read.execute(&ws, &json!({"path": "src/flip.rs"})).await.unwrap());
        assert_eq!(content, "fn flip() {}");
    }

    #[tokio::test]
    async fn test_read_rejects_large_files() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("big.txt"), "x".repeat(64)).unwrap();
        let registry = ToolRegistry::new(16);

        let message = error(
            registry
                .get("read_file")
                .unwrap()
                .execute(&workspace_at(tmp.path()), &json!({"path": "big.txt"}))
                .await
                .unwrap(),
        );
        assert!(message.contains("too large"));
    }

    #[tokio::test]
    async fn test_traversal_is_a_tool_error() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = ToolRegistry::new(1024);

        let message = error(
            registry
                .get("write_file")
                .unwrap()
                .execute(
                    &workspace_at(tmp.path()),
                    &json!({"path": "../escape.txt", "content": "x"}),
                )
                .await
                .unwrap(),
        );
        assert!(message.starts_with("Invalid path"));
    }

    #[tokio::test]
    async fn test_list_and_delete() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("src")).unwrap();
        std::fs::write(tmp.path().join("old.txt"), "").unwrap();
        std::fs::write(tmp.path().join(".hidden"), "").unwrap();
        let ws = workspace_at(tmp.path());
        let registry = ToolRegistry::new(1024);
        let list = registry.get("list_directory").unwrap();

        let listing = success(list.execute(&ws, &json!({"path": "."})).await.unwrap());
        assert_eq!(listing, "old.txt (file)\nsrc (dir)");

        success(
            registry
                .get("delete_file")
                .unwrap()
                .execute(&ws, &json!({"path": "old.txt"}))
                .await
                .unwrap(),
        );
        let listing = success(list.execute(&ws, &json!({"path": "."})).await.unwrap());
        assert_eq!(listing, "src (dir)");
    }

    #[test]
    fn test_missing_param_message() {
        let message = error(string_param(&json!({}), "path").unwrap_err());
        assert_eq!(message, "Missing 'path' parameter");
    }
}
