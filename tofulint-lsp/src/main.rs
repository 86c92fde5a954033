//! tofulint LSP Server - live unused declaration diagnostics for OpenTofu.
//!
//! Provides IDE integration with:
//! - Diagnostics on file open/save, one per issue
//! - Faded markers (`UNNECESSARY`) on unused declarations
//! - Cleared diagnostics for files that are clean again
//!
//! Never panics on bad input: every failure is logged to the client.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use serde_json::json;
use tower_lsp::jsonrpc::Result as LspResult;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer, LspService, Server};

use tofulint_core::rules::UnusedDeclarationsRule;
use tofulint_core::syntax::{is_config_filename, Pos};
use tofulint_core::{gather_tf_files, Issue, LintResult, Severity, Tofulint};

/// tofulint Language Server state.
struct TofulintLsp {
    client: Client,
}

impl TofulintLsp {
    fn new(client: Client) -> Self {
        Self { client }
    }

    /// Lint the directory of `uri` and publish diagnostics for all its files.
    async fn run_analysis(&self, uri: Url) {
        let file_path = match uri.to_file_path() {
            Ok(p) => p,
            Err(_) => {
                self.log_error("Invalid file URI").await;
                return;
            }
        };
        let Some(dir) = file_path.parent().map(Path::to_path_buf) else {
            self.log_error("File has no parent directory").await;
            return;
        };

        let lint_dir = dir.clone();
        let outcome = tokio::task::spawn_blocking(move || compute_diagnostics(&lint_dir))
            .await
            .map_err(|e| anyhow!("lint task failed: {e}"))
            .and_then(|r| r);

        match outcome {
            Ok(file_diagnostics) => {
                let count: usize = file_diagnostics.values().map(Vec::len).sum();
                for (file_uri, diagnostics) in file_diagnostics {
                    self.client
                        .publish_diagnostics(file_uri, diagnostics, None)
                        .await;
                }
                self.log_info(&format!(
                    "Analysis complete: {} ({} issues)",
                    dir.display(),
                    count
                ))
                .await;
            }
            Err(e) => {
                self.log_error(&format!("Analysis failed: {:#}", e)).await;
            }
        }
    }

    async fn log_info(&self, message: &str) {
        self.client.log_message(MessageType::INFO, message).await;
    }

    async fn log_error(&self, message: &str) {
        self.client.log_message(MessageType::ERROR, message).await;
    }
}

/// Lint `dir` as a root module and group diagnostics by file.
///
/// Every configuration file of the directory gets an entry, empty when clean.
fn compute_diagnostics(dir: &Path) -> Result<HashMap<Url, Vec<Diagnostic>>> {
    let result = Tofulint::new(dir).analyze()?;
    let files = gather_tf_files(dir, &[])?;
    Ok(group_diagnostics(dir, &files, &result))
}

fn group_diagnostics(
    dir: &Path,
    files: &[PathBuf],
    result: &LintResult,
) -> HashMap<Url, Vec<Diagnostic>> {
    let mut out: HashMap<Url, Vec<Diagnostic>> = HashMap::new();
    let mut sources: HashMap<&str, Option<String>> = HashMap::new();

    for file in files {
        if let Ok(uri) = Url::from_file_path(file) {
            out.entry(uri).or_default();
        }
    }

    for issue in &result.issues {
        let path = dir.join(&issue.range.filename);
        let source = sources
            .entry(issue.range.filename.as_str())
            .or_insert_with(|| std::fs::read_to_string(&path).ok());
        if let Ok(uri) = Url::from_file_path(&path) {
            out.entry(uri)
                .or_default()
                .push(to_diagnostic(issue, source.as_deref()));
        }
    }

    out
}

/// LSP positions count characters in UTF-16 code units. Without the source
/// text the column is used as is.
fn lsp_position(source: Option<&str>, pos: &Pos) -> Position {
    let prefix = source.and_then(|src| {
        let line_start = src.get(..pos.byte)?.rfind('\n').map_or(0, |i| i + 1);
        src.get(line_start..pos.byte)
    });
    let character = match prefix {
        Some(prefix) => prefix.encode_utf16().count(),
        None => pos.column.saturating_sub(1),
    };
    Position {
        line: pos.line.saturating_sub(1) as u32,
        character: character as u32,
    }
}

fn to_diagnostic(issue: &Issue, source: Option<&str>) -> Diagnostic {
    let severity = match issue.severity {
        Severity::Error => DiagnosticSeverity::ERROR,
        Severity::Warning => DiagnosticSeverity::WARNING,
        Severity::Notice => DiagnosticSeverity::INFORMATION,
    };
    let tags = (issue.rule == UnusedDeclarationsRule::NAME).then(|| vec![DiagnosticTag::UNNECESSARY]);

    Diagnostic {
        range: Range {
            start: lsp_position(source, &issue.range.start),
            end: lsp_position(source, &issue.range.end),
        },
        severity: Some(severity),
        code: Some(NumberOrString::String(issue.rule.clone())),
        code_description: None,
        source: Some("tofulint".to_string()),
        message: issue.message.clone(),
        related_information: None,
        tags,
        data: Some(json!({ "link": issue.link, "fixable": issue.fixable })),
    }
}

fn is_lintable(uri: &Url) -> bool {
    is_config_filename(uri.path())
}

#[tower_lsp::async_trait]
impl LanguageServer for TofulintLsp {
    async fn initialize(&self, _: InitializeParams) -> LspResult<InitializeResult> {
        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Options(
                    TextDocumentSyncOptions {
                        open_close: Some(true),
                        change: Some(TextDocumentSyncKind::FULL),
                        save: Some(TextDocumentSyncSaveOptions::SaveOptions(SaveOptions {
                            include_text: Some(false),
                        })),
                        ..Default::default()
                    },
                )),
                ..ServerCapabilities::default()
            },
            server_info: Some(ServerInfo {
                name: "tofulint-lsp".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        self.client
            .log_message(MessageType::INFO, "tofulint LSP server initialized")
            .await;
    }

    async fn shutdown(&self) -> LspResult<()> {
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let uri = params.text_document.uri;
        if is_lintable(&uri) {
            self.run_analysis(uri).await;
        }
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        let uri = params.text_document.uri;
        if is_lintable(&uri) {
            self.run_analysis(uri).await;
        }
    }

    async fn did_change(&self, _params: DidChangeTextDocumentParams) {
        // Files are linted from disk, so only saves are analyzed.
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        self.client
            .publish_diagnostics(params.text_document.uri, vec![], None)
            .await;
    }
}

#[tokio::main]
async fn main() {
    std::panic::set_hook(Box::new(|info| {
        eprintln!("[PANIC] tofulint-lsp internal error: {}", info);
    }));

    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = LspService::new(TofulintLsp::new);
    Server::new(stdin, stdout, socket).serve(service).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::atomic::{AtomicU64, Ordering};

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn create_temp_dir(files: &[(&str, &str)]) -> PathBuf {
        let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        let dir = std::env::temp_dir()
            .join("tofulint_lsp_test")
            .join(format!("{}_{}", std::process::id(), id));
        if dir.exists() {
            fs::remove_dir_all(&dir).ok();
        }
        fs::create_dir_all(&dir).unwrap();
        for (name, content) in files {
            fs::write(dir.join(name), content).unwrap();
        }
        dir
    }

    #[test]
    fn test_is_lintable() {
        assert!(is_lintable(&Url::parse("file:///w/main.tf").unwrap()));
        assert!(is_lintable(&Url::parse("file:///w/main.tf.json").unwrap()));
        assert!(!is_lintable(&Url::parse("file:///w/main.rs").unwrap()));
    }

    #[test]
    fn test_diagnostics_per_file() {
        let dir = create_temp_dir(&[
            ("main.tf", "variable \"unused\" {}\n"),
            ("outputs.tf", "output \"o\" {\n  value = 1\n}\n"),
        ]);

        let diagnostics = compute_diagnostics(&dir).unwrap();
        assert_eq!(diagnostics.len(), 2);

        let main = &diagnostics[&Url::from_file_path(dir.join("main.tf")).unwrap()];
        assert_eq!(main.len(), 1);
        let d = &main[0];
        assert_eq!(d.severity, Some(DiagnosticSeverity::WARNING));
        assert_eq!(
            d.code,
            Some(NumberOrString::String("opentofu_unused_declarations".to_string()))
        );
        assert_eq!(d.tags, Some(vec![DiagnosticTag::UNNECESSARY]));
        assert_eq!(d.range.start, Position { line: 0, character: 0 });

        let outputs = &diagnostics[&Url::from_file_path(dir.join("outputs.tf")).unwrap()];
        assert!(outputs.is_empty());
    }

    #[test]
    fn test_positions_count_utf16_units() {
        let src = "# é\nx = \"🚀\" # y";
        let y = src.find('y').unwrap();
        let pos = Pos { line: 2, column: 11, byte: y };
        assert_eq!(lsp_position(Some(src), &pos), Position { line: 1, character: 11 });
        assert_eq!(lsp_position(None, &pos), Position { line: 1, character: 10 });
    }

    #[test]
    fn test_diagnostic_after_astral_character() {
        let dir = create_temp_dir(&[("main.tf", "variable \"🚀\" {}\n")]);
        let diagnostics = compute_diagnostics(&dir).unwrap();
        let main = &diagnostics[&Url::from_file_path(dir.join("main.tf")).unwrap()];
        assert_eq!(main.len(), 1);
        assert_eq!(main[0].range.start, Position { line: 0, character: 0 });
        assert_eq!(main[0].range.end, Position { line: 0, character: 13 });
    }

    #[test]
    fn test_other_rules_are_not_faded() {
        let dir = create_temp_dir(&[("main.tf", "resource \"aws_instance\" \"web\" {}\n")]);
        let diagnostics = compute_diagnostics(&dir).unwrap();
        let main = &diagnostics[&Url::from_file_path(dir.join("main.tf")).unwrap()];
        assert_eq!(main.len(), 1);
        assert!(main[0].tags.is_none());
    }
}
