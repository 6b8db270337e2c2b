use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use ignore::WalkBuilder;

use crate::provider::{ChatMessage, GenerateOptions};
use crate::state::BackendBinding;

const SKIPPED_DIRS: &[&str] = &["vendor", "node_modules", "target"];
const SOURCE_EXTENSIONS: &[&str] = &[
    "rs", "go", "py", "js", "jsx", "ts", "tsx", "java", "kt", "c", "h", "cc", "cpp", "hpp", "cs",
    "rb", "swift", "php", "scala", "sh", "zig",
];
const MAX_LISTED_FILES: usize = 20;

/// Produces the project marker document for a repository root.
#[async_trait]
pub trait RepoAnalyzer: Send + Sync {
    async fn analyze(&self, root: &Path, binding: &BackendBinding) -> Result<String>;
}

/// Summarizes the tree locally and asks the bound model to write the document.
pub struct LlmRepoAnalyzer;

#[async_trait]
impl RepoAnalyzer for LlmRepoAnalyzer {
    async fn analyze(&self, root: &Path, binding: &BackendBinding) -> Result<String> {
        let root = root.to_path_buf();
        let scan = tokio::task::spawn_blocking(move || scan_repository(&root))
            .await
            .context("repository scan task failed")??;

        let prompt = analysis_prompt(&scan);
        let options = GenerateOptions {
            model: binding.model.clone(),
            system: None,
            max_tokens: None,
        };
        let content = binding
            .backend
            .generate(&[ChatMessage::user(prompt)], &options)
            .await
            .context("failed to generate AGENTS.md content")?;
        if content.trim().is_empty() {
            return Err(anyhow::anyhow!("model returned empty AGENTS.md content"));
        }
        Ok(content)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub relative_path: PathBuf,
    pub extension: String,
    pub size: u64,
    pub is_test: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepoScan {
    pub root_name: String,
    pub top_dirs: BTreeSet<String>,
    pub files: Vec<SourceFile>,
}

impl RepoScan {
    pub fn test_files(&self) -> usize {
        self.files.iter().filter(|f| f.is_test).count()
    }

    /// Roughly 40 lines per KiB of source.
    pub fn estimated_loc(&self) -> u64 {
        self.files.iter().map(|f| f.size / 25).sum()
    }

    pub fn languages(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for file in &self.files {
            *counts.entry(file.extension.clone()).or_insert(0) += 1;
        }
        counts
    }
}

/// Walks `root` honoring ignore files, skipping hidden entries and vendored
/// or build output directories.
pub fn scan_repository(root: &Path) -> Result<RepoScan> {
    let mut scan = RepoScan {
        root_name: root
            .canonicalize()
            .ok()
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .unwrap_or_else(|| "repository".to_string()),
        ..RepoScan::default()
    };

    let walker = WalkBuilder::new(root)
        .hidden(true)
        .filter_entry(|entry| {
            let is_dir = entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false);
            let name = entry.file_name().to_string_lossy();
            !(is_dir && SKIPPED_DIRS.iter().any(|skip| *skip == name))
        })
        .build();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tracing::debug!(error = %err, "skipping unreadable entry");
                continue;
            }
        };
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        if relative.as_os_str().is_empty() {
            continue;
        }
        let Some(file_type) = entry.file_type() else {
            continue;
        };

        if file_type.is_dir() {
            if let Some(first) = relative.components().next() {
                scan.top_dirs
                    .insert(first.as_os_str().to_string_lossy().into_owned());
            }
            continue;
        }

        let extension = relative
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        if !SOURCE_EXTENSIONS.contains(&extension.as_str()) {
            continue;
        }
        let name = relative.to_string_lossy();
        scan.files.push(SourceFile {
            relative_path: relative.to_path_buf(),
            size: entry.metadata().map(|m| m.len()).unwrap_or(0),
            is_test: name.contains("_test.")
                || name.contains(".test.")
                || name.contains(".spec.")
                || relative.components().any(|c| c.as_os_str() == "tests"),
            extension,
        });
    }

    scan.files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    Ok(scan)
}

pub fn repository_summary(scan: &RepoScan) -> String {
    let mut out = String::from("Directory Structure:\n```\n");
    out.push_str(&format!("{}/\n", scan.root_name));
    let last = scan.top_dirs.len().saturating_sub(1);
    for (idx, dir) in scan.top_dirs.iter().enumerate() {
        let branch = if idx == last { "└──" } else { "├──" };
        out.push_str(&format!("{branch} {dir}/\n"));
    }
    out.push_str("```\n\nKey Files:\n");

    let listed = scan
        .files
        .iter()
        .filter(|f| !f.is_test)
        .take(MAX_LISTED_FILES)
        .collect::<Vec<_>>();
    for file in &listed {
        out.push_str(&format!("- {}\n", file.relative_path.display()));
    }
    if scan.files.iter().filter(|f| !f.is_test).count() > listed.len() {
        out.push_str("- ... (more files)\n");
    }

    out.push_str("\nStatistics:\n");
    out.push_str(&format!("- Source files: {}\n", scan.files.len()));
    out.push_str(&format!("- Test files: {}\n", scan.test_files()));
    out.push_str(&format!("- Estimated lines of code: {}\n", scan.estimated_loc()));
    let languages = scan
        .languages()
        .into_iter()
        .map(|(ext, count)| format!("{ext} ({count})"))
        .collect::<Vec<_>>();
    if !languages.is_empty() {
        out.push_str(&format!("- Languages by extension: {}\n", languages.join(", ")));
    }
    out
}

pub fn analysis_prompt(scan: &RepoScan) -> String {
    format!(
        "Analyze the following repository structure and generate an AGENTS.md file that \
         provides an AI-friendly overview of the codebase.\n\n\
         Repository Information:\n{}\n\
         Please create an AGENTS.md file that includes:\n\
         1. Repository Overview - project name, type, and purpose\n\
         2. Main Components - table with package names and their purposes\n\
         3. Key Files - table with important files and why they matter\n\
         4. Development information - how to test, build, and contribute\n\
         5. Architecture diagram if appropriate\n\n\
         Format the output as a Markdown file starting with \"# AGENTS.md\".",
        repository_summary(scan)
    )
}
