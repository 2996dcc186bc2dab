//! Test-case discovery.
//!
//! Test cases live under the test-data directory, one first-level
//! subdirectory per flow:
//!
//! ```text
//! test-data/
//!   validate/
//!     validate_tc1_false_exit.json
//!     validate_tc1_input.txt
//!     validate_tc1_output.txt
//! ```
//!
//! A test-case document is any `.json` file whose name contains `_tc`
//! after its first character.

use crate::config::CorpusConfig;
use crate::error::{FlowTestError, Result};
use crate::subprocess::CommandRunner;
use crate::types::TEST_CASE_EXTENSION;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Marker every test-case file name carries.
const TEST_CASE_MARKER: &str = "_tc";

/// Flow name -> sorted test-case documents.
pub type TestSuites = BTreeMap<String, Vec<PathBuf>>;

/// Walks `root` and groups test-case documents by flow.
///
/// Directory filters match the document's directory relative to `root`,
/// `/`-separated. When `include_only` is non-empty it replaces the skip
/// lists: only listed directories or file names are kept.
pub fn discover(root: &Path, corpus: &CorpusConfig) -> Result<TestSuites> {
    if !root.is_dir() {
        return Err(FlowTestError::Config(format!(
            "test-data directory {} does not exist",
            root.display()
        )));
    }

    let mut files = Vec::new();
    walk(root, &mut files)?;

    let mut suites = TestSuites::new();
    for path in files {
        let Some(file_name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        if !is_test_case_name(&file_name) {
            continue;
        }

        let relative = path.strip_prefix(root).unwrap_or(&path);
        let dir = relative
            .parent()
            .map(to_slash)
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| ".".to_string());

        if !is_selected(&dir, &file_name, corpus) {
            debug!(path = %path.display(), "Filtered out test case");
            continue;
        }

        let flow = flow_name(relative);
        suites.entry(flow).or_default().push(path);
    }

    for cases in suites.values_mut() {
        cases.sort();
    }

    info!(
        flows = suites.len(),
        test_cases = suites.values().map(Vec::len).sum::<usize>(),
        "Discovered test cases"
    );
    Ok(suites)
}

fn walk(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            walk(&path, files)?;
        } else if file_type.is_file()
            && path.extension().is_some_and(|e| e == TEST_CASE_EXTENSION)
        {
            files.push(path);
        }
    }
    Ok(())
}

/// `_tc` must appear after the first character.
pub fn is_test_case_name(file_name: &str) -> bool {
    file_name
        .find(TEST_CASE_MARKER)
        .is_some_and(|index| index > 0)
}

fn is_selected(dir: &str, file_name: &str, corpus: &CorpusConfig) -> bool {
    if corpus.include_only.is_empty() {
        !corpus.skip_test_dirs.iter().any(|d| d == dir)
            && !corpus.skip_tests.iter().any(|t| t == file_name)
    } else {
        corpus
            .include_only
            .iter()
            .any(|entry| entry == dir || entry == file_name)
    }
}

/// First path component of the document's path under the test-data root.
fn flow_name(relative: &Path) -> String {
    let slashed = to_slash(relative);
    match slashed.find('/') {
        Some(index) if index > 0 => slashed[..index].to_string(),
        _ => slashed,
    }
}

fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Replaces `repo_dir` with a fresh clone of `git_url`.
pub fn fetch_corpus(commands: &dyn CommandRunner, git_url: &str, repo_dir: &Path) -> Result<()> {
    if repo_dir.is_dir() {
        info!(dir = %repo_dir.display(), "Removing previous corpus checkout");
        fs::remove_dir_all(repo_dir)?;
    }
    info!(url = git_url, dir = %repo_dir.display(), "Cloning test corpus");
    commands.run(
        &format!("git clone {} {}", shell_quote(git_url), shell_quote(&repo_dir.to_string_lossy())),
        None,
    )?;
    Ok(())
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}
