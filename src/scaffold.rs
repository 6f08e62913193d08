// FlowCompare — Local repository layout

use crate::flow::ContactFlow;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const DIRECTORIES: [&str; 3] = ["imports/resources/flows", ".github/workflows", "docs"];
pub const WELCOME_FLOW: &str = "imports/resources/flows/welcome-flow.json";
pub const SAMPLE_FLOW_FILE: &str = "sample-flow.json";

/// Marker line of the block [`append_gitignore`] adds.
const GITIGNORE_MARKER: &str = "# Contact Flow Comparison Tool";

const GITIGNORE_BLOCK: &str = "
# Contact Flow Comparison Tool
deployment/config.json
deployment/aws_config.json
deployment/github_config.json
deployment/repo_config.json
*.html
venv/
.env
";

pub fn readme(repo_name: &str) -> String {
    format!(
        r#"# {repo_name}

Amazon Connect Contact Flow Comparison Repository

This repository contains Amazon Connect contact flows and is configured with automated comparison tools to track changes.

## Structure

- `imports/resources/flows/` - Contact flow JSON files
- `.github/workflows/` - GitHub Actions workflows
- `docs/` - Documentation

## Setup

This repository is configured to use the Contact Flow Comparison GitHub Action.
When you push changes to contact flows, the action will automatically generate comparison reports.

## Contact Flows

Add your Amazon Connect contact flow JSON files to the `imports/resources/flows/` directory.

## Generated Reports

After pushing contact flow changes, check the GitHub Actions artifacts for:
- Individual flow comparison HTML files
- Bedrock metrics and performance data
- Summary index of all changes
"#
    )
}

/// Files and directories touched by [`scaffold`].
#[derive(Debug, Default)]
pub struct ScaffoldReport {
    pub directories: Vec<PathBuf>,
    pub files: Vec<PathBuf>,
    pub gitignore_updated: bool,
}

/// Lay out a fresh flows repository under `root`.
pub fn scaffold(root: &Path, repo_name: &str) -> anyhow::Result<ScaffoldReport> {
    let mut report = ScaffoldReport::default();

    for dir in DIRECTORIES {
        let path = root.join(dir);
        std::fs::create_dir_all(&path)?;
        report.directories.push(path);
    }

    let readme_path = root.join("README.md");
    std::fs::write(&readme_path, readme(repo_name))?;
    report.files.push(readme_path);

    let flow_path = root.join(WELCOME_FLOW);
    ContactFlow::sample(
        "start-action-id",
        "end-action-id",
        "Welcome to our contact center. How can we help you today?",
    )
    .write_to(&flow_path)?;
    report.files.push(flow_path);

    report.gitignore_updated = append_gitignore(root)?;
    Ok(report)
}

/// Append the tool's ignore block once; returns whether the file changed.
pub fn append_gitignore(root: &Path) -> std::io::Result<bool> {
    let path = root.join(".gitignore");
    let existing = std::fs::read_to_string(&path).unwrap_or_default();
    if existing.contains(GITIGNORE_MARKER) {
        return Ok(false);
    }
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)?;
    file.write_all(GITIGNORE_BLOCK.as_bytes())?;
    Ok(true)
}

/// Write `<flow_dir>/sample-flow.json` with fresh action ids; returns its path.
pub fn write_sample_flow(root: &Path, flow_dir: &str) -> anyhow::Result<PathBuf> {
    let relative = Path::new(flow_dir).join(SAMPLE_FLOW_FILE);
    let start = uuid::Uuid::new_v4().to_string();
    let end = uuid::Uuid::new_v4().to_string();
    ContactFlow::sample(&start, &end, "Hello! Welcome to our contact center.")
        .write_to(&root.join(&relative))?;
    tracing::info!(path = %relative.display(), "Sample contact flow written");
    Ok(relative)
}
