// FlowCompare — Interactive prompts

use crate::config::{DeploymentConfig, DEFAULT_ENVIRONMENT, DEFAULT_FLOW_PATH, DEFAULT_REGION};
use rustyline::error::ReadlineError;
use std::collections::VecDeque;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PromptError {
    #[error("setup cancelled by user")]
    Cancelled,
    #[error("readline error: {0}")]
    Readline(#[from] ReadlineError),
}

/// Source of answers to setup questions.
pub trait Prompter {
    /// Ask a question and return the trimmed answer.
    fn ask(&mut self, label: &str) -> Result<String, PromptError>;

    fn ask_or(&mut self, label: &str, default: &str) -> Result<String, PromptError> {
        let answer = self.ask(&format!("{} (default: {})", label, default))?;
        Ok(if answer.is_empty() {
            default.to_string()
        } else {
            answer
        })
    }

    /// Yes/no question; anything but `y`/`yes` is no.
    fn confirm(&mut self, label: &str) -> Result<bool, PromptError> {
        let answer = self.ask(&format!("{} (y/N)", label))?;
        Ok(matches!(answer.to_lowercase().as_str(), "y" | "yes"))
    }
}

/// Prompts on the terminal via rustyline.
pub struct ReadlinePrompter {
    editor: rustyline::DefaultEditor,
}

impl ReadlinePrompter {
    pub fn new() -> Result<Self, PromptError> {
        Ok(Self {
            editor: rustyline::DefaultEditor::new()?,
        })
    }
}

impl Prompter for ReadlinePrompter {
    fn ask(&mut self, label: &str) -> Result<String, PromptError> {
        match self.editor.readline(&format!("{}: ", label)) {
            Ok(line) => Ok(line.trim().to_string()),
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                Err(PromptError::Cancelled)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Replays canned answers; an exhausted script answers blank.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: VecDeque<String>,
    pub asked: Vec<String>,
}

impl ScriptedPrompter {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            asked: Vec::new(),
        }
    }
}

impl Prompter for ScriptedPrompter {
    fn ask(&mut self, label: &str) -> Result<String, PromptError> {
        self.asked.push(label.to_string());
        Ok(self
            .answers
            .pop_front()
            .map(|a| a.trim().to_string())
            .unwrap_or_default())
    }
}

/// Ask for every deployment setting, in the order the guide lists them.
pub fn collect_configuration(p: &mut dyn Prompter) -> Result<DeploymentConfig, PromptError> {
    println!("\n📱 GitHub Configuration:");
    let github_token = p.ask("GitHub Personal Access Token")?;
    let repo_owner = p.ask("Repository Owner (username/org)")?;
    let repo_name = p.ask("Repository Name")?;

    println!("\n☁️  AWS Configuration:");
    let aws_account_id = p.ask("AWS Account ID")?;
    let aws_region = p.ask_or("AWS Region", DEFAULT_REGION)?;

    println!("\n📁 Contact Flow Configuration:");
    let contact_flow_path = p.ask_or("Contact Flow Path", DEFAULT_FLOW_PATH)?;
    let environment = p.ask_or("Environment", DEFAULT_ENVIRONMENT)?;

    Ok(DeploymentConfig {
        github_token,
        repo_owner,
        repo_name,
        aws_account_id,
        aws_region,
        contact_flow_path,
        environment,
    })
}
