// FlowCompare — Contact-flow comparison pipeline setup
// License: Apache-2.0

use clap::{Parser, Subcommand};
use flowcompare::aws::provision::provision;
use flowcompare::aws::sdk::SdkCloud;
use flowcompare::config::{
    normalize_flow_path, DeploymentConfig, DeploymentDir, GitHubOutputs, RepoConfig, ValidationReport,
    AWS_CONFIG_FILE, CONFIG_FILE, DEPLOYMENT_DIR, GITHUB_CONFIG_FILE, REPO_CONFIG_FILE,
};
use flowcompare::git::{self, Git};
use flowcompare::github::setup::{
    configure_actions, ensure_repository, secrets_settings_url, DEFAULT_DESCRIPTION,
};
use flowcompare::github::{GitHubClient, Upsert};
use flowcompare::prompt::{collect_configuration, PromptError, Prompter, ReadlinePrompter};
use flowcompare::status::{self, Check, CheckState};
use flowcompare::{fetch, scaffold, workflow};
use std::path::{Path, PathBuf};

const LOGO: &str = "🔀";

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(
    name = "flowcompare",
    about = "Set up Amazon Connect contact-flow comparison on GitHub Actions",
    version
)]
struct Cli {
    /// Repository root holding deployment/ and the flows
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect and validate deployment settings
    Init {
        /// Load settings from a JSON file instead of prompting
        #[arg(short, long)]
        config_file: Option<PathBuf>,
    },
    /// Create the OIDC provider, IAM role and policy
    Aws,
    /// Write the workflow and configure repository secrets and variables
    Github,
    /// Create the GitHub repository and push an initial layout
    CreateRepo,
    /// Download both versions of every flow changed by a commit
    Fetch {
        /// GitHub personal access token
        #[arg(short, long, env = "FLOWCOMPARE_GITHUB_TOKEN", hide_env_values = true)]
        token: String,
        /// Repository owner
        #[arg(short, long)]
        owner: String,
        /// Repository name
        #[arg(short, long)]
        repo: String,
        /// Commit SHA
        #[arg(short, long)]
        commit: String,
        /// Directory containing contact flows, relative to the repository root
        #[arg(
            short = 'p',
            long,
            default_value = flowcompare::config::DEFAULT_FLOW_PATH,
            value_parser = clap::builder::NonEmptyStringValueParser::new()
        )]
        contact_flow_path: String,
        /// Where to save the downloaded versions
        #[arg(short = 'd', long, default_value = ".")]
        output_dir: PathBuf,
    },
    /// Show deployment state and run preflight checks
    Status,
    /// Show version information
    Version,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() {
    flowcompare::logger::init();

    let cli = Cli::parse();
    let root = cli.root;

    let result = match cli.command {
        Some(Commands::Init { config_file }) => init_cmd(&root, config_file.as_deref()),
        Some(Commands::Aws) => aws_cmd(&root).await,
        Some(Commands::Github) => github_cmd(&root).await,
        Some(Commands::CreateRepo) => create_repo_cmd(&root).await,
        Some(Commands::Fetch {
            token,
            owner,
            repo,
            commit,
            contact_flow_path,
            output_dir,
        }) => fetch_cmd(&token, &owner, &repo, &commit, &contact_flow_path, &output_dir).await,
        Some(Commands::Status) => status_cmd(&root).await,
        Some(Commands::Version) | None => {
            version_cmd();
            Ok(())
        }
    };

    if let Err(e) = result {
        if matches!(e.downcast_ref::<PromptError>(), Some(PromptError::Cancelled)) {
            println!("\n\n👋 Setup cancelled by user");
            return;
        }
        eprintln!("\n❌ {:#}", e);
        std::process::exit(1);
    }
}

// ---------------------------------------------------------------------------
// Init command
// ---------------------------------------------------------------------------

fn init_cmd(root: &Path, config_file: Option<&Path>) -> anyhow::Result<()> {
    println!("{} Contact Flow Comparison Tool Setup", LOGO);
    println!("{}", "=".repeat(50));

    let config = match config_file.filter(|p| p.exists()) {
        Some(path) => {
            println!("📄 Loading configuration from {}", path.display());
            DeploymentConfig::load(path)?
        }
        None => {
            let mut prompter = ReadlinePrompter::new()?;
            let mut config = collect_configuration(&mut prompter)?;
            config.apply_env_overrides();
            config.normalize();
            config
        }
    };

    let report = config.validate();
    print_validation(&report);
    if !report.is_success() {
        anyhow::bail!("Configuration validation failed");
    }

    println!("\n✅ Configuration validated successfully!");
    println!("Repository: {}", config.repo_slug());
    println!("AWS Account: {}", config.aws_account_id);
    println!("Region: {}", config.aws_region);
    println!("Contact Flow Path: {}", config.contact_flow_path);

    DeploymentDir::new(root).save(CONFIG_FILE, &config)?;

    println!("\n📝 Configuration saved to {}/{}", DEPLOYMENT_DIR, CONFIG_FILE);
    println!("\nNext steps:");
    println!("1. Run AWS setup: flowcompare aws");
    println!("2. Run GitHub setup: flowcompare github");
    println!("3. Check the deployment: flowcompare status");
    Ok(())
}

fn print_validation(report: &ValidationReport) {
    if !report.errors.is_empty() {
        println!("\n❌ Configuration Validation Failed:");
        for error in &report.errors {
            println!("  • {}", error);
        }
    }
    if !report.warnings.is_empty() {
        println!("\n⚠️  Warnings:");
        for warning in &report.warnings {
            println!("  • {}", warning);
        }
    }
    if !report.recommendations.is_empty() {
        println!("\n💡 Recommendations:");
        for rec in &report.recommendations {
            println!("  • {}", rec);
        }
    }
}

// ---------------------------------------------------------------------------
// AWS command
// ---------------------------------------------------------------------------

async fn aws_cmd(root: &Path) -> anyhow::Result<()> {
    println!("☁️  AWS Infrastructure Setup");
    println!("{}", "=".repeat(40));

    let dir = DeploymentDir::new(root);
    let config = dir.load_config()?;

    let cloud = SdkCloud::connect(&config.aws_region).await;
    println!("🔐 Setting up GitHub OIDC Identity Provider and IAM role...");
    let report = provision(&cloud, &config).await.map_err(|e| {
        anyhow::anyhow!("AWS setup failed: {:#}\n   {}", e, status::iam_remedy())
    })?;

    println!("🔍 AWS Account: {}", report.account_id);
    println!("✅ OIDC Provider {}", report.oidc_provider.label());
    println!(
        "✅ IAM Role {}: {}",
        report.role.label(),
        report.outputs.role_name
    );
    println!("✅ Policy {}: {}", report.policy.label(), report.policy_arn);
    println!("✅ Policy attached to role");
    match &report.bedrock_warning {
        None => println!("✅ Bedrock access validated successfully"),
        Some(w) => {
            println!("⚠️  Bedrock validation warning: {}", w);
            println!("   This might be expected if the role hasn't propagated yet");
        }
    }

    dir.save(AWS_CONFIG_FILE, &report.outputs)?;

    println!("\n✅ AWS setup completed successfully!");
    println!("📝 Configuration saved to {}/{}", DEPLOYMENT_DIR, AWS_CONFIG_FILE);
    println!("\n🔑 Role ARN: {}", report.outputs.role_arn);
    println!("\nNext step: Run GitHub setup with:");
    println!("flowcompare github");
    Ok(())
}

// ---------------------------------------------------------------------------
// GitHub command
// ---------------------------------------------------------------------------

async fn github_cmd(root: &Path) -> anyhow::Result<()> {
    println!("📱 GitHub Repository Setup");
    println!("{}", "=".repeat(40));

    let dir = DeploymentDir::new(root);
    let config = dir.load_config()?;
    let aws = dir.load_aws()?;

    println!("📝 Creating GitHub Actions workflow...");
    let workflow_path = workflow::write(root, &config, &aws.role_arn)?;
    println!("✅ Workflow file created: {}", workflow_path.display());

    println!("🔐 Setting up GitHub secrets and variables...");
    let gh = GitHubClient::from_env(config.github_token.clone())?;
    let setup_complete = match configure_actions(&gh, &config).await {
        Ok(report) => {
            println!("✅ Repository access confirmed: {}", report.repository);
            for (name, outcome) in report.secrets.iter().chain(report.variables.iter()) {
                let verb = match outcome {
                    Upsert::Created => "Created",
                    Upsert::Updated => "Updated",
                };
                println!("✅ {}: {}", verb, name);
            }
            for warning in &report.warnings {
                println!("⚠️  {}", warning);
            }
            report.is_complete()
        }
        Err(e) => {
            println!("❌ GitHub setup failed: {}", e);
            false
        }
    };

    println!("📁 Creating sample contact flow structure...");
    let sample_path = scaffold::write_sample_flow(root, &config.contact_flow_path)?;
    println!("✅ Sample contact flow created: {}", sample_path.display());

    let outputs = GitHubOutputs {
        workflow_path: workflow_path.to_string_lossy().to_string(),
        sample_flow_path: sample_path.to_string_lossy().to_string(),
        setup_complete,
    };
    dir.save(GITHUB_CONFIG_FILE, &outputs)?;

    println!("\n✅ GitHub setup completed!");
    println!("📝 Configuration saved to {}/{}", DEPLOYMENT_DIR, GITHUB_CONFIG_FILE);

    println!("\n📋 Remaining steps:");
    let mut step = 1;
    if !setup_complete {
        println!(
            "{}. Set the FLOW_COMPARE_PAT secret and variables in GitHub:\n   {}",
            step,
            secrets_settings_url(&config.repo_owner, &config.repo_name)
        );
        step += 1;
    }
    println!("{}. Commit and push the workflow file: {}", step, outputs.workflow_path);
    println!(
        "{}. Test by modifying a contact flow in: {}",
        step + 1,
        config.contact_flow_path
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Create-repo command
// ---------------------------------------------------------------------------

async fn create_repo_cmd(root: &Path) -> anyhow::Result<()> {
    println!("🚀 GitHub Repository Setup for Contact Flow Comparison");
    println!("{}", "=".repeat(60));

    println!("🔑 GitHub Authentication");
    println!("You need a GitHub Personal Access Token with 'repo' and 'workflow' permissions.");
    println!("Create one at: https://github.com/settings/tokens\n");

    let mut prompter = ReadlinePrompter::new()?;
    let token = prompter.ask("Enter your GitHub Personal Access Token")?;
    if token.is_empty() {
        anyhow::bail!("GitHub token is required");
    }

    let gh = GitHubClient::from_env(token.clone())?;
    let user = gh
        .authenticated_user()
        .await
        .map_err(|e| anyhow::anyhow!("GitHub authentication failed: {}", e))?;
    println!("👤 Authenticated as: {}", user.login);

    println!("\n📝 Repository Configuration:");
    let repo_name = prompter.ask("Repository name")?;
    if repo_name.is_empty() {
        anyhow::bail!("Repository name is required");
    }
    let description = prompter.ask_or("Repository description", DEFAULT_DESCRIPTION)?;
    let private = prompter.confirm("Make repository private?")?;

    println!("📁 Creating repository: {}", repo_name);
    let (repo, state) = ensure_repository(&gh, &user.login, &repo_name, &description, private)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create repository: {}", e))?;
    println!("✅ Repository {}: {}", state.label(), repo.html_url);

    println!("📂 Setting up initial directory structure...");
    let layout = scaffold::scaffold(root, &repo_name)?;
    for path in layout.directories.iter().chain(layout.files.iter()) {
        println!("✅ Created: {}", display_relative(root, path));
    }
    if layout.gitignore_updated {
        println!("✅ Updated .gitignore");
    }

    println!("🔧 Initializing local git repository...");
    if let Err(e) = push_initial(&Git::new(root), &repo.clone_url).await {
        println!("⚠️  Git operation failed: {:#}", e);
        println!("You may need to push manually later");
    }

    let repo_config = RepoConfig {
        github_token: token,
        repo_owner: user.login,
        repo_name,
        repo_url: repo.html_url.clone(),
        clone_url: repo.clone_url,
    };
    DeploymentDir::new(root).save(REPO_CONFIG_FILE, &repo_config)?;

    println!("\n✅ Repository setup completed successfully!");
    println!("📝 Configuration saved to {}/{}", DEPLOYMENT_DIR, REPO_CONFIG_FILE);
    println!("🔗 Repository URL: {}", repo.html_url);

    println!("\n📋 Next steps:");
    println!("1. Run the main setup: flowcompare init");
    println!("2. Configure AWS: flowcompare aws");
    println!("3. Configure GitHub Actions: flowcompare github");
    Ok(())
}

async fn push_initial(git: &Git, clone_url: &str) -> anyhow::Result<()> {
    if git.init_if_needed().await? {
        println!("✅ Git repository initialized");
    }
    if git.set_origin(clone_url).await? {
        println!("✅ Remote origin added");
    } else {
        println!("✅ Remote origin updated");
    }
    git.commit_all(git::INITIAL_COMMIT_MESSAGE).await?;
    println!("✅ Initial commit created");
    git.push_main().await?;
    println!("✅ Pushed to GitHub");
    Ok(())
}

fn display_relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}

// ---------------------------------------------------------------------------
// Fetch command
// ---------------------------------------------------------------------------

async fn fetch_cmd(
    token: &str,
    owner: &str,
    repo: &str,
    commit: &str,
    flow_path: &str,
    output_dir: &Path,
) -> anyhow::Result<()> {
    println!("{} From commit: {}", LOGO, commit);

    let flow_path = normalize_flow_path(flow_path);
    if flow_path.is_empty() {
        anyhow::bail!("--contact-flow-path must name a directory inside the repository");
    }
    let flow_path = flow_path.as_str();

    let gh = GitHubClient::from_env(token)?;
    let saved = fetch::fetch_changed_flows(&gh, owner, repo, commit, flow_path, output_dir).await?;

    if saved.is_empty() {
        println!("No contact flows under {} changed in this commit", flow_path);
        return Ok(());
    }
    for flow in &saved {
        let marker = if flow.is_new { " (new flow)" } else { "" };
        println!("✅ {}{}", flow.path, marker);
        println!("   - Original: {}", flow.original.display());
        println!("   - Modified: {}", flow.modified.display());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Status command
// ---------------------------------------------------------------------------

async fn status_cmd(root: &Path) -> anyhow::Result<()> {
    println!("{} FlowCompare Status\n", LOGO);

    let dir = DeploymentDir::new(root);
    let mut checks: Vec<Check> = status::record_checks(&dir);
    checks.extend(status::tool_checks(git::on_path));

    match dir.load_config() {
        Ok(cfg) => {
            println!("  Repository: {}", cfg.repo_slug());
            println!("  Account:    {} ({})", cfg.aws_account_id, cfg.aws_region);
            println!("  Flows:      {}\n", cfg.contact_flow_path);

            if let Ok(aws) = dir.load_aws() {
                println!("  Role:       {}\n", aws.role_arn);
            }

            checks.push(status::workflow_check(root, &cfg));
            checks.extend(status::flow_checks(root, &cfg));
            if !cfg.github_token.is_empty() {
                let gh = GitHubClient::from_env(cfg.github_token.clone())?;
                checks.push(status::token_check(&gh).await);
            }
        }
        Err(e) => tracing::debug!(error = %e, "No deployment config"),
    }

    for check in &checks {
        println!("  {} {:<9} {}", check.icon(), check.name, check.detail);
        if let Some(remedy) = &check.remedy {
            println!("               → {}", remedy);
        }
    }

    let failures = checks
        .iter()
        .filter(|c| c.state == CheckState::Fail)
        .count();
    if failures > 0 {
        anyhow::bail!("{} check(s) failed", failures);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Other commands
// ---------------------------------------------------------------------------

fn version_cmd() {
    println!("{} FlowCompare v{}", LOGO, flowcompare::VERSION);
    println!("  Amazon Connect contact-flow comparison setup");
}
