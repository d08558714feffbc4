#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use jetdeploy_core::schema::{self, ArtifactKind};
use jetdeploy_core::spec::matrix::CompatibilityMatrix;
use jetdeploy_core::traits::{ExecutionJournal, NullJournal};
use jetdeploy_core::types::PlanMode;
use jetdeploy_engine::atomic::write_json;
use jetdeploy_engine::config::{ExecutionOptions, WorkspaceConfig};
use jetdeploy_engine::journal::{run_scoped_path, verify_chain, JsonlJournal};
use jetdeploy_engine::runner::ShellRunner;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Exit status when execution finished with failed steps.
const EXIT_STEPS_FAILED: u8 = 2;

#[derive(Parser)]
#[command(
    name = "jdeploy",
    version,
    about = "Version-aware, approval-gated deployment plans for Jetson devices."
)]
struct Cli {
    /// Debug-level logs on stderr (RUST_LOG overrides).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Clone, Copy, ValueEnum)]
enum YesNo {
    Yes,
    No,
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Guided,
    Auto,
}

impl From<Mode> for PlanMode {
    fn from(m: Mode) -> Self {
        match m {
            Mode::Guided => PlanMode::Guided,
            Mode::Auto => PlanMode::Auto,
        }
    }
}

#[derive(Subcommand)]
enum Cmd {
    /// Compare tutorial requirements against device facts.
    Analyze {
        /// Device facts (facts.json).
        #[arg(long)]
        facts: PathBuf,

        /// Extracted requirements (requirements.json).
        #[arg(long)]
        requirements: PathBuf,

        /// Replacement compatibility matrix (defaults to the embedded one).
        #[arg(long)]
        matrix: Option<PathBuf>,

        /// Write analysis.json here.
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Turn an analysis into an ordered, risk-classified plan.
    Plan {
        /// Analyzer output (analysis.json).
        #[arg(long)]
        analysis: PathBuf,

        /// Whether privileged steps may run with sudo.
        #[arg(long, value_enum, default_value = "no")]
        allow_sudo: YesNo,

        /// guided: every non-low step needs approval. auto: only high.
        #[arg(long, value_enum, default_value = "guided")]
        mode: Mode,

        /// Write deploy-plan.json here.
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Run the approved steps of a plan.
    Execute {
        /// Plan to run (deploy-plan.json).
        #[arg(long)]
        plan: PathBuf,

        /// Approval policy; omitted means low risk only.
        #[arg(long)]
        approvals: Option<PathBuf>,

        /// Write execution-log.json here.
        #[arg(short, long)]
        output: PathBuf,

        /// Hash-chained change log (JSONL). Must not exist yet.
        #[arg(long)]
        journal: Option<PathBuf>,

        /// Shell used as `<shell> -c <command>`.
        #[arg(long)]
        shell: Option<String>,

        /// Per-command timeout in seconds.
        #[arg(long, value_name = "SECS")]
        command_timeout: Option<u64>,

        /// Wall-clock budget for the whole run in seconds.
        #[arg(long, value_name = "SECS")]
        run_budget: Option<u64>,
    },

    /// Schema + consistency report for one artifact.
    Check {
        /// Artifact kind.
        #[arg(long)]
        kind: ArtifactKind,

        /// Path to the artifact .json file.
        file: PathBuf,

        /// Output structured JSON report.
        #[arg(long)]
        json: bool,
    },

    /// Verify a change log hash chain.
    Journal {
        /// Path to the .journal.jsonl file.
        file: PathBuf,

        /// Verify the hash chain.
        #[arg(long)]
        verify: bool,
    },

    /// Print the embedded compatibility matrix.
    Matrix,

    /// Write workspace defaults (.jdeploy/config.json).
    Init {
        /// Overwrite an existing config.
        #[arg(long)]
        force: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli.cmd) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cmd: Cmd) -> Result<ExitCode> {
    let config = WorkspaceConfig::load(Path::new("."))?;

    match cmd {
        Cmd::Analyze {
            facts,
            requirements,
            matrix,
            output,
        } => cmd_analyze(&config, &facts, &requirements, matrix.as_deref(), &output),

        Cmd::Plan {
            analysis,
            allow_sudo,
            mode,
            output,
        } => cmd_plan(&analysis, matches!(allow_sudo, YesNo::Yes), mode.into(), &output),

        Cmd::Execute {
            plan,
            approvals,
            output,
            journal,
            shell,
            command_timeout,
            run_budget,
        } => {
            let defaults = config.execution_options();
            let options = ExecutionOptions {
                command_timeout: command_timeout
                    .map(Duration::from_secs)
                    .or(defaults.command_timeout),
                run_budget: run_budget.map(Duration::from_secs).or(defaults.run_budget),
            };
            let shell = shell.unwrap_or_else(|| config.shell.clone());
            // a configured journal is a base name; each run gets its own file
            let journal = journal.or_else(|| {
                config
                    .journal
                    .as_deref()
                    .map(|base| run_scoped_path(base, Utc::now()))
            });
            cmd_execute(
                &plan,
                approvals.as_deref(),
                &output,
                journal.as_deref(),
                &shell,
                options,
            )
        }

        Cmd::Check { kind, file, json } => cmd_check(kind, &file, json),

        Cmd::Journal { file, verify } => cmd_journal(&file, verify),

        Cmd::Matrix => cmd_matrix(),

        Cmd::Init { force } => cmd_init(force),
    }
}

fn cmd_analyze(
    config: &WorkspaceConfig,
    facts: &Path,
    requirements: &Path,
    matrix: Option<&Path>,
    output: &Path,
) -> Result<ExitCode> {
    let facts = schema::load_facts(facts)?;
    let requirement = schema::load_requirements(requirements)?;
    let matrix = schema::load_matrix(matrix.or(config.matrix.as_deref()))?;
    check_matrix(&matrix)?;

    let result = jetdeploy_engine::analyze(&facts, &requirement, &matrix);
    write_json(output, &result)?;
    eprintln!(
        "  {} ({} issue(s), {} blocked) -> {}",
        result.overall_status,
        result.issues.len(),
        result.blocked_items.len(),
        output.display()
    );
    Ok(ExitCode::SUCCESS)
}

/// A replacement matrix must still be internally sane.
fn check_matrix(matrix: &CompatibilityMatrix) -> Result<()> {
    let value = serde_json::to_value(matrix)?;
    let report = schema::check(ArtifactKind::Matrix, &value, "matrix");
    if let Some(e) = report.errors.first() {
        bail!("matrix rejected: {} {}", e.code, e.message);
    }
    Ok(())
}

fn cmd_plan(analysis: &Path, allow_sudo: bool, mode: PlanMode, output: &Path) -> Result<ExitCode> {
    let analysis = schema::load_analysis(analysis)?;
    let plan = jetdeploy_engine::generate(&analysis, allow_sudo, mode)?;
    write_json(output, &plan)?;
    eprintln!(
        "  {} step(s), {} manual prerequisite(s) -> {}",
        plan.steps.len(),
        plan.manual_prerequisites.len(),
        output.display()
    );
    Ok(ExitCode::SUCCESS)
}

fn cmd_execute(
    plan: &Path,
    approvals: Option<&Path>,
    output: &Path,
    journal: Option<&Path>,
    shell: &str,
    options: ExecutionOptions,
) -> Result<ExitCode> {
    let plan = schema::load_plan(plan)?;
    let policy = schema::load_approvals(approvals)?;

    let violations = plan.privilege_violations();
    if let Some(step) = violations.first() {
        bail!(
            "step {} requires sudo but is classified '{}'; refusing to run",
            step.id,
            step.risk_level
        );
    }

    let runner = ShellRunner::new(shell, options.command_timeout);
    let jsonl;
    let journal: &dyn ExecutionJournal = match journal {
        Some(path) => {
            jsonl = JsonlJournal::create(path)?;
            info!(journal = %path.display(), "recording change log");
            &jsonl
        }
        None => &NullJournal,
    };

    let log = jetdeploy_engine::execute(&plan, &policy, &runner, journal, &options);
    write_json(output, &log)?;

    let s = &log.summary;
    eprintln!(
        "  executed {}, skipped {}, failed {}, verified {} -> {}",
        s.executed_steps,
        s.skipped_steps,
        s.failed_steps,
        s.verified_steps,
        output.display()
    );
    for n in &s.not_executed {
        eprintln!("  not run  {}: {}", n.step_id, n.reason);
    }

    if let Some(e) = &s.journal_error {
        bail!("change log failed, execution stopped: {e} (log written to {})", output.display());
    }
    if s.failed_steps > 0 {
        warn!(failed = s.failed_steps, "execution finished with failures");
        return Ok(ExitCode::from(EXIT_STEPS_FAILED));
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_check(kind: ArtifactKind, file: &Path, json_out: bool) -> Result<ExitCode> {
    let shown = file.display().to_string();
    let data = schema::read_json(file)?;
    let report = schema::check(kind, &data, &shown);

    if json_out {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        if report.pass {
            eprintln!("  ok  {shown} ({kind})");
        } else {
            eprintln!("  FAIL {shown} ({kind})");
        }
        for e in &report.errors {
            eprintln!(
                "  error {}: {} {}",
                e.code,
                e.message,
                e.path.as_deref().unwrap_or("")
            );
        }
        for w in &report.warnings {
            eprintln!(
                "  warn  {}: {} {}",
                w.code,
                w.message,
                w.path.as_deref().unwrap_or("")
            );
        }
    }

    if !report.pass {
        bail!("check failed for {shown}");
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_journal(file: &Path, verify: bool) -> Result<ExitCode> {
    if !verify {
        bail!("specify --verify");
    }
    let report = verify_chain(file).with_context(|| format!("{}", file.display()))?;
    eprintln!(
        "  journal chain valid ({} entries, {} approvals, {} executions{})",
        report.entries,
        report.approvals,
        report.executions,
        if report.has_summary { ", summary" } else { "" }
    );
    Ok(ExitCode::SUCCESS)
}

fn cmd_matrix() -> Result<ExitCode> {
    print!("{}", CompatibilityMatrix::embedded_json());
    Ok(ExitCode::SUCCESS)
}

fn cmd_init(force: bool) -> Result<ExitCode> {
    let path = WorkspaceConfig::init(Path::new("."), force)?;
    eprintln!("created {}", path.display());
    Ok(ExitCode::SUCCESS)
}
