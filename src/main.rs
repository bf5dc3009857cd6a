use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;

use abc_migrate_lib::archive::{file_digests, read_project, write_project};
use abc_migrate_lib::i18n::{Catalog, Lang};
use abc_migrate_lib::legacy_crypto::PassphraseCipher;
use abc_migrate_lib::modal::{ModalService, StaticModal, TerminalModal};
use abc_migrate_lib::schema::{validate_manifest, violations};
use abc_migrate_lib::{AppError, MigrationChain, MigrationServices};

const FAILURE_EXIT_CODE: i32 = 1;
const WRONG_PASSWORD_EXIT_CODE: i32 = 2;

#[derive(Debug, Parser)]
#[command(
    name = "abc-migrate",
    about = "Upgrade Abc-Map project archives to the current schema",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Migrate a project archive to the current schema version.
    Migrate {
        /// Project archive to read.
        input: PathBuf,
        /// Where to write the migrated archive. Defaults to the input file.
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
        /// Never prompt. Projects holding credentials fail instead.
        #[arg(long)]
        silent: bool,
        /// Project password, used instead of an interactive prompt.
        #[arg(long, env = "ABC_MIGRATE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        /// Language of prompts and warnings.
        #[arg(long, default_value_t = Lang::En)]
        lang: Lang,
    },
    /// Show the version, pending steps and file digests of an archive.
    Inspect {
        input: PathBuf,
        /// Emit a machine-readable JSON object.
        #[arg(long)]
        json: bool,
    },
    /// List the target version of every migration step.
    Steps,
    /// Validate an archive against the current manifest schema.
    Check { input: PathBuf },
}

#[tokio::main]
async fn main() {
    abc_migrate_lib::init_logging();

    let cli = Cli::parse();
    match handle_cli(cli.command).await {
        Ok(code) => process::exit(code),
        Err(err) => process::exit(report_error(AppError::from(err))),
    }
}

fn report_error(err: AppError) -> i32 {
    eprintln!("Error: {err}");
    for cause in err.chain().skip(1) {
        eprintln!("  caused by: {cause}");
    }
    if err.is_wrong_password() {
        WRONG_PASSWORD_EXIT_CODE
    } else {
        FAILURE_EXIT_CODE
    }
}

async fn handle_cli(command: Commands) -> Result<i32> {
    match command {
        Commands::Migrate {
            input,
            output,
            silent,
            password,
            lang,
        } => handle_migrate(&input, output.as_deref(), silent, password, lang).await,
        Commands::Inspect { input, json } => handle_inspect(&input, json),
        Commands::Steps => handle_steps(),
        Commands::Check { input } => handle_check(&input),
    }
}

fn services(password: Option<String>, lang: Lang) -> MigrationServices {
    let modal: Arc<dyn ModalService> = match password {
        Some(password) => Arc::new(StaticModal::with_password(password)),
        None => Arc::new(TerminalModal::new()),
    };
    MigrationServices {
        modal,
        cipher: Arc::new(PassphraseCipher::default()),
        translator: Arc::new(Catalog::new(lang)),
    }
}

async fn handle_migrate(
    input: &Path,
    output: Option<&Path>,
    silent: bool,
    password: Option<String>,
    lang: Lang,
) -> Result<i32> {
    let project = read_project(input)
        .with_context(|| format!("read project archive {}", input.display()))?;
    let chain = MigrationChain::with_defaults(&services(password, lang))
        .context("build migration chain")?;
    let pending = chain.pending(&project).len();

    let migrated = chain
        .update(&project, silent)
        .await
        .map_err(AppError::from)
        .with_context(|| format!("migrate {}", input.display()))?;
    validate_manifest(migrated.manifest()).context("validate migrated manifest")?;

    let target = output.unwrap_or(input);
    if pending == 0 && target == input {
        println!(
            "{} is already at version {}",
            input.display(),
            migrated.version()
        );
        return Ok(0);
    }
    write_project(target, &migrated)
        .with_context(|| format!("write project archive {}", target.display()))?;
    println!(
        "Migrated {} from {} to {} ({} steps) into {}",
        input.display(),
        project.version(),
        migrated.version(),
        pending,
        target.display()
    );
    Ok(0)
}

fn handle_inspect(input: &Path, emit_json: bool) -> Result<i32> {
    let project = read_project(input)
        .with_context(|| format!("read project archive {}", input.display()))?;
    // Inspection never runs a step, so the services are never called.
    let chain = MigrationChain::with_defaults(&services(None, Lang::default()))
        .context("build migration chain")?;
    let pending: Vec<String> = chain
        .pending(&project)
        .into_iter()
        .map(ToString::to_string)
        .collect();
    let digests = file_digests(&project);

    if emit_json {
        let payload = json!({
            "id": project.id(),
            "name": project.name(),
            "version": project.version().to_string(),
            "currentVersion": chain.current_version().to_string(),
            "pendingSteps": pending,
            "files": digests,
        });
        let serialized =
            serde_json::to_string_pretty(&payload).context("serialize inspection payload")?;
        println!("{serialized}");
    } else {
        println!("Project:  {}", project.name().unwrap_or("<unnamed>"));
        println!("Version:  {}", project.version());
        println!("Current:  {}", chain.current_version());
        if pending.is_empty() {
            println!("Pending:  none");
        } else {
            println!("Pending:  {}", pending.join(", "));
        }
        for digest in &digests {
            println!("{}  {:>10}  {}", digest.sha256, digest.size, digest.path);
        }
    }
    Ok(0)
}

fn handle_steps() -> Result<i32> {
    let chain = MigrationChain::with_defaults(&services(None, Lang::default()))
        .context("build migration chain")?;
    for target in chain.targets() {
        println!("{target}");
    }
    Ok(0)
}

fn handle_check(input: &Path) -> Result<i32> {
    let project = read_project(input)
        .with_context(|| format!("read project archive {}", input.display()))?;
    let found = violations(project.manifest());
    if found.is_empty() {
        println!("{} is valid", input.display());
        return Ok(0);
    }
    eprintln!("{} does not match the current schema:", input.display());
    for violation in &found {
        eprintln!("  {violation}");
    }
    Ok(FAILURE_EXIT_CODE)
}
