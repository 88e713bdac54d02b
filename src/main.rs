use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gradle_shell::config::{ColorMode, ShellConfig};
use gradle_shell::engine::EngineConnection;
use gradle_shell::session::{self, SessionOptions};
use gradle_shell::shell::EditorReader;
use gradle_shell::ShellError;

#[derive(Parser)]
#[command(name = "gsh")]
#[command(about = "Interactive Gradle shell over a single persistent build engine connection")]
#[command(version)]
struct Cli {
    /// Project directory (defaults to the current directory)
    #[arg(short = 'C', long)]
    project_dir: Option<PathBuf>,

    /// Engine program and arguments, e.g. "java -jar engine.jar"
    #[arg(long)]
    engine: Option<String>,

    /// Build tool installation for the engine to use
    #[arg(long)]
    installation: Option<PathBuf>,

    /// JVM argument for every build (repeatable)
    #[arg(long = "jvm-arg", allow_hyphen_values = true)]
    jvm_arguments: Vec<String>,

    /// Ask the engine for coloured output
    #[arg(long, value_enum)]
    color: Option<ColorMode>,

    /// Do not read or write the history file
    #[arg(long)]
    no_history: bool,

    /// Log debug output to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Build arguments applied to the task fetch and to every build
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    arguments: Vec<String>,
}

/// Initialize tracing to stderr; stdout carries the banner and build output.
fn init_tracing(verbose: bool) {
    let default = if verbose {
        "gradle_shell=debug"
    } else {
        "gradle_shell=warn"
    };
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| default.into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

impl Cli {
    fn into_config(self) -> (ShellConfig, PathBuf, Vec<String>) {
        let mut config = ShellConfig::load();

        if let Some(engine) = self.engine {
            let engine: Vec<String> = engine.split_whitespace().map(str::to_string).collect();
            if !engine.is_empty() {
                config.engine = engine;
            }
        }
        if self.installation.is_some() {
            config.installation = self.installation;
        }
        config.jvm_arguments.extend(self.jvm_arguments);
        if let Some(color) = self.color {
            config.color = color;
        }
        if self.no_history {
            config.history = false;
        }

        let project_dir = self.project_dir.unwrap_or_else(|| PathBuf::from("."));
        (config, project_dir, self.arguments)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let (config, project_dir, arguments) = cli.into_config();
    let project_dir = project_dir
        .canonicalize()
        .with_context(|| format!("Project directory {} not found", project_dir.display()))?;

    let connection = EngineConnection::connect(
        &config.engine,
        &project_dir,
        config.installation.as_deref(),
    )
    .await
    .map_err(ShellError::Connection)?;

    let options = SessionOptions::new(
        arguments,
        config.jvm_arguments.clone(),
        config.color.enabled(std::io::stdout().is_terminal()),
    );
    let history = config.history_path();

    session::run(
        connection,
        &options,
        |index| {
            EditorReader::new(index, history)
                .map_err(|e| ShellError::Input(std::io::Error::other(e.to_string())))
        },
        &mut tokio::io::stdout(),
        &mut tokio::io::stderr(),
    )
    .await?;

    Ok(())
}
