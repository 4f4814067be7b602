use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use codeplay_core::runtime::RuntimeProvider;
use codeplay_core::{
    CodeSession, ConfigLoader, ExecutionDispatcher, ExecutionObserver, LanguageId,
    PlaygroundConfig, RuntimeLoader, StandalonePythonProvider,
};
use log::LevelFilter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[clap(name = "codeplay", author, version, about = "Run lesson code in JavaScript, Python or C++")]
struct Cli {
    #[clap(subcommand)]
    command: Commands,

    #[clap(
        long,
        short,
        global = true,
        default_value = "codeplay.yaml",
        help = "Configuration source: file path or http(s) URL"
    )]
    config: String,

    #[clap(long, short, global = true, default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a source file and print its output
    Run {
        file: PathBuf,

        #[clap(long, short = 'L', help = "Language tag; inferred from the file extension when omitted")]
        language: Option<String>,

        #[clap(long, help = "Skip the interpreter runtime and compile service, use the simulators")]
        simulate: bool,

        #[clap(long, help = "File holding the expected output; exit 1 on mismatch")]
        expect: Option<PathBuf>,
    },
    /// Manage the downloadable Python runtime
    Runtime {
        #[clap(subcommand)]
        action: RuntimeCommands,
    },
}

#[derive(Subcommand, Debug)]
enum RuntimeCommands {
    /// Download and unpack the Python runtime
    Install,
    /// Show where the runtime lives and whether it is usable
    Info {
        #[clap(long, help = "Start the interpreter and report its version")]
        probe: bool,
    },
}

/// Logs every edit and run at debug level.
struct LoggingObserver;

impl ExecutionObserver for LoggingObserver {
    fn on_code_change(&self, code: &str) {
        log::debug!("Code changed ({} bytes)", code.len());
    }

    fn on_code_run(&self, source_code: &str, output: &str, success: bool) {
        log::debug!(
            "Ran {} bytes, success: {}, {} bytes of output",
            source_code.len(),
            success,
            output.len()
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level_filter = cli.log_level.parse().unwrap_or(LevelFilter::Warn);
    env_logger::Builder::new()
        .filter_level(log_level_filter)
        .init();

    let config = ConfigLoader::from_source_or_default(&cli.config).await?;

    let succeeded = match cli.command {
        Commands::Run {
            file,
            language,
            simulate,
            expect,
        } => run_file(&config, &file, language, simulate, expect.as_deref()).await?,
        Commands::Runtime { action } => handle_runtime_command(&config, action).await?,
    };

    if !succeeded {
        std::process::exit(1);
    }
    Ok(())
}

async fn run_file(
    config: &PlaygroundConfig,
    file: &Path,
    language: Option<String>,
    simulate: bool,
    expect: Option<&Path>,
) -> Result<bool> {
    let language = match language {
        Some(language) => language,
        None => infer_language(file)?.as_str().to_string(),
    };
    let code = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let dispatcher = if simulate {
        ExecutionDispatcher::simulation_only(config)
    } else {
        ExecutionDispatcher::from_config(config)?
    };

    let mut session = CodeSession::new(Arc::new(dispatcher), language, code)
        .with_observer(Arc::new(LoggingObserver));
    if let Some(path) = expect {
        let expected = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read expected output {}", path.display()))?;
        session = session.with_expected_output(expected);
    }

    let report = session.run().await;
    if report.result.success {
        println!("{}", report.result.output);
    } else {
        eprintln!("{}", report.result.output);
    }

    match report.matches_expected {
        Some(true) => {
            eprintln!("Output matches the expected output.");
            Ok(report.result.success)
        }
        Some(false) => {
            eprintln!("Output does not match the expected output.");
            Ok(false)
        }
        None => Ok(report.result.success),
    }
}

fn infer_language(file: &Path) -> Result<LanguageId> {
    file.extension()
        .and_then(|ext| ext.to_str())
        .and_then(LanguageId::from_extension)
        .ok_or_else(|| {
            anyhow!(
                "Cannot infer the language of {}; pass --language",
                file.display()
            )
        })
}

async fn handle_runtime_command(config: &PlaygroundConfig, action: RuntimeCommands) -> Result<bool> {
    let runtime_config = &config.python.runtime;
    let provider = StandalonePythonProvider::from_config(runtime_config)?;

    match action {
        RuntimeCommands::Install => {
            let interpreter = provider.install().await?;
            println!("Python runtime installed at {}", interpreter.display());
            Ok(true)
        }
        RuntimeCommands::Info { probe } => {
            println!("Runtime home: {}", provider.home().display());
            println!("Runtime archive: {}", runtime_config.script_url);
            println!(
                "Bundled interpreter: {} ({})",
                provider.bundled_interpreter().display(),
                if provider.is_installed() { "installed" } else { "not installed" }
            );
            match provider.interpreter_path() {
                Some(path) => println!("Interpreter in use: {}", path.display()),
                None => println!("Interpreter in use: none (Python runs in the simulator)"),
            }

            if !probe {
                return Ok(true);
            }
            if !provider.loader_available() {
                println!("Probe skipped: no interpreter available");
                return Ok(false);
            }

            let loader = RuntimeLoader::from_config(Arc::new(provider), runtime_config);
            match loader.acquire().await {
                Ok(handle) => {
                    println!("Python {} ready", handle.info().version);
                    Ok(true)
                }
                Err(e) => {
                    println!("Probe failed: {}", e);
                    Ok(false)
                }
            }
        }
    }
}
