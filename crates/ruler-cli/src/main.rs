use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use ruler_config::{ConfigLoader, LoggingConfig};
use serde_json::Value;
use std::fs;
use std::io::Read;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod app;

use app::Mode;

#[derive(Parser, Debug)]
#[command(author, version, about = "Run business rules against JSON objects", long_about = None)]
struct Args {
    /// Config directory (contains ruler.toml and rules/)
    #[arg(short, long, default_value = "./config")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate the configuration
    Check,

    /// List the active rules of every business type
    List,

    /// Run the rules of a business type against a JSON document
    Run {
        /// Business type
        #[arg(short, long)]
        business_type: String,

        /// Input JSON file, `-` reads stdin
        #[arg(short, long, default_value = "-")]
        input: String,

        #[arg(short, long, value_enum, default_value_t = RunMode::Execute)]
        mode: RunMode,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum RunMode {
    /// Produce a report for every violated rule
    Execute,
    /// Only answer whether any rule is violated
    Evaluate,
    /// Only check suspected-grade rules
    Suspected,
}

impl From<RunMode> for Mode {
    fn from(mode: RunMode) -> Self {
        match mode {
            RunMode::Execute => Mode::Execute,
            RunMode::Evaluate => Mode::Evaluate,
            RunMode::Suspected => Mode::Suspected,
        }
    }
}

fn init_tracing(logging: &LoggingConfig) {
    // RUST_LOG 优先于配置文件
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    // 日志输出到 stderr，stdout 只输出结果
    let registry = tracing_subscriber::registry().with(filter);
    if logging.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn read_input(input: &str) -> Result<Value> {
    let content = if input == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        fs::read_to_string(input).with_context(|| format!("Failed to read {}", input))?
    };
    Ok(serde_json::from_str(&content)?)
}

fn main() -> Result<()> {
    let args = Args::parse();

    let loader = ConfigLoader::new(&args.config);
    let config = loader.load_all()?;
    init_tracing(&config.global.logging);

    tracing::info!("Loaded config from {}", args.config.display());

    match args.command {
        Command::Check => {
            loader.validate()?;
            println!("configuration ok: {} business types", config.rules.len());
        }
        Command::List => {
            let manager = app::build_manager(&config)?;
            println!("{}", serde_json::to_string_pretty(&app::describe(&manager))?);
        }
        Command::Run {
            business_type,
            input,
            mode,
        } => {
            let object = read_input(&input)?;
            let manager = app::build_manager(&config)?;
            let output = app::run(&manager, &business_type, mode.into(), &object)?;
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
