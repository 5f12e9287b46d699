use anyhow::Result;
use clap::Parser;
use log::LevelFilter;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use sandpit_core::{ExecutionRequest, ExecutionResult, LanguageRegistry, SandboxConfig, SandboxManager};

#[derive(Parser, Debug)]
#[clap(
    name = "Sandpit",
    version = "0.1.0",
    about = "Sandboxed code execution with selectable isolation strength"
)]
struct Cli {
    #[clap(long, short = 'e', help = "Execute the given code and print the result")]
    execute: Option<String>,

    #[clap(long, short, default_value = "python", help = "Language of the submitted code")]
    language: String,

    #[clap(
        long,
        short,
        default_value = "resource_limited",
        help = "Backend to execute on (process, resource_limited, container)"
    )]
    backend: String,

    #[clap(long, help = "Per-call timeout in seconds, overriding the configured default")]
    timeout: Option<u64>,

    #[clap(long, help = "Run the code on every backend and compare the results")]
    compare: bool,

    #[clap(long, help = "Report backend availability and configuration")]
    status: bool,

    #[clap(long, help = "Run a set of demo snippets across all available backends")]
    demo: bool,

    #[clap(long, short, help = "Write the execution result to a file as JSON")]
    output: Option<PathBuf>,

    #[clap(long, default_value = "info")]
    log_level: String,
}

fn print_result(result: &ExecutionResult) {
    if result.success {
        println!(
            "ok ({}, {:.3}s)",
            result.backend,
            result.execution_time.as_secs_f64()
        );
        if !result.stdout.is_empty() {
            print!("{}", result.stdout);
            if !result.stdout.ends_with('\n') {
                println!();
            }
        }
    } else {
        println!(
            "failed ({}, {:.3}s, exit code {})",
            result.backend,
            result.execution_time.as_secs_f64(),
            result.exit_code
        );
        if let Some(error) = &result.error {
            println!("error [{}]: {}", error.kind, error.message);
        }
        if !result.stderr.is_empty() {
            eprint!("{}", result.stderr);
        }
    }
    if let Some(container_id) = &result.container_id {
        println!("container: {}", container_id);
    }
}

async fn status(manager: &SandboxManager) {
    let report: BTreeMap<_, _> = manager.availability().await.into_iter().collect();
    println!("backends:");
    for (name, availability) in report {
        let marker = if availability.available { "up  " } else { "down" };
        let detail = availability.detail.unwrap_or_default();
        println!("  [{}] {:<17} {}", marker, name, detail);
        if let Some(info) = manager.info(&name) {
            println!(
                "         timeout {}s, memory {} MiB, network {}, screen {}, languages: {}",
                info.timeout_secs,
                info.memory_limit_bytes / (1024 * 1024),
                if info.network_enabled { "on" } else { "off" },
                if info.security_screen_enabled { "on" } else { "off" },
                info.languages.join(", ")
            );
        }
    }
}

async fn compare(manager: &SandboxManager, code: &str, language: &str) {
    let results: BTreeMap<_, _> = manager.compare(code, language).await.into_iter().collect();
    println!("comparison:");
    for (name, result) in results {
        if result.success {
            println!(
                "  {:<17} ok     {:.3}s  {} bytes of output",
                name,
                result.execution_time.as_secs_f64(),
                result.stdout.len()
            );
        } else {
            let reason = result
                .error
                .as_ref()
                .map(|e| e.message.clone())
                .unwrap_or_default();
            println!(
                "  {:<17} failed {:.3}s  {}",
                name,
                result.execution_time.as_secs_f64(),
                reason
            );
        }
    }
}

async fn demo(manager: &SandboxManager) {
    let snippets = [
        (
            "math basics",
            "python",
            "import math\nprint(f'pi = {math.pi:.6f}')\nprint(f'sqrt(2) = {math.sqrt(2):.6f}')",
        ),
        (
            "array operations",
            "javascript",
            "const numbers = [1, 2, 3, 4, 5];\nconsole.log('doubled:', numbers.map(x => x * 2).join(','));\nconsole.log('sum:', numbers.reduce((a, b) => a + b, 0));",
        ),
        (
            "runtime error handling",
            "python",
            "print('before')\n1/0",
        ),
    ];

    let availability = manager.availability().await;
    let mut backends: Vec<String> = availability
        .into_iter()
        .filter(|(_, a)| a.available)
        .map(|(name, _)| name)
        .collect();
    backends.sort();
    println!("running demo on: {}", backends.join(", "));

    for (title, language, code) in snippets {
        println!("\n=== {} ({}) ===", title, language);
        for backend in &backends {
            println!("--- {} ---", backend);
            let result = manager.execute(code, language, backend).await;
            print_result(&result);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = cli.log_level.parse::<LevelFilter>().unwrap_or(LevelFilter::Info);
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    let config = SandboxConfig::from_env();
    let manager = SandboxManager::new(LanguageRegistry::builtin(), config);

    if cli.status {
        status(&manager).await;
        return Ok(());
    }

    if cli.demo {
        demo(&manager).await;
        return Ok(());
    }

    let Some(code) = cli.execute else {
        // Nothing to run; show what is available instead.
        status(&manager).await;
        return Ok(());
    };

    if cli.compare {
        compare(&manager, &code, &cli.language).await;
        return Ok(());
    }

    let mut request = ExecutionRequest::new(code, cli.language.clone());
    if let Some(secs) = cli.timeout {
        request = request.with_timeout(Duration::from_secs(secs));
    }
    let result = manager.execute_request(request, &cli.backend).await;

    if let Some(path) = cli.output {
        let json = serde_json::to_string_pretty(&result)?;
        tokio::fs::write(&path, json).await?;
        println!("result written to {}", path.display());
    } else {
        print_result(&result);
    }

    if !result.success {
        std::process::exit(1);
    }
    Ok(())
}
