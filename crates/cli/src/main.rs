use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use stocksage_core::coordinator::{Coordinator, TracingNotifier, ViewState};
use stocksage_core::domain::signal::Signal;
use stocksage_core::llm::gemini::GeminiClient;
use stocksage_core::llm::ModelCaller;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Interactive terminal front-end: each input line is one debounced
/// "keystroke" of the search box.
#[derive(Debug, Parser)]
#[command(name = "stocksage_cli")]
struct Args {
    /// Quiet period after the last keystroke before a search is issued.
    #[arg(long, default_value_t = 300)]
    debounce_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = stocksage_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let client = match GeminiClient::from_settings(&settings) {
        Ok(client) => client,
        Err(err) => {
            sentry_anyhow::capture_anyhow(&err);
            tracing::error!(error = %err, "failed to build Gemini client");
            return Err(err);
        }
    };
    let caller: Arc<dyn ModelCaller> = Arc::new(client);
    let coordinator = Coordinator::spawn(
        caller,
        Arc::new(TracingNotifier),
        Duration::from_millis(args.debounce_ms),
    );

    tracing::info!(debounce_ms = args.debounce_ms, "coordinator ready");
    println!("Type to search. Commands: :s N select suggestion, :p N reuse prompt, :q quit.");

    let mut watcher = coordinator.watch();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            changed = watcher.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = watcher.borrow_and_update().clone();
                render(&view);
            }
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                let line = line.trim().to_string();
                if line == ":q" {
                    break;
                }
                if let Some(n) = parse_index_command(&line, ":s") {
                    let view = coordinator.view();
                    match view.suggestions.get(n) {
                        Some(suggestion) => coordinator.select_stock(suggestion.clone()),
                        None => println!("no suggestion #{n}"),
                    }
                } else if let Some(n) = parse_index_command(&line, ":p") {
                    let view = coordinator.view();
                    match view.prompt_suggestions.get(n) {
                        Some(prompt) => coordinator.reuse_prompt(prompt.clone()),
                        None => println!("no prompt #{n}"),
                    }
                } else {
                    coordinator.input_changed(line);
                }
            }
        }
    }

    coordinator.shutdown();
    Ok(())
}

fn parse_index_command(line: &str, prefix: &str) -> Option<usize> {
    line.strip_prefix(prefix)?.trim().parse().ok()
}

fn render(view: &ViewState) {
    println!("--------------------------------------------------");
    println!("search: {:?}", view.search_term);
    if view.loading.search {
        println!("  searching...");
    }
    for (i, suggestion) in view.suggestions.iter().enumerate() {
        println!("  [{i}] {suggestion}");
    }

    if let Some(stock) = &view.selected_stock {
        println!("selected: {stock}");
        if view.loading.analysis {
            println!("  analyzing...");
        } else if let Some(analysis) = &view.analysis {
            let signal = Signal::from_color_code(&analysis.overall_color_code);
            println!(
                "  [{signal}] ({}) {}",
                analysis.overall_color_code, analysis.overall_analysis
            );
            for section in &analysis.strategies {
                let section_signal = Signal::from_color_code(&section.color_code);
                println!("    {} [{section_signal}]: {}", section.kind, section.content);
            }
        }

        if view.loading.prompts {
            println!("  fetching prompt ideas...");
        } else {
            for (i, prompt) in view.prompt_suggestions.iter().enumerate() {
                println!("  prompt [{i}] {prompt}");
            }
        }
    }
}

fn init_sentry(settings: &stocksage_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
