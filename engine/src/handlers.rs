//! Command handlers for CLI operations
//!
//! This module implements the handlers for all CLI commands:
//! - chat: Interactive recommendation session
//! - ask: One-shot request from a given origin
//! - doctor: Validate configuration and check data sources and providers
//! - setup: Write the config file and store the API key

use anyhow::{Context, Result};
use sdk::{GeocodeOutcome, ToolGateway};
use serde_json::json;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::agent::{Orchestrator, TurnResponse};
use crate::config::Config;
use crate::events::{FanoutSink, PayloadLevel, RecordingSink, SharedSink, TracingEventSink};
use crate::llm::ollama::OllamaProvider;
use crate::llm::openai::OpenAIProvider;
use crate::llm::router::LLMRouter;
use crate::llm::LLMProvider;
use crate::secrets::{SecretManager, OPENAI_API_KEY};
use crate::tools::HttpToolGateway;

/// Keychain service name
const SERVICE_NAME: &str = "wayfarer";

/// Output format for command results
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine consumption
    Json,
}

/// Event sink for a session, plus the recorder when `--trace-events` is on.
pub fn build_sink(config: &Config, trace_events: bool) -> (SharedSink, Option<RecordingSink>) {
    let level = PayloadLevel::parse(&config.core.payload_level);
    let tracing_sink: SharedSink = Arc::new(TracingEventSink::new(level));

    if !trace_events {
        return (tracing_sink, None);
    }

    let recorder = RecordingSink::new(level);
    let fanout: SharedSink = Arc::new(FanoutSink::new(vec![
        tracing_sink,
        Arc::new(recorder.clone()),
    ]));
    (fanout, Some(recorder))
}

/// Register the configured LLM providers.
///
/// Ollama is always registered when the LLM is enabled; the OpenAI-compatible
/// provider only when its API key resolves. `None` means rule-based parsing only.
pub fn build_router(config: &Config, secrets: Arc<SecretManager>) -> Option<Arc<LLMRouter>> {
    if !config.llm.enabled {
        tracing::info!("LLM disabled in config, using rule-based parsing only");
        return None;
    }

    let mut providers: Vec<Box<dyn LLMProvider>> = vec![Box::new(OllamaProvider::new(
        config.llm.ollama.base_url.clone(),
        config.llm.ollama.model.clone(),
    ))];

    if secrets.has_secret(OPENAI_API_KEY) {
        providers.push(Box::new(OpenAIProvider::new(
            config.llm.openai.clone(),
            secrets,
        )));
    } else {
        tracing::debug!("No OpenAI-compatible API key, provider not registered");
    }

    Some(Arc::new(LLMRouter::new(
        providers,
        Arc::new(config.llm.clone()),
    )))
}

/// Wire the gateway, router and orchestrator for one session.
pub fn build_orchestrator(config: &Config, sink: SharedSink) -> Result<Orchestrator> {
    let gateway: Arc<dyn ToolGateway> = Arc::new(
        HttpToolGateway::from_config(&config.tools, Arc::clone(&sink))
            .context("Failed to initialize travel data gateway")?,
    );
    let router = build_router(config, Arc::new(SecretManager::new(SERVICE_NAME)));
    Ok(Orchestrator::new(gateway, router, config, sink))
}

fn print_response(
    response: &TurnResponse,
    orchestrator: &Orchestrator,
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Text => {
            let text = response.render();
            if !text.is_empty() {
                println!("{}", text);
                println!();
            }
        }
        OutputFormat::Json => {
            let output = json!({
                "state": orchestrator.state(),
                "response": response,
            });
            println!("{}", serde_json::to_string(&output)?);
        }
    }
    Ok(())
}

fn print_events(recorder: Option<&RecordingSink>) -> Result<()> {
    if let Some(recorder) = recorder {
        for event in recorder.drain() {
            eprintln!("{}", serde_json::to_string(&event)?);
        }
    }
    Ok(())
}

/// Run an interactive session on stdin/stdout
///
/// Lines starting with `/` are session commands: `/reset` forgets feedback,
/// `/memory` prints the feedback memory, `/quit` exits.
pub async fn handle_chat(config: &Config, format: OutputFormat, trace_events: bool) -> Result<()> {
    let (sink, recorder) = build_sink(config, trace_events);
    let orchestrator = build_orchestrator(config, sink)?;

    match format {
        OutputFormat::Text => {
            println!("{}", orchestrator.greeting());
            println!();
        }
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(&json!({ "greeting": orchestrator.greeting() }))?
            );
        }
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        if matches!(format, OutputFormat::Text) {
            print!("> ");
            std::io::stdout().flush()?;
        }

        let Some(line) = lines.next_line().await.context("Failed to read input")? else {
            break;
        };
        let line = line.trim();

        match line {
            "/quit" | "/exit" => break,
            "/reset" => {
                orchestrator.reset();
                println!("Feedback and conversation cleared.");
                continue;
            }
            "/memory" => {
                let snapshot = orchestrator.memory().snapshot();
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
                continue;
            }
            _ => {}
        }

        let response = orchestrator.handle_turn(line).await;
        print_response(&response, &orchestrator, format)?;
        print_events(recorder.as_ref())?;
    }

    Ok(())
}

/// Answer a single request from `origin` and exit
pub async fn handle_ask(
    origin: String,
    query: String,
    config: &Config,
    format: OutputFormat,
    trace_events: bool,
) -> Result<()> {
    let (sink, recorder) = build_sink(config, trace_events);
    let orchestrator = build_orchestrator(config, sink)?;

    let onboarding = orchestrator.handle_turn(&origin).await;
    print_events(recorder.as_ref())?;
    if !matches!(onboarding, TurnResponse::OriginSaved { .. }) {
        print_response(&onboarding, &orchestrator, format)?;
        anyhow::bail!("Origin '{}' was not accepted", origin);
    }

    let response = orchestrator.handle_turn(&query).await;
    print_response(&response, &orchestrator, format)?;
    print_events(recorder.as_ref())?;

    if let TurnResponse::Error { message } = &response {
        anyhow::bail!("{}", message);
    }
    Ok(())
}

/// Run system diagnostics
///
/// Checks the configuration, the airport table, a live geocoding lookup,
/// the API key source and the health of each registered LLM provider.
pub async fn handle_doctor(config: &Config, format: OutputFormat) -> Result<()> {
    let mut issues = Vec::new();
    let mut checks: Vec<(String, String)> = Vec::new();

    // Config is already validated when loaded
    checks.push(("Configuration".to_string(), "Valid".to_string()));

    let sink: SharedSink = Arc::new(TracingEventSink::new(PayloadLevel::Info));
    match HttpToolGateway::from_config(&config.tools, sink) {
        Ok(gateway) => {
            checks.push((
                "Airport table".to_string(),
                format!("{} airports", gateway.airports().len()),
            ));

            match gateway.geocode("Lisbon, Portugal", 1).await {
                GeocodeOutcome::Found(_) => {
                    checks.push(("Geocoding".to_string(), "Reachable".to_string()))
                }
                GeocodeOutcome::NotFound(cause) => {
                    checks.push(("Geocoding".to_string(), "Unreachable".to_string()));
                    issues.push(format!(
                        "Geocoding lookup failed ({}). Recommendations need {}",
                        cause, config.tools.geocoding_url
                    ));
                }
            }
        }
        Err(e) => {
            checks.push(("Airport table".to_string(), "Invalid".to_string()));
            issues.push(format!("Cannot initialize data gateway: {}", e));
        }
    }

    let secrets = Arc::new(SecretManager::new(SERVICE_NAME));
    match secrets.source_of(OPENAI_API_KEY) {
        Some(source) => checks.push(("API key".to_string(), format!("Found in {}", source))),
        None => checks.push(("API key".to_string(), "Not configured".to_string())),
    }

    match build_router(config, secrets) {
        Some(router) => {
            let health = router.check_health().await;
            if !health.iter().any(|(_, healthy)| *healthy) {
                issues.push(
                    "No LLM provider is reachable. Requests will use rule-based parsing only."
                        .to_string(),
                );
            }
            for (name, healthy) in health {
                checks.push((
                    format!("Provider {}", name),
                    if healthy { "Available" } else { "Not available" }.to_string(),
                ));
            }
        }
        None => checks.push(("LLM".to_string(), "Disabled".to_string())),
    }

    match format {
        OutputFormat::Text => {
            println!("Wayfarer Diagnostics");
            println!("====================");
            println!();

            println!("System Checks:");
            for (check, status) in &checks {
                println!("  {:<25} {}", format!("{}:", check), status);
            }

            println!();

            if issues.is_empty() {
                println!("✓ All checks passed!");
            } else {
                println!("⚠ Issues found:");
                println!();
                for (i, issue) in issues.iter().enumerate() {
                    println!("  {}. {}", i + 1, issue);
                }
            }
        }
        OutputFormat::Json => {
            let output = json!({
                "checks": checks.iter().map(|(name, status)| {
                    json!({
                        "name": name,
                        "status": status
                    })
                }).collect::<Vec<_>>(),
                "issues": issues,
                "healthy": issues.is_empty()
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(answer.trim().to_string())
}

/// Run the interactive setup wizard
///
/// Prompts for the default LLM provider, the OpenAI-compatible endpoint and
/// model, and the API key (stored in the keychain), then writes the config.
pub async fn handle_setup(config_path: Option<&std::path::Path>) -> Result<()> {
    println!("=== Wayfarer Setup ===");
    println!();

    let mut config = Config::default_config();

    println!("Available LLM providers:");
    println!("  1. openai-compatible (Groq, OpenAI, ...; requires API key)");
    println!("  2. ollama (local, free)");
    println!("  3. none (rule-based parsing only)");
    config.llm.default_provider = match prompt("Default provider [1]: ")?.as_str() {
        "2" => "ollama".to_string(),
        "3" => {
            config.llm.enabled = false;
            "openai".to_string()
        }
        _ => "openai".to_string(),
    };

    if config.llm.enabled && config.llm.default_provider == "openai" {
        let base_url = prompt(&format!("  Endpoint [{}]: ", config.llm.openai.base_url))?;
        if !base_url.is_empty() {
            config.llm.openai.base_url = base_url;
        }
        let model = prompt(&format!("  Model [{}]: ", config.llm.openai.model))?;
        if !model.is_empty() {
            config.llm.openai.model = model;
        }

        let key = prompt("  API key (Enter to skip): ")?;
        if !key.is_empty() {
            SecretManager::new(SERVICE_NAME)
                .set_secret(OPENAI_API_KEY, &key)
                .context("Failed to store API key")?;
            println!("    Stored in keychain.");
        }
    } else if config.llm.enabled {
        let model = prompt(&format!("  Ollama model [{}]: ", config.llm.ollama.model))?;
        if !model.is_empty() {
            config.llm.ollama.model = model;
        }
    }

    let ask_weather = prompt("Ask for a weather preference before suggesting places? [Y/n]: ")?;
    config.session.ask_weather_preference = !ask_weather.eq_ignore_ascii_case("n");

    let path = match config_path {
        Some(path) => path.to_path_buf(),
        None => Config::default_config_path()?,
    };
    config.save_to_path(&path)?;

    println!();
    println!("Configuration written to {}", path.display());
    println!("Run 'wayfarer doctor' to verify your configuration.");
    println!("Run 'wayfarer chat' to start planning.");

    Ok(())
}
