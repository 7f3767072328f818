//! Modelgate CLI - cost-governed LLM routing

use std::sync::Arc;

use clap::{Parser, Subcommand};
use modelgate_core::config::Config;
use modelgate_core::cost::CostManager;
use modelgate_core::fallback::FallbackManager;
use modelgate_core::health::HealthMonitor;
use modelgate_core::llm::{DefaultProviderFactory, LlmClient, LlmResponse, Message, ProviderKind};
use modelgate_core::prompts::ConsciousContext;
use modelgate_core::routing::{ModelRegistry, ModelRouter, RouterConfig, Task, TaskType, resolve_model_id};
use tracing::{debug, warn};

#[derive(Parser)]
#[command(name = "modelgate")]
#[command(author, version, about = "Cost-governed LLM routing", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect the model catalog
    Models {
        #[command(subcommand)]
        action: ModelAction,
    },

    /// Rank configured models for a prompt without calling any provider
    Rank {
        /// Prompt to rank models for
        prompt: String,
        /// Task type (operational, strategic, real_time, ...)
        #[arg(short, long, default_value = "operational")]
        task_type: TaskType,
        /// Per-task budget in USD
        #[arg(short, long)]
        budget: Option<f64>,
        /// Completion token cap
        #[arg(long)]
        max_tokens: Option<u32>,
    },

    /// Send a prompt to the best model
    Ask {
        /// Prompt text
        prompt: String,
        /// Task type (operational, strategic, real_time, ...)
        #[arg(short, long, default_value = "operational")]
        task_type: TaskType,
        /// Memory entry to include as context (repeatable)
        #[arg(short, long)]
        memory: Vec<String>,
        /// Include the reasoning framework
        #[arg(long)]
        framework: bool,
        /// Skip routing and send to this model, falling back across providers
        #[arg(long, conflicts_with_all = ["conscious", "framework"])]
        model: Option<String>,
        /// Sampling temperature for --model (defaults to the provider's)
        #[arg(long, requires = "model")]
        temperature: Option<f32>,
        /// Use the consciousness-framed prompt and budget
        #[arg(long)]
        conscious: bool,
        /// Identity for consciousness-framed prompts
        #[arg(long, requires = "conscious")]
        identity: Option<String>,
    },

    /// Check every provider and show health and fallback order
    Providers,

    /// Show budgets and spend
    Costs,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ModelAction {
    /// List catalogued models
    List,
    /// Show the capability hierarchy
    Hierarchy,
    /// Show the preferred model per task type
    Tasks,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a configuration value
    Get { key: String },
    /// Set a configuration value
    Set { key: String, value: String },
    /// List all configuration values
    List,
    /// Reset configuration to defaults
    Reset,
    /// Show config file path
    Path,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Provider API keys may live in a local .env
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("modelgate=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let format = cli.format;

    match cli.command {
        Commands::Models { action } => cmd_models(action, format, cli.quiet),

        Commands::Rank {
            prompt,
            task_type,
            budget,
            max_tokens,
        } => cmd_rank(&prompt, task_type, budget, max_tokens, format, cli.quiet).await,

        Commands::Ask {
            prompt,
            task_type,
            memory,
            framework,
            model,
            temperature,
            conscious,
            identity,
        } => {
            let mode = match (model, conscious) {
                (Some(model), _) => AskMode::Direct {
                    model: resolve_model_id(&model),
                    temperature,
                },
                (None, true) => AskMode::Conscious(identity),
                (None, false) => AskMode::Routed { framework },
            };
            cmd_ask(&prompt, task_type, &memory, mode, format, cli.quiet).await
        }

        Commands::Providers => cmd_providers(format, cli.quiet).await,

        Commands::Costs => cmd_costs(format, cli.quiet),

        Commands::Config { action } => cmd_config(action, format, cli.quiet),
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

fn print_json(value: serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn cmd_models(action: ModelAction, format: OutputFormat, quiet: bool) -> anyhow::Result<()> {
    let config = Config::load()?;
    let registry = ModelRegistry::with_defaults();

    match action {
        ModelAction::List => {
            if format == OutputFormat::Json {
                return print_json(serde_json::to_value(registry.list())?);
            }
            if !quiet {
                println!("Models ({} catalogued, * = configured):", registry.len());
            }
            for model in registry.list() {
                let marker = if config.routing.is_model_configured(&model.id) {
                    "*"
                } else {
                    " "
                };
                let caps = model.capabilities;
                let flags: Vec<&str> = [
                    (caps.reasoning, "reasoning"),
                    (caps.creativity, "creativity"),
                    (caps.speed, "speed"),
                    (caps.tool_use, "tools"),
                    (caps.multimodal, "multimodal"),
                    (caps.multilingual, "multilingual"),
                    (caps.math, "math"),
                ]
                .into_iter()
                .filter_map(|(on, name)| on.then_some(name))
                .collect();

                println!(
                    "{} {:<36} {:>7} ctx  ${:>6.2}/${:>6.2} per M  [{}]",
                    marker,
                    model.id,
                    model.context_length,
                    model.input_price_per_million,
                    model.output_price_per_million,
                    flags.join(", ")
                );
            }
        }
        ModelAction::Hierarchy => {
            if format == OutputFormat::Json {
                return print_json(serde_json::to_value(registry.hierarchy())?);
            }
            if !quiet {
                println!("Capability hierarchy (most capable first):");
            }
            for (i, id) in registry.hierarchy().iter().enumerate() {
                println!("  {}. {}", i + 1, id);
            }
        }
        ModelAction::Tasks => {
            let routes: Vec<(TaskType, &str)> = TaskType::ALL
                .iter()
                .map(|t| (*t, config.routing.model_for_task(*t)))
                .collect();
            if format == OutputFormat::Json {
                let map: serde_json::Map<String, serde_json::Value> = routes
                    .iter()
                    .map(|(t, m)| (t.to_string(), serde_json::Value::from(*m)))
                    .collect();
                return print_json(serde_json::Value::Object(map));
            }
            if !quiet {
                println!("Preferred model per task type:");
            }
            for (task_type, model) in routes {
                println!("  {:<20} {}", task_type, model);
            }
        }
    }
    Ok(())
}

async fn cmd_rank(
    prompt: &str,
    task_type: TaskType,
    budget: Option<f64>,
    max_tokens: Option<u32>,
    format: OutputFormat,
    quiet: bool,
) -> anyhow::Result<()> {
    let config = Config::load()?;
    let registry = Arc::new(ModelRegistry::with_defaults());
    let costs = Arc::new(CostManager::from_config(&config, registry.clone()));

    // Scoring never calls the provider; constructing it performs no I/O
    let factory = DefaultProviderFactory::new(config.llm.clone(), registry.clone());
    let provider = factory.build(config.llm.provider_kind()?)?;
    let router = ModelRouter::new(
        RouterConfig::from_config(&config),
        registry,
        provider,
        costs.clone(),
    );

    let task = Task::builder(task_type, prompt)
        .max_tokens(max_tokens.unwrap_or(config.llm.default_max_tokens))
        .temperature(config.llm.default_temperature)
        .budget_usd(budget.unwrap_or(0.0))
        .build()?;

    let ranked: Vec<(String, f64, f64, String)> = router
        .score_candidates(&task)
        .await
        .into_iter()
        .map(|scored| {
            let verdict = if task.has_budget() && scored.estimated_cost_usd > task.budget_usd() {
                format!("over task budget (${:.4})", task.budget_usd())
            } else {
                match costs.can_afford(&task, &scored.model) {
                    Ok(()) => "admissible".to_string(),
                    Err(e) => e.to_string(),
                }
            };
            (scored.model.id, scored.score, scored.estimated_cost_usd, verdict)
        })
        .collect();

    debug!(candidates = ranked.len(), task_type = %task_type, "Ranked candidates");

    if format == OutputFormat::Json {
        let rows: Vec<serde_json::Value> = ranked
            .iter()
            .map(|(id, score, cost, verdict)| {
                serde_json::json!({
                    "model": id,
                    "score": score,
                    "estimated_cost_usd": cost,
                    "verdict": verdict,
                })
            })
            .collect();
        return print_json(serde_json::Value::Array(rows));
    }

    if ranked.is_empty() {
        println!("No configured model is present in the catalog.");
        return Ok(());
    }

    if !quiet {
        println!("Ranking for {} task ({} candidates):", task_type, ranked.len());
    }
    for (i, (id, score, cost, verdict)) in ranked.iter().enumerate() {
        println!(
            "  {}. {:<36} score {:>6.2}  est ${:.4}  {}",
            i + 1,
            id,
            score,
            cost,
            verdict
        );
    }
    Ok(())
}

enum AskMode {
    Routed { framework: bool },
    Conscious(Option<String>),
    Direct {
        model: String,
        temperature: Option<f32>,
    },
}

async fn cmd_ask(
    prompt: &str,
    task_type: TaskType,
    memory: &[String],
    mode: AskMode,
    format: OutputFormat,
    quiet: bool,
) -> anyhow::Result<()> {
    let config = Config::load()?;
    let client = LlmClient::connect(config).await?;

    let response: LlmResponse = match mode {
        AskMode::Routed { framework } => {
            client
                .generate_response(prompt, task_type, memory, framework)
                .await?
        }
        AskMode::Conscious(identity) => {
            let context = ConsciousContext {
                identity: identity.unwrap_or_else(|| "assistant".to_string()),
                current_input: prompt.to_string(),
                ..ConsciousContext::default()
            };
            client.generate_conscious_response(&context, memory).await?
        }
        AskMode::Direct { model, temperature } => {
            client
                .complete_with_fallback(&model, &[Message::user(prompt)], temperature)
                .await?
        }
    };

    if format == OutputFormat::Json {
        return print_json(serde_json::to_value(&response)?);
    }

    println!("{}", response.content);
    if !quiet {
        let stats = client.cost_stats();
        println!();
        println!(
            "[{} | {} tokens | ${:.6} | {:.2?}]",
            response.model, response.usage.total_tokens, response.cost_usd, response.response_time
        );
        println!(
            "[daily remaining ${:.2} of ${:.2}]",
            stats.daily_remaining_usd, stats.daily_budget_usd
        );
    }
    Ok(())
}

async fn cmd_providers(format: OutputFormat, quiet: bool) -> anyhow::Result<()> {
    let config = Config::load()?;
    let registry = Arc::new(ModelRegistry::with_defaults());
    let factory = Arc::new(DefaultProviderFactory::new(config.llm.clone(), registry));
    let health = Arc::new(HealthMonitor::new());

    for kind in ProviderKind::ALL {
        let provider = factory.build(kind)?;
        health.register_provider(provider.name());
        if !health.check_provider_health(provider.as_ref()).await {
            warn!(provider = provider.name(), "Provider health check failed");
        }
    }

    let fallback = FallbackManager::new(&config.llm.provider, health.clone(), factory);
    fallback.update_fallback_order();
    let chain = fallback.fallback_chain();

    if format == OutputFormat::Json {
        let mut records: Vec<_> = health.get_all_health().into_values().collect();
        records.sort_by(|a, b| a.name.cmp(&b.name));
        return print_json(serde_json::json!({
            "primary": config.llm.provider,
            "fallback_chain": chain,
            "health": serde_json::to_value(records)?,
        }));
    }

    if !quiet {
        println!("Providers (primary: {}):", config.llm.provider);
    }
    for name in &chain {
        let status = health
            .get_health(name)
            .map(|h| h.status_line())
            .unwrap_or_else(|| "Unknown".to_string());
        println!("  {:<12} {}", name, status);
    }
    if !quiet {
        println!();
        println!("Available: {}", health.get_available_providers().join(", "));
    }
    Ok(())
}

fn cmd_costs(format: OutputFormat, quiet: bool) -> anyhow::Result<()> {
    let config = Config::load()?;
    let costs = CostManager::from_config(&config, Arc::new(ModelRegistry::with_defaults()));
    let stats = costs.stats();

    if format == OutputFormat::Json {
        return print_json(serde_json::to_value(&stats)?);
    }

    if !quiet {
        println!("Cost Summary:");
        println!();
    }
    println!(
        "  Daily:   ${:.4} of ${:.2} (remaining ${:.2})",
        stats.daily_spend_usd, stats.daily_budget_usd, stats.daily_remaining_usd
    );
    println!(
        "  Monthly: ${:.4} of ${:.2} (remaining ${:.2})",
        stats.monthly_spend_usd, stats.monthly_budget_usd, stats.monthly_remaining_usd
    );
    if !quiet {
        println!(
            "  Overage tolerance: {:.0}%",
            config.cost.overage_tolerance * 100.0
        );
        println!(
            "  Consciousness task budget: ${:.2}",
            config.cost.consciousness_budget_usd
        );
        println!("  Transactions: {}", stats.transaction_count);
    }
    Ok(())
}

fn cmd_config(action: ConfigAction, format: OutputFormat, quiet: bool) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            let value = config.get(&key)?;
            println!("{}", value);
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.validate()?;
            config.save()?;
            if !quiet {
                println!("Set {} = {}", key, value);
            }
        }
        ConfigAction::List => {
            let config = Config::load()?;
            let items = config.list()?;
            if format == OutputFormat::Json {
                let map: serde_json::Map<String, serde_json::Value> = items
                    .into_iter()
                    .map(|(k, v)| (k, serde_json::Value::String(v)))
                    .collect();
                return print_json(serde_json::Value::Object(map));
            }
            for (key, value) in items {
                println!("{} = {}", key, value);
            }
        }
        ConfigAction::Reset => {
            Config::reset()?;
            if !quiet {
                println!("Configuration reset to defaults.");
            }
        }
        ConfigAction::Path => {
            let path = Config::config_path()?;
            println!("{}", path.display());
        }
    }
    Ok(())
}
