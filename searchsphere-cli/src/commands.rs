//! CLI subcommand handlers.

use crate::Commands;
use crate::ConfigAction;
use crate::render;
use searchsphere_core::client::{LabelAssistRequest, SearchFilters, SearchRequest};
use searchsphere_core::gateway::latency::timed;
use searchsphere_core::poller::{MetricsPoller, stage_latency};
use searchsphere_core::{ClientError, GatewayClient, GatewayState, SearchSphereConfig, groundtruth};
use std::io::Read;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Handle a CLI subcommand.
pub async fn handle_command(
    command: Commands,
    config: SearchSphereConfig,
    workspace: &Path,
) -> anyhow::Result<()> {
    match command {
        Commands::Serve { host, port, origin } => handle_serve(config, host, port, origin).await,
        Commands::Search {
            query,
            k,
            team,
            doc_type,
            since,
            json,
        } => {
            let filters = SearchFilters {
                team: (!team.is_empty()).then_some(team),
                doc_type: (!doc_type.is_empty()).then_some(doc_type),
                since,
            };
            let mut request = SearchRequest::new(query).with_filters(filters);
            request.k = k;
            handle_search(&config, request, json, &cancel_on_ctrl_c()).await
        }
        Commands::Chat { query, k, json } => {
            let mut request = SearchRequest::new(query);
            request.k = k;
            handle_chat(&config, request, json, &cancel_on_ctrl_c()).await
        }
        Commands::Metrics { watch } => handle_metrics(&config, watch).await,
        Commands::Eval { file, k } => handle_eval(&config, &file, k).await,
        Commands::LabelAssist { query, k } => {
            handle_label_assist(&config, query, k, &cancel_on_ctrl_c()).await
        }
        Commands::Config { action } => handle_config(action, &config, workspace),
    }
}

/// A token that fires on Ctrl+C.
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.cancel();
        }
    });
    cancel
}

/// Interrupting a request ends the command quietly.
fn settle<T>(result: Result<T, ClientError>) -> anyhow::Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_cancelled() => {
            debug!(error = %err, "Request interrupted");
            Ok(None)
        }
        Err(err) => Err(err.into()),
    }
}

async fn handle_serve(
    mut config: SearchSphereConfig,
    host: Option<String>,
    port: Option<u16>,
    origin: Option<String>,
) -> anyhow::Result<()> {
    if let Some(host) = host {
        config.gateway.host = host;
    }
    if let Some(port) = port {
        config.gateway.port = port;
    }
    if let Some(origin) = origin {
        config.origin.public_base = Some(origin);
    }

    for warning in config.validate() {
        warn!("{}", warning);
    }

    let state = GatewayState::from_config(&config)?;
    let shutdown = state.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutting down gateway");
            shutdown.cancel();
        }
    });

    searchsphere_core::gateway::run_gateway(state).await?;
    Ok(())
}

async fn handle_search(
    config: &SearchSphereConfig,
    request: SearchRequest,
    json: bool,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let client = GatewayClient::from_config(config)?;
    let Some(response) = settle(client.search(&request, cancel).await)? else {
        return Ok(());
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print!("{}", render::search_results(&response));
    }
    Ok(())
}

async fn handle_chat(
    config: &SearchSphereConfig,
    request: SearchRequest,
    json: bool,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let client = GatewayClient::from_config(config)?;
    let Some(response) = settle(client.chat(&request, cancel).await)? else {
        return Ok(());
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print!("{}", render::chat_answer(&response));
    }
    Ok(())
}

async fn handle_metrics(config: &SearchSphereConfig, watch: bool) -> anyhow::Result<()> {
    let client = GatewayClient::from_config(config)?;
    let cancel = cancel_on_ctrl_c();

    if !watch {
        let Some(metrics) = settle(client.metrics(&cancel).await)? else {
            return Ok(());
        };
        print!(
            "{}",
            render::latency_table(
                stage_latency(&metrics, "search"),
                stage_latency(&metrics, "chat"),
            )
        );
        if let Some(eval) = searchsphere_core::poller::eval_summary(&metrics) {
            println!("{}", render::eval_summary(&eval));
        }
        return Ok(());
    }

    let mut poller = MetricsPoller::new(client, config.metrics.clone());
    poller
        .run(cancel, |p| print!("{}", render::poll_status(p)))
        .await;
    Ok(())
}

fn read_groundtruth(file: &Path) -> anyhow::Result<String> {
    if file.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        Ok(text)
    } else {
        std::fs::read_to_string(file)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", file.display(), e))
    }
}

async fn handle_eval(
    config: &SearchSphereConfig,
    file: &Path,
    k: Option<u32>,
) -> anyhow::Result<()> {
    let text = read_groundtruth(file)?;
    let mut document = groundtruth::parse(&text)?;
    if let Some(k) = k {
        document = document.with_k(k);
    }
    info!(queries = document.len(), k = document.k, "Running evaluation");

    let client = GatewayClient::from_config(config)?;
    let (result, elapsed) = timed(client.run_eval(&document, &cancel_on_ctrl_c())).await;
    let Some(result) = settle(result)? else {
        return Ok(());
    };
    print!("{}", render::eval_result(&result, elapsed));
    Ok(())
}

async fn handle_label_assist(
    config: &SearchSphereConfig,
    query: String,
    k: u32,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let client = GatewayClient::from_config(config)?;
    let request = LabelAssistRequest { query, k };
    let Some(response) = settle(client.label_assist(&request, cancel).await)? else {
        return Ok(());
    };
    print!("{}", render::candidates(&response));
    Ok(())
}

fn handle_config(
    action: ConfigAction,
    config: &SearchSphereConfig,
    workspace: &Path,
) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_dir = workspace.join(".searchsphere");
            std::fs::create_dir_all(&config_dir)?;

            let config_path = config_dir.join("config.toml");
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }

            let default_config = SearchSphereConfig::default();
            let toml_str = toml::to_string_pretty(&default_config)?;
            std::fs::write(&config_path, &toml_str)?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
        ConfigAction::Show => {
            let toml_str = toml::to_string_pretty(config)?;
            println!("{}", toml_str);
            println!("# resolved origin: {}", config.origin.resolve());
            for warning in config.validate() {
                println!("# warning: {}", warning);
            }
            Ok(())
        }
    }
}
