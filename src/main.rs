use clap::Parser;
use microtxn::application::orchestrator::{OrchestratorHandle, PurchaseOrchestrator};
use microtxn::config::PurchaseConfig;
use microtxn::domain::events::{AuthorizationEvent, PurchaseOutcome};
use microtxn::domain::order::{OrderId, PurchasePhase, RandomOrderIdGenerator, TransactionId};
use microtxn::infrastructure::channel_gateway::ChannelAuthorizationGateway;
use microtxn::infrastructure::http_api::HttpPurchaseApi;
use microtxn::interfaces::cli::{Cli, Command};
use microtxn::interfaces::console::confirm_purchase;
use miette::{IntoDiagnostic, Result};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "microtxn=info".into()),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config().into_diagnostic()?;

    match cli.command {
        Command::Purchase { steam_id, .. } => purchase(&config, steam_id).await,
        Command::Status {
            order_id,
            transaction_id,
        } => status(&config, OrderId(order_id), TransactionId(transaction_id)).await,
    }
}

async fn purchase(config: &PurchaseConfig, steam_id: String) -> Result<()> {
    let api = HttpPurchaseApi::new(config).into_diagnostic()?;
    let gateway = ChannelAuthorizationGateway::new();
    let platform = gateway.publisher();

    let handle = PurchaseOrchestrator::spawn(
        config,
        Arc::new(api),
        &gateway,
        Box::new(RandomOrderIdGenerator::new()),
    );
    let mut outcomes = handle.subscribe_outcomes();

    let order_id = handle.initiate_purchase(steam_id).await.into_diagnostic()?;

    let outcome = match wait_for_authorization(&handle, &mut outcomes).await? {
        Some(outcome) => outcome,
        None => {
            let product = config.product.clone();
            let authorized = tokio::task::spawn_blocking(move || {
                confirm_purchase(io::stdin().lock(), io::stderr(), order_id, &product)
            })
            .await
            .into_diagnostic()?
            .into_diagnostic()?;

            platform.publish(AuthorizationEvent {
                app_id: config.app_id,
                order_id,
                authorized,
            });
            outcomes.recv().await.into_diagnostic()?
        }
    };

    match &outcome {
        PurchaseOutcome::Completed {
            transaction_id,
            coins_awarded,
            ..
        } => {
            let transaction = transaction_id
                .as_ref()
                .map(TransactionId::to_string)
                .unwrap_or_default();
            println!(
                "order {order_id} completed (transaction {transaction}), +{coins_awarded} coins"
            );
        }
        PurchaseOutcome::Failed { error, .. } => println!("order {order_id} failed: {error}"),
        PurchaseOutcome::Cancelled { .. } => println!("order {order_id} cancelled"),
    }

    let snapshot = handle.snapshot().await.into_diagnostic()?;
    println!("coins: {}", snapshot.coin_balance);
    handle.shutdown();
    Ok(())
}

/// Waits until the backend has opened the transaction (the point at which Steam
/// shows its dialog) or the attempt ends early.
async fn wait_for_authorization(
    handle: &OrchestratorHandle,
    outcomes: &mut broadcast::Receiver<PurchaseOutcome>,
) -> Result<Option<PurchaseOutcome>> {
    let mut ticker = tokio::time::interval(Duration::from_millis(50));
    loop {
        tokio::select! {
            outcome = outcomes.recv() => return Ok(Some(outcome.into_diagnostic()?)),
            _ = ticker.tick() => {
                let snapshot = handle.snapshot().await.into_diagnostic()?;
                if snapshot.phase == PurchasePhase::AwaitingPlatformAuthorization {
                    return Ok(None);
                }
            }
        }
    }
}

async fn status(
    config: &PurchaseConfig,
    order_id: OrderId,
    transaction_id: TransactionId,
) -> Result<()> {
    let api = HttpPurchaseApi::new(config).into_diagnostic()?;
    let status = api
        .check_purchase_status(order_id, &transaction_id)
        .await
        .into_diagnostic()?;

    println!(
        "order {order_id}: {}",
        status.status.as_deref().unwrap_or("unknown")
    );
    for (key, value) in &status.params {
        println!("  {key}: {value}");
    }
    Ok(())
}
