//! Database seeder for Tally development.
//!
//! Runs pending migrations, then books a small demo organization through
//! `LedgerService` so every write takes the same validation path as real
//! traffic, and logs the resulting balances.
//!
//! Usage: cargo run --bin seeder

use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;
use chrono::{Duration, Utc};
use sea_orm_migration::MigratorTrait;
use tally_core::budget::{Budget, BudgetItem};
use tally_core::ledger::{Account, LedgerService, Split, Transaction};
use tally_core::notify::{ChannelNotifier, Notification};
use tally_core::org::Org;
use tally_core::price::Price;
use tally_db::{SeaDatastore, migration::Migrator};
use tally_shared::AppConfig;
use tally_shared::config::LoggingConfig;
use tally_shared::types::UserId;
use tokio::sync::mpsc;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Demo user that owns the seeded org (consistent across runs).
const DEMO_USER_ID: &str = "00000000-0000-0000-0000-000000000002";
const DEMO_ORG_NAME: &str = "Demo Books";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;
    init_tracing(&config.logging);

    let db = tally_db::connect_with(
        &config.database.url,
        config.database.max_connections,
        config.database.min_connections,
    )
    .await
    .context("Failed to connect to database")?;
    info!("Connected to database");

    Migrator::up(&db, None).await.context("Failed to run migrations")?;

    let (notifier, rx) = ChannelNotifier::new(config.notifications.buffer);
    let listener = tokio::spawn(log_notifications(rx));

    let service = LedgerService::new(Arc::new(SeaDatastore::new(db)), Arc::new(notifier));
    let user = UserId::from_str(DEMO_USER_ID)?;

    let existing = service.get_orgs(user).await?;
    if existing.iter().any(|o| o.name == DEMO_ORG_NAME) {
        info!(org = DEMO_ORG_NAME, "Demo org already exists, skipping");
    } else {
        seed_demo_org(&service, user).await?;
    }

    // Dropping the service closes the channel and ends the listener.
    drop(service);
    listener.await?;
    info!("Seeding complete");
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter));
    let registry = tracing_subscriber::registry().with(filter);

    if logging.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn log_notifications(mut rx: mpsc::Receiver<Notification>) {
    while let Some(notification) = rx.recv().await {
        let payload = serde_json::to_string(&notification.payload).unwrap_or_default();
        debug!(
            kind = ?notification.kind,
            action = ?notification.action,
            recipients = notification.recipients.len(),
            %payload,
            "Notification"
        );
    }
}

async fn seed_demo_org(service: &LedgerService, user: UserId) -> anyhow::Result<()> {
    let org = service
        .create_org(Org::new(DEMO_ORG_NAME, "USD", 2), user)
        .await?;
    info!(org_id = %org.id, "Created demo org");

    let seeded = service.get_accounts(org.id, user).await?;
    let find = |name: &str| {
        seeded
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.id)
            .with_context(|| format!("seed account {name} missing"))
    };
    let assets = find("Assets")?;
    let expenses = find("Expenses")?;
    let equity = find("Equity")?;

    let cash = service
        .create_account(Account::new(org.id, "Cash", Some(assets), "USD", 2, true), user)
        .await?;
    let savings = service
        .create_account(Account::new(org.id, "Savings (EUR)", Some(assets), "EUR", 2, true), user)
        .await?;
    let rent = service
        .create_account(Account::new(org.id, "Rent", Some(expenses), "USD", 2, true), user)
        .await?;
    let fees = service
        .create_account(Account::new(org.id, "Fees", Some(expenses), "USD", 2, true), user)
        .await?;

    let today = Utc::now();
    let mut eur = Price::new(org.id, "EUR", 1.08);
    eur.date = today - Duration::days(30);
    service.create_price(eur, user).await?;

    let entries = [
        (
            30,
            "Owner contribution",
            vec![Split::new(cash.id, 500_000, 500_000), Split::new(equity, -500_000, -500_000)],
        ),
        (
            29,
            "Move to savings",
            vec![Split::new(savings.id, 92_593, 100_000), Split::new(cash.id, -100_000, -100_000)],
        ),
        (
            3,
            "October rent",
            vec![
                Split::new(cash.id, -200_000, -200_000),
                Split::new(rent.id, 100_000, 100_000),
                Split::new(fees.id, 100_000, 100_000),
            ],
        ),
    ];
    for (days_ago, description, splits) in entries {
        let mut tx = Transaction::new(org.id, description, splits);
        tx.date = today - Duration::days(days_ago);
        service.create_transaction(tx, user).await?;
    }

    service
        .create_budget(
            Budget::new(
                org.id,
                vec![
                    BudgetItem { account_id: rent.id, amount: 100_000 },
                    BudgetItem { account_id: fees.id, amount: 25_000 },
                ],
            ),
            user,
        )
        .await?;

    for account in service.get_accounts_with_balances(org.id, user, today).await? {
        info!(
            account = %account.name,
            currency = %account.currency,
            balance = account.balance.unwrap_or_default(),
            native_balance = account.native_balance.unwrap_or_default(),
            "Balance"
        );
    }

    Ok(())
}
