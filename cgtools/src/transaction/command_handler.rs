use anyhow::{anyhow, Result};
use cardgate_client::{CardgateApi, CardgateConfig, GatewayClient, RefundStatus, Transaction};
use log::info;
use serde_json::json;

use crate::transaction::{command_def::RegisterParams, TransactionCommand};

pub async fn handle_transaction_command(command: TransactionCommand) {
    use TransactionCommand::*;
    let api = new_cardgate_api();
    match command {
        Register(params) => register_transaction(&api, params).await,
        Get { id } => fetch_transaction(&api, id).await,
        CanRefund { id } => print_refund_status(&api, id).await,
        Refund { id, amount, description } => refund_transaction(&api, id, amount, description).await,
        Recur { id, amount, reference, description } => recur_transaction(&api, id, amount, reference, description).await,
    }
}

fn new_cardgate_api() -> CardgateApi {
    let config = CardgateConfig::new_from_env_or_default();
    match CardgateApi::new(config) {
        Ok(api) => api,
        Err(e) => {
            eprintln!("Error creating CardGate API: {e}");
            std::process::exit(1);
        },
    }
}

pub async fn register_transaction(api: &CardgateApi, params: RegisterParams) {
    match try_register(api, params).await {
        Ok(summary) => println!("Registered transaction\n{summary}"),
        Err(e) => eprintln!("Error registering transaction: {e}"),
    }
}

async fn try_register(api: &CardgateApi, params: RegisterParams) -> Result<String> {
    let mut tx = api.new_transaction(params.amount, &params.currency)?;
    if let Some(method) = params.method {
        tx.set_payment_method(method)?;
    }
    if let Some(issuer) = params.issuer {
        tx.set_issuer(&issuer)?;
    }
    if let Some(description) = params.description {
        tx.set_description(&description)?;
    }
    if let Some(reference) = params.reference {
        tx.set_reference(&reference)?;
    }
    if let Some(url) = params.callback_url {
        tx.set_callback_url(&url)?;
    }
    if let Some(url) = params.redirect_url {
        tx.set_redirect_url(&url)?;
    }
    tx.set_recurring(params.recurring)?;
    if params.email.is_some() || params.country.is_some() {
        let consumer = tx.consumer_mut();
        consumer.email = params.email;
        consumer.address.country = params.country;
    }
    for item in params.items {
        tx.cart_mut().add_item(item);
    }
    tx.register().await?;
    info!("Transaction {} registered", tx.id()?);
    summarize(&tx)
}

pub async fn fetch_transaction(api: &CardgateApi, id: String) {
    let result = match api.fetch_transaction(&id).await {
        Ok(tx) => summarize(&tx),
        Err(e) => Err(e.into()),
    };
    match result {
        Ok(summary) => println!("Transaction {id}\n{summary}"),
        Err(e) => eprintln!("Error fetching transaction {id}: {e}"),
    }
}

pub async fn print_refund_status(api: &CardgateApi, id: String) {
    match refund_status(api, &id).await {
        Ok(status) if status.can_refund => println!("Transaction {id} can be refunded. Remainder: {}", status.remainder),
        Ok(_) => println!("Transaction {id} can not be refunded"),
        Err(e) => eprintln!("Error checking refund status of {id}: {e}"),
    }
}

async fn refund_status(api: &CardgateApi, id: &str) -> Result<RefundStatus> {
    let tx = api.fetch_transaction(id).await?;
    Ok(tx.can_refund().await?)
}

pub async fn refund_transaction(api: &CardgateApi, id: String, amount: Option<i64>, description: Option<String>) {
    match try_refund(api, &id, amount, description.as_deref()).await {
        Ok(summary) => println!("Refunded transaction {id}\n{summary}"),
        Err(e) => eprintln!("Error refunding transaction {id}: {e}"),
    }
}

async fn try_refund(api: &CardgateApi, id: &str, amount: Option<i64>, description: Option<&str>) -> Result<String> {
    let tx = api.fetch_transaction(id).await?;
    let refund = tx.refund(amount, description).await?;
    summarize(&refund)
}

pub async fn recur_transaction(
    api: &CardgateApi,
    id: String,
    amount: i64,
    reference: Option<String>,
    description: Option<String>,
) {
    match try_recur(api, &id, amount, reference.as_deref(), description.as_deref()).await {
        Ok(summary) => println!("Recurred transaction {id}\n{summary}"),
        Err(e) => eprintln!("Error recurring transaction {id}: {e}"),
    }
}

async fn try_recur(
    api: &CardgateApi,
    id: &str,
    amount: i64,
    reference: Option<&str>,
    description: Option<&str>,
) -> Result<String> {
    let tx = api.fetch_transaction(id).await?;
    let recurring = tx.recur(amount, reference, description).await?;
    summarize(&recurring)
}

fn summarize<C: GatewayClient>(tx: &Transaction<'_, C>) -> Result<String> {
    let summary = json!({
        "id": tx.id()?,
        "site_id": tx.site_id(),
        "amount": tx.amount(),
        "currency": tx.currency(),
        "description": tx.description(),
        "reference": tx.reference(),
        "payment_method": tx.payment_method().map(|m| m.to_string()),
        "action_url": tx.action_url(),
    });
    serde_json::to_string_pretty(&summary).map_err(|e| anyhow!("Could not represent transaction as JSON. {e}"))
}
