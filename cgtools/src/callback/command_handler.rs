use anyhow::{anyhow, Result};
use cardgate_client::{map_status, CallbackPayload, CallbackVerifier, CardgateConfig};
use cg_common::Secret;
use serde_json::json;

use crate::callback::CallbackCommand;

const PENDING: &str = "pending";

pub fn handle_callback_command(command: CallbackCommand) {
    match command {
        CallbackCommand::Verify { query, hash_key, prefix_len } => verify_callback(&query, hash_key, prefix_len),
        CallbackCommand::Status { code } => print_status(code),
    }
}

pub fn verify_callback(query: &str, hash_key: Option<String>, prefix_len: usize) {
    match try_verify(query, hash_key, prefix_len) {
        Ok(report) => println!("{report}"),
        Err(e) => eprintln!("Error verifying callback: {e}"),
    }
}

fn try_verify(query: &str, hash_key: Option<String>, prefix_len: usize) -> Result<String> {
    let hash_key = match hash_key {
        Some(key) => Secret::non_empty(&key)?,
        None => {
            let config = CardgateConfig::new_from_env_or_default();
            if config.site_key.is_empty() {
                return Err(anyhow!("No hash key given and CG_SITE_KEY is not set"));
            }
            config.site_key
        },
    };
    let verifier = CallbackVerifier::new(hash_key).with_reference_prefix_len(prefix_len);
    let payload = CallbackPayload::from_query(query)?;
    let report = json!({
        "authentic": verifier.is_authentic(&payload),
        "transaction": payload.transaction,
        "cart_id": verifier.cart_id(&payload),
        "amount": payload.amount,
        "currency": payload.currency,
        "code": payload.code,
        "outcome": payload.outcome(PENDING).to_string(),
        "testmode": payload.testmode,
        "payment_method": payload.payment_method().map(|m| m.to_string()),
    });
    serde_json::to_string_pretty(&report).map_err(|e| anyhow!("Could not represent callback as JSON. {e}"))
}

pub fn print_status(code: i32) {
    println!("{code}: {}", map_status(code, PENDING));
}
