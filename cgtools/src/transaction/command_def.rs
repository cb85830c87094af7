use anyhow::{anyhow, Result};
use cardgate_client::{CartItem, CartItemType};
use clap::{Args, Subcommand};

#[derive(Debug, Subcommand)]
pub enum TransactionCommand {
    /// Registers a new transaction and prints the gateway id, plus the URL to send the consumer to, if any.
    Register(RegisterParams),
    /// Fetch the transaction with the given id
    Get {
        #[arg(required = true, index = 1)]
        id: String,
    },
    /// Ask the gateway whether the transaction can be refunded, and for how much
    #[command(name = "can-refund")]
    CanRefund {
        #[arg(required = true, index = 1)]
        id: String,
    },
    /// Refund a transaction, fully or in part
    Refund {
        #[arg(required = true, index = 1)]
        id: String,
        /// The amount to refund, in cents. Omit to refund the full transaction amount.
        #[arg(short = 'a', long = "amount")]
        amount: Option<i64>,
        #[arg(short = 'd', long = "description")]
        description: Option<String>,
    },
    /// Charge a recurring transaction again
    Recur {
        #[arg(required = true, index = 1)]
        id: String,
        /// The amount to charge, in cents
        #[arg(required = true, index = 2)]
        amount: i64,
        #[arg(short = 'r', long = "reference")]
        reference: Option<String>,
        #[arg(short = 'd', long = "description")]
        description: Option<String>,
    },
}

#[derive(Debug, Args)]
pub struct RegisterParams {
    /// The amount, in cents
    #[arg(required = true, index = 1)]
    pub amount: i64,
    /// ISO 4217 currency code
    #[arg(index = 2, default_value = "EUR")]
    pub currency: String,
    /// Payment method code, e.g. ideal, creditcard. Omit to let the consumer choose on the gateway's page.
    #[arg(short = 'm', long = "method")]
    pub method: Option<String>,
    /// Issuer within the payment method. Requires --method.
    #[arg(short = 'i', long = "issuer")]
    pub issuer: Option<String>,
    #[arg(short = 'd', long = "description")]
    pub description: Option<String>,
    #[arg(short = 'r', long = "reference")]
    pub reference: Option<String>,
    /// Allow the transaction to be used for recurring charges
    #[arg(long = "recurring")]
    pub recurring: bool,
    /// Where the gateway should send callbacks
    #[arg(short = 'c', long = "callback-url")]
    pub callback_url: Option<String>,
    /// Where the consumer returns to after paying, whatever the result
    #[arg(short = 'u', long = "redirect-url")]
    pub redirect_url: Option<String>,
    #[arg(short = 'e', long = "email")]
    pub email: Option<String>,
    /// Two-letter country code of the consumer
    #[arg(long = "country")]
    pub country: Option<String>,
    /// A cart item, formatted as sku:name:quantity:price. Can be given more than once.
    #[arg(long = "item", value_parser = parse_cart_item)]
    pub items: Vec<CartItem>,
}

fn parse_cart_item(s: &str) -> Result<CartItem> {
    let parts = s.splitn(4, ':').collect::<Vec<&str>>();
    if parts.len() != 4 {
        return Err(anyhow!("Expected sku:name:quantity:price, got '{s}'"));
    }
    let quantity = parts[2].parse::<i64>().map_err(|e| anyhow!("Invalid quantity '{}'. {e}", parts[2]))?;
    let price = parts[3].parse::<i64>().map_err(|e| anyhow!("Invalid price '{}'. {e}", parts[3]))?;
    Ok(CartItem::new(CartItemType::Product, parts[0], parts[1], quantity, price))
}
