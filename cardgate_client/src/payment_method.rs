use std::fmt::Display;

use serde::{Deserialize, Serialize};

pub const AFTERPAY: &str = "afterpay";
pub const BANCONTACT: &str = "bancontact";
pub const BANKTRANSFER: &str = "banktransfer";
pub const BILLINK: &str = "billink";
pub const BITCOIN: &str = "bitcoin";
pub const CREDITCARD: &str = "creditcard";
pub const DIRECTDEBIT: &str = "directdebit";
pub const GIFTCARD: &str = "giftcard";
pub const GIROPAY: &str = "giropay";
pub const IDEAL: &str = "ideal";
pub const IDEALPRO: &str = "idealpro";
pub const KLARNA: &str = "klarna";
pub const PAYPAL: &str = "paypal";
pub const PAYSAFECARD: &str = "paysafecard";
pub const PAYSAFECASH: &str = "paysafecash";
pub const PRZELEWY24: &str = "przelewy24";
pub const SOFORTBANKING: &str = "sofortbanking";

const KNOWN_METHODS: [(&str, &str); 17] = [
    (AFTERPAY, "AfterPay"),
    (BANCONTACT, "Bancontact"),
    (BANKTRANSFER, "Bank transfer"),
    (BILLINK, "Billink"),
    (BITCOIN, "Bitcoin"),
    (CREDITCARD, "Creditcard"),
    (DIRECTDEBIT, "Direct debit"),
    (GIFTCARD, "Gift card"),
    (GIROPAY, "Giropay"),
    (IDEAL, "iDEAL"),
    (IDEALPRO, "iDEAL"),
    (KLARNA, "Klarna"),
    (PAYPAL, "PayPal"),
    (PAYSAFECARD, "Paysafecard"),
    (PAYSAFECASH, "Paysafecash"),
    (PRZELEWY24, "Przelewy24"),
    (SOFORTBANKING, "SofortBanking"),
];

/// A payment method as the gateway knows it: the code used in resource paths plus a human-readable name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: String,
    pub name: String,
}

impl PaymentMethod {
    pub fn new(id: &str, name: &str) -> Self {
        Self { id: id.to_string(), name: name.to_string() }
    }

    /// Looks `id` up in the list of well-known methods. Unknown codes are still valid; they just have no display name.
    pub fn known(id: &str) -> Option<Self> {
        KNOWN_METHODS.iter().find(|(code, _)| *code == id).map(|(code, name)| Self::new(code, name))
    }

    /// Normalises the `pt` value the gateway reports in callbacks. `idealpro` is the same method as `ideal`.
    pub fn from_callback_code(pt: &str) -> Self {
        let code = if pt == IDEALPRO { IDEAL } else { pt };
        Self::known(code).unwrap_or_else(|| Self::new(code, code))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// What a caller may hand to [`crate::Transaction::set_payment_method`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodSelection {
    /// A bare method code such as `"ideal"`
    Named(String),
    Structured(PaymentMethod),
}

impl MethodSelection {
    /// A bare name becomes a method that uses the name as both its code and its label.
    pub fn normalize(self) -> PaymentMethod {
        match self {
            MethodSelection::Named(name) => PaymentMethod { id: name.clone(), name },
            MethodSelection::Structured(method) => method,
        }
    }
}

impl From<&str> for MethodSelection {
    fn from(value: &str) -> Self {
        Self::Named(value.to_string())
    }
}

impl From<String> for MethodSelection {
    fn from(value: String) -> Self {
        Self::Named(value)
    }
}

impl From<PaymentMethod> for MethodSelection {
    fn from(value: PaymentMethod) -> Self {
        Self::Structured(value)
    }
}
