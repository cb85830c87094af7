//! Verification of the asynchronous status callbacks the gateway sends to the merchant's callback URL.
//!
//! The gateway signs each callback with an MD5 digest over a fixed sequence of callback fields followed by the site's
//! hash key. The order of the fields is part of the gateway contract:
//!
//! `["TEST" if testmode] ‖ transaction ‖ currency ‖ amount ‖ reference ‖ code ‖ hash key`
//!
//! A request without a `hash` field is simply not a gateway callback. It is reported as unauthentic rather than as an
//! error.

use std::{collections::HashMap, fmt::Display};

use cg_common::Secret;
use log::*;
use md5::{Digest, Md5};
use serde::Serialize;
use subtle::ConstantTimeEq;

use crate::{helpers::leading_integer, CardgateApiError, PaymentMethod};

/// Number of characters in front of the local order id in a transaction reference.
pub const REFERENCE_PREFIX_LEN: usize = 6;
/// Status code the gateway uses for a hard decline by the consumer or the acquirer.
pub const CANCELED_CODE: i32 = 309;
const TESTMODE_MARKER: &str = "TEST";

/// The domain outcome of a gateway status code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome<P> {
    /// The payment is still in progress. Carries the caller's own marker for pending orders.
    Pending(P),
    Paid,
    Canceled,
    /// The code falls outside every range the gateway documents an outcome for. The caller decides what to do.
    Undefined,
}

impl<P: Display> Display for CallbackOutcome<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallbackOutcome::Pending(p) => write!(f, "Pending ({p})"),
            CallbackOutcome::Paid => write!(f, "Paid"),
            CallbackOutcome::Canceled => write!(f, "Canceled"),
            CallbackOutcome::Undefined => write!(f, "Undefined"),
        }
    }
}

/// Maps a gateway status code onto an outcome.
///
/// | code      | outcome   |
/// |-----------|-----------|
/// | < 200     | `pending` |
/// | 200 - 299 | Paid      |
/// | 300 - 399 | Canceled  |
/// | 700 - 799 | `pending` |
/// | other     | Undefined |
pub fn map_status<P>(code: i32, pending: P) -> CallbackOutcome<P> {
    match code {
        c if c < 200 => CallbackOutcome::Pending(pending),
        200..=299 => CallbackOutcome::Paid,
        300..=399 => CallbackOutcome::Canceled,
        700..=799 => CallbackOutcome::Pending(pending),
        _ => CallbackOutcome::Undefined,
    }
}

/// True only for the hard-decline code. Other 3xx codes are also cancellations according to [`map_status`], but
/// callers use this check to tell a decline apart.
pub fn is_canceled(code: i32) -> bool {
    code == CANCELED_CODE
}

/// One inbound callback, using the gateway's field names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallbackPayload {
    pub transaction: String,
    pub currency: String,
    /// Amount in minor units
    pub amount: i64,
    pub reference: String,
    pub code: i32,
    pub testmode: bool,
    pub hash: Option<String>,
    /// The payment method code, e.g. `idealpro`
    pub pt: Option<String>,
    /// Merchant data echoed back by the gateway (the `ref` field)
    #[serde(rename = "ref")]
    pub merchant_ref: Option<String>,
    /// `amount` and `code` exactly as received. The hash is computed over these, not over the parsed numbers.
    #[serde(skip)]
    signed_amount: String,
    #[serde(skip)]
    signed_code: String,
}

impl CallbackPayload {
    /// Parses a form-encoded callback, i.e. the query string of a GET callback or the body of a POST callback.
    pub fn from_query(query: &str) -> Result<Self, CardgateApiError> {
        let query = query.strip_prefix('?').unwrap_or(query);
        Self::from_pairs(url::form_urlencoded::parse(query.as_bytes()).into_owned())
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, CardgateApiError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut fields = pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect::<HashMap<String, String>>();
        let mut required = |name: &str| {
            fields.remove(name).ok_or_else(|| CardgateApiError::InvalidCallback(format!("missing field '{name}'")))
        };
        let transaction = required("transaction")?;
        let currency = required("currency")?;
        let reference = required("reference")?;
        let signed_amount = required("amount")?;
        let signed_code = required("code")?;
        let amount = signed_amount
            .trim()
            .parse::<i64>()
            .map_err(|e| CardgateApiError::InvalidCallback(format!("invalid amount '{signed_amount}'. {e}")))?;
        let code = signed_code
            .trim()
            .parse::<i32>()
            .map_err(|e| CardgateApiError::InvalidCallback(format!("invalid code '{signed_code}'. {e}")))?;
        // Only a literal 1 switches the digest to test mode
        let testmode = fields.remove("testmode").is_some_and(|v| v.trim() == "1");
        let hash = fields.remove("hash");
        let pt = fields.remove("pt").filter(|s| !s.is_empty());
        let merchant_ref = fields.remove("ref").filter(|s| !s.is_empty());
        Ok(Self {
            transaction,
            currency,
            amount,
            reference,
            code,
            testmode,
            hash,
            pt,
            merchant_ref,
            signed_amount,
            signed_code,
        })
    }

    /// The amount in major currency units, for display only.
    pub fn total(&self) -> f64 {
        self.amount as f64 / 100.0
    }

    /// The local cart or order id embedded in the reference, using the default prefix length.
    pub fn cart_id(&self) -> i64 {
        self.cart_id_with_prefix(REFERENCE_PREFIX_LEN)
    }

    /// Drops the first `prefix_len` characters of the reference and reads the number that follows. References that
    /// are too short or have no digits after the prefix yield 0.
    pub fn cart_id_with_prefix(&self, prefix_len: usize) -> i64 {
        let rest = self.reference.chars().skip(prefix_len).collect::<String>();
        leading_integer(&rest)
    }

    pub fn payment_method(&self) -> Option<PaymentMethod> {
        self.pt.as_deref().map(PaymentMethod::from_callback_code)
    }

    pub fn is_canceled(&self) -> bool {
        is_canceled(self.code)
    }

    pub fn outcome<P>(&self, pending: P) -> CallbackOutcome<P> {
        map_status(self.code, pending)
    }
}

/// Authenticates callbacks for one site. Holds no mutable state and can be shared freely between request handlers.
#[derive(Debug, Clone)]
pub struct CallbackVerifier {
    hash_key: Secret<String>,
    reference_prefix_len: usize,
}

impl CallbackVerifier {
    pub fn new(hash_key: Secret<String>) -> Self {
        Self { hash_key, reference_prefix_len: REFERENCE_PREFIX_LEN }
    }

    pub fn with_reference_prefix_len(mut self, len: usize) -> Self {
        self.reference_prefix_len = len;
        self
    }

    /// The lowercase hex digest the gateway is expected to have sent for `payload`.
    pub fn digest(&self, payload: &CallbackPayload) -> String {
        let mut hasher = Md5::new();
        if payload.testmode {
            hasher.update(TESTMODE_MARKER);
        }
        hasher.update(&payload.transaction);
        hasher.update(&payload.currency);
        hasher.update(&payload.signed_amount);
        hasher.update(&payload.reference);
        hasher.update(&payload.signed_code);
        hasher.update(self.hash_key.reveal());
        hex::encode(hasher.finalize())
    }

    /// True iff the payload carries a hash and it matches the recomputed digest. Never fails.
    pub fn is_authentic(&self, payload: &CallbackPayload) -> bool {
        let Some(hash) = payload.hash.as_deref() else {
            trace!("Callback for {} has no hash", payload.transaction);
            return false;
        };
        let expected = self.digest(payload);
        let valid: bool = expected.as_bytes().ct_eq(hash.as_bytes()).into();
        if valid {
            trace!("Callback hash for {} ✅️", payload.transaction);
        } else {
            warn!("Invalid callback hash for transaction {}", payload.transaction);
        }
        valid
    }

    /// Same as [`CallbackVerifier::is_authentic`]. An unsigned request is not a gateway callback.
    pub fn is_gateway_callback(&self, payload: &CallbackPayload) -> bool {
        self.is_authentic(payload)
    }

    pub fn cart_id(&self, payload: &CallbackPayload) -> i64 {
        payload.cart_id_with_prefix(self.reference_prefix_len)
    }
}
