//! CardGate client
//!
//! A client for the CardGate payment gateway's REST API. It covers the two halves of a card payment integration:
//!
//! 1. Outbound: configuring a [`Transaction`], registering it with the gateway, and issuing refunds and recurring
//!    charges against it. Requests go through the [`GatewayClient`] trait; [`CardgateApi`] is the HTTP implementation.
//! 2. Inbound: authenticating the asynchronous status callbacks the gateway sends ([`CallbackVerifier`]) and mapping
//!    their status codes onto order outcomes ([`map_status`]).
mod api;
pub mod callback;
mod config;
pub mod data_objects;
mod error;
mod helpers;
pub mod payment_method;
pub mod request_builder;
mod transaction;

#[cfg(test)]
mod mocks;

pub use api::{CardgateApi, FieldMap, GatewayClient, GatewayResponse};
pub use callback::{is_canceled, map_status, CallbackOutcome, CallbackPayload, CallbackVerifier};
pub use config::{default_api_url, CardgateConfig, LIVE_API_URL, STAGING_API_URL};
pub use data_objects::{Address, Cart, CartItem, CartItemType, Consumer};
pub use error::CardgateApiError;
pub use payment_method::{MethodSelection, PaymentMethod};
pub use transaction::{RefundStatus, Transaction, TransactionState};
