use std::fmt::{self, Debug, Display};

use cg_common::Secret;
use log::*;
use reqwest::Method;
use url::Url;

use crate::{
    api::{GatewayClient, GatewayResponse},
    callback::CallbackVerifier,
    data_objects::{Cart, Consumer},
    helpers::{is_truthy, lenient_i64, non_empty_id},
    request_builder::{recur_payload, refund_payload, register_payload, register_resource, RegisterFields},
    CardgateApiError,
    MethodSelection,
    PaymentMethod,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Created locally. The gateway has not assigned an id yet.
    Unregistered,
    /// The gateway knows this transaction by its id. What happens to it from here on is reported via callbacks.
    Registered,
}

impl Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionState::Unregistered => write!(f, "Unregistered"),
            TransactionState::Registered => write!(f, "Registered"),
        }
    }
}

/// The answer to "may this transaction be refunded, and for how much?"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefundStatus {
    pub can_refund: bool,
    /// The amount that is still refundable, in minor units
    pub remainder: i64,
}

/// A single payment attempt at the gateway.
///
/// A transaction is configured with the setters, then registered with [`Transaction::register`]. Each setter validates
/// its argument and leaves the transaction untouched when it fails, so a transaction is never half-updated. The setters
/// return `&mut Self` so that they can be chained with `?`:
///
/// ```ignore
/// let mut tx = Transaction::new(&api, site_id, 1295, "EUR")?;
/// tx.set_reference("shop-01001")?.set_payment_method("ideal")?.set_issuer("INGBNL2A")?;
/// tx.register().await?;
/// ```
///
/// Refunds and recurring charges are separate transactions at the gateway. [`Transaction::refund`] and
/// [`Transaction::recur`] therefore return a *new* transaction, looked up from the gateway, and never modify `self`.
pub struct Transaction<'c, C> {
    client: &'c C,
    id: Option<String>,
    site_id: i64,
    site_key: Option<Secret<String>>,
    amount: i64,
    currency: String,
    description: Option<String>,
    reference: Option<String>,
    payment_method: Option<PaymentMethod>,
    issuer: Option<String>,
    recurring: bool,
    consumer: Option<Consumer>,
    cart: Option<Cart>,
    callback_url: Option<String>,
    success_url: Option<String>,
    failure_url: Option<String>,
    pending_url: Option<String>,
    action_url: Option<String>,
}

impl<'c, C> Transaction<'c, C>
where C: GatewayClient
{
    pub fn new(client: &'c C, site_id: i64, amount: i64, currency: &str) -> Result<Self, CardgateApiError> {
        let mut tx = Self {
            client,
            id: None,
            site_id: 0,
            site_key: None,
            amount: 0,
            currency: String::default(),
            description: None,
            reference: None,
            payment_method: None,
            issuer: None,
            recurring: false,
            consumer: None,
            cart: None,
            callback_url: None,
            success_url: None,
            failure_url: None,
            pending_url: None,
            action_url: None,
        };
        tx.set_site_id(site_id)?.set_amount(amount)?.set_currency(currency)?;
        Ok(tx)
    }

    /// Retrieves the transaction with the given id from the gateway.
    pub async fn fetch(client: &'c C, id: &str) -> Result<Self, CardgateApiError> {
        const CODE: &str = "Transaction.Details.Invalid";
        if id.is_empty() {
            return Err(CardgateApiError::invalid_field("Transaction.Id.Invalid", "invalid id: <empty>"));
        }
        let resource = format!("transaction/{id}/");
        debug!("Fetching transaction {id}");
        let response = client.do_request(&resource, None, Method::GET).await?;
        let details = &response.body["transaction"];
        if !details.is_object() {
            return Err(unexpected(CODE, "no transaction in response", &response));
        }
        let tx_id = non_empty_id(&details["id"]).ok_or_else(|| unexpected(CODE, "transaction has no id", &response))?;
        let site_id = lenient_i64(&details["site_id"])
            .ok_or_else(|| unexpected(CODE, "transaction has no site_id", &response))?;
        let amount =
            lenient_i64(&details["amount"]).ok_or_else(|| unexpected(CODE, "transaction has no amount", &response))?;
        let currency = details["currency_id"]
            .as_str()
            .ok_or_else(|| unexpected(CODE, "transaction has no currency_id", &response))?;
        let mut tx = Self::new(client, site_id, amount, currency)
            .map_err(|e| unexpected(CODE, &format!("transaction details are not valid. {e}"), &response))?;
        tx.id = Some(tx_id);
        if let Some(description) = details["description"].as_str().filter(|s| !s.is_empty()) {
            tx.description = Some(description.to_string());
        }
        if let Some(reference) = details["reference"].as_str().filter(|s| !s.is_empty()) {
            tx.reference = Some(reference.to_string());
        }
        if let Some(option) = details["option"].as_str().filter(|s| !s.is_empty()) {
            let method = PaymentMethod::known(option).unwrap_or_else(|| MethodSelection::from(option).normalize());
            tx.payment_method = Some(method);
        }
        info!("Fetched transaction {}", tx.id.as_deref().unwrap_or_default());
        Ok(tx)
    }

    //---------------------------------------------   Setters   ------------------------------------------------------

    /// Assigns the gateway id of an existing transaction. Once assigned, the id can not be changed.
    pub fn set_id(&mut self, id: &str) -> Result<&mut Self, CardgateApiError> {
        if id.is_empty() {
            return Err(CardgateApiError::invalid_field("Transaction.Id.Invalid", "invalid id: <empty>"));
        }
        if let Some(current) = &self.id {
            return Err(CardgateApiError::invalid_field(
                "Transaction.Id.Invalid",
                format!("invalid id: {id}. The transaction already has id {current}"),
            ));
        }
        self.id = Some(id.to_string());
        Ok(self)
    }

    pub fn set_site_id(&mut self, site_id: i64) -> Result<&mut Self, CardgateApiError> {
        if site_id <= 0 {
            return Err(CardgateApiError::invalid_field("Transaction.SiteId.Invalid", format!("invalid site: {site_id}")));
        }
        self.site_id = site_id;
        Ok(self)
    }

    /// The site key is never sent with requests and can not be read back. It is only used to verify callbacks for
    /// this transaction; see [`Transaction::callback_verifier`].
    pub fn set_site_key(&mut self, site_key: &str) -> Result<&mut Self, CardgateApiError> {
        let key = Secret::non_empty(site_key)
            .map_err(|_| CardgateApiError::invalid_field("Client.SiteKey.Invalid", "invalid site key: <empty>"))?;
        self.site_key = Some(key);
        Ok(self)
    }

    /// Sets the amount in minor currency units, e.g. cents.
    pub fn set_amount(&mut self, amount: i64) -> Result<&mut Self, CardgateApiError> {
        if amount < 0 {
            return Err(CardgateApiError::invalid_field("Transaction.Amount.Invalid", format!("invalid amount: {amount}")));
        }
        self.amount = amount;
        Ok(self)
    }

    /// Sets the ISO 4217 currency code.
    pub fn set_currency(&mut self, currency: &str) -> Result<&mut Self, CardgateApiError> {
        if currency.len() != 3 || !currency.bytes().all(|b| b.is_ascii_alphabetic()) {
            return Err(CardgateApiError::invalid_field(
                "Transaction.Currency.Invalid",
                format!("invalid currency: {currency}"),
            ));
        }
        self.currency = currency.to_string();
        Ok(self)
    }

    pub fn set_description(&mut self, description: &str) -> Result<&mut Self, CardgateApiError> {
        self.description = Some(description.to_string());
        Ok(self)
    }

    pub fn set_reference(&mut self, reference: &str) -> Result<&mut Self, CardgateApiError> {
        self.reference = Some(reference.to_string());
        Ok(self)
    }

    /// Accepts either a method code (`"ideal"`) or a [`PaymentMethod`].
    pub fn set_payment_method<M: Into<MethodSelection>>(&mut self, method: M) -> Result<&mut Self, CardgateApiError> {
        let method = method.into().normalize();
        if method.id().is_empty() {
            return Err(CardgateApiError::invalid_field(
                "Transaction.PaymentMethod.Invalid",
                "invalid payment method: <empty>",
            ));
        }
        self.payment_method = Some(method);
        Ok(self)
    }

    /// Selects an issuer (e.g. a bank) within the payment method. A payment method must be set first.
    pub fn set_issuer(&mut self, issuer: &str) -> Result<&mut Self, CardgateApiError> {
        if self.payment_method.is_none() {
            return Err(CardgateApiError::invalid_field(
                "Transaction.Issuer.Invalid",
                format!("invalid issuer: {issuer}. No payment method has been set"),
            ));
        }
        if issuer.is_empty() {
            return Err(CardgateApiError::invalid_field("Transaction.Issuer.Invalid", "invalid issuer: <empty>"));
        }
        self.issuer = Some(issuer.to_string());
        Ok(self)
    }

    /// Marks whether this transaction may be used as the basis for recurring charges.
    pub fn set_recurring(&mut self, recurring: bool) -> Result<&mut Self, CardgateApiError> {
        self.recurring = recurring;
        Ok(self)
    }

    pub fn set_consumer(&mut self, consumer: Consumer) -> Result<&mut Self, CardgateApiError> {
        self.consumer = Some(consumer);
        Ok(self)
    }

    pub fn set_cart(&mut self, cart: Cart) -> Result<&mut Self, CardgateApiError> {
        self.cart = Some(cart);
        Ok(self)
    }

    pub fn set_callback_url(&mut self, url: &str) -> Result<&mut Self, CardgateApiError> {
        self.callback_url = Some(parse_url("Transaction.CallbackUrl.Invalid", url)?);
        Ok(self)
    }

    pub fn set_success_url(&mut self, url: &str) -> Result<&mut Self, CardgateApiError> {
        self.success_url = Some(parse_url("Transaction.SuccessUrl.Invalid", url)?);
        Ok(self)
    }

    pub fn set_failure_url(&mut self, url: &str) -> Result<&mut Self, CardgateApiError> {
        self.failure_url = Some(parse_url("Transaction.FailureUrl.Invalid", url)?);
        Ok(self)
    }

    pub fn set_pending_url(&mut self, url: &str) -> Result<&mut Self, CardgateApiError> {
        self.pending_url = Some(parse_url("Transaction.PendingUrl.Invalid", url)?);
        Ok(self)
    }

    /// Sends the consumer back to the same URL whether the payment succeeded, failed or is still pending.
    pub fn set_redirect_url(&mut self, url: &str) -> Result<&mut Self, CardgateApiError> {
        let url = parse_url("Transaction.SuccessUrl.Invalid", url)?;
        self.success_url = Some(url.clone());
        self.failure_url = Some(url.clone());
        self.pending_url = Some(url);
        Ok(self)
    }

    //---------------------------------------------   Getters   ------------------------------------------------------

    pub fn id(&self) -> Result<&str, CardgateApiError> {
        self.id.as_deref().ok_or_else(|| CardgateApiError::NotInitialized("invalid transaction state".to_string()))
    }

    pub fn state(&self) -> TransactionState {
        match self.id {
            Some(_) => TransactionState::Registered,
            None => TransactionState::Unregistered,
        }
    }

    pub fn site_id(&self) -> i64 {
        self.site_id
    }

    pub fn amount(&self) -> i64 {
        self.amount
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }

    pub fn payment_method(&self) -> Option<&PaymentMethod> {
        self.payment_method.as_ref()
    }

    pub fn issuer(&self) -> Option<&str> {
        self.issuer.as_deref()
    }

    pub fn recurring(&self) -> bool {
        self.recurring
    }

    pub fn consumer(&self) -> Option<&Consumer> {
        self.consumer.as_ref()
    }

    /// The consumer, created empty if none has been set yet.
    pub fn consumer_mut(&mut self) -> &mut Consumer {
        self.consumer.get_or_insert_with(Consumer::default)
    }

    pub fn cart(&self) -> Option<&Cart> {
        self.cart.as_ref()
    }

    /// The cart, created empty if none has been set yet.
    pub fn cart_mut(&mut self) -> &mut Cart {
        self.cart.get_or_insert_with(Cart::default)
    }

    pub fn callback_url(&self) -> Option<&str> {
        self.callback_url.as_deref()
    }

    pub fn success_url(&self) -> Option<&str> {
        self.success_url.as_deref()
    }

    pub fn failure_url(&self) -> Option<&str> {
        self.failure_url.as_deref()
    }

    pub fn pending_url(&self) -> Option<&str> {
        self.pending_url.as_deref()
    }

    /// Where the consumer must be sent to complete the payment. Only set after registration, and only when the
    /// gateway asked for a redirect.
    pub fn action_url(&self) -> Option<&str> {
        self.action_url.as_deref()
    }

    /// A verifier for the callbacks the gateway will send about this transaction, if a site key has been set.
    pub fn callback_verifier(&self) -> Option<CallbackVerifier> {
        self.site_key.clone().map(CallbackVerifier::new)
    }

    //---------------------------------------------   Gateway operations   -------------------------------------------

    /// A transaction can be registered once. Everything else is enforced by the constructor and the setters.
    pub fn validate_for_register(&self) -> Result<(), CardgateApiError> {
        match &self.id {
            Some(id) => Err(CardgateApiError::invalid_field(
                "Transaction.Id.Invalid",
                format!("transaction {id} has already been registered"),
            )),
            None => Ok(()),
        }
    }

    /// Registers the transaction with the gateway. On success the transaction adopts the id the gateway assigned and,
    /// if the gateway wants the consumer redirected, the URL to send them to.
    pub async fn register(&mut self) -> Result<&mut Self, CardgateApiError> {
        const CODE: &str = "Transaction.Request.Invalid";
        self.validate_for_register()?;
        let resource = register_resource(self.payment_method.as_ref());
        let data = register_payload(&self.register_fields(), self.consumer.as_ref(), self.cart.as_ref());
        debug!("Registering transaction for {} {} at {resource}", self.amount, self.currency);
        let response = self.client.do_request(&resource, Some(data), Method::POST).await?;
        let payment = &response.body["payment"];
        let id =
            non_empty_id(&payment["transaction"]).ok_or_else(|| unexpected(CODE, "no payment transaction", &response))?;
        let action_url = if payment["action"] == "redirect" {
            let url = payment["url"]
                .as_str()
                .filter(|s| !s.is_empty())
                .ok_or_else(|| unexpected(CODE, "redirect action without a url", &response))?;
            Some(url.to_string())
        } else {
            None
        };
        info!("Registered transaction {id}");
        self.id = Some(id);
        self.action_url = action_url;
        Ok(self)
    }

    /// Asks the gateway whether this transaction can (still) be refunded.
    pub async fn can_refund(&self) -> Result<RefundStatus, CardgateApiError> {
        let id = self.id()?;
        let resource = format!("transaction/{id}/");
        let response = self.client.do_request(&resource, None, Method::GET).await?;
        let details = &response.body["transaction"];
        if !is_truthy(details) {
            return Err(unexpected("Transaction.CanRefund.Invalid", "no transaction in response", &response));
        }
        let status = RefundStatus {
            can_refund: is_truthy(&details["can_refund"]),
            remainder: lenient_i64(&details["refund_remainder"]).unwrap_or(0),
        };
        debug!("Refund status for {id}: {status:?}");
        Ok(status)
    }

    /// Refunds `amount` (or the full transaction amount if `None`) and returns the refund transaction.
    pub async fn refund(
        &self,
        amount: Option<i64>,
        description: Option<&str>,
    ) -> Result<Transaction<'c, C>, CardgateApiError> {
        const CODE: &str = "Transaction.Refund.Invalid";
        let id = self.id()?;
        let amount = match amount {
            Some(a) if a <= 0 => {
                return Err(CardgateApiError::invalid_field("Transaction.Amount.Invalid", format!("invalid amount: {a}")))
            },
            Some(a) => a,
            None => self.amount,
        };
        let resource = format!("refund/{id}/");
        let data = refund_payload(amount, &self.currency, description);
        debug!("Refunding {amount} {} of transaction {id}", self.currency);
        let response = self.client.do_request(&resource, Some(data), Method::POST).await?;
        let refund_id = non_empty_id(&response.body["refund"]["transaction"])
            .ok_or_else(|| unexpected(CODE, "no refund transaction", &response))?;
        info!("Transaction {id} refunded by {refund_id}");
        Self::fetch(self.client, &refund_id).await
    }

    /// Charges `amount` again against the payment details of this (recurring) transaction and returns the new
    /// transaction.
    pub async fn recur(
        &self,
        amount: i64,
        reference: Option<&str>,
        description: Option<&str>,
    ) -> Result<Transaction<'c, C>, CardgateApiError> {
        const CODE: &str = "Transaction.Recur.Invalid";
        let id = self.id()?;
        if amount <= 0 {
            return Err(CardgateApiError::invalid_field("Transaction.Amount.Invalid", format!("invalid amount: {amount}")));
        }
        let resource = format!("recurring/{id}/");
        let data = recur_payload(amount, &self.currency, reference, description);
        debug!("Recurring {amount} {} on transaction {id}", self.currency);
        let response = self.client.do_request(&resource, Some(data), Method::POST).await?;
        let recurring_id = non_empty_id(&response.body["recurring"]["transaction_id"])
            .ok_or_else(|| unexpected(CODE, "no recurring transaction_id", &response))?;
        info!("Transaction {id} recurred as {recurring_id}");
        Self::fetch(self.client, &recurring_id).await
    }

    fn register_fields(&self) -> RegisterFields<'_> {
        RegisterFields {
            site_id: self.site_id,
            amount: self.amount,
            currency: &self.currency,
            callback_url: self.callback_url.as_deref(),
            success_url: self.success_url.as_deref(),
            failure_url: self.failure_url.as_deref(),
            pending_url: self.pending_url.as_deref(),
            description: self.description.as_deref(),
            reference: self.reference.as_deref(),
            recurring: self.recurring,
            payment_method: self.payment_method.as_ref(),
            issuer: self.issuer.as_deref(),
        }
    }
}

impl<C> Debug for Transaction<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("site_id", &self.site_id)
            .field("site_key", &self.site_key)
            .field("amount", &self.amount)
            .field("currency", &self.currency)
            .field("description", &self.description)
            .field("reference", &self.reference)
            .field("payment_method", &self.payment_method)
            .field("issuer", &self.issuer)
            .field("recurring", &self.recurring)
            .field("consumer", &self.consumer)
            .field("cart", &self.cart)
            .field("callback_url", &self.callback_url)
            .field("success_url", &self.success_url)
            .field("failure_url", &self.failure_url)
            .field("pending_url", &self.pending_url)
            .field("action_url", &self.action_url)
            .finish()
    }
}

/// Checks that `url` is absolute and has a host. The caller's string is kept as is, never the normalised form.
fn parse_url(code: &'static str, url: &str) -> Result<String, CardgateApiError> {
    match Url::parse(url) {
        Ok(parsed) if parsed.has_host() => Ok(url.to_string()),
        Ok(_) => Err(CardgateApiError::invalid_field(code, format!("invalid url: {url}. The url has no host"))),
        Err(e) => Err(CardgateApiError::invalid_field(code, format!("invalid url: {url}. {e}"))),
    }
}

fn unexpected(code: &'static str, message: &str, response: &GatewayResponse) -> CardgateApiError {
    warn!("Unexpected gateway response ({code}): {message}. {}", response.diagnostics());
    CardgateApiError::UnexpectedResponse { code, message: message.to_string(), response: response.diagnostics() }
}

#[cfg(test)]
mod test {
    use serde_json::{json, Value};

    use super::*;
    use crate::{
        data_objects::{Address, CartItem, CartItemType},
        mocks::MockGateway,
        payment_method::IDEAL,
    };

    fn response(body: Value) -> Result<GatewayResponse, CardgateApiError> {
        Ok(GatewayResponse::from_value("mock", body))
    }

    fn lookup(id: &'static str, amount: i64) -> Value {
        json!({"transaction": {"id": id, "site_id": 10, "amount": amount, "currency_id": "EUR"}})
    }

    #[test]
    fn getters_return_what_was_set() {
        let gateway = MockGateway::new();
        let mut tx = Transaction::new(&gateway, 10, 1295, "EUR").unwrap();
        assert_eq!(tx.site_id(), 10);
        assert_eq!(tx.amount(), 1295);
        assert_eq!(tx.currency(), "EUR");
        assert_eq!(tx.description(), None);
        assert_eq!(tx.reference(), None);
        assert_eq!(tx.payment_method(), None);
        assert_eq!(tx.issuer(), None);
        assert!(!tx.recurring());
        assert!(tx.consumer().is_none());
        assert!(tx.cart().is_none());
        assert!(tx.callback_url().is_none());
        assert!(tx.action_url().is_none());
        assert!(tx.callback_verifier().is_none());
        assert_eq!(tx.state(), TransactionState::Unregistered);

        tx.set_description("Order 1001")
            .unwrap()
            .set_reference("shop-01001")
            .unwrap()
            .set_payment_method(IDEAL)
            .unwrap()
            .set_issuer("INGBNL2A")
            .unwrap()
            .set_recurring(true)
            .unwrap()
            .set_callback_url("https://shop.example.com/callback")
            .unwrap()
            .set_redirect_url("https://shop.example.com/return")
            .unwrap()
            .set_site_key("s3cr3t")
            .unwrap();
        assert_eq!(tx.description(), Some("Order 1001"));
        assert_eq!(tx.reference(), Some("shop-01001"));
        assert_eq!(tx.payment_method(), Some(&PaymentMethod::new("ideal", "ideal")));
        assert_eq!(tx.issuer(), Some("INGBNL2A"));
        assert!(tx.recurring());
        assert_eq!(tx.callback_url().unwrap(), "https://shop.example.com/callback");
        assert_eq!(tx.success_url().unwrap(), "https://shop.example.com/return");
        assert_eq!(tx.failure_url(), tx.success_url());
        assert_eq!(tx.pending_url(), tx.success_url());
        assert!(tx.callback_verifier().is_some());
        assert!(!format!("{tx:?}").contains("s3cr3t"));
    }

    #[test]
    fn invalid_values_leave_state_unchanged() {
        let gateway = MockGateway::new();
        assert!(Transaction::new(&gateway, 0, 100, "EUR").is_err());
        assert!(Transaction::new(&gateway, 10, -1, "EUR").is_err());
        let mut tx = Transaction::new(&gateway, 10, 1295, "EUR").unwrap();

        let err = tx.set_amount(-5).unwrap_err();
        assert_eq!(err.code(), Some("Transaction.Amount.Invalid"));
        assert_eq!(tx.amount(), 1295);

        let err = tx.set_currency("EURO").unwrap_err();
        assert_eq!(err.code(), Some("Transaction.Currency.Invalid"));
        assert!(tx.set_currency("").is_err());
        assert!(tx.set_currency("E1R").is_err());
        assert_eq!(tx.currency(), "EUR");

        tx.set_callback_url("https://shop.example.com/callback").unwrap();
        let err = tx.set_callback_url("not a url").unwrap_err();
        assert_eq!(err.code(), Some("Transaction.CallbackUrl.Invalid"));
        let err = tx.set_callback_url("mailto:shop@example.com").unwrap_err();
        assert_eq!(err.code(), Some("Transaction.CallbackUrl.Invalid"));
        assert_eq!(tx.callback_url().unwrap(), "https://shop.example.com/callback");

        assert_eq!(tx.set_success_url("/relative").unwrap_err().code(), Some("Transaction.SuccessUrl.Invalid"));
        assert_eq!(tx.set_failure_url("").unwrap_err().code(), Some("Transaction.FailureUrl.Invalid"));
        assert_eq!(tx.set_pending_url("http//x").unwrap_err().code(), Some("Transaction.PendingUrl.Invalid"));
        assert!(tx.set_redirect_url("nope").is_err());
        assert!(tx.success_url().is_none());
        assert!(tx.failure_url().is_none());
        assert!(tx.pending_url().is_none());

        let err = tx.set_issuer("INGBNL2A").unwrap_err();
        assert_eq!(err.code(), Some("Transaction.Issuer.Invalid"));
        assert_eq!(tx.issuer(), None);

        assert_eq!(tx.set_payment_method("").unwrap_err().code(), Some("Transaction.PaymentMethod.Invalid"));
        assert_eq!(tx.set_site_id(-3).unwrap_err().code(), Some("Transaction.SiteId.Invalid"));
        assert_eq!(tx.site_id(), 10);
        assert_eq!(tx.set_site_key("").unwrap_err().code(), Some("Client.SiteKey.Invalid"));
        assert_eq!(tx.set_id("").unwrap_err().code(), Some("Transaction.Id.Invalid"));
    }

    #[test]
    fn id_is_immutable_once_set() {
        let gateway = MockGateway::new();
        let mut tx = Transaction::new(&gateway, 10, 1295, "EUR").unwrap();
        let err = tx.id().unwrap_err();
        assert!(matches!(err, CardgateApiError::NotInitialized(_)));
        tx.set_id("T1").unwrap();
        assert_eq!(tx.id().unwrap(), "T1");
        assert_eq!(tx.state(), TransactionState::Registered);
        assert!(tx.set_id("T2").is_err());
        assert_eq!(tx.id().unwrap(), "T1");
    }

    #[tokio::test]
    async fn register_with_redirect() {
        let _ = env_logger::try_init().ok();
        let mut gateway = MockGateway::new();
        gateway
            .expect_do_request()
            .withf(|resource, data, method| {
                let data = Value::Object(data.clone().expect("register sends data"));
                resource == "payment/ideal/" &&
                    *method == Method::POST &&
                    data["site_id"] == 10 &&
                    data["amount"] == 1295 &&
                    data["currency_id"] == "EUR" &&
                    data["issuer"] == "INGBNL2A" &&
                    data["email"] == "jan@example.com" &&
                    data["consumer"]["shipto_city"] == "Delft" &&
                    data["country_id"] == "NL" &&
                    data["cartitems"][0]["sku"] == "SKU-1" &&
                    data.get("description").is_none() &&
                    data.get("recurring").is_none()
            })
            .times(1)
            .returning(|_, _, _| {
                let json = include_str!("./test_assets/register_redirect.json");
                response(serde_json::from_str(json).unwrap())
            });
        let mut tx = Transaction::new(&gateway, 10, 1295, "EUR").unwrap();
        tx.set_payment_method(PaymentMethod::new(IDEAL, "iDEAL")).unwrap().set_issuer("INGBNL2A").unwrap();
        let consumer = tx.consumer_mut();
        consumer.email = Some("jan@example.com".into());
        consumer.address = Address { country: Some("NL".into()), ..Default::default() };
        consumer.shipping_address.city = Some("Delft".into());
        tx.cart_mut().add_item(CartItem::new(CartItemType::Product, "SKU-1", "Mug", 1, 1295));
        tx.register().await.unwrap();
        assert_eq!(tx.id().unwrap(), "T100123");
        assert_eq!(tx.state(), TransactionState::Registered);
        assert_eq!(
            tx.action_url(),
            Some("https://secure-staging.curopayments.net/gateway/ideal/redirect/T100123")
        );
    }

    #[tokio::test]
    async fn urls_are_sent_as_given() {
        const CALLBACK: &str = "https://Shop.Example.com:443/cardgate?x=a b";
        const RETURN: &str = "https://shop.example.com";
        let mut gateway = MockGateway::new();
        gateway
            .expect_do_request()
            .withf(|_, data, _| {
                let data = Value::Object(data.clone().expect("register sends data"));
                data["url_callback"] == CALLBACK &&
                    data["url_success"] == RETURN &&
                    data["url_failure"] == RETURN &&
                    data["url_pending"] == RETURN
            })
            .times(1)
            .returning(|_, _, _| response(json!({"payment": {"transaction": "T9"}})));
        let mut tx = Transaction::new(&gateway, 10, 1295, "EUR").unwrap();
        tx.set_callback_url(CALLBACK).unwrap().set_redirect_url(RETURN).unwrap();
        assert_eq!(tx.callback_url(), Some(CALLBACK));
        assert_eq!(tx.success_url(), Some(RETURN));
        assert_eq!(tx.pending_url(), Some(RETURN));
        tx.register().await.unwrap();
        assert_eq!(tx.id().unwrap(), "T9");
    }

    #[tokio::test]
    async fn register_without_redirect() {
        let mut gateway = MockGateway::new();
        gateway
            .expect_do_request()
            .withf(|resource, data, _| resource == "payment/" && data.is_some())
            .times(1)
            .returning(|_, _, _| response(json!({"payment": {"transaction": "T9", "action": "display"}})));
        let mut tx = Transaction::new(&gateway, 10, 1295, "EUR").unwrap();
        tx.register().await.unwrap();
        assert_eq!(tx.id().unwrap(), "T9");
        assert!(tx.action_url().is_none());
        let err = tx.register().await.unwrap_err();
        assert_eq!(err.code(), Some("Transaction.Id.Invalid"));
    }

    #[tokio::test]
    async fn register_with_malformed_response() {
        let _ = env_logger::try_init().ok();
        let mut gateway = MockGateway::new();
        gateway
            .expect_do_request()
            .times(1)
            .returning(|_, _, _| response(json!({"payment": {"action": "redirect", "url": "https://x.example"}})));
        let mut tx = Transaction::new(&gateway, 10, 1295, "EUR").unwrap();
        let err = tx.register().await.unwrap_err();
        match &err {
            CardgateApiError::UnexpectedResponse { code, response, .. } => {
                assert_eq!(*code, "Transaction.Request.Invalid");
                assert!(response.contains("https://x.example"));
            },
            e => panic!("Unexpected error: {e}"),
        }
        assert!(tx.id().is_err());
        assert_eq!(tx.state(), TransactionState::Unregistered);
        assert!(tx.action_url().is_none());
    }

    #[tokio::test]
    async fn redirect_without_url_is_malformed() {
        let mut gateway = MockGateway::new();
        gateway
            .expect_do_request()
            .returning(|_, _, _| response(json!({"payment": {"transaction": "T9", "action": "redirect"}})));
        let mut tx = Transaction::new(&gateway, 10, 1295, "EUR").unwrap();
        let err = tx.register().await.unwrap_err();
        assert_eq!(err.code(), Some("Transaction.Request.Invalid"));
        assert!(tx.id().is_err());
    }

    #[tokio::test]
    async fn transport_errors_propagate() {
        let mut gateway = MockGateway::new();
        gateway
            .expect_do_request()
            .returning(|_, _, _| Err(CardgateApiError::QueryError { status: 401, message: "Unauthorized".into() }));
        let mut tx = Transaction::new(&gateway, 10, 1295, "EUR").unwrap();
        let err = tx.register().await.unwrap_err();
        assert!(matches!(err, CardgateApiError::QueryError { status: 401, .. }));
        assert!(tx.id().is_err());
    }

    #[tokio::test]
    async fn can_refund() {
        let mut gateway = MockGateway::new();
        gateway
            .expect_do_request()
            .withf(|resource, data, method| resource == "transaction/T1/" && data.is_none() && *method == Method::GET)
            .times(1)
            .returning(|_, _, _| response(json!({"transaction": {"can_refund": true, "refund_remainder": 795}})));
        gateway
            .expect_do_request()
            .withf(|resource, _, _| resource == "transaction/T2/")
            .times(1)
            .returning(|_, _, _| response(json!({"transaction": {"can_refund": false}})));
        gateway
            .expect_do_request()
            .withf(|resource, _, _| resource == "transaction/T3/")
            .times(1)
            .returning(|_, _, _| response(json!({"error": "not found"})));

        let mut tx = Transaction::new(&gateway, 10, 1295, "EUR").unwrap();
        let err = tx.can_refund().await.unwrap_err();
        assert!(matches!(err, CardgateApiError::NotInitialized(_)));

        tx.set_id("T1").unwrap();
        assert_eq!(tx.can_refund().await.unwrap(), RefundStatus { can_refund: true, remainder: 795 });
        let mut tx = Transaction::new(&gateway, 10, 1295, "EUR").unwrap();
        tx.set_id("T2").unwrap();
        assert_eq!(tx.can_refund().await.unwrap(), RefundStatus { can_refund: false, remainder: 0 });
        let mut tx = Transaction::new(&gateway, 10, 1295, "EUR").unwrap();
        tx.set_id("T3").unwrap();
        let err = tx.can_refund().await.unwrap_err();
        assert_eq!(err.code(), Some("Transaction.CanRefund.Invalid"));
    }

    #[tokio::test]
    async fn full_refund_by_default() {
        let _ = env_logger::try_init().ok();
        let mut gateway = MockGateway::new();
        gateway
            .expect_do_request()
            .withf(|resource, data, method| {
                resource == "refund/T1/" &&
                    *method == Method::POST &&
                    data.clone().map(Value::Object) == Some(json!({"amount": 1295, "currency_id": "EUR"}))
            })
            .times(1)
            .returning(|_, _, _| response(json!({"refund": {"transaction": "R1"}})));
        gateway
            .expect_do_request()
            .withf(|resource, _, method| resource == "transaction/R1/" && *method == Method::GET)
            .times(1)
            .returning(|_, _, _| response(lookup("R1", 1295)));
        let mut tx = Transaction::new(&gateway, 10, 1295, "EUR").unwrap();
        tx.set_id("T1").unwrap();
        let refund = tx.refund(None, None).await.unwrap();
        assert_eq!(refund.id().unwrap(), "R1");
        assert_eq!(refund.amount(), 1295);
        assert_eq!(tx.id().unwrap(), "T1");
    }

    #[tokio::test]
    async fn partial_refund() {
        let mut gateway = MockGateway::new();
        gateway
            .expect_do_request()
            .withf(|resource, data, _| {
                resource == "refund/T1/" &&
                    data.clone().map(Value::Object) ==
                        Some(json!({"amount": 500, "currency_id": "EUR", "description": "Broken mug"}))
            })
            .times(1)
            .returning(|_, _, _| response(json!({"refund": {"transaction": 4711}})));
        gateway
            .expect_do_request()
            .withf(|resource, _, _| resource == "transaction/4711/")
            .times(1)
            .returning(|_, _, _| response(lookup("4711", 500)));
        let mut tx = Transaction::new(&gateway, 10, 1295, "EUR").unwrap();
        tx.set_id("T1").unwrap();
        let refund = tx.refund(Some(500), Some("Broken mug")).await.unwrap();
        assert_eq!(refund.id().unwrap(), "4711");
        assert_eq!(refund.amount(), 500);
    }

    #[tokio::test]
    async fn refund_errors() {
        let mut gateway = MockGateway::new();
        gateway
            .expect_do_request()
            .withf(|resource, _, _| resource == "refund/T1/")
            .times(1)
            .returning(|_, _, _| response(json!({"refund": {}})));
        let mut tx = Transaction::new(&gateway, 10, 1295, "EUR").unwrap();
        let err = tx.refund(None, None).await.unwrap_err();
        assert!(matches!(err, CardgateApiError::NotInitialized(_)));
        tx.set_id("T1").unwrap();
        let err = tx.refund(Some(0), None).await.unwrap_err();
        assert_eq!(err.code(), Some("Transaction.Amount.Invalid"));
        let err = tx.refund(None, None).await.unwrap_err();
        assert_eq!(err.code(), Some("Transaction.Refund.Invalid"));
    }

    #[tokio::test]
    async fn recur_fetches_the_new_transaction() {
        let _ = env_logger::try_init().ok();
        let mut gateway = MockGateway::new();
        gateway
            .expect_do_request()
            .withf(|resource, data, method| {
                resource == "recurring/T1/" &&
                    *method == Method::POST &&
                    data.clone().map(Value::Object) ==
                        Some(json!({"amount": 500, "currency_id": "EUR", "reference": "ref1"}))
            })
            .times(1)
            .returning(|_, _, _| response(json!({"recurring": {"transaction_id": "T2"}})));
        gateway.expect_do_request().withf(|resource, _, _| resource == "transaction/T2/").times(1).returning(
            |_, _, _| {
                let json = include_str!("./test_assets/transaction_details.json");
                response(serde_json::from_str(json).unwrap())
            },
        );
        let mut tx = Transaction::new(&gateway, 10, 1295, "EUR").unwrap();
        tx.set_id("T1").unwrap().set_recurring(true).unwrap();
        let recurring = tx.recur(500, Some("ref1"), None).await.unwrap();
        assert_eq!(recurring.id().unwrap(), "T2");
        assert_eq!(recurring.amount(), 500);
        assert_eq!(recurring.site_id(), 10);
        assert_eq!(recurring.description(), Some("Subscription renewal"));
        assert_eq!(recurring.reference(), Some("ref1"));
        assert_eq!(recurring.payment_method(), Some(&PaymentMethod::new("creditcard", "Creditcard")));
        assert_eq!(recurring.state(), TransactionState::Registered);
        assert_eq!(tx.id().unwrap(), "T1");
        assert_eq!(tx.amount(), 1295);
    }

    #[tokio::test]
    async fn recur_errors() {
        let mut gateway = MockGateway::new();
        gateway
            .expect_do_request()
            .withf(|resource, _, _| resource == "recurring/T1/")
            .times(1)
            .returning(|_, _, _| response(json!({"recurring": {"transaction": "T2"}})));
        let mut tx = Transaction::new(&gateway, 10, 1295, "EUR").unwrap();
        tx.set_id("T1").unwrap();
        let err = tx.recur(-1, None, None).await.unwrap_err();
        assert_eq!(err.code(), Some("Transaction.Amount.Invalid"));
        let err = tx.recur(500, None, None).await.unwrap_err();
        assert_eq!(err.code(), Some("Transaction.Recur.Invalid"));
    }

    #[tokio::test]
    async fn fetch_rejects_incomplete_details() {
        let mut gateway = MockGateway::new();
        gateway
            .expect_do_request()
            .withf(|resource, _, _| resource == "transaction/T5/")
            .returning(|_, _, _| response(json!({"transaction": {"id": "T5", "amount": 100}})));
        let err = Transaction::fetch(&gateway, "T5").await.unwrap_err();
        assert_eq!(err.code(), Some("Transaction.Details.Invalid"));
        assert!(Transaction::fetch(&gateway, "").await.is_err());
    }

    #[tokio::test]
    async fn transactions_do_not_share_state() {
        let mut first = MockGateway::new();
        first.expect_do_request().times(1).returning(|_, _, _| response(json!({"payment": {"transaction": "A1"}})));
        let mut second = MockGateway::new();
        second.expect_do_request().times(1).returning(|_, _, _| {
            response(json!({"payment": {"transaction": "B1", "action": "redirect", "url": "https://pay.example/B1"}}))
        });
        let mut a = Transaction::new(&first, 10, 1295, "EUR").unwrap();
        let mut b = Transaction::new(&second, 10, 1295, "EUR").unwrap();
        a.set_reference("shop-01001").unwrap();
        b.set_reference("shop-01001").unwrap();
        a.register().await.unwrap();
        b.register().await.unwrap();
        assert_eq!(a.id().unwrap(), "A1");
        assert!(a.action_url().is_none());
        assert_eq!(b.id().unwrap(), "B1");
        assert_eq!(b.action_url(), Some("https://pay.example/B1"));
    }
}
