//! Assembles request payloads for the gateway.
//!
//! Everything here is a pure function of its inputs. Fields without a value are left out of the payload entirely:
//! the gateway treats an absent field differently from a field that is present but null or empty.

use serde_json::{json, Value};

use crate::{
    api::FieldMap,
    data_objects::{Cart, Consumer, SHIPPING_PREFIX},
    PaymentMethod,
};

/// The transaction fields that make up a registration request.
#[derive(Debug, Clone, Copy)]
pub struct RegisterFields<'a> {
    pub site_id: i64,
    pub amount: i64,
    pub currency: &'a str,
    pub callback_url: Option<&'a str>,
    pub success_url: Option<&'a str>,
    pub failure_url: Option<&'a str>,
    pub pending_url: Option<&'a str>,
    pub description: Option<&'a str>,
    pub reference: Option<&'a str>,
    pub recurring: bool,
    pub payment_method: Option<&'a PaymentMethod>,
    pub issuer: Option<&'a str>,
}

/// `payment/` or, when a method has been chosen, `payment/<method>/`.
pub fn register_resource(method: Option<&PaymentMethod>) -> String {
    match method {
        Some(m) => format!("payment/{}/", m.id()),
        None => "payment/".to_string(),
    }
}

pub fn register_payload(fields: &RegisterFields<'_>, consumer: Option<&Consumer>, cart: Option<&Cart>) -> FieldMap {
    let mut data = FieldMap::new();
    data.insert("site_id".into(), json!(fields.site_id));
    data.insert("amount".into(), json!(fields.amount));
    data.insert("currency_id".into(), json!(fields.currency));
    data.insert("url_callback".into(), url_value(fields.callback_url));
    data.insert("url_success".into(), url_value(fields.success_url));
    data.insert("url_failure".into(), url_value(fields.failure_url));
    data.insert("url_pending".into(), url_value(fields.pending_url));
    data.insert("description".into(), json!(fields.description));
    data.insert("reference".into(), json!(fields.reference));
    // Only a set flag is transmitted
    data.insert("recurring".into(), if fields.recurring { json!("1") } else { Value::Null });
    if let Some(consumer) = consumer {
        data.insert("email".into(), json!(consumer.email()));
        data.insert("phone".into(), json!(consumer.phone()));
        let mut address = consumer.address().data("");
        address.extend(consumer.shipping_address().data(SHIPPING_PREFIX));
        data.insert("consumer".into(), Value::Object(address));
        data.insert("country_id".into(), json!(consumer.address().country()));
    }
    if let Some(cart) = cart {
        data.insert("cartitems".into(), Value::Array(cart.data()));
    }
    if fields.payment_method.is_some() {
        data.insert("issuer".into(), json!(fields.issuer));
    }
    strip_empty(data)
}

pub fn refund_payload(amount: i64, currency: &str, description: Option<&str>) -> FieldMap {
    let mut data = FieldMap::new();
    data.insert("amount".into(), json!(amount));
    data.insert("currency_id".into(), json!(currency));
    data.insert("description".into(), json!(description));
    strip_empty(data)
}

pub fn recur_payload(amount: i64, currency: &str, reference: Option<&str>, description: Option<&str>) -> FieldMap {
    let mut data = FieldMap::new();
    data.insert("amount".into(), json!(amount));
    data.insert("currency_id".into(), json!(currency));
    data.insert("reference".into(), json!(reference));
    data.insert("description".into(), json!(description));
    strip_empty(data)
}

/// Removes nulls, empty strings, and empty arrays or objects. Nested objects are stripped first, so an object that
/// only contained empty values disappears too.
pub fn strip_empty(data: FieldMap) -> FieldMap {
    data.into_iter()
        .filter_map(|(k, v)| {
            let v = match v {
                Value::Object(inner) => Value::Object(strip_empty(inner)),
                v => v,
            };
            (!is_empty(&v)).then_some((k, v))
        })
        .collect()
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

fn url_value(url: Option<&str>) -> Value {
    url.map(|u| Value::String(u.to_string())).unwrap_or(Value::Null)
}
