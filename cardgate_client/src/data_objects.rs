use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::api::FieldMap;

/// Prefix applied to shipping address fields so they can share a map with the billing address.
pub const SHIPPING_PREFIX: &str = "shipto_";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub gender: Option<String>,
    pub initials: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company: Option<String>,
    pub address: Option<String>,
    pub zip_code: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    /// ISO 3166-1 alpha-2 country code
    pub country: Option<String>,
}

impl Address {
    /// The address in gateway field names, each prefixed with `prefix`. Unset fields are left out.
    pub fn data(&self, prefix: &str) -> FieldMap {
        let fields = [
            ("gender", &self.gender),
            ("initials", &self.initials),
            ("firstname", &self.first_name),
            ("lastname", &self.last_name),
            ("company", &self.company),
            ("address", &self.address),
            ("zipcode", &self.zip_code),
            ("city", &self.city),
            ("state", &self.state),
            ("country_id", &self.country),
        ];
        fields
            .into_iter()
            .filter_map(|(k, v)| v.as_ref().map(|v| (format!("{prefix}{k}"), Value::String(v.clone()))))
            .collect()
    }

    pub fn country(&self) -> Option<&str> {
        self.country.as_deref()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Consumer {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Address,
    pub shipping_address: Address,
}

impl Consumer {
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn phone(&self) -> Option<&str> {
        self.phone.as_deref()
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn shipping_address(&self) -> &Address {
        &self.shipping_address
    }
}

/// Gateway line item types
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CartItemType {
    #[default]
    Product,
    Shipping,
    PaymentCosts,
    Discount,
    Handling,
}

impl CartItemType {
    pub fn code(&self) -> i64 {
        match self {
            CartItemType::Product => 1,
            CartItemType::Shipping => 2,
            CartItemType::PaymentCosts => 3,
            CartItemType::Discount => 4,
            CartItemType::Handling => 5,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub item_type: CartItemType,
    pub sku: String,
    pub name: String,
    pub quantity: i64,
    /// Unit price in minor currency units
    pub price: i64,
    /// VAT percentage
    pub vat: Option<f64>,
    /// VAT per unit in minor currency units
    pub vat_amount: Option<i64>,
    /// Whether `price` includes VAT
    pub vat_inc: bool,
    pub link: Option<String>,
}

impl CartItem {
    pub fn new(item_type: CartItemType, sku: &str, name: &str, quantity: i64, price: i64) -> Self {
        Self {
            item_type,
            sku: sku.to_string(),
            name: name.to_string(),
            quantity,
            price,
            ..Default::default()
        }
    }

    pub fn data(&self) -> Value {
        let mut item = json!({
            "type": self.item_type.code(),
            "sku": self.sku,
            "name": self.name,
            "quantity": self.quantity,
            "price": self.price,
        });
        if let Some(vat) = self.vat {
            item["vat"] = json!(vat);
        }
        if let Some(vat_amount) = self.vat_amount {
            item["vat_amount"] = json!(vat_amount);
        }
        if self.vat_inc {
            item["vat_inc"] = json!(1);
        }
        if let Some(link) = &self.link {
            item["link"] = json!(link);
        }
        item
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_item(&mut self, item: CartItem) -> &mut Self {
        self.items.push(item);
        self
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The line items in the order they were added
    pub fn data(&self) -> Vec<Value> {
        self.items.iter().map(CartItem::data).collect()
    }
}

impl FromIterator<CartItem> for Cart {
    fn from_iter<T: IntoIterator<Item = CartItem>>(iter: T) -> Self {
        Self { items: iter.into_iter().collect() }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn prefixed_address_data() {
        let address = Address {
            first_name: Some("Jan".into()),
            city: Some("Utrecht".into()),
            country: Some("NL".into()),
            ..Default::default()
        };
        let data = address.data(SHIPPING_PREFIX);
        let keys = data.keys().cloned().collect::<Vec<_>>();
        assert_eq!(keys, vec!["shipto_firstname", "shipto_city", "shipto_country_id"]);
        assert_eq!(data["shipto_city"], "Utrecht");
        assert_eq!(address.country(), Some("NL"));
    }

    #[test]
    fn cart_items_keep_their_order() {
        let mut cart = Cart::new();
        cart.add_item(CartItem::new(CartItemType::Product, "SKU-1", "Mug", 2, 795))
            .add_item(CartItem { vat_inc: true, ..CartItem::new(CartItemType::Shipping, "SHIP", "Shipping", 1, 495) });
        let data = cart.data();
        assert_eq!(data.len(), 2);
        assert_eq!(data[0]["sku"], "SKU-1");
        assert_eq!(data[0]["type"], 1);
        assert!(data[0].get("vat_inc").is_none());
        assert_eq!(data[1]["type"], 2);
        assert_eq!(data[1]["vat_inc"], 1);
    }
}
