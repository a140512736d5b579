//! Pizza and order domain records.

use serde::{Deserialize, Serialize};

use crate::types::{OrderId, PizzaId};

/// One catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PizzaRecord {
    /// Catalog id, unique by allocation policy only.
    pub id: PizzaId,
    /// Display name.
    pub name: String,
    /// Ordered topping names.
    pub toppings: Vec<String>,
    /// Image location. Older catalogs store this as `url`.
    #[serde(alias = "url")]
    pub image_url: String,
    /// Availability flag.
    pub status: bool,
}

/// Fields used to create or update a [`PizzaRecord`]; the id is assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PizzaDraft {
    /// Display name.
    pub name: String,
    /// Ordered topping names.
    pub toppings: Vec<String>,
    /// Image location.
    #[serde(alias = "url")]
    pub image_url: String,
    /// Availability flag.
    pub status: bool,
}

impl PizzaDraft {
    /// Attaches `id` and returns the full record.
    pub fn into_record(self, id: PizzaId) -> PizzaRecord {
        PizzaRecord {
            id,
            name: self.name,
            toppings: self.toppings,
            image_url: self.image_url,
            status: self.status,
        }
    }
}

/// Read-side processing tag of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Not yet looked at.
    New,
    /// Being prepared.
    Pending,
}

impl OrderStatus {
    /// Wire name of the tag.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Pending => "pending",
        }
    }
}

/// A single customer submission, persisted as `<order_dir>/<id>.<ext>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    /// Caller-supplied id; doubles as the file stem.
    pub id: OrderId,
    /// Ordered pizza references (names).
    pub ordered_pizzas: Vec<String>,
    /// Customer name.
    pub name: String,
    /// Postal code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip_code: Option<String>,
    /// City.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    /// Street name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    /// House number, kept as text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub house_number: Option<String>,
    /// Contact email.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Free-form order date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// Contact phone number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    /// Read-side status tag; not guaranteed to be persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
}

impl OrderRecord {
    /// Builds an order with only the required fields set.
    pub fn new(id: impl Into<OrderId>, name: impl Into<String>, ordered_pizzas: Vec<String>) -> Self {
        Self {
            id: id.into(),
            ordered_pizzas,
            name: name.into(),
            zip_code: None,
            city: None,
            street: None,
            house_number: None,
            email: None,
            date: None,
            phone_number: None,
            status: None,
        }
    }
}

/// Output of a successful [`crate::validate::validate`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// Validated pizza.
    Pizza(PizzaRecord),
    /// Validated create/update fields.
    PizzaDraft(PizzaDraft),
    /// Validated catalog, in document order.
    Catalog(Vec<PizzaRecord>),
    /// Validated order.
    Order(OrderRecord),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pizza_serializes_camel_case_and_reads_legacy_url() {
        let rec: PizzaRecord = serde_json::from_str(
            r#"{"id":3,"name":"Funghi","toppings":["mushroom"],"url":"f.png","status":true}"#,
        )
        .expect("legacy");
        assert_eq!(rec.image_url, "f.png");

        let out = serde_json::to_value(&rec).expect("to_value");
        assert_eq!(out["imageUrl"], "f.png");
        assert!(out.get("url").is_none());
    }

    #[test]
    fn order_omits_absent_optional_fields() {
        let order = OrderRecord::new("a", "Alice", vec!["Margherita".to_string()]);
        let out = serde_json::to_value(&order).expect("to_value");
        let obj = out.as_object().expect("object");
        assert_eq!(obj.len(), 3);
        assert_eq!(out["orderedPizzas"][0], "Margherita");
    }
}
