//! Schema checks for catalog and order documents.
//!
//! Every check walks the raw [`serde_json::Value`] in field declaration order
//! and collects one [`Issue`] per violated constraint. A typed record is only
//! built once the whole document passed, so callers never see partial records.

use std::fmt;

use serde_json::{Map, Value};

use crate::{
    record::{OrderRecord, OrderStatus, PizzaDraft, PizzaRecord, Record},
    types::RecordKind,
};

/// One violated constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    /// Location of the offending value, e.g. `[2].toppings[0]`; empty for the root.
    pub path: String,
    /// What was wrong.
    pub message: String,
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            f.write_str(&self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// Non-empty, order-stable list of issues from one validation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issues(Vec<Issue>);

impl Issues {
    /// Wraps a single issue.
    pub fn single(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self(vec![Issue {
            path: path.into(),
            message: message.into(),
        }])
    }

    /// Number of issues.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false for values produced by this module.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Issues in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = &Issue> {
        self.0.iter()
    }

    /// Human-readable descriptions, one per issue.
    pub fn messages(&self) -> Vec<String> {
        self.0.iter().map(ToString::to_string).collect()
    }
}

impl fmt::Display for Issues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

/// Validates `raw` as a record of `kind`.
pub fn validate(raw: &Value, kind: RecordKind) -> Result<Record, Issues> {
    match kind {
        RecordKind::Pizza => validate_pizza(raw).map(Record::Pizza),
        RecordKind::PizzaDraft => validate_pizza_draft(raw).map(Record::PizzaDraft),
        RecordKind::Catalog => validate_catalog(raw).map(Record::Catalog),
        RecordKind::Order => validate_order(raw).map(Record::Order),
    }
}

/// Validates a single catalog entry.
pub fn validate_pizza(raw: &Value) -> Result<PizzaRecord, Issues> {
    let mut checker = Checker::default();
    let rec = checker.pizza("", raw);
    checker.finish(rec)
}

/// Validates create/update fields. Any `id` in the input is ignored.
pub fn validate_pizza_draft(raw: &Value) -> Result<PizzaDraft, Issues> {
    let mut checker = Checker::default();
    let draft = checker.pizza_draft("", raw);
    checker.finish(draft)
}

/// Validates a whole catalog document.
pub fn validate_catalog(raw: &Value) -> Result<Vec<PizzaRecord>, Issues> {
    let mut checker = Checker::default();
    let Some(items) = raw.as_array() else {
        return Err(Issues::single("", expected("array", raw)));
    };
    let records: Vec<Option<PizzaRecord>> = items
        .iter()
        .enumerate()
        .map(|(idx, item)| checker.pizza(&format!("[{idx}]"), item))
        .collect();
    let records = records.into_iter().collect::<Option<Vec<_>>>();
    checker.finish(records)
}

/// Validates a single order.
pub fn validate_order(raw: &Value) -> Result<OrderRecord, Issues> {
    let mut checker = Checker::default();
    let order = checker.order("", raw);
    checker.finish(order)
}

/// Checks that `id` is usable as an order file stem.
pub fn validate_order_id(id: &str) -> Result<(), Issues> {
    let mut checker = Checker::default();
    checker.order_id("id", id);
    checker.finish(Some(()))
}

#[derive(Default)]
struct Checker {
    issues: Vec<Issue>,
}

impl Checker {
    fn finish<T>(self, value: Option<T>) -> Result<T, Issues> {
        match value {
            Some(v) if self.issues.is_empty() => Ok(v),
            _ if self.issues.is_empty() => Err(Issues::single("", "invalid document")),
            _ => Err(Issues(self.issues)),
        }
    }

    fn push(&mut self, path: String, message: impl Into<String>) {
        self.issues.push(Issue {
            path,
            message: message.into(),
        });
    }

    fn object<'a>(&mut self, path: &str, value: &'a Value) -> Option<&'a Map<String, Value>> {
        let obj = value.as_object();
        if obj.is_none() {
            self.push(path.to_string(), expected("object", value));
        }
        obj
    }

    fn pizza(&mut self, path: &str, value: &Value) -> Option<PizzaRecord> {
        let obj = self.object(path, value)?;
        let id = self.integer(path, obj, "id");
        let draft = self.pizza_fields(path, obj);
        Some(draft?.into_record(id?))
    }

    fn pizza_draft(&mut self, path: &str, value: &Value) -> Option<PizzaDraft> {
        let obj = self.object(path, value)?;
        self.pizza_fields(path, obj)
    }

    fn pizza_fields(&mut self, path: &str, obj: &Map<String, Value>) -> Option<PizzaDraft> {
        let name = self.string(path, obj, "name");
        let toppings = self.string_array(path, obj, "toppings");
        let image_url = if obj.contains_key("imageUrl") || !obj.contains_key("url") {
            self.string(path, obj, "imageUrl")
        } else {
            self.string(path, obj, "url")
        };
        let status = self.boolean(path, obj, "status");
        Some(PizzaDraft {
            name: name?,
            toppings: toppings?,
            image_url: image_url?,
            status: status?,
        })
    }

    fn order(&mut self, path: &str, value: &Value) -> Option<OrderRecord> {
        let obj = self.object(path, value)?;
        let id = self.string(path, obj, "id");
        if let Some(id) = &id {
            self.order_id(&join(path, "id"), id);
        }
        let ordered_pizzas = self.string_array(path, obj, "orderedPizzas");
        let name = self.string(path, obj, "name");
        let zip_code = self.optional_string(path, obj, "zipCode");
        let city = self.optional_string(path, obj, "city");
        let street = self.optional_string(path, obj, "street");
        let house_number = self.optional_string(path, obj, "houseNumber");
        let email = self.optional_string(path, obj, "email");
        let date = self.optional_string(path, obj, "date");
        let phone_number = self.optional_string(path, obj, "phoneNumber");
        let status = self.order_status(path, obj);
        Some(OrderRecord {
            id: id?,
            ordered_pizzas: ordered_pizzas?,
            name: name?,
            zip_code: zip_code?,
            city: city?,
            street: street?,
            house_number: house_number?,
            email: email?,
            date: date?,
            phone_number: phone_number?,
            status: status?,
        })
    }

    fn order_id(&mut self, path: &str, id: &str) {
        if id.is_empty() {
            self.push(path.to_string(), "must not be empty");
        } else if id.contains(['/', '\\']) {
            self.push(path.to_string(), "must not contain path separators");
        } else if id == "." || id == ".." {
            self.push(path.to_string(), "must not be a relative path component");
        }
    }

    fn order_status(&mut self, path: &str, obj: &Map<String, Value>) -> Option<Option<OrderStatus>> {
        match obj.get("status") {
            None | Some(Value::Null) => Some(None),
            Some(Value::String(s)) if s == OrderStatus::New.as_str() => Some(Some(OrderStatus::New)),
            Some(Value::String(s)) if s == OrderStatus::Pending.as_str() => {
                Some(Some(OrderStatus::Pending))
            }
            Some(Value::String(s)) => {
                self.push(
                    join(path, "status"),
                    format!("expected one of \"new\", \"pending\", received \"{s}\""),
                );
                None
            }
            Some(other) => {
                self.push(join(path, "status"), expected("string", other));
                None
            }
        }
    }

    fn field<'a>(&mut self, path: &str, obj: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
        let value = obj.get(key);
        if value.is_none() {
            self.push(join(path, key), "required field missing");
        }
        value
    }

    fn integer(&mut self, path: &str, obj: &Map<String, Value>, key: &str) -> Option<i64> {
        let value = self.field(path, obj, key)?;
        match value.as_i64() {
            Some(v) => Some(v),
            None if value.is_number() => {
                self.push(join(path, key), "expected integer, received number");
                None
            }
            None => {
                self.push(join(path, key), expected("integer", value));
                None
            }
        }
    }

    fn string(&mut self, path: &str, obj: &Map<String, Value>, key: &str) -> Option<String> {
        let value = self.field(path, obj, key)?;
        let out = value.as_str().map(str::to_string);
        if out.is_none() {
            self.push(join(path, key), expected("string", value));
        }
        out
    }

    fn optional_string(
        &mut self,
        path: &str,
        obj: &Map<String, Value>,
        key: &str,
    ) -> Option<Option<String>> {
        match obj.get(key) {
            None | Some(Value::Null) => Some(None),
            Some(Value::String(s)) => Some(Some(s.clone())),
            Some(other) => {
                self.push(join(path, key), expected("string", other));
                None
            }
        }
    }

    fn boolean(&mut self, path: &str, obj: &Map<String, Value>, key: &str) -> Option<bool> {
        let value = self.field(path, obj, key)?;
        let out = value.as_bool();
        if out.is_none() {
            self.push(join(path, key), expected("boolean", value));
        }
        out
    }

    fn string_array(&mut self, path: &str, obj: &Map<String, Value>, key: &str) -> Option<Vec<String>> {
        let value = self.field(path, obj, key)?;
        let field_path = join(path, key);
        let Some(items) = value.as_array() else {
            self.push(field_path, expected("array", value));
            return None;
        };

        let mut out = Vec::with_capacity(items.len());
        let mut ok = true;
        for (idx, item) in items.iter().enumerate() {
            match item.as_str() {
                Some(s) => out.push(s.to_string()),
                None => {
                    ok = false;
                    self.push(format!("{field_path}[{idx}]"), expected("string", item));
                }
            }
        }
        ok.then_some(out)
    }
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

fn expected(want: &str, got: &Value) -> String {
    format!("expected {want}, received {}", type_name(got))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
