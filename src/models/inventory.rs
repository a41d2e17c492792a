use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::FieldError;
use crate::models::is_valid_email;

pub const CATEGORIES: [&str; 7] = [
    "Electronics",
    "Clothing",
    "Food",
    "Books",
    "Furniture",
    "Sports",
    "Other",
];

pub const STATUSES: [&str; 3] = ["active", "inactive", "discontinued"];

// Item row joined with the users who created and last touched it.
#[derive(Debug, FromRow)]
pub struct InventoryItemRow {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub sku: String,
    pub quantity: i32,
    pub min_stock_level: i32,
    pub price: Decimal,
    pub supplier_name: Option<String>,
    pub supplier_email: Option<String>,
    pub supplier_phone: Option<String>,
    pub warehouse: Option<String>,
    pub aisle: Option<String>,
    pub shelf: Option<String>,
    pub status: String,
    pub added_by: Uuid,
    pub last_updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub added_by_username: Option<String>,
    pub added_by_email: Option<String>,
    pub updated_by_username: Option<String>,
    pub updated_by_email: Option<String>,
}

// Quantity 0 is out of stock even when min_stock_level is also 0.
pub fn stock_status(quantity: i32, min_stock_level: i32) -> &'static str {
    if quantity == 0 {
        "out_of_stock"
    } else if quantity <= min_stock_level {
        "low_stock"
    } else {
        "in_stock"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StockOperation {
    #[default]
    Set,
    Add,
    Subtract,
}

impl StockOperation {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "set" => Some(StockOperation::Set),
            "add" => Some(StockOperation::Add),
            "subtract" => Some(StockOperation::Subtract),
            _ => None,
        }
    }

    // Subtracting past zero clamps instead of failing.
    pub fn apply(self, current: i32, amount: i32) -> i32 {
        match self {
            StockOperation::Set => amount,
            StockOperation::Add => current.saturating_add(amount),
            StockOperation::Subtract => current.saturating_sub(amount).max(0),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SupplierInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocationInput {
    pub warehouse: Option<String>,
    pub aisle: Option<String>,
    pub shelf: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateItemRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub sku: Option<String>,
    pub quantity: Option<i64>,
    pub min_stock_level: Option<i64>,
    pub price: Option<Decimal>,
    pub supplier: Option<SupplierInput>,
    pub location: Option<LocationInput>,
    pub status: Option<String>,
}

impl CreateItemRequest {
    pub fn normalized(mut self) -> Self {
        normalize_fields(
            &mut self.name,
            &mut self.description,
            &mut self.sku,
            &mut self.supplier,
        );
        self
    }

    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();

        match &self.name {
            Some(name) => validate_name(name, &mut errors),
            None => errors.push(FieldError::new("name", "Product name is required")),
        }
        if let Some(description) = &self.description {
            validate_description(description, &mut errors);
        }
        match &self.category {
            Some(category) => validate_category(category, &mut errors),
            None => errors.push(FieldError::new("category", "Category is required")),
        }
        match &self.sku {
            Some(sku) => validate_sku(sku, &mut errors),
            None => errors.push(FieldError::new("sku", "SKU is required")),
        }
        match self.quantity {
            Some(quantity) => validate_quantity_field("quantity", quantity, &mut errors),
            None => errors.push(FieldError::new(
                "quantity",
                "Quantity must be a non-negative integer",
            )),
        }
        match self.min_stock_level {
            Some(level) => validate_quantity_field("minStockLevel", level, &mut errors),
            None => errors.push(FieldError::new(
                "minStockLevel",
                "Minimum stock level must be a non-negative integer",
            )),
        }
        match self.price {
            Some(price) => validate_price(price, &mut errors),
            None => errors.push(FieldError::new(
                "price",
                "Price must be a non-negative number",
            )),
        }
        if let Some(supplier) = &self.supplier {
            validate_supplier(supplier, &mut errors);
        }
        if let Some(location) = &self.location {
            validate_location(location, &mut errors);
        }
        if let Some(status) = &self.status {
            validate_status(status, &mut errors);
        }

        errors
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateItemRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub sku: Option<String>,
    pub quantity: Option<i64>,
    pub min_stock_level: Option<i64>,
    pub price: Option<Decimal>,
    pub supplier: Option<SupplierInput>,
    pub location: Option<LocationInput>,
    pub status: Option<String>,
}

impl UpdateItemRequest {
    pub fn normalized(mut self) -> Self {
        normalize_fields(
            &mut self.name,
            &mut self.description,
            &mut self.sku,
            &mut self.supplier,
        );
        self
    }

    // Only the fields present in the body are validated.
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();

        if let Some(name) = &self.name {
            validate_name(name, &mut errors);
        }
        if let Some(description) = &self.description {
            validate_description(description, &mut errors);
        }
        if let Some(category) = &self.category {
            validate_category(category, &mut errors);
        }
        if let Some(sku) = &self.sku {
            validate_sku(sku, &mut errors);
        }
        if let Some(quantity) = self.quantity {
            validate_quantity_field("quantity", quantity, &mut errors);
        }
        if let Some(level) = self.min_stock_level {
            validate_quantity_field("minStockLevel", level, &mut errors);
        }
        if let Some(price) = self.price {
            validate_price(price, &mut errors);
        }
        if let Some(supplier) = &self.supplier {
            validate_supplier(supplier, &mut errors);
        }
        if let Some(location) = &self.location {
            validate_location(location, &mut errors);
        }
        if let Some(status) = &self.status {
            validate_status(status, &mut errors);
        }

        errors
    }
}

#[derive(Debug, Deserialize)]
pub struct StockAdjustRequest {
    pub quantity: Option<i64>,
    pub operation: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub category: Option<String>,
    pub status: Option<String>,
    pub search: Option<String>,
}

fn normalize_fields(
    name: &mut Option<String>,
    description: &mut Option<String>,
    sku: &mut Option<String>,
    supplier: &mut Option<SupplierInput>,
) {
    if let Some(name) = name {
        *name = name.trim().to_string();
    }
    if let Some(description) = description {
        *description = description.trim().to_string();
    }
    if let Some(sku) = sku {
        *sku = sku.trim().to_uppercase();
    }
    if let Some(supplier) = supplier {
        if let Some(email) = &mut supplier.email {
            *email = email.trim().to_lowercase();
        }
    }
}

fn validate_name(name: &str, errors: &mut Vec<FieldError>) {
    if name.is_empty() {
        errors.push(FieldError::new("name", "Product name is required"));
    } else if name.chars().count() > 100 {
        errors.push(FieldError::new(
            "name",
            "Product name cannot exceed 100 characters",
        ));
    }
}

fn validate_description(description: &str, errors: &mut Vec<FieldError>) {
    if description.chars().count() > 500 {
        errors.push(FieldError::new(
            "description",
            "Description cannot exceed 500 characters",
        ));
    }
}

fn validate_category(category: &str, errors: &mut Vec<FieldError>) {
    if !CATEGORIES.contains(&category) {
        errors.push(FieldError::new("category", "Invalid category"));
    }
}

fn validate_status(status: &str, errors: &mut Vec<FieldError>) {
    if !STATUSES.contains(&status) {
        errors.push(FieldError::new("status", "Invalid status"));
    }
}

fn validate_sku(sku: &str, errors: &mut Vec<FieldError>) {
    if sku.is_empty() {
        errors.push(FieldError::new("sku", "SKU is required"));
    } else if !sku
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-')
    {
        errors.push(FieldError::new(
            "sku",
            "SKU must contain only uppercase letters, numbers, and hyphens",
        ));
    }
}

fn validate_quantity_field(field: &str, value: i64, errors: &mut Vec<FieldError>) {
    if !(0..=i32::MAX as i64).contains(&value) {
        let message = if field == "minStockLevel" {
            "Minimum stock level must be a non-negative integer"
        } else {
            "Quantity must be a non-negative integer"
        };
        errors.push(FieldError::new(field, message));
    }
}

fn validate_price(price: Decimal, errors: &mut Vec<FieldError>) {
    if price < Decimal::ZERO {
        errors.push(FieldError::new(
            "price",
            "Price must be a non-negative number",
        ));
    }
}

fn validate_supplier(supplier: &SupplierInput, errors: &mut Vec<FieldError>) {
    if let Some(name) = &supplier.name {
        if name.chars().count() > 100 {
            errors.push(FieldError::new(
                "supplier.name",
                "Supplier name cannot exceed 100 characters",
            ));
        }
    }
    if let Some(email) = &supplier.email {
        if !email.is_empty() && !is_valid_email(email) {
            errors.push(FieldError::new(
                "supplier.email",
                "Please enter a valid supplier email",
            ));
        }
    }
    if let Some(phone) = &supplier.phone {
        if !phone.is_empty()
            && !phone
                .chars()
                .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '-' | '+' | '(' | ')'))
        {
            errors.push(FieldError::new(
                "supplier.phone",
                "Please enter a valid phone number",
            ));
        }
    }
}

fn validate_location(location: &LocationInput, errors: &mut Vec<FieldError>) {
    if let Some(warehouse) = &location.warehouse {
        if warehouse.chars().count() > 50 {
            errors.push(FieldError::new(
                "location.warehouse",
                "Warehouse name cannot exceed 50 characters",
            ));
        }
    }
    if let Some(aisle) = &location.aisle {
        if aisle.chars().count() > 20 {
            errors.push(FieldError::new(
                "location.aisle",
                "Aisle cannot exceed 20 characters",
            ));
        }
    }
    if let Some(shelf) = &location.shelf {
        if shelf.chars().count() > 20 {
            errors.push(FieldError::new(
                "location.shelf",
                "Shelf cannot exceed 20 characters",
            ));
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRef {
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplierInfo {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationInfo {
    pub warehouse: Option<String>,
    pub aisle: Option<String>,
    pub shelf: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItemResponse {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub sku: String,
    pub quantity: i32,
    pub min_stock_level: i32,
    pub price: Decimal,
    pub supplier: SupplierInfo,
    pub location: LocationInfo,
    pub status: String,
    pub stock_status: &'static str,
    pub added_by: Option<UserRef>,
    pub last_updated_by: Option<UserRef>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<InventoryItemRow> for InventoryItemResponse {
    fn from(row: InventoryItemRow) -> Self {
        let added_by = match (row.added_by_username, row.added_by_email) {
            (Some(username), Some(email)) => Some(UserRef {
                id: row.added_by,
                username,
                email,
            }),
            _ => None,
        };
        let last_updated_by = match (
            row.last_updated_by,
            row.updated_by_username,
            row.updated_by_email,
        ) {
            (Some(id), Some(username), Some(email)) => Some(UserRef {
                id,
                username,
                email,
            }),
            _ => None,
        };

        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            category: row.category,
            sku: row.sku,
            quantity: row.quantity,
            min_stock_level: row.min_stock_level,
            price: row.price,
            supplier: SupplierInfo {
                name: row.supplier_name,
                email: row.supplier_email,
                phone: row.supplier_phone,
            },
            location: LocationInfo {
                warehouse: row.warehouse,
                aisle: row.aisle,
                shelf: row.shelf,
            },
            status: row.status,
            stock_status: stock_status(row.quantity, row.min_stock_level),
            added_by,
            last_updated_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn set_replaces_the_current_quantity() {
        assert_eq!(StockOperation::Set.apply(10, 20), 20);
        assert_eq!(StockOperation::Set.apply(10, 0), 0);
    }

    #[test]
    fn add_increments_the_current_quantity() {
        assert_eq!(StockOperation::Add.apply(10, 5), 15);
        assert_eq!(StockOperation::Add.apply(0, 0), 0);
    }

    #[test]
    fn subtract_clamps_at_zero() {
        assert_eq!(StockOperation::Subtract.apply(10, 15), 0);
        assert_eq!(StockOperation::Subtract.apply(10, 10), 0);
        assert_eq!(StockOperation::Subtract.apply(10, 3), 7);
    }

    #[test]
    fn add_saturates_instead_of_overflowing() {
        assert_eq!(StockOperation::Add.apply(i32::MAX, 1), i32::MAX);
    }

    #[test]
    fn parse_accepts_the_three_operations_only() {
        assert_eq!(StockOperation::parse("set"), Some(StockOperation::Set));
        assert_eq!(StockOperation::parse("add"), Some(StockOperation::Add));
        assert_eq!(
            StockOperation::parse("subtract"),
            Some(StockOperation::Subtract)
        );
        assert_eq!(StockOperation::parse("SET"), None);
        assert_eq!(StockOperation::parse("decrement"), None);
    }

    #[test]
    fn default_operation_is_set() {
        assert_eq!(StockOperation::default(), StockOperation::Set);
    }

    proptest! {
        #[test]
        fn add_yields_current_plus_amount(current in 0..1_000_000i32, amount in 0..1_000_000i32) {
            prop_assert_eq!(StockOperation::Add.apply(current, amount), current + amount);
        }

        #[test]
        fn subtract_never_goes_negative(current in 0..1_000_000i32, amount in 0..1_000_000i32) {
            let result = StockOperation::Subtract.apply(current, amount);
            prop_assert!(result >= 0);
            prop_assert_eq!(result, (current - amount).max(0));
        }

        #[test]
        fn set_ignores_the_current_quantity(current in 0..1_000_000i32, amount in 0..1_000_000i32) {
            prop_assert_eq!(StockOperation::Set.apply(current, amount), amount);
        }
    }

    #[test]
    fn stock_status_boundaries() {
        assert_eq!(stock_status(0, 10), "out_of_stock");
        assert_eq!(stock_status(0, 0), "out_of_stock");
        assert_eq!(stock_status(1, 10), "low_stock");
        assert_eq!(stock_status(10, 10), "low_stock");
        assert_eq!(stock_status(11, 10), "in_stock");
        assert_eq!(stock_status(1, 0), "in_stock");
    }

    fn minimal_create() -> CreateItemRequest {
        CreateItemRequest {
            name: Some("USB-C Cable".to_string()),
            description: None,
            category: Some("Electronics".to_string()),
            sku: Some("usb-c-001".to_string()),
            quantity: Some(25),
            min_stock_level: Some(5),
            price: Some(Decimal::new(999, 2)),
            supplier: None,
            location: None,
            status: None,
        }
    }

    #[test]
    fn create_request_normalizes_and_passes() {
        let body = minimal_create().normalized();
        assert_eq!(body.sku.as_deref(), Some("USB-C-001"));
        assert!(body.validate().is_empty());
    }

    #[test]
    fn create_request_requires_the_core_fields() {
        let body = CreateItemRequest {
            name: None,
            description: None,
            category: None,
            sku: None,
            quantity: None,
            min_stock_level: None,
            price: None,
            supplier: None,
            location: None,
            status: None,
        };
        let errors = body.validate();
        for field in ["name", "category", "sku", "quantity", "minStockLevel", "price"] {
            assert!(
                errors.iter().any(|e| e.field == field),
                "missing error for {}",
                field
            );
        }
    }

    #[test]
    fn negative_quantity_is_rejected() {
        let mut body = minimal_create();
        body.quantity = Some(-1);
        let errors = body.validate();
        assert!(errors.iter().any(|e| e.field == "quantity"));
    }

    #[test]
    fn sku_charset_is_enforced_after_uppercasing() {
        let mut body = minimal_create();
        body.sku = Some("usb c_001".to_string());
        let body = body.normalized();
        let errors = body.validate();
        assert!(errors.iter().any(|e| e.field == "sku"));
    }

    #[test]
    fn unknown_category_is_rejected() {
        let mut body = minimal_create();
        body.category = Some("Gadgets".to_string());
        let errors = body.validate();
        assert!(errors.iter().any(|e| e.field == "category"));
    }

    #[test]
    fn update_request_allows_partial_bodies() {
        let body = UpdateItemRequest {
            name: None,
            description: None,
            category: None,
            sku: None,
            quantity: Some(42),
            min_stock_level: None,
            price: None,
            supplier: None,
            location: None,
            status: None,
        };
        assert!(body.validate().is_empty());
    }

    #[test]
    fn update_request_still_validates_present_fields() {
        let body = UpdateItemRequest {
            name: Some("".to_string()),
            description: None,
            category: None,
            sku: None,
            quantity: Some(-5),
            min_stock_level: None,
            price: Some(Decimal::new(-100, 2)),
            supplier: None,
            location: None,
            status: Some("archived".to_string()),
        };
        let errors = body.validate();
        for field in ["name", "quantity", "price", "status"] {
            assert!(
                errors.iter().any(|e| e.field == field),
                "missing error for {}",
                field
            );
        }
    }

    #[test]
    fn supplier_contact_details_are_validated() {
        let mut body = minimal_create();
        body.supplier = Some(SupplierInput {
            name: Some("a".repeat(101)),
            email: Some("not-an-email".to_string()),
            phone: Some("call me maybe".to_string()),
        });
        let errors = body.validate();
        for field in ["supplier.name", "supplier.email", "supplier.phone"] {
            assert!(
                errors.iter().any(|e| e.field == field),
                "missing error for {}",
                field
            );
        }
    }
}
