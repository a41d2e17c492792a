use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    database::Database,
    error::{AppError, FieldError},
    middleware::CurrentUser,
    models::{
        inventory::{CATEGORIES, STATUSES},
        CreateItemRequest, InventoryItemResponse, InventoryItemRow, ListQuery, StockAdjustRequest,
        StockOperation, UpdateItemRequest,
    },
};

// Every read goes through this projection so creator/modifier come back populated.
const ITEM_SELECT: &str = r#"
SELECT i.id, i.name, i.description, i.category, i.sku, i.quantity, i.min_stock_level,
       i.price, i.supplier_name, i.supplier_email, i.supplier_phone,
       i.warehouse, i.aisle, i.shelf, i.status, i.added_by, i.last_updated_by,
       i.created_at, i.updated_at,
       au.username AS added_by_username, au.email AS added_by_email,
       lu.username AS updated_by_username, lu.email AS updated_by_email
FROM inventory_items i
LEFT JOIN users au ON au.id = i.added_by
LEFT JOIN users lu ON lu.id = i.last_updated_by
"#;

const LIST_FILTER: &str = r#"
WHERE ($1::text IS NULL OR i.category = $1)
  AND ($2::text IS NULL OR i.status = $2)
  AND ($3::text IS NULL OR i.name ILIKE $3 OR i.sku ILIKE $3 OR i.description ILIKE $3)
"#;

const STOCK_CAS_ATTEMPTS: u32 = 5;

fn parse_item_id(id: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(id).map_err(|_| AppError::BadRequest("Invalid inventory item ID".to_string()))
}

// Defaults mirror the client: page 1, ten items per page.
fn parse_pagination(
    page: Option<&str>,
    limit: Option<&str>,
    errors: &mut Vec<FieldError>,
) -> (i64, i64) {
    let page = match page {
        None => 1,
        Some(raw) => match raw.parse::<i64>() {
            Ok(page) if page >= 1 => page,
            _ => {
                errors.push(FieldError::new("page", "Page must be a positive integer"));
                1
            }
        },
    };
    let limit = match limit {
        None => 10,
        Some(raw) => match raw.parse::<i64>() {
            Ok(limit) if (1..=100).contains(&limit) => limit,
            _ => {
                errors.push(FieldError::new("limit", "Limit must be between 1 and 100"));
                10
            }
        },
    };
    (page, limit)
}

async fn fetch_item(db: &Database, id: Uuid) -> Result<InventoryItemResponse, AppError> {
    let row = sqlx::query_as::<_, InventoryItemRow>(&format!("{} WHERE i.id = $1", ITEM_SELECT))
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Inventory item not found".to_string()))?;

    Ok(row.into())
}

pub async fn list_items(
    State(db): State<Database>,
    _current_user: CurrentUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Value>, AppError> {
    let mut errors = Vec::new();

    let (page, limit) = parse_pagination(query.page.as_deref(), query.limit.as_deref(), &mut errors);
    if let Some(category) = query.category.as_deref() {
        if !CATEGORIES.contains(&category) {
            errors.push(FieldError::new("category", "Invalid category"));
        }
    }
    if let Some(status) = query.status.as_deref() {
        if !STATUSES.contains(&status) {
            errors.push(FieldError::new("status", "Invalid status"));
        }
    }
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let search_pattern = query
        .search
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(|s| format!("%{}%", s.trim()));
    let offset = (page - 1) * limit;

    let sql = format!(
        "{} {} ORDER BY i.created_at DESC LIMIT $4 OFFSET $5",
        ITEM_SELECT, LIST_FILTER
    );
    let items: Vec<InventoryItemResponse> = sqlx::query_as::<_, InventoryItemRow>(&sql)
        .bind(&query.category)
        .bind(&query.status)
        .bind(&search_pattern)
        .bind(limit)
        .bind(offset)
        .fetch_all(&db)
        .await?
        .into_iter()
        .map(InventoryItemResponse::from)
        .collect();

    let count_sql = format!("SELECT COUNT(*) FROM inventory_items i {}", LIST_FILTER);
    let total: i64 = sqlx::query_scalar(&count_sql)
        .bind(&query.category)
        .bind(&query.status)
        .bind(&search_pattern)
        .fetch_one(&db)
        .await?;

    let total_pages = (total + limit - 1) / limit;

    Ok(Json(json!({
        "status": "success",
        "data": {
            "inventoryItems": items,
            "pagination": {
                "currentPage": page,
                "totalPages": total_pages,
                "totalItems": total,
                "itemsPerPage": limit,
            },
        },
    })))
}

pub async fn get_item(
    State(db): State<Database>,
    _current_user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let item_id = parse_item_id(&id)?;
    let item = fetch_item(&db, item_id).await?;

    Ok(Json(json!({
        "status": "success",
        "data": { "inventoryItem": item },
    })))
}

pub async fn create_item(
    State(db): State<Database>,
    current_user: CurrentUser,
    Json(body): Json<CreateItemRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let body = body.normalized();
    let errors = body.validate();
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    // validate() guarantees the required fields are present
    let (supplier_name, supplier_email, supplier_phone) = match &body.supplier {
        Some(s) => (s.name.clone(), s.email.clone(), s.phone.clone()),
        None => (None, None, None),
    };
    let (warehouse, aisle, shelf) = match &body.location {
        Some(l) => (l.warehouse.clone(), l.aisle.clone(), l.shelf.clone()),
        None => (None, None, None),
    };

    let item_id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO inventory_items (
            name, description, category, sku, quantity, min_stock_level, price,
            supplier_name, supplier_email, supplier_phone, warehouse, aisle, shelf,
            status, added_by, last_updated_by
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
        RETURNING id
        "#,
    )
    .bind(body.name.as_deref().unwrap_or_default())
    .bind(&body.description)
    .bind(body.category.as_deref().unwrap_or_default())
    .bind(body.sku.as_deref().unwrap_or_default())
    .bind(body.quantity.unwrap_or(0) as i32)
    .bind(body.min_stock_level.unwrap_or(0) as i32)
    .bind(body.price.unwrap_or_default())
    .bind(&supplier_name)
    .bind(&supplier_email)
    .bind(&supplier_phone)
    .bind(&warehouse)
    .bind(&aisle)
    .bind(&shelf)
    .bind(body.status.as_deref().unwrap_or("active"))
    .bind(current_user.id)
    .bind(current_user.id)
    .fetch_one(&db)
    .await
    .map_err(|e| AppError::unique(e, "SKU already exists"))?;

    let item = fetch_item(&db, item_id).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "status": "success",
            "message": "Inventory item created successfully",
            "data": { "inventoryItem": item },
        })),
    ))
}

pub async fn update_item(
    State(db): State<Database>,
    current_user: CurrentUser,
    Path(id): Path<String>,
    Json(body): Json<UpdateItemRequest>,
) -> Result<Json<Value>, AppError> {
    let body = body.normalized();
    let errors = body.validate();
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }
    let item_id = parse_item_id(&id)?;

    let existing =
        sqlx::query_as::<_, InventoryItemRow>(&format!("{} WHERE i.id = $1", ITEM_SELECT))
            .bind(item_id)
            .fetch_optional(&db)
            .await?
            .ok_or_else(|| AppError::NotFound("Inventory item not found".to_string()))?;

    if !current_user.can_modify(existing.added_by) {
        return Err(AppError::Forbidden(
            "Access denied. You can only edit items you added.".to_string(),
        ));
    }

    // Absent fields keep their stored values; a present supplier/location object
    // replaces that substructure wholesale.
    let name = body.name.unwrap_or(existing.name);
    let description = body.description.or(existing.description);
    let category = body.category.unwrap_or(existing.category);
    let sku = body.sku.unwrap_or(existing.sku);
    let quantity = body.quantity.map(|q| q as i32).unwrap_or(existing.quantity);
    let min_stock_level = body
        .min_stock_level
        .map(|l| l as i32)
        .unwrap_or(existing.min_stock_level);
    let price = body.price.unwrap_or(existing.price);
    let status = body.status.unwrap_or(existing.status);
    let (supplier_name, supplier_email, supplier_phone) = match body.supplier {
        Some(s) => (s.name, s.email, s.phone),
        None => (
            existing.supplier_name,
            existing.supplier_email,
            existing.supplier_phone,
        ),
    };
    let (warehouse, aisle, shelf) = match body.location {
        Some(l) => (l.warehouse, l.aisle, l.shelf),
        None => (existing.warehouse, existing.aisle, existing.shelf),
    };

    sqlx::query(
        r#"
        UPDATE inventory_items SET
            name = $2, description = $3, category = $4, sku = $5, quantity = $6,
            min_stock_level = $7, price = $8, supplier_name = $9, supplier_email = $10,
            supplier_phone = $11, warehouse = $12, aisle = $13, shelf = $14,
            status = $15, last_updated_by = $16, updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(item_id)
    .bind(&name)
    .bind(&description)
    .bind(&category)
    .bind(&sku)
    .bind(quantity)
    .bind(min_stock_level)
    .bind(price)
    .bind(&supplier_name)
    .bind(&supplier_email)
    .bind(&supplier_phone)
    .bind(&warehouse)
    .bind(&aisle)
    .bind(&shelf)
    .bind(&status)
    .bind(current_user.id)
    .execute(&db)
    .await
    .map_err(|e| AppError::unique(e, "SKU already exists"))?;

    let item = fetch_item(&db, item_id).await?;

    Ok(Json(json!({
        "status": "success",
        "message": "Inventory item updated successfully",
        "data": { "inventoryItem": item },
    })))
}

pub async fn delete_item(
    State(db): State<Database>,
    current_user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let item_id = parse_item_id(&id)?;

    let added_by: Uuid =
        sqlx::query_scalar("SELECT added_by FROM inventory_items WHERE id = $1")
            .bind(item_id)
            .fetch_optional(&db)
            .await?
            .ok_or_else(|| AppError::NotFound("Inventory item not found".to_string()))?;

    if !current_user.can_modify(added_by) {
        return Err(AppError::Forbidden(
            "Access denied. You can only delete items you added or if you are an admin."
                .to_string(),
        ));
    }

    sqlx::query("DELETE FROM inventory_items WHERE id = $1")
        .bind(item_id)
        .execute(&db)
        .await?;

    Ok(Json(json!({
        "status": "success",
        "message": "Inventory item deleted successfully",
    })))
}

pub async fn low_stock_items(
    State(db): State<Database>,
    _current_user: CurrentUser,
) -> Result<Json<Value>, AppError> {
    let sql = format!(
        "{} WHERE i.quantity <= i.min_stock_level ORDER BY i.quantity ASC",
        ITEM_SELECT
    );
    let items: Vec<InventoryItemResponse> = sqlx::query_as::<_, InventoryItemRow>(&sql)
        .fetch_all(&db)
        .await?
        .into_iter()
        .map(InventoryItemResponse::from)
        .collect();

    Ok(Json(json!({
        "status": "success",
        "data": {
            "count": items.len(),
            "lowStockItems": items,
        },
    })))
}

pub async fn adjust_stock(
    State(db): State<Database>,
    current_user: CurrentUser,
    Path(id): Path<String>,
    Json(body): Json<StockAdjustRequest>,
) -> Result<Json<Value>, AppError> {
    let mut errors = Vec::new();
    let amount = match body.quantity {
        Some(quantity) if (0..=i32::MAX as i64).contains(&quantity) => quantity as i32,
        _ => {
            errors.push(FieldError::new(
                "quantity",
                "Quantity must be a non-negative integer",
            ));
            0
        }
    };
    let operation = match body.operation.as_deref() {
        None => StockOperation::default(),
        Some(raw) => match StockOperation::parse(raw) {
            Some(op) => op,
            None => {
                errors.push(FieldError::new(
                    "operation",
                    "Operation must be set, add, or subtract",
                ));
                StockOperation::default()
            }
        },
    };
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }
    let item_id = parse_item_id(&id)?;

    // Compare-and-swap on the quantity column so concurrent adjustments cannot
    // lose each other's writes. A failed swap means another request landed in
    // between; re-read and retry.
    for _ in 0..STOCK_CAS_ATTEMPTS {
        let current_qty: i32 =
            sqlx::query_scalar("SELECT quantity FROM inventory_items WHERE id = $1")
                .bind(item_id)
                .fetch_optional(&db)
                .await?
                .ok_or_else(|| AppError::NotFound("Inventory item not found".to_string()))?;

        let new_qty = operation.apply(current_qty, amount);

        let result = sqlx::query(
            r#"
            UPDATE inventory_items
            SET quantity = $3, last_updated_by = $4, updated_at = NOW()
            WHERE id = $1 AND quantity = $2
            "#,
        )
        .bind(item_id)
        .bind(current_qty)
        .bind(new_qty)
        .bind(current_user.id)
        .execute(&db)
        .await?;

        if result.rows_affected() == 1 {
            let item = fetch_item(&db, item_id).await?;
            return Ok(Json(json!({
                "status": "success",
                "message": "Stock quantity updated successfully",
                "data": { "inventoryItem": item },
            })));
        }

        log::warn!("Stock adjustment lost a race on item {}, retrying", item_id);
    }

    Err(AppError::Conflict(
        "Stock update conflicted with concurrent adjustments, please retry".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_item_ids_are_a_bad_request() {
        assert!(parse_item_id("not-a-uuid").is_err());
        assert!(parse_item_id("123").is_err());
        assert!(parse_item_id("00000000-0000-0000-0000-000000000000").is_ok());
    }

    #[test]
    fn pagination_defaults_apply_when_absent() {
        let mut errors = Vec::new();
        assert_eq!(parse_pagination(None, None, &mut errors), (1, 10));
        assert!(errors.is_empty());
    }

    #[test]
    fn pagination_parses_valid_values() {
        let mut errors = Vec::new();
        assert_eq!(parse_pagination(Some("3"), Some("100"), &mut errors), (3, 100));
        assert!(errors.is_empty());
    }

    #[test]
    fn pagination_rejects_out_of_range_values() {
        let mut errors = Vec::new();
        parse_pagination(Some("0"), Some("101"), &mut errors);
        assert!(errors.iter().any(|e| e.field == "page"));
        assert!(errors.iter().any(|e| e.field == "limit"));
    }

    #[test]
    fn pagination_rejects_non_numeric_values() {
        let mut errors = Vec::new();
        parse_pagination(Some("first"), Some("lots"), &mut errors);
        assert_eq!(errors.len(), 2);
    }
}
