//! Row codecs: one explicit encode/decode pair per entity, shared by every
//! read and write path so field order cannot drift between call sites.
//!
//! Layout is a flat row of scalar cells. Optional fields are stored as empty
//! cells; nested structures (line items, set contents) are stored as a single
//! JSON-encoded text cell.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use model::{Customer, LineItem, Order, OrderStatus, PaymentStatus, Product, ProductSet, Shop};
use rust_decimal::Decimal;

use crate::{Row, StoreError, worksheets};

fn corrupt(worksheet: &str, reason: impl Into<String>) -> StoreError {
    StoreError::Corrupt {
        worksheet: worksheet.to_string(),
        reason: reason.into(),
    }
}

fn cell<'a>(row: &'a Row, index: usize, worksheet: &str) -> Result<&'a str, StoreError> {
    row.get(index)
        .map(String::as_str)
        .ok_or_else(|| corrupt(worksheet, format!("missing cell {index}")))
}

fn decimal_cell(row: &Row, index: usize, worksheet: &str) -> Result<Decimal, StoreError> {
    let raw = cell(row, index, worksheet)?;
    raw.parse()
        .map_err(|_| corrupt(worksheet, format!("cell {index} is not a decimal: {raw:?}")))
}

fn bool_cell(row: &Row, index: usize, worksheet: &str) -> Result<bool, StoreError> {
    match cell(row, index, worksheet)? {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(corrupt(worksheet, format!("cell {index} is not a bool: {other:?}"))),
    }
}

fn optional_cell(row: &Row, index: usize, worksheet: &str) -> Result<Option<String>, StoreError> {
    let raw = cell(row, index, worksheet)?;
    Ok(if raw.is_empty() { None } else { Some(raw.to_string()) })
}

pub fn encode_shop(shop: &Shop) -> Row {
    vec![
        shop.id.clone(),
        shop.owner_id.clone(),
        shop.name.clone(),
        shop.slug.clone(),
        shop.description.clone(),
        shop.image_url.clone(),
        shop.contact_email.clone(),
        shop.delivery_fee.to_string(),
        shop.active.to_string(),
    ]
}

pub fn decode_shop(row: &Row) -> Result<Shop, StoreError> {
    let ws = worksheets::SHOPS;
    Ok(Shop {
        id: cell(row, 0, ws)?.to_string(),
        owner_id: cell(row, 1, ws)?.to_string(),
        name: cell(row, 2, ws)?.to_string(),
        slug: cell(row, 3, ws)?.to_string(),
        description: cell(row, 4, ws)?.to_string(),
        image_url: cell(row, 5, ws)?.to_string(),
        contact_email: cell(row, 6, ws)?.to_string(),
        delivery_fee: decimal_cell(row, 7, ws)?,
        active: bool_cell(row, 8, ws)?,
    })
}

pub fn encode_product(product: &Product) -> Row {
    vec![
        product.id.clone(),
        product.shop_id.clone(),
        product.category.clone(),
        product.name.clone(),
        product.name_he.clone(),
        product.description.clone(),
        product.price.to_string(),
        product.image_url.clone(),
    ]
}

pub fn decode_product(row: &Row) -> Result<Product, StoreError> {
    let ws = worksheets::PRODUCTS;
    Ok(Product {
        id: cell(row, 0, ws)?.to_string(),
        shop_id: cell(row, 1, ws)?.to_string(),
        category: cell(row, 2, ws)?.to_string(),
        name: cell(row, 3, ws)?.to_string(),
        name_he: cell(row, 4, ws)?.to_string(),
        description: cell(row, 5, ws)?.to_string(),
        price: decimal_cell(row, 6, ws)?,
        image_url: cell(row, 7, ws)?.to_string(),
    })
}

pub fn encode_set(set: &ProductSet) -> Row {
    vec![
        set.id.clone(),
        set.shop_id.clone(),
        set.title.clone(),
        set.description.clone(),
        serde_json::to_string(&set.contents).unwrap_or_else(|_| "{}".to_string()),
        set.price.to_string(),
        set.image_url.clone(),
    ]
}

pub fn decode_set(row: &Row) -> Result<ProductSet, StoreError> {
    let ws = worksheets::SETS;
    let contents_raw = cell(row, 4, ws)?;
    let contents: BTreeMap<String, u32> = serde_json::from_str(contents_raw)
        .map_err(|e| corrupt(ws, format!("contents cell is not valid JSON: {e}")))?;
    Ok(ProductSet {
        id: cell(row, 0, ws)?.to_string(),
        shop_id: cell(row, 1, ws)?.to_string(),
        title: cell(row, 2, ws)?.to_string(),
        description: cell(row, 3, ws)?.to_string(),
        contents,
        price: decimal_cell(row, 5, ws)?,
        image_url: cell(row, 6, ws)?.to_string(),
    })
}

pub fn encode_customer(customer: &Customer) -> Row {
    vec![
        customer.id.clone(),
        customer.shop_id.clone(),
        customer.full_name.clone(),
        customer.phone.clone(),
        customer.email.clone(),
        customer.address.clone(),
    ]
}

pub fn decode_customer(row: &Row) -> Result<Customer, StoreError> {
    let ws = worksheets::CUSTOMERS;
    Ok(Customer {
        id: cell(row, 0, ws)?.to_string(),
        shop_id: cell(row, 1, ws)?.to_string(),
        full_name: cell(row, 2, ws)?.to_string(),
        phone: cell(row, 3, ws)?.to_string(),
        email: cell(row, 4, ws)?.to_string(),
        address: cell(row, 5, ws)?.to_string(),
    })
}

pub fn encode_order(order: &Order) -> Row {
    vec![
        order.id.clone(),
        order.shop_id.clone(),
        order.customer_id.clone(),
        serde_json::to_string(&order.items).unwrap_or_else(|_| "{}".to_string()),
        order.total_price.to_string(),
        order.created_at.to_rfc3339(),
        order.status.as_str().to_string(),
        order.payment_status.as_str().to_string(),
        order.delivery_required.to_string(),
        order.notes.clone().unwrap_or_default(),
        order.set_id.clone().unwrap_or_default(),
        order.revision.to_string(),
    ]
}

pub fn decode_order(row: &Row) -> Result<Order, StoreError> {
    let ws = worksheets::ORDERS;

    let items_raw = cell(row, 3, ws)?;
    let items: BTreeMap<String, LineItem> = serde_json::from_str(items_raw)
        .map_err(|e| corrupt(ws, format!("items cell is not valid JSON: {e}")))?;

    let created_raw = cell(row, 5, ws)?;
    let created_at = DateTime::parse_from_rfc3339(created_raw)
        .map_err(|e| corrupt(ws, format!("created_at cell is not RFC 3339: {e}")))?
        .with_timezone(&Utc);

    let status_raw = cell(row, 6, ws)?;
    let status = OrderStatus::parse(status_raw)
        .ok_or_else(|| corrupt(ws, format!("unknown status: {status_raw:?}")))?;

    let payment_raw = cell(row, 7, ws)?;
    let payment_status = PaymentStatus::parse(payment_raw)
        .ok_or_else(|| corrupt(ws, format!("unknown payment status: {payment_raw:?}")))?;

    let revision_raw = cell(row, 11, ws)?;
    let revision: u64 = revision_raw
        .parse()
        .map_err(|_| corrupt(ws, format!("revision cell is not an integer: {revision_raw:?}")))?;

    Ok(Order {
        id: cell(row, 0, ws)?.to_string(),
        shop_id: cell(row, 1, ws)?.to_string(),
        customer_id: cell(row, 2, ws)?.to_string(),
        items,
        total_price: decimal_cell(row, 4, ws)?,
        created_at,
        status,
        payment_status,
        delivery_required: bool_cell(row, 8, ws)?,
        notes: optional_cell(row, 9, ws)?,
        set_id: optional_cell(row, 10, ws)?,
        revision,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_order_codec_preserves_optionals() {
        let mut items = BTreeMap::new();
        items.insert(
            "PROD-1".to_string(),
            LineItem {
                quantity: 2,
                size: Some("L".to_string()),
                color: None,
            },
        );
        let order = Order {
            id: "ORD-1-a".to_string(),
            shop_id: "SHOP-1".to_string(),
            customer_id: "CUST-1-b".to_string(),
            items,
            total_price: "49.90".parse().unwrap(),
            created_at: Utc.with_ymd_and_hms(2025, 9, 14, 10, 0, 0).unwrap(),
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Unpaid,
            delivery_required: true,
            notes: Some("leave at the door".to_string()),
            set_id: None,
            revision: 3,
        };

        let decoded = decode_order(&encode_order(&order)).unwrap();
        assert_eq!(decoded, order);
    }

    #[test]
    fn test_order_decode_rejects_unknown_status() {
        let order = Order {
            id: "ORD-1-a".to_string(),
            shop_id: "SHOP-1".to_string(),
            customer_id: "CUST-1-b".to_string(),
            items: BTreeMap::new(),
            total_price: Decimal::ZERO,
            created_at: Utc::now(),
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Unpaid,
            delivery_required: false,
            notes: None,
            set_id: None,
            revision: 0,
        };
        let mut row = encode_order(&order);
        row[6] = "shipped".to_string();
        let err = decode_order(&row).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[test]
    fn test_set_codec_round_trip() {
        let mut contents = BTreeMap::new();
        contents.insert("PROD-lulav".to_string(), 1);
        contents.insert("PROD-hadas".to_string(), 3);
        let set = ProductSet {
            id: "SET-1".to_string(),
            shop_id: "SHOP-1".to_string(),
            title: "Mehudar Kit".to_string(),
            description: "Complete kit".to_string(),
            contents,
            price: Decimal::from(240),
            image_url: String::new(),
        };
        assert_eq!(decode_set(&encode_set(&set)).unwrap(), set);
    }
}
