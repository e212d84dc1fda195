//! Demo catalog seeding for local development runs against an empty
//! backing store. Gated by the `seed_demo` config flag.

use anyhow::Result;
use model::{Product, ProductSet, Shop};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use store::{SheetsApi, rows, worksheets};

pub async fn seed_demo_shop(sheets: &dyn SheetsApi, owner_id: &str) -> Result<()> {
    let shop = Shop {
        id: "SHOP-demo".to_string(),
        owner_id: owner_id.to_string(),
        name: "Minim Express".to_string(),
        slug: "minim-express".to_string(),
        description: "Four Species kits and individual items".to_string(),
        image_url: String::new(),
        contact_email: "seller@example.com".to_string(),
        delivery_fee: Decimal::from(20),
        active: true,
    };
    sheets
        .append_row(worksheets::SHOPS, rows::encode_shop(&shop))
        .await?;

    let products = [
        ("PROD-lulav", "Lulav", "Deri Lulav", "לולב דרי", 45),
        ("PROD-etrog", "Etrog", "Yanover Etrog", "אתרוג ינובר", 120),
        ("PROD-hadas", "Hadas", "Meshulash Hadas", "הדס משולש", 25),
        ("PROD-arava", "Arava", "Arava Bundle", "ערבה", 10),
    ];
    for (id, category, name, name_he, price) in products {
        let product = Product {
            id: id.to_string(),
            shop_id: shop.id.clone(),
            category: category.to_string(),
            name: name.to_string(),
            name_he: name_he.to_string(),
            description: String::new(),
            price: Decimal::from(price),
            image_url: String::new(),
        };
        sheets
            .append_row(worksheets::PRODUCTS, rows::encode_product(&product))
            .await?;
    }

    let mut contents = BTreeMap::new();
    contents.insert("PROD-lulav".to_string(), 1);
    contents.insert("PROD-etrog".to_string(), 1);
    contents.insert("PROD-hadas".to_string(), 3);
    contents.insert("PROD-arava".to_string(), 2);
    let set = ProductSet {
        id: "SET-complete".to_string(),
        shop_id: shop.id.clone(),
        title: "Complete Kit".to_string(),
        description: "All four species, bundled".to_string(),
        contents,
        price: Decimal::from(185),
        image_url: String::new(),
    };
    sheets
        .append_row(worksheets::SETS, rows::encode_set(&set))
        .await?;

    Ok(())
}
