//! Cart pricing: line totals, subtotal, and the conditional delivery fee.
//!
//! Pure function of its inputs. Arithmetic stays in full decimal precision;
//! rounding to two places is a display concern and happens nowhere here.

use model::{Cart, Product};
use rust_decimal::Decimal;
use tracing::warn;

/// Computes the order total for a cart against a shop's catalog.
///
/// Cart entries whose product no longer exists in the catalog are excluded
/// and logged rather than failing the whole computation; a product may have
/// been deleted after the shopper added it to their client-held cart.
pub fn compute_total(
    cart: &Cart,
    catalog: &[Product],
    delivery_required: bool,
    delivery_fee: Decimal,
) -> Decimal {
    let mut subtotal = Decimal::ZERO;
    for (product_id, quantity) in cart.iter() {
        match catalog.iter().find(|p| &p.id == product_id) {
            Some(product) => subtotal += product.price * Decimal::from(*quantity),
            None => warn!(%product_id, "Cart references a product missing from the catalog, skipping"),
        }
    }
    if delivery_required {
        subtotal + delivery_fee
    } else {
        subtotal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(id: &str, price: i64) -> Product {
        Product {
            id: id.to_string(),
            shop_id: "SHOP-1".to_string(),
            category: "Lulav".to_string(),
            name: id.to_string(),
            name_he: String::new(),
            description: String::new(),
            price: Decimal::from(price),
            image_url: String::new(),
        }
    }

    #[test]
    fn test_total_without_delivery_ignores_fee() {
        let catalog = vec![product("PROD-1", 15), product("PROD-2", 40)];
        let mut cart = Cart::new();
        cart.set_quantity("PROD-1", 2);
        cart.set_quantity("PROD-2", 1);

        let with_zero_fee = compute_total(&cart, &catalog, false, Decimal::ZERO);
        let with_large_fee = compute_total(&cart, &catalog, false, Decimal::from(999));
        assert_eq!(with_zero_fee, Decimal::from(70));
        assert_eq!(with_zero_fee, with_large_fee);
    }

    #[test]
    fn test_delivery_adds_exactly_the_fee() {
        let catalog = vec![product("PROD-1", 15)];
        let mut cart = Cart::new();
        cart.set_quantity("PROD-1", 2);

        let base = compute_total(&cart, &catalog, false, Decimal::from(20));
        let delivered = compute_total(&cart, &catalog, true, Decimal::from(20));
        assert_eq!(delivered, base + Decimal::from(20));
    }

    #[test]
    fn test_missing_product_is_skipped() {
        let catalog = vec![product("PROD-1", 15)];
        let mut cart = Cart::new();
        cart.set_quantity("PROD-1", 1);
        cart.set_quantity("PROD-gone", 7);

        assert_eq!(compute_total(&cart, &catalog, false, Decimal::ZERO), Decimal::from(15));
    }

    #[test]
    fn test_fractional_prices_keep_precision() {
        let mut catalog = vec![product("PROD-1", 0)];
        catalog[0].price = "14.95".parse().unwrap();
        let mut cart = Cart::new();
        cart.set_quantity("PROD-1", 3);

        let total = compute_total(&cart, &catalog, false, Decimal::ZERO);
        assert_eq!(total, "44.85".parse::<Decimal>().unwrap());
    }

    #[test]
    fn test_empty_cart_totals_zero() {
        assert_eq!(
            compute_total(&Cart::new(), &[], false, Decimal::from(20)),
            Decimal::ZERO
        );
    }
}
