//! Checkout form validation: field-level checks gating submission.
//!
//! Pure; no side effects. The address requirement depends on the delivery
//! toggle, so callers must re-validate whenever that toggle changes.

use model::{Cart, CustomerInfo};
use serde::Serialize;

/// Why a field was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldErrorKind {
    EmptyField,
    InvalidFormat,
    RequiredForDelivery,
    EmptyCart,
}

/// A single field-level validation failure, surfaced inline to the shopper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub kind: FieldErrorKind,
}

impl FieldError {
    fn new(field: &'static str, kind: FieldErrorKind) -> Self {
        Self { field, kind }
    }

    /// Human-readable message for the inline error display.
    pub fn message(&self) -> &'static str {
        match self.kind {
            FieldErrorKind::EmptyField => "This field is required",
            FieldErrorKind::InvalidFormat => "Invalid format",
            FieldErrorKind::RequiredForDelivery => "Required when delivery is requested",
            FieldErrorKind::EmptyCart => "The cart is empty",
        }
    }
}

/// Validates the checkout form against the submitted cart.
///
/// Returns every failing field at once so the UI can flag them together.
pub fn validate(info: &CustomerInfo, cart: &Cart) -> Result<(), Vec<FieldError>> {
    let mut errors = Vec::new();

    if info.full_name.trim().is_empty() {
        errors.push(FieldError::new("full_name", FieldErrorKind::EmptyField));
    }

    let phone = info.phone.trim();
    if phone.is_empty() {
        errors.push(FieldError::new("phone", FieldErrorKind::EmptyField));
    } else if !is_valid_phone(phone) {
        errors.push(FieldError::new("phone", FieldErrorKind::InvalidFormat));
    }

    if let Some(email) = info.email.as_deref() {
        let email = email.trim();
        if !email.is_empty() && !is_valid_email(email) {
            errors.push(FieldError::new("email", FieldErrorKind::InvalidFormat));
        }
    }

    if info.delivery_required {
        let address = info.address.as_deref().map(str::trim).unwrap_or("");
        if address.is_empty() {
            errors.push(FieldError::new("address", FieldErrorKind::RequiredForDelivery));
        }
    }

    if cart.is_empty() {
        errors.push(FieldError::new("cart", FieldErrorKind::EmptyCart));
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

/// 9 to 10 ASCII digits, nothing else.
fn is_valid_phone(phone: &str) -> bool {
    (9..=10).contains(&phone.len()) && phone.bytes().all(|b| b.is_ascii_digit())
}

/// `local@domain.tld` shape: a non-empty local part, one `@`, and at least
/// one `.` somewhere after it.
fn is_valid_email(email: &str) -> bool {
    match email.find('@') {
        Some(at) if at > 0 => email[at + 1..].contains('.'),
        _ => false,
    }
}
