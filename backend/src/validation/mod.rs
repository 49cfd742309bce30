//! JSON Schema validation for product documents.
//!
//! Every document is checked against the store's product shape before it is
//! posted, so a record that would be rejected server-side fails locally and
//! nothing partial is ever written.
//!
//! # Embedded Schema
//!
//! The schema (Draft 7) is embedded at compile time from `schemas/product.json`
//! and compiled once.
//!
//! # Example
//!
//! ```rust,ignore
//! use catalog_import::validation::validate_product;
//!
//! let doc = product.to_document()?;
//! if let Err(errors) = validate_product(&doc) {
//!     eprintln!("{}", errors.join("; "));
//! }
//! ```

use jsonschema::Validator;
use once_cell::sync::Lazy;
use serde_json::Value;

static PRODUCT_SCHEMA: Lazy<Value> = Lazy::new(|| {
    serde_json::from_str(include_str!("../../schemas/product.json"))
        .expect("Invalid embedded schema")
});

static PRODUCT_VALIDATOR: Lazy<Validator> =
    Lazy::new(|| jsonschema::draft7::new(&PRODUCT_SCHEMA).expect("Invalid embedded schema"));

/// Validate a serialized product document.
///
/// Returns every violation, not just the first.
pub fn validate_product(document: &Value) -> Result<(), Vec<String>> {
    collect_errors(&PRODUCT_VALIDATOR, document)
}

pub fn is_valid_product(document: &Value) -> bool {
    PRODUCT_VALIDATOR.is_valid(document)
}

fn collect_errors(validator: &Validator, data: &Value) -> Result<(), Vec<String>> {
    let errors: Vec<String> = validator
        .iter_errors(data)
        .map(|e| e.to_string())
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_document() -> Value {
        json!({
            "title": "Air Runner",
            "slug": "air-runner-AR1-0a1b2c3d",
            "category": "clothing",
            "price": 120.0,
            "description": {
                "root": {
                    "type": "root",
                    "children": [
                        {
                            "type": "paragraph",
                            "children": [{ "type": "text", "text": "Air Runner. " }]
                        }
                    ]
                }
            },
            "shortDescription": "Air Runner - Noir",
            "images": [{ "image": 12, "alt": "Air Runner - image 1" }],
            "variants": [{ "name": "Couleur", "value": "Noir", "stock": 10, "price": null }],
            "isFeatured": false,
            "isNewArrival": true,
            "rating": 4.5,
            "reviewCount": 12,
            "_status": "published"
        })
    }

    #[test]
    fn test_valid_document() {
        assert!(validate_product(&valid_document()).is_ok());
        assert!(is_valid_product(&valid_document()));
    }

    #[test]
    fn test_string_media_ids_accepted() {
        let mut doc = valid_document();
        doc["images"][0]["image"] = json!("65f0a1c2");
        assert!(is_valid_product(&doc));
    }

    #[test]
    fn test_negative_price_rejected() {
        let mut doc = valid_document();
        doc["price"] = json!(-5.0);
        let errors = validate_product(&doc).unwrap_err();
        assert_eq!(errors.len(), 1, "{:?}", errors);
    }

    #[test]
    fn test_unknown_category_rejected() {
        let mut doc = valid_document();
        doc["category"] = json!("shoes");
        assert!(!is_valid_product(&doc));
    }

    #[test]
    fn test_long_short_description_rejected() {
        let mut doc = valid_document();
        doc["shortDescription"] = json!("x".repeat(201));
        assert!(validate_product(&doc).is_err());
    }

    #[test]
    fn test_missing_title_reports_all_errors() {
        let mut doc = valid_document();
        doc.as_object_mut().unwrap().remove("title");
        doc["rating"] = json!(7);
        let errors = validate_product(&doc).unwrap_err();
        assert_eq!(errors.len(), 2, "{:?}", errors);
    }

}
