//! Maintenance passes over documents already in the store.
//!
//! Both passes list the whole collection first and only then start writing,
//! so deleting or patching never shifts the pages still to be read.

use futures::TryStreamExt;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};

use crate::client::{doc_id, StoreClient};
use crate::error::ClientResult;
use crate::logs::{log_info, log_info_indent, log_success, log_warning, log_warning_indent};
use crate::models::BatchSummary;

const PREMIUM_BRANDS: [&str; 3] = ["jordan", "nike", "adidas"];
const MID_BRANDS: [&str; 3] = ["new balance", "puma", "converse"];

async fn all_products(client: &StoreClient) -> ClientResult<Vec<Value>> {
    log_info("🔍 Listing products...");
    let products: Vec<Value> = client.products().try_collect().await?;
    log_success(format!("{} products found", products.len()));
    Ok(products)
}

fn title_of(doc: &Value) -> &str {
    doc.get("title").and_then(Value::as_str).unwrap_or("Untitled")
}

/// Delete every product, pausing between calls.
pub async fn delete_all_products(client: &StoreClient) -> ClientResult<BatchSummary> {
    client.authenticate().await?;
    let products = all_products(client).await?;
    let total = products.len();
    let mut summary = BatchSummary::default();

    for (i, product) in products.iter().enumerate() {
        if i > 0 && !client.delete_delay().is_zero() {
            tokio::time::sleep(client.delete_delay()).await;
        }

        let Some(id) = doc_id(product) else {
            log_warning(format!("[{}/{}] {} has no id", i + 1, total, title_of(product)));
            summary.record(false);
            continue;
        };

        log_info(format!("🗑️ [{}/{}] {}", i + 1, total, title_of(product)));
        match client.delete_product(&id).await {
            Ok(()) => summary.record(true),
            Err(e) => {
                log_warning_indent(format!("Delete {} failed: {}", id, e), 1);
                summary.record(false);
            }
        }
    }

    log_success(format!("Deleted {}, failed {}", summary.succeeded, summary.failed));
    Ok(summary)
}

/// Stock level suggested by the brand named in a title.
pub fn stock_for_title<R: Rng + ?Sized>(title: &str, rng: &mut R) -> u32 {
    let title = title.to_lowercase();
    if PREMIUM_BRANDS.iter().any(|brand| title.contains(brand)) {
        rng.gen_range(15..=50)
    } else if MID_BRANDS.iter().any(|brand| title.contains(brand)) {
        rng.gen_range(8..=25)
    } else {
        rng.gen_range(3..=15)
    }
}

/// Give every product a stock level and in-stock flag.
pub async fn update_all_stocks(
    client: &StoreClient,
    seed: Option<u64>,
) -> ClientResult<BatchSummary> {
    client.authenticate().await?;
    let products = all_products(client).await?;
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut summary = BatchSummary::default();

    for product in &products {
        let title = title_of(product);
        let Some(id) = doc_id(product) else {
            log_warning(format!("{} has no id", title));
            summary.record(false);
            continue;
        };

        let stock = stock_for_title(title, &mut rng);
        let fields = json!({ "stock": stock, "isInStock": stock > 0 });
        match client.patch_product(&id, &fields).await {
            Ok(_) => {
                log_info_indent(format!("{} -> stock {}", title, stock), 1);
                summary.record(true);
            }
            Err(e) => {
                log_warning_indent(format!("Update {} failed: {}", id, e), 1);
                summary.record(false);
            }
        }
    }

    log_success(format!("Updated {}, failed {}", summary.succeeded, summary.failed));
    Ok(summary)
}

/// First page of the media collection.
pub async fn list_media(client: &StoreClient) -> ClientResult<Vec<Value>> {
    client.authenticate().await?;
    let media = client.list_media().await?;
    for doc in &media {
        let id = doc_id(doc).unwrap_or_else(|| "?".to_string());
        let name = doc.get("filename").and_then(Value::as_str).unwrap_or("");
        let alt = doc.get("alt").and_then(Value::as_str).unwrap_or("");
        log_info_indent(format!("{} {} {}", id, name, alt), 1);
    }
    log_success(format!("{} media documents", media.len()));
    Ok(media)
}
