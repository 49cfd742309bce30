//! Wire form of a product as the content store expects it.
//!
//! The body is emitted as the store's rich-text tree:
//!
//! ```text
//! root
//!  ├── paragraph ── text "Air Runner. "
//!  ├── paragraph ── text "Matière extérieure: Cuir. "
//!  └── paragraph ── text "Origine: Portugal."
//! ```

use serde::Serialize;
use serde_json::Value;

use super::{BodyBlock, MediaRef, NormalizedProduct, ProductStatus, Variant};

#[derive(Debug, Serialize)]
struct RichText {
    root: RootNode,
}

#[derive(Debug, Serialize)]
struct RootNode {
    #[serde(rename = "type")]
    node_type: &'static str,
    format: &'static str,
    indent: u8,
    version: u8,
    children: Vec<ParagraphNode>,
}

#[derive(Debug, Serialize)]
struct ParagraphNode {
    #[serde(rename = "type")]
    node_type: &'static str,
    format: &'static str,
    indent: u8,
    version: u8,
    children: Vec<TextNode>,
}

#[derive(Debug, Serialize)]
struct TextNode {
    #[serde(rename = "type")]
    node_type: &'static str,
    format: u8,
    style: &'static str,
    detail: u8,
    mode: &'static str,
    text: String,
    version: u8,
}

impl From<&BodyBlock> for ParagraphNode {
    fn from(block: &BodyBlock) -> Self {
        Self {
            node_type: "paragraph",
            format: "",
            indent: 0,
            version: 1,
            children: vec![TextNode {
                node_type: "text",
                format: 0,
                style: "",
                detail: 0,
                mode: "normal",
                text: block.text.clone(),
                version: 1,
            }],
        }
    }
}

impl RichText {
    fn from_blocks(blocks: &[BodyBlock]) -> Self {
        Self {
            root: RootNode {
                node_type: "root",
                format: "",
                indent: 0,
                version: 1,
                children: blocks.iter().map(ParagraphNode::from).collect(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProductDocument<'a> {
    title: &'a str,
    slug: &'a str,
    category: &'a str,
    price: f64,
    description: RichText,
    short_description: &'a str,
    images: &'a [MediaRef],
    variants: &'a [Variant],
    is_featured: bool,
    is_new_arrival: bool,
    rating: f64,
    review_count: u32,
    #[serde(rename = "_status")]
    status: ProductStatus,
}

impl NormalizedProduct {
    /// Serialize into the JSON body posted to `POST /products`.
    pub fn to_document(&self) -> serde_json::Result<Value> {
        let doc = ProductDocument {
            title: &self.title,
            slug: &self.slug,
            category: &self.category,
            price: self.price,
            description: RichText::from_blocks(&self.body_blocks),
            short_description: &self.short_description,
            images: &self.images,
            variants: &self.variants,
            is_featured: self.is_featured,
            is_new_arrival: self.is_new_arrival,
            rating: self.rating,
            review_count: self.review_count,
            status: self.status,
        };
        serde_json::to_value(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BlockKind, MediaId};

    fn sample() -> NormalizedProduct {
        NormalizedProduct {
            title: "Air Runner".into(),
            slug: "air-runner-AR1-0a1b2c3d".into(),
            category: "clothing".into(),
            price: 120.0,
            body_blocks: vec![
                BodyBlock { kind: BlockKind::Summary, text: "Air Runner. ".into() },
                BodyBlock { kind: BlockKind::Origin, text: "Origine: Portugal.".into() },
            ],
            short_description: "Air Runner - Noir".into(),
            images: vec![MediaRef { remote_media_id: MediaId::Int(4), alt_text: "Image 1".into() }],
            variants: vec![Variant {
                name: "Couleur".into(),
                value: "Noir".into(),
                stock: 10,
                price: None,
            }],
            is_featured: false,
            is_new_arrival: true,
            rating: 4.2,
            review_count: 17,
            status: ProductStatus::Published,
        }
    }

    #[test]
    fn test_document_shape() {
        let doc = sample().to_document().unwrap();
        assert_eq!(doc["title"], "Air Runner");
        assert_eq!(doc["shortDescription"], "Air Runner - Noir");
        assert_eq!(doc["_status"], "published");
        assert_eq!(doc["isNewArrival"], true);
        assert_eq!(doc["reviewCount"], 17);
        assert_eq!(doc["images"][0]["image"], 4);
        assert!(doc["variants"][0]["price"].is_null());
    }

    #[test]
    fn test_rich_text_tree() {
        let doc = sample().to_document().unwrap();
        let root = &doc["description"]["root"];
        assert_eq!(root["type"], "root");
        let paragraphs = root["children"].as_array().unwrap();
        assert_eq!(paragraphs.len(), 2);
        assert_eq!(paragraphs[0]["type"], "paragraph");
        assert_eq!(paragraphs[0]["children"][0]["type"], "text");
        assert_eq!(paragraphs[0]["children"][0]["text"], "Air Runner. ");
        assert_eq!(paragraphs[1]["children"][0]["text"], "Origine: Portugal.");
    }
}
