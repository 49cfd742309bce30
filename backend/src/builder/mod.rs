//! Document Builder: maps a source row onto a [`NormalizedProduct`].
//!
//! Everything here is deterministic except the cosmetic fields (slug suffix,
//! display flags, rating, review count), which come from an injected
//! pseudo-random source. Seeding it makes a run reproducible.

use std::sync::Mutex;

use once_cell::sync::Lazy;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use regex::Regex;

use crate::error::{BuildError, BuildResult};
use crate::models::{
    columns, BlockKind, BodyBlock, MediaRef, NormalizedProduct, ProductStatus, RawRecord, Variant,
};

/// Category tag used when a source label is not in the table.
pub const DEFAULT_CATEGORY: &str = "clothing";

/// Placeholder stock assigned to each derived variant.
pub const VARIANT_STOCK: u32 = 10;

/// Maximum length of the short description, in characters.
pub const SHORT_DESCRIPTION_MAX: usize = 200;

const FEATURED_PROBABILITY: f64 = 0.15;
const NEW_ARRIVAL_PROBABILITY: f64 = 0.25;
const MAX_REVIEWS: u32 = 200;

static NON_SLUG_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\s-]").expect("static pattern"));
static SLUG_SEPARATORS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[-\s]+").expect("static pattern"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static pattern"));
static REFERENCE_BREAKERS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\s/?#]+").expect("static pattern"));

/// Map a source category label to a store category tag. Never fails.
pub fn map_category(label: &str) -> &'static str {
    match label.trim() {
        "Homme" | "Femme" | "Enfant" => "clothing",
        "Baskets et Sneakers" | "Chaussures de sport" => "sports",
        "Chaussures de ville" | "Chaussures de sécurité" => "clothing",
        _ => DEFAULT_CATEGORY,
    }
}

/// Lower-case, drop punctuation, hyphenate whitespace.
pub fn slugify(title: &str) -> String {
    let lowered = title.to_lowercase();
    let stripped = NON_SLUG_CHARS.replace_all(&lowered, "");
    SLUG_SEPARATORS
        .replace_all(&stripped, "-")
        .trim_matches('-')
        .to_string()
}

/// Reference as a slug segment: case kept, whitespace and URL delimiters dropped.
pub fn slug_reference(reference: &str) -> String {
    REFERENCE_BREAKERS
        .replace_all(reference, "")
        .trim_matches('-')
        .to_string()
}

/// Collapse runs of whitespace and trim.
pub fn clean_text(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

/// Parse a price cell. Blank means zero; anything else must be a finite number.
pub fn parse_price(raw: Option<&str>) -> BuildResult<f64> {
    let Some(raw) = raw else {
        return Ok(0.0);
    };
    let normalized: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '€')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    match normalized.parse::<f64>() {
        Ok(price) if price.is_finite() => Ok(price),
        _ => Err(BuildError::InvalidPrice(raw.to_string())),
    }
}

/// Ordered body paragraphs; absent attributes produce no paragraph.
pub fn body_blocks(title: &str, record: &RawRecord) -> Vec<BodyBlock> {
    let mut blocks = vec![BodyBlock { kind: BlockKind::Summary, text: format!("{}. ", title) }];

    let optional = [
        (BlockKind::Material, columns::MATERIAL, "Matière extérieure", ". "),
        (BlockKind::Sole, columns::SOLE, "Semelle", ". "),
        (BlockKind::Origin, columns::ORIGIN, "Origine", "."),
    ];
    for (kind, column, label, end) in optional {
        if let Some(value) = record.get(column) {
            blocks.push(BodyBlock { kind, text: format!("{}: {}{}", label, value, end) });
        }
    }
    blocks
}

/// One variant per present axis: colour, then material.
pub fn variants(record: &RawRecord) -> Vec<Variant> {
    [(columns::COLOR, "Couleur"), (columns::MATERIAL, "Matière")]
        .into_iter()
        .filter_map(|(column, name)| {
            record.get(column).map(|value| Variant {
                name: name.to_string(),
                value: value.to_string(),
                stock: VARIANT_STOCK,
                price: None,
            })
        })
        .collect()
}

/// `"{title} - {colour}"`, or the title alone, capped in characters.
pub fn short_description(title: &str, colour: Option<&str>) -> String {
    let text = match colour {
        Some(colour) => format!("{} - {}", title, colour),
        None => title.to_string(),
    };
    text.chars().take(SHORT_DESCRIPTION_MAX).collect()
}

/// Cosmetic values drawn for one record.
#[derive(Debug, Clone, PartialEq)]
struct Cosmetics {
    slug_suffix: String,
    is_featured: bool,
    is_new_arrival: bool,
    rating: f64,
    review_count: u32,
}

/// A product without its images yet.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductDraft {
    product: NormalizedProduct,
}

impl ProductDraft {
    pub fn title(&self) -> &str {
        &self.product.title
    }

    pub fn slug(&self) -> &str {
        &self.product.slug
    }

    /// Attach the uploaded media, in reference order.
    pub fn with_images(mut self, images: Vec<MediaRef>) -> NormalizedProduct {
        self.product.images = images;
        self.product
    }
}

/// Builds products from rows, shared across record workers.
#[derive(Debug)]
pub struct DocumentBuilder {
    rng: Mutex<StdRng>,
}

impl DocumentBuilder {
    /// `None` seeds from the OS; `Some(seed)` makes every draw reproducible.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng: Mutex::new(rng) }
    }

    fn draw(&self) -> Cosmetics {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        Cosmetics {
            slug_suffix: format!("{:08x}", rng.gen::<u32>()),
            is_featured: rng.gen_bool(FEATURED_PROBABILITY),
            is_new_arrival: rng.gen_bool(NEW_ARRIVAL_PROBABILITY),
            rating: (rng.gen_range(3.5..=5.0_f64) * 10.0).round() / 10.0,
            review_count: rng.gen_range(0..=MAX_REVIEWS),
        }
    }

    /// Everything but the images. Fails before any image work would be wasted.
    pub fn prepare(&self, record: &RawRecord) -> BuildResult<ProductDraft> {
        let title = clean_text(record.get_or_empty(columns::TITLE));
        if title.is_empty() {
            return Err(BuildError::MissingField(columns::TITLE.to_string()));
        }
        let price = parse_price(record.get(columns::PRICE))?;
        let reference = record.get_or_empty(columns::REFERENCE);
        let cosmetics = self.draw();

        let slug = [slugify(&title), slug_reference(reference), cosmetics.slug_suffix]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("-");

        let product = NormalizedProduct {
            slug,
            category: map_category(record.get_or_empty(columns::CATEGORY)).to_string(),
            price,
            body_blocks: body_blocks(&title, record),
            short_description: short_description(&title, record.get(columns::COLOR)),
            images: Vec::new(),
            variants: variants(record),
            is_featured: cosmetics.is_featured,
            is_new_arrival: cosmetics.is_new_arrival,
            rating: cosmetics.rating,
            review_count: cosmetics.review_count,
            status: ProductStatus::Published,
            title,
        };
        Ok(ProductDraft { product })
    }

    pub fn build(
        &self,
        record: &RawRecord,
        images: Vec<MediaRef>,
    ) -> BuildResult<NormalizedProduct> {
        Ok(self.prepare(record)?.with_images(images))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MediaId;

    fn air_runner() -> RawRecord {
        RawRecord::from_pairs(
            1,
            [
                ("nom", "Air Runner"),
                ("categorie", "Homme"),
                ("prix", "120"),
                ("reference", "AR1"),
                ("images", "http://x/a.jpg"),
            ],
        )
    }

    fn is_slug_suffix(s: &str) -> bool {
        s.len() == 8 && s.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
    }

    #[test]
    fn test_builds_air_runner() {
        let builder = DocumentBuilder::new(Some(7));
        let media = MediaRef {
            remote_media_id: MediaId::Int(1),
            alt_text: "Air Runner - image 1".into(),
        };
        let product = builder.build(&air_runner(), vec![media.clone()]).unwrap();

        assert_eq!(product.title, "Air Runner");
        assert_eq!(product.price, 120.0);
        assert_eq!(product.category, "clothing");
        assert_eq!(product.images, vec![media]);
        assert_eq!(product.short_description, "Air Runner");
        assert_eq!(product.status, ProductStatus::Published);

        let suffix = product.slug.strip_prefix("air-runner-AR1-").unwrap();
        assert!(is_slug_suffix(suffix), "unexpected slug {}", product.slug);
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Air Runner"), "air-runner");
        assert_eq!(slugify("  Basket (Édition) -- Noir!  "), "basket-édition-noir");
        assert_eq!(slugify("---"), "");
    }

    #[test]
    fn test_reference_is_cleaned_for_slug() {
        assert_eq!(slug_reference("AR 1"), "AR1");
        assert_eq!(slug_reference("CW/2?#x"), "CW2x");
        assert_eq!(slug_reference(" / "), "");

        let record = RawRecord::from_pairs(1, [("nom", "City"), ("reference", "CW/2 b")]);
        let draft = DocumentBuilder::new(Some(3)).prepare(&record).unwrap();
        let suffix = draft.slug().strip_prefix("city-CW2b-").unwrap();
        assert!(is_slug_suffix(suffix), "unexpected slug {}", draft.slug());

        let blank = RawRecord::from_pairs(1, [("nom", "City"), ("reference", " / ")]);
        let draft = DocumentBuilder::new(Some(3)).prepare(&blank).unwrap();
        assert!(is_slug_suffix(draft.slug().strip_prefix("city-").unwrap()));
    }

    #[test]
    fn test_same_title_different_slugs() {
        let builder = DocumentBuilder::new(None);
        let a = builder.prepare(&air_runner()).unwrap();
        let b = builder.prepare(&air_runner()).unwrap();
        assert_ne!(a.slug(), b.slug());
        assert_eq!(&a.slug()[..15], &b.slug()[..15]);
    }

    #[test]
    fn test_seed_is_reproducible() {
        let a = DocumentBuilder::new(Some(42)).prepare(&air_runner()).unwrap();
        let b = DocumentBuilder::new(Some(42)).prepare(&air_runner()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_cosmetic_ranges() {
        let builder = DocumentBuilder::new(Some(1));
        for _ in 0..500 {
            let product = builder.build(&air_runner(), Vec::new()).unwrap();
            assert!((3.5..=5.0).contains(&product.rating));
            assert_eq!((product.rating * 10.0).round() / 10.0, product.rating);
            assert!(product.review_count <= 200);
        }
    }

    #[test]
    fn test_body_omits_absent_attributes() {
        let record = RawRecord::from_pairs(
            3,
            [
                ("nom", "City Walk"),
                ("matiere_exterieure", "Cuir"),
                ("semelle", "  "),
                ("origine", "Portugal"),
            ],
        );
        let blocks = body_blocks("City Walk", &record);
        let kinds: Vec<_> = blocks.iter().map(|b| b.kind).collect();
        assert_eq!(kinds, vec![BlockKind::Summary, BlockKind::Material, BlockKind::Origin]);
        assert_eq!(blocks[0].text, "City Walk. ");
        assert_eq!(blocks[1].text, "Matière extérieure: Cuir. ");
        assert_eq!(blocks[2].text, "Origine: Portugal.");
        assert!(blocks.iter().all(|b| !b.text.trim().is_empty()));
    }

    #[test]
    fn test_variants_per_axis() {
        let record = RawRecord::from_pairs(
            1,
            [("couleur_principale", "Noir"), ("matiere_exterieure", "Cuir")],
        );
        let variants = variants(&record);
        assert_eq!(variants.len(), 2);
        assert_eq!((variants[0].name.as_str(), variants[0].value.as_str()), ("Couleur", "Noir"));
        assert_eq!((variants[1].name.as_str(), variants[1].value.as_str()), ("Matière", "Cuir"));
        assert!(variants.iter().all(|v| v.stock == VARIANT_STOCK && v.price.is_none()));

        assert!(super::variants(&RawRecord::from_pairs(1, [("nom", "x")])).is_empty());
    }

    #[test]
    fn test_price_parsing() {
        assert_eq!(parse_price(None).unwrap(), 0.0);
        assert_eq!(parse_price(Some("89.90")).unwrap(), 89.9);
        assert_eq!(parse_price(Some("89,90 €")).unwrap(), 89.9);
        assert!(matches!(parse_price(Some("gratuit")), Err(BuildError::InvalidPrice(_))));
        assert!(parse_price(Some("NaN")).is_err());
    }

    #[test]
    fn test_invalid_price_fails_record() {
        let record = RawRecord::from_pairs(1, [("nom", "X"), ("prix", "abc")]);
        let err = DocumentBuilder::new(Some(1)).prepare(&record).unwrap_err();
        assert_eq!(err.to_string(), "Invalid price: 'abc'");
    }

    #[test]
    fn test_missing_price_defaults_to_zero() {
        let record = RawRecord::from_pairs(1, [("nom", "X")]);
        let product = DocumentBuilder::new(Some(1)).build(&record, Vec::new()).unwrap();
        assert_eq!(product.price, 0.0);
        assert_eq!(product.category, DEFAULT_CATEGORY);
    }

    #[test]
    fn test_missing_title() {
        let record = RawRecord::from_pairs(1, [("prix", "10")]);
        let err = DocumentBuilder::new(Some(1)).prepare(&record).unwrap_err();
        assert!(matches!(err, BuildError::MissingField(ref f) if f == "nom"));
    }

    #[test]
    fn test_category_mapping() {
        assert_eq!(map_category("Baskets et Sneakers"), "sports");
        assert_eq!(map_category("Chaussures de sécurité"), "clothing");
        assert_eq!(map_category("Inconnue"), DEFAULT_CATEGORY);
    }

    #[test]
    fn test_short_description() {
        assert_eq!(short_description("Air Runner", Some("Noir")), "Air Runner - Noir");
        let long = "é".repeat(300);
        assert_eq!(short_description(&long, None).chars().count(), SHORT_DESCRIPTION_MAX);
    }

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("  Air \t Runner\n "), "Air Runner");
    }
}
