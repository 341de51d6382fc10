//! HTML parser for extracting product candidates
//!
//! This module turns a listing page into candidate records:
//! - Locates every repeated product unit
//! - Extracts title text, normalized price, and image URL per unit
//! - Skips units whose required fields are missing
//!
//! Candidates are returned in document order.

use crate::config::SelectorConfig;
use crate::ConfigError;
use rust_decimal::Decimal;
use scraper::{ElementRef, Html, Selector};
use std::str::FromStr;
use url::Url;

/// Marker introducing a variable-price product ("Starting at: ₹1,299.00")
pub const STARTING_AT_MARKER: &str = "Starting at:";

/// Image attributes in order of preference; lazy-load attributes hold the
/// real image while `src` often holds a placeholder
const IMAGE_ATTRIBUTES: [&str; 3] = ["data-lazy-src", "data-src", "src"];

/// A product extracted from a page, before its image is resolved
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateRecord {
    pub title: String,
    pub price: Decimal,
    /// Absolute image URL, if the unit carried a usable one
    pub image_url: Option<String>,
}

/// Compiled selectors for one site layout
#[derive(Debug, Clone)]
pub struct ProductSelectors {
    product: Selector,
    title: Selector,
    price: Selector,
    image: Selector,
}

impl ProductSelectors {
    pub fn from_config(config: &SelectorConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            product: compile(&config.product)?,
            title: compile(&config.title)?,
            price: compile(&config.price)?,
            image: compile(&config.image)?,
        })
    }
}

fn compile(selector: &str) -> Result<Selector, ConfigError> {
    Selector::parse(selector).map_err(|e| ConfigError::InvalidSelector {
        selector: selector.to_string(),
        message: e.to_string(),
    })
}

/// Extracts product candidates from listing pages
#[derive(Debug, Clone)]
pub struct ProductParser {
    selectors: ProductSelectors,
    skip_units_without_image: bool,
}

impl ProductParser {
    /// Creates a parser
    ///
    /// With `skip_units_without_image` set, a unit lacking an image URL is
    /// dropped like one lacking a title or price. Otherwise it is kept with
    /// `image_url: None`.
    pub fn new(selectors: ProductSelectors, skip_units_without_image: bool) -> Self {
        Self {
            selectors,
            skip_units_without_image,
        }
    }

    /// Parses a page body into candidate records
    ///
    /// # Arguments
    ///
    /// * `html` - The page body
    /// * `page_url` - The page URL, for resolving relative image URLs
    ///
    /// # Example
    ///
    /// ```
    /// use stall_scraper::config::SelectorConfig;
    /// use stall_scraper::crawler::{ProductParser, ProductSelectors};
    /// use url::Url;
    ///
    /// let selectors = ProductSelectors::from_config(&SelectorConfig::default()).unwrap();
    /// let parser = ProductParser::new(selectors, true);
    /// let html = r#"<ul><li class="product">
    ///     <h2 class="woo-loop-product__title"><a href="/p/1">Mirror</a></h2>
    ///     <span class="price">₹1,299.00</span>
    ///     <div class="mf-product-thumbnail"><img src="/img/mirror.jpg"></div>
    /// </li></ul>"#;
    /// let page = Url::parse("https://shop.example.com/shop/").unwrap();
    ///
    /// let products = parser.parse(html, &page);
    /// assert_eq!(products.len(), 1);
    /// assert_eq!(products[0].price.to_string(), "1299");
    /// ```
    pub fn parse(&self, html: &str, page_url: &Url) -> Vec<CandidateRecord> {
        let document = Html::parse_document(html);
        let units: Vec<ElementRef> = document.select(&self.selectors.product).collect();
        tracing::debug!("Found {} product units on {}", units.len(), page_url);

        let mut candidates = Vec::with_capacity(units.len());
        for (index, unit) in units.into_iter().enumerate() {
            let Some(title) = self.extract_title(unit) else {
                tracing::debug!("Skipping product unit {}: no title", index);
                continue;
            };

            let Some(price) = self.extract_price(unit) else {
                tracing::debug!("Skipping product unit {} ({}): no usable price", index, title);
                continue;
            };

            let image_url = self.extract_image_url(unit, page_url);
            if image_url.is_none() && self.skip_units_without_image {
                tracing::debug!("Skipping product unit {} ({}): no image URL", index, title);
                continue;
            }

            tracing::debug!("Candidate: {} at {} ({:?})", title, price, image_url);
            candidates.push(CandidateRecord {
                title,
                price,
                image_url,
            });
        }

        candidates
    }

    fn extract_title(&self, unit: ElementRef) -> Option<String> {
        unit.select(&self.selectors.title)
            .next()
            .map(|element| element.text().collect::<String>().trim().to_string())
            .filter(|title| !title.is_empty())
    }

    fn extract_price(&self, unit: ElementRef) -> Option<Decimal> {
        let element = unit.select(&self.selectors.price).next()?;
        let raw = element.text().collect::<String>();
        normalize_price(&raw)
    }

    fn extract_image_url(&self, unit: ElementRef, page_url: &Url) -> Option<String> {
        let element = unit.select(&self.selectors.image).next()?;

        IMAGE_ATTRIBUTES
            .iter()
            .filter_map(|attr| element.value().attr(attr))
            .map(str::trim)
            .find(|value| !value.is_empty())
            .and_then(|value| resolve_image_url(value, page_url))
    }
}

/// Resolves an image reference to an absolute http(s) URL
///
/// Returns None for `data:` placeholders and anything that does not
/// resolve to http or https.
fn resolve_image_url(value: &str, page_url: &Url) -> Option<String> {
    if value.starts_with("data:") {
        return None;
    }

    match page_url.join(value) {
        Ok(absolute) if absolute.scheme() == "http" || absolute.scheme() == "https" => {
            Some(absolute.to_string())
        }
        _ => None,
    }
}

/// Normalizes free-form price text into a decimal amount
///
/// Two layouts are recognized:
/// - text containing [`STARTING_AT_MARKER`]: the first word after the marker
///   is the amount, e.g. `Starting at: ₹1,299.00` → `1299.00`
/// - anything else: the text up to the first `.` is the amount, e.g.
///   `₹2,450.00` → `2450`
///
/// In both cases one leading currency symbol and any `,` group separators
/// are removed. Returns None when no decimal can be read.
pub fn normalize_price(raw: &str) -> Option<Decimal> {
    let raw = raw.trim();

    let token = match raw.find(STARTING_AT_MARKER) {
        Some(index) => raw[index + STARTING_AT_MARKER.len()..]
            .split_whitespace()
            .next()?,
        None => raw.split('.').next()?,
    };

    let amount: String = strip_currency_symbol(token)
        .trim()
        .chars()
        .filter(|c| *c != ',')
        .collect();

    Decimal::from_str(&amount).ok()
}

fn strip_currency_symbol(token: &str) -> &str {
    let mut chars = token.chars();
    match chars.next() {
        Some(first) if !first.is_ascii_digit() => chars.as_str(),
        _ => token,
    }
}
