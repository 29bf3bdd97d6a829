//! Scryfall card-database client and the app-facing card payload.
//!
//! The database sits behind the [`CardCatalog`] trait so the lookup stage
//! can be tested against canned records. The production impl,
//! [`ScryfallClient`], hits the public REST API: `/cards/named?exact=`
//! first, `?fuzzy=` as a second chance for slightly-misread names.
//!
//! [`format_card`] flattens a raw Scryfall record into the camelCase JSON
//! shape the mobile app expects, including the first-face fallback for
//! double-faced layouts where the top-level record omits type line and
//! oracle text.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Failures from the card database.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The database has no card under the queried name.
    #[error("card not found")]
    NotFound,
    /// Transport or protocol failure.
    #[error("card database request failed: {0}")]
    Http(String),
}

/// Seam between the lookup stage and a card database.
#[async_trait]
pub trait CardCatalog: Send + Sync {
    /// Exact-name lookup.
    async fn named_exact(&self, name: &str) -> Result<ScryfallCard, CatalogError>;
    /// Fuzzy-name lookup, tolerant of small misreadings.
    async fn named_fuzzy(&self, name: &str) -> Result<ScryfallCard, CatalogError>;
    /// Current prices for the card. Best-effort; callers treat failure as
    /// "prices unknown", never as a scan failure.
    async fn prices(&self, name: &str, set_code: Option<&str>) -> Result<CardPrices, CatalogError>;
}

// ── Wire types ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImageUris {
    pub normal: Option<String>,
    pub large: Option<String>,
    pub art_crop: Option<String>,
    pub border_crop: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CardFace {
    #[serde(default)]
    pub type_line: String,
    #[serde(default)]
    pub mana_cost: String,
    pub power: Option<String>,
    pub toughness: Option<String>,
    pub oracle_text: Option<String>,
    pub image_uris: Option<ImageUris>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WirePrices {
    pub usd: Option<String>,
}

/// The subset of a Scryfall card record the payload needs.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScryfallCard {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "set")]
    pub set_code: String,
    #[serde(default)]
    pub set_name: String,
    pub image_uris: Option<ImageUris>,
    #[serde(default)]
    pub card_faces: Vec<CardFace>,
    #[serde(default)]
    pub oracle_text: String,
    #[serde(default)]
    pub flavor_text: String,
    #[serde(default = "default_rarity")]
    pub rarity: String,
    #[serde(default)]
    pub type_line: String,
    #[serde(default)]
    pub mana_cost: String,
    #[serde(default)]
    pub cmc: f64,
    pub power: Option<String>,
    pub toughness: Option<String>,
    #[serde(default)]
    pub colors: Vec<String>,
    #[serde(default)]
    pub color_identity: Vec<String>,
    #[serde(default)]
    pub collector_number: String,
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default = "default_layout")]
    pub layout: String,
    #[serde(default)]
    pub released_at: String,
    #[serde(default)]
    pub legalities: HashMap<String, String>,
    pub edhrec_rank: Option<u32>,
    pub penny_rank: Option<u32>,
    #[serde(default)]
    pub scryfall_uri: String,
    pub tcgplayer_id: Option<u64>,
    #[serde(default)]
    pub prices: WirePrices,
}

fn default_rarity() -> String {
    "common".to_string()
}

fn default_layout() -> String {
    "normal".to_string()
}

/// Marketplace prices attached to a card payload.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CardPrices {
    pub tcgplayer: f64,
    pub ligamagic: f64,
}

impl CardPrices {
    /// Placeholder used when price lookup failed or returned nothing.
    pub fn zeroed() -> Self {
        Self {
            tcgplayer: 0.0,
            ligamagic: 0.0,
        }
    }
}

// ── Client ────────────────────────────────────────────────────────────────

/// BRL conversion is a fixed mock rate until a real marketplace feed lands.
const USD_TO_BRL_RATE: f64 = 5.0;

/// HTTP client for the public Scryfall API.
pub struct ScryfallClient {
    http: reqwest::Client,
    base_url: String,
}

impl ScryfallClient {
    pub fn new(base_url: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn named(&self, param: &str, name: &str) -> Result<ScryfallCard, CatalogError> {
        let response = self
            .http
            .get(format!("{}/cards/named", self.base_url))
            .query(&[(param, name)])
            .send()
            .await
            .map_err(|e| CatalogError::Http(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(CatalogError::NotFound);
        }
        if !response.status().is_success() {
            return Err(CatalogError::Http(format!(
                "scryfall returned HTTP {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| CatalogError::Http(format!("bad scryfall payload: {e}")))
    }
}

#[async_trait]
impl CardCatalog for ScryfallClient {
    async fn named_exact(&self, name: &str) -> Result<ScryfallCard, CatalogError> {
        self.named("exact", name).await
    }

    async fn named_fuzzy(&self, name: &str) -> Result<ScryfallCard, CatalogError> {
        self.named("fuzzy", name).await
    }

    async fn prices(&self, name: &str, set_code: Option<&str>) -> Result<CardPrices, CatalogError> {
        let mut query = vec![("exact", name.to_string())];
        if let Some(set) = set_code {
            query.push(("set", set.to_string()));
        }

        let response = self
            .http
            .get(format!("{}/cards/named", self.base_url))
            .query(&query)
            .send()
            .await
            .map_err(|e| CatalogError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Ok(CardPrices::zeroed());
        }

        let card: ScryfallCard = response
            .json()
            .await
            .map_err(|e| CatalogError::Http(format!("bad scryfall payload: {e}")))?;

        Ok(prices_from_record(&card))
    }
}

/// Derive marketplace prices from a card record's USD figure.
pub fn prices_from_record(card: &ScryfallCard) -> CardPrices {
    match card.prices.usd.as_deref().and_then(|v| v.parse::<f64>().ok()) {
        Some(usd) => CardPrices {
            tcgplayer: usd,
            ligamagic: usd * USD_TO_BRL_RATE,
        },
        None => CardPrices::zeroed(),
    }
}

// ── App-facing payload ────────────────────────────────────────────────────

/// The card object embedded in a successful scan response.
///
/// Field names are camelCase because the mobile app consumes this shape
/// directly.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardPayload {
    pub id: String,
    pub name: String,
    pub edition: String,
    pub official_image_url: String,
    pub art_crop_url: String,
    pub border_crop_url: String,
    pub description: String,
    pub flavor_text: String,
    pub rarity: String,
    pub rarity_code: String,
    pub type_line: String,
    pub mana_cost: String,
    pub cmc: i64,
    pub power: Option<String>,
    pub toughness: Option<String>,
    pub colors: Vec<String>,
    pub color_identity: Vec<String>,
    pub set_code: String,
    pub set_name: String,
    pub collector_number: String,
    pub artist: String,
    pub keywords: Vec<String>,
    pub layout: String,
    pub released_at: String,
    pub legalities: HashMap<String, String>,
    pub edhrec_rank: Option<u32>,
    pub penny_rank: Option<u32>,
    pub scryfall_uri: String,
    pub tcgplayer_id: Option<u64>,
    pub prices: CardPrices,
    /// Filled in client-side when the app stores the scan.
    pub scanned_at: Option<String>,
}

/// Flatten a Scryfall record plus prices into the app payload.
pub fn format_card(card: &ScryfallCard, prices: CardPrices) -> CardPayload {
    let top_uris = card.image_uris.clone().unwrap_or_default();
    let first_face = card.card_faces.first();

    // Best available image: top-level normal, top-level large, then the
    // first face's normal (double-faced cards carry images per face).
    let official_image_url = top_uris
        .normal
        .clone()
        .or_else(|| top_uris.large.clone())
        .or_else(|| {
            first_face
                .and_then(|f| f.image_uris.as_ref())
                .and_then(|u| u.normal.clone())
        })
        .unwrap_or_default();

    let mut type_line = card.type_line.clone();
    let mut mana_cost = card.mana_cost.clone();
    let mut power = card.power.clone();
    let mut toughness = card.toughness.clone();
    let mut oracle_text = card.oracle_text.clone();
    if type_line.is_empty() {
        if let Some(face) = first_face {
            type_line = face.type_line.clone();
            mana_cost = face.mana_cost.clone();
            power = face.power.clone();
            toughness = face.toughness.clone();
            if let Some(text) = &face.oracle_text {
                oracle_text = text.clone();
            }
        }
    }

    CardPayload {
        id: format!(
            "{}_{}",
            card.name.to_lowercase().replace(' ', "_"),
            card.set_code.to_lowercase()
        ),
        name: card.name.clone(),
        edition: card.set_name.clone(),
        official_image_url,
        art_crop_url: top_uris.art_crop.unwrap_or_default(),
        border_crop_url: top_uris.border_crop.unwrap_or_default(),
        description: oracle_text,
        flavor_text: card.flavor_text.clone(),
        rarity: capitalize(&card.rarity),
        rarity_code: card.rarity.clone(),
        type_line,
        mana_cost,
        cmc: card.cmc as i64,
        power,
        toughness,
        colors: card.colors.clone(),
        color_identity: card.color_identity.clone(),
        set_code: card.set_code.clone(),
        set_name: card.set_name.clone(),
        collector_number: card.collector_number.clone(),
        artist: card.artist.clone(),
        keywords: card.keywords.clone(),
        layout: card.layout.clone(),
        released_at: card.released_at.clone(),
        legalities: card.legalities.clone(),
        edhrec_rank: card.edhrec_rank,
        penny_rank: card.penny_rank,
        scryfall_uri: card.scryfall_uri.clone(),
        tcgplayer_id: card.tcgplayer_id,
        prices,
        scanned_at: None,
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
