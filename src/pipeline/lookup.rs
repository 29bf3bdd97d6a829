//! Lookup stage: turn an extracted name into a full card payload.
//!
//! Exact match first, fuzzy second — the extractor's output is usually the
//! printed name verbatim, but a one-character misread should still land on
//! the right card. Prices are fetched best-effort after a successful match;
//! a price failure degrades to zeroed prices rather than failing the scan.

use crate::error::ScanError;
use crate::scryfall::{format_card, CardCatalog, CardPayload, CardPrices, CatalogError};

/// Resolve `name` against the card database.
///
/// Both returned error variants are recoverable by the orchestrator:
/// [`ScanError::CardNotFound`] when neither lookup matched,
/// [`ScanError::Lookup`] on transport failure.
pub async fn lookup_card(
    catalog: &dyn CardCatalog,
    name: &str,
) -> Result<CardPayload, ScanError> {
    let record = match catalog.named_exact(name).await {
        Ok(record) => record,
        Err(CatalogError::NotFound) => {
            tracing::debug!(card = name, "exact lookup missed, trying fuzzy");
            match catalog.named_fuzzy(name).await {
                Ok(record) => record,
                Err(CatalogError::NotFound) => {
                    return Err(ScanError::CardNotFound {
                        name: name.to_string(),
                    });
                }
                Err(CatalogError::Http(message)) => return Err(ScanError::Lookup { message }),
            }
        }
        Err(CatalogError::Http(message)) => return Err(ScanError::Lookup { message }),
    };

    let prices = match catalog
        .prices(&record.name, Some(&record.set_code))
        .await
    {
        Ok(prices) => prices,
        Err(e) => {
            tracing::warn!(card = %record.name, error = %e, "price lookup failed, using zeroed prices");
            CardPrices::zeroed()
        }
    };

    Ok(format_card(&record, prices))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scryfall::ScryfallCard;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FakeCatalog {
        exact: Option<ScryfallCard>,
        fuzzy: Option<ScryfallCard>,
        price_fails: bool,
        exact_calls: AtomicU32,
        fuzzy_calls: AtomicU32,
    }

    impl FakeCatalog {
        fn new(exact: Option<ScryfallCard>, fuzzy: Option<ScryfallCard>) -> Self {
            Self {
                exact,
                fuzzy,
                price_fails: false,
                exact_calls: AtomicU32::new(0),
                fuzzy_calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl CardCatalog for FakeCatalog {
        async fn named_exact(&self, _name: &str) -> Result<ScryfallCard, CatalogError> {
            self.exact_calls.fetch_add(1, Ordering::SeqCst);
            self.exact.clone().ok_or(CatalogError::NotFound)
        }

        async fn named_fuzzy(&self, _name: &str) -> Result<ScryfallCard, CatalogError> {
            self.fuzzy_calls.fetch_add(1, Ordering::SeqCst);
            self.fuzzy.clone().ok_or(CatalogError::NotFound)
        }

        async fn prices(
            &self,
            _name: &str,
            _set_code: Option<&str>,
        ) -> Result<CardPrices, CatalogError> {
            if self.price_fails {
                Err(CatalogError::Http("price service down".into()))
            } else {
                Ok(CardPrices {
                    tcgplayer: 2.5,
                    ligamagic: 12.5,
                })
            }
        }
    }

    fn card(name: &str) -> ScryfallCard {
        serde_json::from_value(serde_json::json!({
            "name": name,
            "set": "lea",
            "set_name": "Limited Edition Alpha",
            "rarity": "rare",
            "type_line": "Instant"
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn exact_hit_skips_fuzzy() {
        let catalog = FakeCatalog::new(Some(card("Counterspell")), None);
        let payload = lookup_card(&catalog, "Counterspell").await.unwrap();
        assert_eq!(payload.name, "Counterspell");
        assert_eq!(catalog.fuzzy_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn exact_miss_falls_through_to_fuzzy() {
        let catalog = FakeCatalog::new(None, Some(card("Counterspell")));
        let payload = lookup_card(&catalog, "Counterspel").await.unwrap();
        assert_eq!(payload.name, "Counterspell");
        assert_eq!(catalog.exact_calls.load(Ordering::SeqCst), 1);
        assert_eq!(catalog.fuzzy_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn both_misses_yield_card_not_found() {
        let catalog = FakeCatalog::new(None, None);
        let err = lookup_card(&catalog, "Noncard Name").await.unwrap_err();
        assert!(matches!(err, ScanError::CardNotFound { .. }));
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn price_failure_degrades_to_zeroed() {
        let mut catalog = FakeCatalog::new(Some(card("Counterspell")), None);
        catalog.price_fails = true;
        let payload = lookup_card(&catalog, "Counterspell").await.unwrap();
        assert_eq!(payload.prices, CardPrices::zeroed());
    }

    #[tokio::test]
    async fn successful_lookup_attaches_prices() {
        let catalog = FakeCatalog::new(Some(card("Counterspell")), None);
        let payload = lookup_card(&catalog, "Counterspell").await.unwrap();
        assert_eq!(payload.prices.tcgplayer, 2.5);
        assert_eq!(payload.prices.ligamagic, 12.5);
    }
}
