//! Card-scanning backend for Magic: The Gathering.
//!
//! A photo of a card goes in; a structured card record comes out. The
//! pipeline:
//!
//! ```text
//! ┌────────┐   ┌───────────┐   ┌────────┐   ┌─────────┐   ┌──────────┐
//! │ upload │──▶│ normalize │──▶│ vision │──▶│ extract │──▶│  lookup  │
//! │ (HTTP) │   │ (resize,  │   │ (Gemini│   │ (name   │   │(Scryfall)│
//! └────────┘   │ re-encode)│   │  call) │   │ rules)  │   └──────────┘
//!              └───────────┘   └────────┘   └─────────┘
//! ```
//!
//! Two seams keep the pipeline testable without network access:
//! [`pipeline::vision::VisionModel`] for the vision provider and
//! [`scryfall::CardCatalog`] for the card database. The production impls
//! are [`gemini::GeminiClient`] and [`scryfall::ScryfallClient`].
//!
//! The central degradation rule: once the model has described the image, a
//! failed database lookup never fails the scan — the response carries the
//! description alone with `data_source = "gemini_only"`.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use mtg_card_scanner::{GeminiClient, ScanConfig, Scanner, ScryfallClient};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), mtg_card_scanner::ScanError> {
//! let config = ScanConfig::builder().gemini_api_key("...").build()?;
//! let vision = Arc::new(GeminiClient::new(&config));
//! let catalog = Arc::new(ScryfallClient::new(&config.scryfall_base_url));
//! let scanner = Scanner::new(config, vision, catalog);
//! # let _ = scanner;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod extract;
pub mod gemini;
pub mod pipeline;
pub mod prompts;
pub mod scan;
pub mod scryfall;
pub mod server;

pub use config::{ScanConfig, ScanConfigBuilder};
pub use error::ScanError;
pub use gemini::GeminiClient;
pub use scan::{DataSource, ScanRequest, ScanResponse, Scanner};
pub use scryfall::{CardCatalog, CardPayload, ScryfallClient};
pub use server::{router, AppState};
