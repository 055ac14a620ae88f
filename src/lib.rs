// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # pcsx2-helper-bot
//!
//! A forum helper bot for r/PCSX2. Users summon it with a phrase such as
//! `CPUBot!` followed by comma-separated search terms; the bot resolves each
//! term against a scraped catalog (PassMark CPU/GPU lists, the PCSX2 wiki)
//! and posts one composed reply.
//!
//! ## Architecture
//!
//! - **Commands** (`command`): summon-phrase detection and term extraction
//! - **Catalogs** (`catalog`): scraped listings and per-entry detail pages
//! - **Resolution** (`normalize`, `similarity`, `resolve`): fuzzy matching
//!   with a two-stage prefilter/acceptance pipeline
//! - **Replies** (`compose`, `responder`): markdown rendering and tier tables
//! - **Service** (`dispatch`, `backoff`, `transport`): the comment loop, rate
//!   limit recovery, and the supervisor that restarts it
//!
//! ## Library usage
//!
//! ```no_run
//! use pcsx2_helper_bot::catalog::{Catalog, CatalogEntry};
//! use pcsx2_helper_bot::resolve::{EntityResolver, ResolverConfig};
//!
//! let catalog = Catalog::from_entries([
//!     CatalogEntry::new("AMD Ryzen 5 3600", "https://www.cpubenchmark.net/cpu.php?id=3481"),
//! ]);
//! let resolver = EntityResolver::new(ResolverConfig::default()).unwrap();
//! assert!(resolver.resolve("ryzen 5 3600", &catalog).is_matched());
//! ```

pub mod backoff;
pub mod catalog;
pub mod command;
pub mod compose;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod normalize;
pub mod resolve;
pub mod responder;
pub mod similarity;
pub mod transport;
