//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `BrandPhase`: Tracks where the orchestrator is for the current brand
//!   (resolving, listing, extracting, done)

mod brand_phase;

pub use brand_phase::BrandPhase;
