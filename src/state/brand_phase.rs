//! Per-brand crawl phase
//!
//! Each target brand moves through `Resolving -> Listing -> Extracting* -> Done`.
//! A brand with no candidate links goes straight from `Listing` to `Done`.

use crate::CatalogError;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BrandPhase {
    /// Brand entry is being matched against the site's brand index
    Resolving,

    /// Listing pages are being walked for candidate links
    Listing,

    /// Candidate links are being extracted and persisted
    Extracting {
        /// Candidates handled so far
        done: usize,
        /// Candidates found while listing
        total: usize,
    },

    /// Nothing left to do for this brand
    Done,
}

impl BrandPhase {
    /// Returns true if `next` is a legal successor of this phase
    pub fn can_transition_to(&self, next: &BrandPhase) -> bool {
        match (self, next) {
            (Self::Resolving, Self::Listing) => true,
            (Self::Listing, Self::Extracting { done: 0, .. }) => true,
            (Self::Listing, Self::Done) => true,
            (
                Self::Extracting { done, total },
                Self::Extracting {
                    done: next_done,
                    total: next_total,
                },
            ) => total == next_total && *next_done == done + 1 && next_done <= next_total,
            (Self::Extracting { .. }, Self::Done) => true,
            _ => false,
        }
    }

    /// Moves to `next`, rejecting illegal transitions
    pub fn transition(self, next: BrandPhase) -> Result<BrandPhase, CatalogError> {
        if self.can_transition_to(&next) {
            tracing::trace!("Brand phase {} -> {}", self, next);
            Ok(next)
        } else {
            Err(CatalogError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}

impl fmt::Display for BrandPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resolving => write!(f, "resolving"),
            Self::Listing => write!(f, "listing"),
            Self::Extracting { done, total } => write!(f, "extracting {}/{}", done, total),
            Self::Done => write!(f, "done"),
        }
    }
}
