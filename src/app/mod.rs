pub mod catalog_service;
pub mod review_ledger;

pub use catalog_service::{CatalogService, OwnedEntity};
pub use review_ledger::{PostedReview, ReviewLedger};

use crate::error::CatalogError;

/// Parses a client-supplied identifier into the canonical stored form.
///
/// Identifiers are UUIDs; anything else is an `InvalidArgument`.
pub fn parse_id(raw: &str, what: &str) -> Result<String, CatalogError> {
    uuid::Uuid::parse_str(raw.trim())
        .map(|id| id.to_string())
        .map_err(|_| CatalogError::InvalidArgument(format!("{} id '{}' is malformed", what, raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_canonicalized() {
        let id = parse_id(" 6F9619FF-8B86-D011-B42D-00C04FC964FF ", "Nursery").unwrap();
        assert_eq!(id, "6f9619ff-8b86-d011-b42d-00c04fc964ff");
    }

    #[test]
    fn malformed_ids_are_invalid_arguments() {
        let err = parse_id("not-an-id", "Plant").unwrap_err();
        assert!(matches!(err, CatalogError::InvalidArgument(_)));
    }
}
