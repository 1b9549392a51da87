use super::{CatalogModel, EntityKind, DISTANCE_FIELD};
use crate::domain::identity::Role;
use crate::storage::document::Document;

/// Nurseries are listed and maintained by vendors.
pub struct NurseryModel;

impl CatalogModel for NurseryModel {
    fn kind(&self) -> EntityKind {
        EntityKind::Nursery
    }

    fn managing_role(&self) -> Role {
        Role::Vendor
    }

    fn validate_fields(&self, payload: &Document) -> Result<(), String> {
        if let Some(distance) = payload.get(DISTANCE_FIELD) {
            if distance.as_f64().map(|d| d < 0.0).unwrap_or(true) {
                return Err("distance must be a non-negative number of miles".to_string());
            }
        }
        Ok(())
    }
}

/// Plants are added by admins; any signed-in user may edit them.
pub struct PlantModel;

impl CatalogModel for PlantModel {
    fn kind(&self) -> EntityKind {
        EntityKind::Plant
    }

    fn managing_role(&self) -> Role {
        Role::Admin
    }

    fn updating_role(&self) -> Option<Role> {
        None
    }

    fn validate_fields(&self, payload: &Document) -> Result<(), String> {
        check_stock(payload)
    }
}

/// Products (pots, tools, soil...) are sold by vendors.
pub struct ProductModel;

impl CatalogModel for ProductModel {
    fn kind(&self) -> EntityKind {
        EntityKind::Product
    }

    fn managing_role(&self) -> Role {
        Role::Vendor
    }

    fn validate_fields(&self, payload: &Document) -> Result<(), String> {
        check_stock(payload)
    }
}

fn check_stock(payload: &Document) -> Result<(), String> {
    if let Some(quantity) = payload.get("quantity") {
        if quantity.as_i64().unwrap_or(-1) < 0 {
            return Err("quantity must be a non-negative integer".to_string());
        }
    }
    if let Some(price) = payload.get("price") {
        if price.as_f64().map(|p| p < 0.0).unwrap_or(true) {
            return Err("price must be a non-negative number".to_string());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(v: serde_json::Value) -> Document {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn every_model_requires_a_name() {
        let empty = doc(json!({ "description": "no name" }));
        assert!(NurseryModel.validate_create_payload(&empty).is_err());
        assert!(PlantModel.validate_create_payload(&empty).is_err());
        assert!(ProductModel.validate_create_payload(&empty).is_err());

        let blank = doc(json!({ "name": "   " }));
        assert!(NurseryModel.validate_create_payload(&blank).is_err());
    }

    #[test]
    fn stock_fields_must_be_non_negative() {
        let ok = doc(json!({ "name": "Monstera", "price": 12.5, "quantity": 3 }));
        assert!(PlantModel.validate_create_payload(&ok).is_ok());

        let bad = doc(json!({ "name": "Monstera", "quantity": -1 }));
        assert!(PlantModel.validate_create_payload(&bad).is_err());

        let bad = doc(json!({ "price": "cheap" }));
        assert!(ProductModel.validate_update_payload(&bad).is_err());
    }

    #[test]
    fn roles_and_collections() {
        assert_eq!(NurseryModel.managing_role(), Role::Vendor);
        assert_eq!(PlantModel.managing_role(), Role::Admin);
        assert_eq!(ProductModel.collection(), "products");
    }

    #[test]
    fn plants_are_editable_by_anyone_signed_in() {
        assert_eq!(NurseryModel.updating_role(), Some(Role::Vendor));
        assert_eq!(ProductModel.updating_role(), Some(Role::Vendor));
        assert_eq!(PlantModel.updating_role(), None);
    }

    #[test]
    fn stock_checks_apply_on_create_and_update_alike() {
        let named = doc(json!({ "name": "Pot", "price": -2 }));
        assert!(ProductModel.validate_create_payload(&named).is_err());
        assert!(ProductModel.validate_update_payload(&named).is_err());
        // Nurseries carry no stock.
        assert!(NurseryModel.validate_create_payload(&named).is_ok());
    }

    #[test]
    fn nursery_distance_is_non_negative_miles() {
        let ok = doc(json!({ "name": "Corner", "distance": 1.5 }));
        assert!(NurseryModel.validate_create_payload(&ok).is_ok());
        let text = doc(json!({ "distance": "1.5 miles" }));
        assert!(NurseryModel.validate_update_payload(&text).is_err());
        let negative = doc(json!({ "distance": -1 }));
        assert!(NurseryModel.validate_update_payload(&negative).is_err());
    }
}
