use crate::core::entities::Customer;
use crate::core::types::ResourceId;

/// Resource-ordering rule used by prevention mode
///
/// A customer may only request a resource whose ordinal is strictly greater
/// than every ordinal it already holds. Vacuously true when holding nothing.
pub fn is_order_admissible(customer: &Customer, candidate: ResourceId) -> bool {
    match customer.max_held_ordinal() {
        Some(max) => candidate.ordinal() > max,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::entities::EntityStore;
    use crate::core::types::CustomerId;

    #[test]
    fn test_empty_holding_admits_everything() {
        let store = EntityStore::with_defaults(1, 4, 2);
        let customer = store.customer(CustomerId::new(0)).unwrap();
        assert!((0..4).all(|i| is_order_admissible(customer, ResourceId::new(i))));
    }

    #[test]
    fn test_only_higher_ordinals_admitted() {
        let mut store = EntityStore::with_defaults(1, 4, 2);
        store.grant(ResourceId::new(2), CustomerId::new(0)).unwrap();
        let customer = store.customer(CustomerId::new(0)).unwrap();

        assert!(!is_order_admissible(customer, ResourceId::new(0)));
        assert!(!is_order_admissible(customer, ResourceId::new(2)));
        assert!(is_order_admissible(customer, ResourceId::new(3)));
    }
}
