pub mod customer;
pub mod resource;
pub mod store;

pub use customer::{Customer, CustomerState};
pub use resource::Resource;
pub use store::EntityStore;
