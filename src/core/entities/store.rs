use super::customer::{Customer, CustomerState};
use super::resource::Resource;
use crate::core::errors::{SimError, SimResult};
use crate::core::types::{CustomerId, ResourceId};
use serde::{Deserialize, Serialize};

const CUSTOMER_NAMES: [&str; 15] = [
    "Customer_A", "Customer_B", "Customer_C", "Customer_D", "Customer_E",
    "Customer_F", "Customer_G", "Customer_H", "Customer_I", "Customer_J",
    "Customer_K", "Customer_L", "Customer_M", "Customer_N", "Customer_O",
];

const RESOURCE_NAMES: [&str; 12] = [
    "Cart_Lock", "Payment_Gateway", "Inventory_DB", "Order_Processor",
    "Shipping_Service", "Coupon_Engine", "Wallet_Service", "Auth_Token",
    "Session_Manager", "Cache_Store", "Search_Index", "Notification_Queue",
];

fn customer_name(index: usize) -> String {
    CUSTOMER_NAMES
        .get(index)
        .map(|name| name.to_string())
        .unwrap_or_else(|| format!("Customer_{}", index))
}

fn resource_name(index: usize) -> String {
    RESOURCE_NAMES
        .get(index)
        .map(|name| name.to_string())
        .unwrap_or_else(|| format!("Resource_{}", index))
}

/// Deterministic Banker claim: a window of `claim_size` resources starting at
/// the customer's own index.
fn default_claim(customer: usize, resource_count: usize, claim_size: usize) -> Vec<ResourceId> {
    if resource_count == 0 {
        return Vec::new();
    }
    let size = claim_size.min(resource_count);
    let mut claim: Vec<ResourceId> = (0..size)
        .map(|offset| ResourceId((customer + offset) % resource_count))
        .collect();
    claim.sort();
    claim
}

/// Owns every customer and resource and keeps holds/waits symmetric
///
/// All mutation of entity state goes through the mutators below so that
/// `r ∈ c.holding ⇔ r.owner == c` and `c.waiting == r ⇔ c ∈ r.wait_queue`
/// hold after every call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityStore {
    customers: Vec<Customer>,
    resources: Vec<Resource>,
}

impl EntityStore {
    /// Build a store from explicit entities; ids must match positions
    pub fn new(customers: Vec<Customer>, resources: Vec<Resource>) -> SimResult<Self> {
        let store = Self {
            customers,
            resources,
        };
        for (index, customer) in store.customers.iter().enumerate() {
            if customer.id.index() != index {
                return Err(SimError::UnknownCustomer(customer.id));
            }
        }
        for (index, resource) in store.resources.iter().enumerate() {
            if resource.id.index() != index {
                return Err(SimError::UnknownResource(resource.id));
            }
        }
        store.check_invariants()?;
        Ok(store)
    }

    /// Default roster: idle customers with empty holdings and free resources
    pub fn with_defaults(customer_count: usize, resource_count: usize, claim_size: usize) -> Self {
        let resources = (0..resource_count)
            .map(|i| Resource::new(ResourceId(i), resource_name(i)))
            .collect();
        let customers = (0..customer_count)
            .map(|i| {
                Customer::new(CustomerId(i), customer_name(i))
                    .with_claim(default_claim(i, resource_count, claim_size))
            })
            .collect();
        Self {
            customers,
            resources,
        }
    }

    /// Append a new customer to the roster
    pub fn push_customer(&mut self, state: CustomerState, claim_size: usize) -> CustomerId {
        let index = self.customers.len();
        let id = CustomerId(index);
        let customer = Customer::new(id, customer_name(index))
            .with_claim(default_claim(index, self.resources.len(), claim_size))
            .with_state(state);
        self.customers.push(customer);
        id
    }

    pub fn customers(&self) -> &[Customer] {
        &self.customers
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn customer(&self, id: CustomerId) -> SimResult<&Customer> {
        self.customers.get(id.0).ok_or(SimError::UnknownCustomer(id))
    }

    pub fn resource(&self, id: ResourceId) -> SimResult<&Resource> {
        self.resources.get(id.0).ok_or(SimError::UnknownResource(id))
    }

    pub(crate) fn customer_mut(&mut self, id: CustomerId) -> SimResult<&mut Customer> {
        self.customers.get_mut(id.0).ok_or(SimError::UnknownCustomer(id))
    }

    pub(crate) fn resource_mut(&mut self, id: ResourceId) -> SimResult<&mut Resource> {
        self.resources.get_mut(id.0).ok_or(SimError::UnknownResource(id))
    }

    pub(crate) fn set_state(&mut self, id: CustomerId, state: CustomerState) -> SimResult<()> {
        self.customer_mut(id)?.state = state;
        Ok(())
    }

    /// Give `resource` to `customer`
    pub fn grant(&mut self, resource: ResourceId, customer: CustomerId) -> SimResult<()> {
        let res = self.resource(resource)?;
        let cust = self.customer(customer)?;
        if cust.holds(resource) || res.owner == Some(customer) {
            return Err(SimError::AlreadyHeld(customer, resource));
        }
        if !res.is_free() {
            return Err(SimError::CapacityExceeded(resource));
        }

        let res = self.resource_mut(resource)?;
        res.current_instances += 1;
        res.owner = Some(customer);
        self.customer_mut(customer)?.holding.push(resource);
        Ok(())
    }

    /// Take `resource` back from `customer`
    pub fn release(&mut self, resource: ResourceId, customer: CustomerId) -> SimResult<()> {
        let res = self.resource(resource)?;
        let cust = self.customer(customer)?;
        if !cust.holds(resource) || res.owner != Some(customer) {
            return Err(SimError::NotHeld(customer, resource));
        }

        let res = self.resource_mut(resource)?;
        res.current_instances -= 1;
        res.owner = None;
        self.customer_mut(customer)?.holding.retain(|r| *r != resource);
        Ok(())
    }

    /// Block `customer` on `resource`, which must be held by another customer
    pub fn enqueue_wait(&mut self, resource: ResourceId, customer: CustomerId) -> SimResult<()> {
        let res = self.resource(resource)?;
        let cust = self.customer(customer)?;
        if let Some(current) = cust.waiting {
            return Err(SimError::AlreadyWaiting(customer, current));
        }
        match res.owner {
            None => return Err(SimError::WaitOnFreeResource(customer, resource)),
            Some(owner) if owner == customer => {
                return Err(SimError::WaitOnOwnResource(customer, resource))
            }
            Some(_) => {}
        }

        let res = self.resource_mut(resource)?;
        if !res.wait_queue.contains(&customer) {
            res.wait_queue.push(customer);
        }
        self.customer_mut(customer)?.waiting = Some(resource);
        Ok(())
    }

    /// Drop `customer`'s wait, returning the resource it was blocked on
    pub fn clear_wait(&mut self, customer: CustomerId) -> SimResult<Option<ResourceId>> {
        let target = self.customer_mut(customer)?.waiting.take();
        if let Some(resource) = target {
            self.resource_mut(resource)?
                .wait_queue
                .retain(|c| *c != customer);
        }
        Ok(target)
    }

    /// Unblock every customer queued on `resource`; they return to `running`
    pub fn wake_waiters(&mut self, resource: ResourceId) -> SimResult<Vec<CustomerId>> {
        let waiters = self.resource(resource)?.wait_queue.clone();
        for waiter in &waiters {
            self.clear_wait(*waiter)?;
            self.set_state(*waiter, CustomerState::Running)?;
        }
        Ok(waiters)
    }

    /// Resources that are not at capacity
    pub fn free_resources(&self) -> impl Iterator<Item = &Resource> {
        self.resources.iter().filter(|r| r.is_free())
    }

    pub fn free_count(&self) -> usize {
        self.free_resources().count()
    }

    pub fn waiting_count(&self) -> usize {
        self.customers.iter().filter(|c| c.waiting.is_some()).count()
    }

    /// Verify the holds/waits symmetry and per-state invariants
    pub fn check_invariants(&self) -> SimResult<()> {
        for resource in &self.resources {
            if resource.current_instances > resource.max_instances {
                return Err(SimError::CapacityExceeded(resource.id));
            }
            match resource.owner {
                Some(owner) => {
                    let customer = self.customer(owner)?;
                    if !customer.holds(resource.id) || resource.current_instances == 0 {
                        return Err(SimError::NotHeld(owner, resource.id));
                    }
                }
                None => {
                    if resource.current_instances != 0 {
                        return Err(SimError::CapacityExceeded(resource.id));
                    }
                    if let Some(waiter) = resource.wait_queue.first() {
                        return Err(SimError::WaitOnFreeResource(*waiter, resource.id));
                    }
                }
            }
            for waiter in &resource.wait_queue {
                if self.customer(*waiter)?.waiting != Some(resource.id) {
                    return Err(SimError::BrokenInvariant(format!(
                        "{} queued on {} without waiting on it",
                        waiter, resource.id
                    )));
                }
            }
        }

        for customer in &self.customers {
            for (i, held) in customer.holding.iter().enumerate() {
                if customer.holding[..i].contains(held) {
                    return Err(SimError::AlreadyHeld(customer.id, *held));
                }
                if self.resource(*held)?.owner != Some(customer.id) {
                    return Err(SimError::NotHeld(customer.id, *held));
                }
            }
            match customer.waiting {
                Some(target) => {
                    let resource = self.resource(target)?;
                    if !resource.is_held_by_other(customer.id) {
                        return Err(SimError::WaitOnFreeResource(customer.id, target));
                    }
                    if !resource.wait_queue.contains(&customer.id) {
                        return Err(SimError::BrokenInvariant(format!(
                            "{} waits on {} but is not queued",
                            customer.id, target
                        )));
                    }
                    if !customer.state.is_blocked() {
                        return Err(SimError::BrokenInvariant(format!(
                            "{} waits on {} while {}",
                            customer.id, target, customer.state
                        )));
                    }
                }
                None => {
                    if customer.state.is_blocked() {
                        return Err(SimError::BrokenInvariant(format!(
                            "{} is {} without a wait target",
                            customer.id, customer.state
                        )));
                    }
                }
            }
            if customer.state == CustomerState::Idle && !customer.holding.is_empty() {
                return Err(SimError::BrokenInvariant(format!(
                    "{} is idle while holding resources",
                    customer.id
                )));
            }
        }
        Ok(())
    }
}
