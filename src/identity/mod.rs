#[cfg(test)]
pub mod memory;
mod model;
pub mod pg;
mod store;

pub use model::{
    Identity, IdentityChanges, IdentityCounts, IdentityFilter, NewIdentity, NewSellerProfile,
    ProfileChange, Role, SearchTerm, SellerProfile, SellerProfileChanges, Status,
};
pub use store::{IdentityStore, StoreError, UniqueField, UniqueProbe};
