use crate::identity::Role;

pub const ADMIN_ONLY: &[Role] = &[Role::Admin];
pub const SELLER_ONLY: &[Role] = &[Role::Seller];
pub const CUSTOMER_ONLY: &[Role] = &[Role::Customer];
pub const ANY_ROLE: &[Role] = &Role::ALL;

/// Landing page for each role.
pub fn dashboard(role: Role) -> &'static str {
    match role {
        Role::Admin => "/admin/dashboard",
        Role::Seller => "/seller/dashboard",
        Role::Customer => "/customer/dashboard",
    }
}

pub fn permits(allowed: &[Role], role: Role) -> bool {
    allowed.contains(&role)
}
