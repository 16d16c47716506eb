pub mod roles;

pub use roles::{InMemoryRoleStore, RoleStore};
