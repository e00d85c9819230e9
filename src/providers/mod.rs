pub mod hosted_auth;
pub mod memory_store;
pub mod rest_store;

pub use hosted_auth::HostedAuthProvider;
pub use memory_store::MemoryContentStore;
pub use rest_store::RestContentStore;
