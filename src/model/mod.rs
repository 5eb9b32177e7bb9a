pub mod filter;
pub mod permission;
pub mod request;
pub mod role;
