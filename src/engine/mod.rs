pub mod authz;
pub mod error;
pub mod events;
pub mod lifecycle;

pub use authz::Principal;
pub use error::{AuthzAxis, EngineError};
pub use events::TransitionEvent;
pub use lifecycle::{Engine, Transition};
