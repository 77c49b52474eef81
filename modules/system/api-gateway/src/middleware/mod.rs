pub mod identity_propagation;
pub mod path_validation;
pub mod request_id;
pub mod security_context;
