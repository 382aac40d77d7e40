//! Command implementations

pub mod deploy;
pub mod status;
pub mod stop;
pub mod validate;
