pub mod csrf;
pub mod focus;
pub mod registry;
pub mod resolver;
pub mod status;
