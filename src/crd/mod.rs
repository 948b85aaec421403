pub mod legacy;
pub mod registry;
