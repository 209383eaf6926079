pub mod analysis;
pub mod sections;
pub mod user;
