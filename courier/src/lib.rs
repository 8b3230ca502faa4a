pub mod backends;
pub mod controller;
