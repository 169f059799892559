pub mod control;
pub mod controller;
pub mod mapping;
pub mod model;
pub mod registry;
