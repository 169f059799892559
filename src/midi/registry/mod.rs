pub mod inmem;
pub mod model;
