#[cfg(feature = "midir-output")]
pub mod midir;
pub mod stubs;
