//! Order types shared between the server and the apps

pub mod types;

pub use types::*;
