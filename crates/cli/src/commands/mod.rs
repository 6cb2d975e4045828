pub mod gateway;
pub mod utils;

pub use gateway::{organic_request, register_user};
