pub mod constants;
pub mod crypto;
pub mod mode;
pub mod pdf;
pub mod request;
pub mod response;
pub mod types;
