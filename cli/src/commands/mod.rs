pub mod login;
pub mod resolve;
pub mod search;

pub use login::login;
pub use resolve::{endpoints, resolve};
