pub mod product;
pub mod request;

pub use product::*;
pub use request::*;
