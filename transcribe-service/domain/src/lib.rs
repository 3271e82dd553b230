pub mod artifact;
pub mod entity;
pub mod error;
pub mod port;

pub use artifact::*;
pub use entity::*;
pub use error::*;
pub use port::*;
