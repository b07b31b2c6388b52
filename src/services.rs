mod func;
mod injectable;
mod interface;
mod lifetime;
mod registration;
mod service;

pub use func::*;
pub use injectable::*;
pub use interface::*;
pub use lifetime::*;
pub use registration::*;
pub use service::*;
