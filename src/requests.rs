mod dependency;
mod info;
mod introspector;

pub use dependency::*;
pub use info::*;
pub use introspector::*;
