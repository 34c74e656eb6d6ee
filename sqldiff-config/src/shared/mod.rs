mod base;
mod source;
mod worker;

pub use base::*;
pub use source::*;
pub use worker::*;
