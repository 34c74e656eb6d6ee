//! Data types shared by the worker, its collaborators and the differs.

mod row;
mod tablet;

pub use row::*;
pub use tablet::*;
