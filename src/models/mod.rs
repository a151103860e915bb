mod bar;
mod modules;
mod snapshot;

pub use bar::{Bar, Series};
pub use modules::{Module, ModuleSet};
pub use snapshot::*;
