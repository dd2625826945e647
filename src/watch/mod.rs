mod watchable;

pub use watchable::*;
