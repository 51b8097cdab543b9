mod coordinator;
mod link;
mod pump;

pub use coordinator::*;
pub use link::*;
pub use pump::*;
