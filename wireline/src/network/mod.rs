mod egress;

pub use egress::*;
