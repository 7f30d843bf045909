pub mod dbn;
pub mod spec;

pub use dbn::Dbn;
pub use spec::{LayerSpec, NetworkSpec};
