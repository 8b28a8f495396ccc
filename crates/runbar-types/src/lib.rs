pub mod choice;
pub mod run;
pub mod runtime;
pub mod task;

pub use choice::*;
pub use run::*;
pub use runtime::*;
pub use task::*;
