pub mod driver;
pub mod interrupts;
pub mod runner;
pub mod state;

pub use driver::{ChainDriver, RunExecutor};
pub use interrupts::{InterruptHandle, Interrupts};
pub use runner::{ProcessSupervisor, RunOutcome, Termination};
pub use state::{ChainState, ChainStateStore};
