//! The file session: one open file, its offset, and the callers suspended
//! by nested file calls.

pub mod engine;
pub mod events;
mod machine;
pub mod procedure;
pub mod reader;
pub mod types;

pub use engine::{SessionApplyResult, SessionEngine};
pub use events::SessionEvent;
pub use procedure::{ProcedureFrame, ProcedureStack};
pub use reader::{CardReader, Line};
pub use types::{SessionApplyStatus, SessionMode};
