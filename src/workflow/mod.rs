pub mod control;
pub mod process_ctx;
pub mod process_flow;
pub mod retry;

pub use control::RunControl;
pub use process_ctx::ProcessCtx;
pub use process_flow::{ProcessFlow, ProcessHandler};
pub use retry::{run_with_retry, RetryPolicy};
