pub mod refresh;
pub mod register;

pub use refresh::{run_refresh_loop, LoopPhase, RefreshConfig, RefreshTask};
pub use register::{FeedHealth, FeedStatus, SnapshotRegister};
