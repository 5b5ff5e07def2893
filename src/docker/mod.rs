mod client;
mod exec;
mod pool;

pub use client::DockerClient;
pub use exec::{exec_with_limits, ExecError, ExecLimits};
pub use pool::ContainerPool;
