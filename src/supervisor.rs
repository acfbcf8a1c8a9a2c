//! Process supervision: topology selection, shared-port binding, and the
//! cluster loop that keeps sibling workers accounted for.
//!
//! Workers are full OS processes (the supervisor re-spawns its own binary
//! with a hidden worker flag) and share the listening port through
//! `SO_REUSEPORT`, so one worker crashing leaves the remaining workers
//! accepting connections. There is no automatic restart: a crashed worker
//! reduces capacity until the operator intervenes.

use clap::ValueEnum;
use socket2::{Domain, Protocol, Socket, Type};
use std::net::SocketAddr;
use std::path::Path;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::error::Result;

/// Process topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// One worker process.
    Fork,
    /// One worker process per CPU core, all sharing the port.
    Cluster,
}

/// Worker count used when none is given: one per available core.
pub fn default_workers() -> usize {
    std::thread::available_parallelism().map(usize::from).unwrap_or(1)
}

/// Bind a listener that sibling worker processes can share.
///
/// `SO_REUSEPORT` is the kernel primitive that distributes accepted
/// connections across every process bound to the address.
pub fn bind_shared(addr: SocketAddr) -> std::io::Result<std::net::TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    socket.set_reuse_port(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(1024)?;
    Ok(socket.into())
}

/// Run the cluster: spawn `workers` children of the current binary and wait
/// on them, logging each exit.
pub async fn run(port: u16, workers: usize, data_dir: Option<&Path>) -> Result<()> {
    let exe = std::env::current_exe()?;
    let mut children = JoinSet::new();

    for index in 0..workers {
        let mut command = tokio::process::Command::new(&exe);
        command.arg("--worker").args(["--mode", "cluster"]).args(["--port", &port.to_string()]);
        if let Some(dir) = data_dir {
            command.arg("--data-dir").arg(dir);
        }
        let mut child = command.spawn()?;
        info!("worker {index} started (pid {:?})", child.id());
        children.spawn(async move { (index, child.wait().await) });
    }

    // A worker exit degrades capacity but never takes the supervisor down;
    // the kernel keeps routing new connections to the survivors.
    while let Some(joined) = children.join_next().await {
        match joined {
            Ok((index, Ok(status))) => warn!("worker {index} exited ({status}); capacity reduced"),
            Ok((index, Err(e))) => warn!("worker {index} became unwaitable: {e}"),
            Err(e) => warn!("supervisor join error: {e}"),
        }
    }

    info!("all workers exited");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_worker_count_is_positive() {
        assert!(default_workers() >= 1);
    }

    #[cfg(unix)]
    #[test]
    fn shared_port_can_be_bound_twice() {
        let first = bind_shared("127.0.0.1:0".parse().unwrap()).unwrap();
        let port = first.local_addr().unwrap().port();

        let addr: SocketAddr = format!("127.0.0.1:{port}").parse().unwrap();
        let second = bind_shared(addr);
        assert!(second.is_ok(), "second bind on the shared port failed: {second:?}");
    }
}
