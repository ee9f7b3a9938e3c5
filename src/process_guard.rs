//! Lifecycle of the external tools the harness launches.
//!
//! `remote-task --wait` can block for as long as the job flow takes, and the
//! exporter writes to a shared bucket. If the harness is interrupted, those
//! children must not keep running on their own. Each tool therefore:
//!
//! - runs in its own process group (so the whole tree can be signalled)
//! - gets `PR_SET_PDEATHSIG` so it dies with the harness
//! - is tracked in a global registry while it runs
//!
//! On SIGINT/SIGTERM/SIGHUP the registered groups get SIGTERM, then SIGKILL
//! after a grace period. `process::exit` skips destructors, so temporary
//! directories registered for cleanup (the workspace, which holds the
//! exporter config with the SQL password and the decrypted export) are
//! removed explicitly before the harness exits with `128 + signal`.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use std::time::{Duration, Instant};

use nix::libc;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tracing::{debug, info, warn};

static CHILD_REGISTRY: OnceLock<Arc<Mutex<ChildRegistry>>> = OnceLock::new();

/// Grace period between SIGTERM and SIGKILL on interrupt.
pub const INTERRUPT_GRACE: Duration = Duration::from_secs(5);

/// PIDs (and process group ids) of running tools, plus directories to
/// remove if the harness is interrupted.
#[derive(Debug, Default)]
pub struct ChildRegistry {
    pids: HashSet<u32>,
    cleanup_paths: HashSet<PathBuf>,
    cleanup_initiated: bool,
}

impl ChildRegistry {
    pub fn global() -> Arc<Mutex<ChildRegistry>> {
        CHILD_REGISTRY
            .get_or_init(|| Arc::new(Mutex::new(ChildRegistry::default())))
            .clone()
    }

    pub fn register(&mut self, pid: u32) {
        self.pids.insert(pid);
        debug!("Registered child process {}", pid);
    }

    pub fn unregister(&mut self, pid: u32) {
        self.pids.remove(&pid);
        debug!("Unregistered child process {}", pid);
    }

    pub fn count(&self) -> usize {
        self.pids.len()
    }

    pub fn register_cleanup_path(&mut self, path: PathBuf) {
        debug!("Registered {} for removal on interrupt", path.display());
        self.cleanup_paths.insert(path);
    }

    pub fn unregister_cleanup_path(&mut self, path: &Path) {
        self.cleanup_paths.remove(path);
    }

    pub fn is_cleanup_path(&self, path: &Path) -> bool {
        self.cleanup_paths.contains(path)
    }

    /// Remove every registered directory tree.
    pub fn remove_cleanup_paths(&mut self) {
        for path in self.cleanup_paths.drain() {
            match fs::remove_dir_all(&path) {
                Ok(()) => info!("Removed {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
            }
        }
    }

    /// SIGTERM every tracked group, wait up to `grace_period`, then SIGKILL.
    pub fn terminate_all(&mut self, grace_period: Duration) {
        if self.cleanup_initiated {
            return;
        }
        self.cleanup_initiated = true;
        if self.pids.is_empty() {
            return;
        }

        info!("Terminating {} running tool(s)", self.pids.len());
        let pids: Vec<u32> = self.pids.iter().copied().collect();
        for &pid in &pids {
            if let Err(e) = send_signal_to_group(pid, Signal::SIGTERM) {
                warn!("SIGTERM to process group {} failed: {}", pid, e);
                let _ = send_signal(pid, Signal::SIGTERM);
            }
        }

        let start = Instant::now();
        while start.elapsed() < grace_period {
            if pids.iter().all(|&pid| !is_process_alive(pid)) {
                self.pids.clear();
                return;
            }
            std::thread::sleep(Duration::from_millis(100));
        }

        for &pid in &pids {
            if is_process_alive(pid) {
                warn!("Process group {} ignored SIGTERM, sending SIGKILL", pid);
                if send_signal_to_group(pid, Signal::SIGKILL).is_err() {
                    let _ = send_signal(pid, Signal::SIGKILL);
                }
            }
        }
        self.pids.clear();
    }
}

pub(crate) fn lock_registry(registry: &Mutex<ChildRegistry>) -> MutexGuard<'_, ChildRegistry> {
    // The registry holds plain data; a panic mid-update cannot corrupt it.
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Registration of one running child; unregisters on drop.
pub struct RegisteredChild {
    pid: u32,
    registry: Arc<Mutex<ChildRegistry>>,
}

impl RegisteredChild {
    pub fn register(pid: u32) -> Self {
        let registry = ChildRegistry::global();
        lock_registry(&registry).register(pid);
        Self { pid, registry }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }
}

impl Drop for RegisteredChild {
    fn drop(&mut self) {
        lock_registry(&self.registry).unregister(self.pid);
    }
}

fn send_signal(pid: u32, signal: Signal) -> Result<(), nix::Error> {
    signal::kill(Pid::from_raw(pid as i32), signal)
}

fn send_signal_to_group(pgid: u32, signal: Signal) -> Result<(), nix::Error> {
    signal::kill(Pid::from_raw(-(pgid as i32)), signal)
}

/// Alive and not a zombie.
fn is_process_alive(pid: u32) -> bool {
    if signal::kill(Pid::from_raw(pid as i32), None).is_err() {
        return false;
    }
    if let Ok(stat) = std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        // Third field is the state; the command name before it may contain
        // spaces, so split after the closing paren.
        if let Some(state) = stat
            .rsplit_once(')')
            .and_then(|(_, rest)| rest.split_whitespace().next())
        {
            return !matches!(state, "Z" | "X");
        }
    }
    true
}

/// Install SIGINT/SIGTERM/SIGHUP handlers. Call once at startup.
pub fn init_signal_handlers() -> Result<(), std::io::Error> {
    use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP])?;
    std::thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            warn!("Received signal {}, stopping running tools", sig);
            let registry = ChildRegistry::global();
            let mut registry = lock_registry(&registry);
            registry.terminate_all(INTERRUPT_GRACE);
            registry.remove_cleanup_paths();
            std::process::exit(128 + sig);
        }
    });
    Ok(())
}

/// Extension for `Command`: own process group, die with the parent.
pub trait CommandProcessGroup {
    fn in_new_process_group(&mut self) -> &mut Self;
}

impl CommandProcessGroup for std::process::Command {
    fn in_new_process_group(&mut self) -> &mut Self {
        use std::os::unix::process::CommandExt;

        self.process_group(0);
        // SAFETY: prctl is async-signal-safe and touches no parent state.
        unsafe {
            self.pre_exec(|| {
                if libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM) == -1 {
                    return Err(std::io::Error::last_os_error());
                }
                Ok(())
            });
        }
        self
    }
}
