use std::io;
use std::path::Path;
use std::process::{Command, Stdio};
use sysinfo::{Pid, ProcessStatus, ProcessesToUpdate, System};
use tracing::debug;

/// Weak reference to an OS process, used only for liveness polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessHandle {
    pid: u32,
}

impl ProcessHandle {
    pub const fn new(pid: u32) -> Self {
        Self {
            pid,
        }
    }

    pub fn current() -> Self {
        Self::new(std::process::id())
    }

    pub const fn pid(&self) -> u32 {
        self.pid
    }

    /// Whether the process exists and has not terminated.
    ///
    /// Zombies count as gone: their executable is no longer in use.
    pub fn is_alive(&self) -> bool {
        let pid = Pid::from_u32(self.pid);
        let mut system = System::new();
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);

        match system.process(pid) {
            Some(process) => !matches!(process.status(), ProcessStatus::Zombie | ProcessStatus::Dead),
            None => false,
        }
    }
}

/// Start `program` detached from the current process.
///
/// The child gets its own process group, null stdio and `cwd` as working
/// directory, so it outlives the caller and holds none of its handles.
/// Returns the child's pid.
pub fn spawn_detached(program: &Path, args: &[&str], cwd: &Path) -> io::Result<u32> {
    let mut command = base_command(program, args, cwd);
    command.stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::null());

    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        command.creation_flags(crate::constants::DETACHED_CREATION_FLAGS);
    }

    spawn(command, program)
}

/// Start `program` in its own process group while keeping the console.
///
/// Used for the updater so its progress stays visible after the launcher
/// has exited, without a Ctrl-C in the launcher's terminal reaching it.
pub fn spawn_in_new_group(program: &Path, args: &[&str], cwd: &Path) -> io::Result<u32> {
    #[allow(unused_mut)]
    let mut command = base_command(program, args, cwd);

    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        command.creation_flags(crate::constants::NEW_PROCESS_GROUP_FLAG);
    }

    spawn(command, program)
}

fn base_command(program: &Path, args: &[&str], cwd: &Path) -> Command {
    let mut command = Command::new(program);
    command.args(args).current_dir(cwd);

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }

    command
}

fn spawn(mut command: Command, program: &Path) -> io::Result<u32> {
    let child = command.spawn()?;
    debug!("Spawned {} as pid {}", program.display(), child.id());
    Ok(child.id())
}
