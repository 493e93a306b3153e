use std::io;
use std::process::{Child, Command as ProcessCommand, ExitStatus, Stdio};

use anyhow::{Context, Result, anyhow};

#[cfg(unix)]
use std::os::unix::process::CommandExt;

#[cfg(unix)]
struct ScopedSigaction {
    signum: libc::c_int,
    old_action: libc::sigaction,
}

#[cfg(unix)]
impl ScopedSigaction {
    fn ignore(signum: libc::c_int) -> Result<Self> {
        unsafe {
            let mut new_action: libc::sigaction = std::mem::zeroed();
            new_action.sa_sigaction = libc::SIG_IGN;
            libc::sigemptyset(&mut new_action.sa_mask);
            new_action.sa_flags = 0;

            let mut old_action: libc::sigaction = std::mem::zeroed();
            if libc::sigaction(signum, &new_action, &mut old_action) != 0 {
                return Err(anyhow!("failed to update signal action for {signum}"));
            }

            Ok(Self { signum, old_action })
        }
    }
}

#[cfg(unix)]
impl Drop for ScopedSigaction {
    fn drop(&mut self) {
        unsafe {
            let _ = libc::sigaction(self.signum, &self.old_action, std::ptr::null_mut());
        }
    }
}

/// Hands the terminal to the player's process group and takes it back on drop.
#[cfg(unix)]
struct TerminalHandoff {
    stdin_fd: libc::c_int,
    parent_pgrp: libc::pid_t,
    child_foreground: bool,
}

#[cfg(unix)]
impl TerminalHandoff {
    fn to_child(stdin_fd: libc::c_int, parent_pgrp: libc::pid_t, child_pgrp: libc::pid_t) -> Self {
        let child_foreground = unsafe { libc::tcsetpgrp(stdin_fd, child_pgrp) == 0 };
        Self {
            stdin_fd,
            parent_pgrp,
            child_foreground,
        }
    }
}

#[cfg(unix)]
impl Drop for TerminalHandoff {
    fn drop(&mut self) {
        if !self.child_foreground {
            return;
        }
        unsafe {
            let _ = libc::tcsetpgrp(self.stdin_fd, self.parent_pgrp);
        }
    }
}

#[cfg(unix)]
pub(crate) fn with_sigint_ignored<F, R>(f: F) -> Result<R>
where
    F: FnOnce() -> Result<R>,
{
    let _sigint_guard = ScopedSigaction::ignore(libc::SIGINT)?;
    f()
}

#[cfg(not(unix))]
pub(crate) fn with_sigint_ignored<F, R>(f: F) -> Result<R>
where
    F: FnOnce() -> Result<R>,
{
    f()
}

/// A running player process.
///
/// Foreground players own the terminal until they exit; background players
/// are detached from it and driven remotely.
pub(crate) struct PlayerProcess {
    child: Child,
    // Declared before the SIGTTOU guard: the terminal must be reclaimed while
    // SIGTTOU is still ignored.
    #[cfg(unix)]
    handoff: Option<TerminalHandoff>,
    #[cfg(unix)]
    _sigttou_guard: Option<ScopedSigaction>,
}

impl PlayerProcess {
    #[cfg(unix)]
    pub(crate) fn spawn_foreground(mut cmd: ProcessCommand) -> Result<Self> {
        cmd.stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let stdin_fd = libc::STDIN_FILENO;
        let parent_pgrp = unsafe { libc::tcgetpgrp(stdin_fd) };
        if parent_pgrp == -1 {
            let child = cmd.spawn().context("failed to launch player")?;
            return Ok(Self {
                child,
                handoff: None,
                _sigttou_guard: None,
            });
        }

        let sigttou_guard = ScopedSigaction::ignore(libc::SIGTTOU)?;
        unsafe {
            cmd.pre_exec(|| {
                libc::signal(libc::SIGINT, libc::SIG_DFL);
                libc::signal(libc::SIGQUIT, libc::SIG_DFL);
                libc::signal(libc::SIGTSTP, libc::SIG_DFL);
                if libc::setpgid(0, 0) != 0 {
                    return Err(io::Error::last_os_error());
                }
                Ok(())
            });
        }

        let child = cmd.spawn().context("failed to spawn player")?;
        let child_pgid = child.id() as libc::pid_t;
        let handoff = TerminalHandoff::to_child(stdin_fd, parent_pgrp, child_pgid);
        Ok(Self {
            child,
            handoff: Some(handoff),
            _sigttou_guard: Some(sigttou_guard),
        })
    }

    #[cfg(not(unix))]
    pub(crate) fn spawn_foreground(mut cmd: ProcessCommand) -> Result<Self> {
        let child = cmd.spawn().context("failed to launch player")?;
        Ok(Self { child })
    }

    pub(crate) fn spawn_background(mut cmd: ProcessCommand) -> Result<Self> {
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        let child = cmd.spawn().context("failed to launch player")?;
        Ok(Self {
            child,
            #[cfg(unix)]
            handoff: None,
            #[cfg(unix)]
            _sigttou_guard: None,
        })
    }

    pub(crate) fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    pub(crate) fn kill(&mut self) -> io::Result<()> {
        match self.child.kill() {
            Err(err) if err.kind() != io::ErrorKind::InvalidInput => Err(err),
            _ => Ok(()),
        }
    }

    pub(crate) fn wait(mut self) -> Result<ExitStatus> {
        let status = self.child.wait().context("failed waiting on player")?;
        #[cfg(unix)]
        drop(self.handoff.take());
        Ok(status)
    }
}
