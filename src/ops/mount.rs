//! Access to a bundle's payload.
//!
//! An AppImage is mounted by running an AppImage runtime with
//! `--appimage-mount`: it prints the mountpoint and keeps the FUSE mount alive
//! until it is terminated. An AppDir is used in place.

use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, ExitStatus};
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::core::bundle::{Bundle, BundleKind};
use crate::util::process::ProcessBuilder;

/// Grace period after SIGTERM before the mount process is killed.
const TERMINATE_TIMEOUT: Duration = Duration::from_secs(5);

/// How long to wait for the process to die after SIGKILL.
const KILL_TIMEOUT: Duration = Duration::from_secs(12);

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
pub enum MountError {
    #[error("failed to run `{command}`")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("mount process exited before reporting a mountpoint ({status})")]
    Exited { status: String },

    #[error("failed to read the output of the mount process")]
    Read(#[source] io::Error),

    #[error("failed to stop the mount process")]
    Unmount(#[source] io::Error),
}

/// Mounts AppImages, optionally through a separate runtime binary.
#[derive(Debug, Clone, Default)]
pub struct AppImageMounter {
    runtime: Option<PathBuf>,
}

impl AppImageMounter {
    /// Use `runtime` to mount; with `None` the AppImage mounts itself.
    pub fn new(runtime: Option<PathBuf>) -> Self {
        AppImageMounter { runtime }
    }

    pub fn runtime(&self) -> Option<&Path> {
        self.runtime.as_deref()
    }

    /// Make the payload of `bundle` accessible.
    pub fn mount(&self, bundle: &Bundle) -> Result<Mount, MountError> {
        if bundle.kind() == BundleKind::AppDir {
            return Ok(Mount {
                mountpoint: bundle.path().to_path_buf(),
                process: None,
            });
        }

        tracing::debug!("mounting AppImage {}", bundle);

        let cmd = match &self.runtime {
            Some(runtime) => {
                tracing::debug!("using runtime {} to mount AppImage", runtime.display());
                ProcessBuilder::new(runtime).env("TARGET_APPIMAGE", bundle.path().to_string_lossy())
            }
            None => ProcessBuilder::new(bundle.path()),
        }
        .arg("--appimage-mount");

        tracing::debug!("calling {}", cmd.display_command());

        let mut child = cmd.spawn_piped().map_err(|source| MountError::Spawn {
            command: cmd.display_command(),
            source,
        })?;
        tracing::debug!("process ID: {}", child.id());

        let Some(stdout) = child.stdout.take() else {
            terminate(&mut child).ok();
            return Err(MountError::Read(io::Error::other("stdout not captured")));
        };

        let mut reader = BufReader::new(stdout);
        match read_mountpoint(&mut reader, &mut child) {
            Ok(mountpoint) => {
                tracing::debug!("mount path: {}", mountpoint.display());
                Ok(Mount {
                    mountpoint,
                    process: Some(MountProcess {
                        child,
                        _stdout: reader,
                    }),
                })
            }
            Err(e) => {
                terminate(&mut child).ok();
                Err(e)
            }
        }
    }

    /// Run `f` with the payload mounted; the payload is released afterwards
    /// whether `f` succeeds or not.
    pub fn with_mounted<T, E, F>(&self, bundle: &Bundle, f: F) -> Result<T, E>
    where
        F: FnOnce(&Path) -> Result<T, E>,
        E: From<MountError>,
    {
        let mount = self.mount(bundle)?;
        let result = f(mount.path());
        let unmounted = mount.unmount();

        match (result, unmounted) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e.into()),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(unmount_error)) => {
                tracing::warn!("failed to unmount {}: {}", bundle, unmount_error);
                Err(e)
            }
        }
    }
}

/// First stdout line naming an existing path.
fn read_mountpoint(
    reader: &mut BufReader<ChildStdout>,
    child: &mut Child,
) -> Result<PathBuf, MountError> {
    let mut line = String::new();

    loop {
        line.clear();
        let read = reader.read_line(&mut line).map_err(MountError::Read)?;

        if read == 0 {
            let status = child
                .wait()
                .map(|status| status.to_string())
                .unwrap_or_else(|e| e.to_string());
            return Err(MountError::Exited { status });
        }

        let candidate = line.trim();
        tracing::debug!("read line from stdout: {}", candidate);

        if !candidate.is_empty() && Path::new(candidate).exists() {
            return Ok(PathBuf::from(candidate));
        }
    }
}

struct MountProcess {
    child: Child,
    // keeps the pipe open so the runtime never sees SIGPIPE
    _stdout: BufReader<ChildStdout>,
}

/// A mounted payload. Dropping it unmounts as well; [`Mount::unmount`]
/// additionally reports failures.
pub struct Mount {
    mountpoint: PathBuf,
    process: Option<MountProcess>,
}

impl Mount {
    pub fn path(&self) -> &Path {
        &self.mountpoint
    }

    /// Whether a mount process backs this mount.
    pub fn is_fuse_mount(&self) -> bool {
        self.process.is_some()
    }

    pub fn unmount(mut self) -> Result<(), MountError> {
        match self.process.take() {
            Some(mut process) => {
                tracing::debug!("unmounting {}", self.mountpoint.display());
                terminate(&mut process.child).map_err(MountError::Unmount)
            }
            None => Ok(()),
        }
    }
}

impl Drop for Mount {
    fn drop(&mut self) {
        if let Some(mut process) = self.process.take() {
            if let Err(e) = terminate(&mut process.child) {
                tracing::warn!("failed to unmount {}: {}", self.mountpoint.display(), e);
            }
        }
    }
}

/// Stop a mount process: SIGTERM, then SIGKILL if it doesn't exit in time.
fn terminate(child: &mut Child) -> io::Result<()> {
    if child.try_wait()?.is_some() {
        return Ok(());
    }

    send_sigterm(child)?;
    if wait_timeout(child, TERMINATE_TIMEOUT)?.is_some() {
        return Ok(());
    }

    tracing::debug!("failed to terminate process normally, killing");
    child.kill()?;

    match wait_timeout(child, KILL_TIMEOUT)? {
        Some(_) => Ok(()),
        None => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("process {} did not exit after SIGKILL", child.id()),
        )),
    }
}

#[cfg(unix)]
fn send_sigterm(child: &Child) -> io::Result<()> {
    // SAFETY: kill(2) with a pid we own; no memory is shared.
    let rc = unsafe { libc::kill(child.id() as libc::pid_t, libc::SIGTERM) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn send_sigterm(child: &mut Child) -> io::Result<()> {
    child.kill()
}

fn wait_timeout(child: &mut Child, timeout: Duration) -> io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + timeout;

    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }

        if Instant::now() >= deadline {
            return Ok(None);
        }

        std::thread::sleep(POLL_INTERVAL);
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::util::fs::make_executable;
    use tempfile::TempDir;

    fn write_runtime(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("runtime");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        make_executable(&path).unwrap();
        path
    }

    fn fake_appimage(dir: &Path) -> Bundle {
        let path = dir.join("Test-x86_64.AppImage");
        std::fs::write(&path, b"\x7fELF").unwrap();
        Bundle::open(&path).unwrap()
    }

    #[test]
    fn test_appdir_is_used_in_place() {
        let tmp = TempDir::new().unwrap();
        let bundle = Bundle::open(tmp.path()).unwrap();

        let mount = AppImageMounter::default().mount(&bundle).unwrap();
        assert_eq!(mount.path(), bundle.path());
        assert!(!mount.is_fuse_mount());
        mount.unmount().unwrap();
    }

    #[test]
    fn test_mount_with_runtime() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join("payload")).unwrap();
        let runtime = write_runtime(
            tmp.path(),
            "echo \"starting\"\necho \"$(dirname \"$TARGET_APPIMAGE\")/payload\"\nexec sleep 60",
        );
        let bundle = fake_appimage(tmp.path());

        let mounter = AppImageMounter::new(Some(runtime));
        let started = Instant::now();

        let seen = mounter
            .with_mounted(&bundle, |path| -> Result<PathBuf, MountError> {
                Ok(path.to_path_buf())
            })
            .unwrap();

        assert_eq!(seen, bundle.path().parent().unwrap().join("payload"));
        // SIGTERM is enough, no need to wait for the kill deadline
        assert!(started.elapsed() < TERMINATE_TIMEOUT);
    }

    #[test]
    fn test_kills_runtime_ignoring_sigterm() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join("payload")).unwrap();
        let runtime = write_runtime(
            tmp.path(),
            "trap '' TERM\necho \"$(dirname \"$TARGET_APPIMAGE\")/payload\"\nwhile true; do sleep 0.1; done",
        );
        let bundle = fake_appimage(tmp.path());

        let started = Instant::now();
        let result = AppImageMounter::new(Some(runtime))
            .with_mounted(&bundle, |path| -> Result<bool, MountError> { Ok(path.is_dir()) });

        assert!(result.unwrap());
        let elapsed = started.elapsed();
        assert!(elapsed >= TERMINATE_TIMEOUT);
        assert!(elapsed < TERMINATE_TIMEOUT + KILL_TIMEOUT);
    }

    #[test]
    fn test_unmounts_when_closure_fails() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join("payload")).unwrap();
        let runtime = write_runtime(
            tmp.path(),
            "echo \"$(dirname \"$TARGET_APPIMAGE\")/payload\"\nexec sleep 60",
        );
        let bundle = fake_appimage(tmp.path());

        let result: Result<(), MountError> = AppImageMounter::new(Some(runtime))
            .with_mounted(&bundle, |_| Err(MountError::Exited { status: "test".into() }));

        assert!(matches!(result, Err(MountError::Exited { .. })));
    }

    #[test]
    fn test_runtime_exits_without_mountpoint() {
        let tmp = TempDir::new().unwrap();
        let runtime = write_runtime(tmp.path(), "echo \"mount failed\"\nexit 3");
        let bundle = fake_appimage(tmp.path());

        let err = AppImageMounter::new(Some(runtime))
            .mount(&bundle)
            .err()
            .unwrap();
        assert!(matches!(err, MountError::Exited { .. }));
    }

    #[test]
    fn test_missing_runtime() {
        let tmp = TempDir::new().unwrap();
        let bundle = fake_appimage(tmp.path());

        let err = AppImageMounter::new(Some(tmp.path().join("absent")))
            .mount(&bundle)
            .err()
            .unwrap();
        assert!(matches!(err, MountError::Spawn { .. }));
    }
}
