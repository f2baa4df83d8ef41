//! PDF conversion via a headless office suite subprocess.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::warn;

use crate::error::{PipelineError, Result};

const STDERR_TAIL_BYTES: usize = 500;

#[cfg(unix)]
fn prepare_process_group(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;
    // A fresh process group lets us kill the whole subtree (soffice spawns
    // a soffice.bin child) with a single signal on timeout.
    unsafe {
        cmd.pre_exec(|| {
            let res = libc::setsid();
            if res == -1 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }
}

#[cfg(not(unix))]
fn prepare_process_group(_cmd: &mut Command) {}

#[cfg(unix)]
async fn kill_process_tree(pid: u32) {
    unsafe {
        libc::kill(-(pid as i32), libc::SIGKILL);
    }
}

#[cfg(not(unix))]
async fn kill_process_tree(pid: u32) {
    let _ = Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/T", "/F"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;
}

fn file_url(path: &Path) -> String {
    let resolved = path.to_string_lossy().replace('\\', "/");
    if resolved.starts_with('/') {
        format!("file://{resolved}")
    } else {
        format!("file:///{resolved}")
    }
}

/// Converts `pptx_path` to `out_pdf` with a headless office suite, honoring
/// `timeout_sec`. Uses a fresh, temporary user-profile directory so
/// concurrent conversions never collide over LibreOffice's lockfile.
pub async fn convert_pptx_to_pdf(
    soffice_path: &str,
    pptx_path: &Path,
    out_pdf: &Path,
    timeout_sec: u64,
) -> Result<()> {
    if let Some(parent) = out_pdf.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let profile_dir = tempfile::Builder::new()
        .prefix("sm_lo_profile_")
        .tempdir()?;
    let user_install = format!("-env:UserInstallation={}", file_url(profile_dir.path()));
    let outdir = out_pdf
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));

    let mut cmd = Command::new(soffice_path);
    cmd.args([
        "--headless",
        "--nologo",
        "--norestore",
        "--nofirststartwizard",
        &user_install,
        "--convert-to",
        "pdf",
        "--outdir",
    ])
    .arg(&outdir)
    .arg(pptx_path)
    .stdout(Stdio::piped())
    .stderr(Stdio::piped())
    .kill_on_drop(true);
    prepare_process_group(&mut cmd);

    let mut child = cmd.spawn()?;
    let pid = child.id();

    let wait = tokio::time::timeout(Duration::from_secs(timeout_sec), child.wait());

    let status = match wait.await {
        Ok(status) => status?,
        Err(_) => {
            if let Some(pid) = pid {
                kill_process_tree(pid).await;
            }
            let _ = child.kill().await;
            return Err(PipelineError::ConvertTimeout(timeout_sec));
        }
    };

    if !status.success() {
        let mut stderr = String::new();
        if let Some(mut pipe) = child.stderr.take() {
            let _ = pipe.read_to_string(&mut stderr).await;
        }
        let tail: String = stderr
            .chars()
            .rev()
            .take(STDERR_TAIL_BYTES)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        return Err(PipelineError::ConvertFailed(format!(
            "rc={:?}: {}",
            status.code(),
            tail
        )));
    }

    let stem = pptx_path
        .file_stem()
        .map(PathBuf::from)
        .unwrap_or_default();
    let expected = outdir.join(stem).with_extension("pdf");

    if !expected.exists() {
        return Err(PipelineError::ConvertFailed(format!(
            "PDF not produced: expected {}",
            expected.display()
        )));
    }

    if expected != out_pdf {
        if out_pdf.exists() {
            tokio::fs::remove_file(out_pdf).await?;
        }
        if let Err(e) = tokio::fs::rename(&expected, out_pdf).await {
            warn!(error = %e, "failed to rename converted pdf into place");
            return Err(e.into());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_url_handles_absolute_unix_paths() {
        assert_eq!(file_url(Path::new("/tmp/profile")), "file:///tmp/profile");
    }
}
