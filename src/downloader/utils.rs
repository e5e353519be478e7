// Helper functions for backend implementations

use log::debug;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::Command as TokioCommand;
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};

use super::errors::DownloadError;

/// Which pipe a line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

fn spawn_error(program: &Path, e: std::io::Error) -> DownloadError {
    if e.kind() == std::io::ErrorKind::NotFound {
        DownloadError::ToolNotFound(program.display().to_string())
    } else {
        DownloadError::Extraction(format!("Failed to start {}: {}", program.display(), e))
    }
}

/// Run command with timeout (shared utility)
pub async fn run_output_with_timeout(
    program: &Path,
    args: &[String],
    timeout_secs: u64,
) -> Result<std::process::Output, DownloadError> {
    let mut child = TokioCommand::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| spawn_error(program, e))?;

    let mut stdout_pipe = child
        .stdout
        .take()
        .ok_or_else(|| DownloadError::Extraction("Failed to capture stdout".to_string()))?;
    let mut stderr_pipe = child
        .stderr
        .take()
        .ok_or_else(|| DownloadError::Extraction("Failed to capture stderr".to_string()))?;

    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stdout_pipe.read_to_end(&mut buf).await.map(|_| buf)
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stderr_pipe.read_to_end(&mut buf).await.map(|_| buf)
    });

    match timeout(Duration::from_secs(timeout_secs), child.wait()).await {
        Ok(status_res) => {
            let status = status_res
                .map_err(|e| DownloadError::Extraction(format!("Failed to wait: {}", e)))?;
            let stdout = join_pipe(stdout_task).await?;
            let stderr = join_pipe(stderr_task).await?;
            Ok(std::process::Output { status, stdout, stderr })
        }
        Err(_) => {
            let _ = child.kill().await;
            stdout_task.abort();
            stderr_task.abort();
            Err(DownloadError::Network(format!(
                "{} timed out after {}s",
                program.display(),
                timeout_secs
            )))
        }
    }
}

async fn join_pipe(
    task: tokio::task::JoinHandle<std::io::Result<Vec<u8>>>,
) -> Result<Vec<u8>, DownloadError> {
    task.await
        .map_err(|e| DownloadError::Extraction(format!("pipe reader failed: {}", e)))?
        .map_err(|e| DownloadError::Extraction(format!("pipe read failed: {}", e)))
}

/// Spawn a long-running command and merge its stdout and stderr into one line stream.
///
/// Lines from the same pipe keep their order. The receiver closes once both pipes hit EOF.
pub fn spawn_line_stream(
    program: &Path,
    args: &[String],
) -> Result<(tokio::process::Child, mpsc::UnboundedReceiver<(Stream, String)>), DownloadError> {
    let mut child = TokioCommand::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| spawn_error(program, e))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| DownloadError::Extraction("Failed to capture stdout".to_string()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| DownloadError::Extraction("Failed to capture stderr".to_string()))?;

    let (tx, rx) = mpsc::unbounded_channel();
    pump_lines(stdout, Stream::Stdout, tx.clone());
    pump_lines(stderr, Stream::Stderr, tx);

    Ok((child, rx))
}

fn pump_lines<R>(pipe: R, stream: Stream, tx: mpsc::UnboundedSender<(Stream, String)>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        // Tool output is not guaranteed to be UTF-8; decode lossily and keep draining
        let mut reader = BufReader::new(pipe);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf)
                        .trim_end_matches(['\n', '\r'])
                        .to_string();
                    if tx.send((stream, line)).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    debug!("[utils] {:?} read failed: {}", stream, e);
                    break;
                }
            }
        }
    });
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn sh(script: &str) -> (PathBuf, Vec<String>) {
        (PathBuf::from("sh"), vec!["-c".to_string(), script.to_string()])
    }

    #[tokio::test]
    async fn test_run_output_collects_both_pipes() {
        let (program, args) = sh("echo out; echo err >&2; exit 3");
        let output = run_output_with_timeout(&program, &args, 10).await.unwrap();

        assert_eq!(output.status.code(), Some(3));
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "out");
        assert_eq!(String::from_utf8_lossy(&output.stderr).trim(), "err");
    }

    #[tokio::test]
    async fn test_run_output_times_out() {
        let (program, args) = sh("sleep 5");
        let err = run_output_with_timeout(&program, &args, 1).await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let err = run_output_with_timeout(Path::new("/nonexistent/yt-dlp"), &[], 1)
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::ToolNotFound(_)));
    }

    #[tokio::test]
    async fn test_line_stream_keeps_order_per_pipe() {
        let (program, args) = sh("for i in 1 2 3 4 5; do echo o$i; echo e$i >&2; done");
        let (mut child, mut rx) = spawn_line_stream(&program, &args).unwrap();

        let mut out = Vec::new();
        let mut err = Vec::new();
        while let Some((stream, line)) = rx.recv().await {
            match stream {
                Stream::Stdout => out.push(line),
                Stream::Stderr => err.push(line),
            }
        }
        assert!(child.wait().await.unwrap().success());
        assert_eq!(out, vec!["o1", "o2", "o3", "o4", "o5"]);
        assert_eq!(err, vec!["e1", "e2", "e3", "e4", "e5"]);
    }

    #[tokio::test]
    async fn test_line_stream_survives_invalid_utf8() {
        let (program, args) = sh(
            "printf 'Caf\\351 video\\r\\n' >&2; \
             i=0; while [ $i -lt 2000 ]; do echo \"line $i\" >&2; i=$((i+1)); done; \
             echo done",
        );
        let (mut child, mut rx) = spawn_line_stream(&program, &args).unwrap();

        let mut err = Vec::new();
        let mut out = Vec::new();
        while let Some((stream, line)) = rx.recv().await {
            match stream {
                Stream::Stdout => out.push(line),
                Stream::Stderr => err.push(line),
            }
        }

        assert!(child.wait().await.unwrap().success());
        assert_eq!(err.len(), 2001);
        assert_eq!(err[0], "Caf\u{FFFD} video");
        assert_eq!(err[2000], "line 1999");
        assert_eq!(out, vec!["done"]);
    }
}
