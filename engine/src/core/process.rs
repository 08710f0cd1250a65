//! Cross-platform process spawning helpers.
//!
//! Every subprocess the pipeline launches (ffmpeg, ffprobe, encoders) goes
//! through here so it never waits on interactive input, never flashes a
//! console window on Windows, and dies with its owning task.

use std::process::Stdio;

#[cfg(target_os = "windows")]
const CREATE_NO_WINDOW: u32 = 0x08000000;

/// Apply platform-specific flags to a std process command.
pub fn configure_std_command(cmd: &mut std::process::Command) {
    cmd.stdin(Stdio::null());
    #[cfg(target_os = "windows")]
    {
        use std::os::windows::process::CommandExt;
        cmd.creation_flags(CREATE_NO_WINDOW);
    }
}

/// Apply platform-specific flags to a tokio process command.
///
/// The child is killed if its handle is dropped, so an aborted request never
/// leaves an encoder burning CPU in the background.
pub fn configure_tokio_command(cmd: &mut tokio::process::Command) {
    cmd.stdin(Stdio::null());
    cmd.kill_on_drop(true);
    #[cfg(target_os = "windows")]
    {
        cmd.creation_flags(CREATE_NO_WINDOW);
    }
}

/// Keeps the last `limit` bytes of a subprocess's stderr for error messages.
pub fn stderr_tail(stderr: &[u8], limit: usize) -> String {
    let text = String::from_utf8_lossy(stderr);
    let trimmed = text.trim();
    if trimmed.len() <= limit {
        return trimmed.to_string();
    }
    let mut start = trimmed.len() - limit;
    while !trimmed.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &trimmed[start..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn std_command_can_execute_successfully() {
        #[cfg(target_os = "windows")]
        let mut cmd = std::process::Command::new("cmd");
        #[cfg(not(target_os = "windows"))]
        let mut cmd = std::process::Command::new("echo");

        configure_std_command(&mut cmd);

        #[cfg(target_os = "windows")]
        let output = cmd.args(["/C", "echo", "test"]).output();
        #[cfg(not(target_os = "windows"))]
        let output = cmd.arg("test").output();

        let output = output.expect("command should execute");
        assert!(output.status.success(), "Command should succeed");
    }

    #[tokio::test]
    async fn tokio_command_can_execute_successfully() {
        #[cfg(target_os = "windows")]
        let mut cmd = tokio::process::Command::new("cmd");
        #[cfg(not(target_os = "windows"))]
        let mut cmd = tokio::process::Command::new("echo");

        configure_tokio_command(&mut cmd);
        configure_tokio_command(&mut cmd);

        #[cfg(target_os = "windows")]
        let output = cmd.args(["/C", "echo", "test"]).output().await;
        #[cfg(not(target_os = "windows"))]
        let output = cmd.arg("test").output().await;

        let output = output.expect("command should execute");
        assert!(output.status.success(), "Command should succeed");
    }

    #[test]
    fn stderr_tail_keeps_the_end() {
        assert_eq!(stderr_tail(b"  short  ", 64), "short");
        let long = "a".repeat(100) + "END";
        let tail = stderr_tail(long.as_bytes(), 10);
        assert!(tail.starts_with("..."));
        assert!(tail.ends_with("END"));
        assert_eq!(tail.len(), 13);
    }

    #[test]
    fn stderr_tail_respects_char_boundaries() {
        let text = "é".repeat(20);
        let tail = stderr_tail(text.as_bytes(), 5);
        assert!(tail.ends_with('é'));
    }
}
