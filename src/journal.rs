//! Append-only submission journal.
//!
//! One line per delivery attempt, written under an exclusive flock so
//! concurrent requests never interleave partial lines. A journal write
//! failure is logged and swallowed; it never changes the outcome
//! already reported to the caller.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};

use chrono::Utc;

/// What gets recorded for one attempt. `name` and `email` only appear
/// in the line when personal-data logging is enabled.
#[derive(Debug, Clone)]
pub struct Attempt {
    pub success: bool,
    pub name: String,
    pub email: String,
    pub detail: String,
}

pub struct Journal {
    path: PathBuf,
    log_personal_data: bool,
}

impl Journal {
    pub fn new(path: impl Into<PathBuf>, log_personal_data: bool) -> Self {
        Self {
            path: path.into(),
            log_personal_data,
        }
    }

    /// Appends one line for the attempt. Never fails the request.
    pub async fn record(&self, attempt: Attempt) {
        let line = self.format_line(&attempt);
        let path = self.path.clone();
        let appended =
            tokio::task::spawn_blocking(move || append_locked(&path, &line)).await;
        match appended {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::warn!(path = %self.path.display(), error = %err, "journal append failed");
            }
            Err(err) => {
                tracing::warn!(error = %err, "journal task failed");
            }
        }
    }

    fn format_line(&self, attempt: &Attempt) -> String {
        let stamp = Utc::now().format("%Y-%m-%d %H:%M:%S");
        let outcome = if attempt.success { "SUCCESS" } else { "ERROR" };
        let detail = collapse_newlines(&attempt.detail);
        if self.log_personal_data {
            format!(
                "{stamp} | {outcome} | {} | {} | {detail}\n",
                collapse_newlines(&attempt.name),
                attempt.email
            )
        } else {
            format!("{stamp} | {outcome} | {detail}\n")
        }
    }
}

fn append_locked(path: &Path, line: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    lock_exclusive(&file)?;
    let written = file.write_all(line.as_bytes()).and_then(|_| file.flush());
    unlock(&file);
    written
}

fn lock_exclusive(file: &File) -> std::io::Result<()> {
    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX) };
    if rc != 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

fn unlock(file: &File) {
    unsafe {
        libc::flock(file.as_raw_fd(), libc::LOCK_UN);
    }
}

fn collapse_newlines(text: &str) -> String {
    text.replace(['\r', '\n'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempt(success: bool) -> Attempt {
        Attempt {
            success,
            name: "Jo Lee".into(),
            email: "jo@example.com".into(),
            detail: "Hello there,\r\nthis is a test message.".into(),
        }
    }

    #[tokio::test]
    async fn privacy_mode_omits_personal_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.log");
        let journal = Journal::new(&path, false);
        journal.record(attempt(true)).await;

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("SUCCESS"));
        assert!(!contents.contains("jo@example.com"));
        assert!(!contents.contains("Jo Lee"));
    }

    #[tokio::test]
    async fn personal_mode_records_name_and_email() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.log");
        let journal = Journal::new(&path, true);
        journal.record(attempt(false)).await;

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("ERROR"));
        assert!(contents.contains("Jo Lee"));
        assert!(contents.contains("jo@example.com"));
    }

    #[tokio::test]
    async fn newlines_are_collapsed_to_a_single_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.log");
        let journal = Journal::new(&path, false);
        journal.record(attempt(true)).await;

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 1);
        assert!(contents.contains("Hello there, this is a test message."));
    }

    #[tokio::test]
    async fn concurrent_appends_do_not_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.log");
        let journal = std::sync::Arc::new(Journal::new(&path, false));

        let mut handles = Vec::new();
        for i in 0..32 {
            let journal = journal.clone();
            handles.push(tokio::spawn(async move {
                journal
                    .record(Attempt {
                        success: true,
                        name: String::new(),
                        email: String::new(),
                        detail: format!("attempt-{i} {}", "x".repeat(512)),
                    })
                    .await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 32);
        for line in lines {
            assert!(line.contains("attempt-"));
            assert!(line.ends_with(&"x".repeat(512)));
        }
    }

    #[tokio::test]
    async fn unwritable_path_does_not_panic() {
        let journal = Journal::new("/nonexistent-dir/journal.log", false);
        journal.record(attempt(true)).await;
    }
}
