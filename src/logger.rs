use std::cell::RefCell;
use std::fmt::Display;
use std::fs::File;
use std::io::{Result as IoResult, Write};
use std::path::Path;
use std::sync::{Mutex, OnceLock};

// Write-once mirror target shared by every thread; None until configured.
static MIRROR: OnceLock<Mutex<File>> = OnceLock::new();

thread_local! {
    // Per-thread message prefix, managed by LogPrefixGuard.
    static PREFIX: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Where a message is printed; every message is also mirrored to the log
/// file when one is configured.
#[derive(Clone, Copy)]
enum Channel {
    /// User-facing notes, such as a column excluded on write.
    Stdout,
    /// Diagnostics.
    Stderr,
}

impl Channel {
    const fn kind(self) -> &'static str {
        match self {
            Self::Stdout => "note",
            Self::Stderr => "warning",
        }
    }
}

fn emit(channel: Channel, message: impl Display) {
    let message = PREFIX.with(|prefix| {
        prefix.borrow().as_deref().map_or_else(
            || message.to_string(),
            |prefix| format!("{prefix}: {message}"),
        )
    });
    match channel {
        Channel::Stdout => println!("{message}"),
        Channel::Stderr => eprintln!("{message}"),
    }
    if let Some(mirror) = MIRROR.get()
        && let Ok(mut file) = mirror.lock()
    {
        let _ = writeln!(file, "{}: {message}", channel.kind());
    }
}

/// Routes a copy of every note and warning into the file at `path`, creating
/// parent directories as needed. The mirror target is write-once: the first
/// successful call wins and any later call leaves it untouched.
///
/// # Errors
///
/// Returns an error if the log file cannot be created.
pub fn set_log_file(path: &Path) -> IoResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    drop(MIRROR.set(Mutex::new(file)));
    Ok(())
}

/// Sets a thread-local prefix that will be prepended to subsequent log
/// messages. Returns a guard that restores the previous prefix on drop.
pub fn set_log_prefix(prefix: impl Into<String>) -> LogPrefixGuard {
    let previous = PREFIX.with(|slot| slot.replace(Some(prefix.into())));
    LogPrefixGuard { previous }
}

pub struct LogPrefixGuard {
    previous: Option<String>,
}

impl Drop for LogPrefixGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        PREFIX.with(|slot| {
            *slot.borrow_mut() = previous;
        });
    }
}

/// Reports a non-fatal user-facing note on standard output.
pub fn log_note(message: &str) {
    emit(Channel::Stdout, message);
}

/// Reports a diagnostic warning on standard error.
pub fn log_warn(message: &str) {
    emit(Channel::Stderr, message);
}
