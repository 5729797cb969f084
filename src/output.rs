//! User-facing status output.
//!
//! The installer never prints directly. It emits [`Event`]s to a [`Reporter`];
//! [`ConsoleReporter`] renders them as labeled stderr lines (colored when
//! stderr is a terminal) and [`RecordingReporter`] keeps them for assertions.

use console::{Color, Term, style};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use crate::installer::Stage;

fn stderr_is_tty() -> bool {
    Term::stderr().is_term()
}

fn format_label(label: &str, color: Color, is_tty: bool) -> String {
    if is_tty {
        style(label).bold().fg(color).to_string()
    } else {
        label.to_string()
    }
}

fn write_labeled(
    label: &str,
    color: Color,
    msg: &str,
    w: &mut dyn Write,
    is_tty: bool,
) -> io::Result<()> {
    let label = format_label(label, color, is_tty);
    if msg.is_empty() {
        writeln!(w, "{label}")
    } else {
        writeln!(w, "{label} {msg}")
    }
}

pub fn action_to_with_tty(w: &mut dyn Write, label: &str, msg: &str, is_tty: bool) {
    let _ = write_labeled(label, Color::Cyan, msg, w, is_tty);
}

pub fn success_to_with_tty(w: &mut dyn Write, label: &str, msg: &str, is_tty: bool) {
    let _ = write_labeled(label, Color::Green, msg, w, is_tty);
}

pub fn fail_to_with_tty(w: &mut dyn Write, label: &str, msg: &str, is_tty: bool) {
    let _ = write_labeled(label, Color::Red, msg, w, is_tty);
}

pub fn note_to_with_tty(w: &mut dyn Write, msg: &str, is_tty: bool) {
    let _ = write_labeled("Note", Color::Yellow, msg, w, is_tty);
}

pub fn detail_to_with_tty(w: &mut dyn Write, msg: &str, is_tty: bool) {
    let line = if is_tty {
        style(format!("  {msg}")).dim().to_string()
    } else {
        format!("  {msg}")
    };
    let _ = writeln!(w, "{line}");
}

/// Prints the final diagnostic for a failed run.
pub fn error(msg: &str) {
    fail_to_with_tty(&mut io::stderr(), "error:", msg, stderr_is_tty());
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Something the installer did or decided, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The pipeline reached a new state.
    Stage(Stage),
    TempDir(PathBuf),
    Downloading { url: String, dest: PathBuf },
    Downloaded { path: PathBuf, bytes: u64 },
    ChecksumVerified { digest: String },
    Extracting { dir: PathBuf },
    InstallPath(PathBuf),
    Toolset(String),
    BootstrapCommand(String),
    BuildCommand(String),
    RemoveCommand(String),
    Removed(PathBuf),
    /// Cleanup could not remove `path`; the user has to do it by hand.
    CleanupFailed { path: PathBuf, reason: String },
    /// A pipeline step was intentionally not run.
    Skipped { step: &'static str, reason: &'static str },
}

/// Sink for installer events.
pub trait Reporter {
    fn report(&self, event: Event);
}

/// Renders events to stderr.
#[derive(Debug, Clone, Copy)]
pub struct ConsoleReporter {
    is_tty: bool,
}

impl ConsoleReporter {
    pub fn new() -> Self {
        Self {
            is_tty: stderr_is_tty(),
        }
    }

    /// Renders a single event to `w`. Stage transitions other than `Done`
    /// only go to the debug log.
    pub fn render_to(&self, w: &mut dyn Write, event: &Event) {
        let tty = self.is_tty;
        match event {
            Event::Stage(Stage::Done) => success_to_with_tty(w, "Done", "", tty),
            Event::Stage(stage) => tracing::debug!(?stage, "stage reached"),
            Event::TempDir(dir) => {
                action_to_with_tty(w, "Temp directory:", &dir.display().to_string(), tty)
            }
            Event::Downloading { url, dest } => action_to_with_tty(
                w,
                "Downloading:",
                &format!("{url} into {}", dest.display()),
                tty,
            ),
            Event::Downloaded { path, bytes } => {
                detail_to_with_tty(w, &format!("{bytes} bytes written to {}", path.display()), tty)
            }
            Event::ChecksumVerified { digest } => {
                success_to_with_tty(w, "Verified:", &format!("sha256 {digest}"), tty)
            }
            Event::Extracting { dir } => {
                action_to_with_tty(w, "Extracting:", &dir.display().to_string(), tty)
            }
            Event::InstallPath(path) => {
                action_to_with_tty(w, "Install path:", &path.display().to_string(), tty)
            }
            Event::Toolset(toolset) => action_to_with_tty(w, "Toolset:", toolset, tty),
            Event::BootstrapCommand(cmd) => action_to_with_tty(w, "Bootstrap command:", cmd, tty),
            Event::BuildCommand(cmd) => action_to_with_tty(w, "Build command:", cmd, tty),
            Event::RemoveCommand(cmd) => {
                action_to_with_tty(w, "Extract directory remove command:", cmd, tty)
            }
            Event::Removed(path) => {
                detail_to_with_tty(w, &format!("removed {}", path.display()), tty)
            }
            Event::CleanupFailed { path, reason } => {
                fail_to_with_tty(
                    w,
                    "Cleanup failed:",
                    &format!("error while removing {}: {reason}", path.display()),
                    tty,
                );
                note_to_with_tty(
                    w,
                    &format!("Please remove it manually: {}", path.display()),
                    tty,
                );
            }
            Event::Skipped { step, reason } => {
                note_to_with_tty(w, &format!("skipping {step} ({reason})"), tty)
            }
        }
    }
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter for ConsoleReporter {
    fn report(&self, event: Event) {
        self.render_to(&mut io::stderr(), &event);
    }
}

/// Keeps every event in memory. Used by tests and by callers that want to
/// inspect a run after the fact.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<Event>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// The stage transitions seen so far, in order.
    pub fn stages(&self) -> Vec<Stage> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Stage(stage) => Some(stage),
                _ => None,
            })
            .collect()
    }
}

impl Reporter for RecordingReporter {
    fn report(&self, event: Event) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(event: &Event) -> String {
        let reporter = ConsoleReporter { is_tty: false };
        let mut buf = Vec::new();
        reporter.render_to(&mut buf, event);
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn plain_output_has_no_ansi_codes() {
        let out = render(&Event::Toolset("gcc".into()));
        assert_eq!(out, "Toolset: gcc\n");
        assert!(!out.contains('\u{1b}'));
    }

    #[test]
    fn downloading_names_url_and_destination() {
        let out = render(&Event::Downloading {
            url: "https://example.com/boost_1_75_0.tar.gz".into(),
            dest: PathBuf::from("/tmp/boost_1_75_0.tar.gz"),
        });
        assert_eq!(
            out,
            "Downloading: https://example.com/boost_1_75_0.tar.gz into /tmp/boost_1_75_0.tar.gz\n"
        );
    }

    #[test]
    fn cleanup_failure_tells_user_to_remove_manually() {
        let out = render(&Event::CleanupFailed {
            path: PathBuf::from("/tmp/boost_1_75_0"),
            reason: "permission denied".into(),
        });
        assert!(out.contains("permission denied"));
        assert!(out.contains("Note Please remove it manually: /tmp/boost_1_75_0"));
    }

    #[test]
    fn intermediate_stages_are_not_printed() {
        assert_eq!(render(&Event::Stage(Stage::Downloaded)), "");
        assert_eq!(render(&Event::Stage(Stage::Done)), "Done\n");
    }

    #[test]
    fn detail_is_indented() {
        let mut buf = Vec::new();
        detail_to_with_tty(&mut buf, "some detail", false);
        assert_eq!(String::from_utf8(buf).unwrap(), "  some detail\n");
    }

    #[test]
    fn recording_reporter_keeps_order() {
        let reporter = RecordingReporter::new();
        reporter.report(Event::Stage(Stage::Start));
        reporter.report(Event::Toolset("msvc".into()));
        reporter.report(Event::Stage(Stage::Done));

        assert_eq!(reporter.events().len(), 3);
        assert_eq!(reporter.stages(), vec![Stage::Start, Stage::Done]);
    }
}
