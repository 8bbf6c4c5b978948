//! Mapping extraction through an external disassembler
//!
//! `javap -v` prints class attributes in a readable form, including the
//! `SourceDebugExtension` attribute that holds the SMAP. This is more
//! reliable than scanning raw bytes because the attribute is bounded by the
//! tool, not guessed from tokens.
//!
//! The command itself always comes from the caller. The runner reads the
//! tool's stdout on a helper thread with a byte cap, and the calling thread
//! waits on whichever comes first: the output, the timeout, or cancellation.

use crossbeam_channel::{after, at, bounded, never, select, Receiver, Sender};
use log::debug;
use std::io::{self, Read};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::embedded::find_blob;
use super::{ExtractionInput, ExtractionTier, Extractor};
use crate::config::ResolverConfig;
use crate::domain::{ExtractError, ToolError};
use crate::smap::{self, MappingTable};

/// How often an exited-stdout child is checked for termination
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Runs the disassembler for one artifact and returns its stdout
pub trait SubprocessRunner {
    /// # Errors
    /// Any [`ToolError`]; extraction treats a missing command as "not found"
    /// and everything else as "tool unavailable"
    fn run(&self, artifact: &Path) -> Result<String, ToolError>;
}

/// Cancels every [`CancelToken`] cloned from its pair when cancelled or dropped
#[derive(Debug)]
pub struct Canceller {
    tx: Sender<()>,
}

impl Canceller {
    pub fn cancel(self) {
        drop(self.tx);
    }
}

/// Receiving side of a cancellation pair
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: Receiver<()>,
}

impl CancelToken {
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self.rx.try_recv(), Err(crossbeam_channel::TryRecvError::Disconnected))
    }
}

/// Create a linked canceller and token
///
/// Nothing is ever sent on the channel; cancellation is the sender going
/// away, which every clone of the token observes.
#[must_use]
pub fn cancellation() -> (Canceller, CancelToken) {
    let (tx, rx) = bounded(0);
    (Canceller { tx }, CancelToken { rx })
}

/// [`SubprocessRunner`] that spawns a real process
#[derive(Debug, Clone)]
pub struct CommandRunner {
    command: Vec<String>,
    timeout: Duration,
    max_output: usize,
    cancel: Option<CancelToken>,
}

enum Outcome<T> {
    Done(T),
    TimedOut,
    Cancelled,
}

impl CommandRunner {
    /// `command` is the program followed by its arguments; the artifact
    /// path is appended as the final argument
    #[must_use]
    pub fn new(command: Vec<String>) -> Self {
        let defaults = ResolverConfig::default();
        Self {
            command,
            timeout: defaults.tool_timeout(),
            max_output: defaults.max_tool_output_bytes,
            cancel: None,
        }
    }

    #[must_use]
    pub fn from_config(config: &ResolverConfig) -> Self {
        Self::new(config.tool_command.clone())
            .with_timeout(config.tool_timeout())
            .with_max_output(config.max_tool_output_bytes)
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_max_output(mut self, max_output: usize) -> Self {
        self.max_output = max_output;
        self
    }

    #[must_use]
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn cancelled(&self) -> Receiver<()> {
        self.cancel.as_ref().map_or_else(never, |t| t.rx.clone())
    }

    fn wait_for_output(
        &self,
        output: &Receiver<io::Result<Vec<u8>>>,
        deadline: Option<Instant>,
    ) -> Outcome<io::Result<Vec<u8>>> {
        let cancelled = self.cancelled();
        let deadline = deadline.map_or_else(never, at);

        select! {
            recv(output) -> msg => Outcome::Done(msg.unwrap_or_else(|_| {
                Err(io::Error::other("output reader exited without a result"))
            })),
            recv(cancelled) -> _ => Outcome::Cancelled,
            recv(deadline) -> _ => Outcome::TimedOut,
        }
    }

    /// Wait for the child to exit after its stdout closed, against the same
    /// deadline as the output
    fn wait_for_exit(
        &self,
        child: &mut Child,
        deadline: Option<Instant>,
    ) -> io::Result<Outcome<ExitStatus>> {
        let cancelled = self.cancelled();
        let deadline = deadline.map_or_else(never, at);

        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(Outcome::Done(status));
            }
            select! {
                recv(cancelled) -> _ => return Ok(Outcome::Cancelled),
                recv(deadline) -> _ => return Ok(Outcome::TimedOut),
                recv(after(EXIT_POLL_INTERVAL)) -> _ => {}
            }
        }
    }
}

fn reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

/// Kill and reap a child that is no longer wanted
///
/// The stdout reader is left to finish on its own. It exits once every
/// holder of the pipe is gone, which a grandchild that inherited stdout can
/// postpone indefinitely.
fn abandon(child: &mut Child, reader: JoinHandle<()>) {
    reap(child);
    if reader.is_finished() {
        let _ = reader.join();
    } else {
        debug!("Output reader for pid {} still blocked on the pipe", child.id());
    }
}

impl SubprocessRunner for CommandRunner {
    fn run(&self, artifact: &Path) -> Result<String, ToolError> {
        let (program, args) = self.command.split_first().ok_or(ToolError::NoCommand)?;
        let cancelled = || ToolError::Cancelled { program: program.clone() };
        let timed_out = || ToolError::TimedOut { program: program.clone(), timeout: self.timeout };

        if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            return Err(cancelled());
        }

        debug!("Running {program} {} {}", args.join(" "), artifact.display());
        let deadline = Instant::now().checked_add(self.timeout);
        let mut child = Command::new(program)
            .args(args)
            .arg(artifact)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| ToolError::Spawn { program: program.clone(), source })?;

        let Some(stdout) = child.stdout.take() else {
            reap(&mut child);
            return Err(ToolError::Io(io::Error::other("stdout was not captured")));
        };

        // One byte past the cap is enough to tell that the cap was exceeded
        let limit = self.max_output;
        let read_cap = u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1);
        let (tx, rx) = bounded(1);
        let reader = thread::spawn(move || {
            let mut buf = Vec::new();
            let result = stdout.take(read_cap).read_to_end(&mut buf).map(|_| buf);
            let _ = tx.send(result);
        });

        let bytes = match self.wait_for_output(&rx, deadline) {
            Outcome::Done(Ok(bytes)) if bytes.len() > limit => {
                abandon(&mut child, reader);
                return Err(ToolError::OutputTooLarge { program: program.clone(), limit });
            }
            Outcome::Done(Ok(bytes)) => {
                let _ = reader.join();
                bytes
            }
            Outcome::Done(Err(e)) => {
                abandon(&mut child, reader);
                return Err(ToolError::Io(e));
            }
            Outcome::TimedOut => {
                abandon(&mut child, reader);
                return Err(timed_out());
            }
            Outcome::Cancelled => {
                abandon(&mut child, reader);
                return Err(cancelled());
            }
        };

        // Stdout is closed but the process may still be running
        match self.wait_for_exit(&mut child, deadline) {
            Ok(Outcome::Done(status)) if status.success() => {
                Ok(String::from_utf8_lossy(&bytes).into_owned())
            }
            Ok(Outcome::Done(status)) => {
                Err(ToolError::Exited { program: program.clone(), status: status.to_string() })
            }
            Ok(Outcome::TimedOut) => {
                reap(&mut child);
                Err(timed_out())
            }
            Ok(Outcome::Cancelled) => {
                reap(&mut child);
                Err(cancelled())
            }
            Err(e) => {
                reap(&mut child);
                Err(ToolError::Io(e))
            }
        }
    }
}

/// Body of a named top-level section in indented tool output
///
/// The body runs from the line after the header to the next line that
/// starts in column zero, or to the end of the output.
#[must_use]
pub fn debug_section<'o>(output: &'o str, header: &str) -> Option<&'o str> {
    let mut offset = 0;
    let mut body_start = None;

    for line in output.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();

        match body_start {
            None => {
                if line.trim() == header {
                    body_start = Some(offset);
                }
            }
            Some(start) => {
                let top_level = line.chars().next().is_some_and(|c| !c.is_whitespace());
                if top_level {
                    return Some(&output[start..line_start]);
                }
            }
        }
    }

    body_start.map(|start| &output[start..])
}

pub struct ToolExtractor<'r> {
    runner: &'r dyn SubprocessRunner,
    section_header: String,
    start_token: String,
    end_token: String,
}

impl<'r> ToolExtractor<'r> {
    #[must_use]
    pub fn new(runner: &'r dyn SubprocessRunner, config: &ResolverConfig) -> Self {
        Self {
            runner,
            section_header: config.debug_section_header.clone(),
            start_token: config.blob_start_token.clone(),
            end_token: config.blob_end_token.clone(),
        }
    }
}

impl Extractor for ToolExtractor<'_> {
    fn tier(&self) -> ExtractionTier {
        ExtractionTier::ToolDump
    }

    fn extract(&self, input: &ExtractionInput<'_>) -> Result<MappingTable, ExtractError> {
        if input.artifact_bytes.is_none() {
            return Err(ExtractError::NotFound("compiled artifact not readable".to_string()));
        }

        let output = self.runner.run(input.artifact_path)?;
        let section = debug_section(&output, &self.section_header).ok_or_else(|| {
            ExtractError::NotFound(format!("no {:?} section in tool output", self.section_header))
        })?;

        let blob = find_blob(section.as_bytes(), &self.start_token, &self.end_token)?;
        Ok(smap::parse(&String::from_utf8_lossy(blob), input.template))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TemplateFile;

    const JAVAP_OUTPUT: &str = "Classfile /work/org/apache/jsp/index_jsp.class
  Last modified Oct 1, 2026; size 5123 bytes
  Compiled from \"index_jsp.java\"
public final class org.apache.jsp.index_jsp extends org.apache.jasper.runtime.HttpJspBase
  minor version: 0
  major version: 52
{
  public void _jspService(HttpServletRequest, HttpServletResponse);
}
SourceFile: \"index_jsp.java\"
SourceDebugExtension:
  SMAP
  index_jsp.java
  JSP
  *S JSP
  *F
  + 0 index.jsp
  index.jsp
  *L
  1,5:122
  7,52:128
  *E
InnerClasses:
  static #1; // class foo
";

    struct FixedOutput(Result<String, ()>);

    impl SubprocessRunner for FixedOutput {
        fn run(&self, _artifact: &Path) -> Result<String, ToolError> {
            self.0.clone().map_err(|()| ToolError::Exited {
                program: "javap".to_string(),
                status: "exit status: 1".to_string(),
            })
        }
    }

    fn command(argv: &[&str]) -> CommandRunner {
        CommandRunner::new(argv.iter().map(ToString::to_string).collect())
    }

    fn extract_with(runner: &dyn SubprocessRunner) -> Result<MappingTable, ExtractError> {
        let template = TemplateFile::new("index.jsp");
        let bytes = [0xCA, 0xFE];
        let input = ExtractionInput {
            artifact_path: Path::new("/work/index_jsp.class"),
            artifact_bytes: Some(&bytes),
            generated_source: None,
            template: &template,
        };
        ToolExtractor::new(runner, &ResolverConfig::default()).extract(&input)
    }

    #[test]
    fn test_debug_section_stops_at_next_header() {
        let body = debug_section(JAVAP_OUTPUT, "SourceDebugExtension:").unwrap();
        assert!(body.trim_start().starts_with("SMAP"));
        assert!(body.trim_end().ends_with("*E"));
        assert!(!body.contains("InnerClasses"));
    }

    #[test]
    fn test_debug_section_runs_to_end_of_output() {
        let output = "SourceFile: \"a.java\"\nSourceDebugExtension:\n  SMAP\n  *L\n  1:2\n  *E";
        let body = debug_section(output, "SourceDebugExtension:").unwrap();
        assert_eq!(body, "  SMAP\n  *L\n  1:2\n  *E");
    }

    #[test]
    fn test_debug_section_missing() {
        assert!(debug_section("SourceFile: \"a.java\"\n", "SourceDebugExtension:").is_none());
    }

    #[test]
    fn test_extract_from_tool_output() {
        let runner = FixedOutput(Ok(JAVAP_OUTPUT.to_string()));
        let table = extract_with(&runner).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.segments()[0].to_string(), "1#0,5:122");
    }

    #[test]
    fn test_tool_failure_is_tool_unavailable() {
        let runner = FixedOutput(Err(()));
        assert!(matches!(extract_with(&runner), Err(ExtractError::ToolUnavailable(_))));
    }

    #[test]
    fn test_output_without_section_is_not_found() {
        let runner = FixedOutput(Ok("Classfile /work/index_jsp.class\n".to_string()));
        assert!(matches!(extract_with(&runner), Err(ExtractError::NotFound(_))));
    }

    #[test]
    fn test_unconfigured_tool_is_not_found() {
        let runner = CommandRunner::new(Vec::new());
        assert!(matches!(extract_with(&runner), Err(ExtractError::NotFound(_))));
    }

    #[test]
    fn test_no_command_configured() {
        let runner = CommandRunner::new(Vec::new());
        assert!(matches!(runner.run(Path::new("x.class")), Err(ToolError::NoCommand)));
    }

    #[test]
    fn test_missing_program_fails_to_spawn() {
        let runner = command(&["/nonexistent/jspmap-test-tool"]);
        assert!(matches!(runner.run(Path::new("x.class")), Err(ToolError::Spawn { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_runner_captures_stdout() {
        let runner = command(&["echo", "SMAP"]);
        let output = runner.run(Path::new("index_jsp.class")).unwrap();
        assert_eq!(output.trim(), "SMAP index_jsp.class");
    }

    #[cfg(unix)]
    #[test]
    fn test_runner_nonzero_exit() {
        let runner = command(&["false"]);
        assert!(matches!(runner.run(Path::new("x.class")), Err(ToolError::Exited { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_runner_output_cap() {
        let runner = command(&["echo", "0123456789"]).with_max_output(4);
        assert!(matches!(
            runner.run(Path::new("x.class")),
            Err(ToolError::OutputTooLarge { limit: 4, .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_runner_timeout() {
        let runner = command(&["sleep"]).with_timeout(Duration::from_millis(100));
        // The artifact path becomes sleep's argument
        let result = runner.run(Path::new("5"));
        assert!(matches!(result, Err(ToolError::TimedOut { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_runner_timeout_after_stdout_closed() {
        let script = "echo hi; exec >&-; sleep 5";
        let runner = command(&["sh", "-c", script]).with_timeout(Duration::from_millis(200));

        let started = Instant::now();
        let result = runner.run(Path::new("index_jsp.class"));
        assert!(matches!(result, Err(ToolError::TimedOut { .. })), "{result:?}");
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[cfg(unix)]
    #[test]
    fn test_runner_timeout_with_stdout_held_by_grandchild() {
        let script = "sleep 5 & echo hi";
        let runner = command(&["sh", "-c", script]).with_timeout(Duration::from_millis(200));

        let started = Instant::now();
        let result = runner.run(Path::new("index_jsp.class"));
        assert!(matches!(result, Err(ToolError::TimedOut { .. })), "{result:?}");
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[cfg(unix)]
    #[test]
    fn test_runner_cancelled_before_start() {
        let (canceller, token) = cancellation();
        canceller.cancel();
        assert!(token.is_cancelled());

        let runner = command(&["sleep"]).with_cancel_token(token);
        assert!(matches!(runner.run(Path::new("5")), Err(ToolError::Cancelled { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_runner_cancelled_while_running() {
        let (canceller, token) = cancellation();
        let runner = command(&["sleep"]).with_cancel_token(token);

        let handle = thread::spawn(move || runner.run(Path::new("5")));
        thread::sleep(Duration::from_millis(50));
        canceller.cancel();

        let result = handle.join().unwrap();
        assert!(matches!(result, Err(ToolError::Cancelled { .. })));
    }

    #[test]
    fn test_live_token_is_not_cancelled() {
        let (_canceller, token) = cancellation();
        assert!(!token.is_cancelled());
    }
}
