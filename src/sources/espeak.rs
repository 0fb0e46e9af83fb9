use std::borrow::Cow;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use super::Transcriber;
use crate::canonical::SourceAlphabet;
use crate::error::SourceError;
use crate::resolver::FallbackBackend;
use crate::vocab::Locale;

/// Transcribes text by running espeak-ng (or legacy espeak) as a subprocess.
///
/// # Bundled espeak-ng
///
/// ```no_run
/// use kokoro_g2p::sources::EspeakTranscriber;
///
/// let espeak = EspeakTranscriber::new()
///     .with_binary("/app/resources/espeak-ng/espeak-ng")
///     .with_data_path("/app/resources/espeak-ng-data");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EspeakTranscriber {
    bin_path: PathBuf,
    data_path: Option<PathBuf>,
}

impl Default for EspeakTranscriber {
    fn default() -> Self {
        Self::new()
    }
}

impl EspeakTranscriber {
    /// Use `espeak-ng` from PATH.
    pub fn new() -> Self {
        Self::for_backend(FallbackBackend::EspeakNg)
    }

    /// Use the backend's binary from PATH.
    pub fn for_backend(backend: FallbackBackend) -> Self {
        Self {
            bin_path: PathBuf::from(backend.binary_name()),
            data_path: None,
        }
    }

    pub fn with_binary(mut self, bin_path: impl Into<PathBuf>) -> Self {
        self.bin_path = bin_path.into();
        self
    }

    /// Directory passed as `ESPEAK_DATA_PATH`.
    pub fn with_data_path(mut self, data_path: impl Into<PathBuf>) -> Self {
        self.data_path = Some(data_path.into());
        self
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.bin_path);
        if let Some(data_path) = &self.data_path {
            command.env("ESPEAK_DATA_PATH", data_path);
        }
        command
    }

    fn run(&self, input: &str, voice: &str, timeout: Duration) -> Result<String, SourceError> {
        let mut child = self
            .command()
            .args(["--ipa", "--stdin", "-q", "-v", voice])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    SourceError::NotFound(self.bin_path.display().to_string())
                } else {
                    SourceError::Io(e)
                }
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            // espeak treats stdin as line-oriented input; an unterminated last
            // line can be under-processed.
            if let Err(e) = stdin.write_all(stdin_payload(input).as_bytes()) {
                drop(stdin);
                let _ = child.kill();
                let _ = child.wait();
                return Err(e.into());
            }
        }

        let mut stdout = child.stdout.take();
        let mut stderr = child.stderr.take();
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut out = Vec::new();
            let mut err = Vec::new();
            if let Some(stdout) = stdout.as_mut() {
                let _ = stdout.read_to_end(&mut out);
            }
            if let Some(stderr) = stderr.as_mut() {
                let _ = stderr.read_to_end(&mut err);
            }
            let _ = tx.send((out, err));
        });

        let (out, err) = match rx.recv_timeout(timeout) {
            Ok(output) => output,
            Err(_) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(SourceError::Timeout(timeout));
            }
        };

        let status = child.wait()?;
        if !status.success() {
            return Err(SourceError::Failed(format!(
                "{} exited with code {:?}: {}",
                self.bin_path.display(),
                status.code(),
                String::from_utf8_lossy(&err).trim()
            )));
        }

        Ok(join_lines(&String::from_utf8_lossy(&out)))
    }
}

impl Transcriber for EspeakTranscriber {
    fn name(&self) -> &str {
        self.bin_path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("espeak")
    }

    fn alphabet(&self) -> SourceAlphabet {
        SourceAlphabet::ESPEAK
    }

    fn is_available(&self) -> bool {
        self.command()
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    fn transcribe(
        &self,
        text: &str,
        locale: Locale,
        timeout: Duration,
    ) -> Result<String, SourceError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(String::new());
        }
        self.run(text, locale.espeak_voice(), timeout)
    }
}

fn stdin_payload(input: &str) -> Cow<'_, str> {
    if input.ends_with('\n') {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(format!("{input}\n"))
    }
}

/// espeak may wrap one input into several output lines.
fn join_lines(output: &str) -> String {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
