use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use tracing::Level;

/// Writer handed out per event: the shared log file when one is open,
/// stderr otherwise.
pub struct DelegatingWriter {
    inner: DelegatingInner,
}

enum DelegatingInner {
    File(Arc<Mutex<File>>),
    Stderr(io::Stderr),
}

impl Write for DelegatingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.inner {
            DelegatingInner::File(file) => file
                .lock()
                .map_err(|_| io::Error::other("log file lock poisoned"))?
                .write(buf),
            DelegatingInner::Stderr(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.inner {
            DelegatingInner::File(file) => file
                .lock()
                .map_err(|_| io::Error::other("log file lock poisoned"))?
                .flush(),
            DelegatingInner::Stderr(s) => s.flush(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct SubscriberMakeWriter {
    file: Option<Arc<Mutex<File>>>,
}

impl SubscriberMakeWriter {
    /// Appends to `path`, creating it if needed.
    pub fn to_file(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Some(Arc::new(Mutex::new(file))),
        })
    }

    pub fn stderr() -> Self {
        Self::default()
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for SubscriberMakeWriter {
    type Writer = DelegatingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        let inner = match &self.file {
            Some(file) => DelegatingInner::File(Arc::clone(file)),
            None => DelegatingInner::Stderr(io::stderr()),
        };
        DelegatingWriter { inner }
    }
}

/// Installs the global subscriber.
///
/// The terminal is in raw mode on the alternate screen while the client
/// runs, so anything on stderr would corrupt the display; without a log
/// file only warnings and errors are let through. A log file that cannot
/// be opened falls back to stderr and the open error is reported there.
/// Safe to call more than once; later calls are no-ops.
pub fn init(log_file: Option<&Path>, level: Level) {
    let mut open_error = None;
    let writer = match log_file.map(SubscriberMakeWriter::to_file) {
        Some(Ok(writer)) => Some(writer),
        Some(Err(err)) => {
            open_error = Some(err);
            None
        }
        None => None,
    };
    let (writer, level) = match writer {
        Some(writer) => (writer, level),
        None => (SubscriberMakeWriter::stderr(), level.min(Level::WARN)),
    };
    let installed = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(writer)
        .with_ansi(false)
        .with_target(false)
        .with_thread_names(false)
        .try_init()
        .is_ok();
    if installed && let Some(err) = open_error {
        tracing::warn!(%err, path = ?log_file, "cannot open log file, logging to stderr");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tracing_subscriber::fmt::MakeWriter;

    #[test]
    fn file_writer_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.log");
        let make = SubscriberMakeWriter::to_file(&path).unwrap();
        make.make_writer().write_all(b"one\n").unwrap();
        make.make_writer().write_all(b"two\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "one\ntwo\n");
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope").join("client.log");
        assert!(SubscriberMakeWriter::to_file(&path).is_err());
    }
}
