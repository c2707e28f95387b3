use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use tracing::Subscriber;
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

pub const DEFAULT_FILTER: &str = "info";

/// Hands the fmt layer one writer per event; each formatted event reaches the
/// debug pane as a single line.
#[derive(Clone)]
pub struct PaneWriter {
    tx: Sender<String>,
}

impl PaneWriter {
    pub fn new() -> (Self, Receiver<String>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx }, rx)
    }
}

pub struct PaneLine {
    tx: Sender<String>,
    buf: Vec<u8>,
}

impl io::Write for PaneLine {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for PaneLine {
    fn drop(&mut self) {
        let line = String::from_utf8_lossy(&self.buf).trim().to_string();
        if !line.is_empty() {
            // Receiver gone means the UI is shutting down
            let _ = self.tx.send(line);
        }
    }
}

impl<'a> MakeWriter<'a> for PaneWriter {
    type Writer = PaneLine;

    fn make_writer(&'a self) -> Self::Writer {
        PaneLine {
            tx: self.tx.clone(),
            buf: Vec::new(),
        }
    }
}

fn pane_layer<S>(writer: PaneWriter) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(false)
        .without_time()
}

/// `AIGEN_LOG` directives, falling back to `info` when they don't parse.
pub fn pane_filter(directives: &str) -> EnvFilter {
    EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber. Formatted lines arrive on the returned receiver.
pub fn init(directives: &str) -> anyhow::Result<Receiver<String>> {
    let (writer, rx) = PaneWriter::new();
    tracing_subscriber::registry()
        .with(pane_layer(writer))
        .with(pane_filter(directives))
        .try_init()
        .map_err(|e| anyhow::anyhow!("installing log subscriber: {e}"))?;
    Ok(rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capture(directives: &str, emit: impl FnOnce()) -> Vec<String> {
        let (writer, rx) = PaneWriter::new();
        let subscriber = tracing_subscriber::registry()
            .with(pane_layer(writer))
            .with(pane_filter(directives));
        tracing::subscriber::with_default(subscriber, emit);
        rx.try_iter().collect()
    }

    #[test]
    fn forwards_enabled_events_as_single_lines() {
        let lines = capture("info", || {
            tracing::warn!("generation failed");
            tracing::debug!("noise");
        });
        assert_eq!(lines.len(), 1, "{lines:?}");
        assert!(lines[0].contains("WARN"));
        assert!(lines[0].ends_with("generation failed"));
    }

    #[test]
    fn target_directives_and_bad_input() {
        let lines = capture("aigen_tui=debug", || tracing::debug!("row added"));
        assert_eq!(lines.len(), 1, "{lines:?}");
        let lines = capture("aigen_tui=loudest", || {
            tracing::info!("kept");
            tracing::debug!("dropped");
        });
        assert_eq!(lines.len(), 1, "{lines:?}");
        assert!(lines[0].ends_with("kept"));
    }
}
