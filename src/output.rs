//! Output streaming.
//!
//! Each spawned process gets two reader threads, one per pipe. They split the
//! byte stream into lines and hand each line to the observer, and finish on
//! their own when the pipe closes.
use std::{
    io::{self, BufRead, BufReader, Read},
    sync::Arc,
    thread::{self, JoinHandle},
};

use tracing::debug;

use crate::{events::ProcessOutput, observer::Observer};

/// Which pipe a reader consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl OutputStream {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputStream::Stdout => "stdout",
            OutputStream::Stderr => "stderr",
        }
    }

    pub fn is_stderr(&self) -> bool {
        matches!(self, OutputStream::Stderr)
    }
}

/// Splits `reader` into lines and calls `emit` for each one.
///
/// Lines are terminated by `\n` (a trailing `\r` is dropped) and blank lines
/// are emitted as empty strings. A line longer than `max_line` bytes is
/// emitted in `max_line`-sized pieces, and a final unterminated line is
/// emitted when the stream ends. Invalid UTF-8 is replaced lossily.
pub fn stream_lines<R: BufRead>(
    mut reader: R,
    max_line: usize,
    mut emit: impl FnMut(String),
) -> io::Result<()> {
    let max_line = max_line.max(1);
    let mut pending: Vec<u8> = Vec::new();
    // Set when the last piece was cut at `max_line`; a newline right after it
    // terminates that piece instead of starting an empty line.
    let mut split = false;

    loop {
        let buf = match reader.fill_buf() {
            Ok(buf) => buf,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => {
                flush_partial(&mut pending, &mut emit);
                return Err(err);
            }
        };

        if buf.is_empty() {
            flush_partial(&mut pending, &mut emit);
            return Ok(());
        }

        let room = max_line - pending.len();
        let window = &buf[..buf.len().min(room)];

        match window.iter().position(|&byte| byte == b'\n') {
            Some(newline) => {
                pending.extend_from_slice(&window[..newline]);
                reader.consume(newline + 1);
                if !(split && pending.is_empty()) {
                    emit_line(&mut pending, &mut emit);
                }
                split = false;
            }
            None => {
                let taken = window.len();
                pending.extend_from_slice(window);
                reader.consume(taken);
                split = pending.len() >= max_line;
                if split {
                    emit_line(&mut pending, &mut emit);
                }
            }
        }
    }
}

fn emit_line(pending: &mut Vec<u8>, emit: &mut impl FnMut(String)) {
    if pending.last() == Some(&b'\r') {
        pending.pop();
    }
    emit(String::from_utf8_lossy(pending).into_owned());
    pending.clear();
}

/// Emits an unterminated trailing line, if any.
fn flush_partial(pending: &mut Vec<u8>, emit: &mut impl FnMut(String)) {
    if !pending.is_empty() {
        emit_line(pending, emit);
    }
}

/// Starts a reader thread forwarding `stream` to `observer` as `ProcessOutput`s.
pub fn spawn_output_reader<R>(
    name: &str,
    stream: R,
    kind: OutputStream,
    buffer_size: usize,
    observer: Arc<dyn Observer>,
) -> JoinHandle<()>
where
    R: Read + Send + 'static,
{
    let name = name.to_string();
    thread::spawn(move || {
        let reader = BufReader::with_capacity(buffer_size, stream);
        let result = stream_lines(reader, buffer_size, |line| {
            observer.on_output(ProcessOutput {
                name: name.clone(),
                line,
                is_stderr: kind.is_stderr(),
            });
        });

        match result {
            Ok(()) => debug!("{} reader for '{name}' reached end of stream", kind.as_str()),
            Err(err) => debug!("{} reader for '{name}' stopped: {err}", kind.as_str()),
        }
    })
}
