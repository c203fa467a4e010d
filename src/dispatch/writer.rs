//! `io::Write` and [`MakeWriter`] adapters over a [`Dispatcher`].
//!
//! Lets a `tracing_subscriber::fmt` layer format each event and hand the
//! bytes to the dispatcher, one event per `write` call.

use std::io;

use tracing_subscriber::fmt::MakeWriter;

use crate::dispatch::dispatcher::Dispatcher;

/// Borrowed writer handed out by [`Dispatcher::make_writer`](MakeWriter::make_writer).
///
/// `write` enqueues the whole buffer as one record and never blocks;
/// `flush` is a no-op. Use [`Dispatcher::flush`] to drain.
#[derive(Clone, Copy)]
pub struct DispatchWriter<'a>(&'a Dispatcher);

impl<'a> DispatchWriter<'a> {
    /// Wraps a dispatcher.
    pub fn new(dispatcher: &'a Dispatcher) -> Self {
        Self(dispatcher)
    }
}

impl io::Write for DispatchWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for Dispatcher {
    type Writer = DispatchWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        DispatchWriter(self)
    }
}
