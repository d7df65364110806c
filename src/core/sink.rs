//! Observation sinks for request/result events
//!
//! A sink only observes. Write failures are logged and never reach the
//! allocator.

use crate::allocator::AllocationResult;
use crate::requests::Request;
use std::fmt;
use std::io::Write;

/// One observable event emitted by the allocator
#[derive(Debug, Clone, Copy)]
pub enum Event<'a> {
    /// A request about to be handled, with the page count it resolved to
    Request { request: &'a Request, pages: u32 },
    /// The outcome of the request
    Result(&'a AllocationResult),
}

impl fmt::Display for Event<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Request { request, pages } => match request {
                Request::Allocate { .. } => write!(f, "Request: Allocate(pages={})", pages),
                Request::Free { block } => {
                    write!(f, "Request: Free(block={}, pages={})", block, pages)
                }
                Request::MeToo {
                    candidate,
                    reference,
                } => write!(
                    f,
                    "Request: MeToo(block={}, pages={}, reference={})",
                    candidate, pages, reference
                ),
            },
            Event::Result(result) => {
                let outcome = if result.success { "Success" } else { "Failure" };
                write!(f, "Result: {}(", outcome)?;
                if let Some(block) = result.block {
                    write!(f, "block={}, ", block)?;
                }
                if let Some(start) = result.start_offset {
                    write!(f, "start={}, ", start)?;
                }
                write!(f, "pages={}", result.pages)?;
                if let Some(before) = result.before {
                    write!(f, ", before={}", before)?;
                    match result.after {
                        Some((left, right)) => write!(f, ", after=({},{})", left, right)?,
                        None => write!(f, ", after=None")?,
                    }
                }
                write!(f, ")")
            }
        }
    }
}

/// Receiver of allocator events
pub trait EventSink {
    fn record(&mut self, event: &Event<'_>);
}

impl<S: EventSink + ?Sized> EventSink for Box<S> {
    fn record(&mut self, event: &Event<'_>) {
        (**self).record(event);
    }
}

/// Writes one line per event to any `Write` implementation
#[derive(Debug)]
pub struct WriterSink<W: Write> {
    writer: W,
}

impl<W: Write> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        WriterSink { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> EventSink for WriterSink<W> {
    fn record(&mut self, event: &Event<'_>) {
        if let Err(e) = writeln!(self.writer, "{}", event) {
            tracing::warn!("Event sink write failed: {}", e);
        }
    }
}

/// Forwards events to `tracing` at debug level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&mut self, event: &Event<'_>) {
        tracing::debug!("{}", event);
    }
}
