//! Decode, stamp, deliver.
//!
//! Both listeners hand raw payloads to a shared [`Dispatcher`]. A payload that
//! decodes gets the next receipt number and goes to the [`ReceiptSink`]; one
//! that does not is logged and dropped without touching the counter.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tracing::warn;

use super::counter::ReceiptCounter;
use crate::codec::{Message, decode};

/// Which delivery mechanism a payload arrived through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    PubSub,
    Queue,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::PubSub => f.write_str("pub-sub"),
            Source::Queue => f.write_str("queue"),
        }
    }
}

/// A decoded message stamped with its global receipt number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub number: u64,
    pub source: Source,
    pub message: Message,
}

impl Receipt {
    pub fn display_line(&self) -> String {
        self.message
            .display_line(self.number, &self.source.to_string())
    }
}

/// Where receipts end up.
pub trait ReceiptSink: Send + Sync {
    fn deliver(&self, receipt: Receipt);
}

/// Prints one line per receipt on stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl ReceiptSink for StdoutSink {
    fn deliver(&self, receipt: Receipt) {
        println!("{}", receipt.display_line());
    }
}

impl ReceiptSink for UnboundedSender<Receipt> {
    fn deliver(&self, receipt: Receipt) {
        // Receiver gone means nobody is interested any more
        let _ = self.send(receipt);
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    counter: Arc<ReceiptCounter>,
    sink: Arc<dyn ReceiptSink>,
}

impl Dispatcher {
    pub fn new(counter: Arc<ReceiptCounter>, sink: Arc<dyn ReceiptSink>) -> Self {
        Self { counter, sink }
    }

    /// Returns the receipt number, or `None` if the payload was dropped.
    pub fn dispatch(&self, payload: &[u8], source: Source) -> Option<u64> {
        match decode(payload) {
            Ok(message) => {
                let number = self.counter.increment();
                self.sink.deliver(Receipt {
                    number,
                    source,
                    message,
                });
                Some(number)
            }
            Err(err) => {
                warn!(source = %source, "Failed to parse message from {}: {}", source, err);
                None
            }
        }
    }

    pub fn received(&self) -> u64 {
        self.counter.current()
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("received", &self.counter.current())
            .finish()
    }
}
