//! Card arrival events and the loop that turns each arrival into one session

use std::{io, sync::Arc, thread};

use flume::{Receiver, Sender};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::{
    config::{ConfigError, WriterConfig},
    session::{Outcome, TagSession},
    transport::{ReaderLock, TagTransport, TimeoutTransport},
};

/// Cards that entered and left the field since the previous batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardBatch<C> {
    pub arrived: Vec<C>,
    pub removed: Vec<C>,
}

impl<C> CardBatch<C> {
    pub fn arrived(cards: Vec<C>) -> Self {
        Self {
            arrived: cards,
            removed: Vec::new(),
        }
    }

    pub fn removed(cards: Vec<C>) -> Self {
        Self {
            arrived: Vec::new(),
            removed: cards,
        }
    }
}

/// Source of card batches, `None` once the reader is gone
pub trait CardEventSource {
    type Card: TagTransport + 'static;

    fn next_batch(&mut self) -> Option<CardBatch<Self::Card>>;
}

impl<C: TagTransport + 'static> CardEventSource for Receiver<CardBatch<C>> {
    type Card = C;

    fn next_batch(&mut self) -> Option<CardBatch<C>> {
        self.recv().ok()
    }
}

/// Writes the current text to the expected tag each time one arrives
#[derive(Debug, Clone)]
pub struct TagWriter {
    config: Arc<WriterConfig>,
    text: Arc<RwLock<String>>,
    reader: ReaderLock,
}

impl TagWriter {
    pub fn new(config: WriterConfig) -> Self {
        Self {
            config: Arc::new(config),
            text: Arc::new(RwLock::new(String::new())),
            reader: ReaderLock::default(),
        }
    }

    pub fn start(expected_uid_hex: &str, text: impl Into<String>) -> Result<Self, ConfigError> {
        let writer = Self::new(WriterConfig::new(expected_uid_hex)?);
        writer.set_text(text);
        Ok(writer)
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    /// Takes effect from the next arrival, a running session keeps its snapshot
    pub fn set_text(&self, text: impl Into<String>) {
        *self.text.write() = text.into();
    }

    pub fn text(&self) -> String {
        self.text.read().clone()
    }

    /// Only the first arrived card gets a session
    pub fn handle_batch<C: TagTransport + 'static>(&self, batch: CardBatch<C>) -> Option<Outcome> {
        if !batch.removed.is_empty() {
            debug!(count = batch.removed.len(), "cards removed");
        }

        let mut arrived = batch.arrived.into_iter();
        let card = arrived.next()?;

        let ignored = arrived.count();
        if ignored > 0 {
            warn!(ignored, "more than one card arrived, only the first is written");
        }

        Some(self.handle_card(card))
    }

    pub fn handle_card(&self, card: impl TagTransport + 'static) -> Outcome {
        let text = self.text();
        let transport = TimeoutTransport::with_reader_lock(
            card,
            self.config.transmit_timeout(),
            Arc::clone(&self.reader),
        );

        let outcome = TagSession::new(&self.config, transport, &text).run();
        info!(%outcome, success = outcome.is_success(), "tag session finished");

        outcome
    }

    /// Blocks until the source is exhausted or nobody listens for outcomes
    pub fn run<S: CardEventSource>(&self, mut source: S, outcomes: &Sender<Outcome>) {
        while let Some(batch) = source.next_batch() {
            let Some(outcome) = self.handle_batch(batch) else {
                continue;
            };

            if outcomes.send(outcome).is_err() {
                debug!("outcome receiver dropped, stopping");
                break;
            }
        }

        debug!("card event source closed");
    }

    pub fn spawn<S>(&self, source: S) -> io::Result<TagWriterHandle>
    where
        S: CardEventSource + Send + 'static,
    {
        let (sender, receiver) = flume::unbounded();
        let writer = self.clone();

        let thread = thread::Builder::new()
            .name("tag-writer".to_string())
            .spawn(move || writer.run(source, &sender))?;

        Ok(TagWriterHandle {
            outcomes: receiver,
            thread,
        })
    }
}

#[derive(Debug)]
pub struct TagWriterHandle {
    outcomes: Receiver<Outcome>,
    thread: thread::JoinHandle<()>,
}

impl TagWriterHandle {
    /// Next outcome, `None` after the loop stopped
    pub fn recv(&self) -> Option<Outcome> {
        self.outcomes.recv().ok()
    }

    pub fn join(self) -> thread::Result<()> {
        self.thread.join()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        apdu::{Response, SELECT_UID, StatusWord},
        session::Stage,
        simulator::MemoryTag,
        transport::TransportError,
        uid::TagUid,
    };

    const EXPECTED_UID: &str = "1DD94F118D0000";

    fn writer(text: &str) -> TagWriter {
        TagWriter::start(EXPECTED_UID, text).unwrap()
    }

    fn matching_tag() -> Arc<MemoryTag> {
        Arc::new(MemoryTag::new(TagUid::from_hex(EXPECTED_UID).unwrap()))
    }

    #[test]
    fn arrival_produces_one_outcome() {
        let writer = writer("hello");
        let tag = matching_tag();

        let outcome = writer.handle_batch(CardBatch::arrived(vec![tag.clone()]));

        assert_eq!(outcome, Some(Outcome::WriteSucceeded));
        assert_eq!(tag.written_pages(), vec![4, 5, 6, 7]);
    }

    #[test]
    fn only_first_card_in_batch_is_written() {
        let writer = writer("hello");
        let first = matching_tag();
        let second = matching_tag();

        let outcome = writer.handle_batch(CardBatch::arrived(vec![first.clone(), second.clone()]));

        assert_eq!(outcome, Some(Outcome::WriteSucceeded));
        assert_eq!(first.commands().len(), 5);
        assert!(second.commands().is_empty());
    }

    #[test]
    fn removal_only_batch_does_nothing() {
        let writer = writer("hello");
        let tag = matching_tag();

        assert_eq!(writer.handle_batch(CardBatch::removed(vec![tag.clone()])), None);
        assert!(tag.commands().is_empty());
    }

    #[test]
    fn text_change_applies_to_next_tag() {
        let writer = writer("first");
        let tag = matching_tag();
        writer.handle_card(tag.clone());

        writer.set_text("second");
        let next = matching_tag();
        writer.handle_card(next.clone());

        let records = tagwriter_ndef::decode_message(&next.user_memory()).unwrap();
        assert_eq!(records[0].text_payload().unwrap().text, "second");
        assert_eq!(writer.text(), "second");
    }

    #[test]
    fn hung_reader_times_out() {
        #[derive(Debug)]
        struct HungReader;

        impl TagTransport for HungReader {
            fn transmit(&self, _command: &[u8]) -> Result<Response, TransportError> {
                thread::sleep(Duration::from_millis(500));
                Ok(Response::status(StatusWord::SUCCESS))
            }
        }

        let config = WriterConfig::new(EXPECTED_UID)
            .unwrap()
            .with_transmit_timeout(Some(Duration::from_millis(20)));
        let writer = TagWriter::new(config);
        writer.set_text("hello");

        assert_eq!(
            writer.handle_card(HungReader),
            Outcome::transport(Stage::UidRead, "timeout")
        );
    }

    #[test]
    fn session_after_a_timeout_waits_for_the_reader() {
        #[derive(Debug)]
        struct SlowUidRead(Arc<MemoryTag>);

        impl TagTransport for SlowUidRead {
            fn transmit(&self, command: &[u8]) -> Result<Response, TransportError> {
                thread::sleep(Duration::from_millis(100));
                self.0.transmit(command)
            }
        }

        let config = WriterConfig::new(EXPECTED_UID)
            .unwrap()
            .with_transmit_timeout(Some(Duration::from_millis(10)));
        let writer = TagWriter::new(config);
        writer.set_text("hello");

        let tag = matching_tag();
        let outcome = writer.handle_card(SlowUidRead(tag.clone()));
        assert_eq!(outcome, Outcome::transport(Stage::UidRead, "timeout"));

        // the late uid read still completes, nothing else reaches the tag meanwhile
        let next = writer.handle_card(tag.clone());
        assert_eq!(next, Outcome::transport(Stage::UidRead, "timeout"));
        thread::sleep(Duration::from_millis(300));

        let commands = tag.commands();
        assert_eq!(commands.len(), 2);
        assert!(commands.iter().all(|command| command == &SELECT_UID.to_vec()));
    }

    #[test]
    fn loop_reports_every_arrival() {
        let writer = writer("hello");
        let (batches, source) = flume::unbounded::<CardBatch<Arc<MemoryTag>>>();
        let handle = writer.spawn(source).unwrap();

        let wrong = Arc::new(MemoryTag::new(TagUid::from_hex("00000000000000").unwrap()));
        batches.send(CardBatch::arrived(vec![wrong.clone()])).unwrap();
        batches.send(CardBatch::removed(vec![wrong])).unwrap();
        batches.send(CardBatch::arrived(vec![matching_tag()])).unwrap();
        drop(batches);

        assert!(matches!(handle.recv(), Some(Outcome::AccessDenied { .. })));
        assert_eq!(handle.recv(), Some(Outcome::WriteSucceeded));
        assert_eq!(handle.recv(), None);
        assert!(handle.join().is_ok());
    }

    #[test]
    fn bad_expected_uid_fails_at_start() {
        assert!(TagWriter::start("xyz", "hello").is_err());
    }
}
