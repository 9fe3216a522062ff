//! The serial task queue shared by backends and the controller.

use super::{Envelope, Event, Generation};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

/// FIFO of pending events, drained by whoever owns it.
///
/// Producers hold a [`QueueHandle`] or a [`Responder`]; both are `Send` and
/// may post from any thread. Consumption happens only through the owner, which
/// makes delivery strictly serial.
#[derive(Debug)]
pub struct SerialQueue {
    tx: Sender<Envelope>,
    rx: Receiver<Envelope>,
}

impl SerialQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self { tx, rx }
    }

    /// Returns a producer handle for this queue.
    pub fn handle(&self) -> QueueHandle {
        QueueHandle {
            tx: self.tx.clone(),
        }
    }

    /// Pops the oldest pending envelope without blocking.
    pub fn pop(&self) -> Option<Envelope> {
        match self.rx.try_recv() {
            Ok(envelope) => Some(envelope),
            // We hold a sender ourselves, so the queue never disconnects.
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }
}

impl Default for SerialQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloneable producer side of a [`SerialQueue`].
#[derive(Debug, Clone)]
pub struct QueueHandle {
    tx: Sender<Envelope>,
}

impl QueueHandle {
    /// Creates a responder whose deliveries are stamped with `generation`.
    pub fn responder(&self, generation: Generation) -> Responder {
        Responder {
            generation,
            tx: self.tx.clone(),
        }
    }
}

/// Completion channel handed to an asynchronous device call.
///
/// Each async call completes by invoking [`Responder::deliver`]; the event is
/// queued, never handled inline, so a backend that completes synchronously
/// cannot re-enter the controller.
#[derive(Debug, Clone)]
pub struct Responder {
    generation: Generation,
    tx: Sender<Envelope>,
}

impl Responder {
    /// Posts `event` to the queue.
    pub fn deliver(&self, event: Event) {
        let envelope = Envelope {
            generation: self.generation,
            event,
        };
        if self.tx.send(envelope).is_err() {
            tracing::trace!(generation = %self.generation, "Dispatch queue gone, event dropped");
        }
    }

    /// Generation the responder was issued under.
    pub fn generation(&self) -> Generation {
        self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_delivery() {
        let queue = SerialQueue::new();
        let responder = queue.handle().responder(Generation(3));

        responder.deliver(Event::DeviceDisconnected);
        responder.deliver(Event::SessionConfigureFailed);

        let first = queue.pop().unwrap();
        assert_eq!(first.generation, Generation(3));
        assert_eq!(first.event, Event::DeviceDisconnected);
        assert_eq!(queue.pop().unwrap().event, Event::SessionConfigureFailed);
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_deliver_from_other_thread() {
        let queue = SerialQueue::new();
        let responder = queue.handle().responder(Generation(1));

        std::thread::spawn(move || responder.deliver(Event::DeviceDisconnected))
            .join()
            .unwrap();

        assert_eq!(queue.pop().unwrap().event, Event::DeviceDisconnected);
    }
}
