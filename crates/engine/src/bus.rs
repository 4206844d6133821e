//! In-process change notifications.
//!
//! Publishers fan out to every live [`Subscription`]; each subscription queues
//! events until its owner drains them. Nothing here deduplicates, so handlers
//! must tolerate seeing the same node more than once.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};

use pathtree_core::ChangeEvent;

use crate::error::BusError;

pub trait ChangeBus {
    fn publish(&self, event: ChangeEvent) -> Result<(), BusError>;
}

/// Cloning shares the subscriber list.
#[derive(Debug, Clone, Default)]
pub struct LocalChangeBus {
    subscribers: Arc<Mutex<Vec<Sender<ChangeEvent>>>>,
}

impl LocalChangeBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Result<Subscription, BusError> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.lock().map_err(|_| BusError::Poisoned)?.push(tx);
        Ok(Subscription { rx })
    }

    pub fn subscriber_count(&self) -> Result<usize, BusError> {
        Ok(self.subscribers.lock().map_err(|_| BusError::Poisoned)?.len())
    }
}

impl ChangeBus for LocalChangeBus {
    fn publish(&self, event: ChangeEvent) -> Result<(), BusError> {
        let mut subscribers = self.subscribers.lock().map_err(|_| BusError::Poisoned)?;
        // A failed send means the subscription was dropped.
        subscribers.retain(|tx| tx.send(event).is_ok());
        Ok(())
    }
}

#[derive(Debug)]
pub struct Subscription {
    rx: Receiver<ChangeEvent>,
}

impl Subscription {
    pub fn try_next(&self) -> Option<ChangeEvent> {
        self.rx.try_recv().ok()
    }

    /// Events queued so far, without blocking.
    pub fn pending(&self) -> impl Iterator<Item = ChangeEvent> + '_ {
        self.rx.try_iter()
    }
}
