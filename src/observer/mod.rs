use anyhow::Result;
use log::warn;
use parking_lot::RwLock;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::game::event::Event;


/// Identifies which kind of subject delivered an event.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Source {
    Timer,
    Quiz,
}

pub trait Observer: Send + Sync {
    fn receive(&self, source: Source, event: &Event) -> Result<()>;
}

pub type ObserverHandle = Arc<dyn Observer>;

#[derive(Debug)]
pub struct DeliveryFailure {
    pub position: usize,
    pub reason: String,
}

impl fmt::Display for DeliveryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "observer #{}: {}", self.position, self.reason)
    }
}

fn same_observer(a: &ObserverHandle, b: &ObserverHandle) -> bool {
    // Compare data pointers only, vtable pointers are not guaranteed unique.
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("observer panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("observer panicked: {}", message)
    } else {
        "observer panicked".to_owned()
    }
}

pub struct Subject {
    source: Source,
    observers: RwLock<Vec<ObserverHandle>>,
}

impl Subject {
    pub fn new(source: Source) -> Self {
        Subject {
            source,
            observers: RwLock::new(Vec::new()),
        }
    }

    pub fn attach(&self, observer: ObserverHandle) {
        let mut observers = self.observers.write();
        if !observers.iter().any(|o| same_observer(o, &observer)) {
            observers.push(observer);
        }
    }

    pub fn detach(&self, observer: &ObserverHandle) {
        self.observers
            .write()
            .retain(|o| !same_observer(o, observer));
    }

    #[cfg(test)]
    pub fn observer_count(&self) -> usize {
        self.observers.read().len()
    }

    /// Delivers `event` to every attached observer in attachment order, on the
    /// calling thread. A failing observer does not stop delivery to the ones
    /// after it; failures are logged and handed back to the caller.
    pub fn notify(&self, event: &Event) -> Vec<DeliveryFailure> {
        // Snapshot so handlers may attach or detach without deadlocking.
        let observers = self.observers.read().clone();
        let mut failures = Vec::new();
        for (position, observer) in observers.iter().enumerate() {
            let delivery =
                panic::catch_unwind(AssertUnwindSafe(|| observer.receive(self.source, event)));
            let reason = match delivery {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => format!("{:#}", e),
                Err(payload) => panic_reason(payload.as_ref()),
            };
            let failure = DeliveryFailure { position, reason };
            warn!(
                "{:?} {} failed to handle {:?} sent at {}",
                self.source, failure, event.kind, event.at
            );
            failures.push(failure);
        }
        failures
    }
}
