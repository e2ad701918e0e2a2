use async_channel::{Receiver, Sender, TryRecvError};
use log::debug;

use crate::error::GattStatus;
use crate::types::{AdapterState, DeviceId, DiscoveredDevice, PlatformId, ProfileState};

/// Platform callback, captured on the platform thread and waiting to be dispatched
/// on the bridge thread.
#[derive(Debug)]
pub(crate) enum PlatformEvent {
    AdapterStateChanged(AdapterState),
    ScanResult {
        session: u64,
        device: DiscoveredDevice,
    },
    ScanFailed {
        session: u64,
        error_code: i32,
    },
    Gatt {
        device: DeviceId,
        connection: u64,
        event: GattEvent,
    },
}

#[derive(Debug)]
pub(crate) enum GattEvent {
    ConnectionStateChange {
        status: GattStatus,
        new_state: ProfileState,
    },
    ServicesDiscovered {
        status: GattStatus,
    },
    /// The value is copied when the callback arrives, since the platform object is reused.
    CharacteristicChanged {
        characteristic: PlatformId,
        value: Vec<u8>,
    },
    CharacteristicRead {
        characteristic: PlatformId,
        status: GattStatus,
    },
    CharacteristicWrite {
        characteristic: PlatformId,
        status: GattStatus,
    },
    DescriptorRead {
        descriptor: PlatformId,
        status: GattStatus,
    },
    DescriptorWrite {
        descriptor: PlatformId,
        status: GattStatus,
    },
}

/// Posts platform callbacks to the bridge thread.
///
/// Posting never blocks; events posted after the bridge is gone are dropped.
#[derive(Debug, Clone)]
pub(crate) struct Dispatcher {
    sender: Sender<PlatformEvent>,
}

impl Dispatcher {
    pub(crate) fn post(&self, event: PlatformEvent) {
        if let Err(e) = self.sender.try_send(event) {
            debug!("bridge is gone, dropping {:?}", e.into_inner());
        }
    }
}

/// Receiving end of the callback queue, owned by the bridge thread.
pub(crate) struct EventReceiver {
    receiver: Receiver<PlatformEvent>,
}

impl EventReceiver {
    pub(crate) fn try_next(&self) -> Option<PlatformEvent> {
        match self.receiver.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => None,
        }
    }

    pub(crate) async fn next(&self) -> Option<PlatformEvent> {
        self.receiver.recv().await.ok()
    }
}

/// Creates a connected dispatcher and receiver pair.
pub(crate) fn callback_queue() -> (Dispatcher, EventReceiver) {
    let (sender, receiver) = async_channel::unbounded();
    (Dispatcher { sender }, EventReceiver { receiver })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_cross_threads_in_order() {
        let (dispatcher, receiver) = callback_queue();
        let worker = std::thread::spawn(move || {
            dispatcher.post(PlatformEvent::AdapterStateChanged(AdapterState::TurningOn));
            dispatcher.post(PlatformEvent::AdapterStateChanged(AdapterState::On));
        });
        worker.join().unwrap();

        assert!(matches!(
            receiver.try_next(),
            Some(PlatformEvent::AdapterStateChanged(AdapterState::TurningOn))
        ));
        assert!(matches!(
            receiver.try_next(),
            Some(PlatformEvent::AdapterStateChanged(AdapterState::On))
        ));
        assert!(receiver.try_next().is_none());
    }

    #[test]
    fn posting_after_receiver_dropped_is_silent() {
        let (dispatcher, receiver) = callback_queue();
        drop(receiver);
        dispatcher.post(PlatformEvent::ScanFailed {
            session: 1,
            error_code: 2,
        });
    }
}
