use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use log::{debug, info};

use crate::adapter::AdapterBridge;
use crate::config::BridgeConfig;
use crate::device::DeviceBridge;
use crate::event_receiver::{callback_queue, Dispatcher, EventReceiver, PlatformEvent};
use crate::native::NativeBridge;
use crate::types::{DeviceId, NativeHandle};
use crate::wrappers::{AdapterWrapper, DeviceWrapper};

/// Owner of every bridge object, living on the bridge thread.
///
/// Platform callbacks are queued by their receivers and only take effect once this
/// type dispatches them, from [`BluetoothBridge::run_pending`] or
/// [`BluetoothBridge::process_next`]. No method here is reentrant from another thread;
/// the type is `!Send` so it cannot leave the thread it was created on.
pub struct BluetoothBridge {
    native_bridge: Rc<dyn NativeBridge>,
    config: BridgeConfig,
    dispatcher: Dispatcher,
    events: EventReceiver,
    adapter: Option<AdapterBridge>,
    devices: HashMap<DeviceId, DeviceBridge>,
}

impl BluetoothBridge {
    pub fn new(native_bridge: Rc<dyn NativeBridge>, config: BridgeConfig) -> Self {
        let (dispatcher, events) = callback_queue();
        Self {
            native_bridge,
            config,
            dispatcher,
            events,
            adapter: None,
            devices: HashMap::new(),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Creates the adapter bridge; `adapter` is `None` when the platform has no adapter.
    ///
    /// A previous adapter bridge is destroyed first.
    pub fn create_adapter(
        &mut self,
        native: NativeHandle,
        adapter: Option<Arc<dyn AdapterWrapper>>,
    ) -> &mut AdapterBridge {
        self.destroy_adapter();
        self.adapter.insert(AdapterBridge::new(
            native,
            adapter,
            self.native_bridge.clone(),
            self.dispatcher.clone(),
            self.config.clone(),
        ))
    }

    pub fn adapter(&mut self) -> Option<&mut AdapterBridge> {
        self.adapter.as_mut()
    }

    /// Called when the native adapter is destroyed; stops any active scan.
    pub fn destroy_adapter(&mut self) {
        if let Some(adapter) = self.adapter.take() {
            info!("AdapterBridge destroyed");
            adapter.destroy();
        }
    }

    /// Creates the bridge of a remote device, replacing the previous bridge with the
    /// same address.
    pub fn create_device(
        &mut self,
        native: NativeHandle,
        device: Arc<dyn DeviceWrapper>,
    ) -> &mut DeviceBridge {
        let bridge = DeviceBridge::new(
            native,
            device,
            self.native_bridge.clone(),
            self.dispatcher.clone(),
            self.config.clone(),
        );
        let id = bridge.id();
        if let Some(previous) = self.devices.remove(&id) {
            previous.destroy();
        }
        self.devices.entry(id).or_insert(bridge)
    }

    pub fn device(&mut self, id: &DeviceId) -> Option<&mut DeviceBridge> {
        self.devices.get_mut(id)
    }

    /// Called when the native device is destroyed; closes its connection.
    ///
    /// Returns whether a bridge existed for `id`.
    pub fn destroy_device(&mut self, id: &DeviceId) -> bool {
        match self.devices.remove(id) {
            Some(device) => {
                device.destroy();
                true
            }
            None => false,
        }
    }

    /// Dispatches every queued platform callback without waiting.
    ///
    /// Returns the number of callbacks dispatched.
    pub fn run_pending(&mut self) -> usize {
        let mut count = 0;
        while let Some(event) = self.events.try_next() {
            self.dispatch(event);
            count += 1;
        }
        count
    }

    /// Waits for the next platform callback and dispatches it.
    pub async fn process_next(&mut self) {
        // the bridge holds a sender itself, so the queue never closes while it exists
        if let Some(event) = self.events.next().await {
            self.dispatch(event);
        }
    }

    fn dispatch(&mut self, event: PlatformEvent) {
        match event {
            PlatformEvent::AdapterStateChanged(state) => match &self.adapter {
                Some(adapter) => adapter.on_state_changed(state),
                None => debug!("adapter state {state:?} arrived with no adapter bridge"),
            },
            PlatformEvent::ScanResult { session, device } => match &self.adapter {
                Some(adapter) => adapter.on_scan_result(session, device),
                None => debug!("scan result arrived with no adapter bridge"),
            },
            PlatformEvent::ScanFailed {
                session,
                error_code,
            } => match &self.adapter {
                Some(adapter) => adapter.on_scan_failed(session, error_code),
                None => debug!("scan failure arrived with no adapter bridge"),
            },
            PlatformEvent::Gatt {
                device,
                connection,
                event,
            } => match self.devices.get_mut(&device) {
                Some(bridge) => bridge.on_gatt_event(connection, event),
                None => debug!("dropping callback for destroyed device {device}: {event:?}"),
            },
        }
    }
}

impl Drop for BluetoothBridge {
    fn drop(&mut self) {
        for (_, device) in self.devices.drain() {
            device.destroy();
        }
        self.destroy_adapter();
    }
}
