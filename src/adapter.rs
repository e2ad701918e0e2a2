use std::rc::Rc;
use std::sync::Arc;

use log::{debug, error, info, trace};

use crate::callback::{AdapterStateReceiver, ScanCallback};
use crate::config::BridgeConfig;
use crate::error::ErrorKind;
use crate::event_receiver::Dispatcher;
use crate::native::NativeBridge;
use crate::types::{AdapterScanMode, AdapterState, DiscoveredDevice, NativeHandle, ScanFilter};
use crate::util::ResultExt;
use crate::wrappers::AdapterWrapper;
use crate::Result;

/// Bridge of the local Bluetooth adapter.
///
/// There is one per [`BluetoothBridge`](crate::BluetoothBridge). The platform adapter
/// may be absent, in which case every query reports an empty or negative answer.
pub struct AdapterBridge {
    native: Option<NativeHandle>,
    native_bridge: Rc<dyn NativeBridge>,
    adapter: Option<Arc<dyn AdapterWrapper>>,
    state_receiver: Arc<AdapterStateReceiver>,
    scan_callback: Option<Arc<ScanCallback>>,
    next_scan_session: u64,
    dispatcher: Dispatcher,
    config: BridgeConfig,
}

impl AdapterBridge {
    pub(crate) fn new(
        native: NativeHandle,
        adapter: Option<Arc<dyn AdapterWrapper>>,
        native_bridge: Rc<dyn NativeBridge>,
        dispatcher: Dispatcher,
        config: BridgeConfig,
    ) -> Self {
        let state_receiver = Arc::new(AdapterStateReceiver::new(dispatcher.clone()));
        match &adapter {
            Some(adapter) => {
                info!("AdapterBridge created with adapter {}", adapter.address());
                adapter.register_state_receiver(state_receiver.clone());
            }
            None => info!("AdapterBridge created with no adapter"),
        }
        Self {
            native: Some(native),
            native_bridge,
            adapter,
            state_receiver,
            scan_callback: None,
            next_scan_session: 0,
            dispatcher,
            config,
        }
    }

    /// Stops any active scan and detaches from the platform and the native side.
    pub(crate) fn destroy(mut self) {
        self.stop_scan();
        self.native = None;
        if let Some(adapter) = &self.adapter {
            adapter.unregister_state_receiver(&self.state_receiver);
        }
    }

    /// The adapter's address, empty if there is no adapter.
    pub fn address(&self) -> String {
        self.adapter.as_ref().map(|a| a.address()).unwrap_or_default()
    }

    /// The adapter's name, empty if there is no adapter.
    pub fn name(&self) -> String {
        self.adapter.as_ref().map(|a| a.name()).unwrap_or_default()
    }

    pub fn is_present(&self) -> bool {
        self.adapter.is_some()
    }

    pub fn is_powered(&self) -> bool {
        self.adapter.as_ref().is_some_and(|a| a.is_enabled())
    }

    /// Asks the platform to power the adapter on or off.
    ///
    /// Returns whether the request was accepted; the state change itself is reported
    /// later through [`NativeBridge::on_adapter_state_changed`].
    pub fn set_powered(&self, powered: bool) -> bool {
        let Some(adapter) = &self.adapter else {
            return false;
        };
        if powered {
            adapter.enable()
        } else {
            adapter.disable()
        }
    }

    pub fn is_discoverable(&self) -> bool {
        self.adapter
            .as_ref()
            .is_some_and(|a| a.scan_mode() == AdapterScanMode::ConnectableDiscoverable)
    }

    /// Whether a classic discovery or an LE scan session is in progress.
    pub fn is_discovering(&self) -> bool {
        self.adapter
            .as_ref()
            .is_some_and(|a| a.is_discovering() || self.scan_callback.is_some())
    }

    pub fn is_scanning(&self) -> bool {
        self.scan_callback.is_some()
    }

    /// Starts an LE scan session.
    ///
    /// Returns `false` if the adapter is absent, no LE scanner is available, scanning is
    /// not permitted, a session is already active, or the platform rejects the request.
    pub fn start_scan(&mut self, filters: &[ScanFilter]) -> bool {
        self.try_start_scan(filters).accepted("startScan")
    }

    fn try_start_scan(&mut self, filters: &[ScanFilter]) -> Result<()> {
        let adapter = self
            .adapter
            .as_ref()
            .ok_or(crate::Error::from(ErrorKind::AdapterUnavailable))?;
        let scanner = adapter.le_scanner().ok_or(crate::Error::new(
            ErrorKind::NotSupported,
            None,
            "no LE scanner is available",
        ))?;
        if !adapter.can_scan() {
            return Err(crate::Error::new(
                ErrorKind::NotAuthorized,
                None,
                "location permission or location services are missing",
            ));
        }
        if self.scan_callback.is_some() {
            error!("startScan called while a scan session is active");
            return Err(ErrorKind::AlreadyScanning.into());
        }

        self.next_scan_session += 1;
        let callback = Arc::new(ScanCallback::new(
            self.next_scan_session,
            self.dispatcher.clone(),
        ));
        scanner.start_scan(filters, self.config.scan_mode, callback.clone())?;
        self.scan_callback = Some(callback);
        Ok(())
    }

    /// Stops the active LE scan session.
    ///
    /// Returns whether a session was active. The session is cleared even if the
    /// platform fails to stop the scan.
    pub fn stop_scan(&mut self) -> bool {
        let Some(callback) = self.scan_callback.take() else {
            return false;
        };
        if let Some(scanner) = self.adapter.as_ref().and_then(|a| a.le_scanner()) {
            let result = scanner.stop_scan(&callback).map_err(crate::Error::from);
            result.accepted("stopScan");
        }
        true
    }

    fn active_session(&self) -> Option<u64> {
        self.scan_callback.as_ref().map(|c| c.session())
    }

    pub(crate) fn on_state_changed(&self, state: AdapterState) {
        let powered = match state {
            AdapterState::On => true,
            AdapterState::Off => false,
            other => {
                debug!("ignoring adapter state {other:?}");
                return;
            }
        };
        info!("adapter state changed, powered: {powered}");
        if let Some(native) = self.native {
            self.native_bridge.on_adapter_state_changed(native, powered);
        }
    }

    pub(crate) fn on_scan_result(&self, session: u64, device: DiscoveredDevice) {
        if self.active_session() != Some(session) {
            trace!("dropping result of inactive scan session {session}: {}", device.address);
            return;
        }
        if let Some(native) = self.native {
            self.native_bridge.create_or_update_device_on_scan(native, device);
        }
    }

    pub(crate) fn on_scan_failed(&self, session: u64, error_code: i32) {
        if self.active_session() != Some(session) {
            debug!("dropping failure of inactive scan session {session}");
            return;
        }
        if let Some(native) = self.native {
            self.native_bridge.on_scan_failed(native, error_code);
        }
    }
}
