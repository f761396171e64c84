use std::sync::{Arc, Mutex};

/// Process-wide connectivity state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStatus {
    Online,
    Offline,
    Unknown,
}

/// Cloneable handle on the shared connectivity state.
///
/// Constructed explicitly and passed to the queue/engine/interception
/// constructors; nothing in this crate reads ambient global state.
/// Updated only from environment signals (or directly in tests).
#[derive(Clone)]
pub struct ConnectivityHandle {
    status: Arc<Mutex<NetworkStatus>>,
}

impl ConnectivityHandle {
    pub fn new(initial: NetworkStatus) -> Self {
        Self {
            status: Arc::new(Mutex::new(initial)),
        }
    }

    /// Reads `navigator.onLine` for the initial state. Outside the
    /// browser there is no signal source, so the state starts `Unknown`.
    pub fn detect() -> Self {
        Self::new(detect_status())
    }

    pub fn current(&self) -> NetworkStatus {
        *self.status.lock().unwrap()
    }

    pub fn is_online(&self) -> bool {
        matches!(self.current(), NetworkStatus::Online)
    }

    pub fn is_offline(&self) -> bool {
        matches!(self.current(), NetworkStatus::Offline)
    }

    pub fn set(&self, status: NetworkStatus) {
        *self.status.lock().unwrap() = status;
    }
}

#[cfg(target_arch = "wasm32")]
fn detect_status() -> NetworkStatus {
    match web_sys::window() {
        Some(window) => {
            if window.navigator().on_line() {
                NetworkStatus::Online
            } else {
                NetworkStatus::Offline
            }
        }
        None => NetworkStatus::Unknown,
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn detect_status() -> NetworkStatus {
    NetworkStatus::Unknown
}

/// Listens for the environment's `online`/`offline` transitions and
/// flips the shared handle.
///
/// On became-online the provided callback runs (the manager starts a
/// sync pass there). Became-offline only flips state: in-flight uploads
/// are left to fail through the ordinary per-item error path.
pub struct ConnectivityMonitor {
    handle: ConnectivityHandle,
    started: bool,
}

impl ConnectivityMonitor {
    pub fn new(handle: ConnectivityHandle) -> Self {
        Self {
            handle,
            started: false,
        }
    }

    pub fn handle(&self) -> ConnectivityHandle {
        self.handle.clone()
    }

    /// Registers the window listeners exactly once; repeat calls are
    /// ignored so re-rendering UI code cannot stack listeners.
    pub fn start<F>(&mut self, on_online: F)
    where
        F: Fn() + 'static,
    {
        if self.started {
            log::warn!("ConnectivityMonitor::start called twice, ignoring");
            return;
        }
        self.started = true;

        self.register_listeners(on_online);
    }

    #[cfg(target_arch = "wasm32")]
    fn register_listeners<F>(&self, on_online: F)
    where
        F: Fn() + 'static,
    {
        use wasm_bindgen::closure::Closure;
        use wasm_bindgen::JsCast;

        let window = match web_sys::window() {
            Some(w) => w,
            None => return,
        };

        let handle = self.handle.clone();
        let online_closure = Closure::wrap(Box::new(move |_event: web_sys::Event| {
            log::info!("network: online");
            handle.set(NetworkStatus::Online);
            on_online();
        }) as Box<dyn FnMut(web_sys::Event)>);

        let handle = self.handle.clone();
        let offline_closure = Closure::wrap(Box::new(move |_event: web_sys::Event| {
            log::warn!("network: offline");
            handle.set(NetworkStatus::Offline);
        }) as Box<dyn FnMut(web_sys::Event)>);

        let _ = window
            .add_event_listener_with_callback("online", online_closure.as_ref().unchecked_ref());
        let _ = window
            .add_event_listener_with_callback("offline", offline_closure.as_ref().unchecked_ref());

        // Window listeners live for the whole page lifetime.
        online_closure.forget();
        offline_closure.forget();
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn register_listeners<F>(&self, _on_online: F)
    where
        F: Fn() + 'static,
    {
        // No environment signals outside the browser; tests drive the
        // handle directly.
    }
}


#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn detect_reads_navigator_on_line() {
        // A browser always knows its state.
        assert_ne!(ConnectivityHandle::detect().current(), NetworkStatus::Unknown);
    }

    #[wasm_bindgen_test]
    fn listeners_register_without_panicking() {
        let mut monitor = ConnectivityMonitor::new(ConnectivityHandle::detect());
        monitor.start(|| {});
        monitor.start(|| {});
    }
}
