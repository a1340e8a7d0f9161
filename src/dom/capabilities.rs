//! Host Capabilities - Feature switches of the simulated host.
//!
//! Real hosts differ in what they support. The engine probes or consults
//! these switches instead of assuming:
//! - `listener_options`: listener registration accepts an options record
//! - `native_shadow`: shadow roots encapsulate styles without a scoping shim
//! - `constructable_stylesheets`: shadow roots can adopt stylesheets directly

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::{Event, EventCallback, ListenerArg, ListenerOptions, Node};

/// Feature switches of the current thread's host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostProfile {
    pub listener_options: bool,
    pub native_shadow: bool,
    pub constructable_stylesheets: bool,
}

impl Default for HostProfile {
    fn default() -> Self {
        Self {
            listener_options: true,
            native_shadow: true,
            constructable_stylesheets: true,
        }
    }
}

// =============================================================================
// Profile State
// =============================================================================

thread_local! {
    static HOST_PROFILE: RefCell<HostProfile> = RefCell::new(HostProfile::default());

    /// Result of the listener-options probe, computed once per profile.
    static LISTENER_OPTIONS_PROBE: Cell<Option<bool>> = const { Cell::new(None) };
}

pub fn host_profile() -> HostProfile {
    HOST_PROFILE.with(|profile| *profile.borrow())
}

/// Replace the host profile. Resets cached probes.
pub fn set_host_profile(profile: HostProfile) {
    HOST_PROFILE.with(|p| *p.borrow_mut() = profile);
    LISTENER_OPTIONS_PROBE.with(|probe| probe.set(None));
}

/// Whether listener registration honours an options record.
///
/// Probed once: an options record with `capture: false` is registered on a
/// scratch element and the recorded capture flag is inspected.
pub fn listener_options_supported() -> bool {
    if let Some(supported) = LISTENER_OPTIONS_PROBE.with(Cell::get) {
        return supported;
    }
    let scratch = Node::element("div");
    let callback: EventCallback = Rc::new(|_: &Event| {});
    scratch.add_event_listener("probe", &callback, ListenerArg::Options(ListenerOptions::default()));
    let supported = scratch
        .event_listeners()
        .first()
        .is_some_and(|(_, options)| !options.capture);
    tracing::debug!(supported, "probed listener options support");
    LISTENER_OPTIONS_PROBE.with(|probe| probe.set(Some(supported)));
    supported
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_follows_profile() {
        set_host_profile(HostProfile::default());
        assert!(listener_options_supported());

        set_host_profile(HostProfile {
            listener_options: false,
            ..HostProfile::default()
        });
        assert!(!listener_options_supported());

        set_host_profile(HostProfile::default());
        assert!(listener_options_supported());
    }
}
