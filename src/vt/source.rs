//! A channel-fed VT monitor for calloop event loops
//!
//! Platform code that learns about VT transitions (from a tty signal
//! handler, say, or a logind property watch) pushes the new VT number
//! into the sender half of a [`calloop`] channel. The receiving half is a
//! [`VtSource`] inserted into the embedder's event loop; dispatching it
//! records the transition on the [`ChannelVtMonitor`] and re-emits it to the
//! monitor's subscribers (the static seats).
//!
//! Switch requests are forwarded to the closure supplied at construction,
//! which is expected to submit the actual `VT_ACTIVATE` (or equivalent)
//! request and report refusals.

use std::{cell::Cell, fmt, io, rc::Rc};

use calloop::{
    channel::{self, Channel, Sender},
    EventSource, Poll, PostAction, Readiness, Token, TokenFactory,
};
use tracing::debug;

use super::{VtMonitor, VtSwitchError};
use crate::utils::Emitter;

type SwitchFn = Box<dyn Fn(u32) -> Result<(), VtSwitchError>>;

/// A [`VtMonitor`] fed by a calloop channel.
pub struct ChannelVtMonitor {
    current: Cell<Option<u32>>,
    changed: Emitter<u32>,
    switch: SwitchFn,
}

impl ChannelVtMonitor {
    /// Creates the monitor together with the feeding channel.
    ///
    /// Returns the monitor itself, the [`Sender`] platform code reports VT
    /// transitions into, and the [`VtSource`] to insert into the event loop.
    /// `switch` receives every [`VtMonitor::switch_to`] request.
    pub fn new<F>(switch: F) -> (Rc<ChannelVtMonitor>, Sender<u32>, VtSource)
    where
        F: Fn(u32) -> Result<(), VtSwitchError> + 'static,
    {
        let (sender, channel) = channel::channel();
        let monitor = Rc::new(ChannelVtMonitor {
            current: Cell::new(None),
            changed: Emitter::new(),
            switch: Box::new(switch),
        });
        let source = VtSource {
            channel,
            monitor: monitor.clone(),
        };
        (monitor, sender, source)
    }

    /// Records a VT transition reported by the platform and notifies
    /// subscribers.
    ///
    /// [`VtSource`] calls this for every channel message; embedders that do
    /// not use calloop can call it directly.
    pub fn notify(&self, vt: u32) {
        debug!("active vt changed: {}", vt);
        self.current.set(Some(vt));
        self.changed.emit(vt);
    }
}

impl VtMonitor for ChannelVtMonitor {
    fn active_vt(&self) -> Option<u32> {
        self.current.get()
    }

    fn switch_to(&self, vt: u32) -> Result<(), VtSwitchError> {
        (self.switch)(vt)
    }

    fn active_changed(&self) -> &Emitter<u32> {
        &self.changed
    }
}

impl fmt::Debug for ChannelVtMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelVtMonitor")
            .field("current", &self.current.get())
            .field("changed", &self.changed)
            .finish_non_exhaustive()
    }
}

/// The event-loop half of a [`ChannelVtMonitor`].
pub struct VtSource {
    channel: Channel<u32>,
    monitor: Rc<ChannelVtMonitor>,
}

impl fmt::Debug for VtSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VtSource")
            .field("monitor", &self.monitor)
            .finish_non_exhaustive()
    }
}

impl EventSource for VtSource {
    type Event = u32;
    type Metadata = ();
    type Ret = ();
    type Error = io::Error;

    fn process_events<F>(
        &mut self,
        readiness: Readiness,
        token: Token,
        mut callback: F,
    ) -> Result<PostAction, Self::Error>
    where
        F: FnMut(u32, &mut ()),
    {
        let monitor = self.monitor.clone();
        self.channel
            .process_events(readiness, token, |event, _| {
                if let channel::Event::Msg(vt) = event {
                    monitor.notify(vt);
                    callback(vt, &mut ());
                }
            })
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err.to_string()))
    }

    fn register(&mut self, poll: &mut Poll, token_factory: &mut TokenFactory) -> calloop::Result<()> {
        self.channel.register(poll, token_factory)
    }

    fn reregister(&mut self, poll: &mut Poll, token_factory: &mut TokenFactory) -> calloop::Result<()> {
        self.channel.reregister(poll, token_factory)
    }

    fn unregister(&mut self, poll: &mut Poll) -> calloop::Result<()> {
        self.channel.unregister(poll)
    }
}
