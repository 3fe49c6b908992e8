//! Synchronous, typed event bus.
//!
//! Events are plain structs dispatched by mutable reference, so a listener can
//! answer a request by filling an out-field (see
//! [`RequestCurrentSwapchain`](crate::events::RequestCurrentSwapchain)).
//! Dispatch happens on the emitting thread before [`EventBus::emit`] returns.
//!
//! Listeners are registered with [`EventBus::subscribe`], which returns a
//! [`Subscription`]. Dropping the subscription unregisters the listener.
//!
//! # Example
//!
//! ```
//! use presenter_frame::bus::EventBus;
//!
//! struct Ping {
//!     answered: bool,
//! }
//!
//! let bus = EventBus::new();
//! let subscription = bus.subscribe(|ping: &mut Ping| {
//!     ping.answered = true;
//!     Ok(())
//! });
//!
//! let mut ping = Ping { answered: false };
//! assert_eq!(bus.emit(&mut ping).unwrap(), 1);
//! assert!(ping.answered);
//!
//! drop(subscription);
//! assert_eq!(bus.subscriber_count::<Ping>(), 0);
//! ```

use std::any::{Any, TypeId};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use tracing::trace;

use crate::error::{FrameError, FrameResult};

/// Identifies one registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Rc<RefCell<dyn FnMut(&mut dyn Any) -> FrameResult<()>>>;

struct Listener {
    id: SubscriptionId,
    handler: Handler,
}

/// Single-threaded event bus keyed by event type.
#[derive(Default)]
pub struct EventBus {
    next_id: Cell<u64>,
    listeners: RefCell<HashMap<TypeId, Vec<Listener>>>,
}

impl EventBus {
    /// Creates an empty bus.
    ///
    /// The bus is reference counted so that subscriptions can unregister
    /// themselves without keeping it alive.
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Registers `handler` for events of type `E`.
    ///
    /// Listeners for the same type run in registration order. An error
    /// returned by a listener stops dispatch and is returned from
    /// [`emit`](Self::emit).
    pub fn subscribe<E, F>(self: &Rc<Self>, mut handler: F) -> Subscription
    where
        E: 'static,
        F: FnMut(&mut E) -> FrameResult<()> + 'static,
    {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);

        let handler: Handler = Rc::new(RefCell::new(move |event: &mut dyn Any| {
            match event.downcast_mut::<E>() {
                Some(event) => handler(event),
                None => Ok(()),
            }
        }));

        self.listeners
            .borrow_mut()
            .entry(TypeId::of::<E>())
            .or_default()
            .push(Listener { id, handler });

        trace!(
            "Subscribed {:?} to {}",
            id,
            std::any::type_name::<E>()
        );

        Subscription {
            id,
            bus: Rc::downgrade(self),
        }
    }

    /// Removes a listener. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        for list in listeners.values_mut() {
            if let Some(pos) = list.iter().position(|listener| listener.id == id) {
                list.remove(pos);
                trace!("Unsubscribed {:?}", id);
                return true;
            }
        }
        false
    }

    /// Dispatches `event` to every listener registered for `E`.
    ///
    /// Listeners may subscribe, unsubscribe and emit further events while
    /// running; changes to the listener list take effect on the next emit.
    ///
    /// Returns the number of listeners that handled the event.
    ///
    /// # Errors
    ///
    /// Returns the first listener error, or [`FrameError::ReentrantDispatch`]
    /// if a listener is reached while it is already running.
    pub fn emit<E: 'static>(&self, event: &mut E) -> FrameResult<usize> {
        let handlers: Vec<Handler> = self
            .listeners
            .borrow()
            .get(&TypeId::of::<E>())
            .map(|list| list.iter().map(|l| l.handler.clone()).collect())
            .unwrap_or_default();

        trace!(
            "Emitting {} to {} listener(s)",
            std::any::type_name::<E>(),
            handlers.len()
        );

        for handler in &handlers {
            let mut handler = handler
                .try_borrow_mut()
                .map_err(|_| FrameError::ReentrantDispatch(std::any::type_name::<E>()))?;
            (&mut *handler)(&mut *event)?;
        }

        Ok(handlers.len())
    }

    /// Number of listeners registered for `E`.
    pub fn subscriber_count<E: 'static>(&self) -> usize {
        self.listeners
            .borrow()
            .get(&TypeId::of::<E>())
            .map_or(0, Vec::len)
    }
}

/// Handle to a registered listener; unsubscribes on drop.
#[must_use = "dropping a Subscription unregisters its listener"]
pub struct Subscription {
    id: SubscriptionId,
    bus: Weak<EventBus>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.unsubscribe(self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
