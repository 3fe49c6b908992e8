//! Owner of the fences and semaphores handed out over [`ResourceRequest`].

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use presenter_rhi::device::Device;
use presenter_rhi::sync::{Fence, Semaphore};
use tracing::debug;

use crate::bus::{EventBus, Subscription};
use crate::events::ResourceRequest;

#[derive(Default)]
struct SyncObjects {
    fences: Vec<Fence>,
    semaphores: Vec<Semaphore>,
}

/// Creates synchronization objects on request and keeps them alive until it
/// is dropped.
///
/// Requesters only ever see raw handles, so the manager must outlive every
/// swapchain it served. Wait for the device to idle before dropping it.
pub struct SyncObjectManager {
    device: Arc<Device>,
    objects: Rc<RefCell<SyncObjects>>,
    subscription: Option<Subscription>,
}

impl SyncObjectManager {
    pub fn new(device: Arc<Device>) -> Self {
        Self {
            device,
            objects: Rc::new(RefCell::new(SyncObjects::default())),
            subscription: None,
        }
    }

    /// Starts answering [`ResourceRequest`] events on `bus`.
    pub fn register(&mut self, bus: &Rc<EventBus>) {
        let device = self.device.clone();
        let objects = self.objects.clone();
        self.subscription = Some(bus.subscribe(move |request: &mut ResourceRequest| {
            let mut objects = objects.borrow_mut();
            match request {
                ResourceRequest::Fence { signaled, handle } => {
                    let fence = Fence::new(device.clone(), *signaled)?;
                    *handle = Some(fence.handle());
                    objects.fences.push(fence);
                }
                ResourceRequest::Semaphore { timeline, handle } => {
                    let semaphore = if *timeline {
                        Semaphore::new_timeline(device.clone(), 0)?
                    } else {
                        Semaphore::new(device.clone())?
                    };
                    *handle = Some(semaphore.handle());
                    objects.semaphores.push(semaphore);
                }
            }
            debug!("Served {} request", request.kind());
            Ok(())
        }));
    }

    /// Stops answering requests. Objects already handed out stay alive.
    pub fn unregister(&mut self) {
        self.subscription = None;
    }

    pub fn fence_count(&self) -> usize {
        self.objects.borrow().fences.len()
    }

    pub fn semaphore_count(&self) -> usize {
        self.objects.borrow().semaphores.len()
    }
}

impl Drop for SyncObjectManager {
    fn drop(&mut self) {
        self.subscription = None;
        let objects = self.objects.borrow();
        debug!(
            "Releasing {} fence(s) and {} semaphore(s)",
            objects.fences.len(),
            objects.semaphores.len()
        );
    }
}
