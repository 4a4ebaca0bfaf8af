//! The request dispatcher: controller pool plus cooperative runner surface.
//!
//! The dispatcher owns a fixed-capacity pool of [`RequestController`]s and a
//! shared free-slot list. Arming a request pops a slot; the controller's
//! release handle pushes it back on every terminal exit — the controller
//! itself never sees the pool, only the handle.
//!
//! A single thread drives the dispatcher by calling [`RequestDispatcher::poll`]
//! in its duty cycle; any positive return means progress was made and the
//! loop should keep spinning.

use std::cell::RefCell;
use std::rc::Rc;

use crate::clock::Clock;
use crate::codec::PayloadCodec;
use crate::config::ClientConfig;
use crate::controller::{ReleaseFn, RequestController};
use crate::error::ClientError;
use crate::request::{Command, ControlMessage, ResponseValue};
use crate::sink::{ResponseFuture, ResponseSink, response_channel};
use crate::topology::TopologyView;
use crate::transport::TransportOutput;

/// Pools request controllers and steps them cooperatively.
pub struct RequestDispatcher<C: PayloadCodec> {
    controllers: Vec<RequestController<C>>,
    free: Rc<RefCell<Vec<usize>>>,
}

impl<C: PayloadCodec> RequestDispatcher<C> {
    /// Create a dispatcher with `config.max_in_flight` pooled controllers.
    pub fn new(
        config: ClientConfig,
        transport: Rc<dyn TransportOutput>,
        topology: Rc<dyn TopologyView>,
        clock: Rc<dyn Clock>,
        codec: C,
    ) -> Self {
        let capacity = config.max_in_flight;
        let free = Rc::new(RefCell::new((0..capacity).rev().collect::<Vec<_>>()));
        let request_timeout_ms = config.request_timeout.as_millis() as u64;

        let controllers = (0..capacity)
            .map(|slot| {
                let free = Rc::clone(&free);
                let release: ReleaseFn = Rc::new(move |slot| free.borrow_mut().push(slot));
                RequestController::new(
                    slot,
                    Rc::clone(&transport),
                    Rc::clone(&topology),
                    Rc::clone(&clock),
                    codec.clone(),
                    request_timeout_ms,
                    release,
                )
            })
            .collect();

        Self { controllers, free }
    }

    /// Dispatch a command and return the future its result will arrive on.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NoRequestSlot`] when all controllers are in
    /// flight; callers retry on a later tick.
    pub fn send_command(
        &mut self,
        command: Command,
    ) -> Result<ResponseFuture<ResponseValue>, ClientError> {
        self.dispatch(|controller, sink| controller.configure_command(command, sink))
    }

    /// Dispatch a control message and return the future its result will
    /// arrive on.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NoRequestSlot`] when all controllers are in
    /// flight; callers retry on a later tick.
    pub fn send_control_message(
        &mut self,
        message: ControlMessage,
    ) -> Result<ResponseFuture<ResponseValue>, ClientError> {
        self.dispatch(|controller, sink| controller.configure_control_message(message, sink))
    }

    fn dispatch(
        &mut self,
        configure: impl FnOnce(
            &mut RequestController<C>,
            ResponseSink<ResponseValue>,
        ) -> Result<(), ClientError>,
    ) -> Result<ResponseFuture<ResponseValue>, ClientError> {
        let slot = self
            .free
            .borrow_mut()
            .pop()
            .ok_or(ClientError::NoRequestSlot)?;
        let Some(controller) = self.controllers.get_mut(slot) else {
            return Err(ClientError::NoRequestSlot);
        };

        let (sink, future) = response_channel();
        match configure(controller, sink) {
            Ok(()) => Ok(future),
            Err(err) => {
                self.free.borrow_mut().push(slot);
                Err(err)
            }
        }
    }

    /// Step every active controller once.
    ///
    /// Returns the total work units performed; 0 means every in-flight
    /// request is waiting on I/O or the clock.
    pub fn poll(&mut self) -> u32 {
        self.controllers
            .iter_mut()
            .map(|controller| {
                if controller.is_closed() {
                    0
                } else {
                    controller.step()
                }
            })
            .sum()
    }

    /// Number of requests currently in flight.
    pub fn in_flight(&self) -> usize {
        self.controllers.len() - self.free.borrow().len()
    }

    /// Whether no request is in flight.
    pub fn is_idle(&self) -> bool {
        self.in_flight() == 0
    }

    /// Total controller capacity.
    pub fn capacity(&self) -> usize {
        self.controllers.len()
    }
}
