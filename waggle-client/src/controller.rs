//! The request controller: one cooperative state machine per in-flight
//! request.
//!
//! A controller is created once, parked in `Closed`, and re-armed for each
//! logical request. Arming installs a handler and a response sink; the
//! owning runner then calls [`RequestController::step`] until the request
//! terminates. Each step performs at most one transition's worth of work
//! and never blocks — waiting is expressed by returning 0 work units.
//!
//! ```text
//! Closed ──armed──► Determine ──endpoint,send ok──► Execute ──decoded──► HandleResponse
//!                      │  │ ▲                          │                   │  │  │
//!                      │  │ └───── Determine ◄── AwaitRefresh ◄── Refresh ◄┘  │  │
//!                      │  └─endpoint unknown──► Refresh      (retryable code)─┘  │
//!                      └─deadline──► Failed ◄────────(other code / local error)──┘
//!                                      │                     Finished ◄── (no code)
//!                                      └──► Closed (release) ◄──┘
//! ```
//!
//! On both terminal states the sink is completed exactly once and the
//! release handle returns the controller to its pool.

use std::collections::HashSet;
use std::rc::Rc;

use waggle_protocol::{ErrorCode, ErrorResponse, HEADER_SIZE, MessageHeader};

use crate::addr::BrokerAddress;
use crate::clock::Clock;
use crate::codec::PayloadCodec;
use crate::error::ClientError;
use crate::request::{Command, ControlMessage, RequestHandler, ResponseValue};
use crate::sink::ResponseSink;
use crate::topology::{RefreshHandle, TopologyView};
use crate::transport::{PendingResponse, TransportError, TransportOutput};

/// Handle the controller invokes on every terminal exit to return itself
/// to its pool. Receives the controller's slot index.
pub type ReleaseFn = Rc<dyn Fn(usize)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed,
    Determine,
    Refresh,
    AwaitRefresh,
    Execute,
    HandleResponse,
    Finished,
    Failed,
}

/// Drives a single outbound request against the cluster.
pub struct RequestController<C: PayloadCodec> {
    slot: usize,
    transport: Rc<dyn TransportOutput>,
    topology: Rc<dyn TopologyView>,
    clock: Rc<dyn Clock>,
    codec: C,
    release: ReleaseFn,
    request_timeout_ms: u64,

    state: State,
    armed: bool,
    handler: Option<RequestHandler>,
    sink: Option<ResponseSink<ResponseValue>>,
    deadline_ms: u64,
    attempts: u32,
    contacted: HashSet<BrokerAddress>,
    receiver: Option<BrokerAddress>,
    pending: Option<Box<dyn PendingResponse>>,
    refresh: Option<RefreshHandle>,
    decoded: Option<ResponseValue>,
    error_code: ErrorCode,
    error_data: Option<Vec<u8>>,
    exception: Option<ClientError>,
}

impl<C: PayloadCodec> RequestController<C> {
    /// Create a parked controller.
    ///
    /// `slot` is the pool index handed to `release` on every terminal exit.
    pub fn new(
        slot: usize,
        transport: Rc<dyn TransportOutput>,
        topology: Rc<dyn TopologyView>,
        clock: Rc<dyn Clock>,
        codec: C,
        request_timeout_ms: u64,
        release: ReleaseFn,
    ) -> Self {
        Self {
            slot,
            transport,
            topology,
            clock,
            codec,
            release,
            request_timeout_ms,
            state: State::Closed,
            armed: false,
            handler: None,
            sink: None,
            deadline_ms: 0,
            attempts: 0,
            contacted: HashSet::new(),
            receiver: None,
            pending: None,
            refresh: None,
            decoded: None,
            error_code: ErrorCode::NullVal,
            error_data: None,
            exception: None,
        }
    }

    /// Arm the controller with a command.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::AlreadyArmed`] if a request is in flight.
    pub fn configure_command(
        &mut self,
        command: Command,
        sink: ResponseSink<ResponseValue>,
    ) -> Result<(), ClientError> {
        self.configure(RequestHandler::Command(command), sink)
    }

    /// Arm the controller with a control message.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::AlreadyArmed`] if a request is in flight.
    pub fn configure_control_message(
        &mut self,
        message: ControlMessage,
        sink: ResponseSink<ResponseValue>,
    ) -> Result<(), ClientError> {
        self.configure(RequestHandler::ControlMessage(message), sink)
    }

    fn configure(
        &mut self,
        handler: RequestHandler,
        sink: ResponseSink<ResponseValue>,
    ) -> Result<(), ClientError> {
        if self.armed || self.state != State::Closed {
            return Err(ClientError::AlreadyArmed);
        }

        self.reset();
        tracing::debug!(slot = self.slot, request = %handler.describe(), "controller armed");
        self.handler = Some(handler);
        self.sink = Some(sink);
        self.armed = true;
        Ok(())
    }

    /// Whether the controller is parked and free for re-arming.
    pub fn is_closed(&self) -> bool {
        self.state == State::Closed && !self.armed
    }

    /// Endpoint-resolution attempts of the current request.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Every endpoint a send went to during the current request.
    pub fn contacted(&self) -> &HashSet<BrokerAddress> {
        &self.contacted
    }

    /// Advance the state machine by at most one transition.
    ///
    /// Returns the work units performed; 0 means "idle this tick". Never
    /// blocks and never panics on request failures — every error is routed
    /// through the sink.
    pub fn step(&mut self) -> u32 {
        match self.state {
            State::Closed => self.on_closed(),
            State::Determine => self.on_determine(),
            State::Refresh => self.on_refresh(),
            State::AwaitRefresh => self.on_await_refresh(),
            State::Execute => self.on_execute(),
            State::HandleResponse => self.on_handle_response(),
            State::Finished => self.on_finished(),
            State::Failed => self.on_failed(),
        }
    }

    fn set_state(&mut self, next: State) {
        tracing::debug!(slot = self.slot, from = ?self.state, to = ?next, "transition");
        self.state = next;
    }

    fn reset(&mut self) {
        debug_assert!(self.pending.is_none(), "pending request leaked into reset");
        self.handler = None;
        self.sink = None;
        self.deadline_ms = 0;
        self.attempts = 0;
        self.contacted.clear();
        self.receiver = None;
        self.pending = None;
        self.refresh = None;
        self.decoded = None;
        self.error_code = ErrorCode::NullVal;
        self.error_data = None;
        self.exception = None;
    }

    fn on_closed(&mut self) -> u32 {
        if !self.armed {
            return 0;
        }

        self.deadline_ms = self.clock.now_ms() + self.request_timeout_ms;
        self.set_state(State::Determine);
        1
    }

    fn on_determine(&mut self) -> u32 {
        self.attempts += 1;

        if self.clock.now_ms() > self.deadline_ms {
            let description = self
                .handler
                .as_ref()
                .map(RequestHandler::describe)
                .unwrap_or_else(|| "request".to_string());
            let mut contacted: Vec<String> =
                self.contacted.iter().map(|a| a.to_string()).collect();
            contacted.sort();
            let message = format!(
                "request did not complete within {} ms; request was: {}; contacted brokers: [{}]",
                self.request_timeout_ms,
                description,
                contacted.join(", ")
            );
            self.exception = Some(ClientError::RequestTimeout {
                message,
                source: self.exception.take().map(Box::new),
            });
            self.set_state(State::Failed);
            return 1;
        }

        let Some(handler) = self.handler.take() else {
            self.exception = Some(ClientError::Unknown);
            self.set_state(State::Failed);
            return 1;
        };

        let work = match handler.target(self.topology.as_ref()) {
            Some(target) => match handler.encode(&self.codec) {
                Ok(frame) => {
                    match self.transport.send_request(&target, &frame) {
                        Some(pending) => {
                            self.receiver = Some(target.clone());
                            self.contacted.insert(target);
                            self.pending = Some(pending);
                            self.set_state(State::Execute);
                        }
                        None => {
                            // No request slot; stay put so the runner
                            // reschedules this controller next tick.
                            tracing::debug!(slot = self.slot, broker = %target, "no transport slot");
                        }
                    }
                    1
                }
                Err(err) => {
                    self.exception = Some(err);
                    self.set_state(State::Failed);
                    1
                }
            },
            None => {
                self.set_state(State::Refresh);
                1
            }
        };

        self.handler = Some(handler);
        work
    }

    fn on_refresh(&mut self) -> u32 {
        self.refresh = Some(self.topology.refresh_now());
        self.set_state(State::AwaitRefresh);
        1
    }

    fn on_await_refresh(&mut self) -> u32 {
        let done = self.refresh.as_ref().is_none_or(RefreshHandle::is_done);
        if !done {
            return 0;
        }

        let outcome = self
            .refresh
            .take()
            .and_then(|handle| handle.result())
            .unwrap_or(Ok(()));

        if let Err(err) = outcome {
            // Refresh failures never terminate the retry loop; record the
            // error so a later deadline failure can name it as the cause.
            tracing::warn!(slot = self.slot, error = %err, "topology refresh failed");
            self.exception = Some(ClientError::Topology {
                message: err.to_string(),
            });
        }

        self.set_state(State::Determine);
        1
    }

    fn on_execute(&mut self) -> u32 {
        let Some(mut pending) = self.pending.take() else {
            self.exception = Some(ClientError::Unknown);
            self.set_state(State::Failed);
            return 1;
        };

        if !pending.is_done() {
            self.pending = Some(pending);
            return 0;
        }

        let outcome = pending.take();
        pending.release();

        match outcome {
            Ok(frame) => match self.apply_response(&frame) {
                Ok(()) => self.set_state(State::HandleResponse),
                Err(err) => {
                    self.exception = Some(err);
                    self.set_state(State::Failed);
                }
            },
            Err(TransportError::CommandRejected { reason }) => {
                self.exception = Some(ClientError::CommandRejected { reason });
                self.set_state(State::Failed);
            }
            Err(err) => {
                self.exception = Some(ClientError::ResponseHandling {
                    message: err.to_string(),
                });
                self.set_state(State::Failed);
            }
        }
        1
    }

    /// Decode a response frame into either the typed result or the error
    /// envelope. The handler's expected template is the only discriminator
    /// between the two; the wire carries no tag.
    fn apply_response(&mut self, frame: &[u8]) -> Result<(), ClientError> {
        let header =
            MessageHeader::deserialize(frame).map_err(|e| ClientError::ResponseHandling {
                message: e.to_string(),
            })?;

        let Some(handler) = self.handler.take() else {
            return Err(ClientError::Unknown);
        };

        let result = if handler.handles_response(&header) {
            handler
                .decode_response(
                    &self.codec,
                    frame,
                    HEADER_SIZE,
                    header.block_length,
                    header.version,
                )
                .map(|mut value| {
                    if let Some(receiver) = &self.receiver {
                        value.bind_receiver(receiver);
                    }
                    self.decoded = Some(value);
                })
        } else {
            ErrorResponse::decode(frame, HEADER_SIZE, header.block_length, header.version)
                .map(|envelope| {
                    self.error_code = envelope.error_code;
                    self.error_data = Some(envelope.error_data);
                })
                .map_err(|e| ClientError::ResponseHandling {
                    message: format!("malformed error envelope: {e}"),
                })
        };

        self.handler = Some(handler);
        result
    }

    fn on_handle_response(&mut self) -> u32 {
        if self.error_code.is_null() {
            self.set_state(State::Finished);
        } else if self.error_code.is_retryable() {
            tracing::debug!(slot = self.slot, code = %self.error_code, "retrying against refreshed topology");
            self.error_code = ErrorCode::NullVal;
            self.error_data = None;
            self.set_state(State::Refresh);
        } else {
            self.set_state(State::Failed);
        }
        1
    }

    fn on_finished(&mut self) -> u32 {
        let result = self.decoded.take();
        if let Some(sink) = self.sink.take() {
            match result {
                Some(value) => sink.complete(value),
                None => sink.complete_err(ClientError::Unknown),
            }
        }
        self.exit_terminal();
        1
    }

    fn on_failed(&mut self) -> u32 {
        let error = if !self.error_code.is_null() {
            let code = self.error_code;
            let message = match self.error_data.take() {
                Some(bytes) => String::from_utf8(bytes).unwrap_or_else(|e| {
                    format!("unable to parse error message from response: {e}")
                }),
                None => "unable to parse error message from response: no error data".to_string(),
            };
            ClientError::Broker { code, message }
        } else if let Some(err) = self.exception.take() {
            err
        } else {
            ClientError::Unknown
        };

        tracing::debug!(slot = self.slot, error = %error, "request failed");
        if let Some(sink) = self.sink.take() {
            sink.complete_err(error);
        }
        self.exit_terminal();
        1
    }

    fn exit_terminal(&mut self) {
        self.armed = false;
        self.set_state(State::Closed);
        let release = Rc::clone(&self.release);
        release(self.slot);
    }
}
