//! End-to-end request controller scenarios against scripted collaborators.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use serde_json::json;

use waggle_client::{
    BrokerAddress, ClientError, Clock, Command, ControlMessage, ControlMessageType, ErrorCode,
    JsonCodec, PendingResponse, RefreshHandle, ReleaseFn, RequestController, ResponseFuture,
    ResponseValue, Routing, StaticTopology, TopologyError, TopologyView, TransportError,
    TransportOutput, response_channel,
};
use waggle_protocol::{ControlMessageResponse, ErrorResponse, ExecuteCommandResponse};

const TIMEOUT_MS: u64 = 5_000;

fn addr(n: u16) -> BrokerAddress {
    BrokerAddress::new(format!("broker-{n}"), 26501)
}

fn command_success_frame(partition_id: u16, key: u64, event: serde_json::Value) -> Vec<u8> {
    ExecuteCommandResponse {
        partition_id,
        key,
        event: serde_json::to_vec(&event).expect("event"),
    }
    .encode()
    .expect("frame")
}

fn control_success_frame(data: serde_json::Value) -> Vec<u8> {
    ControlMessageResponse {
        data: serde_json::to_vec(&data).expect("data"),
    }
    .encode()
    .expect("frame")
}

fn error_frame(code: ErrorCode, data: &[u8]) -> Vec<u8> {
    ErrorResponse {
        error_code: code,
        error_data: data.to_vec(),
    }
    .encode()
    .expect("frame")
}

/// One scripted reaction to a `send_request` call.
enum SendOutcome {
    /// No transport slot this tick.
    NoSlot,
    /// A pending that reports done after `ready_after` idle polls, then
    /// resolves to `outcome`.
    Pending {
        ready_after: u32,
        outcome: Result<Vec<u8>, TransportError>,
    },
}

impl SendOutcome {
    fn reply(frame: Vec<u8>) -> Self {
        SendOutcome::Pending {
            ready_after: 0,
            outcome: Ok(frame),
        }
    }

    fn failure(error: TransportError) -> Self {
        SendOutcome::Pending {
            ready_after: 0,
            outcome: Err(error),
        }
    }
}

struct ScriptedPending {
    polls_left: Cell<u32>,
    outcome: Option<Result<Vec<u8>, TransportError>>,
    releases: Rc<Cell<u32>>,
}

impl PendingResponse for ScriptedPending {
    fn is_done(&self) -> bool {
        if self.polls_left.get() == 0 {
            return true;
        }
        self.polls_left.set(self.polls_left.get() - 1);
        false
    }

    fn take(&mut self) -> Result<Vec<u8>, TransportError> {
        self.outcome.take().unwrap_or(Err(TransportError::Aborted {
            message: "response taken twice".to_string(),
        }))
    }

    fn release(&mut self) {
        self.releases.set(self.releases.get() + 1);
    }
}

/// Transport that replays a script of send outcomes and records traffic.
struct ScriptedTransport {
    script: RefCell<VecDeque<SendOutcome>>,
    sends: RefCell<Vec<BrokerAddress>>,
    releases: Rc<Cell<u32>>,
}

impl ScriptedTransport {
    fn new(script: Vec<SendOutcome>) -> Rc<Self> {
        Rc::new(Self {
            script: RefCell::new(script.into()),
            sends: RefCell::new(Vec::new()),
            releases: Rc::new(Cell::new(0)),
        })
    }

    fn send_count(&self) -> usize {
        self.sends.borrow().len()
    }

    fn sends(&self) -> Vec<BrokerAddress> {
        self.sends.borrow().clone()
    }

    fn release_count(&self) -> u32 {
        self.releases.get()
    }
}

impl TransportOutput for ScriptedTransport {
    fn send_request(
        &self,
        target: &BrokerAddress,
        _frame: &[u8],
    ) -> Option<Box<dyn PendingResponse>> {
        match self.script.borrow_mut().pop_front() {
            Some(SendOutcome::NoSlot) | None => None,
            Some(SendOutcome::Pending {
                ready_after,
                outcome,
            }) => {
                self.sends.borrow_mut().push(target.clone());
                Some(Box::new(ScriptedPending {
                    polls_left: Cell::new(ready_after),
                    outcome: Some(outcome),
                    releases: Rc::clone(&self.releases),
                }))
            }
        }
    }
}

#[derive(Clone)]
struct ManualClock {
    now: Rc<Cell<u64>>,
}

impl ManualClock {
    fn new() -> Self {
        Self {
            now: Rc::new(Cell::new(0)),
        }
    }

    fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }
}

/// Topology whose refresh always reports the given error; the leader table
/// can still be updated between refreshes.
struct FailingRefreshTopology {
    inner: StaticTopology,
    refreshes: Cell<u32>,
}

impl FailingRefreshTopology {
    fn new() -> Self {
        Self {
            inner: StaticTopology::new(Vec::new()),
            refreshes: Cell::new(0),
        }
    }
}

impl TopologyView for FailingRefreshTopology {
    fn leader_for(&self, topic: &str, partition_id: u16) -> Option<BrokerAddress> {
        self.inner.leader_for(topic, partition_id)
    }

    fn any_broker(&self) -> Option<BrokerAddress> {
        self.inner.any_broker()
    }

    fn refresh_now(&self) -> RefreshHandle {
        self.refreshes.set(self.refreshes.get() + 1);
        RefreshHandle::ready(Err(TopologyError::RefreshFailed {
            message: "gateway unreachable".to_string(),
        }))
    }
}

struct Fixture {
    controller: RequestController<JsonCodec>,
    transport: Rc<ScriptedTransport>,
    clock: ManualClock,
    released: Rc<Cell<u32>>,
}

impl Fixture {
    fn new(transport: Rc<ScriptedTransport>, topology: Rc<dyn TopologyView>) -> Self {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();

        let clock = ManualClock::new();
        let released = Rc::new(Cell::new(0));
        let release_counter = Rc::clone(&released);
        let release: ReleaseFn = Rc::new(move |_| release_counter.set(release_counter.get() + 1));

        let controller = RequestController::new(
            0,
            Rc::clone(&transport) as Rc<dyn TransportOutput>,
            topology,
            Rc::new(clock.clone()),
            JsonCodec,
            TIMEOUT_MS,
            release,
        );

        Self {
            controller,
            transport,
            clock,
            released,
        }
    }

    /// Step until the controller parks again. Panics if it never does.
    fn run(&mut self) {
        for _ in 0..1_000 {
            self.controller.step();
            if self.controller.is_closed() {
                return;
            }
        }
        panic!("controller did not terminate");
    }

    fn take(future: &ResponseFuture<ResponseValue>) -> Result<ResponseValue, ClientError> {
        future.try_take().expect("request should have completed")
    }
}

#[test]
fn happy_path_completes_with_decoded_response() {
    let topology = Rc::new(StaticTopology::new(Vec::new()));
    topology.set_leader("orders", 0, addr(1));

    let transport = ScriptedTransport::new(vec![SendOutcome::Pending {
        ready_after: 1,
        outcome: Ok(command_success_frame(0, 17, json!({ "state": "CREATED" }))),
    }]);
    let mut fixture = Fixture::new(Rc::clone(&transport), topology);

    let (sink, future) = response_channel();
    fixture
        .controller
        .configure_command(Command::new("orders", 0, json!({ "type": "CREATE" })), sink)
        .expect("arm");

    fixture.run();

    let response = Fixture::take(&future)
        .expect("success")
        .into_command()
        .expect("command response");
    assert_eq!(response.key, 17);
    assert_eq!(response.event, json!({ "state": "CREATED" }));

    assert!(fixture.controller.is_closed());
    assert_eq!(fixture.controller.attempts(), 1);
    assert_eq!(fixture.controller.contacted().len(), 1);
    assert!(fixture.controller.contacted().contains(&addr(1)));
    assert_eq!(fixture.released.get(), 1);
    assert_eq!(transport.send_count(), 1);
    assert_eq!(transport.release_count(), 1);

    // Exactly one completion: the result is gone now.
    assert!(future.try_take().is_none());
}

#[test]
fn topic_not_found_refreshes_and_retries() {
    let topology = Rc::new(StaticTopology::new(Vec::new()));
    topology.set_leader("orders", 0, addr(1));

    let transport = ScriptedTransport::new(vec![
        SendOutcome::reply(error_frame(ErrorCode::TopicNotFound, b"topic orders")),
        SendOutcome::reply(command_success_frame(0, 5, json!({ "state": "CREATED" }))),
    ]);
    let mut fixture = Fixture::new(Rc::clone(&transport), Rc::clone(&topology) as Rc<dyn TopologyView>);

    let (sink, future) = response_channel();
    fixture
        .controller
        .configure_command(Command::new("orders", 0, json!({})), sink)
        .expect("arm");

    // First attempt: error envelope, back through refresh.
    for _ in 0..4 {
        fixture.controller.step();
    }
    // Leadership moved while the topology was being refreshed.
    topology.set_leader("orders", 0, addr(2));

    fixture.run();

    assert!(Fixture::take(&future).is_ok());
    assert_eq!(fixture.controller.attempts(), 2);
    assert_eq!(fixture.controller.contacted().len(), 2);
    assert!(fixture.controller.contacted().contains(&addr(1)));
    assert!(fixture.controller.contacted().contains(&addr(2)));
    assert_eq!(topology.refresh_count(), 1);
    assert_eq!(transport.send_count(), 2);
    assert_eq!(transport.release_count(), 2);
}

#[test]
fn request_timeout_code_is_also_retried() {
    let topology = Rc::new(StaticTopology::new(Vec::new()));
    topology.set_leader("orders", 0, addr(1));

    let transport = ScriptedTransport::new(vec![
        SendOutcome::reply(error_frame(ErrorCode::RequestTimeout, b"slow broker")),
        SendOutcome::reply(command_success_frame(0, 1, json!({}))),
    ]);
    let mut fixture = Fixture::new(Rc::clone(&transport), topology);

    let (sink, future) = response_channel();
    fixture
        .controller
        .configure_command(Command::new("orders", 0, json!({})), sink)
        .expect("arm");

    fixture.run();

    assert!(Fixture::take(&future).is_ok());
    assert_eq!(fixture.controller.attempts(), 2);
    assert_eq!(transport.send_count(), 2);
}

#[test]
fn hard_broker_error_fails_without_retry() {
    let topology = Rc::new(StaticTopology::new(Vec::new()));
    topology.set_leader("orders", 0, addr(1));

    let transport = ScriptedTransport::new(vec![SendOutcome::reply(error_frame(
        ErrorCode::RequestProcessingFailure,
        b"duplicate id",
    ))]);
    let mut fixture = Fixture::new(Rc::clone(&transport), topology);

    let (sink, future) = response_channel();
    fixture
        .controller
        .configure_command(Command::new("orders", 0, json!({})), sink)
        .expect("arm");

    fixture.run();

    let error = Fixture::take(&future).expect_err("broker error");
    assert_eq!(
        error,
        ClientError::Broker {
            code: ErrorCode::RequestProcessingFailure,
            message: "duplicate id".to_string(),
        }
    );
    assert_eq!(fixture.controller.attempts(), 1);
    assert_eq!(transport.send_count(), 1);
    assert_eq!(transport.release_count(), 1);
    assert_eq!(fixture.released.get(), 1);
}

#[test]
fn non_utf8_error_data_gets_fallback_message() {
    let topology = Rc::new(StaticTopology::new(Vec::new()));
    topology.set_leader("orders", 0, addr(1));

    let transport = ScriptedTransport::new(vec![SendOutcome::reply(error_frame(
        ErrorCode::InvalidMessage,
        &[0xFF, 0xFE, 0x80],
    ))]);
    let mut fixture = Fixture::new(Rc::clone(&transport), topology);

    let (sink, future) = response_channel();
    fixture
        .controller
        .configure_command(Command::new("orders", 0, json!({})), sink)
        .expect("arm");

    fixture.run();

    let error = Fixture::take(&future).expect_err("broker error");
    match error {
        ClientError::Broker { code, message } => {
            assert_eq!(code, ErrorCode::InvalidMessage);
            assert!(message.contains("unable to parse error message"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn deadline_expires_when_topic_is_never_known() {
    // Leader never resolves; refreshes succeed instantly but change nothing.
    let topology = Rc::new(StaticTopology::new(vec![addr(0)]));
    let transport = ScriptedTransport::new(Vec::new());
    let mut fixture = Fixture::new(Rc::clone(&transport), topology);

    let (sink, future) = response_channel();
    fixture
        .controller
        .configure_command(Command::new("unknown-topic", 3, json!({})), sink)
        .expect("arm");

    // Let the pick/refresh loop spin a while, then push past the deadline.
    for _ in 0..30 {
        fixture.controller.step();
    }
    assert!(!fixture.controller.is_closed());
    fixture.clock.advance(TIMEOUT_MS + 1);
    fixture.run();

    let error = Fixture::take(&future).expect_err("timeout");
    match error {
        ClientError::RequestTimeout { message, source } => {
            assert!(message.contains("command on topic 'unknown-topic' partition 3"));
            assert!(message.contains("contacted brokers: []"));
            assert!(source.is_none());
        }
        other => panic!("unexpected error: {other:?}"),
    }

    assert_eq!(transport.send_count(), 0);
    assert_eq!(fixture.released.get(), 1);
}

#[test]
fn deadline_between_attempts_fails_without_further_send() {
    let topology = Rc::new(StaticTopology::new(Vec::new()));
    topology.set_leader("orders", 0, addr(1));

    let transport = ScriptedTransport::new(vec![
        SendOutcome::reply(error_frame(ErrorCode::TopicNotFound, b"moved")),
        SendOutcome::reply(command_success_frame(0, 1, json!({}))),
    ]);
    let mut fixture = Fixture::new(Rc::clone(&transport), topology);

    let (sink, future) = response_channel();
    fixture
        .controller
        .configure_command(Command::new("orders", 0, json!({})), sink)
        .expect("arm");

    // Run through the first attempt and the refresh, then expire the clock
    // before the second DETERMINE entry.
    for _ in 0..6 {
        fixture.controller.step();
    }
    fixture.clock.advance(TIMEOUT_MS + 1);
    fixture.run();

    let error = Fixture::take(&future).expect_err("timeout");
    assert!(matches!(error, ClientError::RequestTimeout { .. }));
    assert_eq!(transport.send_count(), 1);
    assert_eq!(transport.release_count(), 1);
}

#[test]
fn no_transport_slot_leaves_state_unchanged_and_retries() {
    let topology = Rc::new(StaticTopology::new(Vec::new()));
    topology.set_leader("orders", 0, addr(1));

    let transport = ScriptedTransport::new(vec![
        SendOutcome::NoSlot,
        SendOutcome::NoSlot,
        SendOutcome::reply(command_success_frame(0, 9, json!({}))),
    ]);
    let mut fixture = Fixture::new(Rc::clone(&transport), topology);

    let (sink, future) = response_channel();
    fixture
        .controller
        .configure_command(Command::new("orders", 0, json!({})), sink)
        .expect("arm");

    assert_eq!(fixture.controller.step(), 1); // arm -> determine
    assert_eq!(fixture.controller.step(), 1); // no slot, stays retryable
    assert_eq!(fixture.controller.step(), 1); // still no slot
    assert_eq!(fixture.controller.contacted().len(), 0);

    fixture.run();

    assert!(Fixture::take(&future).is_ok());
    assert_eq!(transport.send_count(), 1);
    assert_eq!(fixture.controller.attempts(), 3);
}

#[test]
fn command_rejection_is_surfaced_verbatim() {
    let topology = Rc::new(StaticTopology::new(Vec::new()));
    topology.set_leader("orders", 0, addr(1));

    let transport = ScriptedTransport::new(vec![SendOutcome::failure(
        TransportError::CommandRejected {
            reason: "task already completed".to_string(),
        },
    )]);
    let mut fixture = Fixture::new(Rc::clone(&transport), topology);

    let (sink, future) = response_channel();
    fixture
        .controller
        .configure_command(Command::new("orders", 0, json!({})), sink)
        .expect("arm");

    fixture.run();

    let error = Fixture::take(&future).expect_err("rejected");
    assert_eq!(
        error,
        ClientError::CommandRejected {
            reason: "task already completed".to_string(),
        }
    );
    assert_eq!(fixture.controller.attempts(), 1);
    assert_eq!(transport.release_count(), 1);
}

#[test]
fn transport_failure_is_wrapped_as_response_handling() {
    let topology = Rc::new(StaticTopology::new(Vec::new()));
    topology.set_leader("orders", 0, addr(1));

    let transport = ScriptedTransport::new(vec![SendOutcome::failure(
        TransportError::ConnectionFailed {
            message: "broken pipe".to_string(),
        },
    )]);
    let mut fixture = Fixture::new(Rc::clone(&transport), topology);

    let (sink, future) = response_channel();
    fixture
        .controller
        .configure_command(Command::new("orders", 0, json!({})), sink)
        .expect("arm");

    fixture.run();

    let error = Fixture::take(&future).expect_err("wrapped");
    match error {
        ClientError::ResponseHandling { message } => {
            assert!(message.contains("broken pipe"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(transport.release_count(), 1);
}

#[test]
fn control_response_binds_the_serving_broker() {
    let topology = Rc::new(StaticTopology::new(Vec::new()));
    topology.set_leader("orders", 2, addr(4));

    let transport = ScriptedTransport::new(vec![SendOutcome::reply(control_success_frame(
        json!({ "subscriberKey": 12 }),
    ))]);
    let mut fixture = Fixture::new(Rc::clone(&transport), topology);

    let message = ControlMessage::new(
        ControlMessageType::AddTaskSubscription,
        json!({ "taskType": "payment" }),
    )
    .with_routing(Routing::Partition {
        topic: "orders".to_string(),
        partition_id: 2,
    });

    let (sink, future) = response_channel();
    fixture
        .controller
        .configure_control_message(message, sink)
        .expect("arm");

    fixture.run();

    let response = Fixture::take(&future)
        .expect("success")
        .into_control()
        .expect("control response");
    assert_eq!(response.data, json!({ "subscriberKey": 12 }));
    assert_eq!(response.receiver(), Some(&addr(4)));
}

#[test]
fn failed_refresh_still_retries_until_deadline() {
    let topology = Rc::new(FailingRefreshTopology::new());
    let transport = ScriptedTransport::new(Vec::new());
    let mut fixture = Fixture::new(Rc::clone(&transport), Rc::clone(&topology) as Rc<dyn TopologyView>);

    let (sink, future) = response_channel();
    fixture
        .controller
        .configure_command(Command::new("orders", 0, json!({})), sink)
        .expect("arm");

    for _ in 0..12 {
        fixture.controller.step();
    }
    // Several refreshes failed yet the loop kept going.
    assert!(topology.refreshes.get() >= 2);
    assert!(!fixture.controller.is_closed());

    fixture.clock.advance(TIMEOUT_MS + 1);
    fixture.run();

    let error = Fixture::take(&future).expect_err("timeout");
    match error {
        ClientError::RequestTimeout { source, .. } => {
            let source = *source.expect("refresh failure chained as cause");
            assert_eq!(
                source,
                ClientError::Topology {
                    message: "gateway unreachable".to_string(),
                }
            );
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn failed_refresh_recovers_when_leader_appears() {
    let topology = Rc::new(FailingRefreshTopology::new());
    let transport = ScriptedTransport::new(vec![SendOutcome::reply(command_success_frame(
        0,
        3,
        json!({}),
    ))]);
    let mut fixture = Fixture::new(Rc::clone(&transport), Rc::clone(&topology) as Rc<dyn TopologyView>);

    let (sink, future) = response_channel();
    fixture
        .controller
        .configure_command(Command::new("orders", 0, json!({})), sink)
        .expect("arm");

    // One full pick → refresh(fails) → pick cycle with no leader.
    for _ in 0..4 {
        fixture.controller.step();
    }
    topology.inner.set_leader("orders", 0, addr(1));

    fixture.run();

    assert!(Fixture::take(&future).is_ok());
    assert_eq!(transport.sends(), vec![addr(1)]);
}

#[test]
fn controller_is_reusable_after_completion() {
    let topology = Rc::new(StaticTopology::new(Vec::new()));
    topology.set_leader("orders", 0, addr(1));

    let transport = ScriptedTransport::new(vec![
        SendOutcome::reply(command_success_frame(0, 1, json!({ "run": 1 }))),
        SendOutcome::reply(command_success_frame(0, 2, json!({ "run": 2 }))),
    ]);
    let mut fixture = Fixture::new(Rc::clone(&transport), topology);

    let (sink, first) = response_channel();
    fixture
        .controller
        .configure_command(Command::new("orders", 0, json!({})), sink)
        .expect("arm");
    fixture.run();
    assert!(Fixture::take(&first).is_ok());

    // Per-request state is reset by the second arming.
    let (sink, second) = response_channel();
    fixture
        .controller
        .configure_command(Command::new("orders", 0, json!({})), sink)
        .expect("re-arm");
    assert_eq!(fixture.controller.attempts(), 0);
    fixture.run();

    let response = Fixture::take(&second)
        .expect("success")
        .into_command()
        .expect("command");
    assert_eq!(response.key, 2);

    assert_eq!(fixture.released.get(), 2);
    assert_eq!(transport.send_count(), 2);
    assert_eq!(transport.release_count(), 2);
}

#[tokio::test]
async fn response_future_can_be_awaited_from_async_context() {
    let topology = Rc::new(StaticTopology::new(Vec::new()));
    topology.set_leader("orders", 0, addr(1));

    let transport = ScriptedTransport::new(vec![SendOutcome::reply(command_success_frame(
        0,
        11,
        json!({}),
    ))]);
    let mut fixture = Fixture::new(Rc::clone(&transport), topology);

    let (sink, future) = response_channel();
    fixture
        .controller
        .configure_command(Command::new("orders", 0, json!({})), sink)
        .expect("arm");
    fixture.run();

    let response = future.await.expect("success").into_command().expect("command");
    assert_eq!(response.key, 11);
}
