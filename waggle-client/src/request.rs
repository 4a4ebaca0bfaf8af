//! Requests, their handlers, and their decoded results.
//!
//! Two request families exist: commands (appended to one partition's log)
//! and control messages (broker bookkeeping outside any log). Each family
//! knows how to pick its target from the topology, encode itself, recognize
//! its response template, and materialize a typed result — the controller
//! is polymorphic over that capability set via [`RequestHandler`].

use serde_json::Value;

use waggle_protocol::{
    CONTROL_MESSAGE_RESPONSE_TEMPLATE_ID, ControlMessageRequest, ControlMessageResponse,
    ControlMessageType, EXECUTE_COMMAND_RESPONSE_TEMPLATE_ID, ExecuteCommandRequest,
    ExecuteCommandResponse, MessageHeader, SCHEMA_ID,
};

use crate::addr::BrokerAddress;
use crate::codec::PayloadCodec;
use crate::error::ClientError;
use crate::topology::TopologyView;

/// A command bound to one partition of one topic.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    /// Topic the command is addressed to.
    pub topic: String,
    /// Partition within the topic.
    pub partition_id: u16,
    /// The command document (intermediate object-map form).
    pub payload: Value,
}

impl Command {
    /// Create a command.
    pub fn new(topic: impl Into<String>, partition_id: u16, payload: Value) -> Self {
        Self {
            topic: topic.into(),
            partition_id,
            payload,
        }
    }
}

/// Where a control message should be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routing {
    /// The leader of a specific partition.
    Partition {
        /// Topic the partition belongs to.
        topic: String,
        /// Partition within the topic.
        partition_id: u16,
    },
    /// One specific broker.
    Broker(BrokerAddress),
    /// Any broker; every node can answer.
    Any,
}

/// A typed control message with its routing.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlMessage {
    /// The kind of control message.
    pub message_type: ControlMessageType,
    /// The message document (intermediate object-map form).
    pub payload: Value,
    routing: Routing,
}

impl ControlMessage {
    /// Create a control message routed to any broker.
    ///
    /// That is the right default for cluster-wide requests such as
    /// [`ControlMessageType::RequestTopology`]; subscription management
    /// must be re-routed with [`ControlMessage::with_routing`] to the
    /// partition it manages, or to the broker a subscription is bound to.
    pub fn new(message_type: ControlMessageType, payload: Value) -> Self {
        Self {
            message_type,
            payload,
            routing: Routing::Any,
        }
    }

    /// Override the routing.
    pub fn with_routing(mut self, routing: Routing) -> Self {
        self.routing = routing;
        self
    }

    /// Where this message will be routed.
    pub fn routing(&self) -> &Routing {
        &self.routing
    }
}

/// A decoded command response.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandResponse {
    /// Partition that executed the command.
    pub partition_id: u16,
    /// Broker-assigned key of the resulting event.
    pub key: u64,
    /// The resulting event document.
    pub event: Value,
}

/// A decoded control-message response.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlResponse {
    /// The response document.
    pub data: Value,
    receiver: Option<BrokerAddress>,
}

impl ControlResponse {
    /// The broker that served this response, once bound.
    ///
    /// Long-lived flows (subscription opens) use this to pin follow-up
    /// traffic to the node that now owns the subscription.
    pub fn receiver(&self) -> Option<&BrokerAddress> {
        self.receiver.as_ref()
    }
}

/// The decoded result of a completed request.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseValue {
    /// Result of a command.
    Command(CommandResponse),
    /// Result of a control message.
    ControlMessage(ControlResponse),
}

impl ResponseValue {
    /// Record the broker that produced this response, on result kinds that
    /// care. Command results ignore it; control results keep it for
    /// receiver-bound follow-up traffic.
    pub(crate) fn bind_receiver(&mut self, receiver: &BrokerAddress) {
        match self {
            ResponseValue::Command(_) => {}
            ResponseValue::ControlMessage(response) => {
                response.receiver = Some(receiver.clone());
            }
        }
    }

    /// The command result, if this is one.
    pub fn into_command(self) -> Option<CommandResponse> {
        match self {
            ResponseValue::Command(response) => Some(response),
            ResponseValue::ControlMessage(_) => None,
        }
    }

    /// The control-message result, if this is one.
    pub fn into_control(self) -> Option<ControlResponse> {
        match self {
            ResponseValue::Command(_) => None,
            ResponseValue::ControlMessage(response) => Some(response),
        }
    }
}

/// Per-request strategy: targeting, encoding, response identification, and
/// result materialization for both request families.
#[derive(Debug, Clone)]
pub(crate) enum RequestHandler {
    Command(Command),
    ControlMessage(ControlMessage),
}

impl RequestHandler {
    /// Resolve the endpoint this request should go to, from the current
    /// topology view. `None` means the view cannot answer yet.
    pub(crate) fn target(&self, topology: &dyn TopologyView) -> Option<BrokerAddress> {
        match self {
            RequestHandler::Command(command) => {
                topology.leader_for(&command.topic, command.partition_id)
            }
            RequestHandler::ControlMessage(message) => match message.routing() {
                Routing::Partition {
                    topic,
                    partition_id,
                } => topology.leader_for(topic, *partition_id),
                Routing::Broker(addr) => Some(addr.clone()),
                Routing::Any => topology.any_broker(),
            },
        }
    }

    /// Encode the complete request frame (header + body).
    pub(crate) fn encode<C: PayloadCodec>(&self, codec: &C) -> Result<Vec<u8>, ClientError> {
        let encode_failed = |message: String| ClientError::EncodeFailed { message };

        match self {
            RequestHandler::Command(command) => {
                let payload = codec
                    .encode(&command.payload)
                    .map_err(|e| encode_failed(e.to_string()))?;
                ExecuteCommandRequest {
                    partition_id: command.partition_id,
                    topic: &command.topic,
                    payload: &payload,
                }
                .encode()
                .map_err(|e| encode_failed(e.to_string()))
            }
            RequestHandler::ControlMessage(message) => {
                let data = codec
                    .encode(&message.payload)
                    .map_err(|e| encode_failed(e.to_string()))?;
                ControlMessageRequest {
                    message_type: message.message_type,
                    data: &data,
                }
                .encode()
                .map_err(|e| encode_failed(e.to_string()))
            }
        }
    }

    /// Whether `header` announces the success template this request expects.
    pub(crate) fn handles_response(&self, header: &MessageHeader) -> bool {
        if header.schema_id != SCHEMA_ID {
            return false;
        }
        match self {
            RequestHandler::Command(_) => {
                header.template_id == EXECUTE_COMMAND_RESPONSE_TEMPLATE_ID
            }
            RequestHandler::ControlMessage(_) => {
                header.template_id == CONTROL_MESSAGE_RESPONSE_TEMPLATE_ID
            }
        }
    }

    /// Materialize the typed result from a success frame body.
    pub(crate) fn decode_response<C: PayloadCodec>(
        &self,
        codec: &C,
        frame: &[u8],
        offset: usize,
        block_length: u16,
        version: u16,
    ) -> Result<ResponseValue, ClientError> {
        let handling_failed = |message: String| ClientError::ResponseHandling { message };

        match self {
            RequestHandler::Command(_) => {
                let response = ExecuteCommandResponse::decode(frame, offset, block_length, version)
                    .map_err(|e| handling_failed(e.to_string()))?;
                let event = codec
                    .decode(&response.event)
                    .map_err(|e| handling_failed(e.to_string()))?;
                Ok(ResponseValue::Command(CommandResponse {
                    partition_id: response.partition_id,
                    key: response.key,
                    event,
                }))
            }
            RequestHandler::ControlMessage(_) => {
                let response = ControlMessageResponse::decode(frame, offset, block_length, version)
                    .map_err(|e| handling_failed(e.to_string()))?;
                let data = codec
                    .decode(&response.data)
                    .map_err(|e| handling_failed(e.to_string()))?;
                Ok(ResponseValue::ControlMessage(ControlResponse {
                    data,
                    receiver: None,
                }))
            }
        }
    }

    /// Human-readable description for diagnostics and timeout narratives.
    pub(crate) fn describe(&self) -> String {
        match self {
            RequestHandler::Command(command) => format!(
                "command on topic '{}' partition {}",
                command.topic, command.partition_id
            ),
            RequestHandler::ControlMessage(message) => {
                format!("control message {}", message.message_type)
            }
        }
    }
}
