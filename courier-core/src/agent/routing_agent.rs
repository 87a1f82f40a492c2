/*
 * Copyright (c) 2024. Courier Contributors
 *
 * Licensed under either of
 *   * Apache License, Version 2.0 (the "License");
 *     you may not use this file except in compliance with the License.
 *     You may obtain a copy of the License at http://www.apache.org/licenses/LICENSE-2.0
 *   * MIT license: http://opensource.org/licenses/MIT
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the applicable License for the specific language governing permissions and
 * limitations under that License.
 */
use std::any::{type_name, TypeId};
use std::fmt::{Debug, Formatter};
use std::sync::{Arc, Weak};

use acton_ern::Ern;
use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{error, instrument, trace, warn};

use crate::agent::CommandEnvelope;
use crate::common::RouteFuture;
use crate::message::{Message, QueueError};
use crate::queue::DispatchEngine;
use crate::traits::{MessagePayload, Recipient, RecipientRef, Sender, SenderRef};

type RouteHandler = dyn Fn(Message) -> RouteFuture + Send + Sync;

/// A generic actor: a recipient routing payloads to registered handlers.
///
/// Routes are keyed by the payload's concrete type; a payload may match
/// several routes, and every matching handler runs. When nothing matches,
/// a [`CommandEnvelope`] payload is executed if its command type is in the
/// agent's approved set, reporting on the command's own request; anything
/// else is logged as unprocessed.
///
/// Route and approval mutation is itself routed through message injection,
/// so it serializes with ordinary message processing instead of racing it.
pub struct RoutingAgent {
    id: Ern,
    engine: DispatchEngine,
    routes: DashMap<TypeId, Vec<Arc<RouteHandler>>>,
    approved_commands: DashMap<TypeId, &'static str>,
    self_ref: Weak<RoutingAgent>,
}

#[derive(Clone)]
struct AddRoute {
    selector: TypeId,
    selector_name: &'static str,
    handler: Arc<RouteHandler>,
}

#[derive(Clone, Debug)]
struct RemoveRoute {
    selector: TypeId,
    selector_name: &'static str,
}

#[derive(Clone, Debug)]
struct ApproveCommand {
    command_type: TypeId,
    command_name: &'static str,
}

impl Debug for AddRoute {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddRoute")
            .field("selector", &self.selector_name)
            .finish()
    }
}

impl RoutingAgent {
    /// Creates an agent bound to the given engine.
    pub fn new(engine: DispatchEngine, name: &str) -> Arc<Self> {
        let id = Ern::with_root(name).expect("Failed to create agent identity");
        Arc::new_cyclic(|weak| Self {
            id,
            engine,
            routes: DashMap::new(),
            approved_commands: DashMap::new(),
            self_ref: weak.clone(),
        })
    }

    /// This agent's recipient handle.
    pub fn handle(self: &Arc<Self>) -> RecipientRef {
        RecipientRef::new(self.clone() as Arc<dyn Recipient>)
    }

    /// This agent's sender handle.
    pub fn sender_ref(self: &Arc<Self>) -> SenderRef {
        SenderRef::new(self.clone() as Arc<dyn Sender>)
    }

    /// Registers a handler for payloads of type `M`, serialized through the
    /// agent's own queue. The returned message's request completes once the
    /// route is live.
    pub fn add_route<M: MessagePayload + 'static>(
        self: &Arc<Self>,
        handler: impl Fn(Message) -> RouteFuture + Send + Sync + 'static,
    ) -> Result<Message, QueueError> {
        self.control(AddRoute {
            selector: TypeId::of::<M>(),
            selector_name: type_name::<M>(),
            handler: Arc::new(handler),
        })
    }

    /// Removes every route registered for payloads of type `M`.
    pub fn remove_route<M: MessagePayload + 'static>(
        self: &Arc<Self>,
    ) -> Result<Message, QueueError> {
        self.control(RemoveRoute {
            selector: TypeId::of::<M>(),
            selector_name: type_name::<M>(),
        })
    }

    /// Adds a command type to the approved-execution set.
    pub fn approve_command<C: crate::agent::Command + 'static>(
        self: &Arc<Self>,
    ) -> Result<Message, QueueError> {
        self.control(ApproveCommand {
            command_type: TypeId::of::<C>(),
            command_name: type_name::<C>(),
        })
    }

    /// Sends a payload to this agent through the engine.
    pub fn tell(
        self: &Arc<Self>,
        payload: impl MessagePayload + 'static,
    ) -> Result<Message, QueueError> {
        self.control(payload)
    }

    fn control(
        self: &Arc<Self>,
        payload: impl MessagePayload + 'static,
    ) -> Result<Message, QueueError> {
        let message = Message::compose(payload)
            .from(self.sender_ref())
            .to(self.handle())
            .build();
        self.engine.inject(message)
    }

    async fn run_command(&self, envelope: &CommandEnvelope) {
        let command = envelope.command.clone();
        if self.approved_commands.contains_key(&envelope.command_type) {
            trace!(command = command.name(), "executing approved command");
            match command.run().await {
                Ok(()) => envelope.request().succeed(),
                Err(problem) => {
                    error!(command = command.name(), %problem, "command failed");
                    envelope.request().fail(problem);
                }
            }
        } else {
            warn!(command = command.name(), "command not approved");
            envelope.request().fail(anyhow::anyhow!(
                "command {} is not approved for agent {}",
                command.name(),
                self.id
            ));
        }
    }
}

#[async_trait]
impl Recipient for RoutingAgent {
    fn id(&self) -> Ern {
        self.id.clone()
    }

    #[instrument(skip(self, message), fields(agent = %self.id))]
    async fn on_message(&self, message: Message) -> anyhow::Result<()> {
        // Control traffic first: route mutation arrives through the queue
        // like any other message.
        if let Some(add) = message.payload_as::<AddRoute>() {
            trace!(selector = add.selector_name, "route added");
            self.routes
                .entry(add.selector)
                .or_default()
                .push(add.handler.clone());
            return Ok(());
        }
        if let Some(remove) = message.payload_as::<RemoveRoute>() {
            trace!(selector = remove.selector_name, "route removed");
            self.routes.remove(&remove.selector);
            return Ok(());
        }
        if let Some(approve) = message.payload_as::<ApproveCommand>() {
            trace!(command = approve.command_name, "command approved");
            self.approved_commands
                .insert(approve.command_type, approve.command_name);
            return Ok(());
        }

        let selector = message.payload().as_ref().as_any().type_id();
        // Snapshot the handlers before awaiting anything; handlers may
        // themselves register routes via injection.
        let handlers: Vec<Arc<RouteHandler>> = self
            .routes
            .get(&selector)
            .map(|entry| entry.value().clone())
            .unwrap_or_default();

        if !handlers.is_empty() {
            for handler in handlers {
                if let Err(problem) = handler(message.clone()).await {
                    error!(agent = %self.id, %problem, "route handler failed");
                }
            }
            return Ok(());
        }

        if let Some(envelope) = message.payload_as::<CommandEnvelope>() {
            self.run_command(envelope).await;
            return Ok(());
        }

        trace!(agent = %self.id, payload = ?message.payload(), "message unprocessed");
        Ok(())
    }
}

#[async_trait]
impl Sender for RoutingAgent {
    fn id(&self) -> Ern {
        self.id.clone()
    }

    async fn bounce(&self, message: Message) {
        warn!(agent = %self.id, ?message, "message bounced");
    }

    fn as_recipient(&self) -> Option<RecipientRef> {
        self.self_ref
            .upgrade()
            .map(|agent| RecipientRef::new(agent as Arc<dyn Recipient>))
    }
}

impl Debug for RoutingAgent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutingAgent").field("id", &self.id).finish()
    }
}
