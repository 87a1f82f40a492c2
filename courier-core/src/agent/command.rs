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
use std::any::TypeId;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use async_trait::async_trait;

use crate::message::Request;

/// An executable operation carried as a message payload.
///
/// A [`RoutingAgent`](crate::agent::RoutingAgent) runs a command only when
/// no route matched it and the command's concrete type is in the agent's
/// approved set; success or failure is reported on the envelope's own
/// [`Request`].
#[async_trait]
pub trait Command: Send + Sync + Debug {
    /// Human-readable command name, used in logs and denial problems.
    fn name(&self) -> &str;

    /// Executes the command.
    async fn run(&self) -> anyhow::Result<()>;
}

/// Message payload wrapping a [`Command`] together with its completion
/// [`Request`].
#[derive(Clone)]
pub struct CommandEnvelope {
    pub(crate) command: Arc<dyn Command>,
    pub(crate) command_type: TypeId,
    request: Request,
}

impl CommandEnvelope {
    /// Wraps a concrete command for injection.
    pub fn new<C: Command + 'static>(command: C) -> Self {
        Self {
            command: Arc::new(command),
            command_type: TypeId::of::<C>(),
            request: Request::new(),
        }
    }

    /// The completion signal the executing agent reports on.
    pub fn request(&self) -> Request {
        self.request.clone()
    }
}

impl Debug for CommandEnvelope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandEnvelope")
            .field("command", &self.command.name())
            .finish()
    }
}
