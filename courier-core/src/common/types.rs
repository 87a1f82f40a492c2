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

//! Defines common internal type aliases used within `courier-core`.

use std::future::Future;
use std::pin::Pin;

/// A pinned, boxed, dynamically dispatched future with no output, the
/// return type of lifecycle tasks and `on_state` hooks.
pub type FutureBox = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// The future returned by a routing-agent handler or a state-transition
/// action; failures are reported to the caller or logged.
pub type RouteFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'static>>;
