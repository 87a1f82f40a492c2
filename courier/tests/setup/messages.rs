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
#![allow(unused)]

/// The simplest possible payload.
#[derive(Clone, Debug)]
pub struct Ping;

/// A payload carrying an ordering tag so tests can assert delivery order.
#[derive(Clone, Debug)]
pub struct Tagged {
    pub tag: u32,
}

/// A payload the exploding recipient panics on.
#[derive(Clone, Debug)]
pub struct Explode;

/// A payload the stinging recipient returns an error for.
#[derive(Clone, Debug)]
pub struct Sting;

/// A greeting payload used by routing-agent tests.
#[derive(Clone, Debug)]
pub struct Greeting {
    pub text: String,
}
