//! Slack Integration - websocket bot interface
//!
//! This crate provides the Slack side of ackbar:
//! - **Transport** (`socket`, `websocket`, `wire`) - Socket Mode or RTM websocket
//!   session, frame decoding and envelope acks
//! - **Events** (`events`) - Event types, dispatcher and handlers
//! - **Triggers** (`hears`, `skills`) - Keyword phrases mapped to skills
//! - **Food trucks** (`food_truck`) - The schedule query skill
//! - **Web API** (`web`, `reply`) - `chat.postMessage` and session bootstrap calls
//!
//! # Architecture
//!
//! ```text
//! Websocket → SocketRunner → EventDispatcher → MessageHandler → HearsRouter → Skill
//!                                                                              ↓
//!                                                        Replier (chat.postMessage)
//! ```

pub mod events;
pub mod food_truck;
pub mod hears;
pub mod reply;
pub mod skills;
pub mod socket;
pub mod web;
pub mod websocket;
pub mod wire;

#[cfg(test)]
pub(crate) mod testing;
