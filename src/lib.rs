//! Asterisk Gateway Interface (AGI) library for tokio
//!
//! This crate lets an async Rust program act as a call-control endpoint for
//! Asterisk. The switch opens a connection (FastAGI) or pipes stdio (classic
//! AGI), sends a block of `agi_*` call metadata, then exchanges single-line
//! commands and single-line replies until the call ends.
//!
//! # Architecture
//!
//! - [`AgiSession`] — one call-control conversation: environment mapping,
//!   command codec, and a lock guaranteeing at most one command in flight.
//! - [`FastAgiServer`] — TCP server accepting switch-initiated connections,
//!   one worker task per call, with per-connection deadlines and graceful
//!   drain on shutdown.
//!
//! # FastAGI server
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use asterisk_agi_tokio::{AgiResult, AgiSession, FastAgiServer};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> AgiResult<()> {
//!     let server = FastAgiServer::bind(
//!         "0.0.0.0:4573",
//!         |cancel: CancellationToken, session: Arc<AgiSession>| async move {
//!             session.answer().await?;
//!             session.say_digits(session.env("agi_extension"), "").await?;
//!
//!             tokio::select! {
//!                 digit = session.wait_for_digit(5000) => {
//!                     if let Some(digit) = digit? {
//!                         session.verbose(&format!("caller pressed {digit}"), 1).await?;
//!                     }
//!                 }
//!                 () = cancel.cancelled() => {}
//!             }
//!
//!             session.hangup().await
//!         },
//!     )
//!     .await?;
//!
//!     let handle = server.handle();
//!     tokio::spawn(async move {
//!         // ... on your shutdown condition:
//!         handle.stop().await; // drains in-flight calls
//!     });
//!
//!     server.serve().await
//! }
//! ```
//!
//! Point Asterisk at it from the dialplan:
//!
//! ```text
//! exten => 100,1,AGI(agi://127.0.0.1:4573/demo)
//! ```
//!
//! # Classic AGI (stdio)
//!
//! When Asterisk spawns the program directly, build the session over stdio:
//!
//! ```rust,no_run
//! use asterisk_agi_tokio::{AgiResult, AgiSession};
//!
//! #[tokio::main]
//! async fn main() -> AgiResult<()> {
//!     let session = AgiSession::from_stdio().await?;
//!     session.answer().await?;
//!     session.stream_file("welcome", "0123456789*#").await?;
//!     session.hangup().await
//! }
//! ```
//!
//! # Raw commands
//!
//! Every typed operation is a thin wrapper over [`AgiSession::execute`];
//! any AGI application command composes without library changes:
//!
//! ```rust,no_run
//! # async fn example(session: &asterisk_agi_tokio::AgiSession) -> asterisk_agi_tokio::AgiResult<()> {
//! let reply = session.execute("GET FULL VARIABLE ${CDR(duration)}").await?;
//! println!("result={} data={}", reply.result, reply.data);
//! # Ok(())
//! # }
//! ```

pub mod command;
pub mod commands;
pub mod constants;
pub mod error;
pub mod protocol;
pub mod server;
pub mod session;
pub mod speech;

pub use command::{escape_arg, join_command, quote_arg, split_command, unescape_arg, CommandBuilder};
pub use constants::DEFAULT_FASTAGI_PORT;
pub use error::{AgiError, AgiResult};
pub use protocol::{AgiReply, ResultCode};
pub use server::{AgiHandler, FastAgiServer, ServerHandle, ServerOptions};
pub use session::AgiSession;
pub use speech::{SpeechRecognize, SpeechSynthesize};
