//! # kasir-terminal: Terminal Session for Kasir
//!
//! Wires [`kasir_core`] and [`kasir_db`] into one running till: a single
//! in-memory [`TerminalState`](kasir_core::TerminalState), the signed-in
//! operator, the terminal configuration and the ordered persist writer.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Kasir Runtime                                    │
//! │                                                                         │
//! │  UI / main.rs                                                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 kasir-terminal (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐   │   │
//! │  │   │   Terminal    │───►│ PersistWriter │    │TerminalConfig│   │   │
//! │  │   │ (terminal.rs) │    │ (persist.rs)  │    │ (config.rs)  │   │   │
//! │  │   └───────┬───────┘    └───────┬───────┘    └──────────────┘   │   │
//! │  └───────────┼────────────────────┼────────────────────────────────┘   │
//! │              ▼                    ▼                                     │
//! │        kasir-core           kasir-db (StateStore)                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! let terminal = Terminal::open(TerminalConfig::load(None)?).await?;
//! terminal.sign_in(Operator { id: "op-1".into(), name: "Ani".into() });
//!
//! terminal.add_product("p-latte", None)?;
//! let tx = terminal.commit(&CommitRequest {
//!     payments: vec![PaymentInput::cash(Money::from_minor(50_000))],
//!     ..Default::default()
//! })?;
//!
//! terminal.close().await?;
//! ```

pub mod config;
pub mod error;
pub mod persist;
pub mod terminal;

pub use config::TerminalConfig;
pub use error::{TerminalError, TerminalResult};
pub use persist::{PersistFailure, PersistHealth, PersistSettings, PersistWriter};
pub use terminal::Terminal;
