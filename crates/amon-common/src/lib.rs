//! Shared wire types and the REST error taxonomy for the Amon master.
//!
//! Everything that crosses a crate boundary lives here: the probe event
//! shape emitted by agents, the `{code, message}` error kinds the master
//! puts on the wire, and the relative-time grammar used by maintenance
//! windows (`"now"`, `"30m"`, `"2h"`, `"1d"`).

pub mod error;
pub mod time;
pub mod types;
