//! Wire Protocol
//!
//! This module implements the compressed text protocol spoken by zkv.
//!
//! ## Overview
//!
//! Each request and each reply is one zlib stream written in a single
//! transport write. There is no length prefix: the server treats one read
//! as one message.
//!
//! ```text
//! request:  zlib("$set color=blue")
//! reply:    zlib("Set color=blue\nreads=0\nwrites=1\n")
//! ```
//!
//! ## Modules
//!
//! - `codec`: zlib compress/decompress
//! - `command`: parses `$get` / `$set` requests
//! - `reply`: reply types and their text form
//!
//! ## Example
//!
//! ```
//! use zkv::protocol::{codec, parse_command, Command};
//!
//! let wire = codec::compress(b"$get color").unwrap();
//! let text = codec::decompress(&wire).unwrap();
//! let line = String::from_utf8_lossy(&text);
//! assert_eq!(parse_command(&line), Command::Get { key: "color" });
//! ```

pub mod codec;
pub mod command;
pub mod reply;

// Re-export commonly used types for convenience
pub use codec::{compress, decompress, CodecError};
pub use command::{parse_command, Command};
pub use reply::{Reply, COMPRESSION_FAILED};
