//! Wire format for the Cloakline session protocol.
//!
//! Every exchange with the server is a named event carrying a string payload.
//! Apart from `sendPublicKey` (a PEM public key in the clear), every payload is
//! an [`Envelope`]: a JSON array of base64 RSA-OAEP blocks which together
//! decrypt to one JSON document described in [`payloads`].
//!
//! The chunk size and block encoding are part of the wire contract: both peers
//! must split and reassemble envelopes identically, so nothing in this crate
//! is negotiable at runtime.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod envelope;
pub mod errors;
pub mod event;
pub mod payloads;

pub use envelope::Envelope;
pub use errors::{ProtocolError, Result};
pub use event::{EventKind, WireEvent};
pub use payloads::Contact;
