//! Tool registry client.
//!
//! A registry is an external service exposing callable tools over JSON-RPC 2.0
//! (`initialize`, `tools/list`, `tools/call`). [`RegistryTransport`] is the seam
//! the rest of the workspace talks to; [`HttpRegistryClient`] speaks the
//! streamable HTTP transport, where each POST is answered either with a JSON
//! body or with an SSE stream carrying the response.

pub mod error;
pub mod http;
pub mod protocol;
pub mod sse;
pub mod transport;

pub use error::{RegistryError, RegistryResult};
pub use http::{HttpRegistryClient, HttpRegistryConfig};
pub use protocol::{CallToolResult, RegistryContent, LATEST_PROTOCOL_VERSION};
pub use transport::RegistryTransport;
