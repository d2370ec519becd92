//! HTTP service in front of the tagging pipeline
//!
//! Endpoints:
//! - `POST /tagger` with `{"source": "<text>"}` returns
//!   `{"success": "true", "tags": "a;b"}` or `{"success": "false", "error": "..."}`
//! - `GET /health` returns `{"health": "true"}` when the canary text still
//!   tags as `["Hello", "World"]`, `{"health": "false"}` otherwise
//!
//! ```bash
//! curl -X POST http://localhost:8080/tagger \
//!   -H "Content-Type: application/json" \
//!   -d '{"source": "Cats are popular pets.\nDogs are too."}'
//! ```

pub mod handlers;
pub mod server;

pub use handlers::{HealthResponse, TagRequest, TagResponse};
pub use server::{build_router, TaggerServer};
