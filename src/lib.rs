// Library root
// -----------
// This crate exposes a small library surface for the CLI. The binary
// (`main.rs`) parses arguments and dispatches into these modules.
//
// Module responsibilities:
// - `api`: Encapsulates HTTP interactions with the HackTheBox v4 API
//   (one blocking client, bearer auth, one method per endpoint) plus the
//   environment-derived configuration.
// - `model`: Typed records for machines, reviews, the active instance,
//   the to-do list and the cache snapshot.
// - `cache`: The machine-listing snapshot file: refresh, load, staleness.
// - `resolve`: Turns a name/id/IP into one machine record, cache first,
//   live endpoints second.
// - `ui`: Renders machines and to-do entries as text and owns the
//   interactive prompts and spinners.
// - `actions`: One function per CLI action, gluing the above together.
//
// Keeping this separation makes the rendering and resolution logic
// testable without a terminal or a live API.
pub mod actions;
pub mod api;
pub mod cache;
pub mod model;
pub mod resolve;
pub mod ui;
