//! Purpose: Client SDK for the Yuyu video-sharing platform, used by the `yuyu` CLI and tests.
//! Exports: `api` (HTTP pipeline + endpoints), `core` (stores, navigation, errors), `notice`.
//! Role: Library backing the binary; embedders construct their own stores and client.
//! Invariants: No global state; session and notification stores are explicit handles.
//! Invariants: The library never prints to stdout; user-visible messages go through `notice`.
pub mod api;
pub mod core;
pub mod notice;
