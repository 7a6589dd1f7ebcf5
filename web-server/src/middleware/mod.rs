// web-server/src/middleware/mod.rs
pub mod access_key_gate;
