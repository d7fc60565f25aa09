//! Worker-thread pipeline stages: each owns a `std::thread` that blocks
//! on one jitter buffer's `peer`/`pull` and writes into another's
//! `pull`/`push`. Spawned from `Pipeline::start` and joined from
//! `Pipeline::stop`.

pub mod decoder;
pub mod demux;
pub mod encoder;
pub mod mux;
pub mod sink;
