// src/demo_agents/mod.rs
// Bundled demo agents exercised by `src/bin/demo.rs`, standing in for
// the blockchain-specific agents the source crate shipped under
// src/agents — ping_pong, broadcast and alarm each cover one of the
// end-to-end scenarios a reviewer would want to see run live.

pub mod alarm_clock;
pub mod broadcast;
pub mod class_tag;
pub mod ping_pong;
