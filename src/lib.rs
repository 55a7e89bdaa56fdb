//! Orientation beacon to fan webhook bridge.
//!
//! The beacon side ([`beacon`]) debounces orientation into a fan-request
//! flag and advertises it with battery and temperature ([`codec`]). The
//! consumer side ([`manager`], [`scanner`], [`consumer`]) watches for that
//! beacon, decides whether the fan should run ([`decision`]) and fires a
//! webhook on each transition ([`dispatch`]).

pub mod beacon;
pub mod codec;
pub mod config;
pub mod consumer;
pub mod debounce;
pub mod decision;
pub mod dispatch;
pub mod manager;
pub mod messages;
pub mod mqtt;
pub mod scanner;
pub mod simulate;
