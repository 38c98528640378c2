pub mod at_channel;
pub mod at_commands;
pub mod controller;
pub mod modem_config;
pub mod mts;
pub mod platform;
pub mod reconciler;
pub mod response_parser;
pub mod util;
