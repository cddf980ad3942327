// Domain layer: row/dispatch models, ports, and the pure formatting services.

pub mod model;
pub mod ports;

pub mod services;
