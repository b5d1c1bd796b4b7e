#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]
pub mod encode;
pub mod ensemble;
pub mod model;
pub mod pipeline;
pub mod record;
pub mod report;
