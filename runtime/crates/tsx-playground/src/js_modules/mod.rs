//! Capability objects handed to a snippet.
//!
//! A snippet is compiled as `function (console, signal) { ... }` and these
//! are its only injected bindings. Nothing here touches the global object.

pub mod console;
pub mod signal;

pub use console::to_json;

use crate::monitor::RunMonitor;
use rquickjs::{Ctx, Object, Result};

/// The injected parameters of one run.
pub struct Capabilities<'js> {
    pub console: Object<'js>,
    pub signal: Object<'js>,
}

/// Build the console and signal objects for one run.
pub fn capabilities<'js>(ctx: &Ctx<'js>, monitor: &RunMonitor) -> Result<Capabilities<'js>> {
    Ok(Capabilities {
        console: console::build(ctx, monitor)?,
        signal: signal::build(ctx, monitor.token())?,
    })
}
