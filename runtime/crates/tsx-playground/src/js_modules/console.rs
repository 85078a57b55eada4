//! Console module - captures output for the host.
//!
//! The object built here is passed to the snippet as its `console`
//! parameter; nothing is installed on the global object. Every method checks
//! the run's cancellation and abort state before recording anything.

use crate::events::OutputKind;
use crate::monitor::{Admission, RunMonitor};
use rquickjs::prelude::Rest;
use rquickjs::{Ctx, Exception, Function, Object, Result, Value};
use serde_json::{Number, Value as Json};

/// Convert a JavaScript value to a JSON value for the event stream.
pub fn to_json<'js>(ctx: &Ctx<'js>, val: &Value<'js>) -> Json {
    if val.is_undefined() {
        Json::String("undefined".to_string())
    } else if val.is_null() {
        Json::Null
    } else if let Some(b) = val.as_bool() {
        Json::Bool(b)
    } else if let Some(i) = val.as_int() {
        Json::from(i)
    } else if let Some(n) = val.as_number() {
        number_to_json(n)
    } else if let Some(s) = val.as_string() {
        Json::String(s.to_string().unwrap_or_default())
    } else if val.is_function() {
        let name = val
            .as_object()
            .and_then(|o| o.get::<_, String>("name").ok())
            .filter(|n| !n.is_empty());
        match name {
            Some(name) => Json::String(format!("[Function: {}]", name)),
            None => Json::String("[Function (anonymous)]".to_string()),
        }
    } else if val.is_error() {
        let field = |key: &str| {
            val.as_object()
                .and_then(|o| o.get::<_, String>(key).ok())
                .unwrap_or_default()
        };
        Json::String(format!("{}: {}", field("name"), field("message")))
    } else if val.is_object() {
        ctx.json_stringify(val.clone())
            .ok()
            .flatten()
            .and_then(|s| s.to_string().ok())
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_else(|| Json::String("[object]".to_string()))
    } else {
        Json::String("[value]".to_string())
    }
}

/// Integral floats become JSON integers; NaN and infinities become strings.
fn number_to_json(n: f64) -> Json {
    const MAX_SAFE: f64 = 9_007_199_254_740_991.0;
    if n.is_finite() && n.fract() == 0.0 && n.abs() <= MAX_SAFE {
        return Json::from(n as i64);
    }
    Number::from_f64(n).map(Json::Number).unwrap_or_else(|| {
        let text = if n.is_nan() {
            "NaN"
        } else if n > 0.0 {
            "Infinity"
        } else {
            "-Infinity"
        };
        Json::String(text.to_string())
    })
}

fn method<'js>(ctx: &Ctx<'js>, monitor: &RunMonitor, kind: OutputKind) -> Result<Function<'js>> {
    let monitor = monitor.clone();
    Function::new(
        ctx.clone(),
        move |ctx: Ctx<'js>, args: Rest<Value<'js>>| -> Result<()> {
            if !monitor.is_accepting() {
                return Ok(());
            }
            let values: Vec<Json> = args.0.iter().map(|v| to_json(&ctx, v)).collect();
            tracing::trace!(?kind, args = values.len(), "console call");
            match monitor.record(kind, values) {
                Admission::Recorded | Admission::Dropped => Ok(()),
                Admission::BudgetExceeded => {
                    Err(Exception::throw_internal(&ctx, "output limit exceeded"))
                }
            }
        },
    )
}

/// Build the mock console object for one run.
pub fn build<'js>(ctx: &Ctx<'js>, monitor: &RunMonitor) -> Result<Object<'js>> {
    let console = Object::new(ctx.clone())?;
    console.set("log", method(ctx, monitor, OutputKind::Log)?)?;
    console.set("debug", method(ctx, monitor, OutputKind::Log)?)?;
    console.set("info", method(ctx, monitor, OutputKind::Info)?)?;
    console.set("warn", method(ctx, monitor, OutputKind::Warn)?)?;
    console.set("error", method(ctx, monitor, OutputKind::Error)?)?;
    Ok(console)
}
