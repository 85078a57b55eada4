//! Signal module - read-only view of the run's cancellation token.

use crate::cancel::CancellationToken;
use rquickjs::{Ctx, Exception, Function, Object, Result};

/// Build the `signal` object passed to the snippet.
///
/// `signal.isAborted()` reports cancellation; `signal.throwIfAborted()`
/// throws once the run has been superseded.
pub fn build<'js>(ctx: &Ctx<'js>, token: &CancellationToken) -> Result<Object<'js>> {
    let signal = Object::new(ctx.clone())?;

    let token_ref = token.clone();
    signal.set(
        "isAborted",
        Function::new(ctx.clone(), move || token_ref.is_cancelled())?,
    )?;

    let token_ref = token.clone();
    signal.set(
        "throwIfAborted",
        Function::new(ctx.clone(), move |ctx: Ctx<'js>| -> Result<()> {
            if token_ref.is_cancelled() {
                Err(Exception::throw_message(&ctx, "run was cancelled"))
            } else {
                Ok(())
            }
        })?,
    )?;

    Ok(signal)
}
