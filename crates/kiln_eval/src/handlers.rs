//! Default handlers for effects left in the type of an expression.
//!
//! Every handled effect label `m/e` is discharged by a function named
//! `default-e`. For the effects of the system core modules that function lives
//! in `std/core`; for any other effect it lives next to the effect itself.

use kiln_build::types::Type;
use kiln_build::BuildContext;
use kiln_common::{ModuleName, QualifiedName};
use tracing::debug;

use crate::synth::wrap_handler;

/// Module holding the default handlers of system core effects.
pub const SYSTEM_CORE: &str = "std/core";
/// Modules whose effects are handled from [`SYSTEM_CORE`].
pub const SYSTEM_CORE_MODULES: &[&str] = &[
    "std/core/types",
    "std/core/hnd",
    "std/core/exn",
    "std/core/console",
];
/// The asynchronous effect; its handler always goes outermost.
pub const ASYNC_LABEL: &str = "std/async/async";
/// Prefix of default handler names.
pub const DEFAULT_HANDLER_PREFIX: &str = "default-";

/// A `main` body with every effect label discharged.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Wrapped {
    /// The wrapped statement.
    pub body: String,
    /// Modules defining the handlers that were applied, in application order.
    pub handler_modules: Vec<ModuleName>,
}

/// Returns the default handler for an effect label.
pub fn default_handler_name(label: &QualifiedName) -> QualifiedName {
    let module = if SYSTEM_CORE_MODULES.contains(&label.module.as_str()) {
        ModuleName::new(SYSTEM_CORE)
    } else {
        label.module.clone()
    };
    module.qualify(format!("{DEFAULT_HANDLER_PREFIX}{}", label.name))
}

/// Wraps `body` in the default handler of every label in `labels`.
///
/// Labels are applied innermost first in row order, except the async label,
/// which is applied last so its handler encloses every other one. Fails with
/// the first label whose handler is not defined in the context.
pub fn wrap_default_handlers(
    ctx: &BuildContext,
    labels: &[Type],
    body: String,
) -> Result<Wrapped, Type> {
    let (is_async, mut ordered): (Vec<&Type>, Vec<&Type>) =
        labels.iter().partition(|label| label.is_con(ASYNC_LABEL));
    ordered.extend(is_async);

    let mut wrapped = Wrapped {
        body,
        handler_modules: Vec::new(),
    };
    for label in ordered {
        let Some(name) = label.head_name() else {
            return Err(label.clone());
        };
        let handler = default_handler_name(name);
        if ctx.lookup_symbol(&handler).is_empty() {
            return Err(label.clone());
        }
        debug!(effect = %name, %handler, "applying default handler");
        wrapped.body = wrap_handler(&handler.to_string(), &wrapped.body);
        if !wrapped.handler_modules.contains(&handler.module) {
            wrapped.handler_modules.push(handler.module);
        }
    }
    Ok(wrapped)
}
