//! Scoped synthetic modules backed by the virtual overlay.

use kiln_build::{BuildContext, BuildEnv, BuildResult};
use kiln_common::{InternalError, ModuleName};
use kiln_source::OverlayGuard;
use std::path::Path;
use tracing::debug;

/// Runs `action` with `content` installed at `path` and added as a root.
///
/// The overlay guard is handed to `action` so it can replace the content
/// in place. The root is removed and the overlay uninstalled on every exit
/// path; the module itself stays cached and is retired by the next
/// validation.
pub fn with_virtual_module<T>(
    ctx: &mut BuildContext,
    env: &BuildEnv<'_>,
    path: &Path,
    content: &str,
    action: impl FnOnce(&mut BuildContext, &OverlayGuard<'_>, &ModuleName) -> BuildResult<T>,
) -> BuildResult<T> {
    let guard = env.overlay.install(path, content)?;
    let name = ctx
        .add_root_sources(env, &[path.to_path_buf()])?
        .into_iter()
        .next()
        .ok_or_else(|| InternalError::new("virtual source resolved to no module"))?;
    debug!(module = %name, path = %path.display(), "virtual module installed");

    let result = action(ctx, &guard, &name);
    ctx.remove_root_module(&name);
    drop(guard);
    debug!(module = %name, "virtual module removed");
    result
}
