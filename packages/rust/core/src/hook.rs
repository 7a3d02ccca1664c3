//! Running named hooks over the build state.

use serde_json::{Value, json};
use tracing::{debug, instrument};

use bindery_shared::{BinderyError, Result};

use crate::output::Output;

/// Run hook `name` across the loaded plugins.
///
/// `extract` builds the payload from `output`. The payload then goes
/// through every plugin defining the hook, in plugin set order, each
/// handler receiving what the previous one returned along with the
/// [`hook_context`] of `output`. `apply` merges the final payload back into
/// the state.
///
/// The first failing handler aborts the call with
/// [`BinderyError::Hook`] naming the plugin.
#[instrument(skip_all, fields(hook = name))]
pub async fn call_hook<E, A>(name: &str, extract: E, apply: A, output: Output) -> Result<Output>
where
    E: FnOnce(&Output) -> Result<Value> + Send,
    A: FnOnce(Output, Value) -> Result<Output> + Send,
{
    let mut payload = extract(&output)?;
    let context = hook_context(&output);

    for plugin in output.loaded_plugins() {
        let Some(handler) = plugin.handler(name) else {
            debug!(plugin = plugin.name(), "plugin does not handle hook");
            continue;
        };

        debug!(plugin = plugin.name(), "calling hook handler");
        payload = handler
            .call(payload, &context)
            .await
            .map_err(|e| BinderyError::Hook {
                plugin: plugin.name().to_string(),
                hook: name.to_string(),
                message: e.to_string(),
            })?;
    }

    apply(output, payload)
}

/// Read-only view of the build handed to every hook handler.
pub fn hook_context(output: &Output) -> Value {
    json!({
        "stage": output.stage().as_str(),
        "generator": output.generator(),
        "root": output.book().root().display().to_string(),
        "title": output.book().title(),
        "config": output.book().config().to_value(),
        "output_dir": output.output_dir().display().to_string(),
        "plugins": output.plugins().serialize(),
        "pages": output.pages().keys().collect::<Vec<_>>(),
        "assets": output.assets(),
    })
}

/// Payload for hooks that receive nothing.
pub fn empty_payload(_output: &Output) -> Result<Value> {
    Ok(Value::Null)
}

/// Discard the payload and keep the state as is.
pub fn keep_output(output: Output, _payload: Value) -> Result<Output> {
    Ok(output)
}

/// The book config as the `config` hook payload.
pub fn config_payload(output: &Output) -> Result<Value> {
    Ok(output.book().config().to_value())
}

/// Replace the book config with the `config` hook result.
pub fn apply_config(output: Output, payload: Value) -> Result<Output> {
    let config = output.book().config().update_values(payload)?;
    let book = output.book().with_config(config);
    Ok(output.with_book(book))
}
