//! Built-in demonstration scenes.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use tendril_core::{build, leaf, Child, Description, Error, Handler, PropValue, Props, Result};
use tendril_reconciler::{EngineConfig, NodeId, RenderHandle};

use crate::scene::{GenerationOutput, SceneRunner, Slicing};

/// `<div id="foo"><a>{label}</a><b/></div>`
pub fn greeting(label: &str) -> Result<Description> {
    build(
        "div",
        Props::new().with("id", "foo"),
        vec![
            Child::from(build("a", Props::new(), [label])?),
            Child::from(leaf("b")?),
        ],
    )
}

/// An input whose `input` handler re-renders the app with the typed value.
pub fn echo_app(value: &str, handle: &RenderHandle<NodeId>, mount: NodeId) -> Result<Description> {
    let next = handle.clone();
    let on_input = Handler::new(move |payload: &PropValue| {
        if let Ok(tree) = echo_app(&payload.to_string(), &next, mount) {
            next.request(tree, mount);
        }
    });
    build(
        "div",
        Props::new(),
        vec![
            Child::from(build(
                "input",
                Props::new().with("value", value).with("onInput", on_input),
                Vec::<Child>::new(),
            )?),
            Child::from(build(
                "h2",
                Props::new(),
                vec![Child::from("Hello "), Child::from(value)],
            )?),
        ],
    )
}

/// Render the greeting twice, then run the echo app through one input event.
///
/// # Errors
///
/// Returns the first render failure.
pub fn run_demo(config: EngineConfig, slicing: Slicing) -> Result<Vec<GenerationOutput>> {
    let mut outputs = Vec::new();

    let mut greeter = SceneRunner::new(config.clone(), slicing)?;
    outputs.push(greeter.render("greeting: bar", greeting("bar")?)?);
    outputs.push(greeter.render("greeting: baz", greeting("baz")?)?);

    let mut echo = SceneRunner::new(config, slicing)?;
    let mount = echo.mount();
    let handle = echo.engine().render_handle();
    outputs.push(echo.render("echo: World", echo_app("World", &handle, mount)?)?);

    let input = echo
        .engine()
        .host()
        .find(mount, "input")
        .ok_or_else(|| Error::internal("echo app rendered no input"))?;
    let handled = echo
        .engine()
        .host()
        .dispatch(input, "input", &PropValue::from("tendril"));
    if handled == 0 {
        return Err(Error::internal("echo input has no input handler"));
    }
    outputs.push(echo.settle("echo: input \"tendril\"")?);

    Ok(outputs)
}
