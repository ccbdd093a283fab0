use parser::types::Directive;
use parser::Positioned;
use value::ConstValue;

use crate::executor::ExecContext;

#[derive(Debug)]
pub(crate) struct DeferOptions {
    pub label: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct StreamOptions {
    pub label: Option<String>,
    pub initial_count: usize,
}

/// Applies `@skip(if:)` and `@include(if:)` against the current variables.
pub(crate) fn should_include(ctx: &ExecContext, directives: &[Positioned<Directive>]) -> bool {
    for directive in directives {
        match directive.node.name.node.as_str() {
            "skip" => {
                if bool_argument(ctx, directive, "if", false) {
                    return false;
                }
            }
            "include" => {
                if !bool_argument(ctx, directive, "if", true) {
                    return false;
                }
            }
            _ => {}
        }
    }
    true
}

/// Reads `@defer(if:, label:)`. Returns `None` when the directive is absent
/// or disabled, in which case the fragment is inlined as usual.
pub(crate) fn defer_options(
    ctx: &ExecContext,
    directives: &[Positioned<Directive>],
) -> Option<DeferOptions> {
    let directive = find_directive(directives, "defer")?;
    if !bool_argument(ctx, directive, "if", true) {
        return None;
    }
    Some(DeferOptions {
        label: string_argument(ctx, directive, "label"),
    })
}

/// Reads `@stream(if:, label:, initialCount:)`. Returns `None` when the
/// directive is absent or disabled, in which case the field behaves as an
/// ordinary list.
pub(crate) fn stream_options(
    ctx: &ExecContext,
    directives: &[Positioned<Directive>],
) -> Option<StreamOptions> {
    let directive = find_directive(directives, "stream")?;
    if !bool_argument(ctx, directive, "if", true) {
        return None;
    }
    let initial_count = match argument_value(ctx, directive, "initialCount") {
        Some(ConstValue::Number(n)) => n.as_u64().unwrap_or(0) as usize,
        _ => 0,
    };
    Some(StreamOptions {
        label: string_argument(ctx, directive, "label"),
        initial_count,
    })
}

fn find_directive<'a>(
    directives: &'a [Positioned<Directive>],
    name: &str,
) -> Option<&'a Positioned<Directive>> {
    directives
        .iter()
        .find(|directive| directive.node.name.node.as_str() == name)
}

/// Coerces one directive argument against the variables; a missing argument
/// (or an unbound variable) falls back to the schema default from the
/// directive registry. Unknown arguments are never asked for.
fn argument_value(
    ctx: &ExecContext,
    directive: &Positioned<Directive>,
    name: &str,
) -> Option<ConstValue> {
    directive
        .node
        .get_argument(name)
        .and_then(|value| {
            value
                .node
                .clone()
                .into_const_with(|var_name| {
                    ctx.env.variables.get(&var_name).cloned().ok_or(())
                })
                .ok()
        })
        .or_else(|| {
            ctx.env
                .schema
                .directive_by_name(directive.node.name.node.as_str())
                .and_then(|meta| meta.arguments.get(name))
                .and_then(|arg| arg.default_value.clone())
        })
}

fn bool_argument(
    ctx: &ExecContext,
    directive: &Positioned<Directive>,
    name: &str,
    fallback: bool,
) -> bool {
    match argument_value(ctx, directive, name) {
        Some(ConstValue::Boolean(value)) => value,
        _ => fallback,
    }
}

fn string_argument(
    ctx: &ExecContext,
    directive: &Positioned<Directive>,
    name: &str,
) -> Option<String> {
    match argument_value(ctx, directive, name) {
        Some(ConstValue::String(value)) => Some(value),
        _ => None,
    }
}
