//! String utilities in the `string` namespace.
//!
//! `format` and `join` take a variable number of arguments and are bound as
//! raw entry points.

use classbind_core::{CallError, Dynamic, RegistrationError};
use classbind_registry::{CallContext, TypeRegistry};

/// Longest string `repeat` and `pad` will build, in bytes.
pub const MAX_LEN: usize = 1 << 26;

/// An empty string with room for `bytes`, or an error past [`MAX_LEN`].
fn allocate(bytes: Option<usize>) -> Result<String, CallError> {
    let bytes = bytes
        .filter(|bytes| *bytes <= MAX_LEN)
        .ok_or_else(|| CallError::native(format!("string would exceed {MAX_LEN} bytes")))?;
    let mut out = String::new();
    out.try_reserve(bytes)
        .map_err(|err| CallError::native(err.to_string()))?;
    Ok(out)
}

/// Replace each `{}` in `template` with the next argument.
///
/// `{{` and `}}` produce literal braces. Too few or too many arguments is an
/// error.
pub fn format_values(template: &str, args: &[Dynamic]) -> Result<String, CallError> {
    let mut out = String::with_capacity(template.len());
    let mut args = args.iter();
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, chars.peek()) {
            ('{', Some('{')) | ('}', Some('}')) => {
                out.push(c);
                chars.next();
            }
            ('{', Some('}')) => {
                chars.next();
                let arg = args
                    .next()
                    .ok_or_else(|| CallError::native("format: not enough arguments"))?;
                out.push_str(&arg.to_string());
            }
            _ => out.push(c),
        }
    }

    if args.next().is_some() {
        return Err(CallError::native("format: too many arguments"));
    }
    Ok(out)
}

/// Join the display form of every value with `separator`.
pub fn join_values(separator: &str, values: &[Dynamic]) -> String {
    values
        .iter()
        .map(Dynamic::to_string)
        .collect::<Vec<_>>()
        .join(separator)
}

/// Left-pad `s` with `fill` to `width` characters.
pub fn pad(s: &str, width: usize, fill: char) -> Result<String, CallError> {
    let len = s.chars().count();
    if len >= width {
        return Ok(s.to_string());
    }
    let fill_count = width - len;
    let mut out = allocate(
        fill_count
            .checked_mul(fill.len_utf8())
            .and_then(|bytes| bytes.checked_add(s.len())),
    )?;
    out.extend(std::iter::repeat_n(fill, fill_count));
    out.push_str(s);
    Ok(out)
}

/// `s` repeated `count` times.
pub fn repeat(s: &str, count: usize) -> Result<String, CallError> {
    if s.is_empty() {
        return Ok(String::new());
    }
    let mut out = allocate(s.len().checked_mul(count))?;
    for _ in 0..count {
        out.push_str(s);
    }
    Ok(out)
}

/// Register the `string` namespace.
pub fn register(registry: &mut TypeRegistry) -> Result<(), RegistrationError> {
    registry
        .namespace("string")?
        .function("upper", |s: String| s.to_uppercase())
        .function("lower", |s: String| s.to_lowercase())
        .function("trim", |s: String| s.trim().to_string())
        .function("length", |s: String| s.chars().count())
        .function("contains", |s: String, needle: String| s.contains(&needle))
        .function("repeat", |s: String, count: usize| repeat(&s, count))
        .overload("pad", |s: String, width: usize| pad(&s, width, ' '))?
        .overload("pad", |s: String, width: usize, fill: char| pad(&s, width, fill))?
        .raw("format", |ctx: &mut CallContext<'_>| {
            let template: String = ctx.arg(0)?;
            let formatted = format_values(&template, &ctx.args()[1..])?;
            ctx.set_return(formatted)
        })
        .raw("join", |ctx: &mut CallContext<'_>| {
            let separator: String = ctx.arg(0)?;
            let joined = join_values(&separator, &ctx.args()[1..]);
            ctx.set_return(joined)
        });
    Ok(())
}
