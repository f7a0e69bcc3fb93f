//! Parsing of `commit` arguments into package instructions.

use serde_json::Value;
use shared_types::PackageInstructions;

/// Parses `name=action` pairs, e.g. `hello=install vim=remove`.
///
/// A bare `name` means install. The action is kept as an opaque string; a
/// numeric action is kept as a number.
pub fn parse_instructions<I, S>(args: I) -> Result<PackageInstructions, String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut instructions = PackageInstructions::new();
    for arg in args {
        let arg = arg.as_ref();
        let (name, action) = match arg.split_once('=') {
            Some((name, action)) => (name.trim(), action.trim()),
            None => (arg.trim(), "install"),
        };
        if name.is_empty() || action.is_empty() {
            return Err(format!("invalid instruction {arg:?}, expected name=action"));
        }
        let value = action
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::from(action));
        instructions.insert(name.to_string(), value);
    }
    Ok(instructions)
}
