use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref ALNUM_RUN: Regex = Regex::new(r"[a-zA-Z0-9]+").expect("valid task name pattern");
}

/// Derive the scheduler job name for a one-off command.
///
/// Only ASCII letters and digits from the command survive, so flags,
/// redirections and path separators never reach the scheduler. Identical
/// (app, env, command) tuples always produce the same name.
pub fn derive_task_name(app: &str, env: &str, command: &str) -> String {
    let mut parts = vec![app.to_string(), env.to_string()];
    for token in command.split_whitespace() {
        parts.extend(ALNUM_RUN.find_iter(token).map(|m| m.as_str().to_lowercase()));
    }
    parts.join("-")
}
