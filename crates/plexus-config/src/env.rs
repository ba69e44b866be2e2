use std::sync::OnceLock;

use regex::Regex;

/// Expand `{{ env.VAR }}` placeholders in a raw TOML string
///
/// An optional fallback is supported via `{{ env.VAR | default("value") }}`.
/// Expansion runs on the raw text before deserialization so config structs
/// stay plain `String`/`SecretString`. Comment lines pass through unchanged.
pub fn expand_env(input: &str) -> Result<String, String> {
    fn re() -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        RE.get_or_init(|| {
            Regex::new(r#"\{\{\s*([a-zA-Z0-9_.]+)\s*(?:\|\s*default\("([^"]*)"\))?\s*\}\}"#)
                .expect("must be valid regex")
        })
    }

    let mut output = String::with_capacity(input.len());

    for (i, line) in input.lines().enumerate() {
        if i > 0 {
            output.push('\n');
        }
        if line.trim_start().starts_with('#') {
            output.push_str(line);
            continue;
        }

        let mut result = String::with_capacity(line.len());
        let mut last_end = 0;

        for captures in re().captures_iter(line) {
            let overall = captures.get(0).expect("capture 0 always present");
            let key = captures.get(1).expect("key group").as_str();
            let fallback = captures.get(2).map(|m| m.as_str());

            result.push_str(&line[last_end..overall.start()]);

            let Some(var_name) = key.strip_prefix("env.").filter(|v| !v.contains('.')) else {
                return Err(format!("only variables scoped with 'env.' are supported: `{key}`"));
            };

            match std::env::var(var_name) {
                Ok(value) => result.push_str(&value),
                Err(_) => match fallback {
                    Some(value) => result.push_str(value),
                    None => return Err(format!("environment variable not found: `{var_name}`")),
                },
            }

            last_end = overall.end();
        }

        result.push_str(&line[last_end..]);
        output.push_str(&result);
    }

    if input.ends_with('\n') {
        output.push('\n');
    }

    Ok(output)
}
