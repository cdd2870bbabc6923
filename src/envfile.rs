//! `.env` file parsing.
use std::{collections::HashMap, fs, io, path::Path};

/// Variables loaded from an env file.
pub type EnvVars = HashMap<String, String>;

/// Reads and parses the env file at `path`.
pub fn load_env_file(path: &Path) -> io::Result<EnvVars> {
    Ok(parse_env(&fs::read_to_string(path)?))
}

/// Parses `KEY=VALUE` lines. Blank lines, comments, lines without `=` and
/// empty keys are skipped; matching surrounding quotes are stripped.
pub fn parse_env(content: &str) -> EnvVars {
    let mut vars = HashMap::new();

    for line in content.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }

        vars.insert(key.to_string(), unquote(value.trim()).to_string());
    }

    vars
}

fn unquote(value: &str) -> &str {
    if value.len() >= 2 {
        for quote in ['"', '\''] {
            if value.starts_with(quote) && value.ends_with(quote) {
                return &value[1..value.len() - 1];
            }
        }
    }
    value
}
