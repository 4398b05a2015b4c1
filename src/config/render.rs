use std::path::Path;

use super::{ConfigError, ConfigurationBindings};

/// Substitute `${KEY}` and `${KEY:default}` placeholders from `bindings`.
/// `$$` emits a literal `$`.
pub fn render_template(
    template_path: &Path,
    template: &str,
    bindings: &ConfigurationBindings,
) -> Result<String, ConfigError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        if let Some(after) = tail.strip_prefix("$$") {
            out.push('$');
            rest = after;
            continue;
        }
        let Some(body_start) = tail.strip_prefix("${") else {
            out.push('$');
            rest = &tail[1..];
            continue;
        };
        let Some(end) = body_start.find('}') else {
            return Err(ConfigError::Render {
                path: template_path.to_path_buf(),
                message: "unterminated placeholder".to_string(),
            });
        };
        let body = &body_start[..end];
        let (key, default) = match body.split_once(':') {
            Some((k, d)) => (k, Some(d)),
            None => (body, None),
        };
        match (bindings.get(key), default) {
            (Some(v), _) => out.push_str(v),
            (None, Some(d)) => out.push_str(d),
            (None, None) => {
                return Err(ConfigError::Render {
                    path: template_path.to_path_buf(),
                    message: format!("no binding for ${{{key}}}"),
                })
            }
        }
        rest = &body_start[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Rendered subsystem files are YAML; refuse to hand a subsystem something it cannot parse.
pub fn check_yaml(output_path: &Path, rendered: &str) -> Result<(), ConfigError> {
    serde_yaml::from_str::<serde_yaml::Value>(rendered)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidYaml {
            path: output_path.to_path_buf(),
            message: e.to_string(),
        })
}
