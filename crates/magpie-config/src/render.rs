//! Text forms of a configuration record.
//!
//! The JS form is the `export default { ... };` module the browser runtime
//! imports. It is read back as a YAML flow mapping, which is why strings
//! are emitted single-quoted only when they hold no quote or backslash.

use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use tracing::debug;

use crate::record::ConfigurationRecord;
use crate::schema::{check_document, RECORD_SCHEMA};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Format {
    Js,
    Json,
    Yaml,
}

impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Js => "js",
            Self::Json => "json",
            Self::Yaml => "yaml",
        }
    }

    /// Picks a format from a file extension (`.js`, `.mjs`, `.json`, `.yaml`, `.yml`).
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("js") | Some("mjs") => Ok(Self::Js),
            Some("json") => Ok(Self::Json),
            Some("yaml") | Some("yml") => Ok(Self::Yaml),
            _ => Err(anyhow!(
                "cannot infer config format from extension: {}",
                path.display()
            )),
        }
    }
}

pub fn render(record: &ConfigurationRecord, format: Format) -> Result<String> {
    match format {
        Format::Js => Ok(render_js(record)),
        Format::Json => {
            let mut out = serde_json::to_string_pretty(record)?;
            out.push('\n');
            Ok(out)
        }
        Format::Yaml => Ok(serde_yaml::to_string(record)?),
    }
}

fn render_js(record: &ConfigurationRecord) -> String {
    let entries = [
        ("experimentId", record.experiment_id()),
        ("serverUrl", record.server_url()),
        ("socketUrl", record.socket_url()),
        ("completionUrl", record.completion_url()),
        ("contactEmail", record.contact_email()),
        ("mode", record.mode().as_str()),
        ("language", record.language()),
    ];
    let mut out = String::from("export default {\n");
    for (key, value) in entries {
        out.push_str(&format!("  {}: {},\n", key, js_string(value)));
    }
    out.push_str("  stimuli: {\n");
    out.push_str(&format!("    main: {}\n", js_string(record.stimuli_main())));
    out.push_str("  }\n};\n");
    out
}

fn js_string(value: &str) -> String {
    if value
        .chars()
        .any(|c| c == '\'' || c == '\\' || c.is_control())
    {
        double_quoted(value)
    } else {
        format!("'{}'", value)
    }
}

/// Double-quoted form with every control character as `\uXXXX`, which JS and
/// YAML decode identically.
fn double_quoted(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Drops `//` and `/* */` comments that sit outside string literals.
fn strip_js_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut quote: Option<char> = None;
    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            out.push(c);
            if c == '\\' && q == '"' {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            } else if c == q {
                quote = None;
            }
            continue;
        }
        let next = chars.peek().copied();
        match (c, next) {
            ('/', Some('/')) => {
                while let Some(&next) = chars.peek() {
                    if next == '\n' {
                        break;
                    }
                    chars.next();
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut prev = '\0';
                for next in chars.by_ref() {
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
                out.push(' ');
            }
            ('\'', _) | ('"', _) => {
                quote = Some(c);
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

/// Parses the `export default { ... };` module text, comments included.
pub fn from_js_module(text: &str) -> Result<ConfigurationRecord> {
    let stripped = strip_js_comments(text);
    let body = stripped.trim();
    let body = body
        .strip_prefix("export default")
        .or_else(|| body.strip_prefix("module.exports ="))
        .ok_or_else(|| anyhow!("config module must start with `export default`"))?;
    let body = body.trim();
    let body = body.strip_suffix(';').unwrap_or(body).trim_end();
    if !body.starts_with('{') || !body.ends_with('}') {
        return Err(anyhow!("config module must export an object literal"));
    }
    let value: serde_yaml::Value =
        serde_yaml::from_str(body).context("failed to parse config module object")?;
    record_from_document(serde_json::to_value(value)?, "config module")
}

/// Parses text in the given format, schema-checks and validates it.
pub fn parse_record(text: &str, format: Format) -> Result<ConfigurationRecord> {
    match format {
        Format::Js => from_js_module(text),
        Format::Json | Format::Yaml => record_from_document(
            document_from_text(text, format)?,
            &format!("{} document", format.as_str()),
        ),
    }
}

/// Reads JSON or YAML text into an untyped document.
pub fn document_from_text(text: &str, format: Format) -> Result<Value> {
    match format {
        Format::Json => Ok(serde_json::from_str(text)?),
        Format::Yaml => {
            let value: serde_yaml::Value = serde_yaml::from_str(text)?;
            Ok(serde_json::to_value(value)?)
        }
        Format::Js => Err(anyhow!("expected a json or yaml document")),
    }
}

pub fn load_record(path: &Path) -> Result<ConfigurationRecord> {
    let format = Format::from_path(path)?;
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config from {}", path.display()))?;
    let record = parse_record(&text, format)
        .with_context(|| format!("failed to load config from {}", path.display()))?;
    debug!(
        path = %path.display(),
        experiment_id = record.experiment_id(),
        mode = %record.mode(),
        "loaded configuration record"
    );
    Ok(record)
}

pub fn write_record(record: &ConfigurationRecord, format: Format, out: &Path) -> Result<()> {
    if let Some(parent) = out.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
    }
    let text = render(record, format)?;
    fs::write(out, text).with_context(|| format!("failed to write config to {}", out.display()))
}

/// Schema-checks an untyped document, then deserializes and validates it.
pub fn record_from_document(document: Value, origin: &str) -> Result<ConfigurationRecord> {
    check_document(RECORD_SCHEMA, &document, origin)?;
    let record: ConfigurationRecord = serde_json::from_value(document)?;
    record.validate()?;
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::Mode;
    use crate::profiles::ProfileSet;

    const ORIGINAL_MODULE: &str = "export default {
  experimentId: '43',
  serverUrl: 'https://magpie-cogsciprag.fly.dev',
  socketUrl: 'wss://magpie-cogsciprag.fly.dev/socket',
  completionUrl: 'https://...',
  contactEmail: 'exprag@gmail.com',
  mode: 'directLink',
  language: 'en',
  stimuli: {
    main: 'stimuli/vignettes.csv'
  }
};
";

    fn temp_root(label: &str) -> std::path::PathBuf {
        let root = std::env::temp_dir().join(format!(
            "magpie_{}_{}_{}",
            label,
            std::process::id(),
            chrono::Utc::now().timestamp_micros()
        ));
        fs::create_dir_all(&root).expect("temp dir");
        root
    }

    #[test]
    fn parses_hand_written_module() {
        let record = from_js_module(ORIGINAL_MODULE).expect("parse module");
        assert_eq!(record.experiment_id(), "43");
        assert_eq!(record.mode(), Mode::DirectLink);
        assert_eq!(record.socket_url(), "wss://magpie-cogsciprag.fly.dev/socket");
        assert_eq!(record.stimuli_main(), "stimuli/vignettes.csv");
    }

    #[test]
    fn js_render_matches_hand_written_layout() {
        let record = from_js_module(ORIGINAL_MODULE).expect("parse module");
        assert_eq!(render(&record, Format::Js).expect("render"), ORIGINAL_MODULE);
    }

    #[test]
    fn every_format_round_trips_builtin_profiles() {
        let profiles = ProfileSet::builtin();
        for (name, record) in profiles.iter() {
            for format in [Format::Js, Format::Json, Format::Yaml] {
                let text = render(record, format).expect("render");
                let parsed = parse_record(&text, format)
                    .unwrap_or_else(|e| panic!("{} as {}: {}", name, format.as_str(), e));
                assert_eq!(&parsed, record, "{} as {}", name, format.as_str());
            }
        }
    }

    #[test]
    fn quotes_and_backslashes_survive_js_round_trip() {
        let record = ConfigurationRecord::builder()
            .experiment_id("it's \\ 9")
            .server_url("https://magpie-cogsciprag.fly.dev")
            .completion_url("https://app.prolific.co/submissions/complete?cc=ABC")
            .contact_email("O'Brien <exprag@gmail.com>")
            .mode(Mode::Debug)
            .language("en")
            .stimuli_main("stimuli/vignettes.csv")
            .build()
            .expect("build");
        let text = render(&record, Format::Js).expect("render");
        assert!(text.contains("experimentId: \"it's \\\\ 9\""), "{}", text);
        assert_eq!(from_js_module(&text).expect("parse"), record);
    }

    #[test]
    fn control_characters_survive_js_round_trip() {
        for id in ["a\u{7f}b", "a\u{85}b", "tab\there", "line\nbreak"] {
            let record = ConfigurationRecord::builder()
                .experiment_id(id)
                .server_url("https://magpie-cogsciprag.fly.dev")
                .completion_url("https://...")
                .contact_email("exprag@gmail.com")
                .mode(Mode::Debug)
                .language("en")
                .stimuli_main("stimuli/vignettes.csv")
                .build()
                .expect("build");
            let text = render(&record, Format::Js).expect("render");
            assert!(
                !text.chars().any(|ch| ch.is_control() && ch != '\n'),
                "raw control character in {:?}",
                text
            );
            let parsed = from_js_module(&text).unwrap_or_else(|e| panic!("{:?}: {}", id, e));
            assert_eq!(parsed, record, "{:?}", id);
        }
    }

    #[test]
    fn comments_outside_strings_are_ignored() {
        let text = ORIGINAL_MODULE
            .replace(
                "  mode: 'directLink',",
                "  // participant link\n  mode: 'directLink', /* was 'debug' */",
            )
            .replace("export default {", "// deployed config\nexport default { /* magpie */");
        let record = from_js_module(&text).expect("parse commented module");
        assert_eq!(record, from_js_module(ORIGINAL_MODULE).expect("parse"));
        assert_eq!(record.server_url(), "https://magpie-cogsciprag.fly.dev");
    }

    #[test]
    fn comment_markers_inside_strings_are_kept() {
        let text = ORIGINAL_MODULE.replace(
            "'https://...'",
            "\"https://example.org/done?x=/*a*/&y=//b\"",
        );
        let record = from_js_module(&text).expect("parse");
        assert_eq!(record.completion_url(), "https://example.org/done?x=/*a*/&y=//b");
    }

    #[test]
    fn module_without_export_is_rejected() {
        let err = from_js_module("const config = {};").expect_err("should fail");
        assert!(err.to_string().contains("export default"), "{}", err);
        assert!(from_js_module("export default 42;").is_err());
    }

    #[test]
    fn module_with_unknown_mode_is_rejected() {
        let text = ORIGINAL_MODULE.replace("'directLink'", "'prolific'");
        let err = from_js_module(&text).expect_err("should fail");
        assert!(format!("{:#}", err).contains("/mode"), "{:#}", err);
    }

    #[test]
    fn write_then_load_uses_extension_format() {
        let root = temp_root("render");
        let record = from_js_module(ORIGINAL_MODULE).expect("parse");
        for name in ["magpie.config.js", "config/magpie.json", "magpie.yml"] {
            let path = root.join(name);
            let format = Format::from_path(&path).expect("format");
            write_record(&record, format, &path).expect("write");
            assert_eq!(load_record(&path).expect("load"), record, "{}", name);
        }
        assert!(Format::from_path(Path::new("magpie.toml")).is_err());
        let _ = fs::remove_dir_all(root);
    }
}
