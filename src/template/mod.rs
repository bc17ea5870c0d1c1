//! Template interpreter
//!
//! Templates are HTML files with embedded `${...}` directives, processed
//! line by line. Text outside directives is copied verbatim unless output is
//! suppressed by a failed conditional. Each line that produced output is
//! terminated with CRLF, unless the template line ends with a backslash.
//!
//! Names are resolved against the state store first and the language catalog
//! second. Unresolved names render as nothing; malformed directives render
//! as literal text. Rendering never fails once the template is read.

mod directive;
mod escape;

pub use directive::{Control, Directive, ValueFormat};
pub use escape::{escape_html, escape_value, OutputMode};

use crate::error::Result;
use crate::lang::{decode_text, LanguageCatalog};
use crate::project::scan_categories;
use crate::security::is_traversal;
use crate::state::{parse_leading_int, StateStore};
use directive::strip_prefix_ci;
use std::borrow::Cow;
use std::fs;
use std::path::Path;
use tracing::{debug, trace};

/// Longest directive body recognised
const MAX_DIRECTIVE_LEN: usize = 1024;

/// Marker selecting the language enumeration instead of a variable
const ISO_MARKER: &str = "#iso";

/// Everything a template can read or change while rendering
pub struct RenderContext<'a> {
    /// Shared variables; `do:` directives may modify them
    pub state: &'a mut StateStore,
    /// Localized strings
    pub catalog: &'a LanguageCatalog,
    /// Installation directory, root of `file-exists` and `if-file-*` paths
    pub install_dir: &'a Path,
    /// Current project directory, root of `if-project-file-exists` paths
    pub project_dir: Option<&'a Path>,
}

/// Render a template file
pub fn render_file(path: &Path, ctx: &mut RenderContext<'_>) -> Result<Vec<u8>> {
    let bytes = fs::read(path)?;
    debug!("Rendering template {:?}", path);
    Ok(render(&decode_text(&bytes), ctx))
}

/// Render template text
pub fn render(template: &str, ctx: &mut RenderContext<'_>) -> Vec<u8> {
    let mut interpreter = Interpreter {
        ctx,
        mode: OutputMode::Raw,
        out: Vec::with_capacity(template.len()),
    };
    for line in template.lines() {
        interpreter.line(line);
    }
    interpreter.out
}

struct Interpreter<'c, 'a> {
    ctx: &'c mut RenderContext<'a>,
    mode: OutputMode,
    out: Vec<u8>,
}

impl Interpreter<'_, '_> {
    fn line(&mut self, line: &str) {
        let start = self.out.len();
        let (line, keep_eol) = match line.strip_suffix('\\') {
            Some(stripped) => (stripped, false),
            None => (line, true),
        };

        let mut rest = line;
        while let Some(open) = rest.find("${") {
            self.literal(&rest[..open]);
            let after = &rest[open + 2..];
            match after.find('}') {
                Some(len) if len > 0 && len < MAX_DIRECTIVE_LEN => {
                    self.directive(Directive::parse(&after[..len]));
                    rest = &after[len + 1..];
                }
                _ => {
                    self.literal("${");
                    rest = after;
                }
            }
        }
        self.literal(rest);

        if keep_eol && self.out.len() != start {
            self.out.extend_from_slice(b"\r\n");
        }
    }

    fn literal(&mut self, text: &str) {
        if !self.mode.is_suppressed() {
            self.out.extend_from_slice(text.as_bytes());
        }
    }

    fn directive(&mut self, directive: Directive<'_>) {
        trace!("directive {:?} in mode {}", directive, self.mode);
        match directive {
            Directive::Comment => {}
            Directive::Control(control) => self.control(control),
            _ if self.mode.is_suppressed() => {}
            Directive::Value {
                name,
                format,
                selected_from,
            } => {
                let value = resolve(self.ctx, name);
                let selected = selected_from.and_then(|key| self.ctx.state.read_int(key));
                emit_value(&value, format, selected, self.mode, &mut self.out);
            }
            Directive::FileExists { path, text } => {
                if !text.is_empty() && file_exists(self.ctx.install_dir, path) {
                    escape_value(text, self.mode, &mut self.out);
                }
            }
            Directive::Test {
                name,
                alternatives,
                zero_default,
            } => self.test(name, &alternatives, zero_default),
        }
    }

    fn control(&mut self, control: Control<'_>) {
        // inside a failed conditional only end-if is honoured
        if self.mode.is_suppressed() && control != Control::EndIf {
            return;
        }
        match control {
            Control::OutputMode(mode) => self.mode = mode,
            Control::IfFileExists(path) => {
                if !file_exists(self.ctx.install_dir, path) {
                    self.mode = OutputMode::Suppressed;
                }
            }
            Control::IfFileNotExists(path) => {
                if file_exists(self.ctx.install_dir, path) {
                    self.mode = OutputMode::Suppressed;
                }
            }
            Control::IfProjectFileExists(path) => {
                let exists = self
                    .ctx
                    .project_dir
                    .is_some_and(|dir| file_exists(dir, path));
                if !exists {
                    self.mode = OutputMode::Suppressed;
                }
            }
            Control::IfNotEmpty(key) => {
                if self.ctx.state.is_empty_value(key) {
                    self.mode = OutputMode::Suppressed;
                }
            }
            Control::IfEmpty(key) => {
                if !self.ctx.state.is_empty_value(key) {
                    self.mode = OutputMode::Suppressed;
                }
            }
            Control::EndIf => self.mode = OutputMode::Raw,
            Control::LoadHash => self.load_hash(),
            Control::Copy { from, to } => {
                if let Some(value) = self.ctx.state.take(from) {
                    self.ctx.state.set(to, value);
                }
            }
            Control::Set { key, value } => self.ctx.state.write(key, value),
            Control::Unknown(command) => debug!("Ignoring unknown template command '{}'", command),
        }
    }

    /// Recompute `winprofile` and `wincateg` from the websites directory
    fn load_hash(&mut self) {
        let Some(path) = self.ctx.state.read("path").map(str::to_string) else {
            return;
        };
        let path = match path.strip_suffix('/') {
            Some(trimmed) if !trimmed.is_empty() => {
                self.ctx.state.set("path", trimmed);
                trimmed.to_string()
            }
            _ => path,
        };
        let found = scan_categories(Path::new(&path));
        self.ctx.state.set("winprofile", found.profiles);
        self.ctx.state.set("wincateg", found.categories);
    }

    fn test(&mut self, name: &str, alternatives: &[&str], zero_default: bool) {
        if alternatives.is_empty() {
            return;
        }
        let value = self.ctx.state.read(name).unwrap_or("");
        if value.is_empty() && !zero_default {
            return;
        }

        if alternatives.len() == 1 {
            escape_value(alternatives[0], self.mode, &mut self.out);
            return;
        }

        let index = parse_leading_int(value).or_else(|| strip_prefix_ci(value, "on").map(|_| 1));
        match index {
            Some(index) => {
                if let Some(choice) = usize::try_from(index).ok().and_then(|i| alternatives.get(i)) {
                    escape_html(choice, &mut self.out);
                }
            }
            None => escape_value(alternatives[0], self.mode, &mut self.out),
        }
    }
}

/// Value of `name`: the language ISO list for `...#iso`, else the state
/// store, else the catalog
fn resolve<'x>(ctx: &'x RenderContext<'_>, name: &str) -> Cow<'x, str> {
    if name.len() >= ISO_MARKER.len()
        && name.is_char_boundary(name.len() - ISO_MARKER.len())
        && name[name.len() - ISO_MARKER.len()..].eq_ignore_ascii_case(ISO_MARKER)
    {
        return Cow::Owned(ctx.catalog.enumerate_language_isos().join("\n"));
    }
    match ctx.state.read(name) {
        Some(value) => Cow::Borrowed(value),
        None => Cow::Borrowed(ctx.catalog.lookup(name)),
    }
}

/// Whether `<root>/<relative>` exists; paths containing `..` never do
fn file_exists(root: &Path, relative: &str) -> bool {
    if relative.is_empty() || is_traversal(relative) {
        return false;
    }
    root.join(relative.trim_start_matches('/')).exists()
}

fn emit_value(
    value: &str,
    format: ValueFormat,
    selected: Option<i64>,
    mode: OutputMode,
    out: &mut Vec<u8>,
) {
    match format {
        ValueFormat::Plain => escape_value(value, mode, out),
        ValueFormat::Checked => {
            if !value.is_empty() {
                out.extend_from_slice(b"checked");
            }
        }
        ValueFormat::Html => {
            for (i, line) in value.split('\n').enumerate() {
                if i > 0 {
                    out.extend_from_slice(b"<br>\r\n");
                }
                escape_html(&line.replace('\r', ""), out);
            }
        }
        ValueFormat::NumberedList => {
            if value.is_empty() {
                return;
            }
            for (i, item) in value.split('\n').enumerate() {
                let id = i as i64 + 1;
                if i > 0 {
                    out.extend_from_slice(b"</option>\r\n");
                }
                out.extend_from_slice(format!("<option value={}", id).as_bytes());
                if selected == Some(id) {
                    out.extend_from_slice(b" selected");
                }
                out.push(b'>');
                escape_html(&item.replace('\r', ""), out);
            }
            out.extend_from_slice(b"</option>");
        }
        ValueFormat::StringList => {
            if value.is_empty() {
                return;
            }
            for (i, item) in value.split('\n').enumerate() {
                if i > 0 {
                    out.extend_from_slice(b"\r\n");
                }
                let mut escaped = Vec::new();
                escape_html(&item.replace('\r', ""), &mut escaped);
                out.extend_from_slice(b"<option value=\"");
                out.extend_from_slice(&escaped);
                out.extend_from_slice(b"\">");
                out.extend_from_slice(&escaped);
                out.extend_from_slice(b"</option>");
            }
        }
    }
}
