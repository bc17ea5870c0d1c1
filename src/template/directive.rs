//! Directive parser
//!
//! The text between `${` and `}` is classified once into a [`Directive`],
//! which the interpreter then evaluates exhaustively.
//!
//! ```text
//! ${name}                      plain substitution
//! ${html:name}                 newlines become <br>
//! ${list:name}                 numbered <option> list
//! ${liststr:name}              <option> list valued by the item text
//! ${listid:default:name}       numbered list, `default` selects an entry
//! ${checked:name}              "checked" when non-empty
//! ${file-exists:path:text}     text when <install>/path exists
//! ${do:command:arg}            control action, no output
//! ${test:name:a:b:...}         alternative picked by the value of name
//! ${ztest:name:a:b:...}        same, absent/empty counts as 0
//! ${/* ... */}                 comment
//! ```
//!
//! Prefixes are matched case-insensitively; `do:` sub-command names are
//! matched exactly.

use super::escape::OutputMode;

/// How a substituted value is laid out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueFormat {
    /// Escaped according to the output mode
    Plain,
    /// HTML-escaped, newlines rendered as `<br>`
    Html,
    /// `<option value=N>` per line, numbered from 1
    NumberedList,
    /// `<option value="item">` per line
    StringList,
    /// `checked` iff the value is non-empty
    Checked,
}

/// Control action performed by `${do:...}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Control<'a> {
    /// `output-mode:<html|inifile|html-urlescaped>`
    OutputMode(OutputMode),
    /// `if-file-exists:<path>` relative to the installation directory
    IfFileExists(&'a str),
    /// `if-file-do-not-exists:<path>` relative to the installation directory
    IfFileNotExists(&'a str),
    /// `if-project-file-exists:<path>` relative to the project directory
    IfProjectFileExists(&'a str),
    /// `if-not-empty:<key>`
    IfNotEmpty(&'a str),
    /// `if-empty:<key>`
    IfEmpty(&'a str),
    /// `end-if`
    EndIf,
    /// `loadhash`: recompute `winprofile` and `wincateg`
    LoadHash,
    /// `copy:<src>:<dst>`: move a value between keys
    Copy {
        /// Source key, cleared after the copy
        from: &'a str,
        /// Destination key
        to: &'a str,
    },
    /// `set:<key>:<value>` or `set:<key>` to clear
    Set {
        /// Key to write
        key: &'a str,
        /// New value, `None` removes the key
        value: Option<&'a str>,
    },
    /// Anything else is ignored
    Unknown(&'a str),
}

/// A parsed `${...}` span
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive<'a> {
    /// `${/* ... */}`
    Comment,
    /// Variable substitution
    Value {
        /// Variable or catalog name
        name: &'a str,
        /// Layout of the value
        format: ValueFormat,
        /// StateStore key holding the preselected list entry (`listid:`)
        selected_from: Option<&'a str>,
    },
    /// `${file-exists:path:text}`
    FileExists {
        /// Path relative to the installation directory
        path: &'a str,
        /// Text emitted when the file exists
        text: &'a str,
    },
    /// `${do:...}`
    Control(Control<'a>),
    /// `${test:...}` or `${ztest:...}`
    Test {
        /// StateStore key selecting the alternative
        name: &'a str,
        /// Colon-separated alternatives, index 0 first
        alternatives: Vec<&'a str>,
        /// `ztest`: absent or empty selects index 0 instead of nothing
        zero_default: bool,
    },
}

impl<'a> Directive<'a> {
    /// Classify the body of a `${...}` span
    pub fn parse(body: &'a str) -> Self {
        if body.starts_with("/*") {
            return Directive::Comment;
        }
        if let Some(rest) = strip_prefix_ci(body, "html:") {
            return Directive::value(rest, ValueFormat::Html);
        }
        if let Some(rest) = strip_prefix_ci(body, "list:") {
            return Directive::value(rest, ValueFormat::NumberedList);
        }
        if let Some(rest) = strip_prefix_ci(body, "liststr:") {
            return Directive::value(rest, ValueFormat::StringList);
        }
        if let Some(rest) = strip_prefix_ci(body, "file-exists:") {
            let (path, text) = match rest.split_once(':') {
                Some((path, text)) => (path, text),
                None => (rest, ""),
            };
            return Directive::FileExists { path, text };
        }
        if let Some(rest) = strip_prefix_ci(body, "do:") {
            return Directive::Control(parse_control(rest));
        }
        if let Some(rest) = strip_prefix_ci(body, "test:") {
            return parse_test(rest, false);
        }
        if let Some(rest) = strip_prefix_ci(body, "ztest:") {
            return parse_test(rest, true);
        }
        if let Some(rest) = strip_prefix_ci(body, "listid:") {
            return match rest.split_once(':') {
                Some((key, name)) if !key.is_empty() => Directive::Value {
                    name,
                    format: ValueFormat::NumberedList,
                    selected_from: Some(key),
                },
                _ => Directive::value(rest, ValueFormat::NumberedList),
            };
        }
        if let Some(rest) = strip_prefix_ci(body, "checked:") {
            return Directive::value(rest, ValueFormat::Checked);
        }
        Directive::value(body, ValueFormat::Plain)
    }

    fn value(name: &'a str, format: ValueFormat) -> Self {
        Directive::Value {
            name,
            format,
            selected_from: None,
        }
    }
}

fn parse_control(rest: &str) -> Control<'_> {
    let (command, arg) = rest.split_once(':').unwrap_or((rest, ""));
    match command {
        "output-mode" => Control::OutputMode(OutputMode::from_name(arg)),
        "if-file-exists" => Control::IfFileExists(arg),
        "if-file-do-not-exists" => Control::IfFileNotExists(arg),
        "if-project-file-exists" => Control::IfProjectFileExists(arg),
        "if-not-empty" => Control::IfNotEmpty(arg),
        "if-empty" => Control::IfEmpty(arg),
        "end-if" => Control::EndIf,
        "loadhash" => Control::LoadHash,
        "copy" => match arg.split_once(':') {
            Some((from, to)) if !from.is_empty() && !to.is_empty() => Control::Copy { from, to },
            _ => Control::Unknown(rest),
        },
        "set" if !arg.is_empty() => match arg.split_once(':') {
            Some((key, value)) => Control::Set {
                key,
                value: Some(value),
            },
            None => Control::Set {
                key: arg,
                value: None,
            },
        },
        _ => Control::Unknown(rest),
    }
}

fn parse_test(rest: &str, zero_default: bool) -> Directive<'_> {
    let (name, alternatives) = match rest.split_once(':') {
        Some((name, alts)) => (name, alts.split(':').collect()),
        None => (rest, Vec::new()),
    };
    Directive::Test {
        name,
        alternatives,
        zero_default,
    }
}

/// Case-insensitive ASCII prefix strip
pub(crate) fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    if s.len() >= prefix.len()
        && s.is_char_boundary(prefix.len())
        && s[..prefix.len()].eq_ignore_ascii_case(prefix)
    {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_and_prefixed_values() {
        assert_eq!(
            Directive::parse("projname"),
            Directive::Value {
                name: "projname",
                format: ValueFormat::Plain,
                selected_from: None
            }
        );
        assert_eq!(
            Directive::parse("HTML:info"),
            Directive::Value {
                name: "info",
                format: ValueFormat::Html,
                selected_from: None
            }
        );
        assert_eq!(
            Directive::parse("liststr:wincateg"),
            Directive::Value {
                name: "wincateg",
                format: ValueFormat::StringList,
                selected_from: None
            }
        );
        assert_eq!(
            Directive::parse("checked:cookies"),
            Directive::Value {
                name: "cookies",
                format: ValueFormat::Checked,
                selected_from: None
            }
        );
    }

    #[test]
    fn test_listid() {
        assert_eq!(
            Directive::parse("listid:lang:#iso"),
            Directive::Value {
                name: "#iso",
                format: ValueFormat::NumberedList,
                selected_from: Some("lang")
            }
        );
    }

    #[test]
    fn test_comment() {
        assert_eq!(Directive::parse("/* note */"), Directive::Comment);
    }

    #[test]
    fn test_file_exists() {
        assert_eq!(
            Directive::parse("file-exists:html/logo.gif:<img src=logo.gif>"),
            Directive::FileExists {
                path: "html/logo.gif",
                text: "<img src=logo.gif>"
            }
        );
    }

    #[test]
    fn test_control_directives() {
        assert_eq!(
            Directive::parse("do:output-mode:inifile"),
            Directive::Control(Control::OutputMode(OutputMode::IniFile))
        );
        assert_eq!(Directive::parse("do:end-if"), Directive::Control(Control::EndIf));
        assert_eq!(
            Directive::parse("do:if-not-empty:error"),
            Directive::Control(Control::IfNotEmpty("error"))
        );
        assert_eq!(
            Directive::parse("do:copy:a:b"),
            Directive::Control(Control::Copy { from: "a", to: "b" })
        );
        assert_eq!(
            Directive::parse("do:copy:a:"),
            Directive::Control(Control::Unknown("copy:a:"))
        );
        assert_eq!(
            Directive::parse("do:set:x:1:2"),
            Directive::Control(Control::Set {
                key: "x",
                value: Some("1:2")
            })
        );
        assert_eq!(
            Directive::parse("do:set:x"),
            Directive::Control(Control::Set { key: "x", value: None })
        );
    }

    #[test]
    fn test_test_directives() {
        assert_eq!(
            Directive::parse("test:level:low:mid:high"),
            Directive::Test {
                name: "level",
                alternatives: vec!["low", "mid", "high"],
                zero_default: false
            }
        );
        assert_eq!(
            Directive::parse("ztest:level:low"),
            Directive::Test {
                name: "level",
                alternatives: vec!["low"],
                zero_default: true
            }
        );
        assert_eq!(
            Directive::parse("test:level"),
            Directive::Test {
                name: "level",
                alternatives: vec![],
                zero_default: false
            }
        );
    }
}
