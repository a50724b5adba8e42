//! Base-indent removal for embedded code.
//!
//! Authors indent code blocks to match the surrounding markup:
//!
//! ```text
//! <body>
//!     <?
//!         cvars.title = "About"
//!         print("<h1>", cvars.title, "</h1>")
//!     ?>
//! </body>
//! ```
//!
//! Before evaluation the indentation of the first non-blank line is removed
//! from every line that starts with it. Lines that don't share the prefix are
//! passed through unchanged.

/// Strip the base indent (leading whitespace of the first non-blank line)
/// from every line of `code`.
///
/// Lines are split on `\n` only, so a trailing newline and any `\r` stay
/// where they were.
pub fn strip_base_indent(code: &str) -> String {
    let base = base_indent(code);
    if base.is_empty() {
        return code.to_string();
    }
    code.split('\n')
        .map(|line| line.strip_prefix(base).unwrap_or(line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Leading whitespace of the first line containing a non-whitespace
/// character, or `""` when every line is blank.
pub fn base_indent(code: &str) -> &str {
    code.split('\n')
        .find(|line| !line.trim().is_empty())
        .map(|line| {
            let end = line
                .char_indices()
                .find(|(_, c)| !c.is_whitespace())
                .map(|(i, _)| i)
                .unwrap_or(line.len());
            &line[..end]
        })
        .unwrap_or("")
}
