use crate::RenderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Piece<'a> {
    Literal(&'a str),
    /// `{{` or `}}`
    Brace(char),
    Field(&'a str),
}

/// A parsed body template.
///
/// `{name}` is a placeholder, `{{` and `}}` are literal braces. Anything
/// else involving braces is rejected at parse time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template<'a> {
    pieces: Vec<Piece<'a>>,
}

impl<'a> Template<'a> {
    pub fn parse(text: &'a str) -> Result<Self, RenderError> {
        let bytes = text.as_bytes();
        let mut pieces = Vec::new();
        let mut start = 0;
        let mut i = 0;

        while i < bytes.len() {
            match bytes[i] {
                b @ (b'{' | b'}') if bytes.get(i + 1) == Some(&b) => {
                    push_literal(&mut pieces, &text[start..i]);
                    pieces.push(Piece::Brace(b as char));
                    i += 2;
                    start = i;
                }
                b'{' => {
                    push_literal(&mut pieces, &text[start..i]);
                    let close = text[i + 1..].find(['{', '}']).map(|off| i + 1 + off);
                    let close = match close {
                        Some(c) if bytes[c] == b'}' => c,
                        _ => {
                            return Err(RenderError::MalformedTemplate {
                                position: i,
                                reason: "unclosed '{'",
                            });
                        }
                    };
                    let name = &text[i + 1..close];
                    if name.is_empty() {
                        return Err(RenderError::MalformedTemplate {
                            position: i,
                            reason: "empty placeholder",
                        });
                    }
                    pieces.push(Piece::Field(name));
                    i = close + 1;
                    start = i;
                }
                b'}' => {
                    return Err(RenderError::MalformedTemplate {
                        position: i,
                        reason: "single '}' outside a placeholder",
                    });
                }
                _ => i += 1,
            }
        }
        push_literal(&mut pieces, &text[start..]);

        Ok(Self { pieces })
    }

    /// Placeholder names in order of appearance, duplicates included.
    pub fn fields(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.pieces.iter().filter_map(|p| match p {
            Piece::Field(name) => Some(*name),
            _ => None,
        })
    }

    /// Fill every placeholder from `lookup`.
    pub fn render<F>(&self, mut lookup: F) -> Result<String, RenderError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mut out = String::new();
        for piece in &self.pieces {
            match piece {
                Piece::Literal(s) => out.push_str(s),
                Piece::Brace(c) => out.push(*c),
                Piece::Field(name) => {
                    let value =
                        lookup(name).ok_or_else(|| RenderError::MissingField((*name).to_owned()))?;
                    out.push_str(&value);
                }
            }
        }
        Ok(out)
    }

    /// Fill every placeholder except those named in `keep`.
    ///
    /// The result is itself template text: kept placeholders stay as
    /// `{name}`, and literal braces (including any inside substituted
    /// values) stay escaped, so parsing and rendering it again fills only
    /// the kept placeholders.
    pub fn render_partial<F>(&self, mut lookup: F, keep: &[&str]) -> Result<String, RenderError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mut out = String::new();
        for piece in &self.pieces {
            match piece {
                Piece::Literal(s) => out.push_str(s),
                Piece::Brace(c) => {
                    out.push(*c);
                    out.push(*c);
                }
                Piece::Field(name) if keep.contains(name) => {
                    out.push('{');
                    out.push_str(name);
                    out.push('}');
                }
                Piece::Field(name) => {
                    let value =
                        lookup(name).ok_or_else(|| RenderError::MissingField((*name).to_owned()))?;
                    out.push_str(&escape(&value));
                }
            }
        }
        Ok(out)
    }
}

fn push_literal<'a>(pieces: &mut Vec<Piece<'a>>, s: &'a str) {
    if !s.is_empty() {
        pieces.push(Piece::Literal(s));
    }
}

fn escape(value: &str) -> String {
    value.replace('{', "{{").replace('}', "}}")
}

#[cfg(test)]
#[path = "template_tests.rs"]
mod tests;
