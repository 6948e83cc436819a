use lsp_types::{Position, Range};

/// Whether `position` falls inside `range`, boundaries included.
///
/// The line and character windows are checked independently: the position's
/// line must lie in `[start.line, end.line]` and its character in
/// `[start.character, end.character]`. Both ends count as inside, so a cursor
/// sitting exactly on an element's opening `<` or just past its closing `>`
/// still matches. For multi-line ranges the character window applies on every
/// line, so interior-line positions whose column falls outside the window are
/// not contained.
pub fn contains(position: Position, range: Range) -> bool {
    let line_within = position.line >= range.start.line && position.line <= range.end.line;
    let character_within =
        position.character >= range.start.character && position.character <= range.end.character;
    line_within && character_within
}
