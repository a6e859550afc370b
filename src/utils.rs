/// Calculates the 1-based line and column number for a given byte position in the source text.
/// Columns count characters, not bytes. Only called when an error is reported.
pub fn get_line_and_column(source: &str, position: usize) -> (usize, usize) {
    let mut line = 1;
    let mut column = 1;
    for (i, c) in source.char_indices() {
        if i >= position {
            break;
        }
        if c == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }
    (line, column)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_and_column() {
        let source = "{\n  a: 1,\n  b: £2\n}";
        assert_eq!(get_line_and_column(source, 0), (1, 1));
        assert_eq!(get_line_and_column(source, 4), (2, 3));
        // `}` comes after the two-byte `£`.
        assert_eq!(get_line_and_column(source, source.len() - 1), (4, 1));
        assert_eq!(get_line_and_column(source, 17), (3, 7));
        assert_eq!(get_line_and_column(source, source.len()), (4, 2));
    }
}
