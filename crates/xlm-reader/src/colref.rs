//! Shared A1-style cell reference helpers.

/// Splits `"AB12"` into `(column_index_1_based, row_index_1_based)`.
pub fn split_cell_ref(cell: &str) -> Option<(u32, u32)> {
    let col_len = cell.chars().take_while(|c| c.is_ascii_alphabetic()).count();
    if col_len == 0 || col_len == cell.len() {
        return None;
    }
    let (col_part, row_part) = cell.split_at(col_len);
    let row: u32 = row_part.parse().ok()?;
    Some((column_letters_to_index(col_part), row))
}

pub fn column_letters_to_index(letters: &str) -> u32 {
    let mut col: u32 = 0;
    for c in letters.chars() {
        col = col * 26 + (c.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
    }
    col
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_simple_refs() {
        assert_eq!(split_cell_ref("A1"), Some((1, 1)));
        assert_eq!(split_cell_ref("Z1"), Some((26, 1)));
        assert_eq!(split_cell_ref("AA1"), Some((27, 1)));
    }
}
