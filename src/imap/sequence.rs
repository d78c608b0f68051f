//! IMAP sequence sets (`304,319:320`).

/// Upper bound on the number of values one set may expand to.
pub const MAX_SEQUENCE_SET_VALUES: usize = 10_000;

/// Expand a sequence set into its values, in the order written.
///
/// Ranges may be written in either direction (`5:3` is `5, 4, 3`). Returns
/// `None` for `*`, zero, anything that is not a number, or a set that would
/// exceed [`MAX_SEQUENCE_SET_VALUES`].
pub fn expand_sequence_set(set: &str) -> Option<Vec<u64>> {
    let mut values = Vec::new();

    for element in set.split(',') {
        match element.split_once(':') {
            Some((first, last)) => {
                let first = parse_number(first)?;
                let last = parse_number(last)?;
                let count = first.abs_diff(last) as usize + 1;
                if values.len() + count > MAX_SEQUENCE_SET_VALUES {
                    return None;
                }
                if first <= last {
                    values.extend(first..=last);
                } else {
                    values.extend((last..=first).rev());
                }
            }
            None => {
                if values.len() == MAX_SEQUENCE_SET_VALUES {
                    return None;
                }
                values.push(parse_number(element)?);
            }
        }
    }

    Some(values)
}

/// A non-zero `nz-number`.
fn parse_number(text: &str) -> Option<u64> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok().filter(|&n| n != 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_mixed_set() {
        assert_eq!(expand_sequence_set("304,319:320"), Some(vec![304, 319, 320]));
        assert_eq!(expand_sequence_set("3956:3958"), Some(vec![3956, 3957, 3958]));
        assert_eq!(expand_sequence_set("7"), Some(vec![7]));
    }

    #[test]
    fn test_descending_range() {
        assert_eq!(expand_sequence_set("5:3"), Some(vec![5, 4, 3]));
    }

    #[test]
    fn test_invalid_sets() {
        for set in ["", "*", "1:*", "0", "0:3", "1,,2", "a", "1:2:3", "-1", "+4"] {
            assert_eq!(expand_sequence_set(set), None, "{set}");
        }
    }

    #[test]
    fn test_value_limit() {
        assert_eq!(
            expand_sequence_set("1:10000").map(|v| v.len()),
            Some(MAX_SEQUENCE_SET_VALUES)
        );
        assert_eq!(expand_sequence_set("1:10001"), None);
        assert_eq!(expand_sequence_set("1:10000,20000"), None);
        assert_eq!(expand_sequence_set("1:4294967295"), None);
    }
}
