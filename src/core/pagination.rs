/// A character window over a text payload. `next_start_index` is present
/// exactly when the payload extends past the window, so successive calls
/// with `start_index = 0, N, 2N, …` reassemble the payload byte-for-byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    pub text: String,
    pub total_chars: usize,
    pub next_start_index: Option<usize>,
}

/// Slice `text` by character offsets (not bytes — payloads are arbitrary
/// UTF-8). `max_chars == 0` yields an empty window with no continuation.
pub fn paginate(text: &str, start_index: usize, max_chars: usize) -> Window {
    let total_chars = text.chars().count();
    if max_chars == 0 || start_index >= total_chars {
        return Window {
            text: String::new(),
            total_chars,
            next_start_index: None,
        };
    }

    let window: String = text.chars().skip(start_index).take(max_chars).collect();
    let end = start_index + max_chars;
    Window {
        text: window,
        total_chars,
        next_start_index: if end < total_chars { Some(end) } else { None },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_fit_has_no_continuation() {
        let w = paginate("abcdef", 0, 6);
        assert_eq!(w.text, "abcdef");
        assert_eq!(w.next_start_index, None);
    }

    #[test]
    fn oversized_payload_yields_next_index() {
        let w = paginate("abcdef", 0, 4);
        assert_eq!(w.text, "abcd");
        assert_eq!(w.next_start_index, Some(4));
    }

    #[test]
    fn windows_concatenate_to_the_original() {
        let payload = "héllo wörld — ünïcode pagination test ✓".repeat(7);
        let mut start = 0;
        let mut rebuilt = String::new();
        loop {
            let w = paginate(&payload, start, 13);
            rebuilt.push_str(&w.text);
            match w.next_start_index {
                Some(next) => start = next,
                None => break,
            }
        }
        assert_eq!(rebuilt, payload);
    }

    #[test]
    fn start_past_end_is_empty() {
        let w = paginate("abc", 10, 5);
        assert_eq!(w.text, "");
        assert_eq!(w.next_start_index, None);
        assert_eq!(w.total_chars, 3);
    }
}
