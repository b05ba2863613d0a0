pub fn truncate_string(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut truncated = String::new();
    for ch in text.chars() {
        if truncated.len() + ch.len_utf8() > max_bytes {
            break;
        }
        truncated.push(ch);
    }
    truncated
}

#[cfg(test)]
mod tests {
    use super::truncate_string;

    #[test]
    fn truncates_on_character_boundaries() {
        assert_eq!(truncate_string("abcdef", 4), "abcd");
        assert_eq!(truncate_string("short", 10), "short");
        // Multibyte characters are never split.
        assert_eq!(truncate_string("한국어", 4), "한");
    }
}
