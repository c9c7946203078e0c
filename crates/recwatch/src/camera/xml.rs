//! Namespace-agnostic extraction of leaf element text from small XML replies.
//!
//! Camera replies are tiny and flat, so a scan is enough; there is no DOM.

/// Text of every `<tag>` (or `<prefix:tag>`) leaf element, in document order.
pub fn all_element_text<'a>(xml: &'a str, tag: &str) -> Vec<&'a str> {
    let mut found = Vec::new();
    let mut cursor = 0;

    while let Some(pos) = xml[cursor..].find(tag) {
        let start = cursor + pos;
        let end = start + tag.len();
        cursor = end;

        if !is_open_tag_name(xml, start) {
            continue;
        }
        match xml[end..].chars().next() {
            Some('>') | Some('/') | Some(' ') | Some('\t') | Some('\r') | Some('\n') => {}
            _ => continue,
        }

        let Some(gt) = xml[end..].find('>') else {
            break;
        };
        let body_start = end + gt + 1;
        if xml[..body_start - 1].ends_with('/') {
            found.push("");
            continue;
        }
        let Some(close) = xml[body_start..].find("</") else {
            break;
        };
        found.push(xml[body_start..body_start + close].trim());
        cursor = body_start + close;
    }

    found
}

/// Text of the first `<tag>` leaf element.
pub fn element_text<'a>(xml: &'a str, tag: &str) -> Option<&'a str> {
    all_element_text(xml, tag).into_iter().next()
}

/// True if the tag name at `start` directly follows `<` or `<prefix:`.
fn is_open_tag_name(xml: &str, start: usize) -> bool {
    let head = &xml[..start];
    match head.chars().next_back() {
        Some('<') => true,
        Some(':') => {
            let head = &head[..head.len() - 1];
            match head.rfind('<') {
                Some(lt) => !head[lt + 1..]
                    .contains(|c: char| c == '>' || c == '/' || c.is_whitespace()),
                None => false,
            }
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_and_prefixed_tags() {
        let xml = "<root><a>1</a><ns:b attr=\"x\"> two </ns:b></root>";
        assert_eq!(element_text(xml, "a"), Some("1"));
        assert_eq!(element_text(xml, "b"), Some("two"));
        assert_eq!(element_text(xml, "c"), None);
    }

    #[test]
    fn test_tag_prefix_is_not_a_match() {
        let xml = "<state><recmode>x</recmode><rec>on</rec></state>";
        assert_eq!(element_text(xml, "rec"), Some("on"));
    }

    #[test]
    fn test_all_occurrences_in_order() {
        let xml = "<l><av:t>camera</av:t><av:t>system</av:t><t/></l>";
        assert_eq!(all_element_text(xml, "t"), vec!["camera", "system", ""]);
    }
}
